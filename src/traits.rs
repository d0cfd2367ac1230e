//! The node store contract the library is written against.

use crate::array::{DataBuffer, DataType, Slab};
use crate::config::FileType;
use crate::prelude::*;
use crate::store::StoreError;

/// opaque identifier of a node inside a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Into)]
#[display(fmt = "#{_0}")]
pub struct NodeId(pub u64);

impl NodeId {
    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

/// header of a node: everything but its payload and children
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    pub name: String,
    pub label: String,
    /// `None` for nodes without data
    pub data_type: Option<DataType>,
    pub dims: Vec<usize>,
}

impl NodeInfo {
    /// number of elements in the payload
    pub fn len(&self) -> usize {
        if self.data_type.is_none() {
            0
        } else {
            self.dims.iter().product()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// target of a symbolic link node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// file holding the target, empty for a link inside the same file
    pub file: String,
    /// absolute path of the target node inside that file
    pub path: String,
}

impl Link {
    pub fn is_external(&self) -> bool {
        !self.file.is_empty()
    }
}

/// Generic tree structured node storage.
///
/// Nodes are created under a parent with a name and a type label, sized with
/// [`set_dimensions`](NodeStore::set_dimensions) and then filled either in one go or through
/// windows. Stores that can convert element types themselves report it through
/// [`supports_conversion`](NodeStore::supports_conversion); the others only move data of the
/// type the node was sized with.
pub trait NodeStore {
    fn file_type(&self) -> FileType;

    fn supports_conversion(&self) -> bool;

    fn root_id(&self) -> NodeId;

    /// id of the child of `parent` called `name`
    fn node_id(&self, parent: NodeId, name: &str) -> Result<NodeId, StoreError>;

    /// children of `parent` in creation order
    fn children(&self, parent: NodeId) -> Result<Vec<NodeId>, StoreError>;

    fn node_info(&self, id: NodeId) -> Result<NodeInfo, StoreError>;

    fn create_node(
        &mut self,
        parent: NodeId,
        name: &str,
        label: &str,
    ) -> Result<NodeId, StoreError>;

    /// give a node a type and shape, discarding any previous payload
    fn set_dimensions(
        &mut self,
        id: NodeId,
        data_type: DataType,
        dims: &[usize],
    ) -> Result<(), StoreError>;

    fn read_all_data(&self, id: NodeId, wanted: DataType) -> Result<DataBuffer, StoreError>;

    /// read the elements of `window` as one contiguous buffer in Fortran order
    fn read_data(
        &self,
        id: NodeId,
        window: &Slab,
        wanted: DataType,
    ) -> Result<DataBuffer, StoreError>;

    fn write_all_data(&mut self, id: NodeId, data: &DataBuffer) -> Result<(), StoreError>;

    /// write contiguous `values` into `window` of the node
    fn write_data(
        &mut self,
        id: NodeId,
        window: &Slab,
        values: &DataBuffer,
    ) -> Result<(), StoreError>;

    /// remove `id` and everything below it from `parent`
    fn delete_node(&mut self, parent: NodeId, id: NodeId) -> Result<(), StoreError>;

    fn create_link(
        &mut self,
        parent: NodeId,
        name: &str,
        file: &str,
        path: &str,
    ) -> Result<NodeId, StoreError>;

    /// `Some` if `id` is a link node
    fn link(&self, id: NodeId) -> Result<Option<Link>, StoreError>;

    /// number of nodes deleted since the store was opened or last compacted
    fn deleted_count(&self) -> usize;

    /// renumber nodes densely, dropping deleted slots. Node ids held by the caller are
    /// invalid afterwards. Returns the number of reclaimed slots
    fn compact(&mut self) -> usize;

    /// persist everything written so far
    fn flush(&mut self) -> Result<(), StoreError>;
}
