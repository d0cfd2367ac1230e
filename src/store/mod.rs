//! In-memory node store persisted as an XML node document.
//!
//! Nodes live in a vector indexed by their [`NodeId`]. Deleted slots are kept on a free
//! list and handed out again by later creations, so ids stay stable across a session and
//! across saves until [`compact`](NodeStore::compact) renumbers them.

mod error;
mod event_summary;
mod parse;
mod write;

pub use error::{
    InvalidPayload, MalformedAttribute, MalformedXml, MissingAttribute, ParseError,
    SizeMismatch, StoreError, UnexpectedAttributeValue, UnexpectedElement,
};

use crate::array::{self, DataBuffer, DataType, Slab, MAX_RANK};
use crate::config::FileType;
use crate::traits::{Link, NodeId, NodeInfo, NodeStore};

use std::collections::VecDeque;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// longest allowed node name
pub const MAX_NAME_LENGTH: usize = 32;

/// longest chain of links followed before giving up
const MAX_LINK_DEPTH: usize = 16;

pub(crate) const ROOT_NAME: &str = "root";
pub(crate) const ROOT_LABEL: &str = "Root Node of CGNS File";

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NodeRecord {
    pub(crate) name: String,
    pub(crate) label: String,
    pub(crate) data_type: Option<DataType>,
    pub(crate) dims: Vec<usize>,
    pub(crate) data: Option<DataBuffer>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) link: Option<Link>,
}

impl NodeRecord {
    pub(crate) fn new(name: &str, label: &str, parent: Option<NodeId>) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            data_type: None,
            dims: Vec::new(),
            data: None,
            children: Vec::new(),
            parent,
            link: None,
        }
    }
}

/// check a node name against the naming rules of the store
pub fn validate_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty()
        || name.len() > MAX_NAME_LENGTH
        || name.contains('/')
        || name == "."
        || name == ".."
    {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[derive(Debug)]
pub struct MemoryStore {
    nodes: Vec<Option<NodeRecord>>,
    free: Vec<u64>,
    file_type: FileType,
    path: Option<PathBuf>,
    writable: bool,
    deleted: usize,
}

impl MemoryStore {
    /// an empty, writable store that is never persisted
    pub fn diskless(file_type: FileType) -> Self {
        Self {
            nodes: vec![Some(NodeRecord::new(ROOT_NAME, ROOT_LABEL, None))],
            free: Vec::new(),
            file_type,
            path: None,
            writable: true,
            deleted: 0,
        }
    }

    /// an empty store that is written to `path` on flush
    pub fn create<P: AsRef<Path>>(path: P, file_type: FileType) -> Self {
        let mut store = Self::diskless(file_type);
        store.path = Some(path.as_ref().to_path_buf());
        store
    }

    /// load a node document. The encoding recorded in the document decides the file type
    pub fn load<P: AsRef<Path>>(path: P, writable: bool) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let document = parse::read_document(BufReader::new(file))?;

        log::debug!(
            "loaded {} nodes ({} free slots) from {}",
            document.nodes.iter().filter(|n| n.is_some()).count(),
            document.free.len(),
            path.display()
        );

        Ok(Self {
            nodes: document.nodes,
            free: document.free,
            file_type: document.file_type,
            path: Some(path.to_path_buf()),
            writable,
            deleted: 0,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// write the document to any writer
    pub fn write_document<W: std::io::Write>(&self, writer: W) -> Result<(), StoreError> {
        write::write_document(writer, &self.nodes, &self.free, self.file_type)
    }

    fn record(&self, id: NodeId) -> Result<&NodeRecord, StoreError> {
        self.nodes
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(StoreError::NoNode(id))
    }

    fn record_mut(&mut self, id: NodeId) -> Result<&mut NodeRecord, StoreError> {
        self.nodes
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(StoreError::NoNode(id))
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.writable {
            Ok(())
        } else {
            Err(StoreError::ReadOnly)
        }
    }

    /// follow links inside this file until a real node is reached
    fn resolve(&self, id: NodeId) -> Result<NodeId, StoreError> {
        let mut current = id;
        for _ in 0..MAX_LINK_DEPTH {
            match &self.record(current)?.link {
                None => return Ok(current),
                Some(link) if link.is_external() => {
                    return Err(StoreError::ExternalLink {
                        file: link.file.clone(),
                        path: link.path.clone(),
                    })
                }
                Some(link) => current = self.lookup_path(&link.path)?,
            }
        }
        Err(StoreError::LinkDepth(id))
    }

    /// id of the node at an absolute `/a/b/c` path
    fn lookup_path(&self, path: &str) -> Result<NodeId, StoreError> {
        path.split('/')
            .filter(|part| !part.is_empty())
            .try_fold(self.root_id(), |parent, name| self.node_id(parent, name))
    }

    fn allocate(&mut self, record: NodeRecord) -> NodeId {
        match self.free.pop() {
            Some(slot) => {
                let id = NodeId(slot);
                if self.nodes.len() <= id.index() {
                    self.nodes.resize(id.index() + 1, None);
                }
                self.nodes[id.index()] = Some(record);
                id
            }
            None => {
                self.nodes.push(Some(record));
                NodeId(self.nodes.len() as u64 - 1)
            }
        }
    }

    fn data(&self, id: NodeId) -> Result<(&NodeRecord, &DataBuffer), StoreError> {
        let record = self.record(self.resolve(id)?)?;
        match &record.data {
            Some(data) => Ok((record, data)),
            None => Err(StoreError::NoData(id)),
        }
    }

    /// bring `values` to the node's type if the store is allowed to
    fn to_stored_type(
        &self,
        stored: DataType,
        values: &DataBuffer,
    ) -> Result<DataBuffer, StoreError> {
        let given = values.data_type();
        if given == stored {
            Ok(values.clone())
        } else if self.supports_conversion() {
            Ok(array::convert(values.clone(), stored)?)
        } else {
            Err(StoreError::TypeMismatch {
                from: given,
                to: stored,
            })
        }
    }

    fn to_wanted_type(
        &self,
        values: DataBuffer,
        wanted: DataType,
    ) -> Result<DataBuffer, StoreError> {
        let stored = values.data_type();
        if stored == wanted {
            Ok(values)
        } else if self.supports_conversion() {
            Ok(array::convert(values, wanted)?)
        } else {
            Err(StoreError::TypeMismatch {
                from: stored,
                to: wanted,
            })
        }
    }
}

impl NodeStore for MemoryStore {
    fn file_type(&self) -> FileType {
        self.file_type
    }

    fn supports_conversion(&self) -> bool {
        self.file_type == FileType::Base64
    }

    fn root_id(&self) -> NodeId {
        NodeId(0)
    }

    fn node_id(&self, parent: NodeId, name: &str) -> Result<NodeId, StoreError> {
        let parent = self.resolve(parent)?;
        self.record(parent)?
            .children
            .iter()
            .copied()
            .find(|child| {
                self.record(*child)
                    .map(|record| record.name == name)
                    .unwrap_or(false)
            })
            .ok_or_else(|| StoreError::NoChild {
                parent,
                name: name.to_string(),
            })
    }

    fn children(&self, parent: NodeId) -> Result<Vec<NodeId>, StoreError> {
        let parent = self.resolve(parent)?;
        Ok(self.record(parent)?.children.clone())
    }

    fn node_info(&self, id: NodeId) -> Result<NodeInfo, StoreError> {
        let record = self.record(id)?;

        let target = match self.resolve(id) {
            Ok(target) => self.record(target)?,
            // the target of an external link is not visible from here
            Err(StoreError::ExternalLink { .. }) => record,
            Err(e) => return Err(e),
        };

        Ok(NodeInfo {
            name: record.name.clone(),
            label: target.label.clone(),
            data_type: target.data_type,
            dims: target.dims.clone(),
        })
    }

    fn create_node(
        &mut self,
        parent: NodeId,
        name: &str,
        label: &str,
    ) -> Result<NodeId, StoreError> {
        self.check_writable()?;
        validate_name(name)?;

        let parent = self.resolve(parent)?;
        if self.node_id(parent, name).is_ok() {
            return Err(StoreError::DuplicateName {
                parent,
                name: name.to_string(),
            });
        }

        let id = self.allocate(NodeRecord::new(name, label, Some(parent)));
        self.record_mut(parent)?.children.push(id);
        Ok(id)
    }

    fn set_dimensions(
        &mut self,
        id: NodeId,
        data_type: DataType,
        dims: &[usize],
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        if dims.is_empty() || dims.len() > MAX_RANK {
            return Err(StoreError::InvalidRank(dims.len()));
        }

        let len = dims
            .iter()
            .try_fold(1usize, |acc, d| acc.checked_mul(*d))
            .ok_or(StoreError::TooLarge(id))?;

        let id = self.resolve(id)?;
        let record = self.record_mut(id)?;
        record.data_type = Some(data_type);
        record.dims = dims.to_vec();
        record.data = Some(DataBuffer::zeros(data_type, len));
        Ok(())
    }

    fn read_all_data(&self, id: NodeId, wanted: DataType) -> Result<DataBuffer, StoreError> {
        let (_, data) = self.data(id)?;
        array::check_convertible(data.data_type(), wanted)?;
        self.to_wanted_type(data.clone(), wanted)
    }

    fn read_data(
        &self,
        id: NodeId,
        window: &Slab,
        wanted: DataType,
    ) -> Result<DataBuffer, StoreError> {
        let (record, data) = self.data(id)?;
        array::check_convertible(data.data_type(), wanted)?;
        let selected = data.gather(&record.dims, window)?;
        self.to_wanted_type(selected, wanted)
    }

    fn write_all_data(&mut self, id: NodeId, data: &DataBuffer) -> Result<(), StoreError> {
        self.check_writable()?;
        let target = self.resolve(id)?;
        let (stored, expected) = {
            let (record, current) = self.data(target)?;
            (record.data_type.unwrap_or(current.data_type()), current.len())
        };

        array::check_convertible(data.data_type(), stored)?;
        if data.len() != expected {
            return Err(SizeMismatch::new(id, expected, data.len()).into());
        }

        let values = self.to_stored_type(stored, data)?;
        self.record_mut(target)?.data = Some(values);
        Ok(())
    }

    fn write_data(
        &mut self,
        id: NodeId,
        window: &Slab,
        values: &DataBuffer,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        let target = self.resolve(id)?;
        let stored = self.data(target)?.1.data_type();

        array::check_convertible(values.data_type(), stored)?;
        let values = self.to_stored_type(stored, values)?;

        let record = self.record_mut(target)?;
        let dims = record.dims.clone();
        match record.data.as_mut() {
            Some(data) => data.scatter(&dims, window, &values)?,
            None => return Err(StoreError::NoData(id)),
        }
        Ok(())
    }

    fn delete_node(&mut self, parent: NodeId, id: NodeId) -> Result<(), StoreError> {
        self.check_writable()?;
        if id == self.root_id() {
            return Err(StoreError::DeleteRoot);
        }

        let parent = self.resolve(parent)?;
        let parent_record = self.record_mut(parent)?;
        let position = parent_record
            .children
            .iter()
            .position(|child| *child == id)
            .ok_or(StoreError::NoNode(id))?;
        parent_record.children.remove(position);

        // links are removed themselves, never their targets
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            if let Some(record) = self.nodes.get_mut(current.index()).and_then(Option::take) {
                pending.extend(record.children);
                self.free.push(current.0);
                self.deleted += 1;
            }
        }

        Ok(())
    }

    fn create_link(
        &mut self,
        parent: NodeId,
        name: &str,
        file: &str,
        path: &str,
    ) -> Result<NodeId, StoreError> {
        let id = self.create_node(parent, name, "")?;
        self.record_mut(id)?.link = Some(Link {
            file: file.to_string(),
            path: path.to_string(),
        });
        Ok(id)
    }

    fn link(&self, id: NodeId) -> Result<Option<Link>, StoreError> {
        Ok(self.record(id)?.link.clone())
    }

    fn deleted_count(&self) -> usize {
        self.deleted
    }

    fn compact(&mut self) -> usize {
        let live = self.nodes.iter().filter(|n| n.is_some()).count();
        let reclaimed = self.nodes.len() - live;

        // breadth first renumbering from the root keeps parents before children
        let mut mapping = vec![None; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len() - reclaimed);
        let mut queue = VecDeque::from([self.root_id()]);
        while let Some(id) = queue.pop_front() {
            if let Some(record) = self.nodes.get(id.index()).and_then(Option::as_ref) {
                mapping[id.index()] = Some(NodeId(order.len() as u64));
                order.push(id);
                queue.extend(record.children.iter().copied());
            }
        }

        let remap = |id: NodeId| mapping.get(id.index()).copied().flatten();

        let mut nodes = Vec::with_capacity(order.len());
        for old in order {
            if let Some(mut record) = self.nodes[old.index()].take() {
                record.parent = record.parent.and_then(remap);
                record.children = record.children.iter().filter_map(|c| remap(*c)).collect();
                nodes.push(Some(record));
            }
        }

        self.nodes = nodes;
        self.free.clear();
        self.deleted = 0;

        log::debug!("compacted node store, reclaimed {reclaimed} slots");
        reclaimed
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        let path = match (&self.path, self.writable) {
            (Some(path), true) => path.clone(),
            _ => return Ok(()),
        };

        let file = std::fs::File::create(&path)?;
        self.write_document(BufWriter::new(file))?;
        log::debug!("wrote node document {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_array(file_type: FileType) -> (MemoryStore, NodeId) {
        let mut store = MemoryStore::diskless(file_type);
        let root = store.root_id();
        let id = store.create_node(root, "values", "DataArray_t").unwrap();
        store
            .set_dimensions(id, DataType::RealDouble, &[3, 2])
            .unwrap();
        store
            .write_all_data(id, &DataBuffer::RealDouble(vec![1., 2., 3., 4., 5., 6.]))
            .unwrap();
        (store, id)
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut store = MemoryStore::diskless(FileType::Base64);
        let root = store.root_id();
        store.create_node(root, "Base", "CGNSBase_t").unwrap();
        let err = store.create_node(root, "Base", "CGNSBase_t").unwrap_err();
        assert!(matches!(err, StoreError::DuplicateName { .. }));
    }

    #[test]
    fn invalid_names() {
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name(&"x".repeat(33)).is_err());
        assert!(validate_name(&"x".repeat(32)).is_ok());
    }

    #[test]
    fn windowed_read() {
        let (store, id) = store_with_array(FileType::Ascii);
        let window = Slab::new(vec![2, 1], vec![3, 2]);
        let out = store.read_data(id, &window, DataType::RealDouble).unwrap();
        assert_eq!(out, DataBuffer::RealDouble(vec![2., 3., 5., 6.]));
    }

    #[test]
    fn conversion_depends_on_file_type() {
        let (ascii, id) = store_with_array(FileType::Ascii);
        assert!(matches!(
            ascii.read_all_data(id, DataType::RealSingle),
            Err(StoreError::TypeMismatch { .. })
        ));

        let (base64, id) = store_with_array(FileType::Base64);
        let out = base64.read_all_data(id, DataType::RealSingle).unwrap();
        assert_eq!(out, DataBuffer::RealSingle(vec![1., 2., 3., 4., 5., 6.]));
    }

    #[test]
    fn characters_never_convert() {
        let (store, id) = store_with_array(FileType::Base64);
        assert!(matches!(
            store.read_all_data(id, DataType::Character),
            Err(StoreError::Conversion(_))
        ));
    }

    #[test]
    fn write_size_must_match() {
        let (mut store, id) = store_with_array(FileType::Base64);
        let err = store
            .write_all_data(id, &DataBuffer::RealDouble(vec![1.]))
            .unwrap_err();
        assert!(matches!(err, StoreError::Size(_)));
    }

    #[test]
    fn internal_links_resolve() {
        let (mut store, id) = store_with_array(FileType::Base64);
        let root = store.root_id();
        let link = store.create_link(root, "alias", "", "/values").unwrap();

        assert_eq!(store.link(link).unwrap().unwrap().path, "/values");
        assert!(store.link(id).unwrap().is_none());

        let info = store.node_info(link).unwrap();
        assert_eq!(info.name, "alias");
        assert_eq!(info.label, "DataArray_t");
        assert_eq!(info.dims, vec![3, 2]);
        assert_eq!(
            store.read_all_data(link, DataType::RealDouble).unwrap(),
            store.read_all_data(id, DataType::RealDouble).unwrap()
        );
    }

    #[test]
    fn external_links_are_reported() {
        let mut store = MemoryStore::diskless(FileType::Base64);
        let root = store.root_id();
        let link = store
            .create_link(root, "grid", "other.cgns", "/Base/Zone")
            .unwrap();
        assert!(matches!(
            store.read_all_data(link, DataType::RealDouble),
            Err(StoreError::ExternalLink { .. })
        ));
        assert!(store.node_info(link).is_ok());
    }

    #[test]
    fn delete_frees_the_subtree_and_reuses_slots() {
        let mut store = MemoryStore::diskless(FileType::Base64);
        let root = store.root_id();
        let a = store.create_node(root, "a", "UserDefinedData_t").unwrap();
        store.create_node(a, "b", "UserDefinedData_t").unwrap();
        store.delete_node(root, a).unwrap();

        assert_eq!(store.deleted_count(), 2);
        assert!(store.children(root).unwrap().is_empty());

        let c = store.create_node(root, "c", "UserDefinedData_t").unwrap();
        assert!(c.0 <= 2);
    }

    #[test]
    fn compaction_renumbers_densely() {
        let mut store = MemoryStore::diskless(FileType::Base64);
        let root = store.root_id();
        let a = store.create_node(root, "a", "UserDefinedData_t").unwrap();
        store.create_node(root, "b", "UserDefinedData_t").unwrap();
        store.delete_node(root, a).unwrap();

        assert_eq!(store.compact(), 1);
        assert_eq!(store.deleted_count(), 0);
        let b = store.node_id(root, "b").unwrap();
        assert_eq!(b, NodeId(1));
        assert_eq!(store.children(root).unwrap(), vec![b]);
    }

    #[test]
    fn read_only_store_refuses_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ro.cgns");
        let mut store = MemoryStore::create(&path, FileType::Ascii);
        store.flush().unwrap();

        let mut store = MemoryStore::load(&path, false).unwrap();
        let root = store.root_id();
        assert!(matches!(
            store.create_node(root, "x", "UserDefinedData_t"),
            Err(StoreError::ReadOnly)
        ));
    }
}
