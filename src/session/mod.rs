//! The caller owned context every operation runs in.
//!
//! A [`Session`] owns the node store, the entity tree mirroring it, the configuration and the
//! current navigation position. Indices handed to and returned from the accessors are
//! 1-based ordinals among siblings of the same kind.

/// run `$body` in a closure returning `Result<_, Error>` and pass any error through the
/// configured handler before returning it
macro_rules! reported {
    ($session:ident, $body:block) => {{
        #[allow(clippy::redundant_closure_call)]
        let result = (|| -> Result<_, Error> { $body })();
        $session.report(result)
    }};
}

mod boco;
mod elements;
mod grid;
mod node;
mod read;
mod solution;

pub use boco::{BocoInfo, HoleInfo, SubRegionInfo};
pub use elements::SectionInfo;
pub use grid::{BaseInfo, ZoneInfo};
pub use node::{ArrayInfo, PointSetInfo};
pub use solution::SolutionInfo;

use crate::array::{DataBuffer, DataType};
use crate::config::{Config, FileType, RindConvention};
use crate::navigate::{self, Location, Position};
use crate::prelude::*;
use crate::store::{self, MemoryStore, StoreError};
use crate::tree::{EntityKind, EntityTree, Handle, Label, Zone};

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// version written to new files. Files claiming a newer version are refused
pub const LIBRARY_VERSION: f32 = 4.4;

pub(crate) const VERSION_NODE: &str = "CGNSLibraryVersion";
pub(crate) const VERSION_LABEL: &str = "CGNSLibraryVersion_t";
pub(crate) const GRID_LOCATION_NODE: &str = "GridLocation";
pub(crate) const RIND_NODE: &str = "Rind";

static NEXT_FILE_NUMBER: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    /// create a new file, truncating any existing one
    Write,
    Modify,
}

pub struct Session {
    store: Box<dyn NodeStore>,
    tree: EntityTree,
    position: Option<Position>,
    config: Config,
    mode: Mode,
    version: f32,
    file_number: u64,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("file_number", &self.file_number)
            .field("mode", &self.mode)
            .field("version", &self.version)
            .field("file_type", &self.store.file_type())
            .field("entities", &self.tree.len())
            .field("position", &self.position.as_ref().map(Position::location))
            .finish()
    }
}

fn report_with<T>(config: &Config, result: Result<T, Error>) -> Result<T, Error> {
    if let (Err(e), Some(handler)) = (&result, config.error_handler()) {
        handler(e);
    }
    result
}

impl Session {
    /// open the node document at `path`
    ///
    /// ```no_run
    /// use cgns::{Config, Mode, Session};
    ///
    /// let session = Session::open("mesh.cgx", Mode::Read, Config::new())?;
    /// println!("{} bases", session.nbases());
    /// # Ok::<(), cgns::Error>(())
    /// ```
    pub fn open<P: AsRef<Path>>(path: P, mode: Mode, config: Config) -> Result<Self, Error> {
        let path = path.as_ref();
        let store = match mode {
            Mode::Write => Ok(MemoryStore::create(path, config.file_type())),
            Mode::Read => MemoryStore::load(path, false).map_err(Error::from),
            Mode::Modify => MemoryStore::load(path, true).map_err(Error::from),
        };
        let result = store.and_then(|store| Self::from_store(store, mode, config.clone()));
        if result.is_ok() {
            log::info!("opened {} in {mode:?} mode", path.display());
        }
        report_with(&config, result)
    }

    /// a session on a fresh in-memory store that is never written anywhere
    pub fn diskless(config: Config) -> Result<Self, Error> {
        let store = MemoryStore::diskless(config.file_type());
        Self::from_store(store, Mode::Write, config)
    }

    /// a session on any node store. In Write mode the store is expected to be empty
    pub fn from_store<S: NodeStore + 'static>(
        store: S,
        mode: Mode,
        config: Config,
    ) -> Result<Self, Error> {
        let mut store: Box<dyn NodeStore> = Box::new(store);

        let result = match mode {
            Mode::Write => write_version(store.as_mut())
                .map(|_| (EntityTree::new(store.root_id()), LIBRARY_VERSION)),
            Mode::Read | Mode::Modify => read::rebuild(store.as_ref()),
        };
        let (tree, version) = report_with(&config, result)?;

        match config.rind_convention() {
            RindConvention::Zero => {
                log::warn!("rind planes are counted from the first stored plane")
            }
            RindConvention::Core => log::debug!("rind planes use the core index convention"),
        }

        let file_number = NEXT_FILE_NUMBER.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "session {file_number}: {} file, version {version}, {} entities",
            store.file_type(),
            tree.len()
        );

        Ok(Self {
            store,
            tree,
            position: None,
            config,
            mode,
            version,
            file_number,
        })
    }

    /// apply the compaction policy, persist and release the file
    pub fn close(mut self) -> Result<(), Error> {
        let file_number = self.file_number;
        reported!(self, {
            if self.mode != Mode::Read {
                let deleted = self.store.deleted_count();
                if self.config.compaction().should_compact(deleted) {
                    let reclaimed = self.store.compact();
                    log::warn!("compacted the node store, {reclaimed} deleted slots reclaimed");
                }
                self.store.flush()?;
            }
            log::info!("closed file {file_number}");
            Ok(())
        })
    }

    pub(crate) fn report<T>(&self, result: Result<T, Error>) -> Result<T, Error> {
        report_with(&self.config, result)
    }

    /// version recorded in the file
    pub fn version(&self) -> f32 {
        self.version
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn file_type(&self) -> FileType {
        self.store.file_type()
    }

    /// number identifying this session in saved [`Location`]s
    pub fn file_number(&self) -> u64 {
        self.file_number
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// the entity tree, for inspection
    pub fn tree(&self) -> &EntityTree {
        &self.tree
    }

    /// set the position to `base`, then follow `steps`
    ///
    /// Each step is a `(label, index)` pair. With `index == 0` the label is read as a child
    /// name. An `"end"` step or an empty label stops early. Any failure clears the position.
    pub fn goto<S: AsRef<str>>(&mut self, base: usize, steps: &[(S, usize)]) -> Result<(), Error> {
        reported!(self, {
            self.position = None;
            let mut position = Position::at_base(&self.tree, self.file_number, base)?;
            position.descend(&self.tree, steps)?;
            self.position = Some(position);
            Ok(())
        })
    }

    /// follow `steps` from the current position
    pub fn gorel<S: AsRef<str>>(&mut self, steps: &[(S, usize)]) -> Result<(), Error> {
        reported!(self, {
            let mut position = self.position.take().ok_or(Error::NoPosition)?;
            position.descend(&self.tree, steps)?;
            self.position = Some(position);
            Ok(())
        })
    }

    /// move along a `/`-separated path of names. `/Base/...` starts at the base called
    /// `Base`, other paths start at the current position
    pub fn gopath(&mut self, path: &str) -> Result<(), Error> {
        reported!(self, {
            let current = self.position.take();
            let (base, components) = navigate::split_path(path)?;
            let mut position = match base {
                Some(name) => Position::at_base_named(&self.tree, self.file_number, name)?,
                None => current.ok_or(Error::NoPosition)?,
            };
            let steps: Vec<(&str, usize)> = components.into_iter().map(|c| (c, 0)).collect();
            position.descend(&self.tree, &steps)?;
            self.position = Some(position);
            Ok(())
        })
    }

    /// `goto` with labels and indices given as two lists
    pub fn golist<S: AsRef<str>>(
        &mut self,
        base: usize,
        labels: &[S],
        indices: &[usize],
    ) -> Result<(), Error> {
        if labels.len() != indices.len() {
            self.position = None;
            return self.report(Err(Error::invalid(format!(
                "{} labels but {} indices",
                labels.len(),
                indices.len()
            ))));
        }
        let steps: Vec<(&str, usize)> = labels
            .iter()
            .map(AsRef::as_ref)
            .zip(indices.iter().copied())
            .collect();
        self.goto(base, &steps)
    }

    /// replay a position saved with [`current_path`](Session::current_path)
    pub fn goto_location(&mut self, location: &Location) -> Result<(), Error> {
        if location.file_number != self.file_number {
            self.position = None;
            return self.report(Err(Error::FileMismatch {
                expected: self.file_number,
                found: location.file_number,
            }));
        }
        self.golist(location.base, &location.labels, &location.indices)
    }

    /// the current position, without changing it
    pub fn current_path(&self) -> Result<Location, Error> {
        reported!(self, {
            let position = self.position.as_ref().ok_or(Error::NoPosition)?;
            debug_assert_eq!(position.file_number(), self.file_number);
            Ok(position.location())
        })
    }

    /// entity at the current position
    pub(crate) fn current(&self) -> Result<Handle, Error> {
        let handle = self.position.as_ref().ok_or(Error::NoPosition)?.current();
        if !self.tree.contains(handle) {
            return Err(Error::InvalidHandle);
        }
        Ok(handle)
    }

    pub(crate) fn writable(&self, operation: &str) -> Result<(), Error> {
        if self.mode == Mode::Read {
            return Err(Error::ReadOnly(operation.to_string()));
        }
        Ok(())
    }

    pub(crate) fn convention(&self) -> RindConvention {
        self.config.rind_convention()
    }

    pub(crate) fn index_type(&self) -> DataType {
        self.config.index_type()
    }

    /// the `index`-th child of `parent` labelled `label`
    pub(crate) fn nth(
        &self,
        parent: Handle,
        label: Label,
        index: usize,
        what: &'static str,
    ) -> Result<Handle, Error> {
        self.tree
            .child_by_label(parent, label, index)?
            .ok_or_else(|| Error::not_found(what, index))
    }

    pub(crate) fn base_handle(&self, base: usize) -> Result<Handle, Error> {
        self.nth(self.tree.root(), Label::Base, base, "base")
    }

    pub(crate) fn zone_handle(&self, base: usize, zone: usize) -> Result<Handle, Error> {
        let base = self.base_handle(base)?;
        self.nth(base, Label::Zone, zone, "zone")
    }

    pub(crate) fn zone(&self, handle: Handle) -> Result<&Zone, Error> {
        match self.tree.kind(handle)? {
            EntityKind::Zone(zone) => Ok(zone),
            _ => Err(Error::internal("handle does not refer to a zone")),
        }
    }

    /// closest zone above `handle`, `handle` itself included
    pub(crate) fn zone_above(&self, handle: Handle) -> Result<Handle, Error> {
        let mut current = Some(handle);
        while let Some(h) = current {
            let entity = self.tree.get(h)?;
            if let EntityKind::Zone(_) = entity.kind {
                return Ok(h);
            }
            current = entity.parent();
        }
        Err(Error::invalid("the current position is not inside a zone"))
    }

    pub(crate) fn node_of(&self, handle: Handle) -> Result<NodeId, Error> {
        Ok(self.tree.get(handle)?.node)
    }

    /// make `name` available below `parent`. An existing entity of that name is an error in
    /// Write mode and is replaced in Modify mode
    fn prepare_child(&mut self, parent: Handle, name: &str) -> Result<(), Error> {
        store::validate_name(name)?;
        if let Some(existing) = self.tree.child_named(parent, name)? {
            match self.mode {
                Mode::Modify => {
                    log::debug!("replacing `{name}`");
                    self.remove_entity(existing)?;
                }
                _ => {
                    return Err(Error::invalid(format!(
                        "`{}` already has a child named `{name}`",
                        self.tree.get(parent)?.name()
                    )))
                }
            }
        }
        Ok(())
    }

    /// create the node of a new entity below `parent` and let `fill` write its contents.
    /// The node is removed again when `fill` fails
    pub(crate) fn create_entity<F>(
        &mut self,
        parent: Handle,
        name: &str,
        label: Label,
        fill: F,
    ) -> Result<Handle, Error>
    where
        F: FnOnce(&mut dyn NodeStore, NodeId) -> Result<EntityKind, Error>,
    {
        let parent_entity = self.tree.get(parent)?;
        if !parent_entity.kind.allows(label) {
            return Err(Error::invalid(format!(
                "{label} is not allowed below `{}`",
                parent_entity.name()
            )));
        }
        self.prepare_child(parent, name)?;

        let parent_node = self.node_of(parent)?;
        let node = self.store.create_node(parent_node, name, label.as_str())?;

        let kind = match fill(self.store.as_mut(), node) {
            Ok(kind) if kind.label() == Some(label) => kind,
            Ok(_) => return Err(Error::internal(format!("`{name}` was filled as the wrong kind"))),
            Err(e) => {
                if let Err(cleanup) = self.store.delete_node(parent_node, node) {
                    log::debug!("could not remove the partial node `{name}`: {cleanup}");
                }
                return Err(e);
            }
        };

        self.tree.insert(parent, name, node, kind)
    }

    /// delete an entity, its node and everything below both
    pub(crate) fn remove_entity(&mut self, handle: Handle) -> Result<(), Error> {
        let entity = self.tree.get(handle)?;
        let parent = entity
            .parent()
            .ok_or_else(|| Error::invalid("the file root cannot be deleted"))?;
        let node = entity.node;
        let parent_node = self.node_of(parent)?;
        self.store.delete_node(parent_node, node)?;
        self.tree.remove(handle)
    }
}

fn write_version(store: &mut dyn NodeStore) -> Result<(), Error> {
    let root = store.root_id();
    let node = store.create_node(root, VERSION_NODE, VERSION_LABEL)?;
    store.set_dimensions(node, DataType::RealSingle, &[1])?;
    store.write_all_data(node, &DataBuffer::RealSingle(vec![LIBRARY_VERSION]))?;
    Ok(())
}

/// create or overwrite the character child `name` of `parent`
pub(crate) fn write_text(
    store: &mut dyn NodeStore,
    parent: NodeId,
    name: &str,
    label: &str,
    text: &str,
) -> Result<NodeId, Error> {
    let node = match store.node_id(parent, name) {
        Ok(node) => node,
        Err(StoreError::NoChild { .. }) => store.create_node(parent, name, label)?,
        Err(e) => return Err(e.into()),
    };
    store.set_dimensions(node, DataType::Character, &[text.len()])?;
    store.write_all_data(node, &DataBuffer::from_text(text))?;
    Ok(node)
}

/// contents of the character child `name` of `parent`, `None` if there is none
pub(crate) fn read_text(
    store: &dyn NodeStore,
    parent: NodeId,
    name: &str,
) -> Result<Option<String>, Error> {
    let node = match store.node_id(parent, name) {
        Ok(node) => node,
        Err(StoreError::NoChild { .. }) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if store.node_info(node)?.data_type != Some(DataType::Character) {
        return Err(Error::invalid(format!("`{name}` does not hold text")));
    }
    Ok(store.read_all_data(node, DataType::Character)?.to_text())
}

/// create or overwrite the integer child `name` of `parent`
pub(crate) fn write_integers(
    store: &mut dyn NodeStore,
    parent: NodeId,
    name: &str,
    label: &str,
    data_type: DataType,
    dims: &[usize],
    values: &[i64],
) -> Result<NodeId, Error> {
    let node = match store.node_id(parent, name) {
        Ok(node) => node,
        Err(StoreError::NoChild { .. }) => store.create_node(parent, name, label)?,
        Err(e) => return Err(e.into()),
    };
    store.set_dimensions(node, data_type, dims)?;
    store.write_all_data(node, &DataBuffer::from_indices(values, data_type)?)?;
    Ok(node)
}

/// integer contents of the child `name` of `parent`, `None` if there is none
pub(crate) fn read_integers(
    store: &dyn NodeStore,
    parent: NodeId,
    name: &str,
) -> Result<Option<Vec<i64>>, Error> {
    let node = match store.node_id(parent, name) {
        Ok(node) => node,
        Err(StoreError::NoChild { .. }) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let data_type = store
        .node_info(node)?
        .data_type
        .filter(DataType::is_integer)
        .ok_or_else(|| Error::invalid(format!("`{name}` does not hold integers")))?;
    Ok(store.read_all_data(node, data_type)?.to_indices())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Arc, Mutex};

    #[test]
    fn file_numbers_are_unique() {
        let a = Session::diskless(Config::new()).unwrap();
        let b = Session::diskless(Config::new()).unwrap();
        assert_ne!(a.file_number(), b.file_number());
        assert_eq!(a.version(), LIBRARY_VERSION);
    }

    #[test]
    fn errors_reach_the_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let config =
            Config::new().with_error_handler(move |e| sink.lock().unwrap().push(e.to_string()));
        let mut session = Session::diskless(config).unwrap();

        assert!(session.gorel(&[("Zone_t", 1)]).is_err());
        assert!(session.goto(3, &[("end", 0)]).is_err());
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn text_children() {
        let mut store = MemoryStore::diskless(FileType::Ascii);
        let root = store.root_id();
        write_text(&mut store, root, "Note", "Descriptor_t", "hello").unwrap();
        write_text(&mut store, root, "Note", "Descriptor_t", "hi").unwrap();
        assert_eq!(read_text(&store, root, "Note").unwrap().as_deref(), Some("hi"));
        assert_eq!(read_text(&store, root, "Other").unwrap(), None);
    }
}
