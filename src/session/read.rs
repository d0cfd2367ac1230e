//! Rebuilding the entity tree from the nodes of an opened file.

use super::{
    read_integers, read_text, Session, GRID_LOCATION_NODE, LIBRARY_VERSION, RIND_NODE, VERSION_NODE,
};
use crate::array::{self, DataBuffer, DataType};
use crate::names::{BcDataType, BcType, GridLocation, PointSetType};
use crate::prelude::*;
use crate::ptset::{self, PointSet};
use crate::section::Section;
use crate::store::StoreError;
use crate::transfer::{ArrayField, Rind};
use crate::tree::{
    Base, BcDataSet, Boco, EntityKind, EntityTree, Handle, Hole, Label, Solution, SubRegion,
    UserData, Zone,
};

/// files may carry a version written with less precision than the library's
const VERSION_TOLERANCE: f32 = 1e-4;

/// what the entities below a node need to know about their surroundings
#[derive(Debug, Clone, Copy)]
struct Scope {
    index_dim: usize,
}

/// the version node and the entity tree of every navigable node
pub(crate) fn rebuild(store: &dyn NodeStore) -> Result<(EntityTree, f32), Error> {
    let version = read_version(store)?;
    if version > LIBRARY_VERSION + VERSION_TOLERANCE {
        return Err(Error::Version {
            found: version,
            library: LIBRARY_VERSION,
        });
    }

    let root = store.root_id();
    let mut tree = EntityTree::new(root);
    let top = tree.root();
    load_children(store, &mut tree, top, root, Scope { index_dim: 1 })?;

    log::debug!("rebuilt {} entities from a version {version} file", tree.len());
    Ok((tree, version))
}

fn read_version(store: &dyn NodeStore) -> Result<f32, Error> {
    let node = match store.node_id(store.root_id(), VERSION_NODE) {
        Ok(node) => node,
        Err(StoreError::NoChild { .. }) => {
            return Err(Error::invalid("the file has no version node"))
        }
        Err(e) => return Err(e.into()),
    };
    let data_type = store
        .node_info(node)?
        .data_type
        .ok_or_else(|| Error::invalid("the version node is empty"))?;
    match array::convert(store.read_all_data(node, data_type)?, DataType::RealSingle)? {
        DataBuffer::RealSingle(values) if values.len() == 1 => Ok(values[0]),
        _ => Err(Error::invalid("the version node must hold a single number")),
    }
}

fn load_children(
    store: &dyn NodeStore,
    tree: &mut EntityTree,
    parent: Handle,
    node: NodeId,
    scope: Scope,
) -> Result<(), Error> {
    for child in store.children(node)? {
        load_entity(store, tree, parent, child, scope)?;
    }
    Ok(())
}

/// add the entity stored in `node` and everything below it to `parent`. Nodes of labels
/// that are not navigable, or not allowed below `parent`, are left out
fn load_entity(
    store: &dyn NodeStore,
    tree: &mut EntityTree,
    parent: Handle,
    node: NodeId,
    scope: Scope,
) -> Result<Option<Handle>, Error> {
    let info = match store.node_info(node) {
        Ok(info) => info,
        Err(e @ StoreError::NoChild { .. }) => {
            log::debug!("skipping node {node} with a dangling link: {e}");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };
    if let Some(link) = store.link(node)? {
        if link.is_external() {
            log::debug!("skipping `{}`, linked to {}:{}", info.name, link.file, link.path);
            return Ok(None);
        }
    }

    let label = match Label::parse(&info.label) {
        Some(label) if tree.kind(parent)?.allows(label) => label,
        _ => return Ok(None),
    };

    let mut scope = scope;
    let kind = match label {
        Label::Base => {
            let values = integers(store, node, &info.name)?;
            match values.as_slice() {
                [cell, phys] => EntityKind::Base(Base {
                    cell_dim: *cell as usize,
                    phys_dim: *phys as usize,
                }),
                _ => {
                    return Err(Error::invalid(format!(
                        "base `{}` has malformed dimensions",
                        info.name
                    )))
                }
            }
        }
        Label::Zone => {
            let index_dim = info.dims.first().copied().unwrap_or(1);
            let size = integers(store, node, &info.name)?
                .into_iter()
                .map(|n| {
                    usize::try_from(n).map_err(|_| {
                        Error::invalid(format!("zone `{}` has a negative size", info.name))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            if size.len() != 3 * index_dim {
                return Err(Error::invalid(format!("zone `{}` has malformed sizes", info.name)));
            }
            scope.index_dim = index_dim;
            EntityKind::Zone(Zone {
                zone_type: Session::stored_zone_type(store, node)?,
                index_dim,
                size,
            })
        }
        Label::Family => EntityKind::Family,
        Label::GridCoordinates => EntityKind::GridCoordinates(rind(store, node, scope)?),
        Label::Elements => EntityKind::Elements(Section::load(store, node)?),
        Label::FlowSolution | Label::DiscreteData => {
            let solution = Solution {
                location: location(store, node)?,
                rind: rind(store, node, scope)?,
                ptset: single_ptset(store, node, scope)?,
            };
            if label == Label::FlowSolution {
                EntityKind::FlowSolution(solution)
            } else {
                EntityKind::DiscreteData(solution)
            }
        }
        Label::DataArray => EntityKind::DataArray(ArrayField::load(store, node)?),
        Label::ZoneBC => EntityKind::ZoneBC,
        Label::BC => EntityKind::BC(Boco {
            bc_type: bc_type(store, node)?,
            location: location(store, node)?,
            ptset: single_ptset(store, node, scope)?,
        }),
        Label::BCDataSet => EntityKind::BCDataSet(BcDataSet {
            bc_type: bc_type(store, node)?,
            location: location(store, node)?,
            ptset: single_ptset(store, node, scope)?,
        }),
        Label::BCData => {
            match [BcDataType::Dirichlet, BcDataType::Neumann]
                .into_iter()
                .find(|t| t.node_name() == info.name)
            {
                Some(data_type) => EntityKind::BCData(data_type),
                None => {
                    log::debug!("skipping BC data `{}` of unknown kind", info.name);
                    return Ok(None);
                }
            }
        }
        Label::ZoneGridConnectivity => EntityKind::ZoneGridConnectivity,
        Label::OversetHoles => EntityKind::OversetHoles(Hole {
            location: location(store, node)?,
            sets: hole_sets(store, node, scope)?,
        }),
        Label::ZoneSubRegion => {
            let dimension = match integers(store, node, &info.name)?.as_slice() {
                [d] => *d as usize,
                _ => {
                    return Err(Error::invalid(format!(
                        "subregion `{}` has no dimension",
                        info.name
                    )))
                }
            };
            EntityKind::ZoneSubRegion(SubRegion {
                dimension,
                location: location(store, node)?,
                rind: rind(store, node, scope)?,
                ptset: single_ptset(store, node, scope)?,
            })
        }
        Label::UserDefinedData => EntityKind::UserDefinedData(UserData {
            location: location(store, node)?,
            ptset: single_ptset(store, node, scope)?,
        }),
        Label::Descriptor => {
            let text = store
                .read_all_data(node, DataType::Character)?
                .to_text()
                .unwrap_or_default();
            EntityKind::Descriptor(text)
        }
    };

    let handle = tree.insert(parent, &info.name, node, kind)?;
    load_children(store, tree, handle, node, scope)?;
    Ok(Some(handle))
}

/// integer payload of a node, in whatever integer type it is stored
fn integers(store: &dyn NodeStore, node: NodeId, name: &str) -> Result<Vec<i64>, Error> {
    let data_type = store
        .node_info(node)?
        .data_type
        .filter(DataType::is_integer)
        .ok_or_else(|| Error::invalid(format!("`{name}` does not hold integers")))?;
    store
        .read_all_data(node, data_type)?
        .to_indices()
        .ok_or_else(|| Error::invalid(format!("`{name}` does not hold integers")))
}

fn location(store: &dyn NodeStore, node: NodeId) -> Result<GridLocation, Error> {
    match read_text(store, node, GRID_LOCATION_NODE)? {
        Some(text) => Ok(GridLocation::parse(&text)?),
        None => Ok(GridLocation::Vertex),
    }
}

fn rind(store: &dyn NodeStore, node: NodeId, scope: Scope) -> Result<Rind, Error> {
    match read_integers(store, node, RIND_NODE)? {
        Some(values) => Rind::from_values(&values),
        None => Ok(Rind::none(scope.index_dim)),
    }
}

fn bc_type(store: &dyn NodeStore, node: NodeId) -> Result<BcType, Error> {
    let text = store
        .read_all_data(node, DataType::Character)?
        .to_text()
        .unwrap_or_default();
    Ok(BcType::parse(&text)?)
}

/// the `PointList` / `PointRange` style child of an entity
fn single_ptset(
    store: &dyn NodeStore,
    node: NodeId,
    scope: Scope,
) -> Result<Option<PointSet>, Error> {
    for child in store.children(node)? {
        let name = store.node_info(child)?.name;
        if let Ok(set_type) = PointSetType::parse(&name) {
            if set_type.is_list() || set_type.is_range() {
                return Ok(Some(ptset::load(store, child, set_type, scope.index_dim)?));
            }
        }
    }
    Ok(None)
}

/// every point set of a hole: a `PointList` or `PointRange1`, `PointRange2`, ...
fn hole_sets(store: &dyn NodeStore, node: NodeId, scope: Scope) -> Result<Vec<PointSet>, Error> {
    let mut sets = Vec::new();
    for child in store.children(node)? {
        let name = store.node_info(child)?.name;
        let set_type = match name.strip_prefix("PointRange") {
            Some(suffix) if suffix.is_empty() || suffix.parse::<usize>().is_ok() => {
                PointSetType::PointRange
            }
            _ if name == "PointList" => PointSetType::PointList,
            _ => continue,
        };
        sets.push(ptset::load(store, child, set_type, scope.index_dim)?);
    }
    Ok(sets)
}

impl Session {
    /// mirror a freshly linked node below `parent` into the tree
    pub(crate) fn mirror_node(&mut self, parent: Handle, node: NodeId) -> Result<(), Error> {
        let index_dim = match self.zone_above(parent) {
            Ok(zone) => self.zone(zone)?.index_dim,
            Err(_) => 1,
        };
        match load_entity(self.store.as_ref(), &mut self.tree, parent, node, Scope { index_dim })? {
            Some(handle) => log::debug!("linked `{}` into the tree", self.tree.get(handle)?.name()),
            None => log::debug!("link target of node {node} is not navigable here"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileType;
    use crate::names::ZoneType;
    use crate::store::MemoryStore;

    #[test]
    fn files_without_version_are_refused() {
        let store = MemoryStore::diskless(FileType::Ascii);
        assert!(matches!(rebuild(&store), Err(Error::Invalid(_))));
    }

    #[test]
    fn newer_files_are_refused() {
        let mut store = MemoryStore::diskless(FileType::Ascii);
        let root = store.root_id();
        let node = store
            .create_node(root, VERSION_NODE, "CGNSLibraryVersion_t")
            .unwrap();
        store
            .set_dimensions(node, DataType::RealSingle, &[1])
            .unwrap();
        store
            .write_all_data(node, &DataBuffer::RealSingle(vec![9.0]))
            .unwrap();
        assert!(matches!(rebuild(&store), Err(Error::Version { .. })));
    }

    #[test]
    fn unknown_labels_are_not_navigable() {
        let mut session = Session::diskless(Config::new().with_file_type(FileType::Ascii)).unwrap();
        let b = session.base_write("Base", 3, 3).unwrap();
        let z = session
            .zone_write(b, "Block", &[3, 3, 3, 2, 2, 2, 0, 0, 0], ZoneType::Structured)
            .unwrap();
        session
            .sol_write(b, z, "Flow", GridLocation::CellCenter)
            .unwrap();
        session.goto(b, &[("Zone_t", z)]).unwrap();
        session.descriptor_write("Note", "kept").unwrap();

        let root = session.store.root_id();
        let base_node = session.store.node_id(root, "Base").unwrap();
        session.store
            .create_node(base_node, "Odd", "SomethingElse_t")
            .unwrap();

        let (tree, version) = rebuild(session.store.as_ref()).unwrap();
        assert_eq!(version, LIBRARY_VERSION);
        let base = tree
            .child_by_label(tree.root(), Label::Base, 1)
            .unwrap()
            .unwrap();
        assert_eq!(tree.children(base).unwrap().len(), 1);

        let zone = tree.child_named(base, "Block").unwrap().unwrap();
        let flow = tree.child_named(zone, "Flow").unwrap().unwrap();
        assert_eq!(tree.kind(flow).unwrap().location(), Some(GridLocation::CellCenter));
        let note = tree.child_named(zone, "Note").unwrap().unwrap();
        assert_eq!(tree.kind(note).unwrap(), &EntityKind::Descriptor("kept".to_string()));
    }
}
