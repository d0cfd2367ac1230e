//! In-memory mirror of the node tree.
//!
//! Entities live in an arena of slots. A [`Handle`] is an index into that arena plus the
//! generation of the slot when the entity was inserted; removing an entity bumps the
//! generation, so handles to removed entities are detected instead of silently pointing at
//! whatever reuses the slot later.

use crate::names::{BcDataType, BcType, GridLocation, ZoneType};
use crate::prelude::*;
use crate::ptset::PointSet;
use crate::section::Section;
use crate::transfer::{ArrayField, Rind};

use std::collections::HashMap;
use std::fmt;

/// stable reference to an entity of an [`EntityTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

/// type labels of the entities that can be navigated to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Base,
    Zone,
    Family,
    GridCoordinates,
    Elements,
    FlowSolution,
    DiscreteData,
    DataArray,
    ZoneBC,
    BC,
    BCDataSet,
    BCData,
    ZoneGridConnectivity,
    OversetHoles,
    ZoneSubRegion,
    UserDefinedData,
    Descriptor,
}

impl Label {
    pub const ALL: [Label; 17] = [
        Label::Base,
        Label::Zone,
        Label::Family,
        Label::GridCoordinates,
        Label::Elements,
        Label::FlowSolution,
        Label::DiscreteData,
        Label::DataArray,
        Label::ZoneBC,
        Label::BC,
        Label::BCDataSet,
        Label::BCData,
        Label::ZoneGridConnectivity,
        Label::OversetHoles,
        Label::ZoneSubRegion,
        Label::UserDefinedData,
        Label::Descriptor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Base => "CGNSBase_t",
            Label::Zone => "Zone_t",
            Label::Family => "Family_t",
            Label::GridCoordinates => "GridCoordinates_t",
            Label::Elements => "Elements_t",
            Label::FlowSolution => "FlowSolution_t",
            Label::DiscreteData => "DiscreteData_t",
            Label::DataArray => "DataArray_t",
            Label::ZoneBC => "ZoneBC_t",
            Label::BC => "BC_t",
            Label::BCDataSet => "BCDataSet_t",
            Label::BCData => "BCData_t",
            Label::ZoneGridConnectivity => "ZoneGridConnectivity_t",
            Label::OversetHoles => "OversetHoles_t",
            Label::ZoneSubRegion => "ZoneSubRegion_t",
            Label::UserDefinedData => "UserDefinedData_t",
            Label::Descriptor => "Descriptor_t",
        }
    }

    pub fn parse(label: &str) -> Option<Label> {
        Self::ALL.iter().copied().find(|l| l.as_str() == label)
    }

    /// labels of the entities that may appear directly below an entity of this label
    pub fn allowed_children(&self) -> &'static [Label] {
        use Label::*;
        match self {
            Base => &[Zone, Family, UserDefinedData, Descriptor],
            Zone => &[
                GridCoordinates,
                Elements,
                FlowSolution,
                DiscreteData,
                ZoneBC,
                ZoneGridConnectivity,
                ZoneSubRegion,
                UserDefinedData,
                Descriptor,
            ],
            Family | Elements | OversetHoles => &[UserDefinedData, Descriptor],
            GridCoordinates | FlowSolution | DiscreteData | BCData | ZoneSubRegion
            | UserDefinedData => &[DataArray, UserDefinedData, Descriptor],
            DataArray => &[Descriptor],
            ZoneBC => &[BC, UserDefinedData, Descriptor],
            BC => &[BCDataSet, UserDefinedData, Descriptor],
            BCDataSet => &[BCData, UserDefinedData, Descriptor],
            ZoneGridConnectivity => &[OversetHoles, UserDefinedData, Descriptor],
            Descriptor => &[],
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Base {
    pub(crate) cell_dim: usize,
    pub(crate) phys_dim: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Zone {
    pub(crate) zone_type: ZoneType,
    pub(crate) index_dim: usize,
    /// `[vertex, cell, boundary vertex]` counts, `index_dim` values each
    pub(crate) size: Vec<usize>,
}

impl Zone {
    pub(crate) fn vertex_size(&self) -> &[usize] {
        &self.size[..self.index_dim]
    }

    pub(crate) fn cell_size(&self) -> &[usize] {
        &self.size[self.index_dim..2 * self.index_dim]
    }
}

/// flow solutions and discrete data
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Solution {
    pub(crate) location: GridLocation,
    pub(crate) rind: Rind,
    pub(crate) ptset: Option<PointSet>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Boco {
    pub(crate) bc_type: BcType,
    pub(crate) location: GridLocation,
    pub(crate) ptset: Option<PointSet>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BcDataSet {
    pub(crate) bc_type: BcType,
    pub(crate) location: GridLocation,
    pub(crate) ptset: Option<PointSet>,
}

/// overset holes, either one point list or any number of point ranges
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Hole {
    pub(crate) location: GridLocation,
    pub(crate) sets: Vec<PointSet>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SubRegion {
    pub(crate) dimension: usize,
    pub(crate) location: GridLocation,
    pub(crate) rind: Rind,
    pub(crate) ptset: Option<PointSet>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct UserData {
    pub(crate) location: GridLocation,
    pub(crate) ptset: Option<PointSet>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum EntityKind {
    Root,
    Base(Base),
    Zone(Zone),
    Family,
    GridCoordinates(Rind),
    Elements(Section),
    FlowSolution(Solution),
    DiscreteData(Solution),
    DataArray(ArrayField),
    ZoneBC,
    BC(Boco),
    BCDataSet(BcDataSet),
    BCData(BcDataType),
    ZoneGridConnectivity,
    OversetHoles(Hole),
    ZoneSubRegion(SubRegion),
    UserDefinedData(UserData),
    Descriptor(String),
}

impl EntityKind {
    /// `None` only for the file root
    pub(crate) fn label(&self) -> Option<Label> {
        let label = match self {
            EntityKind::Root => return None,
            EntityKind::Base(_) => Label::Base,
            EntityKind::Zone(_) => Label::Zone,
            EntityKind::Family => Label::Family,
            EntityKind::GridCoordinates(_) => Label::GridCoordinates,
            EntityKind::Elements(_) => Label::Elements,
            EntityKind::FlowSolution(_) => Label::FlowSolution,
            EntityKind::DiscreteData(_) => Label::DiscreteData,
            EntityKind::DataArray(_) => Label::DataArray,
            EntityKind::ZoneBC => Label::ZoneBC,
            EntityKind::BC(_) => Label::BC,
            EntityKind::BCDataSet(_) => Label::BCDataSet,
            EntityKind::BCData(_) => Label::BCData,
            EntityKind::ZoneGridConnectivity => Label::ZoneGridConnectivity,
            EntityKind::OversetHoles(_) => Label::OversetHoles,
            EntityKind::ZoneSubRegion(_) => Label::ZoneSubRegion,
            EntityKind::UserDefinedData(_) => Label::UserDefinedData,
            EntityKind::Descriptor(_) => Label::Descriptor,
        };
        Some(label)
    }

    pub(crate) fn allows(&self, child: Label) -> bool {
        match self.label() {
            None => child == Label::Base,
            Some(label) => label.allowed_children().contains(&child),
        }
    }

    /// rind planes of entities that carry them
    pub(crate) fn rind(&self) -> Option<&Rind> {
        match self {
            EntityKind::GridCoordinates(rind) => Some(rind),
            EntityKind::FlowSolution(sol) | EntityKind::DiscreteData(sol) => Some(&sol.rind),
            EntityKind::ZoneSubRegion(sub) => Some(&sub.rind),
            _ => None,
        }
    }

    pub(crate) fn rind_mut(&mut self) -> Option<&mut Rind> {
        match self {
            EntityKind::GridCoordinates(rind) => Some(rind),
            EntityKind::FlowSolution(sol) | EntityKind::DiscreteData(sol) => Some(&mut sol.rind),
            EntityKind::ZoneSubRegion(sub) => Some(&mut sub.rind),
            _ => None,
        }
    }

    pub(crate) fn location(&self) -> Option<GridLocation> {
        match self {
            EntityKind::FlowSolution(sol) | EntityKind::DiscreteData(sol) => Some(sol.location),
            EntityKind::BC(boco) => Some(boco.location),
            EntityKind::BCDataSet(set) => Some(set.location),
            EntityKind::OversetHoles(hole) => Some(hole.location),
            EntityKind::ZoneSubRegion(sub) => Some(sub.location),
            EntityKind::UserDefinedData(user) => Some(user.location),
            _ => None,
        }
    }

    pub(crate) fn location_mut(&mut self) -> Option<&mut GridLocation> {
        match self {
            EntityKind::FlowSolution(sol) | EntityKind::DiscreteData(sol) => {
                Some(&mut sol.location)
            }
            EntityKind::BC(boco) => Some(&mut boco.location),
            EntityKind::BCDataSet(set) => Some(&mut set.location),
            EntityKind::OversetHoles(hole) => Some(&mut hole.location),
            EntityKind::ZoneSubRegion(sub) => Some(&mut sub.location),
            EntityKind::UserDefinedData(user) => Some(&mut user.location),
            _ => None,
        }
    }

    /// `None` when the entity cannot carry a single point set
    pub(crate) fn ptset(&self) -> Option<Option<&PointSet>> {
        match self {
            EntityKind::FlowSolution(sol) | EntityKind::DiscreteData(sol) => {
                Some(sol.ptset.as_ref())
            }
            EntityKind::BC(boco) => Some(boco.ptset.as_ref()),
            EntityKind::BCDataSet(set) => Some(set.ptset.as_ref()),
            EntityKind::ZoneSubRegion(sub) => Some(sub.ptset.as_ref()),
            EntityKind::UserDefinedData(user) => Some(user.ptset.as_ref()),
            _ => None,
        }
    }

    /// single point set of entities addressed through one
    pub(crate) fn ptset_mut(&mut self) -> Option<&mut Option<PointSet>> {
        match self {
            EntityKind::FlowSolution(sol) | EntityKind::DiscreteData(sol) => Some(&mut sol.ptset),
            EntityKind::BC(boco) => Some(&mut boco.ptset),
            EntityKind::BCDataSet(set) => Some(&mut set.ptset),
            EntityKind::ZoneSubRegion(sub) => Some(&mut sub.ptset),
            EntityKind::UserDefinedData(user) => Some(&mut user.ptset),
            _ => None,
        }
    }
}

/// ordered children of a container with O(1) lookup by name
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct NamedChildren {
    order: Vec<Handle>,
    names: HashMap<String, usize>,
}

impl NamedChildren {
    pub(crate) fn get(&self, name: &str) -> Option<Handle> {
        self.names.get(name).map(|position| self.order[*position])
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// append a child, refusing duplicate names
    pub(crate) fn insert(&mut self, name: &str, handle: Handle) -> bool {
        if self.contains(name) {
            return false;
        }
        self.names.insert(name.to_string(), self.order.len());
        self.order.push(handle);
        true
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<Handle> {
        let position = self.names.remove(name)?;
        let handle = self.order.remove(position);
        self.names
            .values_mut()
            .filter(|p| **p > position)
            .for_each(|p| *p -= 1);
        Some(handle)
    }

    pub(crate) fn as_slice(&self) -> &[Handle] {
        &self.order
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub(crate) name: String,
    pub(crate) node: NodeId,
    pub(crate) parent: Option<Handle>,
    pub(crate) kind: EntityKind,
    pub(crate) children: NamedChildren,
}

impl Entity {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn label(&self) -> Option<Label> {
        self.kind.label()
    }

    pub fn parent(&self) -> Option<Handle> {
        self.parent
    }

    pub fn children(&self) -> &[Handle] {
        self.children.as_slice()
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    entity: Option<Entity>,
}

#[derive(Debug, Clone)]
pub struct EntityTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl EntityTree {
    pub(crate) fn new(root_node: NodeId) -> Self {
        let root = Entity {
            name: String::new(),
            node: root_node,
            parent: None,
            kind: EntityKind::Root,
            children: NamedChildren::default(),
        };
        Self {
            slots: vec![Slot {
                generation: 0,
                entity: Some(root),
            }],
            free: Vec::new(),
        }
    }

    pub fn root(&self) -> Handle {
        Handle {
            index: 0,
            generation: 0,
        }
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_ok()
    }

    pub fn get(&self, handle: Handle) -> Result<&Entity, Error> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entity.as_ref())
            .ok_or(Error::InvalidHandle)
    }

    pub(crate) fn get_mut(&mut self, handle: Handle) -> Result<&mut Entity, Error> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entity.as_mut())
            .ok_or(Error::InvalidHandle)
    }

    pub(crate) fn kind(&self, handle: Handle) -> Result<&EntityKind, Error> {
        Ok(&self.get(handle)?.kind)
    }

    pub(crate) fn kind_mut(&mut self, handle: Handle) -> Result<&mut EntityKind, Error> {
        Ok(&mut self.get_mut(handle)?.kind)
    }

    /// add an entity below `parent`. Fails on a duplicate name or a label that is not
    /// allowed below the parent
    pub(crate) fn insert(
        &mut self,
        parent: Handle,
        name: &str,
        node: NodeId,
        kind: EntityKind,
    ) -> Result<Handle, Error> {
        let label = kind
            .label()
            .ok_or_else(|| Error::internal("a second file root cannot be inserted"))?;

        let parent_entity = self.get(parent)?;
        if !parent_entity.kind.allows(label) {
            return Err(Error::invalid(format!(
                "{label} is not allowed below `{}`",
                parent_entity.name
            )));
        }
        if parent_entity.children.contains(name) {
            return Err(Error::invalid(format!(
                "`{}` already has a child named `{name}`",
                parent_entity.name
            )));
        }

        let entity = Entity {
            name: name.to_string(),
            node,
            parent: Some(parent),
            kind,
            children: NamedChildren::default(),
        };

        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entity = Some(entity);
                Handle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = u32::try_from(self.slots.len())
                    .map_err(|_| Error::Overflow("the entity arena".into()))?;
                self.slots.push(Slot {
                    generation: 0,
                    entity: Some(entity),
                });
                Handle {
                    index,
                    generation: 0,
                }
            }
        };

        self.get_mut(parent)?.children.insert(name, handle);
        Ok(handle)
    }

    /// remove an entity and its whole subtree. Every handle into the subtree becomes stale
    pub(crate) fn remove(&mut self, handle: Handle) -> Result<(), Error> {
        let entity = self.get(handle)?;
        let parent = entity
            .parent
            .ok_or_else(|| Error::invalid("the file root cannot be removed"))?;
        let name = entity.name.clone();
        self.get_mut(parent)?.children.remove(&name);

        let mut pending = vec![handle];
        while let Some(current) = pending.pop() {
            if let Some(slot) = self.slots.get_mut(current.index as usize) {
                if slot.generation != current.generation {
                    continue;
                }
                if let Some(entity) = slot.entity.take() {
                    pending.extend_from_slice(entity.children.as_slice());
                    slot.generation = slot.generation.wrapping_add(1);
                    self.free.push(current.index);
                }
            }
        }

        Ok(())
    }

    pub fn children(&self, handle: Handle) -> Result<&[Handle], Error> {
        Ok(self.get(handle)?.children.as_slice())
    }

    pub fn children_with_label(&self, handle: Handle, label: Label) -> Result<Vec<Handle>, Error> {
        let mut out = Vec::new();
        for child in self.children(handle)? {
            if self.get(*child)?.label() == Some(label) {
                out.push(*child);
            }
        }
        Ok(out)
    }

    /// the `index`-th (1-based) child carrying `label`
    pub fn child_by_label(
        &self,
        handle: Handle,
        label: Label,
        index: usize,
    ) -> Result<Option<Handle>, Error> {
        if index == 0 {
            return Ok(None);
        }
        Ok(self.children_with_label(handle, label)?.get(index - 1).copied())
    }

    pub fn child_named(&self, handle: Handle, name: &str) -> Result<Option<Handle>, Error> {
        Ok(self.get(handle)?.children.get(name))
    }

    pub fn count(&self, handle: Handle, label: Label) -> Result<usize, Error> {
        Ok(self.children_with_label(handle, label)?.len())
    }

    /// 1-based position of an entity among its siblings of the same label
    pub(crate) fn ordinal(&self, handle: Handle) -> Result<usize, Error> {
        let entity = self.get(handle)?;
        let (parent, label) = match (entity.parent, entity.label()) {
            (Some(parent), Some(label)) => (parent, label),
            _ => return Err(Error::invalid("the file root has no ordinal")),
        };
        self.children_with_label(parent, label)?
            .iter()
            .position(|h| *h == handle)
            .map(|p| p + 1)
            .ok_or_else(|| Error::internal("entity missing from its parent"))
    }

    /// number of live entities, the root included
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.entity.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_data() -> EntityKind {
        EntityKind::UserDefinedData(UserData {
            location: GridLocation::Vertex,
            ptset: None,
        })
    }

    fn base() -> EntityKind {
        EntityKind::Base(Base {
            cell_dim: 3,
            phys_dim: 3,
        })
    }

    #[test]
    fn insert_and_lookup() {
        let mut tree = EntityTree::new(NodeId(0));
        let root = tree.root();
        let b1 = tree.insert(root, "B1", NodeId(1), base()).unwrap();
        let b2 = tree.insert(root, "B2", NodeId(2), base()).unwrap();

        assert_eq!(tree.child_by_label(root, Label::Base, 2).unwrap(), Some(b2));
        assert_eq!(tree.child_named(root, "B1").unwrap(), Some(b1));
        assert_eq!(tree.ordinal(b2).unwrap(), 2);
        assert_eq!(tree.count(root, Label::Base).unwrap(), 2);
        assert_eq!(tree.child_by_label(root, Label::Base, 3).unwrap(), None);
    }

    #[test]
    fn duplicates_and_misplaced_labels_are_rejected() {
        let mut tree = EntityTree::new(NodeId(0));
        let root = tree.root();
        tree.insert(root, "B", NodeId(1), base()).unwrap();
        assert!(tree.insert(root, "B", NodeId(2), base()).is_err());
        assert!(tree.insert(root, "U", NodeId(3), user_data()).is_err());
    }

    #[test]
    fn removal_makes_handles_stale() {
        let mut tree = EntityTree::new(NodeId(0));
        let root = tree.root();
        let b = tree.insert(root, "B", NodeId(1), base()).unwrap();
        let u = tree.insert(b, "U", NodeId(2), user_data()).unwrap();
        let nested = tree.insert(u, "V", NodeId(3), user_data()).unwrap();

        tree.remove(u).unwrap();
        assert!(matches!(tree.get(u), Err(Error::InvalidHandle)));
        assert!(matches!(tree.get(nested), Err(Error::InvalidHandle)));
        assert!(tree.children(b).unwrap().is_empty());

        // the slot is reused under a new generation
        let w = tree.insert(b, "W", NodeId(4), user_data()).unwrap();
        assert_ne!(w, u);
        assert_ne!(w, nested);
        assert!(!tree.contains(u));
        assert_eq!(tree.get(w).unwrap().name(), "W");
    }

    #[test]
    fn named_children_keep_order_after_removal() {
        let mut tree = EntityTree::new(NodeId(0));
        let root = tree.root();
        let a = tree.insert(root, "A", NodeId(1), base()).unwrap();
        let b = tree.insert(root, "B", NodeId(2), base()).unwrap();
        let c = tree.insert(root, "C", NodeId(3), base()).unwrap();

        tree.remove(a).unwrap();
        assert_eq!(tree.children(root).unwrap(), &[b, c]);
        assert_eq!(tree.child_named(root, "C").unwrap(), Some(c));
        assert_eq!(tree.ordinal(c).unwrap(), 2);
    }

    #[test]
    fn labels_parse() {
        for label in Label::ALL {
            assert_eq!(Label::parse(label.as_str()), Some(label));
        }
        assert_eq!(Label::parse("Zone"), None);
    }
}
