//! Boundary conditions, overset holes and zone subregions: entities addressing part of a
//! zone through point sets.

use super::{write_text, Session, GRID_LOCATION_NODE};
use crate::array::{DataBuffer, DataType};
use crate::names::{BcDataType, BcType, GridLocation, PointSetType};
use crate::prelude::*;
use crate::ptset::{self, PointSet};
use crate::transfer::Rind;
use crate::tree::{BcDataSet, Boco, EntityKind, Handle, Hole, Label, SubRegion};

pub(crate) const ZONE_BC_NODE: &str = "ZoneBC";
pub(crate) const ZONE_CONNECTIVITY_NODE: &str = "ZoneGridConnectivity";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BocoInfo {
    pub name: String,
    pub bc_type: BcType,
    pub set_type: PointSetType,
    pub npts: usize,
    pub location: GridLocation,
    pub ndatasets: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoleInfo {
    pub name: String,
    pub location: GridLocation,
    pub set_type: PointSetType,
    /// number of point sets, above 1 only for holes made of several ranges
    pub nsets: usize,
    /// points over all sets
    pub npts: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubRegionInfo {
    pub name: String,
    pub dimension: usize,
    pub location: GridLocation,
    pub set_type: PointSetType,
    pub npts: usize,
}

/// number of values per point of a set
fn values_per_point(set_type: PointSetType, index_dim: usize) -> usize {
    match set_type {
        PointSetType::ElementList | PointSetType::ElementRange => 1,
        _ => index_dim,
    }
}

fn require_set(ptset: Option<&PointSet>, name: &str) -> Result<PointSet, Error> {
    ptset
        .cloned()
        .ok_or_else(|| Error::invalid(format!("`{name}` has no point set")))
}

impl Session {
    /// the first container of `label` below a zone
    fn zone_container(&self, zone: Handle, label: Label) -> Result<Option<Handle>, Error> {
        Ok(self.tree.children_with_label(zone, label)?.first().copied())
    }

    fn zone_container_for_write(
        &mut self,
        zone: Handle,
        label: Label,
        name: &str,
    ) -> Result<Handle, Error> {
        match self.zone_container(zone, label)? {
            Some(handle) => Ok(handle),
            None => self.create_entity(zone, name, label, |_, _| match label {
                Label::ZoneBC => Ok(EntityKind::ZoneBC),
                _ => Ok(EntityKind::ZoneGridConnectivity),
            }),
        }
    }

    fn boco_handle(&self, base: usize, zone: usize, boco: usize) -> Result<Handle, Error> {
        let zone = self.zone_handle(base, zone)?;
        let zbc = self
            .zone_container(zone, Label::ZoneBC)?
            .ok_or_else(|| Error::not_found("boundary condition", boco))?;
        self.nth(zbc, Label::BC, boco, "boundary condition")
    }

    fn boco(&self, handle: Handle) -> Result<&Boco, Error> {
        match self.tree.kind(handle)? {
            EntityKind::BC(boco) => Ok(boco),
            _ => Err(Error::internal("handle does not refer to a boundary condition")),
        }
    }

    /// add a boundary condition applied to the points of a point set
    pub fn boco_write(
        &mut self,
        base: usize,
        zone: usize,
        name: &str,
        bc_type: BcType,
        set_type: PointSetType,
        points: &[i64],
    ) -> Result<usize, Error> {
        reported!(self, {
            self.writable("write a boundary condition")?;
            let zone = self.zone_handle(base, zone)?;
            let index_dim = self.zone(zone)?.index_dim;
            let npts = points.len() / values_per_point(set_type, index_dim);
            ptset::validate(set_type, index_dim, npts, points.len(), 1, false)?;

            let zbc = self.zone_container_for_write(zone, Label::ZoneBC, ZONE_BC_NODE)?;
            let index_type = self.index_type();
            let handle = self.create_entity(zbc, name, Label::BC, |store, node| {
                store.set_dimensions(node, DataType::Character, &[bc_type.as_str().len()])?;
                store.write_all_data(node, &DataBuffer::from_text(bc_type.as_str()))?;
                let set = ptset::write(
                    store,
                    node,
                    set_type.as_str(),
                    set_type,
                    index_dim,
                    points,
                    index_type,
                )?;
                Ok(EntityKind::BC(Boco {
                    bc_type,
                    location: GridLocation::Vertex,
                    ptset: Some(set),
                }))
            })?;
            self.tree.ordinal(handle)
        })
    }

    pub fn nbocos(&self, base: usize, zone: usize) -> Result<usize, Error> {
        reported!(self, {
            let zone = self.zone_handle(base, zone)?;
            match self.zone_container(zone, Label::ZoneBC)? {
                Some(zbc) => self.tree.count(zbc, Label::BC),
                None => Ok(0),
            }
        })
    }

    pub fn boco_info(&self, base: usize, zone: usize, boco: usize) -> Result<BocoInfo, Error> {
        reported!(self, {
            let handle = self.boco_handle(base, zone, boco)?;
            let name = self.tree.get(handle)?.name().to_string();
            let bc = self.boco(handle)?;
            let set = require_set(bc.ptset.as_ref(), &name)?;
            Ok(BocoInfo {
                bc_type: bc.bc_type,
                set_type: set.set_type(),
                npts: set.npts(),
                location: bc.location,
                ndatasets: self.tree.count(handle, Label::BCDataSet)?,
                name,
            })
        })
    }

    /// the points of a boundary condition
    pub fn boco_read(&self, base: usize, zone: usize, boco: usize) -> Result<Vec<i64>, Error> {
        reported!(self, {
            let handle = self.boco_handle(base, zone, boco)?;
            let name = self.tree.get(handle)?.name();
            let set = require_set(self.boco(handle)?.ptset.as_ref(), name)?;
            ptset::read(self.store.as_ref(), &set)
        })
    }

    /// add a data set to a boundary condition
    pub fn bc_dataset_write(
        &mut self,
        base: usize,
        zone: usize,
        boco: usize,
        name: &str,
        bc_type: BcType,
    ) -> Result<usize, Error> {
        reported!(self, {
            self.writable("write a BC data set")?;
            let bc = self.boco_handle(base, zone, boco)?;
            let handle = self.create_entity(bc, name, Label::BCDataSet, |store, node| {
                store.set_dimensions(node, DataType::Character, &[bc_type.as_str().len()])?;
                store.write_all_data(node, &DataBuffer::from_text(bc_type.as_str()))?;
                Ok(EntityKind::BCDataSet(BcDataSet {
                    bc_type,
                    location: GridLocation::Vertex,
                    ptset: None,
                }))
            })?;
            self.tree.ordinal(handle)
        })
    }

    pub fn nbc_datasets(&self, base: usize, zone: usize, boco: usize) -> Result<usize, Error> {
        reported!(self, {
            let bc = self.boco_handle(base, zone, boco)?;
            self.tree.count(bc, Label::BCDataSet)
        })
    }

    /// add the Dirichlet or Neumann data container to a data set. It is addressed by its kind
    /// when navigating, not by its position
    pub fn bc_data_write(
        &mut self,
        base: usize,
        zone: usize,
        boco: usize,
        dataset: usize,
        data_type: BcDataType,
    ) -> Result<(), Error> {
        reported!(self, {
            self.writable("write BC data")?;
            let bc = self.boco_handle(base, zone, boco)?;
            let set = self.nth(bc, Label::BCDataSet, dataset, "BC data set")?;
            self.create_entity(set, data_type.node_name(), Label::BCData, |_, _| {
                Ok(EntityKind::BCData(data_type))
            })?;
            Ok(())
        })
    }

    fn hole_handle(&self, base: usize, zone: usize, hole: usize) -> Result<Handle, Error> {
        let zone = self.zone_handle(base, zone)?;
        let zgc = self
            .zone_container(zone, Label::ZoneGridConnectivity)?
            .ok_or_else(|| Error::not_found("hole", hole))?;
        self.nth(zgc, Label::OversetHoles, hole, "hole")
    }

    fn hole(&self, handle: Handle) -> Result<&Hole, Error> {
        match self.tree.kind(handle)? {
            EntityKind::OversetHoles(hole) => Ok(hole),
            _ => Err(Error::internal("handle does not refer to a hole")),
        }
    }

    /// add an overset hole. A point list is a single set; ranges may come as `nsets`
    /// consecutive corner pairs, each stored as its own `PointRangeN` node
    #[allow(clippy::too_many_arguments)]
    pub fn hole_write(
        &mut self,
        base: usize,
        zone: usize,
        name: &str,
        location: GridLocation,
        set_type: PointSetType,
        nsets: usize,
        points: &[i64],
    ) -> Result<usize, Error> {
        reported!(self, {
            self.writable("write a hole")?;
            let zone = self.zone_handle(base, zone)?;
            let index_dim = self.zone(zone)?.index_dim;
            match set_type {
                PointSetType::PointList if nsets == 1 => {}
                PointSetType::PointRange if nsets >= 1 => {}
                _ => {
                    return Err(Error::invalid(format!(
                        "holes are one point list or point ranges, not {nsets} {set_type} sets"
                    )))
                }
            }
            let npts = points.len() / index_dim;
            ptset::validate(set_type, index_dim, npts, points.len(), nsets, false)?;

            let zgc = self.zone_container_for_write(
                zone,
                Label::ZoneGridConnectivity,
                ZONE_CONNECTIVITY_NODE,
            )?;
            let index_type = self.index_type();
            let handle = self.create_entity(zgc, name, Label::OversetHoles, |store, node| {
                if location != GridLocation::Vertex {
                    let text = location.as_str();
                    write_text(store, node, GRID_LOCATION_NODE, "GridLocation_t", text)?;
                }
                let sets = match set_type {
                    PointSetType::PointRange => {
                        ptset::write_range_sets(store, node, index_dim, points, index_type)?
                    }
                    _ => vec![ptset::write(
                        store,
                        node,
                        set_type.as_str(),
                        set_type,
                        index_dim,
                        points,
                        index_type,
                    )?],
                };
                Ok(EntityKind::OversetHoles(Hole { location, sets }))
            })?;
            log::debug!("wrote hole `{name}` with {nsets} {set_type} set(s)");
            self.tree.ordinal(handle)
        })
    }

    pub fn nholes(&self, base: usize, zone: usize) -> Result<usize, Error> {
        reported!(self, {
            let zone = self.zone_handle(base, zone)?;
            match self.zone_container(zone, Label::ZoneGridConnectivity)? {
                Some(zgc) => self.tree.count(zgc, Label::OversetHoles),
                None => Ok(0),
            }
        })
    }

    pub fn hole_info(&self, base: usize, zone: usize, hole: usize) -> Result<HoleInfo, Error> {
        reported!(self, {
            let handle = self.hole_handle(base, zone, hole)?;
            let h = self.hole(handle)?;
            let set_type = h
                .sets
                .first()
                .map(PointSet::set_type)
                .unwrap_or(PointSetType::PointList);
            Ok(HoleInfo {
                name: self.tree.get(handle)?.name().to_string(),
                location: h.location,
                set_type,
                nsets: h.sets.len(),
                npts: h.sets.iter().map(PointSet::npts).sum(),
            })
        })
    }

    /// the points of every set of a hole, one set after the other
    pub fn hole_read(&self, base: usize, zone: usize, hole: usize) -> Result<Vec<i64>, Error> {
        reported!(self, {
            let handle = self.hole_handle(base, zone, hole)?;
            let mut points = Vec::new();
            for set in &self.hole(handle)?.sets {
                points.extend(ptset::read(self.store.as_ref(), set)?);
            }
            Ok(points)
        })
    }

    fn subreg_handle(&self, base: usize, zone: usize, subreg: usize) -> Result<Handle, Error> {
        let zone = self.zone_handle(base, zone)?;
        self.nth(zone, Label::ZoneSubRegion, subreg, "subregion")
    }

    fn subregion(&self, handle: Handle) -> Result<&SubRegion, Error> {
        match self.tree.kind(handle)? {
            EntityKind::ZoneSubRegion(sub) => Ok(sub),
            _ => Err(Error::internal("handle does not refer to a subregion")),
        }
    }

    /// add a subregion of `dimension` made of the points of a point set
    #[allow(clippy::too_many_arguments)]
    pub fn subreg_ptset_write(
        &mut self,
        base: usize,
        zone: usize,
        name: &str,
        dimension: usize,
        location: GridLocation,
        set_type: PointSetType,
        points: &[i64],
    ) -> Result<usize, Error> {
        reported!(self, {
            self.writable("write a subregion")?;
            let cell_dim = match self.tree.kind(self.base_handle(base)?)? {
                EntityKind::Base(b) => b.cell_dim,
                _ => return Err(Error::internal("base handle points elsewhere")),
            };
            if dimension < 1 || dimension > cell_dim {
                return Err(Error::invalid(format!(
                    "subregion dimension {dimension} is outside [1, {cell_dim}]"
                )));
            }
            let zone = self.zone_handle(base, zone)?;
            let index_dim = self.zone(zone)?.index_dim;
            let npts = points.len() / values_per_point(set_type, index_dim);
            ptset::validate(set_type, index_dim, npts, points.len(), 1, false)?;

            let index_type = self.index_type();
            let handle = self.create_entity(zone, name, Label::ZoneSubRegion, |store, node| {
                store.set_dimensions(node, DataType::Integer, &[1])?;
                store.write_all_data(node, &DataBuffer::Integer(vec![dimension as i32]))?;
                if location != GridLocation::Vertex {
                    let text = location.as_str();
                    write_text(store, node, GRID_LOCATION_NODE, "GridLocation_t", text)?;
                }
                let set = ptset::write(
                    store,
                    node,
                    set_type.as_str(),
                    set_type,
                    index_dim,
                    points,
                    index_type,
                )?;
                Ok(EntityKind::ZoneSubRegion(SubRegion {
                    dimension,
                    location,
                    rind: Rind::none(index_dim),
                    ptset: Some(set),
                }))
            })?;
            self.tree.ordinal(handle)
        })
    }

    pub fn nsubregs(&self, base: usize, zone: usize) -> Result<usize, Error> {
        reported!(self, {
            let zone = self.zone_handle(base, zone)?;
            self.tree.count(zone, Label::ZoneSubRegion)
        })
    }

    pub fn subreg_info(
        &self,
        base: usize,
        zone: usize,
        subreg: usize,
    ) -> Result<SubRegionInfo, Error> {
        reported!(self, {
            let handle = self.subreg_handle(base, zone, subreg)?;
            let name = self.tree.get(handle)?.name().to_string();
            let sub = self.subregion(handle)?;
            let set = require_set(sub.ptset.as_ref(), &name)?;
            Ok(SubRegionInfo {
                name,
                dimension: sub.dimension,
                location: sub.location,
                set_type: set.set_type(),
                npts: set.npts(),
            })
        })
    }

    pub fn subreg_ptset_read(
        &self,
        base: usize,
        zone: usize,
        subreg: usize,
    ) -> Result<Vec<i64>, Error> {
        reported!(self, {
            let handle = self.subreg_handle(base, zone, subreg)?;
            let name = self.tree.get(handle)?.name();
            let set = require_set(self.subregion(handle)?.ptset.as_ref(), name)?;
            ptset::read(self.store.as_ref(), &set)
        })
    }
}
