//! Flow solutions and discrete data: containers of field arrays sized by their location.

use super::{node::PointSetInfo, write_text, Session, GRID_LOCATION_NODE};
use crate::array::{DataType, Scalar};
use crate::names::{GridLocation, PointSetType, ZoneType};
use crate::prelude::*;
use crate::ptset;
use crate::transfer::{MemorySpace, Rind};
use crate::tree::{EntityKind, Handle, Label, Solution, Zone};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionInfo {
    pub name: String,
    pub location: GridLocation,
}

/// extents of a field stored at `location` of `zone`, rind excluded
pub(crate) fn location_dims(zone: &Zone, location: GridLocation) -> Result<Vec<usize>, Error> {
    let vertex = zone.vertex_size();
    let cell = zone.cell_size();
    let face = |axis: usize| -> Result<Vec<usize>, Error> {
        if axis >= zone.index_dim {
            return Err(Error::invalid(format!(
                "{location} needs an index dimension above {axis}, the zone has {}",
                zone.index_dim
            )));
        }
        let mut dims = cell.to_vec();
        dims[axis] = vertex[axis];
        Ok(dims)
    };

    match (zone.zone_type, location) {
        (_, GridLocation::Vertex) => Ok(vertex.to_vec()),
        (_, GridLocation::CellCenter) => Ok(cell.to_vec()),
        (ZoneType::Structured, GridLocation::IFaceCenter) => face(0),
        (ZoneType::Structured, GridLocation::JFaceCenter) => face(1),
        (ZoneType::Structured, GridLocation::KFaceCenter) => face(2),
        (zone_type, location) => Err(Error::invalid(format!(
            "fields at {location} of a {zone_type} zone need a point set"
        ))),
    }
}

/// locations a point set restricted container may use
fn check_ptset_location(location: GridLocation) -> Result<(), Error> {
    match location {
        GridLocation::Null | GridLocation::UserDefined => {
            Err(Error::invalid(format!("{location} is not a valid field location")))
        }
        _ => Ok(()),
    }
}

fn check_container(label: Label) -> Result<(), Error> {
    match label {
        Label::FlowSolution | Label::DiscreteData => Ok(()),
        _ => Err(Error::internal(format!("{label} is not a field container"))),
    }
}

fn solution_kind(label: Label, solution: Solution) -> EntityKind {
    match label {
        Label::DiscreteData => EntityKind::DiscreteData(solution),
        _ => EntityKind::FlowSolution(solution),
    }
}

impl Session {
    fn field_container(
        &self,
        base: usize,
        zone: usize,
        label: Label,
        index: usize,
    ) -> Result<Handle, Error> {
        let zone = self.zone_handle(base, zone)?;
        let what = match label {
            Label::DiscreteData => "discrete data",
            _ => "solution",
        };
        self.nth(zone, label, index, what)
    }

    fn solution(&self, handle: Handle) -> Result<&Solution, Error> {
        match self.tree.kind(handle)? {
            EntityKind::FlowSolution(sol) | EntityKind::DiscreteData(sol) => Ok(sol),
            _ => Err(Error::internal("handle does not refer to a field container")),
        }
    }

    fn create_field_container(
        &mut self,
        base: usize,
        zone: usize,
        label: Label,
        name: &str,
        location: GridLocation,
    ) -> Result<usize, Error> {
        check_container(label)?;
        self.writable("write a field container")?;
        let zone = self.zone_handle(base, zone)?;
        let z = self.zone(zone)?;
        location_dims(z, location)?;
        let index_dim = z.index_dim;

        let handle = self.create_entity(zone, name, label, |store, node| {
            if location != GridLocation::Vertex {
                write_text(store, node, GRID_LOCATION_NODE, "GridLocation_t", location.as_str())?;
            }
            Ok(solution_kind(
                label,
                Solution {
                    location,
                    rind: Rind::none(index_dim),
                    ptset: None,
                },
            ))
        })?;
        self.tree.ordinal(handle)
    }

    #[allow(clippy::too_many_arguments)]
    fn create_ptset_container(
        &mut self,
        base: usize,
        zone: usize,
        label: Label,
        name: &str,
        location: GridLocation,
        set_type: PointSetType,
        points: &[i64],
    ) -> Result<usize, Error> {
        check_container(label)?;
        self.writable("write a field container")?;
        check_ptset_location(location)?;
        let zone = self.zone_handle(base, zone)?;
        let index_dim = self.zone(zone)?.index_dim;

        let dim = match set_type {
            PointSetType::ElementList | PointSetType::ElementRange => 1,
            _ => index_dim,
        };
        let npts = points.len() / dim.max(1);
        ptset::validate(set_type, index_dim, npts, points.len(), 1, true)?;

        let index_type = self.index_type();
        let handle = self.create_entity(zone, name, label, |store, node| {
            if location != GridLocation::Vertex {
                write_text(store, node, GRID_LOCATION_NODE, "GridLocation_t", location.as_str())?;
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
            Ok(solution_kind(
                label,
                Solution {
                    location,
                    rind: Rind::none(index_dim),
                    ptset: Some(set),
                },
            ))
        })?;
        self.tree.ordinal(handle)
    }

    /// add a flow solution at `location` to a zone
    pub fn sol_write(
        &mut self,
        base: usize,
        zone: usize,
        name: &str,
        location: GridLocation,
    ) -> Result<usize, Error> {
        reported!(self, {
            self.create_field_container(base, zone, Label::FlowSolution, name, location)
        })
    }

    /// add a flow solution restricted to a point set. An empty point list is allowed
    #[allow(clippy::too_many_arguments)]
    pub fn sol_ptset_write(
        &mut self,
        base: usize,
        zone: usize,
        name: &str,
        location: GridLocation,
        set_type: PointSetType,
        points: &[i64],
    ) -> Result<usize, Error> {
        reported!(self, {
            let label = Label::FlowSolution;
            self.create_ptset_container(base, zone, label, name, location, set_type, points)
        })
    }

    pub fn nsols(&self, base: usize, zone: usize) -> Result<usize, Error> {
        reported!(self, {
            let zone = self.zone_handle(base, zone)?;
            self.tree.count(zone, Label::FlowSolution)
        })
    }

    pub fn sol_info(&self, base: usize, zone: usize, sol: usize) -> Result<SolutionInfo, Error> {
        reported!(self, {
            let handle = self.field_container(base, zone, Label::FlowSolution, sol)?;
            Ok(SolutionInfo {
                name: self.tree.get(handle)?.name().to_string(),
                location: self.solution(handle)?.location,
            })
        })
    }

    /// extents of the field arrays of a solution, rind included
    pub fn sol_size(&self, base: usize, zone: usize, sol: usize) -> Result<Vec<usize>, Error> {
        reported!(self, {
            let handle = self.field_container(base, zone, Label::FlowSolution, sol)?;
            self.expected_dims(handle)
        })
    }

    pub fn sol_ptset_info(
        &self,
        base: usize,
        zone: usize,
        sol: usize,
    ) -> Result<Option<PointSetInfo>, Error> {
        reported!(self, {
            let handle = self.field_container(base, zone, Label::FlowSolution, sol)?;
            Ok(self.solution(handle)?.ptset.as_ref().map(PointSetInfo::from))
        })
    }

    pub fn sol_ptset_read(&self, base: usize, zone: usize, sol: usize) -> Result<Vec<i64>, Error> {
        reported!(self, {
            let handle = self.field_container(base, zone, Label::FlowSolution, sol)?;
            match &self.solution(handle)?.ptset {
                Some(set) => ptset::read(self.store.as_ref(), set),
                None => Err(Error::invalid("the solution is not restricted to a point set")),
            }
        })
    }

    /// write a whole field of a solution, rind planes included. Returns its index
    pub fn field_write<T: Scalar>(
        &mut self,
        base: usize,
        zone: usize,
        sol: usize,
        name: &str,
        data: &[T],
    ) -> Result<usize, Error> {
        reported!(self, {
            self.writable("write a field")?;
            let handle = self.field_container(base, zone, Label::FlowSolution, sol)?;
            let dims = self.expected_dims(handle)?;
            let field = self.write_full_array(handle, name, T::DATA_TYPE, &dims, data)?;
            self.tree.ordinal(field)
        })
    }

    /// write `[rmin, rmax]` of a field from a contiguous buffer
    #[allow(clippy::too_many_arguments)]
    pub fn field_partial_write<T: Scalar>(
        &mut self,
        base: usize,
        zone: usize,
        sol: usize,
        name: &str,
        rmin: &[i64],
        rmax: &[i64],
        data: &[T],
    ) -> Result<usize, Error> {
        reported!(self, {
            self.writable("write a field")?;
            let handle = self.field_container(base, zone, Label::FlowSolution, sol)?;
            let memory = MemorySpace::contiguous(data.len());
            let field =
                self.write_array_window(handle, name, T::DATA_TYPE, rmin, rmax, &memory, data)?;
            self.tree.ordinal(field)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn field_general_write<T: Scalar>(
        &mut self,
        base: usize,
        zone: usize,
        sol: usize,
        name: &str,
        file_type: DataType,
        rmin: &[i64],
        rmax: &[i64],
        memory: &MemorySpace,
        data: &[T],
    ) -> Result<usize, Error> {
        reported!(self, {
            self.writable("write a field")?;
            let handle = self.field_container(base, zone, Label::FlowSolution, sol)?;
            let field = self.write_array_window(handle, name, file_type, rmin, rmax, memory, data)?;
            self.tree.ordinal(field)
        })
    }

    /// read `[rmin, rmax]` of a field into a contiguous buffer
    #[allow(clippy::too_many_arguments)]
    pub fn field_read<T: Scalar>(
        &self,
        base: usize,
        zone: usize,
        sol: usize,
        name: &str,
        rmin: &[i64],
        rmax: &[i64],
        out: &mut [T],
    ) -> Result<(), Error> {
        reported!(self, {
            let handle = self.field_container(base, zone, Label::FlowSolution, sol)?;
            let field = self.array_named(handle, name)?;
            let memory = MemorySpace::contiguous(out.len());
            self.read_array_window(handle, field, rmin, rmax, &memory, out)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn field_general_read<T: Scalar>(
        &self,
        base: usize,
        zone: usize,
        sol: usize,
        name: &str,
        rmin: &[i64],
        rmax: &[i64],
        memory: &MemorySpace,
        out: &mut [T],
    ) -> Result<(), Error> {
        reported!(self, {
            let handle = self.field_container(base, zone, Label::FlowSolution, sol)?;
            let field = self.array_named(handle, name)?;
            self.read_array_window(handle, field, rmin, rmax, memory, out)
        })
    }

    pub fn nfields(&self, base: usize, zone: usize, sol: usize) -> Result<usize, Error> {
        reported!(self, {
            let handle = self.field_container(base, zone, Label::FlowSolution, sol)?;
            self.tree.count(handle, Label::DataArray)
        })
    }

    pub fn field_info(
        &self,
        base: usize,
        zone: usize,
        sol: usize,
        field: usize,
    ) -> Result<super::ArrayInfo, Error> {
        reported!(self, {
            let handle = self.field_container(base, zone, Label::FlowSolution, sol)?;
            let field = self.nth(handle, Label::DataArray, field, "field")?;
            self.array_info_of(field)
        })
    }

    /// add a discrete data container at `location` to a zone
    pub fn discrete_write(
        &mut self,
        base: usize,
        zone: usize,
        name: &str,
        location: GridLocation,
    ) -> Result<usize, Error> {
        reported!(self, {
            self.create_field_container(base, zone, Label::DiscreteData, name, location)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn discrete_ptset_write(
        &mut self,
        base: usize,
        zone: usize,
        name: &str,
        location: GridLocation,
        set_type: PointSetType,
        points: &[i64],
    ) -> Result<usize, Error> {
        reported!(self, {
            let label = Label::DiscreteData;
            self.create_ptset_container(base, zone, label, name, location, set_type, points)
        })
    }

    pub fn ndiscrete(&self, base: usize, zone: usize) -> Result<usize, Error> {
        reported!(self, {
            let zone = self.zone_handle(base, zone)?;
            self.tree.count(zone, Label::DiscreteData)
        })
    }

    pub fn discrete_info(
        &self,
        base: usize,
        zone: usize,
        discrete: usize,
    ) -> Result<SolutionInfo, Error> {
        reported!(self, {
            let handle = self.field_container(base, zone, Label::DiscreteData, discrete)?;
            Ok(SolutionInfo {
                name: self.tree.get(handle)?.name().to_string(),
                location: self.solution(handle)?.location,
            })
        })
    }

    pub fn discrete_size(
        &self,
        base: usize,
        zone: usize,
        discrete: usize,
    ) -> Result<Vec<usize>, Error> {
        reported!(self, {
            let handle = self.field_container(base, zone, Label::DiscreteData, discrete)?;
            self.expected_dims(handle)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn discrete_field_general_write<T: Scalar>(
        &mut self,
        base: usize,
        zone: usize,
        discrete: usize,
        name: &str,
        file_type: DataType,
        rmin: &[i64],
        rmax: &[i64],
        memory: &MemorySpace,
        data: &[T],
    ) -> Result<usize, Error> {
        reported!(self, {
            self.writable("write a discrete field")?;
            let handle = self.field_container(base, zone, Label::DiscreteData, discrete)?;
            let field = self.write_array_window(handle, name, file_type, rmin, rmax, memory, data)?;
            self.tree.ordinal(field)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn discrete_field_general_read<T: Scalar>(
        &self,
        base: usize,
        zone: usize,
        discrete: usize,
        name: &str,
        rmin: &[i64],
        rmax: &[i64],
        memory: &MemorySpace,
        out: &mut [T],
    ) -> Result<(), Error> {
        reported!(self, {
            let handle = self.field_container(base, zone, Label::DiscreteData, discrete)?;
            let field = self.array_named(handle, name)?;
            self.read_array_window(handle, field, rmin, rmax, memory, out)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn structured() -> Zone {
        Zone {
            zone_type: ZoneType::Structured,
            index_dim: 3,
            size: vec![5, 4, 3, 4, 3, 2, 0, 0, 0],
        }
    }

    #[test]
    fn sizes_by_location() {
        let zone = structured();
        assert_eq!(location_dims(&zone, GridLocation::Vertex).unwrap(), vec![5, 4, 3]);
        assert_eq!(location_dims(&zone, GridLocation::CellCenter).unwrap(), vec![4, 3, 2]);
        assert_eq!(location_dims(&zone, GridLocation::IFaceCenter).unwrap(), vec![5, 3, 2]);
        assert_eq!(location_dims(&zone, GridLocation::JFaceCenter).unwrap(), vec![4, 4, 2]);
        assert_eq!(location_dims(&zone, GridLocation::KFaceCenter).unwrap(), vec![4, 3, 3]);
        assert!(location_dims(&zone, GridLocation::EdgeCenter).is_err());

        let cloud = Zone {
            zone_type: ZoneType::Unstructured,
            index_dim: 1,
            size: vec![8, 3, 0],
        };
        assert_eq!(location_dims(&cloud, GridLocation::CellCenter).unwrap(), vec![3]);
        assert!(location_dims(&cloud, GridLocation::IFaceCenter).is_err());
    }

    #[test]
    fn cell_centered_fields_with_rind() {
        let mut session = Session::diskless(Config::new()).unwrap();
        let b = session.base_write("Base", 2, 2).unwrap();
        let z = session
            .zone_write(b, "Block", &[4, 3, 3, 2, 0, 0], ZoneType::Structured)
            .unwrap();
        let s = session
            .sol_write(b, z, "Flow", GridLocation::CellCenter)
            .unwrap();
        assert_eq!(session.sol_size(b, z, s).unwrap(), vec![3, 2]);

        session
            .goto(b, &[("Zone_t", z), ("FlowSolution_t", s)])
            .unwrap();
        session.rind_write(&[1, 1, 0, 0]).unwrap();
        assert_eq!(session.sol_size(b, z, s).unwrap(), vec![5, 2]);

        let values: Vec<f64> = (0..10).map(f64::from).collect();
        session.field_write(b, z, s, "Density", &values).unwrap();

        // core cells only
        let mut core = [0f64; 6];
        session
            .field_read(b, z, s, "Density", &[1, 1], &[3, 2], &mut core)
            .unwrap();
        assert_eq!(core, [1.0, 2.0, 3.0, 6.0, 7.0, 8.0]);

        // rind planes sit at 0 and 4 in the core convention
        let mut rind = [0f64; 2];
        session
            .field_read(b, z, s, "Density", &[0, 1], &[0, 2], &mut rind)
            .unwrap();
        assert_eq!(rind, [0.0, 5.0]);
        assert_eq!(session.field_info(b, z, s, 1).unwrap().dims, vec![5, 2]);
    }

    #[test]
    fn point_set_solutions() {
        let mut session = Session::diskless(Config::new()).unwrap();
        let b = session.base_write("Base", 3, 3).unwrap();
        let z = session
            .zone_write(b, "Cloud", &[8, 2, 0], ZoneType::Unstructured)
            .unwrap();

        let list = PointSetType::PointList;
        let s = session
            .sol_ptset_write(b, z, "Samples", GridLocation::Vertex, list, &[2, 4, 6])
            .unwrap();
        assert_eq!(session.sol_size(b, z, s).unwrap(), vec![3]);
        assert_eq!(session.sol_ptset_read(b, z, s).unwrap(), vec![2, 4, 6]);
        let info = session.sol_ptset_info(b, z, s).unwrap().unwrap();
        assert_eq!((info.npts, info.size_of_patch), (3, 3));

        // empty lists are allowed here and nowhere else
        let e = session
            .sol_ptset_write(b, z, "Nothing", GridLocation::Vertex, PointSetType::PointList, &[])
            .unwrap();
        assert_eq!(session.sol_size(b, z, e).unwrap(), vec![0]);

        session
            .field_write(b, z, s, "Pressure", &[1.0f32, 2.0, 3.0])
            .unwrap();
        assert_eq!(session.nfields(b, z, s).unwrap(), 1);

        session
            .goto(b, &[("Zone_t", z), ("FlowSolution_t", s)])
            .unwrap();
        assert!(session.rind_write(&[1, 0]).is_err());
    }

    #[test]
    fn discrete_data_windows() {
        let mut session = Session::diskless(Config::new()).unwrap();
        let b = session.base_write("Base", 2, 2).unwrap();
        let z = session
            .zone_write(b, "Block", &[3, 3, 2, 2, 0, 0], ZoneType::Structured)
            .unwrap();
        let d = session
            .discrete_write(b, z, "Marks", GridLocation::Vertex)
            .unwrap();
        assert_eq!(session.ndiscrete(b, z).unwrap(), 1);
        assert_eq!(session.discrete_size(b, z, d).unwrap(), vec![3, 3]);

        let memory = MemorySpace::new(vec![2, 3], vec![2, 1], vec![2, 3]);
        let flags = [0i64, 1, 0, 2, 0, 3];
        session
            .discrete_field_general_write(
                b,
                z,
                d,
                "Flag",
                DataType::Integer,
                &[1, 2],
                &[3, 2],
                &memory,
                &flags,
            )
            .unwrap();

        let mut out = [0i32; 3];
        let memory = MemorySpace::contiguous(3);
        session
            .discrete_field_general_read(b, z, d, "Flag", &[1, 2], &[3, 2], &memory, &mut out)
            .unwrap();
        assert_eq!(out, [1, 2, 3]);
        assert_eq!(session.discrete_info(b, z, d).unwrap().location, GridLocation::Vertex);
    }
}
