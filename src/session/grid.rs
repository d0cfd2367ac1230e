//! Bases, zones, families and grid coordinates.

use super::{read_text, write_text, ArrayInfo, Session};
use crate::array::{DataBuffer, DataType, Scalar};
use crate::names::ZoneType;
use crate::prelude::*;
use crate::transfer::{self, MemorySpace, Rind};
use crate::tree::{Base, EntityKind, Handle, Label, Zone};

pub(crate) const ZONE_TYPE_NODE: &str = "ZoneType";
/// grid the coordinate accessors work on
pub(crate) const GRID_NODE: &str = "GridCoordinates";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseInfo {
    pub name: String,
    pub cell_dim: usize,
    pub phys_dim: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneInfo {
    pub name: String,
    pub zone_type: ZoneType,
    pub index_dim: usize,
    /// vertex counts, then cell counts, then boundary vertex counts
    pub size: Vec<usize>,
}

/// check zone extents given as `[vertex.., cell.., boundary vertex..]`
pub(crate) fn validate_zone(
    zone_type: ZoneType,
    index_dim: usize,
    size: &[usize],
) -> Result<(), Error> {
    if size.len() != 3 * index_dim {
        return Err(Error::invalid(format!(
            "a zone of index dimension {index_dim} needs {} sizes, got {}",
            3 * index_dim,
            size.len()
        )));
    }

    let (vertex, rest) = size.split_at(index_dim);
    let (cell, _) = rest.split_at(index_dim);

    if let Some(axis) = vertex.iter().position(|n| *n == 0) {
        return Err(Error::invalid(format!("vertex count of axis {} must be positive", axis + 1)));
    }

    match zone_type {
        ZoneType::Structured => {
            for axis in 0..index_dim {
                if cell[axis] + 1 != vertex[axis] {
                    return Err(Error::invalid(format!(
                        "structured axis {} has {} vertices but {} cells",
                        axis + 1,
                        vertex[axis],
                        cell[axis]
                    )));
                }
            }
        }
        ZoneType::Unstructured => {
            if index_dim != 1 {
                return Err(Error::invalid("unstructured zones have index dimension 1"));
            }
            if cell[0] == 0 {
                return Err(Error::invalid("an unstructured zone needs at least one cell"));
            }
        }
        other => return Err(Error::invalid(format!("zones of type {other} cannot be written"))),
    }

    Ok(())
}

impl Session {
    /// add a base and return its index
    pub fn base_write(
        &mut self,
        name: &str,
        cell_dim: usize,
        phys_dim: usize,
    ) -> Result<usize, Error> {
        reported!(self, {
            self.writable("write a base")?;
            if !(1..=3).contains(&cell_dim) || !(1..=3).contains(&phys_dim) || cell_dim > phys_dim {
                return Err(Error::invalid(format!(
                    "invalid base dimensions: cell {cell_dim}, physical {phys_dim}"
                )));
            }

            let root = self.tree.root();
            let handle = self.create_entity(root, name, Label::Base, |store, node| {
                store.set_dimensions(node, DataType::Integer, &[2])?;
                let dims = DataBuffer::Integer(vec![cell_dim as i32, phys_dim as i32]);
                store.write_all_data(node, &dims)?;
                Ok(EntityKind::Base(Base { cell_dim, phys_dim }))
            })?;
            self.tree.ordinal(handle)
        })
    }

    pub fn base_read(&self, base: usize) -> Result<BaseInfo, Error> {
        reported!(self, {
            let handle = self.base_handle(base)?;
            let entity = self.tree.get(handle)?;
            match &entity.kind {
                EntityKind::Base(b) => Ok(BaseInfo {
                    name: entity.name().to_string(),
                    cell_dim: b.cell_dim,
                    phys_dim: b.phys_dim,
                }),
                _ => Err(Error::internal("base handle points elsewhere")),
            }
        })
    }

    pub fn nbases(&self) -> usize {
        self.tree.count(self.tree.root(), Label::Base).unwrap_or(0)
    }

    fn base_dims(&self, handle: Handle) -> Result<&Base, Error> {
        match self.tree.kind(handle)? {
            EntityKind::Base(base) => Ok(base),
            _ => Err(Error::internal("base handle points elsewhere")),
        }
    }

    /// add a zone to `base`. `size` holds the vertex, cell and boundary vertex counts of
    /// every index direction
    pub fn zone_write(
        &mut self,
        base: usize,
        name: &str,
        size: &[usize],
        zone_type: ZoneType,
    ) -> Result<usize, Error> {
        reported!(self, {
            self.writable("write a zone")?;
            let base = self.base_handle(base)?;
            let index_dim = match zone_type {
                ZoneType::Structured => self.base_dims(base)?.cell_dim,
                _ => 1,
            };
            validate_zone(zone_type, index_dim, size)?;

            let index_type = self.index_type();
            let values: Vec<i64> = size.iter().map(|n| *n as i64).collect();
            let size = size.to_vec();

            let handle = self.create_entity(base, name, Label::Zone, |store, node| {
                store.set_dimensions(node, index_type, &[index_dim, 3])?;
                store.write_all_data(node, &DataBuffer::from_indices(&values, index_type)?)?;
                write_text(store, node, ZONE_TYPE_NODE, "ZoneType_t", zone_type.as_str())?;
                Ok(EntityKind::Zone(Zone {
                    zone_type,
                    index_dim,
                    size,
                }))
            })?;
            self.tree.ordinal(handle)
        })
    }

    pub fn zone_read(&self, base: usize, zone: usize) -> Result<ZoneInfo, Error> {
        reported!(self, {
            let handle = self.zone_handle(base, zone)?;
            let z = self.zone(handle)?;
            Ok(ZoneInfo {
                name: self.tree.get(handle)?.name().to_string(),
                zone_type: z.zone_type,
                index_dim: z.index_dim,
                size: z.size.clone(),
            })
        })
    }

    pub fn zone_type(&self, base: usize, zone: usize) -> Result<ZoneType, Error> {
        reported!(self, {
            let handle = self.zone_handle(base, zone)?;
            Ok(self.zone(handle)?.zone_type)
        })
    }

    pub fn index_dim(&self, base: usize, zone: usize) -> Result<usize, Error> {
        reported!(self, {
            let handle = self.zone_handle(base, zone)?;
            Ok(self.zone(handle)?.index_dim)
        })
    }

    pub fn nzones(&self, base: usize) -> Result<usize, Error> {
        reported!(self, {
            let base = self.base_handle(base)?;
            self.tree.count(base, Label::Zone)
        })
    }

    pub fn family_write(&mut self, base: usize, name: &str) -> Result<usize, Error> {
        reported!(self, {
            self.writable("write a family")?;
            let base = self.base_handle(base)?;
            let handle =
                self.create_entity(base, name, Label::Family, |_, _| Ok(EntityKind::Family))?;
            self.tree.ordinal(handle)
        })
    }

    pub fn nfamilies(&self, base: usize) -> Result<usize, Error> {
        reported!(self, {
            let base = self.base_handle(base)?;
            self.tree.count(base, Label::Family)
        })
    }

    /// name of the zone type stored below a zone node, used when rebuilding
    pub(crate) fn stored_zone_type(store: &dyn NodeStore, node: NodeId) -> Result<ZoneType, Error> {
        match read_text(store, node, ZONE_TYPE_NODE)? {
            Some(name) => Ok(ZoneType::parse(&name)?),
            None => Ok(ZoneType::Structured),
        }
    }

    /// add a grid coordinates container without rind to a zone
    pub fn grid_write(&mut self, base: usize, zone: usize, name: &str) -> Result<usize, Error> {
        reported!(self, {
            self.writable("write a grid")?;
            let zone = self.zone_handle(base, zone)?;
            let handle = self.create_grid(zone, name)?;
            self.tree.ordinal(handle)
        })
    }

    pub fn ngrids(&self, base: usize, zone: usize) -> Result<usize, Error> {
        reported!(self, {
            let zone = self.zone_handle(base, zone)?;
            self.tree.count(zone, Label::GridCoordinates)
        })
    }

    fn create_grid(&mut self, zone: Handle, name: &str) -> Result<Handle, Error> {
        let index_dim = self.zone(zone)?.index_dim;
        self.create_entity(zone, name, Label::GridCoordinates, |_, _| {
            Ok(EntityKind::GridCoordinates(Rind::none(index_dim)))
        })
    }

    /// the `GridCoordinates` container of a zone
    fn coordinates(&self, base: usize, zone: usize) -> Result<Option<Handle>, Error> {
        let zone = self.zone_handle(base, zone)?;
        self.tree.child_named(zone, GRID_NODE)
    }

    /// the `GridCoordinates` container of a zone, created when missing
    fn coordinates_for_write(&mut self, base: usize, zone: usize) -> Result<Handle, Error> {
        self.writable("write coordinates")?;
        match self.coordinates(base, zone)? {
            Some(grid) => Ok(grid),
            None => {
                let zone = self.zone_handle(base, zone)?;
                self.create_grid(zone, GRID_NODE)
            }
        }
    }

    fn coordinate_named(
        &self,
        base: usize,
        zone: usize,
        name: &str,
    ) -> Result<(Handle, Handle), Error> {
        let grid = self
            .coordinates(base, zone)?
            .ok_or_else(|| Error::not_found("grid", GRID_NODE))?;
        let array = self.array_named(grid, name)?;
        Ok((grid, array))
    }

    pub fn ncoords(&self, base: usize, zone: usize) -> Result<usize, Error> {
        reported!(self, {
            match self.coordinates(base, zone)? {
                Some(grid) => self.tree.count(grid, Label::DataArray),
                None => Ok(0),
            }
        })
    }

    pub fn coord_info(&self, base: usize, zone: usize, coord: usize) -> Result<ArrayInfo, Error> {
        reported!(self, {
            let grid = self
                .coordinates(base, zone)?
                .ok_or_else(|| Error::not_found("coordinate", coord))?;
            let array = self.nth(grid, Label::DataArray, coord, "coordinate")?;
            self.array_info_of(array)
        })
    }

    /// write a whole coordinate array, rind planes included. Returns its index
    pub fn coord_write<T: Scalar>(
        &mut self,
        base: usize,
        zone: usize,
        name: &str,
        data: &[T],
    ) -> Result<usize, Error> {
        reported!(self, {
            let grid = self.coordinates_for_write(base, zone)?;
            let dims = self.expected_dims(grid)?;
            let array = self.write_full_array(grid, name, T::DATA_TYPE, &dims, data)?;
            self.tree.ordinal(array)
        })
    }

    /// write the coordinates of `[rmin, rmax]` from a contiguous buffer
    pub fn coord_partial_write<T: Scalar>(
        &mut self,
        base: usize,
        zone: usize,
        name: &str,
        rmin: &[i64],
        rmax: &[i64],
        data: &[T],
    ) -> Result<usize, Error> {
        reported!(self, {
            let grid = self.coordinates_for_write(base, zone)?;
            let memory = MemorySpace::contiguous(data.len());
            let array =
                self.write_array_window(grid, name, T::DATA_TYPE, rmin, rmax, &memory, data)?;
            self.tree.ordinal(array)
        })
    }

    /// write the memory window of `data` into `[rmin, rmax]`, storing the array as
    /// `file_type` when it is created
    #[allow(clippy::too_many_arguments)]
    pub fn coord_general_write<T: Scalar>(
        &mut self,
        base: usize,
        zone: usize,
        name: &str,
        file_type: DataType,
        rmin: &[i64],
        rmax: &[i64],
        memory: &MemorySpace,
        data: &[T],
    ) -> Result<usize, Error> {
        reported!(self, {
            let grid = self.coordinates_for_write(base, zone)?;
            let array = self.write_array_window(grid, name, file_type, rmin, rmax, memory, data)?;
            self.tree.ordinal(array)
        })
    }

    /// read the coordinates of `[rmin, rmax]` into a contiguous buffer
    pub fn coord_read<T: Scalar>(
        &self,
        base: usize,
        zone: usize,
        name: &str,
        rmin: &[i64],
        rmax: &[i64],
        out: &mut [T],
    ) -> Result<(), Error> {
        reported!(self, {
            let (grid, array) = self.coordinate_named(base, zone, name)?;
            let memory = MemorySpace::contiguous(out.len());
            self.read_array_window(grid, array, rmin, rmax, &memory, out)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn coord_general_read<T: Scalar>(
        &self,
        base: usize,
        zone: usize,
        name: &str,
        rmin: &[i64],
        rmax: &[i64],
        memory: &MemorySpace,
        out: &mut [T],
    ) -> Result<(), Error> {
        reported!(self, {
            let (grid, array) = self.coordinate_named(base, zone, name)?;
            self.read_array_window(grid, array, rmin, rmax, memory, out)
        })
    }

    /// index range covering the whole coordinate arrays, rind included
    pub fn coord_default_range(
        &self,
        base: usize,
        zone: usize,
    ) -> Result<(Vec<i64>, Vec<i64>), Error> {
        reported!(self, {
            let zone_handle = self.zone_handle(base, zone)?;
            let rind = match self.coordinates(base, zone)? {
                Some(grid) => self.container_rind(grid)?,
                None => Rind::none(self.zone(zone_handle)?.index_dim),
            };
            let dims = rind.inflate(self.zone(zone_handle)?.vertex_size())?;
            Ok(transfer::default_range(&dims, &rind, self.convention()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_validation() {
        assert!(validate_zone(ZoneType::Structured, 3, &[3, 4, 5, 2, 3, 4, 0, 0, 0]).is_ok());
        assert!(validate_zone(ZoneType::Structured, 3, &[3, 4, 5, 2, 3, 3, 0, 0, 0]).is_err());
        assert!(validate_zone(ZoneType::Structured, 2, &[0, 4, 0, 3, 0, 0]).is_err());
        assert!(validate_zone(ZoneType::Structured, 2, &[3, 4, 2]).is_err());
        assert!(validate_zone(ZoneType::Unstructured, 1, &[8, 1, 0]).is_ok());
        assert!(validate_zone(ZoneType::Unstructured, 1, &[8, 0, 0]).is_err());
        assert!(validate_zone(ZoneType::Null, 1, &[8, 1, 0]).is_err());
    }

    #[test]
    fn bases_and_zones() {
        let mut session = Session::diskless(Config::new()).unwrap();
        assert!(session.base_write("Bad", 3, 2).is_err());
        let b = session.base_write("Base", 3, 3).unwrap();
        assert_eq!(b, 1);
        let size = [3, 4, 5, 2, 3, 4, 0, 0, 0];
        let z = session
            .zone_write(b, "Block", &size, ZoneType::Structured)
            .unwrap();
        assert_eq!(session.index_dim(b, z).unwrap(), 3);
        assert_eq!(session.nzones(b).unwrap(), 1);
        assert!(session
            .zone_write(b, "Block", &size, ZoneType::Structured)
            .is_err());

        let u = session
            .zone_write(b, "Cloud", &[8, 1, 0], ZoneType::Unstructured)
            .unwrap();
        assert_eq!(u, 2);
        assert_eq!(session.zone_read(b, u).unwrap().size, vec![8, 1, 0]);
        assert_eq!(session.family_write(b, "Wing").unwrap(), 1);
        assert_eq!(session.nfamilies(b).unwrap(), 1);
    }

    #[test]
    fn coordinates_in_pieces() {
        let mut session = Session::diskless(Config::new()).unwrap();
        let b = session.base_write("Base", 2, 2).unwrap();
        let z = session
            .zone_write(b, "Block", &[3, 2, 2, 1, 0, 0], ZoneType::Structured)
            .unwrap();

        let row = [0.0f64, 1.0, 2.0];
        let x = session
            .coord_partial_write(b, z, "CoordinateX", &[1, 1], &[3, 1], &row)
            .unwrap();
        session
            .coord_partial_write(b, z, "CoordinateX", &[1, 2], &[3, 2], &row)
            .unwrap();
        assert_eq!(x, 1);
        assert_eq!(session.ncoords(b, z).unwrap(), 1);

        let info = session.coord_info(b, z, 1).unwrap();
        assert_eq!(info.dims, vec![3, 2]);
        assert_eq!(info.data_type, DataType::RealDouble);

        let mut out = [0f32; 6];
        session
            .coord_read(b, z, "CoordinateX", &[1, 1], &[3, 2], &mut out)
            .unwrap();
        assert_eq!(out, [0.0, 1.0, 2.0, 0.0, 1.0, 2.0]);

        // a full write onto an existing name is refused while writing
        assert!(session
            .coord_write(b, z, "CoordinateX", &[0f64; 6])
            .is_err());
        assert!(session
            .coord_write(b, z, "CoordinateY", &[0f64; 5])
            .is_err());
        assert_eq!(session.coord_default_range(b, z).unwrap(), (vec![1, 1], vec![3, 2]));
    }
}
