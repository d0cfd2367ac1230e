//! Arrays below any container, and the accessors working at the current position.

use super::{solution, write_integers, write_text, Mode, Session, GRID_LOCATION_NODE, RIND_NODE};
use crate::array::{self, DataBuffer, DataType, Scalar};
use crate::names::{GridLocation, PointSetType};
use crate::prelude::*;
use crate::ptset;
use crate::traits::Link;
use crate::transfer::{self, ArrayField, MemorySpace, Rind};
use crate::tree::{EntityKind, Handle, Label, UserData};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayInfo {
    pub name: String,
    pub data_type: DataType,
    pub dims: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointSetInfo {
    pub set_type: PointSetType,
    pub npts: usize,
    pub size_of_patch: usize,
    pub data_type: DataType,
}

impl From<&crate::ptset::PointSet> for PointSetInfo {
    fn from(x: &crate::ptset::PointSet) -> Self {
        Self {
            set_type: x.set_type(),
            npts: x.npts(),
            size_of_patch: x.size_of_patch(),
            data_type: x.data_type(),
        }
    }
}

impl Session {
    /// extents every array below `container` must have, `None` where arrays are free form
    pub(crate) fn container_dims(&self, container: Handle) -> Result<Option<Vec<usize>>, Error> {
        let dims = match self.tree.kind(container)? {
            EntityKind::GridCoordinates(rind) => {
                let zone = self.zone(self.zone_above(container)?)?;
                Some(rind.inflate(zone.vertex_size())?)
            }
            EntityKind::FlowSolution(sol) | EntityKind::DiscreteData(sol) => match &sol.ptset {
                Some(ptset) => Some(vec![ptset.size_of_patch()]),
                None => {
                    let zone = self.zone(self.zone_above(container)?)?;
                    Some(sol.rind.inflate(&solution::location_dims(zone, sol.location)?)?)
                }
            },
            EntityKind::ZoneSubRegion(sub) => sub.ptset.as_ref().map(|p| vec![p.size_of_patch()]),
            _ => None,
        };
        Ok(dims)
    }

    /// like [`container_dims`](Session::container_dims), failing for free form containers
    pub(crate) fn expected_dims(&self, container: Handle) -> Result<Vec<usize>, Error> {
        self.container_dims(container)?.ok_or_else(|| {
            let name = self.tree.get(container).map_or("", |e| e.name());
            Error::invalid(format!("the extents of arrays below `{name}` are not known"))
        })
    }

    /// rind planes applying to arrays below `container`
    pub(crate) fn container_rind(&self, container: Handle) -> Result<Rind, Error> {
        let kind = self.tree.kind(container)?;
        let restricted = matches!(
            kind,
            EntityKind::FlowSolution(sol) | EntityKind::DiscreteData(sol) if sol.ptset.is_some()
        );
        let rind = if restricted { None } else { kind.rind().cloned() };
        match rind {
            Some(rind) => Ok(rind),
            None => Ok(Rind::none(self.container_dims(container)?.map(|d| d.len()).unwrap_or(1))),
        }
    }

    pub(crate) fn array_named(&self, container: Handle, name: &str) -> Result<Handle, Error> {
        match self.tree.child_named(container, name)? {
            Some(handle) if matches!(self.tree.kind(handle)?, EntityKind::DataArray(_)) => {
                Ok(handle)
            }
            _ => Err(Error::not_found("array", name)),
        }
    }

    pub(crate) fn array_field(&self, handle: Handle) -> Result<&ArrayField, Error> {
        match self.tree.kind(handle)? {
            EntityKind::DataArray(field) => Ok(field),
            _ => Err(Error::invalid(format!(
                "`{}` is not an array",
                self.tree.get(handle)?.name()
            ))),
        }
    }

    pub(crate) fn array_info_of(&self, handle: Handle) -> Result<ArrayInfo, Error> {
        let field = self.array_field(handle)?;
        Ok(ArrayInfo {
            name: field.name.clone(),
            data_type: field.data_type,
            dims: field.dims.clone(),
        })
    }

    /// create the array `name` below `container` holding all of `data`
    pub(crate) fn write_full_array<T: Scalar>(
        &mut self,
        container: Handle,
        name: &str,
        file_type: DataType,
        dims: &[usize],
        data: &[T],
    ) -> Result<Handle, Error> {
        array::check_convertible(T::DATA_TYPE, file_type)?;
        let expected = dims
            .iter()
            .try_fold(1usize, |acc, d| acc.checked_mul(*d))
            .ok_or_else(|| Error::Overflow(format!("array `{name}` of extents {dims:?}")))?;
        if data.len() != expected {
            return Err(Error::invalid(format!(
                "array `{name}` of extents {dims:?} needs {expected} values, got {}",
                data.len()
            )));
        }

        let values = array::convert(T::into_buffer(data.to_vec()), file_type)?;
        self.create_entity(container, name, Label::DataArray, |store, node| {
            let mut field = ArrayField::init(store, node, name, file_type, dims)?;
            field.write_all(store, values)?;
            Ok(EntityKind::DataArray(field))
        })
    }

    /// write the memory window of `data` into `[rmin, rmax]` of the array `name`
    ///
    /// The array is created zero filled with extents `dims` (or the extents the container
    /// dictates) when it does not exist. A full range write over an existing array follows
    /// the duplicate name rules of the session mode.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn write_array_window<T: Scalar>(
        &mut self,
        container: Handle,
        name: &str,
        file_type: DataType,
        rmin: &[i64],
        rmax: &[i64],
        memory: &MemorySpace,
        data: &[T],
    ) -> Result<Handle, Error> {
        let dims = self.expected_dims(container)?;
        self.write_array_window_sized(container, name, file_type, &dims, rmin, rmax, memory, data)
    }

    #[allow(clippy::too_many_arguments)]
    fn write_array_window_sized<T: Scalar>(
        &mut self,
        container: Handle,
        name: &str,
        file_type: DataType,
        dims: &[usize],
        rmin: &[i64],
        rmax: &[i64],
        memory: &MemorySpace,
        data: &[T],
    ) -> Result<Handle, Error> {
        let rind = self.container_rind(container)?;
        let plan = transfer::verify_range(dims, &rind, self.convention(), rmin, rmax, memory)?;
        array::check_convertible(T::DATA_TYPE, file_type)?;

        let existing = match self.tree.child_named(container, name)? {
            Some(handle) if plan.file_full => match self.mode {
                Mode::Modify => {
                    self.remove_entity(handle)?;
                    None
                }
                _ => {
                    return Err(Error::invalid(format!(
                        "array `{name}` already exists, a full range write would overwrite it"
                    )))
                }
            },
            other => other,
        };

        let created = existing.is_none();
        let handle = match existing {
            Some(handle) => handle,
            None => self.create_entity(container, name, Label::DataArray, |store, node| {
                Ok(EntityKind::DataArray(ArrayField::init(store, node, name, file_type, dims)?))
            })?,
        };

        let field = match self.tree.kind_mut(handle)? {
            EntityKind::DataArray(field) => field,
            _ => return Err(Error::invalid(format!("`{name}` is not an array"))),
        };
        if let Err(e) = transfer::general_write(self.store.as_mut(), field, &plan, data) {
            if created {
                self.remove_entity(handle)?;
            }
            return Err(e);
        }
        Ok(handle)
    }

    /// read `[rmin, rmax]` of the array `array` below `container` into the memory window
    pub(crate) fn read_array_window<T: Scalar>(
        &self,
        container: Handle,
        array: Handle,
        rmin: &[i64],
        rmax: &[i64],
        memory: &MemorySpace,
        out: &mut [T],
    ) -> Result<(), Error> {
        let field = self.array_field(array)?;
        let rind = self.container_rind(container)?;
        let rind = if rind.planes().len() == 2 * field.dims.len() {
            rind
        } else {
            Rind::none(field.dims.len())
        };
        let convention = self.convention();
        let plan = transfer::verify_range(&field.dims, &rind, convention, rmin, rmax, memory)?;
        transfer::general_read(self.store.as_ref(), field, &plan, out)
    }

    fn current_container(&self) -> Result<Handle, Error> {
        let handle = self.current()?;
        if !self.tree.kind(handle)?.allows(Label::DataArray) {
            return Err(Error::invalid(format!(
                "`{}` cannot hold arrays",
                self.tree.get(handle)?.name()
            )));
        }
        Ok(handle)
    }

    fn index_dim_at(&self, handle: Handle) -> Result<usize, Error> {
        Ok(self.zone(self.zone_above(handle)?)?.index_dim)
    }

    /// set the rind planes of the entity at the current position
    pub fn rind_write(&mut self, planes: &[i64]) -> Result<(), Error> {
        reported!(self, {
            self.writable("write rind planes")?;
            let handle = self.current()?;
            let index_dim = self.index_dim_at(handle)?;
            if planes.len() != 2 * index_dim {
                return Err(Error::invalid(format!(
                    "{index_dim} index directions need {} rind values, got {}",
                    2 * index_dim,
                    planes.len()
                )));
            }
            if self.tree.kind(handle)?.rind().is_none() {
                return Err(Error::invalid("rind planes are not allowed at the current position"));
            }
            if let EntityKind::FlowSolution(sol) | EntityKind::DiscreteData(sol) =
                self.tree.kind(handle)?
            {
                if sol.ptset.is_some() && planes.iter().any(|p| *p != 0) {
                    return Err(Error::invalid(
                        "solutions restricted to a point set cannot have rind",
                    ));
                }
            }
            let rind = Rind::from_values(planes)?;

            let node = self.node_of(handle)?;
            write_integers(
                self.store.as_mut(),
                node,
                RIND_NODE,
                "Rind_t",
                DataType::Integer,
                &[planes.len()],
                planes,
            )?;
            if let Some(current) = self.tree.kind_mut(handle)?.rind_mut() {
                *current = rind;
            }
            Ok(())
        })
    }

    pub fn rind_read(&self) -> Result<Vec<i64>, Error> {
        reported!(self, {
            let handle = self.current()?;
            let rind = self
                .tree
                .kind(handle)?
                .rind()
                .ok_or_else(|| Error::invalid("no rind planes at the current position"))?;
            Ok(rind.planes().iter().map(|p| *p as i64).collect())
        })
    }

    /// attach a point set to the entity at the current position
    pub fn ptset_write(&mut self, set_type: PointSetType, points: &[i64]) -> Result<(), Error> {
        reported!(self, {
            self.writable("write a point set")?;
            let handle = self.current()?;
            self.attach_ptset(handle, set_type, points)
        })
    }

    /// write the point set of `handle`, replacing a previous one in Modify mode
    pub(crate) fn attach_ptset(
        &mut self,
        handle: Handle,
        set_type: PointSetType,
        points: &[i64],
    ) -> Result<(), Error> {
        let index_dim = self.index_dim_at(handle)?;
        let kind = self.tree.kind(handle)?;
        let allow_empty = matches!(kind, EntityKind::FlowSolution(_) | EntityKind::DiscreteData(_));
        let previous = match kind.ptset() {
            Some(previous) => previous.map(|p| p.node),
            None => {
                return Err(Error::invalid(
                    "point sets are not allowed at the current position",
                ))
            }
        };

        let dim = if matches!(set_type, PointSetType::ElementList | PointSetType::ElementRange) {
            1
        } else {
            index_dim
        };
        let npts = points.len() / dim.max(1);
        ptset::validate(set_type, index_dim, npts, points.len(), 1, allow_empty)?;

        let node = self.node_of(handle)?;
        if let Some(previous) = previous {
            if self.mode != Mode::Modify {
                return Err(Error::invalid("the entity already has a point set"));
            }
            self.store.delete_node(node, previous)?;
        }

        let index_type = self.index_type();
        let written = ptset::write(
            self.store.as_mut(),
            node,
            set_type.as_str(),
            set_type,
            index_dim,
            points,
            index_type,
        )?;
        if let Some(slot) = self.tree.kind_mut(handle)?.ptset_mut() {
            *slot = Some(written);
        }
        Ok(())
    }

    pub fn ptset_info(&self) -> Result<Option<PointSetInfo>, Error> {
        reported!(self, {
            let handle = self.current()?;
            match self.tree.kind(handle)?.ptset() {
                Some(ptset) => Ok(ptset.map(PointSetInfo::from)),
                None => Err(Error::invalid("no point set at the current position")),
            }
        })
    }

    pub fn ptset_read(&self) -> Result<Vec<i64>, Error> {
        reported!(self, {
            let handle = self.current()?;
            match self.tree.kind(handle)?.ptset() {
                Some(Some(ptset)) => ptset::read(self.store.as_ref(), ptset),
                _ => Err(Error::invalid("no point set at the current position")),
            }
        })
    }

    /// write a whole array of extents `dims` at the current position. Returns its index
    pub fn array_write<T: Scalar>(
        &mut self,
        name: &str,
        dims: &[usize],
        data: &[T],
    ) -> Result<usize, Error> {
        reported!(self, {
            self.writable("write an array")?;
            let container = self.current_container()?;
            if let Some(expected) = self.container_dims(container)? {
                if expected != dims {
                    return Err(Error::invalid(format!(
                        "arrays at the current position have extents {expected:?}, not {dims:?}"
                    )));
                }
            }
            let handle = self.write_full_array(container, name, T::DATA_TYPE, dims, data)?;
            self.tree.ordinal(handle)
        })
    }

    /// write a window of an array of extents `dims` stored as `file_type`, honouring the
    /// rind planes of the current position
    #[allow(clippy::too_many_arguments)]
    pub fn array_general_write<T: Scalar>(
        &mut self,
        name: &str,
        file_type: DataType,
        dims: &[usize],
        rmin: &[i64],
        rmax: &[i64],
        memory: &MemorySpace,
        data: &[T],
    ) -> Result<usize, Error> {
        reported!(self, {
            self.writable("write an array")?;
            let container = self.current_container()?;
            if let Some(expected) = self.container_dims(container)? {
                if expected != dims {
                    return Err(Error::invalid(format!(
                        "arrays at the current position have extents {expected:?}, not {dims:?}"
                    )));
                }
            }
            let handle = self.write_array_window_sized(
                container, name, file_type, dims, rmin, rmax, memory, data,
            )?;
            self.tree.ordinal(handle)
        })
    }

    pub fn narrays(&self) -> Result<usize, Error> {
        reported!(self, {
            let container = self.current_container()?;
            self.tree.count(container, Label::DataArray)
        })
    }

    pub fn array_info(&self, array: usize) -> Result<ArrayInfo, Error> {
        reported!(self, {
            let container = self.current_container()?;
            let handle = self.nth(container, Label::DataArray, array, "array")?;
            self.array_info_of(handle)
        })
    }

    /// the whole array in its stored type
    pub fn array_read(&self, array: usize) -> Result<DataBuffer, Error> {
        reported!(self, {
            let container = self.current_container()?;
            let handle = self.nth(container, Label::DataArray, array, "array")?;
            self.array_field(handle)?.read_all(self.store.as_ref())
        })
    }

    /// the whole array converted to `T`
    pub fn array_read_as<T: Scalar>(&self, array: usize, out: &mut [T]) -> Result<(), Error> {
        reported!(self, {
            let container = self.current_container()?;
            let handle = self.nth(container, Label::DataArray, array, "array")?;
            let field = self.array_field(handle)?;
            let rmin = vec![1; field.dims.len()];
            let rmax: Vec<i64> = field.dims.iter().map(|d| *d as i64).collect();
            let plan = transfer::verify_range(
                &field.dims,
                &Rind::none(field.dims.len()),
                crate::config::RindConvention::Zero,
                &rmin,
                &rmax,
                &MemorySpace::contiguous(out.len()),
            )?;
            transfer::general_read(self.store.as_ref(), field, &plan, out)
        })
    }

    /// read a window of an array, honouring the rind planes of the current position
    pub fn array_general_read<T: Scalar>(
        &self,
        array: usize,
        rmin: &[i64],
        rmax: &[i64],
        memory: &MemorySpace,
        out: &mut [T],
    ) -> Result<(), Error> {
        reported!(self, {
            let container = self.current_container()?;
            let handle = self.nth(container, Label::DataArray, array, "array")?;
            self.read_array_window(container, handle, rmin, rmax, memory, out)
        })
    }

    pub fn descriptor_write(&mut self, name: &str, text: &str) -> Result<(), Error> {
        reported!(self, {
            self.writable("write a descriptor")?;
            let handle = self.current()?;
            let text = text.to_string();
            self.create_entity(handle, name, Label::Descriptor, |store, node| {
                store.set_dimensions(node, DataType::Character, &[text.len()])?;
                store.write_all_data(node, &DataBuffer::from_text(&text))?;
                Ok(EntityKind::Descriptor(text))
            })?;
            Ok(())
        })
    }

    pub fn ndescriptors(&self) -> Result<usize, Error> {
        reported!(self, {
            let handle = self.current()?;
            self.tree.count(handle, Label::Descriptor)
        })
    }

    /// name and text of the `descriptor`-th descriptor
    pub fn descriptor_read(&self, descriptor: usize) -> Result<(String, String), Error> {
        reported!(self, {
            let handle = self.current()?;
            let child = self.nth(handle, Label::Descriptor, descriptor, "descriptor")?;
            let entity = self.tree.get(child)?;
            match &entity.kind {
                EntityKind::Descriptor(text) => Ok((entity.name().to_string(), text.clone())),
                _ => Err(Error::internal("descriptor handle points elsewhere")),
            }
        })
    }

    /// add a user defined data container at the current position
    pub fn user_data_write(&mut self, name: &str) -> Result<usize, Error> {
        reported!(self, {
            self.writable("write user data")?;
            let handle = self.current()?;
            let child = self.create_entity(handle, name, Label::UserDefinedData, |_, _| {
                Ok(EntityKind::UserDefinedData(UserData {
                    location: GridLocation::Vertex,
                    ptset: None,
                }))
            })?;
            self.tree.ordinal(child)
        })
    }

    pub fn nuser_data(&self) -> Result<usize, Error> {
        reported!(self, {
            let handle = self.current()?;
            self.tree.count(handle, Label::UserDefinedData)
        })
    }

    pub fn gridlocation_write(&mut self, location: GridLocation) -> Result<(), Error> {
        reported!(self, {
            self.writable("write a grid location")?;
            let handle = self.current()?;
            if self.tree.kind(handle)?.location().is_none() {
                return Err(Error::invalid(
                    "a grid location is not allowed at the current position",
                ));
            }
            let node = self.node_of(handle)?;
            let text = location.as_str();
            write_text(self.store.as_mut(), node, GRID_LOCATION_NODE, "GridLocation_t", text)?;
            if let Some(current) = self.tree.kind_mut(handle)?.location_mut() {
                *current = location;
            }
            Ok(())
        })
    }

    pub fn gridlocation_read(&self) -> Result<GridLocation, Error> {
        reported!(self, {
            let handle = self.current()?;
            self.tree
                .kind(handle)?
                .location()
                .ok_or_else(|| Error::invalid("no grid location at the current position"))
        })
    }

    /// delete the child `name` of the current position and everything below it
    pub fn delete_node(&mut self, name: &str) -> Result<(), Error> {
        reported!(self, {
            self.writable("delete a node")?;
            let handle = self.current()?;
            if let Some(child) = self.tree.child_named(handle, name)? {
                self.remove_entity(child)?;
                log::debug!("deleted `{name}`");
                return Ok(());
            }

            let node = self.node_of(handle)?;
            let child = self.store.node_id(node, name)?;
            self.store.delete_node(node, child)?;

            let index_dim = self.index_dim_at(handle).unwrap_or(1);
            let kind = self.tree.kind_mut(handle)?;
            if name == RIND_NODE {
                if let Some(rind) = kind.rind_mut() {
                    *rind = Rind::none(index_dim);
                }
            } else if name == GRID_LOCATION_NODE {
                if let Some(location) = kind.location_mut() {
                    *location = GridLocation::Vertex;
                }
            } else if let Some(slot) = kind.ptset_mut() {
                if slot.as_ref().map(|p| p.node) == Some(child) {
                    *slot = None;
                }
            }
            log::debug!("deleted node `{name}`");
            Ok(())
        })
    }

    /// create the link `name` at the current position pointing to `path` in `file`, an
    /// empty file name meaning this file
    pub fn link_write(&mut self, name: &str, file: &str, path: &str) -> Result<(), Error> {
        reported!(self, {
            self.writable("write a link")?;
            if !path.starts_with('/') {
                return Err(Error::invalid(format!(
                    "link target `{path}` must be an absolute path"
                )));
            }
            let handle = self.current()?;
            if self.tree.child_named(handle, name)?.is_some() {
                return Err(Error::invalid(format!("`{name}` already exists")));
            }
            let node = self.node_of(handle)?;
            let link = self.store.create_link(node, name, file, path)?;
            if file.is_empty() {
                self.mirror_node(handle, link)?;
            }
            Ok(())
        })
    }

    pub fn is_link(&self, name: &str) -> Result<bool, Error> {
        reported!(self, {
            let node = self.node_of(self.current()?)?;
            let child = self.store.node_id(node, name)?;
            Ok(self.store.link(child)?.is_some())
        })
    }

    pub fn link_read(&self, name: &str) -> Result<Link, Error> {
        reported!(self, {
            let node = self.node_of(self.current()?)?;
            let child = self.store.node_id(node, name)?;
            self.store
                .link(child)?
                .ok_or_else(|| Error::invalid(format!("`{name}` is not a link")))
        })
    }
}
