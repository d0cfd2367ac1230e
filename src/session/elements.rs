//! Element sections of a zone.
//!
//! Fixed size element types go through [`Session::section_write`] and the non `poly_`
//! accessors, MIXED, NGON_n and NFACE_n through the `poly_` ones, which carry an offset
//! array next to the connectivity.

use super::Session;
use crate::names::ElementType;
use crate::prelude::*;
use crate::section::{NewSection, Section, SectionState};
use crate::tree::{EntityKind, Handle, Label};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionInfo {
    pub name: String,
    pub element_type: ElementType,
    pub start: i64,
    pub end: i64,
    pub nbndry: usize,
    /// `true` when parent elements are stored
    pub has_parents: bool,
    pub state: SectionState,
}

fn require_fixed(element_type: ElementType) -> Result<(), Error> {
    if element_type.is_variable() {
        return Err(Error::invalid(format!(
            "{element_type} sections need offsets, use the poly accessors"
        )));
    }
    Ok(())
}

fn require_variable(element_type: ElementType) -> Result<(), Error> {
    if !element_type.is_variable() {
        return Err(Error::invalid(format!("{element_type} sections have no offsets")));
    }
    Ok(())
}

impl Session {
    fn section_handle(&self, base: usize, zone: usize, section: usize) -> Result<Handle, Error> {
        let zone = self.zone_handle(base, zone)?;
        self.nth(zone, Label::Elements, section, "section")
    }

    fn section(&self, handle: Handle) -> Result<&Section, Error> {
        match self.tree.kind(handle)? {
            EntityKind::Elements(section) => Ok(section),
            _ => Err(Error::internal("handle does not refer to a section")),
        }
    }

    /// run `f` on a section together with the store
    fn with_section<R, F>(&mut self, handle: Handle, f: F) -> Result<R, Error>
    where
        F: FnOnce(&mut Section, &mut dyn NodeStore) -> Result<R, Error>,
    {
        let section = match self.tree.kind_mut(handle)? {
            EntityKind::Elements(section) => section,
            _ => return Err(Error::internal("handle does not refer to a section")),
        };
        f(section, self.store.as_mut())
    }

    #[allow(clippy::too_many_arguments)]
    fn create_section(
        &mut self,
        base: usize,
        zone: usize,
        name: &str,
        element_type: ElementType,
        start: i64,
        end: i64,
        nbndry: usize,
        connectivity: &[i64],
        offsets: Option<&[i64]>,
    ) -> Result<usize, Error> {
        self.writable("write a section")?;
        let zone = self.zone_handle(base, zone)?;
        let header = NewSection {
            name,
            element_type,
            start,
            end,
            nbndry,
            index_type: self.index_type(),
        };
        let handle = self.create_entity(zone, name, Label::Elements, |store, node| {
            Ok(EntityKind::Elements(Section::create(store, node, &header, connectivity, offsets)?))
        })?;
        self.tree.ordinal(handle)
    }

    /// add a section of a fixed size element type with all its connectivity
    #[allow(clippy::too_many_arguments)]
    pub fn section_write(
        &mut self,
        base: usize,
        zone: usize,
        name: &str,
        element_type: ElementType,
        start: i64,
        end: i64,
        nbndry: usize,
        connectivity: &[i64],
    ) -> Result<usize, Error> {
        reported!(self, {
            require_fixed(element_type)?;
            self.create_section(
                base,
                zone,
                name,
                element_type,
                start,
                end,
                nbndry,
                connectivity,
                None,
            )
        })
    }

    /// add a MIXED, NGON_n or NFACE_n section. `offsets` holds `end - start + 2` values
    #[allow(clippy::too_many_arguments)]
    pub fn poly_section_write(
        &mut self,
        base: usize,
        zone: usize,
        name: &str,
        element_type: ElementType,
        start: i64,
        end: i64,
        nbndry: usize,
        connectivity: &[i64],
        offsets: &[i64],
    ) -> Result<usize, Error> {
        reported!(self, {
            require_variable(element_type)?;
            self.create_section(
                base,
                zone,
                name,
                element_type,
                start,
                end,
                nbndry,
                connectivity,
                Some(offsets),
            )
        })
    }

    /// add a section with `data_size` connectivity values reserved, to be filled by partial
    /// writes. Variable sized sections must be initialized first
    #[allow(clippy::too_many_arguments)]
    pub fn section_general_write(
        &mut self,
        base: usize,
        zone: usize,
        name: &str,
        element_type: ElementType,
        start: i64,
        end: i64,
        data_size: usize,
        nbndry: usize,
    ) -> Result<usize, Error> {
        reported!(self, {
            self.writable("write a section")?;
            let zone = self.zone_handle(base, zone)?;
            let header = NewSection {
                name,
                element_type,
                start,
                end,
                nbndry,
                index_type: self.index_type(),
            };
            let handle = self.create_entity(zone, name, Label::Elements, |store, node| {
                Ok(EntityKind::Elements(Section::declare(store, node, &header, data_size)?))
            })?;
            self.tree.ordinal(handle)
        })
    }

    /// fill every element of a section with a placeholder
    pub fn section_initialize(
        &mut self,
        base: usize,
        zone: usize,
        section: usize,
    ) -> Result<(), Error> {
        reported!(self, {
            self.writable("initialize a section")?;
            let handle = self.section_handle(base, zone, section)?;
            self.with_section(handle, |section, store| section.initialize(store))
        })
    }

    pub fn nsections(&self, base: usize, zone: usize) -> Result<usize, Error> {
        reported!(self, {
            let zone = self.zone_handle(base, zone)?;
            self.tree.count(zone, Label::Elements)
        })
    }

    pub fn section_read(
        &self,
        base: usize,
        zone: usize,
        section: usize,
    ) -> Result<SectionInfo, Error> {
        reported!(self, {
            let s = self.section(self.section_handle(base, zone, section)?)?;
            Ok(SectionInfo {
                name: s.name.clone(),
                element_type: s.element_type,
                start: s.start,
                end: s.end,
                nbndry: s.nbndry,
                has_parents: s.parents.is_some(),
                state: s.state,
            })
        })
    }

    /// number of connectivity values of a section
    pub fn element_data_size(
        &self,
        base: usize,
        zone: usize,
        section: usize,
    ) -> Result<usize, Error> {
        reported!(self, {
            let s = self.section(self.section_handle(base, zone, section)?)?;
            s.data_size(self.store.as_ref())
        })
    }

    pub fn elements_read(
        &self,
        base: usize,
        zone: usize,
        section: usize,
    ) -> Result<Vec<i64>, Error> {
        reported!(self, {
            let s = self.section(self.section_handle(base, zone, section)?)?;
            require_fixed(s.element_type)?;
            Ok(s.read(self.store.as_ref())?.0)
        })
    }

    /// connectivity and offsets, the offsets starting at 0
    pub fn poly_elements_read(
        &self,
        base: usize,
        zone: usize,
        section: usize,
    ) -> Result<(Vec<i64>, Vec<i64>), Error> {
        reported!(self, {
            let s = self.section(self.section_handle(base, zone, section)?)?;
            require_variable(s.element_type)?;
            match s.read(self.store.as_ref())? {
                (connectivity, Some(offsets)) => Ok((connectivity, offsets)),
                (_, None) => Err(Error::Uninitialized(s.name.clone())),
            }
        })
    }

    pub fn elements_partial_read(
        &self,
        base: usize,
        zone: usize,
        section: usize,
        start: i64,
        end: i64,
    ) -> Result<Vec<i64>, Error> {
        reported!(self, {
            let s = self.section(self.section_handle(base, zone, section)?)?;
            require_fixed(s.element_type)?;
            Ok(s.read_partial(self.store.as_ref(), start, end)?.0)
        })
    }

    pub fn poly_elements_partial_read(
        &self,
        base: usize,
        zone: usize,
        section: usize,
        start: i64,
        end: i64,
    ) -> Result<(Vec<i64>, Vec<i64>), Error> {
        reported!(self, {
            let s = self.section(self.section_handle(base, zone, section)?)?;
            require_variable(s.element_type)?;
            match s.read_partial(self.store.as_ref(), start, end)? {
                (connectivity, Some(offsets)) => Ok((connectivity, offsets)),
                (_, None) => Err(Error::Uninitialized(s.name.clone())),
            }
        })
    }

    /// write elements `[start, end]` of a fixed size section. A range reaching outside the
    /// section grows it, filling any gap with zeros
    #[allow(clippy::too_many_arguments)]
    pub fn elements_partial_write(
        &mut self,
        base: usize,
        zone: usize,
        section: usize,
        start: i64,
        end: i64,
        connectivity: &[i64],
    ) -> Result<(), Error> {
        reported!(self, {
            self.writable("write elements")?;
            let handle = self.section_handle(base, zone, section)?;
            require_fixed(self.section(handle)?.element_type)?;
            self.with_section(handle, |s, store| {
                s.write_partial(store, start, end, connectivity, None)
            })
        })
    }

    /// write elements `[start, end]` of a variable sized section
    #[allow(clippy::too_many_arguments)]
    pub fn poly_elements_partial_write(
        &mut self,
        base: usize,
        zone: usize,
        section: usize,
        start: i64,
        end: i64,
        connectivity: &[i64],
        offsets: &[i64],
    ) -> Result<(), Error> {
        reported!(self, {
            self.writable("write elements")?;
            let handle = self.section_handle(base, zone, section)?;
            require_variable(self.section(handle)?.element_type)?;
            self.with_section(handle, |s, store| {
                s.write_partial(store, start, end, connectivity, Some(offsets))
            })
        })
    }

    /// parent elements and positions of every element, `[n, 2]` each in Fortran order
    pub fn parent_data_write(
        &mut self,
        base: usize,
        zone: usize,
        section: usize,
        elements: &[i64],
        positions: &[i64],
    ) -> Result<(), Error> {
        reported!(self, {
            self.writable("write parent data")?;
            let handle = self.section_handle(base, zone, section)?;
            let index_type = self.index_type();
            self.with_section(handle, |s, store| {
                s.write_parents(store, index_type, elements, positions)
            })
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn parent_data_partial_write(
        &mut self,
        base: usize,
        zone: usize,
        section: usize,
        start: i64,
        end: i64,
        elements: &[i64],
        positions: &[i64],
    ) -> Result<(), Error> {
        reported!(self, {
            self.writable("write parent data")?;
            let handle = self.section_handle(base, zone, section)?;
            let index_type = self.index_type();
            self.with_section(handle, |s, store| {
                s.write_parents_partial(store, index_type, start, end, elements, positions)
            })
        })
    }

    /// parent elements and positions, `None` when none are stored
    pub fn parent_data_read(
        &self,
        base: usize,
        zone: usize,
        section: usize,
    ) -> Result<Option<(Vec<i64>, Vec<i64>)>, Error> {
        reported!(self, {
            let s = self.section(self.section_handle(base, zone, section)?)?;
            s.read_parents(self.store.as_ref())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::ZoneType;

    fn session() -> (Session, usize, usize) {
        let mut session = Session::diskless(Config::new()).unwrap();
        let b = session.base_write("Base", 3, 3).unwrap();
        let z = session
            .zone_write(b, "Cloud", &[20, 10, 0], ZoneType::Unstructured)
            .unwrap();
        (session, b, z)
    }

    #[test]
    fn accessors_match_the_element_kind() {
        let (mut session, b, z) = session();
        assert!(session
            .section_write(b, z, "Mixed", ElementType::Mixed, 1, 1, 0, &[5, 1, 2, 3])
            .is_err());
        assert!(session
            .poly_section_write(b, z, "Tris", ElementType::Tri3, 1, 1, 0, &[1, 2, 3], &[0, 3])
            .is_err());

        let s = session
            .section_write(b, z, "Tris", ElementType::Tri3, 1, 2, 0, &[1, 2, 3, 2, 3, 4])
            .unwrap();
        assert!(session.poly_elements_read(b, z, s).is_err());
        assert_eq!(session.elements_read(b, z, s).unwrap(), vec![1, 2, 3, 2, 3, 4]);
        assert_eq!(session.elements_partial_read(b, z, s, 2, 2).unwrap(), vec![2, 3, 4]);
        assert_eq!(session.element_data_size(b, z, s).unwrap(), 6);
    }

    #[test]
    fn polygons_grow_through_partial_writes() {
        let (mut session, b, z) = session();
        let faces = [1, 2, 3, 1, 3, 4, 5];
        let s = session
            .poly_section_write(b, z, "Faces", ElementType::NGon, 1, 2, 0, &faces, &[0, 3, 7])
            .unwrap();

        session
            .poly_elements_partial_write(b, z, s, 3, 3, &[4, 5, 6], &[0, 3])
            .unwrap();
        let info = session.section_read(b, z, s).unwrap();
        assert_eq!((info.start, info.end), (1, 3));
        assert_eq!(session.element_data_size(b, z, s).unwrap(), 10);

        let (connectivity, offsets) = session.poly_elements_partial_read(b, z, s, 2, 3).unwrap();
        assert_eq!(connectivity, vec![1, 3, 4, 5, 4, 5, 6]);
        assert_eq!(offsets, vec![0, 4, 7]);
    }

    #[test]
    fn parent_data_in_pieces() {
        let (mut session, b, z) = session();
        let s = session
            .section_write(b, z, "Bars", ElementType::Bar2, 1, 3, 0, &[1, 2, 2, 3, 3, 4])
            .unwrap();
        assert_eq!(session.parent_data_read(b, z, s).unwrap(), None);

        session
            .parent_data_partial_write(b, z, s, 2, 3, &[7, 8, 0, 0], &[1, 2, 0, 0])
            .unwrap();
        let (elements, positions) = session.parent_data_read(b, z, s).unwrap().unwrap();
        assert_eq!(elements, vec![0, 7, 8, 0, 0, 0]);
        assert_eq!(positions, vec![0, 1, 2, 0, 0, 0]);
        assert!(session.section_read(b, z, s).unwrap().has_parents);

        assert!(session
            .parent_data_write(b, z, s, &[1, 2], &[1, 2])
            .is_err());
    }

    #[test]
    fn fixed_sections_declared_then_filled() {
        let (mut session, b, z) = session();
        assert!(session
            .section_general_write(b, z, "Quads", ElementType::Quad4, 1, 2, 7, 0)
            .is_err());
        let s = session
            .section_general_write(b, z, "Quads", ElementType::Quad4, 1, 2, 8, 0)
            .unwrap();
        session
            .elements_partial_write(b, z, s, 2, 2, &[5, 6, 7, 8])
            .unwrap();
        assert_eq!(session.elements_read(b, z, s).unwrap(), vec![0, 0, 0, 0, 5, 6, 7, 8]);
        assert_eq!(session.section_read(b, z, s).unwrap().state, SectionState::Populated);
    }
}
