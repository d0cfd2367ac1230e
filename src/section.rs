//! Element sections and the connectivity codec.
//!
//! A section stores the connectivity of elements `[start, end]` in one flat array. For
//! fixed size element types every element takes `nodes_per_element` values. MIXED, NGON_n
//! and NFACE_n sections also carry an `ElementStartOffset` array of `n + 1` values; element
//! `k` occupies `connectivity[offsets[k] - offsets[0]..offsets[k + 1] - offsets[0]]`. In a
//! MIXED section each element starts with its element type code.
//!
//! Partial writes that change lengths or grow the range rebuild both arrays completely:
//! the untouched leading and trailing elements are copied around the new run, gaps are
//! filled with placeholder elements and every buffer is validated before the first store
//! write. The in-memory section is only updated once all store writes succeeded.

use crate::array::{self, DataBuffer, DataType};
use crate::config::RindConvention;
use crate::names::ElementType;
use crate::prelude::*;
use crate::store::StoreError;
use crate::transfer::{self, ArrayField, MemorySpace, Rind};

pub(crate) const RANGE_NODE: &str = "ElementRange";
pub(crate) const CONNECTIVITY_NODE: &str = "ElementConnectivity";
pub(crate) const OFFSET_NODE: &str = "ElementStartOffset";
pub(crate) const PARENT_ELEMENTS_NODE: &str = "ParentElements";
pub(crate) const PARENT_POSITION_NODE: &str = "ParentElementsPosition";

/// how far a section has been filled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionState {
    /// connectivity capacity reserved, no offsets yet
    Declared,
    /// every element is a placeholder
    Initialized,
    Populated,
}

/// the placeholder element: `[NODE, 0]` for MIXED, `[0, 0]` for NGON_n and NFACE_n,
/// zeros for fixed size types
fn filler(element_type: ElementType) -> Vec<i64> {
    match element_type {
        ElementType::Mixed => vec![ElementType::Node.code() as i64, 0],
        ElementType::NGon | ElementType::NFace => vec![0, 0],
        fixed => vec![0; fixed.nodes_per_element()],
    }
}

fn overflow(what: &str) -> Error {
    Error::Overflow(what.to_string())
}

/// number of connectivity values of `n` elements
///
/// Fixed size types need `n * nodes_per_element`. With offsets available the size is
/// `offsets[n] - offsets[0]`. Otherwise a MIXED connectivity is walked tag by tag and a
/// NGON_n / NFACE_n one through its count prefixes. Without either array the size is 0.
pub fn compute_data_size(
    element_type: ElementType,
    n: usize,
    connectivity: Option<&[i64]>,
    offsets: Option<&[i64]>,
) -> Result<usize, Error> {
    if !element_type.is_variable() {
        let npe = element_type.nodes_per_element();
        if npe == 0 {
            return Err(Error::invalid(format!("{element_type} has no defined size")));
        }
        return n.checked_mul(npe).ok_or_else(|| overflow("connectivity size"));
    }

    if let Some(offsets) = offsets {
        if offsets.len() <= n {
            return Err(Error::invalid(format!(
                "{n} elements need {} offsets, got {}",
                n + 1,
                offsets.len()
            )));
        }
        let span = offsets[n]
            .checked_sub(offsets[0])
            .ok_or_else(|| overflow("element offsets"))?;
        return usize::try_from(span).map_err(|_| Error::invalid("element offsets decrease"));
    }

    let connectivity = match connectivity {
        Some(connectivity) => connectivity,
        None => return Ok(0),
    };

    let mut position = 0usize;
    for element in 0..n {
        let head = *connectivity
            .get(position)
            .ok_or_else(|| {
                Error::invalid(format!("connectivity ends inside element {}", element + 1))
            })?;
        let len = match element_type {
            ElementType::Mixed => mixed_element_len(head)?,
            _ => usize::try_from(head).map_err(|_| {
                Error::invalid(format!("negative face count {head} in element {}", element + 1))
            })?,
        };
        position = position
            .checked_add(len)
            .and_then(|p| p.checked_add(1))
            .ok_or_else(|| overflow("connectivity size"))?;
    }

    if position > connectivity.len() {
        return Err(Error::invalid(format!(
            "connectivity holds {} values, its elements need {position}",
            connectivity.len()
        )));
    }
    Ok(position)
}

/// nodes following the type tag of a MIXED element
fn mixed_element_len(tag: i64) -> Result<usize, Error> {
    let element_type = ElementType::from_code(tag)?;
    let npe = element_type.nodes_per_element();
    if element_type.is_variable() || npe == 0 {
        return Err(Error::invalid(format!("{element_type} cannot appear in a MIXED section")));
    }
    Ok(npe)
}

/// placeholder connectivity and offsets of `n` elements
pub(crate) fn placeholder(
    element_type: ElementType,
    n: usize,
) -> Result<(Vec<i64>, Option<Vec<i64>>), Error> {
    let element = filler(element_type);
    let len = n
        .checked_mul(element.len())
        .ok_or_else(|| overflow("placeholder connectivity"))?;

    let mut connectivity = Vec::with_capacity(len);
    (0..n).for_each(|_| connectivity.extend_from_slice(&element));

    let offsets = element_type
        .is_variable()
        .then(|| (0..=n).map(|k| (k * element.len()) as i64).collect());

    Ok((connectivity, offsets))
}

/// whether the stored arrays are exactly what `initialize` writes for `n` elements
fn holds_placeholders(
    store: &dyn NodeStore,
    element_type: ElementType,
    n: usize,
    connectivity: &ArrayField,
    offsets: Option<&ArrayField>,
) -> Result<bool, Error> {
    let expected = filler(element_type);
    if connectivity.len() != n.saturating_mul(expected.len()) {
        return Ok(false);
    }
    if let Some(field) = offsets {
        if field.len() != n + 1 {
            return Ok(false);
        }
        let stored = match field.read_all(store)?.to_indices() {
            Some(stored) => stored,
            None => return Ok(false),
        };
        let step = expected.len() as i64;
        let evenly_spaced = stored
            .windows(2)
            .all(|pair| pair[1].checked_sub(pair[0]) == Some(step));
        if !evenly_spaced {
            return Ok(false);
        }
    }
    let stored = match connectivity.read_all(store)?.to_indices() {
        Some(stored) => stored,
        None => return Ok(false),
    };
    Ok(stored
        .chunks(expected.len().max(1))
        .all(|element| element == expected.as_slice()))
}

/// offsets must have `n + 1` non-decreasing entries spanning exactly `len` values
pub(crate) fn check_offsets(offsets: &[i64], n: usize, len: usize) -> Result<(), Error> {
    if offsets.len() != n + 1 {
        return Err(Error::invalid(format!(
            "{n} elements need {} offsets, got {}",
            n + 1,
            offsets.len()
        )));
    }
    if offsets.windows(2).any(|w| w[1] < w[0]) {
        return Err(Error::invalid("element offsets must not decrease"));
    }
    let span = offsets[n]
        .checked_sub(offsets[0])
        .ok_or_else(|| overflow("element offsets"))?;
    if usize::try_from(span).ok() != Some(len) {
        return Err(Error::invalid(format!(
            "offsets span {span} values but the connectivity holds {len}"
        )));
    }
    Ok(())
}

/// consecutive elements `[start, end]` and their connectivity
#[derive(Debug, Clone, Copy)]
pub(crate) struct Run<'a> {
    pub(crate) start: i64,
    pub(crate) end: i64,
    pub(crate) connectivity: &'a [i64],
    pub(crate) offsets: Option<&'a [i64]>,
}

impl<'a> Run<'a> {
    fn contains(&self, index: i64) -> bool {
        index >= self.start && index <= self.end
    }

    /// values of element `index`. The run must be validated
    fn element(&self, index: i64, npe: usize) -> &'a [i64] {
        let k = (index - self.start) as usize;
        match self.offsets {
            Some(offsets) => {
                let lo = (offsets[k] - offsets[0]) as usize;
                let hi = (offsets[k + 1] - offsets[0]) as usize;
                &self.connectivity[lo..hi]
            }
            None => &self.connectivity[k * npe..(k + 1) * npe],
        }
    }

    /// check the run is self consistent for `element_type`
    fn validate(&self, element_type: ElementType) -> Result<(), Error> {
        if self.end < self.start {
            return Err(Error::invalid(format!(
                "element range [{}, {}] is empty",
                self.start, self.end
            )));
        }
        let n = usize::try_from(self.end - self.start + 1).map_err(|_| overflow("element count"))?;

        if !element_type.is_variable() {
            let expected = compute_data_size(element_type, n, None, None)?;
            if self.connectivity.len() != expected {
                return Err(Error::invalid(format!(
                    "{n} {element_type} elements need {expected} values, got {}",
                    self.connectivity.len()
                )));
            }
            return Ok(());
        }

        let offsets = self
            .offsets
            .ok_or_else(|| Error::invalid(format!("{element_type} elements need offsets")))?;
        check_offsets(offsets, n, self.connectivity.len())?;

        if element_type == ElementType::Mixed {
            for index in self.start..=self.end {
                let element = self.element(index, 0);
                let tag = element
                    .first()
                    .ok_or_else(|| Error::invalid(format!("MIXED element {index} is empty")))?;
                let npe = mixed_element_len(*tag)?;
                if element.len() != npe + 1 {
                    return Err(Error::invalid(format!(
                        "MIXED element {index} holds {} values, its type needs {}",
                        element.len(),
                        npe + 1
                    )));
                }
            }
        }

        Ok(())
    }
}

/// connectivity of a section after a splice
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spliced {
    pub(crate) start: i64,
    pub(crate) end: i64,
    pub(crate) connectivity: Vec<i64>,
    pub(crate) offsets: Option<Vec<i64>>,
}

fn pick<'a>(index: i64, old: &Run<'a>, new: &Run<'a>, filler: &'a [i64], npe: usize) -> &'a [i64] {
    if new.contains(index) {
        new.element(index, npe)
    } else if old.contains(index) {
        old.element(index, npe)
    } else {
        filler
    }
}

/// replace the elements of `new` inside `old`, growing the range to the union of both
pub(crate) fn splice(
    element_type: ElementType,
    old: &Run<'_>,
    new: &Run<'_>,
) -> Result<Spliced, Error> {
    old.validate(element_type)?;
    new.validate(element_type)?;

    let npe = element_type.nodes_per_element();
    let start = old.start.min(new.start);
    let end = old.end.max(new.end);
    let count = usize::try_from(end - start + 1).map_err(|_| overflow("element count"))?;
    let filler = filler(element_type);

    let expected = (start..=end)
        .try_fold(0usize, |acc, index| acc.checked_add(pick(index, old, new, &filler, npe).len()))
        .ok_or_else(|| overflow("spliced connectivity"))?;

    let mut connectivity = Vec::with_capacity(expected);
    let mut offsets = element_type.is_variable().then(|| {
        let mut offsets = Vec::with_capacity(count + 1);
        offsets.push(0);
        offsets
    });

    for index in start..=end {
        connectivity.extend_from_slice(pick(index, old, new, &filler, npe));
        if let Some(offsets) = offsets.as_mut() {
            offsets.push(connectivity.len() as i64);
        }
    }

    if connectivity.len() != expected {
        return Err(Error::internal(format!(
            "spliced connectivity holds {} values, expected {expected}",
            connectivity.len()
        )));
    }
    if let Some(offsets) = &offsets {
        check_offsets(offsets, count, connectivity.len())
            .map_err(|e| Error::internal(format!("spliced offsets are inconsistent: {e}")))?;
    }

    log::debug!(
        "spliced {element_type} elements [{}, {}] into [{}, {}], {} -> {} values",
        new.start,
        new.end,
        old.start,
        old.end,
        old.connectivity.len(),
        connectivity.len()
    );

    Ok(Spliced {
        start,
        end,
        connectivity,
        offsets,
    })
}

/// resize a `[n, 2]` parent array from `[old_start, old_end]` to `[start, end]`. Values of
/// elements that existed before are kept, new elements get zeros
pub(crate) fn splice_parents(
    values: &[i64],
    old_start: i64,
    old_end: i64,
    start: i64,
    end: i64,
) -> Vec<i64> {
    let old_n = (old_end - old_start + 1) as usize;
    let n = (end - start + 1) as usize;
    let mut out = vec![0; 2 * n];

    for column in 0..2 {
        for index in old_start.max(start)..=old_end.min(end) {
            let from = column * old_n + (index - old_start) as usize;
            let to = column * n + (index - start) as usize;
            if let Some(value) = values.get(from) {
                out[to] = *value;
            }
        }
    }

    out
}

fn optional_child(
    store: &dyn NodeStore,
    parent: NodeId,
    name: &str,
) -> Result<Option<NodeId>, Error> {
    match store.node_id(parent, name) {
        Ok(id) => Ok(Some(id)),
        Err(StoreError::NoChild { .. }) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// parent array `field` resized to `new` and converted to its stored type
fn resized_parent(
    store: &dyn NodeStore,
    field: Option<&ArrayField>,
    old: (i64, i64),
    new: (i64, i64),
) -> Result<Option<(ArrayField, DataBuffer)>, Error> {
    let field = match field {
        Some(field) => field,
        None => return Ok(None),
    };
    let values = field.read_indices(store)?;
    let values = splice_parents(&values, old.0, old.1, new.0, new.1);
    Ok(Some((field.clone(), indices(&values, field.data_type)?)))
}

fn indices(values: &[i64], data_type: DataType) -> Result<DataBuffer, Error> {
    Ok(DataBuffer::from_indices(values, data_type)?)
}

/// header of a section about to be created
#[derive(Debug, Clone)]
pub(crate) struct NewSection<'a> {
    pub(crate) name: &'a str,
    pub(crate) element_type: ElementType,
    pub(crate) start: i64,
    pub(crate) end: i64,
    pub(crate) nbndry: usize,
    pub(crate) index_type: DataType,
}

impl NewSection<'_> {
    fn count(&self) -> Result<usize, Error> {
        if self.start < 1 || self.end < self.start {
            return Err(Error::invalid(format!(
                "invalid element range [{}, {}] for section `{}`",
                self.start, self.end, self.name
            )));
        }
        let n = usize::try_from(self.end - self.start + 1).map_err(|_| overflow("element count"))?;
        if self.nbndry > n {
            return Err(Error::invalid(format!(
                "{} boundary elements in a section of {n}",
                self.nbndry
            )));
        }
        if matches!(self.element_type, ElementType::Null | ElementType::UserDefined) {
            return Err(Error::invalid(format!(
                "sections of {} cannot be written",
                self.element_type
            )));
        }
        Ok(n)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Section {
    pub(crate) name: String,
    /// the `Elements_t` node
    pub(crate) node: NodeId,
    pub(crate) element_type: ElementType,
    pub(crate) start: i64,
    pub(crate) end: i64,
    pub(crate) nbndry: usize,
    pub(crate) state: SectionState,
    pub(crate) range_node: NodeId,
    pub(crate) range_type: DataType,
    pub(crate) connectivity: ArrayField,
    pub(crate) offsets: Option<ArrayField>,
    pub(crate) parents: Option<ArrayField>,
    pub(crate) parent_positions: Option<ArrayField>,
}

impl Section {
    /// fill the `Elements_t` node `node` and create its zero filled arrays
    fn create_nodes(
        store: &mut dyn NodeStore,
        node: NodeId,
        header: &NewSection<'_>,
        data_size: usize,
        with_offsets: bool,
    ) -> Result<Section, Error> {
        let n = header.count()?;

        store.set_dimensions(node, DataType::Integer, &[2])?;
        let nbndry = i32::try_from(header.nbndry).map_err(|_| overflow("boundary element count"))?;
        store.write_all_data(
            node,
            &DataBuffer::Integer(vec![header.element_type.code(), nbndry]),
        )?;

        let range_node = store.create_node(node, RANGE_NODE, "IndexRange_t")?;
        store.set_dimensions(range_node, header.index_type, &[2])?;
        let range = indices(&[header.start, header.end], header.index_type)?;
        store.write_all_data(range_node, &range)?;

        let offsets = if with_offsets {
            Some(ArrayField::create(store, node, OFFSET_NODE, header.index_type, &[n + 1])?)
        } else {
            None
        };
        let connectivity =
            ArrayField::create(store, node, CONNECTIVITY_NODE, header.index_type, &[data_size])?;

        let section = Section {
            name: header.name.to_string(),
            node,
            element_type: header.element_type,
            start: header.start,
            end: header.end,
            nbndry: header.nbndry,
            state: SectionState::Declared,
            range_node,
            range_type: header.index_type,
            connectivity,
            offsets,
            parents: None,
            parent_positions: None,
        };
        Ok(section)
    }

    /// create a populated section in the empty `Elements_t` node `node`
    pub(crate) fn create(
        store: &mut dyn NodeStore,
        node: NodeId,
        header: &NewSection<'_>,
        connectivity: &[i64],
        offsets: Option<&[i64]>,
    ) -> Result<Section, Error> {
        header.count()?;
        let run = Run {
            start: header.start,
            end: header.end,
            connectivity,
            offsets,
        };
        run.validate(header.element_type)?;

        let conn_buffer = indices(connectivity, header.index_type)?;
        let offset_buffer = match offsets {
            Some(offsets) => {
                let base = offsets[0];
                let shifted: Vec<i64> = offsets.iter().map(|o| o - base).collect();
                Some(indices(&shifted, header.index_type)?)
            }
            None => None,
        };

        let with_offsets = header.element_type.is_variable();
        let mut section =
            Self::create_nodes(store, node, header, connectivity.len(), with_offsets)?;

        section.connectivity.write_all(store, conn_buffer)?;
        if let (Some(field), Some(buffer)) = (section.offsets.as_mut(), offset_buffer) {
            field.write_all(store, buffer)?;
        }
        section.state = SectionState::Populated;

        log::debug!(
            "created {} section `{}` [{}, {}] with {} values",
            header.element_type,
            header.name,
            header.start,
            header.end,
            connectivity.len()
        );
        Ok(section)
    }

    /// create a section with `data_size` connectivity values reserved and nothing written
    pub(crate) fn declare(
        store: &mut dyn NodeStore,
        node: NodeId,
        header: &NewSection<'_>,
        data_size: usize,
    ) -> Result<Section, Error> {
        let n = header.count()?;
        let data_size = if header.element_type.is_variable() {
            data_size
        } else {
            let expected = compute_data_size(header.element_type, n, None, None)?;
            if data_size != expected {
                return Err(Error::invalid(format!(
                    "{n} {} elements need {expected} values, {data_size} were reserved",
                    header.element_type
                )));
            }
            expected
        };

        let section = Self::create_nodes(store, node, header, data_size, false)?;
        log::debug!(
            "declared {} section `{}` [{}, {}] with {data_size} values reserved",
            header.element_type,
            header.name,
            header.start,
            header.end
        );
        Ok(section)
    }

    /// rebuild a section from its nodes
    pub(crate) fn load(store: &dyn NodeStore, node: NodeId) -> Result<Section, Error> {
        let info = store.node_info(node)?;
        let header_type = info
            .data_type
            .ok_or_else(|| Error::invalid(format!("section `{}` has no header", info.name)))?;
        let header = store
            .read_all_data(node, header_type)?
            .to_indices()
            .unwrap_or_default();
        let (code, nbndry) = match header.as_slice() {
            [code, nbndry] => (*code, *nbndry),
            _ => {
                return Err(Error::invalid(format!(
                    "section `{}` has a malformed header",
                    info.name
                )))
            }
        };
        let element_type = ElementType::from_code(code)?;

        let range_node = store.node_id(node, RANGE_NODE)?;
        let range_type = store
            .node_info(range_node)?
            .data_type
            .ok_or_else(|| Error::invalid(format!("section `{}` has an empty range", info.name)))?;
        let range = store
            .read_all_data(range_node, range_type)?
            .to_indices()
            .unwrap_or_default();
        let (start, end) = match range.as_slice() {
            [start, end] if start <= end => (*start, *end),
            _ => {
                return Err(Error::invalid(format!(
                    "section `{}` has a malformed range",
                    info.name
                )))
            }
        };
        let span = end.checked_sub(start).and_then(|d| d.checked_add(1));
        if span.is_none() {
            return Err(overflow("element range"));
        }

        let field = |name: &str| -> Result<Option<ArrayField>, Error> {
            optional_child(store, node, name)?
                .map(|id| ArrayField::load(store, id))
                .transpose()
        };

        let connectivity = field(CONNECTIVITY_NODE)?
            .ok_or_else(|| Error::invalid(format!("section `{}` has no connectivity", info.name)))?;
        let offsets = field(OFFSET_NODE)?;

        let count = (end - start + 1) as usize;
        let state = if element_type.is_variable() && offsets.is_none() {
            SectionState::Declared
        } else if holds_placeholders(store, element_type, count, &connectivity, offsets.as_ref())? {
            SectionState::Initialized
        } else {
            SectionState::Populated
        };

        Ok(Section {
            name: info.name,
            node,
            element_type,
            start,
            end,
            nbndry: usize::try_from(nbndry).unwrap_or(0),
            state,
            range_node,
            range_type,
            connectivity,
            offsets,
            parents: field(PARENT_ELEMENTS_NODE)?,
            parent_positions: field(PARENT_POSITION_NODE)?,
        })
    }

    pub(crate) fn count(&self) -> usize {
        (self.end - self.start + 1) as usize
    }

    /// stored offsets, checked against the range and the connectivity they index
    fn offset_values(&self, store: &dyn NodeStore) -> Result<Option<Vec<i64>>, Error> {
        let offsets = match &self.offsets {
            Some(field) => field.read_indices(store)?,
            None => return Ok(None),
        };
        let n = self.count();
        if offsets.len() != n + 1 {
            return Err(Error::invalid(format!(
                "section `{}` has {n} elements but {} offsets",
                self.name,
                offsets.len()
            )));
        }
        if offsets.windows(2).any(|w| w[1] < w[0]) {
            return Err(Error::invalid(format!("section `{}` has decreasing offsets", self.name)));
        }
        let span = offsets[n]
            .checked_sub(offsets[0])
            .ok_or_else(|| overflow("element offsets"))?;
        if usize::try_from(span).map_or(true, |span| span > self.connectivity.len()) {
            return Err(Error::invalid(format!(
                "offsets of section `{}` span {span} values, its connectivity holds {}",
                self.name,
                self.connectivity.len()
            )));
        }
        Ok(Some(offsets))
    }

    fn require_offsets(&self) -> Result<(), Error> {
        if self.element_type.is_variable() && self.state == SectionState::Declared {
            return Err(Error::Uninitialized(self.name.clone()));
        }
        Ok(())
    }

    /// number of connectivity values in use. A declared section reports its capacity
    pub(crate) fn data_size(&self, store: &dyn NodeStore) -> Result<usize, Error> {
        if !self.element_type.is_variable() {
            return compute_data_size(self.element_type, self.count(), None, None);
        }
        if self.state == SectionState::Declared {
            return Ok(self.connectivity.len());
        }
        match self.offset_values(store)? {
            Some(offsets) => {
                compute_data_size(self.element_type, self.count(), None, Some(&offsets))
            }
            None => {
                let connectivity = self.connectivity.read_indices(store)?;
                compute_data_size(self.element_type, self.count(), Some(&connectivity), None)
            }
        }
    }

    /// full connectivity and, for variable sized types, offsets starting at 0
    pub(crate) fn read(
        &self,
        store: &dyn NodeStore,
    ) -> Result<(Vec<i64>, Option<Vec<i64>>), Error> {
        self.require_offsets()?;
        let mut connectivity = self.connectivity.read_indices(store)?;
        let offsets = self.offset_values(store)?.map(|offsets| {
            let base = offsets[0];
            offsets.iter().map(|o| o - base).collect::<Vec<_>>()
        });
        if let Some(offsets) = &offsets {
            let used = offsets.last().copied().unwrap_or(0).max(0) as usize;
            connectivity.truncate(used);
        }
        Ok((connectivity, offsets))
    }

    fn check_inside(&self, start: i64, end: i64) -> Result<(), Error> {
        if start < self.start || end > self.end || end < start {
            return Err(Error::invalid(format!(
                "elements [{start}, {end}] are outside section `{}` [{}, {}]",
                self.name, self.start, self.end
            )));
        }
        Ok(())
    }

    /// 1-D window `[lo, hi]` of the connectivity array
    fn read_window(&self, store: &dyn NodeStore, lo: usize, hi: usize) -> Result<Vec<i64>, Error> {
        if hi < lo {
            return Ok(Vec::new());
        }
        let memory = MemorySpace::contiguous(hi - lo + 1);
        let plan = transfer::verify_range(
            &self.connectivity.dims,
            &Rind::none(1),
            RindConvention::Zero,
            &[lo as i64],
            &[hi as i64],
            &memory,
        )?;
        let mut out = vec![0i64; memory.len()];
        transfer::general_read(store, &self.connectivity, &plan, &mut out)?;
        Ok(out)
    }

    /// connectivity of elements `[start, end]`, with offsets starting at 0 for variable types
    pub(crate) fn read_partial(
        &self,
        store: &dyn NodeStore,
        start: i64,
        end: i64,
    ) -> Result<(Vec<i64>, Option<Vec<i64>>), Error> {
        self.check_inside(start, end)?;
        self.require_offsets()?;

        let k0 = (start - self.start) as usize;
        let k1 = (end - self.start + 1) as usize;

        match self.offset_values(store)? {
            Some(offsets) => {
                let base = offsets[0];
                let lo = (offsets[k0] - base) as usize;
                let hi = (offsets[k1] - base) as usize;
                let connectivity = self.read_window(store, lo + 1, hi)?;
                let part = offsets[k0..=k1].iter().map(|o| o - offsets[k0]).collect();
                Ok((connectivity, Some(part)))
            }
            None => {
                let npe = self.element_type.nodes_per_element();
                let connectivity = self.read_window(store, k0 * npe + 1, k1 * npe)?;
                Ok((connectivity, None))
            }
        }
    }

    /// replace every element with a placeholder
    pub(crate) fn initialize(&mut self, store: &mut dyn NodeStore) -> Result<(), Error> {
        let (connectivity, offsets) = placeholder(self.element_type, self.count())?;

        let conn_buffer = indices(&connectivity, self.connectivity.data_type)?;
        let offset_buffer = match &offsets {
            Some(offsets) => Some(indices(offsets, self.connectivity.data_type)?),
            None => None,
        };

        let mut conn_field = self.connectivity.clone();
        conn_field.replace(store, &[connectivity.len()], &conn_buffer)?;

        let offset_field = match (offset_buffer, self.offsets.clone()) {
            (Some(buffer), Some(mut field)) => {
                let buffer = array::convert(buffer, field.data_type)?;
                field.replace(store, &[self.count() + 1], &buffer)?;
                field.cache = Some(buffer);
                Some(field)
            }
            (Some(buffer), None) => {
                let dims = [self.count() + 1];
                let mut field =
                    ArrayField::create(store, self.node, OFFSET_NODE, buffer.data_type(), &dims)?;
                field.write_all(store, buffer.clone())?;
                field.cache = Some(buffer);
                Some(field)
            }
            (None, _) => None,
        };

        conn_field.cache = Some(conn_buffer);
        self.connectivity = conn_field;
        self.offsets = offset_field;
        self.state = SectionState::Initialized;

        log::debug!("initialized section `{}` with {} placeholders", self.name, self.count());
        Ok(())
    }

    /// write elements `[start, end]`. Offsets are required for variable sized types
    pub(crate) fn write_partial(
        &mut self,
        store: &mut dyn NodeStore,
        start: i64,
        end: i64,
        connectivity: &[i64],
        offsets: Option<&[i64]>,
    ) -> Result<(), Error> {
        if start < 1 || end < start {
            return Err(Error::invalid(format!("invalid element range [{start}, {end}]")));
        }
        self.require_offsets()?;

        let new = Run {
            start,
            end,
            connectivity,
            offsets,
        };
        new.validate(self.element_type)?;

        let variable = self.element_type.is_variable();

        if !variable && start >= self.start && end <= self.end {
            let npe = self.element_type.nodes_per_element();
            let lo = (start - self.start) as usize * npe + 1;
            let hi = (end - self.start + 1) as usize * npe;
            let plan = transfer::verify_range(
                &self.connectivity.dims,
                &Rind::none(1),
                RindConvention::Zero,
                &[lo as i64],
                &[hi as i64],
                &MemorySpace::contiguous(connectivity.len()),
            )?;
            transfer::general_write(store, &mut self.connectivity, &plan, connectivity)?;
            self.state = SectionState::Populated;
            log::debug!("wrote elements [{start}, {end}] of `{}` in place", self.name);
            return Ok(());
        }

        let (old_connectivity, old_offsets) = self.read(store)?;

        if variable
            && start == self.start
            && end == self.end
            && connectivity.len() == old_connectivity.len()
        {
            let base = offsets.map(|o| o[0]).unwrap_or(0);
            let shifted: Vec<i64> = offsets.unwrap_or(&[]).iter().map(|o| o - base).collect();
            let conn_buffer = indices(connectivity, self.connectivity.data_type)?;
            let offset_buffer = match &self.offsets {
                Some(field) => Some(indices(&shifted, field.data_type)?),
                None => None,
            };

            self.connectivity.write_all(store, conn_buffer)?;
            if let (Some(field), Some(buffer)) = (self.offsets.as_mut(), offset_buffer) {
                field.write_all(store, buffer)?;
            }
            self.state = SectionState::Populated;
            log::debug!("replaced all elements of `{}` in place", self.name);
            return Ok(());
        }

        let old = Run {
            start: self.start,
            end: self.end,
            connectivity: &old_connectivity,
            offsets: old_offsets.as_deref(),
        };
        let spliced = splice(self.element_type, &old, &new)?;
        let n = (spliced.end - spliced.start + 1) as usize;

        // every buffer is built before the first store write
        let range_buffer = indices(&[spliced.start, spliced.end], self.range_type)?;
        let conn_buffer = indices(&spliced.connectivity, self.connectivity.data_type)?;
        let offset_buffer = match (&self.offsets, &spliced.offsets) {
            (Some(field), Some(values)) => Some(indices(values, field.data_type)?),
            _ => None,
        };
        let old_range = (self.start, self.end);
        let new_range = (spliced.start, spliced.end);
        let parents = resized_parent(store, self.parents.as_ref(), old_range, new_range)?;
        let positions =
            resized_parent(store, self.parent_positions.as_ref(), old_range, new_range)?;

        store.write_all_data(self.range_node, &range_buffer)?;

        let mut conn_field = self.connectivity.clone();
        conn_field.replace(store, &[spliced.connectivity.len()], &conn_buffer)?;
        conn_field.cache = Some(conn_buffer);

        let mut offset_field = self.offsets.clone();
        if let (Some(field), Some(buffer)) = (offset_field.as_mut(), offset_buffer) {
            field.replace(store, &[n + 1], &buffer)?;
            field.cache = Some(buffer);
        }

        let mut resized = Vec::with_capacity(2);
        for parent in [parents, positions] {
            resized.push(match parent {
                Some((mut field, buffer)) => {
                    field.replace(store, &[n, 2], &buffer)?;
                    Some(field)
                }
                None => None,
            });
        }
        let positions = resized.pop().flatten();
        let parents = resized.pop().flatten();

        log::debug!(
            "rewrote section `{}`: [{}, {}] -> [{}, {}]",
            self.name,
            self.start,
            self.end,
            spliced.start,
            spliced.end
        );

        self.start = spliced.start;
        self.end = spliced.end;
        self.connectivity = conn_field;
        self.offsets = offset_field;
        self.parents = parents;
        self.parent_positions = positions;
        self.state = SectionState::Populated;
        Ok(())
    }

    /// write both parent arrays for every element, `[n, 2]` each in Fortran order
    pub(crate) fn write_parents(
        &mut self,
        store: &mut dyn NodeStore,
        index_type: DataType,
        elements: &[i64],
        positions: &[i64],
    ) -> Result<(), Error> {
        let n = self.count();
        let arrays = [(PARENT_ELEMENTS_NODE, elements), (PARENT_POSITION_NODE, positions)];
        for (name, values) in arrays {
            if values.len() != 2 * n {
                return Err(Error::invalid(format!(
                    "{name} of {n} elements needs {} values, got {}",
                    2 * n,
                    values.len()
                )));
            }
        }

        let element_buffer = indices(elements, index_type)?;
        let position_buffer = indices(positions, index_type)?;

        let mut fields = Vec::with_capacity(2);
        for (name, current, buffer) in [
            (PARENT_ELEMENTS_NODE, &self.parents, element_buffer),
            (PARENT_POSITION_NODE, &self.parent_positions, position_buffer),
        ] {
            let field = match current.clone() {
                Some(mut field) => {
                    let buffer = array::convert(buffer, field.data_type)?;
                    field.replace(store, &[n, 2], &buffer)?;
                    field
                }
                None => {
                    let mut field =
                        ArrayField::create(store, self.node, name, index_type, &[n, 2])?;
                    field.write_all(store, buffer)?;
                    field
                }
            };
            fields.push(field);
        }

        self.parent_positions = fields.pop();
        self.parents = fields.pop();
        Ok(())
    }

    /// write the parent data of elements `[start, end]`, `[m, 2]` each in Fortran order.
    /// Missing parent arrays are created zero filled first
    pub(crate) fn write_parents_partial(
        &mut self,
        store: &mut dyn NodeStore,
        index_type: DataType,
        start: i64,
        end: i64,
        elements: &[i64],
        positions: &[i64],
    ) -> Result<(), Error> {
        self.check_inside(start, end)?;
        let n = self.count();
        let m = (end - start + 1) as usize;
        for values in [elements, positions] {
            if values.len() != 2 * m {
                return Err(Error::invalid(format!(
                    "parent data of {m} elements needs {} values, got {}",
                    2 * m,
                    values.len()
                )));
            }
        }

        let row_lo = start - self.start + 1;
        let row_hi = end - self.start + 1;
        let plan = transfer::verify_range(
            &[n, 2],
            &Rind::none(2),
            RindConvention::Zero,
            &[row_lo, 1],
            &[row_hi, 2],
            &MemorySpace::contiguous(2 * m),
        )?;

        let mut fields = Vec::with_capacity(2);
        for (name, current, values) in [
            (PARENT_ELEMENTS_NODE, &self.parents, elements),
            (PARENT_POSITION_NODE, &self.parent_positions, positions),
        ] {
            let mut field = match current.clone() {
                Some(field) => field,
                None => ArrayField::create(store, self.node, name, index_type, &[n, 2])?,
            };
            transfer::general_write(store, &mut field, &plan, values)?;
            fields.push(field);
        }

        self.parent_positions = fields.pop();
        self.parents = fields.pop();
        Ok(())
    }

    /// parent elements and positions, `None` when the section has none
    pub(crate) fn read_parents(
        &self,
        store: &dyn NodeStore,
    ) -> Result<Option<(Vec<i64>, Vec<i64>)>, Error> {
        match (&self.parents, &self.parent_positions) {
            (Some(elements), Some(positions)) => Ok(Some((
                elements.read_indices(store)?,
                positions.read_indices(store)?,
            ))),
            (Some(elements), None) => {
                let elements = elements.read_indices(store)?;
                let zeros = vec![0; elements.len()];
                Ok(Some((elements, zeros)))
            }
            _ => Ok(None),
        }
    }
}
