//! Point sets: subsets of a zone's index space given as a range or a list.

use crate::array::{DataBuffer, DataType};
use crate::names::PointSetType;
use crate::prelude::*;

/// a point set node attached to an entity
#[derive(Debug, Clone, PartialEq)]
pub struct PointSet {
    pub(crate) set_type: PointSetType,
    pub(crate) npts: usize,
    pub(crate) size_of_patch: usize,
    pub(crate) data_type: DataType,
    pub(crate) node: NodeId,
}

impl PointSet {
    pub fn set_type(&self) -> PointSetType {
        self.set_type
    }

    /// 2 for a range, the number of listed points for a list
    pub fn npts(&self) -> usize {
        self.npts
    }

    /// number of points or elements addressed
    pub fn size_of_patch(&self) -> usize {
        self.size_of_patch
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }
}

/// index dimension of the values of a point set. Element sets address the 1-D element
/// numbering whatever the zone's index dimension
fn set_dim(set_type: PointSetType, index_dim: usize) -> usize {
    match set_type {
        PointSetType::ElementRange | PointSetType::ElementList => 1,
        _ => index_dim,
    }
}

/// number of entities addressed by a point set
///
/// Ranges are given as `[min_1..min_d, max_1..max_d]` and may run in either direction
/// along any axis.
pub fn size_of_patch(
    set_type: PointSetType,
    index_dim: usize,
    npts: usize,
    points: &[i64],
) -> Result<usize, Error> {
    if set_type.is_list() {
        return Ok(npts);
    }
    if !set_type.is_range() {
        return Err(Error::invalid(format!("cannot size a point set of type {set_type}")));
    }

    let dim = set_dim(set_type, index_dim);
    if points.len() < 2 * dim {
        return Err(Error::invalid(format!(
            "a {set_type} in {dim} dimensions needs {} values, got {}",
            2 * dim,
            points.len()
        )));
    }

    (0..dim).try_fold(1usize, |size, axis| {
        points[dim + axis]
            .checked_sub(points[axis])
            .map(|d| d.unsigned_abs())
            .and_then(|d| usize::try_from(d).ok())
            .and_then(|d| d.checked_add(1))
            .and_then(|d| size.checked_mul(d))
            .ok_or_else(|| Error::Overflow(format!("size of {set_type} {points:?}")))
    })
}

/// shape checks done before anything is written
///
/// `nsets` is 1 except for overset holes made of several ranges.
pub(crate) fn validate(
    set_type: PointSetType,
    index_dim: usize,
    npts: usize,
    nvalues: usize,
    nsets: usize,
    allow_empty: bool,
) -> Result<(), Error> {
    if set_type.is_list() {
        if npts == 0 && !allow_empty {
            return Err(Error::invalid(format!("a {set_type} needs at least one point")));
        }
    } else if set_type.is_range() {
        if npts != 2 * nsets {
            return Err(Error::invalid(format!(
                "{nsets} {set_type} set(s) need {} points, got {npts}",
                2 * nsets
            )));
        }
    } else {
        return Err(Error::invalid(format!("point sets of type {set_type} are not supported")));
    }

    let expected = npts
        .checked_mul(set_dim(set_type, index_dim))
        .ok_or_else(|| Error::Overflow(format!("{npts} points of a {set_type}")))?;
    if nvalues != expected {
        return Err(Error::invalid(format!(
            "{npts} points of a {set_type} need {expected} values, got {nvalues}"
        )));
    }

    Ok(())
}

/// create the point set node `name` under `parent`. The input must be validated
pub(crate) fn write(
    store: &mut dyn NodeStore,
    parent: NodeId,
    name: &str,
    set_type: PointSetType,
    index_dim: usize,
    points: &[i64],
    index_type: DataType,
) -> Result<PointSet, Error> {
    let dim = set_dim(set_type, index_dim);
    let npts = points.len() / dim.max(1);
    let size_of_patch = size_of_patch(set_type, index_dim, npts, points)?;
    let data = DataBuffer::from_indices(points, index_type)?;

    let node = store.create_node(parent, name, set_type.node_label())?;
    store.set_dimensions(node, index_type, &[dim, npts])?;
    store.write_all_data(node, &data)?;

    Ok(PointSet {
        set_type,
        npts,
        size_of_patch,
        data_type: index_type,
        node,
    })
}

/// write several ranges as `PointRange1`, `PointRange2`, ...
pub(crate) fn write_range_sets(
    store: &mut dyn NodeStore,
    parent: NodeId,
    index_dim: usize,
    points: &[i64],
    index_type: DataType,
) -> Result<Vec<PointSet>, Error> {
    points
        .chunks(2 * index_dim.max(1))
        .enumerate()
        .map(|(i, set)| {
            let name = format!("PointRange{}", i + 1);
            write(store, parent, &name, PointSetType::PointRange, index_dim, set, index_type)
        })
        .collect()
}

pub(crate) fn read(store: &dyn NodeStore, ptset: &PointSet) -> Result<Vec<i64>, Error> {
    store
        .read_all_data(ptset.node, ptset.data_type)?
        .to_indices()
        .ok_or_else(|| Error::internal("point set data is not integer"))
}

/// rebuild the descriptor of an existing point set node
pub(crate) fn load(
    store: &dyn NodeStore,
    node: NodeId,
    set_type: PointSetType,
    index_dim: usize,
) -> Result<PointSet, Error> {
    let info = store.node_info(node)?;
    let data_type = match info.data_type {
        Some(dt) if dt.is_integer() => dt,
        _ => return Err(Error::invalid(format!("point set `{}` must hold integers", info.name))),
    };

    let npts = info.dims.last().copied().unwrap_or(0);
    let mut ptset = PointSet {
        set_type,
        npts,
        size_of_patch: npts,
        data_type,
        node,
    };

    if set_type.is_range() {
        let points = read(store, &ptset)?;
        ptset.size_of_patch = size_of_patch(set_type, index_dim, npts, &points)?;
    }

    Ok(ptset)
}
