//! Generalized array transfer between the node store and caller memory.
//!
//! A transfer is described by two windows: one over the stored array (file space) and one
//! over the caller's buffer (memory space). The two shapes, ranks and windows are
//! independent; only the number of addressed elements has to agree. [`verify_range`] turns
//! the caller's index ranges into a [`TransferPlan`], translating file ranges through the
//! rind convention, and [`general_read`] / [`general_write`] execute it.
//!
//! Element types are converted on the way. Stores that convert natively are asked for the
//! wanted type directly; for the others the data is staged in the stored type and converted
//! here.

use crate::array::{self, slab, DataBuffer, DataType, Scalar, Slab, MAX_RANK};
use crate::config::RindConvention;
use crate::prelude::*;

/// rind planes of an entity, `[lo_1, hi_1, lo_2, hi_2, ...]`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Rind {
    planes: Vec<usize>,
}

impl Rind {
    /// no rind on any of `index_dim` axes
    pub fn none(index_dim: usize) -> Self {
        Self {
            planes: vec![0; 2 * index_dim],
        }
    }

    pub fn new(planes: Vec<usize>) -> Self {
        Self { planes }
    }

    /// rind planes as stored in a `Rind_t` node
    pub fn from_values(values: &[i64]) -> Result<Self, Error> {
        let planes = values
            .iter()
            .map(|v| {
                usize::try_from(*v).map_err(|_| {
                    Error::invalid(format!("rind planes must not be negative, got {v}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { planes })
    }

    pub fn planes(&self) -> &[usize] {
        &self.planes
    }

    pub fn lo(&self, axis: usize) -> usize {
        self.planes.get(2 * axis).copied().unwrap_or(0)
    }

    pub fn hi(&self, axis: usize) -> usize {
        self.planes.get(2 * axis + 1).copied().unwrap_or(0)
    }

    pub fn is_zero(&self) -> bool {
        self.planes.iter().all(|p| *p == 0)
    }

    /// stored extents: the core extents grown by the rind on both ends
    pub fn inflate(&self, core: &[usize]) -> Result<Vec<usize>, Error> {
        core.iter()
            .enumerate()
            .map(|(axis, n)| {
                n.checked_add(self.lo(axis))
                    .and_then(|n| n.checked_add(self.hi(axis)))
                    .ok_or_else(|| Error::Overflow(format!("rind padded extent of axis {axis}")))
            })
            .collect()
    }
}

/// shape of the caller's buffer and the window of it taking part in a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySpace {
    pub dims: Vec<usize>,
    pub min: Vec<i64>,
    pub max: Vec<i64>,
}

impl MemorySpace {
    pub fn new(dims: Vec<usize>, min: Vec<i64>, max: Vec<i64>) -> Self {
        Self { dims, min, max }
    }

    /// a flat buffer of `len` values, all of them transferred
    pub fn contiguous(len: usize) -> Self {
        Self::full(vec![len])
    }

    /// every element of a buffer shaped `dims`
    pub fn full(dims: Vec<usize>) -> Self {
        let min = vec![1; dims.len()];
        let max = dims.iter().map(|d| *d as i64).collect();
        Self { dims, min, max }
    }

    /// number of values the buffer must hold
    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// verified windows of a transfer, both in 1-based stored indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    pub file_dims: Vec<usize>,
    pub file: Slab,
    pub memory_dims: Vec<usize>,
    pub memory: Slab,
    pub file_full: bool,
    pub memory_full: bool,
}

impl TransferPlan {
    /// number of elements moved
    pub fn count(&self) -> usize {
        self.file.count()
    }

    /// both sides are complete arrays, so a single bulk copy suffices
    pub fn is_bulk(&self) -> bool {
        self.file_full && self.memory_full
    }
}

/// the index range covering a whole stored array of extents `file_dims`
///
/// Under [`RindConvention::Core`] index 1 is the first core plane, so the range starts at
/// `1 - lo` and ends at `n + hi`. Under [`RindConvention::Zero`] it is `[1, n + lo + hi]`.
pub fn default_range(
    file_dims: &[usize],
    rind: &Rind,
    convention: RindConvention,
) -> (Vec<i64>, Vec<i64>) {
    file_dims
        .iter()
        .enumerate()
        .map(|(axis, dim)| {
            let shift = match convention {
                RindConvention::Core => rind.lo(axis) as i64,
                RindConvention::Zero => 0,
            };
            (1 - shift, *dim as i64 - shift)
        })
        .unzip()
}

/// validate 1-based inclusive window bounds against `dims`, returning the slab
fn checked_window(
    space: &str,
    dims: &[usize],
    min: &[i64],
    max: &[i64],
    shift: impl Fn(usize) -> i64,
) -> Result<Slab, Error> {
    if dims.is_empty() || dims.len() > MAX_RANK {
        return Err(Error::invalid(format!(
            "{space} rank must be between 1 and {MAX_RANK}, got {}",
            dims.len()
        )));
    }
    if min.len() != dims.len() || max.len() != dims.len() {
        return Err(Error::invalid(format!(
            "{space} range has rank {}/{} but the array has rank {}",
            min.len(),
            max.len(),
            dims.len()
        )));
    }

    let mut start = Vec::with_capacity(dims.len());
    let mut end = Vec::with_capacity(dims.len());

    for axis in 0..dims.len() {
        if dims[axis] == 0 {
            return Err(Error::invalid(format!("{space} extent of axis {axis} must be positive")));
        }

        let lo = min[axis].checked_add(shift(axis));
        let hi = max[axis].checked_add(shift(axis));
        match (lo, hi) {
            (Some(lo), Some(hi)) if lo >= 1 && lo <= hi && hi <= dims[axis] as i64 => {
                start.push(lo as usize);
                end.push(hi as usize);
            }
            _ => {
                return Err(Error::invalid(format!(
                    "{space} range [{}, {}] is outside axis {axis} of extent {}",
                    min[axis], max[axis], dims[axis]
                )))
            }
        }
    }

    Ok(Slab::new(start, end))
}

/// check a transfer request and translate it into stored indices
///
/// `rmin`/`rmax` are given in the caller's index space for the stored array of extents
/// `file_dims` (rind included); they are shifted by the low rind under the core convention.
/// The memory window is checked against its own shape. Ranks may differ between the two
/// sides but the addressed element counts must match.
pub fn verify_range(
    file_dims: &[usize],
    rind: &Rind,
    convention: RindConvention,
    rmin: &[i64],
    rmax: &[i64],
    memory: &MemorySpace,
) -> Result<TransferPlan, Error> {
    let file = checked_window("file", file_dims, rmin, rmax, |axis| match convention {
        RindConvention::Core => rind.lo(axis) as i64,
        RindConvention::Zero => 0,
    })?;
    let memory_window = checked_window("memory", &memory.dims, &memory.min, &memory.max, |_| 0)?;

    if file.count() != memory_window.count() {
        return Err(Error::invalid(format!(
            "file range {file} addresses {} values but memory range {memory_window} addresses {}",
            file.count(),
            memory_window.count()
        )));
    }

    Ok(TransferPlan {
        file_full: file.is_full(file_dims),
        memory_full: memory_window.is_full(&memory.dims),
        file_dims: file_dims.to_vec(),
        file,
        memory_dims: memory.dims.clone(),
        memory: memory_window,
    })
}

/// an array node together with what the session knows about it
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ArrayField {
    pub(crate) name: String,
    pub(crate) data_type: DataType,
    pub(crate) dims: Vec<usize>,
    pub(crate) node: NodeId,
    /// full payload in the stored type, dropped by every write
    pub(crate) cache: Option<DataBuffer>,
}

impl ArrayField {
    /// create a zero filled `DataArray_t` node
    pub(crate) fn create(
        store: &mut dyn NodeStore,
        parent: NodeId,
        name: &str,
        data_type: DataType,
        dims: &[usize],
    ) -> Result<Self, Error> {
        let node = store.create_node(parent, name, "DataArray_t")?;
        Self::init(store, node, name, data_type, dims)
    }

    /// size the empty node `node` as a zero filled array
    pub(crate) fn init(
        store: &mut dyn NodeStore,
        node: NodeId,
        name: &str,
        data_type: DataType,
        dims: &[usize],
    ) -> Result<Self, Error> {
        store.set_dimensions(node, data_type, dims)?;
        Ok(Self {
            name: name.to_string(),
            data_type,
            dims: dims.to_vec(),
            node,
            cache: None,
        })
    }

    /// describe an existing array node
    pub(crate) fn load(store: &dyn NodeStore, node: NodeId) -> Result<Self, Error> {
        let info = store.node_info(node)?;
        let data_type = info
            .data_type
            .ok_or_else(|| Error::invalid(format!("array node `{}` holds no data", info.name)))?;
        Ok(Self {
            name: info.name,
            data_type,
            dims: info.dims,
            node,
            cache: None,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.dims.iter().product()
    }

    /// the whole payload in the stored type
    pub(crate) fn read_all(&self, store: &dyn NodeStore) -> Result<DataBuffer, Error> {
        match &self.cache {
            Some(cached) => Ok(cached.clone()),
            None => Ok(store.read_all_data(self.node, self.data_type)?),
        }
    }

    /// integer payload widened to `i64`
    pub(crate) fn read_indices(&self, store: &dyn NodeStore) -> Result<Vec<i64>, Error> {
        self.read_all(store)?
            .to_indices()
            .ok_or_else(|| Error::invalid(format!("`{}` does not hold integer data", self.name)))
    }

    /// overwrite the whole payload, converting to the stored type
    pub(crate) fn write_all(
        &mut self,
        store: &mut dyn NodeStore,
        values: DataBuffer,
    ) -> Result<(), Error> {
        let values = array::convert(values, self.data_type)?;
        self.cache = None;
        store.write_all_data(self.node, &values)?;
        Ok(())
    }

    /// give the node new extents and payload. `values` must already have the stored type
    pub(crate) fn replace(
        &mut self,
        store: &mut dyn NodeStore,
        dims: &[usize],
        values: &DataBuffer,
    ) -> Result<(), Error> {
        self.cache = None;
        store.set_dimensions(self.node, self.data_type, dims)?;
        store.write_all_data(self.node, values)?;
        self.dims = dims.to_vec();
        Ok(())
    }
}

fn check_extents(field: &ArrayField, plan: &TransferPlan) -> Result<(), Error> {
    if field.dims != plan.file_dims {
        return Err(Error::invalid(format!(
            "array `{}` has extents {:?}, the transfer expects {:?}",
            field.name, field.dims, plan.file_dims
        )));
    }
    Ok(())
}

fn check_buffer(len: usize, plan: &TransferPlan) -> Result<(), Error> {
    let expected: usize = plan.memory_dims.iter().product();
    if len != expected {
        return Err(Error::invalid(format!(
            "memory buffer holds {len} values, its declared shape {:?} needs {expected}",
            plan.memory_dims
        )));
    }
    Ok(())
}

/// read the file window of `plan` into the memory window of `out`
pub(crate) fn general_read<T: Scalar>(
    store: &dyn NodeStore,
    field: &ArrayField,
    plan: &TransferPlan,
    out: &mut [T],
) -> Result<(), Error> {
    let wanted = T::DATA_TYPE;
    array::check_convertible(field.data_type, wanted)?;
    check_extents(field, plan)?;
    check_buffer(out.len(), plan)?;

    let native = field.data_type == wanted || store.supports_conversion();
    let request = if native { wanted } else { field.data_type };

    let buffer = match (&field.cache, plan.file_full) {
        (Some(cached), true) => cached.clone(),
        (Some(cached), false) => cached.gather(&field.dims, &plan.file)?,
        (None, true) => store.read_all_data(field.node, request)?,
        (None, false) => store.read_data(field.node, &plan.file, request)?,
    };

    if buffer.data_type() != wanted {
        log::debug!(
            "staging read of `{}`: converting {} values from {} to {wanted}",
            field.name,
            buffer.len(),
            buffer.data_type()
        );
    }
    let values = T::from_buffer(array::convert(buffer, wanted)?).ok_or_else(|| {
        Error::internal(format!("conversion of `{}` produced the wrong type", field.name))
    })?;

    if plan.memory_full {
        out.copy_from_slice(&values);
    } else {
        slab::scatter(out, &plan.memory_dims, &plan.memory, &values)?;
    }

    log::debug!("read {} values of `{}` from {}", plan.count(), field.name, plan.file);
    Ok(())
}

/// write the memory window of `data` into the file window of `plan`
pub(crate) fn general_write<T: Scalar>(
    store: &mut dyn NodeStore,
    field: &mut ArrayField,
    plan: &TransferPlan,
    data: &[T],
) -> Result<(), Error> {
    let given = T::DATA_TYPE;
    array::check_convertible(given, field.data_type)?;
    check_extents(field, plan)?;
    check_buffer(data.len(), plan)?;

    let values = if plan.memory_full {
        data.to_vec()
    } else {
        slab::gather(data, &plan.memory_dims, &plan.memory)?
    };

    let mut buffer = T::into_buffer(values);
    if given != field.data_type && !store.supports_conversion() {
        log::debug!(
            "staging write of `{}`: converting {} values from {given} to {}",
            field.name,
            buffer.len(),
            field.data_type
        );
        buffer = array::convert(buffer, field.data_type)?;
    }

    field.cache = None;
    if plan.file_full {
        store.write_all_data(field.node, &buffer)?;
    } else {
        store.write_data(field.node, &plan.file, &buffer)?;
    }

    log::debug!("wrote {} values of `{}` to {}", plan.count(), field.name, plan.file);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileType;
    use crate::store::MemoryStore;

    fn field_with(store: &mut MemoryStore, dims: &[usize], values: Vec<f64>) -> ArrayField {
        let root = store.root_id();
        let mut field = ArrayField::create(store, root, "x", DataType::RealDouble, dims).unwrap();
        field
            .write_all(store, DataBuffer::RealDouble(values))
            .unwrap();
        field
    }

    /// a plan over `[min, max]` of a 1-D array without rind
    fn line(len: usize, min: i64, max: i64, memory: usize) -> TransferPlan {
        let memory = MemorySpace::contiguous(memory);
        verify_range(&[len], &Rind::none(1), RindConvention::Core, &[min], &[max], &memory).unwrap()
    }

    #[test]
    fn default_ranges_follow_the_convention() {
        let rind = Rind::new(vec![2, 1]);
        assert_eq!(default_range(&[8], &rind, RindConvention::Core), (vec![-1], vec![6]));
        assert_eq!(default_range(&[8], &rind, RindConvention::Zero), (vec![1], vec![8]));
    }

    #[test]
    fn core_ranges_are_shifted_by_the_low_rind() {
        let rind = Rind::new(vec![1, 1]);
        let memory = MemorySpace::contiguous(7);
        let plan = verify_range(&[7], &rind, RindConvention::Core, &[0], &[6], &memory).unwrap();
        assert!(plan.file_full);
        assert_eq!(plan.file, Slab::new(vec![1], vec![7]));

        let err = verify_range(&[7], &rind, RindConvention::Zero, &[0], &[6], &memory);
        assert!(err.is_err());
    }

    #[test]
    fn ranks_may_differ_but_counts_must_match() {
        let rind = Rind::none(2);
        let flat = MemorySpace::contiguous(6);
        let core = RindConvention::Core;
        let plan = verify_range(&[3, 2], &rind, core, &[1, 1], &[3, 2], &flat).unwrap();
        assert!(plan.is_bulk());

        let short = MemorySpace::contiguous(5);
        assert!(verify_range(&[3, 2], &rind, core, &[1, 1], &[3, 2], &short).is_err());
    }

    #[test]
    fn bounds_are_checked() {
        let rind = Rind::none(1);
        let memory = MemorySpace::contiguous(2);
        assert!(verify_range(&[4], &rind, RindConvention::Core, &[4], &[5], &memory).is_err());
        assert!(verify_range(&[4], &rind, RindConvention::Core, &[3], &[2], &memory).is_err());
        assert!(verify_range(&[0], &rind, RindConvention::Core, &[1], &[2], &memory).is_err());
        let (min, max) = ([1, 1], [2, 1]);
        assert!(verify_range(&[4], &rind, RindConvention::Core, &min, &max, &memory).is_err());
    }

    #[test]
    fn plane_read_into_a_flat_buffer() {
        let mut store = MemoryStore::diskless(FileType::Base64);
        let values: Vec<f64> = (0..60).map(|v| v as f64).collect();
        let field = field_with(&mut store, &[5, 4, 3], values.clone());

        let memory = MemorySpace::contiguous(12);
        let rind = Rind::none(3);
        let (min, max) = ([1, 1, 1], [1, 4, 3]);
        let plan =
            verify_range(&[5, 4, 3], &rind, RindConvention::Core, &min, &max, &memory).unwrap();

        let mut out = vec![0f64; 12];
        general_read(&store, &field, &plan, &mut out).unwrap();
        let expected: Vec<f64> = values.iter().copied().step_by(5).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn memory_window_places_values() {
        let mut store = MemoryStore::diskless(FileType::Base64);
        let field = field_with(&mut store, &[3], vec![1., 2., 3.]);

        // write the three values into the middle row of a 3 x 3 buffer
        let memory = MemorySpace::new(vec![3, 3], vec![1, 2], vec![3, 2]);
        let plan =
            verify_range(&[3], &Rind::none(1), RindConvention::Core, &[1], &[3], &memory).unwrap();
        let mut out = vec![0f64; 9];
        general_read(&store, &field, &plan, &mut out).unwrap();
        assert_eq!(out, vec![0., 0., 0., 1., 2., 3., 0., 0., 0.]);
    }

    #[test]
    fn staged_conversion_on_stores_without_native_conversion() {
        let mut store = MemoryStore::diskless(FileType::Ascii);
        let mut field = field_with(&mut store, &[4], vec![0.; 4]);

        let plan = line(4, 2, 3, 2);
        general_write(&mut store, &mut field, &plan, &[1.5f32, 2.5]).unwrap();

        let plan = line(4, 1, 4, 4);
        let mut out = vec![0i32; 4];
        general_read(&store, &field, &plan, &mut out).unwrap();
        // float to integer casts truncate
        assert_eq!(out, vec![0, 1, 2, 0]);
    }

    #[test]
    fn character_arrays_are_rejected_before_io() {
        let mut store = MemoryStore::diskless(FileType::Base64);
        let field = field_with(&mut store, &[2], vec![1., 2.]);
        let plan = line(2, 1, 2, 2);

        let mut out = vec![7u8; 2];
        let err = general_read(&store, &field, &plan, &mut out).unwrap_err();
        assert!(matches!(err, Error::Conversion(_)));
        assert_eq!(out, vec![7, 7]);
    }

    #[test]
    fn writes_drop_the_cache() {
        let mut store = MemoryStore::diskless(FileType::Base64);
        let mut field = field_with(&mut store, &[2], vec![1., 2.]);
        field.cache = Some(DataBuffer::RealDouble(vec![1., 2.]));

        let plan = line(2, 2, 2, 1);
        general_write(&mut store, &mut field, &plan, &[9f64]).unwrap();
        assert!(field.cache.is_none());

        let full = line(2, 1, 2, 2);
        let mut out = vec![0f64; 2];
        general_read(&store, &field, &full, &mut out).unwrap();
        assert_eq!(out, vec![1., 9.]);
    }
}
