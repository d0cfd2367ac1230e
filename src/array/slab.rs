//! Hyperslab windows over Fortran ordered arrays.
//!
//! A [`Slab`] selects a rectangular, optionally strided window of an array with 1-based
//! inclusive bounds per axis. [`gather`] copies the window out into a contiguous vector
//! (first axis varying fastest) and [`scatter`] writes such a vector back.

use super::DataType;
use ndarray::{ArrayView, ArrayViewMut, IxDyn, ShapeBuilder, Slice};

#[derive(Debug, thiserror::Error)]
pub enum SlabError {
    #[error("window has rank {window} but the array has rank {array}")]
    RankMismatch { window: usize, array: usize },
    #[error("window [{start}, {end}] with stride {stride} is outside axis {axis} of extent {extent}")]
    OutOfBounds {
        axis: usize,
        start: usize,
        end: usize,
        stride: usize,
        extent: usize,
    },
    #[error("window addresses {expected} values but {actual} were supplied")]
    CountMismatch { expected: usize, actual: usize },
    #[error("array buffer does not match its extents: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("cannot copy {found} values into a {destination} array")]
    TypeMismatch {
        destination: DataType,
        found: DataType,
    },
}

/// 1-based inclusive per-axis window with a stride
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slab {
    pub start: Vec<usize>,
    pub end: Vec<usize>,
    pub stride: Vec<usize>,
}

impl Slab {
    /// unit stride window
    pub fn new(start: Vec<usize>, end: Vec<usize>) -> Self {
        let stride = vec![1; start.len()];
        Self { start, end, stride }
    }

    /// the window covering every element of an array shaped `dims`
    pub fn full(dims: &[usize]) -> Self {
        Self::new(vec![1; dims.len()], dims.to_vec())
    }

    pub fn rank(&self) -> usize {
        self.start.len()
    }

    /// number of elements selected along each axis
    pub fn extents(&self) -> Vec<usize> {
        self.start
            .iter()
            .zip(&self.end)
            .zip(&self.stride)
            .map(|((start, end), stride)| {
                if end < start {
                    0
                } else {
                    (end - start) / stride.max(&1) + 1
                }
            })
            .collect()
    }

    /// total number of elements selected
    pub fn count(&self) -> usize {
        self.extents().iter().product()
    }

    pub fn is_full(&self, dims: &[usize]) -> bool {
        self.rank() == dims.len()
            && self.start.iter().all(|s| *s == 1)
            && self.end.as_slice() == dims
            && self.stride.iter().all(|s| *s == 1)
    }

    /// ensure the window lies inside an array shaped `dims`
    pub fn check(&self, dims: &[usize]) -> Result<(), SlabError> {
        if self.rank() != dims.len()
            || self.end.len() != dims.len()
            || self.stride.len() != dims.len()
        {
            return Err(SlabError::RankMismatch {
                window: self.rank(),
                array: dims.len(),
            });
        }

        for axis in 0..dims.len() {
            let (start, end, stride) = (self.start[axis], self.end[axis], self.stride[axis]);
            if start < 1 || end < start || end > dims[axis] || stride < 1 {
                return Err(SlabError::OutOfBounds {
                    axis,
                    start,
                    end,
                    stride,
                    extent: dims[axis],
                });
            }
        }

        Ok(())
    }

    fn axis_slice(&self, axis: usize) -> Slice {
        Slice::new(
            self.start[axis] as isize - 1,
            Some(self.end[axis] as isize),
            self.stride[axis] as isize,
        )
    }
}

impl std::fmt::Display for Slab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}..={:?}", self.start, self.end)?;
        if self.stride.iter().any(|s| *s != 1) {
            write!(f, " by {:?}", self.stride)?;
        }
        Ok(())
    }
}

/// copy the window of `data` (shaped `dims`, Fortran order) into a contiguous vector
pub fn gather<T: Clone>(data: &[T], dims: &[usize], window: &Slab) -> Result<Vec<T>, SlabError> {
    window.check(dims)?;

    if window.is_full(dims) {
        return Ok(data.to_vec());
    }

    let mut view = ArrayView::from_shape(IxDyn(dims).f(), data)?;
    view.slice_each_axis_inplace(|description| window.axis_slice(description.axis.index()));

    // reversing the axes makes the logical iteration order the Fortran one
    Ok(view.reversed_axes().iter().cloned().collect())
}

/// write `values` (contiguous, Fortran order) into the window of `data`
pub fn scatter<T: Clone>(
    data: &mut [T],
    dims: &[usize],
    window: &Slab,
    values: &[T],
) -> Result<(), SlabError> {
    window.check(dims)?;

    let expected = window.count();
    if values.len() != expected {
        return Err(SlabError::CountMismatch {
            expected,
            actual: values.len(),
        });
    }

    if window.is_full(dims) {
        data.clone_from_slice(values);
        return Ok(());
    }

    let mut view = ArrayViewMut::from_shape(IxDyn(dims).f(), data)?;
    view.slice_each_axis_inplace(|description| window.axis_slice(description.axis.index()));
    let mut selected = view.reversed_axes();

    selected
        .iter_mut()
        .zip(values)
        .for_each(|(slot, value)| *slot = value.clone());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // 3 x 2 array in Fortran order: a(i,j) = 10 * j + i
    fn sample() -> Vec<i32> {
        vec![11, 12, 13, 21, 22, 23]
    }

    #[test]
    fn full_window_is_a_copy() {
        let out = gather(&sample(), &[3, 2], &Slab::full(&[3, 2])).unwrap();
        assert_eq!(out, sample());
    }

    #[test]
    fn gather_column() {
        let out = gather(&sample(), &[3, 2], &Slab::new(vec![1, 2], vec![3, 2])).unwrap();
        assert_eq!(out, vec![21, 22, 23]);
    }

    #[test]
    fn gather_row_is_fortran_ordered() {
        let out = gather(&sample(), &[3, 2], &Slab::new(vec![2, 1], vec![3, 2])).unwrap();
        assert_eq!(out, vec![12, 13, 22, 23]);
    }

    #[test]
    fn strided_gather() {
        let data: Vec<i32> = (1..=10).collect();
        let window = Slab {
            start: vec![2],
            end: vec![10],
            stride: vec![3],
        };
        assert_eq!(window.count(), 3);
        assert_eq!(gather(&data, &[10], &window).unwrap(), vec![2, 5, 8]);
    }

    #[test]
    fn scatter_into_window() {
        let mut data = vec![0; 6];
        scatter(&mut data, &[3, 2], &Slab::new(vec![2, 1], vec![3, 2]), &[1, 2, 3, 4]).unwrap();
        assert_eq!(data, vec![0, 1, 2, 0, 3, 4]);
    }

    #[test]
    fn scatter_count_must_match() {
        let mut data = vec![0; 6];
        let err = scatter(&mut data, &[3, 2], &Slab::new(vec![1, 1], vec![2, 2]), &[1, 2, 3]);
        assert!(matches!(err, Err(SlabError::CountMismatch { expected: 4, actual: 3 })));
    }

    #[test]
    fn window_outside_array() {
        let window = Slab::new(vec![1, 1], vec![4, 2]);
        assert!(matches!(
            window.check(&[3, 2]),
            Err(SlabError::OutOfBounds { axis: 0, .. })
        ));
        assert!(matches!(
            Slab::new(vec![1], vec![1]).check(&[3, 2]),
            Err(SlabError::RankMismatch { .. })
        ));
    }
}
