//! Typed payloads of array nodes.
//!
//! Data is held in a [`DataBuffer`], a closed enum over the seven element types a node can
//! store. Conversion between them lives in [`convert`] and windowed copies in [`slab`].

pub mod convert;
pub mod slab;

pub use convert::{check_convertible, convert, ConversionError};
pub use slab::{Slab, SlabError};

use crate::prelude::*;
use crate::names::UnknownName;

/// maximum rank of an array node
pub const MAX_RANK: usize = 12;

/// element type of an array node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Integer,
    LongInteger,
    RealSingle,
    RealDouble,
    ComplexSingle,
    ComplexDouble,
    Character,
}

impl DataType {
    pub const ALL: [DataType; 7] = [
        DataType::Integer,
        DataType::LongInteger,
        DataType::RealSingle,
        DataType::RealDouble,
        DataType::ComplexSingle,
        DataType::ComplexDouble,
        DataType::Character,
    ];

    /// two letter code used by the node store
    pub fn code(&self) -> &'static str {
        match self {
            DataType::Integer => "I4",
            DataType::LongInteger => "I8",
            DataType::RealSingle => "R4",
            DataType::RealDouble => "R8",
            DataType::ComplexSingle => "X4",
            DataType::ComplexDouble => "X8",
            DataType::Character => "C1",
        }
    }

    pub fn from_code(code: &str) -> Result<Self, UnknownName> {
        Self::ALL
            .iter()
            .copied()
            .find(|dt| dt.code() == code)
            .ok_or_else(|| UnknownName::new("data type", code.to_string()))
    }

    /// size of a single element in bytes
    pub fn size(&self) -> usize {
        match self {
            DataType::Integer | DataType::RealSingle => 4,
            DataType::LongInteger | DataType::RealDouble | DataType::ComplexSingle => 8,
            DataType::ComplexDouble => 16,
            DataType::Character => 1,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, DataType::Integer | DataType::LongInteger)
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, DataType::ComplexSingle | DataType::ComplexDouble)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// a complex number stored as two consecutive parts
#[derive(Debug, Clone, Copy, PartialEq, Default, Constructor)]
pub struct Complex<T> {
    pub re: T,
    pub im: T,
}

/// contiguous data of a single element type, in Fortran order
#[derive(Debug, Clone, PartialEq, From)]
pub enum DataBuffer {
    Integer(Vec<i32>),
    LongInteger(Vec<i64>),
    RealSingle(Vec<f32>),
    RealDouble(Vec<f64>),
    ComplexSingle(Vec<Complex<f32>>),
    ComplexDouble(Vec<Complex<f64>>),
    Character(Vec<u8>),
}

/// apply the same expression to the vector inside any variant of a `DataBuffer`
macro_rules! with_buffer {
    ($buffer:expr, $v:ident => $body:expr) => {
        match $buffer {
            DataBuffer::Integer($v) => $body,
            DataBuffer::LongInteger($v) => $body,
            DataBuffer::RealSingle($v) => $body,
            DataBuffer::RealDouble($v) => $body,
            DataBuffer::ComplexSingle($v) => $body,
            DataBuffer::ComplexDouble($v) => $body,
            DataBuffer::Character($v) => $body,
        }
    };
}

/// like `with_buffer`, but rewraps the result in the variant it came from
macro_rules! map_buffer {
    ($buffer:expr, $v:ident => $body:expr) => {
        match $buffer {
            DataBuffer::Integer($v) => DataBuffer::Integer($body),
            DataBuffer::LongInteger($v) => DataBuffer::LongInteger($body),
            DataBuffer::RealSingle($v) => DataBuffer::RealSingle($body),
            DataBuffer::RealDouble($v) => DataBuffer::RealDouble($body),
            DataBuffer::ComplexSingle($v) => DataBuffer::ComplexSingle($body),
            DataBuffer::ComplexDouble($v) => DataBuffer::ComplexDouble($body),
            DataBuffer::Character($v) => DataBuffer::Character($body),
        }
    };
}

impl DataBuffer {
    /// a buffer of `len` zero values
    pub fn zeros(data_type: DataType, len: usize) -> Self {
        match data_type {
            DataType::Integer => DataBuffer::Integer(vec![0; len]),
            DataType::LongInteger => DataBuffer::LongInteger(vec![0; len]),
            DataType::RealSingle => DataBuffer::RealSingle(vec![0.; len]),
            DataType::RealDouble => DataBuffer::RealDouble(vec![0.; len]),
            DataType::ComplexSingle => DataBuffer::ComplexSingle(vec![Complex::default(); len]),
            DataType::ComplexDouble => DataBuffer::ComplexDouble(vec![Complex::default(); len]),
            DataType::Character => DataBuffer::Character(vec![0; len]),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            DataBuffer::Integer(_) => DataType::Integer,
            DataBuffer::LongInteger(_) => DataType::LongInteger,
            DataBuffer::RealSingle(_) => DataType::RealSingle,
            DataBuffer::RealDouble(_) => DataType::RealDouble,
            DataBuffer::ComplexSingle(_) => DataType::ComplexSingle,
            DataBuffer::ComplexDouble(_) => DataType::ComplexDouble,
            DataBuffer::Character(_) => DataType::Character,
        }
    }

    pub fn len(&self) -> usize {
        with_buffer!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// copy out the elements inside `slab` of an array shaped `dims`
    pub fn gather(&self, dims: &[usize], window: &Slab) -> Result<DataBuffer, SlabError> {
        Ok(map_buffer!(self, v => slab::gather(v, dims, window)?))
    }

    /// overwrite the elements inside `slab` with `values` of the same element type
    pub fn scatter(
        &mut self,
        dims: &[usize],
        window: &Slab,
        values: &DataBuffer,
    ) -> Result<(), SlabError> {
        match (self, values) {
            (DataBuffer::Integer(d), DataBuffer::Integer(s)) => slab::scatter(d, dims, window, s),
            (DataBuffer::LongInteger(d), DataBuffer::LongInteger(s)) => {
                slab::scatter(d, dims, window, s)
            }
            (DataBuffer::RealSingle(d), DataBuffer::RealSingle(s)) => {
                slab::scatter(d, dims, window, s)
            }
            (DataBuffer::RealDouble(d), DataBuffer::RealDouble(s)) => {
                slab::scatter(d, dims, window, s)
            }
            (DataBuffer::ComplexSingle(d), DataBuffer::ComplexSingle(s)) => {
                slab::scatter(d, dims, window, s)
            }
            (DataBuffer::ComplexDouble(d), DataBuffer::ComplexDouble(s)) => {
                slab::scatter(d, dims, window, s)
            }
            (DataBuffer::Character(d), DataBuffer::Character(s)) => {
                slab::scatter(d, dims, window, s)
            }
            (dst, src) => Err(SlabError::TypeMismatch {
                destination: dst.data_type(),
                found: src.data_type(),
            }),
        }
    }

    /// integer contents widened to `i64`, used for index and connectivity data
    pub fn to_indices(&self) -> Option<Vec<i64>> {
        match self {
            DataBuffer::Integer(v) => Some(v.iter().map(|x| *x as i64).collect()),
            DataBuffer::LongInteger(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// character contents as a string, trailing blanks and nul bytes removed
    pub fn to_text(&self) -> Option<String> {
        match self {
            DataBuffer::Character(v) => {
                let text = String::from_utf8_lossy(v);
                Some(text.trim_end_matches(|c| c == ' ' || c == '\0').to_string())
            }
            _ => None,
        }
    }

    /// store index data as the requested integer type
    pub fn from_indices(values: &[i64], data_type: DataType) -> Result<Self, ConversionError> {
        convert(DataBuffer::LongInteger(values.to_vec()), data_type)
    }

    pub fn from_text(text: &str) -> Self {
        DataBuffer::Character(text.as_bytes().to_vec())
    }
}

/// Rust types that map onto a single [`DataType`]
pub trait Scalar: Copy + Default + std::fmt::Debug + 'static {
    const DATA_TYPE: DataType;

    fn into_buffer(values: Vec<Self>) -> DataBuffer;

    /// take the vector out of a buffer of exactly this type
    fn from_buffer(buffer: DataBuffer) -> Option<Vec<Self>>;
}

macro_rules! impl_scalar {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl Scalar for $ty {
                const DATA_TYPE: DataType = DataType::$variant;

                fn into_buffer(values: Vec<Self>) -> DataBuffer {
                    DataBuffer::$variant(values)
                }

                fn from_buffer(buffer: DataBuffer) -> Option<Vec<Self>> {
                    match buffer {
                        DataBuffer::$variant(values) => Some(values),
                        _ => None,
                    }
                }
            }
        )+
    };
}

impl_scalar! {
    i32 => Integer,
    i64 => LongInteger,
    f32 => RealSingle,
    f64 => RealDouble,
    Complex<f32> => ComplexSingle,
    Complex<f64> => ComplexDouble,
    u8 => Character,
}
