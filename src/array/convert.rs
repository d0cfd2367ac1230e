//! Element type conversion between [`DataBuffer`]s.
//!
//! Integers and reals convert freely among themselves. Casting a float into an integer fails
//! when the value does not fit. Complex data converts only to complex data and character
//! data only to character data.

use super::{Complex, DataBuffer, DataType};
use num_traits::{NumCast, ToPrimitive};

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConversionError {
    #[error("character data can only be transferred as characters, not {from} -> {to}")]
    Character { from: DataType, to: DataType },
    #[error("conversion from {from} to {to} is not supported")]
    Unsupported { from: DataType, to: DataType },
    #[error("value at index {index} cannot be represented as {to}")]
    OutOfRange { index: usize, to: DataType },
}

/// validate that `from` may be transferred as `to` without looking at any data
pub fn check_convertible(from: DataType, to: DataType) -> Result<(), ConversionError> {
    if from == to {
        return Ok(());
    }

    if from == DataType::Character || to == DataType::Character {
        return Err(ConversionError::Character { from, to });
    }

    if from.is_complex() != to.is_complex() {
        return Err(ConversionError::Unsupported { from, to });
    }

    Ok(())
}

fn cast_all<S, D>(values: &[S], to: DataType) -> Result<Vec<D>, ConversionError>
where
    S: ToPrimitive + Copy,
    D: NumCast,
{
    values
        .iter()
        .enumerate()
        .map(|(index, value)| D::from(*value).ok_or(ConversionError::OutOfRange { index, to }))
        .collect()
}

fn cast_complex<S, D>(
    values: &[Complex<S>],
    to: DataType,
) -> Result<Vec<Complex<D>>, ConversionError>
where
    S: ToPrimitive + Copy,
    D: NumCast,
{
    values
        .iter()
        .enumerate()
        .map(|(index, value)| {
            match (D::from(value.re), D::from(value.im)) {
                (Some(re), Some(im)) => Ok(Complex { re, im }),
                _ => Err(ConversionError::OutOfRange { index, to }),
            }
        })
        .collect()
}

/// dispatch a real or integer source slice into the requested real or integer type
macro_rules! real_to {
    ($values:expr, $from:expr, $to:expr) => {
        match $to {
            DataType::Integer => DataBuffer::Integer(cast_all($values, $to)?),
            DataType::LongInteger => DataBuffer::LongInteger(cast_all($values, $to)?),
            DataType::RealSingle => DataBuffer::RealSingle(cast_all($values, $to)?),
            DataType::RealDouble => DataBuffer::RealDouble(cast_all($values, $to)?),
            // rejected by `check_convertible`
            DataType::ComplexSingle | DataType::ComplexDouble | DataType::Character => {
                return Err(ConversionError::Unsupported { from: $from, to: $to });
            }
        }
    };
}

/// convert a buffer into a buffer of another element type
pub fn convert(buffer: DataBuffer, to: DataType) -> Result<DataBuffer, ConversionError> {
    let from = buffer.data_type();
    if from == to {
        return Ok(buffer);
    }

    check_convertible(from, to)?;

    let out = match &buffer {
        DataBuffer::Integer(v) => real_to!(v, from, to),
        DataBuffer::LongInteger(v) => real_to!(v, from, to),
        DataBuffer::RealSingle(v) => real_to!(v, from, to),
        DataBuffer::RealDouble(v) => real_to!(v, from, to),
        DataBuffer::ComplexSingle(v) => DataBuffer::ComplexDouble(cast_complex(v, to)?),
        DataBuffer::ComplexDouble(v) => DataBuffer::ComplexSingle(cast_complex(v, to)?),
        DataBuffer::Character(_) => return Err(ConversionError::Character { from, to }),
    };

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn integers_widen() {
        let out = convert(DataBuffer::Integer(vec![1, -2, 3]), DataType::LongInteger).unwrap();
        assert_eq!(out, DataBuffer::LongInteger(vec![1, -2, 3]));
    }

    #[test]
    fn integers_to_reals() {
        let out = convert(DataBuffer::LongInteger(vec![7, 8]), DataType::RealDouble).unwrap();
        assert_eq!(out, DataBuffer::RealDouble(vec![7., 8.]));
    }

    #[test]
    fn narrowing_out_of_range_fails() {
        let err = convert(DataBuffer::LongInteger(vec![1, i64::MAX]), DataType::Integer)
            .unwrap_err();
        assert_eq!(
            err,
            ConversionError::OutOfRange {
                index: 1,
                to: DataType::Integer
            }
        );

        let nan = convert(DataBuffer::RealDouble(vec![f64::NAN]), DataType::Integer);
        assert!(nan.is_err());
    }

    #[test]
    fn character_is_exclusive() {
        assert!(check_convertible(DataType::Character, DataType::Integer).is_err());
        assert!(check_convertible(DataType::RealSingle, DataType::Character).is_err());
        assert!(check_convertible(DataType::Character, DataType::Character).is_ok());
        let err = convert(DataBuffer::from_text("abc"), DataType::RealDouble).unwrap_err();
        assert!(matches!(err, ConversionError::Character { .. }));
    }

    #[test]
    fn complex_only_to_complex() {
        let buffer = DataBuffer::ComplexSingle(vec![Complex::new(1.0, -2.0)]);
        assert!(convert(buffer.clone(), DataType::RealDouble).is_err());
        let out = convert(buffer, DataType::ComplexDouble).unwrap();
        assert_eq!(out, DataBuffer::ComplexDouble(vec![Complex::new(1.0, -2.0)]));
    }

    proptest! {
        #[test]
        fn double_to_single_rounds_to_nearest(
            values in prop::collection::vec(-1.0e30f64..1.0e30, 1..64)
        ) {
            let doubles = DataBuffer::RealDouble(values.clone());
            let out = convert(doubles, DataType::RealSingle).unwrap();
            let expected: Vec<f32> = values.iter().map(|v| *v as f32).collect();
            prop_assert_eq!(out, DataBuffer::RealSingle(expected));
        }
    }
}
