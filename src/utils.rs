//! Little endian byte packing of typed buffers, used by the base64 encoding.

use crate::array::{Complex, DataBuffer, DataType};

/// flatten a buffer into little endian bytes
pub(crate) fn buffer_to_le_bytes(buffer: &DataBuffer) -> Vec<u8> {
    let mut out = Vec::with_capacity(buffer.len() * buffer.data_type().size());

    match buffer {
        DataBuffer::Integer(v) => v.iter().for_each(|x| out.extend(x.to_le_bytes())),
        DataBuffer::LongInteger(v) => v.iter().for_each(|x| out.extend(x.to_le_bytes())),
        DataBuffer::RealSingle(v) => v.iter().for_each(|x| out.extend(x.to_le_bytes())),
        DataBuffer::RealDouble(v) => v.iter().for_each(|x| out.extend(x.to_le_bytes())),
        DataBuffer::ComplexSingle(v) => v.iter().for_each(|x| {
            out.extend(x.re.to_le_bytes());
            out.extend(x.im.to_le_bytes());
        }),
        DataBuffer::ComplexDouble(v) => v.iter().for_each(|x| {
            out.extend(x.re.to_le_bytes());
            out.extend(x.im.to_le_bytes());
        }),
        DataBuffer::Character(v) => out.extend_from_slice(v),
    }

    out
}

fn chunk<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut arr = [0; N];
    arr.copy_from_slice(&bytes[..N]);
    arr
}

/// rebuild a buffer of `data_type` from little endian bytes. Returns `None` when the byte
/// count is not a multiple of the element size
pub(crate) fn buffer_from_le_bytes(data_type: DataType, bytes: &[u8]) -> Option<DataBuffer> {
    let size = data_type.size();
    if bytes.len() % size != 0 {
        return None;
    }

    let chunks = bytes.chunks_exact(size);

    let buffer = match data_type {
        DataType::Integer => {
            DataBuffer::Integer(chunks.map(|c| i32::from_le_bytes(chunk(c))).collect())
        }
        DataType::LongInteger => {
            DataBuffer::LongInteger(chunks.map(|c| i64::from_le_bytes(chunk(c))).collect())
        }
        DataType::RealSingle => {
            DataBuffer::RealSingle(chunks.map(|c| f32::from_le_bytes(chunk(c))).collect())
        }
        DataType::RealDouble => {
            DataBuffer::RealDouble(chunks.map(|c| f64::from_le_bytes(chunk(c))).collect())
        }
        DataType::ComplexSingle => DataBuffer::ComplexSingle(
            chunks
                .map(|c| Complex {
                    re: f32::from_le_bytes(chunk(&c[..4])),
                    im: f32::from_le_bytes(chunk(&c[4..])),
                })
                .collect(),
        ),
        DataType::ComplexDouble => DataBuffer::ComplexDouble(
            chunks
                .map(|c| Complex {
                    re: f64::from_le_bytes(chunk(&c[..8])),
                    im: f64::from_le_bytes(chunk(&c[8..])),
                })
                .collect(),
        ),
        DataType::Character => DataBuffer::Character(bytes.to_vec()),
    };

    Some(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_survive_packing() {
        let buffer = DataBuffer::RealDouble(vec![1.5, -0.0, f64::MAX]);
        let bytes = buffer_to_le_bytes(&buffer);
        assert_eq!(bytes.len(), 24);
        assert_eq!(buffer_from_le_bytes(DataType::RealDouble, &bytes).unwrap(), buffer);
    }

    #[test]
    fn complex_parts_are_interleaved() {
        let buffer = DataBuffer::ComplexSingle(vec![Complex::new(1.0, 2.0)]);
        let bytes = buffer_to_le_bytes(&buffer);
        assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[4..], &2.0f32.to_le_bytes());
    }

    #[test]
    fn ragged_bytes_are_rejected() {
        assert!(buffer_from_le_bytes(DataType::Integer, &[0, 1, 2]).is_none());
    }
}
