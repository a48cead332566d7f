// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Built-in marshal/unmarshal functions for [`Variable`](crate::Variable)
//! descriptors: fixed-width little-endian scalars, slices of them, and
//! structures with their own byte-level codec.

use efivar_types::LoadOption;
use thiserror::Error;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("value is {actual} bytes, expected {expected}")]
    Size { expected: usize, actual: usize },
    #[error("item #{index} truncated")]
    Element { index: usize },
    #[error("malformed payload")]
    Parse(#[from] efivar_types::ParseError),
}

/// Decodes one fixed-width little-endian scalar; the payload must match the
/// value size exactly.
pub(crate) fn primitive_unmarshal<T: FromBytes>(data: &[u8]) -> Result<T, CodecError> {
    T::read_from_bytes(data).map_err(|_| CodecError::Size {
        expected: size_of::<T>(),
        actual: data.len(),
    })
}

pub(crate) fn primitive_marshal<T: IntoBytes + Immutable>(
    value: &T,
    out: &mut Vec<u8>,
) -> Result<(), CodecError> {
    out.extend_from_slice(value.as_bytes());
    Ok(())
}

/// Decodes scalars back to back until the payload is exhausted; a partial
/// trailing element names its index.
pub(crate) fn slice_unmarshal<T: FromBytes>(data: &[u8]) -> Result<Vec<T>, CodecError> {
    let mut out = Vec::with_capacity(data.len() / size_of::<T>());
    for (index, chunk) in data.chunks(size_of::<T>()).enumerate() {
        match T::read_from_bytes(chunk) {
            Ok(value) => out.push(value),
            Err(_) => return Err(CodecError::Element { index }),
        }
    }
    Ok(out)
}

#[expect(clippy::ptr_arg)] // signature fixed by the descriptor's fn type
pub(crate) fn slice_marshal<T: IntoBytes + Immutable>(
    values: &Vec<T>,
    out: &mut Vec<u8>,
) -> Result<(), CodecError> {
    for value in values {
        out.extend_from_slice(value.as_bytes());
    }
    Ok(())
}

pub(crate) fn load_option_unmarshal(data: &[u8]) -> Result<LoadOption, CodecError> {
    let (value, _) = LoadOption::parse(data)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_round_trip() {
        let mut buf = Vec::new();
        primitive_marshal(&0x1234u16, &mut buf).unwrap();
        assert_eq!(buf, [0x34, 0x12]);
        assert_eq!(primitive_unmarshal::<u16>(&buf).unwrap(), 0x1234);
    }

    #[test]
    fn primitive_rejects_wrong_size() {
        assert!(matches!(
            primitive_unmarshal::<u16>(&[0x01]),
            Err(CodecError::Size {
                expected: 2,
                actual: 1
            })
        ));
        assert!(matches!(
            primitive_unmarshal::<u16>(&[0x01, 0x02, 0x03]),
            Err(CodecError::Size { .. })
        ));
    }

    #[test]
    fn slice_round_trip() {
        let values = vec![0x0001u16, 0x0002, 0xFFFF];
        let mut buf = Vec::new();
        slice_marshal(&values, &mut buf).unwrap();
        assert_eq!(buf, [0x01, 0x00, 0x02, 0x00, 0xFF, 0xFF]);
        assert_eq!(slice_unmarshal::<u16>(&buf).unwrap(), values);
    }

    #[test]
    fn slice_reports_partial_element() {
        assert!(matches!(
            slice_unmarshal::<u16>(&[0x01, 0x00, 0x02]),
            Err(CodecError::Element { index: 1 })
        ));
    }

    #[test]
    fn empty_slice() {
        assert_eq!(slice_unmarshal::<u16>(&[]).unwrap(), Vec::<u16>::new());
    }
}
