// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Offset-tracking slice reader used by the nested variable payload parsers.

use crate::ParseError;
use ucs2::Ucs2Error;
use ucs2::Ucs2Str;
use zerocopy::FromBytes;

/// A cursor over a byte slice.
///
/// `base` is the absolute position of the slice within the outermost buffer,
/// so errors produced by nested parsers point at the real input offset.
/// Fixed-width reads are counted, letting a short read name the field it was
/// part of.
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
    base: usize,
    fields: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self::at(buf, 0)
    }

    /// A reader over a sub-slice that starts `base` bytes into the outermost
    /// buffer.
    pub fn at(buf: &'a [u8], base: usize) -> Self {
        ByteReader {
            buf,
            pos: 0,
            base,
            fields: 0,
        }
    }

    /// Absolute offset of the next unread byte.
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Reads one fixed-width little-endian field.
    pub fn read<T: FromBytes>(&mut self) -> Result<T, ParseError> {
        let index = self.fields;
        self.fields += 1;
        let (value, _) = T::read_from_prefix(&self.buf[self.pos..]).map_err(|_| {
            ParseError::Field {
                index,
                offset: self.offset(),
            }
        })?;
        self.pos += size_of::<T>();
        Ok(value)
    }

    /// Takes exactly `len` bytes.
    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8], ParseError> {
        if self.remaining() < len {
            return Err(ParseError::Body(self.offset()));
        }
        let out = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    /// Takes everything that is left.
    pub fn rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }

    /// Scans byte-wise through the first `0x00`, returning the scanned bytes
    /// terminator included. Fails if the slice ends first.
    pub fn read_ascii_nul(&mut self) -> Result<&'a [u8], ParseError> {
        let rest = &self.buf[self.pos..];
        match rest.iter().position(|&b| b == 0) {
            Some(idx) => {
                let out = &rest[..idx + 1];
                self.pos += idx + 1;
                Ok(out)
            }
            None => Err(ParseError::NullTerminated),
        }
    }

    /// Scans in 16-bit units through the first `0x0000`, returning the
    /// validated string terminator included. Fails if the slice ends first.
    pub fn read_ucs2_nul(&mut self) -> Result<Ucs2Str<'a>, Ucs2Error> {
        let s = Ucs2Str::parse_prefix(&self.buf[self.pos..])?;
        self.pos += s.as_bytes().len();
        Ok(s)
    }
}

/// Decodes an even-length run of little-endian UTF-16 code units.
pub fn utf16_lossy(bytes: &[u8]) -> String {
    String::from_utf16_lossy(
        &bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes(c.try_into().unwrap()))
            .collect::<Vec<u16>>(),
    )
}

/// Like [`utf16_lossy`], truncating at the first U+0000.
pub fn utf16_nul_lossy(bytes: &[u8]) -> String {
    String::from_utf16_lossy(
        &bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes(c.try_into().unwrap()))
            .take_while(|&u| u != 0)
            .collect::<Vec<u16>>(),
    )
}
