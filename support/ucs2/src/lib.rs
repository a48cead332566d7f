// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Borrowed and owned views of null-terminated UCS-2 little-endian strings.
//!
//! Firmware variable payloads embed descriptions and file names as 16-bit
//! little-endian strings at arbitrary byte offsets. Both types here keep the
//! raw bytes (terminator included) rather than decoded text, so a value
//! written back out reproduces its exact input, and neither assumes `u16`
//! alignment.

use std::fmt;
use thiserror::Error;

/// Errors which may occur while parsing UCS-2
#[derive(Debug, Error)]
pub enum Ucs2Error {
    /// the data does not hold a whole number of 16-bit units
    #[error("data does not hold a whole number of 16-bit units")]
    OddLength,
    /// the data ran out before a null terminator
    #[error("data ran out before a null terminator")]
    Unterminated,
}

/// A borrowed null-terminated UCS-2 LE string, backed by plain bytes.
///
/// # Example
///
/// ```
/// # use ucs2::Ucs2Str;
/// let raw = [b'O', 0, b'K', 0, 0, 0];
/// let s = Ucs2Str::parse_prefix(&raw).unwrap();
/// assert_eq!(s.as_bytes().len(), raw.len());
/// assert_eq!(s.to_string(), "OK");
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ucs2Str<'a> {
    // Invariant: even length, with the string's only null unit at the end.
    bytes: &'a [u8],
}

impl<'a> Ucs2Str<'a> {
    /// Scans `buf` in 16-bit units for the first null and returns the prefix
    /// running through it. Bytes past the terminator are left to the caller;
    /// `as_bytes().len()` on the result is the count a sequential parser
    /// consumes.
    pub fn parse_prefix(buf: &'a [u8]) -> Result<Self, Ucs2Error> {
        for (i, unit) in buf.chunks_exact(2).enumerate() {
            if let [0, 0] = unit {
                return Ok(Ucs2Str {
                    bytes: &buf[..(i + 1) * 2],
                });
            }
        }
        // No terminator: a trailing half unit and a clean runout report
        // differently.
        if buf.len() % 2 != 0 {
            Err(Ucs2Error::OddLength)
        } else {
            Err(Ucs2Error::Unterminated)
        }
    }

    /// The raw bytes, terminator included.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// The raw bytes with the terminator dropped.
    pub fn as_bytes_trimmed(&self) -> &'a [u8] {
        &self.bytes[..self.bytes.len() - 2]
    }

    /// The code units before the terminator.
    pub fn units(&self) -> impl Iterator<Item = u16> + 'a {
        self.as_bytes_trimmed()
            .chunks_exact(2)
            .map(|unit| u16::from_le_bytes([unit[0], unit[1]]))
    }

    /// Copies this string into its owned counterpart.
    pub fn to_ucs2_string(&self) -> Ucs2String {
        Ucs2String {
            bytes: self.bytes.to_vec(),
        }
    }
}

impl fmt::Display for Ucs2Str<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // UCS-2 permits unpaired surrogates that UTF-16 rejects; those come
        // out as the replacement character.
        for c in char::decode_utf16(self.units()) {
            fmt::Write::write_char(f, c.unwrap_or(char::REPLACEMENT_CHARACTER))?;
        }
        Ok(())
    }
}

impl fmt::Debug for Ucs2Str<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.to_string(), f)
    }
}

/// The owned counterpart of [`Ucs2Str`].
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ucs2String {
    // Same invariant as Ucs2Str.
    bytes: Vec<u8>,
}

impl Ucs2String {
    /// Borrows this string as a [`Ucs2Str`].
    pub fn as_ucs2(&self) -> Ucs2Str<'_> {
        Ucs2Str { bytes: &self.bytes }
    }

    /// The raw bytes, terminator included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes self, returning the raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl From<&str> for Ucs2String {
    fn from(s: &str) -> Ucs2String {
        // A NUL in the input would forge an early terminator; cut there, as
        // the validating parser would.
        let mut bytes: Vec<u8> = s
            .encode_utf16()
            .take_while(|&unit| unit != 0)
            .flat_map(|unit| unit.to_le_bytes())
            .collect();
        bytes.extend_from_slice(&[0, 0]);
        Ucs2String { bytes }
    }
}

impl fmt::Display for Ucs2String {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.as_ucs2(), f)
    }
}

impl fmt::Debug for Ucs2String {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.as_ucs2(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_scan_stops_at_terminator() {
        // "asd\0" followed by two stray bytes the caller keeps.
        let raw = [0x61, 0x00, 0x73, 0x00, 0x64, 0x00, 0x00, 0x00, 0x01, 0x02];

        let s = Ucs2Str::parse_prefix(&raw).unwrap();
        assert_eq!(s.as_bytes(), &raw[..8]);
        assert_eq!(raw.len() - s.as_bytes().len(), 2);
        assert_eq!(s.to_string(), "asd");
    }

    #[test]
    fn interior_null_ends_the_string() {
        let a = Ucs2String::from("hello!");
        let owned = Ucs2String::from("hello!");
        let b = Ucs2Str::parse_prefix(owned.as_bytes()).unwrap();
        assert_eq!(a.as_ucs2(), b);

        // From<&str> cuts at a NUL rather than embedding it.
        assert_eq!(Ucs2String::from("hi\0there").to_string(), "hi");
    }

    #[test]
    fn empty_string() {
        let s = Ucs2Str::parse_prefix(&[0, 0]).unwrap();
        assert_eq!(s.as_bytes(), &[0, 0]);
        assert!(s.as_bytes_trimmed().is_empty());
        assert_eq!(s.to_string(), "");
    }

    #[test]
    fn unterminated_data_fails() {
        let buf: Vec<u8> = "so close!"
            .encode_utf16()
            .flat_map(|u| u.to_le_bytes())
            .collect();
        assert!(matches!(
            Ucs2Str::parse_prefix(&buf),
            Err(Ucs2Error::Unterminated)
        ));
    }

    #[test]
    fn odd_tail_without_terminator_fails() {
        assert!(matches!(
            Ucs2Str::parse_prefix(&[0x61, 0x00, 0x73]),
            Err(Ucs2Error::OddLength)
        ));
    }

    #[test]
    fn odd_tail_after_terminator_is_callers_problem() {
        // The scan never reaches the stray byte.
        let s = Ucs2Str::parse_prefix(&[0x61, 0x00, 0x00, 0x00, 0x01]).unwrap();
        assert_eq!(s.as_bytes().len(), 4);
    }

    #[test]
    fn str_round_trip() {
        let s = Ucs2String::from("BootNext");
        assert_eq!(s.as_bytes().len(), ("BootNext".len() + 1) * 2);
        assert_eq!(s.to_string(), "BootNext");
        assert_eq!(s.as_ucs2().units().count(), "BootNext".len());
    }
}
