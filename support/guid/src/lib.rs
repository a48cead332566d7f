// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Provides the [`Guid`] type: a 128-bit vendor identifier in its firmware
//! wire representation, with the mixed-endian canonical text form.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

/// A 128-bit vendor identifier, stored exactly as it appears on the wire.
///
/// The canonical text form is five hyphen-separated hex groups of 8, 4, 4, 4
/// and 12 digits. The first three groups render their bytes in reverse
/// (little-endian), the last two in storage order. The column tables below
/// encode that shuffle once, and both the parser and the formatter walk them.
#[repr(transparent)]
#[derive(
    Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, IntoBytes, FromBytes, Immutable, KnownLayout,
)]
pub struct Guid([u8; 16]);

/// Wire-byte index printed at each of the sixteen hex-pair positions of the
/// text form.
const TEXT_ORDER: [usize; 16] = [3, 2, 1, 0, 5, 4, 7, 6, 8, 9, 10, 11, 12, 13, 14, 15];

/// Text column of each wire byte's hex pair; the inverse of [`TEXT_ORDER`]
/// with the four hyphens accounted for.
const HEX_COLUMN: [usize; 16] = [6, 4, 2, 0, 11, 9, 16, 14, 19, 21, 24, 26, 28, 30, 32, 34];

const HYPHEN_COLUMNS: [usize; 4] = [8, 13, 18, 23];

/// An error parsing a GUID.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The text is neither 36 characters nor 38 with braces.
    #[error("invalid GUID length")]
    Length,
    /// Hyphens or braces are not where the canonical form puts them.
    #[error("invalid GUID format")]
    Format,
    /// A character in a hex group is not a hex digit.
    #[error("invalid GUID digit")]
    Digit,
}

const fn hex_value(c: u8) -> u8 {
    // 0xFF marks a non-digit; ? and Option combinators are unavailable in
    // const fns.
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        b'A'..=b'F' => c - b'A' + 10,
        _ => 0xFF,
    }
}

impl Guid {
    /// The all-zero GUID.
    pub const ZERO: Self = Guid([0; 16]);

    /// Wraps the raw 16-byte wire representation.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Guid(bytes)
    }

    /// The raw 16-byte wire representation.
    pub const fn to_bytes(self) -> [u8; 16] {
        self.0
    }

    /// Returns a new randomly-generated Version 4 GUID.
    pub fn new_random() -> Self {
        let mut bytes = [0u8; 16];
        getrandom::getrandom(&mut bytes).expect("rng failure");

        // Version nibble (first digit of the third text group) and variant 1
        // bits (first byte of the fourth group).
        bytes[7] = bytes[7] & 0x0f | 0x40;
        bytes[8] = bytes[8] & 0x3f | 0x80;

        Guid(bytes)
    }

    /// Parses a GUID literal at compile time, panicking if it is invalid.
    /// Accepts the 36-character form and the braced 38-character form, in
    /// either case.
    pub const fn from_static_str(text: &'static str) -> Guid {
        match Self::parse_text(text.as_bytes()) {
            Ok(guid) => guid,
            Err(ParseError::Length) => panic!("GUID literal has the wrong length"),
            Err(ParseError::Format) => panic!("GUID literal is mispunctuated"),
            Err(ParseError::Digit) => panic!("GUID literal holds a non-hex digit"),
        }
    }

    const fn parse_text(text: &[u8]) -> Result<Guid, ParseError> {
        let offset = match text.len() {
            36 => 0,
            38 => {
                if text[0] != b'{' || text[37] != b'}' {
                    return Err(ParseError::Format);
                }
                1
            }
            _ => return Err(ParseError::Length),
        };

        let mut h = 0;
        while h < HYPHEN_COLUMNS.len() {
            if text[offset + HYPHEN_COLUMNS[h]] != b'-' {
                return Err(ParseError::Format);
            }
            h += 1;
        }

        let mut bytes = [0u8; 16];
        let mut i = 0;
        while i < bytes.len() {
            let col = offset + HEX_COLUMN[i];
            let hi = hex_value(text[col]);
            let lo = hex_value(text[col + 1]);
            if hi > 0xf || lo > 0xf {
                return Err(ParseError::Digit);
            }
            bytes[i] = hi << 4 | lo;
            i += 1;
        }

        Ok(Guid(bytes))
    }

    /// Renders the 38-character braced form, e.g.
    /// `{8BE4DF61-93CA-11D2-AA0D-00E098032B8C}`.
    pub fn braced(&self) -> String {
        format!("{{{self}}}")
    }
}

// Uppercase, matching the on-disk and host-API conventions.
impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (pos, &source) in TEXT_ORDER.iter().enumerate() {
            if pos == 4 || pos == 6 || pos == 8 || pos == 10 {
                f.write_str("-")?;
            }
            write!(f, "{:02X}", self.0[source])?;
        }
        Ok(())
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Guid {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_text(s.as_bytes())
    }
}

impl From<[u8; 16]> for Guid {
    fn from(bytes: [u8; 16]) -> Self {
        Guid(bytes)
    }
}

impl From<Guid> for [u8; 16] {
    fn from(guid: Guid) -> Self {
        guid.0
    }
}

#[cfg(test)]
mod tests {
    use super::Guid;
    use super::ParseError;
    use std::str::FromStr;

    const TEXT: &str = "8BE4DF61-93CA-11D2-AA0D-00E098032B8C";

    // The wire bytes behind TEXT: the first three groups land reversed.
    const RAW: [u8; 16] = [
        0x61, 0xdf, 0xe4, 0x8b, 0xca, 0x93, 0xd2, 0x11, 0xaa, 0x0d, 0x00, 0xe0, 0x98, 0x03, 0x2b,
        0x8c,
    ];

    #[test]
    fn wire_bytes_render_mixed_endian() {
        let guid = Guid::from_bytes(RAW);
        assert_eq!(guid.to_string(), TEXT);
        assert_eq!(guid.braced(), format!("{{{TEXT}}}"));
        assert_eq!(guid.to_bytes(), RAW);
    }

    #[test]
    fn parse_accepts_either_case_and_braces() {
        for form in [
            TEXT.to_string(),
            TEXT.to_lowercase(),
            format!("{{{TEXT}}}"),
            format!("{{{}}}", TEXT.to_lowercase()),
        ] {
            assert_eq!(Guid::from_str(&form).unwrap().to_bytes(), RAW);
        }

        // Compile-time literals go through the same parser.
        const AT_COMPILE_TIME: Guid =
            Guid::from_static_str("8be4df61-93ca-11d2-aa0d-00e098032b8c");
        assert_eq!(AT_COMPILE_TIME.to_bytes(), RAW);
    }

    #[test]
    fn random_guids_round_trip() {
        for _ in 0..64 {
            let guid = Guid::new_random();
            assert_eq!(Guid::from_str(&guid.to_string()).unwrap(), guid);
            assert_eq!(Guid::from_str(&guid.braced()).unwrap(), guid);
        }
    }

    #[test]
    fn zero_is_all_zeroes() {
        assert_eq!(
            Guid::ZERO.to_string(),
            "00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn rejects_malformed_text() {
        // One character short.
        assert!(matches!(
            Guid::from_str("8BE4DF61-93CA-11D2-AA0D-00E098032B8"),
            Err(ParseError::Length)
        ));
        // Hyphen replaced.
        assert!(matches!(
            Guid::from_str("8BE4DF61+93CA-11D2-AA0D-00E098032B8C"),
            Err(ParseError::Format)
        ));
        // Wrong brackets.
        assert!(matches!(
            Guid::from_str("[8BE4DF61-93CA-11D2-AA0D-00E098032B8C]"),
            Err(ParseError::Format)
        ));
        // Non-hex digit.
        assert!(matches!(
            Guid::from_str("8BE4DFG1-93CA-11D2-AA0D-00E098032B8C"),
            Err(ParseError::Digit)
        ));
    }
}
