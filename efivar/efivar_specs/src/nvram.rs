// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! UEFI Nvram Variable Services

use bitfield_struct::bitfield;
use std::fmt;

/// UEFI spec 8.2 - Variable Services
#[bitfield(u32)]
#[derive(Eq, PartialEq)]
pub struct VariableAttributes {
    pub non_volatile: bool,
    pub bootservice_access: bool,
    pub runtime_access: bool,
    pub hardware_error_record: bool,
    pub authenticated_write_access: bool,
    pub time_based_authenticated_write_access: bool,
    pub append_write: bool,
    pub enhanced_authenticated_access: bool,

    #[bits(24)]
    _reserved: u32,
}

impl VariableAttributes {
    pub const DEFAULT_ATTRIBUTES: VariableAttributes = VariableAttributes::new()
        .with_non_volatile(true)
        .with_bootservice_access(true)
        .with_runtime_access(true);
    pub const DEFAULT_ATTRIBUTES_VOLATILE: VariableAttributes = VariableAttributes::new()
        .with_bootservice_access(true)
        .with_runtime_access(true);

    pub fn contains_unsupported_bits(&self) -> bool {
        unknown_bits(u32::from(*self)) != 0
    }
}

const FLAG_NAMES: &[(u32, &str)] = &[
    (0x01, "NonVolatile"),
    (0x02, "BootServiceAccess"),
    (0x04, "RuntimeAccess"),
    (0x08, "HardwareErrorRecord"),
    (0x10, "AuthenticatedWriteAccess"),
    (0x20, "TimeBasedAuthenticatedWriteAccess"),
    (0x40, "AppendWrite"),
    (0x80, "EnhancedAuthenticatedAccess"),
];

fn unknown_bits(raw: u32) -> u32 {
    FLAG_NAMES.iter().fold(raw, |rest, &(bit, _)| rest & !bit)
}

// `+`-joined flag names, unknown bits rendered as a trailing decimal.
impl fmt::Display for VariableAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = u32::from(*self);
        if raw == 0 {
            return f.write_str("0");
        }

        let mut any = false;
        for &(bit, name) in FLAG_NAMES {
            if raw & bit != 0 {
                if any {
                    f.write_str("+")?;
                }
                f.write_str(name)?;
                any = true;
            }
        }

        let rest = unknown_bits(raw);
        if rest != 0 {
            if any {
                f.write_str("+")?;
            }
            write!(f, "{rest}")?;
        }
        Ok(())
    }
}

/// UEFI spec 3.3 - Globally Defined Variables
pub mod vars {
    use guid::Guid;

    /// Vendor identifier owning the globally defined variables.
    pub const EFI_GLOBAL_VARIABLE: Guid =
        Guid::from_static_str("8BE4DF61-93CA-11D2-AA0D-00E098032B8C");

    /// The boot option to try first on the next boot only.
    pub const BOOT_NEXT: &str = "BootNext";

    /// The `Boot####` option the firmware selected for the current boot.
    pub const BOOT_CURRENT: &str = "BootCurrent";

    /// The ordered list of `Boot####` options the boot manager walks.
    pub const BOOT_ORDER: &str = "BootOrder";

    /// Prefix of the per-entry `Boot####` load option variables.
    pub const BOOT_OPTION_PREFIX: &str = "Boot";
}

#[cfg(test)]
mod tests {
    use super::VariableAttributes;

    #[test]
    fn flag_text() {
        assert_eq!(
            VariableAttributes::from(0x07).to_string(),
            "NonVolatile+BootServiceAccess+RuntimeAccess"
        );
        assert_eq!(VariableAttributes::from(0).to_string(), "0");
        // Unknown bits fall back to decimal.
        assert_eq!(
            VariableAttributes::from(0x0101).to_string(),
            "NonVolatile+256"
        );
        assert_eq!(VariableAttributes::from(0x0100).to_string(), "256");
    }

    #[test]
    fn default_attributes() {
        let attrs = VariableAttributes::DEFAULT_ATTRIBUTES;
        assert_eq!(u32::from(attrs), 0x07);
        assert!(!attrs.contains_unsupported_bits());
        assert!(VariableAttributes::from(0x0100).contains_unsupported_bits());
    }
}
