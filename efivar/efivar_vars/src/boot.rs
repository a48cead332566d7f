// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Descriptors for the boot-manager variables and the `Boot####` entry
//! iterator.

use crate::codec;
use crate::variable::Variable;
use crate::DEFAULT_ATTRS;
use efivar_specs::nvram::vars;
use efivar_storage::StoreError;
use efivar_storage::VariableNames;
use efivar_storage::VariableStore;
use efivar_types::LoadOption;
use std::borrow::Cow;

/// The boot option to try first on the next boot only.
///
/// UEFI spec 3.3 - Globally Defined Variables
pub const BOOT_NEXT: Variable<u16> = Variable {
    name: Cow::Borrowed(vars::BOOT_NEXT),
    vendor: vars::EFI_GLOBAL_VARIABLE,
    default_attrs: DEFAULT_ATTRS,
    marshal: Some(codec::primitive_marshal::<u16>),
    unmarshal: Some(codec::primitive_unmarshal::<u16>),
};

/// The `Boot####` option the firmware selected for the current boot. Set by
/// the firmware; writing it is possible but pointless.
pub const BOOT_CURRENT: Variable<u16> = Variable {
    name: Cow::Borrowed(vars::BOOT_CURRENT),
    vendor: vars::EFI_GLOBAL_VARIABLE,
    default_attrs: DEFAULT_ATTRS,
    marshal: Some(codec::primitive_marshal::<u16>),
    unmarshal: Some(codec::primitive_unmarshal::<u16>),
};

/// The ordered list of `Boot####` options the boot manager walks by default.
pub const BOOT_ORDER: Variable<Vec<u16>> = Variable {
    name: Cow::Borrowed(vars::BOOT_ORDER),
    vendor: vars::EFI_GLOBAL_VARIABLE,
    default_attrs: DEFAULT_ATTRS,
    marshal: Some(codec::slice_marshal::<u16>),
    unmarshal: Some(codec::slice_unmarshal::<u16>),
};

/// The load option stored under `Boot####` for the given index.
///
/// Boot entries are maintained by the firmware and other tooling; the
/// descriptor is decode-only.
pub fn boot(index: u16) -> Variable<LoadOption> {
    Variable {
        name: Cow::Owned(format!("{}{index:04X}", vars::BOOT_OPTION_PREFIX)),
        vendor: vars::EFI_GLOBAL_VARIABLE,
        default_attrs: DEFAULT_ATTRS,
        marshal: None,
        unmarshal: Some(codec::load_option_unmarshal),
    }
}

/// Index of a `Boot####` variable name, hex digits in either case.
fn boot_index(name: &str) -> Option<u16> {
    let digits = name.strip_prefix(vars::BOOT_OPTION_PREFIX)?;
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u16::from_str_radix(digits, 16).ok()
}

/// A configured boot entry: its index and the descriptor reading it.
pub struct BootEntry {
    pub index: u16,
    pub variable: Variable<LoadOption>,
}

/// Iterator over the `Boot####` entries present in a store.
///
/// Names under other vendor identifiers and names that are not `Boot` plus
/// four hex digits are skipped silently. Store-level failures surface through
/// [`err`](Self::err) after the loop.
pub struct BootEntryIter<'a> {
    names: Box<dyn VariableNames + 'a>,
}

impl BootEntryIter<'_> {
    pub fn err(&self) -> Option<&StoreError> {
        self.names.err()
    }

    pub fn close(&mut self) {
        self.names.close()
    }
}

impl Iterator for BootEntryIter<'_> {
    type Item = BootEntry;

    fn next(&mut self) -> Option<BootEntry> {
        loop {
            let item = self.names.next()?;
            if item.vendor != vars::EFI_GLOBAL_VARIABLE {
                continue;
            }
            let Some(index) = boot_index(&item.name) else {
                continue;
            };
            return Some(BootEntry {
                index,
                variable: boot(index),
            });
        }
    }
}

/// Enumerates the store and yields its `Boot####` entries.
pub fn boot_entries<S: VariableStore + ?Sized>(
    store: &S,
) -> Result<BootEntryIter<'_>, StoreError> {
    Ok(BootEntryIter {
        names: store.variable_names()?,
    })
}
