// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Typed access to well-known firmware variables.
//!
//! A [`Variable`] descriptor binds a name and vendor identifier to marshal
//! and unmarshal functions, so callers exchange domain values with the store
//! instead of raw bytes. The descriptors for the boot-manager variables are
//! provided here, together with an iterator over the configured `Boot####`
//! entries.

use efivar_specs::nvram::VariableAttributes;
use efivar_storage::StoreError;
use thiserror::Error;

mod codec;
mod variable;

pub mod boot;

pub use boot::boot;
pub use boot::boot_entries;
pub use boot::BootEntry;
pub use boot::BootEntryIter;
pub use boot::BOOT_CURRENT;
pub use boot::BOOT_NEXT;
pub use boot::BOOT_ORDER;
pub use codec::CodecError;
pub use variable::Variable;

#[derive(Debug, Error)]
pub enum VarError {
    /// The descriptor has no marshaller (on set) or unmarshaller (on get)
    /// for the requested direction.
    #[error("variable does not support this operation")]
    UnsupportedOp,
    #[error("reading or writing variable")]
    Store(#[from] StoreError),
    #[error("encoding or decoding variable value")]
    Codec(#[source] CodecError),
}

/// Default attribute mask for the variables defined here.
pub(crate) const DEFAULT_ATTRS: VariableAttributes = VariableAttributes::DEFAULT_ATTRIBUTES;
