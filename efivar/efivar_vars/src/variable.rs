// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The typed variable descriptor.

use crate::codec::CodecError;
use crate::VarError;
use efivar_specs::nvram::VariableAttributes;
use efivar_storage::read_all;
use efivar_storage::VariableStore;
use guid::Guid;
use std::borrow::Cow;

pub(crate) type MarshalFn<T> = fn(&T, &mut Vec<u8>) -> Result<(), CodecError>;
pub(crate) type UnmarshalFn<T> = fn(&[u8]) -> Result<T, CodecError>;

/// A firmware variable with a known value type.
///
/// Either codec direction may be absent; calling the corresponding operation
/// then fails with [`VarError::UnsupportedOp`]. `Boot####` entries, for
/// example, are written by the firmware and decode-only here.
pub struct Variable<T> {
    pub(crate) name: Cow<'static, str>,
    pub(crate) vendor: Guid,
    pub(crate) default_attrs: VariableAttributes,
    pub(crate) marshal: Option<MarshalFn<T>>,
    pub(crate) unmarshal: Option<UnmarshalFn<T>>,
}

impl<T> Variable<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vendor(&self) -> Guid {
        self.vendor
    }

    /// Reads and decodes the variable, returning its attributes alongside the
    /// value.
    pub fn get<S: VariableStore + ?Sized>(
        &self,
        store: &S,
    ) -> Result<(VariableAttributes, T), VarError> {
        let unmarshal = self.unmarshal.ok_or(VarError::UnsupportedOp)?;
        let (attrs, data) = read_all(store, &self.name, self.vendor)?;
        let value = unmarshal(&data).map_err(VarError::Codec)?;
        Ok((attrs, value))
    }

    /// Encodes and writes the variable with an explicit attribute mask.
    pub fn set_with_attributes<S: VariableStore + ?Sized>(
        &self,
        store: &S,
        attrs: VariableAttributes,
        value: &T,
    ) -> Result<(), VarError> {
        let marshal = self.marshal.ok_or(VarError::UnsupportedOp)?;
        let mut buf = Vec::new();
        marshal(value, &mut buf).map_err(VarError::Codec)?;
        store.set(&self.name, self.vendor, attrs, &buf)?;
        Ok(())
    }

    /// Encodes and writes the variable with its default attributes.
    pub fn set<S: VariableStore + ?Sized>(&self, store: &S, value: &T) -> Result<(), VarError> {
        self.set_with_attributes(store, self.default_attrs, value)
    }
}
