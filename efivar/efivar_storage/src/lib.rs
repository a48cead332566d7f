// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Abstractions over the firmware variable store, with two backends: the
//! Linux `efivarfs` directory of files and the Windows firmware environment
//! API.
//!
//! All operations are synchronous blocking calls; a store handle holds no
//! long-lived OS resources beyond the scope of a single call, except name
//! iterators, which own their directory handle until closed or dropped.

use efivar_specs::nvram::VariableAttributes;
use guid::Guid;
use std::io;
use thiserror::Error;

pub mod efivarfs;
mod safeguard;
pub mod winapi;

pub use efivarfs::EfivarFs;
pub use winapi::WinApiStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("variable not found")]
    NotFound,
    #[error("buffer too small")]
    InsufficientSpace,
    #[error("malformed variable enumeration record")]
    BadRecord,
    #[error("firmware variable os call")]
    Io(#[source] io::Error),
}

/// A variable's key: its name and the vendor identifier scoping it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableNameItem {
    pub name: String,
    pub vendor: Guid,
}

/// Single-pass stream of variable names.
///
/// Iteration never raises: a terminal failure ends the stream and is held for
/// [`err`](Self::err). Callers loop, then inspect `err`.
pub trait VariableNames: Iterator<Item = VariableNameItem> {
    /// The error that terminated iteration early, if any.
    fn err(&self) -> Option<&StoreError>;

    /// Releases the underlying handle. Idempotent; dropping the iterator has
    /// the same effect.
    fn close(&mut self);
}

/// Access to a firmware variable store.
///
/// Implementations store and retrieve; they are not required to validate
/// attribute combinations.
pub trait VariableStore {
    /// Enumerate the names of all variables currently set.
    fn variable_names(&self) -> Result<Box<dyn VariableNames + '_>, StoreError>;

    /// Approximate payload size in bytes, excluding any storage framing.
    fn size_hint(&self, name: &str, vendor: Guid) -> Result<u64, StoreError>;

    /// Reads the variable into `out`, returning its attributes and payload
    /// length. Fails with [`StoreError::InsufficientSpace`] when `out` cannot
    /// hold the payload; the buffer contents are unspecified then.
    fn get(
        &self,
        name: &str,
        vendor: Guid,
        out: &mut [u8],
    ) -> Result<(VariableAttributes, usize), StoreError>;

    /// Creates or overwrites the variable. With
    /// [`append_write`](VariableAttributes::append_write)
    /// set, the payload is appended to the existing value instead.
    fn set(
        &self,
        name: &str,
        vendor: Guid,
        attrs: VariableAttributes,
        value: &[u8],
    ) -> Result<(), StoreError>;

    /// Removes the variable. Fails with [`StoreError::NotFound`] if absent.
    fn delete(&self, name: &str, vendor: Guid) -> Result<(), StoreError>;
}

// Boilerplate: forward `VariableStore` methods for `Box<dyn VariableStore>`
impl VariableStore for Box<dyn VariableStore> {
    fn variable_names(&self) -> Result<Box<dyn VariableNames + '_>, StoreError> {
        (**self).variable_names()
    }

    fn size_hint(&self, name: &str, vendor: Guid) -> Result<u64, StoreError> {
        (**self).size_hint(name, vendor)
    }

    fn get(
        &self,
        name: &str,
        vendor: Guid,
        out: &mut [u8],
    ) -> Result<(VariableAttributes, usize), StoreError> {
        (**self).get(name, vendor, out)
    }

    fn set(
        &self,
        name: &str,
        vendor: Guid,
        attrs: VariableAttributes,
        value: &[u8],
    ) -> Result<(), StoreError> {
        (**self).set(name, vendor, attrs, value)
    }

    fn delete(&self, name: &str, vendor: Guid) -> Result<(), StoreError> {
        (**self).delete(name, vendor)
    }
}

/// Upper bound [`read_all`] grows a buffer to. Firmware variables past this
/// size are not readable through the convenience path.
pub const READ_ALL_LIMIT: usize = 4096;

/// Reads a whole variable, sizing the buffer from the store's hint and
/// doubling on [`StoreError::InsufficientSpace`] up to [`READ_ALL_LIMIT`].
pub fn read_all<S: VariableStore + ?Sized>(
    store: &S,
    name: &str,
    vendor: Guid,
) -> Result<(VariableAttributes, Vec<u8>), StoreError> {
    let hint = match store.size_hint(name, vendor) {
        Ok(hint) => (hint as usize).clamp(1, READ_ALL_LIMIT),
        Err(_) => 8,
    };

    let mut buf = vec![0; hint];
    loop {
        match store.get(name, vendor, &mut buf) {
            Ok((attrs, n)) => {
                buf.truncate(n);
                return Ok((attrs, buf));
            }
            Err(StoreError::InsufficientSpace) if buf.len() < READ_ALL_LIMIT => {
                let grown = (buf.len() * 2).min(READ_ALL_LIMIT);
                buf.resize(grown, 0);
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Store with one fixed variable, counting `get` calls.
    struct FixedStore {
        payload: Vec<u8>,
        hint: Option<u64>,
        gets: Cell<usize>,
    }

    impl VariableStore for FixedStore {
        fn variable_names(&self) -> Result<Box<dyn VariableNames + '_>, StoreError> {
            unimplemented!()
        }

        fn size_hint(&self, _name: &str, _vendor: Guid) -> Result<u64, StoreError> {
            self.hint.ok_or(StoreError::NotFound)
        }

        fn get(
            &self,
            _name: &str,
            _vendor: Guid,
            out: &mut [u8],
        ) -> Result<(VariableAttributes, usize), StoreError> {
            self.gets.set(self.gets.get() + 1);
            if out.len() < self.payload.len() {
                return Err(StoreError::InsufficientSpace);
            }
            out[..self.payload.len()].copy_from_slice(&self.payload);
            Ok((VariableAttributes::DEFAULT_ATTRIBUTES, self.payload.len()))
        }

        fn set(
            &self,
            _name: &str,
            _vendor: Guid,
            _attrs: VariableAttributes,
            _value: &[u8],
        ) -> Result<(), StoreError> {
            unimplemented!()
        }

        fn delete(&self, _name: &str, _vendor: Guid) -> Result<(), StoreError> {
            unimplemented!()
        }
    }

    #[test]
    fn read_all_uses_hint() {
        let store = FixedStore {
            payload: vec![0xAB; 100],
            hint: Some(100),
            gets: Cell::new(0),
        };
        let (_, data) = read_all(&store, "Var", Guid::ZERO).unwrap();
        assert_eq!(data, vec![0xAB; 100]);
        assert_eq!(store.gets.get(), 1);
    }

    #[test]
    fn read_all_grows_without_hint() {
        let store = FixedStore {
            payload: vec![0xCD; 100],
            hint: None,
            gets: Cell::new(0),
        };
        let (_, data) = read_all(&store, "Var", Guid::ZERO).unwrap();
        assert_eq!(data, vec![0xCD; 100]);
        // 8 -> 16 -> 32 -> 64 -> 128
        assert_eq!(store.gets.get(), 5);
    }

    #[test]
    fn read_all_bounded() {
        let store = FixedStore {
            payload: vec![0; READ_ALL_LIMIT + 1],
            hint: None,
            gets: Cell::new(0),
        };
        assert!(matches!(
            read_all(&store, "Var", Guid::ZERO),
            Err(StoreError::InsufficientSpace)
        ));
    }

    #[test]
    fn read_all_lying_hint() {
        // A hint smaller than the payload still converges.
        let store = FixedStore {
            payload: vec![0xEF; 60],
            hint: Some(10),
            gets: Cell::new(0),
        };
        let (_, data) = read_all(&store, "Var", Guid::ZERO).unwrap();
        assert_eq!(data.len(), 60);
    }

    #[test]
    fn read_all_empty_variable() {
        let store = FixedStore {
            payload: Vec::new(),
            hint: Some(0),
            gets: Cell::new(0),
        };
        let (_, data) = read_all(&store, "Var", Guid::ZERO).unwrap();
        assert!(data.is_empty());
    }
}
