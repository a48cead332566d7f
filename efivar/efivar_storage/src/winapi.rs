// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Variable store over the Windows firmware environment API.
//!
//! The store converts names to null-terminated wide strings and the vendor
//! identifier to its braced text form, then defers to the four OS entry
//! points behind [`FirmwareEnvironmentApi`]. Keeping the entry points behind
//! a trait keeps the record parsing testable off Windows.

use crate::StoreError;
use crate::VariableNameItem;
use crate::VariableNames;
use crate::VariableStore;
use efivar_specs::nvram::VariableAttributes;
use guid::Guid;
use std::io;
use thiserror::Error;
use ucs2::Ucs2Str;
use zerocopy::FromBytes;

/// `SystemEnvironmentValueInformation`: the class that enumerates names and
/// vendor identifiers.
pub const SYSTEM_ENVIRONMENT_VALUE_INFORMATION: u32 = 1;

/// Failure of one of the OS entry points, reduced to the cases the store
/// distinguishes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("buffer too small")]
    BufferTooSmall,
    #[error("environment variable not found")]
    NotFound,
    #[error(transparent)]
    Os(io::Error),
}

/// The four firmware environment entry points.
///
/// Wide-string arguments are null-terminated UTF-16.
pub trait FirmwareEnvironmentApi {
    /// `GetFirmwareEnvironmentVariableEx`: fills `buf`, returning the
    /// variable's attributes and payload length.
    fn get(&self, name: &[u16], guid: &[u16], buf: &mut [u8]) -> Result<(u32, usize), ApiError>;

    /// `SetFirmwareEnvironmentVariableEx`: an empty `value` deletes the
    /// variable.
    fn set(&self, name: &[u16], guid: &[u16], value: &[u8], attrs: u32) -> Result<(), ApiError>;

    /// `NtEnumerateSystemEnvironmentValuesEx`: with no buffer, reports the
    /// required size through `len` and [`ApiError::BufferTooSmall`];
    /// otherwise fills `buf` with packed records.
    fn enumerate(
        &self,
        information_class: u32,
        buf: Option<&mut [u8]>,
        len: &mut u32,
    ) -> Result<(), ApiError>;

    /// `NtQuerySystemEnvironmentValueEx` with a null output buffer: reports
    /// the value size through `len` and [`ApiError::BufferTooSmall`].
    fn query(&self, name: &[u16], vendor: &Guid, len: &mut u32) -> Result<(), ApiError>;
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(Some(0)).collect()
}

fn map_api(err: ApiError) -> StoreError {
    match err {
        ApiError::BufferTooSmall => StoreError::InsufficientSpace,
        ApiError::NotFound => StoreError::NotFound,
        ApiError::Os(err) => StoreError::Io(err),
    }
}

/// A store backed by [`FirmwareEnvironmentApi`] calls.
pub struct WinApiStore<A> {
    api: A,
}

impl<A> WinApiStore<A> {
    pub fn new(api: A) -> Self {
        WinApiStore { api }
    }
}

#[cfg(windows)]
impl WinApiStore<SystemFirmwareApi> {
    /// The store over the real OS entry points.
    pub fn system() -> Self {
        Self::new(SystemFirmwareApi)
    }
}

impl<A: FirmwareEnvironmentApi> VariableStore for WinApiStore<A> {
    fn variable_names(&self) -> Result<Box<dyn VariableNames + '_>, StoreError> {
        // First a null buffer to learn the required size.
        let mut len = 0u32;
        match self
            .api
            .enumerate(SYSTEM_ENVIRONMENT_VALUE_INFORMATION, None, &mut len)
        {
            Ok(()) | Err(ApiError::BufferTooSmall) => {}
            Err(err) => return Err(map_api(err)),
        }

        let mut buf = vec![0u8; len as usize];
        self.api
            .enumerate(SYSTEM_ENVIRONMENT_VALUE_INFORMATION, Some(&mut buf), &mut len)
            .map_err(map_api)?;
        buf.truncate(len as usize);

        Ok(Box::new(WinVariableNames {
            buf,
            pos: 0,
            err: None,
        }))
    }

    fn size_hint(&self, name: &str, vendor: Guid) -> Result<u64, StoreError> {
        let mut len = 0u32;
        match self.api.query(&wide(name), &vendor, &mut len) {
            Ok(()) | Err(ApiError::BufferTooSmall) => Ok(len as u64),
            Err(err) => Err(map_api(err)),
        }
    }

    fn get(
        &self,
        name: &str,
        vendor: Guid,
        out: &mut [u8],
    ) -> Result<(VariableAttributes, usize), StoreError> {
        let (attrs, n) = self
            .api
            .get(&wide(name), &wide(&vendor.braced()), out)
            .map_err(map_api)?;
        Ok((VariableAttributes::from(attrs), n))
    }

    fn set(
        &self,
        name: &str,
        vendor: Guid,
        attrs: VariableAttributes,
        value: &[u8],
    ) -> Result<(), StoreError> {
        tracing::debug!(name, %vendor, len = value.len(), "writing firmware variable");
        self.api
            .set(&wide(name), &wide(&vendor.braced()), value, attrs.into())
            .map_err(map_api)
    }

    fn delete(&self, name: &str, vendor: Guid) -> Result<(), StoreError> {
        tracing::debug!(name, %vendor, "deleting firmware variable");
        // An empty write with cleared attributes is the documented way to
        // remove a variable.
        self.api
            .set(&wide(name), &wide(&vendor.braced()), &[], 0)
            .map_err(map_api)
    }
}

/// Byte offset of the name within an enumeration record: the next-entry
/// offset word plus the vendor identifier.
const RECORD_NAME_OFFSET: usize = 4 + 16;

/// Iterator over the packed records filled in by the enumeration call.
///
/// Each record: `next-entry-offset` (u32, zero meaning "last, the record runs
/// to the end of the buffer"), the 16-byte vendor identifier, and the
/// null-terminated UTF-16 name.
struct WinVariableNames {
    buf: Vec<u8>,
    pos: usize,
    err: Option<StoreError>,
}

impl WinVariableNames {
    fn take_record(&mut self) -> Result<Option<(String, Guid)>, StoreError> {
        if self.pos >= self.buf.len() {
            return Ok(None);
        }

        let rec = &self.buf[self.pos..];
        if rec.len() < RECORD_NAME_OFFSET {
            return Err(StoreError::BadRecord);
        }

        let next_offset = u32::from_le_bytes(rec[..4].try_into().unwrap()) as usize;
        let rec = if next_offset == 0 {
            self.pos = self.buf.len();
            rec
        } else {
            if next_offset < RECORD_NAME_OFFSET || next_offset > rec.len() {
                return Err(StoreError::BadRecord);
            }
            self.pos += next_offset;
            &rec[..next_offset]
        };

        let vendor = Guid::read_from_bytes(&rec[4..RECORD_NAME_OFFSET]).unwrap();
        let name = Ucs2Str::parse_prefix(&rec[RECORD_NAME_OFFSET..])
            .map_err(|_| StoreError::BadRecord)?
            .to_string();

        Ok(Some((name, vendor)))
    }
}

impl Iterator for WinVariableNames {
    type Item = VariableNameItem;

    fn next(&mut self) -> Option<VariableNameItem> {
        match self.take_record() {
            Ok(Some((name, vendor))) => Some(VariableNameItem { name, vendor }),
            Ok(None) => None,
            Err(err) => {
                self.err = Some(err);
                self.pos = self.buf.len();
                None
            }
        }
    }
}

impl VariableNames for WinVariableNames {
    fn err(&self) -> Option<&StoreError> {
        self.err.as_ref()
    }

    fn close(&mut self) {
        self.pos = self.buf.len();
        self.buf = Vec::new();
    }
}

#[cfg(windows)]
pub use system::SystemFirmwareApi;

#[cfg(windows)]
mod system {
    use super::ApiError;
    use super::FirmwareEnvironmentApi;
    use guid::Guid;
    use std::ffi::c_void;
    use std::io;
    use std::ptr::null_mut;
    use windows_sys::Win32::System::SystemInformation::GetFirmwareEnvironmentVariableExW;
    use windows_sys::Win32::System::SystemInformation::SetFirmwareEnvironmentVariableExW;
    use zerocopy::IntoBytes;

    const ERROR_INSUFFICIENT_BUFFER: i32 = 122;
    const ERROR_ENVVAR_NOT_FOUND: i32 = 203;
    const STATUS_BUFFER_TOO_SMALL: i32 = 0xC000_0023_u32 as i32;

    /// `RTL_UNICODE_STRING`: counted wide string, lengths in bytes.
    #[repr(C)]
    struct UnicodeString {
        length: u16,
        maximum_length: u16,
        buffer: *const u16,
    }

    // The enumeration entry points have no bindings; declare them directly
    // against ntdll.
    #[link(name = "ntdll")]
    extern "system" {
        fn NtEnumerateSystemEnvironmentValuesEx(
            information_class: u32,
            buffer: *mut c_void,
            buffer_length: *mut u32,
        ) -> i32;

        fn NtQuerySystemEnvironmentValueEx(
            variable_name: *const UnicodeString,
            vendor_guid: *const u8,
            value: *mut c_void,
            value_length: *mut u32,
            attributes: *mut u32,
        ) -> i32;
    }

    fn last_error() -> ApiError {
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(ERROR_INSUFFICIENT_BUFFER) => ApiError::BufferTooSmall,
            Some(ERROR_ENVVAR_NOT_FOUND) => ApiError::NotFound,
            _ => ApiError::Os(err),
        }
    }

    fn check_nt_status(status: i32) -> Result<(), ApiError> {
        match status {
            0 => Ok(()),
            STATUS_BUFFER_TOO_SMALL => Err(ApiError::BufferTooSmall),
            status => Err(ApiError::Os(io::Error::other(format!(
                "NTSTATUS {status:#010x}"
            )))),
        }
    }

    /// The real OS entry points.
    pub struct SystemFirmwareApi;

    impl FirmwareEnvironmentApi for SystemFirmwareApi {
        fn get(
            &self,
            name: &[u16],
            guid: &[u16],
            buf: &mut [u8],
        ) -> Result<(u32, usize), ApiError> {
            let mut attrs = 0u32;
            // SAFETY: both strings are live and null-terminated, the buffer
            // is writable for its full length.
            let n = unsafe {
                GetFirmwareEnvironmentVariableExW(
                    name.as_ptr(),
                    guid.as_ptr(),
                    buf.as_mut_ptr().cast(),
                    buf.len() as u32,
                    &mut attrs,
                )
            };
            if n == 0 {
                return Err(last_error());
            }
            Ok((attrs, n as usize))
        }

        fn set(
            &self,
            name: &[u16],
            guid: &[u16],
            value: &[u8],
            attrs: u32,
        ) -> Result<(), ApiError> {
            // SAFETY: both strings are live and null-terminated; the value
            // pointer covers `value.len()` readable bytes.
            let ok = unsafe {
                SetFirmwareEnvironmentVariableExW(
                    name.as_ptr(),
                    guid.as_ptr(),
                    value.as_ptr().cast::<c_void>().cast_mut(),
                    value.len() as u32,
                    attrs,
                )
            };
            if ok == 0 {
                return Err(last_error());
            }
            Ok(())
        }

        fn enumerate(
            &self,
            information_class: u32,
            buf: Option<&mut [u8]>,
            len: &mut u32,
        ) -> Result<(), ApiError> {
            let ptr = buf.map_or(null_mut(), |b| b.as_mut_ptr().cast());
            // SAFETY: the pointer is either null (size probe) or writable for
            // `*len` bytes.
            check_nt_status(unsafe {
                NtEnumerateSystemEnvironmentValuesEx(information_class, ptr, len)
            })
        }

        fn query(&self, name: &[u16], vendor: &Guid, len: &mut u32) -> Result<(), ApiError> {
            let chars = name.len().saturating_sub(1);
            let unicode_name = UnicodeString {
                length: (chars * 2) as u16,
                maximum_length: (name.len() * 2) as u16,
                buffer: name.as_ptr(),
            };
            // SAFETY: the counted string and vendor bytes are live for the
            // duration of the call; null output pointers request a size
            // probe.
            check_nt_status(unsafe {
                NtQuerySystemEnvironmentValueEx(
                    &unicode_name,
                    vendor.as_bytes().as_ptr(),
                    null_mut(),
                    len,
                    null_mut(),
                )
            })
        }
    }
}
