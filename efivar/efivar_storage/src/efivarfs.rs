// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Variable store over a directory of files in the `efivarfs` layout.
//!
//! One regular file per variable, named `Name-GUID`. The file starts with a
//! four byte little-endian attribute word; the rest is the payload. On a real
//! `efivarfs` mount existing files carry the immutable flag, which has to be
//! dropped around every write and delete.

use crate::safeguard::Safeguard;
use crate::StoreError;
use crate::VariableNameItem;
use crate::VariableNames;
use crate::VariableStore;
use efivar_specs::nvram::VariableAttributes;
use guid::Guid;
use std::fs;
use std::fs::File;
use std::io;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;

/// Where the Linux kernel mounts the variable filesystem.
pub const DEFAULT_MOUNT_POINT: &str = "/sys/firmware/efi/efivars";

/// A file-backed variable store rooted at a directory.
#[derive(Debug, Clone)]
pub struct EfivarFs {
    root: PathBuf,
}

impl EfivarFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        EfivarFs { root: root.into() }
    }

    /// The store at the standard `efivarfs` mount point.
    pub fn at_default_mount() -> Self {
        Self::new(DEFAULT_MOUNT_POINT)
    }

    fn file_path(&self, name: &str, vendor: Guid) -> PathBuf {
        self.root.join(format!("{name}-{vendor}"))
    }

    fn read_file(
        &self,
        path: &Path,
        out: &mut [u8],
    ) -> Result<(VariableAttributes, usize), StoreError> {
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound)
            }
            Err(err) => return Err(StoreError::Io(err)),
        };

        let mut word = [0u8; 4];
        file.read_exact(&mut word).map_err(StoreError::Io)?;
        let attrs = VariableAttributes::from(u32::from_le_bytes(word));

        let n = read_full(&mut file, out)?;

        // One more byte distinguishes "buffer exactly right" from "payload
        // continues".
        let mut probe = [0u8; 1];
        match file.read(&mut probe) {
            Ok(0) => Ok((attrs, n)),
            Ok(_) => Err(StoreError::InsufficientSpace),
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    fn write_file(
        &self,
        path: &Path,
        attrs: VariableAttributes,
        value: &[u8],
    ) -> Result<(), StoreError> {
        let mut image = Vec::with_capacity(4 + value.len());
        image.extend_from_slice(&u32::from(attrs).to_le_bytes());
        image.extend_from_slice(value);

        let guard = Safeguard::open(path).map_err(StoreError::Io)?;
        let was_protected = guard.disable().map_err(StoreError::Io)?;

        let result = write_image(path, attrs, &image);

        if was_protected {
            if let Err(err) = guard.enable() {
                if result.is_ok() {
                    return Err(StoreError::Io(err));
                }
                // Keep the write failure as the primary error.
                tracing::warn!(
                    path = %path.display(),
                    error = &err as &dyn std::error::Error,
                    "failed to restore immutable flag",
                );
            }
        }
        result
    }
}

fn write_image(path: &Path, attrs: VariableAttributes, image: &[u8]) -> Result<(), StoreError> {
    let mut opts = fs::OpenOptions::new();
    // No truncate: efivarfs replaces the variable on each complete write, and
    // truncation would read as a deletion attempt.
    opts.write(true).create(true);
    if attrs.append_write() {
        opts.append(true);
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o644);
    }

    let mut file = opts.open(path).map_err(StoreError::Io)?;
    file.write_all(image).map_err(StoreError::Io)?;

    match file.sync_all() {
        // efivarfs does not implement fsync and reports EINVAL.
        Err(err) if err.kind() == io::ErrorKind::InvalidInput => Ok(()),
        Err(err) => Err(StoreError::Io(err)),
        Ok(()) => Ok(()),
    }
}

fn read_full(file: &mut File, out: &mut [u8]) -> Result<usize, StoreError> {
    let mut n = 0;
    while n < out.len() {
        match file.read(&mut out[n..]) {
            Ok(0) => break,
            Ok(m) => n += m,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(StoreError::Io(err)),
        }
    }
    Ok(n)
}

/// Splits `Name-GUID` into its parts. Names never contain `-`; entries that
/// do not fit the shape are not variables.
fn split_file_name(file_name: &str) -> Option<(String, Guid)> {
    // At least one name byte, a dash, and the 36 character identifier.
    if file_name.len() < 38 {
        return None;
    }
    let (name, guid_text) = file_name.split_at(file_name.len() - 37);
    let guid_text = guid_text.strip_prefix('-')?;
    if name.is_empty() || name.contains('-') {
        return None;
    }
    let vendor = Guid::from_str(guid_text).ok()?;
    Some((name.to_owned(), vendor))
}

struct FsVariableNames {
    dir: Option<fs::ReadDir>,
    err: Option<StoreError>,
}

impl Iterator for FsVariableNames {
    type Item = VariableNameItem;

    fn next(&mut self) -> Option<VariableNameItem> {
        loop {
            let entry = match self.dir.as_mut()?.next() {
                None => {
                    self.dir = None;
                    return None;
                }
                Some(Ok(entry)) => entry,
                Some(Err(err)) => {
                    self.err = Some(StoreError::Io(err));
                    self.dir = None;
                    return None;
                }
            };

            let file_name = entry.file_name();
            let Some(parsed) = file_name.to_str().and_then(split_file_name) else {
                continue;
            };
            let (name, vendor) = parsed;
            return Some(VariableNameItem { name, vendor });
        }
    }
}

impl VariableNames for FsVariableNames {
    fn err(&self) -> Option<&StoreError> {
        self.err.as_ref()
    }

    fn close(&mut self) {
        self.dir = None;
    }
}

impl VariableStore for EfivarFs {
    fn variable_names(&self) -> Result<Box<dyn VariableNames + '_>, StoreError> {
        let dir = fs::read_dir(&self.root).map_err(StoreError::Io)?;
        Ok(Box::new(FsVariableNames {
            dir: Some(dir),
            err: None,
        }))
    }

    fn size_hint(&self, name: &str, vendor: Guid) -> Result<u64, StoreError> {
        let meta = match fs::metadata(self.file_path(name, vendor)) {
            Ok(meta) => meta,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound)
            }
            Err(err) => return Err(StoreError::Io(err)),
        };
        // Minus the attribute word.
        Ok(meta.len().saturating_sub(4))
    }

    fn get(
        &self,
        name: &str,
        vendor: Guid,
        out: &mut [u8],
    ) -> Result<(VariableAttributes, usize), StoreError> {
        self.read_file(&self.file_path(name, vendor), out)
    }

    fn set(
        &self,
        name: &str,
        vendor: Guid,
        attrs: VariableAttributes,
        value: &[u8],
    ) -> Result<(), StoreError> {
        tracing::debug!(name, %vendor, len = value.len(), "writing firmware variable");
        self.write_file(&self.file_path(name, vendor), attrs, value)
    }

    fn delete(&self, name: &str, vendor: Guid) -> Result<(), StoreError> {
        tracing::debug!(name, %vendor, "deleting firmware variable");
        let path = self.file_path(name, vendor);

        let guard = Safeguard::open(&path).map_err(StoreError::Io)?;
        guard.disable().map_err(StoreError::Io)?;

        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound),
            Err(err) => Err(StoreError::Io(err)),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn scratch_dir() -> tempfile::TempDir {
        // Prefer TMPDIR, then /var/tmp: unlike /tmp those are usually real
        // filesystems, which the safeguard tests need.
        let base = std::env::var_os("TMPDIR")
            .map(PathBuf::from)
            .filter(|p| p.is_dir())
            .unwrap_or_else(|| {
                let fallback = PathBuf::from("/var/tmp");
                if fallback.is_dir() {
                    fallback
                } else {
                    std::env::temp_dir()
                }
            });
        tempfile::Builder::new()
            .prefix("efivar-test")
            .tempdir_in(base)
            .unwrap()
    }

    const TEST_GUID: Guid = Guid::from_static_str("3CD99F3F-4B2B-43EB-AC29-F0890A4772B7");
    const TEST_FILE: &str = "TestVar-3CD99F3F-4B2B-43EB-AC29-F0890A4772B7";

    #[test]
    fn get_nonexistent() {
        let dir = scratch_dir();
        let store = EfivarFs::new(dir.path());

        let mut buf = [0u8; 4096];
        assert!(matches!(
            store.get("TestVar", TEST_GUID, &mut buf),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn get_reads_attribute_prefix() {
        let dir = scratch_dir();
        let store = EfivarFs::new(dir.path());
        fs::write(
            dir.path().join(TEST_FILE),
            [0x07, 0x00, 0x00, 0x00, 0x65, 0x6e, 0x2d, 0x55, 0x53, 0x00],
        )
        .unwrap();

        let mut buf = [0u8; 6];
        let (attrs, n) = store.get("TestVar", TEST_GUID, &mut buf).unwrap();
        assert_eq!(
            attrs,
            VariableAttributes::new()
                .with_non_volatile(true)
                .with_bootservice_access(true)
                .with_runtime_access(true)
        );
        assert_eq!(n, 6);
        assert_eq!(&buf, b"en-US\0");
    }

    #[test]
    fn get_buffer_too_small() {
        let dir = scratch_dir();
        let store = EfivarFs::new(dir.path());
        let contents = [0x07, 0x00, 0x00, 0x00, 0x65, 0x6e, 0x2d, 0x55, 0x53, 0x00];
        fs::write(dir.path().join(TEST_FILE), contents).unwrap();

        let mut buf = [0u8; 5];
        assert!(matches!(
            store.get("TestVar", TEST_GUID, &mut buf),
            Err(StoreError::InsufficientSpace)
        ));
        // A failed read must not touch the stored variable.
        assert_eq!(fs::read(dir.path().join(TEST_FILE)).unwrap(), contents);
    }

    #[test]
    fn set_creates_file() {
        let dir = scratch_dir();
        let store = EfivarFs::new(dir.path());

        store
            .set(
                "TestVar",
                TEST_GUID,
                VariableAttributes::DEFAULT_ATTRIBUTES,
                &[0xAA, 0xBB],
            )
            .unwrap();

        assert_eq!(
            fs::read(dir.path().join(TEST_FILE)).unwrap(),
            [0x07, 0x00, 0x00, 0x00, 0xAA, 0xBB]
        );
    }

    #[test]
    fn set_then_get_round_trip() {
        let dir = scratch_dir();
        let store = EfivarFs::new(dir.path());
        let payload: Vec<u8> = (0..=255).collect();

        store
            .set(
                "TestVar",
                TEST_GUID,
                VariableAttributes::DEFAULT_ATTRIBUTES,
                &payload,
            )
            .unwrap();

        let mut buf = vec![0u8; payload.len()];
        let (attrs, n) = store.get("TestVar", TEST_GUID, &mut buf).unwrap();
        assert_eq!(attrs, VariableAttributes::DEFAULT_ATTRIBUTES);
        assert_eq!(n, payload.len());
        assert_eq!(buf, payload);

        assert_eq!(
            store.size_hint("TestVar", TEST_GUID).unwrap(),
            payload.len() as u64
        );
    }

    #[test]
    fn set_appends_when_asked() {
        let dir = scratch_dir();
        let store = EfivarFs::new(dir.path());

        store
            .set(
                "TestVar",
                TEST_GUID,
                VariableAttributes::DEFAULT_ATTRIBUTES,
                &[0x01],
            )
            .unwrap();
        store
            .set(
                "TestVar",
                TEST_GUID,
                VariableAttributes::DEFAULT_ATTRIBUTES.with_append_write(true),
                &[0x02],
            )
            .unwrap();

        // Plain directories keep both images; on real efivarfs the kernel
        // folds the attribute word away. Either way the image must have been
        // appended, not overwritten.
        let on_disk = fs::read(dir.path().join(TEST_FILE)).unwrap();
        assert_eq!(
            on_disk,
            [0x07, 0x00, 0x00, 0x00, 0x01, 0x47, 0x00, 0x00, 0x00, 0x02]
        );
    }

    #[test]
    fn set_empty_writes_empty_body() {
        let dir = scratch_dir();
        let store = EfivarFs::new(dir.path());

        store
            .set(
                "TestVar",
                TEST_GUID,
                VariableAttributes::DEFAULT_ATTRIBUTES,
                &[],
            )
            .unwrap();

        assert_eq!(
            fs::read(dir.path().join(TEST_FILE)).unwrap(),
            [0x07, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn delete_removes_file() {
        let dir = scratch_dir();
        let store = EfivarFs::new(dir.path());
        fs::write(dir.path().join(TEST_FILE), [0u8; 5]).unwrap();

        store.delete("TestVar", TEST_GUID).unwrap();
        assert!(!dir.path().join(TEST_FILE).exists());

        assert!(matches!(
            store.delete("TestVar", TEST_GUID),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn enumeration_skips_foreign_entries() {
        let dir = scratch_dir();
        let store = EfivarFs::new(dir.path());

        for file in [
            TEST_FILE,
            "README",
            "Has-Dash-3CD99F3F-4B2B-43EB-AC29-F0890A4772B7",
            "-3CD99F3F-4B2B-43EB-AC29-F0890A4772B7",
            "Bad-3CD99F3F4B2B43EBAC29F0890A4772B7XXXX",
        ] {
            fs::write(dir.path().join(file), [0u8; 4]).unwrap();
        }

        let mut names = store.variable_names().unwrap();
        let items: Vec<_> = names.by_ref().collect();
        assert!(names.err().is_none());
        names.close();
        names.close();

        assert_eq!(
            items,
            vec![VariableNameItem {
                name: "TestVar".to_owned(),
                vendor: TEST_GUID,
            }]
        );
    }

    #[test]
    fn writes_through_immutable_flag() {
        let dir = scratch_dir();
        let store = EfivarFs::new(dir.path());
        let path = dir.path().join(TEST_FILE);
        fs::write(&path, [0x07, 0x00, 0x00, 0x00, 0x01]).unwrap();

        {
            let guard = Safeguard::open(&path).unwrap();
            if guard.enable().is_err() {
                // Needs CAP_LINUX_IMMUTABLE and a filesystem with flag
                // support.
                return;
            }
            let check = Safeguard::open(&path).unwrap();
            if !check.disable().unwrap() {
                // The flag silently did not stick (e.g. tmpfs).
                return;
            }
            check.enable().unwrap();
        }

        store
            .set(
                "TestVar",
                TEST_GUID,
                VariableAttributes::DEFAULT_ATTRIBUTES,
                &[0x02],
            )
            .unwrap();

        // The file ends up protected again.
        let guard = Safeguard::open(&path).unwrap();
        assert!(guard.disable().unwrap());
        // Leave it writable so the scratch directory can be removed.
    }
}
