// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Scoped control of the immutable file flag `efivarfs` puts on variable
//! files.
//!
//! The guard opens the target read-only and snapshots its inode flags. On
//! paths that do not exist, and on filesystems that do not implement the flag
//! ioctls, the guard is inert: every method succeeds without side effects.
//! The descriptor is released on drop.

#[cfg(target_os = "linux")]
pub(crate) use linux::Safeguard;

#[cfg(not(target_os = "linux"))]
pub(crate) use inert::Safeguard;

#[cfg(target_os = "linux")]
mod linux {
    use std::cell::Cell;
    use std::fs::File;
    use std::io;
    use std::os::fd::AsRawFd;
    use std::path::Path;

    const FS_IMMUTABLE_FL: libc::c_long = 0x0000_0010;

    pub(crate) struct Safeguard {
        state: Option<State>,
    }

    struct State {
        file: File,
        flags: Cell<libc::c_long>,
    }

    impl Safeguard {
        pub(crate) fn open(path: &Path) -> io::Result<Safeguard> {
            let file = match File::open(path) {
                Ok(file) => file,
                // A missing file needs no unprotecting; the write creates it.
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    return Ok(Safeguard { state: None })
                }
                Err(err) => return Err(err),
            };

            let mut flags: libc::c_long = 0;
            // SAFETY: the fd is owned by `file` and the out-pointer refers to
            // a live local.
            let res = unsafe {
                libc::ioctl(file.as_raw_fd(), libc::FS_IOC_GETFLAGS as _, &mut flags)
            };
            if res < 0 {
                let err = io::Error::last_os_error();
                if err.raw_os_error() == Some(libc::ENOTTY) {
                    // Filesystem without inode flags; nothing to guard.
                    return Ok(Safeguard { state: None });
                }
                return Err(err);
            }

            Ok(Safeguard {
                state: Some(State {
                    file,
                    flags: Cell::new(flags),
                }),
            })
        }

        /// Clears the immutable flag. Returns whether the file was protected,
        /// so the caller knows to re-protect on the way out.
        pub(crate) fn disable(&self) -> io::Result<bool> {
            let Some(state) = &self.state else {
                return Ok(false);
            };

            let flags = state.flags.get();
            if flags & FS_IMMUTABLE_FL == 0 {
                return Ok(false);
            }
            state.set_flags(flags & !FS_IMMUTABLE_FL)?;
            Ok(true)
        }

        /// Sets the immutable flag.
        pub(crate) fn enable(&self) -> io::Result<()> {
            let Some(state) = &self.state else {
                return Ok(());
            };
            state.set_flags(state.flags.get() | FS_IMMUTABLE_FL)
        }
    }

    impl State {
        fn set_flags(&self, flags: libc::c_long) -> io::Result<()> {
            // SAFETY: the fd is owned by `self.file` and the pointer refers
            // to a live local.
            let res = unsafe {
                libc::ioctl(self.file.as_raw_fd(), libc::FS_IOC_SETFLAGS as _, &flags)
            };
            if res < 0 {
                let err = io::Error::last_os_error();
                if err.raw_os_error() == Some(libc::ENOTTY) {
                    return Ok(());
                }
                return Err(err);
            }
            self.flags.set(flags);
            Ok(())
        }
    }

}

#[cfg(not(target_os = "linux"))]
mod inert {
    use std::io;
    use std::path::Path;

    /// No immutable flag to manage off Linux; the guard is a shell whose
    /// methods succeed without side effects.
    pub(crate) struct Safeguard {}

    impl Safeguard {
        pub(crate) fn open(_path: &Path) -> io::Result<Safeguard> {
            Ok(Safeguard {})
        }

        pub(crate) fn disable(&self) -> io::Result<bool> {
            Ok(false)
        }

        pub(crate) fn enable(&self) -> io::Result<()> {
            Ok(())
        }
    }
}
