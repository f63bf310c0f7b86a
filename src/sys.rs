use std::ffi::OsString;

use crate::{mode::{FileDescriptorType, FileSystemMode}, OsError};

#[allow(unused_macros)]
macro_rules! syscall {
    ($fn: ident ( $($arg: expr),* $(,)* ) ) => {{
        #[allow(unused_unsafe)]
        let res = unsafe { libc::$fn($($arg, )*) };
        if res == -1 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(res)
        }
    }};
}

// One raw record produced by the platform's directory enumeration primitive.
// Pseudo-entries are passed through untouched.
#[derive(Debug, Clone)]
pub struct NativeEntry {
    pub name: OsString,
    pub dtype: FileDescriptorType,
}

impl NativeEntry {
    pub fn is_pseudo(&self) -> bool {
        self.name == "." || self.name == ".."
    }
}

pub trait NativeDirectory: Sized {
    fn open(path: &std::path::Path) -> Result<Self, OsError>;
    fn next_entry(&mut self) -> Option<Result<NativeEntry, OsError>>;
}

#[cfg(unix)]
pub type PlatformDirectory = unix::DirectoryStream;

#[cfg(not(unix))]
pub type PlatformDirectory = portable::ReadDirStream;

#[cfg(unix)]
pub mod unix {
    use std::{ffi::{CString, OsStr}, os::unix::ffi::OsStrExt};

    use crate::{mode::FileDescriptorType, OsError};

    use super::{NativeDirectory, NativeEntry};

    // Owns a `DIR*`; closed exactly once when dropped.
    pub struct DirectoryStream {
        dir_ptr: *mut libc::DIR,
    }

    // The stream is only ever used by its owner; moving it to another thread is fine.
    unsafe impl Send for DirectoryStream {}

    impl NativeDirectory for DirectoryStream {

        fn open(path: &std::path::Path) -> Result<Self, OsError> {
            let c_path = CString::new(path.as_os_str().as_bytes())
                .map_err(|_| OsError::InvalidOperation)?;

            let dir_ptr = unsafe { libc::opendir(c_path.as_ptr()) };
            if dir_ptr.is_null() {
                return Err(OsError::last());
            }

            Ok(Self { dir_ptr })
        }

        fn next_entry(&mut self) -> Option<Result<NativeEntry, OsError>> {

            // readdir only signals errors through errno
            unsafe { *errno_location() = 0 };

            let entry = unsafe { libc::readdir(self.dir_ptr) };

            if entry.is_null() {
                let errno = unsafe { *errno_location() };
                if errno != 0 {
                    return Some(Err(OsError::from(errno)));
                }
                return None;
            }

            let d_name_ptr = unsafe { (*entry).d_name.as_ptr() };
            let d_name = unsafe { std::ffi::CStr::from_ptr(d_name_ptr) };

            Some(Ok(NativeEntry {
                name: OsStr::from_bytes(d_name.to_bytes()).to_os_string(),
                dtype: FileDescriptorType::from_dirent_type(unsafe { (*entry).d_type }),
            }))
        }
    }

    impl Drop for DirectoryStream {
        fn drop(&mut self) {
            if !self.dir_ptr.is_null() {
                let res = unsafe { libc::closedir(self.dir_ptr) };
                if res < 0 {
                    error!(
                        "cl-fs: Failed to close directory stream: {}",
                        OsError::last()
                    );
                }
                self.dir_ptr = std::ptr::null_mut();
            }
        }
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    unsafe fn errno_location() -> *mut libc::c_int {
        unsafe { libc::__errno_location() }
    }

    #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
    unsafe fn errno_location() -> *mut libc::c_int {
        unsafe { libc::__error() }
    }

    #[cfg(any(target_os = "openbsd", target_os = "netbsd"))]
    unsafe fn errno_location() -> *mut libc::c_int {
        unsafe { libc::__errno() }
    }
}

// Backed by std's own enumeration; used where there is no native implementation.
#[allow(dead_code)]
pub mod portable {
    use crate::{mode::FileDescriptorType, OsError};

    use super::{NativeDirectory, NativeEntry};

    pub struct ReadDirStream {
        inner: std::fs::ReadDir,
    }

    impl NativeDirectory for ReadDirStream {

        fn open(path: &std::path::Path) -> Result<Self, OsError> {
            Ok(Self { inner: std::fs::read_dir(path)? })
        }

        fn next_entry(&mut self) -> Option<Result<NativeEntry, OsError>> {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e.into())),
            };

            let dtype = entry.file_type()
                .map(FileDescriptorType::from_std)
                .unwrap_or(FileDescriptorType::UNKNOWN);

            Some(Ok(NativeEntry { name: entry.file_name(), dtype }))
        }
    }
}

// Creates exactly one directory level.
#[cfg(unix)]
pub fn make_directory(path: &std::path::Path, mode: FileSystemMode) -> Result<(), OsError> {
    use std::{ffi::CString, os::unix::ffi::OsStrExt};

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| OsError::InvalidOperation)?;

    syscall!(mkdir(c_path.as_ptr(), libc::mode_t::from(mode.to_directory_safe())))
        .map_err(OsError::from)?;

    Ok(())
}

#[cfg(not(unix))]
pub fn make_directory(path: &std::path::Path, _mode: FileSystemMode) -> Result<(), OsError> {
    std::fs::create_dir(path).map_err(OsError::from)
}
