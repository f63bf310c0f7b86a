use std::{fmt, ops::Div};

use crate::{
    directory::DirectoryEntries,
    error::{FsError, FsResult, IoResultExt},
    mode::{FileDescriptorType, FileSystemMode},
    sys::{self, NativeDirectory, PlatformDirectory},
    OsError,
};

pub const SEPARATOR: char = std::path::MAIN_SEPARATOR;
pub const SEPARATOR_STR: &str = std::path::MAIN_SEPARATOR_STR;

/// A filesystem location held as a normalized string.
///
/// The stored string never contains empty or `.` segments, and every `..` that
/// can be resolved against a preceding segment has been. A leading separator
/// marks an absolute path. `Path::default()` is the empty path, which is distinct
/// from `Path::new("")` (the root).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    path: String,
}

enum EntryKind {
    File,
    Directory,
    Other,
}

impl Path {

    pub fn new(raw: impl AsRef<str>) -> Self {
        Self { path: Self::normalize(raw.as_ref()) }
    }

    pub fn root() -> Self {
        Self { path: SEPARATOR_STR.to_string() }
    }

    /// Directory containing the running executable, or the working directory
    /// if the executable's location can't be determined.
    pub fn current() -> FsResult<Self> {
        match std::env::current_exe() {
            Ok(exe) => {
                if let Some(dir) = exe.parent() {
                    return Self::from_std(dir);
                }
            },
            Err(e) => {
                debug!("cl-fs: Could not locate executable ({e}); using working directory");
            }
        }

        let cwd = std::env::current_dir().metadata_err(&Path::from("."))?;
        Self::from_std(&cwd)
    }

    pub fn from_std(path: &std::path::Path) -> FsResult<Self> {
        match path.to_str() {
            Some(s) => Ok(Self::new(s)),
            None => Err(FsError::InvalidPath(Self {
                path: path.to_string_lossy().into_owned()
            })),
        }
    }

    pub fn as_str(&self) -> &str { &self.path }
    pub fn as_std_path(&self) -> &std::path::Path { std::path::Path::new(&self.path) }
    pub fn is_empty(&self) -> bool { self.path.is_empty() }
    pub fn is_root(&self) -> bool { self.path == SEPARATOR_STR }
    pub fn is_absolute(&self) -> bool { self.path.starts_with(SEPARATOR) }

    pub fn parent(&self) -> Path {
        match self.path.rfind(SEPARATOR) {
            None | Some(0) => Path::root(),
            Some(idx) => Path::new(&self.path[..idx]),
        }
    }

    pub fn exists(&self) -> bool {
        std::fs::metadata(&self.path).is_ok()
    }

    pub fn is_file(&self) -> bool {
        match std::fs::metadata(&self.path) {
            Ok(metadata) => metadata.is_file(),
            Err(e) => {
                warn!("cl-fs: {}: {}", self, OsError::from(e));
                false
            }
        }
    }

    pub fn is_directory(&self) -> bool {
        match std::fs::metadata(&self.path) {
            Ok(metadata) => metadata.is_dir(),
            Err(e) => {
                warn!("cl-fs: {}: {}", self, OsError::from(e));
                false
            }
        }
    }

    pub fn file_type(&self) -> FsResult<FileDescriptorType> {
        let metadata = std::fs::metadata(&self.path).metadata_err(self)?;
        Ok(FileDescriptorType::from_std(metadata.file_type()))
    }

    // Index of the '.' that starts the extension, if it belongs to the last segment.
    fn extension_index(&self) -> Option<usize> {
        let dot = self.path.rfind('.')?;
        match self.path.rfind(SEPARATOR) {
            Some(sep) if sep > dot => None,
            _ => Some(dot),
        }
    }

    pub fn has_extension(&self) -> bool {
        self.extension_index().is_some()
    }

    /// The file extension without the period, i.e. `txt` or `jpeg`.
    /// Empty when the last segment has no '.'.
    pub fn extension(&self) -> &str {
        match self.extension_index() {
            Some(idx) => &self.path[idx + 1..],
            None => "",
        }
    }

    pub fn replace_extension(&self, ext: &str) -> Path {
        let stem = match self.extension_index() {
            Some(idx) => &self.path[..idx],
            None => &self.path,
        };
        Path::new(format!("{stem}.{}", ext.trim_start_matches('.')))
    }

    /// Appends `sub` with exactly one separator in between.
    ///
    /// Joining onto the empty path yields the empty path, and joining an empty
    /// `sub` yields `self` unchanged.
    pub fn join(&self, sub: &str) -> Path {
        if self.path.is_empty() || sub.is_empty() {
            return self.clone();
        }

        if self.path.ends_with(SEPARATOR) {
            Path::new(format!("{}{sub}", self.path))
        } else {
            Path::new(format!("{}{SEPARATOR}{sub}", self.path))
        }
    }

    pub fn push(&mut self, sub: &str) -> &mut Self {
        *self = self.join(sub);
        self
    }

    pub fn filename(&self) -> &str {
        match self.path.rfind(SEPARATOR) {
            Some(idx) => &self.path[idx + 1..],
            None => &self.path,
        }
    }

    // Filename without its extension
    pub fn base_name(&self) -> &str {
        let filename = self.filename();
        match filename.rfind('.') {
            Some(idx) => &filename[..idx],
            None => filename,
        }
    }

    /// Strips `base` from the front of this path. A path outside `base` is
    /// returned unchanged; `base` itself becomes `.`.
    pub fn relative_to(&self, base: &Path) -> Path {
        if self.path == base.path {
            return Path::new(".");
        }

        if base.path.is_empty() || !self.path.starts_with(base.path.as_str()) {
            return self.clone();
        }

        let rest = &self.path[base.path.len()..];
        if base.path.ends_with(SEPARATOR) {
            Path::new(rest)
        } else if let Some(rest) = rest.strip_prefix(SEPARATOR) {
            Path::new(rest)
        } else {
            // `/ab` shares a prefix with `/a` but does not live under it
            self.clone()
        }
    }

    /// Creates this directory (one level). An existing directory is fine.
    pub fn create(&self) -> FsResult<()> {
        self.create_with_mode(FileSystemMode::default())
    }

    pub fn create_with_mode(&self, mode: FileSystemMode) -> FsResult<()> {
        if let Ok(metadata) = std::fs::metadata(&self.path) {
            return if metadata.is_dir() {
                Ok(())
            } else {
                Err(FsError::Io { path: self.clone(), source: OsError::NotADirectory })
            };
        }

        match sys::make_directory(self.as_std_path(), mode) {
            Ok(()) => {
                debug!("cl-fs: Created directory {}", self);
                Ok(())
            },
            // Lost a race with another creator
            Err(OsError::AlreadyExists) if self.is_directory() => Ok(()),
            Err(source) => Err(FsError::Io { path: self.clone(), source }),
        }
    }

    /// Creates this directory and every missing ancestor, top-down.
    pub fn create_all(&self) -> FsResult<()> {
        self.create_all_with_mode(FileSystemMode::default())
    }

    pub fn create_all_with_mode(&self, mode: FileSystemMode) -> FsResult<()> {
        if !self.is_root() && !self.exists() {
            let parent = self.parent();
            if parent != *self && !parent.exists() {
                parent.create_all_with_mode(mode)?;
            }
        }
        self.create_with_mode(mode)
    }

    /// Copies this file to `dest`, overwriting it. The source must be a file.
    pub fn copy(&self, dest: &Path) -> FsResult<()> {
        precondition!(self.is_file(), "copy source {} is not a file", self);

        if dest == self { return Ok(()) }

        std::fs::copy(self.as_std_path(), dest.as_std_path()).io_err(self)?;
        debug!("cl-fs: Copied {} to {}", self, dest);
        Ok(())
    }

    /// Mirrors the whole tree under this directory into `dest`.
    ///
    /// Every child is attempted even if a sibling fails; the result is an error
    /// if any single copy failed.
    pub fn copy_directory(&self, dest: &Path) -> FsResult<()> {
        precondition!(self.is_directory(), "copy source {} is not a directory", self);

        if dest == self { return Ok(()) }

        let mut stream = PlatformDirectory::open(self.as_std_path())
            .map_err(|source| FsError::Open { path: self.clone(), source })?;

        dest.create()?;

        let mut failures = 0usize;

        while let Some(entry) = stream.next_entry() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("cl-fs: Enumeration of {} stopped early: {}", self, e);
                    failures += 1;
                    break;
                }
            };

            if entry.is_pseudo() { continue }

            let Some(name) = entry.name.to_str() else {
                warn!("cl-fs: Skipping non UTF-8 entry {:?} in {}", entry.name, self);
                failures += 1;
                continue;
            };

            let src = self.join(name);
            let dst = dest.join(name);

            // Symlinks and unknown types are resolved through stat
            let kind = if entry.dtype == FileDescriptorType::DIRECTORY {
                EntryKind::Directory
            } else if entry.dtype == FileDescriptorType::FILE {
                EntryKind::File
            } else if src.is_directory() {
                EntryKind::Directory
            } else if src.is_file() {
                EntryKind::File
            } else {
                EntryKind::Other
            };

            let result = match kind {
                EntryKind::Directory => src.copy_directory(&dst),
                EntryKind::File => src.copy(&dst),
                EntryKind::Other => {
                    warn!("cl-fs: Not copying {}: neither a file nor a directory", src);
                    failures += 1;
                    continue;
                }
            };

            match result {
                Ok(()) => {},
                Err(FsError::CopyIncomplete { failures: nested, .. }) => failures += nested,
                Err(e) => {
                    warn!("cl-fs: Failed to copy {} to {}: {}", src, dst, e);
                    failures += 1;
                }
            }
        }

        if failures > 0 {
            return Err(FsError::CopyIncomplete {
                src: self.clone(),
                dest: dest.clone(),
                failures
            });
        }

        Ok(())
    }

    pub fn entries(&self) -> DirectoryEntries {
        DirectoryEntries::new(self.clone())
    }

    fn normalize(raw: &str) -> String {
        if raw.is_empty() { return SEPARATOR_STR.to_string() }

        let absolute = raw.starts_with(SEPARATOR);
        let mut parts: Vec<&str> = Vec::new();

        for part in raw.split(SEPARATOR) {
            match part {
                "" | "." => {},
                ".." => match parts.last().copied() {
                    Some(last) if last != ".." => { parts.pop(); },
                    // The root is its own parent
                    None if absolute => {},
                    _ => parts.push(part),
                },
                _ => parts.push(part),
            }
        }

        if parts.is_empty() {
            return if absolute { SEPARATOR_STR.to_string() } else { ".".to_string() };
        }

        let joined = parts.join(SEPARATOR_STR);
        if absolute { format!("{SEPARATOR}{joined}") } else { joined }
    }
}

impl Div<&str> for &Path {
    type Output = Path;

    fn div(self, sub: &str) -> Path { self.join(sub) }
}

impl Div<&str> for Path {
    type Output = Path;

    fn div(self, sub: &str) -> Path { self.join(sub) }
}

impl From<&str> for Path {
    fn from(raw: &str) -> Self { Self::new(raw) }
}

impl From<String> for Path {
    fn from(raw: String) -> Self { Self::new(raw) }
}

impl AsRef<std::path::Path> for Path {
    fn as_ref(&self) -> &std::path::Path { self.as_std_path() }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}
