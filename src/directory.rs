use std::{fmt, iter::FusedIterator, sync::atomic::{AtomicU64, Ordering}};

use crate::{sys::{NativeDirectory, PlatformDirectory}, Path};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct EnumerationId(u64);

impl EnumerationId {
    fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// The immediate children of a directory.
///
/// Each call to `begin()` (or each `for` loop over it) starts a fresh
/// enumeration, so the sequence can be walked any number of times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntries {
    path: Path,
}

impl DirectoryEntries {

    pub fn new(path: Path) -> Self { Self { path } }

    pub fn path(&self) -> &Path { &self.path }

    pub fn begin(&self) -> DirectoryIterator { DirectoryIterator::new(&self.path) }

    pub fn end(&self) -> DirectoryIterator { DirectoryIterator::end() }

    pub fn iter(&self) -> DirectoryIterator { self.begin() }
}

impl IntoIterator for &DirectoryEntries {
    type Item = Path;
    type IntoIter = DirectoryIterator;

    fn into_iter(self) -> DirectoryIterator { self.begin() }
}

impl IntoIterator for DirectoryEntries {
    type Item = Path;
    type IntoIter = DirectoryIterator;

    fn into_iter(self) -> DirectoryIterator { self.begin() }
}

/// Single-pass cursor over one enumeration of a directory.
///
/// The cursor is either at the end or holds the entry it will yield next.
/// `.` and `..` are never produced, and the order is whatever the OS returns.
/// The native handle is released as soon as the enumeration runs dry, or when
/// the iterator is dropped.
pub struct DirectoryIterator {
    root: Path,
    current: Option<Path>,
    stream: Option<PlatformDirectory>,
    enumeration: Option<EnumerationId>,
}

impl DirectoryIterator {

    pub fn new(root: &Path) -> Self {
        let mut iter = Self::end();

        if !root.is_directory() { return iter }

        let stream = match PlatformDirectory::open(root.as_std_path()) {
            Ok(stream) => stream,
            Err(e) => {
                warn!("cl-fs: Failed to open directory {}: {}", root, e);
                return iter;
            }
        };

        iter.root = root.clone();
        iter.stream = Some(stream);
        iter.enumeration = Some(EnumerationId::new());
        iter.load_next();
        iter
    }

    pub fn end() -> Self {
        Self {
            root: Path::default(),
            current: None,
            stream: None,
            enumeration: None,
        }
    }

    pub fn root(&self) -> &Path { &self.root }
    pub fn current(&self) -> Option<&Path> { self.current.as_ref() }
    pub fn is_end(&self) -> bool { self.current.is_none() }

    pub fn advance(&mut self) -> &mut Self {
        if !self.is_end() {
            self.load_next();
        }
        self
    }

    fn load_next(&mut self) {
        self.current = None;

        let Some(stream) = self.stream.as_mut() else { return };

        loop {
            match stream.next_entry() {
                None => break,
                Some(Err(e)) => {
                    warn!("cl-fs: Enumeration of {} stopped early: {}", self.root, e);
                    break;
                },
                Some(Ok(entry)) => {
                    if entry.is_pseudo() { continue }

                    match entry.name.to_str() {
                        Some(name) => {
                            self.current = Some(self.root.join(name));
                            return;
                        },
                        None => {
                            warn!("cl-fs: Skipping non UTF-8 entry {:?} in {}", entry.name, self.root);
                        }
                    }
                }
            }
        }

        self.stream = None;
    }
}

impl Iterator for DirectoryIterator {
    type Item = Path;

    fn next(&mut self) -> Option<Path> {
        let current = self.current.take()?;
        self.load_next();
        Some(current)
    }
}

impl FusedIterator for DirectoryIterator {}

// Iterators from different enumerations never compare equal, even when they
// happen to sit on the same path.
impl PartialEq for DirectoryIterator {
    fn eq(&self, other: &Self) -> bool {
        match (self.is_end(), other.is_end()) {
            (true, true) => true,
            (false, false) => {
                self.enumeration == other.enumeration && self.current == other.current
            },
            _ => false,
        }
    }
}

impl fmt::Debug for DirectoryIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryIterator")
            .field("root", &self.root)
            .field("current", &self.current)
            .field("open", &self.stream.is_some())
            .finish()
    }
}
