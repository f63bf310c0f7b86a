use thiserror::Error;

use crate::{pool::PoolError, OsError, Path};

#[derive(Debug, Error)]
pub enum FsError {

    #[error("Failed to open {path}: {source}")]
    Open { path: Path, source: OsError },

    #[error("I/O error on {path}: {source}")]
    Io { path: Path, source: OsError },

    #[error("Failed to query metadata of {path}: {source}")]
    Metadata { path: Path, source: OsError },

    #[error("Stream is not open")]
    StreamClosed,

    #[error("Requested a read of zero bytes")]
    EmptyRead,

    #[error("Requested a write of zero bytes")]
    EmptyWrite,

    #[error("Refusing to write empty text to {0}")]
    EmptyText(Path),

    #[error("Block of {size} bytes at offset {offset} lies outside a file of {file_size} bytes")]
    BlockOutOfRange { size: usize, offset: u64, file_size: u64 },

    #[error("Write to {path} failed after {written} of {total} lines: {source}")]
    PartialWrite { path: Path, written: usize, total: usize, source: OsError },

    #[error("Copying {src} to {dest} failed for {failures} entries")]
    CopyIncomplete { src: Path, dest: Path, failures: usize },

    #[error("Contents of {path} are not valid UTF-8: {source}")]
    InvalidUtf8 { path: Path, source: std::string::FromUtf8Error },

    #[error("Invalid path: {0}")]
    InvalidPath(Path),

    #[error("The operation was cancelled")]
    Cancelled,

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),
}

impl FsError {

    pub fn as_os_error(&self) -> Option<&OsError> {
        match self {
            FsError::Open { source, .. }
            | FsError::Io { source, .. }
            | FsError::Metadata { source, .. }
            | FsError::PartialWrite { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.as_os_error(), Some(OsError::NotFound))
    }
}

pub type FsResult<T> = std::result::Result<T, FsError>;

// Tags a raw std::io failure with the path it happened on.
pub (crate) trait IoResultExt<T> {
    fn open_err(self, path: &Path) -> FsResult<T>;
    fn io_err(self, path: &Path) -> FsResult<T>;
    fn metadata_err(self, path: &Path) -> FsResult<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {

    fn open_err(self, path: &Path) -> FsResult<T> {
        self.map_err(|e| FsError::Open { path: path.clone(), source: e.into() })
    }

    fn io_err(self, path: &Path) -> FsResult<T> {
        self.map_err(|e| FsError::Io { path: path.clone(), source: e.into() })
    }

    fn metadata_err(self, path: &Path) -> FsResult<T> {
        self.map_err(|e| FsError::Metadata { path: path.clone(), source: e.into() })
    }
}
