use once_cell::sync::OnceCell;
use thiserror::Error;

#[macro_use]
pub (crate) mod logging;

#[macro_use]
pub (crate) mod sys;

mod os_error;
mod mode;
mod error;
mod path;
mod directory;
mod file;
mod handle;
mod pool;
mod async_io;
mod stream;

pub use os_error::OsError;
pub use mode::{FileDescriptorType, FileSystemMode, FileSystemPermissions};
pub use error::{FsError, FsResult};
pub use path::{Path, SEPARATOR, SEPARATOR_STR};
pub use directory::{DirectoryEntries, DirectoryIterator};
pub use file::{FileReader, FileWriter};
pub use handle::IoHandle;
pub use pool::{PoolError, TaskId, ThreadPool, WorkerState};
pub use async_io::{AsyncFileReader, AsyncFileWriter};
pub use stream::{StreamReader, StreamWriter};

#[derive(Debug, Error)]
pub enum Error {
    #[error("File system error: {0}")]
    Fs(#[from] FsError),

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("OS error: {0}")]
    Os(#[from] OsError),

    #[error("Pool already initialized")]
    AlreadyInitialized,
}

pub type Result<T> = std::result::Result<T, Error>;

static POOL: OnceCell<ThreadPool> = OnceCell::new();

pub (crate) fn pool() -> std::result::Result<&'static ThreadPool, PoolError> {
    POOL.get_or_try_init(|| ThreadPool::new(num_cpus::get()).start())
}

// Sizes the pool used by AsyncFileReader / AsyncFileWriter.
// Must run before the first asynchronous operation.
pub fn init(n_threads: usize) -> Result<()> {
    if POOL.get().is_some() { return Err(Error::AlreadyInitialized); }
    let pool = ThreadPool::new(n_threads).start()?;
    POOL.set(pool).map_err(|_| Error::AlreadyInitialized)
}

// Lets queued operations finish, then stops the pool threads.
// Later asynchronous operations fail with PoolError::ShutDown.
pub fn shutdown() {
    if let Some(pool) = POOL.get() { pool.shutdown() }
}

// Number of threads in the global pool, starting it if needed.
pub fn num_threads() -> usize {
    pool().map_or(0, |pool| pool.num_threads())
}
