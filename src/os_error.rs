use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum OsError {

    #[error("Maximum number of file descriptors reached")]
    MaxFdReached,

    #[error("Not enough memory")]
    NotEnoughMemory,

    #[error("This operation is forbidden on this object")]
    OperationForbidden,

    #[error("The operation is not supported")]
    OperationNotSupported,

    #[error("The resource is busy")]
    ResourceBusy,

    #[error("Invalid file descriptor")]
    InvalidFd,

    #[error("The resource is too large")]
    ResourceTooLarge,

    #[error("The resource is a directory")]
    IsADirectory,

    #[error("Attempted to create a resource which already exists")]
    AlreadyExists,

    #[error("The resource was not found")]
    NotFound,

    #[error("The resource is not a directory")]
    NotADirectory,

    #[error("The directory is not empty")]
    DirectoryNotEmpty,

    #[error("Insufficient permissions")]
    PermissionDenied,

    #[error("No space left on device")]
    NoSpace,

    #[error("Read-only file system")]
    ReadOnlyFileSystem,

    #[error("File name too long")]
    NameTooLong,

    #[error("Too many levels of symbolic links")]
    TooManyLinks,

    #[error("Cross-device link")]
    CrossDevice,

    #[error("The operation was interrupted")]
    OperationInterrupted,

    #[error("Invalid operation")]
    InvalidOperation,

    #[error("Unexpected end of file")]
    UnexpectedEndOfFile,

    #[error("Invalid data")]
    InvalidData,

    #[error("Unknown OS error")]
    UnknownError,

    #[error("OS Error: {0}")]
    Generic(i32),
}

impl OsError {

    pub fn last() -> Self {
        let os_error = std::io::Error::last_os_error();
        match os_error.raw_os_error() {
            Some(code) => OsError::from(code),
            None => OsError::UnknownError,
        }
    }
}

impl From<std::io::Error> for OsError {
    fn from(error: std::io::Error) -> Self {
        if let Some(code) = error.raw_os_error() {
            return Self::from(code);
        }

        // Errors synthesized by std carry no errno
        match error.kind() {
            std::io::ErrorKind::UnexpectedEof => OsError::UnexpectedEndOfFile,
            std::io::ErrorKind::InvalidData => OsError::InvalidData,
            std::io::ErrorKind::InvalidInput => OsError::InvalidOperation,
            std::io::ErrorKind::NotFound => OsError::NotFound,
            std::io::ErrorKind::PermissionDenied => OsError::PermissionDenied,
            std::io::ErrorKind::AlreadyExists => OsError::AlreadyExists,
            std::io::ErrorKind::Unsupported => OsError::OperationNotSupported,
            _ => OsError::UnknownError,
        }
    }
}

impl From<i32> for OsError {
    fn from(os_error: i32) -> Self {
        match os_error {
            libc::EINVAL => OsError::InvalidOperation,
            libc::EMFILE | libc::ENFILE => OsError::MaxFdReached,
            libc::ENOMEM => OsError::NotEnoughMemory,
            libc::EACCES => OsError::OperationForbidden,
            libc::EBADF => OsError::InvalidFd,
            libc::EEXIST => OsError::AlreadyExists,
            libc::ENOENT => OsError::NotFound,
            libc::EPERM => OsError::PermissionDenied,
            libc::EINTR => OsError::OperationInterrupted,
            libc::ENOTDIR => OsError::NotADirectory,
            libc::EISDIR => OsError::IsADirectory,
            libc::ENOTEMPTY => OsError::DirectoryNotEmpty,
            libc::EBUSY => OsError::ResourceBusy,
            libc::EFBIG => OsError::ResourceTooLarge,
            libc::ENOSPC => OsError::NoSpace,
            libc::EROFS => OsError::ReadOnlyFileSystem,
            libc::ENAMETOOLONG => OsError::NameTooLong,
            libc::ELOOP => OsError::TooManyLinks,
            libc::EXDEV => OsError::CrossDevice,
            libc::ENOTSUP => OsError::OperationNotSupported,
            _ => OsError::Generic(os_error),
        }
    }
}

impl From<OsError> for i32 {
    fn from(error: OsError) -> Self {
        match error {
            OsError::Generic(code) => code,
            OsError::InvalidOperation => libc::EINVAL,
            OsError::MaxFdReached => libc::EMFILE,
            OsError::NotEnoughMemory => libc::ENOMEM,
            OsError::OperationForbidden => libc::EACCES,
            OsError::InvalidFd => libc::EBADF,
            OsError::AlreadyExists => libc::EEXIST,
            OsError::NotFound => libc::ENOENT,
            OsError::PermissionDenied => libc::EPERM,
            OsError::OperationInterrupted => libc::EINTR,
            OsError::NotADirectory => libc::ENOTDIR,
            OsError::IsADirectory => libc::EISDIR,
            OsError::DirectoryNotEmpty => libc::ENOTEMPTY,
            OsError::ResourceBusy => libc::EBUSY,
            OsError::ResourceTooLarge => libc::EFBIG,
            OsError::NoSpace => libc::ENOSPC,
            OsError::ReadOnlyFileSystem => libc::EROFS,
            OsError::NameTooLong => libc::ENAMETOOLONG,
            OsError::TooManyLinks => libc::ELOOP,
            OsError::CrossDevice => libc::EXDEV,
            OsError::OperationNotSupported => libc::ENOTSUP,
            OsError::UnexpectedEndOfFile
            | OsError::InvalidData
            | OsError::UnknownError => -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(OsError::from(libc::ENOENT), OsError::NotFound);
        assert_eq!(OsError::from(libc::EEXIST), OsError::AlreadyExists);
        assert_eq!(OsError::from(libc::ENOTDIR), OsError::NotADirectory);
        assert_eq!(OsError::from(12345), OsError::Generic(12345));
    }

    #[test]
    fn test_errno_back_conversion() {
        let code: i32 = OsError::NotFound.into();
        assert_eq!(code, libc::ENOENT);
        let code: i32 = OsError::Generic(77).into();
        assert_eq!(code, 77);
    }

    #[test]
    fn test_from_io_error_without_errno() {
        let eof = std::io::Error::from(std::io::ErrorKind::UnexpectedEof);
        assert_eq!(OsError::from(eof), OsError::UnexpectedEndOfFile);

        let raw = std::io::Error::from_raw_os_error(libc::EACCES);
        assert_eq!(OsError::from(raw), OsError::OperationForbidden);
    }
}
