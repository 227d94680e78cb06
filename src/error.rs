use std::{io, path::PathBuf};

/// Errors that can occur when configuring or writing logs.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("Failed to create directory '{0}': {1}")]
    CreateDirectoryFailed(PathBuf, String),
    #[error("Failed to open file '{0}': {1}")]
    OpenFileFailed(PathBuf, String),
    #[error("Failed to rename file from '{from}' to '{to}': {error}")]
    RenameFileError { from: PathBuf, to: PathBuf, error: String },
    #[error("Too many archived log files share the prefix '{0}'")]
    ArchiveNameExhausted(PathBuf),
    #[error("Failed to set file permissions for '{path}': {error}")]
    SetFilePermissionsError { path: PathBuf, error: String },
    #[error("Log writer for '{0}' is closed")]
    WriterClosed(String),
    #[error("File IO error: {0}")]
    FileIOError(#[from] io::Error),
    #[error("Invalid log level: '{0}'")]
    InvalidLevel(String),
    #[error("Invalid rotation cycle: '{0}'")]
    InvalidCycle(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

#[allow(clippy::io_other_error)]
impl From<LogError> for io::Error {
    fn from(err: LogError) -> Self {
        match err {
            LogError::FileIOError(err) => err,
            other => io::Error::new(io::ErrorKind::Other, other.to_string()),
        }
    }
}
