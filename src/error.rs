use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZipFsError {
    #[error("zip format error: {0}")]
    Format(String),

    #[error("no such file: {0}")]
    NotFound(String),

    #[error("file already exists: {0}")]
    AlreadyExists(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    #[error("read-only file system")]
    ReadOnly,

    #[error("file system is closed")]
    Closed,

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid option {key}: {value}")]
    InvalidOption { key: String, value: String },

    #[error("unsupported name encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("failed to delete {} temporary file(s)", .0.len())]
    Cleanup(Vec<(PathBuf, io::Error)>),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ZipFsError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        ZipFsError::Format(msg.into())
    }
}

impl From<ZipFsError> for io::Error {
    fn from(err: ZipFsError) -> Self {
        let kind = match &err {
            ZipFsError::Io(e) => e.kind(),
            ZipFsError::Format(_) => io::ErrorKind::InvalidData,
            ZipFsError::NotFound(_) => io::ErrorKind::NotFound,
            ZipFsError::AlreadyExists(_) => io::ErrorKind::AlreadyExists,
            ZipFsError::ReadOnly => io::ErrorKind::PermissionDenied,
            ZipFsError::InvalidPath(_) | ZipFsError::InvalidOption { .. } => {
                io::ErrorKind::InvalidInput
            }
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

pub type Result<T> = std::result::Result<T, ZipFsError>;
