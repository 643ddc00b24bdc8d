use std::io;
use thiserror::Error;

use crate::zip::result::ZipError;

pub type Result<T> = std::result::Result<T, VfsError>;

/// Errors returned by the [`FileSystem`](crate::FileSystem) capabilities.
#[derive(Error, Debug)]
pub enum VfsError {
    /// The stream could not be measured or is not a readable archive.
    #[error("cannot open archive: {0}")]
    Open(#[source] ZipError),

    /// The archive parsed but lists no entries.
    #[error("archive has no root directory")]
    EmptyArchive,

    #[error("path {path:?} does not exist")]
    NotFound { path: String },

    #[error("{0}")]
    Io(io::Error),

    /// An entry was found but its content stream could not be produced.
    #[error("cannot open {path:?}: {source}")]
    Archive {
        path: String,
        #[source]
        source: ZipError,
    },
}

impl VfsError {
    pub fn not_found(path: impl Into<String>) -> Self {
        VfsError::NotFound { path: path.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, VfsError::NotFound { .. })
    }
}

impl From<io::Error> for VfsError {
    fn from(err: io::Error) -> Self {
        VfsError::Io(err)
    }
}
