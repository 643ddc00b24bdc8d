use std::io;
use thiserror::Error;

pub type ZipResult<T> = Result<T, ZipError>;

#[derive(Error, Debug)]
pub enum ZipError {
    #[error("{}", .0)]
    Io(#[from] io::Error),

    #[error("{}", .0)]
    InvalidArchive(&'static str),

    #[error("Support for multi - disk files is not implemented")]
    UnsupportedArchive,

    #[error("UnsupportedCompressionMethod {}", .0)]
    UnsupportedCompressionMethod(u16),

    #[error("Encrypted entries are not supported")]
    Encrypted,

    #[error("FileNotFound")]
    FileNotFound,
}
