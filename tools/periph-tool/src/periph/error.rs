use std::io;

use periph_pac::LayoutError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Past the end of the window. The raw interface reports this as end of
    /// device rather than as a failure.
    #[error("offset {offset:#x} is past the end of the {span}-byte window")]
    OutOfRange { offset: usize, span: usize },
    #[error("invalid offset {0}")]
    InvalidArgument(i64),
    #[error("unaligned access at offset {0:#x}")]
    Misaligned(usize),
    #[error("transfer incomplete: {staged} of {expected} bytes available")]
    TransferIncomplete { staged: usize, expected: usize },
    #[error("cannot parse {text:?} as an unsigned 32-bit integer")]
    Parse { text: String },
    #[error("{name}: resource unavailable: {reason}")]
    ResourceUnavailable { name: String, reason: String },
    #[error("{0} is not active")]
    NotActive(String),
    #[error("no device named {0}")]
    UnknownDevice(String),
    #[error("no attribute named {0}")]
    UnknownAttribute(String),
    #[error("invalid layout: {0}")]
    Layout(LayoutError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn unavailable(name: &str, reason: impl ToString) -> Self {
        Self::ResourceUnavailable {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<LayoutError> for Error {
    fn from(e: LayoutError) -> Self {
        Self::Layout(e)
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        let kind = match e {
            Error::Io(inner) => return inner,
            Error::OutOfRange { .. } => io::ErrorKind::UnexpectedEof,
            Error::InvalidArgument(_) | Error::Misaligned(_) => io::ErrorKind::InvalidInput,
            Error::TransferIncomplete { .. } => io::ErrorKind::WriteZero,
            Error::Parse { .. } | Error::Layout(_) => io::ErrorKind::InvalidData,
            Error::ResourceUnavailable { .. } => io::ErrorKind::AddrInUse,
            Error::NotActive(_) | Error::UnknownDevice(_) | Error::UnknownAttribute(_) => io::ErrorKind::NotFound,
        };
        io::Error::new(kind, e)
    }
}
