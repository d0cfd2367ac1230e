#![doc = include_str!("../README.md")]

pub mod array;
pub mod config;
pub mod names;
mod navigate;
pub mod prelude;
mod ptset;
mod section;
mod session;
pub mod store;
mod traits;
mod transfer;
mod tree;
mod utils;

pub use array::{Complex, DataBuffer, DataType, Scalar, Slab};
pub use config::{Compaction, Config, FileType, RindConvention};
pub use names::{BcDataType, BcType, ElementType, GridLocation, PointSetType, ZoneType};
pub use navigate::{Location, NavigationError, MAX_GOTO_DEPTH};
pub use ptset::{size_of_patch, PointSet};
pub use section::{compute_data_size, SectionState};
pub use session::{
    ArrayInfo, BaseInfo, BocoInfo, HoleInfo, Mode, PointSetInfo, SectionInfo, Session,
    SolutionInfo, SubRegionInfo, ZoneInfo, LIBRARY_VERSION,
};
pub use store::{MemoryStore, StoreError};
pub use traits::{Link, NodeId, NodeInfo, NodeStore};
pub use transfer::{default_range, verify_range, MemorySpace, Rind, TransferPlan};
pub use tree::{EntityTree, Handle, Label};

pub use ndarray;

use crate::prelude::*;

/// general purpose error enumeration for possible causes of failure.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("An io error occured: `{0}`")]
    Io(#[from] std::io::Error),
    #[error("node store failure: {0}")]
    Store(#[from] StoreError),
    #[error("Error while parsing a node document: {0}")]
    Parse(#[from] store::ParseError),
    #[error("{0}")]
    Conversion(#[from] array::ConversionError),
    #[error("{0}")]
    Slab(#[from] array::SlabError),
    #[error("{0}")]
    Name(#[from] names::UnknownName),
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error("{0}")]
    NotFound(NotFound),
    #[error("{0}")]
    Navigation(#[from] NavigationError),
    #[error("no current position is set, call `goto` first")]
    NoPosition,
    #[error("cannot {0} on a file opened for reading")]
    ReadOnly(String),
    #[error("file version {found} is newer than the library version {library}")]
    Version { found: f32, library: f32 },
    #[error("the entity handle no longer refers to a live entity")]
    InvalidHandle,
    #[error("location belongs to file {found}, this session is file {expected}")]
    FileMismatch { expected: u64, found: u64 },
    #[error("section `{0}` must be initialized before a partial write")]
    Uninitialized(String),
    #[error("{0} overflows the addressable size")]
    Overflow(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<NotFound> for Error {
    fn from(x: NotFound) -> Self {
        Error::NotFound(x)
    }
}

/// a lookup by index or name that found nothing
#[derive(Display, Debug, Constructor)]
#[display(fmt = "{what} `{key}` does not exist")]
pub struct NotFound {
    what: &'static str,
    key: String,
}

/// broad category of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// malformed input, recoverable by retrying with corrected arguments
    Validation,
    NotFound,
    Io,
    /// the session is not in a state that allows the operation
    State,
    Internal,
}

impl Error {
    pub(crate) fn invalid<T: Into<String>>(message: T) -> Self {
        Error::Invalid(message.into())
    }

    pub(crate) fn not_found<T: ToString>(what: &'static str, key: T) -> Self {
        Error::NotFound(NotFound::new(what, key.to_string()))
    }

    pub(crate) fn internal<T: Into<String>>(message: T) -> Self {
        Error::Internal(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) | Error::Parse(_) => ErrorKind::Io,
            Error::Store(e) => match e {
                StoreError::NoNode(_) | StoreError::NoChild { .. } | StoreError::NoData(_) => {
                    ErrorKind::NotFound
                }
                StoreError::DuplicateName { .. }
                | StoreError::InvalidName(_)
                | StoreError::Size(_)
                | StoreError::TypeMismatch { .. }
                | StoreError::InvalidRank(_)
                | StoreError::Conversion(_)
                | StoreError::Slab(_) => ErrorKind::Validation,
                StoreError::TooLarge(_) => ErrorKind::Validation,
                StoreError::ReadOnly => ErrorKind::State,
                _ => ErrorKind::Io,
            },
            Error::Conversion(_)
            | Error::Slab(_)
            | Error::Name(_)
            | Error::Invalid(_)
            | Error::Overflow(_) => ErrorKind::Validation,
            Error::Navigation(e) if e.is_not_found() => ErrorKind::NotFound,
            Error::Navigation(_) => ErrorKind::Validation,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::NoPosition
            | Error::ReadOnly(_)
            | Error::Version { .. }
            | Error::InvalidHandle
            | Error::FileMismatch { .. }
            | Error::Uninitialized(_) => ErrorKind::State,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }
}
