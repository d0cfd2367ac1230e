//! Common traits and types that are useful for working with `cgns`
#![allow(unused_imports)]

pub use crate::array::{Complex, DataBuffer, DataType, Scalar};
pub use crate::config::{Config, FileType, RindConvention};
pub use crate::names::{BcDataType, BcType, ElementType, GridLocation, PointSetType, ZoneType};
pub use crate::session::{Mode, Session};
pub use crate::traits::NodeStore;
pub use crate::transfer::MemorySpace;
pub use crate::Error;

pub(crate) use crate::traits::NodeId;
pub(crate) use derive_more::{Constructor, Display, From, Into};
