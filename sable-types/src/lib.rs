//! Atomic value types of the sable execution engine.
//!
//! Every tuple that flows between collections is an array of [`Value`]s; the
//! runtime manipulates them exclusively through the operations defined here
//! (assign, compare, arithmetic, hashing, serialization). The wire format is
//! the tagged archive implemented in [`archive`].

#![warn(missing_docs)]

mod archive;
mod array;
mod bitset;
mod calendar;
mod decimal;
mod error;
mod object_id;
mod operation;
mod string;
mod value;
mod word;

pub use archive::{ArchiveReader, ArchiveWriter, Externalizable};
pub use array::DataArray;
pub use bitset::BitSet;
pub use calendar::{Date, DateTime};
pub use decimal::Decimal;
pub use error::ValueError;
pub use object_id::ObjectId;
pub use operation::Operation;
pub use string::Utf16String;
pub use value::{DataType, Value};
pub use word::{WordCompare, WordData};
