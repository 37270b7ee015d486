//! Stable class ids and the serialization registry.
//!
//! Programs travel as archives of `(class id, payload)` pairs. The loader
//! dispatches on the id, builds a defaulted instance of the right concrete
//! kind, and lets it restore its own payload. The ids are wire format; never
//! renumber them.

use sable_types::{ArchiveReader, ArchiveWriter};
use strum::EnumIter;

use crate::action::{
    Action, Arithmetic, Assign, Cardinality, Case, Coalesce, ConcatKind, Concatenate,
    Copy as CopyAction, CurrentTimestamp, ElementReference, ExpandSynonym, GetMax, Invoke, Length,
    LengthKind, LocatorOp, LocatorOpKind, Normalize, NullIf, Overlay, SubString,
};
use crate::collection::{Collection, Connection, Disintegrate, Grouping, Queue, SafeQueue, Sort, Store};
use crate::error::ExecError;

/// Class ids of every serializable action and collection kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(i32)]
#[allow(missing_docs)]
pub enum ClassId {
    StoreCollection = 1,
    SortCollection = 2,
    QueueCollection = 3,
    SafeQueueCollection = 4,
    GroupingCollection = 5,
    DisintegrateCollection = 6,
    DisintegratePairsCollection = 7,
    ConnectionCollection = 8,

    ArithmeticMonadic = 20,
    ArithmeticDyadic = 21,
    ConcatenateString = 22,
    ConcatenateBinary = 23,
    ConcatenateArray = 24,
    ConcatenateAnyType = 25,
    SubString = 26,
    Overlay = 27,
    LengthChar = 28,
    LengthOctet = 29,
    Cardinality = 30,
    ElementReference = 31,
    GetMax = 32,
    Coalesce = 33,
    CoalesceDefault = 34,
    NullIf = 35,
    CaseSearched = 36,
    CaseSimple = 37,
    Copy = 38,
    Assign = 39,
    Normalize = 40,
    ExpandSynonym = 41,
    Invoke = 42,
    CurrentTimestamp = 43,
    LocatorLength = 44,
    LocatorGet = 45,
    LocatorAppend = 46,
    LocatorTruncate = 47,
    LocatorReplace = 48,
}

impl ClassId {
    /// The serialized discriminant.
    pub const fn code(&self) -> i32 {
        *self as i32
    }

    /// Recovers a class id from its discriminant.
    pub fn from_code(code: i32) -> Option<ClassId> {
        use strum::IntoEnumIterator;
        ClassId::iter().find(|id| id.code() == code)
    }
}

/// Builds a defaulted action of the given kind.
pub fn instantiate_action(id: ClassId) -> Result<Box<dyn Action>, ExecError> {
    Ok(match id {
        ClassId::ArithmeticMonadic | ClassId::ArithmeticDyadic => {
            Box::new(Arithmetic::default())
        }
        ClassId::ConcatenateString => Box::new(Concatenate::with_kind(ConcatKind::String)),
        ClassId::ConcatenateBinary => Box::new(Concatenate::with_kind(ConcatKind::Binary)),
        ClassId::ConcatenateArray => Box::new(Concatenate::with_kind(ConcatKind::Array)),
        ClassId::ConcatenateAnyType => Box::new(Concatenate::with_kind(ConcatKind::Any)),
        ClassId::SubString => Box::new(SubString::default()),
        ClassId::Overlay => Box::new(Overlay::default()),
        ClassId::LengthChar => Box::new(Length::with_kind(LengthKind::Char)),
        ClassId::LengthOctet => Box::new(Length::with_kind(LengthKind::Octet)),
        ClassId::Cardinality => Box::new(Cardinality::default()),
        ClassId::ElementReference => Box::new(ElementReference::default()),
        ClassId::GetMax => Box::new(GetMax::default()),
        ClassId::Coalesce | ClassId::CoalesceDefault => Box::new(Coalesce::default()),
        ClassId::NullIf => Box::new(NullIf::default()),
        ClassId::CaseSearched | ClassId::CaseSimple => Box::new(Case::default()),
        ClassId::Copy => Box::new(CopyAction::default()),
        ClassId::Assign => Box::new(Assign::default()),
        ClassId::Normalize => Box::new(Normalize::default()),
        ClassId::ExpandSynonym => Box::new(ExpandSynonym::default()),
        ClassId::Invoke => Box::new(Invoke::default()),
        ClassId::CurrentTimestamp => Box::new(CurrentTimestamp::default()),
        ClassId::LocatorLength => Box::new(LocatorOp::with_kind(LocatorOpKind::Length)),
        ClassId::LocatorGet => Box::new(LocatorOp::with_kind(LocatorOpKind::Get)),
        ClassId::LocatorAppend => Box::new(LocatorOp::with_kind(LocatorOpKind::Append)),
        ClassId::LocatorTruncate => Box::new(LocatorOp::with_kind(LocatorOpKind::Truncate)),
        ClassId::LocatorReplace => Box::new(LocatorOp::with_kind(LocatorOpKind::Replace)),
        _ => return Err(ExecError::Unexpected),
    })
}

/// Builds a defaulted collection of the given kind.
pub fn instantiate_collection(id: ClassId) -> Result<Box<dyn Collection>, ExecError> {
    Ok(match id {
        ClassId::StoreCollection => Box::new(Store::default()),
        ClassId::SortCollection => Box::new(Sort::default()),
        ClassId::QueueCollection => Box::new(Queue::default()),
        ClassId::SafeQueueCollection => Box::new(SafeQueue::default()),
        ClassId::GroupingCollection => Box::new(Grouping::default()),
        ClassId::DisintegrateCollection => Box::new(Disintegrate::bitset()),
        ClassId::DisintegratePairsCollection => Box::new(Disintegrate::pairs()),
        ClassId::ConnectionCollection => Box::new(Connection::default()),
        _ => return Err(ExecError::Unexpected),
    })
}

/// Frames an action as `(class id, payload)`.
pub fn write_action(writer: &mut ArchiveWriter, action: &dyn Action) {
    writer.write_i32(action.class_id().code());
    action.write_to(writer);
}

/// Reads an action framed by [`write_action`].
pub fn read_action(reader: &mut ArchiveReader<'_>) -> Result<Box<dyn Action>, ExecError> {
    let id = ClassId::from_code(reader.read_i32()?).ok_or(ExecError::Unexpected)?;
    let mut action = instantiate_action(id)?;
    action.read_payload(reader)?;
    Ok(action)
}

/// Frames a collection as `(class id, payload)`.
pub fn write_collection(writer: &mut ArchiveWriter, collection: &dyn Collection) {
    writer.write_i32(collection.class_id().code());
    collection.write_to(writer);
}

/// Reads a collection framed by [`write_collection`].
pub fn read_collection(reader: &mut ArchiveReader<'_>) -> Result<Box<dyn Collection>, ExecError> {
    let id = ClassId::from_code(reader.read_i32()?).ok_or(ExecError::Unexpected)?;
    let mut collection = instantiate_collection(id)?;
    collection.read_payload(reader)?;
    Ok(collection)
}
