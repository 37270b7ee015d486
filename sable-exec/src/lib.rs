//! Collection and scalar-operator runtime of the sable execution engine.
//!
//! The optimizer emits a serialized program of iterators, collections, and
//! actions referenced by class ids. This crate is the execution half: the
//! [`program::Program`] owns variable slots, locators, and connections;
//! [`action`]s compute scalar results into shared slots once per row; and
//! [`collection`]s buffer, reorder, group, or forward the resulting tuples,
//! including a concurrent queue for the parallel producer/consumer mode and
//! the connection sink that ships rows to the client.

#![warn(missing_docs)]

pub mod action;
pub mod allocator;
pub mod class;
pub mod collection;
pub mod config;
pub mod cost;
pub mod error;
pub mod explain;
pub mod holder;
pub mod locator;
pub mod program;
pub mod routine;
pub mod transport;
pub mod tuple;

pub mod prelude {
    //! Convenience re-exports for driving programs.

    pub use sable_norm::{
        IdentityRules, MapRules, NormError, NormRule, Normalizer, OutputMode, RuleSet,
    };
    pub use sable_types::{
        BitSet, DataArray, DataType, Date, DateTime, Decimal, ObjectId, Operation, Utf16String,
        Value, WordCompare, WordData,
    };

    // `action::Copy` is deliberately not re-exported: a glob import must not
    // shadow `std::marker::Copy`.
    pub use crate::action::{
        check_argument, Action, ActionList, Arithmetic, Assign, Cardinality, Case, Coalesce,
        ConcatKind, Concatenate, CurrentTimestamp, ElementReference, ExpandSynonym, GetMax,
        Invoke, Length, LengthKind, LocatorOp, Normalize, NullIf, Overlay, Status, SubString,
    };
    pub use crate::allocator::Arena;
    pub use crate::class::ClassId;
    pub use crate::collection::{
        Collection, Connection, Disintegrate, Grouping, Queue, SafeQueue, Sort, Store,
    };
    pub use crate::config::ExecConfig;
    pub use crate::cost::{Cost, CostValue};
    pub use crate::error::ExecError;
    pub use crate::explain::{Explain, ExplainOptions};
    pub use crate::holder::{DataHolder, LocatorHolder};
    pub use crate::locator::Locator;
    pub use crate::program::Program;
    pub use crate::routine::{FnRoutine, Routine, RoutineMap, RoutineProvider};
    pub use crate::transport::{MemoryTransport, Transport};
}
