//! Collections: buffering, reordering, grouping, and transport nodes.
//!
//! A collection sits between iterators in the physical plan and exposes a put
//! side and a get side. `put_data` returns true when the collection wants its
//! contents drained; `get_data` returns false when nothing is left. Rows are
//! heterogeneous arrays; a scalar put is wrapped into a one-element row.

use sable_types::{ArchiveReader, ArchiveWriter, DataArray, DataType, Value};

use crate::class::ClassId;
use crate::error::ExecError;
use crate::explain::Explain;
use crate::program::Program;

mod connection;
mod disintegrate;
mod grouping;
mod queue;
mod sort;
mod store;

pub use connection::Connection;
pub use disintegrate::Disintegrate;
pub use grouping::Grouping;
pub use queue::{Queue, SafeQueue};
pub use sort::{Sort, SortKey};
pub use store::Store;

/// The collection interface: common lifecycle plus the put and get sides.
pub trait Collection {
    /// Renders the collection for explain output.
    fn explain(&self, explain: &mut Explain);
    /// Binds program resources. Idempotent.
    fn initialize(&mut self, program: &Program) -> Result<(), ExecError>;
    /// Releases program resources and buffered data.
    fn terminate(&mut self, program: &Program);
    /// Drops buffered data, returning to the initialized state.
    fn clear(&mut self);
    /// Whether the collection holds no buffered data.
    fn is_empty(&self) -> bool;
    /// Whether this collection is a degenerate single-group pass-through.
    fn is_empty_grouping(&self) -> bool {
        false
    }
    /// Whether the surrounding iterator should pull the next source row.
    fn is_get_next_operand(&self) -> bool {
        true
    }
    /// The stable serialization id of this concrete kind.
    fn class_id(&self) -> ClassId;
    /// Writes the construction payload.
    fn write_to(&self, writer: &mut ArchiveWriter);
    /// Restores the construction payload into a defaulted instance.
    fn read_payload(&mut self, reader: &mut ArchiveReader<'_>) -> Result<(), ExecError>;

    /// Buffers one row; true asks the caller to drain.
    fn put_data(&mut self, program: &Program, row: &Value) -> Result<bool, ExecError>;
    /// Forwards one externalizable object (None is end-of-stream).
    fn put_object(
        &mut self,
        _program: &Program,
        _object: Option<&Value>,
    ) -> Result<bool, ExecError> {
        Err(ExecError::NotSupported)
    }
    /// Signals end of input on the put side.
    fn put_finish(&mut self, program: &Program) -> Result<(), ExecError>;
    /// Advances the streaming window (grouping-family collections).
    fn shift(&mut self, _program: &Program) -> Result<(), ExecError> {
        Ok(())
    }
    /// Flushes a buffering transport.
    fn flush(&mut self, _program: &Program) -> Result<(), ExecError> {
        Ok(())
    }
    /// Zero-based position of the most recent put, if tracked.
    fn last_position(&self) -> Option<usize> {
        None
    }

    /// Fills `row` with the next buffered row; false at end.
    fn get_data(&mut self, program: &Program, row: &mut Value) -> Result<bool, ExecError>;
    /// Random access for store-like collections.
    fn get_data_at(
        &mut self,
        _program: &Program,
        _row: &mut Value,
        _position: usize,
    ) -> Result<bool, ExecError> {
        Err(ExecError::NotSupported)
    }
    /// Completes the get side.
    fn get_finish(&mut self, _program: &Program) -> Result<(), ExecError> {
        Ok(())
    }
    /// Re-arms the get cursor.
    fn reset_get(&mut self);
}

/// Borrows `value` as a tuple row, failing when it is not one.
pub(crate) fn expect_row(value: &Value) -> Result<&DataArray, ExecError> {
    match value.as_array() {
        Some(array) if array.element_type() == DataType::Data => Ok(array),
        _ => Err(ExecError::Unexpected),
    }
}

/// Copies `value` into an owned row, wrapping a scalar into one element.
pub(crate) fn copy_as_row(value: &Value) -> DataArray {
    match value.as_array() {
        Some(array) if array.element_type() == DataType::Data => array.clone(),
        _ => DataArray::from_values(vec![value.copy()]),
    }
}

/// Assigns `source` element-wise into the row behind `target`.
pub(crate) fn assign_into_row(target: &mut Value, source: &DataArray) -> Result<(), ExecError> {
    if !target.is_row() {
        return Err(ExecError::NotSupported);
    }
    let array = target.as_array_mut().ok_or(ExecError::Unexpected)?;
    array.assign_elements(source)?;
    Ok(())
}
