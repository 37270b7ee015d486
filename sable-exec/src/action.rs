//! Scalar actions: the per-row units of computation.
//!
//! An action evaluates once per output row. The `done` latch makes repeated
//! `execute` calls within one row free: common subexpressions are wired to
//! the same action and only the first reference computes. `undone` re-arms
//! the action between rows.

use sable_types::{ArchiveReader, ArchiveWriter};

use crate::class::ClassId;
use crate::error::ExecError;
use crate::explain::Explain;
use crate::program::Program;

mod arithmetic;
mod cardinality;
mod choice;
mod concatenate;
mod copy_assign;
mod element_reference;
mod invoke;
mod length;
mod locator_ops;
mod normalize;
mod overlay;
mod substring;
mod timestamp;

pub use arithmetic::Arithmetic;
pub use cardinality::Cardinality;
pub use choice::{Case, CaseBranch, Coalesce, GetMax, NullIf};
pub use concatenate::{ConcatKind, Concatenate};
pub use copy_assign::{Assign, Copy};
pub use element_reference::ElementReference;
pub use invoke::Invoke;
pub use length::{Length, LengthKind};
pub use locator_ops::{LocatorOp, LocatorOpKind};
pub use normalize::{ExpandSynonym, Normalize};
pub use overlay::Overlay;
pub use substring::{check_argument, SubString};
pub use timestamp::CurrentTimestamp;

/// Outcome of one action execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Status {
    /// The action completed; continue with the next one.
    Success,
    /// The action's predicate did not hold for this row.
    False,
    /// Leave the enclosing loop.
    Break,
    /// Restart the enclosing loop with the next row.
    Continue,
}

/// The once-per-row memo latch.
#[derive(Debug, Default, Clone, Copy)]
pub struct Latch {
    done: bool,
}

impl Latch {
    /// Whether the action already ran for this row.
    pub const fn is_done(&self) -> bool {
        self.done
    }

    /// Marks the action as run.
    pub fn set(&mut self) {
        self.done = true;
    }

    /// Re-arms the action for the next row.
    pub fn clear(&mut self) {
        self.done = false;
    }
}

/// A unit of computation over one output row.
pub trait Action {
    /// Renders the action for explain output.
    fn explain(&self, explain: &mut Explain);
    /// Binds holders and per-run resources. Idempotent.
    fn initialize(&mut self, program: &Program) -> Result<(), ExecError>;
    /// Releases bindings. Safe on a partially initialized action.
    fn terminate(&mut self, program: &Program);
    /// Performs the work once per row.
    fn execute(&mut self, program: &Program) -> Result<Status, ExecError>;
    /// Completes the current run.
    fn finish(&mut self, _program: &Program) -> Result<(), ExecError> {
        Ok(())
    }
    /// Returns to the post-initialize state.
    fn reset(&mut self, _program: &Program) -> Result<(), ExecError> {
        Ok(())
    }
    /// Clears the once-per-row latch.
    fn undone(&mut self);
    /// The stable serialization id of this concrete kind.
    fn class_id(&self) -> ClassId;
    /// Writes the construction payload.
    fn write_to(&self, writer: &mut ArchiveWriter);
    /// Restores the construction payload into a defaulted instance.
    fn read_payload(&mut self, reader: &mut ArchiveReader<'_>) -> Result<(), ExecError>;
}

/// An ordered list of actions executed per row.
#[derive(Default)]
pub struct ActionList {
    actions: Vec<Box<dyn Action>>,
}

impl ActionList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an action, returning its index.
    pub fn add(&mut self, action: Box<dyn Action>) -> usize {
        self.actions.push(action);
        self.actions.len() - 1
    }

    /// Number of actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Borrows the action at `index`.
    pub fn get(&self, index: usize) -> Option<&dyn Action> {
        self.actions.get(index).map(|a| a.as_ref())
    }

    /// Initializes every action.
    pub fn initialize(&mut self, program: &Program) -> Result<(), ExecError> {
        for action in &mut self.actions {
            action.initialize(program)?;
        }
        Ok(())
    }

    /// Terminates every action.
    pub fn terminate(&mut self, program: &Program) {
        for action in &mut self.actions {
            action.terminate(program);
        }
    }

    /// Runs the list for one row, honoring control-flow statuses.
    pub fn execute(&mut self, program: &Program) -> Result<Status, ExecError> {
        for action in &mut self.actions {
            match action.execute(program)? {
                Status::Success => {}
                status => return Ok(status),
            }
        }
        Ok(Status::Success)
    }

    /// Finishes every action.
    pub fn finish(&mut self, program: &Program) -> Result<(), ExecError> {
        for action in &mut self.actions {
            action.finish(program)?;
        }
        Ok(())
    }

    /// Resets every action.
    pub fn reset(&mut self, program: &Program) -> Result<(), ExecError> {
        for action in &mut self.actions {
            action.reset(program)?;
        }
        Ok(())
    }

    /// Re-arms every action for the next row.
    pub fn undone(&mut self) {
        for action in &mut self.actions {
            action.undone();
        }
    }

    /// Renders every action, one per line.
    pub fn explain(&self, explain: &mut Explain) {
        for action in &self.actions {
            action.explain(explain);
            explain.new_line();
        }
    }
}
