//! Large-object mutation through locators.

use sable_types::{ArchiveReader, ArchiveWriter, Value};
use tracing::trace;

use crate::action::substring::check_argument;
use crate::action::{Action, Latch, Status};
use crate::class::ClassId;
use crate::error::ExecError;
use crate::explain::Explain;
use crate::holder::{DataHolder, LocatorHolder};
use crate::program::Program;

/// Which locator operation this action performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorOpKind {
    /// Element count into the data slot.
    Length,
    /// Windowed read into the data slot.
    Get,
    /// Append the option value.
    Append,
    /// Truncate to the option length.
    Truncate,
    /// Replace a window with the placement value.
    Replace,
}

impl Default for LocatorOpKind {
    fn default() -> Self {
        LocatorOpKind::Length
    }
}

/// A locator operation wrapping a [`LocatorHolder`].
///
/// When the locator is invalid, or a required option is null, the operation
/// degrades: readers produce NULL and writers do nothing.
#[derive(Debug, Default)]
pub struct LocatorOp {
    kind: LocatorOpKind,
    locator: LocatorHolder,
    data: DataHolder,
    start: DataHolder,
    length: DataHolder,
    done: Latch,
}

impl LocatorOp {
    /// `length(locator)` into `data`.
    pub fn length(locator: i32, data: i32) -> Self {
        LocatorOp {
            kind: LocatorOpKind::Length,
            locator: LocatorHolder::new(locator),
            data: DataHolder::new(data),
            ..LocatorOp::default()
        }
    }

    /// `get(locator [, start [, length]])` into `data`.
    pub fn get(locator: i32, start: Option<i32>, length: Option<i32>, data: i32) -> Self {
        LocatorOp {
            kind: LocatorOpKind::Get,
            locator: LocatorHolder::new(locator),
            data: DataHolder::new(data),
            start: start.map(DataHolder::new).unwrap_or_default(),
            length: length.map(DataHolder::new).unwrap_or_default(),
            done: Latch::default(),
        }
    }

    /// `append(locator, data)`.
    pub fn append(locator: i32, data: i32) -> Self {
        LocatorOp {
            kind: LocatorOpKind::Append,
            locator: LocatorHolder::new(locator),
            data: DataHolder::new(data),
            ..LocatorOp::default()
        }
    }

    /// `truncate(locator [, length])`.
    pub fn truncate(locator: i32, length: Option<i32>) -> Self {
        LocatorOp {
            kind: LocatorOpKind::Truncate,
            locator: LocatorHolder::new(locator),
            length: length.map(DataHolder::new).unwrap_or_default(),
            ..LocatorOp::default()
        }
    }

    /// `replace(locator, placement [, start [, length]])`.
    pub fn replace(locator: i32, placement: i32, start: Option<i32>, length: Option<i32>) -> Self {
        LocatorOp {
            kind: LocatorOpKind::Replace,
            locator: LocatorHolder::new(locator),
            data: DataHolder::new(placement),
            start: start.map(DataHolder::new).unwrap_or_default(),
            length: length.map(DataHolder::new).unwrap_or_default(),
            done: Latch::default(),
        }
    }

    fn option_null(&self, program: &Program, holder: &DataHolder) -> Result<bool, ExecError> {
        Ok(holder.is_initialized() && holder.value(program)?.is_null())
    }

    fn is_valid(&self, program: &Program) -> Result<bool, ExecError> {
        if !self.locator.locator(program).map(|l| l.is_valid()).unwrap_or(false) {
            return Ok(false);
        }
        let options_null = match self.kind {
            LocatorOpKind::Length => false,
            LocatorOpKind::Get | LocatorOpKind::Truncate => {
                self.option_null(program, &self.start)?
                    || self.option_null(program, &self.length)?
            }
            LocatorOpKind::Append => self.option_null(program, &self.data)?,
            LocatorOpKind::Replace => {
                self.option_null(program, &self.data)?
                    || self.option_null(program, &self.start)?
                    || self.option_null(program, &self.length)?
            }
        };
        Ok(!options_null)
    }

    /// Normalizes the start/length options into a 1-based window.
    fn window(&self, program: &Program) -> Result<(u32, i32), ExecError> {
        let mut start = match self.start.is_initialized() {
            true => {
                self.start
                    .int_value(program)?
                    .ok_or(ExecError::Unexpected)?
                    - 1
            }
            false => 0,
        };
        let mut length = match self.length.is_initialized() {
            true => self
                .length
                .int_value(program)?
                .ok_or(ExecError::Unexpected)?,
            false => i32::MAX,
        };
        let mut max_length = length;
        if start > 0 && max_length <= i32::MAX - start {
            max_length += start;
        }
        check_argument(&mut start, &mut length, max_length)?;
        Ok((start as u32 + 1, length))
    }

    fn do_valid(&self, program: &Program) -> Result<(), ExecError> {
        match self.kind {
            LocatorOpKind::Length => {
                let length = self.locator.locator(program)?.length();
                trace!(locator = self.locator.id(), length, "locator length");
                self.data.value_mut(program)?.assign(&Value::from(length))?;
            }
            LocatorOpKind::Get => {
                let (start, length) = self.window(program)?;
                let result = self.locator.locator(program)?.get(start, length as u32);
                trace!(locator = self.locator.id(), start, length, "locator get");
                self.data.value_mut(program)?.assign(&result)?;
            }
            LocatorOpKind::Append => {
                let value = self.data.value(program)?.copy();
                self.locator.locator_mut(program)?.append(&value)?;
            }
            LocatorOpKind::Truncate => {
                let length = match self.length.is_initialized() {
                    true => self
                        .length
                        .int_value(program)?
                        .ok_or(ExecError::Unexpected)?,
                    false => i32::MAX,
                };
                self.locator.locator_mut(program)?.truncate(length.max(0) as u32);
            }
            LocatorOpKind::Replace => {
                let mut start = match self.start.is_initialized() {
                    true => {
                        self.start
                            .int_value(program)?
                            .ok_or(ExecError::Unexpected)?
                            - 1
                    }
                    false => 0,
                };
                let length = match self.length.is_initialized() {
                    true => self
                        .length
                        .int_value(program)?
                        .ok_or(ExecError::Unexpected)?,
                    false => i32::MAX,
                };
                let mut max_length = length;
                if start > 0 && max_length <= i32::MAX - start {
                    max_length += start;
                }
                // Validate both windows the replacement touches.
                let (mut head_start, mut head_length) = (0, start);
                check_argument(&mut head_start, &mut head_length, max_length)?;
                let (mut tail_start, mut tail_length) =
                    (start.saturating_add(length), i32::MAX);
                check_argument(&mut tail_start, &mut tail_length, max_length)?;
                let placement = self.data.value(program)?.copy();
                let window = self
                    .length
                    .is_initialized()
                    .then_some(length.max(0) as u32);
                self.locator.locator_mut(program)?.replace(
                    &placement,
                    start.max(0) as u32 + 1,
                    window,
                )?;
            }
        }
        Ok(())
    }

    fn do_invalid(&self, program: &Program) -> Result<(), ExecError> {
        match self.kind {
            LocatorOpKind::Length | LocatorOpKind::Get => {
                self.data.value_mut(program)?.set_null();
            }
            // Writers on an invalid locator are silently ignored.
            LocatorOpKind::Append | LocatorOpKind::Truncate | LocatorOpKind::Replace => {}
        }
        Ok(())
    }
}

impl Action for LocatorOp {
    fn explain(&self, explain: &mut Explain) {
        explain.push_no_newline();
        explain.put(match self.kind {
            LocatorOpKind::Length => "locator length",
            LocatorOpKind::Get => "locator get",
            LocatorOpKind::Append => "locator append",
            LocatorOpKind::Truncate => "locator truncate",
            LocatorOpKind::Replace => "locator replace",
        });
        if explain.with_data() {
            explain.put(" [").put_i32(self.locator.id()).put("]");
        }
        explain.pop_no_newline();
    }

    fn initialize(&mut self, program: &Program) -> Result<(), ExecError> {
        self.locator.initialize(program)?;
        self.data.initialize(program)?;
        self.start.initialize(program)?;
        self.length.initialize(program)?;
        Ok(())
    }

    fn terminate(&mut self, _program: &Program) {
        self.locator.terminate();
        self.data.terminate();
        self.start.terminate();
        self.length.terminate();
    }

    fn execute(&mut self, program: &Program) -> Result<Status, ExecError> {
        if !self.done.is_done() {
            if self.is_valid(program)? {
                self.do_valid(program)?;
            } else {
                self.do_invalid(program)?;
            }
            self.done.set();
        }
        Ok(Status::Success)
    }

    fn undone(&mut self) {
        self.done.clear();
    }

    fn class_id(&self) -> ClassId {
        match self.kind {
            LocatorOpKind::Length => ClassId::LocatorLength,
            LocatorOpKind::Get => ClassId::LocatorGet,
            LocatorOpKind::Append => ClassId::LocatorAppend,
            LocatorOpKind::Truncate => ClassId::LocatorTruncate,
            LocatorOpKind::Replace => ClassId::LocatorReplace,
        }
    }

    fn write_to(&self, writer: &mut ArchiveWriter) {
        self.locator.serialize(writer);
        self.data.serialize(writer);
        self.start.serialize(writer);
        self.length.serialize(writer);
    }

    fn read_payload(&mut self, reader: &mut ArchiveReader<'_>) -> Result<(), ExecError> {
        self.locator = LocatorHolder::deserialize(reader)?;
        self.data = DataHolder::deserialize(reader)?;
        self.start = DataHolder::deserialize(reader)?;
        self.length = DataHolder::deserialize(reader)?;
        Ok(())
    }
}

impl LocatorOp {
    pub(crate) fn with_kind(kind: LocatorOpKind) -> Self {
        LocatorOp {
            kind,
            ..LocatorOp::default()
        }
    }
}
