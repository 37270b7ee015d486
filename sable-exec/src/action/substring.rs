//! SQL SUBSTRING.

use sable_types::{ArchiveReader, ArchiveWriter, DataArray, DataType, Value};

use crate::action::{Action, Latch, Status};
use crate::class::ClassId;
use crate::error::ExecError;
use crate::explain::Explain;
use crate::holder::DataHolder;
use crate::program::Program;

/// Normalizes a 0-based window against `max_length`.
///
/// A negative length fails; a start at or past the end collapses to the empty
/// window; otherwise the window is clamped into `[0, max_length)`. Overlay
/// and the locator operations reuse this for each of their segments.
pub fn check_argument(start: &mut i32, length: &mut i32, max_length: i32) -> Result<(), ExecError> {
    if *length < 0 {
        return Err(ExecError::SubStringError);
    }
    if *start >= max_length {
        *start = 0;
        *length = 0;
    } else {
        // Widen so extreme windows cannot wrap around.
        let (s, l, m) = (*start as i64, *length as i64, max_length as i64);
        let end = s + (m - s).min(l);
        let start1 = s.max(0);
        let end1 = end.min(m);
        *length = (end1 - start1).max(0) as i32;
        *start = start1 as i32;
    }
    Ok(())
}

/// Cuts the requested window out of a string, binary, or array value.
#[derive(Debug, Default, Clone)]
pub struct SubString {
    data: DataHolder,
    start: DataHolder,
    length: DataHolder,
    out: DataHolder,
    done: Latch,
}

impl SubString {
    /// `SUBSTRING(data FROM start [FOR length])`; `length < 0` means omitted.
    pub fn new(data: i32, start: i32, length: Option<i32>, out: i32) -> Self {
        SubString {
            data: DataHolder::new(data),
            start: DataHolder::new(start),
            length: length.map(DataHolder::new).unwrap_or_default(),
            out: DataHolder::new(out),
            done: Latch::default(),
        }
    }

    fn calculate(&self, program: &Program, start: i32, length: i32) -> Result<(), ExecError> {
        let source = self.data.value(program)?;
        let result = match source.data_type() {
            DataType::String => {
                let s = source.as_str16().ok_or(ExecError::Unexpected)?;
                let (mut start, mut length) = (start, length);
                check_argument(&mut start, &mut length, s.len() as i32)?;
                Value::from(s.copy_range(start as usize, length as usize))
            }
            DataType::Binary => {
                let b = source.as_binary().ok_or(ExecError::Unexpected)?;
                let (mut start, mut length) = (start, length);
                check_argument(&mut start, &mut length, b.len() as i32)?;
                let start = start as usize;
                Value::from(b[start..start + length as usize].to_vec())
            }
            DataType::Array => {
                let a = source.as_array().ok_or(ExecError::Unexpected)?;
                let (mut start, mut length) = (start, length);
                check_argument(&mut start, &mut length, a.count() as i32)?;
                let start = start as usize;
                Value::from(DataArray::from_values(
                    a.values()[start..start + length as usize].to_vec(),
                ))
            }
            _ => return Err(ExecError::NotSupported),
        };
        drop(source);
        self.out.value_mut(program)?.assign(&result)?;
        Ok(())
    }
}

impl Action for SubString {
    fn explain(&self, explain: &mut Explain) {
        explain.push_no_newline();
        explain.put("substring");
        if explain.with_data() {
            explain.put(" ");
            self.data.explain(explain);
            explain.put(" from ");
            self.start.explain(explain);
            if self.length.is_valid() {
                explain.put(" for ");
                self.length.explain(explain);
            }
            explain.put(" to ");
            self.out.explain(explain);
        }
        explain.pop_no_newline();
    }

    fn initialize(&mut self, program: &Program) -> Result<(), ExecError> {
        if !self.data.is_initialized() {
            self.data.initialize(program)?;
            self.start.initialize(program)?;
            self.length.initialize(program)?;
            self.out.initialize(program)?;
        }
        Ok(())
    }

    fn terminate(&mut self, _program: &Program) {
        self.data.terminate();
        self.start.terminate();
        self.length.terminate();
        self.out.terminate();
    }

    fn execute(&mut self, program: &Program) -> Result<Status, ExecError> {
        if !self.done.is_done() {
            let data_null = self.data.value(program)?.is_null();
            let start_null = self.start.value(program)?.is_null();
            let length_null =
                self.length.is_valid() && self.length.value(program)?.is_null();
            if data_null || start_null || length_null {
                self.out.value_mut(program)?.set_null();
            } else {
                // 1-based in SQL; the window routine is 0-based.
                let start = self
                    .start
                    .int_value(program)?
                    .ok_or(ExecError::Unexpected)?
                    - 1;
                let length = if self.length.is_valid() {
                    self.length
                        .int_value(program)?
                        .ok_or(ExecError::Unexpected)?
                } else {
                    i32::MAX
                };
                self.calculate(program, start, length)?;
            }
            self.done.set();
        }
        Ok(Status::Success)
    }

    fn undone(&mut self) {
        self.done.clear();
    }

    fn class_id(&self) -> ClassId {
        ClassId::SubString
    }

    fn write_to(&self, writer: &mut ArchiveWriter) {
        self.data.serialize(writer);
        self.start.serialize(writer);
        self.length.serialize(writer);
        self.out.serialize(writer);
    }

    fn read_payload(&mut self, reader: &mut ArchiveReader<'_>) -> Result<(), ExecError> {
        self.data = DataHolder::deserialize(reader)?;
        self.start = DataHolder::deserialize(reader)?;
        self.length = DataHolder::deserialize(reader)?;
        self.out = DataHolder::deserialize(reader)?;
        Ok(())
    }
}
