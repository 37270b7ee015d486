//! SQL OVERLAY.

use sable_types::{ArchiveReader, ArchiveWriter, DataArray, DataType, Utf16String, Value};

use crate::action::substring::check_argument;
use crate::action::{Action, Latch, Status};
use crate::class::ClassId;
use crate::error::ExecError;
use crate::explain::Explain;
use crate::holder::DataHolder;
use crate::program::Program;

/// Replaces a window of the source with the placement value.
///
/// The result is built from three parts (the head of the source, the whole
/// placement, and the tail past the replaced window), each clamped through
/// the substring window routine so out-of-range arguments degrade to empty
/// pieces. An omitted length defaults to the placement's length.
#[derive(Debug, Default, Clone)]
pub struct Overlay {
    source: DataHolder,
    placement: DataHolder,
    start: DataHolder,
    length: DataHolder,
    out: DataHolder,
    done: Latch,
}

impl Overlay {
    /// `OVERLAY(source PLACING placement FROM start [FOR length])`.
    pub fn new(source: i32, placement: i32, start: i32, length: Option<i32>, out: i32) -> Self {
        Overlay {
            source: DataHolder::new(source),
            placement: DataHolder::new(placement),
            start: DataHolder::new(start),
            length: length.map(DataHolder::new).unwrap_or_default(),
            out: DataHolder::new(out),
            done: Latch::default(),
        }
    }

    fn calculate(
        &self,
        program: &Program,
        start: i32,
        length: Option<i32>,
    ) -> Result<(), ExecError> {
        let source = self.source.value(program)?;
        let placement = self.placement.value(program)?;
        let result = match source.data_type() {
            DataType::String => {
                let s = source.as_str16().ok_or(ExecError::Unexpected)?;
                let p = placement.as_str16().ok_or(ExecError::Unexpected)?;
                let length = length.unwrap_or(p.len() as i32);
                let mut out = Utf16String::new();
                let (head_start, head_len) = segment(0, start, s.len() as i32)?;
                out.connect(&s.copy_range(head_start, head_len));
                out.connect(p);
                let (tail_start, tail_len) = segment(start.saturating_add(length), i32::MAX, s.len() as i32)?;
                out.connect(&s.copy_range(tail_start, tail_len));
                Value::from(out)
            }
            DataType::Binary => {
                let s = source.as_binary().ok_or(ExecError::Unexpected)?;
                let p = placement.as_binary().ok_or(ExecError::Unexpected)?;
                let length = length.unwrap_or(p.len() as i32);
                let mut out = Vec::new();
                let (head_start, head_len) = segment(0, start, s.len() as i32)?;
                out.extend_from_slice(&s[head_start..head_start + head_len]);
                out.extend_from_slice(p);
                let (tail_start, tail_len) = segment(start.saturating_add(length), i32::MAX, s.len() as i32)?;
                out.extend_from_slice(&s[tail_start..tail_start + tail_len]);
                Value::from(out)
            }
            DataType::Array => {
                let s = source.as_array().ok_or(ExecError::Unexpected)?;
                let p = placement.as_array().ok_or(ExecError::Unexpected)?;
                let length = length.unwrap_or(p.count() as i32);
                let mut out = Vec::new();
                let (head_start, head_len) = segment(0, start, s.count() as i32)?;
                out.extend_from_slice(&s.values()[head_start..head_start + head_len]);
                out.extend_from_slice(p.values());
                let (tail_start, tail_len) = segment(start.saturating_add(length), i32::MAX, s.count() as i32)?;
                out.extend_from_slice(&s.values()[tail_start..tail_start + tail_len]);
                Value::from(DataArray::from_values(out))
            }
            _ => return Err(ExecError::NotSupported),
        };
        drop(source);
        drop(placement);
        self.out.value_mut(program)?.assign(&result)?;
        Ok(())
    }
}

fn segment(start: i32, length: i32, max: i32) -> Result<(usize, usize), ExecError> {
    let mut start = start;
    let mut length = length;
    check_argument(&mut start, &mut length, max)?;
    Ok((start as usize, length as usize))
}

impl Action for Overlay {
    fn explain(&self, explain: &mut Explain) {
        explain.push_no_newline();
        explain.put("overlay");
        if explain.with_data() {
            explain.put(" ");
            self.source.explain(explain);
            explain.put(" placing ");
            self.placement.explain(explain);
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
        if !self.source.is_initialized() {
            self.source.initialize(program)?;
            self.placement.initialize(program)?;
            self.start.initialize(program)?;
            self.length.initialize(program)?;
            self.out.initialize(program)?;
        }
        Ok(())
    }

    fn terminate(&mut self, _program: &Program) {
        self.source.terminate();
        self.placement.terminate();
        self.start.terminate();
        self.length.terminate();
        self.out.terminate();
    }

    fn execute(&mut self, program: &Program) -> Result<Status, ExecError> {
        if !self.done.is_done() {
            let source = self.source.value(program)?;
            let placement = self.placement.value(program)?;
            let any_null = source.is_null()
                || placement.is_null()
                || self.start.value(program)?.is_null()
                || (self.length.is_valid() && self.length.value(program)?.is_null());
            if any_null {
                drop(source);
                drop(placement);
                self.out.value_mut(program)?.set_null();
            } else if source.data_type() != placement.data_type()
                || source.element_type() != placement.element_type()
            {
                return Err(ExecError::NotCompatible);
            } else {
                drop(source);
                drop(placement);
                let start = self
                    .start
                    .int_value(program)?
                    .ok_or(ExecError::Unexpected)?
                    - 1;
                let length = if self.length.is_valid() {
                    Some(
                        self.length
                            .int_value(program)?
                            .ok_or(ExecError::Unexpected)?,
                    )
                } else {
                    None
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
        ClassId::Overlay
    }

    fn write_to(&self, writer: &mut ArchiveWriter) {
        self.source.serialize(writer);
        self.placement.serialize(writer);
        self.start.serialize(writer);
        self.length.serialize(writer);
        self.out.serialize(writer);
    }

    fn read_payload(&mut self, reader: &mut ArchiveReader<'_>) -> Result<(), ExecError> {
        self.source = DataHolder::deserialize(reader)?;
        self.placement = DataHolder::deserialize(reader)?;
        self.start = DataHolder::deserialize(reader)?;
        self.length = DataHolder::deserialize(reader)?;
        self.out = DataHolder::deserialize(reader)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlay(s: &str, p: &str, start: i32, length: Option<i32>) -> Result<String, ExecError> {
        let mut program = Program::new();
        let source = program.add_variable(Value::from(s));
        let placement = program.add_variable(Value::from(p));
        let start_id = program.add_variable(Value::from(start));
        let length_id = length.map(|l| program.add_variable(Value::from(l)));
        let out = program.add_variable(Value::null_of(DataType::String));
        let mut action = Overlay::new(source, placement, start_id, length_id, out);
        action.initialize(&program)?;
        action.execute(&program)?;
        let result = program.variable(out)?.to_string();
        Ok(result)
    }

    #[test]
    fn sql_semantics() {
        assert_eq!(overlay("abcdef", "XYZ", 2, Some(2)).unwrap(), "aXYZdef");
        assert_eq!(overlay("abcdef", "XY", 10, None).unwrap(), "abcdefXY");
        assert_eq!(overlay("abcdef", "XY", 1, Some(6)).unwrap(), "XY");
    }

    #[test]
    fn default_length_is_placement_length() {
        assert_eq!(overlay("abcdef", "XY", 2, None).unwrap(), "aXYdef");
    }

    #[test]
    fn identity_with_substring() {
        // OVERLAY(s PLACING SUBSTRING(s FROM i FOR n) FROM i FOR n) == s
        let s = "abcdefgh";
        for i in 1..=8 {
            for n in 0..=8 {
                let piece: String = s.chars().skip(i - 1).take(n).collect();
                assert_eq!(
                    overlay(s, &piece, i as i32, Some(n as i32)).unwrap(),
                    s,
                    "i={i} n={n}"
                );
            }
        }
    }

    #[test]
    fn negative_length_fails() {
        assert_eq!(
            overlay("abc", "X", 1, Some(-2)).err(),
            Some(ExecError::SubStringError)
        );
    }

    #[test]
    fn type_mismatch_is_incompatible() {
        let mut program = Program::new();
        let source = program.add_variable(Value::from("abc"));
        let placement = program.add_variable(Value::from(vec![1u8]));
        let start = program.add_variable(Value::from(1i32));
        let out = program.add_variable(Value::null());
        let mut action = Overlay::new(source, placement, start, None, out);
        action.initialize(&program).unwrap();
        assert_eq!(action.execute(&program), Err(ExecError::NotCompatible));
    }

    #[test]
    fn null_placement_yields_null() {
        let mut program = Program::new();
        let source = program.add_variable(Value::from("abc"));
        let placement = program.add_variable(Value::null_of(DataType::String));
        let start = program.add_variable(Value::from(1i32));
        let out = program.add_variable(Value::from("x"));
        let mut action = Overlay::new(source, placement, start, None, out);
        action.initialize(&program).unwrap();
        action.execute(&program).unwrap();
        assert!(program.variable(out).unwrap().is_null());
    }
}
