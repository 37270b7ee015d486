//! CHAR_LENGTH and OCTET_LENGTH.

use sable_types::{ArchiveReader, ArchiveWriter, DataType, Value};

use crate::action::{Action, Latch, Status};
use crate::class::ClassId;
use crate::error::ExecError;
use crate::explain::Explain;
use crate::holder::DataHolder;
use crate::program::Program;

/// Which length the action measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthKind {
    /// Characters: UTF-16 code units for strings, bytes for binaries.
    Char,
    /// Octets: strings count two bytes per code unit.
    Octet,
}

impl Default for LengthKind {
    fn default() -> Self {
        LengthKind::Char
    }
}

/// Measures a scalar, or sums the measures of an array's elements.
#[derive(Debug, Default, Clone)]
pub struct Length {
    kind: LengthKind,
    input: DataHolder,
    out: DataHolder,
    done: Latch,
}

impl Length {
    /// A length measure of the given kind.
    pub fn new(kind: LengthKind, input: i32, out: i32) -> Self {
        Length {
            kind,
            input: DataHolder::new(input),
            out: DataHolder::new(out),
            done: Latch::default(),
        }
    }

    fn measure(&self, value: &Value) -> Result<u32, ExecError> {
        match value.data_type() {
            DataType::String => {
                let units = value.as_str16().ok_or(ExecError::Unexpected)?.len() as u32;
                Ok(match self.kind {
                    LengthKind::Char => units,
                    LengthKind::Octet => units * 2,
                })
            }
            DataType::Binary => {
                Ok(value.as_binary().ok_or(ExecError::Unexpected)?.len() as u32)
            }
            _ => Err(ExecError::Unexpected),
        }
    }
}

impl Action for Length {
    fn explain(&self, explain: &mut Explain) {
        explain.push_no_newline();
        explain.put(match self.kind {
            LengthKind::Char => "char_length",
            LengthKind::Octet => "octet_length",
        });
        if explain.with_data() {
            explain.put(" ");
            self.input.explain(explain);
            explain.put(" to ");
            self.out.explain(explain);
        }
        explain.pop_no_newline();
    }

    fn initialize(&mut self, program: &Program) -> Result<(), ExecError> {
        if !self.input.is_initialized() {
            self.input.initialize(program)?;
            self.out.initialize(program)?;
        }
        Ok(())
    }

    fn terminate(&mut self, _program: &Program) {
        self.input.terminate();
        self.out.terminate();
    }

    fn execute(&mut self, program: &Program) -> Result<Status, ExecError> {
        if !self.done.is_done() {
            let length = {
                let input = self.input.value(program)?;
                if input.is_null() {
                    None
                } else if let Some(array) = input.as_array() {
                    let mut total = 0u32;
                    for element in array.values() {
                        total += self.measure(element)?;
                    }
                    Some(total)
                } else {
                    Some(self.measure(&input)?)
                }
            };
            let mut out = self.out.value_mut(program)?;
            match length {
                Some(length) => out.assign(&Value::from(length))?,
                None => out.set_null(),
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
            LengthKind::Char => ClassId::LengthChar,
            LengthKind::Octet => ClassId::LengthOctet,
        }
    }

    fn write_to(&self, writer: &mut ArchiveWriter) {
        self.input.serialize(writer);
        self.out.serialize(writer);
    }

    fn read_payload(&mut self, reader: &mut ArchiveReader<'_>) -> Result<(), ExecError> {
        self.input = DataHolder::deserialize(reader)?;
        self.out = DataHolder::deserialize(reader)?;
        Ok(())
    }
}

/// Restores the kind lost by sharing one payload shape between both ids.
impl Length {
    pub(crate) fn with_kind(kind: LengthKind) -> Self {
        Length {
            kind,
            ..Length::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_types::DataArray;

    fn run(kind: LengthKind, input: Value) -> Option<u32> {
        let mut program = Program::new();
        let input_id = program.add_variable(input);
        let out = program.add_variable(Value::null_of(DataType::UInt32));
        let mut action = Length::new(kind, input_id, out);
        action.initialize(&program).unwrap();
        action.execute(&program).unwrap();
        let out_value = program.variable(out).unwrap();
        out_value.to_u32()
    }

    #[test]
    fn char_length_counts_code_units() {
        assert_eq!(run(LengthKind::Char, Value::from("héllo")), Some(5));
        assert_eq!(run(LengthKind::Char, Value::from("𠮷")), Some(2));
        assert_eq!(run(LengthKind::Char, Value::from(vec![1u8, 2])), Some(2));
    }

    #[test]
    fn octet_length_doubles_strings() {
        assert_eq!(run(LengthKind::Octet, Value::from("abc")), Some(6));
        assert_eq!(run(LengthKind::Octet, Value::from(vec![1u8, 2, 3])), Some(3));
    }

    #[test]
    fn arrays_sum_elements() {
        let array = Value::from(DataArray::from_values(vec![
            Value::from("ab"),
            Value::from(vec![1u8, 2, 3]),
        ]));
        assert_eq!(run(LengthKind::Char, array), Some(5));
    }

    #[test]
    fn null_input_yields_null() {
        assert_eq!(run(LengthKind::Char, Value::null_of(DataType::String)), None);
    }
}
