//! Value copy and in-place assignment.

use sable_types::{ArchiveReader, ArchiveWriter, DataType};

use crate::action::{Action, Latch, Status};
use crate::class::ClassId;
use crate::error::ExecError;
use crate::explain::Explain;
use crate::holder::DataHolder;
use crate::program::Program;

/// Clones the input value into the out slot.
#[derive(Debug, Default, Clone)]
pub struct Copy {
    input: DataHolder,
    out: DataHolder,
    done: Latch,
}

impl Copy {
    /// Copies slot `input` into slot `out`.
    pub fn new(input: i32, out: i32) -> Self {
        Copy {
            input: DataHolder::new(input),
            out: DataHolder::new(out),
            done: Latch::default(),
        }
    }
}

impl Action for Copy {
    fn explain(&self, explain: &mut Explain) {
        explain.push_no_newline();
        explain.put("copy");
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
            let source = self.input.value(program)?.copy();
            self.out.value_mut(program)?.assign(&source)?;
            self.done.set();
        }
        Ok(Status::Success)
    }

    fn undone(&mut self) {
        self.done.clear();
    }

    fn class_id(&self) -> ClassId {
        ClassId::Copy
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

/// In-place assignment with up-front compatibility checking.
///
/// Rows assign element-wise and the counts must match; scalars must share a
/// type or an implicit conversion. Either violation is `NotSupported`: this
/// is plan wiring, not data.
#[derive(Debug, Default, Clone)]
pub struct Assign {
    input: DataHolder,
    out: DataHolder,
    done: Latch,
}

impl Assign {
    /// Assigns slot `input` into slot `out`.
    pub fn new(input: i32, out: i32) -> Self {
        Assign {
            input: DataHolder::new(input),
            out: DataHolder::new(out),
            done: Latch::default(),
        }
    }
}

impl Action for Assign {
    fn explain(&self, explain: &mut Explain) {
        explain.push_no_newline();
        explain.put("assign");
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
            let source = self.input.value(program)?;
            let mut target = self.out.value_mut(program)?;
            if source.is_row() && target.is_row() {
                let source_array = source.as_array().ok_or(ExecError::Unexpected)?;
                let target_array = target.as_array_mut().ok_or(ExecError::Unexpected)?;
                if source_array.count() != target_array.count() {
                    return Err(ExecError::NotSupported);
                }
                target_array.assign_elements(source_array)?;
            } else {
                if !source.is_null()
                    && target.data_type() != DataType::Data
                    && source.data_type() != target.data_type()
                    && !(source.data_type().is_numeric() && target.data_type().is_numeric())
                {
                    return Err(ExecError::NotSupported);
                }
                let source = source.copy();
                target.assign(&source)?;
            }
            self.done.set();
        }
        Ok(Status::Success)
    }

    fn undone(&mut self) {
        self.done.clear();
    }

    fn class_id(&self) -> ClassId {
        ClassId::Assign
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

#[cfg(test)]
mod tests {
    use super::*;
    use sable_types::{DataArray, Value};

    #[test]
    fn copy_clones_value() {
        let mut program = Program::new();
        let input = program.add_variable(Value::from("abc"));
        let out = program.add_variable(Value::null_of(DataType::String));
        let mut action = Copy::new(input, out);
        action.initialize(&program).unwrap();
        action.execute(&program).unwrap();
        assert_eq!(program.variable(out).unwrap().to_string(), "abc");
    }

    #[test]
    fn assign_rows_element_wise() {
        let mut program = Program::new();
        let input = program.add_variable(Value::from(DataArray::from_values(vec![
            Value::from(1i32),
            Value::from("x"),
        ])));
        let out = program.add_variable(Value::from(DataArray::from_values(vec![
            Value::null_of(DataType::Int32),
            Value::null_of(DataType::String),
        ])));
        let mut action = Assign::new(input, out);
        action.initialize(&program).unwrap();
        action.execute(&program).unwrap();
        let out_value = program.variable(out).unwrap();
        let array = out_value.as_array().unwrap();
        assert_eq!(array.element(0).unwrap().to_i32(), Some(1));
        assert_eq!(array.element(1).unwrap().to_string(), "x");
    }

    #[test]
    fn assign_count_mismatch_fails() {
        let mut program = Program::new();
        let input = program.add_variable(Value::from(DataArray::from_values(vec![Value::from(
            1i32,
        )])));
        let out = program.add_variable(Value::from(DataArray::from_values(vec![
            Value::null(),
            Value::null(),
        ])));
        let mut action = Assign::new(input, out);
        action.initialize(&program).unwrap();
        assert_eq!(action.execute(&program), Err(ExecError::NotSupported));
    }

    #[test]
    fn assign_incompatible_scalars_fails() {
        let mut program = Program::new();
        let input = program.add_variable(Value::from("abc"));
        let out = program.add_variable(Value::from(1i32));
        let mut action = Assign::new(input, out);
        action.initialize(&program).unwrap();
        assert_eq!(action.execute(&program), Err(ExecError::NotSupported));
    }
}
