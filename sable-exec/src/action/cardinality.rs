//! SQL CARDINALITY.

use sable_types::{ArchiveReader, ArchiveWriter, Value};

use crate::action::{Action, Latch, Status};
use crate::class::ClassId;
use crate::error::ExecError;
use crate::explain::Explain;
use crate::holder::DataHolder;
use crate::program::Program;

/// Element count of an array value.
#[derive(Debug, Default, Clone)]
pub struct Cardinality {
    input: DataHolder,
    out: DataHolder,
    done: Latch,
}

impl Cardinality {
    /// `CARDINALITY(input)`.
    pub fn new(input: i32, out: i32) -> Self {
        Cardinality {
            input: DataHolder::new(input),
            out: DataHolder::new(out),
            done: Latch::default(),
        }
    }
}

impl Action for Cardinality {
    fn explain(&self, explain: &mut Explain) {
        explain.push_no_newline();
        explain.put("cardinality");
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
            let count = {
                let input = self.input.value(program)?;
                if input.is_null() {
                    None
                } else {
                    match input.as_array() {
                        Some(array) => Some(array.count() as i32),
                        None => return Err(ExecError::InvalidCardinality),
                    }
                }
            };
            let mut out = self.out.value_mut(program)?;
            match count {
                Some(count) => out.assign(&Value::from(count))?,
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
        ClassId::Cardinality
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
