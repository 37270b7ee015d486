//! CURRENT_TIMESTAMP.

use sable_types::{ArchiveReader, ArchiveWriter, DateTime, Value};

use crate::action::{Action, Latch, Status};
use crate::class::ClassId;
use crate::error::ExecError;
use crate::explain::Explain;
use crate::holder::DataHolder;
use crate::program::Program;

/// Writes the system clock into the out slot once per row.
#[derive(Debug, Default, Clone)]
pub struct CurrentTimestamp {
    out: DataHolder,
    done: Latch,
}

impl CurrentTimestamp {
    /// `CURRENT_TIMESTAMP` into `out`.
    pub fn new(out: i32) -> Self {
        CurrentTimestamp {
            out: DataHolder::new(out),
            done: Latch::default(),
        }
    }
}

impl Action for CurrentTimestamp {
    fn explain(&self, explain: &mut Explain) {
        explain.push_no_newline();
        explain.put("current_timestamp");
        if explain.with_data() {
            explain.put(" to ");
            self.out.explain(explain);
        }
        explain.pop_no_newline();
    }

    fn initialize(&mut self, program: &Program) -> Result<(), ExecError> {
        if !self.out.is_initialized() {
            self.out.initialize(program)?;
        }
        Ok(())
    }

    fn terminate(&mut self, _program: &Program) {
        self.out.terminate();
    }

    fn execute(&mut self, program: &Program) -> Result<Status, ExecError> {
        if !self.done.is_done() {
            self.out
                .value_mut(program)?
                .assign(&Value::from(DateTime::now()))?;
            self.done.set();
        }
        Ok(Status::Success)
    }

    fn undone(&mut self) {
        self.done.clear();
    }

    fn class_id(&self) -> ClassId {
        ClassId::CurrentTimestamp
    }

    fn write_to(&self, writer: &mut ArchiveWriter) {
        self.out.serialize(writer);
    }

    fn read_payload(&mut self, reader: &mut ArchiveReader<'_>) -> Result<(), ExecError> {
        self.out = DataHolder::deserialize(reader)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_types::DataType;

    #[test]
    fn writes_a_timestamp_once_per_row() {
        let mut program = Program::new();
        let out = program.add_variable(Value::null_of(DataType::DateTime));
        let mut action = CurrentTimestamp::new(out);
        action.initialize(&program).unwrap();
        action.execute(&program).unwrap();
        let first = program.variable(out).unwrap().copy();
        assert!(!first.is_null());

        // Memoized within the row.
        action.execute(&program).unwrap();
        assert_eq!(program.variable(out).unwrap().copy(), first);
    }
}
