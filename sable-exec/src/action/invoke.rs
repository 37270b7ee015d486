//! Stored-function invocation.

use sable_types::{ArchiveReader, ArchiveWriter, Utf16String};

use crate::action::{Action, Latch, Status};
use crate::class::ClassId;
use crate::error::ExecError;
use crate::explain::Explain;
use crate::holder::DataHolder;
use crate::program::Program;
use crate::routine::Routine;

/// Calls a stored routine by name, one step per row.
///
/// The routine is resolved and initialized at action initialize; each execute
/// steps it once with the operand array as its parameters and assigns the
/// output (or null) into the out slot. Finish, reset, and terminate forward
/// to the routine.
#[derive(Default)]
pub struct Invoke {
    name: Utf16String,
    operand: DataHolder,
    out: DataHolder,
    routine: Option<Box<dyn Routine>>,
    done: Latch,
}

impl std::fmt::Debug for Invoke {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invoke")
            .field("name", &self.name.to_string())
            .field("resolved", &self.routine.is_some())
            .finish()
    }
}

impl Invoke {
    /// `name(operand…)` into `out`.
    pub fn new(name: &str, operand: i32, out: i32) -> Self {
        Invoke {
            name: Utf16String::from(name),
            operand: DataHolder::new(operand),
            out: DataHolder::new(out),
            routine: None,
            done: Latch::default(),
        }
    }
}

impl Action for Invoke {
    fn explain(&self, explain: &mut Explain) {
        explain.push_no_newline();
        explain.put("invoke ");
        explain.put(&self.name.to_string());
        if explain.with_data() {
            explain.put(" ");
            self.operand.explain(explain);
            explain.put(" to ");
            self.out.explain(explain);
        }
        explain.pop_no_newline();
    }

    fn initialize(&mut self, program: &Program) -> Result<(), ExecError> {
        if !self.out.is_initialized() {
            if self.routine.is_none() {
                let mut routine = program.resolve_routine(&self.name.to_string())?;
                routine.initialize(program)?;
                self.routine = Some(routine);
            }
            self.operand.initialize(program)?;
            self.out.initialize(program)?;
        }
        Ok(())
    }

    fn terminate(&mut self, _program: &Program) {
        if let Some(routine) = &mut self.routine {
            routine.terminate();
        }
        self.routine = None;
        self.operand.terminate();
        self.out.terminate();
    }

    fn execute(&mut self, program: &Program) -> Result<Status, ExecError> {
        if !self.done.is_done() {
            let routine = self.routine.as_mut().ok_or(ExecError::NotInitialized)?;
            let result = {
                let operand = self.operand.value(program)?;
                let arguments = operand.as_array().ok_or(ExecError::NotSupported)?;
                routine.step(arguments)?
            };
            let mut out = self.out.value_mut(program)?;
            match result {
                Some(value) => out.assign(&value)?,
                None => out.set_null(),
            }
            self.done.set();
        }
        Ok(Status::Success)
    }

    fn finish(&mut self, _program: &Program) -> Result<(), ExecError> {
        if let Some(routine) = &mut self.routine {
            routine.finish();
        }
        Ok(())
    }

    fn reset(&mut self, _program: &Program) -> Result<(), ExecError> {
        if let Some(routine) = &mut self.routine {
            routine.reset();
        }
        Ok(())
    }

    fn undone(&mut self) {
        self.done.clear();
    }

    fn class_id(&self) -> ClassId {
        ClassId::Invoke
    }

    fn write_to(&self, writer: &mut ArchiveWriter) {
        writer.write_str16(&self.name);
        self.operand.serialize(writer);
        self.out.serialize(writer);
    }

    fn read_payload(&mut self, reader: &mut ArchiveReader<'_>) -> Result<(), ExecError> {
        self.name = reader.read_str16()?;
        self.operand = DataHolder::deserialize(reader)?;
        self.out = DataHolder::deserialize(reader)?;
        Ok(())
    }
}
