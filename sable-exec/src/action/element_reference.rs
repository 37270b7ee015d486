//! Array element access.

use sable_types::{ArchiveReader, ArchiveWriter};

use crate::action::{Action, Latch, Status};
use crate::class::ClassId;
use crate::error::ExecError;
use crate::explain::Explain;
use crate::holder::DataHolder;
use crate::program::Program;

/// `array[index]` with SQL's 1-based indexing.
#[derive(Debug, Default, Clone)]
pub struct ElementReference {
    data: DataHolder,
    index: DataHolder,
    out: DataHolder,
    done: Latch,
}

impl ElementReference {
    /// References element `index` of the array in `data`.
    pub fn new(data: i32, index: i32, out: i32) -> Self {
        ElementReference {
            data: DataHolder::new(data),
            index: DataHolder::new(index),
            out: DataHolder::new(out),
            done: Latch::default(),
        }
    }
}

impl Action for ElementReference {
    fn explain(&self, explain: &mut Explain) {
        explain.push_no_newline();
        explain.put("element");
        if explain.with_data() {
            explain.put(" ");
            self.data.explain(explain);
            explain.put("[");
            self.index.explain(explain);
            explain.put("] to ");
            self.out.explain(explain);
        }
        explain.pop_no_newline();
    }

    fn initialize(&mut self, program: &Program) -> Result<(), ExecError> {
        if !self.data.is_initialized() {
            self.data.initialize(program)?;
            self.index.initialize(program)?;
            self.out.initialize(program)?;
        }
        Ok(())
    }

    fn terminate(&mut self, _program: &Program) {
        self.data.terminate();
        self.index.terminate();
        self.out.terminate();
    }

    fn execute(&mut self, program: &Program) -> Result<Status, ExecError> {
        if !self.done.is_done() {
            let element = {
                let data = self.data.value(program)?;
                let index = self.index.value(program)?;
                if data.is_null() || index.is_null() {
                    None
                } else {
                    let array = data.as_array().ok_or(ExecError::NotSupported)?;
                    let position = index.to_i32().ok_or(ExecError::Unexpected)? - 1;
                    if position < 0 || position as usize >= array.count() {
                        return Err(ExecError::BadArrayElement);
                    }
                    Some(
                        array
                            .element(position as usize)
                            .ok_or(ExecError::Unexpected)?
                            .copy(),
                    )
                }
            };
            let mut out = self.out.value_mut(program)?;
            match element {
                Some(element) => out.assign(&element)?,
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
        ClassId::ElementReference
    }

    fn write_to(&self, writer: &mut ArchiveWriter) {
        self.data.serialize(writer);
        self.index.serialize(writer);
        self.out.serialize(writer);
    }

    fn read_payload(&mut self, reader: &mut ArchiveReader<'_>) -> Result<(), ExecError> {
        self.data = DataHolder::deserialize(reader)?;
        self.index = DataHolder::deserialize(reader)?;
        self.out = DataHolder::deserialize(reader)?;
        Ok(())
    }
}
