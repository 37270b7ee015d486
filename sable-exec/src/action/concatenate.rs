//! String, binary, and array concatenation.

use sable_types::{ArchiveReader, ArchiveWriter, DataType, Value};

use crate::action::{Action, Latch, Status};
use crate::class::ClassId;
use crate::error::ExecError;
use crate::explain::Explain;
use crate::holder::DataHolder;
use crate::program::Program;

/// Compile-time container selection; `Any` dispatches at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcatKind {
    /// Both operands are strings.
    String,
    /// Both operands are binaries.
    Binary,
    /// Both operands are arrays.
    Array,
    /// Operand kind decided per row.
    Any,
}

impl Default for ConcatKind {
    fn default() -> Self {
        ConcatKind::Any
    }
}

/// Appends the second operand to the first.
#[derive(Debug, Default, Clone)]
pub struct Concatenate {
    kind: ConcatKind,
    in0: DataHolder,
    in1: DataHolder,
    out: DataHolder,
    done: Latch,
}

impl Concatenate {
    /// `in0 || in1` with the given container selection.
    pub fn new(kind: ConcatKind, in0: i32, in1: i32, out: i32) -> Self {
        Concatenate {
            kind,
            in0: DataHolder::new(in0),
            in1: DataHolder::new(in1),
            out: DataHolder::new(out),
            done: Latch::default(),
        }
    }

    pub(crate) fn with_kind(kind: ConcatKind) -> Self {
        Concatenate {
            kind,
            ..Concatenate::default()
        }
    }

    fn expected_type(&self) -> Option<DataType> {
        match self.kind {
            ConcatKind::String => Some(DataType::String),
            ConcatKind::Binary => Some(DataType::Binary),
            ConcatKind::Array => Some(DataType::Array),
            ConcatKind::Any => None,
        }
    }
}

impl Action for Concatenate {
    fn explain(&self, explain: &mut Explain) {
        explain.push_no_newline();
        if explain.with_data() {
            self.in0.explain(explain);
            explain.put(" ");
        }
        explain.put("||");
        if explain.with_data() {
            explain.put(" ");
            self.in1.explain(explain);
            explain.put(" to ");
            self.out.explain(explain);
        }
        explain.pop_no_newline();
    }

    fn initialize(&mut self, program: &Program) -> Result<(), ExecError> {
        if !self.in0.is_initialized() {
            self.in0.initialize(program)?;
            self.in1.initialize(program)?;
            self.out.initialize(program)?;
        }
        Ok(())
    }

    fn terminate(&mut self, _program: &Program) {
        self.in0.terminate();
        self.in1.terminate();
        self.out.terminate();
    }

    fn execute(&mut self, program: &Program) -> Result<Status, ExecError> {
        if !self.done.is_done() {
            let result = {
                let in0 = self.in0.value(program)?;
                let in1 = self.in1.value(program)?;
                if in0.is_null() || in1.is_null() {
                    None
                } else {
                    if in0.data_type() != in1.data_type() {
                        return Err(ExecError::NotCompatible);
                    }
                    if let Some(expected) = self.expected_type() {
                        if in0.data_type() != expected {
                            return Err(ExecError::NotCompatible);
                        }
                    }
                    match in0.data_type() {
                        DataType::String => {
                            let mut s = in0.as_str16().ok_or(ExecError::Unexpected)?.clone();
                            s.connect(in1.as_str16().ok_or(ExecError::Unexpected)?);
                            Some(Value::from(s))
                        }
                        DataType::Binary => {
                            let mut b = in0.as_binary().ok_or(ExecError::Unexpected)?.clone();
                            b.extend_from_slice(in1.as_binary().ok_or(ExecError::Unexpected)?);
                            Some(Value::from(b))
                        }
                        DataType::Array => {
                            let mut a = in0.as_array().ok_or(ExecError::Unexpected)?.clone();
                            a.connect(in1.as_array().ok_or(ExecError::Unexpected)?);
                            Some(Value::from(a))
                        }
                        _ => return Err(ExecError::NotSupported),
                    }
                }
            };
            let mut out = self.out.value_mut(program)?;
            match result {
                Some(result) => out.assign(&result)?,
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
            ConcatKind::String => ClassId::ConcatenateString,
            ConcatKind::Binary => ClassId::ConcatenateBinary,
            ConcatKind::Array => ClassId::ConcatenateArray,
            ConcatKind::Any => ClassId::ConcatenateAnyType,
        }
    }

    fn write_to(&self, writer: &mut ArchiveWriter) {
        self.in0.serialize(writer);
        self.in1.serialize(writer);
        self.out.serialize(writer);
    }

    fn read_payload(&mut self, reader: &mut ArchiveReader<'_>) -> Result<(), ExecError> {
        self.in0 = DataHolder::deserialize(reader)?;
        self.in1 = DataHolder::deserialize(reader)?;
        self.out = DataHolder::deserialize(reader)?;
        Ok(())
    }
}
