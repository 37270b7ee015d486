//! Arithmetic over one or two operands.

use sable_types::{ArchiveReader, ArchiveWriter, Operation, Value};

use crate::action::{Action, Latch, Status};
use crate::class::ClassId;
use crate::error::ExecError;
use crate::explain::Explain;
use crate::holder::DataHolder;
use crate::program::Program;

/// Monadic or dyadic arithmetic writing into an out slot.
///
/// Any null operand yields a null result. When the operation overflows, the
/// program's overflow-as-null policy decides between a null result and
/// [`ExecError::NumericValueOutOfRange`].
#[derive(Debug, Clone)]
pub struct Arithmetic {
    operation: Operation,
    in0: DataHolder,
    in1: DataHolder,
    out: DataHolder,
    done: Latch,
}

impl Default for Arithmetic {
    fn default() -> Self {
        Arithmetic {
            operation: Operation::Addition,
            in0: DataHolder::invalid(),
            in1: DataHolder::invalid(),
            out: DataHolder::invalid(),
            done: Latch::default(),
        }
    }
}

impl Arithmetic {
    /// A single-operand operation (negation, absolute value).
    pub fn monadic(operation: Operation, in0: i32, out: i32) -> Self {
        Arithmetic {
            operation,
            in0: DataHolder::new(in0),
            in1: DataHolder::invalid(),
            out: DataHolder::new(out),
            done: Latch::default(),
        }
    }

    /// A two-operand operation.
    pub fn dyadic(operation: Operation, in0: i32, in1: i32, out: i32) -> Self {
        Arithmetic {
            operation,
            in0: DataHolder::new(in0),
            in1: DataHolder::new(in1),
            out: DataHolder::new(out),
            done: Latch::default(),
        }
    }

    fn calculate(&self, program: &Program) -> Result<(), ExecError> {
        let result = {
            let in0 = self.in0.value(program)?;
            if self.in1.is_valid() {
                let in1 = self.in1.value(program)?;
                if in0.is_null() || in1.is_null() {
                    None
                } else {
                    Some(in0.operate_with(self.operation, Some(&in1))?)
                }
            } else if in0.is_null() {
                None
            } else {
                Some(in0.operate_with(self.operation, None)?)
            }
        };
        let mut out = self.out.value_mut(program)?;
        match result {
            None => out.set_null(),
            Some(Some(value)) => out.assign(&value)?,
            Some(None) => {
                if program.config().overflow_as_null {
                    out.set_null();
                } else {
                    return Err(ExecError::NumericValueOutOfRange);
                }
            }
        }
        Ok(())
    }
}

impl Action for Arithmetic {
    fn explain(&self, explain: &mut Explain) {
        explain.push_no_newline();
        if self.in1.is_valid() {
            if explain.with_data() {
                self.in0.explain(explain);
                explain.put(" ");
            }
            explain.put(&self.operation.to_string());
            if explain.with_data() {
                explain.put(" ");
                self.in1.explain(explain);
                explain.put(" to ");
                self.out.explain(explain);
            }
        } else {
            explain.put(&self.operation.to_string());
            if explain.with_data() {
                explain.put(" ");
                self.in0.explain(explain);
                explain.put(" to ");
                self.out.explain(explain);
            }
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
            self.calculate(program)?;
            self.done.set();
        }
        Ok(Status::Success)
    }

    fn undone(&mut self) {
        self.done.clear();
    }

    fn class_id(&self) -> ClassId {
        if self.in1.is_valid() {
            ClassId::ArithmeticDyadic
        } else {
            ClassId::ArithmeticMonadic
        }
    }

    fn write_to(&self, writer: &mut ArchiveWriter) {
        writer.write_i32(self.operation as i32);
        self.in0.serialize(writer);
        self.in1.serialize(writer);
        self.out.serialize(writer);
    }

    fn read_payload(&mut self, reader: &mut ArchiveReader<'_>) -> Result<(), ExecError> {
        self.operation =
            Operation::from_code(reader.read_i32()?).ok_or(ExecError::BadArgument)?;
        self.in0 = DataHolder::deserialize(reader)?;
        self.in1 = DataHolder::deserialize(reader)?;
        self.out = DataHolder::deserialize(reader)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_types::DataType;

    fn run(action: &mut Arithmetic, program: &Program) -> Result<Status, ExecError> {
        action.initialize(program)?;
        action.execute(program)
    }

    #[test]
    fn addition() {
        let mut program = Program::new();
        let a = program.add_variable(Value::from(2i32));
        let b = program.add_variable(Value::from(3i32));
        let out = program.add_variable(Value::null_of(DataType::Int32));
        let mut action = Arithmetic::dyadic(Operation::Addition, a, b, out);
        run(&mut action, &program).unwrap();
        assert_eq!(program.variable(out).unwrap().to_i32(), Some(5));
    }

    #[test]
    fn null_operand_yields_null() {
        let mut program = Program::new();
        let a = program.add_variable(Value::null_of(DataType::Int32));
        let b = program.add_variable(Value::from(3i32));
        let out = program.add_variable(Value::from(9i32));
        let mut action = Arithmetic::dyadic(Operation::Multiplication, a, b, out);
        run(&mut action, &program).unwrap();
        assert!(program.variable(out).unwrap().is_null());
    }

    #[test]
    fn overflow_raises_by_default() {
        let mut program = Program::new();
        let a = program.add_variable(Value::from(i32::MAX));
        let b = program.add_variable(Value::from(1i32));
        let out = program.add_variable(Value::null_of(DataType::Int32));
        let mut action = Arithmetic::dyadic(Operation::Addition, a, b, out);
        assert_eq!(
            run(&mut action, &program),
            Err(ExecError::NumericValueOutOfRange)
        );
    }

    #[test]
    fn overflow_as_null_policy() {
        let mut program = Program::new();
        program.config_mut().overflow_as_null = true;
        let a = program.add_variable(Value::from(i32::MAX));
        let b = program.add_variable(Value::from(1i32));
        let out = program.add_variable(Value::from(0i32));
        let mut action = Arithmetic::dyadic(Operation::Addition, a, b, out);
        run(&mut action, &program).unwrap();
        assert!(program.variable(out).unwrap().is_null());
    }

    #[test]
    fn monadic_negation() {
        let mut program = Program::new();
        let a = program.add_variable(Value::from(4i32));
        let out = program.add_variable(Value::null_of(DataType::Int32));
        let mut action = Arithmetic::monadic(Operation::Negation, a, out);
        run(&mut action, &program).unwrap();
        assert_eq!(program.variable(out).unwrap().to_i32(), Some(-4));
    }

    #[test]
    fn done_latch_memoizes_until_undone() {
        let mut program = Program::new();
        let a = program.add_variable(Value::from(1i32));
        let b = program.add_variable(Value::from(1i32));
        let out = program.add_variable(Value::null_of(DataType::Int32));
        let mut action = Arithmetic::dyadic(Operation::Addition, a, b, out);
        run(&mut action, &program).unwrap();

        // Change an input; the latched action must not recompute.
        program
            .variable_mut(a)
            .unwrap()
            .assign(&Value::from(10i32))
            .unwrap();
        action.execute(&program).unwrap();
        assert_eq!(program.variable(out).unwrap().to_i32(), Some(2));

        action.undone();
        action.execute(&program).unwrap();
        assert_eq!(program.variable(out).unwrap().to_i32(), Some(11));
    }
}
