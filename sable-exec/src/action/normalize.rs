//! Text normalization and synonym expansion over the program's normalizer.

use sable_norm::OutputMode;
use sable_types::{ArchiveReader, ArchiveWriter, DataArray, Value};

use crate::action::{Action, Latch, Status};
use crate::class::ClassId;
use crate::error::ExecError;
use crate::explain::Explain;
use crate::holder::DataHolder;
use crate::program::Program;

/// Option code requesting both-mode output from Normalize.
const OPTION_BOTH: i32 = 2;

/// Option code requesting the containment check from ExpandSynonym.
const OPTION_CHECK_ORIGINAL: i32 = 1;

/// Rewrites a string through the normalizer.
#[derive(Debug, Default, Clone)]
pub struct Normalize {
    data: DataHolder,
    option: DataHolder,
    out: DataHolder,
    done: Latch,
}

impl Normalize {
    /// `NORMALIZE(data, option)`; the option selects the output mode.
    pub fn new(data: i32, option: i32, out: i32) -> Self {
        Normalize {
            data: DataHolder::new(data),
            option: DataHolder::new(option),
            out: DataHolder::new(out),
            done: Latch::default(),
        }
    }
}

impl Action for Normalize {
    fn explain(&self, explain: &mut Explain) {
        explain.push_no_newline();
        explain.put("normalize");
        if explain.with_data() {
            explain.put(" ");
            self.data.explain(explain);
            explain.put(" to ");
            self.out.explain(explain);
        }
        explain.pop_no_newline();
    }

    fn initialize(&mut self, program: &Program) -> Result<(), ExecError> {
        if !self.data.is_initialized() {
            self.data.initialize(program)?;
            self.option.initialize(program)?;
            self.out.initialize(program)?;
        }
        Ok(())
    }

    fn terminate(&mut self, _program: &Program) {
        self.data.terminate();
        self.option.terminate();
        self.out.terminate();
    }

    fn execute(&mut self, program: &Program) -> Result<Status, ExecError> {
        if !self.done.is_done() {
            let result = {
                let data = self.data.value(program)?;
                let option = self.option.value(program)?;
                if data.is_null() || option.is_null() {
                    None
                } else {
                    let source = data.as_str16().ok_or(ExecError::NotSupported)?;
                    let mode = if option.to_i32() == Some(OPTION_BOTH) {
                        OutputMode::Both
                    } else {
                        OutputMode::Normalized
                    };
                    let normalizer = program.normalizer()?;
                    let normalized = normalizer
                        .borrow()
                        .normalize(source, mode)
                        .map_err(|_| ExecError::Unexpected)?;
                    Some(Value::from(normalized))
                }
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

    fn undone(&mut self) {
        self.done.clear();
    }

    fn class_id(&self) -> ClassId {
        ClassId::Normalize
    }

    fn write_to(&self, writer: &mut ArchiveWriter) {
        self.data.serialize(writer);
        self.option.serialize(writer);
        self.out.serialize(writer);
    }

    fn read_payload(&mut self, reader: &mut ArchiveReader<'_>) -> Result<(), ExecError> {
        self.data = DataHolder::deserialize(reader)?;
        self.option = DataHolder::deserialize(reader)?;
        self.out = DataHolder::deserialize(reader)?;
        Ok(())
    }
}

/// Expands a string into its synonym alternatives.
#[derive(Debug, Default, Clone)]
pub struct ExpandSynonym {
    data: DataHolder,
    option: DataHolder,
    out: DataHolder,
    done: Latch,
}

impl ExpandSynonym {
    /// `EXPAND_SYNONYM(data, option)`; the option toggles the containment
    /// filter.
    pub fn new(data: i32, option: i32, out: i32) -> Self {
        ExpandSynonym {
            data: DataHolder::new(data),
            option: DataHolder::new(option),
            out: DataHolder::new(out),
            done: Latch::default(),
        }
    }
}

impl Action for ExpandSynonym {
    fn explain(&self, explain: &mut Explain) {
        explain.push_no_newline();
        explain.put("expand_synonym");
        if explain.with_data() {
            explain.put(" ");
            self.data.explain(explain);
            explain.put(" to ");
            self.out.explain(explain);
        }
        explain.pop_no_newline();
    }

    fn initialize(&mut self, program: &Program) -> Result<(), ExecError> {
        if !self.data.is_initialized() {
            self.data.initialize(program)?;
            self.option.initialize(program)?;
            self.out.initialize(program)?;
        }
        Ok(())
    }

    fn terminate(&mut self, _program: &Program) {
        self.data.terminate();
        self.option.terminate();
        self.out.terminate();
    }

    fn execute(&mut self, program: &Program) -> Result<Status, ExecError> {
        if !self.done.is_done() {
            let result = {
                let data = self.data.value(program)?;
                let option = self.option.value(program)?;
                if data.is_null() || option.is_null() {
                    None
                } else {
                    let source = data.as_str16().ok_or(ExecError::NotSupported)?;
                    let check = option.to_i32() == Some(OPTION_CHECK_ORIGINAL);
                    let normalizer = program.normalizer()?;
                    let alternatives = normalizer
                        .borrow()
                        .expand(source, check, false)
                        .map_err(|_| ExecError::Unexpected)?;
                    Some(Value::from(
                        alternatives
                            .into_iter()
                            .map(Value::from)
                            .collect::<DataArray>(),
                    ))
                }
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

    fn undone(&mut self) {
        self.done.clear();
    }

    fn class_id(&self) -> ClassId {
        ClassId::ExpandSynonym
    }

    fn write_to(&self, writer: &mut ArchiveWriter) {
        self.data.serialize(writer);
        self.option.serialize(writer);
        self.out.serialize(writer);
    }

    fn read_payload(&mut self, reader: &mut ArchiveReader<'_>) -> Result<(), ExecError> {
        self.data = DataHolder::deserialize(reader)?;
        self.option = DataHolder::deserialize(reader)?;
        self.out = DataHolder::deserialize(reader)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_norm::{IdentityRules, MapRules, NormRule, Normalizer};
    use sable_types::DataType;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;

    fn kana_program() -> Program {
        let rule = Arc::new(
            NormRule::builder()
                .pre(0xFF71, 0x30A2)
                .pre(0xFF92, 0x30E1)
                .pre(0xFF98, 0x30EA)
                .pre(0xFF76, 0x30AB)
                .build(),
        );
        let mut expand = MapRules::new();
        expand.insert("アメリカ", "(アメリカ,米国)");
        let normalizer = Normalizer::new(rule, Box::new(IdentityRules), Box::new(expand));
        let mut program = Program::new();
        program.set_normalizer(Rc::new(RefCell::new(normalizer)));
        program
    }

    #[test]
    fn normalize_folds_half_width_kana() {
        let mut program = kana_program();
        let data = program.add_variable(Value::from("ｱﾒﾘｶ"));
        let option = program.add_variable(Value::from(0i32));
        let out = program.add_variable(Value::null_of(DataType::String));
        let mut action = Normalize::new(data, option, out);
        action.initialize(&program).unwrap();
        action.execute(&program).unwrap();
        assert_eq!(program.variable(out).unwrap().to_string(), "アメリカ");
    }

    #[test]
    fn null_option_yields_null() {
        let mut program = kana_program();
        let data = program.add_variable(Value::from("x"));
        let option = program.add_variable(Value::null_of(DataType::Int32));
        let out = program.add_variable(Value::from("y"));
        let mut action = Normalize::new(data, option, out);
        action.initialize(&program).unwrap();
        action.execute(&program).unwrap();
        assert!(program.variable(out).unwrap().is_null());
    }

    #[test]
    fn expansion_returns_alternative_array() {
        let mut program = kana_program();
        let data = program.add_variable(Value::from("ｱﾒﾘｶ"));
        let option = program.add_variable(Value::from(0i32));
        let out = program.add_variable(Value::null_of(DataType::Array));
        let mut action = ExpandSynonym::new(data, option, out);
        action.initialize(&program).unwrap();
        action.execute(&program).unwrap();
        let out_value = program.variable(out).unwrap();
        let array = out_value.as_array().unwrap();
        assert_eq!(array.count(), 2);
        assert_eq!(array.element(0).unwrap().to_string(), "アメリカ");
        assert_eq!(array.element(1).unwrap().to_string(), "米国");
    }

    #[test]
    fn missing_normalizer_fails() {
        let mut program = Program::new();
        let data = program.add_variable(Value::from("x"));
        let option = program.add_variable(Value::from(0i32));
        let out = program.add_variable(Value::null_of(DataType::String));
        let mut action = Normalize::new(data, option, out);
        action.initialize(&program).unwrap();
        assert_eq!(action.execute(&program), Err(ExecError::NotInitialized));
    }
}
