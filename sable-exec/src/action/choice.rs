//! Value-choosing actions: GET MAX, COALESCE, NULLIF, CASE.

use itertools::Itertools;
use sable_types::{ArchiveReader, ArchiveWriter};

use crate::action::{Action, Latch, Status};
use crate::class::ClassId;
use crate::error::ExecError;
use crate::explain::Explain;
use crate::holder::DataHolder;
use crate::program::Program;

/// Maximum of the non-null operands; ties keep the earliest.
#[derive(Debug, Default, Clone)]
pub struct GetMax {
    inputs: Vec<DataHolder>,
    out: DataHolder,
    done: Latch,
}

impl GetMax {
    /// `GET MAX(inputs…)`.
    pub fn new(inputs: &[i32], out: i32) -> Self {
        GetMax {
            inputs: inputs.iter().map(|id| DataHolder::new(*id)).collect(),
            out: DataHolder::new(out),
            done: Latch::default(),
        }
    }
}

impl Action for GetMax {
    fn explain(&self, explain: &mut Explain) {
        explain.push_no_newline();
        explain.put("get max");
        if explain.with_data() {
            explain.put("(");
            explain.put(&self.inputs.iter().map(|h| format!("#{}", h.id())).join(","));
            explain.put(") to ");
            self.out.explain(explain);
        }
        explain.pop_no_newline();
    }

    fn initialize(&mut self, program: &Program) -> Result<(), ExecError> {
        if !self.out.is_initialized() {
            for input in &mut self.inputs {
                input.initialize(program)?;
            }
            self.out.initialize(program)?;
        }
        Ok(())
    }

    fn terminate(&mut self, _program: &Program) {
        for input in &mut self.inputs {
            input.terminate();
        }
        self.out.terminate();
    }

    fn execute(&mut self, program: &Program) -> Result<Status, ExecError> {
        if !self.done.is_done() {
            let best = {
                let mut best: Option<usize> = None;
                for (i, input) in self.inputs.iter().enumerate() {
                    let candidate = input.value(program)?;
                    if candidate.is_null() {
                        continue;
                    }
                    match best {
                        None => best = Some(i),
                        Some(current) => {
                            let current_value = self.inputs[current].value(program)?;
                            if candidate.compare_to(&current_value)
                                == Some(core::cmp::Ordering::Greater)
                            {
                                best = Some(i);
                            }
                        }
                    }
                }
                best.map(|i| -> Result<_, ExecError> {
                    Ok(self.inputs[i].value(program)?.copy())
                })
                .transpose()?
            };
            let mut out = self.out.value_mut(program)?;
            match best {
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
        ClassId::GetMax
    }

    fn write_to(&self, writer: &mut ArchiveWriter) {
        let ids: Vec<i32> = self.inputs.iter().map(|h| h.id()).collect();
        writer.write_vec_i32(&ids);
        self.out.serialize(writer);
    }

    fn read_payload(&mut self, reader: &mut ArchiveReader<'_>) -> Result<(), ExecError> {
        self.inputs = reader
            .read_vec_i32()?
            .into_iter()
            .map(DataHolder::new)
            .collect();
        self.out = DataHolder::deserialize(reader)?;
        Ok(())
    }
}

/// First non-null operand, with an optional default for the all-null case.
#[derive(Debug, Default, Clone)]
pub struct Coalesce {
    in0: DataHolder,
    in1: DataHolder,
    default: DataHolder,
    out: DataHolder,
    done: Latch,
}

impl Coalesce {
    /// `COALESCE(in0, in1)`.
    pub fn new(in0: i32, in1: i32, out: i32) -> Self {
        Coalesce {
            in0: DataHolder::new(in0),
            in1: DataHolder::new(in1),
            default: DataHolder::invalid(),
            out: DataHolder::new(out),
            done: Latch::default(),
        }
    }

    /// `COALESCE(in0, in1)` substituting `default` when both are null.
    pub fn with_default(in0: i32, in1: i32, default: i32, out: i32) -> Self {
        Coalesce {
            in0: DataHolder::new(in0),
            in1: DataHolder::new(in1),
            default: DataHolder::new(default),
            out: DataHolder::new(out),
            done: Latch::default(),
        }
    }
}

impl Action for Coalesce {
    fn explain(&self, explain: &mut Explain) {
        explain.push_no_newline();
        explain.put("coalesce");
        if explain.with_data() {
            explain.put("(");
            self.in0.explain(explain);
            explain.put(",");
            self.in1.explain(explain);
            if self.default.is_valid() {
                explain.put(",");
                self.default.explain(explain);
            }
            explain.put(") to ");
            self.out.explain(explain);
        }
        explain.pop_no_newline();
    }

    fn initialize(&mut self, program: &Program) -> Result<(), ExecError> {
        if !self.in0.is_initialized() {
            self.in0.initialize(program)?;
            self.in1.initialize(program)?;
            self.default.initialize(program)?;
            self.out.initialize(program)?;
        }
        Ok(())
    }

    fn terminate(&mut self, _program: &Program) {
        self.in0.terminate();
        self.in1.terminate();
        self.default.terminate();
        self.out.terminate();
    }

    fn execute(&mut self, program: &Program) -> Result<Status, ExecError> {
        if !self.done.is_done() {
            let chosen = {
                let in0 = self.in0.value(program)?;
                if !in0.is_null() {
                    Some(in0.copy())
                } else {
                    drop(in0);
                    let in1 = self.in1.value(program)?;
                    if !in1.is_null() {
                        Some(in1.copy())
                    } else if self.default.is_valid() {
                        drop(in1);
                        Some(self.default.value(program)?.copy())
                    } else {
                        None
                    }
                }
            };
            let mut out = self.out.value_mut(program)?;
            match chosen {
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
        if self.default.is_valid() {
            ClassId::CoalesceDefault
        } else {
            ClassId::Coalesce
        }
    }

    fn write_to(&self, writer: &mut ArchiveWriter) {
        self.in0.serialize(writer);
        self.in1.serialize(writer);
        self.default.serialize(writer);
        self.out.serialize(writer);
    }

    fn read_payload(&mut self, reader: &mut ArchiveReader<'_>) -> Result<(), ExecError> {
        self.in0 = DataHolder::deserialize(reader)?;
        self.in1 = DataHolder::deserialize(reader)?;
        self.default = DataHolder::deserialize(reader)?;
        self.out = DataHolder::deserialize(reader)?;
        Ok(())
    }
}

/// NULL when the operands are equal, the first operand otherwise.
#[derive(Debug, Default, Clone)]
pub struct NullIf {
    in0: DataHolder,
    in1: DataHolder,
    out: DataHolder,
    done: Latch,
}

impl NullIf {
    /// `NULLIF(in0, in1)`.
    pub fn new(in0: i32, in1: i32, out: i32) -> Self {
        NullIf {
            in0: DataHolder::new(in0),
            in1: DataHolder::new(in1),
            out: DataHolder::new(out),
            done: Latch::default(),
        }
    }
}

impl Action for NullIf {
    fn explain(&self, explain: &mut Explain) {
        explain.push_no_newline();
        explain.put("nullif");
        if explain.with_data() {
            explain.put("(");
            self.in0.explain(explain);
            explain.put(",");
            self.in1.explain(explain);
            explain.put(") to ");
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
                if in0.equals(&in1) {
                    None
                } else {
                    Some(in0.copy())
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
        ClassId::NullIf
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

/// One branch of a CASE expression.
#[derive(Debug, Default, Clone, Copy)]
pub struct CaseBranch {
    /// Searched form: a boolean condition slot. Simple form: a comparison
    /// value matched against the CASE operand.
    pub when: DataHolder,
    /// Result slot selected when the branch fires.
    pub then: DataHolder,
}

/// CASE, in both the searched and the simple form.
#[derive(Debug, Default, Clone)]
pub struct Case {
    operand: DataHolder,
    branches: Vec<CaseBranch>,
    otherwise: DataHolder,
    out: DataHolder,
    done: Latch,
}

impl Case {
    /// `CASE WHEN cond THEN value … [ELSE value] END`.
    pub fn searched(branches: Vec<(i32, i32)>, otherwise: Option<i32>, out: i32) -> Self {
        Case {
            operand: DataHolder::invalid(),
            branches: branches
                .into_iter()
                .map(|(when, then)| CaseBranch {
                    when: DataHolder::new(when),
                    then: DataHolder::new(then),
                })
                .collect(),
            otherwise: otherwise.map(DataHolder::new).unwrap_or_default(),
            out: DataHolder::new(out),
            done: Latch::default(),
        }
    }

    /// `CASE operand WHEN value THEN value … [ELSE value] END`.
    pub fn simple(
        operand: i32,
        branches: Vec<(i32, i32)>,
        otherwise: Option<i32>,
        out: i32,
    ) -> Self {
        let mut case = Case::searched(branches, otherwise, out);
        case.operand = DataHolder::new(operand);
        case
    }

    fn branch_fires(&self, program: &Program, branch: &CaseBranch) -> Result<bool, ExecError> {
        let when = branch.when.value(program)?;
        if self.operand.is_valid() {
            let operand = self.operand.value(program)?;
            Ok(operand.equals(&when))
        } else {
            Ok(when.as_bool().unwrap_or(false) && !when.is_null())
        }
    }
}

impl Action for Case {
    fn explain(&self, explain: &mut Explain) {
        explain.push_no_newline();
        explain.put("case");
        if explain.with_data() {
            if self.operand.is_valid() {
                explain.put(" ");
                self.operand.explain(explain);
            }
            for branch in &self.branches {
                explain.put(" when ");
                branch.when.explain(explain);
                explain.put(" then ");
                branch.then.explain(explain);
            }
            if self.otherwise.is_valid() {
                explain.put(" else ");
                self.otherwise.explain(explain);
            }
            explain.put(" to ");
            self.out.explain(explain);
        }
        explain.pop_no_newline();
    }

    fn initialize(&mut self, program: &Program) -> Result<(), ExecError> {
        if !self.out.is_initialized() {
            self.operand.initialize(program)?;
            for branch in &mut self.branches {
                branch.when.initialize(program)?;
                branch.then.initialize(program)?;
            }
            self.otherwise.initialize(program)?;
            self.out.initialize(program)?;
        }
        Ok(())
    }

    fn terminate(&mut self, _program: &Program) {
        self.operand.terminate();
        for branch in &mut self.branches {
            branch.when.terminate();
            branch.then.terminate();
        }
        self.otherwise.terminate();
        self.out.terminate();
    }

    fn execute(&mut self, program: &Program) -> Result<Status, ExecError> {
        if !self.done.is_done() {
            let mut chosen = None;
            for branch in &self.branches {
                if self.branch_fires(program, branch)? {
                    chosen = Some(branch.then.value(program)?.copy());
                    break;
                }
            }
            if chosen.is_none() && self.otherwise.is_valid() {
                chosen = Some(self.otherwise.value(program)?.copy());
            }
            let mut out = self.out.value_mut(program)?;
            match chosen {
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
        if self.operand.is_valid() {
            ClassId::CaseSimple
        } else {
            ClassId::CaseSearched
        }
    }

    fn write_to(&self, writer: &mut ArchiveWriter) {
        self.operand.serialize(writer);
        writer.write_len(self.branches.len());
        for branch in &self.branches {
            branch.when.serialize(writer);
            branch.then.serialize(writer);
        }
        self.otherwise.serialize(writer);
        self.out.serialize(writer);
    }

    fn read_payload(&mut self, reader: &mut ArchiveReader<'_>) -> Result<(), ExecError> {
        self.operand = DataHolder::deserialize(reader)?;
        let count = reader.read_len()?;
        self.branches = (0..count)
            .map(|_| -> Result<CaseBranch, ExecError> {
                Ok(CaseBranch {
                    when: DataHolder::deserialize(reader)?,
                    then: DataHolder::deserialize(reader)?,
                })
            })
            .collect::<Result<_, _>>()?;
        self.otherwise = DataHolder::deserialize(reader)?;
        self.out = DataHolder::deserialize(reader)?;
        Ok(())
    }
}
