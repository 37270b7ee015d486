//! Streaming group-boundary detection.

use itertools::Itertools;
use sable_types::{ArchiveReader, ArchiveWriter, Value};
use tracing::trace;

use crate::class::ClassId;
use crate::collection::{assign_into_row, expect_row, Collection};
use crate::error::ExecError;
use crate::explain::Explain;
use crate::program::Program;
use sable_types::DataArray;

/// Holds the two most recent rows and reports group-key transitions.
///
/// `put_data` stores the new row as the second of the pair and answers
/// whether the group changed; `shift` slides the window; `get_data` consumes
/// the first row. With no keys and no distribute flag the collection is a
/// single-group pass-through.
#[derive(Debug, Default)]
pub struct Grouping {
    key_positions: Vec<i32>,
    distribute: bool,
    first: Option<DataArray>,
    second: Option<DataArray>,
}

impl Grouping {
    /// A grouping over `key_positions`.
    pub fn new(key_positions: Vec<i32>, distribute: bool) -> Self {
        Grouping {
            key_positions,
            distribute,
            first: None,
            second: None,
        }
    }

    fn shift_data(&mut self) -> Option<DataArray> {
        let result = self.first.take();
        self.first = self.second.take();
        result
    }

    fn group_changed(&self) -> Result<bool, ExecError> {
        let (Some(first), Some(second)) = (&self.first, &self.second) else {
            // Fewer than two rows: ask for more input.
            return Ok(false);
        };
        for position in &self.key_positions {
            let position = usize::try_from(*position).map_err(|_| ExecError::Unexpected)?;
            let a = first.element(position).ok_or(ExecError::Unexpected)?;
            let b = second.element(position).ok_or(ExecError::Unexpected)?;
            if a.compare_total(b) != core::cmp::Ordering::Equal {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Collection for Grouping {
    fn explain(&self, explain: &mut Explain) {
        explain.put("grouping(");
        explain.put(&self.key_positions.iter().join(","));
        explain.put(")");
    }

    fn initialize(&mut self, _program: &Program) -> Result<(), ExecError> {
        Ok(())
    }

    fn terminate(&mut self, _program: &Program) {
        self.clear();
    }

    fn clear(&mut self) {
        self.first = None;
        self.second = None;
    }

    fn is_empty(&self) -> bool {
        self.first.is_none() && self.second.is_none()
    }

    fn is_empty_grouping(&self) -> bool {
        self.key_positions.is_empty() && !self.distribute
    }

    fn class_id(&self) -> ClassId {
        ClassId::GroupingCollection
    }

    fn write_to(&self, writer: &mut ArchiveWriter) {
        writer.write_bool(self.distribute);
        writer.write_vec_i32(&self.key_positions);
    }

    fn read_payload(&mut self, reader: &mut ArchiveReader<'_>) -> Result<(), ExecError> {
        self.distribute = reader.read_bool()?;
        self.key_positions = reader.read_vec_i32()?;
        Ok(())
    }

    fn put_data(&mut self, _program: &Program, row: &Value) -> Result<bool, ExecError> {
        let row = expect_row(row)?.clone();
        trace!(keys = self.key_positions.len(), "grouping put");
        self.second = Some(row);
        self.group_changed()
    }

    fn put_finish(&mut self, _program: &Program) -> Result<(), ExecError> {
        Ok(())
    }

    fn shift(&mut self, _program: &Program) -> Result<(), ExecError> {
        self.shift_data();
        Ok(())
    }

    fn get_data(&mut self, _program: &Program, row: &mut Value) -> Result<bool, ExecError> {
        match self.shift_data() {
            Some(front) => {
                assign_into_row(row, &front)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn reset_get(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_types::DataType;

    fn row(key: i32, tag: &str) -> Value {
        Value::from(DataArray::from_values(vec![
            Value::from(key),
            Value::from(tag),
        ]))
    }

    fn out_row() -> Value {
        Value::from(DataArray::from_values(vec![
            Value::null_of(DataType::Int32),
            Value::null_of(DataType::String),
        ]))
    }

    #[test]
    fn reports_group_transition() {
        let program = Program::new();
        let mut grouping = Grouping::new(vec![0], false);
        // First row: not enough data to compare.
        assert!(!grouping.put_data(&program, &row(1, "a")).unwrap());
        grouping.shift(&program).unwrap();
        // Same key: no transition.
        assert!(!grouping.put_data(&program, &row(1, "b")).unwrap());
        // Different key: transition.
        assert!(grouping.put_data(&program, &row(2, "c")).unwrap());
    }

    #[test]
    fn get_consumes_the_first_slot() {
        let program = Program::new();
        let mut grouping = Grouping::new(vec![0], false);
        grouping.put_data(&program, &row(1, "a")).unwrap();
        grouping.shift(&program).unwrap();
        grouping.put_data(&program, &row(2, "b")).unwrap();

        let mut out = out_row();
        assert!(grouping.get_data(&program, &mut out).unwrap());
        assert_eq!(out.as_array().unwrap().element(1).unwrap().to_string(), "a");
        assert!(grouping.get_data(&program, &mut out).unwrap());
        assert_eq!(out.as_array().unwrap().element(1).unwrap().to_string(), "b");
        assert!(!grouping.get_data(&program, &mut out).unwrap());
    }

    #[test]
    fn degenerate_grouping_is_detectable() {
        assert!(Grouping::new(vec![], false).is_empty_grouping());
        assert!(!Grouping::new(vec![], true).is_empty_grouping());
        assert!(!Grouping::new(vec![0], false).is_empty_grouping());
    }

    #[test]
    fn null_keys_compare_equal() {
        let program = Program::new();
        let mut grouping = Grouping::new(vec![0], false);
        let null_row = Value::from(DataArray::from_values(vec![
            Value::null_of(DataType::Int32),
            Value::from("x"),
        ]));
        grouping.put_data(&program, &null_row).unwrap();
        grouping.shift(&program).unwrap();
        assert!(!grouping.put_data(&program, &null_row).unwrap());
    }
}
