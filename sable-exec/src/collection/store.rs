//! Append-only in-memory row store with positional access.

use sable_types::{ArchiveReader, ArchiveWriter, Value};
use tracing::trace;

use crate::allocator::{Arena, Region};
use crate::class::ClassId;
use crate::collection::{copy_as_row, expect_row, Collection};
use crate::error::ExecError;
use crate::explain::Explain;
use crate::program::Program;
use crate::tuple;

/// Accumulates rows in an arena; emits them in order or by position.
#[derive(Debug, Default)]
pub struct Store {
    arena: Arena,
    rows: Vec<Region>,
    cursor: usize,
}

impl Store {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn push_row(&mut self, row: &Value) -> Result<(), ExecError> {
        let row = copy_as_row(row);
        let units = tuple::size_units(&row);
        let region = self.arena.alloc(units);
        tuple::dump(self.arena.slice_mut(region), &row);
        self.rows.push(region);
        trace!(rows = self.rows.len(), "store put");
        Ok(())
    }

    fn fetch(&self, position: usize, row: &mut Value) -> Result<bool, ExecError> {
        let Some(region) = self.rows.get(position) else {
            return Ok(false);
        };
        expect_row(row)?;
        let array = row.as_array_mut().ok_or(ExecError::Unexpected)?;
        tuple::restore(self.arena.slice(*region), array)?;
        Ok(true)
    }
}

impl Collection for Store {
    fn explain(&self, explain: &mut Explain) {
        explain.put("store");
    }

    fn initialize(&mut self, _program: &Program) -> Result<(), ExecError> {
        Ok(())
    }

    fn terminate(&mut self, _program: &Program) {
        self.clear();
    }

    fn clear(&mut self) {
        self.rows.clear();
        self.arena.clear();
        self.cursor = 0;
    }

    fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn class_id(&self) -> ClassId {
        ClassId::StoreCollection
    }

    fn write_to(&self, _writer: &mut ArchiveWriter) {}

    fn read_payload(&mut self, _reader: &mut ArchiveReader<'_>) -> Result<(), ExecError> {
        Ok(())
    }

    fn put_data(&mut self, _program: &Program, row: &Value) -> Result<bool, ExecError> {
        self.push_row(row)?;
        Ok(false)
    }

    fn put_finish(&mut self, _program: &Program) -> Result<(), ExecError> {
        Ok(())
    }

    fn last_position(&self) -> Option<usize> {
        self.rows.len().checked_sub(1)
    }

    fn get_data(&mut self, _program: &Program, row: &mut Value) -> Result<bool, ExecError> {
        if self.fetch(self.cursor, row)? {
            self.cursor += 1;
            return Ok(true);
        }
        Ok(false)
    }

    fn get_data_at(
        &mut self,
        _program: &Program,
        row: &mut Value,
        position: usize,
    ) -> Result<bool, ExecError> {
        self.fetch(position, row)
    }

    fn reset_get(&mut self) {
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_types::{DataArray, DataType};

    fn row(v: i32, s: &str) -> Value {
        Value::from(DataArray::from_values(vec![Value::from(v), Value::from(s)]))
    }

    fn out_row() -> Value {
        Value::from(DataArray::from_values(vec![
            Value::null_of(DataType::Int32),
            Value::null_of(DataType::String),
        ]))
    }

    #[test]
    fn sequential_and_positional_access() {
        let program = Program::new();
        let mut store = Store::new();
        for i in 0..5 {
            assert!(!store.put_data(&program, &row(i, "x")).unwrap());
        }
        assert_eq!(store.last_position(), Some(4));

        let mut out = out_row();
        let mut seen = Vec::new();
        while store.get_data(&program, &mut out).unwrap() {
            seen.push(out.as_array().unwrap().element(0).unwrap().to_i32().unwrap());
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);

        assert!(store.get_data_at(&program, &mut out, 2).unwrap());
        assert_eq!(out.as_array().unwrap().element(0).unwrap().to_i32(), Some(2));
        assert!(!store.get_data_at(&program, &mut out, 9).unwrap());

        store.reset_get();
        assert!(store.get_data(&program, &mut out).unwrap());
        assert_eq!(out.as_array().unwrap().element(0).unwrap().to_i32(), Some(0));
    }

    #[test]
    fn scalar_put_wraps_into_a_row() {
        let program = Program::new();
        let mut store = Store::new();
        store.put_data(&program, &Value::from(7i32)).unwrap();
        let mut out = Value::from(DataArray::from_values(vec![Value::null_of(DataType::Int32)]));
        assert!(store.get_data(&program, &mut out).unwrap());
        assert_eq!(out.as_array().unwrap().element(0).unwrap().to_i32(), Some(7));
    }

    #[test]
    fn clear_returns_to_initialized() {
        let program = Program::new();
        let mut store = Store::new();
        store.put_data(&program, &row(1, "a")).unwrap();
        store.clear();
        assert!(store.is_empty());
        let mut out = out_row();
        assert!(!store.get_data(&program, &mut out).unwrap());
    }
}
