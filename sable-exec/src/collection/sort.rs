//! In-memory sort over packed rows.

use core::cmp::Ordering;

use sable_types::{ArchiveReader, ArchiveWriter, Value, WordCompare};
use tracing::trace;

use crate::allocator::{Arena, Region};
use crate::class::ClassId;
use crate::collection::{copy_as_row, expect_row, Collection};
use crate::error::ExecError;
use crate::explain::Explain;
use crate::program::Program;
use crate::tuple;

/// Word-comparator selector codes carried by the plan.
const WORD_POSITION_NONE: i32 = 0;
const WORD_POSITION_DF: i32 = 1;
const WORD_POSITION_SCALE: i32 = 2;

/// One resolved sort key.
#[derive(Debug, Clone, Copy)]
pub struct SortKey {
    position: usize,
    descending: bool,
    word: Option<WordCompare>,
}

impl SortKey {
    fn compare(&self, a: &[u32], b: &[u32]) -> Result<Ordering, ExecError> {
        let order = match self.word {
            None => tuple::compare(a, b, self.position)?,
            Some(variant) => tuple::compare_word(a, b, self.position, variant)?,
        };
        Ok(if self.descending { order.reverse() } else { order })
    }
}

/// Accumulates rows, sorts once on first demand, then emits in key order.
#[derive(Debug, Default)]
pub struct Sort {
    key_positions: Vec<i32>,
    directions: Vec<i32>,
    word_positions: Vec<i32>,
    keys: Vec<SortKey>,
    arena: Arena,
    rows: Vec<Region>,
    sorted: bool,
    cursor: usize,
}

impl Sort {
    /// A sort over `key_positions` with per-key `directions` (0 = ascending)
    /// and word-comparator selectors.
    pub fn new(key_positions: Vec<i32>, directions: Vec<i32>, word_positions: Vec<i32>) -> Self {
        Sort {
            key_positions,
            directions,
            word_positions,
            ..Sort::default()
        }
    }

    fn build_keys(&mut self) -> Result<(), ExecError> {
        if !self.keys.is_empty() {
            return Ok(());
        }
        for (i, position) in self.key_positions.iter().enumerate() {
            let position = usize::try_from(*position).map_err(|_| ExecError::BadArgument)?;
            let descending = self.directions.get(i).copied().unwrap_or(0) != 0;
            let word = match self.word_positions.get(i).copied().unwrap_or(WORD_POSITION_NONE) {
                WORD_POSITION_NONE => None,
                WORD_POSITION_DF => Some(WordCompare::Df),
                WORD_POSITION_SCALE => Some(WordCompare::Scale),
                _ => return Err(ExecError::Unexpected),
            };
            self.keys.push(SortKey {
                position,
                descending,
                word,
            });
        }
        Ok(())
    }

    fn sort(&mut self) {
        if self.sorted {
            return;
        }
        let Sort {
            arena, rows, keys, ..
        } = self;
        rows.sort_by(|a, b| {
            let left = arena.slice(*a);
            let right = arena.slice(*b);
            for key in keys.iter() {
                match key.compare(left, right) {
                    Ok(Ordering::Equal) => continue,
                    Ok(order) => return order,
                    Err(_) => return Ordering::Equal,
                }
            }
            Ordering::Equal
        });
        self.sorted = true;
        trace!(rows = self.rows.len(), "sort completed");
    }
}

impl Collection for Sort {
    fn explain(&self, explain: &mut Explain) {
        explain.put("sort(");
        for (i, position) in self.key_positions.iter().enumerate() {
            if i > 0 {
                explain.put(",");
            }
            explain.put_i32(*position);
            if self.directions.get(i).copied().unwrap_or(0) != 0 {
                explain.put(" desc");
            }
        }
        explain.put(")");
    }

    fn initialize(&mut self, _program: &Program) -> Result<(), ExecError> {
        self.build_keys()
    }

    fn terminate(&mut self, _program: &Program) {
        self.clear();
    }

    fn clear(&mut self) {
        self.rows.clear();
        self.arena.clear();
        self.sorted = false;
        self.cursor = 0;
    }

    fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn class_id(&self) -> ClassId {
        ClassId::SortCollection
    }

    fn write_to(&self, writer: &mut ArchiveWriter) {
        writer.write_vec_i32(&self.key_positions);
        writer.write_vec_i32(&self.directions);
        writer.write_vec_i32(&self.word_positions);
    }

    fn read_payload(&mut self, reader: &mut ArchiveReader<'_>) -> Result<(), ExecError> {
        self.key_positions = reader.read_vec_i32()?;
        self.directions = reader.read_vec_i32()?;
        self.word_positions = reader.read_vec_i32()?;
        Ok(())
    }

    fn put_data(&mut self, _program: &Program, row: &Value) -> Result<bool, ExecError> {
        let row = copy_as_row(row);
        let units = tuple::size_units(&row);
        let region = self.arena.alloc(units);
        tuple::dump(self.arena.slice_mut(region), &row);
        self.rows.push(region);
        trace!(rows = self.rows.len(), "sort put");
        Ok(false)
    }

    fn put_finish(&mut self, _program: &Program) -> Result<(), ExecError> {
        self.sort();
        Ok(())
    }

    fn get_data(&mut self, _program: &Program, row: &mut Value) -> Result<bool, ExecError> {
        if self.cursor == 0 {
            self.sort();
        }
        let Some(region) = self.rows.get(self.cursor) else {
            return Ok(false);
        };
        expect_row(row)?;
        let array = row.as_array_mut().ok_or(ExecError::Unexpected)?;
        tuple::restore(self.arena.slice(*region), array)?;
        self.cursor += 1;
        Ok(true)
    }

    fn reset_get(&mut self) {
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_types::{DataArray, DataType};

    fn put_rows(sort: &mut Sort, program: &Program, rows: &[(Option<i32>, &str)]) {
        for (key, tag) in rows {
            let key_value = match key {
                Some(v) => Value::from(*v),
                None => Value::null_of(DataType::Int32),
            };
            let row = Value::from(DataArray::from_values(vec![key_value, Value::from(*tag)]));
            sort.put_data(program, &row).unwrap();
        }
    }

    fn drain(sort: &mut Sort, program: &Program) -> Vec<(Option<i32>, String)> {
        let mut out = Value::from(DataArray::from_values(vec![
            Value::null_of(DataType::Int32),
            Value::null_of(DataType::String),
        ]));
        let mut rows = Vec::new();
        while sort.get_data(program, &mut out).unwrap() {
            let array = out.as_array().unwrap();
            rows.push((
                array.element(0).unwrap().to_i32(),
                array.element(1).unwrap().to_string(),
            ));
        }
        rows
    }

    #[test]
    fn ascending_with_nulls_last() {
        let program = Program::new();
        let mut sort = Sort::new(vec![0], vec![0], vec![]);
        sort.initialize(&program).unwrap();
        put_rows(
            &mut sort,
            &program,
            &[(Some(3), "a"), (None, "b"), (Some(1), "c"), (Some(2), "d"), (None, "e")],
        );
        let keys: Vec<Option<i32>> = drain(&mut sort, &program).into_iter().map(|r| r.0).collect();
        assert_eq!(keys, vec![Some(1), Some(2), Some(3), None, None]);
    }

    #[test]
    fn descending_direction() {
        let program = Program::new();
        let mut sort = Sort::new(vec![0], vec![1], vec![]);
        sort.initialize(&program).unwrap();
        put_rows(&mut sort, &program, &[(Some(1), "a"), (Some(3), "b"), (Some(2), "c")]);
        let keys: Vec<Option<i32>> = drain(&mut sort, &program).into_iter().map(|r| r.0).collect();
        assert_eq!(keys, vec![Some(3), Some(2), Some(1)]);
    }

    #[test]
    fn stable_for_equal_keys() {
        let program = Program::new();
        let mut sort = Sort::new(vec![0], vec![0], vec![]);
        sort.initialize(&program).unwrap();
        put_rows(
            &mut sort,
            &program,
            &[(Some(1), "first"), (Some(0), "x"), (Some(1), "second"), (Some(1), "third")],
        );
        let rows = drain(&mut sort, &program);
        let ones: Vec<String> = rows
            .into_iter()
            .filter(|r| r.0 == Some(1))
            .map(|r| r.1)
            .collect();
        assert_eq!(ones, vec!["first", "second", "third"]);
    }

    #[test]
    fn output_is_a_permutation() {
        let program = Program::new();
        let mut sort = Sort::new(vec![0], vec![0], vec![]);
        sort.initialize(&program).unwrap();
        let input: Vec<(Option<i32>, &str)> =
            vec![(Some(5), "a"), (Some(2), "b"), (Some(9), "c"), (Some(2), "d")];
        put_rows(&mut sort, &program, &input);
        let mut keys: Vec<i32> = drain(&mut sort, &program)
            .into_iter()
            .filter_map(|r| r.0)
            .collect();
        let mut expected: Vec<i32> = input.iter().filter_map(|r| r.0).collect();
        keys.sort_unstable();
        expected.sort_unstable();
        assert_eq!(keys, expected);
    }

    #[test]
    fn reset_re_emits_without_resorting() {
        let program = Program::new();
        let mut sort = Sort::new(vec![0], vec![0], vec![]);
        sort.initialize(&program).unwrap();
        put_rows(&mut sort, &program, &[(Some(2), "a"), (Some(1), "b")]);
        let first = drain(&mut sort, &program);
        sort.reset_get();
        let second = drain(&mut sort, &program);
        assert_eq!(first, second);
    }

    #[test]
    fn secondary_key_breaks_ties() {
        let program = Program::new();
        let mut sort = Sort::new(vec![0, 1], vec![0, 1], vec![]);
        sort.initialize(&program).unwrap();
        put_rows(
            &mut sort,
            &program,
            &[(Some(1), "a"), (Some(1), "c"), (Some(1), "b"), (Some(0), "z")],
        );
        let rows = drain(&mut sort, &program);
        let tags: Vec<String> = rows.into_iter().map(|r| r.1).collect();
        assert_eq!(tags, vec!["z", "c", "b", "a"]);
    }

    #[test]
    fn word_comparator_by_df() {
        use sable_types::WordData;
        let program = Program::new();
        let mut sort = Sort::new(vec![0], vec![0], vec![WORD_POSITION_DF]);
        sort.initialize(&program).unwrap();
        for (term, df) in [("zebra", 1u32), ("apple", 9), ("mango", 4)] {
            let word = WordData {
                term: term.into(),
                df,
                ..WordData::default()
            };
            let row = Value::from(DataArray::from_values(vec![Value::from(word)]));
            sort.put_data(&program, &row).unwrap();
        }
        let mut out = Value::from(DataArray::from_values(vec![Value::null_of(DataType::Word)]));
        let mut dfs = Vec::new();
        while sort.get_data(&program, &mut out).unwrap() {
            dfs.push(out.as_array().unwrap().element(0).unwrap().as_word().unwrap().df);
        }
        assert_eq!(dfs, vec![1, 4, 9]);
    }
}
