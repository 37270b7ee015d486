//! Bitset disintegration: expanding a row-id set column into single rows.

use sable_types::{ArchiveReader, ArchiveWriter, DataArray, DataType, Value};
use tracing::trace;

use crate::class::ClassId;
use crate::collection::{assign_into_row, expect_row, Collection};
use crate::error::ExecError;
use crate::explain::Explain;
use crate::program::Program;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Bitset,
    Pairs,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Bitset
    }
}

/// Expands an array whose last element is a bitset of row ids into one output
/// row per set bit.
///
/// The streaming variant ([`Disintegrate::pairs`]) is used when the upstream
/// already disintegrates: it holds a pair of rows like Grouping and relays
/// whichever is current.
#[derive(Debug, Default)]
pub struct Disintegrate {
    mode: Mode,
    source: Option<DataArray>,
    bits: Vec<u32>,
    bit_cursor: usize,
    first: Option<DataArray>,
    second: Option<DataArray>,
}

impl Disintegrate {
    /// The bitset-expanding variant.
    pub fn bitset() -> Self {
        Disintegrate {
            mode: Mode::Bitset,
            ..Disintegrate::default()
        }
    }

    /// The pair-relaying variant.
    pub fn pairs() -> Self {
        Disintegrate {
            mode: Mode::Pairs,
            ..Disintegrate::default()
        }
    }

    fn push_bitset_source(&mut self, row: &Value) -> Result<(), ExecError> {
        let source = expect_row(row)?.clone();
        let last = source
            .element(source.count().wrapping_sub(1))
            .ok_or(ExecError::Unexpected)?;
        let bitset = last.as_bitset().ok_or(ExecError::Unexpected)?;
        self.bits = bitset.iter().collect();
        self.bit_cursor = 0;
        trace!(bits = self.bits.len(), "disintegration put");
        self.source = Some(source);
        Ok(())
    }

    fn next_bitset_row(&mut self, row: &mut Value) -> Result<bool, ExecError> {
        let Some(source) = &self.source else {
            return Ok(false);
        };
        let Some(bit) = self.bits.get(self.bit_cursor) else {
            return Ok(false);
        };
        expect_row(row)?;
        let out = row.as_array_mut().ok_or(ExecError::Unexpected)?;
        if out.count() != source.count() {
            return Err(ExecError::Unexpected);
        }
        let last = out.count() - 1;
        for i in 0..last {
            let src = source.element(i).ok_or(ExecError::Unexpected)?;
            out.element_mut(i).ok_or(ExecError::Unexpected)?.assign(src)?;
        }
        let id_slot = out.element_mut(last).ok_or(ExecError::Unexpected)?;
        if id_slot.data_type() != DataType::UInt32 {
            return Err(ExecError::Unexpected);
        }
        id_slot.assign(&Value::from(*bit))?;
        self.bit_cursor += 1;
        Ok(true)
    }

    fn shift_pair(&mut self) -> Option<DataArray> {
        let result = self.first.take();
        self.first = self.second.take();
        result
    }
}

impl Collection for Disintegrate {
    fn explain(&self, explain: &mut Explain) {
        explain.put("bitset disintegration");
    }

    fn initialize(&mut self, _program: &Program) -> Result<(), ExecError> {
        Ok(())
    }

    fn terminate(&mut self, _program: &Program) {
        self.clear();
    }

    fn clear(&mut self) {
        self.source = None;
        self.bits.clear();
        self.bit_cursor = 0;
        self.first = None;
        self.second = None;
    }

    fn is_empty(&self) -> bool {
        match self.mode {
            Mode::Bitset => self.source.is_none(),
            Mode::Pairs => self.first.is_none() && self.second.is_none(),
        }
    }

    fn is_get_next_operand(&self) -> bool {
        match self.mode {
            Mode::Bitset => self.source.is_none() || self.bit_cursor >= self.bits.len(),
            Mode::Pairs => self.first.is_none() && self.second.is_none(),
        }
    }

    fn class_id(&self) -> ClassId {
        match self.mode {
            Mode::Bitset => ClassId::DisintegrateCollection,
            Mode::Pairs => ClassId::DisintegratePairsCollection,
        }
    }

    fn write_to(&self, _writer: &mut ArchiveWriter) {}

    fn read_payload(&mut self, _reader: &mut ArchiveReader<'_>) -> Result<(), ExecError> {
        Ok(())
    }

    fn put_data(&mut self, _program: &Program, row: &Value) -> Result<bool, ExecError> {
        match self.mode {
            Mode::Bitset => {
                self.push_bitset_source(row)?;
                Ok(true)
            }
            Mode::Pairs => {
                self.second = Some(expect_row(row)?.clone());
                Ok(true)
            }
        }
    }

    fn put_finish(&mut self, _program: &Program) -> Result<(), ExecError> {
        Ok(())
    }

    fn shift(&mut self, _program: &Program) -> Result<(), ExecError> {
        if self.mode == Mode::Pairs {
            self.shift_pair();
        }
        Ok(())
    }

    fn get_data(&mut self, _program: &Program, row: &mut Value) -> Result<bool, ExecError> {
        match self.mode {
            Mode::Bitset => self.next_bitset_row(row),
            Mode::Pairs => match self.shift_pair() {
                Some(front) => {
                    assign_into_row(row, &front)?;
                    Ok(true)
                }
                None => Ok(false),
            },
        }
    }

    fn reset_get(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_types::BitSet;

    fn source_row(tag: &str, bits: &[u32]) -> Value {
        Value::from(DataArray::from_values(vec![
            Value::from(tag),
            Value::from(bits.iter().copied().collect::<BitSet>()),
        ]))
    }

    fn out_row() -> Value {
        Value::from(DataArray::from_values(vec![
            Value::null_of(DataType::String),
            Value::default_of(DataType::UInt32),
        ]))
    }

    #[test]
    fn expands_each_set_bit() {
        let program = Program::new();
        let mut collection = Disintegrate::bitset();
        assert!(collection.is_get_next_operand());
        collection
            .put_data(&program, &source_row("t", &[5, 1, 9]))
            .unwrap();
        assert!(!collection.is_get_next_operand());

        let mut out = out_row();
        let mut ids = Vec::new();
        while collection.get_data(&program, &mut out).unwrap() {
            let array = out.as_array().unwrap();
            assert_eq!(array.element(0).unwrap().to_string(), "t");
            ids.push(array.element(1).unwrap().to_u32().unwrap());
        }
        assert_eq!(ids, vec![1, 5, 9]);
        assert!(collection.is_get_next_operand());
    }

    #[test]
    fn non_bitset_tail_is_rejected() {
        let program = Program::new();
        let mut collection = Disintegrate::bitset();
        let bad = Value::from(DataArray::from_values(vec![Value::from(1i32)]));
        assert_eq!(
            collection.put_data(&program, &bad),
            Err(ExecError::Unexpected)
        );
    }

    #[test]
    fn count_mismatch_is_rejected() {
        let program = Program::new();
        let mut collection = Disintegrate::bitset();
        collection
            .put_data(&program, &source_row("t", &[1]))
            .unwrap();
        let mut short = Value::from(DataArray::from_values(vec![Value::default_of(
            DataType::UInt32,
        )]));
        assert_eq!(
            collection.get_data(&program, &mut short),
            Err(ExecError::Unexpected)
        );
    }

    #[test]
    fn pair_variant_relays_rows() {
        let program = Program::new();
        let mut collection = Disintegrate::pairs();
        let row_a = Value::from(DataArray::from_values(vec![Value::from(1i32)]));
        let row_b = Value::from(DataArray::from_values(vec![Value::from(2i32)]));
        collection.put_data(&program, &row_a).unwrap();
        collection.shift(&program).unwrap();
        collection.put_data(&program, &row_b).unwrap();

        let mut out = Value::from(DataArray::from_values(vec![Value::null_of(DataType::Int32)]));
        assert!(collection.get_data(&program, &mut out).unwrap());
        assert_eq!(out.as_array().unwrap().element(0).unwrap().to_i32(), Some(1));
        assert!(collection.get_data(&program, &mut out).unwrap());
        assert_eq!(out.as_array().unwrap().element(0).unwrap().to_i32(), Some(2));
        assert!(!collection.get_data(&program, &mut out).unwrap());
    }
}
