//! Packed tuple form for arena-resident rows.
//!
//! A row is dumped as a sequence of 4-byte units: the element count, then per
//! element a byte length and the element's archive form padded to whole
//! units. Restore assigns back into an existing row, so the destination's
//! element types drive any conversion. Single columns can be compared without
//! unpacking the whole row, which is what the sort comparators do.

use core::cmp::Ordering;

use sable_types::{ArchiveReader, ArchiveWriter, DataArray, Value, WordCompare};

use crate::error::ExecError;

fn unit_count(byte_len: usize) -> usize {
    (byte_len + 3) / 4
}

fn element_bytes(value: &Value) -> Vec<u8> {
    let mut writer = ArchiveWriter::new();
    writer.write_object(value);
    writer.into_bytes()
}

/// Units needed by [`dump`] for this row.
pub fn size_units(row: &DataArray) -> usize {
    1 + row
        .values()
        .iter()
        .map(|v| 1 + unit_count(element_bytes(v).len()))
        .sum::<usize>()
}

/// Writes the packed form of `row` into `buf`, which must hold exactly
/// [`size_units`] units.
pub fn dump(buf: &mut [u32], row: &DataArray) {
    let mut pos = 0;
    buf[pos] = row.count() as u32;
    pos += 1;
    for value in row.values() {
        let bytes = element_bytes(value);
        buf[pos] = bytes.len() as u32;
        pos += 1;
        for chunk in bytes.chunks(4) {
            let mut unit = [0u8; 4];
            unit[..chunk.len()].copy_from_slice(chunk);
            buf[pos] = u32::from_le_bytes(unit);
            pos += 1;
        }
    }
}

fn element_offset(buf: &[u32], position: usize) -> Result<usize, ExecError> {
    let count = *buf.first().ok_or(ExecError::Unexpected)? as usize;
    if position >= count {
        return Err(ExecError::Unexpected);
    }
    let mut pos = 1;
    for _ in 0..position {
        let byte_len = *buf.get(pos).ok_or(ExecError::Unexpected)? as usize;
        pos += 1 + unit_count(byte_len);
    }
    Ok(pos)
}

fn element_at(buf: &[u32], pos: usize) -> Result<Value, ExecError> {
    let byte_len = *buf.get(pos).ok_or(ExecError::Unexpected)? as usize;
    let units = buf
        .get(pos + 1..pos + 1 + unit_count(byte_len))
        .ok_or(ExecError::Unexpected)?;
    let mut bytes = Vec::with_capacity(byte_len);
    for (i, unit) in units.iter().enumerate() {
        let chunk = unit.to_le_bytes();
        let take = (byte_len - i * 4).min(4);
        bytes.extend_from_slice(&chunk[..take]);
    }
    Value::read_from(&mut ArchiveReader::new(&bytes)).map_err(|_| ExecError::Unexpected)
}

/// Reads the packed form back into an existing row; the element count must
/// match.
pub fn restore(buf: &[u32], row: &mut DataArray) -> Result<(), ExecError> {
    let count = *buf.first().ok_or(ExecError::Unexpected)? as usize;
    if count != row.count() {
        return Err(ExecError::Unexpected);
    }
    let mut pos = 1;
    for index in 0..count {
        let value = element_at(buf, pos)?;
        let byte_len = buf[pos] as usize;
        pos += 1 + unit_count(byte_len);
        row.element_mut(index)
            .ok_or(ExecError::Unexpected)?
            .assign(&value)?;
    }
    Ok(())
}

/// Compares one column of two packed rows; nulls order last.
pub fn compare(a: &[u32], b: &[u32], position: usize) -> Result<Ordering, ExecError> {
    let left = element_at(a, element_offset(a, position)?)?;
    let right = element_at(b, element_offset(b, position)?)?;
    Ok(left.compare_total(&right))
}

/// Compares one column under a word-data comparator.
pub fn compare_word(
    a: &[u32],
    b: &[u32],
    position: usize,
    variant: WordCompare,
) -> Result<Ordering, ExecError> {
    let left = element_at(a, element_offset(a, position)?)?;
    let right = element_at(b, element_offset(b, position)?)?;
    match (left.is_null(), right.is_null()) {
        (true, true) => Ok(Ordering::Equal),
        (true, false) => Ok(Ordering::Greater),
        (false, true) => Ok(Ordering::Less),
        (false, false) => Ok(left
            .compare_word(&right, variant)
            .unwrap_or(Ordering::Equal)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_types::DataType;

    fn sample_row() -> DataArray {
        DataArray::from_values(vec![
            Value::from(42i32),
            Value::from("héllo"),
            Value::null_of(DataType::Double),
            Value::from(vec![1u8, 2, 3, 4, 5]),
        ])
    }

    #[test]
    fn dump_restore_roundtrip() {
        let row = sample_row();
        let mut buf = vec![0u32; size_units(&row)];
        dump(&mut buf, &row);

        let mut out = DataArray::from_values(vec![
            Value::null_of(DataType::Int32),
            Value::null_of(DataType::String),
            Value::null_of(DataType::Double),
            Value::null_of(DataType::Binary),
        ]);
        restore(&buf, &mut out).unwrap();
        assert_eq!(out.element(0).unwrap().to_i32(), Some(42));
        assert_eq!(out.element(1).unwrap().as_str16().unwrap().to_string(), "héllo");
        assert!(out.element(2).unwrap().is_null());
        assert_eq!(out.element(3).unwrap().as_binary().unwrap(), &vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn restore_count_mismatch() {
        let row = sample_row();
        let mut buf = vec![0u32; size_units(&row)];
        dump(&mut buf, &row);
        let mut out = DataArray::from_values(vec![Value::null()]);
        assert_eq!(restore(&buf, &mut out), Err(ExecError::Unexpected));
    }

    #[test]
    fn single_column_compare() {
        let a = DataArray::from_values(vec![Value::from("x"), Value::from(1i32)]);
        let b = DataArray::from_values(vec![Value::from("x"), Value::from(2i32)]);
        let mut ab = vec![0u32; size_units(&a)];
        dump(&mut ab, &a);
        let mut bb = vec![0u32; size_units(&b)];
        dump(&mut bb, &b);
        assert_eq!(compare(&ab, &bb, 0).unwrap(), Ordering::Equal);
        assert_eq!(compare(&ab, &bb, 1).unwrap(), Ordering::Less);
        assert!(compare(&ab, &bb, 2).is_err());
    }

    #[test]
    fn null_column_orders_last() {
        let a = DataArray::from_values(vec![Value::null_of(DataType::Int32)]);
        let b = DataArray::from_values(vec![Value::from(5i32)]);
        let mut ab = vec![0u32; size_units(&a)];
        dump(&mut ab, &a);
        let mut bb = vec![0u32; size_units(&b)];
        dump(&mut bb, &b);
        assert_eq!(compare(&ab, &bb, 0).unwrap(), Ordering::Greater);
    }
}
