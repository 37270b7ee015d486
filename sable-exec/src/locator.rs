//! Locators: streaming handles to row-resident large objects.
//!
//! A locator stays valid only until its owning cursor moves on; the cursor
//! clears the flag, and every wrapping action checks it before touching the
//! object, degrading to NULL reads and ignored writes.

use sable_types::{Utf16String, Value};

use crate::error::ExecError;

/// Payload of a large object.
#[derive(Debug, Clone)]
pub enum LobData {
    /// Character large object.
    Text(Utf16String),
    /// Binary large object.
    Binary(Vec<u8>),
}

/// A handle to one large object.
#[derive(Debug, Clone)]
pub struct Locator {
    valid: bool,
    data: LobData,
}

impl Locator {
    /// A valid locator over character data.
    pub fn text(data: Utf16String) -> Self {
        Locator {
            valid: true,
            data: LobData::Text(data),
        }
    }

    /// A valid locator over binary data.
    pub fn binary(data: Vec<u8>) -> Self {
        Locator {
            valid: true,
            data: LobData::Binary(data),
        }
    }

    /// A locator whose cursor has moved on.
    pub fn invalid() -> Self {
        Locator {
            valid: false,
            data: LobData::Binary(Vec::new()),
        }
    }

    /// Whether the owning cursor still backs this locator.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Called by the owning cursor when it advances.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// The current payload.
    pub fn data(&self) -> &LobData {
        &self.data
    }

    /// Element count: code units for text, bytes for binary.
    pub fn length(&self) -> u32 {
        match &self.data {
            LobData::Text(s) => s.len() as u32,
            LobData::Binary(b) => b.len() as u32,
        }
    }

    /// Reads `length` elements starting at the 1-based `start`.
    pub fn get(&self, start: u32, length: u32) -> Value {
        let start = (start.max(1) - 1) as usize;
        let length = length as usize;
        match &self.data {
            LobData::Text(s) => Value::from(s.copy_range(start, length)),
            LobData::Binary(b) => {
                let start = start.min(b.len());
                let end = start.saturating_add(length).min(b.len());
                Value::from(b[start..end].to_vec())
            }
        }
    }

    /// Appends `value`, which must match the payload kind.
    pub fn append(&mut self, value: &Value) -> Result<(), ExecError> {
        match &mut self.data {
            LobData::Text(s) => {
                let other = value.as_str16().ok_or(ExecError::NotCompatible)?;
                s.connect(other);
            }
            LobData::Binary(b) => {
                let other = value.as_binary().ok_or(ExecError::NotCompatible)?;
                b.extend_from_slice(other);
            }
        }
        Ok(())
    }

    /// Truncates to at most `length` elements.
    pub fn truncate(&mut self, length: u32) {
        let length = length as usize;
        match &mut self.data {
            LobData::Text(s) => {
                if s.len() > length {
                    *s = s.copy_range(0, length);
                }
            }
            LobData::Binary(b) => b.truncate(length),
        }
    }

    /// Replaces the window at the 1-based `start` with `value`; a missing
    /// `length` means the placement's own length.
    pub fn replace(
        &mut self,
        value: &Value,
        start: u32,
        length: Option<u32>,
    ) -> Result<(), ExecError> {
        let start = (start.max(1) - 1) as usize;
        match &mut self.data {
            LobData::Text(s) => {
                let placement = value.as_str16().ok_or(ExecError::NotCompatible)?;
                let window = length.map(|l| l as usize).unwrap_or(placement.len());
                let start = start.min(s.len());
                let mut result = s.copy_range(0, start);
                result.connect(placement);
                let tail_start = start.saturating_add(window);
                result.connect(&s.copy_range(tail_start, s.len().saturating_sub(tail_start)));
                *s = result;
            }
            LobData::Binary(b) => {
                let placement = value.as_binary().ok_or(ExecError::NotCompatible)?;
                let window = length.map(|l| l as usize).unwrap_or(placement.len());
                let start = start.min(b.len());
                let tail_start = start.saturating_add(window).min(b.len());
                let mut result = b[..start].to_vec();
                result.extend_from_slice(placement);
                result.extend_from_slice(&b[tail_start..]);
                *b = result;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_window_operations() {
        let mut loc = Locator::text(Utf16String::from("abcdef"));
        assert_eq!(loc.length(), 6);
        assert_eq!(
            loc.get(2, 3).as_str16().map(|s| s.to_string()),
            Some("bcd".into())
        );
        loc.append(&Value::from("gh")).unwrap();
        assert_eq!(loc.length(), 8);
        loc.truncate(4);
        assert_eq!(
            loc.get(1, 100).as_str16().map(|s| s.to_string()),
            Some("abcd".into())
        );
        loc.replace(&Value::from("XY"), 2, None).unwrap();
        assert_eq!(
            loc.get(1, 100).as_str16().map(|s| s.to_string()),
            Some("aXYd".into())
        );
    }

    #[test]
    fn binary_replace_with_window() {
        let mut loc = Locator::binary(vec![1, 2, 3, 4, 5]);
        loc.replace(&Value::from(vec![9u8]), 2, Some(3)).unwrap();
        assert_eq!(loc.get(1, 100).as_binary().unwrap(), &vec![1, 9, 5]);
    }

    #[test]
    fn append_type_mismatch() {
        let mut loc = Locator::text(Utf16String::from("a"));
        assert_eq!(
            loc.append(&Value::from(vec![1u8])),
            Err(ExecError::NotCompatible)
        );
    }
}
