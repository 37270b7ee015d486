//! Client connection transport.

use std::sync::{Arc, Mutex, PoisonError};

use sable_types::{ArchiveWriter, Externalizable};

use crate::error::ExecError;

/// The wire the Connection collection writes result rows to.
///
/// Implementations are externally thread-safe by contract; a `None` object is
/// the end-of-stream marker.
pub trait Transport {
    /// Opens the transport; returns true when this call performed the open.
    fn open(&mut self) -> Result<bool, ExecError>;
    /// Closes the transport. Idempotent.
    fn close(&mut self) -> Result<(), ExecError>;
    /// Writes one framed object, or the end-of-stream marker.
    fn write_object(&mut self, object: Option<&dyn Externalizable>) -> Result<(), ExecError>;
    /// Flushes buffered writes.
    fn flush(&mut self) -> Result<(), ExecError>;
}

/// An in-memory transport capturing framed messages for inspection.
#[derive(Debug, Default, Clone)]
pub struct MemoryTransport {
    messages: Arc<Mutex<Vec<Option<Vec<u8>>>>>,
    opened: bool,
    flushes: Arc<Mutex<u32>>,
}

impl MemoryTransport {
    /// Creates an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message written so far; `None` entries are end-of-stream marks.
    pub fn messages(&self) -> Vec<Option<Vec<u8>>> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of flush calls observed.
    pub fn flushes(&self) -> u32 {
        *self.flushes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for MemoryTransport {
    fn open(&mut self) -> Result<bool, ExecError> {
        if self.opened {
            return Ok(false);
        }
        self.opened = true;
        Ok(true)
    }

    fn close(&mut self) -> Result<(), ExecError> {
        self.opened = false;
        Ok(())
    }

    fn write_object(&mut self, object: Option<&dyn Externalizable>) -> Result<(), ExecError> {
        if !self.opened {
            return Err(ExecError::ConnectionRanOut);
        }
        let frame = object.map(|o| {
            let mut writer = ArchiveWriter::new();
            writer.write_object(o);
            writer.into_bytes()
        });
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(frame);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ExecError> {
        *self.flushes.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }
}
