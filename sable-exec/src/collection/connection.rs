//! Sink forwarding result rows to the client connection.

use sable_types::{ArchiveReader, ArchiveWriter, Value};
use tracing::trace;

use crate::class::ClassId;
use crate::collection::Collection;
use crate::error::ExecError;
use crate::explain::Explain;
use crate::program::Program;

/// Writes every put row to a program connection.
///
/// The connection is resolved by id at initialize and opened lazily on the
/// first put; it is closed on terminate only when this collection performed
/// the open. A `None` object terminates the stream, and the put side's
/// `finish` sends it exactly once.
#[derive(Debug)]
pub struct Connection {
    connection_id: i32,
    resolved: bool,
    opened_by_me: bool,
    finished: bool,
}

impl Default for Connection {
    fn default() -> Self {
        Connection::new(-1)
    }
}

impl Connection {
    /// A sink over the program connection `connection_id`.
    pub fn new(connection_id: i32) -> Self {
        Connection {
            connection_id,
            resolved: false,
            opened_by_me: false,
            finished: false,
        }
    }

    fn send(&mut self, program: &Program, object: Option<&Value>) -> Result<bool, ExecError> {
        let mut transport = program.connection_mut(self.connection_id)?;
        if transport.open()? {
            self.opened_by_me = true;
        }
        transport
            .write_object(object.map(|v| v as &dyn sable_types::Externalizable))?;
        if object.is_none() {
            trace!("connection put end-of-data");
        }
        program.add_sent_row();
        Ok(true)
    }
}

impl Collection for Connection {
    fn explain(&self, explain: &mut Explain) {
        explain.put("<connection:#").put_i32(self.connection_id).put(">");
    }

    fn initialize(&mut self, program: &Program) -> Result<(), ExecError> {
        if !self.resolved {
            program.connection_mut(self.connection_id)?;
            self.resolved = true;
        }
        Ok(())
    }

    fn terminate(&mut self, program: &Program) {
        if self.opened_by_me {
            if let Ok(mut transport) = program.connection_mut(self.connection_id) {
                let _ = transport.close();
            }
            self.opened_by_me = false;
        }
        self.resolved = false;
        self.finished = false;
    }

    fn clear(&mut self) {}

    fn is_empty(&self) -> bool {
        // A sink never buffers; regard it as never empty.
        false
    }

    fn class_id(&self) -> ClassId {
        ClassId::ConnectionCollection
    }

    fn write_to(&self, writer: &mut ArchiveWriter) {
        writer.write_i32(self.connection_id);
    }

    fn read_payload(&mut self, reader: &mut ArchiveReader<'_>) -> Result<(), ExecError> {
        self.connection_id = reader.read_i32()?;
        Ok(())
    }

    fn put_data(&mut self, program: &Program, row: &Value) -> Result<bool, ExecError> {
        let result = self.send(program, Some(row))?;
        trace!("connection put row");
        Ok(result)
    }

    fn put_object(
        &mut self,
        program: &Program,
        object: Option<&Value>,
    ) -> Result<bool, ExecError> {
        self.send(program, object)
    }

    fn put_finish(&mut self, program: &Program) -> Result<(), ExecError> {
        if !self.finished {
            self.send(program, None)?;
            self.finished = true;
        }
        Ok(())
    }

    fn flush(&mut self, program: &Program) -> Result<(), ExecError> {
        program.connection_mut(self.connection_id)?.flush()
    }

    fn get_data(&mut self, _program: &Program, _row: &mut Value) -> Result<bool, ExecError> {
        Err(ExecError::NotSupported)
    }

    fn reset_get(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use sable_types::{ArchiveReader, DataArray};

    #[test]
    fn rows_then_end_of_stream() {
        let transport = MemoryTransport::new();
        let mut program = Program::new();
        let id = program.add_connection(Box::new(transport.clone()));

        let mut connection = Connection::new(id);
        connection.initialize(&program).unwrap();
        let row = Value::from(DataArray::from_values(vec![Value::from(1i32)]));
        connection.put_data(&program, &row).unwrap();
        connection.put_finish(&program).unwrap();
        connection.put_finish(&program).unwrap();

        let messages = transport.messages();
        assert_eq!(messages.len(), 2);
        let bytes = messages[0].as_ref().unwrap();
        let restored = Value::read_from(&mut ArchiveReader::new(bytes)).unwrap();
        assert_eq!(restored, row);
        assert!(messages[1].is_none());
        assert_eq!(program.sent_rows(), 2);
    }

    #[test]
    fn closes_only_when_it_opened() {
        let transport = MemoryTransport::new();
        let mut program = Program::new();
        let id = program.add_connection(Box::new(transport.clone()));

        let mut connection = Connection::new(id);
        connection.initialize(&program).unwrap();
        connection
            .put_data(&program, &Value::from(DataArray::from_values(vec![])))
            .unwrap();
        connection.terminate(&program);
        // A fresh write without a new open fails: the transport was closed.
        assert_eq!(
            program
                .connection_mut(id)
                .unwrap()
                .write_object(None)
                .err(),
            Some(ExecError::ConnectionRanOut)
        );
    }

    #[test]
    fn flush_delegates() {
        let transport = MemoryTransport::new();
        let mut program = Program::new();
        let id = program.add_connection(Box::new(transport.clone()));
        let mut connection = Connection::new(id);
        connection.initialize(&program).unwrap();
        connection.flush(&program).unwrap();
        assert_eq!(transport.flushes(), 1);
    }

    #[test]
    fn get_side_is_not_supported() {
        let mut connection = Connection::new(0);
        let program = Program::new();
        let mut row = Value::null();
        assert_eq!(
            connection.get_data(&program, &mut row),
            Err(ExecError::NotSupported)
        );
    }
}
