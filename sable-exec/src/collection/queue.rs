//! FIFO conduits: the single-threaded queue and its concurrent variant.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use sable_types::{ArchiveReader, ArchiveWriter, DataArray, Value};
use tracing::trace;

use crate::class::ClassId;
use crate::collection::{assign_into_row, copy_as_row, Collection};
use crate::error::ExecError;
use crate::explain::Explain;
use crate::program::Program;

/// Poll interval while waiting on queue back-pressure.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Unbounded-size sentinel in the serialized form.
const UNBOUNDED: i64 = -1;

/// Single-threaded bounded FIFO.
#[derive(Debug, Default)]
pub struct Queue {
    max_size: i64,
    buffer: VecDeque<DataArray>,
}

impl Queue {
    /// A queue bounded to `max_size` rows, or unbounded for `None`.
    pub fn new(max_size: Option<usize>) -> Self {
        Queue {
            max_size: max_size.map(|m| m as i64).unwrap_or(UNBOUNDED),
            buffer: VecDeque::new(),
        }
    }

    /// Drops the front row without reading it.
    pub fn discard_front(&mut self) -> bool {
        self.buffer.pop_front().is_some()
    }

    fn drain_request(&self) -> bool {
        if self.max_size == UNBOUNDED {
            true
        } else {
            self.buffer.len() as i64 >= self.max_size
        }
    }
}

impl Collection for Queue {
    fn explain(&self, explain: &mut Explain) {
        explain.put("queue");
    }

    fn initialize(&mut self, _program: &Program) -> Result<(), ExecError> {
        Ok(())
    }

    fn terminate(&mut self, _program: &Program) {
        self.buffer.clear();
    }

    fn clear(&mut self) {
        self.buffer.clear();
    }

    fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    fn class_id(&self) -> ClassId {
        ClassId::QueueCollection
    }

    fn write_to(&self, writer: &mut ArchiveWriter) {
        writer.write_i64(self.max_size);
    }

    fn read_payload(&mut self, reader: &mut ArchiveReader<'_>) -> Result<(), ExecError> {
        self.max_size = reader.read_i64()?;
        Ok(())
    }

    fn put_data(&mut self, _program: &Program, row: &Value) -> Result<bool, ExecError> {
        self.buffer.push_back(copy_as_row(row));
        trace!(len = self.buffer.len(), "queue put");
        Ok(self.drain_request())
    }

    fn put_finish(&mut self, _program: &Program) -> Result<(), ExecError> {
        Ok(())
    }

    fn get_data(&mut self, _program: &Program, row: &mut Value) -> Result<bool, ExecError> {
        match self.buffer.pop_front() {
            Some(front) => {
                assign_into_row(row, &front)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn reset_get(&mut self) {
        self.buffer.clear();
    }
}

#[derive(Debug, Default)]
struct SafeState {
    buffer: VecDeque<DataArray>,
    initialized: u32,
    finished: u32,
    terminated: u32,
    last: bool,
}

/// Concurrent bounded FIFO with event-driven back-pressure.
///
/// Producers block (in 100 ms polls) while the queue is full; the consumer
/// blocks while it is empty and a producer may still put. Producer `finish`
/// calls are counted against the initialized participants; the consumer's
/// `finish` raises the cancellation latch so pending producers fail with
/// [`ExecError::Cancelled`].
#[derive(Debug, Default)]
pub struct SafeQueue {
    max_size: i64,
    state: Mutex<SafeState>,
    read_event: Condvar,
    write_event: Condvar,
}

impl SafeQueue {
    /// A queue bounded to `max_size` rows, or unbounded for `None`.
    pub fn new(max_size: Option<usize>) -> Self {
        SafeQueue {
            max_size: max_size.map(|m| m as i64).unwrap_or(UNBOUNDED),
            ..SafeQueue::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, SafeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_full(&self, state: &SafeState) -> bool {
        self.max_size != UNBOUNDED && state.buffer.len() as i64 >= self.max_size
    }

    /// Registers one participant. Each participant pairs this with
    /// [`SafeQueue::shared_terminate`].
    pub fn shared_initialize(&self) {
        self.lock().initialized += 1;
    }

    /// Unregisters one participant, raising the cancellation latch.
    pub fn shared_terminate(&self) {
        let mut state = self.lock();
        if !state.last {
            state.last = true;
        }
        state.terminated += 1;
        if state.terminated == state.initialized {
            state.buffer.clear();
        }
    }

    /// Blocking producer put. Never requests draining; a cancelled queue
    /// raises [`ExecError::Cancelled`].
    pub fn shared_put(&self, row: &DataArray) -> Result<bool, ExecError> {
        let mut state = self.lock();
        loop {
            if state.last {
                return Err(ExecError::Cancelled);
            }
            if !self.is_full(&state) {
                break;
            }
            let (guard, _) = self
                .read_event
                .wait_timeout(state, POLL_INTERVAL)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
        state.buffer.push_back(row.clone());
        drop(state);
        self.write_event.notify_all();
        Ok(false)
    }

    /// Blocking consumer take; `None` after every producer finished.
    pub fn shared_get(&self) -> Result<Option<DataArray>, ExecError> {
        let mut state = self.lock();
        loop {
            if let Some(front) = state.buffer.pop_front() {
                drop(state);
                self.read_event.notify_all();
                return Ok(Some(front));
            }
            let settled = state.finished + state.terminated;
            if settled == 0 || state.initialized > settled + 1 {
                // Some producer may still put.
                let (guard, _) = self
                    .write_event
                    .wait_timeout(state, POLL_INTERVAL)
                    .unwrap_or_else(PoisonError::into_inner);
                state = guard;
                continue;
            }
            return Ok(None);
        }
    }

    /// Producer-side end of input.
    pub fn shared_put_finish(&self) {
        let mut state = self.lock();
        state.finished += 1;
        if state.finished + state.terminated + 1 == state.initialized {
            drop(state);
            self.write_event.notify_all();
        }
    }

    /// Consumer-side completion: cancels producers and drains leftovers.
    pub fn shared_get_finish(&self) {
        let mut state = self.lock();
        state.last = true;
        state.buffer.clear();
        state.finished = 0;
        drop(state);
        self.read_event.notify_all();
    }

    /// Clears the cancellation latch for a rerun.
    pub fn shared_reset(&self) {
        self.lock().last = false;
    }

    /// Current buffered row count.
    pub fn len(&self) -> usize {
        self.lock().buffer.len()
    }

    /// Whether no rows are buffered.
    pub fn is_empty(&self) -> bool {
        self.lock().buffer.is_empty()
    }
}

impl Collection for SafeQueue {
    fn explain(&self, explain: &mut Explain) {
        explain.put("safe queue");
    }

    fn initialize(&mut self, _program: &Program) -> Result<(), ExecError> {
        self.shared_initialize();
        Ok(())
    }

    fn terminate(&mut self, _program: &Program) {
        self.shared_terminate();
    }

    fn clear(&mut self) {
        self.lock().buffer.clear();
    }

    fn is_empty(&self) -> bool {
        SafeQueue::is_empty(self)
    }

    fn class_id(&self) -> ClassId {
        ClassId::SafeQueueCollection
    }

    fn write_to(&self, writer: &mut ArchiveWriter) {
        writer.write_i64(self.max_size);
    }

    fn read_payload(&mut self, reader: &mut ArchiveReader<'_>) -> Result<(), ExecError> {
        self.max_size = reader.read_i64()?;
        Ok(())
    }

    fn put_data(&mut self, _program: &Program, row: &Value) -> Result<bool, ExecError> {
        self.shared_put(&copy_as_row(row))
    }

    fn put_finish(&mut self, _program: &Program) -> Result<(), ExecError> {
        self.shared_put_finish();
        Ok(())
    }

    fn get_data(&mut self, _program: &Program, row: &mut Value) -> Result<bool, ExecError> {
        match self.shared_get()? {
            Some(front) => {
                assign_into_row(row, &front)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn get_finish(&mut self, _program: &Program) -> Result<(), ExecError> {
        self.shared_get_finish();
        Ok(())
    }

    fn reset_get(&mut self) {
        self.shared_reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(v: i32) -> DataArray {
        DataArray::from_values(vec![Value::from(v)])
    }

    #[test]
    fn bounded_queue_signals_drain_at_capacity() {
        let program = Program::new();
        let mut queue = Queue::new(Some(2));
        let row_value = Value::from(row(1));
        assert!(!queue.put_data(&program, &row_value).unwrap());
        assert!(queue.put_data(&program, &row_value).unwrap());
        assert!(queue.put_data(&program, &row_value).unwrap());
    }

    #[test]
    fn unbounded_queue_always_requests_drain() {
        let program = Program::new();
        let mut queue = Queue::new(None);
        assert!(queue.put_data(&program, &Value::from(row(1))).unwrap());
    }

    #[test]
    fn fifo_order_and_discard() {
        let program = Program::new();
        let mut queue = Queue::new(None);
        for i in 0..3 {
            queue.put_data(&program, &Value::from(row(i))).unwrap();
        }
        assert!(queue.discard_front());
        let mut out = Value::from(row(0));
        assert!(queue.get_data(&program, &mut out).unwrap());
        assert_eq!(out.as_array().unwrap().element(0).unwrap().to_i32(), Some(1));
    }

    #[test]
    fn safe_queue_single_threaded_protocol() {
        let queue = SafeQueue::new(Some(4));
        queue.shared_initialize();
        queue.shared_initialize();
        queue.shared_put(&row(1)).unwrap();
        queue.shared_put(&row(2)).unwrap();
        queue.shared_put_finish();
        assert_eq!(
            queue.shared_get().unwrap().unwrap().element(0).unwrap().to_i32(),
            Some(1)
        );
        assert_eq!(
            queue.shared_get().unwrap().unwrap().element(0).unwrap().to_i32(),
            Some(2)
        );
        assert!(queue.shared_get().unwrap().is_none());
    }

    #[test]
    fn cancellation_rejects_later_puts() {
        let queue = SafeQueue::new(Some(4));
        queue.shared_initialize();
        queue.shared_initialize();
        queue.shared_get_finish();
        assert_eq!(queue.shared_put(&row(1)), Err(ExecError::Cancelled));
        queue.shared_reset();
        assert!(queue.shared_put(&row(1)).is_ok());
    }
}
