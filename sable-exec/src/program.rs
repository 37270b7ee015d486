//! The execution program: the arena every action and collection reaches into.
//!
//! Iterators, collections, and actions refer to each other by integer id
//! through the program; no owning cycles exist. Variable slots use interior
//! mutability under the single-threaded cooperative driving invariant; work
//! that crosses threads transfers owned rows instead.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;

use sable_norm::Normalizer;
use sable_types::Value;

use crate::config::ExecConfig;
use crate::error::ExecError;
use crate::locator::Locator;
use crate::routine::{Routine, RoutineProvider};
use crate::transport::Transport;

/// Owner of variable slots, locators, connections, and configuration.
pub struct Program {
    variables: Vec<RefCell<Value>>,
    locators: Vec<RefCell<Locator>>,
    connections: Vec<RefCell<Box<dyn Transport>>>,
    routines: Option<Box<dyn RoutineProvider>>,
    normalizer: Option<Rc<RefCell<Normalizer>>>,
    config: ExecConfig,
    sent_rows: Cell<u64>,
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

impl Program {
    /// Creates an empty program with default configuration.
    pub fn new() -> Self {
        Self::with_config(ExecConfig::default())
    }

    /// Creates an empty program with the given configuration.
    pub fn with_config(config: ExecConfig) -> Self {
        Program {
            variables: Vec::new(),
            locators: Vec::new(),
            connections: Vec::new(),
            routines: None,
            normalizer: None,
            config,
            sent_rows: Cell::new(0),
        }
    }

    /// Registers a variable slot; the returned id is how actions refer to it.
    pub fn add_variable(&mut self, value: Value) -> i32 {
        self.variables.push(RefCell::new(value));
        (self.variables.len() - 1) as i32
    }

    /// Number of registered variables.
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    fn slot(&self, id: i32) -> Result<&RefCell<Value>, ExecError> {
        usize::try_from(id)
            .ok()
            .and_then(|i| self.variables.get(i))
            .ok_or(ExecError::BadArgument)
    }

    /// Borrows the variable with the given id.
    pub fn variable(&self, id: i32) -> Result<Ref<'_, Value>, ExecError> {
        Ok(self.slot(id)?.borrow())
    }

    /// Mutably borrows the variable with the given id.
    pub fn variable_mut(&self, id: i32) -> Result<RefMut<'_, Value>, ExecError> {
        Ok(self.slot(id)?.borrow_mut())
    }

    /// Registers a locator slot.
    pub fn add_locator(&mut self, locator: Locator) -> i32 {
        self.locators.push(RefCell::new(locator));
        (self.locators.len() - 1) as i32
    }

    /// Borrows the locator with the given id.
    pub fn locator(&self, id: i32) -> Result<Ref<'_, Locator>, ExecError> {
        usize::try_from(id)
            .ok()
            .and_then(|i| self.locators.get(i))
            .map(RefCell::borrow)
            .ok_or(ExecError::BadArgument)
    }

    /// Mutably borrows the locator with the given id.
    pub fn locator_mut(&self, id: i32) -> Result<RefMut<'_, Locator>, ExecError> {
        usize::try_from(id)
            .ok()
            .and_then(|i| self.locators.get(i))
            .map(RefCell::borrow_mut)
            .ok_or(ExecError::BadArgument)
    }

    /// Registers a client connection.
    pub fn add_connection(&mut self, transport: Box<dyn Transport>) -> i32 {
        self.connections.push(RefCell::new(transport));
        (self.connections.len() - 1) as i32
    }

    /// Mutably borrows the connection with the given id.
    pub fn connection_mut(&self, id: i32) -> Result<RefMut<'_, Box<dyn Transport>>, ExecError> {
        usize::try_from(id)
            .ok()
            .and_then(|i| self.connections.get(i))
            .map(RefCell::borrow_mut)
            .ok_or(ExecError::BadArgument)
    }

    /// Installs the stored-routine resolver.
    pub fn set_routine_provider(&mut self, provider: Box<dyn RoutineProvider>) {
        self.routines = Some(provider);
    }

    /// Builds the routine registered under `name`.
    pub fn resolve_routine(&self, name: &str) -> Result<Box<dyn Routine>, ExecError> {
        self.routines
            .as_ref()
            .and_then(|p| p.resolve(name))
            .ok_or(ExecError::StoredFunctionNotFound)
    }

    /// Installs the text normalizer handle.
    pub fn set_normalizer(&mut self, normalizer: Rc<RefCell<Normalizer>>) {
        self.normalizer = Some(normalizer);
    }

    /// The installed normalizer.
    pub fn normalizer(&self) -> Result<Rc<RefCell<Normalizer>>, ExecError> {
        self.normalizer.clone().ok_or(ExecError::NotInitialized)
    }

    /// The execution configuration.
    pub fn config(&self) -> &ExecConfig {
        &self.config
    }

    /// Mutable access to the execution configuration.
    pub fn config_mut(&mut self) -> &mut ExecConfig {
        &mut self.config
    }

    /// Bumps the transaction's sent-row counter.
    pub fn add_sent_row(&self) {
        self.sent_rows.set(self.sent_rows.get() + 1);
    }

    /// Rows sent to the client so far.
    pub fn sent_rows(&self) -> u64 {
        self.sent_rows.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_registration_and_access() {
        let mut program = Program::new();
        let id = program.add_variable(Value::from(3i32));
        assert_eq!(program.variable(id).unwrap().to_i32(), Some(3));
        program.variable_mut(id).unwrap().assign(&Value::from(9i32)).unwrap();
        assert_eq!(program.variable(id).unwrap().to_i32(), Some(9));
        assert!(program.variable(99).is_err());
        assert!(program.variable(-1).is_err());
    }

    #[test]
    fn missing_routine_provider() {
        let program = Program::new();
        assert_eq!(
            program.resolve_routine("f").err(),
            Some(ExecError::StoredFunctionNotFound)
        );
    }

    #[test]
    fn sent_row_counter() {
        let program = Program::new();
        program.add_sent_row();
        program.add_sent_row();
        assert_eq!(program.sent_rows(), 2);
    }
}
