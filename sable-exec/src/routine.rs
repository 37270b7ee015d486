//! Stored routines callable from the Invoke action.

use std::collections::HashMap;

use sable_types::{DataArray, Value};

use crate::error::ExecError;
use crate::program::Program;

/// A compiled stored function: one step produces at most one output value.
pub trait Routine {
    /// Prepares the routine for execution.
    fn initialize(&mut self, _program: &Program) -> Result<(), ExecError> {
        Ok(())
    }
    /// Runs one step with the given parameter row.
    fn step(&mut self, arguments: &DataArray) -> Result<Option<Value>, ExecError>;
    /// Completes the current run.
    fn finish(&mut self) {}
    /// Returns the routine to its post-initialize state.
    fn reset(&mut self) {}
    /// Releases every resource.
    fn terminate(&mut self) {}
}

/// Resolves routine names for a program.
pub trait RoutineProvider {
    /// Builds a fresh routine for `name`, if it exists.
    fn resolve(&self, name: &str) -> Option<Box<dyn Routine>>;
}

/// A routine backed by a plain function.
pub struct FnRoutine<F>(pub F);

impl<F> Routine for FnRoutine<F>
where
    F: FnMut(&DataArray) -> Option<Value>,
{
    fn step(&mut self, arguments: &DataArray) -> Result<Option<Value>, ExecError> {
        Ok((self.0)(arguments))
    }
}

type RoutineFactory = Box<dyn Fn() -> Box<dyn Routine>>;

/// A name-keyed routine registry.
#[derive(Default)]
pub struct RoutineMap {
    factories: HashMap<String, RoutineFactory>,
}

impl RoutineMap {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under `name`.
    pub fn insert<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn Routine> + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }
}

impl RoutineProvider for RoutineMap {
    fn resolve(&self, name: &str) -> Option<Box<dyn Routine>> {
        self.factories.get(name).map(|factory| factory())
    }
}
