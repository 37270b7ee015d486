//! Late-binding references from actions to program slots.
//!
//! A holder carries only an integer id through serialization; `initialize`
//! resolves it against the program and performs the dynamic type check. A
//! negative id marks an absent optional operand; initializing it is a no-op
//! and it never becomes readable.

use std::cell::{Ref, RefMut};

use sable_types::{ArchiveReader, ArchiveWriter, DataType, Value};

use crate::error::ExecError;
use crate::locator::Locator;
use crate::program::Program;

/// A reference to a program variable slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataHolder {
    id: i32,
    initialized: bool,
}

impl Default for DataHolder {
    fn default() -> Self {
        Self::invalid()
    }
}

impl DataHolder {
    /// A holder for the given slot id.
    pub fn new(id: i32) -> Self {
        DataHolder {
            id,
            initialized: false,
        }
    }

    /// A holder for an absent optional operand.
    pub const fn invalid() -> Self {
        DataHolder {
            id: -1,
            initialized: false,
        }
    }

    /// The slot id, negative when absent.
    pub const fn id(&self) -> i32 {
        self.id
    }

    /// Whether the holder refers to a slot at all.
    pub const fn is_valid(&self) -> bool {
        self.id >= 0
    }

    /// Whether `initialize` resolved the slot.
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Resolves the slot; a no-op for absent holders.
    pub fn initialize(&mut self, program: &Program) -> Result<(), ExecError> {
        if !self.is_valid() {
            return Ok(());
        }
        program.variable(self.id)?;
        self.initialized = true;
        Ok(())
    }

    /// Resolves the slot and checks its declared type.
    pub fn initialize_typed(
        &mut self,
        program: &Program,
        expected: DataType,
    ) -> Result<(), ExecError> {
        if !self.is_valid() {
            return Ok(());
        }
        let slot_type = program.variable(self.id)?.data_type();
        if slot_type != expected && slot_type != DataType::Data {
            return Err(ExecError::TypeMismatch);
        }
        self.initialized = true;
        Ok(())
    }

    /// Releases the binding.
    pub fn terminate(&mut self) {
        self.initialized = false;
    }

    /// Borrows the referenced value.
    pub fn value<'a>(&self, program: &'a Program) -> Result<Ref<'a, Value>, ExecError> {
        if !self.initialized {
            return Err(ExecError::NotInitialized);
        }
        program.variable(self.id)
    }

    /// Mutably borrows the referenced value.
    pub fn value_mut<'a>(&self, program: &'a Program) -> Result<RefMut<'a, Value>, ExecError> {
        if !self.initialized {
            return Err(ExecError::NotInitialized);
        }
        program.variable_mut(self.id)
    }

    /// The referenced value as i32, if it is a non-null number.
    pub fn int_value(&self, program: &Program) -> Result<Option<i32>, ExecError> {
        Ok(self.value(program)?.to_i32())
    }

    /// Writes the id.
    pub fn serialize(&self, writer: &mut ArchiveWriter) {
        writer.write_i32(self.id);
    }

    /// Reads an id written by [`DataHolder::serialize`].
    pub fn deserialize(reader: &mut ArchiveReader<'_>) -> Result<Self, ExecError> {
        Ok(DataHolder::new(reader.read_i32()?))
    }

    /// Renders the holder for explain output.
    pub fn explain(&self, explain: &mut crate::explain::Explain) {
        explain.put("#").put_i32(self.id);
    }
}

/// A reference to a program locator slot.
#[derive(Debug, Clone, Copy)]
pub struct LocatorHolder {
    id: i32,
    initialized: bool,
}

impl Default for LocatorHolder {
    fn default() -> Self {
        LocatorHolder {
            id: -1,
            initialized: false,
        }
    }
}

impl LocatorHolder {
    /// A holder for the given locator id.
    pub fn new(id: i32) -> Self {
        LocatorHolder {
            id,
            initialized: false,
        }
    }

    /// The locator id.
    pub const fn id(&self) -> i32 {
        self.id
    }

    /// Resolves the locator slot.
    pub fn initialize(&mut self, program: &Program) -> Result<(), ExecError> {
        if self.id < 0 {
            return Ok(());
        }
        program.locator(self.id)?;
        self.initialized = true;
        Ok(())
    }

    /// Releases the binding.
    pub fn terminate(&mut self) {
        self.initialized = false;
    }

    /// Borrows the locator.
    pub fn locator<'a>(&self, program: &'a Program) -> Result<Ref<'a, Locator>, ExecError> {
        if !self.initialized {
            return Err(ExecError::NotInitialized);
        }
        program.locator(self.id)
    }

    /// Mutably borrows the locator.
    pub fn locator_mut<'a>(&self, program: &'a Program) -> Result<RefMut<'a, Locator>, ExecError> {
        if !self.initialized {
            return Err(ExecError::NotInitialized);
        }
        program.locator_mut(self.id)
    }

    /// Writes the id.
    pub fn serialize(&self, writer: &mut ArchiveWriter) {
        writer.write_i32(self.id);
    }

    /// Reads an id written by [`LocatorHolder::serialize`].
    pub fn deserialize(reader: &mut ArchiveReader<'_>) -> Result<Self, ExecError> {
        Ok(LocatorHolder::new(reader.read_i32()?))
    }
}
