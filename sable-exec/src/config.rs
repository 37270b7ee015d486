//! Per-program execution configuration.

/// Tunables carried by a program instead of process-wide state.
#[derive(Debug, Clone)]
pub struct ExecConfig {
    /// Demote arithmetic overflow to a NULL result instead of raising
    /// `NumericValueOutOfRange`.
    pub overflow_as_null: bool,
    /// Byte size above which in-memory collections are costed at file speed.
    pub collection_threshold: f64,
    /// Memory transfer speed in bytes per second, for the cost model.
    pub memory_transfer_speed: f64,
    /// File transfer speed in bytes per second, for the cost model.
    pub file_transfer_speed: f64,
}

impl Default for ExecConfig {
    fn default() -> Self {
        ExecConfig {
            overflow_as_null: false,
            collection_threshold: 64.0 * 1024.0 * 1024.0,
            memory_transfer_speed: 2_000_000_000.0,
            file_transfer_speed: 100_000_000.0,
        }
    }
}
