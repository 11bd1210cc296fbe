//! Error types for the CSI collector.
//!
//! `CollectorError` is the single error type callers of the collector see. It is
//! built with `thiserror` and groups failures the same way the collector's
//! contract does:
//!
//! - **`InvalidArgument`**: input rejected at the point of entry (out-of-range
//!   configuration, malformed sample). Nothing was applied.
//! - **`InvalidState`**: the operation does not fit the current lifecycle state,
//!   e.g. `start()` before `init()` or `get_data()` while stopped.
//! - **`OutOfMemory`**: an allocation during init/start or sample decoding
//!   failed. Partial allocations were unwound before returning.
//! - **`Timeout`**: no data arrived within the requested window. An expected
//!   outcome, not a failure.
//! - **`Radio`**: the driver boundary refused a registration, configuration or
//!   enable request. Wraps [`RadioError`] via `#[from]`.
//!
//! Samples dropped by the temporal filter are never reported through this type;
//! they only show up in the statistics counters.

use std::collections::TryReserveError;
use thiserror::Error;

/// Convenience alias for results using the collector error type.
pub type CollectorResult<T> = std::result::Result<T, CollectorError>;

/// Errors returned by collector operations.
#[derive(Error, Debug)]
pub enum CollectorError {
    /// Out-of-range configuration or oversized input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation not allowed in the current lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Allocation failed; nothing was changed
    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    /// No data within the requested window. Not a failure.
    #[error("Timed out waiting for CSI data")]
    Timeout,

    /// Driver refused a registration, configuration or enable step
    #[error("Radio error: {0}")]
    Radio(#[from] RadioError),
}

impl CollectorError {
    /// True for the expected "nothing arrived yet" outcome.
    pub fn is_timeout(&self) -> bool {
        matches!(self, CollectorError::Timeout)
    }

    pub(crate) fn not_initialized() -> Self {
        CollectorError::InvalidState("collector is not initialized".into())
    }

    pub(crate) fn not_running() -> Self {
        CollectorError::InvalidState("collector is not running".into())
    }
}

impl From<TryReserveError> for CollectorError {
    fn from(value: TryReserveError) -> Self {
        CollectorError::OutOfMemory(value.to_string())
    }
}

/// Failures reported by the radio driver boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RadioError {
    /// `set_csi_callback` failed
    #[error("Failed to register CSI callback: {0}")]
    CallbackRegistration(String),

    /// `configure_csi` failed
    #[error("Failed to configure CSI: {0}")]
    Configuration(String),

    /// `enable_csi(true)` failed
    #[error("Failed to enable CSI reporting: {0}")]
    Enable(String),
}
