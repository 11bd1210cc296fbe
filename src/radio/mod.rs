//! Radio Driver Boundary
//!
//! The collector depends on exactly three driver entry points, modelled by the
//! [`CsiRadio`] trait:
//!
//! - `set_csi_callback` - install or remove the single ingestion callback
//! - `configure_csi` - push [`CsiOptions`] to the receive chain
//! - `enable_csi` - turn CSI reporting on or off
//!
//! # Ingestion Context
//!
//! The driver invokes the callback from its own delivery context (an interrupt
//! handler or driver thread). Callbacks must return quickly and must not block.
//! Implementations guarantee that once `set_csi_callback(None)` returns, the
//! previous callback is no longer running and will not be called again.
//!
//! # Implementations
//!
//! - [`SimulatedRadio`] - in-process radio for tests and the demo binary

pub mod sim;

pub use sim::SimulatedRadio;

use crate::error::RadioError;
use crate::sample::MacAddress;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Ingestion callback installed on the radio.
pub type CsiRxCallback = Arc<dyn Fn(&RawCsiFrame) + Send + Sync>;

/// CSI report as delivered by the driver. Borrowed by the callback for the
/// duration of the call only.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCsiFrame {
    /// Transmitter address
    pub mac: MacAddress,
    /// Signal strength in dBm
    pub rssi: i8,
    /// Primary channel
    pub channel: u8,
    /// Secondary channel (0 = none)
    pub secondary_channel: u8,
    /// Signed I/Q bytes, imaginary first per subcarrier
    pub data: Vec<i8>,
}

impl RawCsiFrame {
    /// Build a frame without a secondary channel.
    pub fn new(mac: MacAddress, rssi: i8, channel: u8, data: Vec<i8>) -> Self {
        Self {
            mac,
            rssi,
            channel,
            secondary_channel: 0,
            data,
        }
    }

    /// Set the secondary channel.
    pub fn with_secondary_channel(mut self, secondary_channel: u8) -> Self {
        self.secondary_channel = secondary_channel;
        self
    }
}

/// Receive-chain CSI options pushed to the driver before reporting is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsiOptions {
    /// Report CSI from the legacy long training field
    pub lltf_enabled: bool,
    /// Report CSI from the HT long training field
    pub htltf_enabled: bool,
    /// Report CSI from the STBC HT-LTF2 field
    pub stbc_htltf2_enabled: bool,
    /// Merge L-LTF and HT-LTF data when both are present
    pub ltf_merge_enabled: bool,
    /// Smooth adjacent subcarriers in the driver
    pub channel_filter_enabled: bool,
    /// Use `shift` instead of automatic scaling
    pub manual_scale: bool,
    /// Manual left-shift applied to CSI values (0..=15)
    pub shift: u8,
}

impl Default for CsiOptions {
    fn default() -> Self {
        Self {
            lltf_enabled: true,
            htltf_enabled: true,
            stbc_htltf2_enabled: false,
            ltf_merge_enabled: true,
            channel_filter_enabled: false,
            manual_scale: true,
            shift: 0,
        }
    }
}

/// Driver registration point for CSI reporting.
///
/// All methods are synchronous and short; they are called from lifecycle
/// operations, never from the ingestion path.
pub trait CsiRadio: Send + Sync {
    /// Install (`Some`) or remove (`None`) the ingestion callback.
    ///
    /// Removing must wait for any in-flight invocation to finish.
    fn set_csi_callback(&self, callback: Option<CsiRxCallback>) -> Result<(), RadioError>;

    /// Apply receive-chain options.
    fn configure_csi(&self, options: &CsiOptions) -> Result<(), RadioError>;

    /// Turn CSI reporting on or off.
    fn enable_csi(&self, enable: bool) -> Result<(), RadioError>;
}
