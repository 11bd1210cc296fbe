//! CSI sample model and ingestion-time decoding.
//!
//! A [`Sample`] is one CSI measurement. It exclusively owns its raw I/Q bytes and
//! the amplitude/phase arrays derived from them. `Sample` is move-only (no
//! `Clone`): it travels buffer → filter → output by value and is released exactly
//! once, either when a consumer drops it, when an overflow policy evicts it, or
//! when shutdown drains what is left.
//!
//! # Frame Layout
//!
//! Each subcarrier's frequency response arrives as two consecutive signed bytes,
//! imaginary part first, then real part:
//!
//! ```text
//! [imag0, real0, imag1, real1, ...]
//! ```
//!
//! - amplitude = sqrt(real² + imag²)
//! - phase     = atan2(imag, real)
//!
//! At most [`MAX_SUBCARRIERS`] subcarriers are decoded; trailing bytes stay in the
//! raw buffer but get no derived values.

use crate::error::{CollectorError, CollectorResult};
use crate::radio::RawCsiFrame;
use serde::{Serialize, Serializer};
use std::fmt;

/// Upper bound on decoded subcarriers per sample.
pub const MAX_SUBCARRIERS: usize = 64;

/// Upper bound on raw CSI bytes accepted from the driver.
///
/// Keeps the ingestion-time allocation bounded. Longer frames are not decoded;
/// the collector counts them in `packets_dropped`.
pub const MAX_CSI_LEN: usize = 1024;

/// 6-byte source address of a received frame.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress(pub [u8; 6]);

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddress({self})")
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Which derived arrays to compute during decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureSet {
    /// Per-subcarrier magnitude
    pub amplitude: bool,
    /// Per-subcarrier phase, radians
    pub phase: bool,
}

/// One CSI measurement.
#[derive(Debug, Serialize)]
pub struct Sample {
    /// Capture time, monotonic microseconds
    pub timestamp_us: u64,
    /// Transmitter address
    pub mac: MacAddress,
    /// Signal strength in dBm
    pub rssi: i8,
    /// Primary channel number
    pub channel: u8,
    /// Secondary channel number
    pub secondary_channel: u8,
    raw: Vec<i8>,
    amplitude: Option<Vec<f32>>,
    phase: Option<Vec<f32>>,
    subcarrier_count: u8,
    /// Whether the sample holds decoded data
    pub valid: bool,
    /// Set by the temporal filter when mean amplitude moved more than the threshold
    pub significant_change: bool,
}

impl Sample {
    /// Decode a driver frame into an owned sample.
    ///
    /// Runs in the ingestion context: allocation is fallible and bounded by
    /// [`MAX_CSI_LEN`], and derived features are plain arithmetic bounded by
    /// [`MAX_SUBCARRIERS`].
    ///
    /// # Errors
    /// - `InvalidArgument` if the frame exceeds [`MAX_CSI_LEN`] bytes
    /// - `OutOfMemory` if a buffer cannot be allocated
    pub fn decode(
        frame: &RawCsiFrame,
        features: FeatureSet,
        timestamp_us: u64,
    ) -> CollectorResult<Self> {
        if frame.data.len() > MAX_CSI_LEN {
            return Err(CollectorError::InvalidArgument(format!(
                "CSI frame of {} bytes exceeds {} byte limit",
                frame.data.len(),
                MAX_CSI_LEN
            )));
        }

        let mut raw = Vec::new();
        raw.try_reserve_exact(frame.data.len())?;
        raw.extend_from_slice(&frame.data);

        let subcarrier_count = (raw.len() / 2).min(MAX_SUBCARRIERS);

        let amplitude = if features.amplitude {
            Some(derive_per_subcarrier(&raw, subcarrier_count, |imag, real| {
                (real * real + imag * imag).sqrt()
            })?)
        } else {
            None
        };

        let phase = if features.phase {
            Some(derive_per_subcarrier(&raw, subcarrier_count, f32::atan2)?)
        } else {
            None
        };

        Ok(Self {
            timestamp_us,
            mac: frame.mac,
            rssi: frame.rssi,
            channel: frame.channel,
            secondary_channel: frame.secondary_channel,
            valid: !raw.is_empty(),
            raw,
            amplitude,
            phase,
            subcarrier_count: subcarrier_count as u8,
            significant_change: false,
        })
    }

    /// Raw CSI byte length.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Whether the raw buffer is empty (never decoded, or released).
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Raw signed I/Q bytes as delivered by the driver.
    pub fn raw(&self) -> &[i8] {
        &self.raw
    }

    /// Per-subcarrier amplitude, if computed.
    pub fn amplitude(&self) -> Option<&[f32]> {
        self.amplitude.as_deref()
    }

    /// Per-subcarrier phase in radians, if computed.
    pub fn phase(&self) -> Option<&[f32]> {
        self.phase.as_deref()
    }

    /// Number of decoded subcarriers (≤ [`MAX_SUBCARRIERS`]).
    pub fn subcarrier_count(&self) -> usize {
        self.subcarrier_count as usize
    }

    /// Take ownership of the raw bytes, leaving the sample released.
    pub fn take_raw(&mut self) -> Vec<i8> {
        let raw = std::mem::take(&mut self.raw);
        self.release();
        raw
    }

    /// Release the owned buffers now instead of at drop.
    ///
    /// Idempotent: releasing an already released sample does nothing.
    pub fn release(&mut self) {
        self.raw = Vec::new();
        self.amplitude = None;
        self.phase = None;
        self.subcarrier_count = 0;
        self.valid = false;
    }

    /// Whether all three owned buffers have been given back.
    pub fn is_released(&self) -> bool {
        self.raw.capacity() == 0 && self.amplitude.is_none() && self.phase.is_none()
    }
}

/// Release a sample's buffers. `None` is a no-op.
pub fn free_sample(sample: Option<&mut Sample>) {
    if let Some(sample) = sample {
        sample.release();
    }
}

fn derive_per_subcarrier(
    raw: &[i8],
    subcarriers: usize,
    f: impl Fn(f32, f32) -> f32,
) -> CollectorResult<Vec<f32>> {
    let mut out = Vec::new();
    out.try_reserve_exact(subcarriers)?;
    out.extend(
        raw.chunks_exact(2)
            .take(subcarriers)
            .map(|pair| f(f32::from(pair[0]), f32::from(pair[1]))),
    );
    Ok(out)
}
