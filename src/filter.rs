//! Temporal Filter
//!
//! Stateful accept/reject/annotate step applied to one [`Sample`] at a time by
//! the processing task.
//!
//! # Algorithm
//!
//! For each sample, in order:
//!
//! 1. **RSSI gate**: reject if `rssi < threshold * -100`. A rejected sample does
//!    not touch the history.
//! 2. **Amplitude stability** (amplitude enabled, sample carries amplitude):
//!    compare the sample's mean amplitude against the mean of the means of all
//!    populated history slots. A relative deviation above `threshold` sets
//!    [`Sample::significant_change`]. The sample is never rejected here. The
//!    amplitude vector is always written to the current slot.
//! 3. **Phase statistics** (phase enabled, sample carries phase): record mean
//!    and population variance, write the phase vector to the current slot.
//! 4. Advance the history cursor modulo [`HISTORY_LEN`].
//!
//! # Memory
//!
//! The history is an arena of [`HISTORY_LEN`] fixed-size slots per feature,
//! allocated once in [`TemporalFilter::new`] and overwritten in place.
//! Reconfiguration builds a new filter rather than mutating this one.

use crate::config::CollectorConfig;
use crate::error::CollectorResult;
use crate::sample::{Sample, MAX_SUBCARRIERS};
use serde::Serialize;
use tracing::trace;

/// Number of history slots kept per feature.
pub const HISTORY_LEN: usize = 10;

/// Added to the history mean before dividing, so a silent history does not
/// divide by zero.
const DEVIATION_EPSILON: f32 = 0.001;

/// Filter tunables, taken from the collector configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FilterConfig {
    /// Sensitivity in 0.0..=1.0; also scales the RSSI gate
    pub threshold: f32,
    /// Run the amplitude deviation check
    pub amplitude_enabled: bool,
    /// Record phase statistics
    pub phase_enabled: bool,
}

impl FilterConfig {
    /// RSSI below this value (dBm) is rejected.
    pub fn rssi_threshold(&self) -> f32 {
        self.threshold * -100.0
    }
}

impl From<&CollectorConfig> for FilterConfig {
    fn from(config: &CollectorConfig) -> Self {
        Self {
            threshold: config.filter_threshold,
            amplitude_enabled: config.enable_amplitude,
            phase_enabled: config.enable_phase,
        }
    }
}

/// Outcome of filtering one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterVerdict {
    /// Forward the sample
    Accept,
    /// Drop the sample; counted, never reported as an error
    Reject,
}

/// Counters for one filter instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    /// Samples seen
    pub processed: u64,
    /// Samples accepted
    pub passed: u64,
    /// Samples rejected by the RSSI gate
    pub filtered: u64,
}

/// Mean and population variance of the last phase vector seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PhaseStats {
    /// Mean phase, radians
    pub mean: f32,
    /// Population variance, radians squared
    pub variance: f32,
}

#[derive(Clone, Copy)]
struct HistorySlot {
    values: [f32; MAX_SUBCARRIERS],
    len: usize,
}

impl HistorySlot {
    const EMPTY: Self = Self {
        values: [0.0; MAX_SUBCARRIERS],
        len: 0,
    };

    fn write(&mut self, src: &[f32]) {
        let n = src.len().min(MAX_SUBCARRIERS);
        self.values[..n].copy_from_slice(&src[..n]);
        self.len = n;
    }

    fn mean(&self) -> Option<f32> {
        (self.len > 0).then(|| mean(&self.values[..self.len]))
    }
}

/// Rolling-history CSI filter. Owned by the processing task.
pub struct TemporalFilter {
    config: FilterConfig,
    amplitude_history: Vec<HistorySlot>,
    phase_history: Vec<HistorySlot>,
    cursor: usize,
    stats: FilterStats,
    last_phase: Option<PhaseStats>,
}

impl TemporalFilter {
    /// Allocate a filter with an empty history.
    ///
    /// # Errors
    /// `OutOfMemory` if the history arena cannot be allocated.
    pub fn new(config: FilterConfig) -> CollectorResult<Self> {
        Ok(Self {
            config,
            amplitude_history: allocate_history()?,
            phase_history: allocate_history()?,
            cursor: 0,
            stats: FilterStats::default(),
            last_phase: None,
        })
    }

    /// Tunables this instance was built with.
    pub fn config(&self) -> FilterConfig {
        self.config
    }

    /// Counters since construction.
    pub fn stats(&self) -> FilterStats {
        self.stats
    }

    /// Phase statistics recorded for the most recent sample that carried phase.
    pub fn last_phase_stats(&self) -> Option<PhaseStats> {
        self.last_phase
    }

    /// Next history slot to be written, always in `0..HISTORY_LEN`.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Run one sample through the filter, annotating it in place.
    pub fn process(&mut self, sample: &mut Sample) -> FilterVerdict {
        self.stats.processed += 1;

        if f32::from(sample.rssi) < self.config.rssi_threshold() {
            self.stats.filtered += 1;
            trace!(rssi = sample.rssi, "Sample below RSSI gate");
            return FilterVerdict::Reject;
        }

        let mut significant = false;
        if self.config.amplitude_enabled {
            if let Some(amplitude) = sample.amplitude() {
                if let Some(history_mean) = mean_of_means(&self.amplitude_history) {
                    let deviation =
                        (mean(amplitude) - history_mean).abs() / (history_mean + DEVIATION_EPSILON);
                    if deviation > self.config.threshold {
                        significant = true;
                        trace!(deviation, "Significant amplitude change");
                    }
                }
                self.amplitude_history[self.cursor].write(amplitude);
            }
        }
        if significant {
            sample.significant_change = true;
        }

        if self.config.phase_enabled {
            if let Some(phase) = sample.phase() {
                self.last_phase = Some(phase_stats(phase));
                self.phase_history[self.cursor].write(phase);
            }
        }

        self.cursor = (self.cursor + 1) % HISTORY_LEN;
        self.stats.passed += 1;
        FilterVerdict::Accept
    }
}

fn allocate_history() -> CollectorResult<Vec<HistorySlot>> {
    let mut slots = Vec::new();
    slots.try_reserve_exact(HISTORY_LEN)?;
    slots.resize(HISTORY_LEN, HistorySlot::EMPTY);
    Ok(slots)
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

fn mean_of_means(history: &[HistorySlot]) -> Option<f32> {
    let (sum, count) = history
        .iter()
        .filter_map(HistorySlot::mean)
        .fold((0.0f32, 0usize), |(sum, count), m| (sum + m, count + 1));
    (count > 0).then(|| sum / count as f32)
}

fn phase_stats(phase: &[f32]) -> PhaseStats {
    let mean = mean(phase);
    let variance = if phase.is_empty() {
        0.0
    } else {
        phase.iter().map(|p| (p - mean).powi(2)).sum::<f32>() / phase.len() as f32
    };
    PhaseStats { mean, variance }
}
