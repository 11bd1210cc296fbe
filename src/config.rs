//! Configuration for the CSI collector.
//!
//! Two layers live here:
//!
//! - [`CollectorConfig`]: the runtime pipeline configuration passed to
//!   [`Collector::init`](crate::collector::Collector::init) and
//!   [`Collector::update_config`](crate::collector::Collector::update_config).
//!   Every write is validated as a whole; an invalid value rejects the entire
//!   update.
//! - [`Settings`]: process-level configuration for the `csi-collector` binary,
//!   loaded with `figment`.
//!
//! ## Settings Schema
//!
//! ```toml
//! [logging]
//! level = "info"            # trace, debug, info, warn, error
//! format = "pretty"         # pretty, compact, json
//!
//! [collector]
//! enabled = true
//! sample_rate = 10          # Hz, 1..=100
//! buffer_size = 1024        # bytes, 256..=4096
//! filter_enabled = true
//! filter_threshold = 0.3    # 0.0..=1.0
//! enable_rssi = true
//! enable_phase = true
//! enable_amplitude = true
//! overwrite_oldest = false
//!
//! [radio]
//! lltf_enabled = true
//! shift = 0
//!
//! [reporting]
//! status_interval_secs = 10
//! ```
//!
//! ## Layering
//!
//! 1. Defaults from `Settings::default()`
//! 2. TOML file (optional; missing files fall back to defaults)
//! 3. Environment variables prefixed `CSI_COLLECTOR_`, nested with `__`, e.g.
//!    `CSI_COLLECTOR_COLLECTOR__SAMPLE_RATE=20`

use crate::error::CollectorResult;
use crate::filter::FilterConfig;
use crate::logging::OutputFormat;
use crate::radio::CsiOptions;
use crate::validation::{check_log_level, check_range};
use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::{Figment, Provider};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::Path;
use std::time::Duration;

/// Accepted `sample_rate` values, in Hz.
pub const SAMPLE_RATE_RANGE: RangeInclusive<u32> = 1..=100;

/// Accepted `buffer_size` values, in bytes.
pub const BUFFER_SIZE_RANGE: RangeInclusive<usize> = 256..=4096;

/// Accepted `filter_threshold` values.
pub const THRESHOLD_RANGE: RangeInclusive<f32> = 0.0..=1.0;

/// Bytes of `buffer_size` budgeted per buffered sample.
///
/// `buffer_size` is expressed in bytes for compatibility with existing
/// configuration files; the ingestion buffer holds whole samples, so its
/// capacity is `buffer_size / BYTES_PER_BUFFER_ENTRY` entries (4..=64 over the
/// valid range).
pub const BYTES_PER_BUFFER_ENTRY: usize = 64;

/// Capacity of the output queue read by [`get_data`](crate::collector::Collector::get_data).
pub const OUTPUT_QUEUE_DEPTH: usize = 10;

/// Environment variable prefix for [`Settings`] overrides.
pub const ENV_PREFIX: &str = "CSI_COLLECTOR_";

/// Runtime pipeline configuration.
///
/// Frames longer than [`MAX_CSI_LEN`](crate::sample::MAX_CSI_LEN) bytes are
/// dropped at ingestion regardless of these settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Processing rate in Hz
    pub sample_rate: u32,
    /// Ingestion buffer budget in bytes
    pub buffer_size: usize,
    /// Run the temporal filter on dequeued samples
    pub filter_enabled: bool,
    /// Filter sensitivity, also scales the RSSI gate
    pub filter_threshold: f32,
    /// Carried for API compatibility; RSSI is always recorded
    pub enable_rssi: bool,
    /// Derive per-subcarrier phase at ingestion
    pub enable_phase: bool,
    /// Derive per-subcarrier amplitude at ingestion
    pub enable_amplitude: bool,
    /// Evict the oldest buffered sample on overflow instead of dropping the new one
    pub overwrite_oldest: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 10,
            buffer_size: 1024,
            filter_enabled: true,
            filter_threshold: 0.3,
            enable_rssi: true,
            enable_phase: true,
            enable_amplitude: true,
            overwrite_oldest: false,
        }
    }
}

impl CollectorConfig {
    /// Check every range constraint.
    ///
    /// # Errors
    /// `InvalidArgument` naming the first field out of range.
    pub fn validate(&self) -> CollectorResult<()> {
        check_range("sample_rate", self.sample_rate, SAMPLE_RATE_RANGE)?;
        check_range("buffer_size", self.buffer_size, BUFFER_SIZE_RANGE)?;
        check_range("filter_threshold", self.filter_threshold, THRESHOLD_RANGE)?;
        Ok(())
    }

    /// Ingestion buffer capacity in samples.
    pub fn buffer_entries(&self) -> usize {
        (self.buffer_size / BYTES_PER_BUFFER_ENTRY).max(1)
    }

    /// Delay between processing iterations, `1000 / sample_rate` ms.
    pub fn processing_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.sample_rate.max(1)))
    }

    /// Filter configuration, or `None` when filtering is disabled.
    pub fn filter_config(&self) -> Option<FilterConfig> {
        self.filter_enabled.then(|| FilterConfig::from(self))
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is unset
    pub level: String,
    /// Line format
    pub format: OutputFormat,
    /// Include source file and line in each event
    pub file_and_line: bool,
    /// Include the emitting thread's name in each event
    pub thread_names: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: OutputFormat::Pretty,
            file_and_line: false,
            thread_names: true,
        }
    }
}

/// `[collector]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorSettings {
    /// Start collecting at boot
    pub enabled: bool,
    /// Pipeline configuration passed to `Collector::init`
    #[serde(flatten)]
    pub config: CollectorConfig,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            config: CollectorConfig::default(),
        }
    }
}

/// `[reporting]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingSettings {
    /// Seconds between status log lines (0 disables)
    pub status_interval_secs: u64,
}

impl Default for ReportingSettings {
    fn default() -> Self {
        Self {
            status_interval_secs: 10,
        }
    }
}

/// Process-level configuration for the `csi-collector` binary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// `[logging]`
    pub logging: LoggingSettings,
    /// `[collector]`
    pub collector: CollectorSettings,
    /// `[radio]`, pushed to the driver by `Collector::start`
    pub radio: CsiOptions,
    /// `[reporting]`
    pub reporting: ReportingSettings,
}

impl Provider for Settings {
    fn metadata(&self) -> figment::Metadata {
        figment::Metadata::named("Collector Defaults")
    }

    fn data(
        &self,
    ) -> Result<figment::value::Map<figment::Profile, figment::value::Dict>, figment::Error> {
        Serialized::defaults(self).data()
    }
}

impl Settings {
    /// Build the layered figment without extracting it.
    pub fn figment(config_path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Settings::default());

        if let Some(path) = config_path {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            } else {
                // Logging is not up yet
                eprintln!("Config file not found: {}. Using defaults.", path.display());
            }
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate settings from defaults, an optional TOML file and the
    /// environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let settings: Settings = Self::figment(config_path)
            .extract()
            .context("Failed to extract configuration")?;

        settings
            .validate()
            .context("Configuration validation failed")?;

        Ok(settings)
    }

    /// Check log level and collector ranges.
    pub fn validate(&self) -> CollectorResult<()> {
        check_log_level(&self.logging.level)?;
        self.collector.config.validate()
    }
}
