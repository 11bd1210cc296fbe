//! # CSI Collector
//!
//! Acquisition pipeline for WiFi Channel State Information. A radio driver
//! delivers raw per-packet CSI frames from its own context; the collector decodes
//! them into [`Sample`]s, buffers them without ever blocking the driver, filters
//! them on a tokio task, and hands accepted samples to a pull queue
//! ([`Collector::get_data`]) and an optional push callback.
//!
//! ## Crate Structure
//!
//! - **`buffer`**: Re-export of the `csi-buffer` crate, the bounded FIFO between
//!   the driver context and the processing task.
//! - **`clock`**: Monotonic microsecond timestamps.
//! - **`collector`**: The [`Collector`] state machine: lifecycle, ingestion
//!   callback, processing task, output queue.
//! - **`config`**: [`CollectorConfig`] (runtime, validated on every write) and
//!   [`Settings`](config::Settings) (process configuration via `figment`).
//! - **`error`**: [`CollectorError`] for centralized error handling.
//! - **`filter`**: The [`TemporalFilter`] with its rolling per-subcarrier history.
//! - **`logging`**: `tracing-subscriber` setup for applications.
//! - **`radio`**: The [`CsiRadio`] driver boundary and the [`SimulatedRadio`].
//! - **`sample`**: The move-only [`Sample`] and frame decoding.
//! - **`stats`**: Lock-free counters and the [`StatsSnapshot`].
//! - **`validation`**: Range checks used by configuration.

pub mod clock;
pub mod collector;
pub mod config;
pub mod error;
pub mod filter;
pub mod logging;
pub mod radio;
pub mod sample;
pub mod stats;
pub mod validation;

pub use csi_buffer as buffer;

pub use collector::{Collector, CollectorState, SampleCallback};
pub use config::CollectorConfig;
pub use error::{CollectorError, CollectorResult, RadioError};
pub use filter::{FilterConfig, FilterStats, FilterVerdict, TemporalFilter};
pub use radio::{CsiOptions, CsiRadio, RawCsiFrame, SimulatedRadio};
pub use sample::{free_sample, MacAddress, Sample};
pub use stats::StatsSnapshot;
