//! Collector statistics.
//!
//! Counters are atomics so the ingestion callback can bump them without taking a
//! lock. The signal-strength average and the last-packet timestamp are written
//! together by the processing task and guarded by a short `parking_lot` mutex.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Weight of the previous average in the RSSI moving average.
const RSSI_EMA_DECAY: f32 = 0.9;

/// Point-in-time copy of the collector statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    /// Frames delivered by the radio while running
    pub packets_received: u64,
    /// Samples that passed filtering and reached the output stage
    pub packets_processed: u64,
    /// Samples lost to a full buffer, failed decode or filter rejection
    pub packets_dropped: u64,
    /// Samples rejected by the temporal filter
    pub filter_hits: u64,
    /// Accepted samples that did not fit in the output queue
    pub buffer_overruns: u64,
    /// Exponential moving average of RSSI, dBm
    pub average_rssi: f32,
    /// Timestamp of the last processed sample, monotonic microseconds
    pub last_packet_time: u64,
}

#[derive(Default)]
struct Signal {
    average_rssi: f32,
    last_packet_time: u64,
}

/// Shared statistics instance.
#[derive(Default)]
pub struct Statistics {
    received: AtomicU64,
    processed: AtomicU64,
    dropped: AtomicU64,
    filter_hits: AtomicU64,
    overruns: AtomicU64,
    signal: Mutex<Signal>,
}

impl Statistics {
    /// All counters zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame delivered by the radio.
    #[inline]
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// Frame lost before filtering (full buffer or failed decode).
    #[inline]
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Filter rejection: counted both as a drop and as a filter hit.
    pub fn record_filtered(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        self.filter_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Accepted sample that did not fit in the output queue.
    pub fn record_overrun(&self) {
        self.overruns.fetch_add(1, Ordering::Relaxed);
    }

    /// Accepted sample: bump `processed`, fold its RSSI into the moving average.
    pub fn record_processed(&self, rssi: i8, timestamp_us: u64) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        let mut signal = self.signal.lock();
        signal.average_rssi =
            signal.average_rssi * RSSI_EMA_DECAY + f32::from(rssi) * (1.0 - RSSI_EMA_DECAY);
        signal.last_packet_time = timestamp_us;
    }

    /// Copy every counter out.
    pub fn snapshot(&self) -> StatsSnapshot {
        let signal = self.signal.lock();
        StatsSnapshot {
            packets_received: self.received.load(Ordering::Relaxed),
            packets_processed: self.processed.load(Ordering::Relaxed),
            packets_dropped: self.dropped.load(Ordering::Relaxed),
            filter_hits: self.filter_hits.load(Ordering::Relaxed),
            buffer_overruns: self.overruns.load(Ordering::Relaxed),
            average_rssi: signal.average_rssi,
            last_packet_time: signal.last_packet_time,
        }
    }

    /// Zero every counter and the average.
    pub fn reset(&self) {
        let mut signal = self.signal.lock();
        self.received.store(0, Ordering::Relaxed);
        self.processed.store(0, Ordering::Relaxed);
        self.dropped.store(0, Ordering::Relaxed);
        self.filter_hits.store(0, Ordering::Relaxed);
        self.overruns.store(0, Ordering::Relaxed);
        *signal = Signal::default();
    }
}
