//! CSI Collector
//!
//! Owns the acquisition pipeline: the ingestion callback installed on the radio,
//! the ingestion [`SampleBuffer`], the [`TemporalFilter`], the processing task,
//! the bounded output queue, the push callback, and the statistics.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized --init--> Initialized --start--> Running
//!       ^                    |    ^                 |
//!       +------deinit--------+    +------stop-------+
//! ```
//!
//! Repeated `init`, `start`, `stop` and `deinit` calls are successful no-ops.
//! `deinit` on a running collector stops it first. Lifecycle calls are
//! serialized; everything else can be called concurrently from any thread.
//!
//! # Contexts
//!
//! - **Ingestion** (radio driver thread): decodes the frame, bumps atomic
//!   counters and calls the non-blocking [`SampleBuffer::put`]. It never takes a
//!   lock, never waits and never logs.
//! - **Processing** (tokio task): waits on the ingestion buffer with a 100 ms
//!   timeout, filters, updates statistics, hands the sample to the push callback
//!   and the output queue, then sleeps `1000 / sample_rate` ms. A stop request
//!   interrupts both waits.
//!
//! # Example
//!
//! ```no_run
//! use csi_collector::{Collector, CollectorConfig, SimulatedRadio};
//! use std::time::Duration;
//!
//! # async fn run() -> csi_collector::CollectorResult<()> {
//! let radio = SimulatedRadio::new();
//! let collector = Collector::new(radio.clone());
//!
//! collector.init(CollectorConfig::default()).await?;
//! collector.start().await?;
//!
//! match collector.get_data(Some(Duration::from_millis(100))).await {
//!     Ok(sample) => println!("{} bytes from {}", sample.len(), sample.mac),
//!     Err(e) if e.is_timeout() => {}
//!     Err(e) => return Err(e),
//! }
//!
//! collector.deinit().await?;
//! # Ok(())
//! # }
//! ```

use crate::clock;
use crate::config::{CollectorConfig, OUTPUT_QUEUE_DEPTH};
use crate::error::{CollectorError, CollectorResult, RadioError};
use crate::filter::{FilterStats, FilterVerdict, PhaseStats, TemporalFilter};
use crate::radio::{CsiOptions, CsiRadio, CsiRxCallback, RawCsiFrame};
use crate::sample::{FeatureSet, Sample};
use crate::stats::{Statistics, StatsSnapshot};
use csi_buffer::{BufferStats, GetError, SampleBuffer};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};

/// How long the processing task waits on an empty ingestion buffer before
/// re-checking for a stop request.
pub const INGEST_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Push-style consumer, called from the processing task for every accepted
/// sample, in order.
pub type SampleCallback = Arc<dyn Fn(&Sample) + Send + Sync>;

type SharedFilter = Arc<Mutex<TemporalFilter>>;

/// Lifecycle state of a [`Collector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum CollectorState {
    /// No buffers or filter allocated
    Uninitialized = 0,
    /// Buffers allocated, processing task not running
    Initialized = 1,
    /// Radio attached and processing task running
    Running = 2,
}

impl CollectorState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => CollectorState::Initialized,
            2 => CollectorState::Running,
            _ => CollectorState::Uninitialized,
        }
    }
}

/// Configuration plus the filter built from it. Swapped together under one lock.
#[derive(Default)]
struct ConfigSlot {
    config: Option<CollectorConfig>,
    filter: Option<SharedFilter>,
}

/// Buffers that exist between `init` and `deinit`.
struct Pipeline {
    ingest: Arc<SampleBuffer<Sample>>,
    output: Arc<SampleBuffer<Sample>>,
}

/// State shared by the collector handle, the ingestion callback and the
/// processing task.
struct Shared {
    state: AtomicU8,
    /// Gate checked first thing in the ingestion callback
    ingesting: AtomicBool,
    amplitude: AtomicBool,
    phase: AtomicBool,
    stats: Statistics,
    slot: Mutex<ConfigSlot>,
    pipeline: Mutex<Option<Pipeline>>,
    callback: RwLock<Option<SampleCallback>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(CollectorState::Uninitialized as u8),
            ingesting: AtomicBool::new(false),
            amplitude: AtomicBool::new(false),
            phase: AtomicBool::new(false),
            stats: Statistics::new(),
            slot: Mutex::new(ConfigSlot::default()),
            pipeline: Mutex::new(None),
            callback: RwLock::new(None),
        }
    }

    fn state(&self) -> CollectorState {
        CollectorState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: CollectorState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn features(&self) -> FeatureSet {
        FeatureSet {
            amplitude: self.amplitude.load(Ordering::Relaxed),
            phase: self.phase.load(Ordering::Relaxed),
        }
    }

    fn apply_features(&self, config: &CollectorConfig) {
        self.amplitude
            .store(config.enable_amplitude, Ordering::Relaxed);
        self.phase.store(config.enable_phase, Ordering::Relaxed);
    }

    fn ingest_buffer(&self) -> Option<Arc<SampleBuffer<Sample>>> {
        self.pipeline.lock().as_ref().map(|p| Arc::clone(&p.ingest))
    }

    fn output_queue(&self) -> Option<Arc<SampleBuffer<Sample>>> {
        self.pipeline.lock().as_ref().map(|p| Arc::clone(&p.output))
    }

    /// Filter handle and pacing interval for one processing iteration.
    fn iteration_settings(&self) -> (Option<SharedFilter>, Duration) {
        let slot = self.slot.lock();
        let interval = slot
            .config
            .map(|c| c.processing_interval())
            .unwrap_or(INGEST_POLL_TIMEOUT);
        (slot.filter.clone(), interval)
    }

    /// Ingestion path. Bounded time, lock-free, silent.
    fn ingest(&self, buffer: &SampleBuffer<Sample>, frame: &RawCsiFrame) {
        if !self.ingesting.load(Ordering::Acquire) {
            return;
        }
        self.stats.record_received();

        match Sample::decode(frame, self.features(), clock::now_micros()) {
            Ok(sample) => {
                if buffer.put(sample).is_err() {
                    self.stats.record_dropped();
                }
            }
            Err(_) => self.stats.record_dropped(),
        }
    }

    /// One dequeued sample through filter, statistics and delivery.
    fn process(
        &self,
        mut sample: Sample,
        filter: Option<&SharedFilter>,
        output: &SampleBuffer<Sample>,
    ) {
        if let Some(filter) = filter {
            if filter.lock().process(&mut sample) == FilterVerdict::Reject {
                self.stats.record_filtered();
                return;
            }
        }

        self.stats.record_processed(sample.rssi, sample.timestamp_us);

        // Callback sees the sample before it moves into the queue
        let callback = self.callback.read().clone();
        if let Some(callback) = callback {
            callback(&sample);
        }

        if output.put(sample).is_err() {
            self.stats.record_overrun();
        }
    }
}

struct ProcessingTask {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl ProcessingTask {
    /// Signal the task and wait until it has exited.
    async fn shutdown(self) {
        let _ = self.stop_tx.send(());
        if let Err(e) = self.handle.await {
            if e.is_panic() {
                error!("CSI processing task panicked");
            }
        }
    }
}

async fn processing_loop(
    shared: Arc<Shared>,
    ingest: Arc<SampleBuffer<Sample>>,
    output: Arc<SampleBuffer<Sample>>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    info!("CSI processing task started");

    loop {
        let next = tokio::select! {
            biased;
            _ = &mut stop_rx => break,
            next = ingest.get(INGEST_POLL_TIMEOUT) => next,
        };

        let (filter, interval) = shared.iteration_settings();
        match next {
            Ok(sample) => shared.process(sample, filter.as_ref(), &output),
            Err(GetError::Timeout) => {}
            Err(GetError::Closed) => break,
        }

        tokio::select! {
            biased;
            _ = &mut stop_rx => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    info!("CSI processing task ended");
}

/// CSI acquisition pipeline bound to one radio.
///
/// Each `Collector` is independent; tests can run several side by side.
pub struct Collector {
    radio: Arc<dyn CsiRadio>,
    csi_options: CsiOptions,
    shared: Arc<Shared>,
    /// Serializes lifecycle transitions; holds the task while running
    lifecycle: tokio::sync::Mutex<Option<ProcessingTask>>,
}

impl Collector {
    /// Create an uninitialized collector using default CSI options.
    pub fn new(radio: Arc<dyn CsiRadio>) -> Self {
        Self {
            radio,
            csi_options: CsiOptions::default(),
            shared: Arc::new(Shared::new()),
            lifecycle: tokio::sync::Mutex::new(None),
        }
    }

    /// Options pushed to the radio by `start()`.
    pub fn with_csi_options(mut self, options: CsiOptions) -> Self {
        self.csi_options = options;
        self
    }

    /// Validate `config` and allocate the buffers and, if enabled, the filter.
    ///
    /// A no-op when already initialized.
    ///
    /// # Errors
    /// - `InvalidArgument` if `config` is out of range; nothing is allocated
    /// - `OutOfMemory` if the filter cannot be allocated
    #[instrument(skip(self, config))]
    pub async fn init(&self, config: CollectorConfig) -> CollectorResult<()> {
        let _lifecycle = self.lifecycle.lock().await;

        if self.shared.state() != CollectorState::Uninitialized {
            warn!("CSI collector already initialized");
            return Ok(());
        }

        if let Err(e) = config.validate() {
            error!(error = %e, "Rejected collector configuration");
            return Err(e);
        }

        let filter = config
            .filter_config()
            .map(TemporalFilter::new)
            .transpose()?
            .map(|f| Arc::new(Mutex::new(f)));

        let pipeline = Pipeline {
            ingest: SampleBuffer::with_overwrite(config.buffer_entries(), config.overwrite_oldest),
            output: SampleBuffer::new(OUTPUT_QUEUE_DEPTH),
        };

        self.shared.stats.reset();
        self.shared.apply_features(&config);
        *self.shared.pipeline.lock() = Some(pipeline);
        {
            let mut slot = self.shared.slot.lock();
            slot.config = Some(config);
            slot.filter = filter;
        }
        self.shared.set_state(CollectorState::Initialized);

        info!(
            sample_rate = config.sample_rate,
            buffer_entries = config.buffer_entries(),
            filter = config.filter_enabled,
            "CSI collector initialized"
        );
        Ok(())
    }

    /// Spawn the processing task, register the ingestion callback, configure
    /// and enable CSI reporting on the radio.
    ///
    /// A no-op when already running. If any radio step fails, everything done so
    /// far is undone and the error is returned.
    ///
    /// # Errors
    /// - `InvalidState` if not initialized, or called outside a tokio runtime
    /// - `Radio` if the driver refuses a step
    #[instrument(skip(self))]
    pub async fn start(&self) -> CollectorResult<()> {
        let mut lifecycle = self.lifecycle.lock().await;

        match self.shared.state() {
            CollectorState::Uninitialized => return Err(CollectorError::not_initialized()),
            CollectorState::Running => {
                warn!("CSI collector already running");
                return Ok(());
            }
            CollectorState::Initialized => {}
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            CollectorError::InvalidState("start() must be called inside a tokio runtime".into())
        })?;

        let (ingest, output) = {
            let pipeline = self.shared.pipeline.lock();
            let pipeline = pipeline.as_ref().ok_or_else(CollectorError::not_initialized)?;
            (Arc::clone(&pipeline.ingest), Arc::clone(&pipeline.output))
        };

        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = runtime.spawn(
            processing_loop(Arc::clone(&self.shared), Arc::clone(&ingest), output, stop_rx)
                .instrument(info_span!("csi_processing")),
        );
        let task = ProcessingTask { stop_tx, handle };

        self.shared.ingesting.store(true, Ordering::Release);

        if let Err(e) = self.attach_radio(ingest) {
            error!(error = %e, "Failed to start CSI reporting");
            self.shared.ingesting.store(false, Ordering::Release);
            self.detach_radio();
            task.shutdown().await;
            return Err(e.into());
        }

        *lifecycle = Some(task);
        self.shared.set_state(CollectorState::Running);
        info!("CSI collection started");
        Ok(())
    }

    /// Disable reporting, unregister the ingestion callback and wait for the
    /// processing task to exit.
    ///
    /// A no-op when not running. Once this returns, the radio will not call into
    /// the collector again.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> CollectorResult<()> {
        let mut lifecycle = self.lifecycle.lock().await;

        if self.shared.state() != CollectorState::Running {
            warn!("CSI collector not running");
            return Ok(());
        }

        self.stop_locked(&mut lifecycle).await;
        Ok(())
    }

    async fn stop_locked(&self, lifecycle: &mut Option<ProcessingTask>) {
        self.shared.ingesting.store(false, Ordering::Release);
        self.detach_radio();

        if let Some(task) = lifecycle.take() {
            task.shutdown().await;
        }

        self.shared.set_state(CollectorState::Initialized);
        info!("CSI collection stopped");
    }

    /// Release the filter, both buffers and every sample still queued in them.
    ///
    /// Stops first when running. A no-op when not initialized.
    #[instrument(skip(self))]
    pub async fn deinit(&self) -> CollectorResult<()> {
        let mut lifecycle = self.lifecycle.lock().await;

        match self.shared.state() {
            CollectorState::Uninitialized => {
                warn!("CSI collector not initialized");
                return Ok(());
            }
            CollectorState::Running => self.stop_locked(&mut lifecycle).await,
            CollectorState::Initialized => {}
        }

        {
            let mut slot = self.shared.slot.lock();
            slot.config = None;
            slot.filter = None;
        }

        let pipeline = self.shared.pipeline.lock().take();
        if let Some(pipeline) = pipeline {
            pipeline.ingest.close();
            pipeline.output.close();
            let released = pipeline.ingest.drain().len() + pipeline.output.drain().len();
            if released > 0 {
                info!(released, "Released buffered samples");
            }
        }

        self.shared.set_state(CollectorState::Uninitialized);
        info!("CSI collector deinitialized");
        Ok(())
    }

    fn attach_radio(&self, ingest: Arc<SampleBuffer<Sample>>) -> Result<(), RadioError> {
        let shared = Arc::clone(&self.shared);
        let callback: CsiRxCallback =
            Arc::new(move |frame: &RawCsiFrame| shared.ingest(&ingest, frame));

        self.radio.set_csi_callback(Some(callback))?;
        self.radio.configure_csi(&self.csi_options)?;
        self.radio.enable_csi(true)
    }

    /// Best effort: teardown continues past driver errors.
    fn detach_radio(&self) {
        if let Err(e) = self.radio.enable_csi(false) {
            warn!(error = %e, "Failed to disable CSI reporting");
        }
        if let Err(e) = self.radio.set_csi_callback(None) {
            warn!(error = %e, "Failed to unregister CSI callback");
        }
    }

    /// Whether the collector is in [`CollectorState::Running`].
    pub fn is_running(&self) -> bool {
        self.shared.state() == CollectorState::Running
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CollectorState {
        self.shared.state()
    }

    /// Wait for the next accepted sample from the output queue.
    ///
    /// `None` waits until a sample arrives or the collector is deinitialized.
    ///
    /// # Errors
    /// - `InvalidState` if not running, or deinitialized while waiting
    /// - `Timeout` if nothing arrived within `timeout`
    pub async fn get_data(&self, timeout: Option<Duration>) -> CollectorResult<Sample> {
        if !self.is_running() {
            return Err(CollectorError::not_running());
        }
        let output = self
            .shared
            .output_queue()
            .ok_or_else(CollectorError::not_running)?;

        let result = match timeout {
            Some(timeout) => output.get(timeout).await,
            None => output.recv().await,
        };

        result.map_err(|e| match e {
            GetError::Timeout => CollectorError::Timeout,
            GetError::Closed => CollectorError::not_running(),
        })
    }

    /// Install the push consumer, replacing any previous one.
    pub fn register_callback<F>(&self, callback: F)
    where
        F: Fn(&Sample) + Send + Sync + 'static,
    {
        *self.shared.callback.write() = Some(Arc::new(callback));
        debug!("Sample callback registered");
    }

    /// Remove the push consumer. Samples keep flowing to the output queue.
    pub fn unregister_callback(&self) {
        *self.shared.callback.write() = None;
        debug!("Sample callback unregistered");
    }

    /// Snapshot of the statistics.
    ///
    /// # Errors
    /// `InvalidState` if not initialized.
    pub fn get_stats(&self) -> CollectorResult<StatsSnapshot> {
        if self.shared.state() == CollectorState::Uninitialized {
            return Err(CollectorError::not_initialized());
        }
        Ok(self.shared.stats.snapshot())
    }

    /// Zero all statistics.
    ///
    /// # Errors
    /// `InvalidState` if not initialized.
    pub fn reset_stats(&self) -> CollectorResult<()> {
        if self.shared.state() == CollectorState::Uninitialized {
            return Err(CollectorError::not_initialized());
        }
        self.shared.stats.reset();
        info!("Statistics reset");
        Ok(())
    }

    /// Copy of the current configuration.
    ///
    /// # Errors
    /// `InvalidState` if not initialized.
    pub fn get_config(&self) -> CollectorResult<CollectorConfig> {
        self.shared
            .slot
            .lock()
            .config
            .ok_or_else(CollectorError::not_initialized)
    }

    /// Replace the configuration wholesale.
    ///
    /// Takes effect while running. A change to any filter parameter rebuilds the
    /// filter with empty history. `buffer_size` is stored but the ingestion
    /// buffer keeps its capacity until the next `init`.
    ///
    /// # Errors
    /// - `InvalidState` if not initialized
    /// - `InvalidArgument` if `config` is out of range; nothing changes
    /// - `OutOfMemory` if a new filter cannot be allocated; nothing changes
    pub fn update_config(&self, config: CollectorConfig) -> CollectorResult<()> {
        let previous = {
            let mut slot = self.shared.slot.lock();
            let previous = slot.config.ok_or_else(CollectorError::not_initialized)?;

            if let Err(e) = config.validate() {
                error!(error = %e, "Rejected configuration update");
                return Err(e);
            }

            if previous.filter_config() != config.filter_config() {
                slot.filter = config
                    .filter_config()
                    .map(TemporalFilter::new)
                    .transpose()?
                    .map(|f| Arc::new(Mutex::new(f)));
                info!(enabled = config.filter_enabled, "Temporal filter rebuilt");
            }

            slot.config = Some(config);
            previous
        };

        self.shared.apply_features(&config);
        if let Some(ingest) = self.shared.ingest_buffer() {
            ingest.set_overwrite(config.overwrite_oldest);
        }
        if previous.buffer_size != config.buffer_size {
            info!(
                buffer_size = config.buffer_size,
                "Buffer size change applies at next init"
            );
        }

        info!("Configuration updated");
        Ok(())
    }

    /// Counters of the ingestion buffer, if initialized.
    pub fn buffer_stats(&self) -> Option<BufferStats> {
        self.shared.ingest_buffer().map(|b| b.stats())
    }

    /// Counters of the current filter instance, if filtering is active.
    pub fn filter_stats(&self) -> Option<FilterStats> {
        let filter = self.shared.slot.lock().filter.clone();
        filter.map(|f| f.lock().stats())
    }

    /// Phase statistics of the most recent filtered sample.
    pub fn last_phase_stats(&self) -> Option<PhaseStats> {
        let filter = self.shared.slot.lock().filter.clone();
        filter.and_then(|f| f.lock().last_phase_stats())
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        if self.shared.state() != CollectorState::Running {
            return;
        }
        self.shared.ingesting.store(false, Ordering::Release);
        self.detach_radio();
        if let Some(task) = self.lifecycle.get_mut().take() {
            let _ = task.stop_tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::sim::RadioOperation;
    use crate::radio::SimulatedRadio;
    use crate::sample::MacAddress;
    use tracing_test::traced_test;

    fn fast_config() -> CollectorConfig {
        CollectorConfig {
            sample_rate: 100,
            filter_enabled: false,
            ..CollectorConfig::default()
        }
    }

    fn frame(rssi: i8) -> RawCsiFrame {
        RawCsiFrame::new(MacAddress([2, 0, 0, 0, 0, 1]), rssi, 6, vec![3, 4, 0, 5])
    }

    #[test]
    fn test_state_roundtrip() {
        for state in [
            CollectorState::Uninitialized,
            CollectorState::Initialized,
            CollectorState::Running,
        ] {
            assert_eq!(CollectorState::from_u8(state as u8), state);
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn test_double_init_warns() {
        let collector = Collector::new(SimulatedRadio::new());
        collector.init(fast_config()).await.unwrap();
        collector.init(fast_config()).await.unwrap();
        assert!(logs_contain("already initialized"));
        assert_eq!(collector.state(), CollectorState::Initialized);
    }

    #[tokio::test]
    async fn test_ingest_gate_closed_when_stopped() {
        let radio = SimulatedRadio::new();
        let collector = Collector::new(radio.clone());
        collector.init(fast_config()).await.unwrap();

        let ingest = collector.shared.ingest_buffer().unwrap();
        collector.shared.ingest(&ingest, &frame(-40));
        assert_eq!(collector.get_stats().unwrap().packets_received, 0);
        assert!(ingest.is_empty());
    }

    #[tokio::test]
    async fn test_ingest_counts_full_buffer_as_drop() {
        let collector = Collector::new(SimulatedRadio::new());
        collector
            .init(CollectorConfig {
                buffer_size: 256,
                ..fast_config()
            })
            .await
            .unwrap();

        let ingest = collector.shared.ingest_buffer().unwrap();
        collector.shared.ingesting.store(true, Ordering::Release);
        for _ in 0..6 {
            collector.shared.ingest(&ingest, &frame(-40));
        }

        let stats = collector.get_stats().unwrap();
        assert_eq!(stats.packets_received, 6);
        assert_eq!(stats.packets_dropped, 2);
        assert_eq!(ingest.len(), 4);
    }

    #[tokio::test]
    async fn test_process_rejected_sample_counts_filter_hit() {
        let collector = Collector::new(SimulatedRadio::new());
        collector
            .init(CollectorConfig {
                filter_enabled: true,
                filter_threshold: 0.5,
                ..fast_config()
            })
            .await
            .unwrap();

        let output = collector.shared.output_queue().unwrap();
        let (filter, _) = collector.shared.iteration_settings();
        let features = collector.shared.features();

        let weak = Sample::decode(&frame(-60), features, 1).unwrap();
        collector.shared.process(weak, filter.as_ref(), &output);
        let strong = Sample::decode(&frame(-40), features, 2).unwrap();
        collector.shared.process(strong, filter.as_ref(), &output);

        let stats = collector.get_stats().unwrap();
        assert_eq!(stats.filter_hits, 1);
        assert_eq!(stats.packets_dropped, 1);
        assert_eq!(stats.packets_processed, 1);
        assert_eq!(stats.last_packet_time, 2);
        assert_eq!(output.len(), 1);
        assert_eq!(
            collector.filter_stats(),
            Some(FilterStats {
                processed: 2,
                passed: 1,
                filtered: 1
            })
        );
    }

    #[tokio::test]
    async fn test_full_output_queue_still_reaches_callback() {
        let collector = Collector::new(SimulatedRadio::new());
        collector.init(fast_config()).await.unwrap();

        let seen = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        collector.register_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let output = collector.shared.output_queue().unwrap();
        let features = collector.shared.features();
        for i in 0..(OUTPUT_QUEUE_DEPTH + 3) {
            let sample = Sample::decode(&frame(-40), features, i as u64).unwrap();
            collector.shared.process(sample, None, &output);
        }

        assert_eq!(seen.load(Ordering::SeqCst), OUTPUT_QUEUE_DEPTH + 3);
        assert_eq!(collector.get_stats().unwrap().buffer_overruns, 3);
        assert_eq!(output.len(), OUTPUT_QUEUE_DEPTH);
    }

    #[tokio::test]
    async fn test_start_unwinds_on_configure_failure() {
        let radio = SimulatedRadio::new();
        radio.fail_on(RadioOperation::Configure);
        let collector = Collector::new(radio.clone());
        collector.init(fast_config()).await.unwrap();

        let err = collector.start().await.unwrap_err();
        assert!(matches!(err, CollectorError::Radio(RadioError::Configuration(_))));
        assert_eq!(collector.state(), CollectorState::Initialized);
        assert!(!radio.has_callback());
        assert!(!radio.is_enabled());
        assert!(collector.lifecycle.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_update_config_swaps_filter() {
        let collector = Collector::new(SimulatedRadio::new());
        collector.init(fast_config()).await.unwrap();
        assert!(collector.filter_stats().is_none());

        let filtered = CollectorConfig {
            filter_enabled: true,
            ..fast_config()
        };
        collector.update_config(filtered).unwrap();
        assert_eq!(collector.filter_stats(), Some(FilterStats::default()));

        // Same filter parameters keep the instance
        let (before, _) = collector.shared.iteration_settings();
        collector
            .update_config(CollectorConfig {
                sample_rate: 50,
                ..filtered
            })
            .unwrap();
        let (after, _) = collector.shared.iteration_settings();
        assert!(Arc::ptr_eq(&before.unwrap(), &after.unwrap()));

        collector
            .update_config(CollectorConfig {
                filter_threshold: 0.9,
                sample_rate: 50,
                ..filtered
            })
            .unwrap();
        let (rebuilt, _) = collector.shared.iteration_settings();
        assert_eq!(rebuilt.unwrap().lock().config().threshold, 0.9);
    }

    #[tokio::test]
    async fn test_update_config_toggles_overwrite() {
        let collector = Collector::new(SimulatedRadio::new());
        collector.init(fast_config()).await.unwrap();
        let ingest = collector.shared.ingest_buffer().unwrap();
        assert!(!ingest.is_overwrite());

        collector
            .update_config(CollectorConfig {
                overwrite_oldest: true,
                ..fast_config()
            })
            .unwrap();
        assert!(ingest.is_overwrite());
    }
}
