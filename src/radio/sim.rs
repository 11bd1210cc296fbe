//! Simulated Radio
//!
//! In-process stand-in for a CSI-capable WiFi driver. Used by the test suite and
//! the `csi-collector` binary when no hardware is attached.
//!
//! Two ways to deliver frames:
//!
//! - [`SimulatedRadio::inject`] - synchronous delivery from the caller's thread,
//!   for deterministic tests
//! - [`SimulatedRadio::spawn_traffic`] - a background "driver" thread emitting
//!   synthetic frames at a fixed rate
//!
//! Frames are only delivered while reporting is enabled and a callback is
//! installed, matching real driver behaviour.
//!
//! # Fault Injection
//!
//! [`SimulatedRadio::fail_on`] makes the next calls to one driver operation fail,
//! so lifecycle unwind paths can be exercised.

use super::{CsiOptions, CsiRadio, CsiRxCallback, RawCsiFrame};
use crate::error::RadioError;
use crate::sample::{MacAddress, MAX_SUBCARRIERS};
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Driver operation that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RadioOperation {
    /// `set_csi_callback`, both install and remove
    SetCallback,
    /// `configure_csi`
    Configure,
    /// `enable_csi(true)`
    Enable,
}

/// Transmitters the synthetic traffic cycles through.
const SIM_TRANSMITTERS: [MacAddress; 3] = [
    MacAddress([0x24, 0x0A, 0xC4, 0x00, 0x00, 0x01]),
    MacAddress([0x24, 0x0A, 0xC4, 0x00, 0x00, 0x02]),
    MacAddress([0x24, 0x0A, 0xC4, 0x00, 0x00, 0x03]),
];

struct TrafficThread {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// In-process CSI radio.
pub struct SimulatedRadio {
    /// Read-locked for the duration of each delivery so unregistering waits
    /// for in-flight callbacks
    callback: RwLock<Option<CsiRxCallback>>,
    enabled: AtomicBool,
    options: Mutex<Option<CsiOptions>>,
    faults: Mutex<HashSet<RadioOperation>>,
    delivered: AtomicU64,
    traffic: Mutex<Option<TrafficThread>>,
}

impl SimulatedRadio {
    /// Create a radio with reporting disabled and no callback.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            callback: RwLock::new(None),
            enabled: AtomicBool::new(false),
            options: Mutex::new(None),
            faults: Mutex::new(HashSet::new()),
            delivered: AtomicU64::new(0),
            traffic: Mutex::new(None),
        })
    }

    /// Make `operation` fail until [`clear_faults`](Self::clear_faults) is called.
    pub fn fail_on(&self, operation: RadioOperation) {
        self.faults.lock().insert(operation);
    }

    /// Remove all injected faults.
    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    fn check_fault(&self, operation: RadioOperation) -> bool {
        self.faults.lock().contains(&operation)
    }

    /// Deliver one frame to the installed callback from the calling thread.
    ///
    /// Returns `false` if reporting is disabled or no callback is installed.
    pub fn inject(&self, frame: &RawCsiFrame) -> bool {
        if !self.enabled.load(Ordering::Acquire) {
            return false;
        }
        let guard = self.callback.read();
        match guard.as_ref() {
            Some(callback) => {
                callback(frame);
                self.delivered.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Whether a callback is currently installed.
    pub fn has_callback(&self) -> bool {
        self.callback.read().is_some()
    }

    /// Whether CSI reporting is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Options from the last successful `configure_csi`.
    pub fn options(&self) -> Option<CsiOptions> {
        *self.options.lock()
    }

    /// Frames handed to a callback so far.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Start a driver thread emitting synthetic frames at `rate_hz`.
    ///
    /// Replaces any traffic thread already running. Frames emitted while
    /// reporting is disabled are discarded, like on real hardware.
    pub fn spawn_traffic(self: &Arc<Self>, rate_hz: u32, seed: Option<u64>) -> std::io::Result<()> {
        self.stop_traffic();

        let period = Duration::from_secs_f64(1.0 / f64::from(rate_hz.max(1)));
        let stop = Arc::new(AtomicBool::new(false));
        let radio = Arc::clone(self);
        let stop_flag = Arc::clone(&stop);

        let handle = std::thread::Builder::new()
            .name("csi-sim-driver".into())
            .spawn(move || {
                let mut rng = match seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_entropy(),
                };
                let mut sequence = 0usize;
                while !stop_flag.load(Ordering::Acquire) {
                    let frame = synthetic_frame(&mut rng, sequence);
                    radio.inject(&frame);
                    sequence = sequence.wrapping_add(1);
                    std::thread::sleep(period);
                }
            })?;

        info!(rate_hz, "Simulated CSI traffic started");
        *self.traffic.lock() = Some(TrafficThread { stop, handle });
        Ok(())
    }

    /// Stop the traffic thread, if any, and wait for it to exit.
    pub fn stop_traffic(&self) {
        let traffic = self.traffic.lock().take();
        if let Some(traffic) = traffic {
            traffic.stop.store(true, Ordering::Release);
            if traffic.handle.join().is_err() {
                warn!("Simulated CSI traffic thread panicked");
            }
            info!("Simulated CSI traffic stopped");
        }
    }
}

impl CsiRadio for SimulatedRadio {
    fn set_csi_callback(&self, callback: Option<CsiRxCallback>) -> Result<(), RadioError> {
        if self.check_fault(RadioOperation::SetCallback) {
            return Err(RadioError::CallbackRegistration(
                "simulated driver fault".into(),
            ));
        }
        let installing = callback.is_some();
        // Write lock waits for any delivery holding the read lock
        *self.callback.write() = callback;
        debug!(installing, "CSI callback updated");
        Ok(())
    }

    fn configure_csi(&self, options: &CsiOptions) -> Result<(), RadioError> {
        if self.check_fault(RadioOperation::Configure) {
            return Err(RadioError::Configuration("simulated driver fault".into()));
        }
        if options.shift > 15 {
            return Err(RadioError::Configuration(format!(
                "shift {} out of range 0..=15",
                options.shift
            )));
        }
        *self.options.lock() = Some(*options);
        debug!(?options, "CSI options applied");
        Ok(())
    }

    fn enable_csi(&self, enable: bool) -> Result<(), RadioError> {
        if enable && self.check_fault(RadioOperation::Enable) {
            return Err(RadioError::Enable("simulated driver fault".into()));
        }
        self.enabled.store(enable, Ordering::Release);
        debug!(enable, "CSI reporting toggled");
        Ok(())
    }
}

impl Drop for SimulatedRadio {
    fn drop(&mut self) {
        if let Some(traffic) = self.traffic.get_mut().take() {
            traffic.stop.store(true, Ordering::Release);
        }
    }
}

/// Build a plausible CSI frame: full subcarrier set, RSSI in -90..=-20 dBm,
/// I/Q values with a slow per-subcarrier ripple plus noise.
pub fn synthetic_frame<R: Rng>(rng: &mut R, sequence: usize) -> RawCsiFrame {
    let mut data = Vec::with_capacity(MAX_SUBCARRIERS * 2);
    for k in 0..MAX_SUBCARRIERS {
        let ripple = ((k + sequence) as f32 * 0.2).sin() * 20.0;
        let imag = (ripple + rng.gen_range(-5.0..5.0)) as i8;
        let real = (ripple.abs() + 10.0 + rng.gen_range(-5.0..5.0)) as i8;
        data.push(imag);
        data.push(real);
    }

    let mac = SIM_TRANSMITTERS[sequence % SIM_TRANSMITTERS.len()];
    RawCsiFrame::new(mac, rng.gen_range(-90..=-20), 6, data)
}
