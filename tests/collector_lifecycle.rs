//! Integration tests for the collector state machine.

use csi_collector::collector::INGEST_POLL_TIMEOUT;
use csi_collector::radio::sim::RadioOperation;
use csi_collector::{
    Collector, CollectorConfig, CollectorError, CollectorState, MacAddress, RadioError,
    RawCsiFrame, SimulatedRadio,
};
use std::time::{Duration, Instant};

fn fast_config() -> CollectorConfig {
    CollectorConfig {
        sample_rate: 100,
        ..CollectorConfig::default()
    }
}

#[tokio::test]
async fn test_init_deinit_across_valid_configs() {
    let radio = SimulatedRadio::new();
    let collector = Collector::new(radio.clone());

    for sample_rate in [1, 37, 100] {
        for buffer_size in [256, 1000, 4096] {
            for filter_threshold in [0.0, 0.5, 1.0] {
                let config = CollectorConfig {
                    sample_rate,
                    buffer_size,
                    filter_threshold,
                    ..CollectorConfig::default()
                };

                collector.init(config).await.unwrap();
                assert_eq!(collector.state(), CollectorState::Initialized);
                assert_eq!(collector.get_config().unwrap(), config);

                collector.deinit().await.unwrap();
                assert_eq!(collector.state(), CollectorState::Uninitialized);
                assert!(collector.get_config().is_err());
                assert!(collector.buffer_stats().is_none());
                assert!(!radio.has_callback());
            }
        }
    }
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let collector = Collector::new(SimulatedRadio::new());

    let invalid = [
        CollectorConfig {
            sample_rate: 0,
            ..CollectorConfig::default()
        },
        CollectorConfig {
            buffer_size: 8192,
            ..CollectorConfig::default()
        },
        CollectorConfig {
            filter_threshold: 1.01,
            ..CollectorConfig::default()
        },
    ];

    for config in invalid {
        let err = collector.init(config).await.unwrap_err();
        assert!(matches!(err, CollectorError::InvalidArgument(_)), "{err}");
        assert_eq!(collector.state(), CollectorState::Uninitialized);
    }
}

#[tokio::test]
async fn test_operations_before_init() {
    let collector = Collector::new(SimulatedRadio::new());

    assert!(matches!(
        collector.start().await,
        Err(CollectorError::InvalidState(_))
    ));
    assert!(matches!(
        collector.get_data(Some(Duration::from_millis(10))).await,
        Err(CollectorError::InvalidState(_))
    ));
    assert!(matches!(
        collector.get_stats(),
        Err(CollectorError::InvalidState(_))
    ));
    assert!(matches!(
        collector.update_config(CollectorConfig::default()),
        Err(CollectorError::InvalidState(_))
    ));
    assert!(matches!(
        collector.get_config(),
        Err(CollectorError::InvalidState(_))
    ));

    // Idempotent no-ops
    collector.stop().await.unwrap();
    collector.deinit().await.unwrap();
    assert_eq!(collector.state(), CollectorState::Uninitialized);
}

#[tokio::test]
async fn test_repeated_transitions_are_idempotent() {
    let radio = SimulatedRadio::new();
    let collector = Collector::new(radio.clone());

    collector.init(fast_config()).await.unwrap();
    collector.init(fast_config()).await.unwrap();
    assert_eq!(collector.state(), CollectorState::Initialized);

    collector.start().await.unwrap();
    collector.start().await.unwrap();
    assert!(collector.is_running());
    assert!(radio.is_enabled());
    assert!(radio.has_callback());

    collector.stop().await.unwrap();
    assert!(!collector.is_running());
    assert!(!radio.is_enabled());
    assert!(!radio.has_callback());
    collector.stop().await.unwrap();
    assert_eq!(collector.state(), CollectorState::Initialized);

    collector.deinit().await.unwrap();
    collector.deinit().await.unwrap();
    assert_eq!(collector.state(), CollectorState::Uninitialized);
}

#[tokio::test]
async fn test_restart_after_stop() {
    let radio = SimulatedRadio::new();
    let collector = Collector::new(radio.clone());
    collector.init(fast_config()).await.unwrap();

    for _ in 0..3 {
        collector.start().await.unwrap();
        assert!(radio.has_callback());
        collector.stop().await.unwrap();
        assert!(!radio.has_callback());
    }
    collector.deinit().await.unwrap();
}

#[tokio::test]
async fn test_get_data_times_out_without_traffic() {
    let collector = Collector::new(SimulatedRadio::new());
    collector.init(fast_config()).await.unwrap();
    collector.start().await.unwrap();

    let started = Instant::now();
    let err = collector
        .get_data(Some(Duration::from_millis(100)))
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(err.is_timeout());
    assert!(elapsed >= Duration::from_millis(100), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(1), "{elapsed:?}");

    collector.deinit().await.unwrap();
}

#[tokio::test]
async fn test_stop_interrupts_pacing_sleep() {
    let radio = SimulatedRadio::new();
    let collector = Collector::new(radio.clone());
    // 1 Hz: after one sample the task sleeps for a full second
    collector
        .init(CollectorConfig {
            sample_rate: 1,
            filter_enabled: false,
            ..CollectorConfig::default()
        })
        .await
        .unwrap();
    collector.start().await.unwrap();

    let frame = RawCsiFrame::new(MacAddress([2, 0, 0, 0, 0, 1]), -40, 6, vec![1; 16]);
    assert!(radio.inject(&frame));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(collector.get_stats().unwrap().packets_processed, 1);

    let started = Instant::now();
    collector.stop().await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed < INGEST_POLL_TIMEOUT, "{elapsed:?}");
    assert_eq!(collector.state(), CollectorState::Initialized);
    collector.deinit().await.unwrap();
}

#[tokio::test]
async fn test_stop_interrupts_idle_wait() {
    let collector = Collector::new(SimulatedRadio::new());
    collector
        .init(CollectorConfig {
            sample_rate: 1,
            ..CollectorConfig::default()
        })
        .await
        .unwrap();
    collector.start().await.unwrap();

    // Task is parked on the empty ingestion buffer, 80 ms short of its poll timeout
    tokio::time::sleep(Duration::from_millis(20)).await;

    let started = Instant::now();
    collector.stop().await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_millis(50), "{elapsed:?}");
    collector.deinit().await.unwrap();
}

#[tokio::test]
async fn test_get_data_requires_running() {
    let collector = Collector::new(SimulatedRadio::new());
    collector.init(fast_config()).await.unwrap();

    let err = collector
        .get_data(Some(Duration::from_millis(10)))
        .await
        .unwrap_err();
    assert!(matches!(err, CollectorError::InvalidState(_)));

    collector.start().await.unwrap();
    collector.stop().await.unwrap();
    let err = collector.get_data(None).await.unwrap_err();
    assert!(matches!(err, CollectorError::InvalidState(_)));
}

#[tokio::test]
async fn test_update_config_roundtrip() {
    let collector = Collector::new(SimulatedRadio::new());
    collector.init(fast_config()).await.unwrap();
    collector.start().await.unwrap();

    let updated = CollectorConfig {
        sample_rate: 42,
        buffer_size: 2048,
        filter_enabled: false,
        filter_threshold: 0.75,
        enable_rssi: false,
        enable_phase: false,
        enable_amplitude: true,
        overwrite_oldest: true,
    };
    collector.update_config(updated).unwrap();
    assert_eq!(collector.get_config().unwrap(), updated);
    assert!(collector.filter_stats().is_none());

    // Rejected update leaves the previous value in place
    let err = collector
        .update_config(CollectorConfig {
            sample_rate: 0,
            ..updated
        })
        .unwrap_err();
    assert!(matches!(err, CollectorError::InvalidArgument(_)));
    assert_eq!(collector.get_config().unwrap(), updated);

    // Capacity is fixed until the next init
    assert_eq!(collector.buffer_stats().unwrap().capacity, 16);

    collector.deinit().await.unwrap();
    collector.init(updated).await.unwrap();
    assert_eq!(collector.buffer_stats().unwrap().capacity, 32);
}

#[tokio::test]
async fn test_stats_available_after_init_and_resettable() {
    let collector = Collector::new(SimulatedRadio::new());
    collector.init(fast_config()).await.unwrap();

    let stats = collector.get_stats().unwrap();
    assert_eq!(stats.packets_received, 0);
    assert_eq!(stats.average_rssi, 0.0);
    collector.reset_stats().unwrap();

    collector.deinit().await.unwrap();
    assert!(collector.reset_stats().is_err());
}

#[tokio::test]
async fn test_start_unwinds_when_enable_fails() {
    let radio = SimulatedRadio::new();
    let collector = Collector::new(radio.clone());
    collector.init(fast_config()).await.unwrap();

    radio.fail_on(RadioOperation::Enable);
    let err = collector.start().await.unwrap_err();
    assert!(matches!(err, CollectorError::Radio(RadioError::Enable(_))));
    assert_eq!(collector.state(), CollectorState::Initialized);
    assert!(!radio.has_callback());

    radio.clear_faults();
    collector.start().await.unwrap();
    assert!(collector.is_running());
    collector.deinit().await.unwrap();
}

#[tokio::test]
async fn test_start_fails_when_callback_registration_fails() {
    let radio = SimulatedRadio::new();
    radio.fail_on(RadioOperation::SetCallback);
    let collector = Collector::new(radio.clone());
    collector.init(fast_config()).await.unwrap();

    let err = collector.start().await.unwrap_err();
    assert!(matches!(
        err,
        CollectorError::Radio(RadioError::CallbackRegistration(_))
    ));
    assert!(!radio.is_enabled());
    assert_eq!(collector.state(), CollectorState::Initialized);
}

#[tokio::test]
async fn test_deinit_while_running_stops_first() {
    let radio = SimulatedRadio::new();
    let collector = Collector::new(radio.clone());
    collector.init(fast_config()).await.unwrap();
    collector.start().await.unwrap();

    collector.deinit().await.unwrap();
    assert_eq!(collector.state(), CollectorState::Uninitialized);
    assert!(!radio.has_callback());
    assert!(!radio.is_enabled());
}

#[tokio::test]
async fn test_drop_unregisters_callback() {
    let radio = SimulatedRadio::new();
    {
        let collector = Collector::new(radio.clone());
        collector.init(fast_config()).await.unwrap();
        collector.start().await.unwrap();
        assert!(radio.has_callback());
    }
    assert!(!radio.has_callback());
    assert!(!radio.is_enabled());
}

#[tokio::test]
async fn test_independent_instances() {
    let radio_a = SimulatedRadio::new();
    let radio_b = SimulatedRadio::new();
    let a = Collector::new(radio_a.clone());
    let b = Collector::new(radio_b.clone());

    a.init(fast_config()).await.unwrap();
    b.init(fast_config()).await.unwrap();
    a.start().await.unwrap();

    assert!(a.is_running());
    assert!(!b.is_running());
    assert!(radio_a.has_callback());
    assert!(!radio_b.has_callback());

    a.deinit().await.unwrap();
    b.deinit().await.unwrap();
}
