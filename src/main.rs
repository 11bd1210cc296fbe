//! CLI Entry Point for csi-collector
//!
//! Runs the CSI acquisition pipeline against the simulated radio:
//! - Loads settings (TOML file + `CSI_COLLECTOR_` environment overrides)
//! - Starts synthetic driver traffic and the collector
//! - Pulls samples from the output queue and logs them
//! - Logs a status line every `reporting.status_interval_secs`
//!
//! # Usage
//!
//! ```bash
//! csi-collector --config config/collector.toml --traffic-rate 200 --duration 30
//! RUST_LOG=debug csi-collector --log-format json
//! csi-collector --config config/collector.toml --print-config
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use csi_collector::config::Settings;
use csi_collector::logging::{self, OutputFormat, TracingConfig};
use csi_collector::{Collector, CollectorError, SimulatedRadio};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Timeout for each pull from the output queue.
const PULL_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "csi-collector")]
#[command(about = "CSI acquisition pipeline with a simulated radio", long_about = None)]
struct Cli {
    /// Settings file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seconds to run; 0 runs until Ctrl-C
    #[arg(long, default_value_t = 0)]
    duration: u64,

    /// Simulated frames per second
    #[arg(long, default_value_t = 50)]
    traffic_rate: u32,

    /// Override the configured log format
    #[arg(long, value_enum)]
    log_format: Option<OutputFormat>,

    /// Print the effective settings as TOML and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref())?;

    if cli.print_config {
        let rendered =
            toml::to_string_pretty(&settings).context("Failed to render settings as TOML")?;
        print!("{rendered}");
        return Ok(());
    }

    let mut tracing_config = TracingConfig::from_settings(&settings).map_err(anyhow::Error::msg)?;
    if let Some(format) = cli.log_format {
        tracing_config = tracing_config.with_format(format);
    }
    logging::init(tracing_config).map_err(anyhow::Error::msg)?;

    info!(version = env!("CARGO_PKG_VERSION"), "csi-collector starting");

    if !settings.collector.enabled {
        warn!("Collector disabled in configuration, nothing to do");
        return Ok(());
    }

    let radio = SimulatedRadio::new();
    let collector =
        Arc::new(Collector::new(radio.clone()).with_csi_options(settings.radio));

    collector
        .init(settings.collector.config)
        .await
        .context("Failed to initialize collector")?;
    collector
        .start()
        .await
        .context("Failed to start collector")?;

    radio
        .spawn_traffic(cli.traffic_rate, None)
        .context("Failed to start simulated traffic")?;

    let consumer = tokio::spawn(consume(Arc::clone(&collector)));
    let status = tokio::spawn(report_status(
        Arc::clone(&collector),
        settings.reporting.status_interval_secs,
    ));

    if cli.duration == 0 {
        tokio::signal::ctrl_c().await?;
        info!("Ctrl-C received");
    } else {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(cli.duration)) => {}
            res = tokio::signal::ctrl_c() => {
                res?;
                info!("Ctrl-C received");
            }
        }
    }

    info!("Shutting down");
    status.abort();
    radio.stop_traffic();
    collector.stop().await?;
    // Consumer sees InvalidState once stopped and exits
    if let Err(e) = consumer.await {
        warn!(error = %e, "Consumer task failed");
    }

    match collector.get_stats() {
        Ok(stats) => info!(
            received = stats.packets_received,
            processed = stats.packets_processed,
            dropped = stats.packets_dropped,
            filter_hits = stats.filter_hits,
            overruns = stats.buffer_overruns,
            average_rssi = stats.average_rssi,
            "Final statistics"
        ),
        Err(e) => warn!(error = %e, "Statistics unavailable"),
    }

    collector.deinit().await?;
    info!("csi-collector stopped");
    Ok(())
}

/// Pull consumer: logs every sample until the collector stops.
async fn consume(collector: Arc<Collector>) {
    let mut samples = 0u64;
    loop {
        match collector.get_data(Some(PULL_TIMEOUT)).await {
            Ok(sample) => {
                samples += 1;
                debug!(
                    len = sample.len(),
                    rssi = sample.rssi,
                    mac = %sample.mac,
                    significant_change = sample.significant_change,
                    "CSI sample"
                );
            }
            Err(CollectorError::Timeout) => {}
            Err(e) => {
                debug!(error = %e, samples, "Consumer exiting");
                break;
            }
        }
    }
}

async fn report_status(collector: Arc<Collector>, interval_secs: u64) {
    if interval_secs == 0 {
        return;
    }
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let Ok(stats) = collector.get_stats() else {
            break;
        };
        let buffer = collector.buffer_stats().unwrap_or_default();
        info!(
            received = stats.packets_received,
            processed = stats.packets_processed,
            dropped = stats.packets_dropped,
            average_rssi = stats.average_rssi,
            buffer_depth = buffer.depth,
            buffer_capacity = buffer.capacity,
            "Collector status"
        );
    }
}
