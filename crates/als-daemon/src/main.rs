//! AS3677 Light Sensor Daemon
//!
//! Registers the light sensor driver, polls it and writes each reading to
//! stdout as a JSON line.

mod config;

use als_hw::light::POWER_ATTR;
use als_hw::{
    AttributeAccess, EventFifo, LightSensor, SensorEvent, SensorRegistry, Sysfs,
    SENSOR_LIGHTSENSOR_HANDLE,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;

#[derive(Parser)]
#[command(name = "alsd")]
#[command(about = "Streams AS3677 ambient light readings as JSON lines")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Exit after writing this many events
    #[arg(short = 'n', long)]
    count: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; stdout carries the event stream
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .init();

    // Load configuration
    let config = if Path::new(&cli.config).exists() {
        let config = Config::load(&cli.config).context("Failed to load configuration")?;
        info!("Loaded configuration from: {}", cli.config);
        config
    } else {
        warn!("{} not found, using defaults", cli.config);
        Config::default()
    };

    let fifo = Arc::new(EventFifo::new(config.fifo_capacity));
    info!("Event queue holds up to {} events", fifo.capacity());

    let mut registry = SensorRegistry::new();
    registry.register(Box::new(LightSensor::with_device(
        &config.device,
        fifo.clone(),
    )))?;
    for info in registry.list() {
        info!(
            "Sensor {}: {} by {} ({}, range {})",
            info.handle, info.name, info.vendor, info.sensor_type, info.max_range
        );
    }
    registry.init_all().context("Failed to initialize sensors")?;

    let sensor = registry.get_mut(SENSOR_LIGHTSENSOR_HANDLE)?;
    sensor.set_delay(config.delay_ns())?;
    if let Err(e) = sensor.activate(true) {
        let status = e.status();
        registry.close_all();
        return Err(e).with_context(|| format!("Failed to activate light sensor ({})", status));
    }

    // Setup Unix signal handlers
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;

    let drain_interval = Duration::from_millis(config.drain_interval_ms.max(1));
    let outcome = tokio::select! {
        result = stream_events(fifo.clone(), drain_interval, cli.count) => {
            result.map(|written| info!("Wrote {} events, shutting down", written))
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down");
            Ok(())
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down");
            Ok(())
        }
    };

    // Stop polling before the driver is torn down
    registry.get_mut(SENSOR_LIGHTSENSOR_HANDLE)?.activate(false)?;
    registry.close_all();
    log_power_state(&Sysfs::new(&config.device));

    if fifo.dropped() > 0 {
        warn!("{} events dropped because the queue was full", fifo.dropped());
    }

    outcome
}

/// Periodically drains the queue to stdout until `limit` events are written.
async fn stream_events(fifo: Arc<EventFifo>, interval: Duration, limit: Option<u64>) -> Result<u64> {
    let mut ticker = tokio::time::interval(interval);
    let mut written: u64 = 0;

    loop {
        ticker.tick().await;
        let mut events = fifo.drain();
        if let Some(limit) = limit {
            let remaining = limit.saturating_sub(written) as usize;
            events.truncate(remaining);
        }

        let stdout = std::io::stdout();
        written += write_events(&mut stdout.lock(), &events)? as u64;

        if limit.is_some_and(|limit| written >= limit) {
            return Ok(written);
        }
    }
}

/// Reports whether the chip's ALS block is still powered.
fn log_power_state<A: AttributeAccess>(sysfs: &A) -> Option<i64> {
    match sysfs.read_int(POWER_ATTR) {
        Ok(on) => {
            info!("{} = {} after shutdown", POWER_ATTR, on);
            Some(on)
        }
        Err(e) => {
            warn!("Could not read {} ({}): {}", POWER_ATTR, e.status(), e);
            None
        }
    }
}

/// Writes events as newline-delimited JSON.
fn write_events<W: Write>(out: &mut W, events: &[SensorEvent]) -> Result<usize> {
    for event in events {
        serde_json::to_writer(&mut *out, event).context("Failed to encode event")?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(events.len())
}
