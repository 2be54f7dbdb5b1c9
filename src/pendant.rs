//! Device bring-up and the background loops around a session
//!
//! Detection and the engine run on blocking threads; the job feeder and the
//! status poller are tokio tasks that only touch the session.

use anyhow::Context;
use cncpendant_communication::{
    list_ports, DeviceDetector, SerialPortInfo, SerialTransport, Session,
};
use cncpendant_settings::{Config, ConnectionSettings};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Port to open, resolving `auto` to the most likely controller port
pub fn resolve_port(settings: &ConnectionSettings) -> anyhow::Result<String> {
    if !settings.is_auto_port() {
        return Ok(settings.port.clone());
    }
    let ports = list_ports().context("Failed to enumerate serial ports")?;
    let port = pick_port(ports)
        .context("No serial port looks like a controller; set connection.port")?;
    match (port.vid, port.pid) {
        (Some(vid), Some(pid)) => tracing::info!(
            "Using {} ({}, {:04x}:{:04x})",
            port.port_name,
            port.description,
            vid,
            pid
        ),
        _ => tracing::info!("Using {} ({})", port.port_name, port.description),
    }
    Ok(port.port_name)
}

/// First USB adapter with a vendor ID, else the first port listed
pub fn pick_port(ports: Vec<SerialPortInfo>) -> Option<SerialPortInfo> {
    let usb = ports.iter().position(|p| p.vid.is_some()).unwrap_or(0);
    ports.into_iter().nth(usb)
}

/// Open the port, detect the firmware and start the engine thread
///
/// Blocks until a firmware answers; returns `None` if `stop` was raised
/// first.
pub fn bring_up(
    config: &Config,
    session: &Session,
    stop: &Arc<AtomicBool>,
) -> anyhow::Result<Option<JoinHandle<()>>> {
    let port = resolve_port(&config.connection)?;
    let detector = DeviceDetector::new(config.detector_config());
    let first_baud = detector
        .config()
        .preferred
        .map(|(baud, _)| baud)
        .or_else(|| detector.config().baud_rates.first().copied())
        .context("No baud rate configured")?;
    let transport = SerialTransport::open(&port, first_baud)?;

    tracing::info!("Detecting firmware on {}", port);
    let should_stop = {
        let stop = stop.clone();
        move || stop.load(Ordering::Acquire)
    };
    let Some(mut device) = detector.detect_device(
        Box::new(transport),
        config.device_config(),
        session.bus().clone(),
        should_stop,
    ) else {
        return Ok(None);
    };

    session.register_device(device.handle())?;
    device.begin();

    let stop = stop.clone();
    let period = config.tick_interval();
    let engine = std::thread::Builder::new()
        .name("device-engine".to_string())
        .spawn(move || device.run(stop, period))
        .context("Failed to spawn device engine thread")?;
    Ok(Some(engine))
}

/// Feed the job into the device every `period`
pub async fn run_job_loop(session: Arc<Session>, period: Duration, stop: Arc<AtomicBool>) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    while !stop.load(Ordering::Acquire) {
        ticker.tick().await;
        session.tick_job();
    }
}

/// Ask for position and telemetry every `period` while connected
pub async fn run_status_poll(session: Arc<Session>, period: Duration, stop: Arc<AtomicBool>) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    while !stop.load(Ordering::Acquire) {
        ticker.tick().await;
        let Some(device) = session.device() else {
            continue;
        };
        if device.is_connected() && !device.is_in_panic() && !device.request_status_update(None) {
            tracing::trace!("Status poll skipped, priority lane full");
        }
    }
}
