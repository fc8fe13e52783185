//! # airwarden
//!
//! Wireless intrusion sensor for a single protected access point.
//!
//! Two operation modes, chosen in the configuration file:
//!
//! * **Detection**: the adapter is put in monitor mode and hops across the
//!   configured channels. Deauthentication floods (a minimum number of deauth
//!   frames per scan window) and evil-twin beacons (the protected SSID from a
//!   foreign BSSID) raise alerts.
//! * **Protection**: the adapter runs as a low-power access point. Every
//!   station that associates is close enough to be inside the geofence and
//!   is reported.
//!
//! Alerts go out either as JSON to an HTTP webhook or as fixed-size frames
//! through a serial-attached radio modem.
//!
//! ## Requirements
//!
//! Linux with `iw`/`ip`, libpcap, and a monitor/AP capable adapter. Run as
//! **root** (or with `CAP_NET_ADMIN` + `CAP_NET_RAW`).
//!
//! ## Examples
//!
//! ```text
//! sudo airwarden --config /etc/airwarden.toml
//! sudo airwarden --config /etc/airwarden.toml --interface wlan1
//! sudo airwarden --config /etc/airwarden.toml --clear-config
//! ```

mod alert;
mod capture;
mod clock;
mod config;
mod engine;
mod error;
mod geofence;
mod hop;
mod parser;
mod platform;
mod record;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;

use crate::alert::{AlertTransport, HttpTransport, RadioLinkTransport};
use crate::config::{AlertMode, OperationMode, SensorConfig};
use crate::error::ConfigError;
use crate::record::CaptureResult;

#[derive(Parser)]
#[command(name = "airwarden")]
#[command(version, about = "802.11 deauth / evil-twin / geofence sensor")]
struct Cli {
    /// Sensor configuration file (TOML).
    #[arg(short, long, default_value = "/etc/airwarden.toml")]
    config: PathBuf,

    /// Network interface to use.  Overrides the configuration; auto-detected
    /// if neither is set.
    #[arg(short, long)]
    interface: Option<String>,

    /// Delete the stored configuration and exit.
    #[arg(long)]
    clear_config: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    if cli.clear_config {
        match config::clear(&cli.config) {
            Ok(()) => log::info!("Configuration cleared ({})", cli.config.display()),
            Err(e) => {
                log::error!("{e}");
                std::process::exit(1);
            }
        }
        return;
    }

    // ── Configuration ───────────────────────────────────────────────────
    let cfg = match SensorConfig::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e @ ConfigError::NotConfigured(_)) => {
            log::error!("{e}");
            log::error!("Write a configuration file and pass it with --config.");
            std::process::exit(1);
        }
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    };
    cfg.log_summary();

    if let Err(e) = run(cli, cfg) {
        log::error!("{e}");
        std::process::exit(1);
    }
    log::info!("Done.");
}

fn run(cli: Cli, cfg: SensorConfig) -> Result<(), Box<dyn std::error::Error>> {
    // ── Platform setup ──────────────────────────────────────────────────
    let iface = match cli.interface.or_else(|| cfg.interface.clone()) {
        Some(name) => name,
        None => platform::detect_interface()?,
    };
    log::info!("Using interface {iface}");

    let transport = build_transport(&cfg)?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || {
            log::info!("Interrupt received — shutting down …");
            running.store(false, Ordering::Relaxed);
        })
        .expect("Failed to set Ctrl-C handler");
    }

    let record = Arc::new(CaptureResult::new());
    let mut radio = platform::create_radio(&iface);

    let capture = match cfg.operation_mode {
        OperationMode::Detection => {
            if let Err(e) = radio.enable_monitor_mode(cfg.detection.init_channel) {
                log::error!(
                    "Make sure you are running as root and that your adapter supports monitor mode."
                );
                return Err(e.into());
            }
            log::info!("Attack detection mode activated on {}", radio.interface());
            let capture_cfg = capture::CaptureConfig {
                interface: iface.clone(),
                profile: capture::ApProfile {
                    ssid: cfg.protected_ap.ssid.clone(),
                    bssid: cfg.protected_ap.bssid,
                },
            };
            Some(capture::spawn(capture_cfg, Arc::clone(&record), Arc::clone(&running))?)
        }
        OperationMode::Protection => {
            if let Err(e) = platform::require_ap_role(radio.as_mut()) {
                log::error!("Start the geofence access point (e.g. hostapd) on {iface} first.");
                return Err(e.into());
            }
            log::info!(
                "Protection mode activated: geofence AP {:?} on channel {}",
                cfg.protected_ap.ssid,
                cfg.protection.ap_channel
            );
            None
        }
    };

    // ── Control loop ────────────────────────────────────────────────────
    let mut sensor = engine::Sensor::new(
        &cfg,
        Arc::clone(&record),
        radio,
        transport,
        Arc::new(clock::SystemClock),
    );
    sensor.run(&running);

    // ── Teardown ────────────────────────────────────────────────────────
    if let Some(handle) = capture {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("Capture thread ended with error: {e}"),
            Err(_) => log::warn!("Capture thread panicked"),
        }
        let mut radio = platform::create_radio(&iface);
        if let Err(e) = radio.disable_monitor_mode() {
            log::warn!("Cleanup error: {e}");
        }
    }
    Ok(())
}

fn build_transport(cfg: &SensorConfig) -> Result<Box<dyn AlertTransport>, Box<dyn std::error::Error>> {
    let alert = &cfg.alert;
    let transport: Box<dyn AlertTransport> = match cfg.alert_mode {
        AlertMode::Network => {
            let url = alert.url.as_deref().ok_or("alert.url is not set")?;
            Box::new(HttpTransport::new(url, &alert.sensor_id, cfg.alert_timeout())?)
        }
        AlertMode::Radio => {
            let device = alert.radio_device.as_deref().ok_or("alert.radio_device is not set")?;
            let link = OpenOptions::new().write(true).open(device)?;
            Box::new(RadioLinkTransport::new(link))
        }
    };
    log::info!("Alerts via {} transport", transport.name());
    Ok(transport)
}
