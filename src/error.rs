//! Error types shared across the sensor.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures while loading or validating the sensor configuration.
///
/// All of these are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("sensor is not configured: {0} does not exist")]
    NotConfigured(PathBuf),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failures reported by the radio hardware abstraction.
#[derive(Debug, Error)]
pub enum RadioError {
    #[error("`{command}` failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("could not parse radio output: {0}")]
    Parse(String),

    #[error("channel {0} rejected by the driver")]
    ChannelRejected(u8),

    #[error("{iface} runs as {mode}, not as an access point")]
    NotAccessPoint { iface: String, mode: String },

    #[error("radio io error: {0}")]
    Io(#[from] io::Error),
}

/// Failures of a single alert dispatch or heartbeat.
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("alert sink answered with HTTP {0}")]
    Status(u16),

    #[error("radio link write failed: {0}")]
    Link(#[from] io::Error),

    #[error("verdict has no attack kind to dispatch")]
    Idle,
}

/// Failures that stop the capture thread.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("pcap error: {0}")]
    Pcap(#[from] pcap::Error),

    #[error("datalink type {dlt} ({name}) is not 802.11; monitor mode is required")]
    Datalink { dlt: i32, name: &'static str },
}
