//! Sensor configuration.
//!
//! Loaded once at startup from a TOML file and never mutated afterwards.
//! Unknown modes or inconsistent thresholds are rejected at load time; the
//! control loop has no degraded behaviour for them.
//!
//! ```toml
//! operation_mode = "detection"   # or "protection"
//! alert_mode = "network"         # or "radio"
//!
//! [protected_ap]
//! ssid = "HomeNet"
//! bssid = "aa:bb:cc:dd:ee:ff"
//!
//! [alert]
//! url = "http://10.0.0.2:8080/alerts"
//! ```

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;
use crate::geofence::GeofenceModel;
use crate::hop::HopConfig;
use crate::parser::{format_mac, parse_mac};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    Detection,
    Protection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertMode {
    /// Serial-attached radio modem.
    Radio,
    /// HTTP webhook.
    Network,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SensorConfig {
    pub operation_mode: OperationMode,
    pub alert_mode: AlertMode,

    /// Wireless interface; auto-detected when absent.
    #[serde(default)]
    pub interface: Option<String>,

    pub protected_ap: ProtectedAp,

    #[serde(default)]
    pub detection: DetectionSettings,

    #[serde(default)]
    pub protection: ProtectionSettings,

    #[serde(default)]
    pub alert: AlertSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtectedAp {
    pub ssid: String,
    /// When absent, beacons cannot be checked for impersonation and every
    /// deauth frame counts.
    #[serde(default, deserialize_with = "deserialize_mac")]
    pub bssid: Option<[u8; 6]>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectionSettings {
    pub scan_window_ms: u64,
    pub deauth_threshold: u32,
    pub hop_channels: bool,
    pub init_channel: u8,
    pub max_channel: u8,
    pub poll_interval_ms: u64,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            scan_window_ms: 2000,
            deauth_threshold: 5,
            hop_channels: true,
            init_channel: 1,
            max_channel: 13,
            poll_interval_ms: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProtectionSettings {
    pub interval_ms: u64,
    pub ap_channel: u8,
    /// Fixed transmit power re-applied on every recalibration.
    pub tx_power_dbm: Option<f64>,
    pub reference_rssi_1m: f64,
    pub path_loss_exp: f64,
}

impl Default for ProtectionSettings {
    fn default() -> Self {
        let model = GeofenceModel::default();
        Self {
            interval_ms: 5000,
            ap_channel: 1,
            tx_power_dbm: model.tx_power_dbm,
            reference_rssi_1m: model.reference_rssi_1m,
            path_loss_exp: model.path_loss_exp,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlertSettings {
    pub sensor_id: String,
    /// Webhook for the network transport.
    pub url: Option<String>,
    /// Serial device of the radio modem.
    pub radio_device: Option<String>,
    pub timeout_ms: u64,
    /// 0 disables heartbeats.
    pub heartbeat_secs: u64,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            sensor_id: "airwarden".to_string(),
            url: None,
            radio_device: None,
            timeout_ms: 3000,
            heartbeat_secs: 60,
        }
    }
}

fn deserialize_mac<'de, D>(d: D) -> Result<Option<[u8; 6]>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(d)?;
    match raw {
        None => Ok(None),
        Some(s) => parse_mac(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid MAC address {s:?}"))),
    }
}

/// Whether a stored configuration exists at `path`.
pub fn is_configured(path: &Path) -> bool {
    path.is_file()
}

/// Remove the stored configuration. Missing files are not an error.
pub fn clear(path: &Path) -> Result<(), ConfigError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

impl SensorConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !is_configured(path) {
            return Err(ConfigError::NotConfigured(path.to_path_buf()));
        }
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let cfg: SensorConfig = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.detection;
        if d.init_channel == 0 || d.max_channel > 14 || d.init_channel > d.max_channel {
            return Err(ConfigError::Invalid(format!(
                "channel bounds {}..={} must lie within 1..=14 with init <= max",
                d.init_channel, d.max_channel
            )));
        }
        if d.deauth_threshold == 0 {
            return Err(ConfigError::Invalid("deauth_threshold must be at least 1".into()));
        }
        if d.scan_window_ms == 0 {
            return Err(ConfigError::Invalid("scan_window_ms must be non-zero".into()));
        }
        if !(1..=14).contains(&self.protection.ap_channel) {
            return Err(ConfigError::Invalid(format!(
                "ap_channel {} must lie within 1..=14",
                self.protection.ap_channel
            )));
        }
        if self.protection.path_loss_exp <= 0.0 {
            return Err(ConfigError::Invalid("path_loss_exp must be positive".into()));
        }
        if self.protected_ap.ssid.is_empty() {
            return Err(ConfigError::Invalid("protected_ap.ssid must not be empty".into()));
        }
        match self.alert_mode {
            AlertMode::Network if self.alert.url.is_none() => {
                Err(ConfigError::Invalid("alert_mode = \"network\" requires alert.url".into()))
            }
            AlertMode::Radio if self.alert.radio_device.is_none() => Err(ConfigError::Invalid(
                "alert_mode = \"radio\" requires alert.radio_device".into(),
            )),
            _ => Ok(()),
        }
    }

    pub fn hop_config(&self) -> HopConfig {
        HopConfig {
            enabled: self.detection.hop_channels,
            init_channel: self.detection.init_channel,
            max_channel: self.detection.max_channel,
        }
    }

    pub fn geofence_model(&self) -> GeofenceModel {
        GeofenceModel {
            tx_power_dbm: self.protection.tx_power_dbm,
            reference_rssi_1m: self.protection.reference_rssi_1m,
            path_loss_exp: self.protection.path_loss_exp,
        }
    }

    pub fn scan_window(&self) -> Duration {
        Duration::from_millis(self.detection.scan_window_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.detection.poll_interval_ms)
    }

    pub fn protection_interval(&self) -> Duration {
        Duration::from_millis(self.protection.interval_ms)
    }

    pub fn alert_timeout(&self) -> Duration {
        Duration::from_millis(self.alert.timeout_ms)
    }

    /// `None` when heartbeats are disabled.
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        match self.alert.heartbeat_secs {
            0 => None,
            s => Some(Duration::from_secs(s)),
        }
    }

    /// Log the effective configuration at startup.
    pub fn log_summary(&self) {
        log::info!("Operation mode : {:?}", self.operation_mode);
        log::info!("Alert mode     : {:?}", self.alert_mode);
        log::info!(
            "Protected AP   : {:?} ({})",
            self.protected_ap.ssid,
            self.protected_ap
                .bssid
                .map(|b| format_mac(&b))
                .unwrap_or_else(|| "any BSSID".to_string())
        );
        match self.operation_mode {
            OperationMode::Detection => log::info!(
                "Scan window    : {} ms, deauth threshold {}, hopping {} ({}..={})",
                self.detection.scan_window_ms,
                self.detection.deauth_threshold,
                if self.detection.hop_channels { "on" } else { "off" },
                self.detection.init_channel,
                self.detection.max_channel,
            ),
            OperationMode::Protection => log::info!(
                "Geofence       : every {} ms on channel {}, txpower {:?} dBm",
                self.protection.interval_ms,
                self.protection.ap_channel,
                self.protection.tx_power_dbm,
            ),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_config(mode: OperationMode) -> SensorConfig {
    SensorConfig {
        operation_mode: mode,
        alert_mode: AlertMode::Network,
        interface: None,
        protected_ap: ProtectedAp {
            ssid: "HomeNet".to_string(),
            bssid: Some([0x22; 6]),
        },
        detection: DetectionSettings::default(),
        protection: ProtectionSettings::default(),
        alert: AlertSettings {
            url: Some("http://localhost/alerts".to_string()),
            heartbeat_secs: 0,
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
operation_mode = "detection"
alert_mode = "network"

[protected_ap]
ssid = "HomeNet"
bssid = "aa:bb:cc:dd:ee:ff"

[alert]
url = "http://10.0.0.2/alerts"
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg = SensorConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(cfg.operation_mode, OperationMode::Detection);
        assert_eq!(cfg.alert_mode, AlertMode::Network);
        assert_eq!(cfg.protected_ap.bssid, Some([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]));
        assert_eq!(cfg.scan_window(), Duration::from_millis(2000));
        assert_eq!(cfg.detection.deauth_threshold, 5);
        assert_eq!(cfg.heartbeat_interval(), Some(Duration::from_secs(60)));
        assert_eq!(
            cfg.hop_config(),
            HopConfig {
                enabled: true,
                init_channel: 1,
                max_channel: 13
            }
        );
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let text = MINIMAL.replace("\"detection\"", "\"jamming\"");
        assert!(matches!(SensorConfig::from_toml(&text), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_mode_rejected() {
        let text = MINIMAL.replace("alert_mode = \"network\"\n", "");
        assert!(matches!(SensorConfig::from_toml(&text), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_bad_mac_rejected() {
        let text = MINIMAL.replace("aa:bb:cc:dd:ee:ff", "not-a-mac");
        assert!(matches!(SensorConfig::from_toml(&text), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_inverted_channel_bounds_rejected() {
        let text = format!("{MINIMAL}\n[detection]\ninit_channel = 11\nmax_channel = 6\n");
        assert!(matches!(SensorConfig::from_toml(&text), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let text = format!("{MINIMAL}\n[detection]\ndeauth_threshold = 0\n");
        assert!(matches!(SensorConfig::from_toml(&text), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_transport_endpoint_required() {
        let text = MINIMAL
            .replace("alert_mode = \"network\"", "alert_mode = \"radio\"");
        assert!(matches!(SensorConfig::from_toml(&text), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sensor.toml");
        assert!(!is_configured(&path));
        assert!(matches!(SensorConfig::load(&path), Err(ConfigError::NotConfigured(_))));

        let mut f = fs::File::create(&path).unwrap();
        f.write_all(MINIMAL.as_bytes()).unwrap();
        drop(f);

        assert!(is_configured(&path));
        let cfg = SensorConfig::load(&path).unwrap();
        assert_eq!(cfg.protected_ap.ssid, "HomeNet");

        clear(&path).unwrap();
        assert!(!is_configured(&path));
        // Clearing twice is fine.
        clear(&path).unwrap();
    }

    #[test]
    fn test_sample_config_parses() {
        let cfg = SensorConfig::from_toml(include_str!("../airwarden.toml.sample")).unwrap();
        assert_eq!(cfg.operation_mode, OperationMode::Detection);
        assert_eq!(cfg.protected_ap.bssid, Some([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]));
        assert_eq!(cfg.detection.deauth_threshold, 5);
    }
}
