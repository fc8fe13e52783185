//! Linux radio backend built on `iw` and `ip`.
//!
//! ## Approach
//!
//! 1. Detect the wireless interface via `iw dev`.
//! 2. Monitor mode: `ip link set <iface> down`, `iw dev <iface> set type
//!    monitor`, `ip link set <iface> up`, `iw dev <iface> set channel <N>`.
//! 3. Station enumeration: `iw dev <iface> station dump`.
//! 4. Interface type and transmit power: `iw dev <iface> info` /
//!    `iw dev <iface> set txpower`.
//!
//! All of these require **root** (`sudo`) or `CAP_NET_ADMIN`.

use std::fs;
use std::process::Command;

use super::{Radio, SecondaryChannel, StationInfo};
use crate::error::RadioError;
use crate::parser::parse_mac;

pub struct LinuxRadio {
    iface: String,
}

impl LinuxRadio {
    pub fn new(iface: &str) -> Self {
        Self {
            iface: iface.to_string(),
        }
    }

    fn iw(&self, args: &[&str]) -> Result<String, RadioError> {
        let mut full = vec!["dev", self.iface.as_str()];
        full.extend_from_slice(args);
        run("iw", &full)
    }

    fn link(&self, state: &str) -> Result<String, RadioError> {
        run("ip", &["link", "set", &self.iface, state])
    }
}

/// Run a command, returning a [`RadioError`] on non-zero exit.
fn run(cmd: &str, args: &[&str]) -> Result<String, RadioError> {
    let output = Command::new(cmd).args(args).output()?;
    if !output.status.success() {
        return Err(RadioError::Command {
            command: format!("{cmd} {}", args.join(" ")),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

pub fn detect_interface() -> Result<String, RadioError> {
    let output = run("iw", &["dev"])?;
    parse_iw_dev(&output).ok_or_else(|| RadioError::Parse("no wireless interface listed by `iw dev`".into()))
}

impl Radio for LinuxRadio {
    fn interface(&self) -> &str {
        &self.iface
    }

    fn enable_monitor_mode(&mut self, channel: u8) -> Result<(), RadioError> {
        log::info!("Bringing {} down …", self.iface);
        self.link("down")?;

        log::info!("Enabling monitor mode on {} …", self.iface);
        self.iw(&["set", "type", "monitor"])?;

        log::info!("Bringing {} up …", self.iface);
        self.link("up")?;

        self.set_channel(channel, SecondaryChannel::None)
    }

    fn disable_monitor_mode(&mut self) -> Result<(), RadioError> {
        log::info!("Restoring managed mode on {} …", self.iface);
        self.link("down")?;
        self.iw(&["set", "type", "managed"])?;
        self.link("up")?;
        Ok(())
    }

    fn set_channel(&mut self, channel: u8, secondary: SecondaryChannel) -> Result<(), RadioError> {
        let ch = channel.to_string();
        let width = match secondary {
            SecondaryChannel::None => "HT20",
        };
        self.iw(&["set", "channel", &ch, width]).map_err(|e| {
            log::debug!("set channel {channel} on {}: {e}", self.iface);
            RadioError::ChannelRejected(channel)
        })?;
        Ok(())
    }

    fn interface_mode(&mut self) -> Result<String, RadioError> {
        let output = self.iw(&["info"])?;
        parse_iface_type(&output).ok_or_else(|| RadioError::Parse("no type in `iw info`".into()))
    }

    fn station_list(&mut self) -> Result<Vec<StationInfo>, RadioError> {
        let output = self.iw(&["station", "dump"])?;
        Ok(parse_station_dump(&output))
    }

    fn mac_address(&mut self) -> Result<[u8; 6], RadioError> {
        let path = format!("/sys/class/net/{}/address", self.iface);
        let raw = fs::read_to_string(&path)?;
        parse_mac(&raw).ok_or_else(|| RadioError::Parse(format!("bad address in {path}: {raw:?}")))
    }

    fn tx_power(&mut self) -> Result<f64, RadioError> {
        let output = self.iw(&["info"])?;
        parse_txpower(&output).ok_or_else(|| RadioError::Parse("no txpower in `iw info`".into()))
    }

    fn set_tx_power(&mut self, dbm: f64) -> Result<(), RadioError> {
        // iw takes mBm.
        let mbm = ((dbm * 100.0).round() as i64).to_string();
        self.iw(&["set", "txpower", "fixed", &mbm])?;
        Ok(())
    }

    fn link_rssi(&mut self) -> Result<Option<i8>, RadioError> {
        let output = self.iw(&["link"])?;
        Ok(parse_link_signal(&output))
    }
}

// ---------------------------------------------------------------------------
// `iw` output parsing
// ---------------------------------------------------------------------------

/// First `Interface <name>` line of `iw dev`.
fn parse_iw_dev(output: &str) -> Option<String> {
    output
        .lines()
        .filter_map(|l| l.trim().strip_prefix("Interface "))
        .map(|name| name.trim().to_string())
        .next()
}

/// Parse `iw dev <iface> station dump`:
///
/// ```text
/// Station 12:34:56:78:9a:bc (on wlan0)
///         inactive time:  304 ms
///         signal:         -52 [-54, -55] dBm
/// ```
fn parse_station_dump(output: &str) -> Vec<StationInfo> {
    let mut stations: Vec<StationInfo> = Vec::new();
    for line in output.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("Station ") {
            match rest.split_whitespace().next().and_then(parse_mac) {
                Some(mac) => stations.push(StationInfo {
                    mac,
                    signal_dbm: None,
                }),
                None => log::warn!("Skipping unparsable station line: {trimmed}"),
            }
        } else if let Some(rest) = trimmed.strip_prefix("signal:") {
            if let Some(last) = stations.last_mut() {
                last.signal_dbm = leading_dbm(rest);
            }
        }
    }
    stations
}

/// `type AP` from `iw dev <iface> info`.
fn parse_iface_type(output: &str) -> Option<String> {
    output
        .lines()
        .filter_map(|l| l.trim().strip_prefix("type "))
        .map(|t| t.trim().to_string())
        .next()
}

/// `txpower 20.00 dBm` from `iw dev <iface> info`.
fn parse_txpower(output: &str) -> Option<f64> {
    output
        .lines()
        .filter_map(|l| l.trim().strip_prefix("txpower "))
        .filter_map(|rest| rest.split_whitespace().next())
        .find_map(|v| v.parse().ok())
}

/// `signal: -48 dBm` from `iw dev <iface> link`; `None` when not connected.
fn parse_link_signal(output: &str) -> Option<i8> {
    output
        .lines()
        .filter_map(|l| l.trim().strip_prefix("signal:"))
        .find_map(leading_dbm)
}

fn leading_dbm(s: &str) -> Option<i8> {
    s.split_whitespace().next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_iw_dev() {
        let out = "phy#0\n\tInterface wlan0\n\t\tifindex 3\n\t\ttype managed\n\tInterface wlan1\n";
        assert_eq!(parse_iw_dev(out), Some("wlan0".to_string()));
        assert_eq!(parse_iw_dev("phy#0\n"), None);
    }

    #[test]
    fn test_parse_station_dump_keeps_driver_order() {
        let out = "\
Station 02:00:00:00:00:0b (on wlan0)
\tinactive time:\t304 ms
\tsignal:  \t-52 [-54, -55] dBm
Station 02:00:00:00:00:0a (on wlan0)
\tinactive time:\t12 ms
";
        let stations = parse_station_dump(out);
        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].mac, [0x02, 0, 0, 0, 0, 0x0b]);
        assert_eq!(stations[0].signal_dbm, Some(-52));
        assert_eq!(stations[1].mac, [0x02, 0, 0, 0, 0, 0x0a]);
        assert_eq!(stations[1].signal_dbm, None);
    }

    #[test]
    fn test_parse_txpower() {
        let out = "Interface wlan0\n\tifindex 3\n\ttype AP\n\ttxpower 17.00 dBm\n";
        assert_eq!(parse_txpower(out), Some(17.0));
    }

    #[test]
    fn test_parse_iface_type() {
        let ap = "Interface wlan0\n\tifindex 3\n\ttype AP\n\ttxpower 17.00 dBm\n";
        assert_eq!(parse_iface_type(ap).as_deref(), Some("AP"));
        let sta = "Interface wlan0\n\tssid Home\n\ttype managed\n\tchannel 6 (2437 MHz)\n";
        assert_eq!(parse_iface_type(sta).as_deref(), Some("managed"));
        assert_eq!(parse_iface_type("Interface wlan0\n"), None);
    }

    #[test]
    fn test_parse_link_signal() {
        let out = "Connected to aa:bb:cc:dd:ee:ff (on wlan0)\n\tSSID: Home\n\tsignal: -48 dBm\n";
        assert_eq!(parse_link_signal(out), Some(-48));
        assert_eq!(parse_link_signal("Not connected.\n"), None);
    }
}
