//! Alert transports.
//!
//! The engine hands every confirmed verdict to exactly one
//! [`AlertTransport`] and blocks until it returns. Transports do not retry:
//! a failed dispatch is reported back and the verdict is dropped.

use std::io::Write;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::error::AlertError;
use crate::parser::format_mac;
use crate::record::{AttackKind, Verdict};

pub trait AlertTransport: Send {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Deliver one alert for `verdict`.
    fn dispatch(&mut self, verdict: &Verdict) -> Result<(), AlertError>;

    /// Liveness message for the alert sink.
    fn heartbeat(&mut self) -> Result<(), AlertError>;
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Network (HTTP webhook)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct AlertPayload<'a> {
    sensor_id: &'a str,
    attack: AttackKind,
    source: String,
    destination: String,
    bssid: String,
    rssi: i8,
    channel: u8,
    reason_code: u16,
    timestamp: u64,
}

impl<'a> AlertPayload<'a> {
    fn new(sensor_id: &'a str, verdict: &Verdict) -> Self {
        let ev = &verdict.evidence;
        Self {
            sensor_id,
            attack: verdict.kind,
            source: format_mac(&ev.source),
            destination: format_mac(&ev.destination),
            bssid: format_mac(&ev.bssid),
            rssi: ev.rssi,
            channel: ev.channel,
            reason_code: ev.reason_code,
            timestamp: unix_secs(),
        }
    }
}

#[derive(Debug, Serialize)]
struct HeartbeatPayload<'a> {
    sensor_id: &'a str,
    heartbeat: bool,
    timestamp: u64,
}

/// POSTs a JSON document per alert to a webhook.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    url: String,
    sensor_id: String,
}

impl HttpTransport {
    pub fn new(url: &str, sensor_id: &str, timeout: Duration) -> Result<Self, AlertError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("airwarden/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            sensor_id: sensor_id.to_string(),
        })
    }

    fn post<T: Serialize>(&self, body: &T) -> Result<(), AlertError> {
        let response = self.client.post(&self.url).json(body).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(AlertError::Status(status.as_u16()));
        }
        Ok(())
    }
}

impl AlertTransport for HttpTransport {
    fn name(&self) -> &'static str {
        "network"
    }

    fn dispatch(&mut self, verdict: &Verdict) -> Result<(), AlertError> {
        if verdict.kind == AttackKind::None {
            return Err(AlertError::Idle);
        }
        self.post(&AlertPayload::new(&self.sensor_id, verdict))
    }

    fn heartbeat(&mut self) -> Result<(), AlertError> {
        self.post(&HeartbeatPayload {
            sensor_id: &self.sensor_id,
            heartbeat: true,
            timestamp: unix_secs(),
        })
    }
}

// ---------------------------------------------------------------------------
// Radio side-channel (serial-attached radio modem)
// ---------------------------------------------------------------------------

/// Fixed payload size of the radio link (nRF24-class modems).
pub const LINK_FRAME_LEN: usize = 32;

const LINK_MAGIC: u8 = 0xA7;
const LINK_VERSION: u8 = 1;
const LINK_KIND_HEARTBEAT: u8 = 0xFF;

/// Frame layout:
///
/// | offset | size | field |
/// |-------:|-----:|-------|
/// | 0  | 1 | magic `0xA7` |
/// | 1  | 1 | version |
/// | 2  | 1 | attack kind (`0xFF` = heartbeat) |
/// | 3  | 6 | source |
/// | 9  | 6 | destination |
/// | 15 | 6 | BSSID |
/// | 21 | 1 | RSSI (i8) |
/// | 22 | 1 | channel |
/// | 23 | 2 | reason code (LE) |
/// | 25 | 2 | sequence number (LE) |
/// | 27 | 5 | zero |
pub fn encode_link_frame(kind: u8, verdict: Option<&Verdict>, seq: u16) -> [u8; LINK_FRAME_LEN] {
    let mut f = [0u8; LINK_FRAME_LEN];
    f[0] = LINK_MAGIC;
    f[1] = LINK_VERSION;
    f[2] = kind;
    if let Some(v) = verdict {
        let ev = &v.evidence;
        f[3..9].copy_from_slice(&ev.source);
        f[9..15].copy_from_slice(&ev.destination);
        f[15..21].copy_from_slice(&ev.bssid);
        f[21] = ev.rssi as u8;
        f[22] = ev.channel;
        f[23..25].copy_from_slice(&ev.reason_code.to_le_bytes());
    }
    f[25..27].copy_from_slice(&seq.to_le_bytes());
    f
}

/// Writes fixed-size frames to a radio modem (usually a serial device).
pub struct RadioLinkTransport<W: Write + Send> {
    link: W,
    seq: u16,
}

impl<W: Write + Send> RadioLinkTransport<W> {
    pub fn new(link: W) -> Self {
        Self { link, seq: 0 }
    }

    fn send(&mut self, kind: u8, verdict: Option<&Verdict>) -> Result<(), AlertError> {
        let frame = encode_link_frame(kind, verdict, self.seq);
        self.seq = self.seq.wrapping_add(1);
        self.link.write_all(&frame)?;
        self.link.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> AlertTransport for RadioLinkTransport<W> {
    fn name(&self) -> &'static str {
        "radio"
    }

    fn dispatch(&mut self, verdict: &Verdict) -> Result<(), AlertError> {
        if verdict.kind == AttackKind::None {
            return Err(AlertError::Idle);
        }
        self.send(verdict.kind as u8, Some(verdict))
    }

    fn heartbeat(&mut self) -> Result<(), AlertError> {
        self.send(LINK_KIND_HEARTBEAT, None)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Evidence;

    fn verdict() -> Verdict {
        Verdict {
            kind: AttackKind::DeauthFlood,
            evidence: Evidence {
                source: [0x11; 6],
                destination: [0xFF; 6],
                bssid: [0x22; 6],
                rssi: -60,
                channel: 6,
                reason_code: 7,
            },
        }
    }

    #[test]
    fn test_link_frame_layout() {
        let f = encode_link_frame(AttackKind::EvilTwin as u8, Some(&verdict()), 0x0102);
        assert_eq!(f.len(), LINK_FRAME_LEN);
        assert_eq!(&f[0..3], &[0xA7, 1, 2]);
        assert_eq!(&f[3..9], &[0x11; 6]);
        assert_eq!(&f[9..15], &[0xFF; 6]);
        assert_eq!(&f[15..21], &[0x22; 6]);
        assert_eq!(f[21] as i8, -60);
        assert_eq!(f[22], 6);
        assert_eq!(&f[23..25], &[7, 0]);
        assert_eq!(&f[25..27], &[0x02, 0x01]);
        assert!(f[27..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_radio_link_writes_one_frame_per_alert() {
        let mut t = RadioLinkTransport::new(Vec::new());
        t.dispatch(&verdict()).unwrap();
        t.heartbeat().unwrap();
        assert_eq!(t.link.len(), 2 * LINK_FRAME_LEN);
        assert_eq!(t.link[2], AttackKind::DeauthFlood as u8);
        assert_eq!(t.link[LINK_FRAME_LEN + 2], 0xFF);
        // Sequence number increments per frame.
        assert_eq!(t.link[LINK_FRAME_LEN + 25], 1);
    }

    #[test]
    fn test_idle_verdict_is_rejected() {
        let mut t = RadioLinkTransport::new(Vec::new());
        let idle = Verdict {
            kind: AttackKind::None,
            evidence: Evidence::default(),
        };
        assert!(matches!(t.dispatch(&idle), Err(AlertError::Idle)));
        assert!(t.link.is_empty());
    }

    #[test]
    fn test_alert_payload_json() {
        let payload = AlertPayload::new("sensor-7", &verdict());
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["sensor_id"], "sensor-7");
        assert_eq!(json["attack"], "deauth_flood");
        assert_eq!(json["source"], "11:11:11:11:11:11");
        assert_eq!(json["bssid"], "22:22:22:22:22:22");
        assert_eq!(json["rssi"], -60);
        assert_eq!(json["reason_code"], 7);
    }
}
