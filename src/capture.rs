//! Packet capture and classification.
//!
//! Runs on its own thread: opens the monitor-mode interface with libpcap,
//! parses management frames, classifies them against the protected AP and
//! publishes the result into the shared [`CaptureResult`]. The control loop
//! may retune the radio at any time; a frame is reported against whatever
//! channel the radiotap header carried when it was classified.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use pcap::{Capture, Device};

use crate::error::CaptureError;
use crate::parser::{self, format_mac, MgmtFrame, MgmtHeader};
use crate::record::{AttackKind, CaptureResult, Evidence};

/// Identity of the access point being protected.
#[derive(Debug, Clone)]
pub struct ApProfile {
    pub ssid: String,
    pub bssid: Option<[u8; 6]>,
}

/// What a single frame means for the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// One deauthentication frame aimed at (or spoofing) the protected AP.
    Deauth(Evidence),
    /// A foreign BSSID advertising the protected SSID.
    EvilTwin(Evidence),
}

#[derive(Debug, Clone)]
pub struct Classifier {
    profile: ApProfile,
}

impl Classifier {
    pub fn new(profile: ApProfile) -> Self {
        Self { profile }
    }

    fn touches_protected(&self, h: &MgmtHeader) -> bool {
        match self.profile.bssid {
            Some(b) => h.bssid == b || h.source == b || h.destination == b,
            None => true,
        }
    }

    pub fn classify(&self, frame: &MgmtFrame) -> Option<Classification> {
        match frame {
            MgmtFrame::Deauth {
                header,
                reason_code,
            } if self.touches_protected(header) => Some(Classification::Deauth(Evidence {
                reason_code: *reason_code,
                ..evidence(header)
            })),
            MgmtFrame::Beacon { header, ssid } => {
                let known = self.profile.bssid?;
                (*ssid == self.profile.ssid && header.bssid != known)
                    .then(|| Classification::EvilTwin(evidence(header)))
            }
            _ => None,
        }
    }

    /// Classify `frame` and publish the outcome into `record`.
    pub fn publish(&self, frame: &MgmtFrame, record: &CaptureResult) -> Option<Classification> {
        let class = self.classify(frame)?;
        match class {
            Classification::Deauth(ev) => record.note_deauth(ev),
            Classification::EvilTwin(ev) => {
                if !record.raise(AttackKind::EvilTwin, ev) {
                    log::debug!(
                        "Evil twin {} dropped: a verdict is still being dispatched",
                        format_mac(&ev.bssid)
                    );
                }
            }
        }
        Some(class)
    }
}

fn evidence(h: &MgmtHeader) -> Evidence {
    Evidence {
        source: h.source,
        destination: h.destination,
        bssid: h.bssid,
        rssi: h.signal_dbm.unwrap_or(0),
        channel: h.channel_freq.and_then(parser::freq_to_channel).unwrap_or(0),
        reason_code: 0,
    }
}

/// Configuration for the capture loop.
pub struct CaptureConfig {
    /// Interface name to capture on (already in monitor mode).
    pub interface: String,
    pub profile: ApProfile,
}

/// Start the capture loop on a dedicated thread.
pub fn spawn(
    cfg: CaptureConfig,
    record: Arc<CaptureResult>,
    running: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<Result<(), CaptureError>>> {
    thread::Builder::new()
        .name("capture".into())
        .spawn(move || {
            let result = run(cfg, &record, &running);
            if let Err(e) = &result {
                log::error!("Capture stopped: {e}");
            }
            result
        })
}

/// Run the capture loop until `running` is cleared.
pub fn run(cfg: CaptureConfig, record: &CaptureResult, running: &AtomicBool) -> Result<(), CaptureError> {
    let device = Device::from(cfg.interface.as_str());

    let inactive = Capture::from_device(device)?
        .promisc(true)
        .snaplen(65535)
        .timeout(1000) // 1-second read timeout so we can check `running`
        .immediate_mode(true)
        .rfmon(true);

    let mut cap = inactive.open()?;

    // Prefer radiotap (DLT 127) for signal/channel, fall back to raw 802.11.
    if let Err(e) = cap.set_datalink(pcap::Linktype(127)) {
        log::debug!("Could not set DLT_IEEE802_11_RADIO (127): {e}");
        if let Err(e2) = cap.set_datalink(pcap::Linktype(105)) {
            log::debug!("Could not set DLT_IEEE802_11 (105): {e2}");
        }
    }

    let dlt = cap.get_datalink().0;
    log::info!("Active datalink type: {} ({})", dlt, dlt_name(dlt));
    if dlt != 127 && dlt != 105 {
        return Err(CaptureError::Datalink {
            dlt,
            name: dlt_name(dlt),
        });
    }

    // Not all drivers accept this filter on radiotap captures; software
    // filtering in the parser covers the rest.
    if let Err(e) = cap.filter("type mgt subtype deauth or type mgt subtype beacon", true) {
        log::debug!("BPF filter not applied (will filter in software): {e}");
    }

    let classifier = Classifier::new(cfg.profile);
    log::info!("Capturing management frames on {}", cfg.interface);

    while running.load(Ordering::Relaxed) {
        match cap.next_packet() {
            Ok(packet) => {
                if let Some(frame) = parser::parse_mgmt_frame(packet.data, dlt) {
                    if let Some(class) = classifier.publish(&frame, record) {
                        log::trace!("{class:?}");
                    }
                }
            }
            Err(pcap::Error::TimeoutExpired) => {
                // Expected — just loop and check the running flag.
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

/// Human-readable name for common DLT values.
fn dlt_name(dlt: i32) -> &'static str {
    match dlt {
        0 => "NULL/Loopback",
        1 => "Ethernet (EN10MB)",
        105 => "IEEE 802.11 (raw)",
        119 => "IEEE 802.11 PrismHeader",
        127 => "IEEE 802.11 Radiotap",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROTECTED: [u8; 6] = [0x22; 6];

    fn classifier(bssid: Option<[u8; 6]>) -> Classifier {
        Classifier::new(ApProfile {
            ssid: "HomeNet".to_string(),
            bssid,
        })
    }

    fn header(src: [u8; 6], bssid: [u8; 6]) -> MgmtHeader {
        MgmtHeader {
            destination: [0xFF; 6],
            source: src,
            bssid,
            signal_dbm: Some(-55),
            channel_freq: Some(2462),
        }
    }

    fn beacon(bssid: [u8; 6], ssid: &str) -> MgmtFrame {
        MgmtFrame::Beacon {
            header: header(bssid, bssid),
            ssid: ssid.to_string(),
        }
    }

    #[test]
    fn test_foreign_bssid_with_protected_ssid_is_evil_twin() {
        let c = classifier(Some(PROTECTED));
        match c.classify(&beacon([0x66; 6], "HomeNet")) {
            Some(Classification::EvilTwin(ev)) => {
                assert_eq!(ev.bssid, [0x66; 6]);
                assert_eq!(ev.rssi, -55);
                assert_eq!(ev.channel, 11);
            }
            other => panic!("expected evil twin, got {other:?}"),
        }
    }

    #[test]
    fn test_genuine_and_unrelated_beacons_ignored() {
        let c = classifier(Some(PROTECTED));
        assert_eq!(c.classify(&beacon(PROTECTED, "HomeNet")), None);
        assert_eq!(c.classify(&beacon([0x66; 6], "CoffeeShop")), None);
        // Without a known BSSID impersonation cannot be judged.
        assert_eq!(classifier(None).classify(&beacon([0x66; 6], "HomeNet")), None);
    }

    #[test]
    fn test_deauth_against_protected_ap() {
        let c = classifier(Some(PROTECTED));
        let spoofed = MgmtFrame::Deauth {
            header: header(PROTECTED, PROTECTED),
            reason_code: 7,
        };
        match c.classify(&spoofed) {
            Some(Classification::Deauth(ev)) => assert_eq!(ev.reason_code, 7),
            other => panic!("expected deauth, got {other:?}"),
        }

        let elsewhere = MgmtFrame::Deauth {
            header: header([0x44; 6], [0x44; 6]),
            reason_code: 3,
        };
        assert_eq!(c.classify(&elsewhere), None);
        assert!(classifier(None).classify(&elsewhere).is_some());
    }

    #[test]
    fn test_publish_writes_into_record() {
        let c = classifier(Some(PROTECTED));
        let record = CaptureResult::new();
        let deauth = MgmtFrame::Deauth {
            header: header([0x11; 6], PROTECTED),
            reason_code: 1,
        };
        c.publish(&deauth, &record);
        c.publish(&deauth, &record);
        assert_eq!(record.take_deauths(), 2);
        assert_eq!(record.kind(), AttackKind::None);

        c.publish(&beacon([0x66; 6], "HomeNet"), &record);
        assert_eq!(record.kind(), AttackKind::EvilTwin);
        // A second twin is refused while the first is active.
        c.publish(&beacon([0x77; 6], "HomeNet"), &record);
        assert_eq!(record.verdict().unwrap().evidence.bssid, [0x66; 6]);
    }
}
