//! 802.11 frame and Radiotap header parsing.
//!
//! Extracts the management frames the classifier cares about
//! (deauthentication and beacons) with their addressing, signal strength and
//! channel from raw pcap packets captured in monitor mode.

/// A management frame relevant to attack classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MgmtFrame {
    Deauth {
        header: MgmtHeader,
        reason_code: u16,
    },
    Beacon {
        header: MgmtHeader,
        /// Advertised SSID (empty for hidden networks).
        ssid: String,
    },
}

/// Addresses and radio metadata common to every management frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MgmtHeader {
    /// Address 1.
    pub destination: [u8; 6],
    /// Address 2.
    pub source: [u8; 6],
    /// Address 3.
    pub bssid: [u8; 6],
    /// Signal strength in dBm (from Radiotap header), if available.
    pub signal_dbm: Option<i8>,
    /// Channel frequency in MHz (from Radiotap header), if available.
    pub channel_freq: Option<u16>,
}

// ---------------------------------------------------------------------------
// Radiotap header parsing
// ---------------------------------------------------------------------------

/// Field metadata: (bit index, size in bytes, alignment).
const RADIOTAP_FIELDS: &[(u8, usize, usize)] = &[
    (0, 8, 8), // TSFT
    (1, 1, 1), // Flags
    (2, 1, 1), // Rate
    (3, 4, 2), // Channel (freq u16 + flags u16)
    (4, 2, 1), // FHSS
    (5, 1, 1), // Antenna Signal dBm
];

fn align_up(offset: usize, align: usize) -> usize {
    (offset + align - 1) & !(align - 1)
}

struct RadiotapInfo {
    header_len: usize,
    signal_dbm: Option<i8>,
    channel_freq: Option<u16>,
}

fn parse_radiotap(data: &[u8]) -> Option<RadiotapInfo> {
    if data.len() < 8 {
        return None;
    }
    let version = data[0];
    if version != 0 {
        log::warn!("Unsupported radiotap version {version}");
        return None;
    }
    let header_len = u16::from_le_bytes([data[2], data[3]]) as usize;
    if data.len() < header_len {
        return None;
    }
    let present = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);

    // Extended present bitmasks (bit 31 set) push the field area back.
    let mut bitmask_count = 1usize;
    {
        let mut p = present;
        while p & (1 << 31) != 0 {
            let base = 4 + bitmask_count * 4;
            if data.len() < base + 4 {
                return None;
            }
            p = u32::from_le_bytes([data[base], data[base + 1], data[base + 2], data[base + 3]]);
            bitmask_count += 1;
        }
    }

    let mut offset = 4 + bitmask_count * 4;
    let mut signal_dbm = None;
    let mut channel_freq = None;

    for &(bit, size, align) in RADIOTAP_FIELDS {
        if present & (1 << bit) == 0 {
            continue;
        }
        offset = align_up(offset, align);
        if offset + size > header_len {
            break;
        }
        match bit {
            3 => channel_freq = Some(u16::from_le_bytes([data[offset], data[offset + 1]])),
            5 => signal_dbm = Some(data[offset] as i8),
            _ => {}
        }
        offset += size;
    }

    Some(RadiotapInfo {
        header_len,
        signal_dbm,
        channel_freq,
    })
}

// ---------------------------------------------------------------------------
// 802.11 Management frame parsing
// ---------------------------------------------------------------------------

const IEEE80211_FC_TYPE_MGMT: u8 = 0;
const IEEE80211_FC_SUBTYPE_BEACON: u8 = 8;
const IEEE80211_FC_SUBTYPE_DEAUTH: u8 = 12;

/// FC + Dur + Addr1 + Addr2 + Addr3 + SeqCtl.
const MGMT_HEADER_LEN: usize = 24;

/// Timestamp + beacon interval + capability info.
const BEACON_FIXED_LEN: usize = 12;

/// Try to parse a raw pcap packet as a deauth or beacon frame.
///
/// `dlt` is the pcap datalink type:
/// - 127 = DLT_IEEE802_11_RADIO (Radiotap + 802.11)
/// - 105 = DLT_IEEE802_11       (raw 802.11)
pub fn parse_mgmt_frame(data: &[u8], dlt: i32) -> Option<MgmtFrame> {
    let (dot11, signal_dbm, channel_freq) = match dlt {
        127 => {
            let rt = parse_radiotap(data)?;
            (&data[rt.header_len..], rt.signal_dbm, rt.channel_freq)
        }
        105 => (data, None, None),
        _ => {
            log::debug!("Unsupported datalink type {dlt}");
            return None;
        }
    };

    if dot11.len() < MGMT_HEADER_LEN {
        return None;
    }

    let fc0 = dot11[0];
    let frame_type = (fc0 >> 2) & 0x03;
    let frame_subtype = (fc0 >> 4) & 0x0F;
    if frame_type != IEEE80211_FC_TYPE_MGMT {
        return None;
    }

    let header = MgmtHeader {
        destination: mac_at(dot11, 4),
        source: mac_at(dot11, 10),
        bssid: mac_at(dot11, 16),
        signal_dbm,
        channel_freq,
    };
    let body = &dot11[MGMT_HEADER_LEN..];

    match frame_subtype {
        IEEE80211_FC_SUBTYPE_DEAUTH => {
            let reason_code = match body {
                [lo, hi, ..] => u16::from_le_bytes([*lo, *hi]),
                _ => 0,
            };
            Some(MgmtFrame::Deauth {
                header,
                reason_code,
            })
        }
        IEEE80211_FC_SUBTYPE_BEACON => {
            let tags = body.get(BEACON_FIXED_LEN..)?;
            let ssid = parse_ssid_tag(tags).unwrap_or_default();
            Some(MgmtFrame::Beacon { header, ssid })
        }
        _ => None,
    }
}

fn mac_at(data: &[u8], offset: usize) -> [u8; 6] {
    let mut mac = [0u8; 6];
    mac.copy_from_slice(&data[offset..offset + 6]);
    mac
}

/// Walk the tagged parameters and extract the SSID (tag 0).
fn parse_ssid_tag(body: &[u8]) -> Option<String> {
    let mut offset = 0;
    while offset + 2 <= body.len() {
        let tag = body[offset];
        let len = body[offset + 1] as usize;
        offset += 2;
        if offset + len > body.len() {
            break;
        }
        if tag == 0 {
            return Some(String::from_utf8_lossy(&body[offset..offset + len]).into_owned());
        }
        offset += len;
    }
    None
}

/// Map a channel centre frequency (MHz) to its 802.11 channel number.
pub fn freq_to_channel(freq: u16) -> Option<u8> {
    match freq {
        2484 => Some(14),
        2412..=2472 => Some(((freq - 2407) / 5) as u8),
        5000..=5895 => Some(((freq - 5000) / 5) as u8),
        _ => None,
    }
}

/// Format a MAC address as a colon-separated hex string.
pub fn format_mac(mac: &[u8; 6]) -> String {
    format!(
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}

/// Parse `aa:bb:cc:dd:ee:ff` (or `-` separated) into bytes.
pub fn parse_mac(s: &str) -> Option<[u8; 6]> {
    let mut mac = [0u8; 6];
    let mut parts = s.trim().split(|c: char| c == ':' || c == '-');
    for byte in mac.iter_mut() {
        let part = parts.next()?;
        if part.len() != 2 {
            return None;
        }
        *byte = u8::from_str_radix(part, 16).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(mac)
}
