//! Radio hardware abstraction.
//!
//! The engine only talks to the adapter through [`Radio`]; the Linux backend
//! drives `iw`/`ip`, tests use [`fake::FakeRadio`].

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(test)]
pub mod fake;

use crate::error::RadioError;

/// Secondary channel placement passed along with a channel change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondaryChannel {
    /// 20 MHz, no secondary channel.
    None,
}

/// A station associated to this sensor's access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationInfo {
    pub mac: [u8; 6],
    /// Last observed signal in dBm, if the driver reports it.
    pub signal_dbm: Option<i8>,
}

/// Trait that each platform backend implements.
pub trait Radio: Send {
    /// Name of the interface this radio drives.
    fn interface(&self) -> &str;

    /// Put the interface into monitor mode on the given channel.
    fn enable_monitor_mode(&mut self, channel: u8) -> Result<(), RadioError>;

    /// Restore the interface to managed (normal) mode.
    fn disable_monitor_mode(&mut self) -> Result<(), RadioError>;

    /// Tune the radio to `channel`.
    fn set_channel(&mut self, channel: u8, secondary: SecondaryChannel) -> Result<(), RadioError>;

    /// Interface type as reported by the driver (`AP`, `managed`, `monitor`).
    fn interface_mode(&mut self) -> Result<String, RadioError>;

    /// Stations currently associated to the AP role, in driver order.
    fn station_list(&mut self) -> Result<Vec<StationInfo>, RadioError>;

    /// Hardware address of the interface.
    fn mac_address(&mut self) -> Result<[u8; 6], RadioError>;

    /// Current transmit power in dBm.
    fn tx_power(&mut self) -> Result<f64, RadioError>;

    /// Fix the transmit power to `dbm`.
    fn set_tx_power(&mut self, dbm: f64) -> Result<(), RadioError>;

    /// Signal of the current link, `None` when not associated.
    fn link_rssi(&mut self) -> Result<Option<i8>, RadioError>;
}

/// Fail unless `radio` currently runs in the AP role. Station enumeration
/// on a managed interface would list the upstream AP as a station.
pub fn require_ap_role(radio: &mut dyn Radio) -> Result<(), RadioError> {
    let mode = radio.interface_mode()?;
    if mode != "AP" {
        return Err(RadioError::NotAccessPoint {
            iface: radio.interface().to_string(),
            mode,
        });
    }
    Ok(())
}

/// Detect the first wireless interface on this host.
pub fn detect_interface() -> Result<String, RadioError> {
    #[cfg(target_os = "linux")]
    {
        linux::detect_interface()
    }
    #[cfg(not(target_os = "linux"))]
    {
        compile_error!("Unsupported platform — only Linux (iw/nl80211) is supported");
    }
}

/// Return the platform-appropriate [`Radio`] for `iface`.
pub fn create_radio(iface: &str) -> Box<dyn Radio> {
    #[cfg(target_os = "linux")]
    {
        Box::new(linux::LinuxRadio::new(iface))
    }
    #[cfg(not(target_os = "linux"))]
    {
        compile_error!("Unsupported platform — only Linux (iw/nl80211) is supported");
    }
}
