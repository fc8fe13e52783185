//! In-memory radio used by unit tests.

use std::sync::{Arc, Mutex, MutexGuard};

use super::{Radio, SecondaryChannel, StationInfo};
use crate::error::RadioError;

#[derive(Debug, Default)]
pub struct FakeRadioState {
    /// Every channel committed through `set_channel`, in order.
    pub channels: Vec<u8>,
    pub stations: Vec<StationInfo>,
    pub tx_power: f64,
    pub tx_power_sets: Vec<f64>,
    pub link_rssi: Option<i8>,
    pub fail_set_channel: bool,
    pub fail_station_list: bool,
    /// Reported interface type; `None` reads as `AP`.
    pub mode: Option<&'static str>,
    /// Interleaved log of calls the engine's ordering depends on.
    pub calls: Vec<&'static str>,
}

/// Cloneable handle; clones share state so a test can keep one while the
/// engine owns another.
#[derive(Debug, Clone, Default)]
pub struct FakeRadio {
    state: Arc<Mutex<FakeRadioState>>,
}

impl FakeRadio {
    pub fn with_stations(stations: Vec<StationInfo>) -> Self {
        let radio = Self::default();
        radio.state().stations = stations;
        radio
    }

    pub fn state(&self) -> MutexGuard<'_, FakeRadioState> {
        self.state.lock().unwrap()
    }
}

pub const FAKE_AP_MAC: [u8; 6] = [0x02, 0xAA, 0xAA, 0xAA, 0xAA, 0x01];

impl Radio for FakeRadio {
    fn interface(&self) -> &str {
        "fake0"
    }

    fn enable_monitor_mode(&mut self, channel: u8) -> Result<(), RadioError> {
        self.set_channel(channel, SecondaryChannel::None)
    }

    fn disable_monitor_mode(&mut self) -> Result<(), RadioError> {
        Ok(())
    }

    fn set_channel(&mut self, channel: u8, _secondary: SecondaryChannel) -> Result<(), RadioError> {
        let mut s = self.state();
        if s.fail_set_channel {
            return Err(RadioError::ChannelRejected(channel));
        }
        s.channels.push(channel);
        Ok(())
    }

    fn interface_mode(&mut self) -> Result<String, RadioError> {
        Ok(self.state().mode.unwrap_or("AP").to_string())
    }

    fn station_list(&mut self) -> Result<Vec<StationInfo>, RadioError> {
        let mut s = self.state();
        s.calls.push("station_list");
        if s.fail_station_list {
            return Err(RadioError::Parse("station dump unavailable".into()));
        }
        Ok(s.stations.clone())
    }

    fn mac_address(&mut self) -> Result<[u8; 6], RadioError> {
        Ok(FAKE_AP_MAC)
    }

    fn tx_power(&mut self) -> Result<f64, RadioError> {
        let mut s = self.state();
        s.calls.push("tx_power");
        Ok(s.tx_power)
    }

    fn set_tx_power(&mut self, dbm: f64) -> Result<(), RadioError> {
        let mut s = self.state();
        s.tx_power = dbm;
        s.tx_power_sets.push(dbm);
        Ok(())
    }

    fn link_rssi(&mut self) -> Result<Option<i8>, RadioError> {
        Ok(self.state().link_rssi)
    }
}
