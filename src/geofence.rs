//! Geofence baseline and per-cycle station records.
//!
//! In Protection mode the sensor runs its own access point with a
//! deliberately limited transmit power: anything that manages to associate
//! is, by definition, physically close to the protected area. The baseline
//! captures the radio conditions the fence was last calibrated against.

use std::time::Instant;

use crate::error::RadioError;
use crate::platform::{Radio, StationInfo};

/// Path-loss parameters used to turn a station's RSSI into a distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeofenceModel {
    /// Fixed transmit power applied on every recalibration, if any.
    pub tx_power_dbm: Option<f64>,
    /// Expected RSSI at the 1 m reference distance (dBm).
    pub reference_rssi_1m: f64,
    /// Path-loss exponent. ~2.0 for free-space, 2.7–4.0 indoors.
    pub path_loss_exp: f64,
}

impl Default for GeofenceModel {
    fn default() -> Self {
        Self {
            tx_power_dbm: None,
            reference_rssi_1m: -40.0,
            path_loss_exp: 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeofenceBaseline {
    /// Transmit power read back from the radio after calibration.
    pub tx_power_dbm: f64,
    /// Signal of the sensor's own link at calibration time, if any.
    pub reference_rssi: Option<i8>,
    pub calibrated_at: Instant,
}

impl GeofenceBaseline {
    /// Re-apply the configured transmit power and read back the radio's
    /// current conditions.
    pub fn recalibrate(
        radio: &mut dyn Radio,
        model: &GeofenceModel,
        now: Instant,
    ) -> Result<Self, RadioError> {
        if let Some(dbm) = model.tx_power_dbm {
            radio.set_tx_power(dbm)?;
        }
        let tx_power_dbm = radio.tx_power()?;
        let reference_rssi = radio.link_rssi()?;
        log::debug!(
            "Geofence recalibrated: txpower {tx_power_dbm:.1} dBm, reference rssi {reference_rssi:?}"
        );
        Ok(Self {
            tx_power_dbm,
            reference_rssi,
            calibrated_at: now,
        })
    }
}

/// One associated station, built fresh for each protection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationRecord {
    pub mac: [u8; 6],
    /// Address of the AP it is associated to (this sensor).
    pub ap: [u8; 6],
    pub signal_dbm: Option<i8>,
}

impl StationRecord {
    pub fn new(info: StationInfo, ap: [u8; 6]) -> Self {
        Self {
            mac: info.mac,
            ap,
            signal_dbm: info.signal_dbm,
        }
    }

    /// Estimated distance from the sensor, when the driver reported a signal.
    pub fn estimated_distance_m(&self, model: &GeofenceModel) -> Option<f64> {
        self.signal_dbm
            .map(|rssi| estimate_distance(rssi as f64, model.reference_rssi_1m, model.path_loss_exp))
    }
}

// ---------------------------------------------------------------------------
// Distance estimation (log-distance path-loss model)
// ---------------------------------------------------------------------------

/// Estimate distance in metres from RSSI using the log-distance path-loss
/// model:
///
///   RSSI = ref_1m − 10 · n · log₁₀(d)
///   ⟹  d = 10^((ref_1m − RSSI) / (10 · n))
pub fn estimate_distance(rssi: f64, reference_rssi_1m: f64, path_loss_exp: f64) -> f64 {
    let exponent = (reference_rssi_1m - rssi) / (10.0 * path_loss_exp);
    10.0_f64.powf(exponent).max(0.1) // clamp to at least 10 cm
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fake::FakeRadio;

    #[test]
    fn test_distance_at_reference() {
        let d = estimate_distance(-40.0, -40.0, 3.0);
        assert!((d - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_distance_grows_with_weaker_signal() {
        let near = estimate_distance(-50.0, -40.0, 3.0);
        let far = estimate_distance(-70.0, -40.0, 3.0);
        assert!(far > near);
        assert!((far - 10.0).abs() < 0.01);
    }

    #[test]
    fn test_recalibrate_applies_fixed_power() {
        let mut radio = FakeRadio::default();
        radio.state().tx_power = 20.0;
        radio.state().link_rssi = Some(-61);
        let model = GeofenceModel {
            tx_power_dbm: Some(5.0),
            ..Default::default()
        };
        let now = Instant::now();
        let baseline = GeofenceBaseline::recalibrate(&mut radio, &model, now).unwrap();
        assert_eq!(baseline.tx_power_dbm, 5.0);
        assert_eq!(baseline.reference_rssi, Some(-61));
        assert_eq!(baseline.calibrated_at, now);
        assert_eq!(radio.state().tx_power_sets, vec![5.0]);
    }

    #[test]
    fn test_recalibrate_without_fixed_power_only_reads() {
        let mut radio = FakeRadio::default();
        radio.state().tx_power = 12.0;
        let baseline =
            GeofenceBaseline::recalibrate(&mut radio, &GeofenceModel::default(), Instant::now())
                .unwrap();
        assert_eq!(baseline.tx_power_dbm, 12.0);
        assert!(radio.state().tx_power_sets.is_empty());
    }

    #[test]
    fn test_station_record_distance() {
        let rec = StationRecord::new(
            StationInfo {
                mac: [1; 6],
                signal_dbm: Some(-40),
            },
            [2; 6],
        );
        let d = rec.estimated_distance_m(&GeofenceModel::default()).unwrap();
        assert!((d - 1.0).abs() < 0.01);

        let silent = StationRecord::new(
            StationInfo {
                mac: [1; 6],
                signal_dbm: None,
            },
            [2; 6],
        );
        assert!(silent.estimated_distance_m(&GeofenceModel::default()).is_none());
    }
}
