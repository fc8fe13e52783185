//! The detection and response engine.
//!
//! [`Sensor`] is the single context object of the control loop: it owns the
//! hop scheduler, the scan-window state, the geofence baseline and the
//! collaborators (radio, alert transport, clock). Each call to
//! [`Sensor::iterate`] runs one step of the Detection or Protection cycle.
//!
//! Detection, per scan window:
//!
//! 1. window opens: start timestamp recorded, deauth counter reset;
//! 2. every iteration drains the deauth signals published by the capture
//!    thread into the counter;
//! 3. once the window has elapsed the counter is compared to the threshold
//!    (never earlier), the channel hops and a new window opens;
//! 4. independently, any active DeauthFlood/EvilTwin verdict is dispatched
//!    once and cleared.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use colored::Colorize;

use crate::alert::AlertTransport;
use crate::clock::Clock;
use crate::config::{OperationMode, SensorConfig};
use crate::error::RadioError;
use crate::geofence::{GeofenceBaseline, GeofenceModel, StationRecord};
use crate::hop::ChannelHopper;
use crate::parser::format_mac;
use crate::record::{AttackKind, CaptureResult, Evidence, Verdict};

pub struct Sensor {
    mode: OperationMode,
    scan_window: Duration,
    deauth_threshold: u32,
    poll_interval: Duration,
    protection_interval: Duration,
    ap_channel: u8,
    geofence: GeofenceModel,
    heartbeat_interval: Option<Duration>,

    record: Arc<CaptureResult>,
    hopper: ChannelHopper,
    window_start: Instant,
    deauth_count: u32,
    baseline: Option<GeofenceBaseline>,
    /// Flood confirmed while a capture verdict held the record.
    pending_flood: Option<Evidence>,
    last_heartbeat: Option<Instant>,

    radio: Box<dyn crate::platform::Radio>,
    transport: Box<dyn AlertTransport>,
    clock: Arc<dyn Clock>,
}

impl Sensor {
    pub fn new(
        cfg: &SensorConfig,
        record: Arc<CaptureResult>,
        radio: Box<dyn crate::platform::Radio>,
        transport: Box<dyn AlertTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let window_start = clock.now();
        Self {
            mode: cfg.operation_mode,
            scan_window: cfg.scan_window(),
            deauth_threshold: cfg.detection.deauth_threshold,
            poll_interval: cfg.poll_interval(),
            protection_interval: cfg.protection_interval(),
            ap_channel: cfg.protection.ap_channel,
            geofence: cfg.geofence_model(),
            heartbeat_interval: cfg.heartbeat_interval(),
            record,
            hopper: ChannelHopper::new(cfg.hop_config()),
            window_start,
            deauth_count: 0,
            baseline: None,
            pending_flood: None,
            last_heartbeat: None,
            radio,
            transport,
            clock,
        }
    }

    /// Run iterations until `running` is cleared.
    pub fn run(&mut self, running: &AtomicBool) {
        while running.load(Ordering::Relaxed) {
            self.iterate();
        }
    }

    /// One pass of the control loop.
    pub fn iterate(&mut self) {
        self.heartbeat();
        match self.mode {
            OperationMode::Detection => {
                if let Err(e) = self.detection_step() {
                    log::warn!("Detection step aborted: {e}");
                }
                self.clock.sleep(self.poll_interval);
            }
            OperationMode::Protection => {
                self.clock.sleep(self.protection_interval);
                if let Err(e) = self.protection_cycle() {
                    log::warn!("Protection cycle skipped: {e}");
                }
            }
        }
    }

    // ── Detection ──────────────────────────────────────────────────────

    /// Accumulate evidence, close the window when due, then dispatch any
    /// active verdict. A radio fault at the window boundary aborts the rest
    /// of the step; the pending verdict goes out on the next iteration.
    pub fn detection_step(&mut self) -> Result<(), RadioError> {
        let now = self.clock.now();

        let seen = self.record.take_deauths();
        if seen > 0 {
            self.deauth_count = self.deauth_count.saturating_add(seen);
            log::debug!("Deauth frames this window: {}", self.deauth_count);
        }

        // Flush a pending capture verdict first so it cannot shadow a flood
        // confirmed at this boundary.
        self.dispatch_detected();

        if now.duration_since(self.window_start) >= self.scan_window {
            self.close_window(now)?;
            self.dispatch_detected();
        }
        Ok(())
    }

    fn close_window(&mut self, now: Instant) -> Result<(), RadioError> {
        if self.deauth_count >= self.deauth_threshold {
            log::info!(
                "{} deauth frames in {:?} on channel {} (threshold {})",
                self.deauth_count,
                self.scan_window,
                self.hopper.current(),
                self.deauth_threshold
            );
            let evidence = self.record.last_deauth();
            if !self.record.raise(AttackKind::DeauthFlood, evidence) {
                log::debug!("Deauth flood queued behind the active verdict");
                self.pending_flood = Some(evidence);
            }
        }
        self.window_start = now;
        self.deauth_count = 0;
        self.hopper.advance(self.radio.as_mut())?;
        Ok(())
    }

    fn dispatch_detected(&mut self) {
        if let Some(verdict) = self.record.verdict() {
            if matches!(verdict.kind, AttackKind::DeauthFlood | AttackKind::EvilTwin) {
                self.dispatch(&verdict);
                self.record.clear();
            }
        }
        if let Some(evidence) = self.pending_flood.take() {
            self.dispatch(&Verdict {
                kind: AttackKind::DeauthFlood,
                evidence,
            });
        }
    }

    // ── Protection ─────────────────────────────────────────────────────

    /// Recalibrate the fence, then raise one GeofenceViolation per
    /// associated station. Stations are re-alerted on every cycle.
    pub fn protection_cycle(&mut self) -> Result<usize, RadioError> {
        let now = self.clock.now();
        let baseline = GeofenceBaseline::recalibrate(self.radio.as_mut(), &self.geofence, now)?;
        if let Some(prev) = self.baseline.replace(baseline) {
            if (prev.tx_power_dbm - baseline.tx_power_dbm).abs() >= 1.0 {
                log::warn!(
                    "Transmit power drifted from {:.1} to {:.1} dBm",
                    prev.tx_power_dbm,
                    baseline.tx_power_dbm
                );
            }
        }

        let stations = self.radio.station_list()?;
        log::info!("Connected stations: {}", stations.len());
        if stations.is_empty() {
            return Ok(0);
        }
        let ap = self.radio.mac_address()?;

        self.record.clear();
        for info in &stations {
            let station = StationRecord::new(*info, ap);
            if let Some(d) = station.estimated_distance_m(&self.geofence) {
                log::debug!("{} at ~{d:.1} m", format_mac(&station.mac));
            }
            let evidence = Evidence {
                source: station.mac,
                destination: station.ap,
                bssid: station.ap,
                rssi: station.signal_dbm.unwrap_or(0),
                channel: self.ap_channel,
                reason_code: 0,
            };
            self.record.raise(AttackKind::GeofenceViolation, evidence);
            if let Some(verdict) = self.record.verdict() {
                self.dispatch(&verdict);
            }
            self.record.clear();
        }
        Ok(stations.len())
    }

    // ── Dispatch ───────────────────────────────────────────────────────

    /// Synchronous, single attempt. Failures are logged and dropped.
    fn dispatch(&mut self, verdict: &Verdict) {
        println!(
            "  {} {}",
            format!("[{}]", verdict.kind.label()).red().bold(),
            verdict
        );
        match self.transport.dispatch(verdict) {
            Ok(()) => log::info!("Alert sent via {}", self.transport.name()),
            Err(e) => log::warn!("Alert via {} failed, dropped: {e}", self.transport.name()),
        }
    }

    fn heartbeat(&mut self) {
        let Some(interval) = self.heartbeat_interval else {
            return;
        };
        let now = self.clock.now();
        if self
            .last_heartbeat
            .is_some_and(|last| now.duration_since(last) < interval)
        {
            return;
        }
        self.last_heartbeat = Some(now);
        if let Err(e) = self.transport.heartbeat() {
            log::warn!("Heartbeat via {} failed: {e}", self.transport.name());
        }
    }
}
