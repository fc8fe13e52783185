//! The capture-result record shared between the capture thread and the
//! control loop.
//!
//! Field ownership:
//!
//! * The capture thread is the only writer of the pending-deauth counter
//!   (`note_deauth`); the control loop drains it with `take_deauths`.
//! * Evidence is published under a mutex *before* the attack kind is stored,
//!   so a reader that sees a kind always sees complete evidence for it.
//! * A new kind is only accepted while the kind reads [`AttackKind::None`].
//!   Once a verdict is active the control loop owns it until `clear`.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Mutex;

use serde::Serialize;

use crate::parser::format_mac;

/// Classified attack kind. `None` is the rest state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum AttackKind {
    None = 0,
    DeauthFlood = 1,
    EvilTwin = 2,
    GeofenceViolation = 3,
}

impl AttackKind {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => AttackKind::DeauthFlood,
            2 => AttackKind::EvilTwin,
            3 => AttackKind::GeofenceViolation,
            _ => AttackKind::None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AttackKind::None => "none",
            AttackKind::DeauthFlood => "DEAUTH FLOOD",
            AttackKind::EvilTwin => "EVIL TWIN",
            AttackKind::GeofenceViolation => "GEOFENCE",
        }
    }
}

/// Addressing and signal fields that accompany a verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Evidence {
    pub source: [u8; 6],
    pub destination: [u8; 6],
    pub bssid: [u8; 6],
    /// Signal strength in dBm, 0 when unknown.
    pub rssi: i8,
    pub channel: u8,
    /// Deauthentication reason code, 0 for other frames.
    pub reason_code: u16,
}

/// A classified attack plus its evidence: the unit handed to a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub kind: AttackKind,
    pub evidence: Evidence,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} src={} dst={} bssid={} rssi={} dBm ch={}",
            self.kind.label(),
            format_mac(&self.evidence.source),
            format_mac(&self.evidence.destination),
            format_mac(&self.evidence.bssid),
            self.evidence.rssi,
            self.evidence.channel,
        )
    }
}

#[derive(Debug, Default)]
pub struct CaptureResult {
    deauth_pending: AtomicU32,
    attack: AtomicU8,
    evidence: Mutex<Evidence>,
    last_deauth: Mutex<Evidence>,
}

impl CaptureResult {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Capture side ───────────────────────────────────────────────────

    /// Signal one observed deauthentication frame.
    pub fn note_deauth(&self, evidence: Evidence) {
        *lock(&self.last_deauth) = evidence;
        self.deauth_pending.fetch_add(1, Ordering::Release);
    }

    /// Raise `kind` if no verdict is currently active. Returns whether the
    /// verdict was accepted.
    pub fn raise(&self, kind: AttackKind, evidence: Evidence) -> bool {
        if kind == AttackKind::None {
            return false;
        }
        let mut slot = lock(&self.evidence);
        if self.kind() != AttackKind::None {
            return false;
        }
        *slot = evidence;
        self.attack.store(kind as u8, Ordering::Release);
        true
    }

    // ── Control-loop side ──────────────────────────────────────────────

    /// Drain the deauth frames signalled since the last call.
    pub fn take_deauths(&self) -> u32 {
        self.deauth_pending.swap(0, Ordering::AcqRel)
    }

    /// Evidence of the most recent deauthentication frame.
    pub fn last_deauth(&self) -> Evidence {
        *lock(&self.last_deauth)
    }

    pub fn kind(&self) -> AttackKind {
        AttackKind::from_u8(self.attack.load(Ordering::Acquire))
    }

    /// Snapshot of the active verdict, if any.
    pub fn verdict(&self) -> Option<Verdict> {
        let evidence = lock(&self.evidence);
        match self.kind() {
            AttackKind::None => None,
            kind => Some(Verdict {
                kind,
                evidence: *evidence,
            }),
        }
    }

    /// Return the record to its rest state after a dispatch.
    pub fn clear(&self) {
        let _slot = lock(&self.evidence);
        self.attack.store(AttackKind::None as u8, Ordering::Release);
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    // Evidence is plain data; a panic mid-write cannot leave it unusable.
    m.lock().unwrap_or_else(|e| e.into_inner())
}
