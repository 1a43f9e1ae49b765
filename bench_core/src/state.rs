//! Shared control state.
//!
//! Everything the loop arbitrates over lives in one struct behind one lock;
//! operations mutate it, the loop reads and advances it. No field is touched
//! outside that lock.

use crate::cycle::{CycleState, Cyclogram};
use std::time::Instant;

/// Which cyclogram track playback follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Duty,
    Rpm,
}

#[derive(Debug)]
pub struct ControlState {
    /// Manual duty hold, `[0, 1]`. Outranks playback.
    pub manual_duty: Option<f64>,
    /// Manual RPM hold (mechanical). Outranks everything.
    pub manual_rpm: Option<f64>,
    pub cyclogram: Cyclogram,
    pub cycle: CycleState,
    /// Motor pole pairs for ERPM conversion. Zero means "pass ERPM through
    /// unscaled"; commands then also scale to zero.
    pub pole_pairs: u32,
    /// Loop is allowed to drive the link.
    pub running: bool,
    /// Start of the current logging session; sample timestamps and the
    /// cyclogram step timer are both relative to it.
    pub session_epoch: Instant,
}

impl ControlState {
    #[must_use]
    pub fn new(pole_pairs: u32, now: Instant) -> Self {
        Self {
            manual_duty: None,
            manual_rpm: None,
            cyclogram: Cyclogram::default(),
            cycle: CycleState::idle(now),
            pole_pairs,
            running: false,
            session_epoch: now,
        }
    }

    /// Drop every override and stop playback. Used by disconnect and reset.
    pub fn clear_overrides(&mut self) {
        self.manual_duty = None;
        self.manual_rpm = None;
        self.cycle.active = false;
    }
}
