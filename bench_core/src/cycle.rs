//! Cyclogram playback: duration-indexed setpoint tracks.
//!
//! A cyclogram carries up to three tracks of `(duration, value)` steps:
//! a duty track, an RPM track, and a legacy track kept as a snapshot of the
//! duty column for files written by older tooling. Playback walks one track
//! front to back, holding each value for its duration.

use crate::state::TrackKind;
use bench_config::CyclogramRows;
use std::time::{Duration, Instant};

/// Hold `value` for `duration_s` seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleStep {
    pub duration_s: f64,
    pub value: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Cyclogram {
    duty: Vec<CycleStep>,
    rpm: Vec<CycleStep>,
    legacy: Vec<CycleStep>,
}

impl Cyclogram {
    #[must_use]
    pub fn from_rows(rows: &CyclogramRows) -> Self {
        let to_steps = |track: &[(f64, f64)]| {
            track
                .iter()
                .map(|&(duration_s, value)| CycleStep { duration_s, value })
                .collect::<Vec<_>>()
        };
        let duty = to_steps(&rows.duty);
        let rpm = to_steps(&rows.rpm);
        // Older files carried only a duty column under a different name;
        // the loader maps it into `duty`, and the snapshot here keeps the
        // duty track selectable even after `duty` itself is cleared.
        let legacy = duty.clone();
        Self { duty, rpm, legacy }
    }

    pub fn clear(&mut self) {
        self.duty.clear();
        self.rpm.clear();
        self.legacy.clear();
    }

    /// Track playback follows for `kind`, falling back to the legacy
    /// snapshot when the duty track is empty.
    #[must_use]
    pub fn select(&self, kind: TrackKind) -> &[CycleStep] {
        match kind {
            TrackKind::Duty if self.duty.is_empty() => &self.legacy,
            TrackKind::Duty => &self.duty,
            TrackKind::Rpm => &self.rpm,
        }
    }
}

/// Playback cursor, advanced once per loop iteration while active.
#[derive(Debug, Clone, Copy)]
pub struct CycleState {
    pub active: bool,
    pub kind: TrackKind,
    pub index: usize,
    /// When the current step began.
    pub step_started: Instant,
}

impl CycleState {
    #[must_use]
    pub fn idle(now: Instant) -> Self {
        Self {
            active: false,
            kind: TrackKind::Duty,
            index: 0,
            step_started: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    /// Keep commanding this value.
    Hold(f64),
    /// The cursor stepped past the last entry.
    Finished,
}

/// Advance the cursor against `track` at time `now`.
///
/// At most one step boundary is crossed per call; a step whose duration has
/// elapsed moves the cursor and restarts the hold timer at `now`.
pub fn advance(cycle: &mut CycleState, track: &[CycleStep], now: Instant) -> StepOutcome {
    if cycle.index >= track.len() {
        return StepOutcome::Finished;
    }
    let held_for = now.saturating_duration_since(cycle.step_started);
    if held_for >= Duration::from_secs_f64(track[cycle.index].duration_s) {
        cycle.index += 1;
        cycle.step_started = now;
        if cycle.index >= track.len() {
            return StepOutcome::Finished;
        }
    }
    StepOutcome::Hold(track[cycle.index].value)
}
