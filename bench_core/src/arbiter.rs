//! Per-iteration setpoint arbitration.
//!
//! Priority order: manual RPM, then manual duty, then cyclogram playback,
//! then idle. Resolution happens under the state lock so a cycle-step
//! advance and the decision derived from it are atomic.

use crate::cycle::{self, StepOutcome};
use crate::events::{ControlMode, Lamp};
use crate::state::{ControlState, TrackKind};
use std::time::Instant;

/// What the loop should command this iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    ManualRpm(f64),
    ManualDuty(f64),
    CycleRpm(f64),
    CycleDuty(f64),
    /// Playback just ran off the end of its track.
    CycleFinished,
    Idle,
}

impl Decision {
    #[must_use]
    pub const fn mode(self) -> ControlMode {
        match self {
            Self::ManualRpm(_) | Self::ManualDuty(_) => ControlMode::Manual,
            Self::CycleRpm(_) | Self::CycleDuty(_) => ControlMode::Cycle,
            Self::CycleFinished | Self::Idle => ControlMode::Idle,
        }
    }

    #[must_use]
    pub const fn lamp(self) -> Lamp {
        match self {
            Self::ManualRpm(_) => Lamp::Purple,
            Self::ManualDuty(_) => Lamp::Blue,
            Self::CycleRpm(_) | Self::CycleDuty(_) => Lamp::Green,
            Self::CycleFinished | Self::Idle => Lamp::Red,
        }
    }
}

/// Resolve the active setpoint source, advancing playback as a side effect.
///
/// On `CycleFinished` the cycle flag and any manual duty hold are cleared
/// here, so the caller only has to act on the decision.
pub fn resolve(st: &mut ControlState, now: Instant) -> Decision {
    if let Some(rpm) = st.manual_rpm {
        return Decision::ManualRpm(rpm);
    }
    if let Some(duty) = st.manual_duty {
        return Decision::ManualDuty(duty);
    }
    if st.cycle.active {
        let kind = st.cycle.kind;
        let track = st.cyclogram.select(kind);
        match cycle::advance(&mut st.cycle, track, now) {
            StepOutcome::Hold(value) => {
                return match kind {
                    TrackKind::Duty => Decision::CycleDuty(value),
                    TrackKind::Rpm => Decision::CycleRpm(value),
                };
            }
            StepOutcome::Finished => {
                st.cycle.active = false;
                st.manual_duty = None;
                return Decision::CycleFinished;
            }
        }
    }
    Decision::Idle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::Cyclogram;
    use bench_config::CyclogramRows;
    use std::time::{Duration, Instant};

    fn state_with_tracks(duty: &[(f64, f64)], rpm: &[(f64, f64)]) -> ControlState {
        let mut st = ControlState::new(7, Instant::now());
        st.cyclogram = Cyclogram::from_rows(&CyclogramRows {
            duty: duty.to_vec(),
            rpm: rpm.to_vec(),
        });
        st
    }

    #[test]
    fn manual_rpm_outranks_everything() {
        let mut st = state_with_tracks(&[(1.0, 0.5)], &[]);
        st.cycle.active = true;
        st.manual_duty = Some(0.3);
        st.manual_rpm = Some(1200.0);
        assert_eq!(
            resolve(&mut st, Instant::now()),
            Decision::ManualRpm(1200.0)
        );
    }

    #[test]
    fn manual_duty_outranks_cycle() {
        let mut st = state_with_tracks(&[(1.0, 0.5)], &[]);
        st.cycle.active = true;
        st.manual_duty = Some(0.3);
        assert_eq!(resolve(&mut st, Instant::now()), Decision::ManualDuty(0.3));
        // Playback cursor must not have advanced underneath the hold.
        assert_eq!(st.cycle.index, 0);
    }

    #[test]
    fn cycle_plays_selected_track() {
        let now = Instant::now();
        let mut st = state_with_tracks(&[(1.0, 0.5)], &[(1.0, 900.0)]);
        st.cycle.active = true;
        st.cycle.kind = TrackKind::Rpm;
        st.cycle.step_started = now;
        assert_eq!(resolve(&mut st, now), Decision::CycleRpm(900.0));
    }

    #[test]
    fn finish_clears_cycle_and_manual_duty() {
        let now = Instant::now();
        let mut st = state_with_tracks(&[(1.0, 0.5)], &[]);
        st.cycle.active = true;
        st.cycle.step_started = now;
        let later = now + Duration::from_secs(2);
        assert_eq!(resolve(&mut st, later), Decision::CycleFinished);
        assert!(!st.cycle.active);
        assert_eq!(st.manual_duty, None);
        // Next resolution falls through to idle.
        assert_eq!(resolve(&mut st, later), Decision::Idle);
    }

    #[test]
    fn idle_when_nothing_requested() {
        let mut st = state_with_tracks(&[], &[]);
        assert_eq!(resolve(&mut st, Instant::now()), Decision::Idle);
    }

    #[rstest::rstest]
    #[case(Decision::ManualRpm(1.0), ControlMode::Manual, Lamp::Purple)]
    #[case(Decision::ManualDuty(0.1), ControlMode::Manual, Lamp::Blue)]
    #[case(Decision::CycleRpm(900.0), ControlMode::Cycle, Lamp::Green)]
    #[case(Decision::CycleDuty(0.1), ControlMode::Cycle, Lamp::Green)]
    #[case(Decision::CycleFinished, ControlMode::Idle, Lamp::Red)]
    #[case(Decision::Idle, ControlMode::Idle, Lamp::Red)]
    fn mode_and_lamp_mapping(
        #[case] decision: Decision,
        #[case] mode: ControlMode,
        #[case] lamp: Lamp,
    ) {
        assert_eq!(decision.mode(), mode);
        assert_eq!(decision.lamp(), lamp);
    }
}
