//! Events emitted by the worker on its channel.
//!
//! Consumers (CLI, UI glue) subscribe to one `crossbeam_channel::Receiver`
//! and render the stream however they like; emission never blocks the loop.

/// What the loop is currently doing, as shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    Idle,
    Manual,
    Cycle,
}

impl ControlMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Manual => "manual",
            Self::Cycle => "cycle",
        }
    }
}

/// Front-panel indicator color.
///
/// Purple = manual RPM hold, blue = manual duty hold, green = cyclogram
/// playback (or link up, idle), red = idle / link down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lamp {
    Red,
    Green,
    Blue,
    Purple,
}

impl Lamp {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Purple => "purple",
        }
    }
}

/// One telemetry reading, already converted to mechanical units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySample {
    /// Seconds since the session epoch.
    pub elapsed_s: f64,
    /// Mechanical shaft RPM.
    pub rpm: f64,
    /// Duty cycle last commanded this iteration, `[0, 1]`.
    pub duty: f64,
    /// Average motor current, amps.
    pub current: f64,
}

impl TelemetrySample {
    /// All-zero reading stamped at `elapsed_s`, emitted on stop and reset.
    #[must_use]
    pub const fn zero_at(elapsed_s: f64) -> Self {
        Self {
            elapsed_s,
            rpm: 0.0,
            duty: 0.0,
            current: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Sample(TelemetrySample),
    /// Link came up (`true`) or went down (`false`).
    Connection(bool),
    Mode(ControlMode),
    Lamp(Lamp),
    Error(String),
    Info(String),
}
