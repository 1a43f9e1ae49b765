#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Motor-bench control worker (hardware-agnostic).
//!
//! The worker drives a VESC-style controller over a byte transport
//! (`bench_traits::Transport`): each loop iteration it arbitrates between
//! manual duty, manual RPM and cyclogram playback, issues exactly one
//! setpoint command, performs one telemetry round trip and feeds the
//! throttled CSV logger.
//!
//! ## Architecture
//!
//! - **State**: shared control state behind one lock (`state` module)
//! - **Arbitration**: per-iteration mode resolution (`arbiter` module)
//! - **Playback**: duration-indexed cyclogram stepping (`cycle` module)
//! - **Persistence**: throttled append + verbatim export (`logger` module)
//! - **Loop**: the long-running worker task and its operations (`worker`)
//!
//! The loop never terminates on a single bad iteration: transport faults
//! run the disconnect path, everything else is reported on the event
//! channel and the next iteration proceeds.

pub mod arbiter;
pub mod cycle;
pub mod error;
pub mod events;
pub mod logger;
pub mod mocks;
pub mod state;
pub mod worker;

pub use error::{BuildError, Result, WorkerError};
pub use events::{ControlMode, Event, Lamp, TelemetrySample};
pub use logger::TelemetryLogger;
pub use state::{ControlState, TrackKind};
pub use worker::{Worker, WorkerBuilder, WorkerCfg, WorkerThread};
