//! The control worker: operations, the loop, and its background thread.
//!
//! A `Worker` is a cheap clonable handle over shared state. Operations
//! (connect, overrides, playback, reset, export) mutate state and emit
//! events; `step` runs one loop iteration. `WorkerThread` owns a thread
//! that calls `step` until dropped.

use crate::arbiter::{self, Decision};
use crate::cycle::{CycleState, Cyclogram};
use crate::error::{BuildError, Result, WorkerError};
use crate::events::{Event, TelemetrySample};
use crate::logger::TelemetryLogger;
use crate::state::{ControlState, TrackKind};
use bench_proto::{Command, Message, Request};
use bench_traits::{Clock, MonotonicClock, Transport};
use crossbeam_channel::{Receiver, Sender, unbounded};
use eyre::Report;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Opens a named port and hands back the transport to drive it.
pub type PortOpener =
    dyn Fn(&str) -> std::result::Result<Box<dyn Transport>, BoxError> + Send + Sync;

/// Loop tuning. Defaults mirror the bench's stock configuration.
#[derive(Debug, Clone)]
pub struct WorkerCfg {
    pub pole_pairs: u32,
    /// Sleep at the end of every loop iteration.
    pub poll_interval: Duration,
    /// Pause between sending a telemetry request and reading the reply.
    pub settle: Duration,
    /// Minimum spacing between CSV rows.
    pub save_interval: Duration,
    pub log_path: PathBuf,
}

impl Default for WorkerCfg {
    fn default() -> Self {
        Self {
            pole_pairs: 1,
            poll_interval: Duration::from_millis(5),
            settle: Duration::from_micros(1000),
            save_interval: Duration::from_millis(100),
            log_path: PathBuf::from("rpm_log.csv"),
        }
    }
}

impl WorkerCfg {
    #[must_use]
    pub fn from_config(cfg: &bench_config::Config) -> Self {
        Self {
            pole_pairs: cfg.motor.pole_pairs,
            poll_interval: Duration::from_millis(cfg.poll.poll_ms),
            settle: Duration::from_micros(cfg.serial.settle_us),
            save_interval: Duration::from_millis(cfg.telemetry.save_interval_ms),
            log_path: PathBuf::from(&cfg.telemetry.csv_file),
        }
    }
}

struct Inner {
    state: Mutex<ControlState>,
    port: Mutex<Option<Box<dyn Transport>>>,
    logger: TelemetryLogger,
    events: Sender<Event>,
    clock: Arc<dyn Clock + Send + Sync>,
    opener: Box<PortOpener>,
    settle: Duration,
    poll_interval: Duration,
}

#[derive(Clone)]
pub struct Worker {
    inner: Arc<Inner>,
}

pub struct WorkerBuilder {
    opener: Option<Box<PortOpener>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    cfg: WorkerCfg,
}

impl Worker {
    #[must_use]
    pub fn builder() -> WorkerBuilder {
        WorkerBuilder {
            opener: None,
            clock: None,
            cfg: WorkerCfg::default(),
        }
    }
}

impl WorkerBuilder {
    #[must_use]
    pub fn with_opener<F>(mut self, opener: F) -> Self
    where
        F: Fn(&str) -> std::result::Result<Box<dyn Transport>, BoxError> + Send + Sync + 'static,
    {
        self.opener = Some(Box::new(opener));
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    #[must_use]
    pub fn with_cfg(mut self, cfg: WorkerCfg) -> Self {
        self.cfg = cfg;
        self
    }

    /// Build the worker and the receiving end of its event channel.
    pub fn build(self) -> Result<(Worker, Receiver<Event>)> {
        let opener = self.opener.ok_or(BuildError::MissingPortOpener)?;
        if self.cfg.poll_interval.is_zero() {
            return Err(Report::new(BuildError::InvalidConfig(
                "poll_interval must be non-zero",
            )));
        }
        let clock: Arc<dyn Clock + Send + Sync> =
            self.clock.unwrap_or_else(|| Arc::new(MonotonicClock));
        let logger =
            TelemetryLogger::create(&self.cfg.log_path, self.cfg.save_interval, clock.clone())?;
        let (events, rx) = unbounded();
        let now = clock.now();
        let inner = Inner {
            state: Mutex::new(ControlState::new(self.cfg.pole_pairs, now)),
            port: Mutex::new(None),
            logger,
            events,
            clock,
            opener,
            settle: self.cfg.settle,
            poll_interval: self.cfg.poll_interval,
        };
        Ok((
            Worker {
                inner: Arc::new(inner),
            },
            rx,
        ))
    }
}

impl Worker {
    fn lock_state(&self) -> MutexGuard<'_, ControlState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_port(&self) -> MutexGuard<'_, Option<Box<dyn Transport>>> {
        self.inner.port.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: Event) {
        // Receiver gone just means nobody is listening anymore.
        let _ = self.inner.events.send(event);
    }

    fn elapsed(&self) -> f64 {
        let epoch = self.lock_state().session_epoch;
        self.inner.clock.secs_since(epoch)
    }

    /// Send one command if a port is open. No port is not an error: the
    /// operator may stage setpoints before connecting.
    fn send_command(&self, cmd: &Command) -> Result<()> {
        let mut guard = self.lock_port();
        let Some(link) = guard.as_mut() else {
            return Ok(());
        };
        link.write_all(&bench_proto::encode(cmd)).map_err(link_fault)
    }

    fn force_zero_duty(&self) {
        if let Err(e) = self.send_command(&Command::SetDutyCycle(0.0)) {
            tracing::warn!(error = %e, "zero-duty command failed");
        }
    }

    /// Open the named port and mark the loop runnable. Connecting while
    /// already connected re-announces the link instead of reopening it.
    pub fn connect(&self, port_name: &str) -> Result<()> {
        if self.lock_port().is_some() {
            self.emit(Event::Info("already connected".into()));
            self.emit(Event::Connection(true));
            self.emit(Event::Lamp(crate::events::Lamp::Green));
            return Ok(());
        }
        match (self.inner.opener)(port_name) {
            Ok(mut link) => {
                if let Err(e) = link.clear_buffers() {
                    tracing::debug!(error = %e, "stale buffer clear failed");
                }
                // Give USB-serial adapters a beat before the first frame.
                self.inner.clock.sleep(Duration::from_millis(100));
                *self.lock_port() = Some(link);
                self.lock_state().running = true;
                self.emit(Event::Connection(true));
                self.emit(Event::Lamp(crate::events::Lamp::Green));
                self.emit(Event::Info(format!("connected to {port_name}")));
                tracing::info!(port = port_name, "connected");
                Ok(())
            }
            Err(e) => {
                self.lock_state().running = false;
                self.emit(Event::Connection(false));
                self.emit(Event::Lamp(crate::events::Lamp::Red));
                let err = WorkerError::ConnectionFault(e.to_string());
                self.emit(Event::Error(err.to_string()));
                tracing::warn!(port = port_name, error = %e, "connect failed");
                Err(Report::new(err))
            }
        }
    }

    /// Stop the loop, try to zero the motor, drop the port and every
    /// override. Safe to call when already disconnected.
    pub fn disconnect(&self) {
        self.lock_state().running = false;
        if let Some(mut link) = self.lock_port().take() {
            let _ = link.write_all(&bench_proto::encode(&Command::SetDutyCycle(0.0)));
            let _ = link.flush();
        }
        self.lock_state().clear_overrides();
        self.emit(Event::Connection(false));
        self.emit(Event::Lamp(crate::events::Lamp::Red));
        tracing::info!("disconnected");
    }

    /// Hold a fixed duty cycle, displacing any other setpoint source.
    /// Non-finite input is treated as zero; everything else clamps to
    /// `[0, 1]`.
    pub fn set_manual_duty(&self, duty: f64) {
        let duty = if duty.is_nan() { 0.0 } else { duty.clamp(0.0, 1.0) };
        {
            let mut st = self.lock_state();
            st.manual_duty = Some(duty);
            st.manual_rpm = None;
            st.cycle.active = false;
        }
        self.emit(Event::Mode(crate::events::ControlMode::Manual));
        self.emit(Event::Lamp(crate::events::Lamp::Blue));
    }

    /// Hold a fixed mechanical RPM, displacing any other setpoint source.
    pub fn set_manual_rpm(&self, rpm: f64) {
        if !rpm.is_finite() {
            self.emit(Event::Error("manual rpm must be finite".into()));
            return;
        }
        {
            let mut st = self.lock_state();
            st.manual_rpm = Some(rpm);
            st.manual_duty = None;
            st.cycle.active = false;
        }
        self.emit(Event::Mode(crate::events::ControlMode::Manual));
        self.emit(Event::Lamp(crate::events::Lamp::Purple));
    }

    pub fn set_pole_pairs(&self, pole_pairs: u32) {
        self.lock_state().pole_pairs = pole_pairs;
    }

    /// Load a cyclogram CSV, replacing the current one. A failed load
    /// clears the stored cyclogram so stale steps cannot play.
    pub fn load_cyclogram(&self, path: &Path) -> Result<()> {
        match bench_config::load_cyclogram_csv(path) {
            Ok(rows) => {
                let gram = Cyclogram::from_rows(&rows);
                self.lock_state().cyclogram = gram;
                self.emit(Event::Info(format!(
                    "cyclogram loaded from {}",
                    path.display()
                )));
                Ok(())
            }
            Err(e) => {
                self.lock_state().cyclogram.clear();
                let err = WorkerError::CycleLoad(e.to_string());
                self.emit(Event::Error(err.to_string()));
                Err(Report::new(err))
            }
        }
    }

    /// Begin playback on the chosen track from step zero.
    ///
    /// With no data for that track the request is rejected and the current
    /// state is left untouched.
    pub fn start_cycle(&self, kind: TrackKind) -> Result<()> {
        let now = self.inner.clock.now();
        {
            let mut st = self.lock_state();
            if st.cyclogram.select(kind).is_empty() {
                drop(st);
                let err = WorkerError::CycleDataMissing;
                self.emit(Event::Error(err.to_string()));
                return Err(Report::new(err));
            }
            st.manual_duty = None;
            st.manual_rpm = None;
            st.cycle = CycleState {
                active: true,
                kind,
                index: 0,
                step_started: now,
            };
        }
        self.emit(Event::Mode(crate::events::ControlMode::Cycle));
        self.emit(Event::Lamp(crate::events::Lamp::Green));
        Ok(())
    }

    /// Abort playback and any manual hold, zero the motor and emit one
    /// zero-valued sample stamped at the current session time.
    pub fn stop_cycle(&self) {
        {
            let mut st = self.lock_state();
            st.clear_overrides();
            st.cycle.index = 0;
        }
        self.emit(Event::Mode(crate::events::ControlMode::Idle));
        self.force_zero_duty();
        let elapsed = self.elapsed();
        self.emit(Event::Sample(TelemetrySample::zero_at(elapsed)));
        self.emit(Event::Lamp(crate::events::Lamp::Red));
    }

    /// Restart the session clock and truncate the log back to its header.
    pub fn reset_session(&self) -> Result<()> {
        let now = self.inner.clock.now();
        {
            let mut st = self.lock_state();
            st.session_epoch = now;
            st.clear_overrides();
            st.cycle.index = 0;
            st.cycle.step_started = now;
        }
        self.inner.logger.reset()?;
        self.emit(Event::Mode(crate::events::ControlMode::Idle));
        self.emit(Event::Lamp(crate::events::Lamp::Red));
        self.force_zero_duty();
        self.emit(Event::Sample(TelemetrySample::zero_at(0.0)));
        Ok(())
    }

    /// Copy the telemetry log verbatim to `dest`.
    pub fn export_log(&self, dest: &Path) -> Result<()> {
        match self.inner.logger.export(dest) {
            Ok(bytes) => {
                self.emit(Event::Info(format!(
                    "log exported to {} ({bytes} bytes)",
                    dest.display()
                )));
                Ok(())
            }
            Err(e) => {
                self.emit(Event::Error(format!("export failed: {e}")));
                Err(e)
            }
        }
    }

    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.inner.logger.path().to_path_buf()
    }

    /// Run one loop iteration, then sleep the poll interval.
    ///
    /// A connection fault runs the disconnect path; any other iteration
    /// error is reported and the loop carries on.
    pub fn step(&self) {
        let connected = self.lock_state().running && self.lock_port().is_some();
        if connected {
            if let Err(e) = self.iterate() {
                if matches!(
                    e.downcast_ref::<WorkerError>(),
                    Some(WorkerError::ConnectionFault(_))
                ) {
                    tracing::warn!(error = %e, "link fault, disconnecting");
                    self.emit(Event::Error(e.to_string()));
                    self.disconnect();
                } else {
                    tracing::warn!(error = %e, "loop iteration failed");
                    self.emit(Event::Error(format!("control loop error: {e}")));
                }
            }
        }
        self.inner.clock.sleep(self.inner.poll_interval);
    }

    /// Call `step` until `shutdown` is raised.
    pub fn run(&self, shutdown: &AtomicBool) {
        while !shutdown.load(Ordering::Relaxed) {
            self.step();
        }
    }

    fn iterate(&self) -> Result<()> {
        let (decision, elapsed, pole_pairs) = {
            let mut st = self.lock_state();
            let now = self.inner.clock.now();
            let elapsed = self.inner.clock.secs_since(st.session_epoch);
            let decision = arbiter::resolve(&mut st, now);
            (decision, elapsed, st.pole_pairs)
        };
        tracing::trace!(?decision, elapsed, "loop decision");
        self.emit(Event::Mode(decision.mode()));
        self.emit(Event::Lamp(decision.lamp()));

        let duty_echo = match decision {
            Decision::CycleFinished => {
                // Terminal iteration: zero the motor, announce the final
                // sample, and skip the telemetry poll.
                self.send_command(&Command::SetDutyCycle(0.0))?;
                self.emit(Event::Sample(TelemetrySample::zero_at(elapsed)));
                self.emit(Event::Info("cycle finished".into()));
                return Ok(());
            }
            Decision::ManualRpm(rpm) | Decision::CycleRpm(rpm) => {
                let erpm = (rpm * f64::from(pole_pairs)).round() as i32;
                self.send_command(&Command::SetRpm(erpm))?;
                0.0
            }
            Decision::ManualDuty(duty) | Decision::CycleDuty(duty) => {
                let duty = duty.clamp(0.0, 1.0);
                self.send_command(&Command::SetDutyCycle(duty))?;
                duty
            }
            Decision::Idle => {
                self.send_command(&Command::SetDutyCycle(0.0))?;
                0.0
            }
        };

        // One telemetry round trip per iteration.
        let mut buf = [0u8; 256];
        let n = {
            let mut guard = self.lock_port();
            let Some(link) = guard.as_mut() else {
                return Ok(());
            };
            link.write_all(&bench_proto::encode_request(Request::GetValues))
                .map_err(link_fault)?;
            self.inner.clock.sleep(self.inner.settle);
            link.read(&mut buf).map_err(link_fault)?
        };
        let values = match bench_proto::decode(&buf[..n]) {
            Ok((Some(Message::Values(values)), _)) => values,
            // Nothing, a partial frame, or an unrelated reply: no sample
            // this iteration.
            Ok(_) => return Ok(()),
            Err(e) => return Err(Report::new(WorkerError::Decode(e.to_string()))),
        };

        let mech_rpm = if pole_pairs == 0 {
            values.rpm
        } else {
            values.rpm / f64::from(pole_pairs)
        };
        let sample = TelemetrySample {
            elapsed_s: elapsed,
            rpm: mech_rpm,
            duty: duty_echo,
            current: values.avg_motor_current,
        };
        self.emit(Event::Sample(sample));
        self.inner
            .logger
            .append_throttled(&sample)
            .map_err(|e| Report::new(WorkerError::Io(format!("log append: {e}"))))?;
        Ok(())
    }
}

fn link_fault(e: BoxError) -> Report {
    Report::new(WorkerError::ConnectionFault(e.to_string()))
}

/// Owns the background loop thread; dropping it stops the loop and joins.
pub struct WorkerThread {
    worker: Worker,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl WorkerThread {
    #[must_use]
    pub fn spawn(worker: Worker) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let thread_worker = worker.clone();
        let thread_shutdown = Arc::clone(&shutdown);
        let join = std::thread::spawn(move || {
            thread_worker.run(&thread_shutdown);
            tracing::trace!("control loop thread exiting");
        });
        Self {
            worker,
            shutdown,
            join: Some(join),
        }
    }

    #[must_use]
    pub fn worker(&self) -> &Worker {
        &self.worker
    }
}

impl Drop for WorkerThread {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                tracing::warn!("control loop thread panicked");
            }
        }
    }
}
