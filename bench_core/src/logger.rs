//! Throttled CSV telemetry log.
//!
//! The log file is created (truncated) up front with a fixed header and
//! appended to at most once per save interval; `export` copies the file
//! byte for byte. The file handle and the throttle deadline share one lock
//! so an export never observes a half-written row.

use crate::error::WorkerError;
use crate::events::TelemetrySample;
use bench_traits::Clock;
use eyre::{Report, WrapErr};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const LOG_HEADER: [&str; 4] = ["elapsed_time_sec", "rpm", "duty", "current"];

struct LogFile {
    writer: csv::Writer<File>,
    next_save: Instant,
}

pub struct TelemetryLogger {
    path: PathBuf,
    interval: Duration,
    clock: Arc<dyn Clock + Send + Sync>,
    io: Mutex<LogFile>,
}

fn open_writer(path: &Path) -> crate::error::Result<csv::Writer<File>> {
    let file = File::create(path)
        .wrap_err_with(|| format!("failed to create log file {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(LOG_HEADER)?;
    writer.flush()?;
    Ok(writer)
}

impl TelemetryLogger {
    /// Create (or truncate) the log at `path` and write the header row.
    pub fn create(
        path: impl Into<PathBuf>,
        interval: Duration,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> crate::error::Result<Self> {
        let path = path.into();
        let writer = open_writer(&path)?;
        // Throttle arms one interval out, so a burst right after startup
        // still logs at the configured rate.
        let next_save = clock.now() + interval;
        Ok(Self {
            path,
            interval,
            clock,
            io: Mutex::new(LogFile { writer, next_save }),
        })
    }

    fn lock_io(&self) -> std::sync::MutexGuard<'_, LogFile> {
        self.io.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Append `sample` if the save interval has elapsed.
    ///
    /// Returns whether a row was written. The deadline advances by a fixed
    /// interval per row, so sustained sampling converges on one row per
    /// interval regardless of loop jitter.
    pub fn append_throttled(&self, sample: &TelemetrySample) -> crate::error::Result<bool> {
        let mut io = self.lock_io();
        if self.clock.now() < io.next_save {
            return Ok(false);
        }
        io.writer
            .serialize((sample.elapsed_s, sample.rpm, sample.duty, sample.current))?;
        io.writer.flush()?;
        io.next_save += self.interval;
        Ok(true)
    }

    /// Truncate back to the header row and restart the throttle.
    pub fn reset(&self) -> crate::error::Result<()> {
        let mut io = self.lock_io();
        io.writer = open_writer(&self.path)?;
        io.next_save = self.clock.now() + self.interval;
        Ok(())
    }

    /// Copy the log verbatim to `dest`. Returns bytes copied.
    pub fn export(&self, dest: &Path) -> crate::error::Result<u64> {
        // Holding the lock keeps concurrent appends out of the copy.
        let _io = self.lock_io();
        std::fs::copy(&self.path, dest).map_err(|e| {
            Report::new(WorkerError::Export(format!(
                "{} -> {}: {e}",
                self.path.display(),
                dest.display()
            )))
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
