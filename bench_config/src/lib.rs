#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and cyclogram parsing for the bench.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - The cyclogram CSV loader requires a `duration` column (matched
//!   case-insensitively) and accepts optional `duty` and `rpm` columns;
//!   each data row becomes one step of the corresponding track.
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Serial {
    /// Baud rate for the controller link.
    pub baud: u32,
    /// Per-read timeout; an expired read yields an empty reply, not a fault.
    pub read_timeout_ms: u64,
    /// Pause between the telemetry request and the reply read.
    pub settle_us: u64,
}

impl Default for Serial {
    fn default() -> Self {
        Self {
            baud: 115_200,
            read_timeout_ms: 100,
            settle_us: 1_000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Motor {
    /// Pole pairs relating electrical to mechanical RPM. Zero is tolerated
    /// (telemetry then passes electrical RPM through unconverted).
    pub pole_pairs: u32,
}

impl Default for Motor {
    fn default() -> Self {
        Self { pole_pairs: 1 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Telemetry {
    /// Session log path, truncated at startup and on session reset.
    pub csv_file: String,
    /// Minimum spacing between persisted samples.
    pub save_interval_ms: u64,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self {
            csv_file: "rpm_log.csv".to_string(),
            save_interval_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Loop {
    /// Sleep between loop iterations (also the disconnected idle sleep).
    pub poll_ms: u64,
}

impl Default for Loop {
    fn default() -> Self {
        Self { poll_ms: 5 }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub serial: Serial,
    pub motor: Motor,
    pub telemetry: Telemetry,
    #[serde(rename = "loop")]
    pub poll: Loop,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        if self.serial.baud == 0 {
            eyre::bail!("serial.baud must be > 0");
        }
        if self.serial.read_timeout_ms == 0 {
            eyre::bail!("serial.read_timeout_ms must be >= 1");
        }
        if self.serial.read_timeout_ms > 10_000 {
            eyre::bail!("serial.read_timeout_ms is unreasonably large (>10s)");
        }
        if self.telemetry.save_interval_ms == 0 {
            eyre::bail!("telemetry.save_interval_ms must be >= 1");
        }
        if self.telemetry.csv_file.is_empty() {
            eyre::bail!("telemetry.csv_file must not be empty");
        }
        if self.poll.poll_ms == 0 {
            eyre::bail!("loop.poll_ms must be >= 1");
        }
        if self.poll.poll_ms > 1_000 {
            eyre::bail!("loop.poll_ms is unreasonably large (>1s)");
        }
        // motor.pole_pairs == 0 is tolerated at runtime; nothing to reject.
        Ok(())
    }
}

/// Raw cyclogram rows: `(duration_seconds, value)` per step, one vector per
/// optional column. A track is empty when its column is absent.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CyclogramRows {
    pub duty: Vec<(f64, f64)>,
    pub rpm: Vec<(f64, f64)>,
}

/// Load a cyclogram from CSV.
///
/// Header row is required; `duration` must be present (any casing), `duty`
/// and `rpm` are optional. Durations must be finite and > 0, values finite.
pub fn load_cyclogram_csv(path: &Path) -> eyre::Result<CyclogramRows> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open cyclogram CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let col = |name: &str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
    };
    let Some(dur_col) = col("duration") else {
        eyre::bail!("cyclogram CSV must contain a 'duration' column");
    };
    let duty_col = col("duty");
    let rpm_col = col("rpm");

    let parse = |field: &str, what: &str, row: usize| -> eyre::Result<f64> {
        let v: f64 = field
            .parse()
            .map_err(|e| eyre::eyre!("invalid {} in CSV row {}: {}", what, row, e))?;
        if !v.is_finite() {
            eyre::bail!("non-finite {} in CSV row {}", what, row);
        }
        Ok(v)
    };

    let mut rows = CyclogramRows::default();
    for (idx, rec) in rdr.records().enumerate() {
        let rec = rec.map_err(|e| eyre::eyre!("invalid CSV row {}: {}", idx + 2, e))?;
        let row = idx + 2; // 1-based, after the header
        let dur_field = rec
            .get(dur_col)
            .ok_or_else(|| eyre::eyre!("missing duration in CSV row {}", row))?;
        let duration = parse(dur_field, "duration", row)?;
        if duration <= 0.0 {
            eyre::bail!("duration must be > 0 in CSV row {}", row);
        }
        if let Some(c) = duty_col {
            let field = rec
                .get(c)
                .ok_or_else(|| eyre::eyre!("missing duty in CSV row {}", row))?;
            rows.duty.push((duration, parse(field, "duty", row)?));
        }
        if let Some(c) = rpm_col {
            let field = rec
                .get(c)
                .ok_or_else(|| eyre::eyre!("missing rpm in CSV row {}", row))?;
            rows.rpm.push((duration, parse(field, "rpm", row)?));
        }
    }
    Ok(rows)
}
