//! Human-readable error descriptions and structured JSON error formatting.

use bench_core::WorkerError;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(we) = err.downcast_ref::<WorkerError>() {
        return match we {
            WorkerError::ConnectionFault(msg) => format!(
                "What happened: The serial link failed ({msg}).\nLikely causes: Wrong port name, unplugged adapter, or another program holding the port.\nHow to fix: Run `bench list-ports`, check the cable, and retry."
            ),
            WorkerError::Decode(msg) => format!(
                "What happened: A telemetry reply could not be decoded ({msg}).\nLikely causes: Wrong baud rate or line noise.\nHow to fix: Verify serial.baud in the config matches the controller."
            ),
            WorkerError::CycleLoad(msg) => format!(
                "What happened: The cyclogram CSV was rejected ({msg}).\nLikely causes: Missing 'duration' column, non-numeric fields, or non-positive durations.\nHow to fix: Check the file with `bench check-cyclogram <file>`."
            ),
            WorkerError::CycleDataMissing => {
                "What happened: The selected cyclogram track has no steps.\nLikely causes: The CSV lacks the requested column, or no cyclogram was loaded.\nHow to fix: Pass --cyclogram with a file containing that column, or pick the other --track.".to_string()
            }
            WorkerError::Export(msg) => format!(
                "What happened: Copying the telemetry log failed ({msg}).\nLikely causes: Destination directory missing or not writable.\nHow to fix: Create the directory or pick another --export path."
            ),
            WorkerError::Config(msg) => format!(
                "What happened: The configuration was rejected ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See README for a sample."
            ),
            WorkerError::Io(msg) => format!(
                "What happened: A file operation failed ({msg}).\nLikely causes: Permissions or disk space.\nHow to fix: Check the telemetry.csv_file path in the config."
            ),
        };
    }

    let msg = err.to_string();
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes per failure class; anything unrecognized returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<WorkerError>() {
        Some(WorkerError::ConnectionFault(_)) => 2,
        Some(WorkerError::CycleLoad(_) | WorkerError::CycleDataMissing) => 3,
        Some(WorkerError::Export(_)) => 4,
        Some(WorkerError::Config(_)) => 5,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let reason = match err.downcast_ref::<WorkerError>() {
        Some(WorkerError::ConnectionFault(_)) => "ConnectionFault",
        Some(WorkerError::Decode(_)) => "Decode",
        Some(WorkerError::CycleLoad(_)) => "CycleLoad",
        Some(WorkerError::CycleDataMissing) => "CycleDataMissing",
        Some(WorkerError::Export(_)) => "Export",
        Some(WorkerError::Config(_)) => "Config",
        Some(WorkerError::Io(_)) => "Io",
        None => "Error",
    };
    json!({ "reason": reason, "message": humanize(err) }).to_string()
}
