//! Telemetry log: header, throttling, reset and verbatim export.

use bench_core::{TelemetryLogger, TelemetrySample};
use bench_traits::clock::test_clock::TestClock;
use std::sync::Arc;
use std::time::Duration;

fn sample(elapsed_s: f64, rpm: f64) -> TelemetrySample {
    TelemetrySample {
        elapsed_s,
        rpm,
        duty: 0.5,
        current: 1.25,
    }
}

fn logger_at(dir: &tempfile::TempDir, clock: &TestClock) -> TelemetryLogger {
    TelemetryLogger::create(
        dir.path().join("rpm_log.csv"),
        Duration::from_millis(100),
        Arc::new(clock.clone()),
    )
    .unwrap()
}

#[test]
fn creates_file_with_exact_header() {
    let dir = tempfile::tempdir().unwrap();
    let clock = TestClock::new();
    let log = logger_at(&dir, &clock);
    let contents = std::fs::read_to_string(log.path()).unwrap();
    assert_eq!(contents, "elapsed_time_sec,rpm,duty,current\n");
}

#[test]
fn throttles_to_one_row_per_interval() {
    let dir = tempfile::tempdir().unwrap();
    let clock = TestClock::new();
    let log = logger_at(&dir, &clock);

    // Offer a sample every simulated millisecond for one second. The
    // throttle arms one interval after creation, so rows land at
    // 100 ms, 200 ms, ..., 900 ms.
    let mut written = 0;
    for ms in 0..1000 {
        if log.append_throttled(&sample(f64::from(ms) / 1000.0, 100.0)).unwrap() {
            written += 1;
        }
        clock.advance(Duration::from_millis(1));
    }
    assert_eq!(written, 9);

    let contents = std::fs::read_to_string(log.path()).unwrap();
    assert_eq!(contents.lines().count(), 1 + 9);
}

#[test]
fn sparse_samples_all_land() {
    let dir = tempfile::tempdir().unwrap();
    let clock = TestClock::new();
    let log = logger_at(&dir, &clock);

    // Still inside the arming interval.
    assert!(!log.append_throttled(&sample(0.0, 1.0)).unwrap());
    clock.advance(Duration::from_secs(1));
    assert!(log.append_throttled(&sample(1.0, 2.0)).unwrap());
    clock.advance(Duration::from_secs(1));
    assert!(log.append_throttled(&sample(2.0, 3.0)).unwrap());
}

#[test]
fn reset_truncates_to_header_and_restarts_throttle() {
    let dir = tempfile::tempdir().unwrap();
    let clock = TestClock::new();
    let log = logger_at(&dir, &clock);

    clock.advance(Duration::from_millis(150));
    assert!(log.append_throttled(&sample(0.15, 100.0)).unwrap());
    clock.advance(Duration::from_millis(150));
    assert!(log.append_throttled(&sample(0.3, 100.0)).unwrap());

    log.reset().unwrap();
    let contents = std::fs::read_to_string(log.path()).unwrap();
    assert_eq!(contents, "elapsed_time_sec,rpm,duty,current\n");

    // The throttle re-arms: nothing lands until an interval passes.
    assert!(!log.append_throttled(&sample(0.0, 50.0)).unwrap());
    clock.advance(Duration::from_millis(100));
    assert!(log.append_throttled(&sample(0.1, 50.0)).unwrap());
}

#[test]
fn export_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let clock = TestClock::new();
    let log = logger_at(&dir, &clock);

    for i in 0..5 {
        log.append_throttled(&sample(f64::from(i) * 0.1, 700.0)).unwrap();
        clock.advance(Duration::from_millis(100));
    }

    let dest = dir.path().join("export.csv");
    let bytes = log.export(&dest).unwrap();
    let src = std::fs::read(log.path()).unwrap();
    assert_eq!(bytes, src.len() as u64);
    assert_eq!(src, std::fs::read(&dest).unwrap());
}

#[test]
fn export_during_concurrent_appends_yields_whole_rows() {
    let dir = tempfile::tempdir().unwrap();
    // Zero interval lets every append land, maximizing write pressure.
    let log = Arc::new(
        TelemetryLogger::create(
            dir.path().join("rpm_log.csv"),
            Duration::ZERO,
            Arc::new(bench_traits::MonotonicClock::new()),
        )
        .unwrap(),
    );

    let writer = {
        let log = Arc::clone(&log);
        std::thread::spawn(move || {
            for i in 0..500 {
                log.append_throttled(&sample(f64::from(i), 123.456)).unwrap();
            }
        })
    };

    for round in 0..5 {
        let dest = dir.path().join(format!("export_{round}.csv"));
        log.export(&dest).unwrap();
        let contents = std::fs::read_to_string(&dest).unwrap();
        // The logger lock keeps half-written rows out of the copy.
        assert!(contents.ends_with('\n'));
        let mut lines = contents.lines();
        assert_eq!(lines.next().unwrap(), "elapsed_time_sec,rpm,duty,current");
        for line in lines {
            assert_eq!(line.split(',').count(), 4, "torn row: {line:?}");
        }
    }
    writer.join().unwrap();
}

#[test]
fn export_to_unwritable_destination_fails() {
    let dir = tempfile::tempdir().unwrap();
    let clock = TestClock::new();
    let log = logger_at(&dir, &clock);
    let missing_parent = dir.path().join("no_such_dir").join("export.csv");
    assert!(log.export(&missing_parent).is_err());
}
