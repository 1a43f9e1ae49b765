use bench_config::load_toml;
use rstest::rstest;

#[rstest]
fn defaults_are_valid() {
    let cfg = load_toml("").unwrap();
    cfg.validate().unwrap();
    assert_eq!(cfg.serial.baud, 115_200);
    assert_eq!(cfg.serial.read_timeout_ms, 100);
    assert_eq!(cfg.motor.pole_pairs, 1);
    assert_eq!(cfg.telemetry.save_interval_ms, 100);
    assert_eq!(cfg.poll.poll_ms, 5);
}

#[rstest]
fn full_config_parses() {
    let cfg = load_toml(
        r#"
[serial]
baud = 230400
read_timeout_ms = 50
settle_us = 500

[motor]
pole_pairs = 7

[telemetry]
csv_file = "bench.csv"
save_interval_ms = 200

[loop]
poll_ms = 10

[logging]
level = "debug"
"#,
    )
    .unwrap();
    cfg.validate().unwrap();
    assert_eq!(cfg.serial.baud, 230_400);
    assert_eq!(cfg.motor.pole_pairs, 7);
    assert_eq!(cfg.telemetry.csv_file, "bench.csv");
    assert_eq!(cfg.poll.poll_ms, 10);
    assert_eq!(cfg.logging.level.as_deref(), Some("debug"));
}

#[rstest]
#[case("[serial]\nbaud = 0\n", "serial.baud")]
#[case("[serial]\nread_timeout_ms = 0\n", "serial.read_timeout_ms")]
#[case("[serial]\nread_timeout_ms = 60000\n", "serial.read_timeout_ms")]
#[case("[telemetry]\nsave_interval_ms = 0\n", "telemetry.save_interval_ms")]
#[case("[telemetry]\ncsv_file = \"\"\n", "telemetry.csv_file")]
#[case("[loop]\npoll_ms = 0\n", "loop.poll_ms")]
fn validate_rejects_bad_fields(#[case] toml: &str, #[case] field: &str) {
    let cfg = load_toml(toml).unwrap();
    let err = cfg.validate().expect_err("should be rejected");
    assert!(
        format!("{err}").contains(field),
        "error should mention {field}: {err}"
    );
}

#[rstest]
fn zero_pole_pairs_is_tolerated() {
    let cfg = load_toml("[motor]\npole_pairs = 0\n").unwrap();
    cfg.validate().unwrap();
    assert_eq!(cfg.motor.pole_pairs, 0);
}
