//! Override semantics: clamping, priority and mutual exclusion.

use bench_core::mocks::{SimHandles, SimulatedVesc, single_port_opener};
use bench_core::{Event, TrackKind, Worker, WorkerCfg};
use bench_proto::{Message, Values};
use bench_traits::clock::test_clock::TestClock;
use crossbeam_channel::Receiver;
use proptest::prelude::*;
use std::io::Write;
use std::sync::Arc;

struct Bench {
    worker: Worker,
    events: Receiver<Event>,
    sim: SimHandles,
    _dir: tempfile::TempDir,
}

fn bench() -> Bench {
    let dir = tempfile::tempdir().unwrap();
    let (link, sim) = SimulatedVesc::new(Values::default());
    let (worker, events) = Worker::builder()
        .with_opener(single_port_opener(link))
        .with_clock(Arc::new(TestClock::new()))
        .with_cfg(WorkerCfg {
            pole_pairs: 7,
            log_path: dir.path().join("rpm_log.csv"),
            ..WorkerCfg::default()
        })
        .build()
        .unwrap();
    Bench {
        worker,
        events,
        sim,
        _dir: dir,
    }
}

fn last_command(sim: &SimHandles) -> Message {
    sim.commands().last().cloned().expect("no command issued")
}

proptest! {
    // Whatever the operator types, the commanded duty stays in [0, 1].
    #[test]
    fn manual_duty_is_always_clamped(duty in prop::num::f64::ANY) {
        let b = bench();
        b.worker.connect("sim0").unwrap();
        b.worker.set_manual_duty(duty);
        b.worker.step();
        let Message::SetDutyCycle(sent) = last_command(&b.sim) else {
            panic!("expected a duty command");
        };
        prop_assert!((0.0..=1.0).contains(&sent), "sent {sent} for input {duty}");
    }

    #[test]
    fn in_range_duty_passes_through(duty in 0.0f64..=1.0) {
        let b = bench();
        b.worker.connect("sim0").unwrap();
        b.worker.set_manual_duty(duty);
        b.worker.step();
        let Message::SetDutyCycle(sent) = last_command(&b.sim) else {
            panic!("expected a duty command");
        };
        // Wire precision is 1/100000 of full duty.
        prop_assert!((sent - duty).abs() <= 1e-5);
    }
}

#[test]
fn rpm_hold_displaces_duty_hold() {
    let b = bench();
    b.worker.connect("sim0").unwrap();
    b.worker.set_manual_duty(0.4);
    b.worker.set_manual_rpm(300.0);
    b.worker.step();
    assert_eq!(last_command(&b.sim), Message::SetRpm(2100));
}

#[test]
fn duty_hold_displaces_rpm_hold() {
    let b = bench();
    b.worker.connect("sim0").unwrap();
    b.worker.set_manual_rpm(300.0);
    b.worker.set_manual_duty(0.4);
    b.worker.step();
    assert_eq!(last_command(&b.sim), Message::SetDutyCycle(0.4));
}

#[test]
fn manual_hold_pauses_playback_without_advancing_it() {
    let b = bench();
    let path = b._dir.path().join("cycle.csv");
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(b"duration,duty\n10.0,0.9\n").unwrap();
    b.worker.load_cyclogram(&path).unwrap();
    b.worker.connect("sim0").unwrap();
    b.worker.start_cycle(TrackKind::Duty).unwrap();
    b.worker.step();
    assert_eq!(last_command(&b.sim), Message::SetDutyCycle(0.9));

    // A manual hold takes over and deactivates playback.
    b.worker.set_manual_duty(0.1);
    b.worker.step();
    assert_eq!(last_command(&b.sim), Message::SetDutyCycle(0.1));
}

#[test]
fn non_finite_rpm_is_rejected() {
    let b = bench();
    b.worker.connect("sim0").unwrap();
    let _: Vec<Event> = b.events.try_iter().collect();

    b.worker.set_manual_rpm(f64::NAN);
    let seen: Vec<Event> = b.events.try_iter().collect();
    assert!(seen.iter().any(|e| matches!(e, Event::Error(_))));

    // No hold was installed: the loop idles at zero duty.
    b.worker.step();
    assert_eq!(last_command(&b.sim), Message::SetDutyCycle(0.0));
}

#[test]
fn non_finite_duty_degrades_to_zero() {
    let b = bench();
    b.worker.connect("sim0").unwrap();
    b.worker.set_manual_duty(f64::NAN);
    b.worker.step();
    assert_eq!(last_command(&b.sim), Message::SetDutyCycle(0.0));
}
