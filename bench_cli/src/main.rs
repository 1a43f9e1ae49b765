//! Bench CLI: wires the config, serial link and control worker together.

mod cli;
mod error_fmt;

use clap::Parser;
use cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use error_fmt::{exit_code_for_error, format_error_json, humanize};

use bench_core::{Event, Worker, WorkerCfg, WorkerError, WorkerThread};
use bench_hardware::SerialLink;
use bench_traits::Transport;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use eyre::{Report, WrapErr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = run(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn run(cli: Cli) -> eyre::Result<()> {
    color_eyre::install()?;
    let cfg = load_config(&cli.config)?;
    init_tracing(&cli, &cfg)?;

    match cli.cmd {
        Commands::ListPorts => {
            for name in bench_hardware::list_ports()? {
                println!("{name}");
            }
            Ok(())
        }
        Commands::CheckCyclogram { file } => check_cyclogram(&file),
        Commands::Run {
            port,
            duty,
            rpm,
            cyclogram,
            track,
            seconds,
            export,
            pole_pairs,
        } => run_bench(RunOpts {
            cfg,
            port,
            duty,
            rpm,
            cyclogram,
            track,
            seconds,
            export,
            pole_pairs,
        }),
    }
}

fn load_config(path: &Path) -> eyre::Result<bench_config::Config> {
    if !path.exists() {
        // Stock defaults cover the common bench setup.
        return Ok(bench_config::Config::default());
    }
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
    let cfg: bench_config::Config = toml::from_str(&text).map_err(|e| {
        Report::new(WorkerError::Config(format!("{}: {e}", path.display())))
    })?;
    cfg.validate()
        .map_err(|e| Report::new(WorkerError::Config(e.to_string())))?;
    Ok(cfg)
}

fn init_tracing(cli: &Cli, cfg: &bench_config::Config) -> eyre::Result<()> {
    let level = cfg
        .logging
        .level
        .clone()
        .unwrap_or_else(|| cli.log_level.clone());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if let Some(file) = &cfg.logging.file {
        let path = PathBuf::from(file);
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let name = path.file_name().map_or_else(
            || std::ffi::OsString::from("bench.log"),
            std::ffi::OsStr::to_os_string,
        );
        let appender = tracing_appender::rolling::never(dir, name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_writer(writer)
            .init();
    } else if cli.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

fn check_cyclogram(file: &Path) -> eyre::Result<()> {
    let rows = bench_config::load_cyclogram_csv(file)
        .map_err(|e| Report::new(WorkerError::CycleLoad(e.to_string())))?;
    let total = |track: &[(f64, f64)]| track.iter().map(|(d, _)| d).sum::<f64>();
    println!(
        "duty track: {} steps, {:.1} s",
        rows.duty.len(),
        total(&rows.duty)
    );
    println!(
        "rpm track: {} steps, {:.1} s",
        rows.rpm.len(),
        total(&rows.rpm)
    );
    Ok(())
}

struct RunOpts {
    cfg: bench_config::Config,
    port: String,
    duty: Option<f64>,
    rpm: Option<f64>,
    cyclogram: Option<PathBuf>,
    track: cli::TrackArg,
    seconds: Option<f64>,
    export: Option<PathBuf>,
    pole_pairs: Option<u32>,
}

fn run_bench(opts: RunOpts) -> eyre::Result<()> {
    let mut wcfg = WorkerCfg::from_config(&opts.cfg);
    if let Some(pp) = opts.pole_pairs {
        wcfg.pole_pairs = pp;
    }
    if wcfg.pole_pairs == 0 {
        tracing::warn!(
            "motor.pole_pairs is 0: telemetry RPM stays electrical and RPM commands scale to zero"
        );
    }

    let baud = opts.cfg.serial.baud;
    let read_timeout = Duration::from_millis(opts.cfg.serial.read_timeout_ms);
    let (worker, events) = Worker::builder()
        .with_opener(move |name: &str| {
            SerialLink::open(name, baud, read_timeout)
                .map(|link| Box::new(link) as Box<dyn Transport>)
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
        })
        .with_cfg(wcfg)
        .build()?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || shutdown.store(true, Ordering::Relaxed))
            .wrap_err("failed to install Ctrl-C handler")?;
    }

    if let Some(path) = opts.cyclogram.as_deref() {
        worker.load_cyclogram(path)?;
    }
    worker.connect(&opts.port)?;
    let thread = WorkerThread::spawn(worker.clone());

    let playing_cycle = if let Some(duty) = opts.duty {
        worker.set_manual_duty(duty);
        false
    } else if let Some(rpm) = opts.rpm {
        worker.set_manual_rpm(rpm);
        false
    } else if opts.cyclogram.is_some() {
        worker.start_cycle(opts.track.into())?;
        true
    } else {
        false
    };

    watch_events(&events, &shutdown, opts.seconds, playing_cycle);

    worker.disconnect();
    drop(thread);
    if let Some(dest) = &opts.export {
        worker.export_log(dest)?;
        println!("telemetry log exported to {}", dest.display());
    }
    Ok(())
}

/// Pump the event channel to the console until Ctrl-C, the deadline, a
/// finished cyclogram, or a dropped link.
fn watch_events(
    events: &Receiver<Event>,
    shutdown: &AtomicBool,
    seconds: Option<f64>,
    playing_cycle: bool,
) {
    let deadline = seconds.map(|s| Instant::now() + Duration::from_secs_f64(s));
    let mut printer = EventPrinter::new(JSON_MODE.get().copied().unwrap_or(false));
    while !shutdown.load(Ordering::Relaxed) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        match events.recv_timeout(Duration::from_millis(100)) {
            Ok(ev) => {
                printer.print(&ev);
                if playing_cycle && matches!(&ev, Event::Info(msg) if msg == "cycle finished") {
                    break;
                }
                if ev == Event::Connection(false) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Console rendering: JSON lines, or deduplicated human-readable output
/// with samples limited to one per second.
struct EventPrinter {
    json: bool,
    last_mode: Option<bench_core::ControlMode>,
    last_lamp: Option<bench_core::Lamp>,
    next_sample_s: f64,
}

impl EventPrinter {
    fn new(json: bool) -> Self {
        Self {
            json,
            last_mode: None,
            last_lamp: None,
            next_sample_s: 0.0,
        }
    }

    fn print(&mut self, ev: &Event) {
        if self.json {
            println!("{}", Self::to_json(ev));
            return;
        }
        match ev {
            Event::Sample(s) => {
                if s.elapsed_s >= self.next_sample_s {
                    println!(
                        "t={:8.2}s  rpm={:9.1}  duty={:5.3}  current={:6.2}A",
                        s.elapsed_s, s.rpm, s.duty, s.current
                    );
                    self.next_sample_s = s.elapsed_s + 1.0;
                }
            }
            Event::Connection(up) => {
                println!("link {}", if *up { "up" } else { "down" });
            }
            Event::Mode(mode) => {
                if self.last_mode != Some(*mode) {
                    println!("mode: {}", mode.as_str());
                    self.last_mode = Some(*mode);
                }
            }
            Event::Lamp(lamp) => {
                if self.last_lamp != Some(*lamp) {
                    println!("lamp: {}", lamp.as_str());
                    self.last_lamp = Some(*lamp);
                }
            }
            Event::Error(msg) => eprintln!("error: {msg}"),
            Event::Info(msg) => println!("{msg}"),
        }
    }

    fn to_json(ev: &Event) -> String {
        use serde_json::json;
        match ev {
            Event::Sample(s) => json!({
                "event": "sample",
                "elapsed_s": s.elapsed_s,
                "rpm": s.rpm,
                "duty": s.duty,
                "current": s.current,
            }),
            Event::Connection(up) => json!({ "event": "connection", "up": up }),
            Event::Mode(mode) => json!({ "event": "mode", "mode": mode.as_str() }),
            Event::Lamp(lamp) => json!({ "event": "lamp", "color": lamp.as_str() }),
            Event::Error(msg) => json!({ "event": "error", "message": msg }),
            Event::Info(msg) => json!({ "event": "info", "message": msg }),
        }
        .to_string()
    }
}
