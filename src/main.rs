//! # Avionics Bench
//!
//! Ground-support serial test harness for rocket avionics boards.
//!
//! Opens the configured serial link, runs the default batch of checks
//! against the boards, and reports progress as it streams in. Pass
//! `--all` to include the destructive operations (storage clears and
//! launch-mode entry) in the batch.

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use avionics_bench::config::Config;
use avionics_bench::runner::{self, ProgressEvent, RunState, TestStatus, CATALOG};
use avionics_bench::session::ProtocolSession;
use avionics_bench::transport::{available_ports, TokioSerialLink};

/// Config path used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// File the bench mirrors its tracing output into
const LOG_FILE: &str = "avionics-bench.log";

#[tokio::main]
async fn main() -> Result<()> {
    // Mirror console logging into a file so a flaky bench session can
    // be reconstructed afterwards
    let file_appender = tracing_appender::rolling::never(".", LOG_FILE);
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    info!("avionics-bench v{} starting...", env!("CARGO_PKG_VERSION"));

    let args: Vec<String> = std::env::args().skip(1).collect();
    let run_all = args.iter().any(|a| a == "--all");
    let config_path = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG_PATH);

    let config = match Config::load(config_path) {
        Ok(config) => {
            info!("loaded configuration from {}", config_path);
            config
        }
        Err(e) => {
            warn!("could not load {} ({}), using built-in defaults", config_path, e);
            Config::default()
        }
    };

    match available_ports() {
        Ok(ports) if ports.is_empty() => warn!("no serial ports detected"),
        Ok(ports) => {
            for port in ports {
                info!("detected serial port: {}", port);
            }
        }
        Err(e) => warn!("could not enumerate serial ports: {}", e),
    }

    let link = TokioSerialLink::open(&config.serial.port, config.serial.baud_rate)
        .with_context(|| format!("cannot open board link at {}", config.serial.port))?;
    info!(
        "opened board link at {} ({} baud)",
        config.serial.port, config.serial.baud_rate
    );

    let session = ProtocolSession::new(link, &config);

    let selection = if run_all {
        (0..CATALOG.len()).collect()
    } else {
        runner::default_selection()
    };

    let mut state = RunState::new(&selection);
    info!("running {} operations", state.results.len());

    let mut run = runner::spawn(session, selection);

    loop {
        tokio::select! {
            event = run.events.recv() => {
                match event {
                    Some(event) => {
                        render(&state, &event);
                        state.apply(&event);
                    }
                    None => break,
                }
            }

            _ = tokio::signal::ctrl_c() => {
                warn!("received Ctrl+C, abandoning run");
                run.handle.abort();
                break;
            }
        }
    }

    let passed = state
        .results
        .iter()
        .filter(|r| r.status == TestStatus::Pass)
        .count();
    info!("run finished: {}/{} passed", passed, state.results.len());

    Ok(())
}

/// Print one progress event against the current run state
fn render(state: &RunState, event: &ProgressEvent) {
    match event {
        ProgressEvent::Started { index } => {
            if let Some(result) = state.results.get(*index) {
                info!("[{}/{}] {}...", index + 1, state.results.len(), result.name);
            }
        }
        ProgressEvent::Log { text, .. } => {
            info!("    {}", text.trim_end());
        }
        ProgressEvent::Result { index, success } => {
            if let Some(result) = state.results.get(*index) {
                if *success {
                    info!("[{}/{}] {}: PASS", index + 1, state.results.len(), result.name);
                } else {
                    error!("[{}/{}] {}: FAIL", index + 1, state.results.len(), result.name);
                }
            }
        }
    }
}
