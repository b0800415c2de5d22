//! `simulated-perception` – runs the simulated perception node.
//!
//! 1. Loads `~/.conesim/config.toml` (defaults if absent) plus `CONESIM_*`
//!    overrides.
//! 2. Starts the rosbridge WebSocket server so the simulator can publish
//!    ground truth and receive the cropped cone map.
//! 3. Runs the fixed-rate publish cycle until **Ctrl-C**.
//!
//! With `--record SESSION.db3` all ground truth and output is also written
//! to a session database that `integrity-check` can verify.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use conesim_cli::args::PerceptionArgs;
use conesim_cli::config::{self, Config};
use conesim_middleware::{EventBus, Ros2Bridge};
use conesim_runtime::{PerceptionNode, SessionRecorder, init_tracing};
use tokio::sync::watch;
use tracing::{error, warn};

fn main() -> ExitCode {
    let args = PerceptionArgs::parse();
    let _otel_guard = init_tracing("simulated-perception");

    print_banner();

    let cfg = match config::load() {
        Ok(cfg) => {
            println!(
                "  Config: {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };
    print_settings(&cfg);

    // ── Shutdown signal ───────────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        let _ = shutdown_tx.send(true);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the node must be killed to stop");
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(serve(cfg, args.record, shutdown_rx)) {
        Ok(ticks) => {
            println!("  {} {} cycles published.", "✓".green().bold(), ticks);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "simulated perception stopped");
            ExitCode::FAILURE
        }
    }
}

/// Run the bridge and the node together until shutdown.
///
/// Returns the number of publish cycles, or the error that ended the bridge
/// early.
async fn serve(
    cfg: Config,
    record: Option<PathBuf>,
    shutdown: watch::Receiver<bool>,
) -> Result<u64, conesim_types::SimError> {
    let addr = cfg.bridge_addr()?;
    let bus = Arc::new(EventBus::default());
    let bridge = Ros2Bridge::with_topics(Arc::clone(&bus), cfg.topic_names());
    let node = PerceptionNode::new(cfg.to_node_config(), Arc::clone(&bus))?;
    let recorder = match record {
        Some(path) => Some(SessionRecorder::create(path)?.spawn(&bus, shutdown.clone())),
        None => None,
    };

    let result = tokio::select! {
        ticks = node.run(shutdown) => Ok(ticks),
        res = bridge.run_ws_server(addr) => res.map(|()| node.ticks()),
    };

    if let Some(recorder) = recorder {
        // Without a shutdown signal the recorder would wait forever.
        if result.is_err() {
            recorder.abort();
        }
        match recorder.await {
            Ok(rows) => println!("  {} {} messages recorded.", "✓".green().bold(), rows),
            Err(e) if e.is_cancelled() => {}
            Err(e) => error!(error = %e, "session recorder task failed"),
        }
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Console output
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ____                 _____ _         "#.bold().cyan());
    println!("{}", r#"  / ___|___  _ __   ___/ ___|(_)_ __ ___ "#.bold().cyan());
    println!("{}", r#" | |   / _ \| '_ \ / _ \___ \| | '_ ` _ \"#.bold().cyan());
    println!("{}", r#" | |__| (_) | | | |  __/___) | | | | | | |"#.bold().cyan());
    println!("{}", r#"  \____\___/|_| |_|\___|____/|_|_| |_| |_|"#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "simulated-perception".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Ground truth in, sensor-realistic cones out");
    println!();
}

fn print_settings(cfg: &Config) {
    println!(
        "  Rate {} Hz · FOV {}° · range {} m",
        cfg.update_hz.to_string().bold(),
        cfg.fov_deg.to_string().bold(),
        cfg.max_distance.to_string().bold()
    );
    println!(
        "  rosbridge on {}:{}  ({} → {})",
        cfg.bridge_host,
        cfg.bridge_port,
        cfg.topics.ground_truth_track.dimmed(),
        cfg.topics.simulated_perception.dimmed()
    );
    println!();
}
