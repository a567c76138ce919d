// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/bt-tracker-rs

//! bt-tracker - Bluetooth sensor to MQTT daemon
//!
//! Exit codes: 0 after a clean shutdown, 1 on any setup failure
//! (configuration, broker connection) or a lost broker connection.

use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use bt_tracker::config::RadioBackend;
use bt_tracker::core::{build_air_monitor, build_radio, build_registry};
use bt_tracker::sensors::SysinfoThermal;
use bt_tracker::streaming::mqtt_options;
use bt_tracker::{Config, DaemonContext, DaemonLoop, MqttPublisher, PollingOrchestrator, Topics, NAME, VERSION};

/// Bluetooth Tracker MQTT Client/Daemon
#[derive(Parser, Debug)]
#[command(name = "bt-tracker")]
#[command(version = VERSION)]
#[command(about = "Polls Bluetooth soil probes and an indoor air monitor and publishes to MQTT")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,

    /// Use the simulated radio instead of real hardware
    #[arg(long)]
    demo: bool,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_level = if args.trace {
        Level::TRACE
    } else if args.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.as_str())),
        )
        .with_target(false)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install logger: {}", e);
        return ExitCode::FAILURE;
    }

    info!("{} v{}", NAME, VERSION);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config_path = args.config.unwrap_or_else(Config::default_path);
    let mut config = Config::load(&config_path)?;

    if args.demo {
        config.general.backend = RadioBackend::Simulated;
    }
    if args.once {
        config.daemon.enabled = false;
    }
    info!("Configuration accepted");

    // validate everything that can fail before touching the network
    let radio = build_radio(&config);
    let mut registry = build_registry(&config, &radio)?;
    let air_monitor = build_air_monitor(&config, &radio)?;
    let topics = Topics::from_config(&config.mqtt);
    let options = mqtt_options(&config.mqtt, &topics)?;

    let publisher = MqttPublisher::connect(options).await?;
    // from here on Ctrl-C must close the broker connection cleanly
    let shutdown = arm_shutdown();

    registry.probe().await;
    info!("Initialization complete, starting MQTT publish loop");

    let mut ctx = DaemonContext::new(
        registry,
        air_monitor,
        Box::new(SysinfoThermal::new()),
        Box::new(publisher),
        topics,
    )
    .with_orchestrator(PollingOrchestrator::new(config.daemon.stats_policy()))
    .with_publish_pause(config.daemon.publish_pause());

    let cycles = DaemonLoop::from_config(&config.daemon)
        .run(&mut ctx, shutdown)
        .await?;

    info!("bt-tracker stopped after {} cycles", cycles);
    Ok(())
}

/// Start listening for Ctrl-C right away; the returned future resolves once
/// the signal has arrived, even if that was before it is first polled
fn arm_shutdown() -> impl Future<Output = ()> {
    let signal = tokio::spawn(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    });
    async move {
        let _ = signal.await;
    }
}
