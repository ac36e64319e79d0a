//! Tally GW - Roland V-8HD tally light gateway
//!
//! Polls the switcher's tally state over MIDI SysEx and drives one relay
//! lamp per input channel.

use anyhow::Result;
use clap::Parser;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tally_gw::config::{AppConfig, OutputBackend};
use tally_gw::link::{DeviceLink, LinkState};
use tally_gw::midi::MidirBackend;
use tally_gw::output::{ConsoleOutput, SysfsGpio, TallyOutput};
use tally_gw::ports;
use tally_gw::tally::{self, TallyBoard, TallyPoller};

/// Tally GW - Roland V-8HD tally lights over MIDI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "tally.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Report the tally in the log instead of driving GPIO
    #[arg(long)]
    console: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Parse command line arguments
    let args = Args::parse();

    let config = AppConfig::load_or_default(&args.config).await?;

    // Initialize logging
    let _log_guard = init_logging(&args.log_level, config.logging.dir.as_deref())?;

    info!("Starting Tally GW...");
    if Path::new(&args.config).exists() {
        info!("Configuration file: {}", args.config);
    } else {
        info!("Configuration file {} not found, using defaults", args.config);
    }

    let backend = MidirBackend::new(config.device.client_name.clone());

    // Handle list ports
    if args.list_ports {
        ports::print_ports(&backend, &config.device.token)?;
        return Ok(());
    }

    let output = build_output(&config, args.console)?;
    let board = Arc::new(Mutex::new(TallyBoard::new(output)));
    board.lock().all_off();

    let mut link = DeviceLink::new(
        backend,
        config.device.token.clone(),
        tally::reply_sink(board.clone()),
    );
    if link.ensure_open() == LinkState::Closed {
        info!(
            "Waiting for {} (retrying every {:?})",
            config.device.token,
            config.polling.reconnect_interval()
        );
    }

    let stop = Arc::new(AtomicBool::new(false));
    let poller = TallyPoller::new(link, &config.polling);
    let polling = {
        let stop = stop.clone();
        tokio::task::spawn_blocking(move || poller.run(stop))
    };

    shutdown_signal().await;

    // Cleanup
    info!("Shutting down...");
    stop.store(true, Ordering::Release);
    let mut link = polling.await?;
    link.close();
    board.lock().shutdown();

    info!("Tally GW shutdown complete");
    Ok(())
}

fn build_output(config: &AppConfig, force_console: bool) -> Result<Box<dyn TallyOutput>> {
    if force_console || config.outputs.backend == OutputBackend::Console {
        info!("Tally output: console");
        return Ok(Box::new(ConsoleOutput::new()));
    }

    let gpio = SysfsGpio::open(
        &config.outputs.gpio_root,
        &config.outputs.pins,
        config.outputs.active_low,
    )?;
    info!(
        "Tally output: GPIO {:?} (active {})",
        config.outputs.pins,
        if config.outputs.active_low { "low" } else { "high" }
    );
    Ok(Box::new(gpio))
}

fn init_logging(level: &str, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "tally-gw.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .with(file_layer)
        .init();

    Ok(guard)
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    info!("Shutdown signal received");
}
