//! LoRa sensor-network master station daemon

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use common::service_bootstrap::{self, ServiceInfo};
use lorasrv::channel::{ChannelLink, SerialModemLink, SimProfile, SimulatedLink};
use lorasrv::config::{ChannelMode, ServiceConfig};
use lorasrv::error::{LoraSrvError, Result};
use lorasrv::poll::PollEngine;
use lorasrv::sink::{ConsoleSink, CsvSink, FanoutSink};
use lorasrv::runtime;

#[derive(Parser, Debug)]
#[command(name = "lorasrv", about = "LoRa sensor-network master station")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config/lorasrv.yaml", env = "LORASRV_CONFIG")]
    config: String,

    /// Validate the configuration and exit
    #[arg(long)]
    validate: bool,

    /// Console log level (overrides the configured one)
    #[arg(long)]
    log_level: Option<String>,

    /// Skip the startup banner
    #[arg(long)]
    no_banner: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ServiceConfig::load(&args.config)?;

    let service_info = ServiceInfo::new("lorasrv", "LoRa sensor-network master station");
    let level = args.log_level.as_deref().unwrap_or(&config.service.log_level);
    service_bootstrap::init_logging(
        &service_info,
        Some(level),
        config.service.log_dir.clone().map(Into::into),
    )?;
    if !args.no_banner {
        service_bootstrap::print_startup_banner(&service_info);
    }

    config.validate()?;
    if args.validate {
        info!("Configuration valid: {} nodes", config.nodes.len());
        return Ok(());
    }

    info!(
        "Configuration loaded from {}: {} nodes, poll every {}ms, timeout {}ms, {} tries per node",
        args.config,
        config.nodes.len(),
        config.polling.poll_interval_ms,
        config.polling.response_timeout_ms,
        config.polling.max_retries,
    );

    let engine = PollEngine::new(config.node_ids(), config.poll_policy());
    let link = build_link(&config)?;
    let sink = build_sinks(&config)?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        common::shutdown::wait_for_shutdown().await;
        info!("shutdown signal received");
        shutdown.cancel();
    });

    runtime::run(engine, link, sink, config.pass_interval(), cancel).await?;
    info!("lorasrv stopped");
    Ok(())
}

fn build_link(config: &ServiceConfig) -> Result<Box<dyn ChannelLink>> {
    match config.channel.mode {
        ChannelMode::Sim => {
            let profile = SimProfile {
                drop_rate: config.channel.sim.drop_rate,
                alert_rate: config.channel.sim.alert_rate,
                reply_delay: std::time::Duration::from_millis(config.channel.sim.reply_delay_ms),
            };
            Ok(Box::new(SimulatedLink::new(config.node_ids(), profile)))
        },
        ChannelMode::Serial => {
            let device = config
                .channel
                .serial
                .device
                .as_ref()
                .ok_or_else(|| LoraSrvError::config("serial device not configured"))?;
            Ok(Box::new(SerialModemLink::new(
                device.as_str(),
                config.channel.serial.baud_rate,
            )))
        },
    }
}

fn build_sinks(config: &ServiceConfig) -> Result<Box<dyn lorasrv::sink::Sink>> {
    let mut fanout = FanoutSink::new();
    if config.sinks.console {
        fanout.push(Box::new(ConsoleSink));
    }
    if config.sinks.csv.enabled {
        fanout.push(Box::new(CsvSink::create(&config.sinks.csv.path)?));
        info!("appending telemetry to {}", config.sinks.csv.path);
    }
    Ok(Box::new(fanout))
}
