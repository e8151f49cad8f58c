//! PedalTelemetry host
//!
//! Runs the sampling loop and the chart view until Ctrl-C.
//!
//! Usage: `pedal-host [config.json]`

use anyhow::Result;
use pedal_host::config::HostConfig;
use pedal_host::view::ChartView;
use pedal_host::{channel, manager, view};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = HostConfig::load(config_path.as_deref())?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .init();

    info!("Starting PedalTelemetry host");
    info!(source = ?config.source, poll_hz = config.poll_hz, "Configuration loaded");

    let cancel = CancellationToken::new();
    let (sink, rx) = channel::event_channel(config.channel_capacity, cancel.clone());

    let source = manager::build_source(&config.source);
    let sampler = tokio::spawn(manager::run(
        source,
        sink,
        manager::ManagerSettings::from(&config),
        cancel.clone(),
    ));

    let chart = ChartView::new(config.chart_width, config.chart_height);
    let redraw = tokio::spawn(view::run(
        chart,
        rx,
        config.redraw_interval(),
        cancel.clone(),
    ));

    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received, shutting down");
    cancel.cancel();

    let report = sampler.await?;
    let chart = redraw.await?;
    info!(
        accepted = report.accepted_frames,
        dropped = report.dropped_frames,
        channel_drops = report.sink.dropped(),
        charted = chart.frames_applied(),
        "Stopped"
    );

    Ok(())
}
