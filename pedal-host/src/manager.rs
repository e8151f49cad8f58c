//! Source lifecycle manager
//!
//! This module handles:
//! - Polling the source for simulator detection while disconnected
//! - Connecting and disconnecting the source
//! - Driving each polled event through the ingest pipeline
//! - Handing the results to the chart view's channel

use crate::config::{HostConfig, SourceConfig};
use pedal_adapters::{DemoSource, IRacingSource, IbtReplaySource};
use pedal_core::{EventSink, Pipeline, SampleSource, SourceEvent};
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Loop timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerSettings {
    pub poll_interval: Duration,
    pub detect_interval: Duration,
}

impl From<&HostConfig> for ManagerSettings {
    fn from(config: &HostConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            detect_interval: config.detect_interval(),
        }
    }
}

/// Handed back when the loop stops
pub struct ManagerReport<K> {
    pub source: Box<dyn SampleSource>,
    pub sink: K,
    pub accepted_frames: u64,
    pub dropped_frames: u64,
}

pub fn build_source(config: &SourceConfig) -> Box<dyn SampleSource> {
    match config {
        SourceConfig::Demo => Box::new(DemoSource::new()),
        SourceConfig::Iracing => Box::new(IRacingSource::new()),
        SourceConfig::Replay { path } => Box::new(IbtReplaySource::new(path.clone())),
    }
}

/// Main sampling loop. Runs until `cancel` fires.
pub async fn run<K>(
    mut source: Box<dyn SampleSource>,
    mut sink: K,
    settings: ManagerSettings,
    cancel: CancellationToken,
) -> ManagerReport<K>
where
    K: EventSink + Send,
{
    info!("Sample manager started for {}", source.name());

    let mut pipeline = Pipeline::new();
    let mut last_detect: Option<Instant> = None;
    let mut ticker = tokio::time::interval(settings.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if !source.is_connected() {
            detection_cycle(source.as_mut(), &mut last_detect, settings.detect_interval);
        }

        if source.is_connected() {
            poll_cycle(source.as_mut(), &mut pipeline, &mut sink);
        }
    }

    if source.is_connected() {
        info!("Shutting down, disconnecting {}", source.name());
        if let Err(e) = source.disconnect() {
            error!("Error disconnecting {}: {}", source.name(), e);
        }
        pipeline.on_disconnected(source.name(), &mut sink);
    }

    info!(
        accepted = pipeline.accepted_frames(),
        dropped = pipeline.dropped_frames(),
        "Sample manager stopped"
    );

    ManagerReport {
        accepted_frames: pipeline.accepted_frames(),
        dropped_frames: pipeline.dropped_frames(),
        source,
        sink,
    }
}

/// Look for the simulator, at most once per `interval`
fn detection_cycle(
    source: &mut dyn SampleSource,
    last_detect: &mut Option<Instant>,
    interval: Duration,
) {
    if let Some(last) = *last_detect {
        if last.elapsed() < interval {
            return;
        }
    }
    *last_detect = Some(Instant::now());

    if !source.detect() {
        return;
    }

    info!("{} detected, connecting", source.name());
    match source.connect() {
        Ok(()) => info!("Source {} connected successfully", source.name()),
        Err(e) => error!("Failed to connect {}: {}", source.name(), e),
    }
}

/// Poll the source once and feed the result through the pipeline
fn poll_cycle(source: &mut dyn SampleSource, pipeline: &mut Pipeline, sink: &mut dyn EventSink) {
    match source.poll() {
        Ok(Some(event)) => {
            pipeline.handle(event, &*source, sink);
            if event == SourceEvent::Disconnected {
                if let Err(e) = source.disconnect() {
                    error!("Error disconnecting {}: {}", source.name(), e);
                }
            }
        }
        Ok(None) => {
            // Nothing new this tick
        }
        Err(e) => {
            warn!("Error polling {}: {}", source.name(), e);
            if let Err(e) = source.disconnect() {
                debug!("Error disconnecting {} after poll failure: {}", source.name(), e);
            }
            pipeline.on_disconnected(source.name(), sink);
        }
    }
}
