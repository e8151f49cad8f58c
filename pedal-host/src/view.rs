//! Chart view
//!
//! Owns the pedal history and consumes events from the sampling loop. All
//! mutation happens on the redraw task; the sampling loop only ever talks to
//! the channel.

use chrono::{Duration as ChronoDuration, Utc};
use pedal_core::display::{self, Label};
use pedal_core::{
    ChartFrame, ChartRenderer, ConnectionState, FrameUpdate, Palette, PedalHistory,
    TelemetryEvent,
};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::channel::EventReceiver;

/// Text shown next to the chart
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub status: Label,
    pub throttle_pct: u8,
    pub brake_pct: u8,
    pub abs_active: bool,
    pub last_lap: String,
    pub best_lap: String,
    pub delta: Label,
    pub incidents: String,
    pub strength_of_field: String,
    pub time_remaining: String,
}

pub struct ChartView {
    history: PedalHistory,
    renderer: ChartRenderer,
    width: f32,
    height: f32,
    state: ConnectionState,
    latest: Option<FrameUpdate>,
    frames_applied: u64,
    max_latency: ChronoDuration,
}

impl ChartView {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            history: PedalHistory::new(),
            renderer: ChartRenderer::new(Palette::default()),
            width,
            height,
            state: ConnectionState::Disconnected,
            latest: None,
            frames_applied: 0,
            max_latency: ChronoDuration::zero(),
        }
    }

    pub fn history(&self) -> &PedalHistory {
        &self.history
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn latest(&self) -> Option<&FrameUpdate> {
        self.latest.as_ref()
    }

    pub fn frames_applied(&self) -> u64 {
        self.frames_applied
    }

    /// Worst capture-to-apply delay seen so far
    pub fn max_latency(&self) -> ChronoDuration {
        self.max_latency
    }

    pub fn apply(&mut self, event: TelemetryEvent) {
        match event {
            TelemetryEvent::StateChanged { state } => {
                info!("Status: {}", display::status(state).text);
                self.state = state;
                if state == ConnectionState::Disconnected {
                    self.history.clear();
                    self.latest = None;
                }
            }
            TelemetryEvent::Frame(update) => {
                let latency = Utc::now() - update.captured_at;
                if latency > self.max_latency {
                    self.max_latency = latency;
                }
                self.history.push_sample(&update.sample);
                self.state = update.state;
                self.frames_applied += 1;
                self.latest = Some(update);
            }
        }
    }

    /// Apply everything queued without waiting. Returns the number of events.
    pub fn drain(&mut self, rx: &mut EventReceiver) -> usize {
        let mut applied = 0;
        while let Some(event) = rx.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    pub fn render(&self) -> Option<ChartFrame> {
        self.renderer.render(&self.history, self.width, self.height)
    }

    /// `None` until the first frame arrives
    pub fn overlay(&self) -> Option<Overlay> {
        let update = self.latest.as_ref()?;
        let sample = &update.sample;
        Some(Overlay {
            status: display::status(self.state),
            throttle_pct: display::bar_percent(sample.throttle),
            brake_pct: display::bar_percent(sample.brake),
            abs_active: sample.abs_active,
            last_lap: display::lap_time(sample.last_lap_time),
            best_lap: display::lap_time(sample.best_lap_time),
            delta: display::delta(sample),
            incidents: display::incidents(sample.incident_count, &update.facts),
            strength_of_field: display::strength_of_field(&update.facts),
            time_remaining: display::time_remaining(sample),
        })
    }
}

/// Redraw loop. Runs until `cancel` fires, then hands the view back.
/// Events still queued at that point are discarded.
pub async fn run(
    mut view: ChartView,
    mut rx: EventReceiver,
    redraw_interval: Duration,
    cancel: CancellationToken,
) -> ChartView {
    let mut ticker = tokio::time::interval(redraw_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let overlay_every = (Duration::from_secs(1).as_secs_f64() / redraw_interval.as_secs_f64())
        .ceil()
        .max(1.0) as u64;
    let mut redraws: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        view.drain(&mut rx);

        if let Some(frame) = view.render() {
            trace!(
                vertices = frame.vertex_count(),
                segments = frame.brake.len(),
                "Chart redrawn"
            );
        }

        redraws += 1;
        if redraws % overlay_every == 0 {
            if let Some(overlay) = view.overlay() {
                debug!(
                    status = %overlay.status.text,
                    throttle = overlay.throttle_pct,
                    brake = overlay.brake_pct,
                    abs = overlay.abs_active,
                    last = %overlay.last_lap,
                    best = %overlay.best_lap,
                    delta = %overlay.delta.text,
                    incidents = %overlay.incidents,
                    sof = %overlay.strength_of_field,
                    remaining = %overlay.time_remaining,
                    max_latency_ms = view.max_latency().num_milliseconds(),
                    "Overlay"
                );
            }
        }
    }

    rx.close();
    info!(frames = view.frames_applied(), "Chart view stopped");
    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::event_channel;
    use pedal_core::display::Tone;
    use pedal_core::EventSink;
    use pedal_core::units::{Percentage, Seconds};
    use pedal_core::{SessionFacts, TelemetrySample};

    fn update(throttle: f32, brake: f32, abs: bool) -> TelemetryEvent {
        TelemetryEvent::Frame(FrameUpdate {
            captured_at: Utc::now(),
            sample: TelemetrySample {
                throttle: Percentage::new(throttle),
                brake: Percentage::new(brake),
                abs_active: abs,
                last_lap_time: Seconds(91.5),
                best_lap_time: Seconds(90.25),
                delta_to_best: Seconds(-0.25),
                delta_valid: true,
                incident_count: 3,
                time_remaining: Seconds(125.0),
            },
            state: ConnectionState::OnTrack,
            facts: SessionFacts {
                max_incidents: 17,
                strength_of_field: 2240,
            },
        })
    }

    #[test]
    fn test_frames_fill_history() {
        let mut view = ChartView::new(300.0, 100.0);
        assert!(!view.render().unwrap().has_traces());

        view.apply(update(1.0, 0.0, false));
        view.apply(update(0.0, 0.5, true));

        assert_eq!(view.history().len(), 2);
        assert_eq!(view.state(), ConnectionState::OnTrack);
        assert_eq!(view.frames_applied(), 2);
        let frame = view.render().expect("non-empty surface renders");
        assert!(frame.has_traces());
    }

    #[test]
    fn test_disconnect_clears_history() {
        let mut view = ChartView::new(300.0, 100.0);
        view.apply(update(1.0, 0.0, false));
        view.apply(TelemetryEvent::StateChanged {
            state: ConnectionState::Disconnected,
        });

        assert!(view.history().is_empty());
        assert!(view.latest().is_none());
        assert!(view.overlay().is_none());
        assert_eq!(view.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_state_change_without_disconnect_keeps_history() {
        let mut view = ChartView::new(300.0, 100.0);
        view.apply(update(1.0, 0.0, false));
        view.apply(TelemetryEvent::StateChanged {
            state: ConnectionState::InPit,
        });
        assert_eq!(view.history().len(), 1);
        assert_eq!(view.state(), ConnectionState::InPit);
    }

    #[test]
    fn test_overlay_text() {
        let mut view = ChartView::new(300.0, 100.0);
        view.apply(update(0.5, 0.25, true));

        let overlay = view.overlay().expect("overlay after first frame");
        assert_eq!(overlay.status.text, "On Track");
        assert_eq!(overlay.throttle_pct, 50);
        assert_eq!(overlay.brake_pct, 25);
        assert!(overlay.abs_active);
        assert_eq!(overlay.last_lap, "1:31.500");
        assert_eq!(overlay.best_lap, "1:30.250");
        assert_eq!(overlay.delta.text, "-0.250");
        assert_eq!(overlay.delta.tone, Tone::Ahead);
        assert_eq!(overlay.incidents, "x 3/17");
        assert_eq!(overlay.strength_of_field, "SOF 2240");
        assert_eq!(overlay.time_remaining, "02:05");
    }

    #[test]
    fn test_drain_applies_queued_events() {
        let (mut sink, mut rx) = event_channel(8, CancellationToken::new());
        sink.emit(update(1.0, 0.0, false));
        sink.emit(update(0.8, 0.1, false));

        let mut view = ChartView::new(300.0, 100.0);
        assert_eq!(view.drain(&mut rx), 2);
        assert_eq!(view.drain(&mut rx), 0);
        assert_eq!(view.history().len(), 2);
    }

    #[test]
    fn test_disconnect_behind_full_queue_still_clears_history() {
        let (mut sink, mut rx) = event_channel(1, CancellationToken::new());
        let mut view = ChartView::new(300.0, 100.0);
        view.apply(update(1.0, 0.0, false));

        sink.emit(update(0.5, 0.0, false));
        sink.emit(update(0.2, 0.0, false));
        sink.emit(TelemetryEvent::StateChanged {
            state: ConnectionState::Disconnected,
        });
        assert_eq!(view.drain(&mut rx), 2);

        assert!(view.history().is_empty());
        assert_eq!(view.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_events_queued_at_shutdown_are_discarded() {
        let cancel = CancellationToken::new();
        let (mut sink, rx) = event_channel(8, cancel.clone());
        sink.emit(update(1.0, 0.0, false));
        sink.emit(update(0.5, 0.5, false));
        cancel.cancel();

        let view = run(
            ChartView::new(300.0, 100.0),
            rx,
            Duration::from_secs(3600),
            cancel,
        )
        .await;

        assert_eq!(view.frames_applied(), 0);
        assert!(view.history().is_empty());
    }
}
