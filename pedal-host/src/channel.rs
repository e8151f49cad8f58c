//! Event handoff between the sampling loop and the chart view
//!
//! A single ordered queue with a non-blocking producer: the sampling loop
//! never waits on the UI side. Only frames count against the capacity and
//! only frames are dropped when it is reached. State changes always go
//! through, so the view never misses a disconnect.

use pedal_core::{EventSink, TelemetryEvent};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Log every this many dropped frames after the first
const DROP_LOG_EVERY: u64 = 600;

/// [`EventSink`] feeding the chart view's queue
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<TelemetryEvent>,
    queued_frames: Arc<AtomicUsize>,
    capacity: usize,
    cancel: CancellationToken,
    sent: u64,
    dropped: u64,
}

impl ChannelSink {
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Frames lost to a full queue
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn drop_frame(&mut self) {
        self.dropped += 1;
        if self.dropped == 1 || self.dropped % DROP_LOG_EVERY == 0 {
            warn!(dropped = self.dropped, "Event queue full, dropping frames");
        }
    }
}

impl EventSink for ChannelSink {
    fn emit(&mut self, event: TelemetryEvent) {
        if self.cancel.is_cancelled() {
            return;
        }

        let is_frame = matches!(event, TelemetryEvent::Frame(_));
        if is_frame {
            if self.queued_frames.load(Ordering::Acquire) >= self.capacity {
                self.drop_frame();
                return;
            }
            self.queued_frames.fetch_add(1, Ordering::AcqRel);
        }

        match self.tx.send(event) {
            Ok(()) => self.sent += 1,
            Err(_) => {
                if is_frame {
                    self.queued_frames.fetch_sub(1, Ordering::AcqRel);
                }
                debug!("Event queue closed, discarding event");
            }
        }
    }
}

/// Receiving end of [`event_channel`]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<TelemetryEvent>,
    queued_frames: Arc<AtomicUsize>,
}

impl EventReceiver {
    /// Wait for the next event. `None` once the sink is gone and the queue is empty.
    pub async fn recv(&mut self) -> Option<TelemetryEvent> {
        let event = self.rx.recv().await?;
        Some(self.release(event))
    }

    /// Next queued event, without waiting
    pub fn try_recv(&mut self) -> Option<TelemetryEvent> {
        let event = self.rx.try_recv().ok()?;
        Some(self.release(event))
    }

    /// Stop accepting events. Anything already queued is discarded.
    pub fn close(&mut self) {
        self.rx.close();
        while let Ok(event) = self.rx.try_recv() {
            self.release(event);
        }
    }

    fn release(&self, event: TelemetryEvent) -> TelemetryEvent {
        if matches!(event, TelemetryEvent::Frame(_)) {
            self.queued_frames.fetch_sub(1, Ordering::AcqRel);
        }
        event
    }
}

/// Create the sink/receiver pair. At most `capacity` frames wait in the queue
/// at once. Events emitted after `cancel` fires are discarded.
pub fn event_channel(capacity: usize, cancel: CancellationToken) -> (ChannelSink, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let queued_frames = Arc::new(AtomicUsize::new(0));
    let sink = ChannelSink {
        tx,
        queued_frames: queued_frames.clone(),
        capacity,
        cancel,
        sent: 0,
        dropped: 0,
    };
    (sink, EventReceiver { rx, queued_frames })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pedal_core::units::{Percentage, Seconds};
    use pedal_core::{ConnectionState, FrameUpdate, SessionFacts, TelemetrySample};

    fn state(state: ConnectionState) -> TelemetryEvent {
        TelemetryEvent::StateChanged { state }
    }

    fn frame() -> TelemetryEvent {
        TelemetryEvent::Frame(FrameUpdate {
            captured_at: Utc::now(),
            sample: TelemetrySample {
                throttle: Percentage::new(1.0),
                brake: Percentage::new(0.0),
                abs_active: false,
                last_lap_time: Seconds(0.0),
                best_lap_time: Seconds(0.0),
                delta_to_best: Seconds(0.0),
                delta_valid: false,
                incident_count: 0,
                time_remaining: Seconds(0.0),
            },
            state: ConnectionState::OnTrack,
            facts: SessionFacts {
                max_incidents: -1,
                strength_of_field: 0,
            },
        })
    }

    #[test]
    fn test_full_queue_drops_frames_without_blocking() {
        let (mut sink, mut rx) = event_channel(2, CancellationToken::new());
        for _ in 0..5 {
            sink.emit(frame());
        }
        assert_eq!(sink.sent(), 2);
        assert_eq!(sink.dropped(), 3);
        assert!(rx.try_recv().is_some());
        assert!(rx.try_recv().is_some());
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn test_state_change_survives_full_queue() {
        let (mut sink, mut rx) = event_channel(1, CancellationToken::new());
        sink.emit(frame());
        sink.emit(frame());
        sink.emit(state(ConnectionState::Disconnected));

        assert_eq!(sink.sent(), 2);
        assert_eq!(sink.dropped(), 1);
        assert!(matches!(rx.try_recv(), Some(TelemetryEvent::Frame(_))));
        assert_eq!(rx.try_recv(), Some(state(ConnectionState::Disconnected)));
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn test_receiving_a_frame_frees_capacity() {
        let (mut sink, mut rx) = event_channel(1, CancellationToken::new());
        sink.emit(frame());
        assert!(rx.try_recv().is_some());
        sink.emit(frame());
        assert_eq!(sink.sent(), 2);
        assert_eq!(sink.dropped(), 0);
    }

    #[test]
    fn test_cancelled_sink_discards() {
        let cancel = CancellationToken::new();
        let (mut sink, mut rx) = event_channel(4, cancel.clone());
        cancel.cancel();
        sink.emit(state(ConnectionState::InMenu));
        assert_eq!(sink.sent(), 0);
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn test_closed_receiver_discards_queue_and_is_quiet() {
        let (mut sink, mut rx) = event_channel(4, CancellationToken::new());
        sink.emit(frame());
        rx.close();
        assert!(rx.try_recv().is_none());

        sink.emit(frame());
        assert_eq!(sink.sent(), 1);
        assert_eq!(sink.dropped(), 0);
    }
}
