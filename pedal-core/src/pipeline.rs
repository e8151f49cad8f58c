//! Ingest pipeline
//!
//! Wires a [`SampleSource`]'s lifecycle events through the session
//! aggregator, the state classifier and the normalizer, and publishes the
//! results to an [`EventSink`]. One pipeline serves one source; all calls
//! come from the sampling loop, so there is exactly one producer per sink.

use crate::classifier::StateClassifier;
use crate::model::{ConnectionState, FrameUpdate, SessionFacts, TelemetryEvent};
use crate::normalizer;
use crate::session::SessionAggregator;
use crate::source::{SampleSource, SourceEvent};
use chrono::Utc;
use tracing::{info, trace};

/// Receives the pipeline's notifications
pub trait EventSink {
    fn emit(&mut self, event: TelemetryEvent);
}

impl EventSink for Vec<TelemetryEvent> {
    fn emit(&mut self, event: TelemetryEvent) {
        self.push(event);
    }
}

/// What happened to a single source event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A lifecycle event was applied
    Lifecycle,
    /// The frame was normalized and published
    Accepted,
    /// A mandatory field could not be read; nothing was published
    Dropped,
}

/// Per-source ingest state
#[derive(Debug, Default)]
pub struct Pipeline {
    classifier: StateClassifier,
    session: SessionAggregator,
    accepted: u64,
    dropped: u64,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.classifier.current()
    }

    pub fn facts(&self) -> SessionFacts {
        self.session.facts()
    }

    pub fn accepted_frames(&self) -> u64 {
        self.accepted
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped
    }

    /// Dispatch one event reported by `source.poll()`
    pub fn handle<S>(&mut self, event: SourceEvent, source: &S, sink: &mut dyn EventSink) -> Outcome
    where
        S: SampleSource + ?Sized,
    {
        match event {
            SourceEvent::Connected => {
                self.on_connected(source.name(), sink);
                Outcome::Lifecycle
            }
            SourceEvent::Disconnected => {
                self.on_disconnected(source.name(), sink);
                Outcome::Lifecycle
            }
            SourceEvent::FrameReady => self.on_frame(source, sink),
        }
    }

    pub fn on_connected(&mut self, source: &str, sink: &mut dyn EventSink) {
        info!("Source {} connected", source);
        self.session.on_connected();
        if let Some(state) = self.classifier.on_connected() {
            sink.emit(TelemetryEvent::StateChanged { state });
        }
    }

    pub fn on_disconnected(&mut self, source: &str, sink: &mut dyn EventSink) {
        info!(
            accepted = self.accepted,
            dropped = self.dropped,
            "Source {} disconnected",
            source
        );
        self.session.on_disconnected();
        if let Some(state) = self.classifier.on_disconnected() {
            sink.emit(TelemetryEvent::StateChanged { state });
        }
    }

    /// Normalize the current frame and publish it.
    ///
    /// Every mandatory read happens before any state is touched, so a failed
    /// read leaves the classifier, the aggregator and the sink untouched.
    pub fn on_frame<S>(&mut self, source: &S, sink: &mut dyn EventSink) -> Outcome
    where
        S: SampleSource + ?Sized,
    {
        let frame = match normalizer::normalize(source) {
            Ok(frame) => frame,
            Err(e) => {
                self.dropped += 1;
                trace!("Dropping frame from {}: {}", source.name(), e);
                return Outcome::Dropped;
            }
        };

        let facts = self.session.ensure_parsed(|| source.session_metadata());

        if let Some(state) = self.classifier.on_frame(frame.flags) {
            sink.emit(TelemetryEvent::StateChanged { state });
        }

        self.accepted += 1;
        sink.emit(TelemetryEvent::Frame(FrameUpdate {
            captured_at: Utc::now(),
            sample: frame.sample,
            state: self.classifier.current(),
            facts,
        }));

        Outcome::Accepted
    }
}
