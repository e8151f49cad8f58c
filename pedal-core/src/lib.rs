//! PedalTelemetry Core Library
//!
//! This crate provides the sample model, the source contract and the ingest
//! pipeline (session aggregator, state classifier, normalizer) plus the
//! rolling pedal history and the strip-chart geometry built from it.

pub mod classifier;
pub mod display;
pub mod history;
pub mod model;
pub mod normalizer;
pub mod pipeline;
pub mod render;
pub mod session;
pub mod source;
pub mod units;

pub use classifier::{StateClassifier, TrackFlags};
pub use history::{PedalHistory, PedalPoint, HISTORY_CAPACITY};
pub use model::{ConnectionState, FrameUpdate, SessionFacts, TelemetryEvent, TelemetrySample};
pub use pipeline::{EventSink, Outcome, Pipeline};
pub use render::{ChartFrame, ChartRenderer, Palette};
pub use session::{SessionAggregator, SessionMetadata};
pub use source::{FieldError, FieldMap, FieldReader, FieldValue, SampleSource, SourceEvent};
