//! Scripted source
//!
//! Plays a fixed queue of lifecycle steps and frames. Used to drive the
//! pipeline deterministically from tests and to reproduce captured sequences.

use anyhow::Result;
use pedal_core::normalizer::fields;
use pedal_core::session::SessionMetadata;
use pedal_core::source::{FieldError, FieldMap, FieldReader, FieldValue, SampleSource, SourceEvent};
use std::collections::VecDeque;

/// One entry of a script
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Connect,
    Frame(FieldMap),
    /// A poll that finds nothing new
    Idle,
    Disconnect,
}

/// A complete on-track frame with the given pedal inputs
pub fn pedal_frame(throttle: f32, brake: f32, abs: bool) -> FieldMap {
    FieldMap::new()
        .with(fields::THROTTLE, FieldValue::Float(throttle))
        .with(fields::BRAKE, FieldValue::Float(brake))
        .with(fields::ABS_ACTIVE, FieldValue::Bool(abs))
        .with(fields::LAST_LAP_TIME, FieldValue::Float(0.0))
        .with(fields::BEST_LAP_TIME, FieldValue::Float(0.0))
        .with(fields::DELTA_TO_BEST, FieldValue::Float(0.0))
        .with(fields::DELTA_TO_BEST_OK, FieldValue::Bool(false))
        .with(fields::INCIDENT_COUNT, FieldValue::Int(0))
        .with(fields::TIME_REMAINING, FieldValue::Double(0.0))
        .with(fields::IS_ON_TRACK, FieldValue::Bool(true))
        .with(fields::ON_PIT_ROAD, FieldValue::Bool(false))
        .with(fields::TRACK_SURFACE, FieldValue::Int(3))
}

pub struct ScriptedSource {
    name: String,
    steps: VecDeque<Step>,
    current: Option<FieldMap>,
    metadata: Option<SessionMetadata>,
    active: bool,
}

impl ScriptedSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: VecDeque::new(),
            current: None,
            metadata: None,
            active: false,
        }
    }

    pub fn with_metadata(mut self, metadata: SessionMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn then(mut self, step: Step) -> Self {
        self.steps.push_back(step);
        self
    }

    pub fn then_connect(self) -> Self {
        self.then(Step::Connect)
    }

    pub fn then_frame(self, frame: FieldMap) -> Self {
        self.then(Step::Frame(frame))
    }

    pub fn then_frames(mut self, frames: impl IntoIterator<Item = FieldMap>) -> Self {
        self.steps.extend(frames.into_iter().map(Step::Frame));
        self
    }

    pub fn then_idle(mut self, polls: usize) -> Self {
        self.steps.extend(std::iter::repeat(Step::Idle).take(polls));
        self
    }

    pub fn then_disconnect(self) -> Self {
        self.then(Step::Disconnect)
    }

    /// Steps not yet played
    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

impl FieldReader for ScriptedSource {
    fn get_field(&self, name: &str) -> Result<FieldValue, FieldError> {
        self.current
            .as_ref()
            .ok_or(FieldError::NotConnected)?
            .get_field(name)
    }
}

impl SampleSource for ScriptedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn detect(&self) -> bool {
        !self.steps.is_empty()
    }

    fn connect(&mut self) -> Result<()> {
        self.active = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        self.active = false;
        self.current = None;
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<SourceEvent>> {
        if !self.active {
            return Ok(None);
        }

        let event = match self.steps.pop_front() {
            Some(Step::Connect) => Some(SourceEvent::Connected),
            Some(Step::Frame(frame)) => {
                self.current = Some(frame);
                Some(SourceEvent::FrameReady)
            }
            Some(Step::Disconnect) => {
                self.current = None;
                Some(SourceEvent::Disconnected)
            }
            Some(Step::Idle) | None => None,
        };
        Ok(event)
    }

    fn session_metadata(&self) -> Option<SessionMetadata> {
        if self.active {
            self.metadata.clone()
        } else {
            None
        }
    }

    fn is_connected(&self) -> bool {
        self.active
    }
}
