//! Sample source contract
//!
//! A source is a pull-based accessor for the named fields of the simulator's
//! current frame, plus connect/disconnect lifecycle and a session metadata
//! snapshot. Field reads may fail one at a time without failing the frame.

use crate::session::SessionMetadata;
use anyhow::Result;
use std::collections::HashMap;
use thiserror::Error;

/// A scalar value read from the live feed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int(i32),
    BitField(u32),
    Float(f32),
    Double(f64),
}

impl FieldValue {
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Double(v) => Some(*v as f32),
            FieldValue::Int(v) => Some(*v as f32),
            FieldValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            FieldValue::BitField(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Double(v) => Some(*v),
            FieldValue::Float(v) => Some(*v as f64),
            FieldValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            FieldValue::Int(v) => Some(*v),
            FieldValue::BitField(v) => Some(*v as i32),
            FieldValue::Float(v) => Some(*v as i32),
            FieldValue::Bool(v) => Some(if *v { 1 } else { 0 }),
            FieldValue::Double(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(v) => Some(*v),
            FieldValue::Int(v) => Some(*v != 0),
            _ => None,
        }
    }
}

/// Why a single field could not be read
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("field {0} is not present in this frame")]
    Missing(String),

    #[error("field {name} cannot be read as {expected}")]
    TypeMismatch { name: String, expected: &'static str },

    #[error("source is not connected")]
    NotConnected,
}

/// Per-field access to the current frame
pub trait FieldReader {
    /// Read the raw value of a named field
    fn get_field(&self, name: &str) -> Result<FieldValue, FieldError>;

    fn read_f32(&self, name: &str) -> Result<f32, FieldError> {
        self.get_field(name)?
            .as_f32()
            .ok_or_else(|| mismatch(name, "f32"))
    }

    fn read_i32(&self, name: &str) -> Result<i32, FieldError> {
        self.get_field(name)?
            .as_i32()
            .ok_or_else(|| mismatch(name, "i32"))
    }

    fn read_bool(&self, name: &str) -> Result<bool, FieldError> {
        self.get_field(name)?
            .as_bool()
            .ok_or_else(|| mismatch(name, "bool"))
    }
}

fn mismatch(name: &str, expected: &'static str) -> FieldError {
    FieldError::TypeMismatch {
        name: name.to_string(),
        expected,
    }
}

/// Lifecycle notifications produced by [`SampleSource::poll`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEvent {
    /// The simulator became reachable
    Connected,
    /// The simulator went away
    Disconnected,
    /// A new frame is readable through [`FieldReader`]
    FrameReady,
}

/// Trait for simulator-specific sample sources
///
/// Each source is responsible for:
/// - Detecting whether its simulator (or file) is available
/// - Reporting connect / disconnect / frame-ready events
/// - Exposing the current frame's fields by name
pub trait SampleSource: FieldReader + Send {
    /// Get the name of this source (e.g., "iRacing", "Demo")
    fn name(&self) -> &str;

    /// Check if the simulator is currently reachable
    ///
    /// This should be a lightweight check (e.g., shared memory existence)
    fn detect(&self) -> bool;

    /// Start the source. A `Connected` event follows from `poll` once the
    /// simulator answers.
    fn connect(&mut self) -> Result<()>;

    /// Stop the source and release resources. Safe to call at any time.
    fn disconnect(&mut self) -> Result<()>;

    /// Poll for the next lifecycle event
    ///
    /// Returns:
    /// - `Ok(Some(event))` when something happened
    /// - `Ok(None)` if no new data (non-blocking)
    /// - `Err(_)` if the source failed
    fn poll(&mut self) -> Result<Option<SourceEvent>>;

    /// Session metadata snapshot, available once connected
    fn session_metadata(&self) -> Option<SessionMetadata>;

    /// Whether `connect` has been called without a matching `disconnect`
    fn is_connected(&self) -> bool;
}

/// Owned snapshot of one frame's fields, keyed by name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap {
    fields: HashMap<String, FieldValue>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: FieldValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: FieldValue) {
        self.fields.insert(name.to_string(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.remove(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, FieldValue)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl FieldReader for FieldMap {
    fn get_field(&self, name: &str) -> Result<FieldValue, FieldError> {
        self.fields
            .get(name)
            .copied()
            .ok_or_else(|| FieldError::Missing(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_conversions() {
        assert_eq!(FieldValue::Float(1.5).as_f32(), Some(1.5));
        assert_eq!(FieldValue::Double(2.5).as_f64(), Some(2.5));
        assert_eq!(FieldValue::Int(42).as_i32(), Some(42));
        assert_eq!(FieldValue::Int(-1).as_i32(), Some(-1));
        assert_eq!(FieldValue::Bool(true).as_bool(), Some(true));
        assert_eq!(FieldValue::Int(0).as_bool(), Some(false));
        assert_eq!(FieldValue::Float(1.0).as_bool(), None);
    }

    #[test]
    fn test_field_map_missing_field() {
        let map = FieldMap::new().with("Throttle", FieldValue::Float(0.5));
        assert_eq!(map.read_f32("Throttle"), Ok(0.5));
        assert_eq!(
            map.read_f32("Brake"),
            Err(FieldError::Missing("Brake".to_string()))
        );
    }

    #[test]
    fn test_field_map_type_mismatch() {
        let map = FieldMap::new().with("IsOnTrack", FieldValue::Float(1.0));
        assert!(matches!(
            map.read_bool("IsOnTrack"),
            Err(FieldError::TypeMismatch { expected: "bool", .. })
        ));
    }

    #[test]
    fn test_field_map_from_iter() {
        let map: FieldMap = vec![
            ("Brake".to_string(), FieldValue::Float(0.2)),
            ("Gear".to_string(), FieldValue::Int(3)),
        ]
        .into_iter()
        .collect();
        assert_eq!(map.len(), 2);
        assert_eq!(map.read_i32("Gear"), Ok(3));
    }
}
