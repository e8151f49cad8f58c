//! Live iRacing source using the iracing.rs library
//!
//! Connects to the simulator's shared memory through `iracing::telemetry` and
//! copies the pedal variables out of every sample. Only available on Windows;
//! on other platforms the source is never detected.

use anyhow::Result;
use pedal_core::normalizer::fields;
use pedal_core::session::SessionMetadata;
use pedal_core::source::{FieldError, FieldMap, FieldReader, FieldValue, SampleSource, SourceEvent};
use tracing::{debug, info};

/// Consecutive empty polls after which the simulator is considered gone
/// (about two seconds at 60 Hz)
pub const STALE_AFTER_POLLS: u32 = 120;

/// How a live variable is converted into a [`FieldValue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveKind {
    Float,
    Double,
    Int,
    Bool,
}

/// Variables copied out of every live sample
pub const LIVE_FIELDS: &[(&str, LiveKind)] = &[
    (fields::THROTTLE, LiveKind::Float),
    (fields::BRAKE, LiveKind::Float),
    (fields::ABS_ACTIVE, LiveKind::Bool),
    (fields::ABS_ACTIVE_LEGACY, LiveKind::Bool),
    (fields::ABS_CUT_PCT, LiveKind::Float),
    (fields::LAST_LAP_TIME, LiveKind::Float),
    (fields::BEST_LAP_TIME, LiveKind::Float),
    (fields::DELTA_TO_BEST, LiveKind::Float),
    (fields::DELTA_TO_BEST_OK, LiveKind::Bool),
    (fields::INCIDENT_COUNT, LiveKind::Int),
    (fields::TIME_REMAINING, LiveKind::Double),
    (fields::IS_ON_TRACK, LiveKind::Bool),
    (fields::ON_PIT_ROAD, LiveKind::Bool),
    (fields::TRACK_SURFACE, LiveKind::Int),
];

/// An open telemetry connection
trait LiveLink: Send {
    /// The next published sample, already copied into a [`FieldMap`]
    fn next_sample(&mut self) -> Option<FieldMap>;

    fn session_metadata(&mut self) -> Result<SessionMetadata>;
}

#[cfg(target_os = "windows")]
mod windows_impl {
    use super::{LiveKind, LiveLink, LIVE_FIELDS};
    use anyhow::{anyhow, Result};
    use ::iracing::telemetry::{Blocking, Connection, Sample as IRacingSample};
    use pedal_core::session::{RosterEntry, SessionMetadata};
    use pedal_core::source::{FieldMap, FieldValue};
    use std::convert::TryInto;
    use std::time::Duration;

    pub struct Link {
        connection: Connection,
        blocking: Blocking,
    }

    // SAFETY: iRacing's shared memory is only ever read. The Connection and
    // Blocking types hold raw pointers into the mapped file, which stays
    // mapped until they are dropped.
    unsafe impl Send for Link {}

    impl Link {
        pub fn open() -> Result<Self> {
            let connection = Connection::new()?;
            let blocking = connection.blocking()?;
            Ok(Self {
                connection,
                blocking,
            })
        }
    }

    pub fn available() -> bool {
        Connection::new().is_ok()
    }

    fn read_live(sample: &IRacingSample, name: &'static str, kind: LiveKind) -> Option<FieldValue> {
        let get_f32 = || -> Option<f32> { sample.get(name).ok().and_then(|v| v.try_into().ok()) };
        let get_f64 = || -> Option<f64> { sample.get(name).ok().and_then(|v| v.try_into().ok()) };

        match kind {
            LiveKind::Float => get_f32()
                .or_else(|| get_f64().map(|v| v as f32))
                .map(FieldValue::Float),
            LiveKind::Double => get_f64()
                .or_else(|| get_f32().map(f64::from))
                .map(FieldValue::Double),
            LiveKind::Int => {
                let value: Option<i32> = sample.get(name).ok().and_then(|v| v.try_into().ok());
                value.map(FieldValue::Int)
            }
            LiveKind::Bool => {
                let value: Option<bool> = sample.get(name).ok().and_then(|v| v.try_into().ok());
                value.map(FieldValue::Bool)
            }
        }
    }

    impl LiveLink for Link {
        fn next_sample(&mut self) -> Option<FieldMap> {
            // Short timeout so the sampling loop never stalls on the simulator
            let sample = self.blocking.sample(Duration::from_millis(1)).ok()?;

            let map = LIVE_FIELDS
                .iter()
                .filter_map(|&(name, kind)| {
                    read_live(&sample, name, kind).map(|value| (name.to_string(), value))
                })
                .collect();
            Some(map)
        }

        fn session_metadata(&mut self) -> Result<SessionMetadata> {
            let details = self
                .connection
                .session_info()
                .map_err(|e| anyhow!("Failed to read session info: {}", e))?;

            let roster = details
                .drivers
                .drivers
                .iter()
                .map(|d| RosterEntry {
                    user_name: d.user_name.clone(),
                    irating: d.irating as i32,
                    is_pace_car: d.car_is_pace_car as i64 != 0,
                    is_spectator: d.is_spectator as i64 != 0,
                })
                .collect();

            Ok(SessionMetadata {
                incident_limit: Some(details.weekend.options.incident_limit.to_string()),
                roster,
            })
        }
    }
}

#[cfg(target_os = "windows")]
fn open_link() -> Result<Box<dyn LiveLink>> {
    Ok(Box::new(windows_impl::Link::open()?))
}

#[cfg(target_os = "windows")]
fn link_available() -> bool {
    windows_impl::available()
}

// Stubs for non-Windows platforms
#[cfg(not(target_os = "windows"))]
fn open_link() -> Result<Box<dyn LiveLink>> {
    anyhow::bail!("iRacing source only available on Windows")
}

#[cfg(not(target_os = "windows"))]
fn link_available() -> bool {
    false
}

/// Live source over the simulator's telemetry connection
pub struct IRacingSource {
    link: Option<Box<dyn LiveLink>>,
    frame: Option<FieldMap>,
    announced: bool,
    idle_polls: u32,
    metadata: Option<SessionMetadata>,
}

impl IRacingSource {
    pub fn new() -> Self {
        Self {
            link: None,
            frame: None,
            announced: false,
            idle_polls: 0,
            metadata: None,
        }
    }

    fn attach(&mut self, link: Box<dyn LiveLink>) {
        self.reset_session();
        self.link = Some(link);
    }

    fn reset_session(&mut self) {
        self.frame = None;
        self.announced = false;
        self.idle_polls = 0;
        self.metadata = None;
    }
}

impl Default for IRacingSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldReader for IRacingSource {
    fn get_field(&self, name: &str) -> Result<FieldValue, FieldError> {
        self.frame
            .as_ref()
            .ok_or(FieldError::NotConnected)?
            .get_field(name)
    }
}

impl SampleSource for IRacingSource {
    fn name(&self) -> &str {
        "iRacing"
    }

    fn detect(&self) -> bool {
        // Opening the connection succeeds only while the simulator runs
        link_available()
    }

    fn connect(&mut self) -> Result<()> {
        self.attach(open_link()?);
        info!("Connected to iRacing telemetry");
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        self.link = None;
        self.reset_session();
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<SourceEvent>> {
        let Some(link) = self.link.as_mut() else {
            return Ok(None);
        };

        if !self.announced {
            self.announced = true;
            return Ok(Some(SourceEvent::Connected));
        }

        if self.metadata.is_none() {
            match link.session_metadata() {
                Ok(metadata) => {
                    debug!(drivers = metadata.roster.len(), "Session info read");
                    self.metadata = Some(metadata);
                }
                Err(e) => debug!("Session info not available yet: {}", e),
            }
        }

        match link.next_sample() {
            Some(frame) => {
                self.idle_polls = 0;
                self.frame = Some(frame);
                Ok(Some(SourceEvent::FrameReady))
            }
            None => {
                self.idle_polls += 1;
                if self.idle_polls < STALE_AFTER_POLLS {
                    return Ok(None);
                }
                info!(polls = self.idle_polls, "iRacing stopped publishing samples");
                self.reset_session();
                Ok(Some(SourceEvent::Disconnected))
            }
        }
    }

    fn session_metadata(&self) -> Option<SessionMetadata> {
        self.metadata.clone()
    }

    fn is_connected(&self) -> bool {
        self.link.is_some()
    }
}
