//! Pedal telemetry data model
//!
//! Defines the per-frame [`TelemetrySample`], the 4-state [`ConnectionState`],
//! the once-per-session [`SessionFacts`] and the events handed to the UI side.

use crate::units::{Percentage, Seconds};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Remaining-time counters at or above this value are placeholders (7 days).
pub const TIME_REMAINING_SENTINEL: f32 = 604_800.0;

/// One normalized frame of pedal and timing telemetry
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Throttle input (0.0 to 1.0)
    pub throttle: Percentage,

    /// Brake input (0.0 to 1.0)
    pub brake: Percentage,

    /// Anti-lock braking is modulating the brake this frame
    pub abs_active: bool,

    /// Last lap time (<= 0 means no lap completed yet)
    pub last_lap_time: Seconds,

    /// Best lap time (<= 0 means no valid lap yet)
    pub best_lap_time: Seconds,

    /// Live delta to the best lap
    pub delta_to_best: Seconds,

    /// Whether `delta_to_best` carries data
    pub delta_valid: bool,

    /// Incidents accumulated by the player this session
    pub incident_count: i32,

    /// Session time remaining (<= 0 or >= 7 days means invalid)
    pub time_remaining: Seconds,
}

impl TelemetrySample {
    pub fn has_last_lap(&self) -> bool {
        self.last_lap_time.is_positive()
    }

    pub fn has_best_lap(&self) -> bool {
        self.best_lap_time.is_positive()
    }

    pub fn time_remaining_valid(&self) -> bool {
        self.time_remaining.is_positive() && self.time_remaining.0 < TIME_REMAINING_SENTINEL
    }

    /// The last lap is the best lap (within a millisecond)
    pub fn is_personal_best(&self) -> bool {
        self.has_last_lap()
            && self.has_best_lap()
            && (self.last_lap_time.0 - self.best_lap_time.0).abs() < 0.001
    }
}

/// Connection / track state of the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    InMenu,
    InPit,
    OnTrack,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::InMenu => "in menu",
            ConnectionState::InPit => "in pit",
            ConnectionState::OnTrack => "on track",
        };
        f.write_str(name)
    }
}

/// Static per-session facts parsed from the session metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFacts {
    /// Incident limit (-1 = unlimited)
    pub max_incidents: i32,

    /// Mean iRating of the field (0 = unknown)
    pub strength_of_field: i32,
}

impl SessionFacts {
    pub const UNLIMITED_INCIDENTS: i32 = -1;

    pub fn is_unlimited(&self) -> bool {
        self.max_incidents < 0
    }
}

impl Default for SessionFacts {
    fn default() -> Self {
        Self {
            max_incidents: Self::UNLIMITED_INCIDENTS,
            strength_of_field: 0,
        }
    }
}

/// Notification emitted once per accepted frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameUpdate {
    /// Wall-clock time the frame was accepted
    pub captured_at: DateTime<Utc>,
    pub sample: TelemetrySample,
    pub state: ConnectionState,
    pub facts: SessionFacts,
}

/// Everything the ingest side tells the UI side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryEvent {
    /// Edge-triggered: only fired when the state actually changes
    StateChanged { state: ConnectionState },
    Frame(FrameUpdate),
}
