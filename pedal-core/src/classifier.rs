//! Connection / track state machine
//!
//! Four states, no hysteresis. Frames are classified from three raw inputs;
//! connect and disconnect force a state. A change is reported only when the
//! new state differs from the previous one.

use crate::model::ConnectionState;
use tracing::debug;

/// Track surface reported when the car is not in the world
pub const SURFACE_NOT_IN_WORLD: i32 = -1;
/// Pit stall
pub const SURFACE_IN_PIT_STALL: i32 = 1;
/// Pit entry / approach lane
pub const SURFACE_APPROACHING_PITS: i32 = 2;

/// Raw per-frame inputs for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackFlags {
    pub is_on_track: bool,
    pub on_pit_road: bool,
    pub track_surface: i32,
}

impl TrackFlags {
    /// Map the raw flags to a state, independent of any history
    pub fn classify(&self) -> ConnectionState {
        if !self.is_on_track || self.track_surface == SURFACE_NOT_IN_WORLD {
            ConnectionState::InMenu
        } else if self.on_pit_road
            || self.track_surface == SURFACE_IN_PIT_STALL
            || self.track_surface == SURFACE_APPROACHING_PITS
        {
            ConnectionState::InPit
        } else {
            ConnectionState::OnTrack
        }
    }
}

/// Edge-triggered classifier holding the last known state
#[derive(Debug, Default)]
pub struct StateClassifier {
    current: ConnectionState,
}

impl StateClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> ConnectionState {
        self.current
    }

    /// Classify a frame. Returns `Some(state)` only on a transition.
    pub fn on_frame(&mut self, flags: TrackFlags) -> Option<ConnectionState> {
        self.transition(flags.classify())
    }

    /// The simulator answered: always `InMenu` until the first frame says otherwise
    pub fn on_connected(&mut self) -> Option<ConnectionState> {
        self.transition(ConnectionState::InMenu)
    }

    pub fn on_disconnected(&mut self) -> Option<ConnectionState> {
        self.transition(ConnectionState::Disconnected)
    }

    fn transition(&mut self, next: ConnectionState) -> Option<ConnectionState> {
        if next == self.current {
            return None;
        }
        debug!(from = %self.current, to = %next, "Connection state changed");
        self.current = next;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(is_on_track: bool, on_pit_road: bool, track_surface: i32) -> TrackFlags {
        TrackFlags {
            is_on_track,
            on_pit_road,
            track_surface,
        }
    }

    #[test]
    fn test_not_on_track_is_menu_regardless_of_prior_state() {
        for prior in [
            flags(true, false, 3),
            flags(true, true, 1),
            flags(false, false, 0),
        ] {
            let mut classifier = StateClassifier::new();
            classifier.on_connected();
            classifier.on_frame(prior);
            classifier.on_frame(flags(false, false, 0));
            assert_eq!(classifier.current(), ConnectionState::InMenu);
        }
    }

    #[test]
    fn test_classification_table() {
        assert_eq!(flags(false, false, 0).classify(), ConnectionState::InMenu);
        assert_eq!(flags(false, true, 3).classify(), ConnectionState::InMenu);
        assert_eq!(flags(true, false, -1).classify(), ConnectionState::InMenu);
        assert_eq!(flags(true, true, 3).classify(), ConnectionState::InPit);
        assert_eq!(flags(true, false, 1).classify(), ConnectionState::InPit);
        assert_eq!(flags(true, false, 2).classify(), ConnectionState::InPit);
        assert_eq!(flags(true, false, 0).classify(), ConnectionState::OnTrack);
        assert_eq!(flags(true, false, 3).classify(), ConnectionState::OnTrack);
    }

    #[test]
    fn test_connect_forces_menu() {
        let mut classifier = StateClassifier::new();
        classifier.on_frame(flags(true, false, 3));
        assert_eq!(classifier.current(), ConnectionState::OnTrack);

        assert_eq!(classifier.on_connected(), Some(ConnectionState::InMenu));
        assert_eq!(classifier.current(), ConnectionState::InMenu);
    }

    #[test]
    fn test_disconnect_forces_disconnected() {
        let mut classifier = StateClassifier::new();
        classifier.on_connected();
        classifier.on_frame(flags(true, false, 3));
        assert_eq!(
            classifier.on_disconnected(),
            Some(ConnectionState::Disconnected)
        );
        assert_eq!(classifier.on_disconnected(), None);
    }

    #[test]
    fn test_repeated_state_notifies_once() {
        let mut classifier = StateClassifier::new();
        classifier.on_connected();

        let changes: Vec<_> = (0..10)
            .filter_map(|_| classifier.on_frame(flags(true, false, 3)))
            .collect();
        assert_eq!(changes, vec![ConnectionState::OnTrack]);
    }

    #[test]
    fn test_initial_state_is_disconnected() {
        let classifier = StateClassifier::new();
        assert_eq!(classifier.current(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_connect_twice_notifies_once() {
        let mut classifier = StateClassifier::new();
        assert_eq!(classifier.on_connected(), Some(ConnectionState::InMenu));
        assert_eq!(classifier.on_connected(), None);
    }
}
