//! Per-frame sample normalization
//!
//! Turns the raw named fields of one frame into a [`TelemetrySample`] plus
//! the [`TrackFlags`] used for classification. Mandatory fields fail the
//! whole frame; the ABS flag, incident count and remaining time degrade to
//! defaults one field at a time.

use crate::classifier::TrackFlags;
use crate::model::TelemetrySample;
use crate::source::{FieldError, FieldReader};
use crate::units::{Percentage, Seconds};

/// Field names published by the simulator
pub mod fields {
    pub const THROTTLE: &str = "Throttle";
    pub const BRAKE: &str = "Brake";
    pub const ABS_ACTIVE: &str = "BrakeABSactive";
    pub const ABS_ACTIVE_LEGACY: &str = "ABSActive";
    pub const ABS_CUT_PCT: &str = "BrakeABScutPct";
    pub const LAST_LAP_TIME: &str = "LapLastLapTime";
    pub const BEST_LAP_TIME: &str = "LapBestLapTime";
    pub const DELTA_TO_BEST: &str = "LapDeltaToBestLap";
    pub const DELTA_TO_BEST_OK: &str = "LapDeltaToBestLap_OK";
    pub const INCIDENT_COUNT: &str = "PlayerCarMyIncidentCount";
    pub const TIME_REMAINING: &str = "SessionTimeRemain";
    pub const IS_ON_TRACK: &str = "IsOnTrack";
    pub const ON_PIT_ROAD: &str = "OnPitRoad";
    pub const TRACK_SURFACE: &str = "PlayerTrackSurface";
}

/// One way of deriving the ABS flag from the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsProbe {
    /// A boolean field
    Flag(&'static str),
    /// A numeric field; ABS is active while it is above zero
    Positive(&'static str),
}

impl AbsProbe {
    fn read<R: FieldReader + ?Sized>(&self, reader: &R) -> Result<bool, FieldError> {
        match self {
            AbsProbe::Flag(name) => reader.read_bool(name),
            AbsProbe::Positive(name) => reader.read_f32(name).map(|v| v > 0.0),
        }
    }
}

/// Field naming has changed between simulator builds; first readable probe wins.
pub const ABS_PROBES: &[AbsProbe] = &[
    AbsProbe::Flag(fields::ABS_ACTIVE),
    AbsProbe::Flag(fields::ABS_ACTIVE_LEGACY),
    AbsProbe::Positive(fields::ABS_CUT_PCT),
];

/// Resolve the ABS flag through `probes`; `false` if none can be read
pub fn resolve_abs<R: FieldReader + ?Sized>(reader: &R, probes: &[AbsProbe]) -> bool {
    probes
        .iter()
        .find_map(|probe| probe.read(reader).ok())
        .unwrap_or(false)
}

/// A normalized frame that has not been published yet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedFrame {
    pub sample: TelemetrySample,
    pub flags: TrackFlags,
}

/// Read and normalize every field of the current frame.
///
/// Returns the first mandatory-field error; nothing is partially produced.
pub fn normalize<R: FieldReader + ?Sized>(reader: &R) -> Result<NormalizedFrame, FieldError> {
    let throttle = Percentage::new(reader.read_f32(fields::THROTTLE)?);
    let brake = Percentage::new(reader.read_f32(fields::BRAKE)?);
    let abs_active = resolve_abs(reader, ABS_PROBES);

    let last_lap_time = Seconds(reader.read_f32(fields::LAST_LAP_TIME)?);
    let best_lap_time = Seconds(reader.read_f32(fields::BEST_LAP_TIME)?);
    let delta_to_best = Seconds(reader.read_f32(fields::DELTA_TO_BEST)?);
    let delta_valid = reader.read_bool(fields::DELTA_TO_BEST_OK)?;

    let incident_count = reader.read_i32(fields::INCIDENT_COUNT).unwrap_or(0);
    let time_remaining = Seconds(reader.read_f32(fields::TIME_REMAINING).unwrap_or(0.0));

    let flags = TrackFlags {
        is_on_track: reader.read_bool(fields::IS_ON_TRACK)?,
        on_pit_road: reader.read_bool(fields::ON_PIT_ROAD)?,
        track_surface: reader.read_i32(fields::TRACK_SURFACE)?,
    };

    Ok(NormalizedFrame {
        sample: TelemetrySample {
            throttle,
            brake,
            abs_active,
            last_lap_time,
            best_lap_time,
            delta_to_best,
            delta_valid,
            incident_count,
            time_remaining,
        },
        flags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{FieldMap, FieldValue};

    fn full_frame() -> FieldMap {
        FieldMap::new()
            .with(fields::THROTTLE, FieldValue::Float(0.6))
            .with(fields::BRAKE, FieldValue::Float(0.0))
            .with(fields::ABS_ACTIVE, FieldValue::Bool(false))
            .with(fields::LAST_LAP_TIME, FieldValue::Float(91.2))
            .with(fields::BEST_LAP_TIME, FieldValue::Float(90.8))
            .with(fields::DELTA_TO_BEST, FieldValue::Float(0.25))
            .with(fields::DELTA_TO_BEST_OK, FieldValue::Bool(true))
            .with(fields::INCIDENT_COUNT, FieldValue::Int(4))
            .with(fields::TIME_REMAINING, FieldValue::Double(1800.0))
            .with(fields::IS_ON_TRACK, FieldValue::Bool(true))
            .with(fields::ON_PIT_ROAD, FieldValue::Bool(false))
            .with(fields::TRACK_SURFACE, FieldValue::Int(3))
    }

    #[test]
    fn test_normalize_full_frame() {
        let frame = normalize(&full_frame()).unwrap();
        assert_eq!(frame.sample.throttle.0, 0.6);
        assert_eq!(frame.sample.last_lap_time.0, 91.2);
        assert!(frame.sample.delta_valid);
        assert_eq!(frame.sample.incident_count, 4);
        assert_eq!(frame.sample.time_remaining.0, 1800.0);
        assert_eq!(
            frame.flags,
            TrackFlags {
                is_on_track: true,
                on_pit_road: false,
                track_surface: 3
            }
        );
    }

    #[test]
    fn test_normalize_clamps_pedals() {
        let mut map = full_frame();
        map.insert(fields::THROTTLE, FieldValue::Float(1.4));
        map.insert(fields::BRAKE, FieldValue::Float(-0.2));
        let frame = normalize(&map).unwrap();
        assert_eq!(frame.sample.throttle.0, 1.0);
        assert_eq!(frame.sample.brake.0, 0.0);
    }

    #[test]
    fn test_normalize_keeps_lap_times_verbatim() {
        let mut map = full_frame();
        map.insert(fields::LAST_LAP_TIME, FieldValue::Float(-1.0));
        map.insert(fields::DELTA_TO_BEST, FieldValue::Float(-3.5));
        let frame = normalize(&map).unwrap();
        assert_eq!(frame.sample.last_lap_time.0, -1.0);
        assert_eq!(frame.sample.delta_to_best.0, -3.5);
    }

    #[test]
    fn test_abs_falls_back_to_cut_percentage() {
        let mut map = full_frame();
        map.remove(fields::ABS_ACTIVE);
        map.insert(fields::ABS_CUT_PCT, FieldValue::Float(0.35));
        assert!(normalize(&map).unwrap().sample.abs_active);

        map.insert(fields::ABS_CUT_PCT, FieldValue::Float(0.0));
        assert!(!normalize(&map).unwrap().sample.abs_active);
    }

    #[test]
    fn test_abs_accepts_legacy_name() {
        let mut map = full_frame();
        map.remove(fields::ABS_ACTIVE);
        map.insert(fields::ABS_ACTIVE_LEGACY, FieldValue::Bool(true));
        assert!(normalize(&map).unwrap().sample.abs_active);
    }

    #[test]
    fn test_abs_primary_wins_over_fallback() {
        let mut map = full_frame();
        map.insert(fields::ABS_ACTIVE, FieldValue::Bool(false));
        map.insert(fields::ABS_CUT_PCT, FieldValue::Float(0.9));
        assert!(!normalize(&map).unwrap().sample.abs_active);
    }

    #[test]
    fn test_abs_defaults_false_when_unreadable() {
        let mut map = full_frame();
        map.remove(fields::ABS_ACTIVE);
        let frame = normalize(&map).expect("missing ABS must not drop the frame");
        assert!(!frame.sample.abs_active);
    }

    #[test]
    fn test_missing_incidents_and_time_default_independently() {
        let mut map = full_frame();
        map.remove(fields::INCIDENT_COUNT);
        let frame = normalize(&map).unwrap();
        assert_eq!(frame.sample.incident_count, 0);
        assert_eq!(frame.sample.time_remaining.0, 1800.0);

        let mut map = full_frame();
        map.remove(fields::TIME_REMAINING);
        let frame = normalize(&map).unwrap();
        assert_eq!(frame.sample.incident_count, 4);
        assert_eq!(frame.sample.time_remaining.0, 0.0);
    }

    #[test]
    fn test_missing_mandatory_field_fails_frame() {
        for name in [
            fields::THROTTLE,
            fields::BRAKE,
            fields::LAST_LAP_TIME,
            fields::DELTA_TO_BEST_OK,
            fields::IS_ON_TRACK,
            fields::TRACK_SURFACE,
        ] {
            let mut map = full_frame();
            map.remove(name);
            assert_eq!(
                normalize(&map),
                Err(FieldError::Missing(name.to_string())),
                "{} should be mandatory",
                name
            );
        }
    }
}
