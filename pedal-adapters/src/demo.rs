//! Demo source that generates synthetic pedal telemetry
//!
//! Simulates laps around a circuit with straights, braking zones, corners,
//! and acceleration phases, starting from the pit lane. Heavy braking zones
//! pulse ABS. Produces realistic-looking traces at any poll rate without
//! requiring the simulator.

use anyhow::Result;
use pedal_core::normalizer::fields;
use pedal_core::session::SessionMetadata;
use pedal_core::source::{FieldError, FieldMap, FieldReader, FieldValue, SampleSource, SourceEvent};
use std::time::Instant;

/// Session description handed out as metadata
pub const DEMO_SESSION_YAML: &str = "\
WeekendInfo:
 TrackName: demo circuit
 WeekendOptions:
  IncidentLimit: 17
DriverInfo:
 DriverCarIdx: 1
 Drivers:
 - CarIdx: 0
   UserName: Pace Car
   IRating: 0
   CarIsPaceCar: 1
   IsSpectator: 0
 - CarIdx: 1
   UserName: Demo Player
   IRating: 2150
   CarIsPaceCar: 0
   IsSpectator: 0
 - CarIdx: 2
   UserName: Alex Rivera
   IRating: 2840
   CarIsPaceCar: 0
   IsSpectator: 0
 - CarIdx: 3
   UserName: Sam Chen
   IRating: 1730
   CarIsPaceCar: 0
   IsSpectator: 0
";

/// Seconds spent on pit road before the first lap
const PIT_EXIT_SECS: f32 = 6.0;
/// Session length for the remaining-time counter
const SESSION_SECS: f32 = 1800.0;
/// Brake pressure above which ABS starts to intervene
const ABS_THRESHOLD: f32 = 0.82;
/// ABS modulation period, in frames
const ABS_PULSE_FRAMES: u64 = 5;

/// Track surface reported once out on the circuit
const SURFACE_ON_TRACK: i32 = 3;
const SURFACE_PIT_STALL: i32 = 1;
const SURFACE_APPROACHING_PITS: i32 = 2;

// =============================================================================
// Track definition: a sequence of segments that form a lap
// =============================================================================

#[derive(Clone, Copy)]
enum SegmentKind {
    Straight, // Full throttle
    Braking,  // Heavy braking into a corner
    Corner,   // Maintenance throttle
    Accel,    // Progressive throttle out of a corner
}

#[derive(Clone, Copy)]
struct TrackSegment {
    kind: SegmentKind,
    duration: f32,   // seconds to traverse at representative pace
    peak_brake: f32, // brake pressure at the start of a braking zone
}

/// A simple circuit: ~85s lap, mix of corners and straights
fn demo_track() -> Vec<TrackSegment> {
    use SegmentKind::*;
    vec![
        // Start/finish straight
        TrackSegment { kind: Straight, duration: 8.0,  peak_brake: 0.0 },
        // T1: heavy braking into slow right-hander
        TrackSegment { kind: Braking,  duration: 3.0,  peak_brake: 1.0 },
        TrackSegment { kind: Corner,   duration: 4.0,  peak_brake: 0.0 },
        TrackSegment { kind: Accel,    duration: 3.5,  peak_brake: 0.0 },
        TrackSegment { kind: Straight, duration: 4.0,  peak_brake: 0.0 },
        // T2: medium braking into fast left-hander
        TrackSegment { kind: Braking,  duration: 2.0,  peak_brake: 0.7 },
        TrackSegment { kind: Corner,   duration: 3.5,  peak_brake: 0.0 },
        TrackSegment { kind: Accel,    duration: 3.0,  peak_brake: 0.0 },
        // Back straight
        TrackSegment { kind: Straight, duration: 10.0, peak_brake: 0.0 },
        // T3: chicane
        TrackSegment { kind: Braking,  duration: 2.5,  peak_brake: 0.9 },
        TrackSegment { kind: Corner,   duration: 4.0,  peak_brake: 0.0 },
        TrackSegment { kind: Accel,    duration: 3.0,  peak_brake: 0.0 },
        TrackSegment { kind: Straight, duration: 6.0,  peak_brake: 0.0 },
        // T4: long sweeping right, a lift and a dab
        TrackSegment { kind: Braking,  duration: 1.5,  peak_brake: 0.35 },
        TrackSegment { kind: Corner,   duration: 5.0,  peak_brake: 0.0 },
        TrackSegment { kind: Accel,    duration: 3.0,  peak_brake: 0.0 },
        // T5: tight hairpin left
        TrackSegment { kind: Braking,  duration: 3.5,  peak_brake: 1.0 },
        TrackSegment { kind: Corner,   duration: 4.5,  peak_brake: 0.0 },
        TrackSegment { kind: Accel,    duration: 4.0,  peak_brake: 0.0 },
        // Run to start/finish
        TrackSegment { kind: Straight, duration: 6.0,  peak_brake: 0.0 },
    ]
}

/// Pedal inputs at one point of the lap
struct Pedals {
    throttle: f32,
    brake: f32,
}

fn pedals_at(track: &[TrackSegment], lap_time: f32) -> Pedals {
    let lap_duration: f32 = track.iter().map(|s| s.duration).sum();
    let t = lap_time % lap_duration;

    // Find current segment
    let mut elapsed = 0.0_f32;
    let mut seg = track[track.len() - 1];
    for candidate in track {
        if elapsed + candidate.duration > t {
            seg = *candidate;
            break;
        }
        elapsed += candidate.duration;
    }

    let seg_t = ((t - elapsed) / seg.duration).clamp(0.0, 1.0);
    let smooth_t = smoothstep(seg_t);

    let (throttle, brake) = match seg.kind {
        SegmentKind::Straight => (0.95 + 0.05 * (1.0 - seg_t), 0.0), // slight lift approaching end
        SegmentKind::Braking => {
            // Sharp initial application that eases off towards the apex
            let attack = smoothstep(seg_t * 8.0);
            (0.0, seg.peak_brake * attack * (1.0 - smooth_t * 0.45))
        }
        SegmentKind::Corner => (0.2 + 0.3 * seg_t, 0.0),
        SegmentKind::Accel => (lerp(0.5, 1.0, smooth_t), 0.0),
    };

    Pedals { throttle, brake }
}

fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Simple deterministic noise from a seed
fn noise(seed: f32) -> f32 {
    let x = (seed * 12.9898 + 78.233).sin() * 43_758.547;
    x - x.floor()
}

/// Small jitter centered around 0
fn jitter(seed: f32, amplitude: f32) -> f32 {
    (noise(seed) - 0.5) * 2.0 * amplitude
}

// =============================================================================
// DemoSource
// =============================================================================

pub struct DemoSource {
    active: bool,
    announce: bool,
    start_time: Option<Instant>,
    fixed_step: Option<f32>,
    frame_count: u64,
    track: Vec<TrackSegment>,
    lap_duration: f32,
    laps_completed: u32,
    best_lap: f32,
    last_lap: f32,
    frame: FieldMap,
}

impl DemoSource {
    pub fn new() -> Self {
        let track = demo_track();
        let lap_duration: f32 = track.iter().map(|s| s.duration).sum();
        Self {
            active: false,
            announce: false,
            start_time: None,
            fixed_step: None,
            frame_count: 0,
            track,
            lap_duration,
            laps_completed: 0,
            best_lap: 0.0,
            last_lap: 0.0,
            frame: FieldMap::new(),
        }
    }

    /// Advance simulated time by `step` seconds per frame instead of wall time
    pub fn with_fixed_step(mut self, step: f32) -> Self {
        self.fixed_step = Some(step);
        self
    }

    pub fn lap_duration(&self) -> f32 {
        self.lap_duration
    }

    fn elapsed(&self) -> f32 {
        match self.fixed_step {
            Some(step) => self.frame_count as f32 * step,
            None => self
                .start_time
                .map(|t| t.elapsed().as_secs_f32())
                .unwrap_or(0.0),
        }
    }

    fn generate_frame(&mut self) {
        self.frame_count += 1;
        let elapsed = self.elapsed();
        let n = self.frame_count as f32; // noise seed

        let on_pit_road = elapsed < PIT_EXIT_SECS;
        let track_surface = if elapsed < PIT_EXIT_SECS * 0.5 {
            SURFACE_PIT_STALL
        } else if on_pit_road {
            SURFACE_APPROACHING_PITS
        } else {
            SURFACE_ON_TRACK
        };

        let driving = (elapsed - PIT_EXIT_SECS).max(0.0);
        let lap_time = driving % self.lap_duration;
        let current_lap_num = (driving / self.lap_duration) as u32 + 1;
        if current_lap_num > self.laps_completed + 1 {
            self.laps_completed = current_lap_num - 1;
            self.last_lap = self.lap_duration + jitter(n, 1.5);
            if self.best_lap <= 0.0 || self.last_lap < self.best_lap {
                self.best_lap = self.last_lap;
            }
        }

        let (throttle, brake) = if on_pit_road {
            (0.25 + jitter(n * 1.2, 0.02), 0.0)
        } else {
            let pedals = pedals_at(&self.track, lap_time);
            let brake = if pedals.brake > 0.0 {
                (pedals.brake + jitter(n * 1.3, 0.02)).max(0.0)
            } else {
                0.0
            };
            (pedals.throttle + jitter(n * 1.2, 0.02), brake)
        };

        // ABS cycles on and off while the brake is near lockup
        let abs_active = brake > ABS_THRESHOLD && (self.frame_count / ABS_PULSE_FRAMES) % 2 == 0;

        let has_best = self.best_lap > 0.0;
        let delta = jitter(n * 6.0, 0.8) * 0.05 + (lap_time / self.lap_duration - 0.5) * 0.6;

        self.frame = FieldMap::new()
            .with(fields::THROTTLE, FieldValue::Float(throttle))
            .with(fields::BRAKE, FieldValue::Float(brake))
            .with(fields::ABS_ACTIVE, FieldValue::Bool(abs_active))
            .with(fields::LAST_LAP_TIME, FieldValue::Float(self.last_lap))
            .with(fields::BEST_LAP_TIME, FieldValue::Float(self.best_lap))
            .with(fields::DELTA_TO_BEST, FieldValue::Float(delta))
            .with(fields::DELTA_TO_BEST_OK, FieldValue::Bool(has_best && !on_pit_road))
            .with(
                fields::INCIDENT_COUNT,
                FieldValue::Int((self.laps_completed / 3) as i32),
            )
            .with(
                fields::TIME_REMAINING,
                FieldValue::Double(f64::from((SESSION_SECS - elapsed).max(0.0))),
            )
            .with(fields::IS_ON_TRACK, FieldValue::Bool(true))
            .with(fields::ON_PIT_ROAD, FieldValue::Bool(on_pit_road))
            .with(fields::TRACK_SURFACE, FieldValue::Int(track_surface));
    }
}

impl Default for DemoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldReader for DemoSource {
    fn get_field(&self, name: &str) -> Result<FieldValue, FieldError> {
        if !self.active || self.frame.is_empty() {
            return Err(FieldError::NotConnected);
        }
        self.frame.get_field(name)
    }
}

impl SampleSource for DemoSource {
    fn name(&self) -> &str {
        "Demo"
    }

    fn detect(&self) -> bool {
        true
    }

    fn connect(&mut self) -> Result<()> {
        self.active = true;
        self.announce = true;
        self.start_time = Some(Instant::now());
        self.frame_count = 0;
        self.laps_completed = 0;
        self.last_lap = 0.0;
        self.best_lap = 0.0;
        self.frame = FieldMap::new();
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        self.active = false;
        self.start_time = None;
        self.frame = FieldMap::new();
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<SourceEvent>> {
        if !self.active {
            return Ok(None);
        }
        if self.announce {
            self.announce = false;
            return Ok(Some(SourceEvent::Connected));
        }

        self.generate_frame();
        Ok(Some(SourceEvent::FrameReady))
    }

    fn session_metadata(&self) -> Option<SessionMetadata> {
        self.active
            .then(|| SessionMetadata::from_yaml(DEMO_SESSION_YAML))
    }

    fn is_connected(&self) -> bool {
        self.active
    }
}
