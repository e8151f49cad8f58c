//! Text projections of a frame for the overlay labels

use crate::model::{ConnectionState, SessionFacts, TelemetrySample};
use crate::units::{Percentage, Seconds};

/// Shown in place of a value that is not available yet
pub const PLACEHOLDER: &str = "—";

/// Semantic color of a label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Neutral,
    /// Faster than the reference lap
    Ahead,
    /// Slower than the reference lap
    Behind,
    Good,
    Warning,
    Error,
}

/// Text plus the tone it should be drawn in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub text: String,
    pub tone: Tone,
}

impl Label {
    fn new(text: impl Into<String>, tone: Tone) -> Self {
        Self {
            text: text.into(),
            tone,
        }
    }
}

/// `m:ss.mmm`, or `s.mmm` under a minute
pub fn lap_time(time: Seconds) -> String {
    if !time.is_positive() {
        return PLACEHOLDER.to_string();
    }
    let millis_total = (f64::from(time.0) * 1000.0).round() as i64;
    let minutes = millis_total / 60_000;
    let seconds = (millis_total / 1000) % 60;
    let millis = millis_total % 1000;
    if minutes > 0 {
        format!("{}:{:02}.{:03}", minutes, seconds, millis)
    } else {
        format!("{}.{:03}", seconds, millis)
    }
}

/// `h:mm:ss`, or `mm:ss` under an hour; empty when the counter is invalid
pub fn time_remaining(sample: &TelemetrySample) -> String {
    if !sample.time_remaining_valid() {
        return String::new();
    }
    let total = sample.time_remaining.0 as i64;
    let hours = total / 3600;
    let minutes = (total / 60) % 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

pub fn delta(sample: &TelemetrySample) -> Label {
    if !sample.delta_valid {
        return Label::new(PLACEHOLDER, Tone::Neutral);
    }
    let value = sample.delta_to_best.0;
    let tone = if value <= 0.0 { Tone::Ahead } else { Tone::Behind };
    let sign = if value >= 0.0 { "+" } else { "-" };
    Label::new(format!("{}{:.3}", sign, value.abs()), tone)
}

/// `x 3/17`, with `-` for an unlimited session
pub fn incidents(count: i32, facts: &SessionFacts) -> String {
    if facts.is_unlimited() {
        format!("x {}/-", count)
    } else {
        format!("x {}/{}", count, facts.max_incidents)
    }
}

pub fn strength_of_field(facts: &SessionFacts) -> String {
    if facts.strength_of_field > 0 {
        format!("SOF {}", facts.strength_of_field)
    } else {
        format!("SOF {}", PLACEHOLDER)
    }
}

pub fn status(state: ConnectionState) -> Label {
    match state {
        ConnectionState::Disconnected => Label::new("Disconnected", Tone::Error),
        ConnectionState::InMenu => Label::new("In Menu", Tone::Warning),
        ConnectionState::InPit => Label::new("In Pit / Menu", Tone::Warning),
        ConnectionState::OnTrack => Label::new("On Track", Tone::Good),
    }
}

/// Pedal bar fill, truncated to a whole percent
pub fn bar_percent(value: Percentage) -> u8 {
    value.as_percent() as u8
}
