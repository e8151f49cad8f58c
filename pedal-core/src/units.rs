//! Type-safe wrappers for the physical units carried in a sample

use serde::{Deserialize, Serialize};

/// Percentage (0.0 to 1.0)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percentage(pub f32);

impl Percentage {
    /// Create a new percentage, clamping to [0.0, 1.0]
    ///
    /// NaN input (a half-written frame) clamps to 0.0.
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self(0.0);
        }
        Self(value.clamp(0.0, 1.0))
    }

    /// Get as percentage (0-100)
    pub fn as_percent(&self) -> f32 {
        self.0 * 100.0
    }
}

/// Seconds (lap times, deltas, durations)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Seconds(pub f32);

impl Seconds {
    /// Lap times and remaining-time counters use non-positive values for "no data yet"
    pub fn is_positive(&self) -> bool {
        self.0 > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_clamp() {
        assert_eq!(Percentage::new(1.4).0, 1.0);
        assert_eq!(Percentage::new(-0.2).0, 0.0);
        assert_eq!(Percentage::new(0.5).0, 0.5);
    }

    #[test]
    fn test_percentage_nan_is_zero() {
        assert_eq!(Percentage::new(f32::NAN).0, 0.0);
    }

    #[test]
    fn test_percentage_as_percent() {
        let p = Percentage::new(0.75);
        assert!((p.as_percent() - 75.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_seconds_serialize_full_precision() {
        let json = serde_json::to_string(&Seconds(1.234_567)).unwrap();
        let back: Seconds = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Seconds(1.234_567));
        assert_eq!(serde_json::to_string(&Percentage::new(0.5)).unwrap(), "0.5");
    }
}
