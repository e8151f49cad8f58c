//! Fixed-capacity pedal history
//!
//! Three parallel channels (throttle, brake, ABS) stored in fixed arrays and
//! advanced by a single shared cursor, so the channels can never drift apart.
//! Appending to a full history overwrites the oldest slot.

use crate::model::TelemetrySample;

/// Default history length: about 5 seconds at 60 Hz
pub const HISTORY_CAPACITY: usize = 300;

/// Shared write position and fill level of a circular store of `N` slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingCursor<const N: usize> {
    write_index: usize,
    count: usize,
}

impl<const N: usize> RingCursor<N> {
    pub fn new() -> Self {
        assert!(N > 0, "ring capacity must be non-zero");
        Self {
            write_index: 0,
            count: 0,
        }
    }

    pub fn write_index(&self) -> usize {
        self.write_index
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == N
    }

    /// Physical slot of the oldest retained element
    pub fn oldest(&self) -> usize {
        (self.write_index + N - self.count) % N
    }

    /// Physical slot of the `i`-th element, oldest first
    pub fn slot(&self, i: usize) -> Option<usize> {
        (i < self.count).then(|| (self.oldest() + i) % N)
    }

    /// Claim the slot to write next and advance past it
    pub fn advance(&mut self) -> usize {
        let slot = self.write_index;
        self.write_index = (self.write_index + 1) % N;
        if self.count < N {
            self.count += 1;
        }
        self.check();
        slot
    }

    pub fn reset(&mut self) {
        self.write_index = 0;
        self.count = 0;
    }

    fn check(&self) {
        assert!(
            self.count <= N && self.write_index < N,
            "ring cursor corrupted: write_index={} count={} capacity={}",
            self.write_index,
            self.count,
            N
        );
    }
}

impl<const N: usize> Default for RingCursor<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// One time step across the three channels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PedalPoint {
    pub throttle: f32,
    pub brake: f32,
    pub abs: bool,
}

impl From<&TelemetrySample> for PedalPoint {
    fn from(sample: &TelemetrySample) -> Self {
        Self {
            throttle: sample.throttle.0,
            brake: sample.brake.0,
            abs: sample.abs_active,
        }
    }
}

/// Rolling history of the last `N` pedal points
#[derive(Debug, Clone)]
pub struct PedalHistory<const N: usize = HISTORY_CAPACITY> {
    throttle: [f32; N],
    brake: [f32; N],
    abs: [bool; N],
    cursor: RingCursor<N>,
}

impl<const N: usize> PedalHistory<N> {
    pub fn new() -> Self {
        Self {
            throttle: [0.0; N],
            brake: [0.0; N],
            abs: [false; N],
            cursor: RingCursor::new(),
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.cursor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursor.is_empty()
    }

    pub fn write_index(&self) -> usize {
        self.cursor.write_index()
    }

    /// Append one point, overwriting the oldest when full
    pub fn append(&mut self, point: PedalPoint) {
        let slot = self.cursor.advance();
        self.throttle[slot] = point.throttle;
        self.brake[slot] = point.brake;
        self.abs[slot] = point.abs;
    }

    pub fn push_sample(&mut self, sample: &TelemetrySample) {
        self.append(PedalPoint::from(sample));
    }

    pub fn clear(&mut self) {
        self.cursor.reset();
    }

    /// The `i`-th retained point, oldest first
    pub fn get(&self, i: usize) -> Option<PedalPoint> {
        self.cursor.slot(i).map(|slot| self.point_at(slot))
    }

    pub fn latest(&self) -> Option<PedalPoint> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    /// Iterate oldest to newest without copying the arrays
    pub fn iter(&self) -> Iter<'_, N> {
        Iter {
            history: self,
            next: 0,
        }
    }

    fn point_at(&self, slot: usize) -> PedalPoint {
        PedalPoint {
            throttle: self.throttle[slot],
            brake: self.brake[slot],
            abs: self.abs[slot],
        }
    }
}

impl<const N: usize> Default for PedalHistory<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, const N: usize> IntoIterator for &'a PedalHistory<N> {
    type Item = PedalPoint;
    type IntoIter = Iter<'a, N>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Oldest-to-newest iterator over a [`PedalHistory`]
pub struct Iter<'a, const N: usize> {
    history: &'a PedalHistory<N>,
    next: usize,
}

impl<const N: usize> Iterator for Iter<'_, N> {
    type Item = PedalPoint;

    fn next(&mut self) -> Option<Self::Item> {
        let point = self.history.get(self.next)?;
        self.next += 1;
        Some(point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.history.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl<const N: usize> ExactSizeIterator for Iter<'_, N> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(value: f32) -> PedalPoint {
        PedalPoint {
            throttle: value,
            brake: 1.0 - value,
            abs: value > 0.5,
        }
    }

    #[test]
    fn test_count_law() {
        let mut history = PedalHistory::<4>::new();
        for appended in 1..=11usize {
            history.append(point(appended as f32 / 10.0));
            assert_eq!(history.len(), appended.min(4));
            assert!(history.write_index() < 4);
        }
    }

    #[test]
    fn test_overwrite_keeps_newest() {
        let mut history = PedalHistory::<3>::new();
        for i in 0..5 {
            history.append(point(i as f32));
        }
        let throttles: Vec<f32> = history.iter().map(|p| p.throttle).collect();
        assert_eq!(throttles, vec![2.0, 3.0, 4.0]);
        assert_eq!(history.latest().map(|p| p.throttle), Some(4.0));
    }

    #[test]
    fn test_channels_stay_aligned_across_wrap() {
        let mut history = PedalHistory::<5>::new();
        for i in 0..13 {
            history.append(point(i as f32 / 13.0));
        }
        for p in &history {
            assert_eq!(p, point(p.throttle));
        }
    }

    #[test]
    fn test_partial_fill_starts_at_zero() {
        let mut history = PedalHistory::<5>::new();
        history.append(point(0.1));
        history.append(point(0.2));
        assert_eq!(history.get(0).map(|p| p.throttle), Some(0.1));
        assert_eq!(history.get(1).map(|p| p.throttle), Some(0.2));
        assert_eq!(history.get(2), None);
        assert_eq!(history.iter().len(), 2);
    }

    #[test]
    fn test_oldest_slot_formula() {
        let mut cursor = RingCursor::<4>::new();
        for _ in 0..6 {
            cursor.advance();
        }
        assert_eq!(cursor.write_index(), 2);
        assert_eq!(cursor.len(), 4);
        assert_eq!(cursor.oldest(), 2);
        assert_eq!(cursor.slot(3), Some(1));
    }

    #[test]
    fn test_clear_resets_cursor() {
        let mut history = PedalHistory::<3>::new();
        history.append(point(0.3));
        history.append(point(0.4));
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.write_index(), 0);
        assert_eq!(history.iter().count(), 0);
        assert_eq!(history.latest(), None);
    }

    #[test]
    fn test_default_capacity() {
        let history: PedalHistory = PedalHistory::new();
        assert_eq!(history.capacity(), 300);
    }
}
