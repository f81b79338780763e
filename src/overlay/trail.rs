//! Cosmetic motion trail.
//!
//! A line is drawn from an anchor point to the latest tag center. The anchor
//! jumps to the current center once at least `interval` frames have passed
//! since it last moved, so the line shows roughly where the tag was half a
//! second ago. One tracker is shared by all tags in view.

/// Default anchor refresh interval, in frames.
pub const DEFAULT_TRAIL_INTERVAL: u32 = 15;

/// Line to draw for one observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrailSegment {
    pub from: (i32, i32),
    pub to: (i32, i32),
}

#[derive(Clone, Debug)]
pub struct TrailTracker {
    interval: u32,
    counter: u32,
    anchor: (i32, i32),
    current: (i32, i32),
}

impl TrailTracker {
    /// The anchor starts at the image origin.
    pub fn new(interval: u32) -> Self {
        Self {
            interval: interval.max(1),
            counter: 0,
            anchor: (0, 0),
            current: (0, 0),
        }
    }

    /// Advance the frame counter. Call once per loop iteration.
    pub fn tick(&mut self) {
        self.counter = self.counter.saturating_add(1);
    }

    /// Record a tag center and return the segment to draw for it.
    pub fn observe(&mut self, center: (i32, i32)) -> TrailSegment {
        self.current = center;
        let segment = TrailSegment {
            from: self.anchor,
            to: self.current,
        };
        log::debug!("trail counter {}", self.counter);
        if self.counter >= self.interval {
            self.anchor = self.current;
            self.counter = 0;
        }
        segment
    }

    pub fn anchor(&self) -> (i32, i32) {
        self.anchor
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }
}

impl Default for TrailTracker {
    fn default() -> Self {
        Self::new(DEFAULT_TRAIL_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_segment_starts_at_origin() {
        let mut trail = TrailTracker::default();
        trail.tick();
        let seg = trail.observe((40, 30));
        assert_eq!(seg.from, (0, 0));
        assert_eq!(seg.to, (40, 30));
    }

    #[test]
    fn anchor_moves_after_interval() {
        let mut trail = TrailTracker::new(3);
        for i in 1..=2 {
            trail.tick();
            trail.observe((i, i));
            assert_eq!(trail.anchor(), (0, 0));
        }
        trail.tick();
        let seg = trail.observe((3, 3));
        // Segment is computed before the anchor moves.
        assert_eq!(seg.from, (0, 0));
        assert_eq!(trail.anchor(), (3, 3));
        assert_eq!(trail.counter(), 0);

        trail.tick();
        assert_eq!(trail.observe((4, 4)).from, (3, 3));
    }

    #[test]
    fn counter_runs_without_observations() {
        let mut trail = TrailTracker::new(15);
        for _ in 0..20 {
            trail.tick();
        }
        assert_eq!(trail.counter(), 20);
        trail.observe((9, 9));
        assert_eq!(trail.anchor(), (9, 9));
        assert_eq!(trail.counter(), 0);
    }

    #[test]
    fn only_first_tag_moves_anchor_in_a_frame() {
        let mut trail = TrailTracker::new(1);
        trail.tick();
        trail.observe((10, 10));
        let second = trail.observe((50, 50));
        assert_eq!(second.from, (10, 10));
        assert_eq!(trail.anchor(), (10, 10));
    }

    #[test]
    fn zero_interval_is_clamped() {
        let mut trail = TrailTracker::new(0);
        trail.tick();
        trail.observe((1, 2));
        assert_eq!(trail.anchor(), (1, 2));
    }
}
