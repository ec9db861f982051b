//! Pointer tracking for effect surfaces.
//!
//! Positions are normalized against the surface bounds to `[0, 1]²` and read
//! back once per frame. Multiple moves between frames overwrite each other
//! (last-write-wins); there is no event queue and no smoothing here, so
//! effects that want inertia apply it themselves.

use winit::dpi::PhysicalSize;

/// Neutral pointer position reported before any real input arrives.
pub const POINTER_CENTER: [f32; 2] = [0.5, 0.5];

/// Per-frame pointer snapshot handed to effects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSample {
    /// Latest normalized position in `[0, 1]²`.
    pub position: [f32; 2],
    /// Motion since the previous frame's sample, in normalized units.
    pub delta: [f32; 2],
    /// Whether real input arrived since the previous sample.
    pub interacted: bool,
}

/// Accumulates pointer-move events between frames.
pub struct PointerFeed {
    invert_y: bool,
    latest: [f32; 2],
    sampled: Option<[f32; 2]>,
    moved_since_sample: bool,
}

impl PointerFeed {
    /// `invert_y` flips the vertical axis for effects that use a bottom-up
    /// shader coordinate convention.
    pub fn new(invert_y: bool) -> Self {
        Self {
            invert_y,
            latest: POINTER_CENTER,
            sampled: None,
            moved_since_sample: false,
        }
    }

    /// Records a pointer position in surface pixels.
    pub fn record(&mut self, x: f64, y: f64, bounds: PhysicalSize<u32>) {
        let width = bounds.width.max(1) as f32;
        let height = bounds.height.max(1) as f32;
        let nx = (x as f32 / width).clamp(0.0, 1.0);
        let mut ny = (y as f32 / height).clamp(0.0, 1.0);
        if self.invert_y {
            ny = 1.0 - ny;
        }
        self.latest = [nx, ny];
        self.moved_since_sample = true;
    }

    /// Reads the latest state and the motion since the previous read.
    pub fn sample(&mut self) -> PointerSample {
        let previous = self.sampled.unwrap_or(self.latest);
        let delta = [self.latest[0] - previous[0], self.latest[1] - previous[1]];
        let interacted = self.moved_since_sample;
        self.sampled = Some(self.latest);
        self.moved_since_sample = false;
        PointerSample {
            position: self.latest,
            delta,
            interacted,
        }
    }

    /// Latest position without consuming the per-frame motion.
    pub fn position(&self) -> [f32; 2] {
        self.latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(width: u32, height: u32) -> PhysicalSize<u32> {
        PhysicalSize::new(width, height)
    }

    #[test]
    fn defaults_to_center_before_input() {
        let mut feed = PointerFeed::new(false);
        let sample = feed.sample();
        assert_eq!(sample.position, POINTER_CENTER);
        assert_eq!(sample.delta, [0.0, 0.0]);
        assert!(!sample.interacted);
    }

    #[test]
    fn normalizes_against_bounds() {
        let mut feed = PointerFeed::new(false);
        feed.record(200.0, 150.0, bounds(800, 600));
        let sample = feed.sample();
        assert!((sample.position[0] - 0.25).abs() < 1e-6);
        assert!((sample.position[1] - 0.25).abs() < 1e-6);
        assert!(sample.interacted);
    }

    #[test]
    fn inverts_y_axis_when_requested() {
        let mut feed = PointerFeed::new(true);
        feed.record(0.0, 0.0, bounds(100, 100));
        assert_eq!(feed.sample().position, [0.0, 1.0]);
    }

    #[test]
    fn last_write_wins_between_samples() {
        let mut feed = PointerFeed::new(false);
        feed.record(10.0, 10.0, bounds(100, 100));
        feed.record(90.0, 90.0, bounds(100, 100));
        let sample = feed.sample();
        assert_eq!(sample.position, [0.9, 0.9]);
    }

    #[test]
    fn delta_tracks_motion_between_frames() {
        let mut feed = PointerFeed::new(false);
        feed.record(50.0, 50.0, bounds(100, 100));
        feed.sample();
        feed.record(75.0, 50.0, bounds(100, 100));
        let sample = feed.sample();
        assert!((sample.delta[0] - 0.25).abs() < 1e-6);
        assert_eq!(sample.delta[1], 0.0);

        let idle = feed.sample();
        assert_eq!(idle.delta, [0.0, 0.0]);
        assert!(!idle.interacted);
    }

    #[test]
    fn positions_clamp_to_surface() {
        let mut feed = PointerFeed::new(false);
        feed.record(-20.0, 500.0, bounds(100, 100));
        assert_eq!(feed.sample().position, [0.0, 1.0]);
    }
}
