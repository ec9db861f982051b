use std::path::PathBuf;
use std::time::Instant;

/// High-level behaviour requested by the caller.
///
/// The render policy decides whether frames should animate continuously,
/// be evaluated at a fixed timestamp, or be exported to disk.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderPolicy {
    /// Run the render loop continuously, optionally clamping the frame rate.
    Animate {
        /// Optional requested frames-per-second cap.
        target_fps: Option<f32>,
    },
    /// Render a single still frame at an optional timestamp.
    Still {
        /// Specific timestamp to evaluate the effect at (seconds).
        time: Option<f32>,
    },
    /// Render a frame at an optional timestamp and write the result to disk.
    Export {
        /// Specific timestamp to evaluate the effect at (seconds).
        time: Option<f32>,
        /// Destination path for the exported PNG.
        path: PathBuf,
    },
}

impl Default for RenderPolicy {
    fn default() -> Self {
        Self::Animate { target_fps: None }
    }
}

/// Snapshot of the time state supplied to per-frame updates.
///
/// `delta` is measured, never assumed: the host's refresh mechanism decides
/// wake timing, so motion must scale by the observed frame gap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    /// Elapsed wall-clock or simulated time in seconds.
    pub seconds: f32,
    /// Seconds since the previous sample (zero on the first frame).
    pub delta: f32,
    /// Monotonic frame counter for the running session.
    pub frame_index: u64,
}

impl TimeSample {
    pub fn new(seconds: f32, delta: f32, frame_index: u64) -> Self {
        Self {
            seconds,
            delta,
            frame_index,
        }
    }
}

/// Abstraction over where time values originate from.
pub trait TimeSource {
    /// Resets the source to its initial state.
    fn reset(&mut self);
    /// Produces a time sample for the next frame.
    fn sample(&mut self) -> TimeSample;
}

/// Time source backed by the system monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
    last: Instant,
    frame: u64,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        let now = Instant::now();
        Self {
            origin: now,
            last: now,
            frame: 0,
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn reset(&mut self) {
        let now = Instant::now();
        self.origin = now;
        self.last = now;
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let now = Instant::now();
        if self.frame == 0 {
            // The first frame anchors the clock so mount latency never shows
            // up as a jump in elapsed time.
            self.origin = now;
            self.last = now;
        }
        let seconds = now.duration_since(self.origin).as_secs_f32();
        let delta = now.duration_since(self.last).as_secs_f32();
        self.last = now;
        let sample = TimeSample::new(seconds, delta, self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Time source that always reports a fixed timestamp.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource {
    time: f32,
}

impl FixedTimeSource {
    pub fn new(time: f32) -> Self {
        Self { time }
    }

    pub fn time(&self) -> f32 {
        self.time
    }
}

impl TimeSource for FixedTimeSource {
    fn reset(&mut self) {}

    fn sample(&mut self) -> TimeSample {
        TimeSample::new(self.time, 0.0, 0)
    }
}

/// Convenient alias for owning time sources behind trait objects.
pub type BoxedTimeSource = Box<dyn TimeSource>;

/// Builds a time source suited to the requested render policy.
pub fn time_source_for_policy(policy: &RenderPolicy) -> BoxedTimeSource {
    match policy {
        RenderPolicy::Animate { .. } => Box::new(SystemTimeSource::new()),
        RenderPolicy::Still { time } | RenderPolicy::Export { time, .. } => {
            Box::new(FixedTimeSource::new(time.unwrap_or(0.0)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_source_counts_frames() {
        let mut source = SystemTimeSource::new();
        let first = source.sample();
        let second = source.sample();
        assert_eq!(first.frame_index, 0);
        assert_eq!(second.frame_index, 1);
        assert!(second.seconds >= first.seconds);
    }

    #[test]
    fn fixed_source_repeats_timestamp() {
        let mut source = FixedTimeSource::new(2.5);
        let a = source.sample();
        let b = source.sample();
        assert_eq!(a.seconds, 2.5);
        assert_eq!(b.seconds, 2.5);
        assert_eq!(b.delta, 0.0);
    }

    #[test]
    fn policy_selects_matching_source() {
        let mut still = time_source_for_policy(&RenderPolicy::Still { time: Some(7.0) });
        assert_eq!(still.sample().seconds, 7.0);

        let mut animate = time_source_for_policy(&RenderPolicy::default());
        assert_eq!(animate.sample().frame_index, 0);
    }
}
