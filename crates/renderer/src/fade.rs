//! Fade shaping for timed transitions (idle crossfades, effect ramps).
//!
//! Envelopes are driven by elapsed seconds supplied by the caller rather than
//! wall-clock instants, so simulated time in tests behaves exactly like the
//! render loop.

/// Easing applied to a fade's progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FadeCurve {
    Linear,
    #[default]
    Smoothstep,
    EaseInOut,
}

impl FadeCurve {
    /// Maps raw progress in `[0, 1]` through the curve.
    pub fn sample(self, t: f32) -> f32 {
        let clamped = t.clamp(0.0, 1.0);
        match self {
            FadeCurve::Linear => clamped,
            FadeCurve::Smoothstep => clamped * clamped * (3.0 - 2.0 * clamped),
            FadeCurve::EaseInOut => {
                if clamped < 0.5 {
                    2.0 * clamped * clamped
                } else {
                    -1.0 + (4.0 - 2.0 * clamped) * clamped
                }
            }
        }
    }
}

/// A one-shot fade from 0 to 1 over a fixed duration.
pub struct FadeEnvelope {
    start: f32,
    duration: f32,
    curve: FadeCurve,
}

impl FadeEnvelope {
    /// Returns `None` for non-positive durations, which would otherwise pin
    /// progress at the start value forever.
    pub fn new(start_seconds: f32, duration_seconds: f32, curve: FadeCurve) -> Option<Self> {
        if duration_seconds <= 0.0 {
            None
        } else {
            Some(Self {
                start: start_seconds,
                duration: duration_seconds,
                curve,
            })
        }
    }

    /// Shaped progress at `now_seconds` and whether the fade completed.
    pub fn progress(&self, now_seconds: f32) -> (f32, bool) {
        let raw = (now_seconds - self.start) / self.duration.max(f32::EPSILON);
        (self.curve.sample(raw), raw >= 1.0)
    }
}
