//! Autonomous idle motion for the ether effect.
//!
//! When the pointer goes quiet for `resume_delay`, a virtual pointer starts
//! wandering the surface along two decorrelated value-noise walks and its
//! influence fades in over `ramp_duration`. Real input fades it back out over
//! `takeover_duration`: a timed crossfade in both directions, never a cut.
//! Everything is driven by elapsed seconds from the frame clock so tests can
//! simulate time directly.

use renderer::{FadeCurve, FadeEnvelope};

use crate::noise::value_noise;

/// Wander path frequency relative to `speed`.
const WANDER_RATE: f32 = 0.35;

/// Margin kept between the wander path and the surface edges.
const WANDER_INSET: f32 = 0.12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdleConfig {
    /// Seconds of pointer silence before autonomous motion ramps in.
    pub resume_delay: f32,
    /// Seconds for the ramp-in crossfade.
    pub ramp_duration: f32,
    /// Seconds for the ramp-out crossfade when real input resumes.
    pub takeover_duration: f32,
    /// Wander speed multiplier.
    pub speed: f32,
    /// Force gain applied to the wandering pointer.
    pub intensity: f32,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            resume_delay: 2.5,
            ramp_duration: 0.6,
            takeover_duration: 0.25,
            speed: 0.5,
            intensity: 2.2,
        }
    }
}

/// One running crossfade between two strength levels.
struct Fade {
    envelope: FadeEnvelope,
    from: f32,
    to: f32,
}

/// Crossfading driver for the autonomous pointer.
pub struct IdleDriver {
    config: IdleConfig,
    last_input: f32,
    level: f32,
    fade: Option<Fade>,
}

impl IdleDriver {
    pub fn new(config: IdleConfig) -> Self {
        Self {
            config,
            last_input: 0.0,
            level: 0.0,
            fade: None,
        }
    }

    pub fn config(&self) -> IdleConfig {
        self.config
    }

    pub fn set_config(&mut self, config: IdleConfig) {
        self.config = config;
    }

    /// Marks real pointer input at `now` seconds, which suppresses the
    /// autonomous pointer within one takeover window.
    pub fn note_input(&mut self, now: f32) {
        self.last_input = now;
    }

    /// Advances the crossfade and returns the idle strength in `[0, 1]`.
    pub fn update(&mut self, now: f32) -> f32 {
        let target = if now - self.last_input >= self.config.resume_delay {
            1.0
        } else {
            0.0
        };

        let heading = self.fade.as_ref().map_or(self.level, |fade| fade.to);
        if (target - heading).abs() > f32::EPSILON {
            // Retarget over the remaining distance so an interrupted ramp
            // reverses from its current level, not from an endpoint.
            let full = if target > self.level {
                self.config.ramp_duration
            } else {
                self.config.takeover_duration
            };
            let duration = full * (target - self.level).abs();
            self.fade = FadeEnvelope::new(now, duration, FadeCurve::Smoothstep).map(|envelope| {
                Fade {
                    envelope,
                    from: self.level,
                    to: target,
                }
            });
            if self.fade.is_none() {
                // Zero-length fade: snap.
                self.level = target;
            }
        }

        if let Some(fade) = &self.fade {
            let (progress, finished) = fade.envelope.progress(now);
            self.level = fade.from + (fade.to - fade.from) * progress;
            if finished {
                self.level = fade.to;
                self.fade = None;
            }
        }
        self.level
    }

    /// Current strength without advancing the fade.
    pub fn strength(&self) -> f32 {
        self.level
    }

    /// Wandering pointer position at `now`, normalized to `[0, 1]²` and kept
    /// away from the edges.
    pub fn wander(&self, now: f32) -> [f32; 2] {
        let t = now * self.config.speed * WANDER_RATE;
        let span = 1.0 - 2.0 * WANDER_INSET;
        [
            WANDER_INSET + value_noise(t, 37.7) * span,
            WANDER_INSET + value_noise(t + 13.1, 91.3) * span,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: f32 = 1.0 / 60.0;

    fn run(driver: &mut IdleDriver, from: f32, to: f32) -> f32 {
        let mut now = from;
        let mut strength = driver.strength();
        while now < to {
            now += FRAME;
            strength = driver.update(now);
        }
        strength
    }

    #[test]
    fn autonomous_motion_is_active_after_resume_delay() {
        // Defaults: motion resumes after 2.5 s of silence, ramping over 0.6 s.
        let mut driver = IdleDriver::new(IdleConfig::default());
        let strength = run(&mut driver, 0.0, 3.0);
        assert!(
            strength > 0.5,
            "idle strength should be ramped in after 3 s of silence, got {strength}"
        );
    }

    #[test]
    fn input_during_idle_suppresses_within_one_takeover_window() {
        let mut driver = IdleDriver::new(IdleConfig::default());
        let ramped = run(&mut driver, 0.0, 4.0);
        assert!(ramped > 0.9);

        driver.note_input(4.0);
        let takeover = driver.config().takeover_duration;
        let strength = run(&mut driver, 4.0, 4.0 + takeover + 2.0 * FRAME);
        assert!(
            strength < 0.05,
            "idle strength should fade out within {takeover} s, got {strength}"
        );
    }

    #[test]
    fn no_autonomous_motion_before_resume_delay() {
        let mut driver = IdleDriver::new(IdleConfig::default());
        let strength = run(&mut driver, 0.0, 2.0);
        assert_eq!(strength, 0.0);
    }

    #[test]
    fn fades_are_gradual_not_cuts() {
        let mut driver = IdleDriver::new(IdleConfig::default());
        let strength = run(&mut driver, 0.0, 2.7);
        // A third of the way into the ramp the strength must be partial.
        assert!(strength > 0.0 && strength < 0.5, "got {strength}");
    }

    #[test]
    fn interrupted_ramp_reverses_from_its_current_level() {
        let mut driver = IdleDriver::new(IdleConfig::default());
        run(&mut driver, 0.0, 2.8);
        let partial = driver.strength();
        assert!(partial > 0.0 && partial < 1.0, "got {partial}");

        driver.note_input(2.8);
        driver.update(2.8 + FRAME);
        let after = driver.update(2.8 + 4.0 * FRAME);
        assert!(
            after > 0.0 && after < partial,
            "fade-out should start from {partial}, got {after}"
        );
    }

    #[test]
    fn wander_path_stays_inside_the_surface() {
        let driver = IdleDriver::new(IdleConfig::default());
        let mut at = 0.0;
        while at < 60.0 {
            let [x, y] = driver.wander(at);
            assert!((0.0..=1.0).contains(&x));
            assert!((0.0..=1.0).contains(&y));
            at += 0.25;
        }
    }

    #[test]
    fn wander_path_moves_over_time() {
        let driver = IdleDriver::new(IdleConfig::default());
        let a = driver.wander(10.0);
        let b = driver.wander(11.0);
        assert_ne!(a, b);
    }
}
