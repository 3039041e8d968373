use std::time::{Duration, Instant};

use crate::clock::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Easing {
    #[default]
    Linear,
    QuinticInOut,
}

impl Easing {
    pub fn apply(self, t: f32) -> f32 {
        match self {
            Easing::Linear => t,
            Easing::QuinticInOut => {
                if t < 0.5 {
                    16.0 * t.powi(5)
                } else {
                    let t = t - 1.0;
                    1.0 + 16.0 * t.powi(5)
                }
            }
        }
    }
}

/// Interpolates one value from `from` to `to` over `duration`, after an
/// optional delay.
#[derive(Debug, Clone)]
pub struct Tween {
    from: f32,
    to: f32,
    duration: Duration,
    delay: Duration,
    easing: Easing,
    clock: Clock,
}

impl Tween {
    pub fn new(from: f32, to: f32, duration: Duration) -> Self {
        Self {
            from,
            to,
            duration,
            delay: Duration::ZERO,
            easing: Easing::Linear,
            clock: Clock::new(false),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn start(&mut self, now: Instant) {
        self.clock.start(now);
    }

    pub fn is_started(&self) -> bool {
        self.clock.is_running()
    }

    pub fn progress(&mut self, now: Instant) -> f32 {
        if !self.clock.is_running() {
            return 0.0;
        }
        let elapsed = (self.clock.elapsed(now) - self.delay.as_secs_f32()).max(0.0);
        let duration = self.duration.as_secs_f32();
        if duration <= 0.0 {
            return 1.0;
        }
        (elapsed / duration).min(1.0)
    }

    pub fn sample(&mut self, now: Instant) -> (f32, bool) {
        let progress = self.progress(now);
        let t = self.easing.apply(progress);
        (self.from + (self.to - self.from) * t, progress >= 1.0)
    }
}
