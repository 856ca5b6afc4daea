//! Exponentially decaying counter

use std::time::Instant;

/// Values below this are snapped to zero on every decay
const ZERO_THRESHOLD: f64 = 0.01;

/// A counter whose value halves every `half_life` seconds
///
/// With an infinite half-life the counter never decays and behaves like a
/// plain accumulator.
#[derive(Clone, Debug)]
pub struct DecayCounter {
    /// `ln(0.5) / half_life`
    k: f64,
    value: f64,
    last_decay: Instant,
}

impl DecayCounter {
    /// Create a zeroed counter with the given half-life in seconds
    #[must_use]
    pub fn new(half_life_secs: f64) -> Self {
        Self {
            k: 0.5_f64.ln() / half_life_secs,
            value: 0.0,
            last_decay: Instant::now(),
        }
    }

    /// Half-life in seconds
    #[must_use]
    pub fn half_life(&self) -> f64 {
        0.5_f64.ln() / self.k
    }

    /// Stop decaying; the counter becomes a plain accumulator
    pub const fn disable_decay(&mut self) {
        self.k = 0.0;
    }

    /// Zero the counter and restart its clock
    pub fn reset(&mut self) {
        self.reset_at(Instant::now());
    }

    pub const fn reset_at(&mut self, now: Instant) {
        self.value = 0.0;
        self.last_decay = now;
    }

    /// Decayed value as of now
    pub fn get(&mut self) -> f64 {
        self.get_at(Instant::now())
    }

    pub fn get_at(&mut self, now: Instant) -> f64 {
        self.decay(now, 0.0);
        self.value
    }

    /// Value as of the last decay, without decaying
    #[must_use]
    pub const fn get_raw(&self) -> f64 {
        self.value
    }

    /// Time of the last decay
    #[must_use]
    pub const fn last_decay(&self) -> Instant {
        self.last_decay
    }

    /// Decay, then add `delta`
    pub fn increment(&mut self, delta: f64) -> f64 {
        self.increment_at(Instant::now(), delta)
    }

    pub fn increment_at(&mut self, now: Instant, delta: f64) -> f64 {
        self.decay(now, delta);
        self.value
    }

    /// Decay, then add one
    pub fn hit(&mut self) -> f64 {
        self.increment(1.0)
    }

    pub fn hit_at(&mut self, now: Instant) -> f64 {
        self.increment_at(now, 1.0)
    }

    /// Multiply the current value; the clock is left untouched
    pub fn scale(&mut self, factor: f64) -> f64 {
        self.value *= factor;
        self.value
    }

    fn decay(&mut self, now: Instant, delta: f64) {
        let elapsed = now.saturating_duration_since(self.last_decay).as_secs_f64();
        // k == 0 must not turn `0 * inf` into NaN
        let factor = if self.k == 0.0 {
            1.0
        } else {
            (elapsed * self.k).exp()
        };

        let mut value = self.value * factor + delta;
        if value < ZERO_THRESHOLD {
            value = 0.0;
        }
        self.value = value;
        self.last_decay = now;
    }
}
