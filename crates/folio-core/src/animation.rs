#![forbid(unsafe_code)]

//! Easing curves and the smooth-scroll tween.
//!
//! Progress is always derived from host-supplied timestamps, never from a
//! wall clock, so a replayed sequence of frames yields the same positions.

use core::time::Duration;

/// Easing function signature: maps `t` in [0, 1] to output in [0, 1].
pub type EasingFn = fn(f64) -> f64;

/// Identity easing (constant velocity).
#[inline]
#[must_use]
pub fn linear(t: f64) -> f64 {
    t.clamp(0.0, 1.0)
}

/// Quadratic ease-in-out (slow start and end).
///
/// `2t²` below the midpoint, `1 - (-2t + 2)² / 2` above it.
#[inline]
#[must_use]
pub fn ease_in_out(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        2.0 * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
    }
}

/// One sample of a running tween.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollSample {
    /// Scroll offset to write this frame.
    pub position: f64,
    /// Raw (un-eased) progress in [0, 1].
    pub progress: f64,
    /// Whether this is the final sample.
    pub finished: bool,
}

/// Tween of a scroll offset from `from` to `to` over a fixed duration.
///
/// The tween starts at the timestamp given to [`SmoothScroll::new`]; samples
/// taken before that instant report the start position.
#[derive(Debug, Clone, Copy)]
pub struct SmoothScroll {
    from: f64,
    to: f64,
    started_at: Duration,
    duration: Duration,
    easing: EasingFn,
}

impl SmoothScroll {
    /// Create a tween with the default ease-in-out curve.
    #[must_use]
    pub fn new(from: f64, to: f64, started_at: Duration, duration: Duration) -> Self {
        Self {
            from,
            to,
            started_at,
            duration: if duration.is_zero() {
                Duration::from_nanos(1)
            } else {
                duration
            },
            easing: ease_in_out,
        }
    }

    /// Set the easing function.
    #[must_use]
    pub fn easing(mut self, easing: EasingFn) -> Self {
        self.easing = easing;
        self
    }

    /// Start offset.
    #[must_use]
    pub const fn start_offset(&self) -> f64 {
        self.from
    }

    /// Target offset.
    #[must_use]
    pub const fn target(&self) -> f64 {
        self.to
    }

    /// Total tween duration.
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }

    /// Timestamp at which the tween ends.
    #[must_use]
    pub fn ends_at(&self) -> Duration {
        self.started_at.saturating_add(self.duration)
    }

    /// Raw progress at `now`, in [0, 1].
    #[must_use]
    pub fn progress_at(&self, now: Duration) -> f64 {
        let elapsed = now.saturating_sub(self.started_at);
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0)
    }

    /// Sample the tween at `now`.
    ///
    /// The final sample lands exactly on the target.
    #[must_use]
    pub fn sample(&self, now: Duration) -> ScrollSample {
        let progress = self.progress_at(now);
        if progress >= 1.0 {
            return ScrollSample {
                position: self.to,
                progress: 1.0,
                finished: true,
            };
        }
        let eased = (self.easing)(progress);
        ScrollSample {
            position: self.from + (self.to - self.from) * eased,
            progress,
            finished: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn ease_in_out_endpoints_and_midpoint() {
        assert_eq!(ease_in_out(0.0), 0.0);
        assert_eq!(ease_in_out(1.0), 1.0);
        assert!((ease_in_out(0.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn ease_in_out_quarter_points() {
        assert!((ease_in_out(0.25) - 0.125).abs() < 1e-12);
        assert!((ease_in_out(0.75) - 0.875).abs() < 1e-12);
    }

    #[test]
    fn ease_in_out_clamps_out_of_range() {
        assert_eq!(ease_in_out(-3.0), 0.0);
        assert_eq!(ease_in_out(7.5), 1.0);
        assert_eq!(linear(2.0), 1.0);
    }

    #[test]
    fn tween_reports_start_before_first_elapsed_time() {
        let tween = SmoothScroll::new(100.0, 500.0, ms(1_000), ms(400));
        let s = tween.sample(ms(900));
        assert_eq!(s.position, 100.0);
        assert!(!s.finished);
    }

    #[test]
    fn tween_midpoint_is_halfway() {
        let tween = SmoothScroll::new(0.0, 1800.0, ms(0), ms(400));
        let s = tween.sample(ms(200));
        assert!((s.position - 900.0).abs() < 1e-9);
        assert!((s.progress - 0.5).abs() < 1e-12);
    }

    #[test]
    fn tween_lands_exactly_on_target() {
        let tween = SmoothScroll::new(37.0, 1800.0, ms(10), ms(400));
        let s = tween.sample(ms(410));
        assert_eq!(s.position, 1800.0);
        assert!(s.finished);
        assert_eq!(tween.ends_at(), ms(410));
    }

    #[test]
    fn tween_scrolls_upwards() {
        let tween = SmoothScroll::new(1000.0, 0.0, ms(0), ms(100)).easing(linear);
        let s = tween.sample(ms(25));
        assert!((s.position - 750.0).abs() < 1e-9);
    }

    #[test]
    fn zero_duration_finishes_immediately() {
        let tween = SmoothScroll::new(0.0, 50.0, ms(5), Duration::ZERO);
        assert!(!tween.sample(ms(4)).finished);
        assert!(tween.sample(ms(6)).finished);
    }
}
