// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Monotonic host time and frequency-derived intervals.
//!
//! [`HostTime`] is a point on a monotonic clock in nanoseconds. The clock
//! itself is provided by backend crates (e.g. `stasis_backend_wgpu::now()`);
//! this crate never reads a clock on its own.
//!
//! [`Duration`] is a span in the same nanosecond units. Schedules are built
//! from frequencies (updates per second) via [`Duration::from_frequency`] and
//! advanced with [`HostTime::advance_past`], which catches up after long
//! stalls instead of firing a burst of overdue events.

use core::fmt;
use core::ops::{Add, Sub};

/// Nanoseconds per second.
pub const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// A point in time on a monotonic clock, in nanoseconds.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HostTime(pub u64);

impl HostTime {
    /// Returns the raw nanosecond value.
    #[inline]
    #[must_use]
    pub const fn nanos(self) -> u64 {
        self.0
    }

    /// Returns the duration between `self` and an earlier time, or zero if
    /// `earlier` is after `self`.
    #[inline]
    #[must_use]
    pub const fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration(self.0.saturating_sub(earlier.0))
    }

    /// Checked addition of a duration.
    #[inline]
    #[must_use]
    pub const fn checked_add(self, duration: Duration) -> Option<Self> {
        match self.0.checked_add(duration.0) {
            Some(t) => Some(Self(t)),
            None => None,
        }
    }

    /// Saturating addition of a duration.
    #[inline]
    #[must_use]
    pub const fn saturating_add(self, duration: Duration) -> Self {
        Self(self.0.saturating_add(duration.0))
    }

    /// Advances `self` by whole multiples of `interval` until it lies strictly
    /// after `now`.
    ///
    /// A time already after `now` is returned unchanged. The number of steps
    /// is computed directly, so a schedule that fell hours behind (e.g. while
    /// a window was minimized) lands on the first slot after `now` in constant
    /// time. A zero interval is treated as one nanosecond.
    #[inline]
    #[must_use]
    pub const fn advance_past(self, now: Self, interval: Duration) -> Self {
        if self.0 > now.0 {
            return self;
        }
        let step = if interval.0 == 0 { 1 } else { interval.0 };
        let behind = now.0 - self.0;
        let steps = behind / step + 1;
        Self(self.0.saturating_add(steps.saturating_mul(step)))
    }
}

impl Add<Duration> for HostTime {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub<Duration> for HostTime {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Duration) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Sub for HostTime {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: Self) -> Duration {
        Duration(self.0 - rhs.0)
    }
}

impl fmt::Debug for HostTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostTime({})", self.0)
    }
}

/// A duration in nanoseconds.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration(pub u64);

impl Duration {
    /// A zero-length duration.
    pub const ZERO: Self = Self(0);

    /// Returns the raw nanosecond value.
    #[inline]
    #[must_use]
    pub const fn nanos(self) -> u64 {
        self.0
    }

    /// Converts a frequency in updates per second into the interval between
    /// updates, `floor(1e9 / frequency)` nanoseconds.
    ///
    /// Non-finite or non-positive frequencies yield [`Duration::ZERO`]; very
    /// small frequencies saturate at `u64::MAX`.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "value is floored, finite and clamped to the u64 range before the cast"
    )]
    pub fn from_frequency(frequency: f64) -> Self {
        if !frequency.is_finite() || frequency <= 0.0 {
            return Self::ZERO;
        }
        let nanos = libm::floor(NANOS_PER_SECOND as f64 / frequency);
        if nanos >= u64::MAX as f64 {
            Self(u64::MAX)
        } else {
            Self(nanos as u64)
        }
    }

    /// Scales this duration by a factor in `[0, 1)`, flooring the result.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "fraction is clamped to [0, 1] so the product fits in u64"
    )]
    pub fn scaled(self, fraction: f64) -> Self {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self(libm::floor(self.0 as f64 * fraction) as u64)
    }

    /// Saturating addition.
    #[inline]
    #[must_use]
    pub const fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    /// Saturating subtraction.
    #[inline]
    #[must_use]
    pub const fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Add for Duration {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Duration {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl fmt::Debug for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Duration({})", self.0)
    }
}

/// Timing information handed to layer callbacks each frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameInfo {
    /// Host time at which the frame started.
    pub now: HostTime,
    /// Time elapsed since the previous frame.
    pub delta: Duration,
}

impl FrameInfo {
    /// Creates frame timing information.
    #[must_use]
    pub const fn new(now: HostTime, delta: Duration) -> Self {
        Self { now, delta }
    }
}
