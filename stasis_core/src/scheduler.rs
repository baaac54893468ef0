// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Self-tuning redraw and check scheduling for one cache element.
//!
//! The [`CacheScheduler`] owns two frequencies, both in updates per second:
//!
//! - the *render frequency*, how often the element redraws its layers into
//!   its offscreen target, bounded by the configured min and max;
//! - the *check frequency*, how often a readback snapshot is taken to find
//!   out whether redrawing changed anything.
//!
//! Each completed comparison is fed to [`CacheScheduler::observe`]:
//!
//! | Outcome | Render frequency | Streak | Check frequency |
//! |---------|------------------|--------|-----------------|
//! | matched | halved, floored at min | `min(-1, streak - 1)` | `min / clamp(-streak / stable_threshold)` |
//! | changed | reset to max | `max(1, streak + 1)` | `min / clamp(streak / volatile_threshold)` |
//!
//! where `clamp` limits the divisor to `1..=max_check_slowdown`. Staleness
//! is visible and wasted work is not, so decay is slow and recovery
//! immediate.

use crate::config::CacheConfig;
use crate::time::{Duration, HostTime};

/// Redraw and check schedule of one cache element.
#[derive(Clone, Debug)]
pub struct CacheScheduler {
    min_frequency: f64,
    max_frequency: f64,
    stable_threshold: u32,
    volatile_threshold: u32,
    often_changing_threshold: u32,
    max_check_slowdown: u32,

    render_frequency: f64,
    check_frequency: f64,
    /// Negative: consecutive matching checks. Positive: consecutive changes.
    streak: i32,
    needs_redraw: bool,
    next_render: Option<HostTime>,
    next_check: HostTime,
}

impl CacheScheduler {
    /// Creates a schedule that redraws immediately at the maximum frequency.
    ///
    /// The first check is scheduled at `now + jitter * check_interval`, with
    /// `jitter` in `[0, 1)`, so that elements created together spread their
    /// readbacks over several frames.
    #[must_use]
    pub fn new(config: &CacheConfig, now: HostTime, jitter: f64) -> Self {
        let check_frequency = config.min_render_frequency;
        Self {
            min_frequency: config.min_render_frequency,
            max_frequency: config.max_render_frequency,
            stable_threshold: config.stable_streak_threshold.max(1),
            volatile_threshold: config.volatile_streak_threshold.max(1),
            often_changing_threshold: config.often_changing_threshold,
            max_check_slowdown: config.max_check_slowdown.max(1),
            render_frequency: config.max_render_frequency,
            check_frequency,
            streak: 0,
            needs_redraw: true,
            next_render: None,
            next_check: now.saturating_add(Duration::from_frequency(check_frequency).scaled(jitter)),
        }
    }

    /// Applies the outcome of a snapshot comparison.
    pub fn observe(&mut self, matched: bool) {
        let divisor = if matched {
            self.render_frequency = (self.render_frequency / 2.0).max(self.min_frequency);
            self.streak = (self.streak.saturating_sub(1)).min(-1);
            self.streak.unsigned_abs() / self.stable_threshold
        } else {
            self.render_frequency = self.max_frequency;
            self.streak = (self.streak.saturating_add(1)).max(1);
            self.streak.unsigned_abs() / self.volatile_threshold
        };
        let divisor = divisor.clamp(1, self.max_check_slowdown);
        self.check_frequency = self.min_frequency / f64::from(divisor);
    }

    /// Whether the element should redraw at `now`.
    ///
    /// `forced` is set when a governing group's visibility flipped this
    /// frame; it overrides the schedule.
    #[must_use]
    pub fn redraw_due(&self, now: HostTime, forced: bool) -> bool {
        forced || self.needs_redraw || self.next_render.is_none_or(|next| next <= now)
    }

    /// Records a redraw at `now` and schedules the next one.
    pub fn mark_rendered(&mut self, now: HostTime) {
        self.needs_redraw = false;
        let interval = Duration::from_frequency(self.render_frequency);
        self.next_render = Some(match self.next_render {
            None => now.saturating_add(interval),
            Some(next) => next.advance_past(now, interval),
        });
    }

    /// Whether a snapshot should be taken at `now`.
    #[must_use]
    pub fn check_due(&self, now: HostTime) -> bool {
        self.next_check <= now
    }

    /// Records a snapshot at `now` and schedules the next check.
    pub fn mark_checked(&mut self, now: HostTime) {
        let interval = Duration::from_frequency(self.check_frequency);
        self.next_check = self.next_check.advance_past(now, interval);
    }

    /// Forces a redraw on the next update regardless of the schedule.
    pub fn request_redraw(&mut self) {
        self.needs_redraw = true;
    }

    /// Current render frequency in updates per second.
    #[must_use]
    pub fn render_frequency(&self) -> f64 {
        self.render_frequency
    }

    /// Current check frequency in updates per second.
    #[must_use]
    pub fn check_frequency(&self) -> f64 {
        self.check_frequency
    }

    /// Signed streak counter: negative for consecutive matching checks,
    /// positive for consecutive changes.
    #[must_use]
    pub fn streak(&self) -> i32 {
        self.streak
    }

    /// Number of consecutive matching checks, or zero during a volatile
    /// streak.
    #[must_use]
    pub fn stable_streak(&self) -> u32 {
        if self.streak < 0 {
            self.streak.unsigned_abs()
        } else {
            0
        }
    }

    /// Whether content changed on enough consecutive checks to be worth
    /// isolating in its own partition.
    #[must_use]
    pub fn is_often_changing(&self) -> bool {
        self.streak > 0 && self.streak.unsigned_abs() >= self.often_changing_threshold
    }

    /// Next scheduled redraw, if one has been scheduled.
    #[must_use]
    pub fn next_render(&self) -> Option<HostTime> {
        self.next_render
    }

    /// Next scheduled check.
    #[must_use]
    pub fn next_check(&self) -> HostTime {
        self.next_check
    }
}
