// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render cache configuration.
//!
//! [`CacheConfig`] collects the user-tunable bounds of the redraw scheduler
//! and the partitioning parameters of the orchestrator. Presets are `const`
//! so hosts can embed them in statics; [`CacheConfig::validated`] repairs
//! values loaded from untrusted sources.
//!
//! The runtime kill switch is separate: a [`DisableSource`] is polled once
//! per frame so that settings screens and server-delivered rule flags can
//! turn caching off without rebuilding the configuration.

/// Configuration for a [`RenderCache`](crate::cache::RenderCache).
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CacheConfig {
    /// Master switch. When `false` every layer is drawn directly.
    pub enabled: bool,
    /// Lowest redraw frequency (updates per second) a static partition
    /// decays to. Also the baseline readback check frequency.
    pub min_render_frequency: f64,
    /// Redraw frequency (updates per second) a partition returns to as soon
    /// as its content is observed to change.
    pub max_render_frequency: f64,
    /// Number of partitions the flattened layer list is chunked into.
    pub partition_count: usize,
    /// Consecutive matching checks before the check frequency slows down.
    pub stable_streak_threshold: u32,
    /// Consecutive changing checks before the check frequency slows down.
    pub volatile_streak_threshold: u32,
    /// Consecutive changing checks after which an element is reported as
    /// often changing.
    pub often_changing_threshold: u32,
    /// Upper bound of the check frequency slowdown divisor.
    pub max_check_slowdown: u32,
    /// Whether partitions are split and merged based on observed volatility.
    pub adaptive_partitioning: bool,
    /// Consecutive matching checks both neighbours need before they are
    /// merged by adaptive partitioning.
    pub merge_streak_threshold: u32,
    /// Seed for the initial check-time jitter.
    pub jitter_seed: u64,
}

impl CacheConfig {
    /// Default configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            enabled: true,
            min_render_frequency: 20.0,
            max_render_frequency: 60.0,
            partition_count: 4,
            stable_streak_threshold: 10,
            volatile_streak_threshold: 10,
            often_changing_threshold: 20,
            max_check_slowdown: 5,
            adaptive_partitioning: false,
            merge_streak_threshold: 20,
            jitter_seed: 0x5EED_CAFE,
        }
    }

    /// A configuration that favours freshness: static content never decays
    /// below 30 updates per second and checks are never slowed down.
    #[must_use]
    pub const fn conservative() -> Self {
        Self {
            min_render_frequency: 30.0,
            max_check_slowdown: 1,
            ..Self::new()
        }
    }

    /// Returns a copy with out-of-range values repaired.
    ///
    /// Non-finite or non-positive frequencies fall back to the defaults,
    /// `min` is clamped to `max`, and counts are raised to at least one.
    #[must_use]
    pub fn validated(mut self) -> Self {
        let defaults = Self::new();
        if !self.max_render_frequency.is_finite() || self.max_render_frequency <= 0.0 {
            self.max_render_frequency = defaults.max_render_frequency;
        }
        if !self.min_render_frequency.is_finite() || self.min_render_frequency <= 0.0 {
            self.min_render_frequency = defaults.min_render_frequency;
        }
        if self.min_render_frequency > self.max_render_frequency {
            self.min_render_frequency = self.max_render_frequency;
        }
        self.partition_count = self.partition_count.max(1);
        self.stable_streak_threshold = self.stable_streak_threshold.max(1);
        self.volatile_streak_threshold = self.volatile_streak_threshold.max(1);
        self.often_changing_threshold = self.often_changing_threshold.max(1);
        self.max_check_slowdown = self.max_check_slowdown.max(1);
        self.merge_streak_threshold = self.merge_streak_threshold.max(1);
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Reports whether caching must be bypassed for the current frame.
///
/// Implemented for any `Fn() -> bool`, so a closure reading a settings flag
/// or a server rule can be passed directly.
pub trait DisableSource {
    /// Returns `true` when every layer must be drawn directly this frame.
    fn is_caching_disabled(&self) -> bool;
}

impl<F: Fn() -> bool> DisableSource for F {
    fn is_caching_disabled(&self) -> bool {
        self()
    }
}

/// A [`DisableSource`] that never disables caching.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverDisabled;

impl DisableSource for NeverDisabled {
    fn is_caching_disabled(&self) -> bool {
        false
    }
}
