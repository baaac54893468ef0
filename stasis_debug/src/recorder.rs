// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-memory event recording with running statistics.
//!
//! [`RecorderSink`] implements [`TraceSink`], keeps every event as a
//! [`RecordedEvent`], and folds them into [`CacheStats`] as they arrive.
//! [`RecorderSink::take`] drains the log between frames so long sessions do
//! not accumulate unbounded memory.

use stasis_core::trace::{
    CheckEvent, CompositeEvent, ElementRedrawEvent, FallbackEvent, RepartitionEvent,
    TeardownEvent, TraceSink,
};

// ---------------------------------------------------------------------------
// RecordedEvent
// ---------------------------------------------------------------------------

/// A recorded trace event.
#[derive(Clone, Copy, Debug)]
pub enum RecordedEvent {
    /// An [`ElementRedrawEvent`].
    ElementRedraw(ElementRedrawEvent),
    /// A [`CheckEvent`].
    Check(CheckEvent),
    /// A [`FallbackEvent`].
    Fallback(FallbackEvent),
    /// A [`RepartitionEvent`].
    Repartition(RepartitionEvent),
    /// A [`CompositeEvent`].
    Composite(CompositeEvent),
    /// A [`TeardownEvent`].
    Teardown(TeardownEvent),
}

impl RecordedEvent {
    /// Frame counter of the event.
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        match self {
            Self::ElementRedraw(e) => e.frame_index,
            Self::Check(e) => e.frame_index,
            Self::Fallback(e) => e.frame_index,
            Self::Repartition(e) => e.frame_index,
            Self::Composite(e) => e.frame_index,
            Self::Teardown(e) => e.frame_index,
        }
    }
}

// ---------------------------------------------------------------------------
// CacheStats
// ---------------------------------------------------------------------------

/// Running totals over every event a [`RecorderSink`] has seen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Partition redraws into offscreen targets.
    pub redraws: u64,
    /// Redraws that produced no output.
    pub empty_redraws: u64,
    /// Readback snapshots issued.
    pub snapshots: u64,
    /// Comparisons consumed.
    pub checks: u64,
    /// Comparisons whose snapshots matched.
    pub matches: u64,
    /// Direct-draw fallbacks.
    pub fallbacks: u64,
    /// Composite draw calls.
    pub composite_draws: u64,
    /// Textures composited.
    pub composited_textures: u64,
    /// Partition set changes.
    pub repartitions: u64,
    /// Elements released.
    pub released_elements: u64,
    /// Blend requests rejected while drawing into targets.
    pub rejected_blends: u64,
}

impl CacheStats {
    /// Fraction of comparisons that matched, or `None` before the first one.
    #[must_use]
    pub fn match_ratio(&self) -> Option<f64> {
        (self.checks > 0).then(|| self.matches as f64 / self.checks as f64)
    }
}

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that records events in memory.
#[derive(Debug, Default)]
pub struct RecorderSink {
    events: Vec<RecordedEvent>,
    stats: CacheStats,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded events, oldest first.
    #[must_use]
    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    /// Totals since creation. Not reset by [`take`](Self::take).
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Drains the recorded events.
    pub fn take(&mut self) -> Vec<RecordedEvent> {
        core::mem::take(&mut self.events)
    }
}

impl TraceSink for RecorderSink {
    fn on_element_redraw(&mut self, e: &ElementRedrawEvent) {
        self.stats.redraws += 1;
        self.stats.empty_redraws += u64::from(e.empty);
        self.stats.snapshots += u64::from(e.snapshot);
        self.stats.rejected_blends += u64::from(e.rejected_blends);
        self.events.push(RecordedEvent::ElementRedraw(*e));
    }

    fn on_check(&mut self, e: &CheckEvent) {
        self.stats.checks += 1;
        self.stats.matches += u64::from(e.matched);
        self.events.push(RecordedEvent::Check(*e));
    }

    fn on_fallback(&mut self, e: &FallbackEvent) {
        self.stats.fallbacks += 1;
        self.events.push(RecordedEvent::Fallback(*e));
    }

    fn on_repartition(&mut self, e: &RepartitionEvent) {
        self.stats.repartitions += 1;
        self.events.push(RecordedEvent::Repartition(*e));
    }

    fn on_composite(&mut self, e: &CompositeEvent) {
        self.stats.composite_draws += e.draws as u64;
        self.stats.composited_textures += e.textures as u64;
        self.events.push(RecordedEvent::Composite(*e));
    }

    fn on_teardown(&mut self, e: &TeardownEvent) {
        self.stats.released_elements += e.elements as u64;
        self.events.push(RecordedEvent::Teardown(*e));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
