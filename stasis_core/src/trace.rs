// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the render cache.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that
//! [`RenderCache::render_traced`](crate::cache::RenderCache::render_traced)
//! calls at each step of a frame. All method bodies default to no-ops, so
//! implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing (zero overhead). When
//! **on**, each method performs a single `Option` branch before dispatching.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Why layers were drawn directly instead of from a cached texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FallbackReason {
    /// Caching is disabled by configuration or a [`DisableSource`].
    ///
    /// [`DisableSource`]: crate::config::DisableSource
    Disabled,
    /// The partition's offscreen target could not be allocated.
    TargetUnavailable,
    /// The partition has not been drawn into its target yet.
    NoTexture,
}

/// Why cache elements were torn down.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TeardownReason {
    /// Caching was disabled.
    Disabled,
    /// The viewport size changed.
    Resize,
    /// The host called [`invalidate`](crate::cache::RenderCache::invalidate).
    Invalidate,
    /// The layer tree changed shape and partitions are rebuilt.
    Rebuild,
}

/// How the partition set changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RepartitionKind {
    /// Partitions were rebuilt from the flattened layer list.
    Rebuild,
    /// An often-changing partition was split in two.
    Split,
    /// Two stable neighbours were merged.
    Merge,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when a partition redraws into its offscreen target.
#[derive(Clone, Copy, Debug)]
pub struct ElementRedrawEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Partition position.
    pub partition: usize,
    /// Number of layers in the partition.
    pub layers: usize,
    /// Whether the redraw was forced by a visibility flip.
    pub forced: bool,
    /// Whether nothing was drawn.
    pub empty: bool,
    /// Whether a readback snapshot was issued.
    pub snapshot: bool,
    /// Blend requests rejected while drawing.
    pub rejected_blends: u32,
}

/// Emitted when a partition consumes a snapshot comparison.
#[derive(Clone, Copy, Debug)]
pub struct CheckEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Partition position.
    pub partition: usize,
    /// Whether the two snapshots matched.
    pub matched: bool,
    /// Render frequency after the comparison, in updates per second.
    pub render_frequency: f64,
    /// Check frequency after the comparison, in updates per second.
    pub check_frequency: f64,
    /// Signed streak counter after the comparison.
    pub streak: i32,
}

/// Emitted when layers are drawn directly.
#[derive(Clone, Copy, Debug)]
pub struct FallbackEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Partition position, or `None` when the whole tree is drawn directly.
    pub partition: Option<usize>,
    /// Why the cache was bypassed.
    pub reason: FallbackReason,
}

/// Emitted when the partition set changes.
#[derive(Clone, Copy, Debug)]
pub struct RepartitionEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// What happened.
    pub kind: RepartitionKind,
    /// Number of partitions afterwards.
    pub partitions: usize,
    /// Number of layers covered.
    pub layers: usize,
}

/// Emitted after a run of cached textures is composited.
#[derive(Clone, Copy, Debug)]
pub struct CompositeEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Number of textures in the run.
    pub textures: usize,
    /// Number of draw calls issued.
    pub draws: usize,
}

/// Emitted when cache elements are released.
#[derive(Clone, Copy, Debug)]
pub struct TeardownEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Number of elements released.
    pub elements: usize,
    /// Why they were released.
    pub reason: TeardownReason,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the render cache.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when a partition redraws.
    fn on_element_redraw(&mut self, e: &ElementRedrawEvent) {
        _ = e;
    }

    /// Called when a partition consumes a comparison.
    fn on_check(&mut self, e: &CheckEvent) {
        _ = e;
    }

    /// Called when layers are drawn directly.
    fn on_fallback(&mut self, e: &FallbackEvent) {
        _ = e;
    }

    /// Called when the partition set changes.
    fn on_repartition(&mut self, e: &RepartitionEvent) {
        _ = e;
    }

    /// Called after a composite run.
    fn on_composite(&mut self, e: &CompositeEvent) {
        _ = e;
    }

    /// Called when elements are torn down.
    fn on_teardown(&mut self, e: &TeardownEvent) {
        _ = e;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

macro_rules! dispatch {
    ($(#[$doc:meta] $name:ident => $method:ident($event:ty);)*) => {
        $(
            #[$doc]
            #[inline]
            pub fn $name(&mut self, e: &$event) {
                #[cfg(feature = "trace")]
                if let Some(s) = &mut self.sink {
                    s.$method(e);
                }
                #[cfg(not(feature = "trace"))]
                {
                    _ = e;
                }
            }
        )*
    };
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    dispatch! {
        /// Emits an [`ElementRedrawEvent`].
        element_redraw => on_element_redraw(ElementRedrawEvent);
        /// Emits a [`CheckEvent`].
        check => on_check(CheckEvent);
        /// Emits a [`FallbackEvent`].
        fallback => on_fallback(FallbackEvent);
        /// Emits a [`RepartitionEvent`].
        repartition => on_repartition(RepartitionEvent);
        /// Emits a [`CompositeEvent`].
        composite => on_composite(CompositeEvent);
        /// Emits a [`TeardownEvent`].
        teardown => on_teardown(TeardownEvent);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_check() -> CheckEvent {
        CheckEvent {
            frame_index: 7,
            partition: 1,
            matched: true,
            render_frequency: 30.0,
            check_frequency: 20.0,
            streak: -1,
        }
    }

    #[test]
    fn noop_sink_compiles() {
        let mut sink = NoopSink;
        sink.on_check(&sample_check());
        sink.on_teardown(&TeardownEvent {
            frame_index: 0,
            elements: 4,
            reason: TeardownReason::Resize,
        });
    }

    #[test]
    fn tracer_none_does_nothing() {
        let mut tracer = Tracer::none();
        tracer.check(&sample_check());
        tracer.composite(&CompositeEvent {
            frame_index: 0,
            textures: 3,
            draws: 1,
        });
    }

    #[cfg(feature = "trace")]
    #[test]
    fn tracer_dispatches_to_sink() {
        use alloc::vec::Vec;

        struct RecordingSink {
            checks: Vec<u64>,
        }
        impl TraceSink for RecordingSink {
            fn on_check(&mut self, e: &CheckEvent) {
                self.checks.push(e.frame_index);
            }
        }

        let mut sink = RecordingSink { checks: Vec::new() };
        let mut tracer = Tracer::new(&mut sink);
        tracer.check(&sample_check());
        // Access sink after tracer is dropped.
        drop(tracer);
        assert_eq!(sink.checks, &[7]);
    }
}
