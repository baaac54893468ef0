// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A cache element: offscreen target, readback pair and scheduler.

use core::fmt;

use crate::backend::{CacheBackend, FenceStatus, TextureId};
use crate::blend::BlendInterceptor;
use crate::config::CacheConfig;
use crate::layer::DrawContext;
use crate::readback::ReadbackPair;
use crate::scheduler::CacheScheduler;
use crate::target::OffscreenTarget;
use crate::time::{FrameInfo, HostTime};

/// What [`CacheElement::update`] did this frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// No redraw was due; the existing texture (if any) stays valid.
    Skipped,
    /// The offscreen target could not be bound. Draw directly instead.
    Unavailable,
    /// The layers were redrawn into the offscreen target.
    Redrawn {
        /// Whether nothing was drawn.
        empty: bool,
        /// Whether a readback snapshot was issued.
        snapshot: bool,
        /// Blend requests rejected by the interceptor while drawing.
        rejected_blends: u32,
    },
}

impl UpdateOutcome {
    /// Whether the offscreen target was bound this frame.
    #[must_use]
    pub fn bound_target(self) -> bool {
        matches!(self, Self::Redrawn { .. })
    }
}

/// Couples an [`OffscreenTarget`] and a [`ReadbackPair`] with a
/// [`CacheScheduler`].
pub struct CacheElement<B: CacheBackend> {
    target: OffscreenTarget<B>,
    readback: ReadbackPair<B>,
    scheduler: CacheScheduler,
    is_empty: bool,
    has_content: bool,
}

impl<B: CacheBackend> fmt::Debug for CacheElement<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheElement")
            .field("target", &self.target)
            .field("readback", &self.readback)
            .field("scheduler", &self.scheduler)
            .field("is_empty", &self.is_empty)
            .field("has_content", &self.has_content)
            .finish()
    }
}

impl<B: CacheBackend> CacheElement<B> {
    /// Creates an element with no GPU resources; they are allocated on the
    /// first redraw.
    #[must_use]
    pub fn new(config: &CacheConfig, now: HostTime, jitter: f64) -> Self {
        Self {
            target: OffscreenTarget::new(),
            readback: ReadbackPair::new(),
            scheduler: CacheScheduler::new(config, now, jitter),
            is_empty: false,
            has_content: false,
        }
    }

    /// Polls the outstanding fence and consumes a completed comparison.
    ///
    /// Returns the comparison outcome (`true` when matched) if one was
    /// consumed. Never blocks.
    pub fn poll(&mut self, backend: &mut B) -> Option<bool> {
        if self.readback.poll_fence(backend) == FenceStatus::Lost {
            log::debug!("cache element readback lost");
        }
        let matched = self.readback.take_comparison(backend)?;
        self.scheduler.observe(matched);
        Some(matched)
    }

    /// Redraws the element if due and takes a snapshot if a check is due.
    ///
    /// `forced` overrides the redraw schedule. `draw` is invoked with a
    /// context whose blend requests go through a [`BlendInterceptor`]; the
    /// ambient blend state is set to
    /// [`BlendState::STANDARD`](crate::blend::BlendState::STANDARD) before
    /// drawing and restored afterwards.
    pub fn update(
        &mut self,
        backend: &mut B,
        frame: FrameInfo,
        forced: bool,
        draw: impl FnOnce(&mut DrawContext<'_, B>),
    ) -> UpdateOutcome {
        let now = frame.now;
        if !self.scheduler.redraw_due(now, forced) {
            return UpdateOutcome::Skipped;
        }
        self.scheduler.mark_rendered(now);

        if !self.target.bind(backend) {
            self.has_content = false;
            return UpdateOutcome::Unavailable;
        }

        let saved = backend.blend_state();
        let interceptor = BlendInterceptor::new();
        backend.apply_blend(interceptor.default_state());
        let before = backend.draw_count();
        {
            let mut ctx = DrawContext::new(backend, &interceptor, frame);
            draw(&mut ctx);
        }
        backend.flush();
        let empty = backend.draw_count() == before;
        if backend.blend_state() != saved {
            backend.apply_blend(saved);
        }
        self.is_empty = empty;
        self.has_content = true;

        let mut snapshot = false;
        if self.readback.can_snapshot() && self.scheduler.check_due(now) {
            match self.readback.snapshot(backend, &self.target, empty) {
                Ok(issued) => {
                    if issued {
                        self.scheduler.mark_checked(now);
                    }
                    snapshot = issued;
                }
                Err(err) => log::debug!("snapshot skipped: {err}"),
            }
        }

        UpdateOutcome::Redrawn {
            empty,
            snapshot,
            rejected_blends: interceptor.take_rejected(),
        }
    }

    /// The texture to composite, if the element holds drawn content.
    ///
    /// Returns `None` when the target is unallocated, was never drawn, or
    /// the last redraw drew nothing.
    #[must_use]
    pub fn texture(&self, backend: &B) -> Option<TextureId> {
        if !self.has_content || self.is_empty {
            return None;
        }
        self.target.texture(backend)
    }

    /// Whether the last redraw drew nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    /// Forces a redraw on the next update.
    pub fn request_redraw(&mut self) {
        self.scheduler.request_redraw();
    }

    /// The element's schedule.
    #[must_use]
    pub fn scheduler(&self) -> &CacheScheduler {
        &self.scheduler
    }

    /// The element's offscreen target.
    #[must_use]
    pub fn target(&self) -> &OffscreenTarget<B> {
        &self.target
    }

    /// Releases all GPU resources, abandoning any outstanding readback.
    /// Safe to call repeatedly.
    pub fn release(&mut self, backend: &mut B) {
        self.readback.release(backend);
        self.target.release(backend);
        self.has_content = false;
        self.scheduler.request_redraw();
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use crate::blend::{BlendFactor, BlendState};
    use crate::testing::MockBackend;
    use crate::time::Duration;

    const MS: u64 = 1_000_000;

    fn frame(ms: u64) -> FrameInfo {
        FrameInfo::new(HostTime(ms * MS), Duration(MS))
    }

    fn element() -> CacheElement<MockBackend> {
        CacheElement::new(&CacheConfig::new(), HostTime(0), 0.0)
    }

    #[test]
    fn first_update_redraws_and_snapshots() {
        let mut backend = MockBackend::new(4, 4);
        let mut el = element();
        let outcome = el.update(&mut backend, frame(0), false, |ctx| ctx.backend().draw(1));
        assert_eq!(
            outcome,
            UpdateOutcome::Redrawn {
                empty: false,
                snapshot: true,
                rejected_blends: 0
            }
        );
        assert!(el.texture(&backend).is_some());
        assert_eq!(backend.flushes, 1);
    }

    #[test]
    fn not_due_skips() {
        let mut backend = MockBackend::new(4, 4);
        let mut el = element();
        el.update(&mut backend, frame(0), false, |ctx| ctx.backend().draw(1));
        let outcome = el.update(&mut backend, frame(1), false, |_| {
            panic!("must not draw when not due");
        });
        assert_eq!(outcome, UpdateOutcome::Skipped);
        assert!(el.texture(&backend).is_some(), "cached texture stays valid");
        assert!(el.update(&mut backend, frame(1), true, |_| {}).bound_target());
    }

    #[test]
    fn empty_draw_has_no_texture() {
        let mut backend = MockBackend::new(4, 4);
        let mut el = element();
        let outcome = el.update(&mut backend, frame(0), false, |_| {});
        assert!(matches!(outcome, UpdateOutcome::Redrawn { empty: true, .. }));
        assert!(el.is_empty());
        assert_eq!(el.texture(&backend), None);
    }

    #[test]
    fn unavailable_target_reports_fallback() {
        let mut backend = MockBackend::new(0, 0);
        let mut el = element();
        let outcome = el.update(&mut backend, frame(0), false, |_| {
            panic!("must not draw into an unavailable target");
        });
        assert_eq!(outcome, UpdateOutcome::Unavailable);
        assert_eq!(el.texture(&backend), None);
    }

    #[test]
    fn blend_state_is_saved_and_restored() {
        let mut backend = MockBackend::new(4, 4);
        backend.apply_blend(BlendState::INITIAL);
        let mut el = element();
        let outcome = el.update(&mut backend, frame(0), false, |ctx| {
            assert_eq!(ctx.blend_state(), BlendState::STANDARD);
            ctx.disable_blend();
            assert_eq!(ctx.blend_state(), BlendState::OPAQUE_COPY);
            ctx.blend_func(BlendFactor::DstColor, BlendFactor::Zero);
            ctx.backend().draw(1);
        });
        assert!(matches!(
            outcome,
            UpdateOutcome::Redrawn {
                rejected_blends: 1,
                ..
            }
        ));
        assert_eq!(backend.blend_state(), BlendState::INITIAL);
    }

    #[test]
    fn static_content_lowers_render_frequency() {
        let mut backend = MockBackend::new(4, 4);
        backend.fence_latency = 0;
        let mut el = element();
        let mut checks = vec![];
        for ms in (0..2_000).step_by(5) {
            if let Some(matched) = el.poll(&mut backend) {
                checks.push(matched);
            }
            el.update(&mut backend, frame(ms), false, |ctx| ctx.backend().draw(3));
        }
        assert!(!checks.is_empty(), "comparisons happened");
        assert!(checks.iter().all(|m| *m), "identical frames always match");
        assert_eq!(el.scheduler().render_frequency(), 20.0);
    }

    #[test]
    fn changing_content_stays_at_max() {
        let mut backend = MockBackend::new(4, 4);
        backend.fence_latency = 0;
        let mut el = element();
        let mut tag = 0_u8;
        for ms in (0..2_000).step_by(5) {
            el.poll(&mut backend);
            el.update(&mut backend, frame(ms), false, |ctx| {
                tag = tag.wrapping_add(1);
                ctx.backend().draw(tag);
            });
        }
        assert_eq!(el.scheduler().render_frequency(), 60.0);
        assert!(el.scheduler().streak() > 0);
    }

    #[test]
    fn release_is_idempotent_and_forces_redraw() {
        let mut backend = MockBackend::new(4, 4);
        let mut el = element();
        el.update(&mut backend, frame(0), false, |ctx| ctx.backend().draw(1));
        el.release(&mut backend);
        el.release(&mut backend);
        assert_eq!(backend.live_targets, 0);
        assert_eq!(backend.live_readbacks, 0);
        assert_eq!(el.texture(&backend), None);
        assert!(el.update(&mut backend, frame(1), false, |_| {}).bound_target());
    }
}
