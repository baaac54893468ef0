// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Caching of a whole modal screen drawn by one callback.

use alloc::boxed::Box;
use core::fmt;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::backend::{CacheBackend, Extent};
use crate::composite::CompositionBatcher;
use crate::config::{CacheConfig, DisableSource, NeverDisabled};
use crate::element::CacheElement;
use crate::layer::DrawContext;
use crate::time::FrameInfo;

/// A single cache element covering an entire screen (a menu, an inventory,
/// a settings page).
///
/// The element is forced to redraw whenever the displayed screen changes
/// identity, and otherwise follows the usual adaptive schedule.
pub struct ScreenCache<B: CacheBackend> {
    config: CacheConfig,
    disable: Box<dyn DisableSource>,
    element: Option<CacheElement<B>>,
    last_screen: Option<u64>,
    viewport: Option<Extent>,
    batcher: CompositionBatcher,
    rng: SmallRng,
}

impl<B: CacheBackend> fmt::Debug for ScreenCache<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScreenCache")
            .field("config", &self.config)
            .field("cached", &self.element.is_some())
            .field("last_screen", &self.last_screen)
            .field("viewport", &self.viewport)
            .finish_non_exhaustive()
    }
}

impl<B: CacheBackend> ScreenCache<B> {
    /// Creates a screen cache. No GPU resources are allocated until the
    /// first [`render`](Self::render).
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        let config = config.validated();
        Self {
            config,
            disable: Box::new(NeverDisabled),
            element: None,
            last_screen: None,
            viewport: None,
            batcher: CompositionBatcher::new(),
            rng: SmallRng::seed_from_u64(config.jitter_seed),
        }
    }

    /// Sets the runtime kill switch polled once per frame.
    #[must_use]
    pub fn with_disable_source(mut self, source: impl DisableSource + 'static) -> Self {
        self.set_disable_source(source);
        self
    }

    /// Replaces the runtime kill switch.
    pub fn set_disable_source(&mut self, source: impl DisableSource + 'static) {
        self.disable = Box::new(source);
    }

    /// Replaces the configuration and releases the element.
    pub fn set_config(&mut self, backend: &mut B, config: CacheConfig) {
        self.config = config.validated();
        self.close(backend);
    }

    /// Draws the screen identified by `screen_id`.
    ///
    /// `draw` renders the screen; it is called into the cache when a redraw
    /// is due and directly when no cached texture is usable. Returns `true`
    /// if the screen was composited from the cache.
    pub fn render(
        &mut self,
        backend: &mut B,
        frame: FrameInfo,
        screen_id: u64,
        mut draw: impl FnMut(&mut DrawContext<'_, B>),
    ) -> bool {
        if !self.config.enabled || self.disable.is_caching_disabled() {
            self.close(backend);
            draw(&mut DrawContext::direct(backend, frame));
            return false;
        }

        let viewport = backend.viewport();
        if self.viewport != Some(viewport) {
            if let Some(element) = &mut self.element {
                element.release(backend);
            }
            self.viewport = Some(viewport);
        }

        let element = match &mut self.element {
            Some(element) => element,
            slot @ None => {
                let jitter: f64 = self.rng.r#gen();
                slot.insert(CacheElement::new(&self.config, frame.now, jitter))
            }
        };
        element.poll(backend);
        if self.last_screen != Some(screen_id) {
            element.request_redraw();
            self.last_screen = Some(screen_id);
        }

        if element.update(backend, frame, false, &mut draw).bound_target() {
            backend.bind_default_target();
        }
        if let Some(texture) = element.texture(backend) {
            self.batcher.composite_all(backend, &[texture]);
            true
        } else {
            draw(&mut DrawContext::direct(backend, frame));
            false
        }
    }

    /// Polls the element's fence and applies a completed comparison.
    /// Returns the comparison outcome, if any.
    pub fn tick(&mut self, backend: &mut B) -> Option<bool> {
        self.element.as_mut()?.poll(backend)
    }

    /// Releases the element's GPU resources. Safe to call repeatedly.
    pub fn close(&mut self, backend: &mut B) {
        if let Some(mut element) = self.element.take() {
            element.release(backend);
        }
        self.last_screen = None;
        self.viewport = None;
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::vec;
    use core::cell::Cell;

    use super::*;
    use crate::time::{Duration, HostTime};
    use crate::testing::MockBackend;

    const MS: u64 = 1_000_000;

    fn frame(ms: u64) -> FrameInfo {
        FrameInfo::new(HostTime(ms * MS), Duration(MS))
    }

    #[test]
    fn screen_is_cached_between_redraws() {
        let mut backend = MockBackend::new(8, 8);
        let mut cache = ScreenCache::new(CacheConfig::new());
        let mut calls = 0;
        assert!(cache.render(&mut backend, frame(0), 1, |ctx| {
            calls += 1;
            ctx.backend().draw(5);
        }));
        assert!(cache.render(&mut backend, frame(1), 1, |ctx| {
            calls += 1;
            ctx.backend().draw(5);
        }));
        assert_eq!(calls, 1, "second frame reuses the texture");
        assert_eq!(backend.screen, vec![5, 5]);
    }

    #[test]
    fn new_screen_forces_redraw() {
        let mut backend = MockBackend::new(8, 8);
        let mut cache = ScreenCache::new(CacheConfig::new());
        cache.render(&mut backend, frame(0), 1, |ctx| ctx.backend().draw(1));
        cache.render(&mut backend, frame(1), 2, |ctx| ctx.backend().draw(2));
        assert_eq!(backend.screen, vec![1, 2]);
    }

    #[test]
    fn unavailable_target_draws_directly() {
        let mut backend = MockBackend::new(8, 8);
        backend.fail_targets = true;
        let mut cache = ScreenCache::new(CacheConfig::new());
        let cached = cache.render(&mut backend, frame(0), 1, |ctx| ctx.backend().draw(3));
        assert!(!cached);
        assert_eq!(backend.screen, vec![3]);
    }

    #[test]
    fn close_is_idempotent() {
        let mut backend = MockBackend::new(8, 8);
        let mut cache = ScreenCache::new(CacheConfig::new());
        cache.render(&mut backend, frame(0), 1, |ctx| ctx.backend().draw(1));
        cache.close(&mut backend);
        cache.close(&mut backend);
        assert_eq!(backend.live_targets, 0);
        assert_eq!(cache.tick(&mut backend), None);
    }

    #[test]
    fn disabled_config_draws_directly() {
        let mut backend = MockBackend::new(8, 8);
        let config = CacheConfig {
            enabled: false,
            ..CacheConfig::new()
        };
        let mut cache = ScreenCache::new(config);
        assert!(!cache.render(&mut backend, frame(0), 1, |ctx| ctx.backend().draw(4)));
        assert_eq!(backend.targets_created, 0);
        assert_eq!(backend.screen, vec![4]);
    }

    #[test]
    fn render_polls_fences_without_tick() {
        let mut backend = MockBackend::new(8, 8);
        backend.fence_latency = 0;
        let mut cache = ScreenCache::new(CacheConfig::new());
        for ms in (0..5_000).step_by(5) {
            cache.render(&mut backend, frame(ms), 1, |ctx| ctx.backend().draw(6));
        }
        assert!(backend.readbacks_started > 1, "comparisons keep flowing");
        let element = cache.element.as_ref().expect("element is live");
        assert_eq!(
            element.scheduler().render_frequency(),
            20.0,
            "static screen decays to the minimum frequency"
        );
        assert!(element.scheduler().streak() < 0);
    }

    #[test]
    fn disable_source_draws_directly_and_releases() {
        let mut backend = MockBackend::new(8, 8);
        let disabled = Rc::new(Cell::new(false));
        let source = Rc::clone(&disabled);
        let mut cache =
            ScreenCache::new(CacheConfig::new()).with_disable_source(move || source.get());
        assert!(cache.render(&mut backend, frame(0), 1, |ctx| ctx.backend().draw(1)));
        assert_eq!(backend.live_targets, 1);

        disabled.set(true);
        assert!(!cache.render(&mut backend, frame(1), 1, |ctx| ctx.backend().draw(2)));
        assert_eq!(backend.live_targets, 0, "element released while disabled");
        assert_eq!(backend.screen, vec![1, 2]);

        disabled.set(false);
        assert!(cache.render(&mut backend, frame(2), 1, |ctx| ctx.backend().draw(3)));
    }
}
