// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Full frames through `RenderCache` on the CPU backend, compared byte for
//! byte against drawing every layer directly.

use std::cell::Cell;
use std::rc::Rc;

use kurbo::Rect;
use stasis_backend_soft::SoftBackend;
use stasis_core::cache::RenderCache;
use stasis_core::config::CacheConfig;
use stasis_core::layer::DrawContext;
use stasis_core::screen::ScreenCache;
use stasis_core::time::{Duration, FrameInfo, HostTime};

const FRAME_NANOS: u64 = 16_000_000;
const BACKGROUND: [u8; 4] = [20, 20, 20, 255];

fn frame(i: u64) -> FrameInfo {
    FrameInfo::new(HostTime(i * FRAME_NANOS), Duration(FRAME_NANOS))
}

fn fill(rect: Rect, color: [u8; 4]) -> impl FnMut(&mut DrawContext<'_, SoftBackend>) + 'static {
    move |ctx| {
        ctx.enable_blend();
        ctx.backend().fill_rect(rect, color);
    }
}

/// A small HUD-like scene. Returns the switch controlling the `hud` group.
fn build_scene(cache: &mut RenderCache<SoftBackend>) -> Rc<Cell<bool>> {
    let hud_visible = Rc::new(Cell::new(true));
    cache.add_layer(
        None,
        "panel",
        fill(Rect::new(2.0, 2.0, 30.0, 30.0), [40, 40, 120, 255]),
    );

    let visible = Rc::clone(&hud_visible);
    let hud = cache.add_group(None, "hud", move || visible.get());
    cache.add_layer(
        Some(hud),
        "hotbar",
        fill(Rect::new(4.0, 24.0, 28.0, 30.0), [200, 200, 200, 255]),
    );
    cache.add_layer(Some(hud), "health", |ctx| {
        ctx.disable_blend();
        ctx.backend().fill_rect(Rect::new(4.0, 20.0, 14.0, 23.0), [220, 30, 30, 255]);
        ctx.enable_blend();
    });

    cache.add_layer(None, "chat", fill(Rect::new(0.0, 0.0, 16.0, 8.0), [10, 120, 10, 255]));
    cache.add_layer(None, "title", fill(Rect::new(8.0, 8.0, 24.0, 16.0), [250, 200, 0, 255]));
    cache.add_layer(None, "scoreboard", fill(Rect::new(24.0, 4.0, 32.0, 20.0), [90, 0, 90, 255]));
    hud_visible
}

struct Pair {
    cached: RenderCache<SoftBackend>,
    cached_backend: SoftBackend,
    direct: RenderCache<SoftBackend>,
    direct_backend: SoftBackend,
    hud: [Rc<Cell<bool>>; 2],
}

impl Pair {
    fn new(config: CacheConfig) -> Self {
        let mut cached = RenderCache::new(config);
        let mut direct = RenderCache::new(CacheConfig {
            enabled: false,
            ..config
        });
        let hud = [build_scene(&mut cached), build_scene(&mut direct)];
        Self {
            cached,
            cached_backend: SoftBackend::new(32, 32),
            direct,
            direct_backend: SoftBackend::new(32, 32),
            hud,
        }
    }

    fn set_hud(&self, visible: bool) {
        for switch in &self.hud {
            switch.set(visible);
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.cached_backend.resize(width, height);
        self.direct_backend.resize(width, height);
    }

    fn render_and_compare(&mut self, i: u64) {
        self.cached_backend.clear_screen(BACKGROUND);
        self.direct_backend.clear_screen(BACKGROUND);
        self.cached.render(&mut self.cached_backend, frame(i));
        self.direct.render(&mut self.direct_backend, frame(i));
        assert!(
            self.cached_backend.screen() == self.direct_backend.screen(),
            "cached output differs from direct output on frame {i}"
        );
    }
}

#[test]
fn opaque_scene_matches_direct_rendering() {
    let mut pair = Pair::new(CacheConfig::new());
    for i in 0..120 {
        pair.render_and_compare(i);
    }
    // Six layers in chunks of ceil(6 / 4).
    assert_eq!(pair.cached.partition_count(), 3);
}

#[test]
fn group_visibility_flip_is_visible_on_the_same_frame() {
    let mut pair = Pair::new(CacheConfig::new());
    for i in 0..40 {
        if i == 7 {
            pair.set_hud(false);
        }
        if i == 23 {
            pair.set_hud(true);
        }
        pair.render_and_compare(i);
    }
}

#[test]
fn disable_and_reenable_match_direct_rendering() {
    let disabled = Rc::new(Cell::new(false));
    let mut pair = Pair::new(CacheConfig::new());
    let source = Rc::clone(&disabled);
    pair.cached.set_disable_source(move || source.get());

    for i in 0..45 {
        disabled.set((15..30).contains(&i));
        pair.render_and_compare(i);
        if disabled.get() {
            assert_eq!(pair.cached_backend.live_targets(), 0, "frame {i}");
        }
    }
    assert_eq!(pair.cached_backend.live_targets(), pair.cached.partition_count());
}

#[test]
fn resize_rebuilds_targets_at_the_new_size() {
    let mut pair = Pair::new(CacheConfig::new());
    for i in 0..10 {
        pair.render_and_compare(i);
    }
    pair.resize(48, 40);
    for i in 10..20 {
        pair.render_and_compare(i);
    }
    assert_eq!(pair.cached_backend.live_targets(), pair.cached.partition_count());
}

#[test]
fn many_partitions_composite_in_batches() {
    let mut cache = RenderCache::new(CacheConfig {
        partition_count: 20,
        ..CacheConfig::new()
    });
    for i in 0..20_u8 {
        let x = f64::from(i);
        let color = [i * 10, 0, 0, 255];
        cache.add_layer(None, "strip", fill(Rect::new(x, 0.0, x + 1.0, 8.0), color));
    }
    let mut backend = SoftBackend::new(20, 8);
    let report = cache.render(&mut backend, frame(0));
    assert_eq!(report.redrawn, 20);
    assert_eq!(report.composite_draws, 3, "ceil(20 / 8) draws");
    assert_eq!(backend.composite_draws(), 3);
    assert_eq!(backend.screen().pixel(19, 0), Some([190, 0, 0, 255]));
}

#[test]
fn static_content_builds_a_stable_streak() {
    let mut cache = RenderCache::new(CacheConfig::new());
    build_scene(&mut cache);
    let mut backend = SoftBackend::new(32, 32);
    for i in 0..200 {
        cache.render(&mut backend, frame(i));
    }
    let stats = cache.stats(&backend);
    assert_eq!(stats.len(), 3);
    for s in &stats {
        assert!(s.streak < 0, "partition {} should be stable: {s:?}", s.layers);
        assert!(s.has_texture, "{s:?}");
    }
}

#[test]
fn animated_layer_keeps_redrawing() {
    let tick = Rc::new(Cell::new(0_u8));
    let mut cache = RenderCache::new(CacheConfig {
        partition_count: 1,
        ..CacheConfig::new()
    });
    let t = Rc::clone(&tick);
    cache.add_layer(None, "spinner", move |ctx: &mut DrawContext<'_, SoftBackend>| {
        let v = t.get();
        ctx.backend().fill_rect(Rect::new(0.0, 0.0, 4.0, 4.0), [v, v, v, 255]);
    });
    let mut backend = SoftBackend::new(4, 4);
    for i in 0..200 {
        tick.set(tick.get().wrapping_add(1));
        cache.render(&mut backend, frame(i));
    }
    let stats = cache.stats(&backend);
    assert!(stats[0].streak > 0, "{stats:?}");
}

#[test]
fn screen_cache_matches_direct_rendering() {
    let mut cached = ScreenCache::new(CacheConfig::new());
    let mut cached_backend = SoftBackend::new(16, 16);
    let mut direct_backend = SoftBackend::new(16, 16);

    let draw = |screen: u8| {
        move |ctx: &mut DrawContext<'_, SoftBackend>| {
            ctx.enable_blend();
            ctx.backend()
                .fill_rect(Rect::new(2.0, 2.0, 14.0, 14.0), [screen * 40, 80, 160, 255]);
        }
    };

    for i in 0..30 {
        let screen = if i < 12 { 1 } else { 2 };
        cached_backend.clear_screen(BACKGROUND);
        direct_backend.clear_screen(BACKGROUND);
        cached.render(&mut cached_backend, frame(i), u64::from(screen), draw(screen));
        let mut ctx = DrawContext::direct(&mut direct_backend, frame(i));
        draw(screen)(&mut ctx);
        assert!(
            cached_backend.screen() == direct_backend.screen(),
            "screen cache differs on frame {i}"
        );
        cached.tick(&mut cached_backend);
    }
    cached.close(&mut cached_backend);
    assert_eq!(cached_backend.live_targets(), 0);
}
