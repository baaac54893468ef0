// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cached HUD overlay drawn through the stasis wgpu backend.
//!
//! Seven layers are cached in offscreen textures: a static frame, a HUD
//! group that can be hidden, a spinner that moves every frame and a clock
//! that ticks once per second. The cache settles on redrawing only the
//! partitions that change.
//!
//! Keys: `H` toggles the HUD group, `C` toggles caching, `S` logs partition
//! statistics, `Esc` quits. Set `STASIS_TRACE=1` to print cache events.
//!
//! Run with: `cargo run -p wgpu_overlay`

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use kurbo::Rect;
use stasis_backend_wgpu::WgpuBackend;
use stasis_core::backend::Extent;
use stasis_core::blend::BlendFactor;
use stasis_core::cache::RenderCache;
use stasis_core::config::CacheConfig;
use stasis_core::layer::DrawContext;
use stasis_core::time::{FrameInfo, HostTime};
use stasis_core::trace::Tracer;
use stasis_debug::pretty::PrettyPrintSink;
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};

const WINDOW_W: f64 = 800.0;
const WINDOW_H: f64 = 600.0;
const CLEAR: wgpu::Color = wgpu::Color {
    r: 0.08,
    g: 0.09,
    b: 0.12,
    a: 1.0,
};

fn fill(rect: Rect, color: [f32; 4]) -> impl FnMut(&mut DrawContext<'_, WgpuBackend>) + 'static {
    move |ctx| ctx.backend().fill_rect(rect, color)
}

fn seconds(time: HostTime) -> f64 {
    time.0 as f64 * 1e-9
}

/// Builds the overlay. Returns the HUD visibility flag.
fn build_scene(cache: &mut RenderCache<WgpuBackend>) -> Rc<Cell<bool>> {
    cache.add_layer(
        None,
        "frame",
        fill(Rect::new(16.0, 16.0, 784.0, 584.0), [0.2, 0.22, 0.3, 0.6]),
    );
    cache.add_layer(
        None,
        "sidebar",
        fill(Rect::new(16.0, 16.0, 196.0, 584.0), [0.12, 0.14, 0.2, 0.9]),
    );

    let hud_visible = Rc::new(Cell::new(true));
    let visible = Rc::clone(&hud_visible);
    let hud = cache.add_group(None, "hud", move || visible.get());
    cache.add_layer(
        Some(hud),
        "hotbar",
        fill(Rect::new(240.0, 520.0, 720.0, 568.0), [0.85, 0.85, 0.85, 0.8]),
    );
    cache.add_layer(Some(hud), "health", |ctx| {
        ctx.disable_blend();
        ctx.backend()
            .fill_rect(Rect::new(240.0, 500.0, 480.0, 512.0), [0.86, 0.12, 0.12, 1.0]);
        ctx.enable_blend();
    });
    cache.add_layer(Some(hud), "glow", |ctx| {
        ctx.blend_func(BlendFactor::SrcAlpha, BlendFactor::One);
        ctx.backend()
            .fill_rect(Rect::new(230.0, 490.0, 490.0, 522.0), [1.0, 0.4, 0.2, 0.25]);
        ctx.blend_func(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);
    });

    cache.add_layer(None, "spinner", |ctx| {
        let t = seconds(ctx.frame().now);
        let x = 480.0 + 200.0 * t.sin();
        let y = 260.0 + 120.0 * (t * 1.3).cos();
        ctx.backend()
            .fill_rect(Rect::new(x, y, x + 40.0, y + 40.0), [0.3, 0.7, 1.0, 0.9]);
    });
    cache.add_layer(None, "clock", |ctx| {
        let tick = ctx.frame().now.0 / 1_000_000_000;
        let lit = if tick % 2 == 0 { 0.9 } else { 0.4 };
        ctx.backend()
            .fill_rect(Rect::new(32.0, 32.0, 180.0, 64.0), [lit, lit, 0.3, 1.0]);
    });
    hud_visible
}

struct Gpu {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    backend: WgpuBackend,
}

impl Gpu {
    fn new(window: Arc<Window>) -> Self {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(Arc::clone(&window))
            .expect("failed to create surface");
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            compatible_surface: Some(&surface),
            ..Default::default()
        }))
        .expect("no suitable GPU adapter found");
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("stasis overlay"),
            ..Default::default()
        }))
        .expect("failed to create device");

        let size = window.inner_size();
        let config = surface
            .get_default_config(&adapter, size.width.max(1), size.height.max(1))
            .expect("surface not compatible");
        surface.configure(&device, &config);
        log::info!("surface format {:?}", config.format);

        let mut backend = WgpuBackend::new(
            device,
            queue,
            config.format,
            Extent::new(config.width, config.height),
        );
        backend.set_clear_color(CLEAR);
        Self {
            window,
            surface,
            config,
            backend,
        }
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface.configure(self.backend.device(), &self.config);
    }
}

struct App {
    gpu: Option<Gpu>,
    cache: RenderCache<WgpuBackend>,
    hud_visible: Rc<Cell<bool>>,
    caching_off: Rc<Cell<bool>>,
    sink: Option<PrettyPrintSink>,
    last_frame: Option<HostTime>,
    frames: u64,
}

impl App {
    fn new() -> Self {
        let caching_off = Rc::new(Cell::new(false));
        let off = Rc::clone(&caching_off);
        let mut cache = RenderCache::new(CacheConfig {
            partition_count: 4,
            adaptive_partitioning: true,
            ..CacheConfig::new()
        })
        .with_disable_source(move || off.get());
        let hud_visible = build_scene(&mut cache);
        let sink = std::env::var_os("STASIS_TRACE")
            .is_some()
            .then(|| PrettyPrintSink::stderr().quiet_checks(true));
        Self {
            gpu: None,
            cache,
            hud_visible,
            caching_off,
            sink,
            last_frame: None,
            frames: 0,
        }
    }

    fn log_stats(&self) {
        let Some(gpu) = &self.gpu else {
            return;
        };
        for (index, stats) in self.cache.stats(&gpu.backend).iter().enumerate() {
            log::info!(
                "partition {index} [{}]: {} Hz render, {:.1} Hz check, streak {}{}",
                stats.layers,
                stats.render_frequency,
                stats.check_frequency,
                stats.streak,
                if stats.often_changing {
                    ", often changing"
                } else {
                    ""
                },
            );
        }
    }

    fn redraw(&mut self) {
        let Some(gpu) = &mut self.gpu else {
            return;
        };
        let now = stasis_backend_wgpu::now();
        let delta = self
            .last_frame
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or_default();
        self.last_frame = Some(now);

        self.cache.tick(&mut gpu.backend);
        let frame = match gpu.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("failed to acquire frame: {err}");
                gpu.surface.configure(gpu.backend.device(), &gpu.config);
                return;
            }
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        gpu.backend
            .begin_frame(view, Extent::new(gpu.config.width, gpu.config.height));
        let info = FrameInfo::new(now, delta);
        let report = match &mut self.sink {
            Some(sink) => self
                .cache
                .render_traced(&mut gpu.backend, info, &mut Tracer::new(sink)),
            None => self.cache.render(&mut gpu.backend, info),
        };
        gpu.backend.end_frame();
        gpu.window.pre_present_notify();
        frame.present();

        self.frames += 1;
        if self.frames % 600 == 0 {
            log::info!("frame {}: {report:?}", self.frames);
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }
        let attributes = Window::default_attributes()
            .with_title("stasis overlay")
            .with_inner_size(LogicalSize::new(WINDOW_W, WINDOW_H));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .expect("failed to create window"),
        );
        self.gpu = Some(Gpu::new(window));
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.resize(size);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key,
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => match logical_key.as_ref() {
                Key::Named(NamedKey::Escape) => event_loop.exit(),
                Key::Character("h") => {
                    self.hud_visible.set(!self.hud_visible.get());
                }
                Key::Character("c") => {
                    let off = !self.caching_off.get();
                    self.caching_off.set(off);
                    log::info!("caching {}", if off { "disabled" } else { "enabled" });
                }
                Key::Character("s") => self.log_stats(),
                _ => {}
            },
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(gpu) = &self.gpu {
            gpu.window.request_redraw();
        }
    }
}

fn main() {
    env_logger::init();
    let event_loop = EventLoop::new().expect("failed to create event loop");
    let mut app = App::new();
    event_loop.run_app(&mut app).expect("event loop failed");
    app.log_stats();
}
