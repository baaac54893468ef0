// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! wgpu backend for stasis.
//!
//! [`WgpuBackend`] implements [`CacheBackend`] on a wgpu device and queue:
//!
//! - Cache targets are `Rgba8Unorm` color textures paired with a
//!   `Depth24Plus` depth texture.
//! - Readbacks copy a target into a mappable buffer and complete when the
//!   map callback fires; polling never blocks.
//! - Composite draws sample up to eight cached textures in one fullscreen
//!   pass and stack them in slot order.
//!
//! The host drives frames explicitly:
//!
//! ```no_run
//! # fn demo(
//! #     backend: &mut stasis_backend_wgpu::WgpuBackend,
//! #     cache: &mut stasis_core::cache::RenderCache<stasis_backend_wgpu::WgpuBackend>,
//! #     frame: wgpu::SurfaceTexture,
//! #     size: stasis_core::backend::Extent,
//! #     delta: stasis_core::time::Duration,
//! # ) {
//! let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
//! backend.begin_frame(view, size);
//! let now = stasis_backend_wgpu::now();
//! cache.render(backend, stasis_core::time::FrameInfo::new(now, delta));
//! backend.end_frame();
//! frame.present();
//! # }
//! ```
//!
//! Pipelines are built on first use for each combination of blend state,
//! depth state and attachment format.

mod backend;
mod convert;
mod pipeline;
mod readback;
mod time;

pub use backend::{WgpuBackend, WgpuTarget};
pub use readback::WgpuReadback;
pub use stasis_core::backend::CacheBackend;
pub use time::now;
