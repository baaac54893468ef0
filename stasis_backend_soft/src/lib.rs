// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CPU reference backend for stasis.
//!
//! [`SoftBackend`] implements [`CacheBackend`] over plain RGBA8
//! framebuffers:
//!
//! - Drawing is limited to axis-aligned rectangle fills
//!   ([`SoftBackend::fill_rect`]), blended per pixel with the fixed-function
//!   factor equation in 8-bit fixed point.
//! - Readbacks copy pixels when issued and signal their fence after a
//!   configurable number of polls.
//! - Composite draws blend each sampled texture in slot order.
//!
//! Depth state is recorded but not applied: rectangles never intersect in
//! depth. The backend is meant for headless tests and as a correctness
//! oracle for GPU backends.

mod backend;
mod framebuffer;

pub use backend::{SoftBackend, SoftReadback, SoftTarget};
pub use framebuffer::{Framebuffer, blend_pixel};
pub use stasis_core::backend::CacheBackend;
