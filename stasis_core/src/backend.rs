// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend contract for graphics integrations.
//!
//! Stasis splits GPU-specific work into *backend* crates. Each backend
//! provides the following pieces:
//!
//! - **Offscreen targets**: color+depth surfaces sized to the viewport that
//!   layers can be redirected into, plus a way to bind the on-screen target
//!   again afterwards.
//!
//! - **Readback**: a GPU-side copy of a target's color attachment into
//!   CPU-visible memory, guarded by a fence that can be polled without
//!   blocking.
//!
//! - **Ambient state**: the blend and depth state layers draw with. The core
//!   saves, intercepts and restores it; the backend only stores and applies
//!   it.
//!
//! - **Compositing**: a batched draw of up to [`max_samplers`] cached
//!   textures over the whole viewport with premultiplied source-over
//!   blending and an opaque white tint.
//!
//! - **Time**: a `now() -> HostTime` free function reading a monotonic
//!   clock. This is not part of the trait because headless backends drive
//!   time manually.
//!
//! # Crate boundaries
//!
//! `stasis_core` owns the data model, scheduling, composition policy, and
//! this contract module. Backend crates depend on `stasis_core` and provide
//! the GPU glue. Application code depends on both and wires them together in
//! its frame loop.
//!
//! [`max_samplers`]: CacheBackend::max_samplers

use core::fmt;

use crate::blend::BlendState;
use crate::error::BackendError;

/// Depth separation between consecutive layers, in layer depth units.
pub const LAYER_DEPTH_SEPARATION: f32 = 200.0;

/// Width and height of a render target in physical pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Extent {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Extent {
    /// Creates an extent.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns `true` if either dimension is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of bytes of a tightly packed RGBA8 image of this size.
    #[must_use]
    pub const fn rgba8_len(self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// A backend texture that can be sampled by the composite pass.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

impl fmt::Debug for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextureId({})", self.0)
    }
}

/// Result of a non-blocking fence poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FenceStatus {
    /// The GPU has not finished the copy yet.
    Pending,
    /// The copy completed and the bytes are readable.
    Signaled,
    /// The readback failed (unmappable buffer, lost context). No snapshot
    /// was produced.
    Lost,
}

/// Ambient depth test and depth write switches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DepthState {
    /// Whether fragments are depth tested.
    pub test: bool,
    /// Whether fragments write depth.
    pub write: bool,
}

impl DepthState {
    /// Depth testing and writing on, as during UI drawing.
    pub const ENABLED: Self = Self {
        test: true,
        write: true,
    };

    /// Depth testing and writing off, as while compositing.
    pub const DISABLED: Self = Self {
        test: false,
        write: false,
    };
}

impl Default for DepthState {
    fn default() -> Self {
        Self::ENABLED
    }
}

/// GPU operations the render cache needs from a graphics backend.
///
/// All methods are called from the single render thread. None of them may
/// block on GPU completion; synchronization happens only through
/// [`poll_readback`](Self::poll_readback).
///
/// # Frame loop pseudocode
///
/// ```rust,ignore
/// fn on_frame(backend: &mut MyBackend, cache: &mut RenderCache<MyBackend>) {
///     let frame = FrameInfo::new(my_backend::now(), delta);
///
///     // Polls fences, redraws due partitions, composites, falls back to
///     // direct drawing where needed.
///     cache.render(backend, frame);
///
///     backend.present();
/// }
/// ```
pub trait CacheBackend {
    /// An offscreen color+depth surface.
    type Target;
    /// A CPU-visible buffer receiving a copy of a target's color attachment.
    type Readback;

    /// Current size of the on-screen target.
    fn viewport(&self) -> Extent;

    /// Allocates an offscreen target of the given size.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::ZeroSizedViewport`] for empty extents and
    /// [`BackendError::Allocation`] when storage cannot be created.
    fn create_target(&mut self, size: Extent) -> Result<Self::Target, BackendError>;

    /// Releases an offscreen target's GPU storage.
    fn release_target(&mut self, target: Self::Target);

    /// The texture holding the target's color attachment.
    fn target_texture(&self, target: &Self::Target) -> TextureId;

    /// Redirects subsequent drawing into `target`, clearing color to
    /// transparent black and depth to far.
    fn bind_target(&mut self, target: &Self::Target);

    /// Redirects subsequent drawing to the on-screen target.
    fn bind_default_target(&mut self);

    /// Submits batched draw commands for the currently bound target.
    fn flush(&mut self);

    /// Monotonic count of draw commands issued so far.
    ///
    /// The cache compares values before and after drawing a partition to
    /// detect partitions that drew nothing.
    fn draw_count(&self) -> u64;

    /// Allocates a readback buffer able to hold a target of `size`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Allocation`] when the buffer cannot be created.
    fn create_readback(&mut self, size: Extent) -> Result<Self::Readback, BackendError>;

    /// Releases a readback buffer. Any pending copy is abandoned.
    fn release_readback(&mut self, readback: Self::Readback);

    /// Issues a GPU-side copy of the target's color attachment into
    /// `readback` and starts its fence.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] when the copy cannot be encoded.
    fn begin_readback(
        &mut self,
        target: &Self::Target,
        readback: &mut Self::Readback,
    ) -> Result<(), BackendError>;

    /// Checks the readback's fence with a zero timeout.
    fn poll_readback(&mut self, readback: &mut Self::Readback) -> FenceStatus;

    /// Tightly packed RGBA8 bytes of the last signaled copy, if any.
    fn readback_bytes<'r>(&self, readback: &'r Self::Readback) -> Option<&'r [u8]>;

    /// Forgets an outstanding copy without waiting for it.
    fn abandon_readback(&mut self, readback: &mut Self::Readback);

    /// The ambient blend state.
    fn blend_state(&self) -> BlendState;

    /// Replaces the ambient blend state.
    ///
    /// Backends bind a blend constant of `1.0` so that
    /// [`BlendState::OPAQUE_COPY`] copies source alpha unchanged.
    fn apply_blend(&mut self, state: BlendState);

    /// The ambient depth state.
    fn depth_state(&self) -> DepthState;

    /// Replaces the ambient depth state.
    fn set_depth_state(&mut self, state: DepthState);

    /// Sets the depth offset applied to subsequent layer drawing.
    fn set_layer_depth(&mut self, depth: f32);

    /// Maximum number of textures one composite draw can sample.
    fn max_samplers(&self) -> usize;

    /// Draws the given textures over the whole viewport in slot order, using
    /// the ambient blend state.
    ///
    /// `slots` has exactly [`max_samplers`](Self::max_samplers) entries;
    /// `None` entries are bound to an empty texture and contribute nothing.
    fn draw_composite(&mut self, slots: &[Option<TextureId>]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_extents() {
        assert!(Extent::new(0, 10).is_empty());
        assert!(Extent::new(10, 0).is_empty());
        assert!(!Extent::new(1, 1).is_empty());
        assert!(Extent::default().is_empty());
    }

    #[test]
    fn rgba8_len_is_tight() {
        assert_eq!(Extent::new(3, 2).rgba8_len(), 24);
    }

    #[test]
    fn depth_presets() {
        assert_eq!(DepthState::default(), DepthState::ENABLED);
        assert!(!DepthState::DISABLED.test && !DepthState::DISABLED.write);
    }
}
