// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`CacheBackend`] implementation over CPU framebuffers.

use kurbo::Rect;
use stasis_core::backend::{CacheBackend, DepthState, Extent, FenceStatus, TextureId};
use stasis_core::blend::BlendState;
use stasis_core::error::BackendError;

use crate::framebuffer::Framebuffer;

/// Default number of polls before a readback fence signals.
const DEFAULT_FENCE_LATENCY: u32 = 2;

/// Default number of textures a composite draw can sample.
const DEFAULT_SAMPLERS: usize = 8;

/// An offscreen target owned by a [`SoftBackend`].
#[derive(Debug)]
pub struct SoftTarget {
    texture: TextureId,
    size: Extent,
}

impl SoftTarget {
    /// Size of the target.
    #[must_use]
    pub fn size(&self) -> Extent {
        self.size
    }
}

/// A readback buffer owned by a [`SoftBackend`].
#[derive(Debug, Default)]
pub struct SoftReadback {
    size: Extent,
    pending: Option<PendingCopy>,
    bytes: Option<Vec<u8>>,
}

#[derive(Debug)]
struct PendingCopy {
    polls_left: u32,
    bytes: Vec<u8>,
}

/// A headless [`CacheBackend`] drawing into RGBA8 framebuffers.
///
/// Content is drawn with [`fill_rect`](Self::fill_rect), which blends into
/// whichever framebuffer is bound using the ambient blend state.
#[derive(Debug)]
pub struct SoftBackend {
    screen: Framebuffer,
    textures: Vec<Option<Framebuffer>>,
    free: Vec<u32>,
    bound: Option<TextureId>,
    blend: BlendState,
    depth: DepthState,
    layer_depth: f32,
    draws: u64,
    composite_draws: u64,
    samplers: usize,
    fence_latency: u32,
    lose_readbacks: bool,
    target_budget: Option<usize>,
    live_targets: usize,
}

impl SoftBackend {
    /// Creates a backend with an on-screen framebuffer of the given size,
    /// cleared to transparent black.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            screen: Framebuffer::new(Extent::new(width, height)),
            textures: Vec::new(),
            free: Vec::new(),
            bound: None,
            blend: BlendState::INITIAL,
            depth: DepthState::ENABLED,
            layer_depth: 0.0,
            draws: 0,
            composite_draws: 0,
            samplers: DEFAULT_SAMPLERS,
            fence_latency: DEFAULT_FENCE_LATENCY,
            lose_readbacks: false,
            target_budget: None,
            live_targets: 0,
        }
    }

    /// Sets how many polls a readback fence stays pending.
    #[must_use]
    pub fn with_fence_latency(mut self, polls: u32) -> Self {
        self.fence_latency = polls;
        self
    }

    /// Sets the composite sampler limit (at least 1).
    #[must_use]
    pub fn with_max_samplers(mut self, samplers: usize) -> Self {
        self.samplers = samplers.max(1);
        self
    }

    /// Limits how many offscreen targets may be alive at once. Allocations
    /// beyond the budget fail with [`BackendError::Allocation`].
    #[must_use]
    pub fn with_target_budget(mut self, budget: usize) -> Self {
        self.target_budget = Some(budget);
        self
    }

    /// Makes every readback fence report [`FenceStatus::Lost`].
    pub fn set_lose_readbacks(&mut self, lose: bool) {
        self.lose_readbacks = lose;
    }

    /// Resizes the on-screen framebuffer, clearing it.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.screen = Framebuffer::new(Extent::new(width, height));
    }

    /// Clears the on-screen framebuffer to `color`.
    pub fn clear_screen(&mut self, color: [u8; 4]) {
        self.screen.clear(color);
    }

    /// The on-screen framebuffer.
    #[must_use]
    pub fn screen(&self) -> &Framebuffer {
        &self.screen
    }

    /// The framebuffer behind a texture, if it is alive.
    #[must_use]
    pub fn texture(&self, id: TextureId) -> Option<&Framebuffer> {
        self.textures.get(id.0 as usize)?.as_ref()
    }

    /// Number of offscreen targets currently alive.
    #[must_use]
    pub fn live_targets(&self) -> usize {
        self.live_targets
    }

    /// Number of composite draw calls issued so far.
    #[must_use]
    pub fn composite_draws(&self) -> u64 {
        self.composite_draws
    }

    /// The last depth offset set for layer drawing.
    #[must_use]
    pub fn layer_depth(&self) -> f32 {
        self.layer_depth
    }

    /// Blends a solid rectangle into the bound framebuffer.
    pub fn fill_rect(&mut self, rect: Rect, color: [u8; 4]) {
        self.draws += 1;
        let blend = self.blend;
        if let Some(fb) = self.bound_framebuffer() {
            fb.fill_rect(rect, color, blend);
        }
    }

    fn bound_framebuffer(&mut self) -> Option<&mut Framebuffer> {
        match self.bound {
            Some(id) => self.textures.get_mut(id.0 as usize)?.as_mut(),
            None => Some(&mut self.screen),
        }
    }
}

impl CacheBackend for SoftBackend {
    type Target = SoftTarget;
    type Readback = SoftReadback;

    fn viewport(&self) -> Extent {
        self.screen.size()
    }

    fn create_target(&mut self, size: Extent) -> Result<SoftTarget, BackendError> {
        if size.is_empty() {
            return Err(BackendError::ZeroSizedViewport);
        }
        if self.target_budget.is_some_and(|b| self.live_targets >= b) {
            return Err(BackendError::Allocation("soft target budget exhausted"));
        }
        let fb = Framebuffer::new(size);
        let index = match self.free.pop() {
            Some(index) => {
                self.textures[index as usize] = Some(fb);
                index
            }
            None => {
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "texture count stays far below u32::MAX"
                )]
                let index = self.textures.len() as u32;
                self.textures.push(Some(fb));
                index
            }
        };
        self.live_targets += 1;
        log::trace!("soft target {index} created at {size:?}");
        Ok(SoftTarget {
            texture: TextureId(index),
            size,
        })
    }

    fn release_target(&mut self, target: SoftTarget) {
        if let Some(slot) = self.textures.get_mut(target.texture.0 as usize)
            && slot.take().is_some()
        {
            self.free.push(target.texture.0);
            self.live_targets -= 1;
        }
        if self.bound == Some(target.texture) {
            self.bound = None;
        }
    }

    fn target_texture(&self, target: &SoftTarget) -> TextureId {
        target.texture
    }

    fn bind_target(&mut self, target: &SoftTarget) {
        self.bound = Some(target.texture);
        if let Some(fb) = self.bound_framebuffer() {
            fb.clear([0; 4]);
        }
    }

    fn bind_default_target(&mut self) {
        self.bound = None;
    }

    fn flush(&mut self) {}

    fn draw_count(&self) -> u64 {
        self.draws
    }

    fn create_readback(&mut self, size: Extent) -> Result<SoftReadback, BackendError> {
        Ok(SoftReadback {
            size,
            ..SoftReadback::default()
        })
    }

    fn release_readback(&mut self, _readback: SoftReadback) {}

    fn begin_readback(
        &mut self,
        target: &SoftTarget,
        readback: &mut SoftReadback,
    ) -> Result<(), BackendError> {
        let fb = self
            .texture(target.texture)
            .ok_or(BackendError::Allocation("readback of released target"))?;
        if fb.size() != readback.size {
            return Err(BackendError::Allocation("readback size mismatch"));
        }
        readback.pending = Some(PendingCopy {
            polls_left: self.fence_latency,
            bytes: fb.pixels().to_vec(),
        });
        Ok(())
    }

    fn poll_readback(&mut self, readback: &mut SoftReadback) -> FenceStatus {
        let Some(pending) = readback.pending.as_mut() else {
            return FenceStatus::Pending;
        };
        if pending.polls_left > 0 {
            pending.polls_left -= 1;
            return FenceStatus::Pending;
        }
        let Some(copy) = readback.pending.take() else {
            return FenceStatus::Pending;
        };
        if self.lose_readbacks {
            return FenceStatus::Lost;
        }
        readback.bytes = Some(copy.bytes);
        FenceStatus::Signaled
    }

    fn readback_bytes<'r>(&self, readback: &'r SoftReadback) -> Option<&'r [u8]> {
        readback.bytes.as_deref()
    }

    fn abandon_readback(&mut self, readback: &mut SoftReadback) {
        readback.pending = None;
    }

    fn blend_state(&self) -> BlendState {
        self.blend
    }

    fn apply_blend(&mut self, state: BlendState) {
        self.blend = state;
    }

    fn depth_state(&self) -> DepthState {
        self.depth
    }

    fn set_depth_state(&mut self, state: DepthState) {
        self.depth = state;
    }

    fn set_layer_depth(&mut self, depth: f32) {
        self.layer_depth = depth;
    }

    fn max_samplers(&self) -> usize {
        self.samplers
    }

    fn draw_composite(&mut self, slots: &[Option<TextureId>]) {
        self.draws += 1;
        self.composite_draws += 1;
        let blend = self.blend;
        for id in slots.iter().flatten() {
            let Some(src) = self.textures.get_mut(id.0 as usize).and_then(Option::take) else {
                log::warn!("composite of unknown texture {id:?}");
                continue;
            };
            if let Some(dst) = self.bound_framebuffer() {
                dst.blend_from(&src, blend);
            }
            self.textures[id.0 as usize] = Some(src);
        }
    }
}
