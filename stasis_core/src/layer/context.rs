// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The drawing context handed to layer callbacks.

use core::fmt;

use crate::backend::CacheBackend;
use crate::blend::{BlendFactor, BlendFunc, BlendState, BlendStrategy, PassThrough};
use crate::time::FrameInfo;

static PASS_THROUGH: PassThrough = PassThrough;

/// Access to the backend for one layer callback.
///
/// Layers must change blend state through [`enable_blend`](Self::enable_blend),
/// [`disable_blend`](Self::disable_blend), [`blend_func`](Self::blend_func)
/// and [`blend_func_separate`](Self::blend_func_separate). Those requests are
/// resolved by the context's [`BlendStrategy`], which differs between direct
/// drawing and drawing into a cache element.
pub struct DrawContext<'a, B: CacheBackend> {
    backend: &'a mut B,
    strategy: &'a dyn BlendStrategy,
    frame: FrameInfo,
}

impl<B: CacheBackend> fmt::Debug for DrawContext<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawContext")
            .field("frame", &self.frame)
            .finish_non_exhaustive()
    }
}

impl<'a, B: CacheBackend> DrawContext<'a, B> {
    /// Creates a context resolving blend requests through `strategy`.
    pub fn new(backend: &'a mut B, strategy: &'a dyn BlendStrategy, frame: FrameInfo) -> Self {
        Self {
            backend,
            strategy,
            frame,
        }
    }

    /// Creates a context that applies blend requests unchanged.
    pub fn direct(backend: &'a mut B, frame: FrameInfo) -> Self {
        Self::new(backend, &PASS_THROUGH, frame)
    }

    /// The backend, for issuing draw commands.
    pub fn backend(&mut self) -> &mut B {
        self.backend
    }

    /// Timing of the current frame.
    #[must_use]
    pub fn frame(&self) -> FrameInfo {
        self.frame
    }

    /// The ambient blend state as currently applied.
    #[must_use]
    pub fn blend_state(&self) -> BlendState {
        self.backend.blend_state()
    }

    /// Requests that blending be switched on.
    pub fn enable_blend(&mut self) {
        let current = self.backend.blend_state();
        self.request(current.with_enabled(true));
    }

    /// Requests that blending be switched off.
    pub fn disable_blend(&mut self) {
        let current = self.backend.blend_state();
        self.request(current.with_enabled(false));
    }

    /// Requests a blend function using the same factors for color and alpha.
    pub fn blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        let current = self.backend.blend_state();
        self.request(current.with_func(BlendFunc::uniform(src, dst)));
    }

    /// Requests a blend function with separate color and alpha factors.
    pub fn blend_func_separate(
        &mut self,
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) {
        let current = self.backend.blend_state();
        self.request(current.with_func(BlendFunc::separate(
            src_rgb, dst_rgb, src_alpha, dst_alpha,
        )));
    }

    /// Requests a complete blend state.
    pub fn set_blend(&mut self, requested: BlendState) {
        self.request(requested);
    }

    fn request(&mut self, requested: BlendState) {
        let current = self.backend.blend_state();
        if let Some(resolved) = self.strategy.resolve(current, requested)
            && resolved != current
        {
            self.backend.apply_blend(resolved);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blend::BlendInterceptor;
    use crate::testing::MockBackend;

    #[test]
    fn direct_context_applies_disable() {
        let mut backend = MockBackend::new(4, 4);
        backend.apply_blend(BlendState::STANDARD);
        let mut ctx = DrawContext::direct(&mut backend, FrameInfo::default());
        ctx.disable_blend();
        assert!(!ctx.blend_state().enabled);
        assert_eq!(ctx.blend_state().func, BlendState::STANDARD.func);
    }

    #[test]
    fn intercepted_disable_becomes_opaque_copy() {
        let mut backend = MockBackend::new(4, 4);
        backend.apply_blend(BlendState::STANDARD);
        let interceptor = BlendInterceptor::new();
        let mut ctx = DrawContext::new(&mut backend, &interceptor, FrameInfo::default());
        ctx.disable_blend();
        assert_eq!(ctx.blend_state(), BlendState::OPAQUE_COPY);

        // Restoring the standard function afterwards is allowed.
        ctx.blend_func_separate(
            BlendFactor::SrcAlpha,
            BlendFactor::OneMinusSrcAlpha,
            BlendFactor::One,
            BlendFactor::OneMinusSrcAlpha,
        );
        assert_eq!(ctx.blend_state(), BlendState::STANDARD);
    }

    #[test]
    fn intercepted_unknown_function_is_ignored() {
        let mut backend = MockBackend::new(4, 4);
        backend.apply_blend(BlendState::STANDARD);
        let applied_before = backend.blend_history.len();
        let interceptor = BlendInterceptor::new();
        let mut ctx = DrawContext::new(&mut backend, &interceptor, FrameInfo::default());
        ctx.blend_func(BlendFactor::DstColor, BlendFactor::Zero);
        assert_eq!(ctx.blend_state(), BlendState::STANDARD);
        assert_eq!(interceptor.rejected(), 1);
        assert_eq!(
            backend.blend_history.len(),
            applied_before,
            "a rejected request must not touch the backend"
        );
    }

    #[test]
    fn glint_passes_through_interceptor() {
        let mut backend = MockBackend::new(4, 4);
        backend.apply_blend(BlendState::STANDARD);
        let interceptor = BlendInterceptor::new();
        let mut ctx = DrawContext::new(&mut backend, &interceptor, FrameInfo::default());
        ctx.set_blend(BlendState::GLINT);
        assert_eq!(ctx.blend_state(), BlendState::GLINT);
    }
}
