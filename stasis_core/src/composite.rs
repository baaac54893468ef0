// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Batched compositing of cached textures.

use alloc::vec::Vec;

use crate::backend::{CacheBackend, DepthState, TextureId};
use crate::blend::BlendState;

/// Composites runs of cached textures onto the bound target.
///
/// Textures are drawn `max_samplers` at a time over the backend's shared
/// full-screen quad. For `n` textures that is `ceil(n / max_samplers)` draw
/// calls; unused sampler slots are bound to "none".
///
/// Depth testing and writing are switched off and the blend state set to
/// [`BlendState::COMPOSITE`] around the batch; both are restored afterwards.
#[derive(Debug, Default)]
pub struct CompositionBatcher {
    slots: Vec<Option<TextureId>>,
}

impl CompositionBatcher {
    /// Creates a batcher.
    #[must_use]
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Composites `textures` in order and returns the number of draw calls
    /// issued.
    pub fn composite_all<B: CacheBackend>(
        &mut self,
        backend: &mut B,
        textures: &[TextureId],
    ) -> usize {
        if textures.is_empty() {
            return 0;
        }
        let limit = backend.max_samplers().max(1);

        let saved_depth = backend.depth_state();
        let saved_blend = backend.blend_state();
        backend.set_depth_state(DepthState::DISABLED);
        backend.apply_blend(BlendState::COMPOSITE);

        let mut draws = 0;
        for batch in textures.chunks(limit) {
            self.slots.clear();
            self.slots.extend(batch.iter().copied().map(Some));
            self.slots.resize(limit, None);
            backend.draw_composite(&self.slots);
            draws += 1;
        }

        backend.apply_blend(saved_blend);
        backend.set_depth_state(saved_depth);
        draws
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use crate::testing::MockBackend;

    fn textures(n: u32) -> Vec<TextureId> {
        (0..n).map(TextureId).collect()
    }

    #[test]
    fn draw_count_is_ceil_of_samplers() {
        let mut backend = MockBackend::new(4, 4);
        let mut batcher = CompositionBatcher::new();
        for (n, expected) in [(1, 1), (8, 1), (9, 2), (16, 2), (17, 3)] {
            backend.composites.clear();
            assert_eq!(batcher.composite_all(&mut backend, &textures(n)), expected);
            assert_eq!(backend.composites.len(), expected);
        }
        assert_eq!(batcher.composite_all(&mut backend, &[]), 0);
    }

    #[test]
    fn unused_slots_are_unbound() {
        let mut backend = MockBackend::new(4, 4);
        let mut batcher = CompositionBatcher::new();
        batcher.composite_all(&mut backend, &textures(10));
        let last = &backend.composites[1];
        assert_eq!(last.len(), 8, "every slot is bound every draw");
        assert_eq!(&last[..2], &[Some(TextureId(8)), Some(TextureId(9))]);
        assert!(last[2..].iter().all(Option::is_none));
    }

    #[test]
    fn state_is_restored() {
        let mut backend = MockBackend::new(4, 4);
        backend.apply_blend(BlendState::STANDARD);
        let mut batcher = CompositionBatcher::new();
        batcher.composite_all(&mut backend, &textures(3));
        assert_eq!(backend.blend_state(), BlendState::STANDARD);
        assert_eq!(backend.depth_state(), DepthState::ENABLED);
        assert!(backend.blend_history.contains(&BlendState::COMPOSITE));
    }

    #[test]
    fn respects_backend_sampler_limit() {
        let mut backend = MockBackend::new(4, 4);
        backend.samplers = 2;
        let mut batcher = CompositionBatcher::new();
        assert_eq!(batcher.composite_all(&mut backend, &textures(5)), 3);
    }
}
