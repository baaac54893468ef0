// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording backend for unit tests.
//!
//! Draw commands append a one-byte tag to the bound target's content, so a
//! target's "pixels" are simply the sequence of tags drawn into it since it
//! was last bound.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::backend::{CacheBackend, DepthState, Extent, FenceStatus, TextureId};
use crate::blend::BlendState;
use crate::error::BackendError;

#[derive(Debug)]
pub(crate) struct MockTarget {
    pub(crate) id: u32,
    pub(crate) size: Extent,
}

#[derive(Debug, Default)]
pub(crate) struct MockReadback {
    pub(crate) id: u32,
    pending: Option<(u32, Vec<u8>)>,
    bytes: Option<Vec<u8>>,
}

#[derive(Debug)]
pub(crate) struct MockBackend {
    pub(crate) viewport: Extent,
    pub(crate) fail_targets: bool,
    pub(crate) lose_readbacks: bool,
    pub(crate) fence_latency: u32,
    pub(crate) samplers: usize,
    next_id: u32,
    pub(crate) contents: BTreeMap<u32, Vec<u8>>,
    pub(crate) screen: Vec<u8>,
    pub(crate) bound: Option<u32>,
    draws: u64,
    pub(crate) live_targets: usize,
    pub(crate) live_readbacks: usize,
    pub(crate) targets_created: usize,
    pub(crate) readbacks_started: usize,
    pub(crate) blend: BlendState,
    pub(crate) blend_history: Vec<BlendState>,
    pub(crate) depth: DepthState,
    pub(crate) layer_depths: Vec<f32>,
    pub(crate) composites: Vec<Vec<Option<TextureId>>>,
    pub(crate) flushes: usize,
}

impl MockBackend {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Self {
            viewport: Extent::new(width, height),
            fail_targets: false,
            lose_readbacks: false,
            fence_latency: 1,
            samplers: 8,
            next_id: 1,
            contents: BTreeMap::new(),
            screen: Vec::new(),
            bound: None,
            draws: 0,
            live_targets: 0,
            live_readbacks: 0,
            targets_created: 0,
            readbacks_started: 0,
            blend: BlendState::INITIAL,
            blend_history: Vec::new(),
            depth: DepthState::ENABLED,
            layer_depths: Vec::new(),
            composites: Vec::new(),
            flushes: 0,
        }
    }

    /// Records a draw of `tag` into whichever target is bound.
    pub(crate) fn draw(&mut self, tag: u8) {
        self.draws += 1;
        match self.bound {
            Some(id) => self.contents.entry(id).or_default().push(tag),
            None => self.screen.push(tag),
        }
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl CacheBackend for MockBackend {
    type Target = MockTarget;
    type Readback = MockReadback;

    fn viewport(&self) -> Extent {
        self.viewport
    }

    fn create_target(&mut self, size: Extent) -> Result<MockTarget, BackendError> {
        if size.is_empty() {
            return Err(BackendError::ZeroSizedViewport);
        }
        if self.fail_targets {
            return Err(BackendError::Allocation("mock target"));
        }
        let id = self.next_id();
        self.contents.insert(id, Vec::new());
        self.live_targets += 1;
        self.targets_created += 1;
        Ok(MockTarget { id, size })
    }

    fn release_target(&mut self, target: MockTarget) {
        self.contents.remove(&target.id);
        self.live_targets -= 1;
    }

    fn target_texture(&self, target: &MockTarget) -> TextureId {
        TextureId(target.id)
    }

    fn bind_target(&mut self, target: &MockTarget) {
        self.bound = Some(target.id);
        self.contents.insert(target.id, Vec::new());
    }

    fn bind_default_target(&mut self) {
        self.bound = None;
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }

    fn draw_count(&self) -> u64 {
        self.draws
    }

    fn create_readback(&mut self, _size: Extent) -> Result<MockReadback, BackendError> {
        let id = self.next_id();
        self.live_readbacks += 1;
        Ok(MockReadback {
            id,
            ..MockReadback::default()
        })
    }

    fn release_readback(&mut self, _readback: MockReadback) {
        self.live_readbacks -= 1;
    }

    fn begin_readback(
        &mut self,
        target: &MockTarget,
        readback: &mut MockReadback,
    ) -> Result<(), BackendError> {
        let content = self.contents.get(&target.id).cloned().unwrap_or_default();
        readback.pending = Some((self.fence_latency, content));
        self.readbacks_started += 1;
        Ok(())
    }

    fn poll_readback(&mut self, readback: &mut MockReadback) -> FenceStatus {
        let Some((remaining, _)) = readback.pending.as_mut() else {
            return FenceStatus::Pending;
        };
        if *remaining > 0 {
            *remaining -= 1;
            return FenceStatus::Pending;
        }
        let (_, bytes) = readback.pending.take().unwrap_or_default();
        if self.lose_readbacks {
            return FenceStatus::Lost;
        }
        readback.bytes = Some(bytes);
        FenceStatus::Signaled
    }

    fn readback_bytes<'r>(&self, readback: &'r MockReadback) -> Option<&'r [u8]> {
        readback.bytes.as_deref()
    }

    fn abandon_readback(&mut self, readback: &mut MockReadback) {
        readback.pending = None;
    }

    fn blend_state(&self) -> BlendState {
        self.blend
    }

    fn apply_blend(&mut self, state: BlendState) {
        self.blend = state;
        self.blend_history.push(state);
    }

    fn depth_state(&self) -> DepthState {
        self.depth
    }

    fn set_depth_state(&mut self, state: DepthState) {
        self.depth = state;
    }

    fn set_layer_depth(&mut self, depth: f32) {
        self.layer_depths.push(depth);
    }

    fn max_samplers(&self) -> usize {
        self.samplers
    }

    fn draw_composite(&mut self, slots: &[Option<TextureId>]) {
        self.composites.push(slots.to_vec());
        for slot in slots.iter().flatten() {
            let content = self.contents.get(&slot.0).cloned().unwrap_or_default();
            self.screen.extend_from_slice(&content);
        }
    }
}
