// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Offscreen color+depth target sized to the viewport.

use core::fmt;

use crate::backend::{CacheBackend, Extent, TextureId};
use crate::error::BackendError;

/// A lazily allocated offscreen target that follows the viewport size.
///
/// Storage is only recreated when the requested size differs from the
/// current allocation. Resizing needs `&mut self`, so a resize can never
/// interleave with another one on the same target.
pub struct OffscreenTarget<B: CacheBackend> {
    target: Option<B::Target>,
    size: Extent,
}

impl<B: CacheBackend> fmt::Debug for OffscreenTarget<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OffscreenTarget")
            .field("allocated", &self.target.is_some())
            .field("size", &self.size)
            .finish()
    }
}

impl<B: CacheBackend> Default for OffscreenTarget<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: CacheBackend> OffscreenTarget<B> {
    /// Creates a target with no storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            target: None,
            size: Extent::default(),
        }
    }

    /// Ensures storage of exactly `size` exists.
    ///
    /// A no-op when the current allocation already has that size.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::ZeroSizedViewport`] for empty sizes or the
    /// backend's allocation error. The target is left without storage in
    /// both cases.
    pub fn resize(&mut self, backend: &mut B, size: Extent) -> Result<(), BackendError> {
        if self.target.is_some() && self.size == size {
            return Ok(());
        }
        self.release(backend);
        if size.is_empty() {
            return Err(BackendError::ZeroSizedViewport);
        }
        let target = backend.create_target(size)?;
        self.target = Some(target);
        self.size = size;
        Ok(())
    }

    /// Resizes to the current viewport and binds the target for drawing,
    /// clearing color to transparent black and depth to far.
    ///
    /// Returns `false` if the target could not be constructed. Callers must
    /// draw directly this frame instead.
    pub fn bind(&mut self, backend: &mut B) -> bool {
        let viewport = backend.viewport();
        if let Err(err) = self.resize(backend, viewport) {
            match err {
                BackendError::ZeroSizedViewport => log::debug!("offscreen target skipped: {err}"),
                _ => log::warn!("offscreen target unavailable: {err}"),
            }
            return false;
        }
        match &self.target {
            Some(target) => {
                backend.bind_target(target);
                true
            }
            None => false,
        }
    }

    /// Releases the storage. Safe to call repeatedly.
    pub fn release(&mut self, backend: &mut B) {
        if let Some(target) = self.target.take() {
            backend.release_target(target);
        }
        self.size = Extent::default();
    }

    /// Whether storage is currently allocated.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.target.is_some()
    }

    /// Size of the current allocation, or zero when unallocated.
    #[must_use]
    pub fn size(&self) -> Extent {
        self.size
    }

    /// The backing texture, if allocated.
    #[must_use]
    pub fn texture(&self, backend: &B) -> Option<TextureId> {
        self.target.as_ref().map(|t| backend.target_texture(t))
    }

    /// The backend target, if allocated.
    #[must_use]
    pub fn raw(&self) -> Option<&B::Target> {
        self.target.as_ref()
    }
}
