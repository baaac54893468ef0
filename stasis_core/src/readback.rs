// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Double-buffered asynchronous readback.
//!
//! A [`ReadbackPair`] owns two readback buffers used as a two-slot MRU
//! cache: one holds the content seen at the previous check, the other the
//! content seen at this check. Snapshots alternate between the slots, and at
//! most one copy is in flight at a time.
//!
//! ```text
//!  snapshot()            poll_fence()            take_comparison()
//!  ──────────►  in flight ──────────► ready[slot]  ─────────────────► matched?
//!  (older slot)             Signaled   (both ready)    older slot is
//!                                                      free again
//! ```

use core::fmt;

use crate::backend::{CacheBackend, Extent, FenceStatus};
use crate::error::BackendError;
use crate::target::OffscreenTarget;

/// The bytes of one ready readback slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Snapshot<'a> {
    /// Whether the element drew nothing when the snapshot was taken.
    pub empty: bool,
    /// Tightly packed RGBA8 pixels.
    pub bytes: &'a [u8],
}

/// Compares two snapshots.
///
/// Two empty snapshots match, an empty and a non-empty one never match,
/// and otherwise every byte (alpha included) must be equal.
#[must_use]
pub fn snapshots_match(first: Snapshot<'_>, second: Snapshot<'_>) -> bool {
    match (first.empty, second.empty) {
        (true, true) => true,
        (true, false) | (false, true) => false,
        (false, false) => first.bytes == second.bytes,
    }
}

/// Two alternating readback buffers with a single outstanding fence.
pub struct ReadbackPair<B: CacheBackend> {
    slots: [Option<B::Readback>; 2],
    ready: [bool; 2],
    empty: [bool; 2],
    latest: usize,
    in_flight: Option<(usize, bool)>,
    comparison_available: bool,
    size: Extent,
}

impl<B: CacheBackend> fmt::Debug for ReadbackPair<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadbackPair")
            .field("ready", &self.ready)
            .field("empty", &self.empty)
            .field("latest", &self.latest)
            .field("in_flight", &self.in_flight)
            .field("comparison_available", &self.comparison_available)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl<B: CacheBackend> Default for ReadbackPair<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: CacheBackend> ReadbackPair<B> {
    /// Creates a pair with no buffers allocated.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: [None, None],
            ready: [false; 2],
            empty: [false; 2],
            latest: 0,
            in_flight: None,
            comparison_available: false,
            size: Extent::default(),
        }
    }

    /// Whether a new snapshot may be issued: no fence is outstanding and no
    /// comparison is waiting to be consumed.
    #[must_use]
    pub fn can_snapshot(&self) -> bool {
        self.in_flight.is_none() && !self.comparison_available
    }

    /// Whether a copy is in flight.
    #[must_use]
    pub fn has_pending_fence(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Whether two ready snapshots are waiting to be compared.
    #[must_use]
    pub fn comparison_available(&self) -> bool {
        self.comparison_available
    }

    /// Issues a copy of `target` into the older slot and starts its fence.
    ///
    /// `empty` records whether the element drew nothing into the target.
    /// Returns `Ok(false)` without doing anything if a copy is already in
    /// flight or the target has no storage.
    ///
    /// # Errors
    ///
    /// Returns the backend error if buffers cannot be allocated or the copy
    /// cannot be issued.
    pub fn snapshot(
        &mut self,
        backend: &mut B,
        target: &OffscreenTarget<B>,
        empty: bool,
    ) -> Result<bool, BackendError> {
        if self.in_flight.is_some() {
            return Ok(false);
        }
        let Some(raw) = target.raw() else {
            return Ok(false);
        };
        if self.size != target.size() {
            // Snapshots of different sizes are not comparable.
            self.release(backend);
            self.size = target.size();
        }
        let slot = if self.ready[self.latest] {
            1 - self.latest
        } else {
            self.latest
        };
        if self.slots[slot].is_none() {
            self.slots[slot] = Some(backend.create_readback(self.size)?);
        }
        let Some(readback) = self.slots[slot].as_mut() else {
            return Ok(false);
        };
        backend.begin_readback(raw, readback)?;
        self.ready[slot] = false;
        self.in_flight = Some((slot, empty));
        Ok(true)
    }

    /// Checks the outstanding fence without blocking.
    ///
    /// On [`FenceStatus::Signaled`] the slot becomes ready and, once both
    /// slots are ready, a comparison becomes available. On
    /// [`FenceStatus::Lost`] the copy is dropped.
    pub fn poll_fence(&mut self, backend: &mut B) -> FenceStatus {
        let Some((slot, empty)) = self.in_flight else {
            return FenceStatus::Pending;
        };
        let Some(readback) = self.slots[slot].as_mut() else {
            self.in_flight = None;
            return FenceStatus::Lost;
        };
        let status = backend.poll_readback(readback);
        match status {
            FenceStatus::Pending => {}
            FenceStatus::Signaled => {
                self.in_flight = None;
                self.ready[slot] = true;
                self.empty[slot] = empty;
                self.latest = slot;
                if self.ready[1 - slot] {
                    self.comparison_available = true;
                }
            }
            FenceStatus::Lost => {
                log::debug!("readback lost; comparison deferred");
                self.in_flight = None;
            }
        }
        status
    }

    /// Consumes the available comparison.
    ///
    /// Returns `Some(true)` if the two most recent snapshots match,
    /// `Some(false)` if they differ, and `None` if no comparison was
    /// available. The older slot is freed for the next snapshot.
    pub fn take_comparison(&mut self, backend: &B) -> Option<bool> {
        if !self.comparison_available {
            return None;
        }
        self.comparison_available = false;
        let older = 1 - self.latest;
        self.ready[older] = false;

        let first = self.slot_snapshot(backend, older)?;
        let second = self.slot_snapshot(backend, self.latest)?;
        Some(snapshots_match(first, second))
    }

    fn slot_snapshot<'s>(&'s self, backend: &B, slot: usize) -> Option<Snapshot<'s>> {
        let readback = self.slots[slot].as_ref()?;
        let bytes = backend.readback_bytes(readback)?;
        Some(Snapshot {
            empty: self.empty[slot],
            bytes,
        })
    }

    /// Abandons any outstanding copy and releases both buffers. Safe to call
    /// repeatedly.
    pub fn release(&mut self, backend: &mut B) {
        for slot in &mut self.slots {
            if let Some(mut readback) = slot.take() {
                backend.abandon_readback(&mut readback);
                backend.release_readback(readback);
            }
        }
        self.ready = [false; 2];
        self.empty = [false; 2];
        self.latest = 0;
        self.in_flight = None;
        self.comparison_available = false;
        self.size = Extent::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBackend;

    fn bound_target(backend: &mut MockBackend) -> OffscreenTarget<MockBackend> {
        let mut target = OffscreenTarget::new();
        assert!(target.bind(backend));
        target
    }

    /// Snapshots the target and polls until the fence signals.
    fn capture(
        pair: &mut ReadbackPair<MockBackend>,
        backend: &mut MockBackend,
        target: &OffscreenTarget<MockBackend>,
    ) {
        assert!(pair.snapshot(backend, target, false).unwrap());
        while pair.poll_fence(backend) == FenceStatus::Pending {}
    }

    #[test]
    fn matching_rules() {
        let a = [1_u8, 2, 3, 4];
        let b = a;
        let c = [9_u8, 2, 3, 4];
        let full = |bytes| Snapshot {
            empty: false,
            bytes,
        };
        let empty = |bytes| Snapshot { empty: true, bytes };
        assert!(snapshots_match(full(&a), full(&b)));
        assert!(!snapshots_match(full(&a), full(&c)), "one byte differs");
        assert!(snapshots_match(empty(&a), empty(&c)), "both empty");
        assert!(!snapshots_match(empty(&a), full(&a)), "one empty");
    }

    #[test]
    fn only_one_fence_in_flight() {
        let mut backend = MockBackend::new(4, 4);
        let target = bound_target(&mut backend);
        let mut pair = ReadbackPair::new();
        assert!(pair.snapshot(&mut backend, &target, false).unwrap());
        assert!(!pair.can_snapshot());
        assert!(!pair.snapshot(&mut backend, &target, false).unwrap());
        assert_eq!(backend.readbacks_started, 1);
    }

    #[test]
    fn comparison_needs_two_ready_slots() {
        let mut backend = MockBackend::new(4, 4);
        let target = bound_target(&mut backend);
        let mut pair = ReadbackPair::new();

        backend.draw(7);
        capture(&mut pair, &mut backend, &target);
        assert!(!pair.comparison_available());
        assert_eq!(pair.take_comparison(&backend), None);

        capture(&mut pair, &mut backend, &target);
        assert!(pair.comparison_available());
        assert!(!pair.can_snapshot(), "must consume before snapshotting again");
        assert_eq!(pair.take_comparison(&backend), Some(true));
        assert_eq!(pair.take_comparison(&backend), None, "consumed");
        assert!(pair.can_snapshot());

        // The most recent slot stays ready, so one more capture compares.
        backend.draw(8);
        capture(&mut pair, &mut backend, &target);
        assert_eq!(pair.take_comparison(&backend), Some(false));
    }

    #[test]
    fn lost_fence_defers_comparison() {
        let mut backend = MockBackend::new(4, 4);
        let target = bound_target(&mut backend);
        let mut pair = ReadbackPair::new();
        capture(&mut pair, &mut backend, &target);

        backend.lose_readbacks = true;
        assert!(pair.snapshot(&mut backend, &target, false).unwrap());
        let mut status = FenceStatus::Pending;
        while status == FenceStatus::Pending {
            status = pair.poll_fence(&mut backend);
        }
        assert_eq!(status, FenceStatus::Lost);
        assert!(!pair.comparison_available());
        assert!(pair.can_snapshot(), "a lost copy frees the fence");
    }

    #[test]
    fn release_is_idempotent() {
        let mut backend = MockBackend::new(4, 4);
        let target = bound_target(&mut backend);
        let mut pair = ReadbackPair::new();
        capture(&mut pair, &mut backend, &target);
        pair.snapshot(&mut backend, &target, false).unwrap();

        pair.release(&mut backend);
        pair.release(&mut backend);
        assert_eq!(backend.live_readbacks, 0);
        assert!(pair.can_snapshot());
        assert_eq!(pair.poll_fence(&mut backend), FenceStatus::Pending);
    }
}
