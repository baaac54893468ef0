// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.
//!
//! Two families exist and they are handled very differently:
//!
//! - [`BackendError`] describes a resource that could not be produced this
//!   frame (zero-sized viewport, allocation failure, lost context, failed
//!   buffer map). Callers treat it as "cache unavailable, draw directly" or
//!   "no comparison this frame" and retry on a later frame.
//! - [`InvariantError`] describes a scheduling bug: splitting a partition
//!   that cannot be split, or joining partitions that are not neighbours.
//!   It is returned rather than panicked because partition maintenance runs
//!   in steady-state code, but it must never be silently ignored.

use thiserror::Error;

/// A GPU resource could not be created or read this frame.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The viewport has a zero width or height.
    #[error("viewport is zero-sized")]
    ZeroSizedViewport,
    /// The backend failed to allocate the named resource.
    #[error("failed to allocate {0}")]
    Allocation(&'static str),
    /// The graphics context was lost.
    #[error("graphics context lost")]
    ContextLost,
    /// A readback buffer could not be mapped for reading.
    #[error("readback buffer could not be mapped")]
    MapFailed,
}

/// A partition operation was requested that violates partition invariants.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum InvariantError {
    /// Only partitions with more than one layer can be split.
    #[error("cannot split a partition of {len} layer(s)")]
    SplitTooSmall {
        /// Number of layers in the partition.
        len: usize,
    },
    /// Joined partitions must be adjacent slices of the flattened layer list.
    #[error("partitions are not contiguous: left ends at {left_end}, right starts at {right_start}")]
    NotContiguous {
        /// Flattened position one past the left partition's last layer.
        left_end: usize,
        /// Flattened position of the right partition's first layer.
        right_start: usize,
    },
    /// Partitions must contain at least one layer.
    #[error("partition is empty")]
    EmptyPartition,
}
