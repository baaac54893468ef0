// Copyright 2026 the Stasis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Contiguous slices of the flattened layer list.
//!
//! Each partition shares one cache element. Together the partitions of a
//! [`RenderCache`](crate::cache::RenderCache) cover the flattened layer list
//! exactly once, in order, and none of them is empty.

use alloc::vec::Vec;

use crate::error::InvariantError;
use crate::layer::FlatEntry;

/// An ordered, non-empty run of flattened layers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    start: usize,
    entries: Vec<FlatEntry>,
}

impl Partition {
    /// Creates a partition whose first entry sits at flattened position
    /// `start`.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantError::EmptyPartition`] if `entries` is empty.
    pub fn new(start: usize, entries: Vec<FlatEntry>) -> Result<Self, InvariantError> {
        if entries.is_empty() {
            return Err(InvariantError::EmptyPartition);
        }
        Ok(Self { start, entries })
    }

    /// Flattened position of the first layer.
    #[must_use]
    pub fn start(&self) -> usize {
        self.start
    }

    /// Flattened position one past the last layer.
    #[must_use]
    pub fn end(&self) -> usize {
        self.start + self.entries.len()
    }

    /// Number of layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The layers, in draw order.
    #[must_use]
    pub fn entries(&self) -> &[FlatEntry] {
        &self.entries
    }

    /// Whether [`split`](Self::split) would succeed.
    #[must_use]
    pub fn can_split(&self) -> bool {
        self.entries.len() > 1
    }

    /// Splits off the tail of this partition.
    ///
    /// The first `ceil(len / 2)` layers stay in `self`; the rest are
    /// returned as a new partition.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantError::SplitTooSmall`] if the partition holds a
    /// single layer.
    pub fn split(&mut self) -> Result<Self, InvariantError> {
        let len = self.entries.len();
        if len < 2 {
            return Err(InvariantError::SplitTooSmall { len });
        }
        let half = len.div_ceil(2);
        let tail = self.entries.split_off(half);
        Ok(Self {
            start: self.start + half,
            entries: tail,
        })
    }

    /// Appends the layers of the partition directly following this one.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantError::NotContiguous`] unless `next` starts where
    /// `self` ends. `self` is left unchanged in that case.
    pub fn join(&mut self, next: &Self) -> Result<(), InvariantError> {
        if self.end() != next.start {
            return Err(InvariantError::NotContiguous {
                left_end: self.end(),
                right_start: next.start,
            });
        }
        self.entries.extend_from_slice(&next.entries);
        Ok(())
    }
}

/// Chunks the flattened layer list into at most `count` partitions of
/// `ceil(len / count)` layers each; the last one may be shorter.
///
/// Returns no partitions for an empty list.
#[must_use]
pub fn chunked(entries: &[FlatEntry], count: usize) -> Vec<Partition> {
    if entries.is_empty() {
        return Vec::new();
    }
    let size = entries.len().div_ceil(count.max(1));
    entries
        .chunks(size)
        .enumerate()
        .map(|(i, chunk)| Partition {
            start: i * size,
            entries: chunk.to_vec(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use crate::layer::LayerId;

    fn entries(n: u32) -> Vec<FlatEntry> {
        (0..n)
            .map(|idx| FlatEntry {
                layer: LayerId { idx, generation: 0 },
                group: None,
            })
            .collect()
    }

    fn sizes(parts: &[Partition]) -> Vec<usize> {
        parts.iter().map(Partition::len).collect()
    }

    #[test]
    fn split_even() {
        let mut part = Partition::new(0, entries(6)).unwrap();
        let tail = part.split().unwrap();
        assert_eq!((part.len(), tail.len()), (3, 3));
        assert_eq!(tail.start(), 3);
        assert_eq!(part.end(), tail.start());
    }

    #[test]
    fn split_odd_keeps_larger_half() {
        let mut part = Partition::new(2, entries(5)).unwrap();
        let tail = part.split().unwrap();
        assert_eq!((part.len(), tail.len()), (3, 2));
        assert_eq!(tail.start(), 5);
    }

    #[test]
    fn split_single_layer_fails() {
        let mut part = Partition::new(0, entries(1)).unwrap();
        assert!(!part.can_split());
        assert_eq!(part.split(), Err(InvariantError::SplitTooSmall { len: 1 }));
        assert_eq!(part.len(), 1, "failed split leaves the partition intact");
    }

    #[test]
    fn join_restores_split() {
        let original = Partition::new(0, entries(7)).unwrap();
        let mut head = original.clone();
        let tail = head.split().unwrap();
        head.join(&tail).unwrap();
        assert_eq!(head, original);
    }

    #[test]
    fn join_rejects_gaps() {
        let all = entries(6);
        let mut left = Partition::new(0, all[..2].to_vec()).unwrap();
        let right = Partition::new(3, all[3..].to_vec()).unwrap();
        assert_eq!(
            left.join(&right),
            Err(InvariantError::NotContiguous {
                left_end: 2,
                right_start: 3
            })
        );
        assert_eq!(left.len(), 2);
    }

    #[test]
    fn empty_partitions_are_rejected() {
        assert_eq!(
            Partition::new(0, Vec::new()),
            Err(InvariantError::EmptyPartition)
        );
    }

    #[test]
    fn chunking_covers_everything_in_order() {
        let all = entries(10);
        let parts = chunked(&all, 4);
        assert_eq!(sizes(&parts), vec![3, 3, 3, 1]);
        let rejoined: Vec<FlatEntry> = parts
            .iter()
            .flat_map(|p| p.entries().iter().copied())
            .collect();
        assert_eq!(rejoined, all);
        for pair in parts.windows(2) {
            assert_eq!(pair[0].end(), pair[1].start());
        }
    }

    #[test]
    fn chunking_fewer_layers_than_partitions() {
        assert_eq!(sizes(&chunked(&entries(3), 4)), vec![1, 1, 1]);
        assert_eq!(sizes(&chunked(&entries(8), 4)), vec![2, 2, 2, 2]);
        assert!(chunked(&[], 4).is_empty());
        assert_eq!(sizes(&chunked(&entries(5), 0)), vec![5]);
    }
}
