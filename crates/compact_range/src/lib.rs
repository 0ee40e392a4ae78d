// Ported from "merkle" (https://github.com/transparency-dev/merkle)
// Copyright 2022 Google LLC
// Licensed under the Apache-2.0 license found in the LICENSE file or at https://www.apache.org/licenses/LICENSE-2.0
//
// This ports code from the original Go project "merkle" and adapts it to Rust idioms.
//
// Modifications and Rust implementation Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! # compact range
//!
//! Coordinates of the nodes of an append-only binary Merkle tree, and the
//! minimal sets of complete subtrees that cover a contiguous range of leaves.
//!
//! A *complete subtree* at `(level, index)` covers the `2^level` leaves starting
//! at `index << level`. Any range `[begin, end)` of leaves is covered by a
//! unique minimal list of such subtrees, called its *compact range*. The nodes
//! of a compact range split into a left part, whose nodes have no left sibling
//! inside the range, and a right part, whose nodes have no right sibling inside
//! the range. See [`decompose`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Identifies a node of a Merkle tree by its level above the leaves and its
/// index within that level.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct NodeId {
    level: u8,
    index: u64,
}

impl NodeId {
    /// Returns the ID of the node at the given level and index.
    pub const fn new(level: u8, index: u64) -> Self {
        Self { level, index }
    }

    /// Returns the node's level. Leaves are at level 0.
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Returns the node's index within its level.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Returns the half-open range of leaves covered by the node, or `None` if
    /// the node does not fit in a tree of at most `u64::MAX` leaves.
    pub fn coverage(&self) -> Option<Range<u64>> {
        let begin = shl_exact(self.index, self.level)?;
        let end = shl_exact(self.index.checked_add(1)?, self.level)?;
        Some(begin..end)
    }
}

// Returns x << shift, or None if any set bit is shifted out.
fn shl_exact(x: u64, shift: u8) -> Option<u64> {
    let y = x.checked_shl(u32::from(shift))?;
    (y >> shift == x).then_some(y)
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.level, self.index)
    }
}

/// Returns the sizes of the left and right parts of the compact range
/// `[begin, end)`.
///
/// The left part `[begin, begin + left)` is covered by the nodes with no left
/// sibling inside the range, and the right part `[begin + left, end)` by the
/// nodes with no right sibling. The set bits of `left` and `right` are the
/// levels of the nodes in each part.
///
/// # Panics
///
/// Panics in debug builds if `begin > end`.
pub fn decompose(begin: u64, end: u64) -> (u64, u64) {
    debug_assert!(begin <= end, "invalid range [{begin}, {end})");
    // The math below needs a leaf to the left of the range.
    if begin == 0 {
        return (0, end);
    }
    let xbegin = begin - 1;
    // Paths to leaves begin-1 and end diverge at level d. Only the nodes
    // strictly below it belong to the range.
    let d = (xbegin ^ end).ilog2();
    let mask = (1_u64 << d) - 1;
    // Left nodes hang off the path to begin-1 where it has a zero bit, and right
    // nodes hang off the path to end where it has a one bit.
    (!xbegin & mask, end & mask)
}

/// Returns the number of nodes in the compact range `[begin, end)`.
pub fn range_size(begin: u64, end: u64) -> usize {
    let (left, right) = decompose(begin, end);
    (left.count_ones() + right.count_ones()) as usize
}

/// Returns the IDs of the nodes forming the compact range `[begin, end)`.
///
/// The nodes are ordered left to right by the leaves they cover: the left
/// part comes first with levels increasing, followed by the right part with
/// levels decreasing. For example `range_nodes(1, 7)` returns `(0, 1)`,
/// `(1, 1)`, `(1, 2)`, `(0, 6)`.
pub fn range_nodes(begin: u64, end: u64) -> Vec<NodeId> {
    let (mut left, mut right) = decompose(begin, end);
    let mut ids = Vec::with_capacity(range_size(begin, end));

    let mut pos = begin;
    while left != 0 {
        let level = left.trailing_zeros();
        ids.push(NodeId::new(level as u8, pos >> level));
        pos += 1 << level;
        left ^= 1 << level;
    }
    while right != 0 {
        let level = right.ilog2();
        ids.push(NodeId::new(level as u8, pos >> level));
        pos += 1 << level;
        right ^= 1 << level;
    }
    debug_assert_eq!(pos, end, "bad math in range_nodes");

    ids
}
