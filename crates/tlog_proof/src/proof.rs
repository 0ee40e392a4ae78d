// Ported from "merkle" (https://github.com/transparency-dev/merkle)
// Copyright 2022 Google LLC
// Licensed under the Apache-2.0 license found in the LICENSE file or at https://www.apache.org/licenses/LICENSE-2.0
//
// This ports code from the original Go project "merkle" and adapts it to Rust idioms.
//
// Modifications and Rust implementation Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Helpers for constructing log Merkle tree proofs.
//!
//! The functions here only name the nodes a proof is made of. Callers look up
//! the stored hashes of those nodes, and then call [`Nodes::rehash`] to collapse
//! the hashes of the tree's right border into the single "ephemeral" node
//! hash that appears in the proof.
//!
//! References:
//! - [RFC 6962, Section 2.1](https://tools.ietf.org/html/rfc6962#section-2.1)

use compact_range::{decompose, range_nodes, NodeId};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProofError {
    #[error("index {index} out of bounds for tree size {size}")]
    OutOfBounds { index: u64, size: u64 },
    #[error("tree size {size1} > {size2}")]
    InvalidRange { size1: u64, size2: u64 },
    #[error("got {got} hashes but expected {want}")]
    LengthMismatch { got: usize, want: usize },
    #[error("invalid rehash range [{begin}, {end}) for {len} nodes")]
    InvalidNodes { begin: usize, end: usize, len: usize },
}

/// `Nodes` describes how to construct a log Merkle tree proof. It supports any
/// proof that has at most one ephemeral node, such as the inclusion and
/// consistency proofs defined in RFC 6962.
///
/// The node IDs are ordered from the leaves towards the root. If the proof needs
/// an ephemeral node, the IDs of the stored nodes it is recomputed from occupy
/// the sub-slice given by [`Nodes::ephemeral`].
///
/// `Nodes` serializes as `{"ids": [...], "begin": .., "end": ..}`. Deserializing
/// rejects rehash ranges that no proof produces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawNodes")]
pub struct Nodes {
    ids: Vec<NodeId>,
    // [begin, end) indexes into ids of the nodes that make up the ephemeral node.
    begin: usize,
    end: usize,
}

#[derive(Deserialize)]
struct RawNodes {
    ids: Vec<NodeId>,
    begin: usize,
    end: usize,
}

impl TryFrom<RawNodes> for Nodes {
    type Error = ProofError;

    fn try_from(raw: RawNodes) -> Result<Self, Self::Error> {
        let RawNodes { ids, begin, end } = raw;
        // Either no range at all, or at least two nodes to fold.
        let valid = if begin == end {
            begin == 0
        } else {
            begin < end && end <= ids.len() && end - begin >= 2
        };
        if !valid {
            return Err(ProofError::InvalidNodes {
                begin,
                end,
                len: ids.len(),
            });
        }
        Ok(Nodes { ids, begin, end })
    }
}

impl Nodes {
    /// Returns the IDs of the non-ephemeral nodes sufficient to build the proof.
    pub fn ids(&self) -> &[NodeId] {
        &self.ids
    }

    /// Consumes `self`, returning the node IDs.
    pub fn into_ids(self) -> Vec<NodeId> {
        self.ids
    }

    /// Returns the number of node IDs.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if the proof needs no nodes.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Returns the range of indexes into [`Nodes::ids`] whose hashes are folded
    /// into the ephemeral node, or `None` if the proof has no ephemeral node to
    /// recompute. A returned range always holds at least two nodes.
    pub fn ephemeral(&self) -> Option<Range<usize>> {
        (self.begin < self.end).then_some(self.begin..self.end)
    }

    /// Computes the proof from the hashes of the nodes in [`Nodes::ids`], given
    /// in the same order. `combine` returns the hash of an interior node from
    /// the hashes of its left and right children.
    ///
    /// The hashes of the ephemeral range are replaced by a single hash, so the
    /// result is shorter than the input whenever [`Nodes::ephemeral`] is set.
    /// The buffer is reused for the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the number of hashes differs from the number of node
    /// IDs.
    pub fn rehash<H, F>(&self, mut hashes: Vec<H>, mut combine: F) -> Result<Vec<H>, ProofError>
    where
        F: FnMut(&H, &H) -> H,
    {
        if hashes.len() != self.ids.len() {
            debug!(
                "rehash: got {} hashes for {} nodes",
                hashes.len(),
                self.ids.len()
            );
            return Err(ProofError::LengthMismatch {
                got: hashes.len(),
                want: self.ids.len(),
            });
        }
        if self.begin < self.end {
            let tail = hashes.split_off(self.end);
            let mut run = hashes.drain(self.begin..);
            // Each later node sits above the accumulated part of the border,
            // so it goes on the left.
            let folded = run
                .next()
                .map(|first| run.fold(first, |acc, next| combine(&next, &acc)));
            hashes.extend(folded);
            hashes.extend(tail);
        }
        Ok(hashes)
    }
}

/// Returns the nodes needed to prove that the leaf at `index` is included in
/// the log Merkle tree of the given `size`.
///
/// # Errors
///
/// Returns an error unless `index < size`.
pub fn inclusion(index: u64, size: u64) -> Result<Nodes, ProofError> {
    if index >= size {
        debug!("inclusion: index {index} out of bounds for tree size {size}");
        return Err(ProofError::OutOfBounds { index, size });
    }
    Ok(nodes(index, 0, size))
}

/// Returns the nodes needed to prove that the log Merkle tree of size `size1`
/// is a prefix of the tree of size `size2`.
///
/// # Errors
///
/// Returns an error unless `size1 <= size2`.
pub fn consistency(size1: u64, size2: u64) -> Result<Nodes, ProofError> {
    if size1 > size2 {
        debug!("consistency: tree size {size1} > {size2}");
        return Err(ProofError::InvalidRange { size1, size2 });
    }
    if size1 == size2 || size1 == 0 {
        return Ok(Nodes::default());
    }

    // The biggest complete subtree that ends at size1.
    let level = size1.trailing_zeros() as u8;
    let index = (size1 - 1) >> level;

    // Unless it is the whole size1 tree, the verifier needs its hash to
    // recompute the size1 root.
    let mut ids = Vec::with_capacity(bit_len(size2) as usize + 1);
    if index != 0 {
        ids.push(NodeId::new(level, index));
    }
    let prepended = ids.len();

    // Then the path from this node to the size2 root.
    let mut p = nodes(index, level, size2);
    ids.append(&mut p.ids);
    p.ids = ids;
    if prepended == 1 && p.begin < p.end {
        p.begin += 1;
        p.end += 1;
    }
    Ok(p)
}

/// Returns the nodes needed to prove that the `(level, index)` node is included
/// in the log Merkle tree of the given `size`. The node must cover leaves
/// within `[0, size)`.
fn nodes(index: u64, level: u8, size: u64) -> Nodes {
    if size == 0 {
        return Nodes::default();
    }
    // Leaves covered by the (level, index) node.
    let (begin, end) = (index << level, (index + 1) << level);
    debug_assert!(end <= size, "bad math in nodes: {end} > {size}");

    // Only compact ranges [0, begin) and [end, size) are needed, ordered by
    // level from the leaves towards the root.
    let mut left = range_nodes(0, begin);
    left.reverse();
    // [end, end+l) holds the nodes with a right sibling somewhere up the tree.
    // [end+l, size) holds the right border, whose hashes collapse into the
    // ephemeral node.
    let (l, _) = decompose(end, size);
    let middle = range_nodes(end, end + l);
    let mut right = range_nodes(end + l, size);
    right.reverse();

    // The ephemeral node sits at the level where the paths to begin and size
    // diverge.
    let rehash_level = (begin ^ size).ilog2();
    let (mut rehash_begin, mut rehash_end) = (0, 0);

    let mut ids = Vec::with_capacity(left.len() + middle.len() + right.len());
    let (mut i, mut j) = (0, 0);
    for l in u32::from(level)..bit_len(size - 1) {
        if i < left.len() && u32::from(left[i].level()) == l {
            ids.push(left[i]);
            i += 1;
        } else if j < middle.len() && u32::from(middle[j].level()) == l {
            ids.push(middle[j]);
            j += 1;
        }
        if l == rehash_level {
            ids.extend_from_slice(&right);
            if right.len() > 1 {
                rehash_begin = ids.len() - right.len();
                rehash_end = ids.len();
            }
        }
    }
    trace!(
        "nodes({level}, {index}) in tree of size {size}: {} ids, rehash [{rehash_begin}, {rehash_end})",
        ids.len()
    );

    Nodes {
        ids,
        begin: rehash_begin,
        end: rehash_end,
    }
}

/// Returns the number of bits needed to represent `x`.
fn bit_len(x: u64) -> u32 {
    u64::BITS - x.leading_zeros()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(level: u8, index: u64) -> NodeId {
        NodeId::new(level, index)
    }

    fn want(ids: Vec<NodeId>, rehash: Range<usize>) -> Nodes {
        Nodes {
            ids,
            begin: rehash.start,
            end: rehash.end,
        }
    }

    #[test]
    fn test_inclusion() {
        let cases = vec![
            // Single-leaf tree.
            ((0, 1), want(vec![], 0..0)),
            ((0, 2), want(vec![id(0, 1)], 0..0)),
            ((1, 2), want(vec![id(0, 0)], 0..0)),
            ((2, 3), want(vec![id(1, 0)], 0..0)),
            // Perfect tree.
            ((0, 4), want(vec![id(0, 1), id(1, 1)], 0..0)),
            ((3, 4), want(vec![id(0, 2), id(1, 0)], 0..0)),
            // The lone right border leaf needs no rehashing.
            ((4, 5), want(vec![id(2, 0)], 0..0)),
            ((1, 5), want(vec![id(0, 0), id(1, 1), id(0, 4)], 0..0)),
            ((0, 7), want(vec![id(0, 1), id(1, 1), id(0, 6), id(1, 2)], 2..4)),
            ((3, 7), want(vec![id(0, 2), id(1, 0), id(0, 6), id(1, 2)], 2..4)),
            ((4, 7), want(vec![id(0, 5), id(0, 6), id(2, 0)], 0..0)),
            ((6, 7), want(vec![id(1, 2), id(2, 0)], 0..0)),
            (
                (0, 15),
                want(
                    vec![id(0, 1), id(1, 1), id(2, 1), id(0, 14), id(1, 6), id(2, 2)],
                    3..6,
                ),
            ),
            (
                (9, 15),
                want(vec![id(0, 8), id(1, 5), id(0, 14), id(1, 6), id(3, 0)], 2..4),
            ),
        ];
        for ((index, size), want) in cases {
            let got = inclusion(index, size).unwrap();
            assert_eq!(got, want, "inclusion({index}, {size})");
        }
    }

    #[test]
    fn test_inclusion_out_of_bounds() {
        for size in 0..20 {
            for index in size..size + 3 {
                assert_eq!(
                    inclusion(index, size),
                    Err(ProofError::OutOfBounds { index, size })
                );
            }
        }
        let err = inclusion(5, 5).unwrap_err();
        assert_eq!(err.to_string(), "index 5 out of bounds for tree size 5");
    }

    #[test]
    fn test_consistency() {
        let cases = vec![
            ((1, 2), want(vec![id(0, 1)], 0..0)),
            ((2, 4), want(vec![id(1, 1)], 0..0)),
            // size1 is not a power of two, so its last complete subtree comes first.
            ((3, 4), want(vec![id(0, 2), id(0, 3), id(1, 0)], 0..0)),
            ((4, 7), want(vec![id(0, 6), id(1, 2)], 0..2)),
            // The rehash range is shifted past the prepended node.
            (
                (3, 7),
                want(vec![id(0, 2), id(0, 3), id(1, 0), id(0, 6), id(1, 2)], 3..5),
            ),
            ((6, 8), want(vec![id(1, 2), id(1, 3), id(2, 0)], 0..0)),
            (
                (1, 15),
                want(vec![id(0, 1), id(1, 1), id(2, 1), id(0, 14), id(1, 6), id(2, 2)], 3..6),
            ),
        ];
        for ((size1, size2), want) in cases {
            let got = consistency(size1, size2).unwrap();
            assert_eq!(got, want, "consistency({size1}, {size2})");
        }
    }

    #[test]
    fn test_consistency_trivial() {
        for size in 0..40 {
            assert!(consistency(size, size).unwrap().is_empty());
            assert!(consistency(0, size).unwrap().is_empty());
            assert_eq!(consistency(size, size).unwrap().ephemeral(), None);
        }
    }

    #[test]
    fn test_consistency_invalid_range() {
        for size2 in 0..20 {
            assert_eq!(
                consistency(size2 + 1, size2),
                Err(ProofError::InvalidRange {
                    size1: size2 + 1,
                    size2
                })
            );
        }
        let err = consistency(8, 3).unwrap_err();
        assert_eq!(err.to_string(), "tree size 8 > 3");
    }

    #[test]
    fn test_ephemeral_range() {
        for size in 1..=130 {
            for index in 0..size {
                let p = inclusion(index, size).unwrap();
                check_range(&p);
                assert_eq!(p, inclusion(index, size).unwrap());
            }
            for size1 in 0..=size {
                let p = consistency(size1, size).unwrap();
                check_range(&p);
                assert_eq!(p, consistency(size1, size).unwrap());
            }
        }
    }

    fn check_range(p: &Nodes) {
        assert!(p.begin <= p.end && p.end <= p.ids.len(), "bad range in {p:?}");
        match p.ephemeral() {
            Some(r) => assert!(r.len() >= 2, "short rehash range in {p:?}"),
            None => assert_eq!((p.begin, p.end), (0, 0)),
        }
    }

    #[test]
    fn test_rehash() {
        // Strings make the fold order visible.
        let combine = |l: &String, r: &String| format!("h({l},{r})");
        let hashes = |n: usize| (0..n).map(|i| i.to_string()).collect::<Vec<_>>();

        let p = inclusion(0, 15).unwrap();
        assert_eq!(p.ephemeral(), Some(3..6));
        assert_eq!(
            p.rehash(hashes(6), combine).unwrap(),
            vec!["0", "1", "2", "h(5,h(4,3))"]
        );

        let p = consistency(3, 7).unwrap();
        assert_eq!(
            p.rehash(hashes(5), combine).unwrap(),
            vec!["0", "1", "2", "h(4,3)"]
        );

        // Nothing to fold.
        let p = inclusion(4, 5).unwrap();
        assert_eq!(p.rehash(hashes(1), combine).unwrap(), vec!["0"]);
        let p = inclusion(0, 1).unwrap();
        assert!(p.rehash(Vec::<String>::new(), combine).unwrap().is_empty());
    }

    #[test]
    fn test_rehash_length_mismatch() {
        let p = inclusion(0, 7).unwrap();
        let combine = |l: &u64, r: &u64| l ^ r;
        assert_eq!(
            p.rehash(vec![1, 2, 3], combine),
            Err(ProofError::LengthMismatch { got: 3, want: 4 })
        );
        assert_eq!(
            p.rehash(vec![1, 2, 3, 4, 5], combine).unwrap_err().to_string(),
            "got 5 hashes but expected 4"
        );
    }

    #[test]
    fn test_rehash_length() {
        for size in 1..=100 {
            for index in 0..size {
                let p = inclusion(index, size).unwrap();
                let got = p.rehash(vec![0_u64; p.len()], |l, r| l + r).unwrap();
                let want = match p.ephemeral() {
                    Some(r) => p.len() - (r.len() - 1),
                    None => p.len(),
                };
                assert_eq!(got.len(), want);
                // One hash per level of the tree at most.
                assert!(got.len() <= bit_len(size - 1) as usize);
            }
        }
    }

    #[test]
    fn test_serialize() {
        let p = consistency(3, 7).unwrap();
        assert_eq!(
            serde_json::to_value(&p).unwrap(),
            serde_json::json!({
                "ids": [
                    {"level": 0, "index": 2},
                    {"level": 0, "index": 3},
                    {"level": 1, "index": 0},
                    {"level": 0, "index": 6},
                    {"level": 1, "index": 2},
                ],
                "begin": 3,
                "end": 5,
            })
        );
    }

    #[test]
    fn test_deserialize() {
        for (size1, size2) in [(3, 7), (0, 9), (8, 13), (5, 5)] {
            let p = consistency(size1, size2).unwrap();
            let back: Nodes = serde_json::from_str(&serde_json::to_string(&p).unwrap()).unwrap();
            assert_eq!(back, p);
        }
        for index in 0..15 {
            let p = inclusion(index, 15).unwrap();
            let back: Nodes = serde_json::from_value(serde_json::to_value(&p).unwrap()).unwrap();
            assert_eq!(back, p);
        }

        let ids = serde_json::json!([
            {"level": 0, "index": 2},
            {"level": 0, "index": 3},
            {"level": 1, "index": 0},
        ]);
        let cases = vec![
            ((0, 0), true),
            ((0, 2), true),
            ((1, 3), true),
            ((0, 3), true),
            // A single node never needs folding.
            ((1, 2), false),
            // Empty ranges are always [0, 0).
            ((2, 2), false),
            ((2, 1), false),
            ((1, 4), false),
            ((5, 7), false),
        ];
        for ((begin, end), ok) in cases {
            let v = serde_json::json!({"ids": ids, "begin": begin, "end": end});
            let got = serde_json::from_value::<Nodes>(v);
            assert_eq!(got.is_ok(), ok, "begin {begin}, end {end}");
            if let Err(err) = got {
                assert_eq!(
                    err.to_string(),
                    format!("invalid rehash range [{begin}, {end}) for 3 nodes")
                );
            }
        }
    }
}
