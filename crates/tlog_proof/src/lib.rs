// Ported from "merkle" (https://github.com/transparency-dev/merkle)
// Copyright 2022 Google LLC
// Licensed under the Apache-2.0 license found in the LICENSE file or at https://www.apache.org/licenses/LICENSE-2.0
//
// This ports code from the original Go project "merkle" and adapts it to Rust idioms.
//
// Modifications and Rust implementation Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! # tlog proof
//!
//! Names the nodes that make up [RFC 6962](https://tools.ietf.org/html/rfc6962#section-2.1)
//! inclusion and consistency proofs for an append-only log Merkle tree, and
//! assembles the final proof once the hashes of those nodes are known.
//!
//! Trees whose size is not a power of two have an incomplete right border. The
//! proof then contains an "ephemeral" node which is not stored anywhere, and
//! whose hash is recomputed from the stored nodes listed in [`Nodes::ephemeral`].
//!
//! ```
//! use tlog_proof::{inclusion, NodeId};
//!
//! let nodes = inclusion(0, 7).unwrap();
//! assert_eq!(nodes.ids()[0], NodeId::new(0, 1));
//! assert_eq!(nodes.ephemeral(), Some(2..4));
//!
//! // Look up the stored hash of each node, then fold the right border.
//! let hashes: Vec<u64> = nodes.ids().iter().map(|id| id.index()).collect();
//! let proof = nodes.rehash(hashes, |left, right| left * 10 + right).unwrap();
//! assert_eq!(proof, vec![1, 1, 26]);
//! ```

pub mod proof;

pub use compact_range::NodeId;
pub use proof::*;
