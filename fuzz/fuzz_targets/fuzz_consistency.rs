// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

#![no_main]

use libfuzzer_sys::fuzz_target;
use tlog_proof::{consistency, ProofError};

fuzz_target!(|data: (u64, u64)| {
    let (size1, size2) = data;
    match consistency(size1, size2) {
        Ok(nodes) => {
            if size1 == size2 || size1 == 0 {
                assert!(nodes.is_empty());
            }
            if let Some(r) = nodes.ephemeral() {
                assert!(r.len() >= 2 && r.end <= nodes.len());
            }
            for id in nodes.ids() {
                assert!(id.coverage().is_some_and(|r| r.end <= size2));
            }
            nodes
                .rehash(vec![0_u8; nodes.len()], |l, r| l ^ r)
                .unwrap();
        }
        Err(err) => assert_eq!(err, ProofError::InvalidRange { size1, size2 }),
    }
});
