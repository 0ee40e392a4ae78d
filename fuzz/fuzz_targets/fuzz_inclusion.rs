// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

#![no_main]

use libfuzzer_sys::fuzz_target;
use tlog_proof::{inclusion, ProofError};

fuzz_target!(|data: (u64, u64)| {
    let (index, size) = data;
    match inclusion(index, size) {
        Ok(nodes) => {
            if let Some(r) = nodes.ephemeral() {
                assert!(r.len() >= 2 && r.end <= nodes.len());
            }
            for id in nodes.ids() {
                assert!(id.coverage().is_some_and(|r| r.end <= size));
            }
            let proof = nodes
                .rehash(vec![1_u128; nodes.len()], |l, r| l + r)
                .unwrap();
            assert!(proof.len() <= 64);
        }
        Err(err) => assert_eq!(err, ProofError::OutOfBounds { index, size }),
    }
});
