// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Property tests for the frame codec.

use crate::codec::{decode, encode, decode_chunk_bytes, encode_chunk_bytes};
use proptest::prelude::*;

proptest! {
    #[test]
    fn any_string_survives_framing(s in ".*") {
        let frame = encode(&s).unwrap();
        let back: String = decode(&frame[4..]).unwrap();
        prop_assert_eq!(back, s);
    }

    #[test]
    fn any_bytes_survive_chunk_encoding(bytes in proptest::collection::vec(any::<u8>(), 0..4096)) {
        let encoded = encode_chunk_bytes(&bytes);
        prop_assert_eq!(decode_chunk_bytes(&encoded).unwrap(), bytes);
    }

    #[test]
    fn length_prefix_matches_body(n in any::<u64>()) {
        let frame = encode(&n).unwrap();
        let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        prop_assert_eq!(len, frame.len() - 4);
    }
}
