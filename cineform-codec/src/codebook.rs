// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Builds the fixed set of FSM tables a [`crate::decoder::Decoder`] is
//! constructed with (spec.md §3 "FSM table", §4.B "selected by
//! `active_codebook`").
//!
//! spec.md's external interface (§6) takes no codebook argument to
//! `Decoder::new` — codebooks are baked into the decoder, selected from the
//! bitstream only by a small integer id, the same way the reference decoder
//! ships a handful of precomputed Huffman-like tables rather than deriving
//! them from a per-stream setup header (contrast with, say, Vorbis's
//! stream-embedded codebooks in `symphonia-codec-vorbis::codebook`). The
//! exact bit assignments of the real codec's tables are proprietary and
//! reproducing them bit-for-bit is explicitly out of scope (spec.md §1
//! Non-goals: "Bit-exact reproduction of the reference SSE code paths").
//! What's built here is a structurally complete, single-state table family
//! that satisfies every contract of spec.md §4.B: run/value/sign emits, an
//! escape code for large literals, and a dedicated `END_OF_BAND` code.

use std::sync::Arc;

use crate::fsm::{EntryKind, FsmEntry, FsmTable, INDEX_SIZE};

/// Reserved 9-bit window values at the top of the index space.
const END_OF_BAND_CODE: u32 = (INDEX_SIZE - 1) as u32;
const ESCAPE_CODE: u32 = (INDEX_SIZE - 2) as u32;

/// Number of bits of a run/value code: 4 bits of run length (0..=15), 4
/// bits of magnitude (0..=15, 0 meaning "run only, no value").
const RUN_BITS: u32 = 4;
const MAGNITUDE_BITS: u32 = 4;
const CODE_BITS: u32 = RUN_BITS + MAGNITUDE_BITS;

/// Literal width read after an [`ESCAPE_CODE`] (spec.md §4.B "Peaks").
const ESCAPE_LITERAL_BITS: u32 = 15;

fn build_single_state_table() -> FsmTable {
    let mut entries = Vec::with_capacity(INDEX_SIZE);
    for window in 0..INDEX_SIZE as u32 {
        let entry = if window == END_OF_BAND_CODE {
            FsmEntry {
                kind: EntryKind::EndOfBand,
                next_state: 0,
                run_length: 0,
                magnitude: 0,
                bits_consumed: crate::fsm::INDEX_BITS,
            }
        }
        else if window == ESCAPE_CODE {
            FsmEntry {
                kind: EntryKind::Escape { escape_bits: ESCAPE_LITERAL_BITS },
                next_state: 0,
                run_length: 0,
                magnitude: 0,
                bits_consumed: crate::fsm::INDEX_BITS,
            }
        }
        else {
            let run = (window >> MAGNITUDE_BITS) & ((1 << RUN_BITS) - 1);
            let magnitude = window & ((1 << MAGNITUDE_BITS) - 1);
            FsmEntry {
                kind: EntryKind::Emit { has_value: magnitude != 0 },
                next_state: 0,
                run_length: run as u16,
                magnitude: magnitude as i16,
                bits_consumed: CODE_BITS,
            }
        };
        entries.push(entry);
    }
    FsmTable::new(1, entries)
}

/// The fixed set of codebooks a decoder instance is constructed with. All
/// four currently share the same table shape; they are kept distinct so
/// `active_codebook` selection is meaningful and each has a stable identity
/// for [`crate::fsm::DeQuantFsm`]'s fusion cache.
pub fn builtin_codebooks() -> Vec<Arc<FsmTable>> {
    (0..4).map(|_| Arc::new(build_single_state_table())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_of_band_and_escape_codes_are_reserved() {
        let table = build_single_state_table();
        assert_eq!(table.lookup(0, END_OF_BAND_CODE).kind, EntryKind::EndOfBand);
        assert!(matches!(table.lookup(0, ESCAPE_CODE).kind, EntryKind::Escape { .. }));
    }

    #[test]
    fn ordinary_window_decodes_run_and_magnitude() {
        let table = build_single_state_table();
        let window = (3u32 << MAGNITUDE_BITS) | 5;
        let entry = table.lookup(0, window);
        assert_eq!(entry.run_length, 3);
        assert_eq!(entry.magnitude, 5);
    }
}
