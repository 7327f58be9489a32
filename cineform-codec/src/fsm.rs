// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The FSM entropy table (spec.md §3 "FSM table", §4.B).
//!
//! Grounded on `symphonia-core`'s `io::bit::huffman` table-of-tables VLC
//! decoder: that module also represents a variable-length code as a flat
//! array of entries addressed by a peeked bit window, tagged as either a
//! terminal ("value") entry or an intermediate ("jump") entry. Here the
//! table is two-dimensional (state × bit window) rather than a tree of
//! sub-tables, because the wire format's FSM is explicitly state-based
//! (spec.md's "next_state" field) rather than a pure prefix code.

use cineform_core::util::saturate_i16;

/// Number of bits peeked at each FSM step to index into the current state's
/// row of the table.
pub const INDEX_BITS: u32 = 9;

/// Number of table rows the index can address, `2^INDEX_BITS`.
pub const INDEX_SIZE: usize = 1 << INDEX_BITS;

/// What an [`FsmEntry`] instructs the decoder to do once looked up.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EntryKind {
    /// Emit `run_length` zeros followed by one value (or a run-only emit if
    /// `has_value` is false), then transition to `next_state`.
    Emit { has_value: bool },
    /// Not enough bits were peeked to resolve a code; consume
    /// `bits_consumed` and continue in `next_state` without emitting.
    Continue,
    /// An escape code: the magnitude is not in the table but follows as a
    /// literal of `escape_bits` bits immediately after this entry's bits
    /// (spec.md §4.B "Peaks" variant).
    Escape { escape_bits: u32 },
    /// Terminates the subband.
    EndOfBand,
}

/// One entry of the FSM transition table (spec.md §3 "FSM table").
#[derive(Copy, Clone, Debug)]
pub struct FsmEntry {
    pub kind: EntryKind,
    pub next_state: u16,
    pub run_length: u16,
    /// Coefficient magnitude, already dequantized by [`DeQuantFsm::fuse`]
    /// when the table in use is a per-worker scratch copy (spec.md §4.B
    /// "Dequantization fusion"). Zero for entries without a value.
    pub magnitude: i16,
    pub bits_consumed: u32,
}

impl FsmEntry {
    const fn end_of_band() -> FsmEntry {
        FsmEntry {
            kind: EntryKind::EndOfBand,
            next_state: 0,
            run_length: 0,
            magnitude: 0,
            bits_consumed: 0,
        }
    }
}

/// A complete FSM table for one codebook: `num_states` rows of `INDEX_SIZE`
/// entries each, flattened row-major (spec.md "FSM table").
#[derive(Clone)]
pub struct FsmTable {
    entries: Vec<FsmEntry>,
    num_states: u16,
}

impl FsmTable {
    /// Builds a table from a flat, row-major `(state, entry)` array. Rows
    /// not referenced by any transition may be left unpopulated with
    /// [`EntryKind::EndOfBand`] placeholders; this is a decoder construction
    /// concern, not a per-sample one.
    pub fn new(num_states: u16, entries: Vec<FsmEntry>) -> FsmTable {
        debug_assert_eq!(entries.len(), num_states as usize * INDEX_SIZE);
        FsmTable { entries, num_states }
    }

    /// A minimal, always-valid table of one state whose every entry is
    /// `END_OF_BAND`. Used as a safe default and in tests that only need a
    /// table shape, not real codebook contents.
    pub fn empty() -> FsmTable {
        FsmTable::new(1, vec![FsmEntry::end_of_band(); INDEX_SIZE])
    }

    pub fn num_states(&self) -> u16 {
        self.num_states
    }

    #[inline]
    pub fn lookup(&self, state: u16, window: u32) -> &FsmEntry {
        let row = state as usize * INDEX_SIZE;
        &self.entries[row + (window as usize & (INDEX_SIZE - 1))]
    }
}

/// Per-worker dequantization fusion of a master FSM table (spec.md §4.B
/// "Dequantization fusion", §9 "Per-thread FSM copies").
///
/// The master table is immutable and shared read-only across workers; each
/// worker owns one `DeQuantFsm` scratch buffer that it refills via
/// [`DeQuantFsm::fuse`] whenever the active codebook or quantizer changes,
/// and never mutates the master. This makes the fusion trivially idempotent:
/// re-fusing simply recomputes the scratch table from the untouched master.
pub struct DeQuantFsm {
    scratch: Vec<FsmEntry>,
    num_states: u16,
    fused_for: Option<(usize, i32)>,
}

impl DeQuantFsm {
    pub fn new() -> DeQuantFsm {
        DeQuantFsm { scratch: Vec::new(), num_states: 0, fused_for: None }
    }

    /// Refills the scratch table with `master`'s entries, each magnitude
    /// column pre-multiplied by `quantizer` and saturated into `i16`. A
    /// `master` pointer identity plus `quantizer` pair that was already
    /// fused for is a no-op.
    pub fn fuse(&mut self, master: &FsmTable, master_id: usize, quantizer: i32) {
        if self.fused_for == Some((master_id, quantizer)) {
            return;
        }
        self.scratch.clear();
        self.scratch.extend(master.entries.iter().map(|e| {
            let mut e = *e;
            if matches!(e.kind, EntryKind::Emit { has_value: true }) {
                e.magnitude = saturate_i16(i32::from(e.magnitude) * quantizer);
            }
            e
        }));
        self.num_states = master.num_states;
        self.fused_for = Some((master_id, quantizer));
    }

    #[inline]
    pub fn lookup(&self, state: u16, window: u32) -> &FsmEntry {
        let row = state as usize * INDEX_SIZE;
        &self.scratch[row + (window as usize & (INDEX_SIZE - 1))]
    }
}

impl Default for DeQuantFsm {
    fn default() -> DeQuantFsm {
        DeQuantFsm::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fusion_is_idempotent_for_same_quantizer() {
        let mut entries = vec![FsmEntry::end_of_band(); INDEX_SIZE];
        entries[0] = FsmEntry {
            kind: EntryKind::Emit { has_value: true },
            next_state: 0,
            run_length: 0,
            magnitude: 10,
            bits_consumed: 4,
        };
        let master = FsmTable::new(1, entries);

        let mut dq = DeQuantFsm::new();
        dq.fuse(&master, 0, 3);
        let first = dq.lookup(0, 0).magnitude;
        dq.fuse(&master, 0, 3);
        let second = dq.lookup(0, 0).magnitude;
        assert_eq!(first, 30);
        assert_eq!(second, 30);

        // Master itself must remain untouched by fusion.
        assert_eq!(master.lookup(0, 0).magnitude, 10);
    }

    #[test]
    fn fusion_saturates_on_overflow() {
        let mut entries = vec![FsmEntry::end_of_band(); INDEX_SIZE];
        entries[5] = FsmEntry {
            kind: EntryKind::Emit { has_value: true },
            next_state: 0,
            run_length: 0,
            magnitude: i16::MAX,
            bits_consumed: 4,
        };
        let master = FsmTable::new(1, entries);
        let mut dq = DeQuantFsm::new();
        dq.fuse(&master, 0, 1000);
        assert_eq!(dq.lookup(0, 5).magnitude, i16::MAX);
    }
}
