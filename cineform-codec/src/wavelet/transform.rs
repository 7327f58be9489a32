// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The wavelet/transform tree (spec.md §3 "Wavelet", "Transform").
//!
//! The reference decoder links levels together with pointers (each level's
//! LL aliases into its parent's buffer). spec.md §9 asks for an arena of
//! wavelets addressed by index handles instead; [`WaveletArena`] is that
//! arena, [`WaveletIndex`] the handle, and [`Transform`] the per-channel
//! ordering over it. This mirrors how `symphonia-core`'s packet/stream
//! tables are plain `Vec`s addressed by small integer ids rather than
//! graphs of `Rc`/`RefCell`.

use std::sync::atomic::{AtomicU8, Ordering};

use smallvec::SmallVec;

use super::subband::{BandIndex, Subband};

/// Which kernel family a [`Wavelet`] is inverted with (spec.md §9
/// "Pulldown / interlaced switching").
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransformShape {
    /// Ordinary 2D spatial wavelet: LL, LH, HL, HH.
    Spatial,
    /// Spatial wavelet whose LL feeds a temporal pair below it.
    SpatialTemporal,
    /// Combined temporal-over-fields-plus-horizontal transform used for
    /// interlaced sources (spec.md §4.E "Field-plus transform").
    FieldPlus,
}

/// An index handle into a [`WaveletArena`]. Plain `u16`, never dereferenced
/// without going back through the owning arena — this is what keeps the
/// transform tree free of long-lived aliasing.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct WaveletIndex(pub u16);

/// One decomposition level of one channel (spec.md §3 "Wavelet").
pub struct Wavelet {
    pub level: u8,
    pub shape: TransformShape,
    pub bands: SmallVec<[Subband; 4]>,
    /// Bit `i` set means `bands[i]`'s band has been entropy-decoded and
    /// dequantized. Release/acquire atomic per spec.md §9 "Shared mutable
    /// scheduler state".
    validity: AtomicU8,
    /// Bit `i` set means a worker has already claimed `bands[i]` for
    /// decode, used to make enqueue idempotent across retries.
    started: AtomicU8,
    /// Set exactly once, by whichever worker's CAS observes full validity
    /// first (spec.md §8 Invariant 1: "reconstruction of W happens exactly
    /// once").
    reconstruction_claimed: AtomicU8,
}

impl Wavelet {
    pub fn new(level: u8, shape: TransformShape, bands: SmallVec<[Subband; 4]>) -> Wavelet {
        Wavelet {
            level,
            shape,
            bands,
            validity: AtomicU8::new(0),
            started: AtomicU8::new(0),
            reconstruction_claimed: AtomicU8::new(0),
        }
    }

    pub fn num_bands(&self) -> usize {
        self.bands.len()
    }

    fn full_mask(&self) -> u8 {
        ((1u16 << self.num_bands()) - 1) as u8
    }

    /// Marks `band` valid and returns `true` if this call is the one that
    /// completed the wavelet (i.e. the wavelet became fully valid as a
    /// result of this call, and no other band-mark call will observe that
    /// transition for the same wavelet in the same sample).
    pub fn mark_band_valid(&self, band: BandIndex) -> bool {
        let bit = 1u8 << band.bit();
        let before = self.validity.fetch_or(bit, Ordering::AcqRel);
        let after = before | bit;
        before != self.full_mask() && after == self.full_mask()
    }

    pub fn is_fully_valid(&self) -> bool {
        self.validity.load(Ordering::Acquire) == self.full_mask()
    }

    /// Attempts to claim this wavelet for reconstruction via CAS on
    /// `reconstruction_claimed`; returns `true` exactly once per wavelet per
    /// sample (spec.md §4.G "claims it (CAS on `done_flag`)").
    pub fn try_claim_reconstruction(&self) -> bool {
        self.reconstruction_claimed
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Marks a band as already dispatched to a worker, returning `false` if
    /// it was already claimed (used by the sample parser to avoid
    /// double-enqueuing a band on retry paths).
    pub fn try_claim_band_start(&self, band: BandIndex) -> bool {
        let bit = 1u8 << band.bit();
        let before = self.started.fetch_or(bit, Ordering::AcqRel);
        before & bit == 0
    }

    /// Resets all per-sample tracking bits. Called when the transform tree
    /// is reused for a new sample (spec.md §3 "Lifecycle").
    pub fn reset_for_sample(&self) {
        self.validity.store(0, Ordering::Release);
        self.started.store(0, Ordering::Release);
        self.reconstruction_claimed.store(0, Ordering::Release);
    }
}

/// Owns every [`Wavelet`] across every channel of a decoder instance, kept
/// alive and reused sample to sample. Indices are stable for the lifetime
/// of the arena; only the contents of each `Wavelet` are reset per sample.
#[derive(Default)]
pub struct WaveletArena {
    wavelets: Vec<Wavelet>,
}

impl WaveletArena {
    pub fn new() -> WaveletArena {
        WaveletArena { wavelets: Vec::new() }
    }

    pub fn push(&mut self, wavelet: Wavelet) -> WaveletIndex {
        let idx = WaveletIndex(self.wavelets.len() as u16);
        self.wavelets.push(wavelet);
        idx
    }

    pub fn get(&self, idx: WaveletIndex) -> &Wavelet {
        &self.wavelets[idx.0 as usize]
    }

    pub fn get_mut(&mut self, idx: WaveletIndex) -> &mut Wavelet {
        &mut self.wavelets[idx.0 as usize]
    }

    pub fn reset_all_for_sample(&self) {
        for w in &self.wavelets {
            w.reset_for_sample();
        }
    }

    pub fn clear(&mut self) {
        self.wavelets.clear();
    }
}

/// The ordered levels of one channel, top (lowest resolution) to bottom
/// (full resolution) (spec.md §3 "Transform").
pub struct Transform {
    pub levels: Vec<WaveletIndex>,
    pub pixel_type: cineform_core::sample::FrameLayout,
}

impl Transform {
    pub fn new(pixel_type: cineform_core::sample::FrameLayout) -> Transform {
        Transform { levels: Vec::new(), pixel_type }
    }

    /// The wavelet at the very top of the pyramid, where reconstruction
    /// begins (spec.md §4.E "Reconstruction order").
    pub fn top(&self) -> Option<WaveletIndex> {
        self.levels.first().copied()
    }

    /// The wavelet feeding the final, full-resolution channel image.
    pub fn bottom(&self) -> Option<WaveletIndex> {
        self.levels.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spatial_wavelet() -> Wavelet {
        let bands = SmallVec::from_vec(vec![
            Subband::new(2, 2, BandIndex::Ll),
            Subband::new(2, 2, BandIndex::Lh),
            Subband::new(2, 2, BandIndex::Hl),
            Subband::new(2, 2, BandIndex::Hh),
        ]);
        Wavelet::new(0, TransformShape::Spatial, bands)
    }

    #[test]
    fn becomes_reconstructible_exactly_when_all_bands_valid() {
        let w = spatial_wavelet();
        assert!(!w.mark_band_valid(BandIndex::Ll));
        assert!(!w.mark_band_valid(BandIndex::Lh));
        assert!(!w.mark_band_valid(BandIndex::Hl));
        assert!(w.mark_band_valid(BandIndex::Hh));
        assert!(w.is_fully_valid());
        // A second mark of an already-valid band must not report completion again.
        assert!(!w.mark_band_valid(BandIndex::Hh));
    }

    #[test]
    fn reconstruction_claim_succeeds_exactly_once() {
        let w = spatial_wavelet();
        assert!(w.try_claim_reconstruction());
        assert!(!w.try_claim_reconstruction());
    }

    #[test]
    fn arena_indices_survive_push() {
        let mut arena = WaveletArena::new();
        let a = arena.push(spatial_wavelet());
        let b = arena.push(spatial_wavelet());
        assert_ne!(a, b);
        assert_eq!(arena.get(a).level, 0);
    }
}
