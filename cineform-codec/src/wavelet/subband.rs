// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A single wavelet subband (spec.md §3 "Subband").

/// Which of the four 2D bands, or the two temporal bands, a [`Subband`]
/// occupies within its [`super::transform::Wavelet`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BandIndex {
    Ll,
    Lh,
    Hl,
    Hh,
    /// Temporal lowpass (even field/frame).
    TemporalEven,
    /// Temporal highpass (odd field/frame).
    TemporalOdd,
}

impl BandIndex {
    /// The bit position this band occupies in a wavelet's validity bitmask,
    /// consistent across both the 4-band spatial layout and the 2-band
    /// temporal layout.
    pub fn bit(self) -> u8 {
        match self {
            BandIndex::Ll | BandIndex::TemporalEven => 0,
            BandIndex::Lh | BandIndex::TemporalOdd => 1,
            BandIndex::Hl => 2,
            BandIndex::Hh => 3,
        }
    }
}

/// A 2D array of wavelet coefficients (spec.md §3 "Subband").
///
/// `data` is owned by the subband (in turn owned by its containing
/// [`super::transform::Wavelet`], per spec.md §3 "Ownership"); `pitch` may
/// exceed `width` to keep row starts aligned for the kernels.
pub struct Subband {
    pub width: usize,
    pub height: usize,
    pub pitch: usize,
    pub band_index: BandIndex,
    pub quantizer: i32,
    /// Size of the band's entropy-coded payload in bytes, as advertised by
    /// the band descriptor tag (spec.md §4.H).
    pub coded_size: u32,
    /// Linear scale applied after dequantization, used by some highpass
    /// bands at coarser levels; 1 when unused.
    pub scale_factor: i32,
    pub data: Vec<i16>,
}

impl Subband {
    pub fn new(width: usize, height: usize, band_index: BandIndex) -> Subband {
        let pitch = width;
        Subband {
            width,
            height,
            pitch,
            band_index,
            quantizer: 1,
            coded_size: 0,
            scale_factor: 1,
            data: vec![0i16; pitch * height],
        }
    }

    /// Resizes the subband's backing storage in place, reusing the
    /// allocation when the new dimensions fit (spec.md §3 "Lifecycle":
    /// "transform memory is reused across samples").
    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.pitch = width;
        let needed = self.pitch * height;
        if self.data.len() < needed {
            self.data.resize(needed, 0);
        }
    }

    pub fn row(&self, y: usize) -> &[i16] {
        &self.data[y * self.pitch..y * self.pitch + self.width]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [i16] {
        &mut self.data[y * self.pitch..y * self.pitch + self.width]
    }

    /// Treats every cell of this band as zero, without touching storage.
    /// Used for the half-horizontal-resolution decode path, which skips
    /// decoding bands 1 and 3 entirely (spec.md §4.E "Half-resolution
    /// decoding").
    pub fn clear(&mut self) {
        for v in self.data.iter_mut() {
            *v = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_preserves_allocation_when_it_fits() {
        let mut sb = Subband::new(4, 4, BandIndex::Ll);
        sb.data[0] = 7;
        let ptr_before = sb.data.as_ptr();
        sb.resize(2, 2);
        assert_eq!(sb.data.as_ptr(), ptr_before);
        assert_eq!(sb.width, 2);
        assert_eq!(sb.height, 2);
    }
}
