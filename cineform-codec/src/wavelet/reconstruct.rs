// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The wavelet reconstruction engine (spec.md §4.E): drives the kernels of
//! [`super::kernels`] across the bands of one [`Wavelet`], producing either
//! the next-lower level's LL seed or, at the bottom of the pyramid, rows of
//! the final channel image.

use super::kernels::{horizontal_inverse_row, temporal_inverse_row, vertical_inverse_rows};
use super::subband::BandIndex;
use super::transform::{TransformShape, Wavelet};

/// The result of reconstructing one wavelet: either a single full-resolution
/// image (the common case — spatial and field-plus wavelets), or a pair of
/// images (a pure temporal wavelet's even/odd fields).
pub enum Reconstructed {
    Image { width: usize, height: usize, data: Vec<i16> },
    TemporalPair { width: usize, height: usize, even: Vec<i16>, odd: Vec<i16> },
}

/// Reconstructs one wavelet in full (spec.md §4.E steps 1-2), dispatching on
/// [`TransformShape`] and band count. Requires the wavelet to already be
/// fully valid (all its bands entropy-decoded); this is the scheduler's
/// responsibility to guarantee before calling (spec.md §4.G).
pub fn reconstruct_wavelet(wavelet: &Wavelet) -> Reconstructed {
    debug_assert!(wavelet.is_fully_valid());

    match (wavelet.shape, wavelet.num_bands()) {
        (TransformShape::Spatial, 4) | (TransformShape::SpatialTemporal, 4) => {
            let (data, width, height) = reconstruct_spatial(wavelet);
            Reconstructed::Image { width, height, data }
        }
        (TransformShape::FieldPlus, 4) => {
            let (data, width, height) = reconstruct_field_plus(wavelet);
            Reconstructed::Image { width, height, data }
        }
        (_, 2) => {
            let (even, odd, width, height) = reconstruct_temporal(wavelet);
            Reconstructed::TemporalPair { width, height, even, odd }
        }
        (shape, bands) => {
            unreachable!("unsupported wavelet shape {shape:?} with {bands} bands")
        }
    }
}

fn band(wavelet: &Wavelet, idx: BandIndex) -> &super::subband::Subband {
    wavelet.bands.iter().find(|b| b.band_index == idx).expect("band present")
}

/// Ordinary 2D separable spatial inverse: horizontal pass combines (LL,HL)
/// into a full-width lowpass row and (LH,HH) into a full-width highpass
/// row; the vertical pass then combines three consecutive lowpass rows
/// with the corresponding highpass row to emit two full-resolution output
/// rows (spec.md §4.D.1-2, §4.E "Reconstruction order").
fn reconstruct_spatial(wavelet: &Wavelet) -> (Vec<i16>, usize, usize) {
    let ll = band(wavelet, BandIndex::Ll);
    let lh = band(wavelet, BandIndex::Lh);
    let hl = band(wavelet, BandIndex::Hl);
    let hh = band(wavelet, BandIndex::Hh);

    let half_h = ll.height;
    let width = ll.width * 2;
    let height = half_h * 2;

    let mut l_rows: Vec<Vec<i16>> = Vec::with_capacity(half_h);
    let mut h_rows: Vec<Vec<i16>> = Vec::with_capacity(half_h);
    for n in 0..half_h {
        let mut l_row = vec![0i16; width];
        horizontal_inverse_row(ll.row(n), hl.row(n), &mut l_row);
        l_rows.push(l_row);

        let mut h_row = vec![0i16; width];
        horizontal_inverse_row(lh.row(n), hh.row(n), &mut h_row);
        h_rows.push(h_row);
    }

    let mut out = vec![0i16; width * height];
    for n in 0..half_h {
        let above = if n > 0 { Some(l_rows[n - 1].as_slice()) } else { None };
        let below = if n + 1 < half_h { Some(l_rows[n + 1].as_slice()) } else { None };
        let (even_slice, odd_slice) = out.split_at_mut((2 * n + 1) * width);
        let even_out = &mut even_slice[2 * n * width..];
        let odd_out = &mut odd_slice[..width];
        vertical_inverse_rows(above, &l_rows[n], below, &h_rows[n], even_out, odd_out);
    }

    (out, width, height)
}

/// Field-plus inverse (spec.md §4.E "Field-plus transform"): the horizontal
/// pass is the same as [`reconstruct_spatial`]'s, but the vertical pass is
/// replaced with a temporal inverse, since the two resulting full-width
/// rows are two interleaved field lines rather than spatially adjacent
/// rows.
fn reconstruct_field_plus(wavelet: &Wavelet) -> (Vec<i16>, usize, usize) {
    let ll = band(wavelet, BandIndex::Ll);
    let lh = band(wavelet, BandIndex::Lh);
    let hl = band(wavelet, BandIndex::Hl);
    let hh = band(wavelet, BandIndex::Hh);

    let half_h = ll.height;
    let width = ll.width * 2;
    let height = half_h * 2;

    let mut out = vec![0i16; width * height];
    for n in 0..half_h {
        let mut l_row = vec![0i16; width];
        horizontal_inverse_row(ll.row(n), hl.row(n), &mut l_row);
        let mut h_row = vec![0i16; width];
        horizontal_inverse_row(lh.row(n), hh.row(n), &mut h_row);

        let (top, bottom) = out.split_at_mut((2 * n + 1) * width);
        let field_a = &mut top[2 * n * width..];
        let field_b = &mut bottom[..width];
        temporal_inverse_row(&l_row, &h_row, field_a, field_b);
    }

    (out, width, height)
}

/// Pure temporal inverse over two full-resolution bands: elementwise
/// `a = (L+H)>>1; b = (L-H)>>1` (spec.md §4.D.3).
fn reconstruct_temporal(wavelet: &Wavelet) -> (Vec<i16>, Vec<i16>, usize, usize) {
    let lo = band(wavelet, BandIndex::TemporalEven);
    let hi = band(wavelet, BandIndex::TemporalOdd);
    let width = lo.width;
    let height = lo.height;

    let mut even = vec![0i16; width * height];
    let mut odd = vec![0i16; width * height];
    for y in 0..height {
        temporal_inverse_row(
            lo.row(y),
            hi.row(y),
            &mut even[y * width..(y + 1) * width],
            &mut odd[y * width..(y + 1) * width],
        );
    }
    (even, odd, width, height)
}

/// Row-streaming variant of [`reconstruct_spatial`] for the bottom of the
/// pyramid (spec.md §4.E "Row-streaming reconstruction"): never
/// materializes a full intermediate image, instead calling `emit_row_pair`
/// with each pair of full-resolution output rows as they become available,
/// keeping only three rolling lowpass line buffers (top/mid/bottom) plus
/// the current highpass line alive at once.
pub fn reconstruct_spatial_streaming<F>(wavelet: &Wavelet, mut emit_row_pair: F)
where
    F: FnMut(usize, &[i16], &[i16]),
{
    debug_assert!(wavelet.is_fully_valid());
    let ll = band(wavelet, BandIndex::Ll);
    let lh = band(wavelet, BandIndex::Lh);
    let hl = band(wavelet, BandIndex::Hl);
    let hh = band(wavelet, BandIndex::Hh);

    let half_h = ll.height;
    let width = ll.width * 2;

    let mut l_row_of = |n: usize| -> Vec<i16> {
        let mut row = vec![0i16; width];
        horizontal_inverse_row(ll.row(n), hl.row(n), &mut row);
        row
    };

    let mut top = if half_h > 0 { Some(l_row_of(0)) } else { None };
    let mut mid: Option<Vec<i16>> = None;

    for n in 0..half_h {
        let below = if n + 1 < half_h { Some(l_row_of(n + 1)) } else { None };
        let current = if n == 0 { top.take().unwrap() } else { mid.take().unwrap() };

        let mut h_row = vec![0i16; width];
        horizontal_inverse_row(lh.row(n), hh.row(n), &mut h_row);

        let above_ref = top.as_deref();
        let mut even_out = vec![0i16; width];
        let mut odd_out = vec![0i16; width];
        vertical_inverse_rows(above_ref, &current, below.as_deref(), &h_row, &mut even_out, &mut odd_out);
        emit_row_pair(2 * n, &even_out, &odd_out);

        top = Some(current);
        mid = below;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wavelet::subband::Subband;
    use smallvec::SmallVec;

    fn constant_spatial_wavelet(value: i16, w: usize, h: usize) -> Wavelet {
        let mut ll = Subband::new(w, h, BandIndex::Ll);
        for v in ll.data.iter_mut() {
            *v = value;
        }
        let lh = Subband::new(w, h, BandIndex::Lh);
        let hl = Subband::new(w, h, BandIndex::Hl);
        let hh = Subband::new(w, h, BandIndex::Hh);
        let wavelet = Wavelet::new(0, TransformShape::Spatial, SmallVec::from_vec(vec![ll, lh, hl, hh]));
        wavelet.mark_band_valid(BandIndex::Ll);
        wavelet.mark_band_valid(BandIndex::Lh);
        wavelet.mark_band_valid(BandIndex::Hl);
        wavelet.mark_band_valid(BandIndex::Hh);
        wavelet
    }

    #[test]
    fn constant_ll_band_reconstructs_to_constant_image() {
        let wavelet = constant_spatial_wavelet(64, 3, 3);
        match reconstruct_wavelet(&wavelet) {
            Reconstructed::Image { width, height, data } => {
                assert_eq!((width, height), (6, 6));
                assert!(data.iter().all(|&v| v == 64));
            }
            _ => panic!("expected image"),
        }
    }

    #[test]
    fn streaming_matches_full_materialization() {
        let wavelet = constant_spatial_wavelet(12, 2, 2);
        let (full, width, _height) = reconstruct_spatial(&wavelet);

        let mut rows: Vec<(usize, Vec<i16>, Vec<i16>)> = Vec::new();
        reconstruct_spatial_streaming(&wavelet, |y, even, odd| {
            rows.push((y, even.to_vec(), odd.to_vec()));
        });

        for (y, even, odd) in rows {
            assert_eq!(even, full[y * width..(y + 1) * width]);
            assert_eq!(odd, full[(y + 1) * width..(y + 2) * width]);
        }
    }

    #[test]
    fn temporal_wavelet_reconstructs_pair() {
        let mut even = Subband::new(2, 2, BandIndex::TemporalEven);
        let mut odd = Subband::new(2, 2, BandIndex::TemporalOdd);
        for v in even.data.iter_mut() {
            *v = 10;
        }
        for v in odd.data.iter_mut() {
            *v = 2;
        }
        let wavelet = Wavelet::new(0, TransformShape::Spatial, SmallVec::from_vec(vec![even, odd]));
        wavelet.mark_band_valid(BandIndex::TemporalEven);
        wavelet.mark_band_valid(BandIndex::TemporalOdd);

        match reconstruct_wavelet(&wavelet) {
            Reconstructed::TemporalPair { even, odd, .. } => {
                assert!(even.iter().all(|&v| v == 6));
                assert!(odd.iter().all(|&v| v == 4));
            }
            _ => panic!("expected temporal pair"),
        }
    }
}
