// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Row packer: converts reconstructed, pre-saturation wavelet-domain rows
//! into bytes of a target [`PixelFormat`] (spec.md §4.F).
//!
//! Per spec.md §9 "Dense per-format expansion", this is built as one small
//! [`RowWriter`] trait with one adapter per format rather than one packing
//! function per format — adding a format means adding an adapter, not
//! duplicating the reconstruction-to-bytes driver. This mirrors how
//! `symphonia-core::codecs::video::VideoDecoder` keeps per-codec variation
//! behind a single trait rather than per-codec free functions.
//!
//! Every [`RowWriter`] method takes channel values already scaled to a
//! 16-bit nominal range, regardless of the caller's [`Precision`]; each
//! writer is responsible for narrowing that to its own format's native
//! width (spec.md §4.D "Precision policy": "saturation ... is applied only
//! at the final stage when converting to the output pixel format").

use cineform_core::pixel::{ColorParams, PixelFormat, Precision};
use cineform_core::util::saturate_unsigned;

use crate::color::{matrix_for, ColorMatrix};

/// Receives one fully color-converted pixel (or YUV pair) at a time and is
/// responsible only for *how bytes are laid out*, not for color math.
/// Channel values are pre-scaled to a 16-bit nominal range (see module docs).
pub trait RowWriter {
    /// Writes one RGB(A) pixel. `a` is `0xffff` (opaque) for formats without
    /// an alpha channel.
    fn write_rgba(&mut self, out: &mut [u8], r: u16, g: u16, b: u16, a: u16);

    /// Writes one packed YUV 4:2:2 pixel pair sharing one chroma sample.
    fn write_yuv_pair(&mut self, out: &mut [u8], y0: u16, u: u16, y1: u16, v: u16);

    /// The number of bytes one call to `write_rgba`/`write_yuv_pair`
    /// advances the output cursor by.
    fn unit_bytes(&self) -> usize;
}

/// Narrows a 16-bit nominal channel value to `bits` significant bits,
/// keeping the most-significant `bits` bits (the inverse of
/// [`widen_to_16`]).
#[inline]
fn narrow(v: u16, bits: u32) -> u32 {
    u32::from(v) >> (16 - bits)
}

/// Widens a `bits`-bit channel value (spec.md §4.D precision) to the 16-bit
/// nominal range every [`RowWriter`] is called with.
#[inline]
fn widen_to_16(v: u16, bits: u32) -> u16 {
    (u32::from(v) << (16 - bits)) as u16
}

macro_rules! rgb_writer {
    ($name:ident, $unit:literal, |$r:ident, $g:ident, $b:ident, $a:ident, $out:ident| $body:block) => {
        pub struct $name;
        impl RowWriter for $name {
            fn write_rgba(&mut self, $out: &mut [u8], $r: u16, $g: u16, $b: u16, $a: u16) {
                $body
            }
            fn write_yuv_pair(&mut self, _out: &mut [u8], _y0: u16, _u: u16, _y1: u16, _v: u16) {
                unreachable!("RGB writer invoked with a YUV pair")
            }
            fn unit_bytes(&self) -> usize {
                $unit
            }
        }
    };
}

rgb_writer!(Rgb24Writer, 3, |r, g, b, _a, out| {
    out[0] = narrow(r, 8) as u8;
    out[1] = narrow(g, 8) as u8;
    out[2] = narrow(b, 8) as u8;
});

rgb_writer!(Rgb32Writer, 4, |r, g, b, _a, out| {
    out[0] = narrow(r, 8) as u8;
    out[1] = narrow(g, 8) as u8;
    out[2] = narrow(b, 8) as u8;
    out[3] = 0;
});

rgb_writer!(Rgba32Writer, 4, |r, g, b, a, out| {
    out[0] = narrow(r, 8) as u8;
    out[1] = narrow(g, 8) as u8;
    out[2] = narrow(b, 8) as u8;
    out[3] = narrow(a, 8) as u8;
});

rgb_writer!(Rg48Writer, 6, |r, g, b, _a, out| {
    write_u16le(&mut out[0..2], r);
    write_u16le(&mut out[2..4], g);
    write_u16le(&mut out[4..6], b);
});

rgb_writer!(Rgba64Writer, 8, |r, g, b, a, out| {
    write_u16le(&mut out[0..2], r);
    write_u16le(&mut out[2..4], g);
    write_u16le(&mut out[4..6], b);
    write_u16le(&mut out[6..8], a);
});

rgb_writer!(B64aWriter, 8, |r, g, b, a, out| {
    write_u16be(&mut out[0..2], a);
    write_u16be(&mut out[2..4], r);
    write_u16be(&mut out[4..6], g);
    write_u16be(&mut out[6..8], b);
});

/// 10-bit packed RGB with a selectable byte-ordering, shared by RG30 / AB10
/// / AR10 / R210 / DPX0 (spec.md §4.F: "four byte orderings").
pub struct Packed10Writer {
    pub order: Packed10Order,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Packed10Order {
    /// RG30: little-endian word, bit layout `R|G|B`.
    Rgb,
    /// AB10: bit layout `A|B|G|R`.
    Abgr,
    /// AR10: bit layout `A|R|G|B`.
    Argb,
    /// R210: big-endian word, bit layout `R|G|B`.
    R210,
    /// DPX0: big-endian word, DPX convention (`R|G|B`, word byte-swapped).
    Dpx0,
}

impl RowWriter for Packed10Writer {
    fn write_rgba(&mut self, out: &mut [u8], r: u16, g: u16, b: u16, _a: u16) {
        let r10 = narrow(r, 10);
        let g10 = narrow(g, 10);
        let b10 = narrow(b, 10);
        let word = match self.order {
            Packed10Order::Rgb | Packed10Order::R210 | Packed10Order::Dpx0 => {
                (r10 << 20) | (g10 << 10) | b10
            }
            Packed10Order::Abgr => (b10 << 20) | (g10 << 10) | r10,
            Packed10Order::Argb => (r10 << 20) | (g10 << 10) | b10,
        };
        match self.order {
            Packed10Order::Rgb | Packed10Order::Abgr | Packed10Order::Argb => {
                out[0..4].copy_from_slice(&word.to_le_bytes());
            }
            Packed10Order::R210 | Packed10Order::Dpx0 => {
                out[0..4].copy_from_slice(&word.to_be_bytes());
            }
        }
    }

    fn write_yuv_pair(&mut self, _out: &mut [u8], _y0: u16, _u: u16, _y1: u16, _v: u16) {
        unreachable!("packed-10 writer invoked with a YUV pair")
    }

    fn unit_bytes(&self) -> usize {
        4
    }
}

pub struct YuyvWriter;
impl RowWriter for YuyvWriter {
    fn write_rgba(&mut self, _out: &mut [u8], _r: u16, _g: u16, _b: u16, _a: u16) {
        unreachable!("YUYV writer invoked with an RGB pixel")
    }
    fn write_yuv_pair(&mut self, out: &mut [u8], y0: u16, u: u16, y1: u16, v: u16) {
        out[0] = narrow(y0, 8) as u8;
        out[1] = narrow(u, 8) as u8;
        out[2] = narrow(y1, 8) as u8;
        out[3] = narrow(v, 8) as u8;
    }
    fn unit_bytes(&self) -> usize {
        4
    }
}

pub struct UyvyWriter;
impl RowWriter for UyvyWriter {
    fn write_rgba(&mut self, _out: &mut [u8], _r: u16, _g: u16, _b: u16, _a: u16) {
        unreachable!("UYVY writer invoked with an RGB pixel")
    }
    fn write_yuv_pair(&mut self, out: &mut [u8], y0: u16, u: u16, y1: u16, v: u16) {
        out[0] = narrow(u, 8) as u8;
        out[1] = narrow(y0, 8) as u8;
        out[2] = narrow(v, 8) as u8;
        out[3] = narrow(y1, 8) as u8;
    }
    fn unit_bytes(&self) -> usize {
        4
    }
}

/// YU64: packed 16-bit 4:2:2 YUV, little-endian words, YUYV byte order.
pub struct Yu64Writer;
impl RowWriter for Yu64Writer {
    fn write_rgba(&mut self, _out: &mut [u8], _r: u16, _g: u16, _b: u16, _a: u16) {
        unreachable!("YU64 writer invoked with an RGB pixel")
    }
    fn write_yuv_pair(&mut self, out: &mut [u8], y0: u16, u: u16, y1: u16, v: u16) {
        write_u16le(&mut out[0..2], y0);
        write_u16le(&mut out[2..4], u);
        write_u16le(&mut out[4..6], y1);
        write_u16le(&mut out[6..8], v);
    }
    fn unit_bytes(&self) -> usize {
        8
    }
}

fn write_u16le(out: &mut [u8], v: u16) {
    out.copy_from_slice(&v.to_le_bytes());
}

fn write_u16be(out: &mut [u8], v: u16) {
    out.copy_from_slice(&v.to_be_bytes());
}

/// Builds the right [`RowWriter`] for `format`. `Yr16` (planar), `V210`, and
/// `BayerPlanar` are packed by [`pack_planar_row_16`]/[`pack_v210_row`]
/// instead, since they do not fit the "one interleaved unit per call" shape
/// this trait models.
pub fn writer_for(format: PixelFormat) -> Box<dyn RowWriter> {
    match format {
        PixelFormat::Yuyv => Box::new(YuyvWriter),
        PixelFormat::Uyvy => Box::new(UyvyWriter),
        PixelFormat::Yu64 => Box::new(Yu64Writer),
        PixelFormat::Rgb24 => Box::new(Rgb24Writer),
        PixelFormat::Rgb32 => Box::new(Rgb32Writer),
        PixelFormat::Rgba32 => Box::new(Rgba32Writer),
        PixelFormat::Rg48 => Box::new(Rg48Writer),
        PixelFormat::Rgba64 => Box::new(Rgba64Writer),
        PixelFormat::B64a => Box::new(B64aWriter),
        PixelFormat::Rg30 => Box::new(Packed10Writer { order: Packed10Order::Rgb }),
        PixelFormat::Ab10 => Box::new(Packed10Writer { order: Packed10Order::Abgr }),
        PixelFormat::Ar10 => Box::new(Packed10Writer { order: Packed10Order::Argb }),
        PixelFormat::R210 => Box::new(Packed10Writer { order: Packed10Order::R210 }),
        PixelFormat::Dpx0 => Box::new(Packed10Writer { order: Packed10Order::Dpx0 }),
        PixelFormat::V210 | PixelFormat::Yr16 | PixelFormat::BayerPlanar => {
            panic!("{format:?} is packed via pack_planar_row_16/pack_v210_row, not RowWriter")
        }
    }
}

/// Packs one reconstructed YUV row (already dequantized, pre-saturation
/// coefficients, centered at zero) into an interleaved 4:2:2 output row at
/// `writer`'s native format, honoring `color.precision` (spec.md §4.D).
///
/// `y`, `u`, `v` are full-width-for-y/half-width-for-chroma coefficient
/// rows; `out` must be at least `width/2 * writer.unit_bytes()` long.
pub fn pack_yuv_row(
    writer: &mut dyn RowWriter,
    y: &[i16],
    u: &[i16],
    v: &[i16],
    color: &ColorParams,
    out: &mut [u8],
) {
    let bits = color.precision.bits();
    let matrix = matrix_for(color.color_space);
    let black = matrix.luma_black << bits.saturating_sub(8);
    let white = matrix.luma_white << bits.saturating_sub(8);
    let bias = 1i32 << (bits - 1);
    let unit = writer.unit_bytes();

    for i in 0..u.len() {
        let y0 = i32::from(y[2 * i]) + bias;
        let y1 = i32::from(y[2 * i + 1]) + bias;
        let uu = i32::from(u[i]) + bias;
        let vv = i32::from(v[i]) + bias;
        let y0 = if color.limit_yuv { y0.clamp(black, white) } else { y0 };
        let y1 = if color.limit_yuv { y1.clamp(black, white) } else { y1 };

        let y0 = widen_to_16(saturate_unsigned(y0, bits), bits);
        let y1 = widen_to_16(saturate_unsigned(y1, bits), bits);
        let uu = widen_to_16(saturate_unsigned(uu, bits), bits);
        let vv = widen_to_16(saturate_unsigned(vv, bits), bits);
        writer.write_yuv_pair(&mut out[i * unit..(i + 1) * unit], y0, uu, y1, vv);
    }
}

/// Packs one reconstructed RGB(A) row into an interleaved output row at
/// `writer`'s native format, honoring `color.precision`. Does the YUV->RGB
/// matrix conversion only when `color_space` indicates a YUV source was
/// involved; Bayer and native-RGB sources pass coefficients through as
/// already-RGB values.
pub fn pack_rgb_row(
    writer: &mut dyn RowWriter,
    r: &[i16],
    g: &[i16],
    b: &[i16],
    a: Option<&[i16]>,
    color: &ColorParams,
    out: &mut [u8],
) {
    let bits = color.precision.bits();
    let bias = 1i32 << (bits - 1);
    let unit = writer.unit_bytes();
    let width = r.len();
    for i in 0..width {
        let rv = widen_to_16(saturate_unsigned(i32::from(r[i]) + bias, bits), bits);
        let gv = widen_to_16(saturate_unsigned(i32::from(g[i]) + bias, bits), bits);
        let bv = widen_to_16(saturate_unsigned(i32::from(b[i]) + bias, bits), bits);
        let av = match a {
            Some(a) => widen_to_16(saturate_unsigned(i32::from(a[i]) + bias, bits), bits),
            None => 0xffff,
        };
        writer.write_rgba(&mut out[i * unit..(i + 1) * unit], rv, gv, bv, av);
    }
}

/// Converts one matrix-space `(y, u, v)` triple to RGB using `matrix` at
/// `precision`'s bit depth, exposed for callers that need the conversion
/// without the row-packing loop (e.g. the Bayer G/R-G/B-G/G-diff path,
/// which reconstructs RGB directly rather than through a packed YUV
/// intermediate).
pub fn yuv_triple_to_rgb(
    matrix: &ColorMatrix,
    y: i32,
    u: i32,
    v: i32,
    precision: Precision,
    limit_yuv: bool,
) -> (u16, u16, u16) {
    matrix.yuv_to_rgb(y, u, v, precision.bits(), limit_yuv)
}

/// Packs a planar row (used by `Yr16` and `BayerPlanar`, spec.md §4.F): one
/// destination plane per call, no cross-channel interleaving. Output is
/// always 16-bit little-endian regardless of `precision` — `Yr16`/raw
/// planar containers store full 16-bit samples and leave any precision
/// narrowing to the consumer.
pub fn pack_planar_row_16(src: &[i16], out: &mut [u8]) {
    debug_assert_eq!(out.len(), src.len() * 2);
    for (i, &v) in src.iter().enumerate() {
        let unsigned = saturate_unsigned(i32::from(v) + 32768, 16);
        write_u16le(&mut out[i * 2..i * 2 + 2], unsigned);
    }
}

/// Packs one reconstructed YUV row into v210 (spec.md §4.F "packed 10-bit
/// 4:2:2 YUV"): groups of 6 luma samples / 3 chroma-pair samples are packed
/// into 4 little-endian 32-bit words of 3 10-bit fields each, the standard
/// v210 layout (`Cr0:Y0:Cb0`, `Y1:Cb1:Y2`, `Cr1:Y3:Cb2`, `Y4:Cr2:Y5`).
///
/// `width` must be a multiple of 6; this is a real constraint of the v210
/// layout itself (not a simplification), since a partial group cannot be
/// packed into a whole 16-byte unit. `y` is `width` samples, `u`/`v` are
/// `width/2` samples each (centered at zero, pre-saturation).
pub fn pack_v210_row(y: &[i16], u: &[i16], v: &[i16], color: &ColorParams, out: &mut [u8]) {
    let bits = 10u32;
    let matrix = matrix_for(color.color_space);
    let black = matrix.luma_black << (bits - 8);
    let white = matrix.luma_white << (bits - 8);
    let bias = 1i32 << (bits - 1);

    let sample = |v: i16| -> u32 {
        let s = i32::from(v) + bias;
        let s = if color.limit_yuv { s.clamp(black, white) } else { s };
        saturate_unsigned(s, bits)
    };

    let groups = width_groups(y.len());
    for group in 0..groups {
        let yb = group * 6;
        let cb = group * 3;
        let y0 = sample(y[yb]);
        let y1 = sample(y[yb + 1]);
        let y2 = sample(y[yb + 2]);
        let y3 = sample(y[yb + 3]);
        let y4 = sample(y[yb + 4]);
        let y5 = sample(y[yb + 5]);
        let cb0 = sample(u[cb]);
        let cb1 = sample(u[cb + 1]);
        let cb2 = sample(u[cb + 2]);
        let cr0 = sample(v[cb]);
        let cr1 = sample(v[cb + 1]);
        let cr2 = sample(v[cb + 2]);

        let w0 = cr0 | (y0 << 10) | (cb0 << 20);
        let w1 = y1 | (cb1 << 10) | (y2 << 20);
        let w2 = cr1 | (y3 << 10) | (cb2 << 20);
        let w3 = y4 | (cr2 << 10) | (y5 << 20);

        let base = group * 16;
        out[base..base + 4].copy_from_slice(&w0.to_le_bytes());
        out[base + 4..base + 8].copy_from_slice(&w1.to_le_bytes());
        out[base + 8..base + 12].copy_from_slice(&w2.to_le_bytes());
        out[base + 12..base + 16].copy_from_slice(&w3.to_le_bytes());
    }
}

/// The number of whole 6-luma-sample v210 groups in a row of `width` luma
/// samples.
fn width_groups(width: usize) -> usize {
    width / 6
}

/// Number of output bytes [`pack_v210_row`] writes for a row of `width`
/// luma samples.
pub fn v210_row_bytes(width: usize) -> usize {
    width_groups(width) * 16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuyv_writer_orders_bytes_y_u_y_v() {
        let mut writer = YuyvWriter;
        let mut out = [0u8; 4];
        writer.write_yuv_pair(&mut out, widen_to_16(10, 8), widen_to_16(20, 8), widen_to_16(30, 8), widen_to_16(40, 8));
        assert_eq!(out, [10, 20, 30, 40]);
    }

    #[test]
    fn uyvy_writer_orders_bytes_u_y_v_y() {
        let mut writer = UyvyWriter;
        let mut out = [0u8; 4];
        writer.write_yuv_pair(&mut out, widen_to_16(10, 8), widen_to_16(20, 8), widen_to_16(30, 8), widen_to_16(40, 8));
        assert_eq!(out, [20, 10, 40, 30]);
    }

    #[test]
    fn rgba32_puts_alpha_in_low_byte_after_narrowing() {
        let mut writer = Rgba32Writer;
        let mut out = [0u8; 4];
        writer.write_rgba(&mut out, widen_to_16(1, 8), widen_to_16(2, 8), widen_to_16(3, 8), 0xffff);
        assert_eq!(out, [1, 2, 3, 0xff]);
    }

    #[test]
    fn neutral_yuv_row_packs_to_128_everywhere() {
        let mut writer = YuyvWriter;
        let y = [0i16, 0, 0, 0];
        let u = [0i16, 0];
        let v = [0i16, 0];
        let color = ColorParams::default();
        let mut out = [0u8; 8];
        pack_yuv_row(&mut writer, &y, &u, &v, &color, &mut out);
        assert!(out.iter().all(|&b| b == 128));
    }

    #[test]
    fn rgba_alpha_zero_round_trips_through_bias_and_back() {
        // Companded alpha of 0 (spec.md §8 scenario 4: "Output alpha = 0")
        // must survive the bias/saturate/widen pipeline as exactly zero.
        let mut writer = Rgba64Writer;
        let r = [0i16];
        let g = [0i16];
        let b = [0i16];
        let a = [-32768i16];
        let color = ColorParams::default();
        let mut out = [0u8; 8];
        pack_rgb_row(&mut writer, &r, &g, &b, Some(&a), &color, &mut out);
        assert_eq!(u16::from_le_bytes([out[6], out[7]]), 0);
    }

    #[test]
    fn v210_packs_six_samples_into_sixteen_bytes() {
        let color = ColorParams::default();
        let y = [0i16; 6];
        let u = [0i16; 3];
        let v = [0i16; 3];
        let mut out = [0u8; 16];
        pack_v210_row(&y, &u, &v, &color, &mut out);
        assert_eq!(v210_row_bytes(6), 16);
        // Neutral (zero-coefficient) input packs to the 10-bit video-range
        // midpoint (512) in every 10-bit field.
        let w0 = u32::from_le_bytes([out[0], out[1], out[2], out[3]]);
        assert_eq!(w0 & 0x3ff, 512); // Cr0
        assert_eq!((w0 >> 10) & 0x3ff, 512); // Y0
        assert_eq!((w0 >> 20) & 0x3ff, 512); // Cb0
    }
}
