// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Output pixel formats and the color-conversion parameters that select
//! among them (spec.md §4.F, §6).

/// The complete set of packed/planar pixel layouts the row packer can write.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// Packed 4:2:2 YUV, byte order Y0 U Y1 V.
    Yuyv,
    /// Packed 4:2:2 YUV, byte order U Y0 V Y1.
    Uyvy,
    /// Packed 10-bit 4:2:2 YUV (v210).
    V210,
    /// Packed 16-bit 4:2:2 YUV (YU64).
    Yu64,
    /// Planar 16-bit YUV.
    Yr16,
    /// Packed 8-bit RGB, no alpha.
    Rgb24,
    /// Packed 8-bit RGB, padded to 32 bits, no alpha.
    Rgb32,
    /// Packed 8-bit RGBA.
    Rgba32,
    /// Packed 16-bit RGB (no alpha).
    Rg48,
    /// Packed 16-bit RGBA.
    Rgba64,
    /// Packed big-endian ARGB64 ("b64a").
    B64a,
    /// 10-bit packed RGB, `R|G|B` bit order, little-endian words (RG30).
    Rg30,
    /// 10-bit packed RGB, `A|B|G|R` bit order (AB10).
    Ab10,
    /// 10-bit packed RGB, `A|R|G|B` bit order (AR10).
    Ar10,
    /// 10-bit packed RGB, big-endian, `R|G|B` bit order (R210).
    R210,
    /// 10-bit packed RGB, DPX convention (DPX0).
    Dpx0,
    /// Bayer source decoded to four planes: G, R-G, B-G, G1-G2.
    BayerPlanar,
}

impl PixelFormat {
    /// The number of distinct color planes the format is decoded into
    /// before the final packing step. YUV 4:2:2 and RGB formats are all
    /// packed directly from 3 (or 4, with alpha) reconstructed channels;
    /// Bayer sources are always 4.
    pub fn source_channels(self) -> usize {
        match self {
            PixelFormat::Rgba32 | PixelFormat::Rgba64 | PixelFormat::B64a
            | PixelFormat::BayerPlanar => 4,
            _ => 3,
        }
    }

    /// Whether the format carries an alpha/fourth-plane channel.
    pub fn has_alpha(self) -> bool {
        matches!(self, PixelFormat::Rgba32 | PixelFormat::Rgba64 | PixelFormat::B64a)
    }
}

/// The four fixed-point YUV<->RGB conversion matrices the row packer
/// supports (spec.md §4.F).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ColorSpace {
    /// ITU-R BT.601, computer/full range.
    ComputerGraphics601,
    /// ITU-R BT.601, video (CCIR) range.
    VideoSystem601,
    /// ITU-R BT.709, computer/full range.
    ComputerGraphics709,
    /// ITU-R BT.709, video (CCIR) range.
    VideoSystem709,
}

impl Default for ColorSpace {
    /// The codec default: video-range BT.709 (spec.md §4.F).
    fn default() -> Self {
        ColorSpace::VideoSystem709
    }
}

/// Output resolution relative to the frame's full decoded size.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Full,
    HalfHorizontal,
    Quarter,
}

impl Default for Resolution {
    fn default() -> Self {
        Resolution::Full
    }
}

/// Output sample precision in bits. Only the interior-kernel descaling
/// shift depends on this; the kernels themselves are bit-exact across
/// precisions (spec.md §4.D).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Precision {
    Bits8,
    Bits10,
    Bits12,
}

impl Precision {
    pub fn bits(self) -> u32 {
        match self {
            Precision::Bits8 => 8,
            Precision::Bits10 => 10,
            Precision::Bits12 => 12,
        }
    }
}

/// Caller-supplied parameters selecting the color pipeline for one decode
/// call (spec.md §6 "Color parameters struct").
#[derive(Copy, Clone, Debug)]
pub struct ColorParams {
    pub color_space: ColorSpace,
    pub resolution: Resolution,
    pub precision: Precision,
    /// Write output rows from last to first (negative-pitch semantics).
    pub invert: bool,
    /// Clamp YUV output to the CCIR/video range rather than full range.
    pub limit_yuv: bool,
}

impl Default for ColorParams {
    fn default() -> Self {
        ColorParams {
            color_space: ColorSpace::default(),
            resolution: Resolution::default(),
            precision: Precision::Bits8,
            invert: false,
            limit_yuv: true,
        }
    }
}
