// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire tag constants (spec.md §6 "Compressed bitstream (wire)").
//!
//! Tags partition into structural (required), metadata (required but
//! inert to decode correctness), and optional-extension (skippable)
//! groups. The high bit of a tag marks it optional, per spec.md §6.

/// Mask selecting the "optional" marker bit of a tag.
pub const OPTIONAL_TAG_BIT: i16 = -0x8000;

#[inline]
pub fn is_optional(tag: i16) -> bool {
    tag & OPTIONAL_TAG_BIT != 0
}

// --- Structural tags (spec.md §6, §4.H) ---
pub const TAG_SAMPLE_TYPE: i16 = 1;
pub const TAG_SAMPLE_SIZE: i16 = 2;
pub const TAG_CHANNEL_COUNT: i16 = 3;
pub const TAG_WAVELET_DESCRIPTOR: i16 = 4;
pub const TAG_BAND_DESCRIPTOR: i16 = 5;
pub const TAG_BAND_DATA_START: i16 = 6;
pub const TAG_BAND_DATA_END: i16 = 7;
pub const TAG_FRAME_WIDTH: i16 = 8;
pub const TAG_FRAME_HEIGHT: i16 = 9;
pub const TAG_DISPLAY_HEIGHT: i16 = 10;
pub const TAG_FRAME_LAYOUT: i16 = 11;
pub const TAG_NUM_LEVELS: i16 = 12;

// --- Metadata tags ---
pub const TAG_COLOR_SPACE: i16 = 20;
pub const TAG_FRAME_RATE: i16 = 21;
pub const TAG_ENCODE_CURVE: i16 = 22;
pub const TAG_ENCODE_CURVE_PRESET: i16 = 23;
pub const TAG_ALPHA_COMPANDED: i16 = 24;
pub const TAG_ALPHA_OFFSET: i16 = 25;
pub const TAG_ALPHA_GAIN: i16 = 26;
pub const TAG_DIFFERENCE_CODING: i16 = 27;
pub const TAG_TRANSFORM_SHAPE: i16 = 28;
pub const TAG_CODEBOOK_ID: i16 = 29;
pub const TAG_QUANTIZER: i16 = 30;

/// Value-field encodings of [`TAG_SAMPLE_TYPE`] (spec.md §3 "Sample").
pub mod sample_type {
    pub const GROUP: i16 = 0;
    pub const FRAME: i16 = 1;
    pub const IFRAME: i16 = 2;
    pub const SEQUENCE_HEADER: i16 = 3;
}

/// Value-field encodings of [`TAG_TRANSFORM_SHAPE`] (spec.md §9 "Pulldown /
/// interlaced switching").
pub mod transform_shape {
    pub const SPATIAL: i16 = 0;
    pub const SPATIAL_TEMPORAL: i16 = 1;
    pub const FIELD_PLUS: i16 = 2;
}

/// Value-field encodings of [`TAG_FRAME_LAYOUT`] (spec.md §3 "Frame").
pub mod frame_layout {
    pub const GRAY: i16 = 0;
    pub const YUV: i16 = 1;
    pub const RGB: i16 = 2;
    pub const RGBA: i16 = 3;
    pub const BAYER: i16 = 4;
}

/// Value-field encodings of [`TAG_BAND_DESCRIPTOR`] (spec.md §3 "Subband").
pub mod band_index {
    pub const LL: i16 = 0;
    pub const LH: i16 = 1;
    pub const HL: i16 = 2;
    pub const HH: i16 = 3;
    pub const TEMPORAL_EVEN: i16 = 4;
    pub const TEMPORAL_ODD: i16 = 5;
}
