// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire-level sample types (spec.md §3 "Sample").

use crate::pixel::PixelFormat;

/// The type of a compressed sample unit, read from the structural tag at the
/// start of every sample.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SampleType {
    /// First sample of a GOP: carries a group header, then frame data.
    Group,
    /// Dependent on the preceding group.
    Frame,
    /// Independent frame; carries its own group header inline.
    IFrame,
    /// Forward-compatibility marker, ignored by the decoder.
    SequenceHeader,
}

/// The channel layout a decoded frame is organized into (spec.md §3 "Frame").
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameLayout {
    Gray,
    Yuv,
    Rgb,
    Rgba,
    Bayer,
}

impl FrameLayout {
    pub fn num_channels(self) -> usize {
        match self {
            FrameLayout::Gray => 1,
            FrameLayout::Yuv | FrameLayout::Rgb => 3,
            FrameLayout::Rgba | FrameLayout::Bayer => 4,
        }
    }
}

/// The result of `parse_header`: everything a caller needs to size an
/// output buffer before calling `decode` (spec.md §6).
#[derive(Copy, Clone, Debug)]
pub struct SampleInfo {
    pub width: u16,
    pub height: u16,
    /// Rows in `[display_height, height)` are edge-replication padding and
    /// are written but never meant to be displayed (spec.md §3 "Frame").
    pub display_height: u16,
    pub layout: FrameLayout,
    pub sample_type: SampleType,
}

impl SampleInfo {
    pub fn num_channels(&self) -> usize {
        self.layout.num_channels()
    }
}

/// Returns the default target format for a given frame layout when the
/// caller does not otherwise constrain it. Exposed so integrators building
/// on top of `cineform-codec` can pick a sensible `PixelFormat` without
/// reimplementing the layout-to-format mapping.
pub fn default_pixel_format(layout: FrameLayout) -> PixelFormat {
    match layout {
        FrameLayout::Gray | FrameLayout::Yuv => PixelFormat::Yuyv,
        FrameLayout::Rgb => PixelFormat::Rgb24,
        FrameLayout::Rgba => PixelFormat::Rgba32,
        FrameLayout::Bayer => PixelFormat::BayerPlanar,
    }
}
