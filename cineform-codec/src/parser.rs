// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The sample parser (spec.md §4.H): walks the tagged-tuple stream of one
//! sample, producing a description of every channel's wavelet tree and the
//! byte ranges of every band's entropy-coded payload, without itself
//! touching the decoder's transform arena or thread pool — those belong to
//! [`crate::decoder`].

use cineform_core::error::{bad_format_error, unsupported_tag_error, Error, Result};
use cineform_core::io::ByteReader;
use cineform_core::sample::{FrameLayout, SampleInfo, SampleType};

use crate::tag::{self, band_index, frame_layout, sample_type, transform_shape};
use crate::wavelet::{BandIndex, TransformShape};

#[derive(Clone, Debug)]
pub struct ParsedBand {
    pub band_index: BandIndex,
    pub quantizer: i32,
    pub difference_coding: bool,
    pub codebook_id: usize,
    /// Byte offsets of this band's entropy-coded payload within the
    /// sample buffer passed to `decode`.
    pub payload_range: (usize, usize),
}

#[derive(Clone, Debug)]
pub struct ParsedWavelet {
    pub shape: TransformShape,
    pub width: usize,
    pub height: usize,
    pub bands: Vec<ParsedBand>,
}

#[derive(Clone, Debug)]
pub struct ParsedChannel {
    /// Top (lowest resolution) to bottom (full resolution), matching
    /// spec.md §3 "Transform".
    pub levels: Vec<ParsedWavelet>,
}

#[derive(Clone, Debug)]
pub struct ParsedSample {
    pub info: SampleInfo,
    pub channels: Vec<ParsedChannel>,
    /// Alpha companding curve parameters (spec.md §4.F, Glossary
    /// "Companding"), read from the sample's metadata tags. `gain` is
    /// already widened to the 16.16 fixed point `color::decompand_alpha`
    /// expects (see `TAG_ALPHA_GAIN`'s match arm in `parse_sample`) and
    /// defaults to the identity value `1 << 16`; `offset` defaults to 0.
    /// Both apply only when `alpha_companded` is set.
    pub alpha_companded: bool,
    pub alpha_offset: i32,
    pub alpha_gain: i32,
}

/// Reads just enough of the tagged-tuple stream to size an output buffer
/// (spec.md §6 `parse_header`), without walking wavelet/band descriptors.
pub fn parse_header(buf: &[u8]) -> Result<SampleInfo> {
    let mut r = ByteReader::new(buf);
    let mut sample_type = None;
    let mut width = None;
    let mut height = None;
    let mut display_height = None;
    let mut layout = None;

    while r.bytes_left() >= 4 {
        let (t, v) = r.read_tag_value()?;
        match t {
            tag::TAG_SAMPLE_TYPE => sample_type = Some(decode_sample_type(v)?),
            tag::TAG_FRAME_WIDTH => width = Some(v as u16),
            tag::TAG_FRAME_HEIGHT => height = Some(v as u16),
            tag::TAG_DISPLAY_HEIGHT => display_height = Some(v as u16),
            tag::TAG_FRAME_LAYOUT => layout = Some(decode_frame_layout(v)?),
            tag::TAG_COLOR_SPACE | tag::TAG_FRAME_RATE | tag::TAG_ENCODE_CURVE
            | tag::TAG_ENCODE_CURVE_PRESET | tag::TAG_ALPHA_COMPANDED
            | tag::TAG_ALPHA_OFFSET | tag::TAG_ALPHA_GAIN => {}
            _ if tag::is_optional(t) => {
                r.skip_bytes(skip_len(v))?;
                r.align_to_tag();
            }
            // Header parsing only needs the fields above; once all are
            // known there is no need to keep walking the rest of the
            // sample, including band payloads we are not ready to decode.
            _ => {
                if sample_type.is_some() && width.is_some() && height.is_some() && layout.is_some() {
                    break;
                }
                return unsupported_tag_error("required tag before header fields were complete");
            }
        }
        if sample_type.is_some() && width.is_some() && height.is_some() && layout.is_some() {
            break;
        }
    }

    let sample_type = sample_type.ok_or(Error::BadFormat("missing sample type tag"))?;
    let width = width.ok_or(Error::BadFormat("missing frame width tag"))?;
    let height = height.ok_or(Error::BadFormat("missing frame height tag"))?;
    let layout = layout.unwrap_or(FrameLayout::Yuv);
    let display_height = display_height.unwrap_or(height);

    Ok(SampleInfo { width, height, display_height, layout, sample_type })
}

/// Parses the full tagged-tuple stream of one sample, including every
/// channel's wavelet/band descriptors (spec.md §4.H steps 1-2).
///
/// `SEQUENCE_HEADER` samples are recognized but carry no channels;
/// `FRAME` samples are parsed identically to `IFRAME` (this decoder keeps
/// no state across samples — spec.md §6 "Persisted state: none" — so every
/// sample's wire representation is expected to be self-contained).
pub fn parse_sample(buf: &[u8]) -> Result<ParsedSample> {
    let mut r = ByteReader::new(buf);

    let (t, v) = r.read_tag_value()?;
    if t != tag::TAG_SAMPLE_TYPE {
        return bad_format_error("sample does not begin with a sample-type tag");
    }
    let st = decode_sample_type(v)?;

    if st == SampleType::SequenceHeader {
        return Ok(ParsedSample {
            info: SampleInfo {
                width: 0,
                height: 0,
                display_height: 0,
                layout: FrameLayout::Gray,
                sample_type: st,
            },
            channels: Vec::new(),
            alpha_companded: false,
            alpha_offset: 0,
            alpha_gain: 1 << 16,
        });
    }

    let mut width = None;
    let mut height = None;
    let mut display_height = None;
    let mut layout = None;
    let mut channel_count = None;
    let mut alpha_companded = false;
    let mut alpha_offset = 0i32;
    let mut alpha_gain = 1i32 << 16;

    loop {
        let (t, v) = r.read_tag_value()?;
        match t {
            tag::TAG_FRAME_WIDTH => width = Some(v as u16),
            tag::TAG_FRAME_HEIGHT => height = Some(v as u16),
            tag::TAG_DISPLAY_HEIGHT => display_height = Some(v as u16),
            tag::TAG_FRAME_LAYOUT => layout = Some(decode_frame_layout(v)?),
            tag::TAG_CHANNEL_COUNT => {
                channel_count = Some(v as usize);
                break;
            }
            // Metadata tags (spec.md §6): required but inert to decode
            // correctness beyond what's tracked here. `color_space`,
            // `frame_rate`, and the encode-curve tags are read by the host
            // integrator via the bitstream, not reinterpreted here (spec.md
            // §9 Open Question: encode curve handling is the integrating
            // host's concern); alpha companding feeds `decompand_alpha`.
            tag::TAG_COLOR_SPACE | tag::TAG_FRAME_RATE | tag::TAG_ENCODE_CURVE
            | tag::TAG_ENCODE_CURVE_PRESET => {}
            tag::TAG_ALPHA_COMPANDED => alpha_companded = v != 0,
            tag::TAG_ALPHA_OFFSET => alpha_offset = i32::from(v),
            // The wire value is a 13-bit fixed-point multiplier (the same
            // scale `cineform_codec::color` uses for its matrices, and the
            // only scale an `i16` tag value can hold an identity gain in);
            // `decompand_alpha` works in 16.16 fixed point, so widen by the
            // 3-bit difference between the two scales.
            tag::TAG_ALPHA_GAIN => alpha_gain = i32::from(v) << 3,
            _ if tag::is_optional(t) => {
                r.skip_bytes(skip_len(v))?;
                r.align_to_tag();
            }
            _ => return unsupported_tag_error("required tag in sample header not recognized"),
        }
    }

    let width = width.ok_or(Error::BadFormat("missing frame width tag"))?;
    let height = height.ok_or(Error::BadFormat("missing frame height tag"))?;
    let layout = layout.unwrap_or(FrameLayout::Yuv);
    let display_height = display_height.unwrap_or(height);
    let channel_count = channel_count.ok_or(Error::BadFormat("missing channel count tag"))?;

    if channel_count != layout.num_channels() {
        return bad_format_error("channel count disagrees with frame layout");
    }

    log::debug!(
        "sample: {st:?} {width}x{height} (display {display_height}) {layout:?}, {channel_count} channel(s)",
    );

    let mut channels = Vec::with_capacity(channel_count);
    for _ in 0..channel_count {
        channels.push(parse_channel(&mut r, width as usize, height as usize)?);
    }

    Ok(ParsedSample {
        info: SampleInfo { width, height, display_height, layout, sample_type: st },
        channels,
        alpha_companded,
        alpha_offset,
        alpha_gain,
    })
}

fn parse_channel(r: &mut ByteReader<'_>, frame_width: usize, frame_height: usize) -> Result<ParsedChannel> {
    let (t, num_levels) = r.read_tag_value()?;
    if t != tag::TAG_NUM_LEVELS {
        return bad_format_error("expected a level-count tag at channel start");
    }

    let mut levels = Vec::with_capacity(num_levels as usize);
    let mut width = frame_width;
    let mut height = frame_height;
    // Widths/heights halve per level going down from the channel's own
    // lowest-resolution (topmost) wavelet; compute the topmost size first.
    for _ in 0..num_levels {
        width = width.div_ceil(2);
        height = height.div_ceil(2);
    }

    for _ in 0..num_levels {
        let (t, shape_val) = r.read_tag_value()?;
        if t != tag::TAG_WAVELET_DESCRIPTOR {
            return bad_format_error("expected a wavelet descriptor tag");
        }
        let shape = decode_transform_shape(shape_val)?;

        let mut bands = Vec::with_capacity(4);
        for _ in 0..4 {
            bands.push(parse_band(r)?);
        }

        log::debug!("wavelet header: {shape:?} {width}x{height}, {} band(s)", bands.len());
        levels.push(ParsedWavelet { shape, width, height, bands });
        width *= 2;
        height *= 2;
    }

    Ok(ParsedChannel { levels })
}

fn parse_band(r: &mut ByteReader<'_>) -> Result<ParsedBand> {
    let (t, band_val) = r.read_tag_value()?;
    if t != tag::TAG_BAND_DESCRIPTOR {
        return bad_format_error("expected a band descriptor tag");
    }
    let band_index = decode_band_index(band_val)?;

    let (t, quantizer) = r.read_tag_value()?;
    if t != tag::TAG_QUANTIZER {
        return bad_format_error("expected a quantizer tag");
    }

    let (t, diff_flag) = r.read_tag_value()?;
    if t != tag::TAG_DIFFERENCE_CODING {
        return bad_format_error("expected a difference-coding flag tag");
    }

    let (t, codebook_id) = r.read_tag_value()?;
    if t != tag::TAG_CODEBOOK_ID {
        return bad_format_error("expected a codebook id tag");
    }

    let (t, coded_size) = r.read_tag_value()?;
    if t != tag::TAG_BAND_DATA_START {
        return bad_format_error("expected a band-data-start tag");
    }
    let coded_size = coded_size as usize;
    let start = r.position();
    r.read_slice(coded_size)?;
    let end = start + coded_size;
    r.align_to_tag();

    let (t, _v) = r.read_tag_value()?;
    if t != tag::TAG_BAND_DATA_END {
        return bad_format_error("expected a band-data-end tag");
    }

    Ok(ParsedBand {
        band_index,
        quantizer: i32::from(quantizer),
        difference_coding: diff_flag != 0,
        codebook_id: codebook_id as usize,
        payload_range: (start, end),
    })
}

fn decode_sample_type(v: i16) -> Result<SampleType> {
    match v {
        sample_type::GROUP => Ok(SampleType::Group),
        sample_type::FRAME => Ok(SampleType::Frame),
        sample_type::IFRAME => Ok(SampleType::IFrame),
        sample_type::SEQUENCE_HEADER => Ok(SampleType::SequenceHeader),
        _ => unsupported_tag_error("unrecognized sample type value"),
    }
}

fn decode_frame_layout(v: i16) -> Result<FrameLayout> {
    match v {
        frame_layout::GRAY => Ok(FrameLayout::Gray),
        frame_layout::YUV => Ok(FrameLayout::Yuv),
        frame_layout::RGB => Ok(FrameLayout::Rgb),
        frame_layout::RGBA => Ok(FrameLayout::Rgba),
        frame_layout::BAYER => Ok(FrameLayout::Bayer),
        _ => unsupported_tag_error("unrecognized frame layout value"),
    }
}

fn decode_transform_shape(v: i16) -> Result<TransformShape> {
    match v {
        transform_shape::SPATIAL => Ok(TransformShape::Spatial),
        transform_shape::SPATIAL_TEMPORAL => Ok(TransformShape::SpatialTemporal),
        transform_shape::FIELD_PLUS => Ok(TransformShape::FieldPlus),
        _ => unsupported_tag_error("unrecognized transform shape value"),
    }
}

fn decode_band_index(v: i16) -> Result<BandIndex> {
    match v {
        band_index::LL => Ok(BandIndex::Ll),
        band_index::LH => Ok(BandIndex::Lh),
        band_index::HL => Ok(BandIndex::Hl),
        band_index::HH => Ok(BandIndex::Hh),
        band_index::TEMPORAL_EVEN => Ok(BandIndex::TemporalEven),
        band_index::TEMPORAL_ODD => Ok(BandIndex::TemporalOdd),
        _ => unsupported_tag_error("unrecognized band index value"),
    }
}

/// Optional-tag values carry their skip length directly (spec.md §6:
/// "length in value field"); negative lengths never occur in a conformant
/// stream, but are clamped to zero rather than panicking on malformed
/// input.
fn skip_len(v: i16) -> usize {
    v.max(0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_tag(buf: &mut Vec<u8>, tag: i16, value: i16) {
        buf.extend_from_slice(&tag.to_be_bytes());
        buf.extend_from_slice(&value.to_be_bytes());
    }

    #[test]
    fn parses_minimal_header() {
        let mut buf = Vec::new();
        push_tag(&mut buf, tag::TAG_SAMPLE_TYPE, sample_type::IFRAME);
        push_tag(&mut buf, tag::TAG_FRAME_WIDTH, 16);
        push_tag(&mut buf, tag::TAG_FRAME_HEIGHT, 16);
        push_tag(&mut buf, tag::TAG_FRAME_LAYOUT, frame_layout::YUV);

        let info = parse_header(&buf).unwrap();
        assert_eq!(info.width, 16);
        assert_eq!(info.height, 16);
        assert_eq!(info.display_height, 16);
        assert_eq!(info.layout, FrameLayout::Yuv);
    }

    #[test]
    fn sequence_header_has_no_channels() {
        let mut buf = Vec::new();
        push_tag(&mut buf, tag::TAG_SAMPLE_TYPE, sample_type::SEQUENCE_HEADER);
        let parsed = parse_sample(&buf).unwrap();
        assert!(parsed.channels.is_empty());
    }
}
