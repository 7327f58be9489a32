// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end decode tests driving [`Decoder`] through its public API only,
//! mirroring how `symphonia-codec-aac/tests/tests.rs` exercises a decoder
//! from raw bytes rather than through its internal modules.

use cineform_codec::tag;
use cineform_codec::Decoder;
use cineform_core::pixel::{ColorParams, PixelFormat};

fn push_tag(buf: &mut Vec<u8>, tag: i16, value: i16) {
    buf.extend_from_slice(&tag.to_be_bytes());
    buf.extend_from_slice(&value.to_be_bytes());
}

/// Appends one band whose subband decodes to an all-zero coefficient array,
/// regardless of `total_cells` (up to 16): a single run-of-`total_cells - 1`
/// zeros followed by one value emit, with `quantizer` set to 0 so the fused
/// magnitude is always zero no matter what the built-in codebook's window
/// happens to decode to. See `cineform_codec::decoder`'s own
/// `build_gray_2x2_sample` test helper for the window arithmetic this is
/// built on (window 1 == run 0, magnitude 1, at state 0 of every built-in
/// codebook).
fn push_all_zero_band(buf: &mut Vec<u8>, band: i16, total_cells: u8) {
    assert!((1..=16).contains(&total_cells), "run field is 4 bits wide");
    push_tag(buf, tag::TAG_BAND_DESCRIPTOR, band);
    push_tag(buf, tag::TAG_QUANTIZER, 0);
    push_tag(buf, tag::TAG_DIFFERENCE_CODING, 0);
    push_tag(buf, tag::TAG_CODEBOOK_ID, 0);
    push_tag(buf, tag::TAG_BAND_DATA_START, 4);
    let run = (total_cells - 1) as u32;
    let window = (run << 4) | 1;
    buf.push((window >> 1) as u8);
    buf.extend_from_slice(&[0xff, 0xc0, 0x00]);
    push_tag(buf, tag::TAG_BAND_DATA_END, 0);
}

/// Builds a one-level, all-zero-coefficient sample for `layout` over a 4x4
/// frame: each channel's single wavelet level has 2x2 bands (4 cells each),
/// well within `push_all_zero_band`'s 16-cell limit.
fn build_all_zero_sample(layout: i16, channel_count: i16) -> Vec<u8> {
    let mut buf = Vec::new();
    push_tag(&mut buf, tag::TAG_SAMPLE_TYPE, tag::sample_type::IFRAME);
    push_tag(&mut buf, tag::TAG_FRAME_WIDTH, 4);
    push_tag(&mut buf, tag::TAG_FRAME_HEIGHT, 4);
    push_tag(&mut buf, tag::TAG_FRAME_LAYOUT, layout);
    push_tag(&mut buf, tag::TAG_CHANNEL_COUNT, channel_count);

    for _ in 0..channel_count {
        push_tag(&mut buf, tag::TAG_NUM_LEVELS, 1);
        push_tag(&mut buf, tag::TAG_WAVELET_DESCRIPTOR, tag::transform_shape::SPATIAL);
        for band in [tag::band_index::LL, tag::band_index::LH, tag::band_index::HL, tag::band_index::HH] {
            push_all_zero_band(&mut buf, band, 4);
        }
    }

    buf
}

#[test]
fn constant_yuv_frame_decodes_to_neutral_grey() {
    let sample = build_all_zero_sample(tag::frame_layout::YUV, 3);
    let mut decoder = Decoder::new(64, 64, 4, 2);

    let unit = 4; // YUYV
    let pitch = (4 / 2) * unit;
    let mut out = vec![0u8; pitch * 4];
    decoder.decode(&sample, &mut out, pitch, PixelFormat::Yuyv, ColorParams::default()).unwrap();

    assert!(out.iter().all(|&b| b == 128), "expected every neutral YUYV byte to be 128, got {out:?}");
}

#[test]
fn rgb_source_packed_as_b64a_has_opaque_alpha() {
    let sample = build_all_zero_sample(tag::frame_layout::RGB, 3);
    let mut decoder = Decoder::new(64, 64, 4, 2);

    let unit = 8; // b64a: a, r, g, b, each big-endian u16
    let pitch = 4 * unit;
    let mut out = vec![0u8; pitch * 4];
    decoder.decode(&sample, &mut out, pitch, PixelFormat::B64a, ColorParams::default()).unwrap();

    for pixel in out.chunks(unit) {
        assert_eq!(&pixel[0..2], &0xffffu16.to_be_bytes(), "alpha channel must read back as 0xFFFF");
    }
}

#[test]
fn truncated_band_payload_is_rejected_and_decoder_stays_usable() {
    let mut sample = build_all_zero_sample(tag::frame_layout::YUV, 3);
    sample.truncate(sample.len() - 3);

    let mut decoder = Decoder::new(64, 64, 4, 2);
    let unit = 4;
    let pitch = (4 / 2) * unit;
    let mut out = vec![0u8; pitch * 4];
    let err = decoder.decode(&sample, &mut out, pitch, PixelFormat::Yuyv, ColorParams::default()).unwrap_err();
    assert!(
        matches!(err, cineform_core::error::Error::Truncated | cineform_core::error::Error::EntropyCorrupt(_)),
        "unexpected error variant: {err:?}",
    );

    // The same decoder instance must still decode a well-formed sample
    // afterwards (spec.md §7 "Propagation": errors don't poison the decoder).
    let good = build_all_zero_sample(tag::frame_layout::YUV, 3);
    decoder.decode(&good, &mut out, pitch, PixelFormat::Yuyv, ColorParams::default()).unwrap();
    assert!(out.iter().all(|&b| b == 128));
}

#[test]
fn decode_is_deterministic_across_thread_counts() {
    let sample = build_all_zero_sample(tag::frame_layout::YUV, 3);

    let unit = 4;
    let pitch = (4 / 2) * unit;

    let mut single = Decoder::new(64, 64, 4, 1);
    let mut single_out = vec![0u8; pitch * 4];
    single.decode(&sample, &mut single_out, pitch, PixelFormat::Yuyv, ColorParams::default()).unwrap();

    let mut pooled = Decoder::new(64, 64, 4, 8);
    let mut pooled_out = vec![0u8; pitch * 4];
    pooled.decode(&sample, &mut pooled_out, pitch, PixelFormat::Yuyv, ColorParams::default()).unwrap();

    assert_eq!(single_out, pooled_out, "decode output must be independent of worker thread count");
}

/// A sample that carries every metadata tag (color space, frame rate,
/// encode curve, alpha companding) ahead of the channel count must still
/// parse: these tags are required-but-inert, not optional, so a decoder
/// that doesn't recognize them by name would reject every real-world
/// stream that sets them.
#[test]
fn metadata_tags_ahead_of_channel_count_do_not_reject_the_sample() {
    let mut buf = Vec::new();
    push_tag(&mut buf, tag::TAG_SAMPLE_TYPE, tag::sample_type::IFRAME);
    push_tag(&mut buf, tag::TAG_FRAME_WIDTH, 4);
    push_tag(&mut buf, tag::TAG_FRAME_HEIGHT, 4);
    push_tag(&mut buf, tag::TAG_DISPLAY_HEIGHT, 3);
    push_tag(&mut buf, tag::TAG_FRAME_LAYOUT, tag::frame_layout::YUV);
    push_tag(&mut buf, tag::TAG_COLOR_SPACE, 0);
    push_tag(&mut buf, tag::TAG_FRAME_RATE, 30);
    push_tag(&mut buf, tag::TAG_ENCODE_CURVE, 0);
    push_tag(&mut buf, tag::TAG_ENCODE_CURVE_PRESET, 0);
    push_tag(&mut buf, tag::TAG_ALPHA_COMPANDED, 0);
    push_tag(&mut buf, tag::TAG_ALPHA_OFFSET, 0);
    push_tag(&mut buf, tag::TAG_ALPHA_GAIN, 1 << 13);
    push_tag(&mut buf, tag::TAG_CHANNEL_COUNT, 3);
    for _ in 0..3 {
        push_tag(&mut buf, tag::TAG_NUM_LEVELS, 1);
        push_tag(&mut buf, tag::TAG_WAVELET_DESCRIPTOR, tag::transform_shape::SPATIAL);
        for band in [tag::band_index::LL, tag::band_index::LH, tag::band_index::HL, tag::band_index::HH] {
            push_all_zero_band(&mut buf, band, 4);
        }
    }

    let mut decoder = Decoder::new(64, 64, 4, 2);
    let info = decoder.parse_header(&buf).unwrap();
    assert_eq!(info.display_height, 3);

    let unit = 4; // YUYV
    let pitch = (4 / 2) * unit;
    let mut out = vec![0u8; pitch * 4];
    decoder.decode(&buf, &mut out, pitch, PixelFormat::Yuyv, ColorParams::default()).unwrap();
}

#[test]
fn sequence_header_sample_decodes_as_a_no_op() {
    let mut buf = Vec::new();
    push_tag(&mut buf, tag::TAG_SAMPLE_TYPE, tag::sample_type::SEQUENCE_HEADER);

    let mut decoder = Decoder::new(64, 64, 4, 1);
    let mut out = vec![0u8; 16];
    decoder.decode(&buf, &mut out, 4, PixelFormat::Yuyv, ColorParams::default()).unwrap();
    assert!(out.iter().all(|&b| b == 0), "sequence header must not touch the output buffer");
}
