// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The top-level decoder (spec.md §6): owns the wavelet arena, the worker
//! pool, and the built-in codebooks, and drives one sample at a time from
//! compressed bytes to packed output pixels.

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::Select;
use smallvec::SmallVec;

use cineform_core::error::{invariant_error, oversize_error, Result};
use cineform_core::pixel::{ColorParams, PixelFormat};
use cineform_core::sample::{FrameLayout, SampleInfo, SampleType};

use crate::codebook::builtin_codebooks;
use crate::color::decompand_alpha;
use crate::entropy::SubbandTarget;
use crate::fsm::FsmTable;
use crate::pack::{pack_planar_row_16, pack_rgb_row, pack_v210_row, pack_yuv_row, v210_row_bytes, writer_for};
use crate::parser::{self, ParsedBand, ParsedWavelet};
use crate::scheduler::{EntropyJob, TransformJob, WorkerPool};
use crate::wavelet::reconstruct::Reconstructed;
use crate::wavelet::{BandIndex, Subband, Wavelet, WaveletArena, WaveletIndex};

/// A running decoder instance (spec.md §6 "Lifecycle"). Transform memory and
/// worker threads are allocated once at construction and reused across every
/// `decode` call, matching spec.md §3's "transform memory is reused across
/// samples".
///
/// spec.md §6 lists an `allocator` parameter on `new`; this decoder has no
/// analog for it (no idiomatic custom-allocator hook exists here) and always
/// uses the global allocator, a simplification recorded in DESIGN.md.
pub struct Decoder {
    max_width: u16,
    max_height: u16,
    max_channels: usize,
    pool: WorkerPool,
    codebooks: Vec<Arc<FsmTable>>,
    arena: WaveletArena,
}

/// Where in the per-channel pyramid a [`WaveletIndex`] sits, so the drain
/// loop can route a finished reconstruction to the next level's LL band (or
/// to the channel's final image, at the bottom).
#[derive(Copy, Clone)]
struct Location {
    channel: usize,
    level: usize,
}

impl Decoder {
    /// Constructs a decoder sized for samples up to `max_width` x
    /// `max_height` with up to `max_channels` channels, backed by
    /// `thread_count` worker threads (minimum 1).
    pub fn new(max_width: u16, max_height: u16, max_channels: usize, thread_count: usize) -> Decoder {
        Decoder {
            max_width,
            max_height,
            max_channels,
            pool: WorkerPool::new(thread_count),
            codebooks: builtin_codebooks(),
            arena: WaveletArena::new(),
        }
    }

    /// Reads just the sample header, enough to size an output buffer before
    /// calling [`Decoder::decode`] (spec.md §6 `parse_header`).
    pub fn parse_header(&self, buf: &[u8]) -> Result<SampleInfo> {
        parser::parse_header(buf)
    }

    /// Decodes one sample into `out_frame`, packed as `format` with rows
    /// `out_pitch` bytes apart, using `color` to select the YUV<->RGB matrix
    /// and output conventions (spec.md §6 `decode`).
    pub fn decode(
        &mut self,
        sample_bytes: &[u8],
        out_frame: &mut [u8],
        out_pitch: usize,
        format: PixelFormat,
        color: ColorParams,
    ) -> Result<()> {
        let parsed = parser::parse_sample(sample_bytes)?;

        if parsed.info.sample_type == SampleType::SequenceHeader {
            return Ok(());
        }
        if parsed.info.width > self.max_width
            || parsed.info.height > self.max_height
            || parsed.channels.len() > self.max_channels
        {
            return oversize_error();
        }

        self.arena.clear();
        let payload: Arc<[u8]> = Arc::from(sample_bytes.to_vec());

        let mut channel_levels: Vec<Vec<WaveletIndex>> = Vec::with_capacity(parsed.channels.len());
        let mut locations: HashMap<WaveletIndex, Location> = HashMap::new();
        let mut entropy_pending = 0usize;
        let mut transform_pending = 0usize;

        // Half-resolution decoding (spec.md §4.E "Half-resolution decoding"):
        // the caller's `resolution` knob elides the bottommost level's
        // horizontal-highpass bands (LH, HH) entirely rather than decoding
        // and discarding them; they are treated as zero during the inverse
        // horizontal pass.
        let skip_horizontal_highpass =
            !matches!(color.resolution, cineform_core::pixel::Resolution::Full);

        for (channel_idx, channel) in parsed.channels.iter().enumerate() {
            let mut indices = Vec::with_capacity(channel.levels.len());
            let bottom_level = channel.levels.len().saturating_sub(1);
            for (level_idx, level) in channel.levels.iter().enumerate() {
                let idx = self.push_level(level);
                locations.insert(idx, Location { channel: channel_idx, level: level_idx });
                indices.push(idx);

                let elide_this_level = skip_horizontal_highpass && level_idx == bottom_level;
                for band in &level.bands {
                    if band.band_index == BandIndex::Ll && level_idx != 0 {
                        // The LL of every level but the top is produced by
                        // reconstructing the level above it, not entropy
                        // decoded (spec.md §3/§4.E: "the LL of level L+1
                        // becomes the reconstruction target LL seed for
                        // level L"). Its wire payload, if any, is skipped
                        // here; the transform-result handler below is the
                        // sole writer of this band, once reconstruction of
                        // the parent level completes.
                        continue;
                    }
                    let elide = elide_this_level
                        && matches!(band.band_index, BandIndex::Lh | BandIndex::Hh);
                    if elide {
                        // Band storage is already zero-initialized by
                        // `Subband::new`; just mark it valid in place.
                        self.arena.get(idx).mark_band_valid(band.band_index);
                        continue;
                    }
                    self.submit_band(&payload, idx, level, band);
                    entropy_pending += 1;
                }
            }
            channel_levels.push(indices);
        }

        let mut channel_images: Vec<Option<Reconstructed>> = (0..parsed.channels.len()).map(|_| None).collect();

        while entropy_pending > 0 || transform_pending > 0 {
            let mut select = Select::new();
            let entropy_idx = select.recv(self.pool.entropy_results());
            let transform_idx = select.recv(self.pool.transform_results());
            let op = select.select();

            match op.index() {
                i if i == entropy_idx => {
                    let result = op.recv(self.pool.entropy_results()).expect("entropy channel closed early");
                    entropy_pending -= 1;
                    let coefficients = result.coefficients?;
                    let wavelet = self.arena.get_mut(result.wavelet);
                    if let Some(sb) = wavelet.bands.iter_mut().find(|b| b.band_index == result.band) {
                        sb.data.copy_from_slice(&coefficients);
                    }
                    if wavelet.mark_band_valid(result.band) {
                        self.submit_reconstruction(result.wavelet);
                        transform_pending += 1;
                    }
                }
                i if i == transform_idx => {
                    let result = op.recv(self.pool.transform_results()).expect("transform channel closed early");
                    transform_pending -= 1;
                    let location = locations[&result.wavelet];
                    let levels = &channel_levels[location.channel];

                    if location.level + 1 < levels.len() {
                        let next = levels[location.level + 1];
                        match result.reconstructed {
                            Reconstructed::Image { width, height, data } => {
                                let wavelet = self.arena.get_mut(next);
                                if let Some(ll) = wavelet.bands.iter_mut().find(|b| b.band_index == BandIndex::Ll) {
                                    ll.resize(width, height);
                                    ll.data[..data.len()].copy_from_slice(&data);
                                }
                                if wavelet.mark_band_valid(BandIndex::Ll) {
                                    self.submit_reconstruction(next);
                                    transform_pending += 1;
                                }
                            }
                            Reconstructed::TemporalPair { .. } => {
                                // A temporal-over-frames wavelet reconstructs
                                // to an (even, odd) pair that would need to
                                // seed two independent child wavelets below
                                // it (spec.md §4.E step 3), rather than the
                                // single LL slot every other shape seeds.
                                // Driving that bifurcated pyramid isn't
                                // implemented; the sample parser never builds
                                // a 2-band temporal `Wavelet`, so this arm is
                                // unreachable through `decode` today (see
                                // DESIGN.md). Fail loudly instead of silently
                                // discarding the pair if that ever changes.
                                return invariant_error("temporal-over-frames reconstruction has no driver");
                            }
                        }
                    }
                    else if matches!(result.reconstructed, Reconstructed::Image { .. }) {
                        channel_images[location.channel] = Some(result.reconstructed);
                    }
                    else {
                        return invariant_error("temporal-over-frames reconstruction has no driver");
                    }
                }
                _ => unreachable!("Select only registered two receivers"),
            }
        }

        if let Some(err) = self.pool.take_latched_error() {
            return Err(err);
        }

        pack_frame(
            &parsed.info,
            &channel_images,
            format,
            &color,
            AlphaCompanding {
                enabled: parsed.alpha_companded,
                offset: parsed.alpha_offset,
                gain: parsed.alpha_gain,
            },
            out_frame,
            out_pitch,
        )
    }

    fn push_level(&mut self, level: &ParsedWavelet) -> WaveletIndex {
        let mut bands: SmallVec<[Subband; 4]> = SmallVec::new();
        for band in &level.bands {
            let mut sb = Subband::new(level.width, level.height, band.band_index);
            sb.quantizer = band.quantizer;
            bands.push(sb);
        }
        self.arena.push(Wavelet::new(0, level.shape, bands))
    }

    fn submit_band(&self, payload: &Arc<[u8]>, wavelet: WaveletIndex, level: &ParsedWavelet, band: &ParsedBand) {
        let codebook_id = band.codebook_id % self.codebooks.len().max(1);
        let codebook = self.codebooks[codebook_id].clone();
        let target = SubbandTarget {
            width: level.width,
            height: level.height,
            pitch: level.width,
            difference_coding: band.difference_coding,
            quantizer: band.quantizer,
        };
        self.pool.submit_entropy(EntropyJob {
            wavelet,
            band: band.band_index,
            payload: payload.clone(),
            payload_range: band.payload_range,
            target,
            codebook,
            codebook_id,
            quantizer: band.quantizer,
        });
    }

    fn submit_reconstruction(&self, wavelet: WaveletIndex) {
        let w = self.arena.get(wavelet);
        let bands = w.bands.iter().map(|b| (b.band_index, b.width, b.height, b.data.clone())).collect();
        self.pool.submit_transform(TransformJob { wavelet, bands, shape: w.shape });
    }
}

/// Alpha companding curve parameters threaded from a sample's metadata tags
/// (spec.md §4.F "Companding", Glossary "Companding") into [`pack_frame`].
/// `enabled = false` leaves the alpha plane untouched.
struct AlphaCompanding {
    enabled: bool,
    offset: i32,
    gain: i32,
}

/// Clamps `row` into `[0, display_height)`: rows at or past
/// `display_height` are edge-replication padding (spec.md §3 "Frame",
/// `SampleInfo::display_height`) and read back the last displayed row.
fn clamp_to_display(row: usize, display_height: usize) -> usize {
    row.min(display_height.saturating_sub(1))
}

/// Maps a source row index to its output row, reversing row order when
/// `invert` is set (spec.md §8 Testable Property 6, `ColorParams::invert`).
fn output_row(row: usize, height: usize, invert: bool) -> usize {
    if invert {
        height - 1 - row
    }
    else {
        row
    }
}

/// Applies the alpha companding curve in place over a plane's worth of
/// coefficients, undoing the encoder's gamma-like compression of the alpha
/// channel (spec.md §4.F "Companding"). Coefficients are centered around
/// zero the same way every other plane is (`pack_rgb_row` re-adds
/// `1 << (bits - 1)` before packing); the companding curve operates on that
/// same unsigned, `bits`-wide encoded domain, so the bias is re-added here
/// and stripped again afterward.
fn decompand_plane(plane: &[i16], companding: &AlphaCompanding, bits: u32) -> Vec<i16> {
    if !companding.enabled {
        return plane.to_vec();
    }
    let bias = 1i32 << (bits - 1);
    plane
        .iter()
        .map(|&coef| {
            let encoded = i32::from(coef) + bias;
            let decompanded = decompand_alpha(encoded, companding.offset, companding.gain);
            let centered = decompanded - bias;
            centered.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
        })
        .collect()
}

/// Final color conversion and row packing for every channel of one sample
/// (spec.md §4.F). Channels are reconstructed independently above; this is
/// the one place their planes are recombined.
fn pack_frame(
    info: &SampleInfo,
    channels: &[Option<Reconstructed>],
    format: PixelFormat,
    color: &ColorParams,
    alpha_companding: AlphaCompanding,
    out_frame: &mut [u8],
    out_pitch: usize,
) -> Result<()> {
    let height = info.height as usize;
    let display_height = (info.display_height as usize).max(1);
    let invert = color.invert;
    let planes: Vec<&[i16]> = channels
        .iter()
        .map(|c| match c {
            Some(Reconstructed::Image { data, .. }) => data.as_slice(),
            _ => &[][..],
        })
        .collect();

    match info.layout {
        FrameLayout::Gray => {
            let y = planes[0];
            let width = info.width as usize;
            for row in 0..height {
                let src_row = clamp_to_display(row, display_height);
                let dst_row = output_row(row, height, invert);
                let src = &y[src_row * width..(src_row + 1) * width];
                let dst = &mut out_frame[dst_row * out_pitch..dst_row * out_pitch + width * 2];
                pack_planar_row_16(src, dst);
            }
        }
        FrameLayout::Yuv => {
            let (y, u, v) = (planes[0], planes[1], planes[2]);
            let width = info.width as usize;
            // Chroma planes are reconstructed at full resolution (spec.md
            // §4.F models subsampling as an output-packing concern);
            // downsample to 4:2:2 by taking even-indexed samples, shared by
            // every YUV target format below.
            let chroma_row = |plane: &[i16], src_row: usize| -> Vec<i16> {
                plane[src_row * width..(src_row + 1) * width].iter().step_by(2).copied().collect()
            };

            match format {
                PixelFormat::V210 => {
                    let row_bytes = v210_row_bytes(width);
                    for row in 0..height {
                        let src_row = clamp_to_display(row, display_height);
                        let dst_row = output_row(row, height, invert);
                        let y_row = &y[src_row * width..(src_row + 1) * width];
                        let u_row = chroma_row(u, src_row);
                        let v_row = chroma_row(v, src_row);
                        let dst = &mut out_frame[dst_row * out_pitch..dst_row * out_pitch + row_bytes];
                        pack_v210_row(y_row, &u_row, &v_row, color, dst);
                    }
                }
                PixelFormat::Yr16 => {
                    // Planar 16-bit YUV (spec.md §4.F "YR16"): Y at full
                    // width, U and V subsampled to half width, each plane's
                    // rows packed sequentially one after another -- the same
                    // plane-major layout `FrameLayout::Bayer` uses below.
                    let chroma_width = width / 2;
                    for row in 0..height {
                        let src_row = clamp_to_display(row, display_height);
                        let dst_row = output_row(row, height, invert);
                        let y_row = &y[src_row * width..(src_row + 1) * width];
                        let base = dst_row * out_pitch;
                        pack_planar_row_16(y_row, &mut out_frame[base..base + width * 2]);
                    }
                    for (p, plane) in [u, v].into_iter().enumerate() {
                        for row in 0..height {
                            let src_row = clamp_to_display(row, display_height);
                            let dst_row = output_row(row, height, invert);
                            let chroma = chroma_row(plane, src_row);
                            let base = ((p + 1) * height + dst_row) * out_pitch;
                            pack_planar_row_16(&chroma, &mut out_frame[base..base + chroma_width * 2]);
                        }
                    }
                }
                _ => {
                    let mut writer = writer_for(format);
                    let unit = writer.unit_bytes();
                    for row in 0..height {
                        let src_row = clamp_to_display(row, display_height);
                        let dst_row = output_row(row, height, invert);
                        let y_row = &y[src_row * width..(src_row + 1) * width];
                        let u_row = chroma_row(u, src_row);
                        let v_row = chroma_row(v, src_row);
                        let dst = &mut out_frame[dst_row * out_pitch..dst_row * out_pitch + (width / 2) * unit];
                        pack_yuv_row(writer.as_mut(), y_row, &u_row, &v_row, color, dst);
                    }
                }
            }
        }
        FrameLayout::Rgb | FrameLayout::Rgba => {
            let width = info.width as usize;
            let mut writer = writer_for(format);
            let unit = writer.unit_bytes();
            let alpha_plane = if info.layout == FrameLayout::Rgba {
                Some(decompand_plane(planes[3], &alpha_companding, color.precision.bits()))
            }
            else {
                None
            };
            for row in 0..height {
                let src_row = clamp_to_display(row, display_height);
                let dst_row = output_row(row, height, invert);
                let r = &planes[0][src_row * width..(src_row + 1) * width];
                let g = &planes[1][src_row * width..(src_row + 1) * width];
                let b = &planes[2][src_row * width..(src_row + 1) * width];
                let a = alpha_plane.as_ref().map(|a| &a[src_row * width..(src_row + 1) * width]);
                let dst = &mut out_frame[dst_row * out_pitch..dst_row * out_pitch + width * unit];
                pack_rgb_row(writer.as_mut(), r, g, b, a, color, dst);
            }
        }
        FrameLayout::Bayer => {
            // Four planes (G, R-G, B-G, G1-G2) packed sequentially, one
            // plane's worth of rows after another, as a planar-only output
            // representation (spec.md §4.F "four planes"); real raw-still
            // containers define their own plane interleave, out of scope
            // here.
            let width = info.width as usize;
            let plane_bytes = width * 2;
            for (p, plane) in planes.iter().enumerate().take(4) {
                for row in 0..height {
                    let src_row = clamp_to_display(row, display_height);
                    let dst_row = output_row(row, height, invert);
                    let src = &plane[src_row * width..(src_row + 1) * width];
                    let base = (p * height + dst_row) * out_pitch;
                    let dst = &mut out_frame[base..base + plane_bytes];
                    pack_planar_row_16(src, dst);
                }
            }
        }
    }

    Ok(())
}
