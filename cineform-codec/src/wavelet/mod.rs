// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Inverse wavelet transform: kernels (§4.D), the subband/wavelet/transform
//! data model (§3), and the reconstruction engine that drives the kernels
//! across levels and channels (§4.E).

pub mod kernels;
pub mod reconstruct;
pub mod subband;
pub mod transform;

pub use subband::{BandIndex, Subband};
pub use transform::{Transform, TransformShape, Wavelet, WaveletArena, WaveletIndex};
