// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `cineform-core` provides the wire-level primitives shared by any
//! component of a CineForm-style wavelet video codec: big-endian tag/value
//! tuple reads, an MSB-first bit reader for entropy-coded band payloads, the
//! common error taxonomy, and the pixel-format/color-parameter types that
//! describe a decode call's output.
//!
//! This crate knows nothing about FSM tables, wavelets, or threads — that is
//! `cineform-codec`'s job. `cineform-core` is to that crate what
//! `symphonia-core` is to each of Symphonia's codec crates.
#![forbid(unsafe_code)]

pub mod error;
pub mod io;
pub mod pixel;
pub mod sample;
pub mod util;
