// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `io` module implements the two flavours of reading the decoder needs:
//!
//!  * [`ByteReader`] walks the tagged tuple structure of a sample: 16-bit
//!    big-endian `(tag, value)` pairs, 4-byte aligned.
//!  * [`BitReaderMsb`] reads bit-granular, most-significant-bit-first data out
//!    of a band payload, which is what the FSM entropy decoder runs on.

mod bit_reader;
mod byte_reader;

pub use bit_reader::BitReaderMsb;
pub use byte_reader::ByteReader;

/// A bit stream with a statically known remaining length, in bits.
pub trait FiniteBitStream {
    /// The number of bits left unread in the stream.
    fn bits_left(&self) -> u64;
}
