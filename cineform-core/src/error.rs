// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `error` module defines the common error type shared by every stage of
//! the decode pipeline, from the bit reader up to the row packer.

use std::fmt;
use std::io;
use std::result;

/// `Error` enumerates every way a decode can fail. Variants are kinds, not
/// exhaustive causes: callers match on the variant, not the message.
#[derive(Debug)]
pub enum Error {
    /// The bitstream ended inside a tag/value tuple or inside a band payload.
    Truncated,
    /// A required (non-optional) tag was encountered that this decoder does not implement.
    UnsupportedTag(&'static str),
    /// A structural mismatch, e.g. band count disagrees with the transform type.
    BadFormat(&'static str),
    /// The FSM signaled end-of-band before every cell was written, or a run overflowed
    /// the subband.
    EntropyCorrupt(&'static str),
    /// Advertised dimensions exceed decoder limits set at construction.
    Oversize,
    /// An assertion-class failure: a precondition the decoder itself is supposed to
    /// guarantee did not hold.
    InternalInvariant(&'static str),
    /// An I/O error from a caller-supplied source.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Truncated => write!(f, "bitstream truncated"),
            Error::UnsupportedTag(tag) => write!(f, "unsupported required tag: {tag}"),
            Error::BadFormat(msg) => write!(f, "malformed stream: {msg}"),
            Error::EntropyCorrupt(msg) => write!(f, "entropy decode corrupt: {msg}"),
            Error::Oversize => write!(f, "advertised dimensions exceed decoder limits"),
            Error::InternalInvariant(msg) => write!(f, "internal invariant violated: {msg}"),
            Error::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Error::Truncated,
            _ => Error::Io(err),
        }
    }
}

/// The result type returned by every fallible operation in the decode pipeline.
pub type Result<T> = result::Result<T, Error>;

/// Convenience function to create a truncated-stream error.
pub fn truncated_error<T>() -> Result<T> {
    Err(Error::Truncated)
}

/// Convenience function to create an unsupported-tag error.
pub fn unsupported_tag_error<T>(tag: &'static str) -> Result<T> {
    Err(Error::UnsupportedTag(tag))
}

/// Convenience function to create a bad-format error.
pub fn bad_format_error<T>(msg: &'static str) -> Result<T> {
    Err(Error::BadFormat(msg))
}

/// Convenience function to create an entropy-corruption error.
pub fn entropy_error<T>(msg: &'static str) -> Result<T> {
    Err(Error::EntropyCorrupt(msg))
}

/// Convenience function to create an oversize error.
pub fn oversize_error<T>() -> Result<T> {
    Err(Error::Oversize)
}

/// Convenience function to create an internal-invariant error.
pub fn invariant_error<T>(msg: &'static str) -> Result<T> {
    Err(Error::InternalInvariant(msg))
}
