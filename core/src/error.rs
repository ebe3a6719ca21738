//! The error taxonomy of the codec.
//!
//! Malformed input, caller mistakes, and I/O failures are distinct
//! variants so that callers can pattern-match recoverable conditions
//! instead of string-matching messages.

use crate::tag::Tag;
use crate::vr::VR;
use snafu::{Backtrace, Snafu};

/// Type alias for a result from this crate.
pub type Result<T, E = CodecError> = std::result::Result<T, E>;

/// The main error type of the codec.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum CodecError {
    /// The two-byte code read from an explicit-VR stream is not in the
    /// dispatch table. Fatal to the current pass: without the VR there is
    /// no way to tell how wide the following length field is.
    #[snafu(display(
        "unsupported VR code `{}` at position {}",
        String::from_utf8_lossy(bytes),
        position
    ))]
    UnsupportedVr { bytes: [u8; 2], position: u64 },

    /// A declared value length which does not agree with the VR,
    /// e.g. not a multiple of the element width. The decoder consumes
    /// the declared length before reporting this, so the stream is left
    /// positioned at the next element.
    #[snafu(display(
        "attribute {} declares {} bytes, not a multiple of its {}-byte elements",
        tag,
        len,
        width
    ))]
    MalformedLength { tag: Tag, len: u32, width: u32 },

    /// A typed accessor or mutator was called on an attribute whose VR
    /// does not hold that kind of value. Always a caller bug, never a
    /// consequence of malformed input.
    #[snafu(display("attribute {} ({}) does not hold {} values", tag, vr, requested))]
    WrongValueType {
        tag: Tag,
        vr: VR,
        requested: &'static str,
    },

    /// A value which cannot be represented within the width or numeric
    /// range constraints of the attribute's VR.
    #[snafu(display("value for attribute {} out of range: {}", tag, reason))]
    OutOfRange { tag: Tag, reason: String },

    /// Sequence nesting in the input exceeded the configured safety limit.
    #[snafu(display("sequence nesting deeper than the limit of {}", limit))]
    NestingTooDeep { limit: u32 },

    /// A tag which is not valid at the current position,
    /// e.g. a non-item tag where an item header was required.
    #[snafu(display("unexpected tag {} at position {}", tag, position))]
    UnexpectedTag { tag: Tag, position: u64 },

    /// The caller-supplied cancellation flag was raised.
    /// Raised only between elements, never in the middle of one.
    #[snafu(display("codec pass cancelled by caller"))]
    Cancelled,

    /// Failure in the underlying stream or in the backing file of a
    /// deferred attribute, including premature end of input.
    #[snafu(display("I/O failure"))]
    Io {
        source: std::io::Error,
        backtrace: Backtrace,
    },
}

impl CodecError {
    /// Whether this error is attributable to the calling code
    /// rather than to the input data or the environment.
    pub fn is_caller_bug(&self) -> bool {
        matches!(self, CodecError::WrongValueType { .. })
    }
}
