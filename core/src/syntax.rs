//! Transfer syntax descriptors: the (VR-explicitness, byte order) pair
//! which governs one stream's encoding, and the dictionary collaborator
//! consulted for the VR of a tag in implicit mode.

use crate::tag::Tag;
use crate::vr::VR;
use byteordered::Endianness;

/// Whether VR codes are physically present in the stream.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone)]
pub enum VrEncoding {
    /// Each element header carries its two-byte VR code.
    Explicit,
    /// No VR code on the wire; the VR is resolved from a dictionary
    /// keyed on the element tag.
    Implicit,
}

/// The encoding rules of one stream, fixed for the duration of a
/// decode or encode pass. Read and write syntaxes are independent:
/// a caller may decode in one byte order and encode in another.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone)]
pub struct TransferSyntax {
    vr_encoding: VrEncoding,
    endianness: Endianness,
}

impl TransferSyntax {
    /// Explicit VR, little endian. The most common interchange form.
    pub const EXPLICIT_LE: TransferSyntax = TransferSyntax {
        vr_encoding: VrEncoding::Explicit,
        endianness: Endianness::Little,
    };

    /// Implicit VR, little endian.
    pub const IMPLICIT_LE: TransferSyntax = TransferSyntax {
        vr_encoding: VrEncoding::Implicit,
        endianness: Endianness::Little,
    };

    /// Explicit VR, big endian. Retired in the wild, still read.
    pub const EXPLICIT_BE: TransferSyntax = TransferSyntax {
        vr_encoding: VrEncoding::Explicit,
        endianness: Endianness::Big,
    };

    /// Create a transfer syntax from its parts.
    pub fn new(vr_encoding: VrEncoding, endianness: Endianness) -> Self {
        TransferSyntax {
            vr_encoding,
            endianness,
        }
    }

    /// Whether element headers carry an explicit VR code.
    #[inline]
    pub fn is_explicit_vr(self) -> bool {
        self.vr_encoding == VrEncoding::Explicit
    }

    /// The byte order of all fixed-width fields and binary values.
    #[inline]
    pub fn endianness(self) -> Endianness {
        self.endianness
    }
}

impl Default for TransferSyntax {
    fn default() -> Self {
        TransferSyntax::EXPLICIT_LE
    }
}

/// The dictionary collaborator for implicit-VR streams: a pure mapping
/// from a tag to its value representation. The codec does not implement
/// the dictionary; a tag unknown to the lookup decodes as [`VR::UN`].
pub trait VrLookup {
    /// The VR registered for the given tag, if any.
    fn vr_for(&self, tag: Tag) -> Option<VR>;
}

impl<F> VrLookup for F
where
    F: Fn(Tag) -> Option<VR>,
{
    fn vr_for(&self, tag: Tag) -> Option<VR> {
        (self)(tag)
    }
}
