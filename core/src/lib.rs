#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(
    missing_debug_implementations,
    unused_qualifications,
    unused_import_braces
)]

//! Core codec for DICOM-style tagged element streams: a self-describing
//! binary format of (group, element)-tagged, VR-typed data elements,
//! including nested sequences of items and payloads too large to hold
//! in memory.
//!
//! The crate is structured as follows:
//!
//! - [`tag`] and [`vr`] hold the element tag type and the value
//!   representation registry with its fixed encoding metadata.
//! - [`attribute`] defines the attribute — one tagged value holder —
//!   with strict typed accessors and lenient single-value probing.
//! - [`value`] holds the native value containers, sequence items, and
//!   the deferred on-disk payload descriptor.
//! - [`list`] defines the attribute list, the unit of one decoded
//!   instance, with its stream entry points.
//! - [`decode`] and [`encode`] implement the two directions of the
//!   wire codec for any transfer syntax.
//! - [`error`] contains the crate-level error and result types.
//!
//! ## Example
//!
//! ```
//! use dcmio_core::{Attribute, AttributeList, Tag, TransferSyntax, VR};
//!
//! # fn main() -> dcmio_core::Result<()> {
//! let mut list = AttributeList::new();
//! let mut modality = Attribute::new(Tag(0x0008, 0x0060), VR::CS);
//! modality.add_string("CT")?;
//! list.put(modality);
//!
//! let mut encoded = Vec::new();
//! list.write_to(&mut encoded, TransferSyntax::EXPLICIT_LE)?;
//!
//! let decoded = AttributeList::read_from(
//!     &encoded[..],
//!     TransferSyntax::EXPLICIT_LE,
//!     &Default::default(),
//! )?;
//! assert_eq!(decoded.string_value_or(Tag(0x0008, 0x0060), ""), "CT");
//! # Ok(())
//! # }
//! ```

pub mod attribute;
pub mod decode;
pub mod encode;
pub mod error;
pub mod list;
pub mod syntax;
pub mod tag;
pub mod value;
pub mod vr;

pub use attribute::Attribute;
pub use decode::{DecodeOptions, Decoder, DEFAULT_MAX_DEPTH};
pub use encode::Encoder;
pub use error::{CodecError, Result};
pub use list::AttributeList;
pub use syntax::{TransferSyntax, VrEncoding, VrLookup};
pub use tag::Tag;
pub use value::{DeferredValue, Item, Value, C};
pub use vr::{LengthForm, VR};

// re-export crates that are part of the public API
pub use byteordered::Endianness;
pub use smallvec;

/// The all-ones sentinel in a 32-bit length field, declaring a length
/// which is not known in advance and runs until the matching delimiter.
pub const UNDEFINED_LENGTH: u32 = 0xFFFF_FFFF;
