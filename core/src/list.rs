//! The attribute list: the unit a caller reads and writes.
//!
//! A list owns its attributes exclusively, keyed and iterated in tag
//! order. Attributes are never shared between lists; move an item's
//! list (or clone it) when content must appear in two places.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use snafu::ResultExt;

use crate::attribute::Attribute;
use crate::decode::{DecodeOptions, Decoder};
use crate::encode::Encoder;
use crate::error::{IoSnafu, Result};
use crate::syntax::{TransferSyntax, VrLookup};
use crate::tag::Tag;

/// An ordered-by-tag mapping from tag to attribute.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributeList {
    entries: BTreeMap<Tag, Attribute>,
}

impl AttributeList {
    /// Create an empty list.
    pub fn new() -> Self {
        AttributeList {
            entries: BTreeMap::new(),
        }
    }

    /// The attribute stored under the given tag, if any.
    pub fn get(&self, tag: Tag) -> Option<&Attribute> {
        self.entries.get(&tag)
    }

    /// Mutable access to the attribute stored under the given tag.
    pub fn get_mut(&mut self, tag: Tag) -> Option<&mut Attribute> {
        self.entries.get_mut(&tag)
    }

    /// Insert an attribute, keyed by its own tag.
    /// Returns the attribute previously stored under that tag.
    pub fn put(&mut self, attribute: Attribute) -> Option<Attribute> {
        self.entries.insert(attribute.tag(), attribute)
    }

    /// Remove and return the attribute under the given tag.
    pub fn remove(&mut self, tag: Tag) -> Option<Attribute> {
        self.entries.remove(&tag)
    }

    /// Move every attribute of `other` into this list.
    /// On tag collisions the incoming attribute wins.
    pub fn put_all(&mut self, other: AttributeList) {
        self.entries.extend(other.entries);
    }

    /// The number of attributes in the list.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list holds no attributes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate the attributes in tag order.
    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.entries.values()
    }

    /// Iterate the tags in order.
    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.entries.keys().copied()
    }

    // ---- lenient probing helpers ---------------------------------------

    /// The first string value of the attribute at `tag`, or the default
    /// if the attribute is absent, empty, or not string-valued.
    pub fn string_value_or(&self, tag: Tag, default: &str) -> String {
        match self.get(tag) {
            Some(a) => a.single_string_value_or(default),
            None => default.to_owned(),
        }
    }

    /// The first `i32` value of the attribute at `tag`, or the default.
    pub fn int_value_or(&self, tag: Tag, default: i32) -> i32 {
        self.get(tag)
            .map(|a| a.single_int_value_or(default))
            .unwrap_or(default)
    }

    /// The first `i64` value of the attribute at `tag`, or the default.
    pub fn long_value_or(&self, tag: Tag, default: i64) -> i64 {
        self.get(tag)
            .map(|a| a.single_long_value_or(default))
            .unwrap_or(default)
    }

    /// The first `f64` value of the attribute at `tag`, or the default.
    pub fn double_value_or(&self, tag: Tag, default: f64) -> f64 {
        self.get(tag)
            .map(|a| a.single_double_value_or(default))
            .unwrap_or(default)
    }

    // ---- stream entry points -------------------------------------------

    /// Decode a list from a byte source positioned at the start of a
    /// data-element stream, until end of stream or the configured stop
    /// tag. Large binary payloads are always materialized; use
    /// [`AttributeList::read_file`] to leave them on disk.
    pub fn read_from<R: Read>(
        source: R,
        syntax: TransferSyntax,
        options: &DecodeOptions,
    ) -> Result<AttributeList> {
        Decoder::new(source, syntax)
            .with_options(options.clone())
            .read_list()
    }

    /// Like [`AttributeList::read_from`], with a VR dictionary for
    /// implicit-VR streams.
    pub fn read_from_with<R: Read>(
        source: R,
        syntax: TransferSyntax,
        dictionary: &dyn VrLookup,
        options: &DecodeOptions,
    ) -> Result<AttributeList> {
        Decoder::new(source, syntax)
            .with_options(options.clone())
            .with_dictionary(dictionary)
            .read_list()
    }

    /// Decode a list from a file. With a deferral threshold configured,
    /// OB/OW payloads at or above it are not materialized: the decoder
    /// records the file, offset and length and skips over the bytes.
    pub fn read_file<P: AsRef<Path>>(
        path: P,
        syntax: TransferSyntax,
        options: &DecodeOptions,
    ) -> Result<AttributeList> {
        let path = path.as_ref();
        let file = File::open(path).context(IoSnafu)?;
        Decoder::new(BufReader::new(file), syntax)
            .with_options(options.clone())
            .with_backing_file(path.to_owned())
            .read_list()
    }

    /// Like [`AttributeList::read_file`], with a VR dictionary for
    /// implicit-VR streams.
    pub fn read_file_with<P: AsRef<Path>>(
        path: P,
        syntax: TransferSyntax,
        dictionary: &dyn VrLookup,
        options: &DecodeOptions,
    ) -> Result<AttributeList> {
        let path = path.as_ref();
        let file = File::open(path).context(IoSnafu)?;
        Decoder::new(BufReader::new(file), syntax)
            .with_options(options.clone())
            .with_backing_file(path.to_owned())
            .with_dictionary(dictionary)
            .read_list()
    }

    /// Encode the list in tag order onto the given sink.
    /// Deferred attributes stream their payload from the backing file,
    /// transcoding byte order if the write syntax differs.
    pub fn write_to<W: Write>(&self, to: W, syntax: TransferSyntax) -> Result<()> {
        Encoder::new(to, syntax).write_list(self)
    }
}

impl<'a> IntoIterator for &'a AttributeList {
    type Item = &'a Attribute;
    type IntoIter = std::collections::btree_map::Values<'a, Tag, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}

impl IntoIterator for AttributeList {
    type Item = Attribute;
    type IntoIter = std::collections::btree_map::IntoValues<Tag, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_values()
    }
}

impl FromIterator<Attribute> for AttributeList {
    fn from_iter<I: IntoIterator<Item = Attribute>>(iter: I) -> Self {
        let mut list = AttributeList::new();
        list.extend(iter);
        list
    }
}

impl Extend<Attribute> for AttributeList {
    fn extend<I: IntoIterator<Item = Attribute>>(&mut self, iter: I) {
        self.entries
            .extend(iter.into_iter().map(|a| (a.tag(), a)));
    }
}
