//! The streaming decoder: walks a data-element stream element by
//! element, resolves each VR (from the stream in explicit mode, from the
//! dictionary collaborator in implicit mode), parses the value into the
//! VR's native container, and recurses into sequence items.
//!
//! One decoder handles one pass over one source; the transfer syntax is
//! fixed for the whole pass. Decode errors abort the enclosing read —
//! recovery, if wanted, is the caller's decision at the list level.

use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use byteordered::ByteOrdered;
use snafu::{ensure, ResultExt};
use tracing::{debug, warn};

use crate::attribute::Attribute;
use crate::error::{
    CancelledSnafu, IoSnafu, MalformedLengthSnafu, NestingTooDeepSnafu, Result,
    UnexpectedTagSnafu, UnsupportedVrSnafu,
};
use crate::list::AttributeList;
use crate::syntax::{TransferSyntax, VrLookup};
use crate::tag::Tag;
use crate::value::{C, DeferredValue, Item, Value};
use crate::vr::{LengthForm, VR};
use crate::UNDEFINED_LENGTH;

/// The default cap on sequence nesting depth.
pub const DEFAULT_MAX_DEPTH: u32 = 64;

/// Knobs for one decode pass.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Stop reading top-level elements once a tag at or past this one
    /// is seen. The element itself is not decoded. Used to cut a pass
    /// short of a huge trailing pixel-data element when only the
    /// metadata is wanted.
    pub stop_at: Option<Tag>,
    /// Maximum sequence nesting depth accepted from the input before
    /// failing with `NestingTooDeep`.
    pub max_depth: u32,
    /// Leave OB/OW payloads of at least this many bytes on disk instead
    /// of materializing them. Only effective when decoding from a file
    /// (the decoder must know the backing path); ignored otherwise.
    pub deferred_threshold: Option<u32>,
    /// Cooperative cancellation flag, checked between elements — never
    /// in the middle of one, so that a cancelled pass does not leave a
    /// half-consumed element behind.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            stop_at: None,
            max_depth: DEFAULT_MAX_DEPTH,
            deferred_threshold: None,
            cancel: None,
        }
    }
}

/// A stateful decoder bound to one byte source.
pub struct Decoder<'d, S> {
    source: S,
    syntax: TransferSyntax,
    dictionary: Option<&'d dyn VrLookup>,
    options: DecodeOptions,
    backing: Option<PathBuf>,
    position: u64,
    depth: u32,
}

impl<S> std::fmt::Debug for Decoder<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("syntax", &self.syntax)
            .field("has_dictionary", &self.dictionary.is_some())
            .field("options", &self.options)
            .field("backing", &self.backing)
            .field("position", &self.position)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

impl<'d, S: Read> Decoder<'d, S> {
    /// Create a decoder over the given source and transfer syntax.
    pub fn new(source: S, syntax: TransferSyntax) -> Self {
        Decoder {
            source,
            syntax,
            dictionary: None,
            options: DecodeOptions::default(),
            backing: None,
            position: 0,
            depth: 0,
        }
    }

    /// Replace the decode options.
    pub fn with_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }

    /// Attach the VR dictionary used to resolve tags in implicit mode.
    /// Without one, implicit-VR elements decode as UN byte data.
    pub fn with_dictionary(mut self, dictionary: &'d dyn VrLookup) -> Self {
        self.dictionary = Some(dictionary);
        self
    }

    /// Declare which file the source reads from, enabling deferred
    /// OB/OW payloads when a threshold is configured.
    pub(crate) fn with_backing_file(mut self, path: PathBuf) -> Self {
        self.backing = Some(path);
        self
    }

    /// The number of bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Read elements until end of stream or the configured stop tag,
    /// collecting them into a list.
    pub fn read_list(&mut self) -> Result<AttributeList> {
        let mut list = AttributeList::new();
        loop {
            self.check_cancel()?;
            let tag = match self.try_read_tag()? {
                Some(tag) => tag,
                None => break,
            };
            if let Some(stop) = self.options.stop_at {
                if tag >= stop {
                    debug!("stopping before {} at position {}", tag, self.position);
                    break;
                }
            }
            if tag.is_structural() {
                warn!("delimiter {} outside any sequence, stopping", tag);
                break;
            }
            let attribute = self.read_element_body(tag)?;
            list.put(attribute);
        }
        Ok(list)
    }

    // ---- element decoding ----------------------------------------------

    fn read_element_body(&mut self, tag: Tag) -> Result<Attribute> {
        let (vr, len) = self.read_vr_and_length(tag)?;
        if vr == VR::SQ || len == UNDEFINED_LENGTH {
            if vr != VR::SQ {
                warn!(
                    "element {} ({}) declares undefined length, reading as a sequence",
                    tag, vr
                );
            }
            return self.read_sequence(tag, len);
        }
        self.read_primitive(tag, vr, len)
    }

    fn read_vr_and_length(&mut self, tag: Tag) -> Result<(VR, u32)> {
        if self.syntax.is_explicit_vr() {
            let mut code = [0u8; 2];
            self.read_exact(&mut code)?;
            let vr = match VR::from_bytes(code) {
                Some(vr) => vr,
                None => {
                    return UnsupportedVrSnafu {
                        bytes: code,
                        position: self.position - 2,
                    }
                    .fail()
                }
            };
            let len = match vr.length_form() {
                LengthForm::Short => u32::from(self.read_u16()?),
                LengthForm::Long => {
                    let mut reserved = [0u8; 2];
                    self.read_exact(&mut reserved)?;
                    self.read_u32()?
                }
            };
            Ok((vr, len))
        } else {
            let len = self.read_u32()?;
            let vr = if len == UNDEFINED_LENGTH {
                VR::SQ
            } else {
                self.dictionary
                    .and_then(|d| d.vr_for(tag))
                    .unwrap_or(VR::UN)
            };
            Ok((vr, len))
        }
    }

    fn read_primitive(&mut self, tag: Tag, vr: VR, len: u32) -> Result<Attribute> {
        // the biggest payloads never go through memory when the source
        // is a file and the caller asked for deferral
        if matches!(vr, VR::OB | VR::OW)
            && self
                .options
                .deferred_threshold
                .map_or(false, |threshold| len >= threshold)
        {
            if let Some(path) = self.backing.clone() {
                let width = if vr == VR::OW { 2 } else { 1 };
                let offset = self.position;
                self.skip(len)?;
                ensure!(
                    len % width == 0,
                    MalformedLengthSnafu { tag, len, width }
                );
                debug!("leaving {} bytes of {} on {}", len, tag, path.display());
                let value =
                    DeferredValue::new(path, offset, len, self.syntax.endianness(), width);
                return Ok(Attribute::from_parts(tag, vr, len, Value::Deferred(value)));
            }
        }

        if vr.is_text() {
            return self.read_text(tag, vr, len);
        }

        let width = match vr.element_width() {
            Some(width) => width,
            // SQ is handled before this point; nothing else lacks a width
            None => unreachable!("VR {} has no element width", vr),
        };
        if len % width != 0 {
            // consume the declared bytes anyway so the caller can try
            // to resynchronize on the next element
            self.skip(len)?;
            return MalformedLengthSnafu { tag, len, width }.fail();
        }
        let n = len / width;

        let value = match vr {
            VR::OB | VR::UN => {
                let mut buf = vec![0u8; len as usize];
                self.read_exact(&mut buf)?;
                Value::Bytes(buf)
            }
            VR::OW | VR::US => {
                let mut values = C::with_capacity(n as usize);
                for _ in 0..n {
                    values.push(self.read_u16()?);
                }
                Value::U16(values)
            }
            VR::SS => {
                let mut values = C::with_capacity(n as usize);
                for _ in 0..n {
                    values.push(self.read_i16()?);
                }
                Value::I16(values)
            }
            VR::UL => {
                let mut values = C::with_capacity(n as usize);
                for _ in 0..n {
                    values.push(self.read_u32()?);
                }
                Value::U32(values)
            }
            VR::SL => {
                let mut values = C::with_capacity(n as usize);
                for _ in 0..n {
                    values.push(self.read_i32()?);
                }
                Value::I32(values)
            }
            VR::FL => {
                let mut values = C::with_capacity(n as usize);
                for _ in 0..n {
                    values.push(self.read_f32()?);
                }
                Value::F32(values)
            }
            VR::FD => {
                let mut values = C::with_capacity(n as usize);
                for _ in 0..n {
                    values.push(self.read_f64()?);
                }
                Value::F64(values)
            }
            VR::AT => {
                let mut values = C::with_capacity(n as usize);
                for _ in 0..n {
                    let group = self.read_u16()?;
                    let element = self.read_u16()?;
                    values.push(Tag(group, element));
                }
                Value::Tags(values)
            }
            _ => unreachable!("VR {} is not binary", vr),
        };
        Ok(Attribute::from_parts(tag, vr, len, value))
    }

    fn read_text(&mut self, tag: Tag, vr: VR, len: u32) -> Result<Attribute> {
        let mut buf = vec![0u8; len as usize];
        self.read_exact(&mut buf)?;
        let values: C<String> = if buf.is_empty() {
            C::new()
        } else {
            buf.split(|&b| b == b'\\')
                .map(|piece| {
                    let text = String::from_utf8_lossy(piece);
                    // strip the padding convention of the VR, keeping
                    // the logical value only
                    if vr == VR::UI {
                        text.trim_end_matches('\0').to_owned()
                    } else {
                        text.trim_end_matches(' ').to_owned()
                    }
                })
                .collect()
        };
        Ok(Attribute::from_parts(tag, vr, len, Value::Text(values)))
    }

    // ---- sequence decoding ---------------------------------------------

    fn read_sequence(&mut self, tag: Tag, declared_len: u32) -> Result<Attribute> {
        ensure!(
            self.depth < self.options.max_depth,
            NestingTooDeepSnafu {
                limit: self.options.max_depth
            }
        );
        self.depth += 1;
        let items = self.read_items(declared_len);
        self.depth -= 1;
        Ok(Attribute::from_parts(
            tag,
            VR::SQ,
            UNDEFINED_LENGTH,
            Value::Sequence(items?),
        ))
    }

    fn read_items(&mut self, declared_len: u32) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        if declared_len == UNDEFINED_LENGTH {
            // delimiter convention: items until the sequence delimiter
            loop {
                self.check_cancel()?;
                let tag = self.read_tag()?;
                let len = self.read_u32()?;
                if tag == Tag::SEQUENCE_DELIMITER {
                    if len != 0 {
                        warn!("sequence delimiter declares length {}", len);
                    }
                    break;
                }
                ensure!(
                    tag == Tag::ITEM,
                    UnexpectedTagSnafu {
                        tag,
                        position: self.position - 8
                    }
                );
                items.push(self.read_one_item(len)?);
            }
        } else {
            // declared-length convention: items until the byte count
            // is used up
            let end = self.position + u64::from(declared_len);
            while self.position < end {
                self.check_cancel()?;
                let tag = self.read_tag()?;
                let len = self.read_u32()?;
                if tag == Tag::SEQUENCE_DELIMITER {
                    warn!("sequence delimiter inside a defined-length sequence");
                    break;
                }
                ensure!(
                    tag == Tag::ITEM,
                    UnexpectedTagSnafu {
                        tag,
                        position: self.position - 8
                    }
                );
                items.push(self.read_one_item(len)?);
            }
            if self.position != end {
                warn!(
                    "sequence content ended at position {}, expected {}",
                    self.position, end
                );
            }
        }
        Ok(items)
    }

    fn read_one_item(&mut self, declared_len: u32) -> Result<Item> {
        let offset = self.position;
        let list = if declared_len == UNDEFINED_LENGTH {
            self.read_item_until_delimiter()?
        } else {
            self.read_item_exact(declared_len)?
        };
        Ok(Item::with_offset(list, offset))
    }

    fn read_item_until_delimiter(&mut self) -> Result<AttributeList> {
        let mut list = AttributeList::new();
        loop {
            self.check_cancel()?;
            let tag = self.read_tag()?;
            if tag == Tag::ITEM_DELIMITER {
                let len = self.read_u32()?;
                if len != 0 {
                    warn!("item delimiter declares length {}", len);
                }
                break;
            }
            ensure!(
                !tag.is_structural(),
                UnexpectedTagSnafu {
                    tag,
                    position: self.position - 4
                }
            );
            let attribute = self.read_element_body(tag)?;
            list.put(attribute);
        }
        Ok(list)
    }

    fn read_item_exact(&mut self, declared_len: u32) -> Result<AttributeList> {
        let end = self.position + u64::from(declared_len);
        let mut list = AttributeList::new();
        while self.position < end {
            self.check_cancel()?;
            let tag = self.read_tag()?;
            ensure!(
                !tag.is_structural(),
                UnexpectedTagSnafu {
                    tag,
                    position: self.position - 4
                }
            );
            let attribute = self.read_element_body(tag)?;
            list.put(attribute);
        }
        if self.position != end {
            warn!(
                "item content ended at position {}, expected {}",
                self.position, end
            );
        }
        Ok(list)
    }

    // ---- raw input -----------------------------------------------------

    fn check_cancel(&self) -> Result<()> {
        if let Some(flag) = &self.options.cancel {
            ensure!(!flag.load(Ordering::Relaxed), CancelledSnafu);
        }
        Ok(())
    }

    /// Read a tag, or report a clean end of input when the stream ends
    /// exactly on an element boundary.
    fn try_read_tag(&mut self) -> Result<Option<Tag>> {
        let mut buf = [0u8; 4];
        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .source
                .read(&mut buf[filled..])
                .context(IoSnafu)?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream ended inside an element tag",
                ))
                .context(IoSnafu);
            }
            filled += n;
        }
        self.position += 4;
        Ok(Some(self.tag_from(buf)))
    }

    fn read_tag(&mut self) -> Result<Tag> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(self.tag_from(buf))
    }

    fn tag_from(&self, buf: [u8; 4]) -> Tag {
        let (group, element) = match self.syntax.endianness() {
            byteordered::Endianness::Little => (
                u16::from_le_bytes([buf[0], buf[1]]),
                u16::from_le_bytes([buf[2], buf[3]]),
            ),
            byteordered::Endianness::Big => (
                u16::from_be_bytes([buf[0], buf[1]]),
                u16::from_be_bytes([buf[2], buf[3]]),
            ),
        };
        Tag(group, element)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.source.read_exact(buf).context(IoSnafu)?;
        self.position += buf.len() as u64;
        Ok(())
    }

    fn read_u16(&mut self) -> Result<u16> {
        let v = ByteOrdered::runtime(&mut self.source, self.syntax.endianness())
            .read_u16()
            .context(IoSnafu)?;
        self.position += 2;
        Ok(v)
    }

    fn read_i16(&mut self) -> Result<i16> {
        let v = ByteOrdered::runtime(&mut self.source, self.syntax.endianness())
            .read_i16()
            .context(IoSnafu)?;
        self.position += 2;
        Ok(v)
    }

    fn read_u32(&mut self) -> Result<u32> {
        let v = ByteOrdered::runtime(&mut self.source, self.syntax.endianness())
            .read_u32()
            .context(IoSnafu)?;
        self.position += 4;
        Ok(v)
    }

    fn read_i32(&mut self) -> Result<i32> {
        let v = ByteOrdered::runtime(&mut self.source, self.syntax.endianness())
            .read_i32()
            .context(IoSnafu)?;
        self.position += 4;
        Ok(v)
    }

    fn read_f32(&mut self) -> Result<f32> {
        let v = ByteOrdered::runtime(&mut self.source, self.syntax.endianness())
            .read_f32()
            .context(IoSnafu)?;
        self.position += 4;
        Ok(v)
    }

    fn read_f64(&mut self) -> Result<f64> {
        let v = ByteOrdered::runtime(&mut self.source, self.syntax.endianness())
            .read_f64()
            .context(IoSnafu)?;
        self.position += 8;
        Ok(v)
    }

    fn skip(&mut self, len: u32) -> Result<()> {
        let copied = io::copy(
            &mut (&mut self.source).take(u64::from(len)),
            &mut io::sink(),
        )
        .context(IoSnafu)?;
        self.position += copied;
        if copied != u64::from(len) {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream ended inside a skipped value",
            ))
            .context(IoSnafu);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;

    #[test]
    fn empty_input_is_an_empty_list() {
        let mut decoder = Decoder::new(&[][..], TransferSyntax::EXPLICIT_LE);
        let list = decoder.read_list().unwrap();
        assert!(list.is_empty());
        assert_eq!(decoder.position(), 0);
    }

    #[test]
    fn input_ending_inside_a_tag_is_premature_eof() {
        let bytes: &[u8] = &[0x08, 0x00];
        let err = Decoder::new(bytes, TransferSyntax::EXPLICIT_LE)
            .read_list()
            .unwrap_err();
        assert!(matches!(err, CodecError::Io { .. }));
    }

    #[test]
    fn input_ending_inside_a_value_is_premature_eof() {
        let bytes: &[u8] = &[0x08, 0x00, 0x60, 0x00, b'C', b'S', 0x04, 0x00, b'C'];
        let err = Decoder::new(bytes, TransferSyntax::EXPLICIT_LE)
            .read_list()
            .unwrap_err();
        assert!(matches!(err, CodecError::Io { .. }));
    }

    #[test]
    fn stray_delimiter_at_top_level_ends_the_pass() {
        #[rustfmt::skip]
        let bytes: &[u8] = &[
            0x08, 0x00, 0x60, 0x00, b'C', b'S', 0x02, 0x00, b'C', b'T',
            0xFE, 0xFF, 0xDD, 0xE0, 0x00, 0x00, 0x00, 0x00,
        ];
        let list = Decoder::new(bytes, TransferSyntax::EXPLICIT_LE)
            .read_list()
            .unwrap();
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn item_header_with_a_foreign_tag_is_rejected() {
        #[rustfmt::skip]
        let bytes: &[u8] = &[
            0x08, 0x00, 0x15, 0x11,     // (0008,1115)
            b'S', b'Q', 0x00, 0x00,     // VR: SQ, reserved
            0xFF, 0xFF, 0xFF, 0xFF,     // length: undefined
            0x08, 0x00, 0x60, 0x00,     // not an item tag
            0x02, 0x00, 0x00, 0x00,
        ];
        let err = Decoder::new(bytes, TransferSyntax::EXPLICIT_LE)
            .read_list()
            .unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnexpectedTag {
                tag: Tag(0x0008, 0x0060),
                ..
            }
        ));
    }
}
