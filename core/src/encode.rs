//! The streaming encoder: the mirror of the decoder. A list writes its
//! attributes in tag order; each attribute writes its own tag/VR/length
//! preamble and then its value bytes, padded to even length.
//!
//! Sequences are always emitted in the undefined-length form, closed by
//! an explicit sequence-delimiter element: the true encoded length of a
//! nested data set is not knowable without a full pre-pass, and the
//! format defines the delimiter convention precisely to avoid one.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use byteordered::ByteOrdered;
use snafu::{ensure, ResultExt};

use crate::attribute::Attribute;
use crate::error::{CancelledSnafu, IoSnafu, OutOfRangeSnafu, Result};
use crate::list::AttributeList;
use crate::syntax::TransferSyntax;
use crate::tag::Tag;
use crate::value::{DeferredValue, Item, Value};
use crate::vr::{LengthForm, VR};
use crate::UNDEFINED_LENGTH;

const COPY_BUF_LEN: usize = 8192;

/// A stateful encoder bound to one byte sink.
pub struct Encoder<W> {
    to: W,
    syntax: TransferSyntax,
    cancel: Option<Arc<AtomicBool>>,
}

impl<W> std::fmt::Debug for Encoder<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Encoder")
            .field("syntax", &self.syntax)
            .field("cancellable", &self.cancel.is_some())
            .finish_non_exhaustive()
    }
}

impl<W: Write> Encoder<W> {
    /// Create an encoder over the given sink and transfer syntax.
    pub fn new(to: W, syntax: TransferSyntax) -> Self {
        Encoder {
            to,
            syntax,
            cancel: None,
        }
    }

    /// Attach a cooperative cancellation flag, checked between elements.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Recover the underlying sink.
    pub fn into_inner(self) -> W {
        self.to
    }

    /// Write every attribute of the list, in tag order.
    pub fn write_list(&mut self, list: &AttributeList) -> Result<()> {
        for attribute in list {
            self.check_cancel()?;
            attribute.write(self)?;
        }
        Ok(())
    }

    // ---- element encoding ----------------------------------------------

    fn write_primitive(&mut self, attribute: &Attribute) -> Result<()> {
        // lengths are derived from the live container, not from the
        // as-decoded length: stripping text padding on decode may have
        // shortened the logical value
        let (unpadded, payload) = match attribute.value() {
            Value::Text(values) => {
                let joined = values.join("\\");
                (joined.len() as u32, Some(joined.into_bytes()))
            }
            _ => (attribute.value_length(), None),
        };
        let padded = unpadded + (unpadded & 1);
        self.write_header(attribute.tag(), attribute.vr(), padded)?;

        match attribute.value() {
            Value::Text(_) => {
                let payload = payload.expect("text payload was just rendered");
                self.write_all(&payload)?;
            }
            Value::Bytes(v) => self.write_all(v)?,
            Value::U16(v) => {
                for &x in v {
                    self.write_u16(x)?;
                }
            }
            Value::I16(v) => {
                for &x in v {
                    self.write_i16(x)?;
                }
            }
            Value::U32(v) => {
                for &x in v {
                    self.write_u32(x)?;
                }
            }
            Value::I32(v) => {
                for &x in v {
                    self.write_i32(x)?;
                }
            }
            Value::F32(v) => {
                for &x in v {
                    self.write_f32(x)?;
                }
            }
            Value::F64(v) => {
                for &x in v {
                    self.write_f64(x)?;
                }
            }
            Value::Tags(v) => {
                for &tag in v {
                    self.write_u16(tag.group())?;
                    self.write_u16(tag.element())?;
                }
            }
            Value::Sequence(_) | Value::Deferred(_) => {
                unreachable!("sequences and deferred values have their own write paths")
            }
        }
        if unpadded & 1 == 1 {
            self.write_all(&[attribute.vr().padding_byte()])?;
        }
        Ok(())
    }

    fn write_sequence(&mut self, tag: Tag, items: &[Item]) -> Result<()> {
        self.write_header(tag, VR::SQ, UNDEFINED_LENGTH)?;
        for item in items {
            self.check_cancel()?;
            self.write_tag(Tag::ITEM)?;
            self.write_u32(UNDEFINED_LENGTH)?;
            self.write_list(item.list())?;
            self.write_tag(Tag::ITEM_DELIMITER)?;
            self.write_u32(0)?;
        }
        self.write_tag(Tag::SEQUENCE_DELIMITER)?;
        self.write_u32(0)?;
        Ok(())
    }

    /// Stream a deferred payload straight from its backing file to the
    /// sink, swapping 2-byte words in flight when a word payload was
    /// stored in the opposite byte order. The payload never goes through
    /// memory as a whole.
    fn write_deferred(&mut self, tag: Tag, vr: VR, deferred: &DeferredValue) -> Result<()> {
        let len = deferred.len();
        self.write_header(tag, vr, len + (len & 1))?;

        let mut file = File::open(deferred.path()).context(IoSnafu)?;
        file.seek(SeekFrom::Start(deferred.offset()))
            .context(IoSnafu)?;
        let mut source = file.take(u64::from(len));

        if deferred.word_width() == 2 && deferred.endianness() != self.syntax.endianness() {
            // word payload, opposite byte order: swap pairs in flight;
            // the length is even by construction
            let mut buf = [0u8; COPY_BUF_LEN];
            let mut remaining = u64::from(len);
            while remaining > 0 {
                let chunk = remaining.min(COPY_BUF_LEN as u64) as usize;
                source
                    .read_exact(&mut buf[..chunk])
                    .context(IoSnafu)?;
                for pair in buf[..chunk].chunks_exact_mut(2) {
                    pair.swap(0, 1);
                }
                self.write_all(&buf[..chunk])?;
                remaining -= chunk as u64;
            }
        } else {
            let copied = io::copy(&mut source, &mut self.to).context(IoSnafu)?;
            if copied != u64::from(len) {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "backing file {} holds {} of {} payload bytes",
                        deferred.path().display(),
                        copied,
                        len
                    ),
                ))
                .context(IoSnafu);
            }
        }

        if len & 1 == 1 {
            self.write_all(&[vr.padding_byte()])?;
        }
        Ok(())
    }

    // ---- preamble fields -----------------------------------------------

    fn write_header(&mut self, tag: Tag, vr: VR, len: u32) -> Result<()> {
        if self.syntax.is_explicit_vr()
            && vr.length_form() == LengthForm::Short
            && len > u32::from(u16::MAX)
        {
            return OutOfRangeSnafu {
                tag,
                reason: format!(
                    "{} value bytes do not fit the 16-bit length field of {}",
                    len, vr
                ),
            }
            .fail();
        }
        self.write_tag(tag)?;
        if self.syntax.is_explicit_vr() {
            self.write_all(&vr.to_bytes())?;
            match vr.length_form() {
                LengthForm::Short => self.write_u16(len as u16)?,
                LengthForm::Long => {
                    self.write_all(&[0u8, 0u8])?;
                    self.write_u32(len)?;
                }
            }
        } else {
            self.write_u32(len)?;
        }
        Ok(())
    }

    fn write_tag(&mut self, tag: Tag) -> Result<()> {
        self.write_u16(tag.group())?;
        self.write_u16(tag.element())
    }

    // ---- raw output ----------------------------------------------------

    fn check_cancel(&self) -> Result<()> {
        if let Some(flag) = &self.cancel {
            ensure!(!flag.load(Ordering::Relaxed), CancelledSnafu);
        }
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.to.write_all(bytes).context(IoSnafu)
    }

    fn write_u16(&mut self, value: u16) -> Result<()> {
        ByteOrdered::runtime(&mut self.to, self.syntax.endianness())
            .write_u16(value)
            .context(IoSnafu)
    }

    fn write_i16(&mut self, value: i16) -> Result<()> {
        ByteOrdered::runtime(&mut self.to, self.syntax.endianness())
            .write_i16(value)
            .context(IoSnafu)
    }

    fn write_u32(&mut self, value: u32) -> Result<()> {
        ByteOrdered::runtime(&mut self.to, self.syntax.endianness())
            .write_u32(value)
            .context(IoSnafu)
    }

    fn write_i32(&mut self, value: i32) -> Result<()> {
        ByteOrdered::runtime(&mut self.to, self.syntax.endianness())
            .write_i32(value)
            .context(IoSnafu)
    }

    fn write_f32(&mut self, value: f32) -> Result<()> {
        ByteOrdered::runtime(&mut self.to, self.syntax.endianness())
            .write_f32(value)
            .context(IoSnafu)
    }

    fn write_f64(&mut self, value: f64) -> Result<()> {
        ByteOrdered::runtime(&mut self.to, self.syntax.endianness())
            .write_f64(value)
            .context(IoSnafu)
    }
}

impl Attribute {
    /// Write this attribute — tag, VR code when the syntax is explicit,
    /// length field, then the padded value — onto the given encoder.
    pub fn write<W: Write>(&self, out: &mut Encoder<W>) -> Result<()> {
        match self.value() {
            Value::Sequence(items) => out.write_sequence(self.tag(), items),
            Value::Deferred(deferred) => out.write_deferred(self.tag(), self.vr(), deferred),
            _ => out.write_primitive(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;

    fn encode_with(list: &AttributeList, syntax: TransferSyntax) -> Vec<u8> {
        let mut out = Vec::new();
        Encoder::new(&mut out, syntax).write_list(list).unwrap();
        out
    }

    #[test]
    fn explicit_le_headers_and_padding() {
        let mut list = AttributeList::new();
        let mut ae = Attribute::new(Tag(0x0008, 0x0054), VR::AE);
        ae.add_string("TITLE").unwrap();
        list.put(ae);
        let mut ob = Attribute::new(Tag(0x7FE0, 0x0010), VR::OB);
        ob.set_bytes(vec![0x42]).unwrap();
        list.put(ob);

        #[rustfmt::skip]
        static GROUND_TRUTH: &[u8] = &[
            0x08, 0x00, 0x54, 0x00,     // (0008,0054)
                b'A', b'E',             // VR: AE
                0x06, 0x00,             // length: 6
                b'T', b'I', b'T', b'L', b'E',
                b' ',                   // padding to make length even
            0xE0, 0x7F, 0x10, 0x00,     // (7FE0,0010)
                b'O', b'B',             // VR: OB
                0x00, 0x00,             // reserved
                0x02, 0x00, 0x00, 0x00, // length: 2
                0x42,
                0x00,                   // padding to make length even
        ];
        assert_eq!(
            encode_with(&list, TransferSyntax::EXPLICIT_LE),
            GROUND_TRUTH
        );
    }

    #[test]
    fn sequences_always_use_the_delimited_form() {
        let mut inner = AttributeList::new();
        let mut us = Attribute::new(Tag(0x0018, 0x6012), VR::US);
        us.add_int(1).unwrap();
        inner.put(us);
        let mut sq = Attribute::new_sequence(Tag(0x0018, 0x6011));
        sq.add_item(Item::new(inner)).unwrap();
        let mut list = AttributeList::new();
        list.put(sq);

        #[rustfmt::skip]
        static GROUND_TRUTH: &[u8] = &[
            0x18, 0x00, 0x11, 0x60, // (0018,6011)
            b'S', b'Q',             // VR
            0x00, 0x00,             // reserved
            0xFF, 0xFF, 0xFF, 0xFF, // length: undefined
            // -- 12 --
            0xFE, 0xFF, 0x00, 0xE0, // item start tag
            0xFF, 0xFF, 0xFF, 0xFF, // item length: undefined
            // -- 20 --
            0x18, 0x00, 0x12, 0x60, b'U', b'S', 0x02, 0x00, 0x01, 0x00,
            // -- 30 --
            0xFE, 0xFF, 0x0D, 0xE0, 0x00, 0x00, 0x00, 0x00, // item end
            // -- 38 --
            0xFE, 0xFF, 0xDD, 0xE0, 0x00, 0x00, 0x00, 0x00, // sequence end
        ];
        assert_eq!(
            encode_with(&list, TransferSyntax::EXPLICIT_LE),
            GROUND_TRUTH
        );
    }

    #[test]
    fn implicit_headers_have_no_vr_code() {
        let mut list = AttributeList::new();
        let mut ui = Attribute::new(Tag(0x0008, 0x0018), VR::UI);
        ui.add_string("1.2.3").unwrap();
        list.put(ui);

        #[rustfmt::skip]
        static GROUND_TRUTH: &[u8] = &[
            0x08, 0x00, 0x18, 0x00,     // (0008,0018)
            0x06, 0x00, 0x00, 0x00,     // length: 6
            b'1', b'.', b'2', b'.', b'3',
            0x00,                       // UIDs pad with NUL, not space
        ];
        assert_eq!(
            encode_with(&list, TransferSyntax::IMPLICIT_LE),
            GROUND_TRUTH
        );
    }

    #[test]
    fn oversized_short_form_values_are_rejected() {
        let mut pn = Attribute::new(Tag(0x0010, 0x0010), VR::PN);
        for _ in 0..2048 {
            pn.add_string("A".repeat(48)).unwrap();
        }
        let mut list = AttributeList::new();
        list.put(pn);

        let mut out = Vec::new();
        let err = Encoder::new(&mut out, TransferSyntax::EXPLICIT_LE)
            .write_list(&list)
            .unwrap_err();
        assert!(matches!(err, CodecError::OutOfRange { .. }));
    }
}
