//! The attribute: one tagged, VR-typed value holder.
//!
//! An attribute never changes its VR after construction. Its value lives
//! in the VR's native container ([`Value`]); typed accessors outside the
//! native family fail loudly with `WrongValueType` instead of coercing,
//! so that data-model bugs in callers surface instead of hiding behind
//! empty defaults. Validation of widths and numeric ranges happens at
//! mutation time, not at write time.

use std::fmt;
use std::path::PathBuf;

use byteordered::Endianness;
use num_traits::NumCast;
use snafu::ResultExt;

use crate::error::{
    IoSnafu, MalformedLengthSnafu, OutOfRangeSnafu, Result, WrongValueTypeSnafu,
};
use crate::tag::Tag;
use crate::value::{format_decimal, C, DeferredValue, Item, Value};
use crate::vr::VR;
use crate::UNDEFINED_LENGTH;

/// One data element: tag, value representation, and value(s).
#[derive(Debug, Clone)]
pub struct Attribute {
    tag: Tag,
    vr: VR,
    /// The unpadded value length in bytes, as encoded. Odd lengths can
    /// occur when decoding; writing always pads to even. Sequences carry
    /// the undefined-length sentinel instead of a byte count.
    len: u32,
    value: Value,
}

fn native_container(vr: VR) -> Value {
    match vr {
        VR::OB | VR::UN => Value::Bytes(Vec::new()),
        VR::OW | VR::US => Value::U16(C::new()),
        VR::SS => Value::I16(C::new()),
        VR::UL => Value::U32(C::new()),
        VR::SL => Value::I32(C::new()),
        VR::FL => Value::F32(C::new()),
        VR::FD => Value::F64(C::new()),
        VR::AT => Value::Tags(C::new()),
        VR::SQ => Value::Sequence(Vec::new()),
        _ => Value::Text(C::new()),
    }
}

impl Attribute {
    /// Create an attribute with no values, ready to be populated through
    /// the typed adders.
    pub fn new(tag: Tag, vr: VR) -> Attribute {
        let len = if vr == VR::SQ { UNDEFINED_LENGTH } else { 0 };
        Attribute {
            tag,
            vr,
            len,
            value: native_container(vr),
        }
    }

    /// Create an empty sequence attribute.
    pub fn new_sequence(tag: Tag) -> Attribute {
        Attribute::new(tag, VR::SQ)
    }

    /// Create a deferred binary attribute whose payload stays on the
    /// given file: `len` bytes at `offset`, stored in `endianness`.
    ///
    /// Only OB and OW support deferral; OW additionally requires an even
    /// length, since its payload is a run of 2-byte words.
    pub fn new_deferred(
        tag: Tag,
        vr: VR,
        path: impl Into<PathBuf>,
        offset: u64,
        len: u32,
        endianness: Endianness,
    ) -> Result<Attribute> {
        let word_width = match vr {
            VR::OB => 1,
            VR::OW => 2,
            _ => {
                return WrongValueTypeSnafu {
                    tag,
                    vr,
                    requested: "deferred binary",
                }
                .fail()
            }
        };
        if len % word_width != 0 {
            return MalformedLengthSnafu {
                tag,
                len,
                width: word_width,
            }
            .fail();
        }
        Ok(Attribute {
            tag,
            vr,
            len,
            value: Value::Deferred(DeferredValue::new(
                path.into(),
                offset,
                len,
                endianness,
                word_width,
            )),
        })
    }

    /// Assemble an attribute from already-decoded parts.
    pub(crate) fn from_parts(tag: Tag, vr: VR, len: u32, value: Value) -> Attribute {
        Attribute {
            tag,
            vr,
            len,
            value,
        }
    }

    /// The identifying tag.
    #[inline]
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// The value representation, fixed at construction.
    #[inline]
    pub fn vr(&self) -> VR {
        self.vr
    }

    /// The unpadded value length in bytes, as encoded.
    /// Sequences report the undefined-length sentinel.
    #[inline]
    pub fn value_length(&self) -> u32 {
        self.len
    }

    /// The value length rounded up to even, which is what goes on the
    /// wire. Identity for even lengths and for the undefined sentinel.
    #[inline]
    pub fn padded_value_length(&self) -> u32 {
        if self.len == UNDEFINED_LENGTH {
            UNDEFINED_LENGTH
        } else {
            self.len + (self.len & 1)
        }
    }

    /// The number of discrete values held.
    pub fn value_multiplicity(&self) -> u32 {
        self.value.multiplicity()
    }

    /// Whether the attribute holds no values.
    pub fn is_empty(&self) -> bool {
        self.value_multiplicity() == 0
    }

    /// Direct access to the native value container.
    pub fn value(&self) -> &Value {
        &self.value
    }

    fn wrong_type<T>(&self, requested: &'static str) -> Result<T> {
        WrongValueTypeSnafu {
            tag: self.tag,
            vr: self.vr,
            requested,
        }
        .fail()
    }

    fn out_of_range<T>(&self, reason: String) -> Result<T> {
        OutOfRangeSnafu {
            tag: self.tag,
            reason,
        }
        .fail()
    }

    // ---- typed getters -------------------------------------------------

    /// The logical text values, stripped of trailing padding.
    pub fn string_values(&self) -> Result<Vec<String>> {
        match &self.value {
            Value::Text(v) => Ok(v.to_vec()),
            _ => self.wrong_type("string"),
        }
    }

    /// The text values, with numeric-text values (Decimal String,
    /// Integer String) re-rendered through the caller's number format.
    /// Non-numeric text VRs return their values unchanged.
    pub fn string_values_formatted(
        &self,
        format: impl Fn(f64) -> String,
    ) -> Result<Vec<String>> {
        match &self.value {
            Value::Text(v) if self.vr.is_numeric_text() => v
                .iter()
                .map(|s| match s.trim().parse::<f64>() {
                    Ok(n) => Ok(format(n)),
                    Err(_) => self.out_of_range(format!("`{}` is not numeric text", s)),
                })
                .collect(),
            Value::Text(v) => Ok(v.to_vec()),
            _ => self.wrong_type("string"),
        }
    }

    /// The raw byte values. Native to byte-valued attributes; a deferred
    /// attribute reads its payload from the backing file on every call
    /// (in the source byte order) and never caches it.
    pub fn byte_values(&self) -> Result<Vec<u8>> {
        match &self.value {
            Value::Bytes(v) => Ok(v.clone()),
            Value::Deferred(d) => d.read_payload().context(IoSnafu),
            _ => self.wrong_type("byte"),
        }
    }

    /// The values as signed 16-bit integers. See [`Self::long_values`].
    pub fn short_values(&self) -> Result<Vec<i16>> {
        self.numeric_values("short")
    }

    /// The values as signed 32-bit integers. See [`Self::long_values`].
    pub fn int_values(&self) -> Result<Vec<i32>> {
        self.numeric_values("int")
    }

    /// The values as signed 64-bit integers.
    ///
    /// Native to the binary numeric VRs, with checked per-value widening
    /// or narrowing; a stored value which does not fit the requested
    /// width is `OutOfRange`. Integer String and Decimal String parse
    /// their stored text.
    pub fn long_values(&self) -> Result<Vec<i64>> {
        self.numeric_values("long")
    }

    /// The values as single-precision floats. See [`Self::long_values`].
    pub fn float_values(&self) -> Result<Vec<f32>> {
        self.numeric_values("float")
    }

    /// The values as double-precision floats. See [`Self::long_values`].
    pub fn double_values(&self) -> Result<Vec<f64>> {
        self.numeric_values("double")
    }

    /// The values as attribute tags. Native to AT attributes only.
    pub fn tag_values(&self) -> Result<Vec<Tag>> {
        match &self.value {
            Value::Tags(v) => Ok(v.to_vec()),
            _ => self.wrong_type("attribute tag"),
        }
    }

    /// The items of a sequence attribute.
    pub fn items(&self) -> Result<&[Item]> {
        match &self.value {
            Value::Sequence(items) => Ok(items),
            _ => self.wrong_type("sequence item"),
        }
    }

    /// Mutable access to the items of a sequence attribute.
    pub fn items_mut(&mut self) -> Result<&mut Vec<Item>> {
        let tag = self.tag;
        let vr = self.vr;
        match &mut self.value {
            Value::Sequence(items) => Ok(items),
            _ => WrongValueTypeSnafu {
                tag,
                vr,
                requested: "sequence item",
            }
            .fail(),
        }
    }

    /// The deferred payload descriptor, for on-disk attributes.
    pub fn deferred_value(&self) -> Result<&DeferredValue> {
        match &self.value {
            Value::Deferred(d) => Ok(d),
            _ => self.wrong_type("deferred binary"),
        }
    }

    /// Mutable deferred payload descriptor, used to repoint the backing
    /// file after relocation (see [`DeferredValue::set_file`]).
    pub fn deferred_value_mut(&mut self) -> Result<&mut DeferredValue> {
        let tag = self.tag;
        let vr = self.vr;
        match &mut self.value {
            Value::Deferred(d) => Ok(d),
            _ => WrongValueTypeSnafu {
                tag,
                vr,
                requested: "deferred binary",
            }
            .fail(),
        }
    }

    fn numeric_values<T: NumCast>(&self, requested: &'static str) -> Result<Vec<T>> {
        fn cast_all<F, T>(
            attr: &Attribute,
            requested: &'static str,
            values: impl Iterator<Item = F>,
        ) -> Result<Vec<T>>
        where
            F: Copy + fmt::Display,
            T: NumCast,
            f64: From<F>,
        {
            values
                .map(|v| {
                    NumCast::from(<f64 as From<F>>::from(v)).ok_or_else(|| {
                        OutOfRangeSnafu {
                            tag: attr.tag,
                            reason: format!("stored value {} does not fit in {}", v, requested),
                        }
                        .build()
                    })
                })
                .collect()
        }

        match &self.value {
            Value::Bytes(v) => cast_all(self, requested, v.iter().copied()),
            Value::U16(v) => cast_all(self, requested, v.iter().copied()),
            Value::I16(v) => cast_all(self, requested, v.iter().copied()),
            Value::U32(v) => cast_all(self, requested, v.iter().copied()),
            Value::I32(v) => cast_all(self, requested, v.iter().copied()),
            Value::F32(v) => cast_all(self, requested, v.iter().copied()),
            Value::F64(v) => v
                .iter()
                .map(|&x| {
                    NumCast::from(x).ok_or_else(|| {
                        OutOfRangeSnafu {
                            tag: self.tag,
                            reason: format!("stored value {} does not fit in {}", x, requested),
                        }
                        .build()
                    })
                })
                .collect(),
            Value::Text(v) if self.vr.is_numeric_text() => v
                .iter()
                .map(|s| {
                    let n: f64 = s.trim().parse().map_err(|_| {
                        OutOfRangeSnafu {
                            tag: self.tag,
                            reason: format!("`{}` is not numeric text", s),
                        }
                        .build()
                    })?;
                    NumCast::from(n).ok_or_else(|| {
                        OutOfRangeSnafu {
                            tag: self.tag,
                            reason: format!("value {} does not fit in {}", n, requested),
                        }
                        .build()
                    })
                })
                .collect(),
            _ => self.wrong_type(requested),
        }
    }

    // ---- lenient single-value accessors --------------------------------

    /// The first string value, or the given default on any failure
    /// (wrong type, no values). Never fails.
    pub fn single_string_value_or(&self, default: &str) -> String {
        self.string_values()
            .ok()
            .and_then(|v| v.into_iter().next())
            .unwrap_or_else(|| default.to_owned())
    }

    /// The first value as an `i32`, or the given default on any failure.
    pub fn single_int_value_or(&self, default: i32) -> i32 {
        self.int_values()
            .ok()
            .and_then(|v| v.first().copied())
            .unwrap_or(default)
    }

    /// The first value as an `i64`, or the given default on any failure.
    pub fn single_long_value_or(&self, default: i64) -> i64 {
        self.long_values()
            .ok()
            .and_then(|v| v.first().copied())
            .unwrap_or(default)
    }

    /// The first value as an `f64`, or the given default on any failure.
    pub fn single_double_value_or(&self, default: f64) -> f64 {
        self.double_values()
            .ok()
            .and_then(|v| v.first().copied())
            .unwrap_or(default)
    }

    // ---- typed adders and setters --------------------------------------

    /// Discard all values, leaving the attribute empty.
    /// A deferred attribute reverts to an in-memory container.
    pub fn remove_values(&mut self) {
        self.value = native_container(self.vr);
        self.len = if self.vr == VR::SQ { UNDEFINED_LENGTH } else { 0 };
    }

    /// Append one text value. Valid for text VRs only; width limits and
    /// the numeric constraints of Integer/Decimal String are checked
    /// here, at the call site.
    pub fn add_string(&mut self, value: impl Into<String>) -> Result<()> {
        if !self.vr.is_text() {
            return self.wrong_type("string");
        }
        let s = value.into();
        self.validate_text(&s)?;
        match &mut self.value {
            Value::Text(v) => v.push(s),
            _ => unreachable!("text VR holds a text container"),
        }
        self.recompute_len();
        Ok(())
    }

    /// Append one integer value.
    ///
    /// Binary numeric VRs range-check the value against their element
    /// width; Integer String enforces its 12-byte/`i32` budget; Decimal
    /// String re-renders through a width-bounded formatter. Out-of-range
    /// values fail with `OutOfRange`, never silent truncation.
    pub fn add_int(&mut self, value: i64) -> Result<()> {
        match self.vr {
            VR::DS => {
                let rendered = value.to_string();
                let rendered = if rendered.len() <= 16 {
                    rendered
                } else {
                    match format_decimal(value as f64, 16) {
                        Some(s) => s,
                        None => {
                            return self
                                .out_of_range(format!("{} cannot be rendered in 16 bytes", value))
                        }
                    }
                };
                self.add_string(rendered)
            }
            vr if vr.is_text() => self.add_string(value.to_string()),
            VR::US => self.push_numeric(value, "unsigned short", |v: &mut Value, x| match v {
                Value::U16(c) => c.push(x),
                _ => unreachable!(),
            }),
            VR::OW => self.push_numeric(value, "word", |v: &mut Value, x| match v {
                Value::U16(c) => c.push(x),
                _ => unreachable!(),
            }),
            VR::SS => self.push_numeric(value, "signed short", |v: &mut Value, x| match v {
                Value::I16(c) => c.push(x),
                _ => unreachable!(),
            }),
            VR::UL => self.push_numeric(value, "unsigned long", |v: &mut Value, x| match v {
                Value::U32(c) => c.push(x),
                _ => unreachable!(),
            }),
            VR::SL => self.push_numeric(value, "signed long", |v: &mut Value, x| match v {
                Value::I32(c) => c.push(x),
                _ => unreachable!(),
            }),
            VR::FL => self.push_numeric(value, "float", |v: &mut Value, x| match v {
                Value::F32(c) => c.push(x),
                _ => unreachable!(),
            }),
            VR::FD => self.push_numeric(value, "double", |v: &mut Value, x| match v {
                Value::F64(c) => c.push(x),
                _ => unreachable!(),
            }),
            VR::OB | VR::UN => self.push_numeric(value, "byte", |v: &mut Value, x| match v {
                Value::Bytes(c) => c.push(x),
                _ => unreachable!(),
            }),
            _ => self.wrong_type("integer"),
        }
    }

    /// Append one single-precision float value. See [`Self::add_double`].
    pub fn add_float(&mut self, value: f32) -> Result<()> {
        self.add_double(<f64 as From<f32>>::from(value))
    }

    /// Append one double-precision float value.
    ///
    /// Decimal String renders through a minimal-precision formatter
    /// guaranteed to fit its 16-byte budget; Integer String and the
    /// binary integer VRs require the value to be integral and in range,
    /// failing with `OutOfRange` otherwise.
    pub fn add_double(&mut self, value: f64) -> Result<()> {
        match self.vr {
            VR::FD => {
                match &mut self.value {
                    Value::F64(c) => c.push(value),
                    _ => unreachable!(),
                }
                self.recompute_len();
                Ok(())
            }
            VR::FL => {
                let narrowed = value as f32;
                if narrowed.is_finite() != value.is_finite() {
                    return self.out_of_range(format!("{} overflows a 32-bit float", value));
                }
                match &mut self.value {
                    Value::F32(c) => c.push(narrowed),
                    _ => unreachable!(),
                }
                self.recompute_len();
                Ok(())
            }
            VR::DS => match format_decimal(value, 16) {
                Some(s) => self.add_string(s),
                None => self.out_of_range(format!("{} cannot be rendered in 16 bytes", value)),
            },
            vr if vr.is_text() || vr.element_width().is_some() => {
                if value.fract() != 0.0 {
                    return self
                        .out_of_range(format!("{} is not an integral value for {}", value, vr));
                }
                let as_int: i64 = match NumCast::from(value) {
                    Some(v) => v,
                    None => {
                        return self
                            .out_of_range(format!("{} does not fit in a 64-bit integer", value))
                    }
                };
                self.add_int(as_int)
            }
            _ => self.wrong_type("double"),
        }
    }

    /// Append one tag value. Valid for AT attributes only.
    pub fn add_tag(&mut self, value: Tag) -> Result<()> {
        match &mut self.value {
            Value::Tags(v) => {
                v.push(value);
                self.recompute_len();
                Ok(())
            }
            _ => self.wrong_type("attribute tag"),
        }
    }

    /// Append one item to a sequence attribute.
    pub fn add_item(&mut self, item: impl Into<Item>) -> Result<()> {
        match &mut self.value {
            Value::Sequence(items) => {
                items.push(item.into());
                Ok(())
            }
            _ => self.wrong_type("sequence item"),
        }
    }

    /// Append raw bytes to a byte-valued attribute.
    pub fn add_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        match &mut self.value {
            Value::Bytes(v) => {
                v.extend_from_slice(bytes);
                self.recompute_len();
                Ok(())
            }
            _ => self.wrong_type("byte"),
        }
    }

    /// Replace all values with the given text values.
    pub fn set_strings<I, S>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.remove_values();
        for v in values {
            self.add_string(v)?;
        }
        Ok(())
    }

    /// Replace all values with the given integers.
    pub fn set_ints(&mut self, values: &[i64]) -> Result<()> {
        self.remove_values();
        for &v in values {
            self.add_int(v)?;
        }
        Ok(())
    }

    /// Replace all values with the given doubles.
    pub fn set_doubles(&mut self, values: &[f64]) -> Result<()> {
        self.remove_values();
        for &v in values {
            self.add_double(v)?;
        }
        Ok(())
    }

    /// Replace the whole payload of a byte-valued attribute.
    pub fn set_bytes(&mut self, bytes: Vec<u8>) -> Result<()> {
        match &mut self.value {
            Value::Bytes(v) => {
                *v = bytes;
                self.recompute_len();
                Ok(())
            }
            _ => self.wrong_type("byte"),
        }
    }

    /// Replace all values with the given tags.
    pub fn set_tags(&mut self, values: &[Tag]) -> Result<()> {
        self.remove_values();
        for &v in values {
            self.add_tag(v)?;
        }
        Ok(())
    }

    // ---- internals -----------------------------------------------------

    fn push_numeric<T: NumCast>(
        &mut self,
        value: i64,
        kind: &'static str,
        push: impl FnOnce(&mut Value, T),
    ) -> Result<()> {
        let narrowed: T = match NumCast::from(value) {
            Some(v) => v,
            None => return self.out_of_range(format!("{} does not fit in {}", value, kind)),
        };
        push(&mut self.value, narrowed);
        self.recompute_len();
        Ok(())
    }

    fn validate_text(&self, s: &str) -> Result<()> {
        if let Some(max) = self.vr.max_value_len() {
            if s.len() as u32 > max {
                return self.out_of_range(format!(
                    "`{}` is {} bytes, over the {}-byte limit of {}",
                    s,
                    s.len(),
                    max,
                    self.vr
                ));
            }
        }
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(());
        }
        match self.vr {
            VR::IS => match trimmed.parse::<i64>() {
                Ok(n) if i32::try_from(n).is_ok() => Ok(()),
                Ok(n) => self.out_of_range(format!("{} is outside the Integer String range", n)),
                Err(_) => self.out_of_range(format!("`{}` is not a decimal integer", s)),
            },
            VR::DS if trimmed.parse::<f64>().is_err() => {
                self.out_of_range(format!("`{}` is not a decimal number", s))
            }
            _ => Ok(()),
        }
    }

    fn recompute_len(&mut self) {
        self.len = match &self.value {
            Value::Text(v) => {
                if v.is_empty() {
                    0
                } else {
                    v.iter().map(|s| s.len() as u32).sum::<u32>() + v.len() as u32 - 1
                }
            }
            Value::Bytes(v) => v.len() as u32,
            Value::U16(v) => 2 * v.len() as u32,
            Value::I16(v) => 2 * v.len() as u32,
            Value::U32(v) => 4 * v.len() as u32,
            Value::I32(v) => 4 * v.len() as u32,
            Value::F32(v) => 4 * v.len() as u32,
            Value::F64(v) => 8 * v.len() as u32,
            Value::Tags(v) => 4 * v.len() as u32,
            Value::Sequence(_) => UNDEFINED_LENGTH,
            Value::Deferred(d) => d.len(),
        };
    }
}

/// Equality disregards the as-encoded length bookkeeping: two attributes
/// are equal when tag, VR and logical values match. (Decoding keeps the
/// possibly-padded source length, which would otherwise distinguish a
/// decoded attribute from an equal programmatically built one.)
impl PartialEq for Attribute {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && self.vr == other.vr && self.value == other.value
    }
}

impl fmt::Display for Attribute {
    /// A compact one-line rendering: tag, VR, multiplicity, length,
    /// and an abbreviated value preview.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} #{} ",
            self.tag,
            self.vr,
            self.value_multiplicity()
        )?;
        if self.len == UNDEFINED_LENGTH {
            write!(f, "(u/l)")?;
        } else {
            write!(f, "{}", self.len)?;
        }
        const PREVIEW: usize = 4;
        match &self.value {
            Value::Text(v) => {
                let shown: Vec<&str> = v.iter().take(PREVIEW).map(String::as_str).collect();
                write!(f, " [{}]", shown.join("\\"))?;
                if v.len() > PREVIEW {
                    write!(f, "…")?;
                }
            }
            Value::Bytes(v) => write!(f, " <{} bytes>", v.len())?,
            Value::U16(v) => preview_numbers(f, v.iter())?,
            Value::I16(v) => preview_numbers(f, v.iter())?,
            Value::U32(v) => preview_numbers(f, v.iter())?,
            Value::I32(v) => preview_numbers(f, v.iter())?,
            Value::F32(v) => preview_numbers(f, v.iter())?,
            Value::F64(v) => preview_numbers(f, v.iter())?,
            Value::Tags(v) => preview_numbers(f, v.iter())?,
            Value::Sequence(items) => write!(f, " (sequence, {} items)", items.len())?,
            Value::Deferred(d) => {
                write!(f, " (deferred, {} bytes at offset {})", d.len(), d.offset())?
            }
        }
        Ok(())
    }
}

fn preview_numbers<T: fmt::Display>(
    f: &mut fmt::Formatter,
    values: impl ExactSizeIterator<Item = T>,
) -> fmt::Result {
    let total = values.len();
    let shown: Vec<String> = values.take(4).map(|v| v.to_string()).collect();
    write!(f, " [{}]", shown.join("\\"))?;
    if total > 4 {
        write!(f, "…")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;

    #[test]
    fn attribute_keeps_its_vr_and_tag() {
        let a = Attribute::new(Tag(0x0008, 0x0060), VR::CS);
        assert_eq!(a.tag(), Tag(0x0008, 0x0060));
        assert_eq!(a.vr(), VR::CS);
        assert!(a.is_empty());
        assert_eq!(a.value_length(), 0);
    }

    #[test]
    fn string_getter_outside_family_fails_loudly() {
        let mut a = Attribute::new(Tag(0x0028, 0x0010), VR::US);
        a.add_int(512).unwrap();
        let err = a.string_values().unwrap_err();
        assert!(matches!(err, CodecError::WrongValueType { .. }));
        assert!(err.is_caller_bug());
        // and the other direction
        let mut b = Attribute::new(Tag(0x0008, 0x0060), VR::CS);
        b.add_string("MR").unwrap();
        assert!(matches!(
            b.int_values(),
            Err(CodecError::WrongValueType { .. })
        ));
    }

    #[test]
    fn numeric_getters_widen_with_checks() {
        let mut a = Attribute::new(Tag(0x0028, 0x0102), VR::UL);
        a.add_int(1).unwrap();
        a.add_int(4_000_000_000).unwrap();
        assert_eq!(a.long_values().unwrap(), vec![1, 4_000_000_000]);
        assert_eq!(a.double_values().unwrap(), vec![1.0, 4.0e9]);
        // 4e9 does not fit in an i32
        assert!(matches!(a.int_values(), Err(CodecError::OutOfRange { .. })));
        assert_eq!(a.value_length(), 8);
        assert_eq!(a.value_multiplicity(), 2);
    }

    #[test]
    fn integer_string_budget() {
        let mut a = Attribute::new(Tag(0x0020, 0x0013), VR::IS);
        a.add_int(<i64 as From<i32>>::from(i32::MAX)).unwrap();
        assert_eq!(a.string_values().unwrap(), vec!["2147483647"]);
        assert!(a.value_length() <= 12);

        assert!(matches!(
            a.add_int(<i64 as From<i32>>::from(i32::MAX) + 1),
            Err(CodecError::OutOfRange { .. })
        ));
        assert!(matches!(
            a.add_double(i64::MAX as f64),
            Err(CodecError::OutOfRange { .. })
        ));
        assert!(matches!(
            a.add_string("12.5"),
            Err(CodecError::OutOfRange { .. })
        ));

        let mut b = Attribute::new(Tag(0x0020, 0x0013), VR::IS);
        b.add_int(<i64 as From<i32>>::from(i32::MIN)).unwrap();
        assert_eq!(b.int_values().unwrap(), vec![i32::MIN]);
    }

    #[test]
    fn decimal_string_renders_within_budget() {
        let mut a = Attribute::new(Tag(0x0018, 0x0050), VR::DS);
        a.add_double(0.25).unwrap();
        a.add_double(1.0e300).unwrap();
        a.add_int(123_456_789_012_345_678).unwrap();
        for v in a.string_values().unwrap() {
            assert!(v.len() <= 16, "`{}` over budget", v);
        }
        let back = a.double_values().unwrap();
        assert_eq!(back[0], 0.25);
        assert_eq!(back[1], 1.0e300);
    }

    #[test]
    fn set_is_remove_then_add() {
        let mut a = Attribute::new(Tag(0x0008, 0x0008), VR::CS);
        a.set_strings(["ORIGINAL", "PRIMARY"]).unwrap();
        assert_eq!(a.value_multiplicity(), 2);
        assert_eq!(a.value_length(), 16);
        a.set_strings(["DERIVED"]).unwrap();
        assert_eq!(a.string_values().unwrap(), vec!["DERIVED"]);
    }

    #[test]
    fn padded_length_is_even_and_covers_value() {
        let mut a = Attribute::new(Tag(0x0008, 0x0060), VR::CS);
        a.add_string("CT").unwrap();
        a.add_string("PET").unwrap();
        // "CT\PET" is 6 bytes, "CT\PETS" would be 7
        assert_eq!(a.value_length(), 6);
        a.remove_values();
        a.add_string("ABD").unwrap();
        assert_eq!(a.value_length(), 3);
        assert_eq!(a.padded_value_length(), 4);
        assert_eq!(a.padded_value_length() % 2, 0);
        assert!(a.padded_value_length() >= a.value_length());
    }

    #[test]
    fn tag_values_native_to_at() {
        let mut a = Attribute::new(Tag(0x0028, 0x0009), VR::AT);
        a.add_tag(Tag(0x0018, 0x1063)).unwrap();
        assert_eq!(a.tag_values().unwrap(), vec![Tag(0x0018, 0x1063)]);
        assert_eq!(a.value_length(), 4);
        assert!(matches!(
            a.long_values(),
            Err(CodecError::WrongValueType { .. })
        ));
    }

    #[test]
    fn lenient_accessors_never_fail() {
        let mut a = Attribute::new(Tag(0x0028, 0x0010), VR::US);
        a.add_int(512).unwrap();
        assert_eq!(a.single_int_value_or(0), 512);
        assert_eq!(a.single_string_value_or("none"), "none");
        assert_eq!(a.single_double_value_or(-1.0), 512.0);

        let empty = Attribute::new(Tag(0x0028, 0x0011), VR::US);
        assert_eq!(empty.single_int_value_or(7), 7);
    }

    #[test]
    fn text_width_limits_enforced_at_add_time() {
        let mut a = Attribute::new(Tag(0x0008, 0x0050), VR::SH);
        assert!(matches!(
            a.add_string("A".repeat(17)),
            Err(CodecError::OutOfRange { .. })
        ));
        assert!(a.is_empty());
        a.add_string("A".repeat(16)).unwrap();
        assert_eq!(a.value_multiplicity(), 1);
    }

    #[test]
    fn binary_adders_reject_out_of_range() {
        let mut a = Attribute::new(Tag(0x0028, 0x0100), VR::US);
        assert!(matches!(
            a.add_int(65536),
            Err(CodecError::OutOfRange { .. })
        ));
        assert!(matches!(
            a.add_int(-1),
            Err(CodecError::OutOfRange { .. })
        ));
        a.add_int(65535).unwrap();
        assert_eq!(a.long_values().unwrap(), vec![65535]);
        assert!(matches!(
            a.add_double(1.5),
            Err(CodecError::OutOfRange { .. })
        ));
    }

    #[test]
    fn numeric_text_can_be_reformatted() {
        let mut a = Attribute::new(Tag(0x0018, 0x0050), VR::DS);
        a.set_strings(["2.5", "0.125"]).unwrap();
        let rendered = a
            .string_values_formatted(|v| format!("{:.1}", v))
            .unwrap();
        assert_eq!(rendered, vec!["2.5", "0.1"]);
        // non-numeric text passes through unchanged
        let mut b = Attribute::new(Tag(0x0008, 0x0060), VR::CS);
        b.add_string("CT").unwrap();
        assert_eq!(
            b.string_values_formatted(|v| v.to_string()).unwrap(),
            vec!["CT"]
        );
    }

    #[test]
    fn sequences_report_undefined_length() {
        let a = Attribute::new_sequence(Tag(0x0008, 0x1115));
        assert_eq!(a.value_length(), UNDEFINED_LENGTH);
        assert_eq!(a.value_multiplicity(), 0);
        assert!(matches!(
            a.string_values(),
            Err(CodecError::WrongValueType { .. })
        ));
    }
}
