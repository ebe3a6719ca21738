//! Element tags: the (group, element) pair which identifies an attribute
//! in a data set, plus the reserved tags used to delimit sequence content.

use std::fmt;
use std::str::FromStr;

/// Idiomatic alias for a tag's group number.
pub type GroupNumber = u16;
/// Idiomatic alias for a tag's element number.
pub type ElementNumber = u16;

/// The identifying pair of an attribute.
///
/// Tags are totally ordered by group and then by element,
/// which is also the canonical serialization order of an attribute list.
/// `(u16, u16)` and `[u16; 2]` can be converted to this type at no cost.
#[derive(PartialEq, Eq, Hash, PartialOrd, Ord, Clone, Copy)]
pub struct Tag(pub GroupNumber, pub ElementNumber);

impl Tag {
    /// The tag which opens one item in a sequence.
    pub const ITEM: Tag = Tag(0xFFFE, 0xE000);
    /// The tag which closes an undefined-length item.
    pub const ITEM_DELIMITER: Tag = Tag(0xFFFE, 0xE00D);
    /// The tag which closes an undefined-length sequence.
    pub const SEQUENCE_DELIMITER: Tag = Tag(0xFFFE, 0xE0DD);

    /// Getter for the tag's group value.
    #[inline]
    pub fn group(self) -> GroupNumber {
        self.0
    }

    /// Getter for the tag's element value.
    #[inline]
    pub fn element(self) -> ElementNumber {
        self.1
    }

    /// Whether this is one of the three reserved structural tags
    /// (item, item delimiter, sequence delimiter).
    #[inline]
    pub fn is_structural(self) -> bool {
        matches!(self, Tag::ITEM | Tag::ITEM_DELIMITER | Tag::SEQUENCE_DELIMITER)
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Tag({:#06X?}, {:#06X?})", self.0, self.1)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({:04X},{:04X})", self.0, self.1)
    }
}

impl PartialEq<(u16, u16)> for Tag {
    fn eq(&self, other: &(u16, u16)) -> bool {
        self.0 == other.0 && self.1 == other.1
    }
}

impl PartialEq<[u16; 2]> for Tag {
    fn eq(&self, other: &[u16; 2]) -> bool {
        self.0 == other[0] && self.1 == other[1]
    }
}

impl From<(u16, u16)> for Tag {
    #[inline]
    fn from(value: (u16, u16)) -> Tag {
        Tag(value.0, value.1)
    }
}

impl From<[u16; 2]> for Tag {
    #[inline]
    fn from(value: [u16; 2]) -> Tag {
        Tag(value[0], value[1])
    }
}

/// Parse a tag from the textual forms `GGGG,EEEE` or `(GGGG,EEEE)`,
/// with both numbers in hexadecimal.
impl FromStr for Tag {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .unwrap_or(s);
        let (group, element) = s.split_once(',').ok_or("missing `,` separator")?;
        let group =
            u16::from_str_radix(group.trim(), 16).map_err(|_| "invalid group number")?;
        let element =
            u16::from_str_radix(element.trim(), 16).map_err(|_| "invalid element number")?;
        Ok(Tag(group, element))
    }
}
