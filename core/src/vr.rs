//! Value representations and their fixed encoding metadata.
//!
//! Every VR maps statically to a length-field form, and binary VRs
//! additionally map to a fixed element width. The dispatch is exhaustive
//! on purpose: an unrecognized code must be rejected outright, since
//! guessing the wrong length-field width would desynchronize the rest
//! of the stream.

use std::fmt;
use std::str::{from_utf8, FromStr};

/// An enum type for a value representation.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone, Ord, PartialOrd)]
pub enum VR {
    /// Application Entity
    AE,
    /// Age String
    AS,
    /// Attribute Tag
    AT,
    /// Code String
    CS,
    /// Date
    DA,
    /// Decimal String
    DS,
    /// Date Time
    DT,
    /// Floating Point Double
    FD,
    /// Floating Point Single
    FL,
    /// Integer String
    IS,
    /// Long String
    LO,
    /// Long Text
    LT,
    /// Other Byte
    OB,
    /// Other Word
    OW,
    /// Person Name
    PN,
    /// Short String
    SH,
    /// Signed Long
    SL,
    /// Sequence of Items
    SQ,
    /// Signed Short
    SS,
    /// Short Text
    ST,
    /// Time
    TM,
    /// Unique Identifier
    UI,
    /// Unsigned Long
    UL,
    /// Unknown
    UN,
    /// Unsigned Short
    US,
    /// Unlimited Text
    UT,
}

/// The width of the value-length field following a VR
/// in an explicit-VR stream.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone)]
pub enum LengthForm {
    /// A 16-bit length field immediately after the VR code.
    Short,
    /// Two reserved bytes, then a 32-bit length field.
    Long,
}

impl VR {
    /// Obtain the value representation corresponding to the given two bytes.
    /// Each byte should represent an alphabetic character in upper case.
    pub fn from_bytes(chars: [u8; 2]) -> Option<Self> {
        from_utf8(chars.as_ref())
            .ok()
            .and_then(|s| VR::from_str(s).ok())
    }

    /// Retrieve a string representation of this VR.
    pub fn as_str(self) -> &'static str {
        use VR::*;
        match self {
            AE => "AE",
            AS => "AS",
            AT => "AT",
            CS => "CS",
            DA => "DA",
            DS => "DS",
            DT => "DT",
            FD => "FD",
            FL => "FL",
            IS => "IS",
            LO => "LO",
            LT => "LT",
            OB => "OB",
            OW => "OW",
            PN => "PN",
            SH => "SH",
            SL => "SL",
            SQ => "SQ",
            SS => "SS",
            ST => "ST",
            TM => "TM",
            UI => "UI",
            UL => "UL",
            UN => "UN",
            US => "US",
            UT => "UT",
        }
    }

    /// Retrieve a copy of this VR's byte representation.
    /// The function returns two alphabetic characters in upper case.
    pub fn to_bytes(self) -> [u8; 2] {
        let bytes = self.as_str().as_bytes();
        [bytes[0], bytes[1]]
    }

    /// The width of the value-length field carried by this VR
    /// in an explicit-VR stream.
    pub fn length_form(self) -> LengthForm {
        use VR::*;
        match self {
            AE | AS | AT | CS | DA | DS | DT | FD | FL | IS | LO | LT | PN | SH | SL | SS
            | ST | TM | UI | UL | US => LengthForm::Short,
            OB | OW | SQ | UN | UT => LengthForm::Long,
        }
    }

    /// The fixed byte width of one value element, for binary VRs.
    pub fn element_width(self) -> Option<u32> {
        use VR::*;
        match self {
            OB | UN => Some(1),
            OW | SS | US => Some(2),
            AT | FL | SL | UL => Some(4),
            FD => Some(8),
            _ => None,
        }
    }

    /// Whether values of this VR are encoded as backslash-delimited text.
    pub fn is_text(self) -> bool {
        use VR::*;
        matches!(
            self,
            AE | AS | CS | DA | DS | DT | IS | LO | LT | PN | SH | ST | TM | UI | UT
        )
    }

    /// Whether this VR holds numbers in text form.
    pub fn is_numeric_text(self) -> bool {
        matches!(self, VR::DS | VR::IS)
    }

    /// The byte used to pad an odd-length value to even length.
    /// Visible text is space-padded; UIDs and binary values take a NUL byte.
    pub fn padding_byte(self) -> u8 {
        if self.is_text() && self != VR::UI {
            b' '
        } else {
            0x00
        }
    }

    /// The maximum encoded byte length of a single value,
    /// for the VRs which define one.
    pub fn max_value_len(self) -> Option<u32> {
        use VR::*;
        match self {
            AS => Some(4),
            DA => Some(8),
            IS => Some(12),
            AE | CS | DS | SH | TM => Some(16),
            DT => Some(26),
            LO | UI => Some(64),
            ST => Some(1024),
            LT => Some(10240),
            _ => None,
        }
    }
}

/// Obtain the value representation corresponding to the given string.
/// The string should hold exactly two UTF-8 encoded alphabetic characters
/// in upper case, otherwise no match is made.
impl FromStr for VR {
    type Err = &'static str;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        use VR::*;
        match string {
            "AE" => Ok(AE),
            "AS" => Ok(AS),
            "AT" => Ok(AT),
            "CS" => Ok(CS),
            "DA" => Ok(DA),
            "DS" => Ok(DS),
            "DT" => Ok(DT),
            "FD" => Ok(FD),
            "FL" => Ok(FL),
            "IS" => Ok(IS),
            "LO" => Ok(LO),
            "LT" => Ok(LT),
            "OB" => Ok(OB),
            "OW" => Ok(OW),
            "PN" => Ok(PN),
            "SH" => Ok(SH),
            "SL" => Ok(SL),
            "SQ" => Ok(SQ),
            "SS" => Ok(SS),
            "ST" => Ok(ST),
            "TM" => Ok(TM),
            "UI" => Ok(UI),
            "UL" => Ok(UL),
            "UN" => Ok(UN),
            "US" => Ok(US),
            "UT" => Ok(UT),
            _ => Err("no such value representation"),
        }
    }
}

impl fmt::Display for VR {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
