//! BER encoding types (identifier and length octets)

use asnkit_core::{Asn1Error, Asn1Result, Tag, TagClass, TagEncoding};
use bytes::{BufMut, BytesMut};
use std::fmt;

/// End-of-contents octets closing an indefinite-length value
pub const END_OF_CONTENTS: [u8; 2] = [0x00, 0x00];

/// Identifier octets of a TLV
///
/// # Encoding Format
///
/// Low tag numbers (0-30):
/// ```text
/// Bits: 8 7 6 5 4 3 2 1
///       C C P T T T T T
/// ```
///
/// High tag numbers (31 and above):
/// ```text
/// First byte:      C C P 1 1 1 1 1
/// Following bytes: 1 T T T T T T T ... 0 T T T T T T T
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BerTag {
    class: TagClass,
    constructed: bool,
    number: u32,
}

impl BerTag {
    pub fn new(class: TagClass, constructed: bool, number: u32) -> Self {
        Self {
            class,
            constructed,
            number,
        }
    }

    pub fn universal(constructed: bool, number: u32) -> Self {
        Self::new(TagClass::Universal, constructed, number)
    }

    pub fn context_specific(constructed: bool, number: u32) -> Self {
        Self::new(TagClass::ContextSpecific, constructed, number)
    }

    pub fn class(&self) -> TagClass {
        self.class
    }

    pub fn is_constructed(&self) -> bool {
        self.constructed
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    /// The tag without the constructed flag
    pub fn tag(&self) -> Tag {
        Tag::new(self.class, self.number)
    }

    pub fn encoding(&self) -> TagEncoding {
        TagEncoding::new(self.tag(), self.constructed)
    }

    /// `true` for the first octet of an end-of-contents marker
    pub fn is_end_of_contents(&self) -> bool {
        self.class == TagClass::Universal && !self.constructed && self.number == 0
    }

    /// Append the identifier octets to `out`
    pub fn encode(&self, out: &mut BytesMut) {
        let leading = self.class.to_bits() | if self.constructed { 0x20 } else { 0x00 };
        if self.number < 31 {
            out.put_u8(leading | self.number as u8);
            return;
        }
        out.put_u8(leading | 0x1F);
        out.put_slice(&base128(u64::from(self.number)));
    }

    /// Decode identifier octets
    ///
    /// # Returns
    /// Returns `Ok((BerTag, bytes_consumed))` if successful
    ///
    /// # Error Handling
    /// Returns error if:
    /// - Buffer is too short
    /// - The high tag number form has a leading zero group or overflows
    /// - `strict` is set and the high form carries a number below 31
    pub fn decode(data: &[u8], strict: bool) -> Asn1Result<(Self, usize)> {
        let first = *data
            .first()
            .ok_or_else(|| Asn1Error::Decoding("Empty buffer for tag decoding".to_string()))?;
        let class = TagClass::from_bits(first);
        let constructed = first & 0x20 != 0;
        if first & 0x1F != 0x1F {
            return Ok((Self::new(class, constructed, u32::from(first & 0x1F)), 1));
        }

        let mut number = 0u32;
        let mut position = 1;
        loop {
            let byte = *data.get(position).ok_or_else(|| {
                Asn1Error::Decoding("Incomplete high tag number encoding".to_string())
            })?;
            if position == 1 && byte == 0x80 {
                return Err(Asn1Error::Decoding(
                    "High tag number starts with a zero group".to_string(),
                ));
            }
            number = number
                .checked_mul(128)
                .map(|n| n | u32::from(byte & 0x7F))
                .ok_or_else(|| Asn1Error::Decoding("Tag number too large".to_string()))?;
            position += 1;
            if byte & 0x80 == 0 {
                break;
            }
        }
        if strict && number < 31 {
            return Err(Asn1Error::Decoding(format!(
                "Tag number {} uses the high tag number form",
                number
            )));
        }
        Ok((Self::new(class, constructed, number), position))
    }
}

impl From<TagEncoding> for BerTag {
    fn from(encoding: TagEncoding) -> Self {
        Self::new(encoding.tag.class, encoding.constructed, encoding.tag.number)
    }
}

impl fmt::Display for BerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.encoding().fmt(f)
    }
}

/// Length octets of a TLV
///
/// # Encoding Format
///
/// Short form, lengths 0-127: `0 L L L L L L L`
///
/// Long form: `1 N N N N N N N` followed by N big-endian length octets
///
/// Indefinite form (constructed values, BER only): `0x80`, with the contents
/// terminated by [`END_OF_CONTENTS`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BerLength {
    Definite(usize),
    Indefinite,
}

impl BerLength {
    pub fn new(length: usize) -> Self {
        BerLength::Definite(length)
    }

    /// Length of a definite form; `None` when indefinite
    pub fn value(&self) -> Option<usize> {
        match self {
            BerLength::Definite(length) => Some(*length),
            BerLength::Indefinite => None,
        }
    }

    /// Append the length octets in their minimal form
    pub fn encode(&self, out: &mut BytesMut) {
        match *self {
            BerLength::Indefinite => out.put_u8(0x80),
            BerLength::Definite(length) if length < 128 => out.put_u8(length as u8),
            BerLength::Definite(length) => {
                let bytes = length.to_be_bytes();
                let skip = bytes.iter().take_while(|b| **b == 0).count();
                out.put_u8(0x80 | (bytes.len() - skip) as u8);
                out.put_slice(&bytes[skip..]);
            }
        }
    }

    /// Decode length octets
    ///
    /// # Returns
    /// Returns `Ok((BerLength, bytes_consumed))` if successful
    ///
    /// # Error Handling
    /// Returns error if:
    /// - Buffer is too short
    /// - The reserved value `0xFF` is used
    /// - The length does not fit a `usize`
    /// - `strict` is set and the long form is not minimal
    pub fn decode(data: &[u8], strict: bool) -> Asn1Result<(Self, usize)> {
        let first = *data
            .first()
            .ok_or_else(|| Asn1Error::Decoding("Empty buffer for length decoding".to_string()))?;
        if first & 0x80 == 0 {
            return Ok((BerLength::Definite(usize::from(first)), 1));
        }
        let count = usize::from(first & 0x7F);
        match count {
            0 => return Ok((BerLength::Indefinite, 1)),
            0x7F => {
                return Err(Asn1Error::Decoding(
                    "Reserved length octet 0xFF".to_string(),
                ));
            }
            n if n > std::mem::size_of::<usize>() => {
                return Err(Asn1Error::Decoding(format!(
                    "Length encoding too large: {} bytes",
                    n
                )));
            }
            _ => {}
        }
        let octets = data.get(1..1 + count).ok_or_else(|| {
            Asn1Error::Decoding(format!(
                "Buffer too short for long form length: need {} bytes, got {}",
                1 + count,
                data.len()
            ))
        })?;
        let length = octets
            .iter()
            .fold(0usize, |acc, byte| (acc << 8) | usize::from(*byte));
        if strict && (octets[0] == 0 || length < 128) {
            return Err(Asn1Error::Decoding(format!(
                "Length {} is not in its minimal form",
                length
            )));
        }
        Ok((BerLength::Definite(length), 1 + count))
    }
}

/// Base-128 groups, most significant first, continuation bit on all but the last
pub(crate) fn base128(mut value: u64) -> Vec<u8> {
    let mut groups = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        groups.push(0x80 | (value & 0x7F) as u8);
        value >>= 7;
    }
    groups.reverse();
    groups
}
