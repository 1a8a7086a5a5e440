//! BER content decoding
//!
//! [`BerDecoder`] walks the TLVs of a byte buffer; the `*_value` functions
//! decode the content octets of each primitive type family. `strict`
//! arguments select the DER checks.
//!
//! # Usage Example
//!
//! ```rust
//! use asnkit_ber::config::CodecConfig;
//! use asnkit_ber::decoder::{integer_value, BerDecoder};
//!
//! let data = [0x02, 0x02, 0x30, 0x39];
//! let mut decoder = BerDecoder::new(&data, &CodecConfig::der());
//! let tlv = decoder.decode_tlv().unwrap();
//! assert_eq!(integer_value(tlv.content, true).unwrap(), 12345);
//! ```

use crate::config::CodecConfig;
use crate::types::{BerLength, BerTag, END_OF_CONTENTS};
use asnkit_core::value::real::scale_by_power_of_two;
use asnkit_core::{
    Asn1Error, Asn1Result, BitString, ObjectIdentifier, RealValue, TimeKind, TimeValue,
};

/// One decoded TLV
///
/// For an indefinite-length value `content` holds the nested TLVs without
/// the closing end-of-contents octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
    pub tag: BerTag,
    pub content: &'a [u8],
    pub indefinite: bool,
}

/// BER decoder over a byte buffer
///
/// # Position Tracking
///
/// The decoder keeps a position that advances as TLVs are decoded, so
/// the components of a constructed value are read one after another from
/// its content octets.
#[derive(Debug, Clone)]
pub struct BerDecoder<'a> {
    buffer: &'a [u8],
    position: usize,
    strict: bool,
    allow_indefinite: bool,
    max_depth: usize,
}

impl<'a> BerDecoder<'a> {
    pub fn new(buffer: &'a [u8], config: &CodecConfig) -> Self {
        Self {
            buffer,
            position: 0,
            strict: config.is_der(),
            allow_indefinite: config.allow_indefinite_length(),
            max_depth: config.max_depth(),
        }
    }

    /// Decoder over the content octets of a constructed value
    pub fn nested(&self, content: &'a [u8]) -> Self {
        Self {
            buffer: content,
            position: 0,
            ..self.clone()
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    pub fn has_remaining(&self) -> bool {
        self.position < self.buffer.len()
    }

    /// Identifier of the next TLV without consuming it
    pub fn peek_tag(&self) -> Asn1Result<Option<BerTag>> {
        if !self.has_remaining() {
            return Ok(None);
        }
        BerTag::decode(&self.buffer[self.position..], self.strict).map(|(tag, _)| Some(tag))
    }

    fn read_bytes(&mut self, count: usize) -> Asn1Result<&'a [u8]> {
        let end = self
            .position
            .checked_add(count)
            .filter(|end| *end <= self.buffer.len())
            .ok_or_else(|| {
                Asn1Error::Decoding(format!(
                    "Buffer exhausted: need {} bytes, have {}",
                    count,
                    self.remaining()
                ))
            })?;
        let bytes = &self.buffer[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    /// Decode the next TLV
    ///
    /// # Decoding Process
    /// 1. Decode identifier octets
    /// 2. Decode length octets
    /// 3. Take the content octets; for the indefinite form, skip nested
    ///    TLVs up to the end-of-contents marker
    pub fn decode_tlv(&mut self) -> Asn1Result<Tlv<'a>> {
        self.decode_tlv_at(0)
    }

    fn decode_tlv_at(&mut self, depth: usize) -> Asn1Result<Tlv<'a>> {
        if depth > self.max_depth {
            return Err(Asn1Error::Decoding(format!(
                "Encoding nests deeper than {} levels",
                self.max_depth
            )));
        }
        let (tag, tag_len) = BerTag::decode(&self.buffer[self.position..], self.strict)?;
        self.position += tag_len;
        let (length, length_len) =
            BerLength::decode(&self.buffer[self.position..], self.strict)?;
        self.position += length_len;

        match length {
            BerLength::Definite(length) => {
                let content = self.read_bytes(length)?;
                log::trace!("TLV {} with {} content octets", tag, length);
                Ok(Tlv {
                    tag,
                    content,
                    indefinite: false,
                })
            }
            BerLength::Indefinite => {
                if !self.allow_indefinite {
                    return Err(Asn1Error::Decoding(format!(
                        "Indefinite length for {} is not allowed",
                        tag
                    )));
                }
                if !tag.is_constructed() {
                    return Err(Asn1Error::Decoding(format!(
                        "Primitive {} uses the indefinite length form",
                        tag
                    )));
                }
                let start = self.position;
                loop {
                    if self.buffer[self.position..].starts_with(&END_OF_CONTENTS) {
                        let content = &self.buffer[start..self.position];
                        self.position += END_OF_CONTENTS.len();
                        log::trace!("TLV {} with indefinite length", tag);
                        return Ok(Tlv {
                            tag,
                            content,
                            indefinite: true,
                        });
                    }
                    if !self.has_remaining() {
                        return Err(Asn1Error::Decoding(format!(
                            "Missing end-of-contents for {}",
                            tag
                        )));
                    }
                    self.decode_tlv_at(depth + 1)?;
                }
            }
        }
    }

    /// Decode every remaining TLV
    pub fn decode_all(&mut self) -> Asn1Result<Vec<Tlv<'a>>> {
        let mut tlvs = Vec::new();
        while self.has_remaining() {
            tlvs.push(self.decode_tlv()?);
        }
        Ok(tlvs)
    }
}

/// Two's complement INTEGER content
///
/// Values are held as `i64`, so content longer than eight octets (large
/// serial numbers, for instance) is a `Decoding` error rather than being
/// truncated.
pub fn integer_value(content: &[u8], strict: bool) -> Asn1Result<i64> {
    let (&first, _) = content
        .split_first()
        .ok_or_else(|| Asn1Error::Decoding("Empty integer encoding".to_string()))?;
    if content.len() > 8 {
        return Err(Asn1Error::Decoding(format!(
            "Integer too large: {} bytes (max 8)",
            content.len()
        )));
    }
    if strict && content.len() > 1 {
        let second = content[1];
        if (first == 0x00 && second & 0x80 == 0) || (first == 0xFF && second & 0x80 != 0) {
            return Err(Asn1Error::Decoding(
                "Integer is not in its minimal form".to_string(),
            ));
        }
    }
    let seed: i64 = if first & 0x80 != 0 { -1 } else { 0 };
    Ok(content
        .iter()
        .fold(seed, |acc, byte| (acc << 8) | i64::from(*byte)))
}

/// BOOLEAN content; DER only accepts `0x00` and `0xFF`
pub fn boolean_value(content: &[u8], strict: bool) -> Asn1Result<bool> {
    match content {
        [0x00] => Ok(false),
        [0xFF] => Ok(true),
        [_] if !strict => Ok(true),
        [other] => Err(Asn1Error::Decoding(format!(
            "BOOLEAN octet {:#04x} is not canonical",
            other
        ))),
        _ => Err(Asn1Error::Decoding(format!(
            "BOOLEAN content must be one octet, got {}",
            content.len()
        ))),
    }
}

pub fn null_value(content: &[u8]) -> Asn1Result<()> {
    if content.is_empty() {
        Ok(())
    } else {
        Err(Asn1Error::Decoding("NULL content must be empty".to_string()))
    }
}

/// REAL content (X.690 8.5)
///
/// Accepts the binary form with bases 2, 8 and 16, any scale factor and all
/// exponent formats, the special values, and the decimal NR1/NR2/NR3 forms.
/// DER only accepts base 2 with scale factor 0, an odd mantissa and NR3.
pub fn real_value(content: &[u8], strict: bool) -> Asn1Result<RealValue> {
    let Some((&first, rest)) = content.split_first() else {
        return Ok(RealValue::new(0.0));
    };
    if first & 0x80 != 0 {
        return binary_real(first, rest, strict);
    }
    if first & 0x40 != 0 {
        if !rest.is_empty() {
            return Err(Asn1Error::Decoding(
                "Special REAL value with trailing octets".to_string(),
            ));
        }
        return match first {
            0x40 => Ok(RealValue::PLUS_INFINITY),
            0x41 => Ok(RealValue::MINUS_INFINITY),
            0x42 => Ok(RealValue::new(f64::NAN)),
            0x43 => Ok(RealValue::new(-0.0)),
            other => Err(Asn1Error::Decoding(format!(
                "Reserved special REAL value {:#04x}",
                other
            ))),
        };
    }

    let form = first & 0x3F;
    match form {
        1..=3 => {}
        other => {
            return Err(Asn1Error::Decoding(format!(
                "Unknown decimal REAL form {}",
                other
            )));
        }
    }
    if strict && form != 3 {
        return Err(Asn1Error::Decoding(format!(
            "DER requires the NR3 form, got NR{}",
            form
        )));
    }
    let text = std::str::from_utf8(rest)
        .map_err(|e| Asn1Error::Decoding(format!("Decimal REAL is not text: {}", e)))?;
    RealValue::from_decimal_str(text)
        .map_err(|e| Asn1Error::Decoding(format!("Invalid NR{} REAL: {}", form, e)))
}

fn binary_real(first: u8, rest: &[u8], strict: bool) -> Asn1Result<RealValue> {
    let negative = first & 0x40 != 0;
    let bits_per_digit: i64 = match (first >> 4) & 0x03 {
        0 => 1,
        1 => 3,
        2 => 4,
        _ => return Err(Asn1Error::Decoding("Reserved REAL base".to_string())),
    };
    let scale = i64::from((first >> 2) & 0x03);
    let (exponent_len, rest) = match first & 0x03 {
        0 => (1, rest),
        1 => (2, rest),
        2 => (3, rest),
        _ => {
            let (&count, rest) = rest.split_first().ok_or_else(|| {
                Asn1Error::Decoding("REAL exponent length octet missing".to_string())
            })?;
            (usize::from(count), rest)
        }
    };
    if exponent_len == 0 || exponent_len > 8 || rest.len() <= exponent_len {
        return Err(Asn1Error::Decoding(
            "REAL exponent or mantissa is truncated".to_string(),
        ));
    }
    let (exponent, mantissa) = rest.split_at(exponent_len);
    let exponent = integer_value(exponent, false)?;
    if strict {
        let odd = mantissa.last().is_some_and(|last| last & 1 == 1);
        if bits_per_digit != 1 || scale != 0 || !odd {
            return Err(Asn1Error::Decoding(
                "DER REAL must use base 2, scale 0 and an odd mantissa".to_string(),
            ));
        }
    }
    let magnitude = mantissa
        .iter()
        .fold(0f64, |acc, byte| acc * 256.0 + f64::from(*byte));
    let power = exponent
        .checked_mul(bits_per_digit)
        .and_then(|p| p.checked_add(scale))
        .ok_or_else(|| Asn1Error::Decoding("REAL exponent overflow".to_string()))?;
    let value = scale_by_power_of_two(magnitude, power);
    Ok(RealValue::new(if negative { -value } else { value }))
}

/// OBJECT IDENTIFIER content
pub fn oid_value(content: &[u8]) -> Asn1Result<ObjectIdentifier> {
    if content.is_empty() {
        return Err(Asn1Error::Decoding(
            "Empty object identifier encoding".to_string(),
        ));
    }
    let mut subidentifiers = Vec::new();
    let mut current = 0u64;
    let mut fresh = true;
    for &byte in content {
        if fresh && byte == 0x80 {
            return Err(Asn1Error::Decoding(
                "OID subidentifier starts with a zero group".to_string(),
            ));
        }
        current = current
            .checked_mul(128)
            .map(|c| c | u64::from(byte & 0x7F))
            .ok_or_else(|| Asn1Error::Decoding("OID component overflow".to_string()))?;
        fresh = byte & 0x80 == 0;
        if fresh {
            subidentifiers.push(current);
            current = 0;
        }
    }
    if !fresh {
        return Err(Asn1Error::Decoding(
            "Truncated OID subidentifier".to_string(),
        ));
    }
    ObjectIdentifier::from_subidentifiers(&subidentifiers)
}

/// BIT STRING content; DER requires the unused bits to be zero
pub fn bit_string_value(content: &[u8], strict: bool) -> Asn1Result<BitString> {
    let (&unused, bits) = content
        .split_first()
        .ok_or_else(|| Asn1Error::Decoding("Empty bit string encoding".to_string()))?;
    if unused > 7 || (bits.is_empty() && unused != 0) {
        return Err(Asn1Error::Decoding(format!(
            "Invalid unused bits: {} (must be 0-7, 0 when empty)",
            unused
        )));
    }
    let num_bits = bits.len() * 8 - usize::from(unused);
    let value = BitString::new(bits.to_vec(), num_bits)?;
    if strict && value.as_bytes() != bits {
        return Err(Asn1Error::Decoding(
            "Unused bits of a DER bit string must be zero".to_string(),
        ));
    }
    Ok(value)
}

/// Content of the 7-bit and UTF-8 string families
pub fn utf8_value(content: &[u8]) -> Asn1Result<String> {
    String::from_utf8(content.to_vec())
        .map_err(|e| Asn1Error::Decoding(format!("Invalid UTF-8 string: {}", e)))
}

/// BMPString content: UCS-2 big-endian
pub fn bmp_value(content: &[u8]) -> Asn1Result<String> {
    if content.len() % 2 != 0 {
        return Err(Asn1Error::Decoding(
            "BMPString content has an odd length".to_string(),
        ));
    }
    content
        .chunks_exact(2)
        .map(|pair| {
            let code = u16::from_be_bytes([pair[0], pair[1]]);
            char::from_u32(u32::from(code)).ok_or_else(|| {
                Asn1Error::Decoding(format!("{:#06x} is not a BMP character", code))
            })
        })
        .collect()
}

/// Time content; DER requires the canonical pattern
pub fn time_value(kind: TimeKind, content: &[u8], strict: bool) -> Asn1Result<TimeValue> {
    let text = std::str::from_utf8(content)
        .map_err(|e| Asn1Error::Decoding(format!("{} is not text: {}", kind, e)))?;
    kind.parse(text, strict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{integer_content, oid_content, real_content, BerEncoder};

    #[test]
    fn test_decode_tlvs() {
        let mut encoder = BerEncoder::new();
        encoder.encode_integer(12345);
        encoder.encode_octet_string(b"Hello");
        let encoded = encoder.into_bytes();

        let mut decoder = BerDecoder::new(&encoded, &CodecConfig::der());
        let first = decoder.decode_tlv().unwrap();
        assert_eq!(first.tag, BerTag::universal(false, 2));
        assert_eq!(integer_value(first.content, true).unwrap(), 12345);
        let second = decoder.decode_tlv().unwrap();
        assert_eq!(second.content, b"Hello");
        assert!(!decoder.has_remaining());
        assert!(decoder.decode_tlv().is_err());
    }

    #[test]
    fn test_indefinite_length() {
        let data = [0x30, 0x80, 0x02, 0x01, 0x05, 0x30, 0x80, 0x00, 0x00, 0x00, 0x00];
        let mut decoder = BerDecoder::new(&data, &CodecConfig::ber());
        let tlv = decoder.decode_tlv().unwrap();
        assert!(tlv.indefinite);
        assert_eq!(tlv.content, &data[2..9]);
        assert!(!decoder.has_remaining());

        let mut der = BerDecoder::new(&data, &CodecConfig::der());
        assert!(der.decode_tlv().is_err());

        let unterminated = [0x30, 0x80, 0x02, 0x01, 0x05];
        assert!(BerDecoder::new(&unterminated, &CodecConfig::ber())
            .decode_tlv()
            .is_err());
    }

    #[test]
    fn test_integer_value() {
        for value in [0, 1, -1, 127, 128, -128, -129, 65535, i64::MIN, i64::MAX] {
            assert_eq!(integer_value(&integer_content(value), true).unwrap(), value);
        }
        assert_eq!(integer_value(&[0x00, 0x05], false).unwrap(), 5);
        assert!(integer_value(&[0x00, 0x05], true).is_err());
        assert!(integer_value(&[], false).is_err());
        // nine octets do not fit an i64
        let serial = [0x00, 0x80, 0, 0, 0, 0, 0, 0, 0x01];
        assert!(matches!(integer_value(&serial, false), Err(Asn1Error::Decoding(_))));
    }

    #[test]
    fn test_boolean_value() {
        assert!(boolean_value(&[0xFF], true).unwrap());
        assert!(!boolean_value(&[0x00], true).unwrap());
        assert!(boolean_value(&[0x01], false).unwrap());
        assert!(boolean_value(&[0x01], true).is_err());
        assert!(boolean_value(&[], false).is_err());
    }

    #[test]
    fn test_real_bases() {
        // 1 * 8^1 = 8
        assert_eq!(real_value(&[0x90, 0x01, 0x01], false).unwrap(), RealValue::new(8.0));
        // 1 * 16^-1 = 0.0625
        assert_eq!(real_value(&[0xA0, 0xFF, 0x01], false).unwrap(), RealValue::new(0.0625));
        // -(3 * 2^1) * 2^2 = -24, scale factor 1
        assert_eq!(
            real_value(&[0xC4, 0x02, 0x03], false).unwrap(),
            RealValue::new(-24.0)
        );
        // two-octet exponent format
        assert_eq!(
            real_value(&[0x81, 0x00, 0x02, 0x01], false).unwrap(),
            RealValue::new(4.0)
        );
        assert!(real_value(&[0x90, 0x01, 0x01], true).is_err());
    }

    #[test]
    fn test_real_decimal_forms() {
        let mut nr1 = vec![0x01];
        nr1.extend_from_slice(b"  42");
        assert_eq!(real_value(&nr1, false).unwrap(), RealValue::new(42.0));
        let mut nr2 = vec![0x02];
        nr2.extend_from_slice(b"4,5");
        assert_eq!(real_value(&nr2, false).unwrap(), RealValue::new(4.5));
        assert!(real_value(&nr2, true).is_err());
        let mut nr3 = vec![0x03];
        nr3.extend_from_slice(b"5.E2");
        let decoded = real_value(&nr3, true).unwrap();
        assert_eq!(decoded, RealValue::new(500.0));
        assert!(decoded.is_decimal());
    }

    #[test]
    fn test_real_round_trip() {
        for v in [0.0, -0.0, 1.0, -2.5, 0.15625, 1e300, 5e-324, f64::INFINITY] {
            let value = RealValue::new(v);
            let decoded = real_value(&real_content(&value).unwrap(), true).unwrap();
            assert_eq!(decoded, value);
        }
        let nan = real_value(&real_content(&RealValue::new(f64::NAN)).unwrap(), true).unwrap();
        assert!(nan.value().is_nan());
    }

    #[test]
    fn test_oid_value() {
        let oid: ObjectIdentifier = "2.999.3".parse().unwrap();
        assert_eq!(oid_value(&oid_content(&oid).unwrap()).unwrap(), oid);
        assert!(oid_value(&[]).is_err());
        assert!(oid_value(&[0x2A, 0x86]).is_err());
        assert!(oid_value(&[0x2A, 0x80, 0x01]).is_err());
    }

    #[test]
    fn test_bit_string_value() {
        let bits = bit_string_value(&[0x05, 0xA0], true).unwrap();
        assert_eq!(bits, BitString::from_binary_literal("101").unwrap());
        assert!(bit_string_value(&[0x05, 0xA1], true).is_err());
        assert_eq!(bit_string_value(&[0x05, 0xA1], false).unwrap(), bits);
        assert!(bit_string_value(&[0x01], false).is_err());
        assert_eq!(bit_string_value(&[0x00], true).unwrap().num_bits(), 0);
    }

    #[test]
    fn test_string_values() {
        assert_eq!(bmp_value(&[0x00, 0x41, 0x00, 0x7A]).unwrap(), "Az");
        assert!(bmp_value(&[0x00]).is_err());
        assert!(bmp_value(&[0xD8, 0x00]).is_err());
        assert!(utf8_value(&[0xC3]).is_err());
    }

    #[test]
    fn test_real_extreme_exponents() {
        let huge = [0x83, 0x08, 0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        assert_eq!(real_value(&huge, false).unwrap(), RealValue::PLUS_INFINITY);
        let tiny = [0x83, 0x08, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01];
        assert!(real_value(&tiny, false).unwrap().is_plus_zero());
        let negative_tiny = [0xC3, 0x08, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01];
        assert!(real_value(&negative_tiny, false).unwrap().is_minus_zero());
        // base 16 multiplies the exponent by four
        let overflow = [0xA3, 0x08, 0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        assert!(matches!(real_value(&overflow, false), Err(Asn1Error::Decoding(_))));
        // nine exponent octets
        let long = [0x83, 0x09, 0x01, 0, 0, 0, 0, 0, 0, 0, 0, 0x01];
        assert!(real_value(&long, false).is_err());
        assert!(real_value(&[0x83], false).is_err());
        assert!(real_value(&[0x80, 0x01], false).is_err());
    }

    #[test]
    fn test_time_value_rejects_malformed_content() {
        let zone = "9105062345+\u{0966}\u{0967}00";
        assert!(time_value(TimeKind::UtcTime, zone.as_bytes(), false).is_err());
        let general = "19910506234540+\u{0966}\u{0967}00";
        assert!(time_value(TimeKind::GeneralizedTime, general.as_bytes(), false).is_err());
        assert!(time_value(TimeKind::UtcTime, b"9105062345+01", false).is_err());
        assert!(time_value(TimeKind::UtcTime, &[0x39, 0x31, 0xFF], false).is_err());
        assert!(time_value(TimeKind::UtcTime, b"", false).is_err());
        // DER wants UTC with seconds
        assert!(time_value(TimeKind::UtcTime, b"9105062345Z", true).is_err());
        assert!(time_value(TimeKind::UtcTime, b"910506234540Z", true).is_ok());
    }
}
