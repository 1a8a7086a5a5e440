//! BER content encoding
//!
//! [`BerEncoder`] assembles TLV triplets into a buffer. The `*_content`
//! functions produce the content octets of each primitive type family; the
//! typed writer combines them with the identifiers a type's tag chain asks
//! for.
//!
//! # Usage Example
//!
//! ```rust
//! use asnkit_ber::encoder::BerEncoder;
//!
//! let mut encoder = BerEncoder::new();
//! encoder.encode_integer(12345);
//! assert_eq!(&encoder.into_bytes()[..], &[0x02, 0x02, 0x30, 0x39]);
//! ```

use crate::types::{base128, BerLength, BerTag, END_OF_CONTENTS};
use asnkit_core::{
    Asn1Error, Asn1Result, BitString, ObjectIdentifier, RealValue, Tag, TagEncoding, TimeKind,
    TimeValue,
};
use bytes::{BufMut, Bytes, BytesMut};

/// BER encoder for TLV triplets
///
/// Each encoded value consists of identifier octets, length octets and
/// content octets. Constructed contents are encoded first and then wrapped,
/// so every definite length is known when it is written.
#[derive(Debug, Default)]
pub struct BerEncoder {
    buffer: BytesMut,
}

impl BerEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Encode a TLV with a definite length
    pub fn encode_tlv(&mut self, identifier: TagEncoding, content: &[u8]) {
        BerTag::from(identifier).encode(&mut self.buffer);
        BerLength::new(content.len()).encode(&mut self.buffer);
        self.buffer.put_slice(content);
    }

    /// Encode a constructed TLV with an indefinite length
    ///
    /// `content` must be a concatenation of complete TLVs.
    pub fn encode_indefinite(&mut self, tag: Tag, content: &[u8]) {
        BerTag::from(TagEncoding::constructed(tag)).encode(&mut self.buffer);
        BerLength::Indefinite.encode(&mut self.buffer);
        self.buffer.put_slice(content);
        self.buffer.put_slice(&END_OF_CONTENTS);
    }

    /// Append already encoded TLVs
    pub fn append(&mut self, encoded: &[u8]) {
        self.buffer.put_slice(encoded);
    }

    pub fn encode_boolean(&mut self, value: bool) {
        self.encode_tlv(TagEncoding::primitive(Tag::BOOLEAN), &boolean_content(value));
    }

    pub fn encode_integer(&mut self, value: i64) {
        self.encode_tlv(TagEncoding::primitive(Tag::INTEGER), &integer_content(value));
    }

    pub fn encode_null(&mut self) {
        self.encode_tlv(TagEncoding::primitive(Tag::NULL), &[]);
    }

    pub fn encode_real(&mut self, value: &RealValue) -> Asn1Result<()> {
        let content = real_content(value)?;
        self.encode_tlv(TagEncoding::primitive(Tag::REAL), &content);
        Ok(())
    }

    pub fn encode_octet_string(&mut self, value: &[u8]) {
        self.encode_tlv(TagEncoding::primitive(Tag::OCTET_STRING), value);
    }

    pub fn encode_bit_string(&mut self, value: &BitString) {
        self.encode_tlv(TagEncoding::primitive(Tag::BIT_STRING), &bit_string_content(value));
    }

    pub fn encode_object_identifier(&mut self, oid: &ObjectIdentifier) -> Asn1Result<()> {
        let content = oid_content(oid)?;
        self.encode_tlv(TagEncoding::primitive(Tag::OBJECT_IDENTIFIER), &content);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Bytes {
        self.buffer.freeze()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

pub fn boolean_content(value: bool) -> [u8; 1] {
    [if value { 0xFF } else { 0x00 }]
}

/// Minimal big-endian two's complement
///
/// A leading `0x00` or `0xFF` octet is dropped as long as the next octet
/// keeps the sign bit, so 127 is `7F`, 128 is `00 80` and -129 is `FF 7F`.
pub fn integer_content(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

/// Unsigned big-endian octets without leading zeros (at least one octet)
fn unsigned_content(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count().min(bytes.len() - 1);
    bytes[skip..].to_vec()
}

/// REAL content octets (X.690 8.5, canonical form of 11.3)
///
/// # Encoding Strategy
/// - Plus zero: empty content
/// - Specials: `0x40` PLUS-INFINITY, `0x41` MINUS-INFINITY, `0x42`
///   NOT-A-NUMBER, `0x43` minus zero
/// - Decimal-origin values: `0x03` followed by the ISO 6093 NR3 string
/// - Everything else: binary form, base 2, scale factor 0, odd mantissa
pub fn real_content(value: &RealValue) -> Asn1Result<Vec<u8>> {
    let v = value.value();
    if value.is_plus_zero() {
        return Ok(Vec::new());
    }
    if value.is_minus_zero() {
        return Ok(vec![0x43]);
    }
    if v.is_nan() {
        return Ok(vec![0x42]);
    }
    if v == f64::INFINITY {
        return Ok(vec![0x40]);
    }
    if v == f64::NEG_INFINITY {
        return Ok(vec![0x41]);
    }
    if value.is_decimal() {
        let mut content = vec![0x03];
        content.extend_from_slice(value.to_nr3()?.as_bytes());
        return Ok(content);
    }

    let parts = value
        .binary_parts()
        .ok_or_else(|| Asn1Error::Encoding(format!("{} has no binary form", value)))?;
    let exponent = integer_content(i64::from(parts.exponent));
    let mut first = 0x80u8;
    if parts.negative {
        first |= 0x40;
    }
    let mut content = Vec::with_capacity(12);
    match exponent.len() {
        1 => content.push(first),
        2 => content.push(first | 0x01),
        3 => content.push(first | 0x02),
        n => {
            content.push(first | 0x03);
            content.push(n as u8);
        }
    }
    content.extend_from_slice(&exponent);
    content.extend_from_slice(&unsigned_content(parts.mantissa));
    Ok(content)
}

/// OBJECT IDENTIFIER content: `arc0 * 40 + arc1`, then each remaining arc,
/// all in base 128
pub fn oid_content(oid: &ObjectIdentifier) -> Asn1Result<Vec<u8>> {
    let mut content = base128(oid.first_subidentifier()?);
    for arc in &oid.arcs()[2..] {
        content.extend_from_slice(&base128(*arc));
    }
    Ok(content)
}

/// BIT STRING content: unused-bit count, then the bits
pub fn bit_string_content(value: &BitString) -> Vec<u8> {
    let mut content = Vec::with_capacity(value.as_bytes().len() + 1);
    content.push(value.unused_bits());
    content.extend_from_slice(value.as_bytes());
    content
}

/// BMPString content: UCS-2 big-endian
pub fn bmp_content(text: &str) -> Asn1Result<Vec<u8>> {
    let mut content = Vec::with_capacity(text.len() * 2);
    for c in text.chars() {
        let code = u16::try_from(u32::from(c)).map_err(|_| {
            Asn1Error::Encoding(format!("'{}' is outside the Basic Multilingual Plane", c))
        })?;
        content.extend_from_slice(&code.to_be_bytes());
    }
    Ok(content)
}

/// Time content: the canonical text of the time type
pub fn time_content(kind: TimeKind, value: &TimeValue) -> Asn1Result<Vec<u8>> {
    Ok(kind.format(value)?.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_content_is_minimal() {
        assert_eq!(integer_content(0), vec![0x00]);
        assert_eq!(integer_content(127), vec![0x7F]);
        assert_eq!(integer_content(128), vec![0x00, 0x80]);
        assert_eq!(integer_content(256), vec![0x01, 0x00]);
        assert_eq!(integer_content(-1), vec![0xFF]);
        assert_eq!(integer_content(-128), vec![0x80]);
        assert_eq!(integer_content(-129), vec![0xFF, 0x7F]);
        assert_eq!(
            integer_content(i64::MIN),
            vec![0x80, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_real_content() {
        assert!(real_content(&RealValue::new(0.0)).unwrap().is_empty());
        assert_eq!(real_content(&RealValue::new(-0.0)).unwrap(), vec![0x43]);
        assert_eq!(real_content(&RealValue::PLUS_INFINITY).unwrap(), vec![0x40]);
        assert_eq!(real_content(&RealValue::MINUS_INFINITY).unwrap(), vec![0x41]);
        assert_eq!(real_content(&RealValue::new(f64::NAN)).unwrap(), vec![0x42]);
        // 0.15625 = 5 * 2^-5
        assert_eq!(
            real_content(&RealValue::new(0.15625)).unwrap(),
            vec![0x80, 0xFB, 0x05]
        );
        // -1 = -1 * 2^0
        assert_eq!(
            real_content(&RealValue::new(-1.0)).unwrap(),
            vec![0xC0, 0x00, 0x01]
        );
    }

    #[test]
    fn test_real_content_decimal() {
        let value = RealValue::from_decimal_str("500").unwrap();
        let mut expected = vec![0x03];
        expected.extend_from_slice(b"5.E2");
        assert_eq!(real_content(&value).unwrap(), expected);
    }

    #[test]
    fn test_oid_content() {
        let oid: ObjectIdentifier = "1.2.840.113549".parse().unwrap();
        assert_eq!(
            oid_content(&oid).unwrap(),
            vec![0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D]
        );
        let joint: ObjectIdentifier = "2.999.3".parse().unwrap();
        assert_eq!(oid_content(&joint).unwrap(), vec![0x88, 0x37, 0x03]);
    }

    #[test]
    fn test_bit_string_and_bmp() {
        let bits = BitString::from_binary_literal("101").unwrap();
        assert_eq!(bit_string_content(&bits), vec![0x05, 0xA0]);
        assert_eq!(bmp_content("Az").unwrap(), vec![0x00, 0x41, 0x00, 0x7A]);
        assert!(bmp_content("\u{1F600}").is_err());
    }

    #[test]
    fn test_encoder_tlvs() {
        let mut inner = BerEncoder::new();
        inner.encode_integer(123);
        inner.encode_boolean(true);

        let mut encoder = BerEncoder::new();
        encoder.encode_tlv(TagEncoding::constructed(Tag::SEQUENCE), inner.as_bytes());
        assert_eq!(
            encoder.as_bytes(),
            &[0x30, 0x06, 0x02, 0x01, 0x7B, 0x01, 0x01, 0xFF]
        );

        encoder.clear();
        encoder.encode_indefinite(Tag::SEQUENCE, inner.as_bytes());
        assert_eq!(
            encoder.as_bytes(),
            &[0x30, 0x80, 0x02, 0x01, 0x7B, 0x01, 0x01, 0xFF, 0x00, 0x00]
        );
    }

    #[test]
    fn test_matches_rasn_encodings() {
        for value in [0i64, 1, -1, 127, 128, -128, -129, 65535, i64::MAX, i64::MIN] {
            let mut encoder = BerEncoder::new();
            encoder.encode_integer(value);
            assert_eq!(encoder.as_bytes(), rasn::der::encode(&value).unwrap().as_slice());
        }
        for value in [true, false] {
            let mut encoder = BerEncoder::new();
            encoder.encode_boolean(value);
            assert_eq!(encoder.as_bytes(), rasn::der::encode(&value).unwrap().as_slice());
        }

        let octets = rasn::types::OctetString::from(vec![0xDE, 0xAD, 0xBE, 0xEF]);
        let mut encoder = BerEncoder::new();
        encoder.encode_octet_string(&octets);
        assert_eq!(encoder.as_bytes(), rasn::ber::encode(&octets).unwrap().as_slice());

        let arcs = vec![1u32, 2, 840, 113549, 1, 1, 11];
        let expected = rasn::types::ObjectIdentifier::new(arcs.clone()).unwrap();
        let oid = ObjectIdentifier::new(arcs.into_iter().map(u64::from).collect()).unwrap();
        let mut encoder = BerEncoder::new();
        encoder.encode_object_identifier(&oid).unwrap();
        assert_eq!(encoder.as_bytes(), rasn::der::encode(&expected).unwrap().as_slice());
    }
}
