//! BIT STRING values

use crate::error::{Asn1Error, Asn1Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Arbitrary string of bits (zeros and ones). A bit string value can have any length including zero.
///
/// Bits past `num_bits` in the last byte are always zero, so two bit strings
/// holding the same bits compare equal regardless of how they were built.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BitString {
    #[serde(with = "serde_bytes")]
    bytes: Vec<u8>,
    num_bits: usize,
}

impl BitString {
    /// Construct a new bit string object.
    ///
    /// # Arguments
    ///
    /// * `bytes` - The bit string as a byte array, most significant bit first
    /// * `num_bits` - The number of bits
    ///
    /// # Errors
    ///
    /// Returns an error if `num_bits > bytes.len() * 8`
    pub fn new(mut bytes: Vec<u8>, num_bits: usize) -> Asn1Result<Self> {
        if num_bits > bytes.len() * 8 {
            return Err(Asn1Error::IllegalValue(format!(
                "bit string is too short to hold all bits. Need {} bytes for {} bits",
                num_bits.div_ceil(8),
                num_bits
            )));
        }
        bytes.truncate(num_bits.div_ceil(8));
        let unused = bytes.len() * 8 - num_bits;
        if let Some(last) = bytes.last_mut() {
            *last &= 0xFFu8 << unused;
        }
        Ok(Self { bytes, num_bits })
    }

    /// Parse a binary string literal body (`'0101'B` without quotes)
    pub fn from_binary_literal(literal: &str) -> Asn1Result<Self> {
        let mut bytes = vec![0u8; literal.len().div_ceil(8)];
        for (index, c) in literal.chars().enumerate() {
            match c {
                '0' => {}
                '1' => bytes[index / 8] |= 0x80 >> (index % 8),
                other => {
                    return Err(Asn1Error::IllegalValue(format!(
                        "Invalid binary digit '{}' in bit string literal",
                        other
                    )))
                }
            }
        }
        Self::new(bytes, literal.len())
    }

    /// Get the bit string as byte array.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The number of bits in the byte array.
    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    /// Number of unused bits in the last byte (0-7)
    pub fn unused_bits(&self) -> u8 {
        (self.bytes.len() * 8 - self.num_bits) as u8
    }

    /// Get the bit at a specific position
    ///
    /// # Returns
    /// * `true` if the bit is set, `false` otherwise
    /// * `Err` if the index is out of bounds
    pub fn get_bit(&self, index: usize) -> Asn1Result<bool> {
        if index >= self.num_bits {
            return Err(Asn1Error::IllegalValue(format!(
                "Bit index {} out of bounds (num_bits: {})",
                index, self.num_bits
            )));
        }
        let byte_index = index / 8;
        let bit_index = 7 - (index % 8); // MSB first
        Ok((self.bytes[byte_index] >> bit_index) & 1 == 1)
    }
}

impl fmt::Display for BitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'")?;
        for index in 0..self.num_bits {
            let bit = (self.bytes[index / 8] >> (7 - index % 8)) & 1;
            write!(f, "{}", bit)?;
        }
        write!(f, "'B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_string_new() {
        let bytes = vec![0xFF, 0x00, 0xAA];
        let bit_string = BitString::new(bytes.clone(), 24).unwrap();
        assert_eq!(bit_string.as_bytes(), &bytes);
        assert_eq!(bit_string.num_bits(), 24);
        assert_eq!(bit_string.unused_bits(), 0);
    }

    #[test]
    fn test_bit_string_invalid() {
        assert!(BitString::new(vec![0xFF], 16).is_err());
    }

    #[test]
    fn test_unused_bits_are_cleared() {
        let a = BitString::new(vec![0xFF], 4).unwrap();
        let b = BitString::new(vec![0xF0, 0x12], 4).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_bytes(), &[0xF0]);
        assert_eq!(a.unused_bits(), 4);
    }

    #[test]
    fn test_binary_literal() {
        let bits = BitString::from_binary_literal("0110111").unwrap();
        assert_eq!(bits.as_bytes(), &[0x6E]);
        assert_eq!(bits.num_bits(), 7);
        assert!(bits.get_bit(1).unwrap());
        assert!(!bits.get_bit(3).unwrap());
        assert_eq!(bits.to_string(), "'0110111'B");
        assert!(BitString::from_binary_literal("012").is_err());
    }
}
