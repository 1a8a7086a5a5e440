//! REAL values

use crate::error::{Asn1Error, Asn1Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A REAL value
///
/// The value itself is an IEEE double. `decimal` records whether it came from
/// a decimal literal (or a base-10 `{ mantissa, base, exponent }` triple); such
/// values are encoded with the ISO 6093 decimal form instead of the binary
/// form. The flag does not take part in comparison.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RealValue {
    value: f64,
    decimal: bool,
}

/// Sign, odd mantissa and base-2 exponent of a finite non-zero double
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryParts {
    pub negative: bool,
    pub mantissa: u64,
    pub exponent: i32,
}

impl RealValue {
    pub const PLUS_INFINITY: RealValue = RealValue::new(f64::INFINITY);
    pub const MINUS_INFINITY: RealValue = RealValue::new(f64::NEG_INFINITY);

    /// A binary-origin REAL
    pub const fn new(value: f64) -> Self {
        Self { value, decimal: false }
    }

    /// A decimal-origin REAL
    pub const fn decimal(value: f64) -> Self {
        Self { value, decimal: true }
    }

    /// Parse a decimal literal such as `3.14`, `-1.5E3` or an ISO 6093 NR1,
    /// NR2 or NR3 string (`,` is accepted as decimal mark, surrounding spaces
    /// are ignored)
    pub fn from_decimal_str(text: &str) -> Asn1Result<Self> {
        let trimmed = text.trim().replace(',', ".");
        let valid = !trimmed.is_empty()
            && trimmed
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
            && trimmed.chars().any(|c| c.is_ascii_digit());
        if !valid {
            return Err(Asn1Error::IllegalValue(format!(
                "'{}' is not a decimal real literal",
                text
            )));
        }
        trimmed
            .parse::<f64>()
            .map(Self::decimal)
            .map_err(|e| Asn1Error::IllegalValue(format!("'{}' is not a decimal real literal: {}", text, e)))
    }

    /// Build a REAL from the `{ mantissa, base, exponent }` value notation
    ///
    /// The result is the double nearest to `mantissa * base^exponent`. Base 2
    /// and base 10 are accepted; equal magnitudes give bit-identical doubles
    /// whichever base they were written in.
    pub fn from_triple(mantissa: i64, base: u32, exponent: i32) -> Asn1Result<Self> {
        match base {
            10 => format!("{}e{}", mantissa, exponent)
                .parse::<f64>()
                .map(Self::decimal)
                .map_err(|e| Asn1Error::IllegalValue(format!("Invalid REAL triple: {}", e))),
            2 => {
                let mut mantissa = mantissa;
                let mut exponent = exponent as i64;
                while mantissa != 0 && mantissa % 2 == 0 {
                    mantissa /= 2;
                    exponent += 1;
                }
                Ok(Self::new(scale_by_power_of_two(mantissa as f64, exponent)))
            }
            other => Err(Asn1Error::IllegalValue(format!(
                "REAL base must be 2 or 10, got {}",
                other
            ))),
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn is_decimal(&self) -> bool {
        self.decimal
    }

    pub fn is_minus_zero(&self) -> bool {
        self.value == 0.0 && self.value.is_sign_negative()
    }

    pub fn is_plus_zero(&self) -> bool {
        self.value == 0.0 && self.value.is_sign_positive()
    }

    /// Decompose a finite non-zero value into an odd mantissa and a base-2
    /// exponent; `None` for zero, infinities and NaN
    pub fn binary_parts(&self) -> Option<BinaryParts> {
        if !self.value.is_finite() || self.value == 0.0 {
            return None;
        }
        let bits = self.value.to_bits();
        let negative = bits >> 63 == 1;
        let biased = ((bits >> 52) & 0x7FF) as i32;
        let fraction = bits & 0x000F_FFFF_FFFF_FFFF;
        let (mut mantissa, mut exponent) = if biased == 0 {
            (fraction, -1074)
        } else {
            (fraction | (1 << 52), biased - 1075)
        };
        let shift = mantissa.trailing_zeros();
        mantissa >>= shift;
        exponent += shift as i32;
        Some(BinaryParts {
            negative,
            mantissa,
            exponent,
        })
    }

    /// Canonical ISO 6093 NR3 rendering: `[-]digits.E[-]exponent`, no leading
    /// or trailing zeros in the mantissa, `+0` for a zero exponent
    pub fn to_nr3(&self) -> Asn1Result<String> {
        if !self.value.is_finite() || self.value == 0.0 {
            return Err(Asn1Error::Encoding(format!(
                "{} has no NR3 representation",
                self
            )));
        }
        let scientific = format!("{:e}", self.value.abs());
        let (mantissa, exponent) = scientific
            .split_once('e')
            .ok_or_else(|| Asn1Error::Encoding(format!("Unexpected float rendering: {}", scientific)))?;
        let exponent: i32 = exponent
            .parse()
            .map_err(|e| Asn1Error::Encoding(format!("Unexpected float rendering {}: {}", scientific, e)))?;
        let mut digits: String = mantissa.chars().filter(|c| *c != '.').collect();
        let mut exponent = exponent - (digits.len() as i32 - 1);
        while digits.len() > 1 && digits.ends_with('0') {
            digits.pop();
            exponent += 1;
        }
        let sign = if self.value < 0.0 { "-" } else { "" };
        if exponent == 0 {
            Ok(format!("{}{}.E+0", sign, digits))
        } else {
            Ok(format!("{}{}.E{}", sign, digits, exponent))
        }
    }
}

const MAX_BINARY_SCALE: i64 = 2200;

/// Multiply by a power of two without intermediate overflow or underflow
///
/// Exponents beyond +/-2200 already saturate every finite double to
/// infinity or zero, so they are clamped before scaling.
pub fn scale_by_power_of_two(mut value: f64, exponent: i64) -> f64 {
    let mut exponent = exponent.clamp(-MAX_BINARY_SCALE, MAX_BINARY_SCALE);
    while exponent > 1000 {
        value *= 2f64.powi(1000);
        exponent -= 1000;
    }
    while exponent < -1000 {
        value *= 2f64.powi(-1000);
        exponent += 1000;
    }
    value * 2f64.powi(exponent as i32)
}

impl From<f64> for RealValue {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl PartialEq for RealValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RealValue {}

impl PartialOrd for RealValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RealValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.total_cmp(&other.value)
    }
}

impl Hash for RealValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.to_bits().hash(state);
    }
}

impl fmt::Display for RealValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value == f64::INFINITY {
            write!(f, "PLUS-INFINITY")
        } else if self.value == f64::NEG_INFINITY {
            write!(f, "MINUS-INFINITY")
        } else if self.value.is_nan() {
            write!(f, "NOT-A-NUMBER")
        } else {
            write!(f, "{:?}", self.value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triple_precision() {
        let binary = RealValue::from_triple(5, 2, -5).unwrap();
        assert_eq!(binary, RealValue::new(0.15625));
        assert!(!binary.is_decimal());

        let decimal = RealValue::from_triple(5, 10, 2).unwrap();
        assert_eq!(decimal, RealValue::new(500.0));
        assert!(decimal.is_decimal());
    }

    #[test]
    fn test_triple_bases_agree() {
        let a = RealValue::from_triple(15625, 10, -5).unwrap();
        let b = RealValue::from_triple(5, 2, -5).unwrap();
        assert_eq!(a.value().to_bits(), b.value().to_bits());
        assert!(RealValue::from_triple(1, 16, 1).is_err());
    }

    #[test]
    fn test_decimal_literal() {
        assert_eq!(RealValue::from_decimal_str(" 3,5 ").unwrap(), RealValue::new(3.5));
        assert_eq!(RealValue::from_decimal_str("5.E2").unwrap(), RealValue::new(500.0));
        assert!(RealValue::from_decimal_str("inf").is_err());
        assert!(RealValue::from_decimal_str("").is_err());
    }

    #[test]
    fn test_binary_parts() {
        let parts = RealValue::new(0.15625).binary_parts().unwrap();
        assert_eq!(parts, BinaryParts { negative: false, mantissa: 5, exponent: -5 });
        let parts = RealValue::new(-1.0).binary_parts().unwrap();
        assert_eq!(parts, BinaryParts { negative: true, mantissa: 1, exponent: 0 });
        assert!(RealValue::new(0.0).binary_parts().is_none());
        assert!(RealValue::PLUS_INFINITY.binary_parts().is_none());
    }

    #[test]
    fn test_nr3() {
        assert_eq!(RealValue::new(500.0).to_nr3().unwrap(), "5.E2");
        assert_eq!(RealValue::new(0.15625).to_nr3().unwrap(), "15625.E-5");
        assert_eq!(RealValue::new(-1.0).to_nr3().unwrap(), "-1.E+0");
        assert_eq!(RealValue::new(12.0).to_nr3().unwrap(), "12.E+0");
        assert!(RealValue::new(0.0).to_nr3().is_err());
    }

    #[test]
    fn test_ordering_distinguishes_zero_signs() {
        assert!(RealValue::new(-0.0) < RealValue::new(0.0));
        assert!(RealValue::new(-0.0).is_minus_zero());
        assert_eq!(RealValue::decimal(1.5), RealValue::new(1.5));
    }

    #[test]
    fn test_scale_saturates_extreme_exponents() {
        assert_eq!(scale_by_power_of_two(1.0, i64::MAX), f64::INFINITY);
        assert_eq!(scale_by_power_of_two(-3.0, i64::MAX), f64::NEG_INFINITY);
        assert_eq!(scale_by_power_of_two(1.0, i64::MIN), 0.0);
        assert_eq!(scale_by_power_of_two(f64::MAX, -2100), 0.0);
        assert_eq!(scale_by_power_of_two(5e-324, 2100), f64::INFINITY);
        assert_eq!(scale_by_power_of_two(3.0, 4), 48.0);
    }
}
