//! OBJECT IDENTIFIER values

use crate::error::{Asn1Error, Asn1Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An object identifier: a sequence of at least two arcs
///
/// The first arc is 0, 1 or 2; under arcs 0 and 1 the second arc is below 40.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectIdentifier {
    arcs: Vec<u64>,
}

impl ObjectIdentifier {
    /// Create an object identifier, validating the first two arcs
    pub fn new(arcs: Vec<u64>) -> Asn1Result<Self> {
        if arcs.len() < 2 {
            return Err(Asn1Error::IllegalValue(
                "Object identifier must have at least 2 components".to_string(),
            ));
        }
        match arcs[0] {
            0 | 1 if arcs[1] >= 40 => Err(Asn1Error::IllegalValue(format!(
                "Second arc must be below 40 under arc {}, got {}",
                arcs[0], arcs[1]
            ))),
            0..=2 => Ok(Self { arcs }),
            other => Err(Asn1Error::IllegalValue(format!(
                "First arc must be 0, 1 or 2, got {}",
                other
            ))),
        }
    }

    pub fn arcs(&self) -> &[u64] {
        &self.arcs
    }

    /// The first subidentifier on the wire: `arc0 * 40 + arc1`
    pub fn first_subidentifier(&self) -> Asn1Result<u64> {
        self.arcs[0]
            .checked_mul(40)
            .and_then(|x| x.checked_add(self.arcs[1]))
            .ok_or_else(|| Asn1Error::IllegalValue("OID component too large".to_string()))
    }

    /// Rebuild the arcs from wire subidentifiers
    pub fn from_subidentifiers(subidentifiers: &[u64]) -> Asn1Result<Self> {
        let (&first, rest) = subidentifiers.split_first().ok_or_else(|| {
            Asn1Error::Decoding("Empty object identifier encoding".to_string())
        })?;
        let (arc0, arc1) = match first {
            0..=39 => (0, first),
            40..=79 => (1, first - 40),
            _ => (2, first - 80),
        };
        let mut arcs = Vec::with_capacity(subidentifiers.len() + 1);
        arcs.push(arc0);
        arcs.push(arc1);
        arcs.extend_from_slice(rest);
        Self::new(arcs)
    }
}

impl FromStr for ObjectIdentifier {
    type Err = Asn1Error;

    /// Parse dotted notation, e.g. `1.2.840.113549`
    fn from_str(s: &str) -> Asn1Result<Self> {
        let arcs = s
            .split('.')
            .map(|part| {
                part.trim().parse::<u64>().map_err(|_| {
                    Asn1Error::IllegalValue(format!("Invalid OID component '{}' in '{}'", part, s))
                })
            })
            .collect::<Asn1Result<Vec<_>>>()?;
        Self::new(arcs)
    }
}

impl fmt::Display for ObjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.arcs.iter().map(|a| a.to_string()).collect();
        write!(f, "{{ {} }}", parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotted() {
        let oid: ObjectIdentifier = "1.2.840.113549".parse().unwrap();
        assert_eq!(oid.arcs(), &[1, 2, 840, 113549]);
        assert_eq!(oid.first_subidentifier().unwrap(), 42);
        assert_eq!(oid.to_string(), "{ 1 2 840 113549 }");
    }

    #[test]
    fn test_arc_rules() {
        assert!(ObjectIdentifier::new(vec![1]).is_err());
        assert!(ObjectIdentifier::new(vec![3, 1]).is_err());
        assert!(ObjectIdentifier::new(vec![1, 40]).is_err());
        assert!(ObjectIdentifier::new(vec![2, 999]).is_ok());
        assert!("1.x.3".parse::<ObjectIdentifier>().is_err());
    }

    #[test]
    fn test_from_subidentifiers() {
        let oid = ObjectIdentifier::from_subidentifiers(&[1079, 3]).unwrap();
        assert_eq!(oid.arcs(), &[2, 999, 3]);
        let oid = ObjectIdentifier::from_subidentifiers(&[42, 840]).unwrap();
        assert_eq!(oid.arcs(), &[1, 2, 840]);
    }
}
