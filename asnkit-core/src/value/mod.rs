//! Value model
//!
//! Values are a closed set of kinds. Comparing two values of different kinds
//! orders them by [`ValueKind`]; values of the same kind use kind-specific
//! numeric or lexicographic rules.

pub mod bit_string;
pub mod object;
pub mod oid;
pub mod real;
pub mod time;

pub use bit_string::BitString;
pub use object::{ObjectField, ObjectValue};
pub use oid::ObjectIdentifier;
pub use real::RealValue;
pub use time::{TimeKind, TimeValue};

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Kind discriminator of a [`Value`], in comparison order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Null,
    Boolean,
    Integer,
    Real,
    BitString,
    OctetString,
    CString,
    Time,
    ObjectIdentifier,
    NamedValue,
    NamedCollection,
    Collection,
    Object,
    ObjectSet,
    Reference,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "NULL",
            ValueKind::Boolean => "BOOLEAN",
            ValueKind::Integer => "INTEGER",
            ValueKind::Real => "REAL",
            ValueKind::BitString => "BIT_STRING",
            ValueKind::OctetString => "OCTET_STRING",
            ValueKind::CString => "C_STRING",
            ValueKind::Time => "TIME",
            ValueKind::ObjectIdentifier => "OID",
            ValueKind::NamedValue => "NAMED_VALUE",
            ValueKind::NamedCollection => "NAMED_COLLECTION",
            ValueKind::Collection => "COLLECTION",
            ValueKind::Object => "OBJECT",
            ValueKind::ObjectSet => "OBJECT_SET",
            ValueKind::Reference => "REFERENCE",
        };
        f.write_str(name)
    }
}

/// A named value: a component of a collection, or the chosen alternative of a CHOICE
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NamedValue {
    pub name: String,
    pub value: Value,
}

impl NamedValue {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

impl fmt::Display for NamedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.value)
    }
}

/// An ASN.1 value
#[derive(Debug, Clone, Hash, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(RealValue),
    BitString(BitString),
    OctetString(#[serde(with = "serde_bytes")] Vec<u8>),
    /// Character string (also the literal form of times and hex/binary strings)
    CString(String),
    Time(TimeValue),
    ObjectIdentifier(ObjectIdentifier),
    /// Chosen alternative of a CHOICE
    Named(Box<NamedValue>),
    /// SEQUENCE or SET value; components are kept in the order given
    NamedCollection(Vec<NamedValue>),
    /// SEQUENCE OF or SET OF value
    Collection(Vec<Value>),
    Object(ObjectValue),
    ObjectSet(Vec<ObjectValue>),
    /// Reference to a defined value, resolved through a scope
    Reference(String),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Integer(_) => ValueKind::Integer,
            Value::Real(_) => ValueKind::Real,
            Value::BitString(_) => ValueKind::BitString,
            Value::OctetString(_) => ValueKind::OctetString,
            Value::CString(_) => ValueKind::CString,
            Value::Time(_) => ValueKind::Time,
            Value::ObjectIdentifier(_) => ValueKind::ObjectIdentifier,
            Value::Named(_) => ValueKind::NamedValue,
            Value::NamedCollection(_) => ValueKind::NamedCollection,
            Value::Collection(_) => ValueKind::Collection,
            Value::Object(_) => ValueKind::Object,
            Value::ObjectSet(_) => ValueKind::ObjectSet,
            Value::Reference(_) => ValueKind::Reference,
        }
    }

    pub fn real(value: f64) -> Self {
        Value::Real(RealValue::new(value))
    }

    pub fn string(text: impl Into<String>) -> Self {
        Value::CString(text.into())
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Value::Reference(name.into())
    }

    /// Chosen CHOICE alternative
    pub fn named(name: impl Into<String>, value: Value) -> Self {
        Value::Named(Box::new(NamedValue::new(name, value)))
    }

    /// SEQUENCE/SET value from `(name, value)` pairs
    pub fn collection<N: Into<String>>(components: impl IntoIterator<Item = (N, Value)>) -> Self {
        Value::NamedCollection(
            components
                .into_iter()
                .map(|(name, value)| NamedValue::new(name, value))
                .collect(),
        )
    }

    /// Look up a component of a named collection
    pub fn component(&self, name: &str) -> Option<&Value> {
        match self {
            Value::NamedCollection(components) => components
                .iter()
                .find(|c| c.name == name)
                .map(|c| &c.value),
            _ => None,
        }
    }

    /// Length used by SIZE constraints: characters, octets, bits or elements
    pub fn size(&self) -> Option<usize> {
        match self {
            Value::CString(s) => Some(s.chars().count()),
            Value::OctetString(bytes) => Some(bytes.len()),
            Value::BitString(bits) => Some(bits.num_bits()),
            Value::Collection(items) => Some(items.len()),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Real(a), Value::Real(b)) => a.cmp(b),
            (Value::BitString(a), Value::BitString(b)) => a.cmp(b),
            (Value::OctetString(a), Value::OctetString(b)) => a.cmp(b),
            (Value::CString(a), Value::CString(b)) => a.cmp(b),
            (Value::Time(a), Value::Time(b)) => a.cmp(b),
            (Value::ObjectIdentifier(a), Value::ObjectIdentifier(b)) => a.cmp(b),
            (Value::Named(a), Value::Named(b)) => a.cmp(b),
            (Value::NamedCollection(a), Value::NamedCollection(b)) => a.cmp(b),
            (Value::Collection(a), Value::Collection(b)) => a.cmp(b),
            (Value::Object(a), Value::Object(b)) => a.cmp(b),
            (Value::ObjectSet(a), Value::ObjectSet(b)) => a.cmp(b),
            (Value::Reference(a), Value::Reference(b)) => a.cmp(b),
            _ => self.kind().cmp(&other.kind()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::CString(value.to_string())
    }
}

fn join<T: fmt::Display>(items: &[T], separator: &str) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(separator)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(true) => write!(f, "TRUE"),
            Value::Boolean(false) => write!(f, "FALSE"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::BitString(bits) => write!(f, "{}", bits),
            Value::OctetString(bytes) => {
                write!(f, "'")?;
                for byte in bytes {
                    write!(f, "{:02X}", byte)?;
                }
                write!(f, "'H")
            }
            Value::CString(s) => write!(f, "\"{}\"", s),
            Value::Time(t) => write!(f, "{}", t),
            Value::ObjectIdentifier(oid) => write!(f, "{}", oid),
            Value::Named(named) => write!(f, "{} : {}", named.name, named.value),
            Value::NamedCollection(components) => write!(f, "{{ {} }}", join(components, ", ")),
            Value::Collection(items) => write!(f, "{{ {} }}", join(items, ", ")),
            Value::Object(object) => write!(f, "{}", object),
            Value::ObjectSet(objects) => write!(f, "{{ {} }}", join(objects, " | ")),
            Value::Reference(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_orders_first() {
        assert!(Value::Null < Value::Boolean(false));
        assert!(Value::Integer(i64::MAX) < Value::real(-1.0));
        assert!(Value::string("a") < Value::Time(TimeValue::from_ymd_hms(2000, 1, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_same_kind_rules() {
        assert!(Value::Integer(-5) < Value::Integer(3));
        assert!(Value::string("abc") < Value::string("abd"));
        assert!(Value::real(0.5) < Value::real(1.5));
        assert_eq!(Value::Real(RealValue::decimal(2.0)), Value::real(2.0));
    }

    #[test]
    fn test_collection_rendering() {
        let value = Value::collection([
            ("id", Value::Integer(1)),
            ("data", Value::collection([("a", Value::real(0.0)), ("b", Value::Integer(1))])),
        ]);
        assert_eq!(value.to_string(), "{ id 1, data { a 0.0, b 1 } }");
        assert_eq!(value.component("id"), Some(&Value::Integer(1)));
        assert_eq!(value.component("missing"), None);
    }

    #[test]
    fn test_size() {
        assert_eq!(Value::string("héllo").size(), Some(5));
        assert_eq!(Value::OctetString(vec![1, 2]).size(), Some(2));
        assert_eq!(Value::Collection(vec![Value::Null]).size(), Some(1));
        assert_eq!(Value::Integer(4).size(), None);
    }

    #[test]
    fn test_misc_rendering() {
        assert_eq!(Value::OctetString(vec![0xAB, 0x01]).to_string(), "'AB01'H");
        assert_eq!(Value::named("alt", Value::Boolean(true)).to_string(), "alt : TRUE");
    }
}
