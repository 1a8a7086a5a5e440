//! Core types for the asnkit ASN.1 toolkit
//!
//! This crate provides the fundamental types shared by the schema engine and
//! the BER/DER codec: error handling, the tag model, the value model and lazy
//! references.

pub mod error;
pub mod reference;
pub mod tag;
pub mod value;

pub use error::{Asn1Error, Asn1Result};
pub use reference::Ref;
pub use tag::{Tag, TagClass, TagEncoding, TagMethod, TagSpec, TaggingMode};
pub use value::{
    BitString, NamedValue, ObjectField, ObjectIdentifier, ObjectValue, RealValue, TimeKind,
    TimeValue, Value, ValueKind,
};
