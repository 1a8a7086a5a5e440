//! Tag model shared by the schema and the codec

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag class
///
/// ASN.1 defines four tag classes:
/// - **Universal**: Standard ASN.1 types (INTEGER, OCTET STRING, etc.)
/// - **Application**: Application-specific types
/// - **Context-specific**: Context-dependent types (used in SEQUENCE/SET)
/// - **Private**: Private/implementation-specific types
///
/// The declaration order is also the canonical order used by DER when
/// sorting the components of a SET.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TagClass {
    /// Universal class (00)
    Universal = 0,
    /// Application class (01)
    Application = 1,
    /// Context-specific class (10)
    ContextSpecific = 2,
    /// Private class (11)
    Private = 3,
}

impl TagClass {
    /// Get tag class from bits (bits 8-7 of the identifier octet)
    pub fn from_bits(bits: u8) -> Self {
        match (bits >> 6) & 0x03 {
            0 => TagClass::Universal,
            1 => TagClass::Application,
            2 => TagClass::ContextSpecific,
            _ => TagClass::Private,
        }
    }

    /// Convert tag class to bits (for encoding)
    pub fn to_bits(self) -> u8 {
        (self as u8) << 6
    }

    fn keyword(self) -> &'static str {
        match self {
            TagClass::Universal => "UNIVERSAL ",
            TagClass::Application => "APPLICATION ",
            TagClass::ContextSpecific => "",
            TagClass::Private => "PRIVATE ",
        }
    }
}

/// A tag: class plus number, without the primitive/constructed flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub class: TagClass,
    pub number: u32,
}

impl Tag {
    pub const BOOLEAN: Tag = Tag::universal(1);
    pub const INTEGER: Tag = Tag::universal(2);
    pub const BIT_STRING: Tag = Tag::universal(3);
    pub const OCTET_STRING: Tag = Tag::universal(4);
    pub const NULL: Tag = Tag::universal(5);
    pub const OBJECT_IDENTIFIER: Tag = Tag::universal(6);
    pub const REAL: Tag = Tag::universal(9);
    pub const ENUMERATED: Tag = Tag::universal(10);
    pub const UTF8_STRING: Tag = Tag::universal(12);
    pub const SEQUENCE: Tag = Tag::universal(16);
    pub const SET: Tag = Tag::universal(17);
    pub const NUMERIC_STRING: Tag = Tag::universal(18);
    pub const PRINTABLE_STRING: Tag = Tag::universal(19);
    pub const IA5_STRING: Tag = Tag::universal(22);
    pub const UTC_TIME: Tag = Tag::universal(23);
    pub const GENERALIZED_TIME: Tag = Tag::universal(24);
    pub const VISIBLE_STRING: Tag = Tag::universal(26);
    pub const BMP_STRING: Tag = Tag::universal(30);

    pub const fn new(class: TagClass, number: u32) -> Self {
        Self { class, number }
    }

    pub const fn universal(number: u32) -> Self {
        Self::new(TagClass::Universal, number)
    }

    pub const fn application(number: u32) -> Self {
        Self::new(TagClass::Application, number)
    }

    pub const fn context(number: u32) -> Self {
        Self::new(TagClass::ContextSpecific, number)
    }

    pub const fn private(number: u32) -> Self {
        Self::new(TagClass::Private, number)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}{}]", self.class.keyword(), self.number)
    }
}

/// Module-wide tagging default (`DEFINITIONS ... TAGS`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TagMethod {
    /// No tagging clause; behaves as EXPLICIT TAGS
    #[default]
    Unknown,
    /// IMPLICIT TAGS
    Implicit,
    /// EXPLICIT TAGS
    Explicit,
    /// AUTOMATIC TAGS
    Automatic,
}

impl TagMethod {
    /// The tagging mode applied to a declared tag that carries no keyword
    pub fn default_mode(self) -> TaggingMode {
        match self {
            TagMethod::Implicit | TagMethod::Automatic => TaggingMode::Implicit,
            TagMethod::Explicit | TagMethod::Unknown => TaggingMode::Explicit,
        }
    }
}

/// Tagging mode of a single tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaggingMode {
    Implicit,
    Explicit,
}

/// A tag as written in a type definition: `[APPLICATION 3] IMPLICIT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagSpec {
    pub tag: Tag,
    /// `None` when the definition leaves the mode to the module default
    pub mode: Option<TaggingMode>,
}

impl TagSpec {
    pub fn new(tag: Tag, mode: Option<TaggingMode>) -> Self {
        Self { tag, mode }
    }

    /// Context-specific tag using the module default mode
    pub fn context(number: u32) -> Self {
        Self::new(Tag::context(number), None)
    }

    pub fn explicit(tag: Tag) -> Self {
        Self::new(tag, Some(TaggingMode::Explicit))
    }

    pub fn implicit(tag: Tag) -> Self {
        Self::new(tag, Some(TaggingMode::Implicit))
    }

    /// Resolve the tagging mode against the module default
    pub fn mode_under(&self, method: TagMethod) -> TaggingMode {
        self.mode.unwrap_or_else(|| method.default_mode())
    }
}

/// A tag as it appears on the wire: tag plus the constructed flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagEncoding {
    pub tag: Tag,
    pub constructed: bool,
}

impl TagEncoding {
    pub fn new(tag: Tag, constructed: bool) -> Self {
        Self { tag, constructed }
    }

    pub fn primitive(tag: Tag) -> Self {
        Self::new(tag, false)
    }

    pub fn constructed(tag: Tag) -> Self {
        Self::new(tag, true)
    }
}

impl fmt::Display for TagEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let form = if self.constructed { "constructed" } else { "primitive" };
        write!(f, "{} {}", self.tag, form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_class_bits() {
        assert_eq!(TagClass::from_bits(0xA0), TagClass::ContextSpecific);
        assert_eq!(TagClass::Application.to_bits(), 0x40);
        assert_eq!(TagClass::from_bits(TagClass::Private.to_bits()), TagClass::Private);
    }

    #[test]
    fn test_canonical_tag_order() {
        let mut tags = vec![Tag::context(1), Tag::INTEGER, Tag::application(5), Tag::context(0)];
        tags.sort();
        assert_eq!(tags, vec![Tag::INTEGER, Tag::application(5), Tag::context(0), Tag::context(1)]);
    }

    #[test]
    fn test_mode_under_module_default() {
        let spec = TagSpec::context(0);
        assert_eq!(spec.mode_under(TagMethod::Automatic), TaggingMode::Implicit);
        assert_eq!(spec.mode_under(TagMethod::Unknown), TaggingMode::Explicit);
        let explicit = TagSpec::explicit(Tag::context(0));
        assert_eq!(explicit.mode_under(TagMethod::Implicit), TaggingMode::Explicit);
    }

    #[test]
    fn test_display() {
        assert_eq!(Tag::context(3).to_string(), "[3]");
        assert_eq!(Tag::application(0).to_string(), "[APPLICATION 0]");
    }
}
