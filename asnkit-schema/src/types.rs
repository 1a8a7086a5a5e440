//! Type model
//!
//! A [`Type`] is a closed tagged variant ([`TypeKind`]) plus an optional
//! declared tag and an optional constraint template. Types live in the arena
//! of their [`Module`](crate::module::Module) and refer to each other only
//! through [`Ref<TypeId>`], which lets a schema be logically recursive
//! without physical cycles.

use crate::constraint::ConstraintTemplate;
use crate::parameter::TemplateArgument;
use asnkit_core::{Ref, Tag, TagSpec, TimeKind, Value, ValueKind};
use std::fmt;

/// Handle of a type inside a module arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId(pub(crate) usize);

impl TypeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Character string families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringKind {
    Utf8,
    Numeric,
    Printable,
    Ia5,
    Visible,
    Bmp,
}

impl StringKind {
    pub fn tag(self) -> Tag {
        match self {
            StringKind::Utf8 => Tag::UTF8_STRING,
            StringKind::Numeric => Tag::NUMERIC_STRING,
            StringKind::Printable => Tag::PRINTABLE_STRING,
            StringKind::Ia5 => Tag::IA5_STRING,
            StringKind::Visible => Tag::VISIBLE_STRING,
            StringKind::Bmp => Tag::BMP_STRING,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StringKind::Utf8 => "UTF8String",
            StringKind::Numeric => "NumericString",
            StringKind::Printable => "PrintableString",
            StringKind::Ia5 => "IA5String",
            StringKind::Visible => "VisibleString",
            StringKind::Bmp => "BMPString",
        }
    }

    /// Whether the character belongs to the repertoire of this string type
    pub fn permits(self, c: char) -> bool {
        match self {
            StringKind::Utf8 => true,
            StringKind::Numeric => c.is_ascii_digit() || c == ' ',
            StringKind::Printable => {
                c.is_ascii_alphanumeric() || " '()+,-./:=?".contains(c)
            }
            StringKind::Ia5 => c.is_ascii(),
            StringKind::Visible => (' '..='~').contains(&c),
            StringKind::Bmp => (c as u32) <= 0xFFFF,
        }
    }
}

/// An identifier bound to a number (`red(0)`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedNumber {
    pub name: String,
    pub value: i64,
}

impl NamedNumber {
    pub fn new(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Presence of a collection component
#[derive(Debug, Clone, PartialEq)]
pub enum Presence {
    Mandatory,
    Optional,
    Default(Value),
}

impl Presence {
    pub fn is_mandatory(&self) -> bool {
        matches!(self, Presence::Mandatory)
    }
}

/// Named component of a SEQUENCE, SET or CHOICE
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub name: String,
    pub ty: Ref<TypeId>,
    pub presence: Presence,
}

impl Component {
    pub fn new(name: impl Into<String>, ty: Ref<TypeId>, presence: Presence) -> Self {
        Self {
            name: name.into(),
            ty,
            presence,
        }
    }

    pub fn mandatory(name: impl Into<String>, ty: Ref<TypeId>) -> Self {
        Self::new(name, ty, Presence::Mandatory)
    }

    pub fn optional(name: impl Into<String>, ty: Ref<TypeId>) -> Self {
        Self::new(name, ty, Presence::Optional)
    }

    pub fn with_default(name: impl Into<String>, ty: Ref<TypeId>, default: Value) -> Self {
        Self::new(name, ty, Presence::Default(default))
    }
}

/// Field of an information object class
#[derive(Debug, Clone, PartialEq)]
pub enum ClassField {
    /// `&Type`: objects supply a type
    Type { name: String, optional: bool },
    /// `&id Type UNIQUE`: objects supply a value of a fixed type
    Value {
        name: String,
        ty: Ref<TypeId>,
        unique: bool,
        optional: bool,
    },
}

impl ClassField {
    pub fn name(&self) -> &str {
        match self {
            ClassField::Type { name, .. } | ClassField::Value { name, .. } => name,
        }
    }

    pub fn is_optional(&self) -> bool {
        match self {
            ClassField::Type { optional, .. } | ClassField::Value { optional, .. } => *optional,
        }
    }
}

/// Information object class definition (`CLASS { ... }`)
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectClass {
    pub fields: Vec<ClassField>,
}

impl ObjectClass {
    pub fn new(fields: Vec<ClassField>) -> Self {
        Self { fields }
    }

    pub fn field(&self, name: &str) -> Option<&ClassField> {
        self.fields.iter().find(|f| f.name() == name)
    }
}

/// The closed set of type variants
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Boolean,
    Integer(Vec<NamedNumber>),
    Enumerated(Vec<NamedNumber>),
    Real,
    Null,
    BitString,
    OctetString,
    ObjectIdentifier,
    String(StringKind),
    Time(TimeKind),
    Sequence(Vec<Component>),
    Set(Vec<Component>),
    Choice(Vec<Component>),
    SequenceOf(Ref<TypeId>),
    SetOf(Ref<TypeId>),
    /// Reference to another type, possibly adding a tag or a constraint
    Defined(Ref<TypeId>),
    /// Instance of a parameterized type definition
    Instance {
        template: String,
        arguments: Vec<TemplateArgument>,
    },
    ObjectClass(ObjectClass),
    /// `CLASS.&field`; an open type when the field is a type field
    ClassField { class: Ref<TypeId>, field: String },
}

impl TypeKind {
    /// Family of a structural variant; `None` for indirections that must be
    /// resolved through a scope first
    pub fn family(&self) -> Option<TypeFamily> {
        let family = match self {
            TypeKind::Boolean => TypeFamily::Boolean,
            TypeKind::Integer(_) => TypeFamily::Integer,
            TypeKind::Enumerated(_) => TypeFamily::Enumerated,
            TypeKind::Real => TypeFamily::Real,
            TypeKind::Null => TypeFamily::Null,
            TypeKind::BitString => TypeFamily::BitString,
            TypeKind::OctetString => TypeFamily::OctetString,
            TypeKind::ObjectIdentifier => TypeFamily::ObjectIdentifier,
            TypeKind::String(kind) => TypeFamily::String(*kind),
            TypeKind::Time(kind) => TypeFamily::Time(*kind),
            TypeKind::Sequence(_) => TypeFamily::Sequence,
            TypeKind::Set(_) => TypeFamily::Set,
            TypeKind::Choice(_) => TypeFamily::Choice,
            TypeKind::SequenceOf(_) => TypeFamily::SequenceOf,
            TypeKind::SetOf(_) => TypeFamily::SetOf,
            TypeKind::ObjectClass(_) => TypeFamily::ObjectClass,
            TypeKind::Defined(_) | TypeKind::Instance { .. } | TypeKind::ClassField { .. } => {
                return None
            }
        };
        Some(family)
    }

    /// Components of SEQUENCE, SET and CHOICE
    pub fn components(&self) -> Option<&[Component]> {
        match self {
            TypeKind::Sequence(c) | TypeKind::Set(c) | TypeKind::Choice(c) => Some(c),
            _ => None,
        }
    }

    pub(crate) fn components_mut(&mut self) -> Option<&mut Vec<Component>> {
        match self {
            TypeKind::Sequence(c) | TypeKind::Set(c) | TypeKind::Choice(c) => Some(c),
            _ => None,
        }
    }

    pub(crate) fn keyword(&self) -> String {
        match self {
            TypeKind::Boolean => "BOOLEAN".into(),
            TypeKind::Integer(_) => "INTEGER".into(),
            TypeKind::Enumerated(_) => "ENUMERATED".into(),
            TypeKind::Real => "REAL".into(),
            TypeKind::Null => "NULL".into(),
            TypeKind::BitString => "BIT STRING".into(),
            TypeKind::OctetString => "OCTET STRING".into(),
            TypeKind::ObjectIdentifier => "OBJECT IDENTIFIER".into(),
            TypeKind::String(kind) => kind.name().into(),
            TypeKind::Time(kind) => kind.name().into(),
            TypeKind::Sequence(_) => "SEQUENCE".into(),
            TypeKind::Set(_) => "SET".into(),
            TypeKind::Choice(_) => "CHOICE".into(),
            TypeKind::SequenceOf(elem) => format!("SEQUENCE OF {}", elem),
            TypeKind::SetOf(elem) => format!("SET OF {}", elem),
            TypeKind::Defined(target) => target.to_string(),
            TypeKind::Instance { template, .. } => format!("{}{{...}}", template),
            TypeKind::ObjectClass(_) => "CLASS".into(),
            TypeKind::ClassField { class, field } => format!("{}.{}", class, field),
        }
    }
}

/// Family discriminator used for codec dispatch and value-kind checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeFamily {
    Boolean,
    Integer,
    Enumerated,
    Real,
    Null,
    BitString,
    OctetString,
    ObjectIdentifier,
    String(StringKind),
    Time(TimeKind),
    Sequence,
    Set,
    Choice,
    SequenceOf,
    SetOf,
    ObjectClass,
    /// Class type field: the actual type is chosen per value
    OpenType,
}

impl TypeFamily {
    /// Whether values of this family use the constructed encoding
    pub fn is_constructed(self) -> bool {
        matches!(
            self,
            TypeFamily::Sequence | TypeFamily::Set | TypeFamily::SequenceOf | TypeFamily::SetOf
        )
    }

    /// Whether a value of the given kind has the right shape for this family
    pub fn accepts(self, kind: ValueKind) -> bool {
        match self {
            TypeFamily::Boolean => kind == ValueKind::Boolean,
            TypeFamily::Integer | TypeFamily::Enumerated => kind == ValueKind::Integer,
            TypeFamily::Real => kind == ValueKind::Real,
            TypeFamily::Null => kind == ValueKind::Null,
            TypeFamily::BitString => kind == ValueKind::BitString,
            TypeFamily::OctetString => kind == ValueKind::OctetString,
            TypeFamily::ObjectIdentifier => kind == ValueKind::ObjectIdentifier,
            TypeFamily::String(_) => kind == ValueKind::CString,
            TypeFamily::Time(_) => kind == ValueKind::Time,
            TypeFamily::Sequence | TypeFamily::Set => kind == ValueKind::NamedCollection,
            TypeFamily::Choice => kind == ValueKind::NamedValue,
            TypeFamily::SequenceOf | TypeFamily::SetOf => kind == ValueKind::Collection,
            TypeFamily::ObjectClass => matches!(kind, ValueKind::Object | ValueKind::ObjectSet),
            TypeFamily::OpenType => kind != ValueKind::Reference,
        }
    }
}

/// A type node
#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    kind: TypeKind,
    tag: Option<TagSpec>,
    constraint: Option<ConstraintTemplate>,
    core: bool,
}

impl Type {
    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            tag: None,
            constraint: None,
            core: false,
        }
    }

    pub(crate) fn core(kind: TypeKind) -> Self {
        Self {
            core: true,
            ..Self::new(kind)
        }
    }

    pub fn boolean() -> Self {
        Self::new(TypeKind::Boolean)
    }

    pub fn integer() -> Self {
        Self::new(TypeKind::Integer(Vec::new()))
    }

    pub fn real() -> Self {
        Self::new(TypeKind::Real)
    }

    pub fn string(kind: StringKind) -> Self {
        Self::new(TypeKind::String(kind))
    }

    pub fn sequence(components: Vec<Component>) -> Self {
        Self::new(TypeKind::Sequence(components))
    }

    pub fn set(components: Vec<Component>) -> Self {
        Self::new(TypeKind::Set(components))
    }

    pub fn choice(components: Vec<Component>) -> Self {
        Self::new(TypeKind::Choice(components))
    }

    pub fn sequence_of(element: Ref<TypeId>) -> Self {
        Self::new(TypeKind::SequenceOf(element))
    }

    pub fn set_of(element: Ref<TypeId>) -> Self {
        Self::new(TypeKind::SetOf(element))
    }

    pub fn defined(target: Ref<TypeId>) -> Self {
        Self::new(TypeKind::Defined(target))
    }

    pub fn enumerated(items: Vec<NamedNumber>) -> Self {
        Self::new(TypeKind::Enumerated(items))
    }

    pub fn class_field(class: Ref<TypeId>, field: impl Into<String>) -> Self {
        Self::new(TypeKind::ClassField {
            class,
            field: field.into(),
        })
    }

    pub fn instance(template: impl Into<String>, arguments: Vec<TemplateArgument>) -> Self {
        Self::new(TypeKind::Instance {
            template: template.into(),
            arguments,
        })
    }

    /// Builder-style tag setter
    pub fn with_tag(mut self, tag: TagSpec) -> Self {
        self.tag = Some(tag);
        self
    }

    /// Builder-style constraint setter
    pub fn with_constraint(mut self, constraint: ConstraintTemplate) -> Self {
        self.constraint = Some(constraint);
        self
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut TypeKind {
        &mut self.kind
    }

    pub fn tag(&self) -> Option<&TagSpec> {
        self.tag.as_ref()
    }

    pub fn constraint(&self) -> Option<&ConstraintTemplate> {
        self.constraint.as_ref()
    }

    /// Whether this is one of the builtin types every module inherits
    pub fn is_core(&self) -> bool {
        self.core
    }

    /// Produce an independent instance of this type
    ///
    /// Core types are meant to be shared; copying one is allowed but logged,
    /// since it usually means a caller wanted a reference instead.
    pub fn copy(&self) -> Type {
        if self.core {
            log::warn!("Copying core type {}; core types are normally shared", self);
        }
        Type {
            core: false,
            ..self.clone()
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tag) = &self.tag {
            write!(f, "{} ", tag.tag)?;
        }
        write!(f, "{}", self.kind.keyword())
    }
}
