//! Constraint engine
//!
//! Constraints exist in two stages. A [`ConstraintTemplate`] is the
//! expression as written, built through the [`factory`] functions. Resolving
//! it against a scope and the constrained type yields a live [`Constraint`]:
//! values are optimized, names resolved, patterns compiled and object sets
//! looked up, so checking a value needs no further resolution.

pub mod factory;
pub mod table;
pub mod template;

pub use table::{open_type_for, TableConstraint};
pub use template::{ComponentTemplate, ConstraintTemplate};

use crate::check::check_value;
use crate::module::Module;
use crate::optimize::accept;
use crate::scope::Scope;
use crate::types::TypeId;
use asnkit_core::{Asn1Error, Asn1Result, Value};
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;

/// Runtime kind of a constraint node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    ElementSetSpecs,
    Union,
    Intersection,
    Exclusion,
    All,
    SingleValue,
    CharSet,
    ValueRange,
    Size,
    PermittedAlphabet,
    Pattern,
    InnerType,
    InnerTypes,
    ContainedSubtype,
    Table,
}

/// Kinds that may appear inside `SIZE(...)`
pub const SIZE_CONTEXT: &[ConstraintKind] = &[
    ConstraintKind::ElementSetSpecs,
    ConstraintKind::Union,
    ConstraintKind::Intersection,
    ConstraintKind::Exclusion,
    ConstraintKind::All,
    ConstraintKind::SingleValue,
    ConstraintKind::ValueRange,
    ConstraintKind::ContainedSubtype,
];

/// Kinds that may appear inside `FROM(...)`
pub const PERMITTED_ALPHABET_CONTEXT: &[ConstraintKind] = &[
    ConstraintKind::ElementSetSpecs,
    ConstraintKind::Union,
    ConstraintKind::Intersection,
    ConstraintKind::Exclusion,
    ConstraintKind::All,
    ConstraintKind::CharSet,
    ConstraintKind::ValueRange,
    ConstraintKind::ContainedSubtype,
];

/// Presence requirement of a component in `WITH COMPONENTS`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresenceConstraint {
    Present,
    Absent,
    Optional,
}

impl fmt::Display for PresenceConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PresenceConstraint::Present => "PRESENT",
            PresenceConstraint::Absent => "ABSENT",
            PresenceConstraint::Optional => "OPTIONAL",
        })
    }
}

/// An ordered range of values; `None` bounds are open (MIN/MAX)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueRange {
    min: Option<Value>,
    min_inclusive: bool,
    max: Option<Value>,
    max_inclusive: bool,
}

impl ValueRange {
    /// Build a range, rejecting open bounds that claim to be inclusive and
    /// lower bounds above the upper bound
    pub fn new(
        min: Option<Value>,
        min_inclusive: bool,
        max: Option<Value>,
        max_inclusive: bool,
    ) -> Asn1Result<Self> {
        if min.is_none() && min_inclusive {
            return Err(Asn1Error::Validation(
                "an open lower bound cannot be inclusive".to_string(),
            ));
        }
        if max.is_none() && max_inclusive {
            return Err(Asn1Error::Validation(
                "an open upper bound cannot be inclusive".to_string(),
            ));
        }
        if let (Some(lo), Some(hi)) = (&min, &max) {
            if lo.kind() != hi.kind() {
                return Err(Asn1Error::Validation(format!(
                    "range bounds {} and {} are of different kinds",
                    lo, hi
                )));
            }
            if lo > hi {
                return Err(Asn1Error::Validation(format!(
                    "range lower bound {} exceeds upper bound {}",
                    lo, hi
                )));
            }
        }
        Ok(Self {
            min,
            min_inclusive,
            max,
            max_inclusive,
        })
    }

    pub fn min(&self) -> Option<&Value> {
        self.min.as_ref()
    }

    pub fn max(&self) -> Option<&Value> {
        self.max.as_ref()
    }

    pub fn min_inclusive(&self) -> bool {
        self.min_inclusive
    }

    pub fn max_inclusive(&self) -> bool {
        self.max_inclusive
    }

    pub fn contains(&self, value: &Value) -> bool {
        let above = match &self.min {
            None => true,
            Some(min) if min.kind() != value.kind() => false,
            Some(min) if self.min_inclusive => value >= min,
            Some(min) => value > min,
        };
        let below = match &self.max {
            None => true,
            Some(max) if max.kind() != value.kind() => false,
            Some(max) if self.max_inclusive => value <= max,
            Some(max) => value < max,
        };
        above && below
    }
}

impl fmt::Display for ValueRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.min {
            Some(min) => write!(f, "{}", min)?,
            None => f.write_str("MIN")?,
        }
        if !self.min_inclusive && self.min.is_some() {
            f.write_str("<")?;
        }
        f.write_str("..")?;
        if !self.max_inclusive && self.max.is_some() {
            f.write_str("<")?;
        }
        match &self.max {
            Some(max) => write!(f, "{}", max),
            None => f.write_str("MAX"),
        }
    }
}

/// A compiled `PATTERN` constraint
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compile a pattern that has to match the whole string
    pub fn new(source: &str) -> Asn1Result<Self> {
        let regex = Regex::new(&format!("^(?:{})$", source))
            .map_err(|e| Asn1Error::Validation(format!("invalid pattern {:?}: {}", source, e)))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Resolved constraint on one component in `WITH COMPONENTS`
#[derive(Debug, Clone)]
pub struct ComponentConstraint {
    pub name: String,
    pub constraint: Option<Constraint>,
    pub presence: Option<PresenceConstraint>,
}

/// A resolved constraint tree
#[derive(Debug, Clone)]
pub enum Constraint {
    /// Root set, optionally extensible with an additional set
    ElementSetSpecs {
        root: Box<Constraint>,
        extensible: bool,
        additional: Option<Box<Constraint>>,
    },
    Union(Vec<Constraint>),
    Intersection(Vec<Constraint>),
    Exclusion {
        base: Box<Constraint>,
        excluded: Box<Constraint>,
    },
    /// `ALL`: every value
    All,
    SingleValue(Value),
    /// Single string value inside a permitted alphabet: its characters
    CharSet(BTreeSet<char>),
    ValueRange(ValueRange),
    Size(Box<Constraint>),
    PermittedAlphabet(Box<Constraint>),
    Pattern(Pattern),
    /// `WITH COMPONENT`: applies to every element of a SEQUENCE OF / SET OF
    InnerType(Box<Constraint>),
    /// `WITH COMPONENTS`
    InnerTypes {
        components: Vec<ComponentConstraint>,
        partial: bool,
    },
    ContainedSubtype {
        ty: TypeId,
        name: String,
        includes: bool,
    },
    Table(TableConstraint),
}

fn is_violation(error: &Asn1Error) -> bool {
    matches!(error, Asn1Error::ConstraintViolation { .. })
}

impl Constraint {
    pub fn kind(&self) -> ConstraintKind {
        match self {
            Constraint::ElementSetSpecs { .. } => ConstraintKind::ElementSetSpecs,
            Constraint::Union(_) => ConstraintKind::Union,
            Constraint::Intersection(_) => ConstraintKind::Intersection,
            Constraint::Exclusion { .. } => ConstraintKind::Exclusion,
            Constraint::All => ConstraintKind::All,
            Constraint::SingleValue(_) => ConstraintKind::SingleValue,
            Constraint::CharSet(_) => ConstraintKind::CharSet,
            Constraint::ValueRange(_) => ConstraintKind::ValueRange,
            Constraint::Size(_) => ConstraintKind::Size,
            Constraint::PermittedAlphabet(_) => ConstraintKind::PermittedAlphabet,
            Constraint::Pattern(_) => ConstraintKind::Pattern,
            Constraint::InnerType(_) => ConstraintKind::InnerType,
            Constraint::InnerTypes { .. } => ConstraintKind::InnerTypes,
            Constraint::ContainedSubtype { .. } => ConstraintKind::ContainedSubtype,
            Constraint::Table(_) => ConstraintKind::Table,
        }
    }

    /// Nodes combined by set operators
    fn operands(&self) -> Vec<&Constraint> {
        match self {
            Constraint::ElementSetSpecs {
                root, additional, ..
            } => std::iter::once(root.as_ref())
                .chain(additional.as_deref())
                .collect(),
            Constraint::Union(items) | Constraint::Intersection(items) => items.iter().collect(),
            Constraint::Exclusion { base, excluded } => vec![base.as_ref(), excluded.as_ref()],
            _ => Vec::new(),
        }
    }

    /// Check a value, failing with `ConstraintViolation` if it is not admitted
    pub fn check(&self, scope: &Scope<'_>, value: &Value) -> Asn1Result<()> {
        match self {
            Constraint::ElementSetSpecs {
                root, additional, ..
            } => match root.check(scope, value) {
                Err(e) if is_violation(&e) => match additional {
                    Some(additional) => additional.check(scope, value),
                    None => Err(e),
                },
                result => result,
            },
            Constraint::Union(items) => {
                for item in items {
                    match item.check(scope, value) {
                        Ok(()) => return Ok(()),
                        Err(e) if is_violation(&e) => continue,
                        Err(e) => return Err(e),
                    }
                }
                Err(Asn1Error::violation(self, value))
            }
            Constraint::Intersection(items) => {
                for item in items {
                    item.check(scope, value)?;
                }
                Ok(())
            }
            Constraint::Exclusion { base, excluded } => {
                base.check(scope, value)?;
                match excluded.check(scope, value) {
                    Ok(()) => Err(Asn1Error::violation(self, value)),
                    Err(e) if is_violation(&e) => Ok(()),
                    Err(e) => Err(e),
                }
            }
            Constraint::All => Ok(()),
            Constraint::SingleValue(expected) => {
                if expected == value {
                    Ok(())
                } else {
                    Err(Asn1Error::violation(self, value))
                }
            }
            Constraint::CharSet(chars) => {
                let text = string_value(self, value)?;
                if text.chars().all(|c| chars.contains(&c)) {
                    Ok(())
                } else {
                    Err(Asn1Error::violation(self, value))
                }
            }
            Constraint::ValueRange(range) => {
                if range.contains(value) {
                    Ok(())
                } else {
                    Err(Asn1Error::violation(self, value))
                }
            }
            Constraint::Size(inner) => {
                let size = value.size().ok_or_else(|| {
                    Asn1Error::IllegalValue(format!("{} has no size for {}", value, self))
                })?;
                inner
                    .check(scope, &Value::Integer(size as i64))
                    .map_err(|e| {
                        if is_violation(&e) {
                            Asn1Error::violation(self, format!("{} (size {})", value, size))
                        } else {
                            e
                        }
                    })
            }
            Constraint::PermittedAlphabet(inner) => {
                let text = string_value(self, value)?;
                for (position, c) in text.chars().enumerate() {
                    inner
                        .check(scope, &Value::CString(c.to_string()))
                        .map_err(|e| {
                            if is_violation(&e) {
                                Asn1Error::violation(
                                    self,
                                    format!("{} (character {:?} at position {})", value, c, position),
                                )
                            } else {
                                e
                            }
                        })?;
                }
                Ok(())
            }
            Constraint::Pattern(pattern) => {
                let text = string_value(self, value)?;
                if pattern.is_match(text) {
                    Ok(())
                } else {
                    Err(Asn1Error::violation(self, value))
                }
            }
            Constraint::InnerType(inner) => match value {
                Value::Collection(items) => {
                    for item in items {
                        inner.check(scope, item)?;
                    }
                    Ok(())
                }
                other => Err(Asn1Error::IllegalValue(format!(
                    "{} applies to collections, not {}",
                    self, other
                ))),
            },
            Constraint::InnerTypes {
                components,
                partial,
            } => self.check_components(scope, components, *partial, value),
            Constraint::ContainedSubtype { ty, includes, .. } => {
                let result = if *includes {
                    check_value(scope, *ty, value)
                } else {
                    accept(scope, *ty, value)
                };
                result.map_err(|e| match e {
                    Asn1Error::IllegalValue(_) | Asn1Error::ConstraintViolation { .. } => {
                        Asn1Error::violation(self, value)
                    }
                    other => other,
                })
            }
            Constraint::Table(table) => table.check(scope, value),
        }
    }

    fn check_components(
        &self,
        scope: &Scope<'_>,
        components: &[ComponentConstraint],
        partial: bool,
        value: &Value,
    ) -> Asn1Result<()> {
        let present: Vec<(&str, &Value)> = match value {
            Value::NamedCollection(given) => given
                .iter()
                .map(|g| (g.name.as_str(), &g.value))
                .collect(),
            Value::Named(chosen) => vec![(chosen.name.as_str(), &chosen.value)],
            other => {
                return Err(Asn1Error::IllegalValue(format!(
                    "{} applies to SEQUENCE, SET or CHOICE values, not {}",
                    self, other
                )));
            }
        };
        let find = |name: &str| present.iter().find(|(n, _)| *n == name).map(|(_, v)| *v);

        for component in components {
            let found = find(&component.name);
            match (component.presence, found) {
                (Some(PresenceConstraint::Present), None) => {
                    return Err(Asn1Error::violation(
                        self,
                        format!("{} (component {} is absent)", value, component.name),
                    ));
                }
                (Some(PresenceConstraint::Absent), Some(_)) => {
                    return Err(Asn1Error::violation(
                        self,
                        format!("{} (component {} is present)", value, component.name),
                    ));
                }
                _ => {}
            }
            if let (Some(constraint), Some(found)) = (&component.constraint, found) {
                constraint.check(scope, found)?;
            }
        }

        if !partial {
            if let Some((name, _)) = present
                .iter()
                .find(|(name, _)| !components.iter().any(|c| c.name == *name))
            {
                return Err(Asn1Error::violation(
                    self,
                    format!("{} (component {} is not listed)", value, name),
                ));
            }
        }
        Ok(())
    }

    /// Re-target this constraint to another type
    ///
    /// Table constraints take the class field of the new type when it is one;
    /// everything else carries over unchanged.
    pub fn copy_for_type(&self, module: &Module, ty: TypeId) -> Constraint {
        let copy = |c: &Constraint| c.copy_for_type(module, ty);
        match self {
            Constraint::ElementSetSpecs {
                root,
                extensible,
                additional,
            } => Constraint::ElementSetSpecs {
                root: Box::new(copy(root)),
                extensible: *extensible,
                additional: additional.as_deref().map(|a| Box::new(copy(a))),
            },
            Constraint::Union(items) => Constraint::Union(items.iter().map(copy).collect()),
            Constraint::Intersection(items) => {
                Constraint::Intersection(items.iter().map(copy).collect())
            }
            Constraint::Exclusion { base, excluded } => Constraint::Exclusion {
                base: Box::new(copy(base)),
                excluded: Box::new(copy(excluded)),
            },
            Constraint::Table(table) => Constraint::Table(table.retarget(module, ty)),
            other => other.clone(),
        }
    }

    /// Fail validation if any node reachable through set operators has a
    /// kind outside `allowed`
    pub fn assert_constraint_types(&self, allowed: &[ConstraintKind]) -> Asn1Result<()> {
        if !allowed.contains(&self.kind()) {
            return Err(Asn1Error::Validation(format!(
                "{:?} constraint {} is not allowed in this context",
                self.kind(),
                self
            )));
        }
        for operand in self.operands() {
            operand.assert_constraint_types(allowed)?;
        }
        Ok(())
    }

    /// Range view of this constraint, if it is (or wraps) a single range
    pub fn as_range(&self) -> Option<&ValueRange> {
        match self {
            Constraint::ValueRange(range) => Some(range),
            Constraint::Size(inner) => inner.as_range(),
            Constraint::ElementSetSpecs {
                root,
                additional: None,
                ..
            } => root.as_range(),
            Constraint::Union(items) | Constraint::Intersection(items) if items.len() == 1 => {
                items[0].as_range()
            }
            _ => None,
        }
    }

    /// Lower bound of a range constraint; `Ok(None)` for an open bound
    pub fn minimum_value(&self) -> Asn1Result<Option<&Value>> {
        self.as_range()
            .map(ValueRange::min)
            .ok_or_else(|| Asn1Error::Unsupported(format!("{} has no minimum value", self)))
    }

    /// Upper bound of a range constraint; `Ok(None)` for an open bound
    pub fn maximum_value(&self) -> Asn1Result<Option<&Value>> {
        self.as_range()
            .map(ValueRange::max)
            .ok_or_else(|| Asn1Error::Unsupported(format!("{} has no maximum value", self)))
    }

    /// First table constraint reachable through set operators
    pub fn find_table(&self) -> Option<&TableConstraint> {
        match self {
            Constraint::Table(table) => Some(table),
            _ => self.operands().into_iter().find_map(Constraint::find_table),
        }
    }
}

fn string_value<'v>(constraint: &Constraint, value: &'v Value) -> Asn1Result<&'v str> {
    match value {
        Value::CString(text) => Ok(text),
        other => Err(Asn1Error::IllegalValue(format!(
            "{} applies to character strings, not {}",
            constraint, other
        ))),
    }
}

fn join(items: &[Constraint], separator: &str) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(separator)
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::ElementSetSpecs {
                root,
                extensible,
                additional,
            } => {
                write!(f, "{}", root)?;
                if *extensible {
                    f.write_str(", ...")?;
                }
                if let Some(additional) = additional {
                    write!(f, ", {}", additional)?;
                }
                Ok(())
            }
            Constraint::Union(items) => write!(f, "({})", join(items, " | ")),
            Constraint::Intersection(items) => write!(f, "({})", join(items, " ^ ")),
            Constraint::Exclusion { base, excluded } => write!(f, "{} EXCEPT {}", base, excluded),
            Constraint::All => f.write_str("ALL"),
            Constraint::SingleValue(value) => write!(f, "{}", value),
            Constraint::CharSet(chars) => write!(f, "\"{}\"", chars.iter().collect::<String>()),
            Constraint::ValueRange(range) => write!(f, "{}", range),
            Constraint::Size(inner) => write!(f, "SIZE({})", inner),
            Constraint::PermittedAlphabet(inner) => write!(f, "FROM({})", inner),
            Constraint::Pattern(pattern) => write!(f, "PATTERN {:?}", pattern.source),
            Constraint::InnerType(inner) => write!(f, "WITH COMPONENT ({})", inner),
            Constraint::InnerTypes {
                components,
                partial,
            } => {
                f.write_str("WITH COMPONENTS { ")?;
                if *partial {
                    f.write_str("..., ")?;
                }
                let rendered: Vec<String> = components
                    .iter()
                    .map(|c| {
                        let mut text = c.name.clone();
                        if let Some(constraint) = &c.constraint {
                            text.push_str(&format!(" ({})", constraint));
                        }
                        if let Some(presence) = c.presence {
                            text.push_str(&format!(" {}", presence));
                        }
                        text
                    })
                    .collect();
                write!(f, "{} }}", rendered.join(", "))
            }
            Constraint::ContainedSubtype { name, includes, .. } => {
                if *includes {
                    write!(f, "INCLUDES {}", name)
                } else {
                    f.write_str(name)
                }
            }
            Constraint::Table(table) => write!(f, "{}", table),
        }
    }
}
