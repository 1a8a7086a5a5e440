//! Parameterized type definitions

use crate::types::TypeId;
use asnkit_core::{Ref, Value};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// What a formal parameter stands for
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterKind {
    /// A type argument (`{Type}`)
    Type,
    /// A value argument, optionally governed by a type (`{INTEGER:max}`)
    Value { governor: Option<Ref<TypeId>> },
}

/// Formal parameter of a parameterized type
///
/// Parameters are identified by their position: two parameters are equal,
/// ordered and hashed by index alone, whatever their names.
#[derive(Debug, Clone)]
pub struct TemplateParameter {
    index: usize,
    name: String,
    kind: ParameterKind,
}

impl TemplateParameter {
    pub fn new(index: usize, name: impl Into<String>, kind: ParameterKind) -> Self {
        Self {
            index,
            name: name.into(),
            kind,
        }
    }

    pub fn of_type(index: usize, name: impl Into<String>) -> Self {
        Self::new(index, name, ParameterKind::Type)
    }

    pub fn of_value(index: usize, name: impl Into<String>, governor: Option<Ref<TypeId>>) -> Self {
        Self::new(index, name, ParameterKind::Value { governor })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ParameterKind {
        &self.kind
    }
}

impl PartialEq for TemplateParameter {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for TemplateParameter {}

impl PartialOrd for TemplateParameter {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TemplateParameter {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index.cmp(&other.index)
    }
}

impl Hash for TemplateParameter {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl fmt::Display for TemplateParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ParameterKind::Type => f.write_str(&self.name),
            ParameterKind::Value { governor: Some(g) } => write!(f, "{}:{}", g, self.name),
            ParameterKind::Value { governor: None } => f.write_str(&self.name),
        }
    }
}

/// Actual argument of an instance
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateArgument {
    Type(Ref<TypeId>),
    Value(Value),
}

/// A parameterized type definition: formal parameters plus the body type
#[derive(Debug, Clone)]
pub struct TypeTemplate {
    pub(crate) parameters: Vec<TemplateParameter>,
    pub(crate) body: TypeId,
}

impl TypeTemplate {
    pub fn parameters(&self) -> &[TemplateParameter] {
        &self.parameters
    }

    pub fn body(&self) -> TypeId {
        self.body
    }
}
