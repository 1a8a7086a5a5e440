//! ASN.1 schema model for asnkit
//!
//! This crate holds everything that interprets a module: the type arena,
//! name resolution through scopes, parameterized types, the constraint
//! engine and value checking. Modules are assembled through the builder API
//! on [`Module`] and validated once before any value is encoded or decoded
//! against them.

pub mod check;
pub mod constraint;
pub mod disposable;
pub mod module;
pub mod optimize;
pub mod parameter;
pub mod scope;
pub mod structure;
pub mod tagging;
pub mod types;

pub use check::check_value;
pub use constraint::{factory, Constraint, ConstraintTemplate, TableConstraint};
pub use disposable::{Disposable, DisposableArena, DisposableId};
pub use module::{Exports, Module};
pub use optimize::{accept, optimize};
pub use parameter::{ParameterKind, TemplateArgument, TemplateParameter, TypeTemplate};
pub use scope::{Binding, Enclosing, Scope, ScopeOptions, Symbol};
pub use structure::{family, underlying};
pub use tagging::{declared_tag, possible_tags, tag_chain};
pub use types::{
    ClassField, Component, NamedNumber, ObjectClass, Presence, StringKind, Type, TypeFamily,
    TypeId, TypeKind,
};
