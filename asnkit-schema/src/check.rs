//! Value checking
//!
//! Checking a value against a type runs three steps at every level of the
//! value: structural acceptance, the effective constraint of the type, and
//! then the components or elements of the value. Components are checked in
//! a scope that exposes the enclosing collection, which is what component
//! relation constraints select their object from.

use crate::optimize::accept;
use crate::scope::{Enclosing, Scope};
use crate::structure::class_field;
use crate::types::{ClassField, TypeId, TypeKind};
use asnkit_core::{Asn1Result, Value};

/// Check that `value` is a valid, constraint-satisfying value of type `id`
///
/// The value is expected to be optimized already.
pub fn check_value(scope: &Scope<'_>, id: TypeId, value: &Value) -> Asn1Result<()> {
    accept(scope, id, value)?;
    if let Some(constraint) = scope.module().constraint(scope, id)? {
        constraint.check(scope, value)?;
    }
    check_structure(scope, id, value)
}

fn check_structure(scope: &Scope<'_>, id: TypeId, value: &Value) -> Asn1Result<()> {
    let ty = scope.module().get(id)?;
    match (ty.kind(), value) {
        // the effective constraint already includes the referenced type's
        (TypeKind::Defined(target), _) => {
            check_structure(scope, scope.resolve_type(target)?, value)
        }
        (
            TypeKind::Instance {
                template,
                arguments,
            },
            _,
        ) => {
            let (body, inner) = scope.instantiate(template, arguments)?;
            check_value(&inner, body, value)
        }
        (TypeKind::ClassField { class, field }, _) => match class_field(scope, class, field)? {
            ClassField::Value { ty, .. } => check_value(scope, scope.resolve_type(ty)?, value),
            ClassField::Type { .. } => Ok(()),
        },
        (
            TypeKind::Sequence(components) | TypeKind::Set(components),
            Value::NamedCollection(given),
        ) => {
            let inner = scope
                .child()
                .with_enclosing(Enclosing::new(components, given));
            for component in components {
                if let Some(named) = given.iter().find(|g| g.name == component.name) {
                    log::trace!("Checking component {}", component.name);
                    check_value(&inner, inner.resolve_type(&component.ty)?, &named.value)?;
                }
            }
            Ok(())
        }
        (TypeKind::Choice(alternatives), Value::Named(chosen)) => {
            match alternatives.iter().find(|a| a.name == chosen.name) {
                Some(alternative) => {
                    check_value(scope, scope.resolve_type(&alternative.ty)?, &chosen.value)
                }
                None => Ok(()),
            }
        }
        (TypeKind::SequenceOf(element) | TypeKind::SetOf(element), Value::Collection(items)) => {
            let element = scope.resolve_type(element)?;
            for item in items {
                check_value(scope, element, item)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
