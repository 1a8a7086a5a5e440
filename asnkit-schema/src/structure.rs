//! Resolution of type indirections
//!
//! `Defined`, `Instance` and `ClassField` types say nothing about their shape
//! on their own; these helpers walk through them to the structural type.

use crate::scope::Scope;
use crate::types::{ClassField, ObjectClass, Type, TypeFamily, TypeId, TypeKind};
use asnkit_core::{Asn1Error, Asn1Result, Ref};

/// Family of a type, looking through references, instances and class fields
pub fn family(scope: &Scope<'_>, id: TypeId) -> Asn1Result<TypeFamily> {
    let ty = scope.module().get(id)?;
    match ty.kind() {
        TypeKind::Defined(target) => family(scope, scope.resolve_type(target)?),
        TypeKind::Instance {
            template,
            arguments,
        } => {
            let (body, inner) = scope.instantiate(template, arguments)?;
            family(&inner, body)
        }
        TypeKind::ClassField { class, field } => match class_field(scope, class, field)? {
            ClassField::Type { .. } => Ok(TypeFamily::OpenType),
            ClassField::Value { ty, .. } => family(scope, scope.resolve_type(ty)?),
        },
        kind => kind
            .family()
            .ok_or_else(|| Asn1Error::Unsupported(format!("no family for {}", ty))),
    }
}

/// Follow plain type references down to the first type that is not one
pub fn underlying<'m>(scope: &Scope<'m>, id: TypeId) -> Asn1Result<(TypeId, &'m Type)> {
    let mut visited = Vec::new();
    let mut current = id;
    loop {
        let ty = scope.module().get(current)?;
        match ty.kind() {
            TypeKind::Defined(target) => {
                if visited.contains(&current) {
                    return Err(Asn1Error::Validation(format!(
                        "circular type definition through {}",
                        ty
                    )));
                }
                visited.push(current);
                current = scope.resolve_type(target)?;
            }
            _ => return Ok((current, ty)),
        }
    }
}

/// The object class a type denotes
pub fn object_class<'m>(scope: &Scope<'m>, id: TypeId) -> Asn1Result<&'m ObjectClass> {
    let ty = scope.module().get(id)?;
    match ty.kind() {
        TypeKind::ObjectClass(class) => Ok(class),
        TypeKind::Defined(target) => object_class(scope, scope.resolve_type(target)?),
        _ => Err(Asn1Error::Validation(format!("{} is not an object class", ty))),
    }
}

/// Look up a field of a class (`CLASS.&field`)
pub fn class_field<'m>(
    scope: &Scope<'m>,
    class: &Ref<TypeId>,
    field: &str,
) -> Asn1Result<&'m ClassField> {
    let class_id = scope.resolve_type(class)?;
    object_class(scope, class_id)?
        .field(field)
        .ok_or_else(|| Asn1Error::UnresolvedReference(format!("{}.{}", class, field)))
}

/// The class field a type ultimately refers to, following plain references
///
/// Used to find the selector field of a component referenced by a relation
/// item, e.g. `id ATTRIBUTE.&id` yields the `&id` field.
pub fn referenced_class_field<'m>(
    scope: &Scope<'m>,
    id: TypeId,
) -> Asn1Result<Option<&'m ClassField>> {
    let ty = scope.module().get(id)?;
    match ty.kind() {
        TypeKind::ClassField { class, field } => class_field(scope, class, field).map(Some),
        TypeKind::Defined(target) => referenced_class_field(scope, scope.resolve_type(target)?),
        _ => Ok(None),
    }
}
