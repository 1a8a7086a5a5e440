//! Value optimization and acceptance
//!
//! [`optimize`] turns a literal value as written (references, named numbers,
//! hex literals, time strings, ...) into the canonical value kind of a type.
//! [`accept`] checks that an already canonical value has the right shape for
//! the type, without looking at constraints.

use crate::constraint::open_type_for;
use crate::scope::{Enclosing, Scope};
use crate::structure::{class_field, referenced_class_field};
use crate::types::{ClassField, Component, NamedNumber, ObjectClass, Type, TypeId, TypeKind};
use asnkit_core::{
    Asn1Error, Asn1Result, BitString, NamedValue, ObjectField, ObjectIdentifier, ObjectValue,
    RealValue, Value,
};
use std::collections::HashSet;

/// Convert a value into the canonical form for a type
pub fn optimize(scope: &Scope<'_>, id: TypeId, value: &Value) -> Asn1Result<Value> {
    let ty = scope.module().get(id)?;
    match ty.kind() {
        TypeKind::Defined(target) => optimize(scope, scope.resolve_type(target)?, value),
        TypeKind::Instance {
            template,
            arguments,
        } => {
            let (body, inner) = scope.instantiate(template, arguments)?;
            optimize(&inner, body, value)
        }
        TypeKind::ClassField { class, field } => match class_field(scope, class, field)? {
            ClassField::Value { ty, .. } => optimize(scope, scope.resolve_type(ty)?, value),
            // the actual type is only known once the table constraint selects it
            ClassField::Type { .. } => scope.resolve_value(value),
        },
        kind => optimize_structural(scope, kind, value),
    }
}

fn optimize_structural(scope: &Scope<'_>, kind: &TypeKind, value: &Value) -> Asn1Result<Value> {
    if let Some(literal) = symbolic_literal(kind, value) {
        return Ok(literal);
    }

    let optimized = match (kind, scope.resolve_value(value)?) {
        (TypeKind::Boolean, v @ Value::Boolean(_)) => v,
        (TypeKind::Integer(_), v @ Value::Integer(_)) => v,
        (TypeKind::Enumerated(items), Value::Integer(i)) => {
            if !items.iter().any(|item| item.value == i) {
                return Err(Asn1Error::IllegalValue(format!(
                    "{} is not an item of the enumeration",
                    i
                )));
            }
            Value::Integer(i)
        }
        (TypeKind::Real, v @ Value::Real(_)) => v,
        (TypeKind::Real, Value::Integer(i)) => Value::Real(RealValue::new(i as f64)),
        (TypeKind::Real, Value::CString(text)) => Value::Real(RealValue::from_decimal_str(&text)?),
        (TypeKind::Real, Value::NamedCollection(parts)) => real_from_parts(scope, &parts)?,
        (TypeKind::Null, Value::Null) => Value::Null,
        (TypeKind::BitString, v @ Value::BitString(_)) => v,
        (TypeKind::BitString, Value::OctetString(bytes)) => {
            let num_bits = bytes.len() * 8;
            Value::BitString(BitString::new(bytes, num_bits)?)
        }
        (TypeKind::BitString, Value::CString(text)) => Value::BitString(bit_string_literal(&text)?),
        (TypeKind::OctetString, v @ Value::OctetString(_)) => v,
        (TypeKind::OctetString, Value::CString(text)) => {
            let bits = bit_string_literal(&text)?;
            Value::OctetString(bits.as_bytes().to_vec())
        }
        (TypeKind::ObjectIdentifier, v @ Value::ObjectIdentifier(_)) => v,
        (TypeKind::ObjectIdentifier, Value::CString(text)) => {
            Value::ObjectIdentifier(text.parse::<ObjectIdentifier>()?)
        }
        (TypeKind::ObjectIdentifier, Value::Collection(arcs)) => oid_from_arcs(scope, &arcs)?,
        (TypeKind::String(_), v @ Value::CString(_)) => v,
        (TypeKind::Time(_), v @ Value::Time(_)) => v,
        (TypeKind::Time(kind), Value::CString(text)) => Value::Time(kind.parse(&text, false)?),
        (TypeKind::Sequence(components) | TypeKind::Set(components), Value::NamedCollection(given)) => {
            optimize_components(scope, components, &given)?
        }
        (TypeKind::Choice(alternatives), Value::Named(named)) => {
            let alternative = alternatives
                .iter()
                .find(|a| a.name == named.name)
                .ok_or_else(|| {
                    Asn1Error::IllegalValue(format!("CHOICE has no alternative {}", named.name))
                })?;
            let element = scope.resolve_type(&alternative.ty)?;
            Value::named(named.name.clone(), optimize(scope, element, &named.value)?)
        }
        (TypeKind::SequenceOf(element) | TypeKind::SetOf(element), Value::Collection(items)) => {
            let element = scope.resolve_type(element)?;
            Value::Collection(
                items
                    .iter()
                    .map(|item| optimize(scope, element, item))
                    .collect::<Asn1Result<Vec<_>>>()?,
            )
        }
        (TypeKind::ObjectClass(class), Value::Object(object)) => {
            Value::Object(optimize_object(scope, class, &object)?)
        }
        (TypeKind::ObjectClass(class), Value::ObjectSet(objects)) => Value::ObjectSet(
            objects
                .iter()
                .map(|object| optimize_object(scope, class, object))
                .collect::<Asn1Result<Vec<_>>>()?,
        ),
        (TypeKind::ObjectClass(class), Value::Collection(items)) => {
            let mut objects = Vec::new();
            for item in &items {
                match scope.resolve_value(item)? {
                    Value::Object(object) => objects.push(optimize_object(scope, class, &object)?),
                    Value::ObjectSet(set) => {
                        for object in &set {
                            objects.push(optimize_object(scope, class, object)?);
                        }
                    }
                    other => {
                        return Err(Asn1Error::IllegalValue(format!(
                            "{} is not an object of the class",
                            other
                        )));
                    }
                }
            }
            Value::ObjectSet(objects)
        }
        (kind, other) => {
            return Err(Asn1Error::IllegalValue(format!(
                "{} is not a valid {} value",
                other,
                kind.keyword()
            )));
        }
    };
    Ok(optimized)
}

/// Identifiers that only make sense against a particular type
fn symbolic_literal(kind: &TypeKind, value: &Value) -> Option<Value> {
    match (kind, value) {
        (TypeKind::Integer(named), Value::Reference(name))
        | (TypeKind::Enumerated(named), Value::Reference(name) | Value::CString(name)) => {
            named_number(named, name).map(Value::Integer)
        }
        (TypeKind::Real, Value::Reference(name)) => match name.as_str() {
            "PLUS-INFINITY" => Some(Value::Real(RealValue::PLUS_INFINITY)),
            "MINUS-INFINITY" => Some(Value::Real(RealValue::MINUS_INFINITY)),
            "NOT-A-NUMBER" => Some(Value::real(f64::NAN)),
            _ => None,
        },
        _ => None,
    }
}

fn named_number(named: &[NamedNumber], name: &str) -> Option<i64> {
    named.iter().find(|n| n.name == name).map(|n| n.value)
}

/// `{ mantissa m, base b, exponent e }`
fn real_from_parts(scope: &Scope<'_>, parts: &[NamedValue]) -> Asn1Result<Value> {
    let part = |name: &str| -> Asn1Result<i64> {
        let value = parts
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| Asn1Error::IllegalValue(format!("REAL value lacks {}", name)))?;
        match scope.resolve_value(&value.value)? {
            Value::Integer(i) => Ok(i),
            other => Err(Asn1Error::IllegalValue(format!(
                "REAL {} must be an integer, got {}",
                name, other
            ))),
        }
    };
    let base = u32::try_from(part("base")?)
        .map_err(|_| Asn1Error::IllegalValue("REAL base must be 2 or 10".to_string()))?;
    let exponent = i32::try_from(part("exponent")?)
        .map_err(|_| Asn1Error::IllegalValue("REAL exponent out of range".to_string()))?;
    Ok(Value::Real(RealValue::from_triple(part("mantissa")?, base, exponent)?))
}

/// `'0101'B` or `'0AF'H`
fn bit_string_literal(text: &str) -> Asn1Result<BitString> {
    let body = |suffix: char| {
        text.strip_prefix('\'')
            .and_then(|rest| rest.strip_suffix(suffix))
            .and_then(|rest| rest.strip_suffix('\''))
    };
    if let Some(binary) = body('B') {
        return BitString::from_binary_literal(binary);
    }
    if let Some(hex) = body('H') {
        let mut bytes = vec![0u8; hex.len().div_ceil(2)];
        for (index, c) in hex.chars().enumerate() {
            let nibble = c.to_digit(16).ok_or_else(|| {
                Asn1Error::IllegalValue(format!("Invalid hex digit '{}' in {}", c, text))
            })? as u8;
            bytes[index / 2] |= if index % 2 == 0 { nibble << 4 } else { nibble };
        }
        return BitString::new(bytes, hex.len() * 4);
    }
    Err(Asn1Error::IllegalValue(format!(
        "{} is neither a binary nor a hexadecimal string literal",
        text
    )))
}

fn oid_from_arcs(scope: &Scope<'_>, arcs: &[Value]) -> Asn1Result<Value> {
    let arcs = arcs
        .iter()
        .map(|arc| match scope.resolve_value(arc)? {
            Value::Integer(i) => u64::try_from(i)
                .map_err(|_| Asn1Error::IllegalValue(format!("negative OID arc {}", i))),
            other => Err(Asn1Error::IllegalValue(format!("{} is not an OID arc", other))),
        })
        .collect::<Asn1Result<Vec<_>>>()?;
    Ok(Value::ObjectIdentifier(ObjectIdentifier::new(arcs)?))
}

fn optimize_components(
    scope: &Scope<'_>,
    components: &[Component],
    given: &[NamedValue],
) -> Asn1Result<Value> {
    check_component_names(components, given)?;
    let mut optimized = Vec::with_capacity(given.len());
    for component in components {
        if let Some(named) = given.iter().find(|g| g.name == component.name) {
            let ty = scope.resolve_type(&component.ty)?;
            optimized.push(NamedValue::new(
                component.name.clone(),
                optimize(scope, ty, &named.value)?,
            ));
        }
    }

    // open type components take the type their relation selects among
    // the already optimized siblings
    let mut selected = Vec::new();
    {
        let inner = scope
            .child()
            .with_enclosing(Enclosing::new(components, &optimized));
        for (index, named) in optimized.iter().enumerate() {
            let Some(component) = components.iter().find(|c| c.name == named.name) else {
                continue;
            };
            let ty = inner.resolve_type(&component.ty)?;
            if !matches!(referenced_class_field(&inner, ty)?, Some(ClassField::Type { .. })) {
                continue;
            }
            if let Ok(Some(actual)) = open_type_for(&inner, ty) {
                log::trace!("Component {} is optimized as {}", named.name, actual);
                selected.push((index, optimize(&inner, actual, &named.value)?));
            }
        }
    }
    for (index, value) in selected {
        optimized[index].value = value;
    }
    Ok(Value::NamedCollection(optimized))
}

fn optimize_object(
    scope: &Scope<'_>,
    class: &ObjectClass,
    object: &ObjectValue,
) -> Asn1Result<ObjectValue> {
    let mut optimized = ObjectValue::new();
    for (name, setting) in object.sorted_fields() {
        let field = class.field(name).ok_or_else(|| {
            Asn1Error::IllegalValue(format!("object sets unknown class field {}", name))
        })?;
        let setting = match (field, setting) {
            (ClassField::Value { ty, .. }, ObjectField::Value(value)) => {
                ObjectField::Value(optimize(scope, scope.resolve_type(ty)?, value)?)
            }
            (ClassField::Type { .. }, ObjectField::Type(type_name)) => {
                scope.resolve_type(&asnkit_core::Ref::named(type_name.as_str()))?;
                ObjectField::Type(type_name.clone())
            }
            (field, setting) => {
                return Err(Asn1Error::IllegalValue(format!(
                    "{} cannot be used for class field {}",
                    setting,
                    field.name()
                )));
            }
        };
        optimized.insert(name.clone(), setting);
    }
    for field in &class.fields {
        if !field.is_optional() && optimized.field(field.name()).is_none() {
            return Err(Asn1Error::IllegalValue(format!(
                "object lacks mandatory field {}",
                field.name()
            )));
        }
    }
    Ok(optimized)
}

fn check_component_names(components: &[Component], given: &[NamedValue]) -> Asn1Result<()> {
    let mut seen = HashSet::new();
    for named in given {
        if !components.iter().any(|c| c.name == named.name) {
            return Err(Asn1Error::IllegalValue(format!(
                "no component named {}",
                named.name
            )));
        }
        if !seen.insert(named.name.as_str()) {
            return Err(Asn1Error::IllegalValue(format!(
                "component {} given twice",
                named.name
            )));
        }
    }
    Ok(())
}

/// Check that a value has the shape required by a type
///
/// Nested components are not visited; [`check_value`](crate::check::check_value)
/// walks the structure and calls this at every level.
pub fn accept(scope: &Scope<'_>, id: TypeId, value: &Value) -> Asn1Result<()> {
    let ty = scope.module().get(id)?;
    match ty.kind() {
        TypeKind::Defined(target) => accept(scope, scope.resolve_type(target)?, value),
        TypeKind::Instance {
            template,
            arguments,
        } => {
            let (body, inner) = scope.instantiate(template, arguments)?;
            accept(&inner, body, value)
        }
        TypeKind::ClassField { class, field } => match class_field(scope, class, field)? {
            ClassField::Value { ty, .. } => accept(scope, scope.resolve_type(ty)?, value),
            ClassField::Type { .. } => match value {
                Value::Reference(name) => Err(Asn1Error::IllegalValue(format!(
                    "unresolved reference {} in open type value",
                    name
                ))),
                _ => Ok(()),
            },
        },
        _ => accept_structural(ty, value),
    }
}

fn accept_structural(ty: &Type, value: &Value) -> Asn1Result<()> {
    let family = ty
        .kind()
        .family()
        .ok_or_else(|| Asn1Error::Unsupported(format!("no family for {}", ty)))?;
    if !family.accepts(value.kind()) {
        return Err(Asn1Error::IllegalValue(format!(
            "{} value {} is not acceptable for {}",
            value.kind(),
            value,
            ty
        )));
    }
    match (ty.kind(), value) {
        (TypeKind::Enumerated(items), Value::Integer(i)) => {
            if items.iter().any(|item| item.value == *i) {
                Ok(())
            } else {
                Err(Asn1Error::IllegalValue(format!(
                    "{} is not an item of {}",
                    i, ty
                )))
            }
        }
        (TypeKind::String(kind), Value::CString(text)) => {
            match text.chars().find(|c| !kind.permits(*c)) {
                Some(c) => Err(Asn1Error::IllegalValue(format!(
                    "character {:?} is not allowed in {}",
                    c,
                    kind.name()
                ))),
                None => Ok(()),
            }
        }
        (TypeKind::Sequence(components) | TypeKind::Set(components), Value::NamedCollection(given)) => {
            check_component_names(components, given)?;
            match components
                .iter()
                .find(|c| c.presence.is_mandatory() && !given.iter().any(|g| g.name == c.name))
            {
                Some(missing) => Err(Asn1Error::IllegalValue(format!(
                    "mandatory component {} is missing",
                    missing.name
                ))),
                None => Ok(()),
            }
        }
        (TypeKind::Choice(alternatives), Value::Named(named)) => {
            if alternatives.iter().any(|a| a.name == named.name) {
                Ok(())
            } else {
                Err(Asn1Error::IllegalValue(format!(
                    "CHOICE has no alternative {}",
                    named.name
                )))
            }
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Module;
    use asnkit_core::{Ref, TimeKind, TimeValue};

    fn module() -> Module {
        let mut module = Module::new("Test");
        module
            .define_type(
                "Color",
                Type::enumerated(vec![NamedNumber::new("red", 0), NamedNumber::new("blue", 5)]),
            )
            .unwrap();
        module
            .define_type(
                "Pair",
                Type::sequence(vec![
                    Component::mandatory("a", Ref::named("INTEGER")),
                    Component::optional("b", Ref::named("BOOLEAN")),
                ]),
            )
            .unwrap();
        module.define_value("five", Ref::named("INTEGER"), Value::Integer(5)).unwrap();
        module
    }

    #[test]
    fn test_optimize_literals() {
        let module = module();
        let scope = Scope::new(&module);
        let ty = |name| module.type_id(name).unwrap();

        assert_eq!(
            optimize(&scope, ty("Color"), &Value::reference("blue")).unwrap(),
            Value::Integer(5)
        );
        assert_eq!(
            optimize(&scope, ty("INTEGER"), &Value::reference("five")).unwrap(),
            Value::Integer(5)
        );
        assert_eq!(
            optimize(&scope, ty("OCTET STRING"), &Value::string("'0AFF'H")).unwrap(),
            Value::OctetString(vec![0x0A, 0xFF])
        );
        assert_eq!(
            optimize(&scope, ty("BIT STRING"), &Value::string("'101'B")).unwrap(),
            Value::BitString(BitString::from_binary_literal("101").unwrap())
        );
        assert_eq!(
            optimize(&scope, ty("REAL"), &Value::string("1.5")).unwrap(),
            Value::real(1.5)
        );
        assert_eq!(
            optimize(&scope, ty("OBJECT IDENTIFIER"), &Value::string("1.2.840")).unwrap(),
            Value::ObjectIdentifier(ObjectIdentifier::new(vec![1, 2, 840]).unwrap())
        );
    }

    #[test]
    fn test_optimize_time_literal() {
        let module = module();
        let scope = Scope::new(&module);
        let utc = module.type_id("UTCTime").unwrap();
        let expected = TimeValue::from_ymd_hms(1999, 12, 31, 23, 59, 58).unwrap();
        assert_eq!(
            optimize(&scope, utc, &Value::string("991231235958Z")).unwrap(),
            Value::Time(expected)
        );
        assert!(matches!(
            optimize(&scope, utc, &Value::string("not a time")),
            Err(Asn1Error::IllegalValue(_))
        ));
        assert_eq!(TimeKind::UtcTime.name(), "UTCTime");
    }

    #[test]
    fn test_optimize_orders_components() {
        let module = module();
        let scope = Scope::new(&module);
        let pair = module.type_id("Pair").unwrap();
        let value = Value::collection([("b", Value::Boolean(true)), ("a", Value::reference("five"))]);
        assert_eq!(
            optimize(&scope, pair, &value).unwrap(),
            Value::collection([("a", Value::Integer(5)), ("b", Value::Boolean(true))])
        );

        let unknown = Value::collection([("c", Value::Null)]);
        assert!(matches!(
            optimize(&scope, pair, &unknown),
            Err(Asn1Error::IllegalValue(_))
        ));
    }

    #[test]
    fn test_illegal_kind() {
        let module = module();
        let scope = Scope::new(&module);
        let boolean = module.type_id("BOOLEAN").unwrap();
        assert!(matches!(
            optimize(&scope, boolean, &Value::Integer(1)),
            Err(Asn1Error::IllegalValue(_))
        ));
        assert!(matches!(
            optimize(&scope, boolean, &Value::reference("nowhere")),
            Err(Asn1Error::UnresolvedReference(_))
        ));
    }

    #[test]
    fn test_accept() {
        let module = module();
        let scope = Scope::new(&module);
        let ty = |name| module.type_id(name).unwrap();

        accept(&scope, ty("Color"), &Value::Integer(0)).unwrap();
        assert!(accept(&scope, ty("Color"), &Value::Integer(1)).is_err());
        assert!(accept(&scope, ty("PrintableString"), &Value::string("a@b")).is_err());
        accept(&scope, ty("PrintableString"), &Value::string("Hello World")).unwrap();
        assert!(accept(&scope, ty("Pair"), &Value::collection([("b", Value::Boolean(true))])).is_err());
        accept(&scope, ty("Pair"), &Value::collection([("a", Value::Integer(1))])).unwrap();
    }
}
