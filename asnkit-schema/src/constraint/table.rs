//! Table and component relation constraints (X.682)
//!
//! A table constraint ties a class field type to an object set. In the simple
//! form (`ATTRIBUTE.&id({Attributes})`) a value must equal the constrained
//! field of one object of the set. In the component relation form
//! (`ATTRIBUTE.&Type({Attributes}{@id})`) the sibling components named by the
//! relation items select one object, and that object's field decides what the
//! value must be: a type to check against, or a value to equal.

use crate::check::check_value;
use crate::module::Module;
use crate::optimize::optimize;
use crate::scope::Scope;
use crate::structure::{referenced_class_field, underlying};
use crate::types::{ClassField, TypeId, TypeKind};
use asnkit_core::{Asn1Error, Asn1Result, ObjectField, ObjectValue, Ref, Value};
use std::fmt;

/// A resolved table constraint
#[derive(Debug, Clone)]
pub struct TableConstraint {
    set_name: String,
    objects: Vec<ObjectValue>,
    field: String,
    relation_items: Vec<String>,
}

impl TableConstraint {
    pub(crate) fn resolve(
        scope: &Scope<'_>,
        ty: TypeId,
        object_set: &Value,
        relation_items: &[String],
    ) -> Asn1Result<Self> {
        let (_, target) = underlying(scope, ty)?;
        let (class, field) = match target.kind() {
            TypeKind::ClassField { class, field } => (class, field),
            _ => {
                return Err(Asn1Error::Validation(format!(
                    "table constraints apply to class field types, not {}",
                    target
                )));
            }
        };

        let class_id = scope.resolve_type(class)?;
        let objects = match optimize(scope, class_id, object_set)? {
            Value::ObjectSet(objects) => objects,
            Value::Object(object) => vec![object],
            other => {
                return Err(Asn1Error::IllegalValue(format!(
                    "{} is not an object set",
                    other
                )));
            }
        };
        let set_name = match object_set {
            Value::Reference(name) => name.clone(),
            other => other.to_string(),
        };

        log::trace!(
            "Resolved table constraint {} on {} with {} objects",
            set_name,
            field,
            objects.len()
        );
        Ok(Self {
            set_name,
            objects,
            field: field.clone(),
            relation_items: relation_items
                .iter()
                .map(|item| item.trim_start_matches('@').trim_start_matches('.').to_string())
                .collect(),
        })
    }

    /// Constrained class field (`&id`, `&Type`)
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn objects(&self) -> &[ObjectValue] {
        &self.objects
    }

    /// Sibling component names, without the `@` prefix
    pub fn relation_items(&self) -> &[String] {
        &self.relation_items
    }

    pub fn is_relational(&self) -> bool {
        !self.relation_items.is_empty()
    }

    pub(crate) fn retarget(&self, module: &Module, ty: TypeId) -> Self {
        let field = match module.get(ty).map(|t| t.kind()) {
            Ok(TypeKind::ClassField { field, .. }) => field.clone(),
            _ => self.field.clone(),
        };
        Self {
            field,
            ..self.clone()
        }
    }

    pub fn check(&self, scope: &Scope<'_>, value: &Value) -> Asn1Result<()> {
        if !self.is_relational() {
            return self.check_simple(scope, value);
        }
        let object = self.select(scope)?;
        match object.field(&self.field) {
            Some(ObjectField::Type(name)) => {
                let selected = scope.resolve_type(&Ref::named(name.as_str()))?;
                check_value(scope, selected, value)
            }
            Some(ObjectField::Value(expected)) => {
                if expected == value {
                    Ok(())
                } else {
                    Err(Asn1Error::violation(self, value))
                }
            }
            None => Err(Asn1Error::violation(
                self,
                format!("{} (selected object has no {} field)", value, self.field),
            )),
        }
    }

    fn check_simple(&self, scope: &Scope<'_>, value: &Value) -> Asn1Result<()> {
        let mut matches = 0;
        let mut type_field = false;
        for object in &self.objects {
            match object.field(&self.field) {
                Some(ObjectField::Value(candidate)) => {
                    if candidate == value {
                        matches += 1;
                    }
                }
                Some(ObjectField::Type(name)) => {
                    type_field = true;
                    let candidate = scope.resolve_type(&Ref::named(name.as_str()))?;
                    if check_value(scope, candidate, value).is_ok() {
                        matches += 1;
                    }
                }
                None => {}
            }
        }
        // any type of the set will do for an open type; value fields are unique
        match matches {
            1 => Ok(()),
            n if n > 1 && type_field => Ok(()),
            0 => Err(Asn1Error::AmbiguousMatch(format!(
                "no object of {} has {} = {}",
                self.set_name, self.field, value
            ))),
            n => Err(Asn1Error::AmbiguousMatch(format!(
                "{} objects of {} have {} = {}",
                n, self.set_name, self.field, value
            ))),
        }
    }

    /// Select the one object whose fields match the sibling values named by
    /// the relation items
    pub fn select(&self, scope: &Scope<'_>) -> Asn1Result<&ObjectValue> {
        let enclosing = scope.enclosing().ok_or_else(|| {
            Asn1Error::Unsupported(format!("{} needs an enclosing collection", self))
        })?;

        let mut selectors = Vec::with_capacity(self.relation_items.len());
        for item in &self.relation_items {
            let component = enclosing
                .component(item)
                .ok_or_else(|| Asn1Error::UnresolvedReference(format!("@{}", item)))?;
            let component_ty = scope.resolve_type(&component.ty)?;
            let field = match referenced_class_field(scope, component_ty)? {
                Some(ClassField::Value { name, .. }) => name.as_str(),
                _ => {
                    return Err(Asn1Error::Validation(format!(
                        "@{} does not refer to a value field of a class",
                        item
                    )));
                }
            };
            let value = enclosing.value(item).ok_or_else(|| {
                Asn1Error::violation(self, format!("absent component {}", item))
            })?;
            selectors.push((field, value));
        }

        let candidates: Vec<&ObjectValue> = self
            .objects
            .iter()
            .filter(|object| {
                selectors.iter().all(|(field, value)| {
                    matches!(object.field(field), Some(ObjectField::Value(v)) if v == *value)
                })
            })
            .collect();
        match candidates.as_slice() {
            [object] => Ok(object),
            [] => Err(Asn1Error::AmbiguousMatch(format!(
                "no object of {} matches {}",
                self.set_name,
                describe(&selectors)
            ))),
            many => Err(Asn1Error::AmbiguousMatch(format!(
                "{} objects of {} match {}",
                many.len(),
                self.set_name,
                describe(&selectors)
            ))),
        }
    }
}

fn describe(selectors: &[(&str, &Value)]) -> String {
    selectors
        .iter()
        .map(|(field, value)| format!("{} = {}", field, value))
        .collect::<Vec<_>>()
        .join(", ")
}

/// The type selected for an open-type component, if its table constraint
/// relates it to sibling components
///
/// `scope` must carry the enclosing collection with the sibling values
/// known so far.
pub fn open_type_for(scope: &Scope<'_>, ty: TypeId) -> Asn1Result<Option<TypeId>> {
    let Some(constraint) = scope.module().constraint(scope, ty)? else {
        return Ok(None);
    };
    let Some(table) = constraint.find_table() else {
        return Ok(None);
    };
    if !table.is_relational() {
        return Ok(None);
    }
    match table.select(scope)?.field(table.field()) {
        Some(ObjectField::Type(name)) => Ok(Some(scope.resolve_type(&Ref::named(name.as_str()))?)),
        _ => Ok(None),
    }
}

impl fmt::Display for TableConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.set_name)?;
        if self.is_relational() {
            let items: Vec<String> = self
                .relation_items
                .iter()
                .map(|item| format!("@{}", item))
                .collect();
            write!(f, "{{{}}}", items.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::factory;
    use crate::scope::Enclosing;
    use crate::types::{Component, ObjectClass, Type};
    use asnkit_core::{NamedValue, ObjectIdentifier};

    fn oid(text: &str) -> Value {
        Value::ObjectIdentifier(text.parse::<ObjectIdentifier>().unwrap())
    }

    /// ATTRIBUTE class, an object set of two attributes and
    /// `Attribute ::= SEQUENCE { type ATTRIBUTE.&id({Attrs}), value ATTRIBUTE.&Type({Attrs}{@type}) }`
    fn attribute_module() -> Module {
        let mut module = Module::new("Attributes");
        module
            .define_type(
                "ATTRIBUTE",
                Type::new(TypeKind::ObjectClass(ObjectClass::new(vec![
                    ClassField::Type {
                        name: "&Type".into(),
                        optional: false,
                    },
                    ClassField::Value {
                        name: "&id".into(),
                        ty: Ref::named("OBJECT IDENTIFIER"),
                        unique: true,
                        optional: false,
                    },
                ]))),
            )
            .unwrap();
        module
            .define_value(
                "Attrs",
                Ref::named("ATTRIBUTE"),
                Value::ObjectSet(vec![
                    ObjectValue::new()
                        .with_type("&Type", "INTEGER")
                        .with_value("&id", Value::string("2.5.4.1")),
                    ObjectValue::new()
                        .with_type("&Type", "UTF8String")
                        .with_value("&id", Value::string("2.5.4.2")),
                ]),
            )
            .unwrap();
        let type_field = module
            .add_type(
                Type::class_field(Ref::named("ATTRIBUTE"), "&id").with_constraint(
                    factory::table_constraint(Value::reference("Attrs"), &[]),
                ),
            )
            .unwrap();
        let value_field = module
            .add_type(
                Type::class_field(Ref::named("ATTRIBUTE"), "&Type").with_constraint(
                    factory::table_constraint(Value::reference("Attrs"), &["@type"]),
                ),
            )
            .unwrap();
        module
            .define_type(
                "Attribute",
                Type::sequence(vec![
                    Component::mandatory("type", Ref::to(type_field)),
                    Component::mandatory("value", Ref::to(value_field)),
                ]),
            )
            .unwrap();
        module.validate().unwrap();
        module
    }

    fn components(module: &Module) -> &[Component] {
        let attribute = module.type_id("Attribute").unwrap();
        module.get(attribute).unwrap().kind().components().unwrap()
    }

    #[test]
    fn test_simple_form() {
        let module = attribute_module();
        let scope = Scope::new(&module);
        let id_type = match &components(&module)[0].ty {
            Ref::Resolved(id) => *id,
            other => panic!("unexpected reference {:?}", other),
        };
        check_value(&scope, id_type, &oid("2.5.4.1")).unwrap();
        assert!(matches!(
            check_value(&scope, id_type, &oid("2.5.4.9")),
            Err(Asn1Error::AmbiguousMatch(_))
        ));
    }

    #[test]
    fn test_relation_selects_object() {
        let module = attribute_module();
        let scope = Scope::new(&module);
        let attribute = module.type_id("Attribute").unwrap();

        let good = Value::collection([("type", oid("2.5.4.2")), ("value", Value::string("x"))]);
        check_value(&scope, attribute, &good).unwrap();

        let wrong_type =
            Value::collection([("type", oid("2.5.4.1")), ("value", Value::string("x"))]);
        assert!(matches!(
            check_value(&scope, attribute, &wrong_type),
            Err(Asn1Error::IllegalValue(_))
        ));
    }

    #[test]
    fn test_no_match_is_ambiguous() {
        let module = attribute_module();
        let scope = Scope::new(&module);
        let value_type = match &components(&module)[1].ty {
            Ref::Resolved(id) => *id,
            other => panic!("unexpected reference {:?}", other),
        };
        let siblings = vec![
            NamedValue::new("type", oid("1.2.3")),
            NamedValue::new("value", Value::Integer(1)),
        ];
        let inner = scope
            .child()
            .with_enclosing(Enclosing::new(components(&module), &siblings));
        assert!(matches!(
            check_value(&inner, value_type, &Value::Integer(1)),
            Err(Asn1Error::AmbiguousMatch(_))
        ));
    }

    #[test]
    fn test_open_type_selection() {
        let module = attribute_module();
        let scope = Scope::new(&module);
        let value_type = match &components(&module)[1].ty {
            Ref::Resolved(id) => *id,
            other => panic!("unexpected reference {:?}", other),
        };
        let siblings = vec![NamedValue::new("type", oid("2.5.4.1"))];
        let inner = scope
            .child()
            .with_enclosing(Enclosing::new(components(&module), &siblings));
        assert_eq!(
            open_type_for(&inner, value_type).unwrap(),
            Some(module.type_id("INTEGER").unwrap())
        );
        assert!(matches!(
            open_type_for(&scope, value_type),
            Err(Asn1Error::Unsupported(_))
        ));
    }

    #[test]
    fn test_open_type_component_optimized_under_selected_type() {
        let module = attribute_module();
        let scope = Scope::new(&module);
        let attribute = module.type_id("Attribute").unwrap();

        let written = Value::collection([
            ("type", Value::string("2.5.4.2")),
            ("value", Value::string("x")),
        ]);
        let optimized = optimize(&scope, attribute, &written).unwrap();
        assert_eq!(optimized.component("type"), Some(&oid("2.5.4.2")));
        check_value(&scope, attribute, &optimized).unwrap();

        let mismatched = Value::collection([
            ("type", Value::string("2.5.4.1")),
            ("value", Value::string("x")),
        ]);
        assert!(optimize(&scope, attribute, &mismatched).is_err());
    }
}
