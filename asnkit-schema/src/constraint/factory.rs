//! Constructors for constraint templates
//!
//! Each function builds one node of a [`ConstraintTemplate`] tree; nodes
//! compose freely, mirroring the grammar of subtype constraints.

use super::{ComponentTemplate, ConstraintTemplate, PresenceConstraint};
use crate::types::TypeId;
use asnkit_core::{Ref, Value};

/// Root element set, optionally extensible (`root, ..., additional`)
pub fn element_set_specs(
    root: ConstraintTemplate,
    extensible: bool,
    additional: Option<ConstraintTemplate>,
) -> ConstraintTemplate {
    ConstraintTemplate::ElementSetSpecs {
        root: Box::new(root),
        extensible,
        additional: additional.map(Box::new),
    }
}

/// Logical AND of its elements
pub fn intersection(elements: Vec<ConstraintTemplate>) -> ConstraintTemplate {
    collapse(elements, ConstraintTemplate::Intersection)
}

/// Union of intersections; each inner list is combined with AND
pub fn union(intersections: Vec<Vec<ConstraintTemplate>>) -> ConstraintTemplate {
    collapse(
        intersections.into_iter().map(intersection).collect(),
        ConstraintTemplate::Union,
    )
}

/// Union over already built unions
pub fn element_set_spec(unions: Vec<ConstraintTemplate>) -> ConstraintTemplate {
    collapse(unions, ConstraintTemplate::Union)
}

fn collapse(
    mut items: Vec<ConstraintTemplate>,
    combine: fn(Vec<ConstraintTemplate>) -> ConstraintTemplate,
) -> ConstraintTemplate {
    if items.len() == 1 {
        items.remove(0)
    } else {
        combine(items)
    }
}

/// `ALL EXCEPT excluded`
pub fn all_except(excluded: ConstraintTemplate) -> ConstraintTemplate {
    ConstraintTemplate::AllExcept(Box::new(excluded))
}

/// `element EXCEPT exclusion`, or just `element`
pub fn elements(
    element: ConstraintTemplate,
    exclusion: Option<ConstraintTemplate>,
) -> ConstraintTemplate {
    ConstraintTemplate::Elements {
        element: Box::new(element),
        exclusion: exclusion.map(Box::new),
    }
}

/// Single value; inside a permitted alphabet, the characters of a string
pub fn value(value: Value) -> ConstraintTemplate {
    ConstraintTemplate::SingleValue(value)
}

/// `min..max`; `None` stands for MIN or MAX and must not be inclusive
pub fn value_range(
    min: Option<Value>,
    min_inclusive: bool,
    max: Option<Value>,
    max_inclusive: bool,
) -> ConstraintTemplate {
    ConstraintTemplate::ValueRange {
        min,
        min_inclusive,
        max,
        max_inclusive,
    }
}

pub fn size(template: ConstraintTemplate) -> ConstraintTemplate {
    ConstraintTemplate::Size(Box::new(template))
}

pub fn permitted_alphabet(template: ConstraintTemplate) -> ConstraintTemplate {
    ConstraintTemplate::PermittedAlphabet(Box::new(template))
}

pub fn pattern(pattern: Value) -> ConstraintTemplate {
    ConstraintTemplate::Pattern(pattern)
}

/// `WITH COMPONENT (...)` on the elements of a SEQUENCE OF / SET OF
pub fn inner_type(component: ComponentTemplate) -> ConstraintTemplate {
    ConstraintTemplate::InnerType(Box::new(component))
}

/// `WITH COMPONENTS { ... }`; `partial` is the leading `...,`
pub fn inner_types(components: Vec<ComponentTemplate>, partial: bool) -> ConstraintTemplate {
    ConstraintTemplate::InnerTypes {
        components,
        partial,
    }
}

pub fn component(
    name: impl Into<String>,
    template: Option<ConstraintTemplate>,
    presence: Option<PresenceConstraint>,
) -> ComponentTemplate {
    ComponentTemplate {
        name: name.into(),
        constraint: template,
        presence,
    }
}

pub fn contained_subtype(ty: Ref<TypeId>, includes: bool) -> ConstraintTemplate {
    ConstraintTemplate::ContainedSubtype { ty, includes }
}

/// `{ObjectSet}` or `{ObjectSet}{@a, @b}`
pub fn table_constraint(object_set: Value, relation_items: &[&str]) -> ConstraintTemplate {
    ConstraintTemplate::Table {
        object_set,
        relation_items: relation_items.iter().map(|item| item.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singletons_collapse() {
        let one = value(Value::Integer(1));
        assert_eq!(union(vec![vec![one.clone()]]), one);
        match union(vec![vec![one.clone(), one.clone()], vec![one.clone()]]) {
            ConstraintTemplate::Union(items) => {
                assert_eq!(items.len(), 2);
                assert!(matches!(items[0], ConstraintTemplate::Intersection(_)));
                assert_eq!(items[1], one);
            }
            other => panic!("unexpected template {:?}", other),
        }
    }

    #[test]
    fn test_table_constraint_items() {
        let template = table_constraint(Value::reference("Attributes"), &["@type"]);
        assert_eq!(
            template,
            ConstraintTemplate::Table {
                object_set: Value::reference("Attributes"),
                relation_items: vec!["@type".to_string()],
            }
        );
    }
}
