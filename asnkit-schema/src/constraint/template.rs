//! Unresolved constraint expressions

use super::{
    ComponentConstraint, Constraint, PERMITTED_ALPHABET_CONTEXT, Pattern, PresenceConstraint,
    SIZE_CONTEXT, TableConstraint, ValueRange,
};
use crate::optimize::optimize;
use crate::scope::{Scope, ScopeOptions};
use crate::structure::underlying;
use crate::types::{TypeId, TypeKind};
use asnkit_core::{Asn1Error, Asn1Result, Ref, Value};

/// Constraint on one component, as written in `WITH COMPONENT(S)`
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentTemplate {
    pub name: String,
    pub constraint: Option<ConstraintTemplate>,
    pub presence: Option<PresenceConstraint>,
}

/// A constraint expression as written in a type definition
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintTemplate {
    ElementSetSpecs {
        root: Box<ConstraintTemplate>,
        extensible: bool,
        additional: Option<Box<ConstraintTemplate>>,
    },
    Union(Vec<ConstraintTemplate>),
    Intersection(Vec<ConstraintTemplate>),
    Elements {
        element: Box<ConstraintTemplate>,
        exclusion: Option<Box<ConstraintTemplate>>,
    },
    AllExcept(Box<ConstraintTemplate>),
    SingleValue(Value),
    ValueRange {
        min: Option<Value>,
        min_inclusive: bool,
        max: Option<Value>,
        max_inclusive: bool,
    },
    Size(Box<ConstraintTemplate>),
    PermittedAlphabet(Box<ConstraintTemplate>),
    Pattern(Value),
    InnerType(Box<ComponentTemplate>),
    InnerTypes {
        components: Vec<ComponentTemplate>,
        partial: bool,
    },
    ContainedSubtype {
        ty: Ref<TypeId>,
        includes: bool,
    },
    Table {
        object_set: Value,
        relation_items: Vec<String>,
    },
}

impl ConstraintTemplate {
    /// Resolve this expression into a live constraint on type `ty`
    pub fn resolve(&self, scope: &Scope<'_>, ty: TypeId) -> Asn1Result<Constraint> {
        let resolve_all = |items: &[ConstraintTemplate]| {
            items
                .iter()
                .map(|item| item.resolve(scope, ty))
                .collect::<Asn1Result<Vec<_>>>()
        };

        let constraint = match self {
            ConstraintTemplate::ElementSetSpecs {
                root,
                extensible,
                additional,
            } => Constraint::ElementSetSpecs {
                root: Box::new(root.resolve(scope, ty)?),
                extensible: *extensible,
                additional: additional
                    .as_deref()
                    .map(|a| a.resolve(scope, ty).map(Box::new))
                    .transpose()?,
            },
            ConstraintTemplate::Union(items) => Constraint::Union(resolve_all(items)?),
            ConstraintTemplate::Intersection(items) => {
                Constraint::Intersection(resolve_all(items)?)
            }
            ConstraintTemplate::Elements {
                element,
                exclusion: None,
            } => element.resolve(scope, ty)?,
            ConstraintTemplate::Elements {
                element,
                exclusion: Some(exclusion),
            } => Constraint::Exclusion {
                base: Box::new(element.resolve(scope, ty)?),
                excluded: Box::new(exclusion.resolve(scope, ty)?),
            },
            ConstraintTemplate::AllExcept(excluded) => Constraint::Exclusion {
                base: Box::new(Constraint::All),
                excluded: Box::new(excluded.resolve(scope, ty)?),
            },
            ConstraintTemplate::SingleValue(value) => {
                if scope.permitted_alphabet() {
                    match scope.resolve_value(value)? {
                        Value::CString(text) => Constraint::CharSet(text.chars().collect()),
                        other => {
                            return Err(Asn1Error::IllegalValue(format!(
                                "permitted alphabet expects a character string, got {}",
                                other
                            )));
                        }
                    }
                } else {
                    Constraint::SingleValue(optimize(scope, ty, value)?)
                }
            }
            ConstraintTemplate::ValueRange {
                min,
                min_inclusive,
                max,
                max_inclusive,
            } => {
                let bound = |bound: &Option<Value>| -> Asn1Result<Option<Value>> {
                    let Some(bound) = bound else {
                        return Ok(None);
                    };
                    let bound = optimize(scope, ty, bound)?;
                    if scope.permitted_alphabet() && bound.size() != Some(1) {
                        return Err(Asn1Error::Validation(format!(
                            "alphabet range bound {} must be a single character",
                            bound
                        )));
                    }
                    Ok(Some(bound))
                };
                Constraint::ValueRange(ValueRange::new(
                    bound(min)?,
                    *min_inclusive,
                    bound(max)?,
                    *max_inclusive,
                )?)
            }
            ConstraintTemplate::Size(inner) => {
                let integer = scope.module().core_type("INTEGER")?;
                let size_scope = scope.child().with_options(ScopeOptions::default());
                let inner = inner.resolve(&size_scope, integer)?;
                inner.assert_constraint_types(SIZE_CONTEXT)?;
                Constraint::Size(Box::new(inner))
            }
            ConstraintTemplate::PermittedAlphabet(inner) => {
                let alphabet_scope = scope.child().with_options(ScopeOptions {
                    permitted_alphabet: true,
                });
                let inner = inner.resolve(&alphabet_scope, ty)?;
                inner.assert_constraint_types(PERMITTED_ALPHABET_CONTEXT)?;
                Constraint::PermittedAlphabet(Box::new(inner))
            }
            ConstraintTemplate::Pattern(value) => match scope.resolve_value(value)? {
                Value::CString(source) => Constraint::Pattern(Pattern::new(&source)?),
                other => {
                    return Err(Asn1Error::IllegalValue(format!(
                        "pattern must be a character string, got {}",
                        other
                    )));
                }
            },
            ConstraintTemplate::InnerType(component) => {
                let (_, target) = underlying(scope, ty)?;
                let element = match target.kind() {
                    TypeKind::SequenceOf(element) | TypeKind::SetOf(element) => {
                        scope.resolve_type(element)?
                    }
                    _ => {
                        return Err(Asn1Error::Validation(format!(
                            "WITH COMPONENT applies to SEQUENCE OF and SET OF, not {}",
                            target
                        )));
                    }
                };
                let inner = match &component.constraint {
                    Some(template) => template.resolve(scope, element)?,
                    None => Constraint::All,
                };
                Constraint::InnerType(Box::new(inner))
            }
            ConstraintTemplate::InnerTypes {
                components,
                partial,
            } => resolve_components(scope, ty, components, *partial)?,
            ConstraintTemplate::ContainedSubtype {
                ty: reference,
                includes,
            } => Constraint::ContainedSubtype {
                ty: scope.resolve_type(reference)?,
                name: reference.to_string(),
                includes: *includes,
            },
            ConstraintTemplate::Table {
                object_set,
                relation_items,
            } => Constraint::Table(TableConstraint::resolve(
                scope,
                ty,
                object_set,
                relation_items,
            )?),
        };
        Ok(constraint)
    }
}

fn resolve_components(
    scope: &Scope<'_>,
    ty: TypeId,
    templates: &[ComponentTemplate],
    partial: bool,
) -> Asn1Result<Constraint> {
    let (_, target) = underlying(scope, ty)?;
    let declared = target.kind().components().ok_or_else(|| {
        Asn1Error::Validation(format!(
            "WITH COMPONENTS applies to SEQUENCE, SET and CHOICE, not {}",
            target
        ))
    })?;

    let mut components = Vec::with_capacity(templates.len());
    for template in templates {
        let component = declared
            .iter()
            .find(|c| c.name == template.name)
            .ok_or_else(|| {
                Asn1Error::UnresolvedReference(format!("component {} of {}", template.name, target))
            })?;
        let constraint = match &template.constraint {
            Some(inner) => Some(inner.resolve(scope, scope.resolve_type(&component.ty)?)?),
            None => None,
        };
        components.push(ComponentConstraint {
            name: template.name.clone(),
            constraint,
            presence: template.presence,
        });
    }

    if !partial && !matches!(target.kind(), TypeKind::Choice(_)) {
        if let Some(missing) = declared.iter().find(|c| {
            c.presence.is_mandatory() && !templates.iter().any(|t| t.name == c.name)
        }) {
            return Err(Asn1Error::Validation(format!(
                "full WITH COMPONENTS specification omits component {}",
                missing.name
            )));
        }
    }
    Ok(Constraint::InnerTypes {
        components,
        partial,
    })
}
