//! Tag computation
//!
//! The tag chain of a type lists the identifiers a value of that type is
//! wrapped in on the wire, outermost first. An explicit tag adds a
//! constructed layer around the inner chain; an implicit tag replaces the
//! outermost identifier of the inner chain. Untagged CHOICE and open types
//! have an empty chain: their identifier depends on the value.

use crate::scope::Scope;
use crate::structure::class_field;
use crate::types::{ClassField, Component, TypeFamily, TypeId, TypeKind};
use asnkit_core::{Asn1Error, Asn1Result, Tag, TagEncoding, TaggingMode};
use std::collections::HashSet;

/// Universal tag of a family, `None` for CHOICE, open types and classes
pub fn universal_tag(family: TypeFamily) -> Option<Tag> {
    let tag = match family {
        TypeFamily::Boolean => Tag::BOOLEAN,
        TypeFamily::Integer => Tag::INTEGER,
        TypeFamily::Enumerated => Tag::ENUMERATED,
        TypeFamily::Real => Tag::REAL,
        TypeFamily::Null => Tag::NULL,
        TypeFamily::BitString => Tag::BIT_STRING,
        TypeFamily::OctetString => Tag::OCTET_STRING,
        TypeFamily::ObjectIdentifier => Tag::OBJECT_IDENTIFIER,
        TypeFamily::String(kind) => kind.tag(),
        TypeFamily::Time(kind) => kind.tag(),
        TypeFamily::Sequence | TypeFamily::SequenceOf => Tag::SEQUENCE,
        TypeFamily::Set | TypeFamily::SetOf => Tag::SET,
        TypeFamily::Choice | TypeFamily::ObjectClass | TypeFamily::OpenType => return None,
    };
    Some(tag)
}

/// Wire identifiers of a type, outermost first
pub fn tag_chain(scope: &Scope<'_>, id: TypeId) -> Asn1Result<Vec<TagEncoding>> {
    let ty = scope.module().get(id)?;
    let mut chain = untagged_chain(scope, id)?;
    if let Some(spec) = ty.tag() {
        match declared_mode(spec.mode_under(scope.module().tag_method()), &chain) {
            TaggingMode::Explicit => chain.insert(0, TagEncoding::constructed(spec.tag)),
            TaggingMode::Implicit => chain[0] = TagEncoding::new(spec.tag, chain[0].constructed),
        }
    }
    Ok(chain)
}

/// Declared tag of a type together with the mode it is applied in
pub fn declared_tag(scope: &Scope<'_>, id: TypeId) -> Asn1Result<Option<(Tag, TaggingMode)>> {
    let ty = scope.module().get(id)?;
    match ty.tag() {
        Some(spec) => {
            let inner = untagged_chain(scope, id)?;
            let mode = declared_mode(spec.mode_under(scope.module().tag_method()), &inner);
            Ok(Some((spec.tag, mode)))
        }
        None => Ok(None),
    }
}

/// Tags on CHOICE and open types are always explicit
fn declared_mode(mode: TaggingMode, inner: &[TagEncoding]) -> TaggingMode {
    if inner.is_empty() {
        TaggingMode::Explicit
    } else {
        mode
    }
}

/// Chain of a type ignoring its own declared tag
fn untagged_chain(scope: &Scope<'_>, id: TypeId) -> Asn1Result<Vec<TagEncoding>> {
    let ty = scope.module().get(id)?;
    match ty.kind() {
        TypeKind::Defined(target) => tag_chain(scope, scope.resolve_type(target)?),
        TypeKind::Instance {
            template,
            arguments,
        } => {
            let (body, inner) = scope.instantiate(template, arguments)?;
            tag_chain(&inner, body)
        }
        TypeKind::ClassField { class, field } => match class_field(scope, class, field)? {
            ClassField::Value { ty, .. } => tag_chain(scope, scope.resolve_type(ty)?),
            ClassField::Type { .. } => Ok(Vec::new()),
        },
        TypeKind::Choice(_) => Ok(Vec::new()),
        TypeKind::ObjectClass(_) => Err(Asn1Error::Unsupported(format!(
            "object class {} has no encoding",
            ty
        ))),
        kind => {
            let family = kind
                .family()
                .ok_or_else(|| Asn1Error::Unsupported(format!("no family for {}", ty)))?;
            let tag = universal_tag(family)
                .ok_or_else(|| Asn1Error::Unsupported(format!("no universal tag for {}", ty)))?;
            Ok(vec![TagEncoding::new(tag, family.is_constructed())])
        }
    }
}

/// Tags a value of the type may start with; empty means any tag
///
/// An untagged CHOICE that can reach itself again through untagged
/// alternatives has no first tag and is reported as a `Validation` error.
pub fn possible_tags(scope: &Scope<'_>, id: TypeId) -> Asn1Result<Vec<Tag>> {
    let mut path = HashSet::new();
    tags_along(scope, id, &mut path)
}

/// `path` holds the types entered but not yet left, keyed by instance depth
/// so the same template body under nested instances is not a cycle
fn tags_along(
    scope: &Scope<'_>,
    id: TypeId,
    path: &mut HashSet<(TypeId, usize)>,
) -> Asn1Result<Vec<Tag>> {
    if let Some(first) = tag_chain(scope, id)?.first() {
        return Ok(vec![first.tag]);
    }
    let key = (id, scope.depth());
    if !path.insert(key) {
        return Err(Asn1Error::Validation(format!(
            "{} starts with itself through untagged alternatives",
            scope.module().get(id)?
        )));
    }
    let tags = untagged_tags(scope, id, path);
    path.remove(&key);
    tags
}

fn untagged_tags(
    scope: &Scope<'_>,
    id: TypeId,
    path: &mut HashSet<(TypeId, usize)>,
) -> Asn1Result<Vec<Tag>> {
    let ty = scope.module().get(id)?;
    match ty.kind() {
        TypeKind::Defined(target) => tags_along(scope, scope.resolve_type(target)?, path),
        TypeKind::Instance {
            template,
            arguments,
        } => {
            let (body, inner) = scope.instantiate(template, arguments)?;
            tags_along(&inner, body, path)
        }
        TypeKind::ClassField { class, field } => match class_field(scope, class, field)? {
            ClassField::Value { ty, .. } => tags_along(scope, scope.resolve_type(ty)?, path),
            ClassField::Type { .. } => Ok(Vec::new()),
        },
        TypeKind::Choice(alternatives) => {
            let mut tags = Vec::new();
            let mut open = false;
            for alternative in alternatives {
                let alternative_tags =
                    tags_along(scope, scope.resolve_type(&alternative.ty)?, path)?;
                open |= alternative_tags.is_empty();
                tags.extend(alternative_tags);
            }
            if open {
                tags.clear();
            }
            Ok(tags)
        }
        _ => Ok(Vec::new()),
    }
}

fn overlap(a: &[Tag], b: &[Tag]) -> Option<String> {
    if a.is_empty() || b.is_empty() {
        return Some("any tag".to_string());
    }
    a.iter().find(|t| b.contains(t)).map(|t| t.to_string())
}

/// Detect components of a constructed type that cannot be told apart by tag
///
/// SET and CHOICE need distinct tags among all components. In a SEQUENCE,
/// every optional or default component must differ from the components that
/// follow it up to and including the next mandatory one.
pub fn check_tag_collisions(scope: &Scope<'_>, id: TypeId) -> Asn1Result<()> {
    let ty = scope.module().get(id)?;
    let (components, all_pairs) = match ty.kind() {
        TypeKind::Set(components) | TypeKind::Choice(components) => (components, true),
        TypeKind::Sequence(components) => (components, false),
        _ => return Ok(()),
    };
    let tags = components
        .iter()
        .map(|c| possible_tags(scope, scope.resolve_type(&c.ty)?))
        .collect::<Asn1Result<Vec<_>>>()?;

    let collision = |a: &Component, b: &Component, tag: String| {
        Asn1Error::TagCollision(format!(
            "components {} and {} of {} share {}",
            a.name, b.name, ty, tag
        ))
    };

    for i in 0..components.len() {
        if !all_pairs && components[i].presence.is_mandatory() {
            continue;
        }
        for j in i + 1..components.len() {
            if let Some(tag) = overlap(&tags[i], &tags[j]) {
                return Err(collision(&components[i], &components[j], tag));
            }
            if !all_pairs && components[j].presence.is_mandatory() {
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Module;
    use crate::types::{StringKind, Type};
    use asnkit_core::{Ref, TagMethod, TagSpec};

    #[test]
    fn test_explicit_and_implicit_chains() {
        let mut module = Module::new("Test");
        let explicit = module
            .add_type(Type::integer().with_tag(TagSpec::explicit(Tag::context(1))))
            .unwrap();
        let implicit = module
            .add_type(Type::sequence(vec![]).with_tag(TagSpec::implicit(Tag::application(3))))
            .unwrap();
        let scope = Scope::new(&module);
        assert_eq!(
            tag_chain(&scope, explicit).unwrap(),
            vec![
                TagEncoding::constructed(Tag::context(1)),
                TagEncoding::primitive(Tag::INTEGER)
            ]
        );
        assert_eq!(
            tag_chain(&scope, implicit).unwrap(),
            vec![TagEncoding::constructed(Tag::application(3))]
        );
    }

    #[test]
    fn test_module_default_mode() {
        let mut module = Module::new("Test");
        module.set_tag_method(TagMethod::Implicit).unwrap();
        let tagged = module
            .add_type(Type::string(StringKind::Utf8).with_tag(TagSpec::context(0)))
            .unwrap();
        let scope = Scope::new(&module);
        assert_eq!(
            tag_chain(&scope, tagged).unwrap(),
            vec![TagEncoding::primitive(Tag::context(0))]
        );
    }

    #[test]
    fn test_choice_tags_are_explicit() {
        let mut module = Module::new("Test");
        module.set_tag_method(TagMethod::Implicit).unwrap();
        let choice = module
            .define_type(
                "Alt",
                Type::choice(vec![
                    Component::mandatory("i", Ref::named("INTEGER")),
                    Component::mandatory("b", Ref::named("BOOLEAN")),
                ]),
            )
            .unwrap();
        let tagged = module
            .add_type(Type::defined(Ref::to(choice)).with_tag(TagSpec::context(2)))
            .unwrap();
        let scope = Scope::new(&module);
        assert!(tag_chain(&scope, choice).unwrap().is_empty());
        assert_eq!(
            possible_tags(&scope, choice).unwrap(),
            vec![Tag::INTEGER, Tag::BOOLEAN]
        );
        assert_eq!(
            declared_tag(&scope, tagged).unwrap(),
            Some((Tag::context(2), TaggingMode::Explicit))
        );
    }

    #[test]
    fn test_collisions() {
        let mut module = Module::new("Test");
        let set = module
            .add_type(Type::set(vec![
                Component::mandatory("a", Ref::named("INTEGER")),
                Component::mandatory("b", Ref::named("INTEGER")),
            ]))
            .unwrap();
        let sequence = module
            .add_type(Type::sequence(vec![
                Component::optional("a", Ref::named("INTEGER")),
                Component::mandatory("b", Ref::named("INTEGER")),
            ]))
            .unwrap();
        let fine = module
            .add_type(Type::sequence(vec![
                Component::mandatory("a", Ref::named("INTEGER")),
                Component::optional("b", Ref::named("BOOLEAN")),
                Component::mandatory("c", Ref::named("INTEGER")),
            ]))
            .unwrap();
        let scope = Scope::new(&module);
        assert!(matches!(
            check_tag_collisions(&scope, set),
            Err(Asn1Error::TagCollision(_))
        ));
        assert!(matches!(
            check_tag_collisions(&scope, sequence),
            Err(Asn1Error::TagCollision(_))
        ));
        check_tag_collisions(&scope, fine).unwrap();
    }
}
