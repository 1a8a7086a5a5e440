//! ASN.1 modules
//!
//! A [`Module`] owns every type, value and parameterized type defined in it,
//! plus the core types every module inherits. It is built through the
//! `define_*` methods, validated exactly once, and read-only afterwards.
//!
//! # Validation
//!
//! [`Module::validate`] resolves every reference, rejects circular and
//! unexported definitions, applies automatic tagging, detects tag collisions,
//! resolves and caches every constraint, and optimizes and checks every
//! value definition. The first failure aborts validation; the wrapper types
//! created by automatic tagging are then rolled back so the module is left
//! as it was built.

use crate::check::check_value;
use crate::constraint::Constraint;
use crate::disposable::{Disposable, DisposableArena, DisposableId};
use crate::optimize::optimize;
use crate::parameter::{TemplateArgument, TemplateParameter, TypeTemplate};
use crate::scope::{Binding, Scope, Symbol};
use crate::structure::{object_class, underlying};
use crate::tagging::check_tag_collisions;
use crate::types::{ClassField, StringKind, Type, TypeId, TypeKind};
use asnkit_core::{Asn1Error, Asn1Result, Ref, TagMethod, TagSpec, TimeKind, Value};
use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};

/// Builtin types registered in every module, by their ASN.1 names
fn core_types() -> [(&'static str, TypeKind); 15] {
    [
        ("BOOLEAN", TypeKind::Boolean),
        ("INTEGER", TypeKind::Integer(Vec::new())),
        ("REAL", TypeKind::Real),
        ("NULL", TypeKind::Null),
        ("BIT STRING", TypeKind::BitString),
        ("OCTET STRING", TypeKind::OctetString),
        ("OBJECT IDENTIFIER", TypeKind::ObjectIdentifier),
        ("UTCTime", TypeKind::Time(TimeKind::UtcTime)),
        ("GeneralizedTime", TypeKind::Time(TimeKind::GeneralizedTime)),
        ("UTF8String", TypeKind::String(StringKind::Utf8)),
        ("NumericString", TypeKind::String(StringKind::Numeric)),
        ("PrintableString", TypeKind::String(StringKind::Printable)),
        ("IA5String", TypeKind::String(StringKind::Ia5)),
        ("VisibleString", TypeKind::String(StringKind::Visible)),
        ("BMPString", TypeKind::String(StringKind::Bmp)),
    ]
}

/// What a module makes visible to importers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Exports {
    /// No EXPORTS clause, or `EXPORTS ALL`
    #[default]
    All,
    /// `EXPORTS a, b, c;`
    Only(BTreeSet<String>),
    /// `EXPORTS ;`
    Nothing,
}

impl Exports {
    pub fn only<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Exports::Only(names.into_iter().map(Into::into).collect())
    }

    pub fn exports(&self, name: &str) -> bool {
        match self {
            Exports::All => true,
            Exports::Only(names) => names.contains(name),
            Exports::Nothing => false,
        }
    }
}

#[derive(Debug, Clone)]
struct ValueDefinition {
    name: String,
    ty: Ref<TypeId>,
    value: Value,
    optimized: Option<Value>,
}

impl ValueDefinition {
    fn current(&self) -> &Value {
        self.optimized.as_ref().unwrap_or(&self.value)
    }
}

/// An ASN.1 module
#[derive(Debug)]
pub struct Module {
    name: String,
    tag_method: TagMethod,
    exports: Exports,
    types: Vec<Type>,
    type_names: HashMap<String, TypeId>,
    core_types: HashMap<&'static str, TypeId>,
    templates: HashMap<String, TypeTemplate>,
    /// Types reachable only through a template body, by template name
    template_owned: HashMap<TypeId, String>,
    values: Vec<ValueDefinition>,
    value_names: HashMap<String, usize>,
    /// Effective constraints, filled by validation
    constraints: Option<Vec<Option<Constraint>>>,
    disposables: DisposableArena,
    validated: bool,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        let mut module = Self {
            name: name.into(),
            tag_method: TagMethod::default(),
            exports: Exports::default(),
            types: Vec::new(),
            type_names: HashMap::new(),
            core_types: HashMap::new(),
            templates: HashMap::new(),
            template_owned: HashMap::new(),
            values: Vec::new(),
            value_names: HashMap::new(),
            constraints: None,
            disposables: DisposableArena::new(),
            validated: false,
        };
        for (name, kind) in core_types() {
            let id = TypeId(module.types.len());
            module.types.push(Type::core(kind));
            module.core_types.insert(name, id);
        }
        module
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag_method(&self) -> TagMethod {
        self.tag_method
    }

    pub fn exports(&self) -> &Exports {
        &self.exports
    }

    pub fn is_validated(&self) -> bool {
        self.validated
    }

    fn ensure_mutable(&self) -> Asn1Result<()> {
        if self.validated {
            return Err(Asn1Error::Validation(format!(
                "module {} is already validated",
                self.name
            )));
        }
        Ok(())
    }

    pub fn set_tag_method(&mut self, method: TagMethod) -> Asn1Result<()> {
        self.ensure_mutable()?;
        self.tag_method = method;
        Ok(())
    }

    pub fn set_exports(&mut self, exports: Exports) -> Asn1Result<()> {
        self.ensure_mutable()?;
        self.exports = exports;
        Ok(())
    }

    fn ensure_unique(&self, name: &str) -> Asn1Result<()> {
        if self.type_names.contains_key(name)
            || self.value_names.contains_key(name)
            || self.templates.contains_key(name)
        {
            return Err(Asn1Error::Validation(format!(
                "{} is defined twice in module {}",
                name, self.name
            )));
        }
        Ok(())
    }

    /// Add an anonymous type (a component type, an element type, ...)
    pub fn add_type(&mut self, ty: Type) -> Asn1Result<TypeId> {
        self.ensure_mutable()?;
        let id = TypeId(self.types.len());
        self.types.push(ty);
        Ok(id)
    }

    /// Define a named type (`Name ::= Type`)
    pub fn define_type(&mut self, name: impl Into<String>, ty: Type) -> Asn1Result<TypeId> {
        let name = name.into();
        self.ensure_unique(&name)?;
        let id = self.add_type(ty)?;
        log::debug!("Defined type {} as {} in {}", name, id, self.name);
        self.type_names.insert(name, id);
        Ok(id)
    }

    /// Define a parameterized type (`Name{Param, ...} ::= body`)
    ///
    /// The body and the anonymous types nested in it belong to the
    /// definition; they are only interpreted through instances.
    pub fn define_parameterized_type(
        &mut self,
        name: impl Into<String>,
        parameters: Vec<TemplateParameter>,
        body: TypeId,
    ) -> Asn1Result<()> {
        let name = name.into();
        self.ensure_mutable()?;
        self.ensure_unique(&name)?;
        self.get(body)?;
        for (position, parameter) in parameters.iter().enumerate() {
            if parameter.index() != position {
                return Err(Asn1Error::Validation(format!(
                    "parameter {} of {} has index {}, expected {}",
                    parameter.name(),
                    name,
                    parameter.index(),
                    position
                )));
            }
        }

        let named: BTreeSet<TypeId> = self.type_names.values().copied().collect();
        let mut pending = vec![body];
        while let Some(id) = pending.pop() {
            if named.contains(&id) || self.types[id.0].is_core() {
                continue;
            }
            if self.template_owned.insert(id, name.clone()).is_some() {
                continue;
            }
            pending.extend(nested_types(&self.types[id.0]));
        }

        self.templates.insert(name, TypeTemplate { parameters, body });
        Ok(())
    }

    /// Define a value (`name Type ::= value`)
    pub fn define_value(
        &mut self,
        name: impl Into<String>,
        ty: Ref<TypeId>,
        value: Value,
    ) -> Asn1Result<()> {
        let name = name.into();
        self.ensure_mutable()?;
        self.ensure_unique(&name)?;
        self.value_names.insert(name.clone(), self.values.len());
        self.values.push(ValueDefinition {
            name,
            ty,
            value,
            optimized: None,
        });
        Ok(())
    }

    /// Register a resource to release when the module is dropped
    pub fn add_disposable(
        &mut self,
        disposable: Box<dyn Disposable + Send>,
    ) -> Asn1Result<DisposableId> {
        self.ensure_mutable()?;
        Ok(self.disposables.register(disposable))
    }

    pub fn get(&self, id: TypeId) -> Asn1Result<&Type> {
        self.types
            .get(id.0)
            .ok_or_else(|| Asn1Error::UnresolvedReference(format!("type {}", id)))
    }

    /// Named type of this module, or a core type
    pub fn type_id(&self, name: &str) -> Asn1Result<TypeId> {
        self.type_names
            .get(name)
            .or_else(|| self.core_types.get(name))
            .copied()
            .ok_or_else(|| Asn1Error::UnresolvedReference(name.to_string()))
    }

    pub fn core_type(&self, name: &str) -> Asn1Result<TypeId> {
        self.core_types
            .get(name)
            .copied()
            .ok_or_else(|| Asn1Error::UnresolvedReference(name.to_string()))
    }

    /// Name a type was defined under
    pub fn type_name(&self, id: TypeId) -> Option<&str> {
        self.type_names
            .iter()
            .find(|(_, found)| **found == id)
            .map(|(name, _)| name.as_str())
            .or_else(|| {
                self.core_types
                    .iter()
                    .find(|(_, found)| **found == id)
                    .map(|(name, _)| *name)
            })
    }

    /// A defined value; optimized once the module is validated
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.value_names
            .get(name)
            .map(|index| self.values[*index].current())
    }

    pub fn template(&self, name: &str) -> Option<&TypeTemplate> {
        self.templates.get(name)
    }

    /// A named type as seen by an importing module
    pub fn exported_type(&self, name: &str) -> Asn1Result<TypeId> {
        if !self.exports.exports(name) {
            return Err(Asn1Error::UnresolvedReference(format!(
                "{} is not exported by {}",
                name, self.name
            )));
        }
        self.type_names
            .get(name)
            .copied()
            .ok_or_else(|| Asn1Error::UnresolvedReference(name.to_string()))
    }

    /// Module-level name lookup, the last step of every scope chain
    pub(crate) fn lookup(&self, name: &str) -> Option<Symbol> {
        if let Some(id) = self.type_names.get(name) {
            return Some(Binding::Type(*id));
        }
        if let Some(value) = self.value(name) {
            return Some(Binding::Value(value.clone()));
        }
        self.core_types.get(name).map(|id| Binding::Type(*id))
    }

    /// Effective constraint of a type: its own constraint intersected with
    /// the one inherited from the type it refers to
    pub fn constraint<'s>(
        &'s self,
        scope: &Scope<'_>,
        id: TypeId,
    ) -> Asn1Result<Option<Cow<'s, Constraint>>> {
        if let Some(cache) = &self.constraints {
            if !self.template_owned.contains_key(&id) {
                if let Some(cached) = cache.get(id.0) {
                    return Ok(cached.as_ref().map(Cow::Borrowed));
                }
            }
        }
        Ok(self.effective_constraint(scope, id)?.map(Cow::Owned))
    }

    fn effective_constraint(&self, scope: &Scope<'_>, id: TypeId) -> Asn1Result<Option<Constraint>> {
        let ty = self.get(id)?;
        let own = ty
            .constraint()
            .map(|template| template.resolve(scope, id))
            .transpose()?;
        let inherited = match ty.kind() {
            TypeKind::Defined(target) => {
                let parent = scope.resolve_type(target)?;
                self.constraint(scope, parent)?
                    .map(|constraint| constraint.copy_for_type(self, id))
            }
            _ => None,
        };
        Ok(match (inherited, own) {
            (Some(inherited), Some(own)) => Some(Constraint::Intersection(vec![inherited, own])),
            (inherited, None) => inherited,
            (None, own) => own,
        })
    }

    /// Validate the module; see the module documentation
    pub fn validate(&mut self) -> Asn1Result<()> {
        self.ensure_mutable()?;
        log::debug!("Validating module {}", self.name);
        let mut guard = ValidationGuard::new(self);
        guard.run()?;
        guard.commit();
        Ok(())
    }

    fn is_template_owned(&self, id: TypeId) -> bool {
        self.template_owned.contains_key(&id)
    }

    fn ids(&self) -> impl Iterator<Item = TypeId> + use<> {
        (0..self.types.len()).map(TypeId)
    }

    /// Scope in which the references of a type are resolved during validation
    fn definition_scope(&self, id: TypeId) -> Scope<'_> {
        let mut scope = Scope::new(self);
        if let Some(template) = self
            .template_owned
            .get(&id)
            .and_then(|name| self.templates.get(name))
        {
            for parameter in template.parameters() {
                scope.bind(parameter.name(), Binding::Parameter(parameter.clone()));
            }
        }
        scope
    }

    fn check_references(&self) -> Asn1Result<()> {
        for id in self.ids() {
            let scope = self.definition_scope(id);
            let ty = &self.types[id.0];
            for reference in type_references(ty) {
                match scope.resolve_type(reference) {
                    Ok(_) => {}
                    Err(Asn1Error::Unsupported(_)) if self.is_template_owned(id) => {}
                    Err(e) => return Err(e),
                }
            }
            if let TypeKind::Instance {
                template,
                arguments,
            } = ty.kind()
            {
                let definition = self
                    .templates
                    .get(template)
                    .ok_or_else(|| Asn1Error::UnresolvedReference(template.clone()))?;
                if definition.parameters().len() != arguments.len() {
                    return Err(Asn1Error::Validation(format!(
                        "{} expects {} arguments, got {}",
                        template,
                        definition.parameters().len(),
                        arguments.len()
                    )));
                }
            }
            if let TypeKind::ClassField { class, .. } = ty.kind() {
                if !self.is_template_owned(id) {
                    object_class(&scope, scope.resolve_type(class)?)?;
                }
            }
        }
        let scope = Scope::new(self);
        for definition in &self.values {
            scope.resolve_type(&definition.ty)?;
        }
        Ok(())
    }

    fn check_cycles(&self) -> Asn1Result<()> {
        let scope = Scope::new(self);
        for id in self.ids().filter(|id| !self.is_template_owned(*id)) {
            underlying(&scope, id)?;
        }
        Ok(())
    }

    fn check_exports(&self) -> Asn1Result<()> {
        if let Exports::Only(names) = &self.exports {
            for name in names {
                if !self.type_names.contains_key(name)
                    && !self.value_names.contains_key(name)
                    && !self.templates.contains_key(name)
                {
                    return Err(Asn1Error::UnresolvedReference(format!(
                        "exported name {} is not defined in {}",
                        name, self.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Give the components of untagged collections context tags 0..N-1
    ///
    /// Returns the original component references so a failed validation
    /// can restore them.
    fn apply_automatic_tags(&mut self) -> Vec<(TypeId, usize, Ref<TypeId>)> {
        let mut rewrites = Vec::new();
        for id in self.ids() {
            let Some(components) = self.types[id.0].kind().components() else {
                continue;
            };
            let tagged = components.iter().any(|c| match &c.ty {
                Ref::Resolved(target) => self.types[target.0].tag().is_some(),
                Ref::Unresolved(_) => false,
            });
            if tagged || components.is_empty() {
                continue;
            }

            let originals: Vec<Ref<TypeId>> = components.iter().map(|c| c.ty.clone()).collect();
            let owner = self.template_owned.get(&id).cloned();
            for (index, original) in originals.into_iter().enumerate() {
                let wrapper = TypeId(self.types.len());
                self.types.push(
                    Type::defined(original.clone()).with_tag(TagSpec::context(index as u32)),
                );
                if let Some(owner) = &owner {
                    self.template_owned.insert(wrapper, owner.clone());
                }
                if let Some(components) = self.types[id.0].kind_mut().components_mut() {
                    components[index].ty = Ref::Resolved(wrapper);
                }
                rewrites.push((id, index, original));
            }
            log::trace!("Applied automatic tags to {}", id);
        }
        rewrites
    }

    fn check_collisions(&self) -> Asn1Result<()> {
        let scope = Scope::new(self);
        for id in self.ids().filter(|id| !self.is_template_owned(*id)) {
            check_tag_collisions(&scope, id)?;
        }
        Ok(())
    }

    fn optimize_values(&self) -> Asn1Result<Vec<Value>> {
        let scope = Scope::new(self);
        self.values
            .iter()
            .map(|definition| {
                let ty = scope.resolve_type(&definition.ty)?;
                optimize(&scope, ty, &definition.value)
            })
            .collect()
    }

    fn resolve_constraints(&self) -> Asn1Result<Vec<Option<Constraint>>> {
        let scope = Scope::new(self);
        let mut resolved = Vec::with_capacity(self.types.len());
        for id in self.ids() {
            if self.is_template_owned(id) {
                resolved.push(None);
                continue;
            }
            resolved.push(self.effective_constraint(&scope, id)?);
            // template bodies are resolved per instance
            if let TypeKind::Instance {
                template,
                arguments,
            } = self.types[id.0].kind()
            {
                let (body, inner) = scope.instantiate(template, arguments)?;
                self.effective_constraint(&inner, body)?;
            }
        }
        Ok(resolved)
    }

    fn check_values(&self) -> Asn1Result<()> {
        let scope = Scope::new(self);
        for definition in &self.values {
            let ty = scope.resolve_type(&definition.ty)?;
            check_value(&scope, ty, definition.current()).map_err(|e| {
                log::warn!("Value {} of module {} is invalid: {}", definition.name, self.name, e);
                e
            })?;
        }
        Ok(())
    }

    fn rollback(&mut self, types_len: usize, rewrites: &[(TypeId, usize, Ref<TypeId>)]) {
        for (owner, index, original) in rewrites.iter().rev() {
            if let Some(components) = self.types[owner.0].kind_mut().components_mut() {
                components[*index].ty = original.clone();
            }
        }
        self.types.truncate(types_len);
        self.template_owned.retain(|id, _| id.0 < types_len);
        self.constraints = None;
        for definition in &mut self.values {
            definition.optimized = None;
        }
    }
}

/// Type references a type holds directly
fn type_references(ty: &Type) -> Vec<&Ref<TypeId>> {
    match ty.kind() {
        TypeKind::Sequence(components) | TypeKind::Set(components) | TypeKind::Choice(components) => {
            components.iter().map(|c| &c.ty).collect()
        }
        TypeKind::SequenceOf(element) | TypeKind::SetOf(element) | TypeKind::Defined(element) => {
            vec![element]
        }
        TypeKind::ClassField { class, .. } => vec![class],
        TypeKind::ObjectClass(class) => class
            .fields
            .iter()
            .filter_map(|field| match field {
                ClassField::Value { ty, .. } => Some(ty),
                ClassField::Type { .. } => None,
            })
            .collect(),
        TypeKind::Instance { arguments, .. } => arguments
            .iter()
            .filter_map(|argument| match argument {
                TemplateArgument::Type(reference) => Some(reference),
                TemplateArgument::Value(_) => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Anonymous types a type refers to by handle
fn nested_types(ty: &Type) -> Vec<TypeId> {
    type_references(ty)
        .into_iter()
        .filter_map(|reference| match reference {
            Ref::Resolved(id) => Some(*id),
            Ref::Unresolved(_) => None,
        })
        .collect()
}

/// Rolls validation-owned state back unless committed
struct ValidationGuard<'m> {
    module: &'m mut Module,
    types_len: usize,
    disposables_mark: usize,
    rewrites: Vec<(TypeId, usize, Ref<TypeId>)>,
    committed: bool,
}

impl<'m> ValidationGuard<'m> {
    fn new(module: &'m mut Module) -> Self {
        let types_len = module.types.len();
        let disposables_mark = module.disposables.mark();
        Self {
            module,
            types_len,
            disposables_mark,
            rewrites: Vec::new(),
            committed: false,
        }
    }

    fn run(&mut self) -> Asn1Result<()> {
        self.module.check_references()?;
        self.module.check_cycles()?;
        self.module.check_exports()?;
        if self.module.tag_method == TagMethod::Automatic {
            let rewrites = self.module.apply_automatic_tags();
            self.rewrites.extend(rewrites);
        }
        self.module.check_collisions()?;

        let optimized = self.module.optimize_values()?;
        for (definition, value) in self.module.values.iter_mut().zip(optimized) {
            definition.optimized = Some(value);
        }
        let constraints = self.module.resolve_constraints()?;
        self.module.constraints = Some(constraints);
        self.module.check_values()
    }

    fn commit(mut self) {
        self.module.validated = true;
        self.committed = true;
        log::debug!(
            "Module {} validated with {} types",
            self.module.name,
            self.module.types.len()
        );
    }
}

impl Drop for ValidationGuard<'_> {
    fn drop(&mut self) {
        if !self.committed {
            log::debug!("Rolling back validation of module {}", self.module.name);
            self.module.rollback(self.types_len, &self.rewrites);
            self.module.disposables.dispose_from(self.disposables_mark);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::factory;
    use crate::disposable::MockDisposable;
    use crate::tagging::{possible_tags, tag_chain};
    use crate::types::Component;
    use asnkit_core::{Tag, TagEncoding};
    use mockall::Sequence;

    #[test]
    fn test_core_types_resolve() {
        let module = Module::new("Test");
        let scope = Scope::new(&module);
        for (name, _) in core_types() {
            let id = module.type_id(name).unwrap();
            assert_eq!(module.type_name(id), Some(name));
            assert!(module.get(id).unwrap().is_core());
            assert!(matches!(scope.resolve(name).unwrap(), Binding::Type(found) if found == id));
        }
        assert!(matches!(
            scope.resolve("Missing"),
            Err(Asn1Error::UnresolvedReference(_))
        ));
    }

    #[test]
    fn test_duplicate_definition() {
        let mut module = Module::new("Test");
        module.define_type("A", Type::boolean()).unwrap();
        assert!(module.define_value("A", Ref::named("INTEGER"), Value::Integer(1)).is_err());
    }

    #[test]
    fn test_unresolved_reference_fails_validation() {
        let mut module = Module::new("Test");
        module
            .define_type("A", Type::sequence(vec![Component::mandatory("x", Ref::named("Nope"))]))
            .unwrap();
        assert!(matches!(
            module.validate(),
            Err(Asn1Error::UnresolvedReference(_))
        ));
        assert!(!module.is_validated());
    }

    #[test]
    fn test_circular_definition() {
        let mut module = Module::new("Test");
        module.define_type("A", Type::defined(Ref::named("B"))).unwrap();
        module.define_type("B", Type::defined(Ref::named("A"))).unwrap();
        assert!(matches!(module.validate(), Err(Asn1Error::Validation(_))));
    }

    #[test]
    fn test_choice_reaching_itself_untagged() {
        let mut module = Module::new("Test");
        module
            .define_type(
                "Alt",
                Type::choice(vec![
                    Component::mandatory("a", Ref::named("INTEGER")),
                    Component::mandatory("b", Ref::named("Alt")),
                ]),
            )
            .unwrap();
        assert!(matches!(module.validate(), Err(Asn1Error::Validation(_))));
        assert!(!module.is_validated());
    }

    #[test]
    fn test_choice_reaching_itself_through_tag() {
        let mut module = Module::new("Test");
        let tagged = module
            .add_type(Type::defined(Ref::named("Alt")).with_tag(TagSpec::context(0)))
            .unwrap();
        module
            .define_type(
                "Alt",
                Type::choice(vec![
                    Component::mandatory("a", Ref::named("INTEGER")),
                    Component::mandatory("b", Ref::to(tagged)),
                ]),
            )
            .unwrap();
        module
            .define_type(
                "Pair",
                Type::choice(vec![
                    Component::mandatory("left", Ref::named("Alt")),
                    Component::mandatory("right", Ref::named("BOOLEAN")),
                ]),
            )
            .unwrap();
        module.validate().unwrap();
        let scope = Scope::new(&module);
        assert_eq!(
            possible_tags(&scope, module.type_id("Pair").unwrap()).unwrap(),
            vec![Tag::INTEGER, Tag::context(0), Tag::BOOLEAN]
        );
    }

    #[test]
    fn test_recursive_collection_is_fine() {
        let mut module = Module::new("Test");
        module
            .define_type(
                "Node",
                Type::sequence(vec![
                    Component::mandatory("value", Ref::named("INTEGER")),
                    Component::optional("next", Ref::named("Node")),
                ]),
            )
            .unwrap();
        module.validate().unwrap();
    }

    #[test]
    fn test_mutators_fail_after_validation() {
        let mut module = Module::new("Test");
        module.validate().unwrap();
        assert!(module.set_tag_method(TagMethod::Implicit).is_err());
        assert!(module.set_exports(Exports::Nothing).is_err());
        assert!(module.define_type("A", Type::boolean()).is_err());
        assert!(module.add_disposable(Box::new(MockDisposable::new())).is_err());
        assert!(module.validate().is_err());
    }

    #[test]
    fn test_exports() {
        let mut module = Module::new("Test");
        module.define_type("Public", Type::boolean()).unwrap();
        module.define_type("Private", Type::boolean()).unwrap();
        module.set_exports(Exports::only(["Public"])).unwrap();
        module.validate().unwrap();
        module.exported_type("Public").unwrap();
        assert!(module.exported_type("Private").is_err());

        let mut broken = Module::new("Broken");
        broken.set_exports(Exports::only(["Ghost"])).unwrap();
        assert!(matches!(
            broken.validate(),
            Err(Asn1Error::UnresolvedReference(_))
        ));
    }

    #[test]
    fn test_automatic_tagging() {
        let mut module = Module::new("Test");
        module.set_tag_method(TagMethod::Automatic).unwrap();
        let pair = module
            .define_type(
                "Pair",
                Type::sequence(vec![
                    Component::optional("a", Ref::named("INTEGER")),
                    Component::optional("b", Ref::named("INTEGER")),
                ]),
            )
            .unwrap();
        module.validate().unwrap();

        let scope = Scope::new(&module);
        let components = module.get(pair).unwrap().kind().components().unwrap();
        for (index, component) in components.iter().enumerate() {
            let id = scope.resolve_type(&component.ty).unwrap();
            assert_eq!(
                tag_chain(&scope, id).unwrap(),
                vec![TagEncoding::primitive(Tag::context(index as u32))]
            );
        }
    }

    #[test]
    fn test_failed_validation_rolls_back_automatic_tags() {
        let mut module = Module::new("Test");
        module.set_tag_method(TagMethod::Automatic).unwrap();
        let pair = module
            .define_type(
                "Pair",
                Type::sequence(vec![
                    Component::mandatory("a", Ref::named("INTEGER")),
                    Component::mandatory("b", Ref::named("INTEGER")),
                ]),
            )
            .unwrap();
        module
            .define_value("bad", Ref::named("Pair"), Value::collection([("a", Value::Integer(1))]))
            .unwrap();
        let before = module.get(pair).unwrap().clone();
        assert!(module.validate().is_err());
        assert_eq!(module.get(pair).unwrap(), &before);
        assert_eq!(module.types.len(), core_types().len() + 1);
    }

    #[test]
    fn test_tag_collision_fails_validation() {
        let mut module = Module::new("Test");
        module
            .define_type(
                "Alt",
                Type::choice(vec![
                    Component::mandatory("a", Ref::named("INTEGER")),
                    Component::mandatory("b", Ref::named("INTEGER")),
                ]),
            )
            .unwrap();
        assert!(matches!(module.validate(), Err(Asn1Error::TagCollision(_))));
    }

    #[test]
    fn test_values_are_optimized_and_checked() {
        let mut module = Module::new("Test");
        module
            .define_type(
                "Small",
                Type::integer().with_constraint(factory::value_range(
                    Some(Value::Integer(0)),
                    true,
                    Some(Value::Integer(9)),
                    true,
                )),
            )
            .unwrap();
        module
            .define_value("three", Ref::named("Small"), Value::Integer(3))
            .unwrap();
        module
            .define_value("alias", Ref::named("Small"), Value::reference("three"))
            .unwrap();
        module.validate().unwrap();
        assert_eq!(module.value("alias"), Some(&Value::Integer(3)));

        let mut broken = Module::new("Broken");
        broken
            .define_type(
                "Small",
                Type::integer().with_constraint(factory::value(Value::Integer(1))),
            )
            .unwrap();
        broken
            .define_value("two", Ref::named("Small"), Value::Integer(2))
            .unwrap();
        assert!(matches!(
            broken.validate(),
            Err(Asn1Error::ConstraintViolation { .. })
        ));
    }

    #[test]
    fn test_disposables_released_in_reverse_order() {
        let mut seq = Sequence::new();
        let mut first = MockDisposable::new();
        let mut second = MockDisposable::new();
        second
            .expect_dispose()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        first
            .expect_dispose()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        let mut module = Module::new("Test");
        module.add_disposable(Box::new(first)).unwrap();
        module.add_disposable(Box::new(second)).unwrap();
        // a failed validation keeps resources registered before it
        module.define_type("A", Type::defined(Ref::named("Nope"))).unwrap();
        assert!(module.validate().is_err());
        drop(module);
    }
}
