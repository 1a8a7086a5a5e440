//! Name resolution scopes
//!
//! A [`Scope`] is a chain of binding frames ending at a module. Looking up a
//! name checks the local bindings, then each parent frame, then the module's
//! own definitions and finally the core types. Scopes also carry per-context
//! options (such as "inside a permitted alphabet") and, while checking a
//! component, the enclosing collection so relational constraints can see
//! sibling values.

use crate::module::Module;
use crate::optimize::optimize;
use crate::parameter::{ParameterKind, TemplateArgument, TemplateParameter, TypeTemplate};
use crate::types::{Component, TypeId};
use asnkit_core::{Asn1Error, Asn1Result, NamedValue, Ref, Value};
use std::collections::{HashMap, HashSet};

/// Deepest nesting of parameterized instances before resolution gives up
pub const MAX_INSTANCE_DEPTH: usize = 64;

/// What a name is bound to inside a scope frame
#[derive(Debug, Clone)]
pub enum Binding {
    Type(TypeId),
    Value(Value),
    /// Formal parameter of a template whose body is being checked in isolation
    Parameter(TemplateParameter),
}

/// Result of resolving a name
pub type Symbol = Binding;

/// Per-context options; copied into child scopes, never written back
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScopeOptions {
    /// Single values are interpreted as character sets
    pub permitted_alphabet: bool,
}

/// The collection a component value is being checked inside of
#[derive(Debug, Clone, Copy)]
pub struct Enclosing<'a> {
    pub components: &'a [Component],
    pub values: &'a [NamedValue],
}

impl<'a> Enclosing<'a> {
    pub fn new(components: &'a [Component], values: &'a [NamedValue]) -> Self {
        Self { components, values }
    }

    pub fn component(&self, name: &str) -> Option<&'a Component> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn value(&self, name: &str) -> Option<&'a Value> {
        self.values.iter().find(|v| v.name == name).map(|v| &v.value)
    }
}

/// A name resolution context
#[derive(Debug)]
pub struct Scope<'a> {
    module: &'a Module,
    parent: Option<&'a Scope<'a>>,
    bindings: HashMap<String, Binding>,
    options: ScopeOptions,
    enclosing: Option<Enclosing<'a>>,
    depth: usize,
}

impl<'a> Scope<'a> {
    /// Root scope of a module
    pub fn new(module: &'a Module) -> Self {
        Self {
            module,
            parent: None,
            bindings: HashMap::new(),
            options: ScopeOptions::default(),
            enclosing: None,
            depth: 0,
        }
    }

    /// New frame on top of this one, inheriting options and enclosing collection
    pub fn child(&'a self) -> Scope<'a> {
        Scope {
            module: self.module,
            parent: Some(self),
            bindings: HashMap::new(),
            options: self.options,
            enclosing: self.enclosing,
            depth: self.depth,
        }
    }

    pub fn with_options(mut self, options: ScopeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_enclosing(mut self, enclosing: Enclosing<'a>) -> Self {
        self.enclosing = Some(enclosing);
        self
    }

    pub fn bind(&mut self, name: impl Into<String>, binding: Binding) {
        self.bindings.insert(name.into(), binding);
    }

    pub fn module(&self) -> &'a Module {
        self.module
    }

    /// Number of template instantiations this scope is nested in
    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    pub fn options(&self) -> ScopeOptions {
        self.options
    }

    pub fn permitted_alphabet(&self) -> bool {
        self.options.permitted_alphabet
    }

    pub fn enclosing(&self) -> Option<&Enclosing<'a>> {
        self.enclosing.as_ref()
    }

    /// Look a name up through the frame chain, then the module, then the core types
    pub fn resolve(&self, name: &str) -> Asn1Result<Symbol> {
        let mut frame = Some(self);
        while let Some(scope) = frame {
            if let Some(binding) = scope.bindings.get(name) {
                return Ok(binding.clone());
            }
            frame = scope.parent;
        }
        self.module
            .lookup(name)
            .ok_or_else(|| Asn1Error::UnresolvedReference(name.to_string()))
    }

    /// Resolve a type reference to an arena handle
    pub fn resolve_type(&self, reference: &Ref<TypeId>) -> Asn1Result<TypeId> {
        match reference {
            Ref::Resolved(id) => {
                self.module.get(*id)?;
                Ok(*id)
            }
            Ref::Unresolved(name) => match self.resolve(name)? {
                Binding::Type(id) => Ok(id),
                Binding::Value(_) => Err(Asn1Error::IllegalValue(format!(
                    "{} names a value where a type is expected",
                    name
                ))),
                Binding::Parameter(p) => Err(Asn1Error::Unsupported(format!(
                    "parameter {} has no actual argument in this context",
                    p
                ))),
            },
        }
    }

    /// Follow a chain of value references to the referenced value
    ///
    /// Non-reference values are returned as they are. A reference chain that
    /// loops back on itself is a validation error.
    pub fn resolve_value(&self, value: &Value) -> Asn1Result<Value> {
        let mut visited = HashSet::new();
        let mut current = value.clone();
        while let Value::Reference(name) = &current {
            if !visited.insert(name.clone()) {
                return Err(Asn1Error::Validation(format!(
                    "circular value reference through {}",
                    name
                )));
            }
            current = match self.resolve(name)? {
                Binding::Value(v) => v,
                Binding::Type(_) => {
                    return Err(Asn1Error::IllegalValue(format!(
                        "{} names a type where a value is expected",
                        name
                    )));
                }
                Binding::Parameter(p) => {
                    return Err(Asn1Error::Unsupported(format!(
                        "parameter {} has no actual argument in this context",
                        p
                    )));
                }
            };
        }
        Ok(current)
    }

    /// Parameterized type definition of the module
    pub fn resolve_template(&self, name: &str) -> Asn1Result<&'a TypeTemplate> {
        self.module
            .template(name)
            .ok_or_else(|| Asn1Error::UnresolvedReference(name.to_string()))
    }

    /// Bind the actual arguments of an instance and return the template body
    /// together with the scope it must be interpreted in
    pub fn instantiate(
        &'a self,
        template: &str,
        arguments: &[TemplateArgument],
    ) -> Asn1Result<(TypeId, Scope<'a>)> {
        let definition = self.resolve_template(template)?;
        if definition.parameters().len() != arguments.len() {
            return Err(Asn1Error::Validation(format!(
                "{} expects {} arguments, got {}",
                template,
                definition.parameters().len(),
                arguments.len()
            )));
        }
        if self.depth >= MAX_INSTANCE_DEPTH {
            return Err(Asn1Error::Validation(format!(
                "instances of {} nest deeper than {}",
                template, MAX_INSTANCE_DEPTH
            )));
        }

        let mut scope = self.child();
        scope.depth = self.depth + 1;
        for (parameter, argument) in definition.parameters().iter().zip(arguments) {
            let binding = match (parameter.kind(), argument) {
                (ParameterKind::Type, TemplateArgument::Type(reference)) => {
                    Binding::Type(self.resolve_type(reference)?)
                }
                (ParameterKind::Value { governor }, TemplateArgument::Value(value)) => {
                    let value = match governor {
                        Some(governor) => optimize(self, self.resolve_type(governor)?, value)?,
                        None => self.resolve_value(value)?,
                    };
                    Binding::Value(value)
                }
                _ => {
                    return Err(Asn1Error::IllegalValue(format!(
                        "argument {} of {} does not match parameter {}",
                        parameter.index(),
                        template,
                        parameter
                    )));
                }
            };
            log::trace!("Binding {} = {:?} for {}", parameter.name(), binding, template);
            scope.bind(parameter.name(), binding);
        }
        Ok((definition.body(), scope))
    }
}
