//! Typed BER/DER writer
//!
//! A [`BerWriter`] encodes values of a validated module's types into a
//! byte stream. Every value is optimized and checked against its type first,
//! so nothing that violates a constraint reaches the stream.
//!
//! # Usage Example
//!
//! ```rust
//! use asnkit_ber::writer::BerWriter;
//! use asnkit_core::Value;
//! use asnkit_schema::{Module, Type};
//!
//! let mut module = Module::new("Example");
//! module.define_type("Count", Type::integer()).unwrap();
//! module.validate().unwrap();
//!
//! let mut out = Vec::new();
//! BerWriter::new(&module, &mut out)
//!     .write_named("Count", &Value::Integer(5))
//!     .unwrap();
//! assert_eq!(out, vec![0x02, 0x01, 0x05]);
//! ```

use crate::config::CodecConfig;
use crate::decoder::BerDecoder;
use crate::encoder::{
    bit_string_content, bmp_content, boolean_content, integer_content, oid_content, real_content,
    time_content, BerEncoder,
};
use crate::types::BerTag;
use asnkit_core::{Asn1Error, Asn1Result, NamedValue, Tag, TagEncoding, TaggingMode, Value};
use asnkit_schema::constraint::open_type_for;
use asnkit_schema::structure::class_field;
use asnkit_schema::tagging::{declared_tag, universal_tag};
use asnkit_schema::{
    check_value, optimize, ClassField, Component, Enclosing, Module, Presence, Scope, StringKind,
    Type, TypeId, TypeKind,
};
use std::cmp::Ordering;
use std::io::Write;

/// Writes BER or DER encodings of typed values to a stream
///
/// The writer owns its stream and flushes it after every value, whether the
/// value was written or rejected, and once more when it is dropped.
pub struct BerWriter<'m, W: Write> {
    module: &'m Module,
    config: CodecConfig,
    stream: W,
}

impl<'m, W: Write> BerWriter<'m, W> {
    /// Writer using plain BER
    pub fn new(module: &'m Module, stream: W) -> Self {
        Self::with_config(module, stream, CodecConfig::default())
    }

    pub fn with_config(module: &'m Module, stream: W, config: CodecConfig) -> Self {
        Self {
            module,
            config,
            stream,
        }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn get_ref(&self) -> &W {
        &self.stream
    }

    /// Encode one value of type `ty`
    ///
    /// # Encoding Process
    /// 1. Optimize the value against the type
    /// 2. Check it, constraints included
    /// 3. Emit the TLV and flush the stream
    pub fn write(&mut self, ty: TypeId, value: &Value) -> Asn1Result<()> {
        let result = self.write_value(ty, value);
        let flushed = self
            .stream
            .flush()
            .map_err(|e| Asn1Error::io(describe(self.module, ty), e));
        result.and(flushed)
    }

    /// Encode one value of a type named in the module
    pub fn write_named(&mut self, name: &str, value: &Value) -> Asn1Result<()> {
        let ty = self.module.type_id(name)?;
        self.write(ty, value)
    }

    fn write_value(&mut self, ty: TypeId, value: &Value) -> Asn1Result<()> {
        if !self.module.is_validated() {
            return Err(Asn1Error::Validation(format!(
                "module {} must be validated before encoding",
                self.module.name()
            )));
        }
        let scope = Scope::new(self.module);
        let value = optimize(&scope, ty, value)?;
        check_value(&scope, ty, &value)?;

        let emitter = Emitter::new(self.config)?;
        let encoded = emitter.encode(&scope, ty, &value, 0)?;
        let context = describe(self.module, ty);
        self.stream
            .write_all(&encoded)
            .map_err(|e| Asn1Error::io(context.clone(), e))?;
        log::debug!("Wrote {} octets for {}", encoded.len(), context);
        Ok(())
    }

    /// Flush the stream and report the outcome
    pub fn finish(mut self) -> Asn1Result<()> {
        self.stream
            .flush()
            .map_err(|e| Asn1Error::io(format!("module {}", self.module.name()), e))
    }
}

impl<W: Write> Drop for BerWriter<'_, W> {
    fn drop(&mut self) {
        if let Err(e) = self.stream.flush() {
            log::warn!("Failed to flush BER stream on drop: {}", e);
        }
    }
}

/// Name of a type for diagnostics
pub(crate) fn describe(module: &Module, ty: TypeId) -> String {
    match module.type_name(ty) {
        Some(name) => name.to_string(),
        None => match module.get(ty) {
            Ok(t) => t.to_string(),
            Err(_) => ty.to_string(),
        },
    }
}

/// Produces complete TLVs for values of a type
struct Emitter {
    config: CodecConfig,
    /// Settings for re-reading our own output when an implicit tag
    /// replaces the outermost identifier
    reparse: CodecConfig,
}

impl Emitter {
    fn new(config: CodecConfig) -> Asn1Result<Self> {
        let reparse = CodecConfig::builder()
            .allow_indefinite_length(true)
            .max_depth(config.max_depth())
            .build()?;
        Ok(Self { config, reparse })
    }

    fn tlv(&self, identifier: TagEncoding, content: &[u8]) -> Vec<u8> {
        let mut encoder = BerEncoder::with_capacity(content.len() + 6);
        if identifier.constructed && self.config.indefinite_length() {
            encoder.encode_indefinite(identifier.tag, content);
        } else {
            encoder.encode_tlv(identifier, content);
        }
        encoder.into_bytes().to_vec()
    }

    fn encode(&self, scope: &Scope<'_>, id: TypeId, value: &Value, depth: usize) -> Asn1Result<Vec<u8>> {
        if depth > self.config.max_depth() {
            return Err(Asn1Error::Encoding(format!(
                "value nests deeper than {} levels",
                self.config.max_depth()
            )));
        }
        let encoded = self.encode_untagged(scope, id, value, depth)?;
        match declared_tag(scope, id)? {
            None => Ok(encoded),
            Some((tag, TaggingMode::Explicit)) => {
                Ok(self.tlv(TagEncoding::constructed(tag), &encoded))
            }
            Some((tag, TaggingMode::Implicit)) => {
                let mut decoder = BerDecoder::new(&encoded, &self.reparse);
                let inner = decoder.decode_tlv()?;
                Ok(self.tlv(
                    TagEncoding::new(tag, inner.tag.is_constructed()),
                    inner.content,
                ))
            }
        }
    }

    /// Encoding of a type ignoring its own declared tag
    fn encode_untagged(
        &self,
        scope: &Scope<'_>,
        id: TypeId,
        value: &Value,
        depth: usize,
    ) -> Asn1Result<Vec<u8>> {
        let ty = scope.module().get(id)?;
        match (ty.kind(), value) {
            (TypeKind::Defined(target), _) => {
                self.encode(scope, scope.resolve_type(target)?, value, depth)
            }
            (
                TypeKind::Instance {
                    template,
                    arguments,
                },
                _,
            ) => {
                let (body, inner) = scope.instantiate(template, arguments)?;
                self.encode(&inner, body, value, depth)
            }
            (TypeKind::ClassField { class, field }, _) => match class_field(scope, class, field)? {
                ClassField::Value { ty, .. } => {
                    self.encode(scope, scope.resolve_type(ty)?, value, depth)
                }
                ClassField::Type { .. } => {
                    let actual = open_type_for(scope, id)?.ok_or_else(|| {
                        Asn1Error::Unsupported(format!(
                            "open type {} is not bound by a component relation",
                            ty
                        ))
                    })?;
                    log::trace!("Encoding open type {} as {}", ty, actual);
                    self.encode(scope, actual, value, depth + 1)
                }
            },
            (TypeKind::Choice(alternatives), Value::Named(chosen)) => {
                let alternative = alternatives
                    .iter()
                    .find(|a| a.name == chosen.name)
                    .ok_or_else(|| {
                        Asn1Error::Encoding(format!("{} has no alternative {}", ty, chosen.name))
                    })?;
                self.encode(scope, scope.resolve_type(&alternative.ty)?, &chosen.value, depth + 1)
            }
            (TypeKind::Sequence(components), Value::NamedCollection(given)) => {
                let elements = self.encode_components(scope, components, given, depth)?;
                Ok(self.tlv(TagEncoding::constructed(Tag::SEQUENCE), &elements.concat()))
            }
            (TypeKind::Set(components), Value::NamedCollection(given)) => {
                let mut elements = self.encode_components(scope, components, given, depth)?;
                if self.config.is_der() {
                    let mut keyed = elements
                        .into_iter()
                        .map(|e| Ok((BerTag::decode(&e, false)?.0.tag(), e)))
                        .collect::<Asn1Result<Vec<_>>>()?;
                    keyed.sort_by(|a, b| a.0.cmp(&b.0));
                    elements = keyed.into_iter().map(|(_, e)| e).collect();
                }
                Ok(self.tlv(TagEncoding::constructed(Tag::SET), &elements.concat()))
            }
            (TypeKind::SequenceOf(element), Value::Collection(items)) => {
                let element = scope.resolve_type(element)?;
                let elements = items
                    .iter()
                    .map(|item| self.encode(scope, element, item, depth + 1))
                    .collect::<Asn1Result<Vec<_>>>()?;
                Ok(self.tlv(TagEncoding::constructed(Tag::SEQUENCE), &elements.concat()))
            }
            (TypeKind::SetOf(element), Value::Collection(items)) => {
                let element = scope.resolve_type(element)?;
                let mut elements = items
                    .iter()
                    .map(|item| self.encode(scope, element, item, depth + 1))
                    .collect::<Asn1Result<Vec<_>>>()?;
                if self.config.is_der() {
                    elements.sort_by(|a, b| der_set_of_order(a, b));
                }
                Ok(self.tlv(TagEncoding::constructed(Tag::SET), &elements.concat()))
            }
            (kind, value) => {
                let tag = kind
                    .family()
                    .and_then(universal_tag)
                    .ok_or_else(|| Asn1Error::Unsupported(format!("{} has no encoding", ty)))?;
                let content = primitive_content(ty, value)?;
                Ok(self.tlv(TagEncoding::primitive(tag), &content))
            }
        }
    }

    /// Encodings of the present components, in declaration order
    fn encode_components(
        &self,
        scope: &Scope<'_>,
        components: &[Component],
        given: &[NamedValue],
        depth: usize,
    ) -> Asn1Result<Vec<Vec<u8>>> {
        let inner = scope.child().with_enclosing(Enclosing::new(components, given));
        let mut elements = Vec::with_capacity(given.len());
        for component in components {
            let Some(named) = given.iter().find(|g| g.name == component.name) else {
                continue;
            };
            let id = inner.resolve_type(&component.ty)?;
            if let Presence::Default(default) = &component.presence {
                if self.config.is_der() && optimize(&inner, id, default)? == named.value {
                    log::trace!("Omitting component {} equal to its default", component.name);
                    continue;
                }
            }
            elements.push(self.encode(&inner, id, &named.value, depth + 1)?);
        }
        Ok(elements)
    }
}

fn primitive_content(ty: &Type, value: &Value) -> Asn1Result<Vec<u8>> {
    let content = match (ty.kind(), value) {
        (TypeKind::Boolean, Value::Boolean(b)) => boolean_content(*b).to_vec(),
        (TypeKind::Integer(_) | TypeKind::Enumerated(_), Value::Integer(i)) => integer_content(*i),
        (TypeKind::Real, Value::Real(r)) => real_content(r)?,
        (TypeKind::Null, Value::Null) => Vec::new(),
        (TypeKind::BitString, Value::BitString(bits)) => bit_string_content(bits),
        (TypeKind::OctetString, Value::OctetString(bytes)) => bytes.clone(),
        (TypeKind::ObjectIdentifier, Value::ObjectIdentifier(oid)) => oid_content(oid)?,
        (TypeKind::String(StringKind::Bmp), Value::CString(text)) => bmp_content(text)?,
        (TypeKind::String(_), Value::CString(text)) => text.as_bytes().to_vec(),
        (TypeKind::Time(kind), Value::Time(time)) => time_content(*kind, time)?,
        (_, value) => {
            return Err(Asn1Error::Encoding(format!(
                "{} cannot be encoded as {}",
                value, ty
            )));
        }
    };
    Ok(content)
}

/// SET OF order under DER: encodings compared as octet strings, the shorter
/// one padded with trailing zero octets
fn der_set_of_order(a: &[u8], b: &[u8]) -> Ordering {
    let octet = |s: &[u8], i: usize| s.get(i).copied().unwrap_or(0);
    (0..a.len().max(b.len()))
        .map(|i| octet(a, i).cmp(&octet(b, i)))
        .find(|o| o.is_ne())
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}
