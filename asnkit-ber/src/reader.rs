//! Typed BER/DER reader
//!
//! A [`BerReader`] pulls one complete TLV at a time from a byte stream and
//! interprets it against a type of a validated module. Decoded values are
//! checked, constraints included, before they are handed out.
//!
//! # Usage Example
//!
//! ```rust
//! use asnkit_ber::reader::BerReader;
//! use asnkit_core::Value;
//! use asnkit_schema::{Module, Type};
//!
//! let mut module = Module::new("Example");
//! module.define_type("Count", Type::integer()).unwrap();
//! module.validate().unwrap();
//!
//! let data: &[u8] = &[0x02, 0x01, 0x05, 0x02, 0x01, 0x06];
//! let mut reader = BerReader::new(&module, data);
//! assert_eq!(reader.read_named("Count").unwrap(), Value::Integer(5));
//! assert_eq!(reader.read_named("Count").unwrap(), Value::Integer(6));
//! ```

use crate::config::CodecConfig;
use crate::decoder::{
    bit_string_value, bmp_value, boolean_value, integer_value, null_value, oid_value, real_value,
    time_value, utf8_value, BerDecoder, Tlv,
};
use crate::types::BerLength;
use crate::writer::describe;
use asnkit_core::{Asn1Error, Asn1Result, NamedValue, Tag, TaggingMode, Value};
use asnkit_schema::constraint::open_type_for;
use asnkit_schema::structure::{class_field, referenced_class_field};
use asnkit_schema::tagging::{declared_tag, possible_tags, universal_tag};
use asnkit_schema::{
    check_value, ClassField, Component, Enclosing, Module, Scope, StringKind, TypeId, TypeKind,
};
use std::io::{self, Read};

/// Identifier octets longer than this cannot hold a tag number we accept
const MAX_IDENTIFIER_LEN: usize = 6;

/// Reads BER or DER encoded values of known types from a stream
pub struct BerReader<'m, R: Read> {
    module: &'m Module,
    config: CodecConfig,
    stream: R,
}

impl<'m, R: Read> BerReader<'m, R> {
    pub fn new(module: &'m Module, stream: R) -> Self {
        Self::with_config(module, stream, CodecConfig::default())
    }

    pub fn with_config(module: &'m Module, stream: R, config: CodecConfig) -> Self {
        Self {
            module,
            config,
            stream,
        }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn get_ref(&self) -> &R {
        &self.stream
    }

    pub fn into_inner(self) -> R {
        self.stream
    }

    /// Decode the next value of type `ty`; the end of the stream is an error
    pub fn read(&mut self, ty: TypeId) -> Asn1Result<Value> {
        self.read_next(ty)?.ok_or_else(|| {
            Asn1Error::Decoding(format!(
                "stream ended before a value of {}",
                describe(self.module, ty)
            ))
        })
    }

    pub fn read_named(&mut self, name: &str) -> Asn1Result<Value> {
        let ty = self.module.type_id(name)?;
        self.read(ty)
    }

    /// Decode the next value of type `ty`, `None` when the stream ends
    /// cleanly before its first octet
    pub fn read_next(&mut self, ty: TypeId) -> Asn1Result<Option<Value>> {
        if !self.module.is_validated() {
            return Err(Asn1Error::Validation(format!(
                "module {} must be validated before decoding",
                self.module.name()
            )));
        }
        let context = describe(self.module, ty);
        let Some(raw) = self.read_raw(&context)? else {
            return Ok(None);
        };

        let mut decoder = BerDecoder::new(&raw, &self.config);
        let tlv = decoder.decode_tlv()?;
        let scope = Scope::new(self.module);
        let value = Interpreter {
            config: self.config,
        }
        .decode(&scope, ty, tlv, false, 0)?;
        check_value(&scope, ty, &value)?;
        log::debug!("Read {} octets for {}", raw.len(), context);
        Ok(Some(value))
    }

    /// Octets of the next complete TLV
    fn read_raw(&mut self, context: &str) -> Asn1Result<Option<Vec<u8>>> {
        let mut first = [0u8; 1];
        loop {
            match self.stream.read(&mut first) {
                Ok(0) => return Ok(None),
                Ok(_) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Asn1Error::io(context, e)),
            }
        }
        let mut raw = vec![first[0]];
        self.finish_tlv(&mut raw, 0, 0, context)?;
        Ok(Some(raw))
    }

    /// Append one complete TLV, returns whether it was an end-of-contents
    fn read_tlv(&mut self, raw: &mut Vec<u8>, depth: usize, context: &str) -> Asn1Result<bool> {
        let start = raw.len();
        self.read_exact_into(raw, 1, context)?;
        self.finish_tlv(raw, start, depth, context)
    }

    /// Read the rest of a TLV whose first identifier octet is at `start`
    fn finish_tlv(
        &mut self,
        raw: &mut Vec<u8>,
        start: usize,
        depth: usize,
        context: &str,
    ) -> Asn1Result<bool> {
        if depth > self.config.max_depth() {
            return Err(Asn1Error::Decoding(format!(
                "encoding of {} nests deeper than {} levels",
                context,
                self.config.max_depth()
            )));
        }
        let first = raw[start];
        if first & 0x1F == 0x1F {
            loop {
                self.read_exact_into(raw, 1, context)?;
                if raw[raw.len() - 1] & 0x80 == 0 {
                    break;
                }
                if raw.len() - start > MAX_IDENTIFIER_LEN {
                    return Err(Asn1Error::Decoding(format!(
                        "identifier octets of {} are too long",
                        context
                    )));
                }
            }
        }
        let constructed = first & 0x20 != 0;

        let length_start = raw.len();
        self.read_exact_into(raw, 1, context)?;
        let length_octet = raw[length_start];
        if length_octet == 0x80 {
            if !self.config.allow_indefinite_length() {
                return Err(Asn1Error::Decoding(format!(
                    "indefinite length in {} is not allowed",
                    context
                )));
            }
            if !constructed {
                return Err(Asn1Error::Decoding(format!(
                    "primitive encoding in {} uses the indefinite length form",
                    context
                )));
            }
            while !self.read_tlv(raw, depth + 1, context)? {}
            return Ok(false);
        }
        if length_octet & 0x80 != 0 {
            self.read_exact_into(raw, usize::from(length_octet & 0x7F), context)?;
        }
        let (length, _) = BerLength::decode(&raw[length_start..], self.config.is_der())?;
        let length = length.value().unwrap_or(0);
        self.read_exact_into(raw, length, context)?;
        Ok(first == 0 && length_octet == 0 && length_start == start + 1)
    }

    fn read_exact_into(&mut self, raw: &mut Vec<u8>, count: usize, context: &str) -> Asn1Result<()> {
        let read = (&mut self.stream)
            .take(count as u64)
            .read_to_end(raw)
            .map_err(|e| Asn1Error::io(context, e))?;
        if read < count {
            return Err(Asn1Error::io(
                context,
                io::Error::new(io::ErrorKind::UnexpectedEof, "stream ended inside a value"),
            ));
        }
        Ok(())
    }
}

/// Turns TLVs into values of a type
struct Interpreter {
    config: CodecConfig,
}

impl Interpreter {
    fn strict(&self) -> bool {
        self.config.is_der()
    }

    fn decoder<'a>(&self, content: &'a [u8]) -> BerDecoder<'a> {
        BerDecoder::new(content, &self.config)
    }

    /// Decode `tlv` as a value of `id`
    ///
    /// `tag_checked` is set when an outer implicit tag already replaced and
    /// consumed the outermost identifier of this type.
    fn decode(
        &self,
        scope: &Scope<'_>,
        id: TypeId,
        tlv: Tlv<'_>,
        tag_checked: bool,
        depth: usize,
    ) -> Asn1Result<Value> {
        if depth > self.config.max_depth() {
            return Err(Asn1Error::Decoding(format!(
                "value nests deeper than {} levels",
                self.config.max_depth()
            )));
        }
        let Some((tag, mode)) = declared_tag(scope, id)? else {
            return self.decode_untagged(scope, id, tlv, tag_checked, depth);
        };
        if !tag_checked && tlv.tag.tag() != tag {
            return Err(Asn1Error::Decoding(format!(
                "expected {} for {}, found {}",
                tag,
                describe(scope.module(), id),
                tlv.tag
            )));
        }
        match mode {
            TaggingMode::Implicit => self.decode_untagged(scope, id, tlv, true, depth),
            TaggingMode::Explicit => {
                if !tlv.tag.is_constructed() {
                    return Err(Asn1Error::Decoding(format!(
                        "explicit tag {} must be constructed",
                        tlv.tag
                    )));
                }
                let mut inner = self.decoder(tlv.content);
                let wrapped = inner.decode_tlv()?;
                if inner.has_remaining() {
                    return Err(Asn1Error::Decoding(format!(
                        "explicit tag {} holds more than one value",
                        tlv.tag
                    )));
                }
                self.decode_untagged(scope, id, wrapped, false, depth + 1)
            }
        }
    }

    fn decode_untagged(
        &self,
        scope: &Scope<'_>,
        id: TypeId,
        tlv: Tlv<'_>,
        tag_checked: bool,
        depth: usize,
    ) -> Asn1Result<Value> {
        let ty = scope.module().get(id)?;
        match ty.kind() {
            TypeKind::Defined(target) => {
                self.decode(scope, scope.resolve_type(target)?, tlv, tag_checked, depth)
            }
            TypeKind::Instance {
                template,
                arguments,
            } => {
                let (body, inner) = scope.instantiate(template, arguments)?;
                self.decode(&inner, body, tlv, tag_checked, depth)
            }
            TypeKind::ClassField { class, field } => match class_field(scope, class, field)? {
                ClassField::Value { ty, .. } => {
                    self.decode(scope, scope.resolve_type(ty)?, tlv, tag_checked, depth)
                }
                ClassField::Type { .. } => {
                    let actual = open_type_for(scope, id)?.ok_or_else(|| {
                        Asn1Error::Unsupported(format!(
                            "open type {} is not bound by a component relation",
                            ty
                        ))
                    })?;
                    self.decode(scope, actual, tlv, tag_checked, depth + 1)
                }
            },
            TypeKind::Choice(alternatives) => {
                for alternative in alternatives {
                    let alternative_id = scope.resolve_type(&alternative.ty)?;
                    let tags = possible_tags(scope, alternative_id)?;
                    if tags.is_empty() || tags.contains(&tlv.tag.tag()) {
                        let value = self.decode(scope, alternative_id, tlv, false, depth + 1)?;
                        return Ok(Value::named(alternative.name.clone(), value));
                    }
                }
                Err(Asn1Error::Decoding(format!(
                    "no alternative of {} starts with {}",
                    ty, tlv.tag
                )))
            }
            TypeKind::ObjectClass(_) => Err(Asn1Error::Unsupported(format!(
                "object class {} has no encoding",
                ty
            ))),
            kind => {
                let expected = kind
                    .family()
                    .and_then(universal_tag)
                    .ok_or_else(|| Asn1Error::Unsupported(format!("{} has no encoding", ty)))?;
                if !tag_checked && tlv.tag.tag() != expected {
                    return Err(Asn1Error::Decoding(format!(
                        "expected {} for {}, found {}",
                        expected, ty, tlv.tag
                    )));
                }
                self.decode_structure(scope, kind, tlv, depth)
            }
        }
    }

    fn decode_structure(
        &self,
        scope: &Scope<'_>,
        kind: &TypeKind,
        tlv: Tlv<'_>,
        depth: usize,
    ) -> Asn1Result<Value> {
        let constructed = tlv.tag.is_constructed();
        let strict = self.strict();
        match kind {
            TypeKind::Sequence(components) => {
                self.require_constructed(&tlv)?;
                self.decode_sequence(scope, components, tlv.content, depth)
            }
            TypeKind::Set(components) => {
                self.require_constructed(&tlv)?;
                self.decode_set(scope, components, tlv.content, depth)
            }
            TypeKind::SequenceOf(element) | TypeKind::SetOf(element) => {
                self.require_constructed(&tlv)?;
                let element = scope.resolve_type(element)?;
                let mut decoder = self.decoder(tlv.content);
                let mut items = Vec::new();
                while decoder.has_remaining() {
                    items.push(self.decode(scope, element, decoder.decode_tlv()?, false, depth + 1)?);
                }
                Ok(Value::Collection(items))
            }
            TypeKind::OctetString => {
                let octets = self.string_octets(tlv, Tag::OCTET_STRING, depth)?;
                Ok(Value::OctetString(octets))
            }
            TypeKind::String(kind) => {
                let octets = self.string_octets(tlv, Tag::OCTET_STRING, depth)?;
                let text = match kind {
                    StringKind::Bmp => bmp_value(&octets)?,
                    _ => utf8_value(&octets)?,
                };
                Ok(Value::CString(text))
            }
            TypeKind::BitString if constructed => {
                let content = self.bit_string_segments(tlv, depth)?;
                Ok(Value::BitString(bit_string_value(&content, strict)?))
            }
            _ if constructed => Err(Asn1Error::Decoding(format!(
                "{} must use the primitive form",
                tlv.tag
            ))),
            TypeKind::BitString => Ok(Value::BitString(bit_string_value(tlv.content, strict)?)),
            TypeKind::Boolean => Ok(Value::Boolean(boolean_value(tlv.content, strict)?)),
            TypeKind::Integer(_) | TypeKind::Enumerated(_) => {
                Ok(Value::Integer(integer_value(tlv.content, strict)?))
            }
            TypeKind::Real => Ok(Value::Real(real_value(tlv.content, strict)?)),
            TypeKind::Null => {
                null_value(tlv.content)?;
                Ok(Value::Null)
            }
            TypeKind::ObjectIdentifier => Ok(Value::ObjectIdentifier(oid_value(tlv.content)?)),
            TypeKind::Time(kind) => Ok(Value::Time(time_value(*kind, tlv.content, strict)?)),
            _ => Err(Asn1Error::Unsupported(format!(
                "{} cannot be decoded as a structure",
                tlv.tag
            ))),
        }
    }

    fn require_constructed(&self, tlv: &Tlv<'_>) -> Asn1Result<()> {
        if tlv.tag.is_constructed() {
            Ok(())
        } else {
            Err(Asn1Error::Decoding(format!(
                "{} must use the constructed form",
                tlv.tag
            )))
        }
    }

    /// Content of a string value, joining the segments of the constructed form
    fn string_octets(&self, tlv: Tlv<'_>, segment_tag: Tag, depth: usize) -> Asn1Result<Vec<u8>> {
        if !tlv.tag.is_constructed() {
            return Ok(tlv.content.to_vec());
        }
        Ok(self.segments(tlv, segment_tag, depth)?.concat())
    }

    /// Primitive segments of a constructed string, in order
    fn segments<'a>(
        &self,
        tlv: Tlv<'a>,
        segment_tag: Tag,
        depth: usize,
    ) -> Asn1Result<Vec<&'a [u8]>> {
        if self.strict() {
            return Err(Asn1Error::Decoding(format!(
                "DER forbids the constructed form of {}",
                tlv.tag
            )));
        }
        if depth > self.config.max_depth() {
            return Err(Asn1Error::Decoding(format!(
                "string segments nest deeper than {} levels",
                self.config.max_depth()
            )));
        }
        let mut decoder = self.decoder(tlv.content);
        let mut parts = Vec::new();
        while decoder.has_remaining() {
            let segment = decoder.decode_tlv()?;
            if segment.tag.tag() != segment_tag {
                return Err(Asn1Error::Decoding(format!(
                    "segment {} inside a constructed string, expected {}",
                    segment.tag, segment_tag
                )));
            }
            if segment.tag.is_constructed() {
                parts.extend(self.segments(segment, segment_tag, depth + 1)?);
            } else {
                parts.push(segment.content);
            }
        }
        Ok(parts)
    }

    /// Content octets of a constructed BIT STRING joined into primitive form
    fn bit_string_segments(&self, tlv: Tlv<'_>, depth: usize) -> Asn1Result<Vec<u8>> {
        let parts = self.segments(tlv, Tag::BIT_STRING, depth)?;
        let mut unused = 0;
        let mut content = vec![0];
        for (index, part) in parts.iter().enumerate() {
            let Some((&part_unused, bits)) = part.split_first() else {
                return Err(Asn1Error::Decoding("empty BIT STRING segment".to_string()));
            };
            if part_unused != 0 && index + 1 != parts.len() {
                return Err(Asn1Error::Decoding(
                    "only the last BIT STRING segment may have unused bits".to_string(),
                ));
            }
            unused = part_unused;
            content.extend_from_slice(bits);
        }
        content[0] = unused;
        Ok(content)
    }

    fn component_present(
        &self,
        scope: &Scope<'_>,
        component: TypeId,
        next: Option<Tag>,
    ) -> Asn1Result<bool> {
        let Some(next) = next else {
            return Ok(false);
        };
        let tags = possible_tags(scope, component)?;
        Ok(tags.is_empty() || tags.contains(&next))
    }

    fn decode_sequence(
        &self,
        scope: &Scope<'_>,
        components: &[Component],
        content: &[u8],
        depth: usize,
    ) -> Asn1Result<Value> {
        let mut decoder = self.decoder(content);
        let mut values: Vec<NamedValue> = Vec::new();
        for component in components {
            let id = scope.resolve_type(&component.ty)?;
            let next = decoder.peek_tag()?.map(|t| t.tag());
            if !self.component_present(scope, id, next)? {
                if component.presence.is_mandatory() {
                    return Err(Asn1Error::Decoding(format!(
                        "mandatory component {} is missing",
                        component.name
                    )));
                }
                continue;
            }
            let tlv = decoder.decode_tlv()?;
            let value = {
                let inner = scope
                    .child()
                    .with_enclosing(Enclosing::new(components, &values));
                self.decode(&inner, id, tlv, false, depth + 1)?
            };
            log::trace!("Decoded component {}", component.name);
            values.push(NamedValue::new(component.name.clone(), value));
        }
        if let Some(tag) = decoder.peek_tag()? {
            return Err(Asn1Error::Decoding(format!(
                "unexpected {} after the last component",
                tag
            )));
        }
        Ok(Value::NamedCollection(values))
    }

    /// SET components arrive in any order. Open type components are decoded
    /// last so their relation can see the selecting sibling.
    fn decode_set(
        &self,
        scope: &Scope<'_>,
        components: &[Component],
        content: &[u8],
        depth: usize,
    ) -> Asn1Result<Value> {
        let ids = components
            .iter()
            .map(|c| scope.resolve_type(&c.ty))
            .collect::<Asn1Result<Vec<_>>>()?;

        let tlvs = self.decoder(content).decode_all()?;
        if self.strict() {
            if let Some(pair) = tlvs.windows(2).find(|pair| pair[0].tag.tag() >= pair[1].tag.tag()) {
                return Err(Asn1Error::Decoding(format!(
                    "DER requires SET components in tag order, found {} before {}",
                    pair[0].tag, pair[1].tag
                )));
            }
        }

        let mut found: Vec<Option<Tlv<'_>>> = vec![None; components.len()];
        for tlv in tlvs {
            let mut slot = None;
            for (index, id) in ids.iter().enumerate() {
                if found[index].is_none() && self.component_present(scope, *id, Some(tlv.tag.tag()))? {
                    slot = Some(index);
                    break;
                }
            }
            let Some(index) = slot else {
                return Err(Asn1Error::Decoding(format!(
                    "unexpected {} inside SET",
                    tlv.tag
                )));
            };
            found[index] = Some(tlv);
        }

        let mut open = Vec::new();
        for (index, id) in ids.iter().enumerate() {
            if matches!(referenced_class_field(scope, *id)?, Some(ClassField::Type { .. })) {
                open.push(index);
            }
        }
        let order = (0..components.len())
            .filter(|i| !open.contains(i))
            .chain(open.iter().copied());

        let mut decoded: Vec<Option<Value>> = vec![None; components.len()];
        for index in order {
            let Some(tlv) = found[index] else {
                continue;
            };
            let siblings = components
                .iter()
                .zip(&decoded)
                .filter_map(|(c, v)| v.clone().map(|v| NamedValue::new(c.name.clone(), v)))
                .collect::<Vec<_>>();
            let inner = scope
                .child()
                .with_enclosing(Enclosing::new(components, &siblings));
            decoded[index] = Some(self.decode(&inner, ids[index], tlv, false, depth + 1)?);
        }

        let mut values = Vec::new();
        for (component, value) in components.iter().zip(decoded) {
            match value {
                Some(value) => values.push(NamedValue::new(component.name.clone(), value)),
                None if component.presence.is_mandatory() => {
                    return Err(Asn1Error::Decoding(format!(
                        "mandatory component {} is missing",
                        component.name
                    )));
                }
                None => {}
            }
        }
        Ok(Value::NamedCollection(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::BerWriter;
    use asnkit_core::{Ref, TagMethod, TagSpec};
    use asnkit_schema::{factory, Type};

    fn read(module: &Module, name: &str, data: &[u8], config: CodecConfig) -> Asn1Result<Value> {
        BerReader::with_config(module, data, config).read_named(name)
    }

    fn schema() -> Module {
        let mut module = Module::new("Records");
        module.set_tag_method(TagMethod::Automatic).unwrap();
        module
            .define_type(
                "Record",
                Type::sequence(vec![
                    Component::mandatory("id", Ref::named("INTEGER")),
                    Component::optional("note", Ref::named("UTF8String")),
                    Component::with_default("active", Ref::named("BOOLEAN"), Value::Boolean(true)),
                ]),
            )
            .unwrap();
        module
            .define_type(
                "Pick",
                Type::choice(vec![
                    Component::mandatory("n", Ref::named("INTEGER")),
                    Component::mandatory("s", Ref::named("IA5String")),
                ]),
            )
            .unwrap();
        module
            .define_type("Blob", Type::new(TypeKind::OctetString))
            .unwrap();
        module
            .define_type("Bits", Type::new(TypeKind::BitString))
            .unwrap();
        module.validate().unwrap();
        module
    }

    #[test]
    fn test_sequence_with_absent_components() {
        let module = schema();
        // automatic tags: id [0], note [1], active [2]
        let value = read(
            &module,
            "Record",
            &[0x30, 0x06, 0x80, 0x01, 0x07, 0x82, 0x01, 0x00],
            CodecConfig::ber(),
        )
        .unwrap();
        assert_eq!(
            value,
            Value::collection([("id", Value::Integer(7)), ("active", Value::Boolean(false))])
        );
    }

    #[test]
    fn test_missing_and_trailing_components() {
        let module = schema();
        assert!(matches!(
            read(&module, "Record", &[0x30, 0x03, 0x81, 0x01, 0x41], CodecConfig::ber()),
            Err(Asn1Error::Decoding(_))
        ));
        assert!(matches!(
            read(
                &module,
                "Record",
                &[0x30, 0x06, 0x80, 0x01, 0x07, 0x85, 0x01, 0x00],
                CodecConfig::ber()
            ),
            Err(Asn1Error::Decoding(_))
        ));
    }

    #[test]
    fn test_choice_alternative_by_tag() {
        let module = schema();
        assert_eq!(
            read(&module, "Pick", &[0x81, 0x02, 0x6F, 0x6B], CodecConfig::ber()).unwrap(),
            Value::named("s", Value::string("ok"))
        );
        assert!(read(&module, "Pick", &[0x82, 0x00], CodecConfig::ber()).is_err());
    }

    #[test]
    fn test_constructed_strings() {
        let module = schema();
        let octets = [0x24, 0x80, 0x04, 0x01, 0xAA, 0x04, 0x01, 0xBB, 0x00, 0x00];
        assert_eq!(
            read(&module, "Blob", &octets, CodecConfig::ber()).unwrap(),
            Value::OctetString(vec![0xAA, 0xBB])
        );
        assert!(read(&module, "Blob", &octets, CodecConfig::der()).is_err());

        let bits = [0x23, 0x08, 0x03, 0x02, 0x00, 0xFF, 0x03, 0x02, 0x04, 0xF0];
        let Value::BitString(decoded) = read(&module, "Bits", &bits, CodecConfig::ber()).unwrap()
        else {
            panic!("expected a bit string");
        };
        assert_eq!(decoded.num_bits(), 12);
        assert_eq!(decoded.as_bytes(), &[0xFF, 0xF0]);
    }

    #[test]
    fn test_der_rejects_non_canonical_input() {
        let module = schema();
        // long form length for a short value
        assert!(read(
            &module,
            "Blob",
            &[0x04, 0x81, 0x01, 0xAA],
            CodecConfig::der()
        )
        .is_err());
        assert!(read(&module, "Blob", &[0x04, 0x81, 0x01, 0xAA], CodecConfig::ber()).is_ok());
    }

    #[test]
    fn test_stream_of_values() {
        let module = schema();
        let data: &[u8] = &[0x04, 0x01, 0x01, 0x04, 0x00];
        let blob = module.type_id("Blob").unwrap();
        let mut reader = BerReader::new(&module, data);
        assert_eq!(reader.read_next(blob).unwrap(), Some(Value::OctetString(vec![1])));
        assert_eq!(reader.read_next(blob).unwrap(), Some(Value::OctetString(vec![])));
        assert_eq!(reader.read_next(blob).unwrap(), None);
        assert!(matches!(reader.read(blob), Err(Asn1Error::Decoding(_))));
    }

    #[test]
    fn test_truncated_stream() {
        let module = schema();
        let result = read(&module, "Blob", &[0x04, 0x05, 0x01], CodecConfig::ber());
        assert!(matches!(result, Err(Asn1Error::Io { .. })));
    }

    #[test]
    fn test_indefinite_length_policy() {
        let module = schema();
        let data = [0x30, 0x80, 0x80, 0x01, 0x01, 0x00, 0x00];
        let strict = CodecConfig::builder()
            .allow_indefinite_length(false)
            .build()
            .unwrap();
        assert!(read(&module, "Record", &data, CodecConfig::ber()).is_ok());
        assert!(matches!(
            read(&module, "Record", &data, strict),
            Err(Asn1Error::Decoding(_))
        ));
    }

    #[test]
    fn test_decoded_values_are_checked() {
        let mut module = Module::new("Limits");
        module
            .define_type(
                "Small",
                Type::integer().with_constraint(factory::value_range(
                    Some(Value::Integer(0)),
                    true,
                    Some(Value::Integer(10)),
                    true,
                )),
            )
            .unwrap();
        module.validate().unwrap();
        assert!(matches!(
            read(&module, "Small", &[0x02, 0x01, 0x0B], CodecConfig::ber()),
            Err(Asn1Error::ConstraintViolation { .. })
        ));
    }

    #[test]
    fn test_set_in_any_order() {
        let mut module = Module::new("Sets");
        let count = module
            .add_type(Type::integer().with_tag(TagSpec::explicit(Tag::context(0))))
            .unwrap();
        module
            .define_type(
                "Pair",
                Type::set(vec![
                    Component::mandatory("flag", Ref::named("BOOLEAN")),
                    Component::mandatory("count", Ref::to(count)),
                ]),
            )
            .unwrap();
        module.validate().unwrap();
        let expected = Value::collection([
            ("flag", Value::Boolean(true)),
            ("count", Value::Integer(2)),
        ]);
        let data = [0x31, 0x08, 0xA0, 0x03, 0x02, 0x01, 0x02, 0x01, 0x01, 0xFF];
        assert_eq!(read(&module, "Pair", &data, CodecConfig::ber()).unwrap(), expected);
        // DER wants universal before context-specific
        assert!(matches!(
            read(&module, "Pair", &data, CodecConfig::der()),
            Err(Asn1Error::Decoding(_))
        ));
        let canonical = [0x31, 0x08, 0x01, 0x01, 0xFF, 0xA0, 0x03, 0x02, 0x01, 0x02];
        assert_eq!(read(&module, "Pair", &canonical, CodecConfig::der()).unwrap(), expected);
    }

    #[test]
    fn test_written_values_read_back() {
        let module = schema();
        let record = Value::collection([
            ("id", Value::Integer(-300)),
            ("note", Value::string("h\u{e9}llo")),
            ("active", Value::Boolean(true)),
        ]);
        for config in [CodecConfig::ber(), CodecConfig::der()] {
            let mut out = Vec::new();
            BerWriter::with_config(&module, &mut out, config)
                .write_named("Record", &record)
                .unwrap();
            let decoded = read(&module, "Record", &out, config).unwrap();
            // DER leaves out the default, the reader does not fill it in
            if config.is_der() {
                assert_eq!(decoded.component("active"), None);
            } else {
                assert_eq!(decoded, record);
            }
        }
    }
}
