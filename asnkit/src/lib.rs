//! asnkit - ASN.1 schema model, constraint engine and BER/DER codec
//!
//! # Architecture
//!
//! This library is organized as a workspace with multiple crates:
//!
//! - `asnkit-core`: errors, tags, values and references
//! - `asnkit-schema`: modules, scopes, types, parameterized types and the
//!   constraint engine
//! - `asnkit-ber`: BER and DER encoding rules
//!
//! A module is assembled through the builder methods of
//! [`schema::Module`], validated once, and then shared by any number of
//! writers and readers.
//!
//! # Usage
//!
//! ```rust
//! use asnkit::ber::CodecConfig;
//! use asnkit::schema::{Module, Type};
//! use asnkit::Value;
//!
//! let mut module = Module::new("Example");
//! module.define_type("Flag", Type::boolean()).unwrap();
//! module.validate().unwrap();
//!
//! let bytes = asnkit::encode(&module, "Flag", &Value::Boolean(true), CodecConfig::der()).unwrap();
//! assert_eq!(bytes, vec![0x01, 0x01, 0xFF]);
//! assert_eq!(
//!     asnkit::decode(&module, "Flag", &bytes, CodecConfig::der()).unwrap(),
//!     Value::Boolean(true)
//! );
//! ```

pub use asnkit_core::{
    Asn1Error, Asn1Result, BitString, NamedValue, ObjectIdentifier, RealValue, Ref, Tag,
    TagClass, TagMethod, TagSpec, TimeKind, TimeValue, Value,
};

// Re-export the schema model
pub mod schema {
    pub use asnkit_schema::*;
}

// Re-export the encoding rules
pub mod ber {
    pub use asnkit_ber::*;
}

use asnkit_ber::{BerReader, BerWriter, CodecConfig};
use asnkit_schema::Module;

/// Encode one value of the named type into a fresh buffer
pub fn encode(module: &Module, type_name: &str, value: &Value, config: CodecConfig) -> Asn1Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut writer = BerWriter::with_config(module, &mut out, config);
    writer.write_named(type_name, value)?;
    writer.finish()?;
    Ok(out)
}

/// Decode exactly one value of the named type from `data`
pub fn decode(module: &Module, type_name: &str, data: &[u8], config: CodecConfig) -> Asn1Result<Value> {
    let mut reader = BerReader::with_config(module, data, config);
    let value = reader.read_named(type_name)?;
    let rest = reader.into_inner();
    if !rest.is_empty() {
        log::debug!("{} octets left after {}", rest.len(), type_name);
        return Err(Asn1Error::Decoding(format!(
            "{} trailing octets after a value of {}",
            rest.len(),
            type_name
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        factory, ClassField, Component, ObjectClass, TemplateArgument, TemplateParameter, Type,
        TypeKind,
    };
    use anyhow::Result;
    use asnkit_core::ObjectValue;

    fn record_module() -> Result<Module> {
        let mut module = Module::new("Records");
        module.define_type(
            "Record",
            Type::sequence(vec![
                Component::mandatory("id", Ref::named("INTEGER")),
                Component::mandatory("data", Ref::named("Data")),
            ]),
        )?;
        module.define_type(
            "Data",
            Type::sequence(vec![
                Component::mandatory("a", Ref::named("REAL")),
                Component::mandatory("b", Ref::named("INTEGER")),
            ]),
        )?;
        module.validate()?;
        Ok(module)
    }

    #[test]
    fn test_nested_sequence_round_trip() -> Result<()> {
        let module = record_module()?;
        let value = Value::collection([
            ("id", Value::Integer(1)),
            (
                "data",
                Value::collection([("a", Value::real(0.0)), ("b", Value::Integer(1))]),
            ),
        ]);
        let bytes = encode(&module, "Record", &value, CodecConfig::ber())?;
        assert_eq!(
            bytes,
            vec![0x30, 0x0A, 0x02, 0x01, 0x01, 0x30, 0x05, 0x09, 0x00, 0x02, 0x01, 0x01]
        );
        assert_eq!(decode(&module, "Record", &bytes, CodecConfig::ber())?, value);
        Ok(())
    }

    #[test]
    fn test_alternate_literals_normalize() -> Result<()> {
        let module = record_module()?;
        // REAL given as an INTEGER literal and as a decimal string
        let written = Value::collection([
            ("id", Value::Integer(2)),
            (
                "data",
                Value::collection([("a", Value::string("0.5")), ("b", Value::Integer(0))]),
            ),
        ]);
        let bytes = encode(&module, "Record", &written, CodecConfig::der())?;
        let decoded = decode(&module, "Record", &bytes, CodecConfig::der())?;
        let Some(Value::Real(a)) = decoded.component("data").and_then(|d| d.component("a")) else {
            anyhow::bail!("component a is not a REAL: {}", decoded);
        };
        assert_eq!(a.value(), 0.5);
        Ok(())
    }

    #[test]
    fn test_trailing_octets_rejected() -> Result<()> {
        let mut module = Module::new("Flags");
        module.define_type("Flag", Type::boolean())?;
        module.validate()?;
        let result = decode(&module, "Flag", &[0x01, 0x01, 0x00, 0x05], CodecConfig::ber());
        assert!(matches!(result, Err(Asn1Error::Decoding(_))));
        Ok(())
    }

    #[test]
    fn test_tagged_choice_and_time() -> Result<()> {
        let mut module = Module::new("Events");
        module.define_type(
            "When",
            Type::choice(vec![
                Component::mandatory("utc", Ref::named("UTCTime")),
                Component::mandatory("general", Ref::named("GeneralizedTime")),
            ]),
        )?;
        module.define_type(
            "Event",
            Type::defined(Ref::named("When")).with_tag(TagSpec::implicit(Tag::context(4))),
        )?;
        module.validate()?;

        let value = Value::named(
            "general",
            Value::Time(TimeValue::from_ymd_hms(2051, 6, 1, 12, 0, 0)?),
        );
        let bytes = encode(&module, "Event", &value, CodecConfig::der())?;
        // tags on CHOICE stay explicit even when declared IMPLICIT
        let mut expected = vec![0xA4, 0x11, 0x18, 0x0F];
        expected.extend_from_slice(b"20510601120000Z");
        assert_eq!(bytes, expected);
        assert_eq!(decode(&module, "Event", &bytes, CodecConfig::der())?, value);
        Ok(())
    }

    #[test]
    fn test_parameterized_instance_round_trip() -> Result<()> {
        let mut module = Module::new("Templates");
        let list = module.add_type(
            Type::sequence_of(Ref::named("Element")).with_constraint(factory::size(
                factory::value_range(Some(Value::Integer(1)), true, Some(Value::reference("n")), true),
            )),
        )?;
        module.define_parameterized_type(
            "Bounded",
            vec![
                TemplateParameter::of_type(0, "Element"),
                TemplateParameter::of_value(1, "n", Some(Ref::named("INTEGER"))),
            ],
            list,
        )?;
        module.define_type(
            "Names",
            Type::instance(
                "Bounded",
                vec![
                    TemplateArgument::Type(Ref::named("IA5String")),
                    TemplateArgument::Value(Value::Integer(2)),
                ],
            ),
        )?;
        module.validate()?;

        let names = Value::Collection(vec![Value::string("a"), Value::string("bc")]);
        let bytes = encode(&module, "Names", &names, CodecConfig::ber())?;
        assert_eq!(bytes, vec![0x30, 0x07, 0x16, 0x01, 0x61, 0x16, 0x02, 0x62, 0x63]);
        assert_eq!(decode(&module, "Names", &bytes, CodecConfig::ber())?, names);

        let too_many = Value::Collection(vec![Value::string("a"); 3]);
        assert!(matches!(
            encode(&module, "Names", &too_many, CodecConfig::ber()),
            Err(Asn1Error::ConstraintViolation { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_open_type_follows_relation() -> Result<()> {
        let mut module = Module::new("Attributes");
        module.define_type(
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
        )?;
        module.define_value(
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
        )?;
        let id = module.add_type(
            Type::class_field(Ref::named("ATTRIBUTE"), "&id")
                .with_constraint(factory::table_constraint(Value::reference("Attrs"), &[])),
        )?;
        let body = module.add_type(
            Type::class_field(Ref::named("ATTRIBUTE"), "&Type")
                .with_constraint(factory::table_constraint(Value::reference("Attrs"), &["@type"])),
        )?;
        module.define_type(
            "Attribute",
            Type::sequence(vec![
                Component::mandatory("type", Ref::to(id)),
                Component::mandatory("value", Ref::to(body)),
            ]),
        )?;
        module.validate()?;

        let value = Value::collection([
            ("type", Value::string("2.5.4.2")),
            ("value", Value::string("ok")),
        ]);
        let bytes = encode(&module, "Attribute", &value, CodecConfig::der())?;
        assert_eq!(
            bytes,
            vec![0x30, 0x09, 0x06, 0x03, 0x55, 0x04, 0x02, 0x0C, 0x02, 0x6F, 0x6B]
        );
        let decoded = decode(&module, "Attribute", &bytes, CodecConfig::der())?;
        assert_eq!(decoded.component("value"), Some(&Value::string("ok")));

        // INTEGER content where the relation selects UTF8String
        let wrong = [0x30, 0x08, 0x06, 0x03, 0x55, 0x04, 0x02, 0x02, 0x01, 0x07];
        assert!(decode(&module, "Attribute", &wrong, CodecConfig::der()).is_err());
        Ok(())
    }
}
