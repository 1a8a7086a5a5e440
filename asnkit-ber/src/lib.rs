//! Basic and Distinguished Encoding Rules for asnkit
//!
//! The crate has two layers. [`encoder`], [`decoder`] and [`types`] handle
//! raw TLVs and the content octets of each primitive type. [`writer`] and
//! [`reader`] drive them from the types of a validated
//! [`Module`](asnkit_schema::Module), applying declared tags and checking
//! every value against its constraints.
//!
//! # Usage Example
//!
//! ```rust
//! use asnkit_ber::{BerReader, BerWriter, CodecConfig};
//! use asnkit_core::{Ref, Value};
//! use asnkit_schema::{Component, Module, Type};
//!
//! let mut module = Module::new("Example");
//! module
//!     .define_type(
//!         "Point",
//!         Type::sequence(vec![
//!             Component::mandatory("x", Ref::named("INTEGER")),
//!             Component::mandatory("y", Ref::named("INTEGER")),
//!         ]),
//!     )
//!     .unwrap();
//! module.validate().unwrap();
//!
//! let point = Value::collection([("x", Value::Integer(1)), ("y", Value::Integer(-1))]);
//! let mut out = Vec::new();
//! BerWriter::with_config(&module, &mut out, CodecConfig::der())
//!     .write_named("Point", &point)
//!     .unwrap();
//! assert_eq!(out, vec![0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0xFF]);
//!
//! let decoded = BerReader::new(&module, out.as_slice()).read_named("Point").unwrap();
//! assert_eq!(decoded, point);
//! ```

pub mod config;
pub mod decoder;
pub mod encoder;
pub mod reader;
pub mod types;
pub mod writer;

pub use config::{CodecConfig, CodecConfigBuilder, EncodingRules};
pub use decoder::{BerDecoder, Tlv};
pub use encoder::BerEncoder;
pub use reader::BerReader;
pub use types::{BerLength, BerTag};
pub use writer::BerWriter;
