//! Codec configuration
//!
//! # Usage Example
//!
//! ```rust
//! use asnkit_ber::config::{CodecConfig, EncodingRules};
//!
//! let config = CodecConfig::builder()
//!     .rules(EncodingRules::Der)
//!     .max_depth(32)
//!     .build()
//!     .unwrap();
//! assert!(!config.allow_indefinite_length());
//! ```

use asnkit_core::{Asn1Error, Asn1Result};
use serde::{Deserialize, Serialize};

/// Default nesting limit for reading and writing
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Encoding rules applied by the reader and the writer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EncodingRules {
    /// Basic Encoding Rules (X.690 clause 8)
    #[default]
    Ber,
    /// Distinguished Encoding Rules (X.690 clause 10/11)
    Der,
}

impl EncodingRules {
    pub fn is_der(self) -> bool {
        self == EncodingRules::Der
    }
}

/// Settings shared by [`BerWriter`](crate::writer::BerWriter) and
/// [`BerReader`](crate::reader::BerReader)
///
/// The configuration is plain data so applications can keep it in their own
/// configuration files; it derives `Serialize`/`Deserialize` for that purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    rules: EncodingRules,
    /// Writer emits constructed values with indefinite length
    indefinite_length: bool,
    /// Reader accepts indefinite lengths
    allow_indefinite_length: bool,
    max_depth: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            rules: EncodingRules::Ber,
            indefinite_length: false,
            allow_indefinite_length: true,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl CodecConfig {
    pub fn builder() -> CodecConfigBuilder {
        CodecConfigBuilder::new()
    }

    /// Plain BER with the default settings
    pub fn ber() -> Self {
        Self::default()
    }

    /// DER: definite lengths only, canonical forms enforced on reading
    pub fn der() -> Self {
        Self {
            rules: EncodingRules::Der,
            indefinite_length: false,
            allow_indefinite_length: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn rules(&self) -> EncodingRules {
        self.rules
    }

    pub fn is_der(&self) -> bool {
        self.rules.is_der()
    }

    /// Whether the writer uses indefinite lengths; never under DER
    pub fn indefinite_length(&self) -> bool {
        self.indefinite_length && !self.is_der()
    }

    /// Whether the reader accepts indefinite lengths; never under DER
    pub fn allow_indefinite_length(&self) -> bool {
        self.allow_indefinite_length && !self.is_der()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

/// Builder for [`CodecConfig`]
///
/// # Default Settings
/// - Rules: BER
/// - Indefinite length on writing: off
/// - Indefinite length on reading: accepted (BER only)
/// - Maximum nesting depth: [`DEFAULT_MAX_DEPTH`]
#[derive(Debug, Clone, Default)]
pub struct CodecConfigBuilder {
    config: CodecConfig,
}

impl CodecConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select BER or DER
    ///
    /// Choosing DER also turns off indefinite lengths in both directions.
    pub fn rules(mut self, rules: EncodingRules) -> Self {
        self.config.rules = rules;
        if rules.is_der() {
            self.config.indefinite_length = false;
            self.config.allow_indefinite_length = false;
        }
        self
    }

    pub fn indefinite_length(mut self, enabled: bool) -> Self {
        self.config.indefinite_length = enabled;
        self
    }

    pub fn allow_indefinite_length(mut self, allowed: bool) -> Self {
        self.config.allow_indefinite_length = allowed;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    /// Validate and build the configuration
    ///
    /// # Error Handling
    /// Returns error if:
    /// - Indefinite lengths are requested together with DER
    /// - The nesting depth is zero
    pub fn build(self) -> Asn1Result<CodecConfig> {
        let config = self.config;
        if config.is_der() && (config.indefinite_length || config.allow_indefinite_length) {
            return Err(Asn1Error::Validation(
                "DER does not allow indefinite lengths".to_string(),
            ));
        }
        if config.max_depth == 0 {
            return Err(Asn1Error::Validation(
                "Maximum nesting depth must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }
}
