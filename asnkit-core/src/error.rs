use thiserror::Error;

/// Main error type for asnkit operations
#[derive(Error, Debug)]
pub enum Asn1Error {
    #[error("I/O error while processing {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unresolved reference: {0}")]
    UnresolvedReference(String),

    #[error("Illegal value: {0}")]
    IllegalValue(String),

    #[error("Constraint violation: {value} does not satisfy {constraint}")]
    ConstraintViolation { constraint: String, value: String },

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Tag collision: {0}")]
    TagCollision(String),

    #[error("Ambiguous match: {0}")]
    AmbiguousMatch(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("ASN.1 encoding error: {0}")]
    Encoding(String),

    #[error("ASN.1 decoding error: {0}")]
    Decoding(String),
}

impl Asn1Error {
    /// Wrap a transport error together with the type being processed
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Asn1Error::Io {
            context: context.into(),
            source,
        }
    }

    /// Build a constraint violation from anything that renders
    pub fn violation(constraint: impl std::fmt::Display, value: impl std::fmt::Display) -> Self {
        Asn1Error::ConstraintViolation {
            constraint: constraint.to_string(),
            value: value.to_string(),
        }
    }
}

/// Result type alias for asnkit operations
pub type Asn1Result<T> = Result<T, Asn1Error>;
