use netval_core::ValueError;
use std::path::PathBuf;
use thiserror::Error;

/// Why a script value could not become a host value.
///
/// Nested variants name the field, key or element that failed so the
/// message points at the offending part of a composite value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("expected {expected}, got '{literal}'")]
    InvalidLiteral { expected: String, literal: String },

    #[error("{value} is out of range for {target}")]
    OutOfRange { target: &'static str, value: String },

    #[error("missing required field '{field}' for record {record}")]
    MissingField { record: String, field: String },

    #[error("field '{field}': {source}")]
    Field {
        field: String,
        #[source]
        source: Box<ConversionError>,
    },

    #[error("key '{key}': {source}")]
    Key {
        key: String,
        #[source]
        source: Box<ConversionError>,
    },

    #[error("element {index}: {source}")]
    Element {
        index: usize,
        #[source]
        source: Box<ConversionError>,
    },

    #[error(transparent)]
    Host(#[from] ValueError),

    #[error("script engine error: {0}")]
    Engine(String),
}

impl ConversionError {
    pub(crate) fn mismatch(expected: impl Into<String>, actual: &str) -> Self {
        ConversionError::TypeMismatch {
            expected: expected.into(),
            actual: actual.to_string(),
        }
    }

    pub(crate) fn invalid(expected: impl Into<String>, literal: &str) -> Self {
        ConversionError::InvalidLiteral {
            expected: expected.into(),
            literal: literal.to_string(),
        }
    }

    pub(crate) fn in_field(self, field: &str) -> Self {
        ConversionError::Field {
            field: field.to_string(),
            source: Box::new(self),
        }
    }

    pub(crate) fn in_key(self, key: &str) -> Self {
        ConversionError::Key {
            key: key.to_string(),
            source: Box::new(self),
        }
    }

    pub(crate) fn in_element(self, index: usize) -> Self {
        ConversionError::Element {
            index,
            source: Box::new(self),
        }
    }
}

impl From<rquickjs::Error> for ConversionError {
    fn from(err: rquickjs::Error) -> Self {
        ConversionError::Engine(err.to_string())
    }
}

/// Errors surfaced by [`crate::ScriptRuntime`].
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("script engine error: {0}")]
    Engine(#[from] rquickjs::Error),

    #[error("uncaught exception: {0}")]
    Exception(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    Settings(#[source] serde_json::Error),

    #[error("script result is not valid JSON: {0}")]
    ResultJson(#[source] serde_json::Error),

    #[error(transparent)]
    Conversion(#[from] ConversionError),
}
