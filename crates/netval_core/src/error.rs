use thiserror::Error;

/// Errors raised by the host value system when a value is built or mutated
/// in a way its type does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("expected a {expected} value, got {actual}")]
    WrongKind { expected: &'static str, actual: String },

    #[error("value of type {actual} does not match declared type {expected}")]
    TypeMismatch { expected: String, actual: String },

    #[error("record {record} has no field at offset {offset}")]
    BadOffset { record: String, offset: usize },

    #[error("record {record} has no field '{field}'")]
    UnknownField { record: String, field: String },

    #[error("field '{field}' of record {record} expects {expected}, got {actual}")]
    FieldType {
        record: String,
        field: String,
        expected: String,
        actual: String,
    },

    #[error("field '{field}' of record {record} is not optional")]
    RequiredField { record: String, field: String },

    #[error("type {0} cannot be used as a table key")]
    InvalidKeyType(String),

    #[error("enum {name} has no variant '{variant}'")]
    UnknownVariant { name: String, variant: String },

    #[error("sets take no yield value and tables require one")]
    YieldMismatch,
}
