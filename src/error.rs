//! Error types for document validation and schema loading.

use std::path::PathBuf;
use thiserror::Error;

/// A document that does not match the type schema.
///
/// Every variant carries `path`, a JSON Pointer (RFC 6901) into the input
/// document. Resources reached through a relationship report the pointer of
/// the node inside `data` or `included`, not the pointer of the reference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{path}: document must be an object, got {actual}")]
    NotADocument { path: String, actual: String },

    #[error("{path}: document has no primary data")]
    MissingPrimaryData { path: String },

    #[error("{path}: expected {expected} as primary data, got {actual}")]
    TopShape {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("{path}: primary data has type \"{actual}\", expected {expected}")]
    TopType {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("{path}: malformed resource: {message}")]
    MalformedResource { path: String, message: String },

    #[error("{path}: unknown resource type \"{type_name}\"")]
    UnknownType { path: String, type_name: String },

    #[error("{path}: type \"{type_name}\" has no field \"{field}\"")]
    UnknownField {
        path: String,
        type_name: String,
        field: String,
    },

    #[error("{path}: missing attribute \"{field}\"")]
    MissingAttribute { path: String, field: String },

    #[error("{path}: missing relationship \"{field}\"")]
    MissingRelationship { path: String, field: String },

    #[error("{path}: attribute \"{field}\" rejected: {message}")]
    ScalarRejected {
        path: String,
        field: String,
        message: String,
    },

    #[error("{path}: relationship \"{field}\" {message}")]
    RelationshipShape {
        path: String,
        field: String,
        message: String,
    },

    #[error("{path}: relationship \"{field}\" cannot point to \"{actual}\", expected {expected}")]
    TargetTypeMismatch {
        path: String,
        field: String,
        expected: String,
        actual: String,
    },

    #[error("{path}: referenced resource {type_name}:{id} is not in the document")]
    DanglingReference {
        path: String,
        type_name: String,
        id: String,
    },

    #[error("{path}: relationship \"{field}\" must be included but has no data")]
    IncludeWithoutData { path: String, field: String },

    #[error("{path}: cannot include \"{field}\" on type \"{type_name}\": {message}")]
    InvalidInclude {
        path: String,
        type_name: String,
        field: String,
        message: String,
    },

    #[error("{path}: type \"{type_name}\" declares no relationship \"{field}\"")]
    UndeclaredRelationship {
        path: String,
        type_name: String,
        field: String,
    },

    #[error("{path}: relationships nest deeper than {limit} levels")]
    DepthExceeded { path: String, limit: usize },
}

impl ValidationError {
    /// JSON Pointer to the offending location in the input document.
    pub fn path(&self) -> &str {
        match self {
            Self::NotADocument { path, .. }
            | Self::MissingPrimaryData { path }
            | Self::TopShape { path, .. }
            | Self::TopType { path, .. }
            | Self::MalformedResource { path, .. }
            | Self::UnknownType { path, .. }
            | Self::UnknownField { path, .. }
            | Self::MissingAttribute { path, .. }
            | Self::MissingRelationship { path, .. }
            | Self::ScalarRejected { path, .. }
            | Self::RelationshipShape { path, .. }
            | Self::TargetTypeMismatch { path, .. }
            | Self::DanglingReference { path, .. }
            | Self::IncludeWithoutData { path, .. }
            | Self::InvalidInclude { path, .. }
            | Self::UndeclaredRelationship { path, .. }
            | Self::DepthExceeded { path, .. } => path,
        }
    }
}

/// Errors while reading documents, schema definitions, or CLI arguments.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid schema definition with {} error(s)", errors.len())]
    InvalidDefinition { errors: Vec<DefinitionError> },

    #[error("invalid argument \"{value}\": {message}")]
    InvalidArgument { value: String, message: String },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            _ => 2,
        }
    }
}

/// Single schema-definition problem with path context.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DefinitionError {
    /// JSON Pointer (RFC 6901) into the definition file.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for DefinitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}
