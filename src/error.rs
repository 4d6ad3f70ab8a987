use std::path::PathBuf;

use thiserror::Error;

use crate::source::SourceLocation;

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the application
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("parse error {}: {message}", file.display())]
    ParseError { file: PathBuf, message: String },

    /// An annotation or field directive whose value cannot be interpreted.
    #[error("{location}: malformed annotation: {message}")]
    MalformedAnnotation {
        location: SourceLocation,
        message: String,
    },

    #[error("cannot find type definition `{type_name}` from scope `{scope}`")]
    UnresolvedType { type_name: String, scope: String },

    /// Raised for function-typed values; the owning struct skips the field.
    #[error("type `{0}` has no schema representation")]
    UnsupportedFieldKind(String),

    #[error("{location}: operation `{operation}`: {message}")]
    RouteMismatch {
        operation: String,
        location: SourceLocation,
        message: String,
    },

    #[error("{location}: route {method} {path} is already declared")]
    DuplicateRoute {
        method: String,
        path: String,
        location: SourceLocation,
    },

    #[error("duplicated @ID annotation '{id}' found in '{current}', previously declared in: '{previous}'")]
    DuplicateOperationId {
        id: String,
        current: String,
        previous: String,
    },

    #[error("no markdown file for `{tag}` in {}", dir.display())]
    MissingMarkdown { tag: String, dir: PathBuf },

    /// Failure while building one operation, with the operation as context.
    #[error("{location}: operation `{operation}`: {source}")]
    InOperation {
        operation: String,
        location: SourceLocation,
        #[source]
        source: Box<Error>,
    },

    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl Error {
    /// Attaches the operation being built to an error raised underneath it.
    pub fn in_operation(self, operation: &str, location: &SourceLocation) -> Self {
        match self {
            Error::InOperation { .. } | Error::MalformedAnnotation { .. } => self,
            other => Error::InOperation {
                operation: operation.to_string(),
                location: location.clone(),
                source: Box::new(other),
            },
        }
    }

    /// True when the root cause is a type lookup failure.
    pub fn is_unresolved_type(&self) -> bool {
        match self {
            Error::UnresolvedType { .. } => true,
            Error::InOperation { source, .. } => source.is_unresolved_type(),
            _ => false,
        }
    }

    pub fn malformed(location: &SourceLocation, message: impl Into<String>) -> Self {
        Error::MalformedAnnotation {
            location: location.clone(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(format!("JSON serialization error: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::SerializationError(format!("YAML serialization error: {}", err))
    }
}

impl From<syn::Error> for Error {
    fn from(err: syn::Error) -> Self {
        Error::ParseError {
            file: PathBuf::from("<unknown>"),
            message: err.to_string(),
        }
    }
}
