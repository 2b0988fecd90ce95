use thiserror::Error;

use crate::identity::{QName, TypeIdentity};

/// Main error type covering type resolution, tuple construction and document reading
#[derive(Error, Debug)]
pub enum TupleError {
    #[error("Type not found: {identity}")]
    TypeNotFound { identity: TypeIdentity },

    #[error("Definition not found: {identity}")]
    DefinitionNotFound { identity: TypeIdentity },

    #[error("Type accessed before linking completed: {identity}")]
    NotLinked { identity: TypeIdentity },

    #[error("Scheme not found for element {name}")]
    SchemeNotFound { name: QName },

    #[error("Unknown field '{field}' for scheme {scheme}")]
    UnknownField { field: String, scheme: TypeIdentity },

    #[error("Field '{name}' not found in scheme {scheme}")]
    FieldNotFound { name: String, scheme: TypeIdentity },

    #[error("Type mismatch: expected {expected} - {details}")]
    TypeMismatch {
        expected: TypeIdentity,
        details: String,
    },

    #[error("Tuple of scheme {scheme} is frozen and cannot be modified")]
    ImmutableTuple { scheme: TypeIdentity },

    #[error("Field index {index} out of range for scheme {scheme} with {len} fields")]
    IndexOutOfRange {
        index: usize,
        len: usize,
        scheme: TypeIdentity,
    },

    #[error("Duplicate field '{name}' in scheme {scheme}")]
    DuplicateField { name: String, scheme: TypeIdentity },

    #[error("Definition parsing error: {identity} - {details}")]
    DefinitionParsing {
        identity: TypeIdentity,
        details: String,
    },

    #[error("Markup error: {0}")]
    Markup(#[from] roxmltree::Error),

    #[error("Unexpected markup event: {details}")]
    UnexpectedEvent { details: String },

    #[error("Reader failed on an earlier event and must be reset")]
    ReaderFailed,

    #[error("Nesting depth {depth} exceeds the limit of {limit}")]
    DepthExceeded { depth: usize, limit: usize },

    #[error(
        "At element {element} (scheme {}): {source}",
        .scheme.as_ref().map_or("<none>", |s| s.as_str())
    )]
    Document {
        element: QName,
        scheme: Option<TypeIdentity>,
        source: Box<TupleError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status error: {status} for {url} - {message}")]
    HttpStatus {
        url: String,
        status: u16,
        message: String,
    },

    #[error("Request timeout: {url} after {timeout_seconds} seconds")]
    Timeout { url: String, timeout_seconds: u64 },

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Concurrent operation error: {details}")]
    Concurrency { details: String },
}

impl TupleError {
    /// Attach the offending element and enclosing scheme to an error.
    ///
    /// Errors that already carry document context are returned unchanged, so
    /// the innermost element wins.
    pub fn at(self, element: &QName, scheme: Option<&TypeIdentity>) -> Self {
        match self {
            TupleError::Document { .. } => self,
            other => TupleError::Document {
                element: element.clone(),
                scheme: scheme.cloned(),
                source: Box::new(other),
            },
        }
    }

    /// The underlying error with any document context stripped.
    pub fn root_cause(&self) -> &TupleError {
        match self {
            TupleError::Document { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Element name recorded when the error was raised while reading a document
    pub fn element(&self) -> Option<&QName> {
        match self {
            TupleError::Document { element, .. } => Some(element),
            _ => None,
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, TupleError>;
