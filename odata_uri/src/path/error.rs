use crate::literals::LiteralError;
use crate::logging::codes;
use crate::tokens::{LexerError, TokenStreamError};
use crate::validation::ConstraintError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PathError {
    #[error("Empty segment at position {position} of the request path")]
    EmptySegment { position: usize },

    #[error("Request URI '{request_uri}' is not under service root '{service_root}'")]
    IncorrectBaseUri {
        request_uri: String,
        service_root: String,
    },

    #[error("Too many path segments: {count} (max {max})")]
    TooManySegments { count: usize, max: usize },

    #[error("Segment '{segment}' is not valid percent-encoded UTF-8")]
    InvalidEncoding { segment: String },

    #[error("Resource '{identifier}' not found in the entity container")]
    ResourceNotFound { identifier: String },

    #[error("Property '{property}' is not declared on type '{type_name}'")]
    PropertyNotFound { property: String, type_name: String },

    #[error("Segment '{segment}' cannot follow collection '{collection}'; use a key or $count")]
    CannotQueryCollections { segment: String, collection: String },

    #[error("Type '{type_name}' is not related to the current type '{current_type}'")]
    InvalidTypeCast {
        type_name: String,
        current_type: String,
    },

    #[error("Segment '{segment}' cannot follow '{previous}'")]
    MustBeLeaf { segment: String, previous: String },

    #[error("$count cannot follow '{previous}', which is not a collection")]
    CountNotApplicable { previous: String },

    #[error("$ref cannot follow '{previous}'")]
    RefNotApplicable { previous: String },

    #[error("$value cannot follow '{previous}'")]
    ValueNotApplicable { previous: String },

    #[error("Key predicate cannot be applied to '{segment}'")]
    KeyNotApplicable { segment: String },

    #[error("Type '{type_name}' has {expected} key properties but {actual} values were given")]
    KeyCountMismatch {
        type_name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Key '{key}' does not match the key of type '{type_name}'")]
    KeyMismatch { type_name: String, key: String },

    #[error("Syntax error in segment '{segment}': {message}")]
    Syntax { segment: String, message: String },

    #[error("Parameter '{parameter}' is not declared by operation '{operation}'")]
    ParameterNotDeclared {
        operation: String,
        parameter: String,
    },

    #[error(transparent)]
    Literal(#[from] LiteralError),

    #[error(transparent)]
    Lexer(#[from] LexerError),

    #[error(transparent)]
    Token(#[from] TokenStreamError),

    #[error(transparent)]
    Constraint(#[from] ConstraintError),
}

impl PathError {
    pub fn error_code(&self) -> crate::logging::Code {
        match self {
            PathError::EmptySegment { .. } => codes::path::EMPTY_SEGMENT,
            PathError::IncorrectBaseUri { .. } => codes::path::INCORRECT_BASE_URI,
            PathError::TooManySegments { .. } => codes::path::TOO_MANY_SEGMENTS,
            PathError::InvalidEncoding { .. } => codes::path::INVALID_ENCODING,
            PathError::ResourceNotFound { .. } | PathError::PropertyNotFound { .. } => {
                codes::path::RESOURCE_NOT_FOUND
            }
            PathError::CannotQueryCollections { .. } => codes::path::CANNOT_QUERY_COLLECTIONS,
            PathError::InvalidTypeCast { .. } => codes::path::TYPE_MUST_BE_RELATED,
            PathError::MustBeLeaf { .. } => codes::path::MUST_BE_LEAF,
            PathError::CountNotApplicable { .. } => codes::path::COUNT_NOT_APPLICABLE,
            PathError::RefNotApplicable { .. } => codes::path::REF_NOT_APPLICABLE,
            PathError::ValueNotApplicable { .. } => codes::path::VALUE_NOT_APPLICABLE,
            PathError::KeyNotApplicable { .. } => codes::path::KEY_NOT_APPLICABLE,
            PathError::KeyCountMismatch { .. } => codes::path::KEY_COUNT_MISMATCH,
            PathError::KeyMismatch { .. } => codes::path::KEY_MISMATCH,
            PathError::Syntax { .. } => codes::path::SYNTAX_ERROR,
            PathError::ParameterNotDeclared { .. } => codes::path::PARAMETER_NOT_DECLARED,
            PathError::Literal(e) => e.error_code(),
            PathError::Lexer(e) => e.error_code(),
            PathError::Token(e) => e.error_code(),
            PathError::Constraint(e) => e.error_code(),
        }
    }

    pub(crate) fn syntax(segment: &str, message: &str) -> Self {
        PathError::Syntax {
            segment: segment.to_string(),
            message: message.to_string(),
        }
    }
}
