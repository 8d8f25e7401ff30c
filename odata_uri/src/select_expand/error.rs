use crate::compute::ComputeError;
use crate::logging::codes;
use crate::path::PathError;
use crate::tokens::{LexerError, TokenStreamError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SelectExpandError {
    #[error("Term '{term}' is not valid in a $select or $expand expression")]
    TermNotValid { term: String },

    #[error("Property '{property}' is not a navigation property or complex property")]
    NotNavigationOrComplex { property: String },

    #[error("Expand path '{path}' traverses more than one navigation property")]
    MultipleNavigations { path: String },

    #[error("Select path '{path}' continues past a navigation property")]
    NavigationNotLast { path: String },

    #[error("$expand nesting exceeds maximum depth {max}")]
    ExpandDepthExceeded { max: usize },

    #[error("$expand contains more than {max} items")]
    ExpandCountExceeded { max: usize },

    #[error("$select contains more than {max} items")]
    SelectCountExceeded { max: usize },

    #[error("Unknown nested query option '{name}'")]
    UnknownOption { name: String },

    #[error("Nested query option '{name}' specified more than once")]
    DuplicateOption { name: String },

    #[error("Query option '{name}' is not allowed in {context}")]
    OptionNotAllowed { name: String, context: String },

    #[error("Invalid $levels value '{value}'")]
    InvalidLevels { value: String },

    #[error("Invalid nested $top value '{value}'")]
    InvalidTop { value: String },

    #[error("Invalid nested $skip value '{value}'")]
    InvalidSkip { value: String },

    #[error("Invalid nested $count value '{value}'")]
    InvalidCount { value: String },

    #[error("$select and $expand require a structured type, found '{type_name}'")]
    ContextNotStructured { type_name: String },

    #[error("Selected property '{property}' is not part of the $apply output")]
    OutsideApplyShape { property: String },

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Compute(#[from] ComputeError),

    #[error(transparent)]
    Token(#[from] TokenStreamError),

    #[error(transparent)]
    Lexer(#[from] LexerError),
}

impl SelectExpandError {
    pub fn error_code(&self) -> crate::logging::Code {
        match self {
            SelectExpandError::TermNotValid { .. } => codes::select_expand::TERM_NOT_VALID,
            SelectExpandError::NotNavigationOrComplex { .. } => {
                codes::select_expand::NOT_NAVIGATION_OR_COMPLEX
            }
            SelectExpandError::MultipleNavigations { .. } => codes::select_expand::MULTIPLE_NAVIGATIONS,
            SelectExpandError::NavigationNotLast { .. } => codes::select_expand::NAVIGATION_NOT_LAST,
            SelectExpandError::ExpandDepthExceeded { .. } => codes::select_expand::EXPAND_DEPTH_EXCEEDED,
            SelectExpandError::ExpandCountExceeded { .. } => codes::select_expand::EXPAND_COUNT_EXCEEDED,
            SelectExpandError::SelectCountExceeded { .. } => codes::select_expand::SELECT_COUNT_EXCEEDED,
            SelectExpandError::UnknownOption { .. } => codes::select_expand::UNKNOWN_OPTION,
            SelectExpandError::DuplicateOption { .. } => codes::select_expand::DUPLICATE_OPTION,
            SelectExpandError::OptionNotAllowed { .. } => codes::select_expand::OPTION_NOT_ALLOWED,
            SelectExpandError::InvalidLevels { .. } => codes::select_expand::INVALID_LEVELS,
            SelectExpandError::InvalidTop { .. } => codes::select_expand::INVALID_TOP,
            SelectExpandError::InvalidSkip { .. } => codes::select_expand::INVALID_SKIP,
            SelectExpandError::InvalidCount { .. } => codes::select_expand::INVALID_COUNT,
            SelectExpandError::ContextNotStructured { .. } => codes::select_expand::CONTEXT_NOT_STRUCTURED,
            SelectExpandError::OutsideApplyShape { .. } => codes::select_expand::OUTSIDE_APPLY_SHAPE,
            SelectExpandError::Path(e) => e.error_code(),
            SelectExpandError::Compute(e) => e.error_code(),
            SelectExpandError::Token(e) => e.error_code(),
            SelectExpandError::Lexer(e) => e.error_code(),
        }
    }
}
