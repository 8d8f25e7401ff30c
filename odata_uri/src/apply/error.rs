use crate::compute::ComputeError;
use crate::expression::ExpressionError;
use crate::logging::codes;
use crate::path::PathError;
use crate::tokens::{LexerError, TokenStreamError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApplyError {
    #[error("Unrecognized transformation '{name}'")]
    UnrecognizedTransformation { name: String },

    #[error("'with' expected, found '{found}'")]
    WithExpected { found: String },

    #[error("'as' expected, found '{found}'")]
    AsExpected { found: String },

    #[error("Unrecognized aggregation method '{method}'")]
    UnrecognizedMethod { method: String },

    #[error("Aggregation method '{method}' cannot be applied to '{type_name}'")]
    IncompatibleMethod { method: String, type_name: String },

    #[error("Alias '{alias}' is defined more than once")]
    DuplicateAlias { alias: String },

    #[error("groupby accepts property paths only, found '{expression}'")]
    GroupByNotProperty { expression: String },

    #[error("expand transformation requires a navigation property, found '{property}'")]
    ExpandNotNavigation { property: String },

    #[error("$apply contains more than {max} transformations")]
    TooManyTransformations { max: usize },

    #[error("$apply contains more than {max} aggregate statements")]
    TooManyAggregates { max: usize },

    #[error(transparent)]
    Expression(#[from] ExpressionError),

    #[error(transparent)]
    Compute(#[from] ComputeError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Token(#[from] TokenStreamError),

    #[error(transparent)]
    Lexer(#[from] LexerError),
}

impl ApplyError {
    pub fn error_code(&self) -> crate::logging::Code {
        match self {
            ApplyError::UnrecognizedTransformation { .. } => codes::apply::UNRECOGNIZED_TRANSFORMATION,
            ApplyError::WithExpected { .. } => codes::apply::WITH_EXPECTED,
            ApplyError::AsExpected { .. } => codes::apply::AS_EXPECTED,
            ApplyError::UnrecognizedMethod { .. } => codes::apply::UNRECOGNIZED_METHOD,
            ApplyError::IncompatibleMethod { .. } => codes::apply::INCOMPATIBLE_METHOD,
            ApplyError::DuplicateAlias { .. } => codes::apply::DUPLICATE_ALIAS,
            ApplyError::GroupByNotProperty { .. } => codes::apply::GROUPBY_NOT_PROPERTY,
            ApplyError::ExpandNotNavigation { .. } => codes::apply::EXPAND_NOT_NAVIGATION,
            ApplyError::TooManyTransformations { .. } => codes::apply::TOO_MANY_TRANSFORMATIONS,
            ApplyError::TooManyAggregates { .. } => codes::apply::TOO_MANY_AGGREGATES,
            ApplyError::Expression(e) => e.error_code(),
            ApplyError::Compute(e) => e.error_code(),
            ApplyError::Path(e) => e.error_code(),
            ApplyError::Token(e) => e.error_code(),
            ApplyError::Lexer(e) => e.error_code(),
        }
    }
}
