//! Umbrella error for URI parsing
//!
//! Each module keeps its own error enum. `ODataError` wraps them so callers of
//! [`crate::ODataUriParser`] handle one type and match on [`ODataError::message_key`].

use crate::apply::ApplyError;
use crate::compute::ComputeError;
use crate::context_url::ContextUrlError;
use crate::expression::ExpressionError;
use crate::literals::LiteralError;
use crate::logging::Code;
use crate::model::ModelError;
use crate::path::PathError;
use crate::query_options::QueryOptionError;
use crate::select_expand::SelectExpandError;
use crate::tokens::{LexerError, TokenStreamError};
use crate::validation::ConstraintError;

#[derive(Debug, thiserror::Error)]
pub enum ODataError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    QueryOption(#[from] QueryOptionError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Lexer(#[from] LexerError),

    #[error(transparent)]
    Token(#[from] TokenStreamError),

    #[error(transparent)]
    Literal(#[from] LiteralError),

    #[error(transparent)]
    Expression(#[from] ExpressionError),

    #[error(transparent)]
    Compute(#[from] ComputeError),

    #[error(transparent)]
    SelectExpand(#[from] SelectExpandError),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error(transparent)]
    ContextUrl(#[from] ContextUrlError),

    #[error(transparent)]
    Constraint(#[from] ConstraintError),
}

impl ODataError {
    pub fn error_code(&self) -> Code {
        match self {
            ODataError::Model(e) => e.error_code(),
            ODataError::QueryOption(e) => e.error_code(),
            ODataError::Path(e) => e.error_code(),
            ODataError::Lexer(e) => e.error_code(),
            ODataError::Token(e) => e.error_code(),
            ODataError::Literal(e) => e.error_code(),
            ODataError::Expression(e) => e.error_code(),
            ODataError::Compute(e) => e.error_code(),
            ODataError::SelectExpand(e) => e.error_code(),
            ODataError::Apply(e) => e.error_code(),
            ODataError::ContextUrl(e) => e.error_code(),
            ODataError::Constraint(e) => e.error_code(),
        }
    }

    /// Machine-stable key such as `RequestUriProcessor_CannotQueryCollections`
    pub fn message_key(&self) -> &'static str {
        self.error_code().as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_key_passes_through() {
        let err: ODataError = ContextUrlError::SourceOrTypeMissing {
            kind: "ResourceSet".to_string(),
        }
        .into();
        assert_eq!(
            err.message_key(),
            "ODataContextUriBuilder_NavigationSourceOrTypeNameMissingForResourceOrResourceSet"
        );

        let err: ODataError = QueryOptionError::UnknownSystemOption {
            name: "$foo".to_string(),
        }
        .into();
        assert_eq!(err.message_key(), "ODataUriParser_UnknownSystemQueryOption");
        assert_eq!(err.to_string(), "'$foo' is not a supported system query option");
    }
}
