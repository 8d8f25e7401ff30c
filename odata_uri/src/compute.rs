//! `$compute` clause parser
//!
//! `expr as Alias, expr as Alias, ...`. Each alias becomes a dynamic property of
//! the context type with the static type of its expression. Aliases may not
//! repeat and may not shadow a declared member.

use crate::expression::{parse_expression, ExpressionError, ExpressionScope, TypedExpression};
use crate::logging::codes;
use crate::model::TypeRef;
use crate::tokens::{self, LexerError, Token, TokenStream, TokenStreamError};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ComputeError {
    #[error("Alias '{alias}' is defined more than once")]
    DuplicateAlias { alias: String },

    #[error("Alias '{alias}' conflicts with a member of '{type_name}'")]
    AliasConflicts { alias: String, type_name: String },

    #[error(transparent)]
    Expression(#[from] ExpressionError),

    #[error(transparent)]
    Token(#[from] TokenStreamError),

    #[error(transparent)]
    Lexer(#[from] LexerError),
}

impl ComputeError {
    pub fn error_code(&self) -> crate::logging::Code {
        match self {
            ComputeError::DuplicateAlias { .. } => codes::compute::DUPLICATE_ALIAS,
            ComputeError::AliasConflicts { .. } => codes::compute::ALIAS_CONFLICTS,
            ComputeError::Expression(e) => e.error_code(),
            ComputeError::Token(e) => e.error_code(),
            ComputeError::Lexer(e) => e.error_code(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputeItem {
    pub expression: TypedExpression,
    pub alias: String,
    pub type_ref: TypeRef,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComputeClause {
    pub items: Vec<ComputeItem>,
}

impl ComputeClause {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.alias.as_str())
    }

    pub fn alias_type(&self, alias: &str) -> Option<&TypeRef> {
        self.items
            .iter()
            .find(|item| item.alias == alias)
            .map(|item| &item.type_ref)
    }

    /// Make the computed aliases visible to later clauses
    pub fn register(&self, scope: &mut ExpressionScope<'_>) {
        for item in &self.items {
            scope.add_dynamic(&item.alias, item.type_ref.clone());
        }
    }
}

/// Parse a complete `$compute` value
pub fn parse_compute(text: &str, scope: &ExpressionScope<'_>) -> Result<ComputeClause, ComputeError> {
    let result = tokens::tokenize(text)
        .map_err(ComputeError::from)
        .and_then(|mut stream| {
            let clause = parse_compute_items(&mut stream, scope)?;
            stream.expect_end()?;
            Ok(clause)
        });

    match &result {
        Ok(clause) => {
            crate::log_success!(codes::success::COMPUTE_BINDING_COMPLETE, "$compute bound",
                "aliases" => clause.items.len()
            );
        }
        Err(e) => {
            crate::log_error!(e.error_code(), "$compute binding failed",
                "error" => e,
                "text" => text
            );
        }
    }
    result
}

/// Parse `expr as Alias` items separated by commas, stopping before anything else.
/// Used directly by the `compute(...)` transformation of `$apply`.
pub(crate) fn parse_compute_items(
    stream: &mut TokenStream,
    scope: &ExpressionScope<'_>,
) -> Result<ComputeClause, ComputeError> {
    let mut clause = ComputeClause::default();
    loop {
        let expression = parse_expression(stream, scope)?;
        stream.expect_keyword("as")?;
        let alias = stream.expect_identifier()?.value;

        if clause.alias_type(&alias).is_some() || scope.dynamic_type(&alias).is_some() {
            return Err(ComputeError::DuplicateAlias { alias });
        }
        if let Some(owner) = scope.context().structured_name() {
            if scope.model().find_member(owner, &alias).is_some() {
                return Err(ComputeError::AliasConflicts {
                    alias,
                    type_name: owner.to_string(),
                });
            }
        }

        let type_ref = expression.type_ref.clone().unwrap_or_else(TypeRef::untyped);
        clause.items.push(ComputeItem {
            expression,
            alias,
            type_ref,
        });

        if !stream.consume_if(&Token::Comma) {
            break;
        }
    }
    Ok(clause)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::sample_model;
    use crate::model::PrimitiveKind;
    use assert_matches::assert_matches;

    #[test]
    fn test_aliases_are_typed() {
        let model = sample_model();
        let scope = ExpressionScope::new(&model, TypeRef::entity("NS.Order"));
        let clause = parse_compute("Price mul Quantity as Total, Amount add 1 as Next", &scope).unwrap();
        assert_eq!(clause.aliases().collect::<Vec<_>>(), vec!["Total", "Next"]);
        assert_eq!(
            clause.alias_type("Total").and_then(TypeRef::primitive_kind),
            Some(PrimitiveKind::Double)
        );
        assert_eq!(
            clause.alias_type("Next").and_then(TypeRef::primitive_kind),
            Some(PrimitiveKind::Decimal)
        );
    }

    #[test]
    fn test_alias_rules() {
        let model = sample_model();
        let scope = ExpressionScope::new(&model, TypeRef::entity("NS.Order"));
        let err = parse_compute("Price as X, Quantity as X", &scope).unwrap_err();
        assert_matches!(err, ComputeError::DuplicateAlias { .. });
        assert_eq!(err.error_code(), codes::compute::DUPLICATE_ALIAS);

        let err = parse_compute("Price mul 2 as Amount", &scope).unwrap_err();
        assert_matches!(err, ComputeError::AliasConflicts { .. });

        assert_matches!(
            parse_compute("Price mul 2", &scope),
            Err(ComputeError::Token(_))
        );
    }

    #[test]
    fn test_register_exposes_aliases() {
        let model = sample_model();
        let mut scope = ExpressionScope::new(&model, TypeRef::entity("NS.Order"));
        let clause = parse_compute("Quantity mul 2 as Double", &scope).unwrap();
        clause.register(&mut scope);
        assert!(scope.dynamic_type("Double").is_some());
        assert_matches!(
            parse_compute("Quantity as Double", &scope),
            Err(ComputeError::DuplicateAlias { .. })
        );
    }
}
