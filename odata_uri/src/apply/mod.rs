//! `$apply` data aggregation
//!
//! The pipeline is bound transformation by transformation. The resulting
//! [`OutputShape`] decides what later query options may reference and what the
//! context URL projects.

pub mod clause;
pub mod error;
pub mod parser;

pub use clause::{
    AggregateKind, AggregateMethod, AggregateStatement, ApplyClause, GroupingProperty,
    OutputShape, Transformation,
};
pub use error::ApplyError;
pub use parser::ApplyParser;

use crate::expression::ExpressionScope;
use crate::model::{ModelAccessor, NavigationSource, TypeRef};

/// Bind an `$apply` value against a context type
pub fn parse(
    text: &str,
    context_type: &TypeRef,
    source: Option<&NavigationSource>,
    model: &dyn ModelAccessor,
) -> Result<ApplyClause, ApplyError> {
    let scope = ExpressionScope::new(model, context_type.element()).with_source(source.cloned());
    ApplyParser::new(model).parse(text, &scope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::sample_model;

    #[test]
    fn test_parse_entry_point() {
        let model = sample_model();
        let source = model.find_navigation_source("Orders");
        let clause = parse(
            "groupby((Customer/Name), aggregate(Amount with sum as Total))",
            &TypeRef::entity("NS.Order").into_collection(),
            source.as_ref(),
            &model,
        )
        .unwrap();
        assert_eq!(clause.shape.projection(), vec!["Customer(Name)", "Total"]);
    }
}
