//! `$select` and `$expand`
//!
//! Both options are bound together into one [`SelectExpandClause`] tree so that a
//! navigation property named in both ends up as a single expansion.

pub mod clause;
pub mod error;
pub mod parser;

pub use clause::{
    path_text, ExpandKind, ExpandOptions, ExpandedItem, Levels, SelectExpandClause, SelectItem,
};
pub use error::SelectExpandError;
pub use parser::SelectExpandParser;

use crate::config::runtime::UriParserSettings;
use crate::expression::ExpressionScope;
use crate::model::{ModelAccessor, NavigationSource, TypeRef};

/// Bind `$select` / `$expand` against a context type with default settings
pub fn parse(
    select: Option<&str>,
    expand: Option<&str>,
    context_type: &TypeRef,
    source: Option<&NavigationSource>,
    model: &dyn ModelAccessor,
) -> Result<SelectExpandClause, SelectExpandError> {
    let settings = UriParserSettings::default();
    let scope = ExpressionScope::new(model, context_type.clone()).with_source(source.cloned());
    SelectExpandParser::new(model, &settings).parse(select, expand, &scope)
}
