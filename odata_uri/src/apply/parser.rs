//! `$apply` pipeline parser
//!
//! Transformations are separated by `/` (a `,` is accepted as well). Each one is
//! bound against the scope left by the previous one: `aggregate` and `groupby`
//! replace the visible properties with their output, `compute` adds aliases, and
//! `filter` and `expand` leave the shape alone.

use super::clause::{
    AggregateKind, AggregateMethod, AggregateStatement, ApplyClause, GroupingProperty,
    OutputShape, Transformation,
};
use super::error::ApplyError;
use crate::compute::parse_compute_items;
use crate::config::compile_time::apply::{
    MAX_AGGREGATE_STATEMENTS, MAX_NESTING_DEPTH, MAX_TRANSFORMATIONS,
};
use crate::expression::{parse_expression, ExpressionError, ExpressionScope, TypedExpression};
use crate::logging::codes;
use crate::model::{ModelAccessor, PrimitiveKind, TypeRef};
use crate::path::resolver::{step_member, Cursor, StepMode};
use crate::path::{PathSegment, SegmentKind};
use crate::tokens::{self, Token, TokenStream};

pub struct ApplyParser<'a> {
    model: &'a dyn ModelAccessor,
    transformation_count: usize,
    aggregate_count: usize,
}

impl<'a> ApplyParser<'a> {
    pub fn new(model: &'a dyn ModelAccessor) -> Self {
        Self {
            model,
            transformation_count: 0,
            aggregate_count: 0,
        }
    }

    /// Parse a complete `$apply` value against `scope`
    pub fn parse(mut self, text: &str, scope: &ExpressionScope<'_>) -> Result<ApplyClause, ApplyError> {
        let result = tokens::tokenize(text)
            .map_err(ApplyError::from)
            .and_then(|mut stream| {
                let mut scope = scope.clone();
                let clause = self.parse_pipeline(&mut stream, &mut scope)?;
                stream.expect_end()?;
                Ok(clause)
            });

        match &result {
            Ok(clause) => {
                crate::log_success!(codes::success::APPLY_BINDING_COMPLETE, "$apply bound",
                    "transformations" => clause.transformations.len(),
                    "output" => clause.shape.names().join(",")
                );
            }
            Err(e) => {
                crate::log_error!(e.error_code(), "$apply binding failed",
                    "error" => e,
                    "text" => text
                );
            }
        }
        result
    }

    fn parse_pipeline(
        &mut self,
        stream: &mut TokenStream,
        scope: &mut ExpressionScope<'_>,
    ) -> Result<ApplyClause, ApplyError> {
        let mut clause = ApplyClause::default();
        loop {
            let transformation = self.parse_transformation(stream, scope, &mut clause.shape, 0)?;
            clause.transformations.push(transformation);
            if !(stream.consume_if(&Token::Slash) || stream.consume_if(&Token::Comma)) {
                break;
            }
        }
        Ok(clause)
    }

    fn parse_transformation(
        &mut self,
        stream: &mut TokenStream,
        scope: &mut ExpressionScope<'_>,
        shape: &mut OutputShape,
        depth: usize,
    ) -> Result<Transformation, ApplyError> {
        self.transformation_count += 1;
        if self.transformation_count > MAX_TRANSFORMATIONS {
            return Err(ApplyError::TooManyTransformations {
                max: MAX_TRANSFORMATIONS,
            });
        }

        let name = match stream.current_token() {
            Token::Identifier(name) => name.clone(),
            _ => return Err(stream.unexpected("a transformation").into()),
        };
        if !matches!(name.as_str(), "aggregate" | "groupby" | "filter" | "compute" | "expand") {
            return Err(ApplyError::UnrecognizedTransformation { name });
        }
        stream.advance();

        match name.as_str() {
            "aggregate" => {
                stream.expect(&Token::OpenParen)?;
                let statements = self.parse_aggregate_statements(stream, scope)?;
                stream.expect(&Token::CloseParen)?;
                replace_output(scope, shape, Vec::new(), &statements);
                Ok(Transformation::Aggregate { statements })
            }
            "groupby" => self.parse_groupby(stream, scope, shape),
            "filter" => {
                let text = stream.skip_group()?;
                Ok(Transformation::Filter {
                    text: text.trim().to_string(),
                })
            }
            "compute" => {
                stream.expect(&Token::OpenParen)?;
                let clause = parse_compute_items(stream, scope)?;
                stream.expect(&Token::CloseParen)?;
                clause.register(scope);
                for item in &clause.items {
                    shape.add_alias(&item.alias, item.type_ref.clone());
                }
                Ok(Transformation::Compute { clause })
            }
            _ => self.parse_expand(stream, scope, depth),
        }
    }

    // === aggregate ===

    fn parse_aggregate_statements(
        &mut self,
        stream: &mut TokenStream,
        scope: &ExpressionScope<'_>,
    ) -> Result<Vec<AggregateStatement>, ApplyError> {
        let mut statements: Vec<AggregateStatement> = Vec::new();
        loop {
            self.aggregate_count += 1;
            if self.aggregate_count > MAX_AGGREGATE_STATEMENTS {
                return Err(ApplyError::TooManyAggregates {
                    max: MAX_AGGREGATE_STATEMENTS,
                });
            }

            let statement = if stream.current_token().is_system_token("$count") {
                stream.advance();
                AggregateStatement {
                    kind: AggregateKind::Count,
                    alias: parse_alias(stream)?,
                    type_ref: TypeRef::primitive(PrimitiveKind::Int64),
                }
            } else {
                self.parse_method_statement(stream, scope)?
            };

            if statements.iter().any(|s| s.alias == statement.alias) {
                return Err(ApplyError::DuplicateAlias {
                    alias: statement.alias,
                });
            }
            statements.push(statement);

            if !stream.consume_if(&Token::Comma) {
                return Ok(statements);
            }
        }
    }

    fn parse_method_statement(
        &mut self,
        stream: &mut TokenStream,
        scope: &ExpressionScope<'_>,
    ) -> Result<AggregateStatement, ApplyError> {
        let expression = parse_expression(stream, scope)?;
        if !stream.consume_keyword("with") {
            return Err(ApplyError::WithExpected {
                found: stream.current_token().to_string(),
            });
        }
        let method_name = stream.expect_identifier()?.value;
        let method = AggregateMethod::from_name(&method_name).ok_or(ApplyError::UnrecognizedMethod {
            method: method_name,
        })?;
        let type_ref = aggregate_type(&method, &expression)?;

        let mut from = Vec::new();
        while stream.consume_keyword("from") {
            let names = read_names(stream)?;
            let (segments, _) = scope.resolve_path(&names)?;
            from.push(segments);
        }

        Ok(AggregateStatement {
            kind: AggregateKind::Method {
                expression,
                method,
                from,
            },
            alias: parse_alias(stream)?,
            type_ref,
        })
    }

    // === groupby ===

    fn parse_groupby(
        &mut self,
        stream: &mut TokenStream,
        scope: &mut ExpressionScope<'_>,
        shape: &mut OutputShape,
    ) -> Result<Transformation, ApplyError> {
        stream.expect(&Token::OpenParen)?;
        stream.expect(&Token::OpenParen)?;
        let mut properties = Vec::new();
        loop {
            properties.push(self.parse_grouping_property(stream, scope)?);
            if !stream.consume_if(&Token::Comma) {
                break;
            }
        }
        stream.expect(&Token::CloseParen)?;

        let mut aggregate = None;
        if stream.consume_if(&Token::Comma) {
            match stream.current_token() {
                Token::Identifier(name) if name == "aggregate" => {
                    stream.advance();
                }
                other => {
                    return Err(ApplyError::UnrecognizedTransformation {
                        name: other.to_string(),
                    })
                }
            }
            stream.expect(&Token::OpenParen)?;
            aggregate = Some(self.parse_aggregate_statements(stream, scope)?);
            stream.expect(&Token::CloseParen)?;
        }
        stream.expect(&Token::CloseParen)?;

        replace_output(
            scope,
            shape,
            properties.clone(),
            aggregate.as_deref().unwrap_or_default(),
        );
        Ok(Transformation::GroupBy {
            properties,
            aggregate,
        })
    }

    fn parse_grouping_property(
        &self,
        stream: &mut TokenStream,
        scope: &ExpressionScope<'_>,
    ) -> Result<GroupingProperty, ApplyError> {
        if !matches!(stream.current_token(), Token::Identifier(_)) {
            return Err(ApplyError::GroupByNotProperty {
                expression: stream.current_token().to_string(),
            });
        }
        let names = read_names(stream)?;
        if stream.check(&Token::OpenParen) {
            return Err(ApplyError::GroupByNotProperty {
                expression: names.join("/"),
            });
        }

        let (mut segments, type_ref) = scope.resolve_path(&names)?;
        if type_ref.is_entity() {
            return Err(ApplyError::GroupByNotProperty {
                expression: names.join("/"),
            });
        }
        if segments.is_empty() {
            // grouping by an alias of an earlier transformation
            segments.push(PathSegment::new(SegmentKind::DynamicProperty, &names[0]).with_type(type_ref.clone()));
        }
        Ok(GroupingProperty { segments, type_ref })
    }

    // === expand ===

    fn parse_expand(
        &mut self,
        stream: &mut TokenStream,
        scope: &ExpressionScope<'_>,
        depth: usize,
    ) -> Result<Transformation, ApplyError> {
        if depth + 1 > MAX_NESTING_DEPTH {
            return Err(ExpressionError::TooDeep {
                max: MAX_NESTING_DEPTH,
            }
            .into());
        }
        stream.expect(&Token::OpenParen)?;
        let names = read_names(stream)?;
        if !scope.is_visible(&names[0]) {
            return Err(ExpressionError::PropertyNotInShape {
                property: names[0].clone(),
            }
            .into());
        }

        let mut cursor = Cursor::at(scope.context().clone(), scope.source().cloned());
        let mut segments = Vec::with_capacity(names.len());
        for name in &names {
            let (segment, next) = step_member(self.model, &cursor, name, StepMode::Clause)?;
            segments.push(segment);
            cursor = next;
        }
        let ends_in_navigation = segments
            .iter()
            .rev()
            .find(|s: &&PathSegment| !s.is_type_cast())
            .is_some_and(PathSegment::is_navigation);
        if !ends_in_navigation {
            return Err(ApplyError::ExpandNotNavigation {
                property: names.join("/"),
            });
        }

        let mut nested_scope = ExpressionScope::new(self.model, cursor.type_ref.element())
            .with_source(cursor.source.clone());
        let mut nested = ApplyClause::default();
        while stream.consume_if(&Token::Comma) {
            let allowed = matches!(
                stream.current_token(),
                Token::Identifier(name) if name == "filter" || name == "expand"
            );
            if !allowed {
                return Err(ApplyError::UnrecognizedTransformation {
                    name: stream.current_token().to_string(),
                });
            }
            let transformation =
                self.parse_transformation(stream, &mut nested_scope, &mut nested.shape, depth + 1)?;
            nested.transformations.push(transformation);
        }
        stream.expect(&Token::CloseParen)?;

        Ok(Transformation::Expand {
            segments,
            navigation_source: cursor.source,
            nested: (!nested.is_empty()).then(|| Box::new(nested)),
        })
    }
}

/// After `aggregate` or `groupby` only the grouping roots and the new aliases are visible
fn replace_output(
    scope: &mut ExpressionScope<'_>,
    shape: &mut OutputShape,
    grouped: Vec<GroupingProperty>,
    statements: &[AggregateStatement],
) {
    let aliases: Vec<(String, TypeRef)> = statements
        .iter()
        .map(|s| (s.alias.clone(), s.type_ref.clone()))
        .collect();
    shape.aggregate(grouped, aliases);

    scope.clear_dynamic();
    scope.restrict_to(
        shape
            .grouped()
            .iter()
            .map(|g| g.root_name().to_string())
            .collect(),
    );
    for (alias, type_ref) in shape.aliases() {
        scope.add_dynamic(alias, type_ref.clone());
    }
}

fn parse_alias(stream: &mut TokenStream) -> Result<String, ApplyError> {
    if !stream.consume_keyword("as") {
        return Err(ApplyError::AsExpected {
            found: stream.current_token().to_string(),
        });
    }
    Ok(stream.expect_identifier()?.value)
}

fn read_names(stream: &mut TokenStream) -> Result<Vec<String>, ApplyError> {
    let mut names = vec![stream.expect_identifier()?.value];
    while stream.consume_if(&Token::Slash) {
        names.push(stream.expect_identifier()?.value);
    }
    Ok(names)
}

/// Result type of an aggregation method applied to `expression`
fn aggregate_type(method: &AggregateMethod, expression: &TypedExpression) -> Result<TypeRef, ApplyError> {
    use PrimitiveKind as P;

    let incompatible = || ApplyError::IncompatibleMethod {
        method: method.name().to_string(),
        type_name: expression
            .type_ref
            .as_ref()
            .map(TypeRef::full_name)
            .unwrap_or_else(|| "null".to_string()),
    };

    match method {
        AggregateMethod::CountDistinct => return Ok(TypeRef::primitive(P::Int64)),
        AggregateMethod::Custom(_) => return Ok(TypeRef::untyped()),
        _ => {}
    }
    if expression.is_open() {
        return Ok(TypeRef::untyped());
    }
    let Some(type_ref) = expression.type_ref.as_ref().filter(|t| !t.is_collection) else {
        return Err(incompatible());
    };

    let kind = type_ref.primitive_kind();
    let result = match (method, kind) {
        (AggregateMethod::Sum, Some(k)) if k.is_integral() => P::Int64,
        (AggregateMethod::Sum, Some(k)) if k.is_floating() => P::Double,
        (AggregateMethod::Average, Some(k)) if k.is_integral() || k.is_floating() => P::Double,
        (AggregateMethod::Sum | AggregateMethod::Average, Some(P::Decimal)) => P::Decimal,
        (AggregateMethod::Min | AggregateMethod::Max, _) if type_ref.is_scalar() => {
            return Ok(type_ref.clone())
        }
        _ => return Err(incompatible()),
    };
    Ok(TypeRef::primitive(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::sample_model;
    use crate::model::EdmModel;
    use assert_matches::assert_matches;

    fn city_scope(model: &EdmModel) -> ExpressionScope<'_> {
        ExpressionScope::new(model, TypeRef::entity("NS.City"))
            .with_source(model.find_navigation_source("Cities"))
    }

    fn apply(model: &EdmModel, text: &str) -> Result<ApplyClause, ApplyError> {
        ApplyParser::new(model).parse(text, &city_scope(model))
    }

    fn alias_kind(clause: &ApplyClause, alias: &str) -> Option<PrimitiveKind> {
        clause.shape.alias_type(alias).and_then(TypeRef::primitive_kind)
    }

    #[test]
    fn test_groupby_with_aggregate() {
        let model = sample_model();
        let clause = apply(&model, "groupby((Name), aggregate(Id with sum as TotalId))").unwrap();
        assert_eq!(clause.shape.projection(), vec!["Name", "TotalId"]);
        assert_eq!(alias_kind(&clause, "TotalId"), Some(PrimitiveKind::Int64));
        assert_matches!(
            &clause.transformations[0],
            Transformation::GroupBy { aggregate: Some(statements), .. } if statements.len() == 1
        );
    }

    #[test]
    fn test_aggregate_method_types() {
        let model = sample_model();
        let clause = apply(
            &model,
            "aggregate(Budget with sum as Total, Population with average as Avg, \
             Area with max as Largest, Name with countdistinct as Names, $count as Cities, \
             Budget with NS.median as Median)",
        )
        .unwrap();
        assert_eq!(alias_kind(&clause, "Total"), Some(PrimitiveKind::Decimal));
        assert_eq!(alias_kind(&clause, "Avg"), Some(PrimitiveKind::Double));
        assert_eq!(alias_kind(&clause, "Largest"), Some(PrimitiveKind::Double));
        assert_eq!(alias_kind(&clause, "Names"), Some(PrimitiveKind::Int64));
        assert_eq!(alias_kind(&clause, "Cities"), Some(PrimitiveKind::Int64));
        assert_eq!(alias_kind(&clause, "Median"), Some(PrimitiveKind::Untyped));
        assert!(clause.shape.grouped().is_empty());
        assert!(clause.shape.is_restricted());
    }

    #[test]
    fn test_aggregate_errors() {
        let model = sample_model();
        assert_matches!(
            apply(&model, "aggregate(Name with sum as X)"),
            Err(ApplyError::IncompatibleMethod { .. })
        );
        assert_matches!(
            apply(&model, "aggregate(Budget with median as X)"),
            Err(ApplyError::UnrecognizedMethod { .. })
        );
        assert_matches!(
            apply(&model, "aggregate(Budget sum as X)"),
            Err(ApplyError::WithExpected { .. })
        );
        assert_matches!(
            apply(&model, "aggregate(Budget with sum X)"),
            Err(ApplyError::AsExpected { .. })
        );
        let err = apply(&model, "aggregate(Budget with sum as X, Area with sum as X)").unwrap_err();
        assert_eq!(err.error_code(), codes::apply::DUPLICATE_ALIAS);
    }

    #[test]
    fn test_groupby_paths() {
        let model = sample_model();
        let scope = ExpressionScope::new(&model, TypeRef::entity("NS.Person"))
            .with_source(model.find_navigation_source("People"));
        let clause = ApplyParser::new(&model)
            .parse("groupby((Address/City/Name, Age))", &scope)
            .unwrap();
        assert_eq!(clause.shape.projection(), vec!["Address(City(Name))", "Age"]);
        assert_eq!(clause.shape.names(), vec!["Address", "Age"]);

        assert_matches!(
            apply(&model, "groupby((length(Name)))"),
            Err(ApplyError::GroupByNotProperty { .. })
        );
        assert_matches!(
            apply(&model, "groupby((Districts))"),
            Err(ApplyError::GroupByNotProperty { .. })
        );
        assert_matches!(
            apply(&model, "groupby((Name), filter(true))"),
            Err(ApplyError::UnrecognizedTransformation { .. })
        );
    }

    #[test]
    fn test_pipeline_threads_the_shape() {
        let model = sample_model();
        let clause = apply(
            &model,
            "filter(Population gt 1000)/groupby((Name), aggregate(Budget with sum as Total))/compute(Total mul 2 as Twice)",
        )
        .unwrap();
        let names: Vec<&str> = clause.transformations.iter().map(Transformation::name).collect();
        assert_eq!(names, vec!["filter", "groupby", "compute"]);
        assert_eq!(clause.shape.projection(), vec!["Name", "Total", "Twice"]);
        assert_eq!(alias_kind(&clause, "Twice"), Some(PrimitiveKind::Decimal));

        let err = apply(&model, "groupby((Name))/aggregate(Area with sum as A)").unwrap_err();
        assert_matches!(err, ApplyError::Expression(ExpressionError::PropertyNotInShape { .. }));
        assert_eq!(err.error_code(), codes::apply::PROPERTY_NOT_IN_SHAPE);
    }

    #[test]
    fn test_filter_and_compute_keep_declared_properties() {
        let model = sample_model();
        let clause = apply(&model, "filter(Name eq 'x'),compute(Area mul 2 as DoubleArea)").unwrap();
        assert!(!clause.shape.is_restricted());
        assert_eq!(clause.shape.projection(), vec!["DoubleArea"]);
        assert_matches!(&clause.transformations[0], Transformation::Filter { text } if text == "Name eq 'x'");
    }

    #[test]
    fn test_expand_transformation() {
        let model = sample_model();
        let clause = apply(&model, "expand(Districts, filter(Zip eq '1'), expand(City))").unwrap();
        let Transformation::Expand {
            segments,
            navigation_source,
            nested: Some(nested),
        } = &clause.transformations[0]
        else {
            panic!("expected expand with nested transformations");
        };
        assert_eq!(segments[0].identifier, "Districts");
        assert_eq!(navigation_source.as_ref().map(|s| s.name()), Some("Districts"));
        assert_eq!(nested.transformations.len(), 2);

        assert_matches!(apply(&model, "expand(Name)"), Err(ApplyError::ExpandNotNavigation { .. }));
        assert_matches!(
            apply(&model, "expand(Districts, aggregate($count as C))"),
            Err(ApplyError::UnrecognizedTransformation { .. })
        );
    }

    #[test]
    fn test_unknown_transformation() {
        let model = sample_model();
        let err = apply(&model, "topcount(2, Population)").unwrap_err();
        assert_matches!(err, ApplyError::UnrecognizedTransformation { ref name } if name == "topcount");
    }

    #[test]
    fn test_register_restricts_scope() {
        let model = sample_model();
        let clause = apply(&model, "groupby((Name), aggregate($count as Count))").unwrap();
        let mut scope = city_scope(&model);
        clause.register(&mut scope);
        assert!(scope.is_visible("Name"));
        assert!(scope.is_visible("Count"));
        assert!(!scope.is_visible("Area"));
    }
}
