//! Recursive-descent parser for `$select` and `$expand`
//!
//! Item paths are read from the token stream and resolved segment by segment
//! with the same member step the path resolver uses. Nested options inside an
//! item's parentheses are split on `;` and parsed against the item's own type,
//! so every level of the tree is bound exactly like the top level.

use super::clause::{
    path_text, ExpandKind, ExpandOptions, ExpandedItem, Levels, SelectExpandClause, SelectItem,
};
use super::error::SelectExpandError;
use crate::compute::parse_compute;
use crate::config::compile_time::select_expand::MAX_SELECT_ITEMS;
use crate::config::runtime::UriParserSettings;
use crate::expression::ExpressionScope;
use crate::logging::codes;
use crate::model::ModelAccessor;
use crate::path::resolver::{split_top_level, step_member, Cursor, StepMode};
use crate::path::{PathError, PathSegment, SegmentKind};
use crate::tokens::{self, Token, TokenStream};

const NESTED_OPTIONS: &[&str] = &[
    "$select", "$expand", "$filter", "$orderby", "$top", "$skip", "$count", "$search", "$levels",
    "$compute",
];

const REFERENCE_OPTIONS: &[&str] = &["$filter", "$orderby", "$top", "$skip", "$count", "$search"];

const COUNT_OPTIONS: &[&str] = &["$filter", "$search"];

/// Binds `$select` / `$expand` text against a context type.
/// One parser instance binds one request; item counters span the whole tree.
pub struct SelectExpandParser<'a> {
    model: &'a dyn ModelAccessor,
    settings: &'a UriParserSettings,
    expand_count: usize,
    select_count: usize,
}

impl<'a> SelectExpandParser<'a> {
    pub fn new(model: &'a dyn ModelAccessor, settings: &'a UriParserSettings) -> Self {
        Self {
            model,
            settings,
            expand_count: 0,
            select_count: 0,
        }
    }

    /// Bind both options against `scope`. Blank options count as absent.
    pub fn parse(
        mut self,
        select: Option<&str>,
        expand: Option<&str>,
        scope: &ExpressionScope<'_>,
    ) -> Result<SelectExpandClause, SelectExpandError> {
        let result = self.parse_clause(select, expand, scope, 0);
        match &result {
            Ok(clause) => {
                crate::log_success!(codes::success::SELECT_EXPAND_BINDING_COMPLETE,
                    "$select/$expand bound",
                    "selected" => clause.selected().len(),
                    "expanded" => self.expand_count
                );
            }
            Err(e) => {
                crate::log_error!(e.error_code(), "$select/$expand binding failed",
                    "error" => e,
                    "type" => scope.context()
                );
            }
        }
        result
    }

    fn parse_clause(
        &mut self,
        select: Option<&str>,
        expand: Option<&str>,
        scope: &ExpressionScope<'_>,
        depth: usize,
    ) -> Result<SelectExpandClause, SelectExpandError> {
        let select = select.filter(|s| !s.trim().is_empty());
        let expand = expand.filter(|s| !s.trim().is_empty());
        if select.is_none() && expand.is_none() {
            return Ok(SelectExpandClause::default());
        }
        if !scope.context().is_structured() {
            return Err(SelectExpandError::ContextNotStructured {
                type_name: scope.context().full_name(),
            });
        }

        let mut clause = SelectExpandClause::new(select.is_none());

        if let Some(text) = expand {
            let mut stream = tokens::tokenize(text)?;
            loop {
                for item in self.parse_expand_item(&mut stream, scope, depth)? {
                    clause.add_expanded(item);
                }
                if !stream.consume_if(&Token::Comma) {
                    break;
                }
            }
            stream.expect_end()?;
        }

        if let Some(text) = select {
            let mut stream = tokens::tokenize(text)?;
            loop {
                let item = self.parse_select_item(&mut stream, scope, depth)?;
                clause.add_selected(item);
                if !stream.consume_if(&Token::Comma) {
                    break;
                }
            }
            stream.expect_end()?;
        }

        clause.absorb_selected_expansions();
        Ok(clause)
    }

    // === $select ===

    fn parse_select_item(
        &mut self,
        stream: &mut TokenStream,
        scope: &ExpressionScope<'_>,
        depth: usize,
    ) -> Result<SelectItem, SelectExpandError> {
        self.select_count += 1;
        if self.select_count > MAX_SELECT_ITEMS {
            return Err(SelectExpandError::SelectCountExceeded {
                max: MAX_SELECT_ITEMS,
            });
        }

        match stream.current_token().clone() {
            Token::Star => {
                stream.advance();
                return Ok(SelectItem::Wildcard);
            }
            Token::NamespaceWildcard(namespace) => {
                stream.advance();
                return Ok(SelectItem::AllOperationsInNamespace { namespace });
            }
            _ => {}
        }

        let names = read_path(stream)?;
        let options = if stream.check(&Token::OpenParen) {
            Some(stream.skip_group()?)
        } else {
            None
        };

        let segments = self.resolve_select_path(&names, scope)?;
        let nested = match options {
            Some(text) => Some(Box::new(self.parse_select_options(&text, &segments, depth)?)),
            None => None,
        };
        Ok(SelectItem::Path { segments, nested })
    }

    fn resolve_select_path(
        &self,
        names: &[String],
        scope: &ExpressionScope<'_>,
    ) -> Result<Vec<PathSegment>, SelectExpandError> {
        let first = &names[0];
        if !scope.is_visible(first) {
            return Err(SelectExpandError::OutsideApplyShape {
                property: first.clone(),
            });
        }
        if let Some(alias_type) = scope.dynamic_type(first) {
            if names.len() > 1 {
                return Err(SelectExpandError::TermNotValid {
                    term: names.join("/"),
                });
            }
            let segment = PathSegment::new(SegmentKind::DynamicProperty, first)
                .with_type(alias_type.clone())
                .with_source(scope.source().cloned());
            return Ok(vec![segment]);
        }

        let mut cursor = Cursor::at(scope.context().clone(), scope.source().cloned());
        let mut segments: Vec<PathSegment> = Vec::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            if name.starts_with('$') {
                return Err(SelectExpandError::TermNotValid { term: name.clone() });
            }
            if segments.last().is_some_and(|s| {
                s.is_navigation() || matches!(s.kind, SegmentKind::Operation { .. })
            }) {
                return Err(SelectExpandError::NavigationNotLast {
                    path: names.join("/"),
                });
            }

            let is_last = index + 1 == names.len();
            if name.contains('.') && is_last && self.model.resolve_type_name(name).is_none() {
                if let Some(operation) = self.model.find_bound_operation(name, &cursor.type_ref) {
                    let mut segment = PathSegment::new(
                        SegmentKind::Operation {
                            is_action: operation.is_action(),
                            is_import: false,
                            parameters: Vec::new(),
                        },
                        name,
                    );
                    segment.target_type = operation
                        .return_type
                        .as_deref()
                        .and_then(|t| self.model.resolve_type_name(t));
                    segments.push(segment);
                    continue;
                }
            }

            let (segment, next) = step_member(self.model, &cursor, name, StepMode::Clause)?;
            segments.push(segment);
            cursor = next;
        }
        Ok(segments)
    }

    /// `Address($select=Street)`: only `$select` may appear on a select item
    fn parse_select_options(
        &mut self,
        text: &str,
        segments: &[PathSegment],
        depth: usize,
    ) -> Result<SelectExpandClause, SelectExpandError> {
        let Some(item_type) = segments
            .last()
            .and_then(|s| s.target_type.clone())
            .filter(|t| t.is_structured())
        else {
            return Err(SelectExpandError::TermNotValid {
                term: format!("{}({})", path_text(segments), text),
            });
        };

        let source = segments.last().and_then(|s| s.navigation_source.clone());
        let scope = ExpressionScope::new(self.model, item_type).with_source(source);
        let mut select = None;
        for (name, value) in self.split_options(text)? {
            if name != "$select" {
                return Err(SelectExpandError::OptionNotAllowed {
                    name,
                    context: "$select".to_string(),
                });
            }
            select = Some(value);
        }
        self.parse_clause(select.as_deref(), None, &scope, depth)
    }

    // === $expand ===

    fn parse_expand_item(
        &mut self,
        stream: &mut TokenStream,
        scope: &ExpressionScope<'_>,
        depth: usize,
    ) -> Result<Vec<ExpandedItem>, SelectExpandError> {
        let max_depth = self.settings.effective_max_expand_depth();
        if depth + 1 > max_depth {
            return Err(SelectExpandError::ExpandDepthExceeded { max: max_depth });
        }

        if stream.consume_if(&Token::Star) {
            let mut suffix = None;
            if stream.consume_if(&Token::Slash) {
                match stream.current_token().clone() {
                    Token::SystemToken(name) if name == "$ref" => {
                        stream.advance();
                        suffix = Some(name);
                    }
                    other => {
                        return Err(SelectExpandError::TermNotValid {
                            term: format!("*/{}", other),
                        })
                    }
                }
            }
            let options = if stream.check(&Token::OpenParen) {
                Some(stream.skip_group()?)
            } else {
                None
            };

            let Some(owner) = scope.context().structured_name() else {
                return Ok(Vec::new());
            };
            let navigation_names: Vec<String> = self
                .model
                .navigation_properties(owner)
                .into_iter()
                .map(|n| n.name.clone())
                .collect();
            return navigation_names
                .into_iter()
                .map(|name| {
                    let mut names = vec![name];
                    names.extend(suffix.clone());
                    self.build_expansion(&names, options.as_deref(), scope, depth)
                })
                .collect();
        }

        let names = read_path(stream)?;
        let options = if stream.check(&Token::OpenParen) {
            Some(stream.skip_group()?)
        } else {
            None
        };
        Ok(vec![self.build_expansion(&names, options.as_deref(), scope, depth)?])
    }

    fn build_expansion(
        &mut self,
        names: &[String],
        options: Option<&str>,
        scope: &ExpressionScope<'_>,
        depth: usize,
    ) -> Result<ExpandedItem, SelectExpandError> {
        let (kind, names) = match names.split_last() {
            Some((last, rest)) if last == "$ref" => (ExpandKind::Reference, rest),
            Some((last, rest)) if last == "$count" => (ExpandKind::Count, rest),
            _ => (ExpandKind::Resource, names),
        };
        let path = names.join("/");
        if let Some(first) = names.first() {
            if !scope.is_visible(first) {
                return Err(SelectExpandError::OutsideApplyShape {
                    property: first.clone(),
                });
            }
        }

        let mut cursor = Cursor::at(scope.context().clone(), scope.source().cloned());
        let mut segments = Vec::with_capacity(names.len());
        let mut navigation_seen = false;
        for name in names {
            if name.starts_with('$') {
                return Err(SelectExpandError::TermNotValid { term: name.clone() });
            }
            if navigation_seen && !name.contains('.') {
                return Err(SelectExpandError::MultipleNavigations { path });
            }
            let (segment, next) = step_member(self.model, &cursor, name, StepMode::Clause)?;
            match &segment.kind {
                SegmentKind::NavigationProperty => navigation_seen = true,
                SegmentKind::TypeCast { .. } => {}
                SegmentKind::Property if next.type_ref.is_complex() => {}
                _ => {
                    return Err(SelectExpandError::NotNavigationOrComplex {
                        property: name.clone(),
                    })
                }
            }
            segments.push(segment);
            cursor = next;
        }
        if !navigation_seen {
            return Err(SelectExpandError::NotNavigationOrComplex {
                property: names.last().cloned().unwrap_or_default(),
            });
        }
        if kind == ExpandKind::Count && !cursor.type_ref.is_collection {
            return Err(PathError::CountNotApplicable { previous: path }.into());
        }

        self.expand_count += 1;
        let max_count = self.settings.effective_max_expand_count();
        if self.expand_count > max_count {
            return Err(SelectExpandError::ExpandCountExceeded { max: max_count });
        }

        let mut item = ExpandedItem {
            segments,
            navigation_source: cursor.source.clone(),
            target_type: cursor.type_ref.element(),
            kind,
            options: ExpandOptions::default(),
            clause: SelectExpandClause::default(),
            selected: false,
        };
        if let Some(text) = options {
            self.apply_expand_options(&mut item, text, depth)?;
        }
        Ok(item)
    }

    fn apply_expand_options(
        &mut self,
        item: &mut ExpandedItem,
        text: &str,
        depth: usize,
    ) -> Result<(), SelectExpandError> {
        let (allowed, context) = match item.kind {
            ExpandKind::Resource => (NESTED_OPTIONS, "$expand"),
            ExpandKind::Reference => (REFERENCE_OPTIONS, "$ref expansion"),
            ExpandKind::Count => (COUNT_OPTIONS, "$count expansion"),
        };
        let options = self.split_options(text)?;
        if let Some((name, _)) = options.iter().find(|(name, _)| !allowed.contains(&name.as_str())) {
            return Err(SelectExpandError::OptionNotAllowed {
                name: name.clone(),
                context: context.to_string(),
            });
        }

        let mut scope = ExpressionScope::new(self.model, item.target_type.clone())
            .with_source(item.navigation_source.clone());
        if let Some((_, text)) = options.iter().find(|(name, _)| name == "$compute") {
            let compute = parse_compute(text, &scope)?;
            compute.register(&mut scope);
            item.options.compute = Some(compute);
        }

        let mut select = None;
        let mut expand = None;
        for (name, value) in options {
            match name.as_str() {
                "$select" => select = Some(value),
                "$expand" => expand = Some(value),
                "$filter" => item.options.filter = Some(value),
                "$orderby" => item.options.orderby = Some(value),
                "$search" => item.options.search = Some(value),
                "$top" => {
                    let top = value.parse().map_err(|_| SelectExpandError::InvalidTop { value })?;
                    item.options.top = Some(top);
                }
                "$skip" => {
                    let skip = value.parse().map_err(|_| SelectExpandError::InvalidSkip { value })?;
                    item.options.skip = Some(skip);
                }
                "$count" => {
                    item.options.count = Some(match value.as_str() {
                        "true" => true,
                        "false" => false,
                        _ => return Err(SelectExpandError::InvalidCount { value }),
                    });
                }
                "$levels" => item.options.levels = Some(self.parse_levels(&value, depth)?),
                _ => {}
            }
        }

        if select.is_some() || expand.is_some() {
            item.clause = self.parse_clause(select.as_deref(), expand.as_deref(), &scope, depth + 1)?;
        }
        Ok(())
    }

    fn parse_levels(&self, value: &str, depth: usize) -> Result<Levels, SelectExpandError> {
        if value.eq_ignore_ascii_case("max") {
            return Ok(Levels::Max);
        }
        let levels: u32 = value.parse().map_err(|_| SelectExpandError::InvalidLevels {
            value: value.to_string(),
        })?;
        let max_depth = self.settings.effective_max_expand_depth();
        if depth + levels as usize > max_depth {
            return Err(SelectExpandError::ExpandDepthExceeded { max: max_depth });
        }
        Ok(Levels::Count(levels))
    }

    /// Split `name=value;name=value` into canonical option names and raw values
    fn split_options(&self, text: &str) -> Result<Vec<(String, String)>, SelectExpandError> {
        let mut options: Vec<(String, String)> = Vec::new();
        for part in split_top_level(text, ';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let Some((name, value)) = part.split_once('=') else {
                return Err(SelectExpandError::TermNotValid {
                    term: part.to_string(),
                });
            };
            let name = self.canonical_option_name(name.trim())?;
            if options.iter().any(|(existing, _)| *existing == name) {
                return Err(SelectExpandError::DuplicateOption { name });
            }
            options.push((name, value.trim().to_string()));
        }
        Ok(options)
    }

    fn canonical_option_name(&self, name: &str) -> Result<String, SelectExpandError> {
        let mut canonical = if self.settings.enable_case_insensitive {
            name.to_ascii_lowercase()
        } else {
            name.to_string()
        };
        if !canonical.starts_with('$') && self.settings.enable_no_dollar_query_options {
            canonical.insert(0, '$');
        }
        if NESTED_OPTIONS.contains(&canonical.as_str()) {
            Ok(canonical)
        } else {
            Err(SelectExpandError::UnknownOption {
                name: name.to_string(),
            })
        }
    }
}

/// Read `name/name/...`, accepting `$`-names so their validity is judged by the caller
fn read_path(stream: &mut TokenStream) -> Result<Vec<String>, SelectExpandError> {
    let mut names = Vec::new();
    loop {
        match stream.current_token().clone() {
            Token::Identifier(name) | Token::SystemToken(name) => names.push(name),
            other => {
                return Err(SelectExpandError::TermNotValid {
                    term: other.to_string(),
                })
            }
        }
        stream.advance();
        if !stream.consume_if(&Token::Slash) {
            return Ok(names);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::sample_model;
    use crate::model::{EdmModel, NavigationSource, PrimitiveKind, TypeRef};
    use crate::validation::ConstraintError;
    use assert_matches::assert_matches;

    fn scope_for<'m>(model: &'m EdmModel, set: &str) -> ExpressionScope<'m> {
        let source = model.find_navigation_source(set);
        let type_name = source
            .as_ref()
            .map(|s| s.entity_type().to_string())
            .unwrap_or_default();
        ExpressionScope::new(model, TypeRef::entity(&type_name)).with_source(source)
    }

    fn bind(
        model: &EdmModel,
        set: &str,
        select: Option<&str>,
        expand: Option<&str>,
    ) -> Result<SelectExpandClause, SelectExpandError> {
        let settings = UriParserSettings::default();
        let scope = scope_for(model, set);
        SelectExpandParser::new(model, &settings).parse(select, expand, &scope)
    }

    #[test]
    fn test_select_properties() {
        let model = sample_model();
        let clause = bind(&model, "Cities", Some("Name, Population"), None).unwrap();
        assert!(!clause.all_selected());
        let texts: Vec<String> = clause.selected().iter().map(SelectItem::text).collect();
        assert_eq!(texts, vec!["Name", "Population"]);

        let clause = bind(&model, "Cities", None, None).unwrap();
        assert!(clause.is_default());
    }

    #[test]
    fn test_select_wildcards_and_operations() {
        let model = sample_model();
        let clause = bind(&model, "Cities", Some("*,NS.*,NS.GetDistrictCount"), None).unwrap();
        assert!(clause.has_wildcard());
        assert_eq!(clause.selected()[1].text(), "NS.*");
        assert_matches!(
            clause.selected()[2].segments()[0].kind,
            SegmentKind::Operation { is_action: false, .. }
        );
    }

    #[test]
    fn test_expand_with_nested_select() {
        let model = sample_model();
        let clause = bind(&model, "Cities", None, Some("Districts($select=Name,Zip)")).unwrap();
        assert!(clause.all_selected());
        let item = &clause.expanded()[0];
        assert_eq!(item.path_text(), "Districts");
        assert_eq!(item.navigation_source.as_ref().map(NavigationSource::name), Some("Districts"));
        assert_eq!(item.clause.selected().len(), 2);
    }

    #[test]
    fn test_select_and_expand_merge_into_one_item() {
        let model = sample_model();
        let clause = bind(&model, "People", Some("Address/City"), Some("Address/City")).unwrap();
        assert!(clause.selected().is_empty());
        assert_eq!(clause.expanded().len(), 1);
        let item = &clause.expanded()[0];
        assert!(item.selected);
        assert_eq!(item.navigation_source.as_ref().map(NavigationSource::name), Some("Cities"));
    }

    #[test]
    fn test_nested_selections_on_both_sides_are_united() {
        let model = sample_model();
        let clause = bind(
            &model,
            "Cities",
            Some("Districts($select=Name)"),
            Some("Districts($select=Zip)"),
        )
        .unwrap();
        assert!(clause.selected().is_empty());
        let nested: Vec<String> = clause.expanded()[0]
            .clause
            .selected()
            .iter()
            .map(|s| s.text())
            .collect();
        assert_eq!(nested, ["Zip", "Name"]);
    }

    #[test]
    fn test_reference_and_resource_expansion_collapse() {
        let model = sample_model();
        let clause = bind(&model, "Cities", None, Some("Districts,Districts/$ref,Districts/$count")).unwrap();
        let kinds: Vec<ExpandKind> = clause.expanded().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, [ExpandKind::Resource, ExpandKind::Count]);
    }

    #[test]
    fn test_expand_through_derived_complex_type() {
        let model = sample_model();
        let clause = bind(&model, "Me", None, Some("Address/WorkAddress/NS.WorkAddress/City2")).unwrap();
        let item = &clause.expanded()[0];
        let kinds: Vec<&str> = item.segments.iter().map(|s| s.kind.name()).collect();
        assert_eq!(kinds, vec!["Property", "Property", "TypeCast", "NavigationProperty"]);
        assert_eq!(item.navigation_source.as_ref().map(NavigationSource::name), Some("Cities"));
        assert_eq!(item.navigation_name(), Some("City2"));
    }

    #[test]
    fn test_expand_path_rules() {
        let model = sample_model();
        assert_matches!(
            bind(&model, "Cities", None, Some("Name")),
            Err(SelectExpandError::NotNavigationOrComplex { .. })
        );
        assert_matches!(
            bind(&model, "People", None, Some("Address")),
            Err(SelectExpandError::NotNavigationOrComplex { .. })
        );
        assert_matches!(
            bind(&model, "Districts", None, Some("City/Districts")),
            Err(SelectExpandError::MultipleNavigations { .. })
        );
        assert_matches!(
            bind(&model, "Cities", None, Some("Nope")),
            Err(SelectExpandError::Path(PathError::PropertyNotFound { .. }))
        );
        assert_matches!(
            bind(&model, "Cities", Some("Districts/Name"), None),
            Err(SelectExpandError::NavigationNotLast { .. })
        );
        assert_matches!(
            bind(&model, "Cities", Some("$ref"), None),
            Err(SelectExpandError::TermNotValid { .. })
        );
    }

    #[test]
    fn test_expand_star_ref_and_count() {
        let model = sample_model();
        let clause = bind(&model, "People", None, Some("*/$ref")).unwrap();
        assert_eq!(clause.expanded().len(), 3);
        assert!(clause.expanded().iter().all(|e| e.kind == ExpandKind::Reference));

        let clause = bind(&model, "Cities", None, Some("Districts/$count($filter=Zip eq '1')")).unwrap();
        let item = &clause.expanded()[0];
        assert_eq!(item.kind, ExpandKind::Count);
        assert_eq!(item.options.filter.as_deref(), Some("Zip eq '1'"));

        assert_matches!(
            bind(&model, "People", None, Some("HomeCity/$count")),
            Err(SelectExpandError::Path(PathError::CountNotApplicable { .. }))
        );
        assert_matches!(
            bind(&model, "Cities", None, Some("Districts/$ref($select=Name)")),
            Err(SelectExpandError::OptionNotAllowed { .. })
        );
    }

    #[test]
    fn test_nested_options() {
        let model = sample_model();
        let clause = bind(
            &model,
            "Cities",
            None,
            Some("Districts($filter=Name eq 'a;b';$orderby=Name desc;$top=5;$skip=1;$count=true;$levels=2)"),
        )
        .unwrap();
        let options = &clause.expanded()[0].options;
        assert_eq!(options.filter.as_deref(), Some("Name eq 'a;b'"));
        assert_eq!(options.orderby.as_deref(), Some("Name desc"));
        assert_eq!((options.top, options.skip, options.count), (Some(5), Some(1), Some(true)));
        assert_eq!(options.levels, Some(Levels::Count(2)));

        assert_matches!(
            bind(&model, "Cities", None, Some("Districts($foo=1)")),
            Err(SelectExpandError::UnknownOption { .. })
        );
        assert_matches!(
            bind(&model, "Cities", None, Some("Districts($top=1;$top=2)")),
            Err(SelectExpandError::DuplicateOption { .. })
        );
        assert_matches!(
            bind(&model, "Cities", None, Some("Districts($top=x)")),
            Err(SelectExpandError::InvalidTop { .. })
        );
        assert_matches!(
            bind(&model, "Cities", None, Some("Districts($levels=some)")),
            Err(SelectExpandError::InvalidLevels { .. })
        );
        let clause = bind(&model, "Cities", None, Some("Districts($levels=max)")).unwrap();
        assert_eq!(clause.expanded()[0].options.levels, Some(Levels::Max));
    }

    #[test]
    fn test_nested_compute_is_selectable() {
        let model = sample_model();
        let clause = bind(
            &model,
            "Cities",
            None,
            Some("Districts($compute=length(Name) as NameLength;$select=NameLength)"),
        )
        .unwrap();
        let nested = &clause.expanded()[0].clause;
        let selected = &nested.selected()[0];
        assert_eq!(selected.segments()[0].kind, SegmentKind::DynamicProperty);
        assert_eq!(
            selected.segments()[0].target_type.as_ref().and_then(TypeRef::primitive_kind),
            Some(PrimitiveKind::Int32)
        );
    }

    #[test]
    fn test_derived_type_constraint_on_expansion() {
        let model = sample_model();
        assert!(bind(&model, "Orders", None, Some("Customer/NS.VipCustomer")).is_ok());
        let err = bind(&model, "Orders", None, Some("Customer/NS.NormalCustomer")).unwrap_err();
        assert_matches!(err, SelectExpandError::Path(PathError::Constraint(ConstraintError::TypeNotAllowed { .. })));
        assert_eq!(err.error_code(), codes::validation::TYPE_NOT_ALLOWED_BY_CONSTRAINT);
    }

    #[test]
    fn test_depth_and_count_limits() {
        let model = sample_model();
        let settings = UriParserSettings::default().with_max_expand_depth(2);
        let scope = scope_for(&model, "Cities");
        let deep = "Districts($expand=City($expand=Districts))";
        let err = SelectExpandParser::new(&model, &settings)
            .parse(None, Some(deep), &scope)
            .unwrap_err();
        assert_matches!(err, SelectExpandError::ExpandDepthExceeded { max: 2 });

        assert!(SelectExpandParser::new(&model, &settings)
            .parse(None, Some("Districts($expand=City)"), &scope)
            .is_ok());
        assert_matches!(
            SelectExpandParser::new(&model, &settings).parse(None, Some("Districts($levels=3)"), &scope),
            Err(SelectExpandError::ExpandDepthExceeded { .. })
        );
    }

    #[test]
    fn test_nested_select_on_complex_property() {
        let model = sample_model();
        let clause = bind(&model, "People", Some("Address($select=Street,Zip)"), None).unwrap();
        let SelectItem::Path { nested: Some(nested), .. } = &clause.selected()[0] else {
            panic!("expected nested select");
        };
        assert_eq!(nested.selected().len(), 2);
        assert_matches!(
            bind(&model, "People", Some("Name($select=X)"), None),
            Err(SelectExpandError::TermNotValid { .. })
        );
        assert_matches!(
            bind(&model, "People", Some("Address($top=1)"), None),
            Err(SelectExpandError::OptionNotAllowed { .. })
        );
    }

    #[test]
    fn test_dynamic_and_restricted_names() {
        let model = sample_model();
        let settings = UriParserSettings::default();
        let mut scope = scope_for(&model, "Cities");
        scope.add_dynamic("Total", TypeRef::primitive(PrimitiveKind::Decimal));
        scope.restrict_to(vec!["Name".to_string()]);

        let clause = SelectExpandParser::new(&model, &settings)
            .parse(Some("Name,Total"), None, &scope)
            .unwrap();
        assert_eq!(clause.selected().len(), 2);
        assert_matches!(
            SelectExpandParser::new(&model, &settings).parse(Some("Area"), None, &scope),
            Err(SelectExpandError::OutsideApplyShape { .. })
        );
    }

    #[test]
    fn test_context_must_be_structured() {
        let model = sample_model();
        let settings = UriParserSettings::default();
        let scope = ExpressionScope::new(&model, TypeRef::primitive(PrimitiveKind::String));
        assert_matches!(
            SelectExpandParser::new(&model, &settings).parse(Some("Name"), None, &scope),
            Err(SelectExpandError::ContextNotStructured { .. })
        );
    }

    #[test]
    fn test_case_insensitive_nested_options() {
        let model = sample_model();
        let settings = UriParserSettings::default()
            .with_case_insensitive(true)
            .with_no_dollar_query_options(true);
        let scope = scope_for(&model, "Cities");
        let clause = SelectExpandParser::new(&model, &settings)
            .parse(None, Some("Districts($SELECT=Name;top=2)"), &scope)
            .unwrap();
        assert_eq!(clause.expanded()[0].options.top, Some(2));
        assert_eq!(clause.expanded()[0].clause.selected().len(), 1);
    }
}
