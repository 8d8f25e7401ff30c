//! Request URI parsing
//!
//! [`ODataUriParser`] ties the stages together: the query string is split, the
//! path is resolved, then `$apply`, `$compute` and `$select`/`$expand` are bound
//! in that order against the type the path addresses. Each stage sees the
//! aliases registered by the stages before it.

use crate::apply::{ApplyClause, ApplyParser};
use crate::compute::{parse_compute, ComputeClause};
use crate::config::runtime::UriParserSettings;
use crate::context_url::{ContextUrlBuilder, ContextUrlError, ContextUrlInfo};
use crate::error::ODataError;
use crate::expression::ExpressionScope;
use crate::logging::{self, codes};
use crate::model::ModelAccessor;
use crate::path::{PayloadKind, ResolvedPath, SegmentResolver};
use crate::query_options::{QueryOptionError, QueryOptions, SystemQueryOption};
use crate::select_expand::{SelectExpandClause, SelectExpandParser};
use serde::Serialize;

/// A fully bound request URI
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ODataUri {
    pub service_root: String,
    pub path: ResolvedPath,
    pub query_options: QueryOptions,
    pub apply: Option<ApplyClause>,
    pub compute: Option<ComputeClause>,
    pub select_expand: Option<SelectExpandClause>,
}

impl ODataUri {
    pub fn payload_kind(&self) -> PayloadKind {
        self.path.payload_kind()
    }

    /// Context URL of the response to this request
    pub fn context_url(&self, builder: &ContextUrlBuilder) -> Result<Option<String>, ContextUrlError> {
        builder.build(self.payload_kind(), &ContextUrlInfo::from_uri(self), true)
    }
}

pub struct ODataUriParser<'a> {
    model: &'a dyn ModelAccessor,
    service_root: String,
    settings: UriParserSettings,
}

impl<'a> ODataUriParser<'a> {
    pub fn new(model: &'a dyn ModelAccessor, service_root: &str) -> Self {
        Self {
            model,
            service_root: service_root.to_string(),
            settings: UriParserSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: UriParserSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &UriParserSettings {
        &self.settings
    }

    pub fn service_root(&self) -> &str {
        &self.service_root
    }

    /// Parse an absolute or root-relative request URI
    pub fn parse(&self, request_uri: &str) -> Result<ODataUri, ODataError> {
        logging::with_request_context(request_uri, || {
            let result = self.parse_in_context(request_uri);
            match &result {
                Ok(uri) => {
                    crate::log_success!(codes::success::URI_PARSE_COMPLETE, "Request URI parsed",
                        "path" => uri.path,
                        "payload" => uri.payload_kind()
                    );
                }
                Err(e) => {
                    crate::log_error!(e.error_code(), "Request URI rejected",
                        "error" => e
                    );
                }
            }
            result
        })
    }

    fn parse_in_context(&self, request_uri: &str) -> Result<ODataUri, ODataError> {
        let query_options = QueryOptions::from_uri(request_uri, &self.settings)?;
        let path = SegmentResolver::new(self.model, &self.settings, &query_options.aliases)
            .resolve(&self.service_root, request_uri)?;

        let mut uri = ODataUri {
            service_root: self.service_root.clone(),
            path,
            query_options,
            apply: None,
            compute: None,
            select_expand: None,
        };

        let shaping = [
            SystemQueryOption::Apply,
            SystemQueryOption::Compute,
            SystemQueryOption::Select,
            SystemQueryOption::Expand,
        ];
        let Some(option) = shaping.into_iter().find(|o| uri.query_options.contains(*o)) else {
            return Ok(uri);
        };

        let context = match uri.path.target_type() {
            Some(target) if target.element().is_structured() => target.element(),
            _ => {
                return Err(QueryOptionError::NotApplicable {
                    name: option.name().to_string(),
                    path: uri.path.to_string(),
                }
                .into())
            }
        };
        let mut scope = ExpressionScope::new(self.model, context)
            .with_source(uri.path.navigation_source().cloned());

        if let Some(text) = uri.query_options.apply() {
            let clause = ApplyParser::new(self.model).parse(text, &scope)?;
            clause.register(&mut scope);
            uri.apply = Some(clause);
        }
        if let Some(text) = uri.query_options.compute() {
            let clause = parse_compute(text, &scope)?;
            clause.register(&mut scope);
            uri.compute = Some(clause);
        }

        let select = uri.query_options.select();
        let expand = uri.query_options.expand();
        if select.is_some() || expand.is_some() {
            let clause = SelectExpandParser::new(self.model, &self.settings).parse(select, expand, &scope)?;
            uri.select_expand = Some(clause);
        }
        Ok(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context_url::ODataVersion;
    use crate::model::test_support::sample_model;
    use crate::path::SegmentKind;
    use assert_matches::assert_matches;

    const ROOT: &str = "http://host/service";

    fn context_url(uri: &ODataUri) -> Option<String> {
        let builder = ContextUrlBuilder::new(Some("http://host/service/$metadata"), ODataVersion::V4);
        uri.context_url(&builder)
            .unwrap()
            .map(|url| url.trim_start_matches("http://host/service/$metadata").to_string())
    }

    #[test]
    fn test_parse_select_and_expand() {
        let model = sample_model();
        let parser = ODataUriParser::new(&model, ROOT);
        let uri = parser
            .parse("http://host/service/Cities?$select=Name&$expand=Districts($select=Name,Zip)")
            .unwrap();
        assert_eq!(uri.payload_kind(), PayloadKind::ResourceSet);
        assert!(uri.apply.is_none());
        assert_eq!(context_url(&uri).as_deref(), Some("#Cities(Name,Districts(Name,Zip))"));
    }

    #[test]
    fn test_parse_apply_then_compute_then_select() {
        let model = sample_model();
        let parser = ODataUriParser::new(&model, ROOT);
        let uri = parser
            .parse("/service/Cities?$apply=groupby((Name),aggregate(Id with sum as TotalId))")
            .unwrap();
        assert_eq!(context_url(&uri).as_deref(), Some("#Cities(Name,TotalId)"));

        let uri = parser
            .parse(
                "/service/Cities?$apply=aggregate(Budget with sum as Total)\
                 &$compute=Total mul 2 as Twice&$select=Total,Twice",
            )
            .unwrap();
        assert_eq!(context_url(&uri).as_deref(), Some("#Cities(Total,Twice)"));

        let err = parser
            .parse("/service/Cities?$apply=groupby((Name))&$select=Area")
            .unwrap_err();
        assert_eq!(err.message_key(), codes::select_expand::OUTSIDE_APPLY_SHAPE.as_str());
    }

    #[test]
    fn test_unaggregated_apply_keeps_select_projection() {
        let model = sample_model();
        let parser = ODataUriParser::new(&model, ROOT);
        let uri = parser
            .parse("/service/Cities?$apply=filter(Name eq 'x')/compute(Area mul 2 as A2)&$select=Name")
            .unwrap();
        assert_eq!(context_url(&uri).as_deref(), Some("#Cities(Name)"));

        let uri = parser
            .parse("/service/Cities?$apply=filter(Name eq 'x')/compute(Area mul 2 as A2)&$select=Name,A2")
            .unwrap();
        assert_eq!(context_url(&uri).as_deref(), Some("#Cities(Name,A2)"));
    }

    #[test]
    fn test_complex_property_context_names_the_type() {
        let model = sample_model();
        let parser = ODataUriParser::new(&model, ROOT);
        let cases = [
            ("http://host/service/People(1)/Address", "#NS.Address"),
            ("http://host/service/People(1)/Address/WorkAddress", "#NS.Address"),
            ("http://host/service/Me/Addresses", "#Collection(NS.Address)"),
            ("http://host/service/Me/Address?$select=Street", "#NS.Address"),
            ("http://host/service/People(1)/Addresses?$select=Street", "#Collection(NS.Address)"),
        ];
        for (request, expected) in cases {
            let uri = parser.parse(request).unwrap();
            assert_eq!(context_url(&uri).as_deref(), Some(expected), "{}", request);
        }

        let uri = parser.parse("http://host/service/Me/Address/City").unwrap();
        assert_eq!(context_url(&uri).as_deref(), Some("#Cities/$entity"));
    }

    #[test]
    fn test_parse_singleton_and_key() {
        let model = sample_model();
        let parser = ODataUriParser::new(&model, ROOT);
        let uri = parser.parse("http://host/service/Me").unwrap();
        assert_eq!(context_url(&uri).as_deref(), Some("#Me"));

        let uri = parser.parse("http://host/service/Cities(1)?$select=Name").unwrap();
        assert_matches!(uri.path.segments[1].kind, SegmentKind::Key { .. });
        assert_eq!(context_url(&uri).as_deref(), Some("#Cities(Name)/$entity"));
    }

    #[test]
    fn test_parse_uses_parameter_aliases_and_custom_options() {
        let model = sample_model();
        let parser = ODataUriParser::new(&model, ROOT);
        let uri = parser
            .parse("http://host/service/GetTopCities(count=@n)?@n=3&debug=true")
            .unwrap();
        assert_eq!(uri.query_options.custom_option("debug"), Some("true"));
        assert_eq!(uri.payload_kind(), PayloadKind::ResourceSet);
    }

    #[test]
    fn test_shaping_option_on_unstructured_target() {
        let model = sample_model();
        let parser = ODataUriParser::new(&model, ROOT);
        let err = parser
            .parse("http://host/service/$metadata?$select=Name")
            .unwrap_err();
        assert_matches!(err, ODataError::QueryOption(QueryOptionError::NotApplicable { .. }));

        let err = parser
            .parse("http://host/service/Cities/$count?$expand=Districts")
            .unwrap_err();
        assert_eq!(err.message_key(), codes::query_options::NOT_APPLICABLE.as_str());
    }

    #[test]
    fn test_settings_are_honored() {
        let model = sample_model();
        let strict = ODataUriParser::new(&model, ROOT);
        assert_matches!(
            strict.parse("http://host/service/Cities?$SELECT=Name"),
            Err(ODataError::QueryOption(QueryOptionError::UnknownSystemOption { .. }))
        );

        let relaxed = ODataUriParser::new(&model, ROOT).with_settings(
            UriParserSettings::default()
                .with_case_insensitive(true)
                .with_no_dollar_query_options(true),
        );
        let uri = relaxed.parse("http://host/service/Cities?$SELECT=Name&expand=Districts").unwrap();
        assert_eq!(context_url(&uri).as_deref(), Some("#Cities(Name,Districts())"));
    }

    #[test]
    fn test_errors_carry_message_keys() {
        let model = sample_model();
        let parser = ODataUriParser::new(&model, ROOT);
        let err = parser.parse("http://host/service/People(1)/Addresses/City").unwrap_err();
        assert_eq!(err.message_key(), "RequestUriProcessor_CannotQueryCollections");

        let err = parser.parse("http://other/service/Cities").unwrap_err();
        assert_matches!(err, ODataError::Path(_));
    }

    #[test]
    fn test_request_context_is_restored() {
        let model = sample_model();
        let parser = ODataUriParser::new(&model, ROOT);
        let _ = parser.parse("http://host/service/Cities");
        assert!(logging::get_current_request_context().is_none());
    }
}
