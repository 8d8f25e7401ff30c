//! Query string splitting
//!
//! Splits the raw query string into system query options, custom options and
//! parameter aliases. Option values are kept as decoded text; `$top`, `$skip`
//! and `$count` are validated here because nothing downstream re-reads them.

use crate::config::compile_time::query_options::{MAX_CUSTOM_OPTIONS, MAX_QUERY_LENGTH};
use crate::config::runtime::UriParserSettings;
use crate::logging::codes;
use percent_encoding::percent_decode_str;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryOptionError {
    #[error("Query option '{name}' is specified more than once")]
    Duplicate { name: String },

    #[error("'{name}' is not a supported system query option")]
    UnknownSystemOption { name: String },

    #[error("Query option with value '{value}' has an empty name")]
    EmptyName { value: String },

    #[error("Invalid $top value '{value}'; expected a non-negative integer")]
    InvalidTop { value: String },

    #[error("Invalid $skip value '{value}'; expected a non-negative integer")]
    InvalidSkip { value: String },

    #[error("Invalid $count value '{value}'; expected true or false")]
    InvalidCount { value: String },

    #[error("Query text '{text}' is not valid percent-encoded UTF-8")]
    InvalidEncoding { text: String },

    #[error("Query string length {length} exceeds maximum {max}")]
    QueryTooLong { length: usize, max: usize },

    #[error("Too many custom query options: {count} (max {max})")]
    TooManyCustomOptions { count: usize, max: usize },

    #[error("Query option '{name}' cannot be applied to '{path}'")]
    NotApplicable { name: String, path: String },
}

impl QueryOptionError {
    pub fn error_code(&self) -> crate::logging::Code {
        match self {
            QueryOptionError::Duplicate { .. } => codes::query_options::DUPLICATE_OPTION,
            QueryOptionError::UnknownSystemOption { .. } => codes::query_options::UNKNOWN_SYSTEM_OPTION,
            QueryOptionError::EmptyName { .. } => codes::query_options::EMPTY_OPTION_NAME,
            QueryOptionError::InvalidTop { .. } => codes::query_options::INVALID_TOP,
            QueryOptionError::InvalidSkip { .. } => codes::query_options::INVALID_SKIP,
            QueryOptionError::InvalidCount { .. } => codes::query_options::INVALID_COUNT,
            QueryOptionError::InvalidEncoding { .. } => codes::query_options::INVALID_ENCODING,
            QueryOptionError::QueryTooLong { .. } => codes::query_options::QUERY_TOO_LONG,
            QueryOptionError::TooManyCustomOptions { .. } => {
                codes::query_options::TOO_MANY_CUSTOM_OPTIONS
            }
            QueryOptionError::NotApplicable { .. } => codes::query_options::NOT_APPLICABLE,
        }
    }
}

/// Recognized `$` options
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SystemQueryOption {
    Select,
    Expand,
    Filter,
    OrderBy,
    Top,
    Skip,
    Count,
    Search,
    Apply,
    Compute,
    SkipToken,
    DeltaToken,
    Format,
    Id,
    Index,
}

impl SystemQueryOption {
    pub const ALL: [SystemQueryOption; 15] = [
        SystemQueryOption::Select,
        SystemQueryOption::Expand,
        SystemQueryOption::Filter,
        SystemQueryOption::OrderBy,
        SystemQueryOption::Top,
        SystemQueryOption::Skip,
        SystemQueryOption::Count,
        SystemQueryOption::Search,
        SystemQueryOption::Apply,
        SystemQueryOption::Compute,
        SystemQueryOption::SkipToken,
        SystemQueryOption::DeltaToken,
        SystemQueryOption::Format,
        SystemQueryOption::Id,
        SystemQueryOption::Index,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SystemQueryOption::Select => "$select",
            SystemQueryOption::Expand => "$expand",
            SystemQueryOption::Filter => "$filter",
            SystemQueryOption::OrderBy => "$orderby",
            SystemQueryOption::Top => "$top",
            SystemQueryOption::Skip => "$skip",
            SystemQueryOption::Count => "$count",
            SystemQueryOption::Search => "$search",
            SystemQueryOption::Apply => "$apply",
            SystemQueryOption::Compute => "$compute",
            SystemQueryOption::SkipToken => "$skiptoken",
            SystemQueryOption::DeltaToken => "$deltatoken",
            SystemQueryOption::Format => "$format",
            SystemQueryOption::Id => "$id",
            SystemQueryOption::Index => "$index",
        }
    }

    /// Look up a `$`-prefixed name
    pub fn from_name(name: &str, case_insensitive: bool) -> Option<Self> {
        Self::ALL.into_iter().find(|option| {
            if case_insensitive {
                option.name().eq_ignore_ascii_case(name)
            } else {
                option.name() == name
            }
        })
    }
}

impl fmt::Display for SystemQueryOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Decoded query string
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryOptions {
    options: BTreeMap<SystemQueryOption, String>,
    /// Options without `$` in request order
    pub custom: Vec<(String, String)>,
    /// `@name=value` parameter aliases, keyed without the `@`
    pub aliases: HashMap<String, String>,
    pub top: Option<u64>,
    pub skip: Option<u64>,
    pub count: Option<bool>,
}

impl QueryOptions {
    pub fn parse(query: &str, settings: &UriParserSettings) -> Result<Self, QueryOptionError> {
        let query = query.strip_prefix('?').unwrap_or(query);
        if query.len() > MAX_QUERY_LENGTH {
            return Err(QueryOptionError::QueryTooLong {
                length: query.len(),
                max: MAX_QUERY_LENGTH,
            });
        }

        let mut parsed = QueryOptions::default();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (raw_name, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
            let name = decode(raw_name)?;
            let value = decode(raw_value)?;
            parsed.insert(name, value, settings)?;
        }

        parsed.top = parsed
            .get(SystemQueryOption::Top)
            .map(|v| v.trim().parse::<u64>().map_err(|_| QueryOptionError::InvalidTop { value: v.to_string() }))
            .transpose()?;
        parsed.skip = parsed
            .get(SystemQueryOption::Skip)
            .map(|v| v.trim().parse::<u64>().map_err(|_| QueryOptionError::InvalidSkip { value: v.to_string() }))
            .transpose()?;
        parsed.count = parsed.get(SystemQueryOption::Count).map(parse_bool).transpose()?;

        crate::log_success!(codes::success::QUERY_OPTIONS_SPLIT, "Query options split",
            "system" => parsed.options.len(),
            "custom" => parsed.custom.len(),
            "aliases" => parsed.aliases.len()
        );
        Ok(parsed)
    }

    /// Query options of a full request URI; the fragment is ignored
    pub fn from_uri(request_uri: &str, settings: &UriParserSettings) -> Result<Self, QueryOptionError> {
        let without_fragment = request_uri.split('#').next().unwrap_or(request_uri);
        match without_fragment.split_once('?') {
            Some((_, query)) => Self::parse(query, settings),
            None => Ok(Self::default()),
        }
    }

    fn insert(
        &mut self,
        name: String,
        value: String,
        settings: &UriParserSettings,
    ) -> Result<(), QueryOptionError> {
        if name.trim().is_empty() {
            if value.is_empty() {
                return Ok(());
            }
            return Err(QueryOptionError::EmptyName { value });
        }

        if let Some(alias) = name.strip_prefix('@') {
            if self.aliases.insert(alias.to_string(), value).is_some() {
                return Err(QueryOptionError::Duplicate { name });
            }
            return Ok(());
        }

        let system = if name.starts_with('$') {
            let option = SystemQueryOption::from_name(&name, settings.enable_case_insensitive);
            if option.is_none() {
                crate::log_error!(codes::query_options::UNKNOWN_SYSTEM_OPTION,
                    "Unknown system query option",
                    "name" => name
                );
                return Err(QueryOptionError::UnknownSystemOption { name });
            }
            option
        } else if settings.enable_no_dollar_query_options {
            SystemQueryOption::from_name(&format!("${}", name), settings.enable_case_insensitive)
        } else {
            None
        };

        match system {
            Some(option) => {
                if self.options.insert(option, value).is_some() {
                    crate::log_error!(codes::query_options::DUPLICATE_OPTION,
                        "Query option repeated",
                        "name" => option
                    );
                    return Err(QueryOptionError::Duplicate { name });
                }
            }
            None => {
                if self.custom.len() >= MAX_CUSTOM_OPTIONS {
                    return Err(QueryOptionError::TooManyCustomOptions {
                        count: self.custom.len() + 1,
                        max: MAX_CUSTOM_OPTIONS,
                    });
                }
                self.custom.push((name, value));
            }
        }
        Ok(())
    }

    pub fn get(&self, option: SystemQueryOption) -> Option<&str> {
        self.options.get(&option).map(String::as_str)
    }

    pub fn contains(&self, option: SystemQueryOption) -> bool {
        self.options.contains_key(&option)
    }

    pub fn select(&self) -> Option<&str> {
        self.get(SystemQueryOption::Select)
    }

    pub fn expand(&self) -> Option<&str> {
        self.get(SystemQueryOption::Expand)
    }

    pub fn apply(&self) -> Option<&str> {
        self.get(SystemQueryOption::Apply)
    }

    pub fn compute(&self) -> Option<&str> {
        self.get(SystemQueryOption::Compute)
    }

    pub fn filter(&self) -> Option<&str> {
        self.get(SystemQueryOption::Filter)
    }

    pub fn orderby(&self) -> Option<&str> {
        self.get(SystemQueryOption::OrderBy)
    }

    pub fn search(&self) -> Option<&str> {
        self.get(SystemQueryOption::Search)
    }

    pub fn custom_option(&self, name: &str) -> Option<&str> {
        self.custom
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

}

fn decode(text: &str) -> Result<String, QueryOptionError> {
    percent_decode_str(text)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| QueryOptionError::InvalidEncoding {
            text: text.to_string(),
        })
}

fn parse_bool(value: &str) -> Result<bool, QueryOptionError> {
    match value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(QueryOptionError::InvalidCount {
            value: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn parse(query: &str) -> Result<QueryOptions, QueryOptionError> {
        QueryOptions::parse(query, &UriParserSettings::default())
    }

    #[test]
    fn test_system_custom_and_alias_options() {
        let options = parse("$select=Name,Id&$top=5&debug=1&@p=%27x%27&$count=true").unwrap();
        assert_eq!(options.select(), Some("Name,Id"));
        assert_eq!(options.top, Some(5));
        assert_eq!(options.count, Some(true));
        assert_eq!(options.custom_option("debug"), Some("1"));
        assert_eq!(options.aliases.get("p").map(String::as_str), Some("'x'"));
    }

    #[test]
    fn test_values_are_percent_decoded() {
        let options = parse("$filter=Name%20eq%20%27a%26b%27&$expand=Districts(%24select%3DName)").unwrap();
        assert_eq!(options.filter(), Some("Name eq 'a&b'"));
        assert_eq!(options.expand(), Some("Districts($select=Name)"));
    }

    #[test]
    fn test_duplicate_and_unknown_options() {
        assert_matches!(parse("$top=1&$top=2"), Err(QueryOptionError::Duplicate { .. }));
        let err = parse("$bogus=1").unwrap_err();
        assert_eq!(err.error_code().as_str(), "ODataUriParser_UnknownSystemQueryOption");
        assert_matches!(parse("=1"), Err(QueryOptionError::EmptyName { .. }));
        assert_matches!(parse("$top=%FF"), Err(QueryOptionError::InvalidEncoding { .. }));
    }

    #[test]
    fn test_numeric_and_boolean_validation() {
        assert_matches!(parse("$top=-1"), Err(QueryOptionError::InvalidTop { .. }));
        assert_matches!(parse("$skip=x"), Err(QueryOptionError::InvalidSkip { .. }));
        assert_matches!(parse("$count=yes"), Err(QueryOptionError::InvalidCount { .. }));
    }

    #[test]
    fn test_case_insensitive_and_no_dollar_modes() {
        assert_matches!(parse("$SELECT=Name"), Err(QueryOptionError::UnknownSystemOption { .. }));
        assert_eq!(parse("select=Name").unwrap().custom_option("select"), Some("Name"));

        let settings = UriParserSettings::default()
            .with_case_insensitive(true)
            .with_no_dollar_query_options(true);
        let options = QueryOptions::parse("$SELECT=Name&expand=Districts", &settings).unwrap();
        assert_eq!(options.select(), Some("Name"));
        assert_eq!(options.expand(), Some("Districts"));
        assert_matches!(
            QueryOptions::parse("$select=Id&select=Name", &settings),
            Err(QueryOptionError::Duplicate { .. })
        );
    }

    #[test]
    fn test_from_uri_ignores_fragment() {
        let settings = UriParserSettings::default();
        let options = QueryOptions::from_uri("http://h/s/Cities?$top=2#frag", &settings).unwrap();
        assert_eq!(options.top, Some(2));
        assert_eq!(QueryOptions::from_uri("http://h/s/Cities", &settings).unwrap(), QueryOptions::default());
    }
}
