// RUNTIME PREFERENCES (parser behaviour and logging)

use super::compile_time;
use serde::{Deserialize, Serialize};
use std::env;

/// Per-parser settings. Limits are clamped to the compile-time maxima.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UriParserSettings {
    /// Deepest `$expand` nesting accepted before a bounded-recursion failure
    pub max_expand_depth: usize,

    /// Total expanded items accepted across the whole clause tree
    pub max_expand_count: usize,

    /// Whether system query option names match case-insensitively (`$SELECT`)
    pub enable_case_insensitive: bool,

    /// Whether system query options may omit the `$` prefix (`select=Name`)
    pub enable_no_dollar_query_options: bool,

    /// Whether to log every resolved segment at debug level
    pub log_resolution_details: bool,
}

impl Default for UriParserSettings {
    fn default() -> Self {
        Self {
            max_expand_depth: env::var(env_vars::PARSER_MAX_EXPAND_DEPTH)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(compile_time::select_expand::MAX_EXPAND_DEPTH),
            max_expand_count: env::var(env_vars::PARSER_MAX_EXPAND_COUNT)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(compile_time::select_expand::MAX_EXPAND_COUNT),
            enable_case_insensitive: env::var(env_vars::PARSER_CASE_INSENSITIVE)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            enable_no_dollar_query_options: env::var(env_vars::PARSER_NO_DOLLAR_OPTIONS)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            log_resolution_details: env::var(env_vars::PARSER_LOG_RESOLUTION_DETAILS)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        }
    }
}

impl UriParserSettings {
    /// Expand depth after clamping to the compiled maximum
    pub fn effective_max_expand_depth(&self) -> usize {
        self.max_expand_depth
            .min(compile_time::select_expand::MAX_EXPAND_DEPTH)
    }

    /// Expand count after clamping to the compiled maximum
    pub fn effective_max_expand_count(&self) -> usize {
        self.max_expand_count
            .min(compile_time::select_expand::MAX_EXPAND_COUNT)
    }

    pub fn with_max_expand_depth(mut self, depth: usize) -> Self {
        self.max_expand_depth = depth;
        self
    }

    pub fn with_case_insensitive(mut self, enabled: bool) -> Self {
        self.enable_case_insensitive = enabled;
        self
    }

    pub fn with_no_dollar_query_options(mut self, enabled: bool) -> Self {
        self.enable_no_dollar_query_options = enabled;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingPreferences {
    /// Whether to use structured JSON logging
    pub use_structured_logging: bool,

    /// Whether to enable console output
    pub enable_console_logging: bool,

    /// Minimum log level (security events are still promoted)
    pub min_log_level: LogLevel,

    /// Whether to include the request URI in every event
    pub include_request_context: bool,
}

impl Default for LoggingPreferences {
    fn default() -> Self {
        Self {
            use_structured_logging: env::var(env_vars::LOGGING_USE_STRUCTURED)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            enable_console_logging: env::var(env_vars::LOGGING_ENABLE_CONSOLE)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            min_log_level: env::var(env_vars::LOGGING_MIN_LEVEL)
                .ok()
                .and_then(|v| parse_log_level(&v))
                .unwrap_or(LogLevel::Info),
            include_request_context: env::var(env_vars::LOGGING_INCLUDE_REQUEST_CONTEXT)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Error = 0,
    Warning = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }

    /// Convert to events::LogLevel
    pub fn to_events_log_level(&self) -> crate::logging::events::LogLevel {
        match self {
            LogLevel::Error => crate::logging::events::LogLevel::Error,
            LogLevel::Warning => crate::logging::events::LogLevel::Warning,
            LogLevel::Info => crate::logging::events::LogLevel::Info,
            LogLevel::Debug => crate::logging::events::LogLevel::Debug,
        }
    }
}

/// Parse log level from string (used for environment variables)
pub fn parse_log_level(level: &str) -> Option<LogLevel> {
    match level.to_lowercase().as_str() {
        "error" | "0" => Some(LogLevel::Error),
        "warning" | "warn" | "1" => Some(LogLevel::Warning),
        "info" | "2" => Some(LogLevel::Info),
        "debug" | "3" => Some(LogLevel::Debug),
        _ => None,
    }
}

/// Environment variable names for configuration
pub mod env_vars {
    // Parser
    pub const PARSER_MAX_EXPAND_DEPTH: &str = "ODATA_PARSER_MAX_EXPAND_DEPTH";
    pub const PARSER_MAX_EXPAND_COUNT: &str = "ODATA_PARSER_MAX_EXPAND_COUNT";
    pub const PARSER_CASE_INSENSITIVE: &str = "ODATA_PARSER_CASE_INSENSITIVE";
    pub const PARSER_NO_DOLLAR_OPTIONS: &str = "ODATA_PARSER_NO_DOLLAR_OPTIONS";
    pub const PARSER_LOG_RESOLUTION_DETAILS: &str = "ODATA_PARSER_LOG_RESOLUTION_DETAILS";

    // Logging
    pub const LOGGING_USE_STRUCTURED: &str = "ODATA_LOGGING_USE_STRUCTURED";
    pub const LOGGING_ENABLE_CONSOLE: &str = "ODATA_LOGGING_ENABLE_CONSOLE";
    pub const LOGGING_MIN_LEVEL: &str = "ODATA_LOGGING_MIN_LEVEL";
    pub const LOGGING_INCLUDE_REQUEST_CONTEXT: &str = "ODATA_LOGGING_INCLUDE_REQUEST_CONTEXT";
}
