//! Logging configuration: compile-time bounds plus runtime preferences
//!
//! Buffer sizes and message length come from the generated constants and cannot
//! be changed at run time. Verbosity and output format are user preferences.

use crate::config::compile_time::logging::*;
use crate::config::runtime::LoggingPreferences;
use std::sync::OnceLock;

type EventsLogLevel = crate::logging::events::LogLevel;

static RUNTIME_PREFERENCES: OnceLock<LoggingPreferences> = OnceLock::new();

/// Preferences read from the environment on first use
pub fn get_runtime_preferences() -> LoggingPreferences {
    RUNTIME_PREFERENCES
        .get_or_init(LoggingPreferences::default)
        .clone()
}

/// Effective minimum level. The compiled security level is a floor on verbosity.
pub fn get_min_log_level() -> EventsLogLevel {
    effective_min_level(&get_runtime_preferences())
}

pub fn effective_min_level(preferences: &LoggingPreferences) -> EventsLogLevel {
    let user_level = preferences.min_log_level.to_events_log_level();
    let floor = get_security_log_level();
    if user_level < floor {
        floor
    } else {
        user_level
    }
}

pub fn include_request_context() -> bool {
    get_runtime_preferences().include_request_context
}

/// Lowest verbosity the logger may be configured with
pub fn get_security_log_level() -> EventsLogLevel {
    match SECURITY_MIN_LOG_LEVEL {
        0 => EventsLogLevel::Error,
        1 => EventsLogLevel::Warning,
        _ => EventsLogLevel::Info,
    }
}

pub fn get_error_buffer_size() -> usize {
    LOG_BUFFER_SIZE
}

pub fn get_max_log_message_length() -> usize {
    MAX_LOG_MESSAGE_LENGTH
}

pub fn validate_config() -> Result<(), String> {
    if LOG_BUFFER_SIZE > 100_000 {
        return Err(format!("Log buffer size too large: {}", LOG_BUFFER_SIZE));
    }

    if LOG_BUFFER_SIZE < 100 {
        return Err(format!("Log buffer size too small: {}", LOG_BUFFER_SIZE));
    }

    if MAX_LOG_MESSAGE_LENGTH < 64 {
        return Err(format!(
            "Max log message length too small: {}",
            MAX_LOG_MESSAGE_LENGTH
        ));
    }

    Ok(())
}

pub fn get_config_summary() -> String {
    let preferences = get_runtime_preferences();

    format!(
        "Logging Configuration:\n\
         === Compile-time ===\n\
         - Log buffer size: {}\n\
         - Max message length: {}\n\
         - Security min level: {}\n\
         === Runtime ===\n\
         - Min log level: {:?}\n\
         - Structured logging: {}\n\
         - Console logging: {}\n\
         - Include request context: {}",
        LOG_BUFFER_SIZE,
        MAX_LOG_MESSAGE_LENGTH,
        SECURITY_MIN_LOG_LEVEL,
        preferences.min_log_level,
        preferences.use_structured_logging,
        preferences.enable_console_logging,
        preferences.include_request_context,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_generated_config() {
        assert!(validate_config().is_ok());
    }

    #[test]
    fn test_min_level_respects_security_floor() {
        assert!(get_min_log_level() >= get_security_log_level());
    }

    #[test]
    fn test_config_summary() {
        let summary = get_config_summary();
        assert!(summary.contains("Log buffer size"));
        assert!(summary.contains("Include request context"));
    }
}
