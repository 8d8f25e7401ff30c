//! Global logging for URI resolution
//!
//! Logging is optional. Until `init_global_logging` is called every macro is a
//! no-op, so the library can be embedded without any logging setup. While a URI
//! is being parsed, a thread-local request context is stamped onto each event.

pub mod codes;
pub mod config;
pub mod events;
pub mod macros;
pub mod service;

use std::cell::RefCell;
use std::sync::{Arc, OnceLock};

pub use codes::Code;
pub use events::{LogEvent, LogLevel};
pub use service::{ConsoleLogger, Logger, LoggingService, MemoryLogger, StructuredLogger};

// ============================================================================
// GLOBAL STATE
// ============================================================================

static GLOBAL_LOGGER: OnceLock<Arc<LoggingService>> = OnceLock::new();

thread_local! {
    static REQUEST_CONTEXT: RefCell<Option<RequestContext>> = const { RefCell::new(None) };
}

/// The request whose URI is currently being resolved on this thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_uri: String,
    pub request_id: uuid::Uuid,
}

impl RequestContext {
    pub fn new(request_uri: &str) -> Self {
        Self {
            request_uri: request_uri.to_string(),
            request_id: uuid::Uuid::new_v4(),
        }
    }
}

// ============================================================================
// INITIALIZATION
// ============================================================================

/// Initialize global logging from the installed preferences
pub fn init_global_logging() -> Result<(), String> {
    config::validate_config().map_err(|e| format!("Configuration validation failed: {}", e))?;

    let logging_service = Arc::new(service::create_configured_service());

    GLOBAL_LOGGER
        .set(logging_service.clone())
        .map_err(|_| "Global logger already initialized")?;

    for code in [
        codes::path::CANNOT_QUERY_COLLECTIONS,
        codes::context_url::SOURCE_OR_TYPE_MISSING,
        codes::validation::TYPE_NOT_ALLOWED_BY_CONSTRAINT,
    ] {
        if codes::get_error_metadata(code.as_str()).is_none() {
            return Err(format!("Missing metadata for message key: {}", code));
        }
    }

    logging_service.log_event(LogEvent::success(
        codes::success::SYSTEM_INITIALIZATION_COMPLETED,
        "Global logging system initialized",
    ));

    Ok(())
}

/// Initialize with a custom service (tests, embedding applications)
pub fn init_global_logging_with_service(service: Arc<LoggingService>) -> Result<(), String> {
    GLOBAL_LOGGER
        .set(service)
        .map_err(|_| "Global logger already initialized".to_string())
}

pub fn is_initialized() -> bool {
    GLOBAL_LOGGER.get().is_some()
}

pub fn try_get_global_logger() -> Option<&'static LoggingService> {
    GLOBAL_LOGGER.get().map(|service| service.as_ref())
}

/// Whether a debug event would reach a logger
pub fn debug_enabled() -> bool {
    try_get_global_logger()
        .map(|logger| logger.should_log(LogLevel::Debug))
        .unwrap_or(false)
}

// ============================================================================
// REQUEST CONTEXT MANAGEMENT
// ============================================================================

pub fn set_request_context(context: RequestContext) {
    REQUEST_CONTEXT.with(|ctx| {
        *ctx.borrow_mut() = Some(context);
    });
}

pub fn clear_request_context() {
    REQUEST_CONTEXT.with(|ctx| {
        *ctx.borrow_mut() = None;
    });
}

pub fn get_current_request_context() -> Option<RequestContext> {
    REQUEST_CONTEXT.with(|ctx| ctx.borrow().clone())
}

/// Run `f` with a request context, restoring the previous one afterwards
pub fn with_request_context<F, R>(request_uri: &str, f: F) -> R
where
    F: FnOnce() -> R,
{
    let previous = get_current_request_context();
    set_request_context(RequestContext::new(request_uri));
    let result = f();
    match previous {
        Some(context) => set_request_context(context),
        None => clear_request_context(),
    }
    result
}

// ============================================================================
// MACRO SUPPORT FUNCTIONS
// ============================================================================

fn stamp_request_context(event: LogEvent) -> LogEvent {
    if !config::include_request_context() {
        return event;
    }
    match get_current_request_context() {
        Some(ctx) => event
            .with_context("request_uri", &ctx.request_uri)
            .with_context("request_id", &ctx.request_id.to_string()),
        None => event,
    }
}

/// Send an event to the global logger, if any
pub fn dispatch(event: LogEvent) {
    if let Some(logger) = try_get_global_logger() {
        logger.log_event(stamp_request_context(event));
    }
}

pub fn log_error_with_context(
    code: Code,
    message: &str,
    span: Option<crate::utils::Span>,
    context: Vec<(&str, &str)>,
) {
    let mut event = LogEvent::error(code, message);

    if let Some(s) = span {
        event = event.with_span(s);
    }

    for (key, value) in context {
        event = event.with_context(key, value);
    }

    dispatch(event);
}

pub fn log_success_with_context(code: Code, message: &str, context: Vec<(&str, &str)>) {
    let mut event = LogEvent::success(code, message);

    for (key, value) in context {
        event = event.with_context(key, value);
    }

    dispatch(event);
}

pub fn log_info_with_context(message: &str, context: Vec<(&str, &str)>) {
    let mut event = LogEvent::info(message);

    for (key, value) in context {
        event = event.with_context(key, value);
    }

    dispatch(event);
}

/// Error logging that falls back to stderr when no logger is installed
pub fn safe_log_error(code: Code, message: &str) {
    if let Some(logger) = try_get_global_logger() {
        logger.log_event(stamp_request_context(LogEvent::error(code, message)));
    } else {
        eprintln!("[ERROR] FALLBACK: [{}] {}", code.as_str(), message);
    }
}

pub fn get_system_diagnostics() -> String {
    let mut diagnostics = String::new();

    diagnostics.push_str("=== Logging System Diagnostics ===\n");
    diagnostics.push_str(&format!("Initialized: {}\n", is_initialized()));
    if let Some(logger) = try_get_global_logger() {
        diagnostics.push_str(&format!("Active level: {}\n", logger.min_level().as_str()));
    }
    diagnostics.push('\n');
    diagnostics.push_str(&config::get_config_summary());

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_context_management() {
        assert!(get_current_request_context().is_none());

        set_request_context(RequestContext::new("http://host/svc/Cities"));
        let context = get_current_request_context().unwrap();
        assert_eq!(context.request_uri, "http://host/svc/Cities");

        clear_request_context();
        assert!(get_current_request_context().is_none());
    }

    #[test]
    fn test_with_request_context_restores_previous() {
        let result = with_request_context("Cities(1)", || {
            let inner = with_request_context("Cities(2)", || {
                get_current_request_context().unwrap().request_uri
            });
            assert_eq!(inner, "Cities(2)");
            get_current_request_context().unwrap().request_uri
        });

        assert_eq!(result, "Cities(1)");
        assert!(get_current_request_context().is_none());
    }

    #[test]
    fn test_safe_logging() {
        safe_log_error(codes::system::INTERNAL_ERROR, "Test error");
    }

    #[test]
    fn test_diagnostics() {
        let diagnostics = get_system_diagnostics();
        assert!(diagnostics.contains("Logging System Diagnostics"));
        assert!(diagnostics.contains("Initialized:"));
    }
}
