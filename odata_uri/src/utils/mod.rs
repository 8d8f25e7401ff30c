//! Shared primitive types for option-text parsing

pub mod span;

pub use span::{format_excerpt, Position, Span, Spanned};
