//! Tokenization of query option text
//!
//! Every clause parser (`$select`, `$expand`, `$apply`, `$compute`, key
//! predicates and function parameters) works on a [`TokenStream`] produced here.
//! The stream keeps whitespace tokens so spans stay exact, but navigation only
//! visits significant tokens.

pub mod lexer;
pub mod token;
pub mod token_stream;

pub use lexer::{Lexer, LexerError};
pub use token::Token;
pub use token_stream::{SpannedToken, TokenStream, TokenStreamError};

/// Tokenize percent-decoded option text
pub fn tokenize(input: &str) -> Result<TokenStream, LexerError> {
    Lexer::new(input).tokenize().map_err(|e| {
        crate::log_error!(e.error_code(), "Tokenization failed",
            "error" => e,
            "input" => input
        );
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_yields_eof() {
        let stream = tokenize("").unwrap();
        assert!(stream.is_at_end());
        assert_eq!(stream.significant_tokens().count(), 1);
    }

    #[test]
    fn test_error_code_propagates() {
        let err = tokenize("a(b").unwrap_err();
        assert_eq!(
            err.error_code(),
            crate::logging::codes::lexical::UNBALANCED_BRACKETS
        );
    }
}
