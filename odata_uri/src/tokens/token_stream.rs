//! Span-accurate token stream with lookahead over significant tokens

use super::token::Token;
use crate::logging::codes;
use crate::utils::{Span, Spanned};

/// A token with span information
pub type SpannedToken = Spanned<Token>;

static EOF_TOKEN: Token = Token::Eof;

/// Parse failure raised while consuming a token stream
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TokenStreamError {
    #[error("Syntax error at {span}: expected {expected}, found '{found}'")]
    Unexpected {
        expected: String,
        found: String,
        span: Span,
    },
}

impl TokenStreamError {
    pub fn error_code(&self) -> crate::logging::Code {
        codes::lexical::SYNTAX_ERROR
    }

    pub fn span(&self) -> Span {
        match self {
            TokenStreamError::Unexpected { span, .. } => *span,
        }
    }
}

/// Token stream that keeps whitespace for span accuracy but navigates
/// only significant tokens. The stream always ends with `Token::Eof`.
#[derive(Debug, Clone)]
pub struct TokenStream {
    source: String,
    /// All tokens (including whitespace) with original spans
    all_tokens: Vec<SpannedToken>,
    /// Indices into all_tokens for significant tokens
    significant_indices: Vec<usize>,
    /// Current position in significant_indices
    position: usize,
}

impl TokenStream {
    pub fn new(source: &str, tokens: Vec<SpannedToken>) -> Self {
        let significant_indices = tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| t.value.is_significant())
            .map(|(i, _)| i)
            .collect();
        Self {
            source: source.to_string(),
            all_tokens: tokens,
            significant_indices,
            position: 0,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Original text covered by a span
    pub fn slice(&self, span: Span) -> &str {
        span.slice(&self.source)
    }

    // === NAVIGATION ===

    pub fn current(&self) -> Option<&SpannedToken> {
        self.peek_ahead(0)
    }

    /// Current token, `Eof` once the stream is exhausted
    pub fn current_token(&self) -> &Token {
        self.current().map(|t| &t.value).unwrap_or(&EOF_TOKEN)
    }

    pub fn current_span(&self) -> Span {
        self.current()
            .map(|t| t.span)
            .or_else(|| self.all_tokens.last().map(|t| t.span))
            .unwrap_or_else(Span::dummy)
    }

    pub fn peek(&self) -> Option<&SpannedToken> {
        self.peek_ahead(1)
    }

    pub fn peek_token(&self) -> &Token {
        self.peek().map(|t| &t.value).unwrap_or(&EOF_TOKEN)
    }

    pub fn peek_ahead(&self, n: usize) -> Option<&SpannedToken> {
        self.significant_indices
            .get(self.position + n)
            .and_then(|&original_index| self.all_tokens.get(original_index))
    }

    /// Advance and return the token that was current
    pub fn advance(&mut self) -> Option<&SpannedToken> {
        let index = *self.significant_indices.get(self.position)?;
        if !matches!(self.all_tokens[index].value, Token::Eof) {
            self.position += 1;
        }
        self.all_tokens.get(index)
    }

    pub fn is_at_end(&self) -> bool {
        matches!(self.current_token(), Token::Eof)
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Restore a position previously returned by [`position`](Self::position)
    pub fn reset_to(&mut self, position: usize) {
        self.position = position.min(self.significant_indices.len());
    }

    /// True when whitespace separates the current token from the previous one
    pub fn preceded_by_whitespace(&self) -> bool {
        let Some(&index) = self.significant_indices.get(self.position) else {
            return false;
        };
        index > 0 && matches!(self.all_tokens[index - 1].value, Token::Whitespace)
    }

    pub fn significant_tokens(&self) -> impl Iterator<Item = &Token> {
        self.significant_indices
            .iter()
            .filter_map(|&i| self.all_tokens.get(i))
            .map(|t| &t.value)
    }

    // === MATCHING ===

    pub fn check(&self, token: &Token) -> bool {
        self.current_token() == token
    }

    pub fn check_keyword(&self, keyword: &str) -> bool {
        self.current_token().is_keyword(keyword)
    }

    pub fn consume_if(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn consume_keyword(&mut self, keyword: &str) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, token: &Token) -> Result<Span, TokenStreamError> {
        if self.check(token) {
            let span = self.current_span();
            self.advance();
            Ok(span)
        } else {
            Err(self.unexpected(&format!("'{}'", token)))
        }
    }

    pub fn expect_keyword(&mut self, keyword: &str) -> Result<Span, TokenStreamError> {
        if self.check_keyword(keyword) {
            let span = self.current_span();
            self.advance();
            Ok(span)
        } else {
            Err(self.unexpected(&format!("'{}'", keyword)))
        }
    }

    pub fn expect_identifier(&mut self) -> Result<Spanned<String>, TokenStreamError> {
        match self.current_token() {
            Token::Identifier(name) => {
                let result = Spanned::new(name.clone(), self.current_span());
                self.advance();
                Ok(result)
            }
            _ => Err(self.unexpected("an identifier")),
        }
    }

    pub fn expect_end(&self) -> Result<(), TokenStreamError> {
        if self.is_at_end() {
            Ok(())
        } else {
            Err(self.unexpected("end of input"))
        }
    }

    /// Error describing the current token as unexpected
    pub fn unexpected(&self, expected: &str) -> TokenStreamError {
        TokenStreamError::Unexpected {
            expected: expected.to_string(),
            found: self.current_token().to_string(),
            span: self.current_span(),
        }
    }

    /// Skip a balanced parenthesized group; the current token must be `(`.
    /// Returns the text between the parentheses.
    pub fn skip_group(&mut self) -> Result<String, TokenStreamError> {
        let open = self.expect(&Token::OpenParen)?;
        let mut depth = 1usize;
        let mut close = open;
        while depth > 0 {
            match self.current_token() {
                Token::OpenParen => depth += 1,
                Token::CloseParen => depth -= 1,
                Token::Eof => return Err(self.unexpected("')'")),
                _ => {}
            }
            close = self.current_span();
            self.advance();
        }
        let inner = Span::new(open.end(), close.start());
        Ok(self.slice(inner).to_string())
    }
}

#[cfg(test)]
mod tests {
    use crate::tokens::{tokenize, Token};

    #[test]
    fn test_navigation_skips_whitespace() {
        let mut stream = tokenize("Price  gt 5").unwrap();
        assert!(stream.check_keyword("Price"));
        stream.advance();
        assert!(stream.preceded_by_whitespace());
        assert!(stream.consume_keyword("gt"));
        assert_eq!(stream.current_token(), &Token::Number("5".into()));
        stream.advance();
        assert!(stream.is_at_end());
        stream.advance();
        assert!(stream.is_at_end());
    }

    #[test]
    fn test_expect_reports_found_token() {
        let mut stream = tokenize("Name,").unwrap();
        stream.advance();
        let err = stream.expect(&Token::Slash).unwrap_err();
        assert!(err.to_string().contains("found ','"));
        assert_eq!(err.span().start.column, 5);
    }

    #[test]
    fn test_skip_group_returns_inner_text() {
        let mut stream = tokenize("filter(Price gt (1 add 2)),x").unwrap();
        stream.advance();
        let inner = stream.skip_group().unwrap();
        assert_eq!(inner, "Price gt (1 add 2)");
        assert!(stream.check(&Token::Comma));
    }

    #[test]
    fn test_position_reset() {
        let mut stream = tokenize("a/b").unwrap();
        let mark = stream.position();
        stream.advance();
        stream.advance();
        stream.reset_to(mark);
        assert!(stream.check_keyword("a"));
    }
}
