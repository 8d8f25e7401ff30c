//! Lexer for query option values and key predicates
//!
//! Input is already percent-decoded. The lexer recognizes the literal forms that
//! cannot be told apart after tokenization (GUIDs, dates, times, typed strings)
//! and tracks parenthesis balance so nested option text can be sliced safely.

use super::token::Token;
use super::token_stream::{SpannedToken, TokenStream};
use crate::config::compile_time::lexical::{
    MAX_IDENTIFIER_LENGTH, MAX_STRING_SIZE, MAX_TOKEN_COUNT,
};
use crate::logging::codes;
use crate::utils::{Position, Span, Spanned};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LexerError {
    #[error("Invalid character '{character}' at {position}")]
    InvalidCharacter { character: char, position: Position },

    #[error("Unterminated string literal starting at {position}")]
    UnterminatedString { position: Position },

    #[error("Invalid numeric literal '{text}' at {position}")]
    InvalidNumber { text: String, position: Position },

    #[error("Unbalanced parentheses at {position}")]
    UnbalancedBrackets { position: Position },

    #[error("Identifier too long: {length} characters (max {MAX_IDENTIFIER_LENGTH})")]
    IdentifierTooLong { length: usize },

    #[error("String too large: {size} bytes (max {MAX_STRING_SIZE})")]
    StringTooLarge { size: usize },

    #[error("Too many tokens: {count} (max {MAX_TOKEN_COUNT})")]
    TooManyTokens { count: usize },
}

impl LexerError {
    pub fn error_code(&self) -> crate::logging::Code {
        match self {
            LexerError::InvalidCharacter { .. } => codes::lexical::INVALID_CHARACTER,
            LexerError::UnterminatedString { .. } => codes::lexical::UNTERMINATED_STRING,
            LexerError::InvalidNumber { .. } => codes::lexical::INVALID_NUMBER,
            LexerError::UnbalancedBrackets { .. } => codes::lexical::UNBALANCED_BRACKETS,
            LexerError::IdentifierTooLong { .. } => codes::lexical::IDENTIFIER_TOO_LONG,
            LexerError::StringTooLarge { .. } => codes::lexical::STRING_TOO_LARGE,
            LexerError::TooManyTokens { .. } => codes::lexical::TOO_MANY_TOKENS,
        }
    }
}

const GUID_PATTERN: &str = "hhhhhhhh-hhhh-hhhh-hhhh-hhhhhhhhhhhh";
const DATE_PATTERN: &str = "dddd-dd-dd";
const TIME_PATTERN: &str = "dd:dd";

/// `d` matches a decimal digit, `h` a hex digit, anything else itself
fn matches_pattern(text: &str, pattern: &str) -> bool {
    let mut chars = text.chars();
    pattern.chars().all(|p| match chars.next() {
        Some(c) => match p {
            'd' => c.is_ascii_digit(),
            'h' => c.is_ascii_hexdigit(),
            _ => c == p,
        },
        None => false,
    })
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

pub struct Lexer<'a> {
    input: &'a str,
    pos: Position,
    tokens: Vec<SpannedToken>,
    depth: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: Position::start(),
            tokens: Vec::new(),
            depth: 0,
        }
    }

    pub fn tokenize(mut self) -> Result<TokenStream, LexerError> {
        while let Some(ch) = self.peek_char() {
            let start = self.pos;
            let token = match ch {
                ' ' | '\t' => {
                    self.consume_while(|c| c == ' ' || c == '\t');
                    Token::Whitespace
                }
                '(' => {
                    self.bump();
                    self.depth += 1;
                    Token::OpenParen
                }
                ')' => {
                    if self.depth == 0 {
                        return Err(LexerError::UnbalancedBrackets { position: start });
                    }
                    self.depth -= 1;
                    self.bump();
                    Token::CloseParen
                }
                ',' => self.single(Token::Comma),
                '/' => self.single(Token::Slash),
                ';' => self.single(Token::Semicolon),
                '=' => self.single(Token::Equals),
                '*' => self.single(Token::Star),
                ':' => self.single(Token::Colon),
                '\'' => Token::StringLiteral(self.lex_quoted()?),
                '$' | '@' => self.lex_prefixed(ch)?,
                '-' => {
                    if self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) {
                        self.bump();
                        match self.lex_number()? {
                            Token::Number(text) => Token::Number(format!("-{}", text)),
                            other => other,
                        }
                    } else {
                        self.single(Token::Minus)
                    }
                }
                c if c.is_ascii_digit() => self.lex_numeric_like()?,
                c if is_identifier_start(c) => self.lex_word()?,
                other => {
                    return Err(LexerError::InvalidCharacter {
                        character: other,
                        position: start,
                    })
                }
            };
            self.push(token, start)?;
        }

        if self.depth > 0 {
            return Err(LexerError::UnbalancedBrackets { position: self.pos });
        }

        let end = self.pos;
        self.tokens.push(Spanned::new(Token::Eof, Span::point(end)));

        crate::log_debug!("Tokenized option text",
            "tokens" => self.tokens.len(),
            "length" => self.input.len()
        );
        Ok(TokenStream::new(self.input, self.tokens))
    }

    fn rest(&self) -> &'a str {
        self.input.get(self.pos.offset..).unwrap_or("")
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.pos = self.pos.advance(ch);
        Some(ch)
    }

    fn bump_n(&mut self, n: usize) {
        for _ in 0..n {
            self.bump();
        }
    }

    fn single(&mut self, token: Token) -> Token {
        self.bump();
        token
    }

    fn consume_while<F: Fn(char) -> bool>(&mut self, predicate: F) -> &'a str {
        let start = self.pos.offset;
        while let Some(ch) = self.peek_char() {
            if !predicate(ch) {
                break;
            }
            self.bump();
        }
        self.input.get(start..self.pos.offset).unwrap_or("")
    }

    fn push(&mut self, token: Token, start: Position) -> Result<(), LexerError> {
        if self.tokens.len() >= MAX_TOKEN_COUNT {
            return Err(LexerError::TooManyTokens {
                count: self.tokens.len() + 1,
            });
        }
        self.tokens
            .push(Spanned::new(token, Span::new(start, self.pos)));
        Ok(())
    }

    /// Quoted text with `''` as the escaped quote; the opening quote is current
    fn lex_quoted(&mut self) -> Result<String, LexerError> {
        let start = self.pos;
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(LexerError::UnterminatedString { position: start }),
                Some('\'') => {
                    if self.peek_char() == Some('\'') {
                        self.bump();
                        value.push('\'');
                    } else {
                        break;
                    }
                }
                Some(c) => value.push(c),
            }
            if value.len() > MAX_STRING_SIZE {
                return Err(LexerError::StringTooLarge { size: value.len() });
            }
        }
        Ok(value)
    }

    fn lex_prefixed(&mut self, prefix: char) -> Result<Token, LexerError> {
        let start = self.pos;
        self.bump();
        let word = self.consume_while(is_identifier_char);
        if word.is_empty() {
            return Err(LexerError::InvalidCharacter {
                character: prefix,
                position: start,
            });
        }
        self.check_identifier_length(word)?;
        Ok(if prefix == '$' {
            Token::SystemToken(format!("${}", word))
        } else {
            Token::ParameterAlias(word.to_string())
        })
    }

    fn lex_numeric_like(&mut self) -> Result<Token, LexerError> {
        let rest = self.rest();
        if let Some(guid) = self.try_guid() {
            return Ok(guid);
        }
        if matches_pattern(rest, DATE_PATTERN) {
            let date_len = DATE_PATTERN.len();
            if rest[date_len..].starts_with('T') {
                let text = self.consume_while(|c| {
                    c.is_ascii_digit() || matches!(c, ':' | '.' | 'T' | 'Z' | '+' | '-')
                });
                return Ok(Token::DateTimeOffset(text.to_string()));
            }
            self.bump_n(date_len);
            return Ok(Token::Date(rest[..date_len].to_string()));
        }
        if matches_pattern(rest, TIME_PATTERN) {
            let text = self.consume_while(|c| c.is_ascii_digit() || c == ':' || c == '.');
            return Ok(Token::TimeOfDay(text.to_string()));
        }
        self.lex_number()
    }

    fn lex_number(&mut self) -> Result<Token, LexerError> {
        let start = self.pos;
        let begin = start.offset;
        self.consume_while(|c| c.is_ascii_digit());

        if self.peek_char() == Some('.') && self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            self.consume_while(|c| c.is_ascii_digit());
        }

        if matches!(self.peek_char(), Some('e') | Some('E')) {
            let exponent_digit = match self.peek_nth(1) {
                Some('+') | Some('-') => self.peek_nth(2),
                other => other,
            };
            if exponent_digit.is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
                if matches!(self.peek_char(), Some('+') | Some('-')) {
                    self.bump();
                }
                self.consume_while(|c| c.is_ascii_digit());
            }
        }

        if self.peek_char().is_some_and(is_identifier_char) {
            self.consume_while(is_identifier_char);
            let text = self.input.get(begin..self.pos.offset).unwrap_or("");
            return Err(LexerError::InvalidNumber {
                text: text.to_string(),
                position: start,
            });
        }

        let text = self.input.get(begin..self.pos.offset).unwrap_or("");
        Ok(Token::Number(text.to_string()))
    }

    fn try_guid(&mut self) -> Option<Token> {
        let rest = self.rest();
        if !matches_pattern(rest, GUID_PATTERN) {
            return None;
        }
        let len = GUID_PATTERN.len();
        if rest[len..].chars().next().is_some_and(is_identifier_char) {
            return None;
        }
        self.bump_n(len);
        Some(Token::Guid(rest[..len].to_string()))
    }

    /// Identifier, dotted qualified name, namespace wildcard or typed string
    fn lex_word(&mut self) -> Result<Token, LexerError> {
        if let Some(guid) = self.try_guid() {
            return Ok(guid);
        }

        let begin = self.pos.offset;
        self.consume_while(is_identifier_char);
        loop {
            if self.peek_char() != Some('.') {
                break;
            }
            match self.peek_nth(1) {
                Some(c) if is_identifier_start(c) => {
                    self.bump();
                    self.consume_while(is_identifier_char);
                }
                Some('*') => {
                    let namespace = self.input.get(begin..self.pos.offset).unwrap_or("");
                    self.bump_n(2);
                    return Ok(Token::NamespaceWildcard(namespace.to_string()));
                }
                _ => break,
            }
        }

        let word = self.input.get(begin..self.pos.offset).unwrap_or("");
        self.check_identifier_length(word)?;

        if self.peek_char() == Some('\'') {
            let value = self.lex_quoted()?;
            return Ok(Token::TypedString {
                prefix: word.to_string(),
                value,
            });
        }
        Ok(Token::Identifier(word.to_string()))
    }

    fn check_identifier_length(&self, word: &str) -> Result<(), LexerError> {
        let length = word.chars().count();
        if length > MAX_IDENTIFIER_LENGTH {
            return Err(LexerError::IdentifierTooLong { length });
        }
        Ok(())
    }
}
