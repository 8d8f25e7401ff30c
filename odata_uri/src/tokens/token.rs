//! Token kinds produced from query option text and key predicates

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Token {
    /// Simple or dotted name: `Name`, `NS.City`, `eq`, `true`
    Identifier(String),
    /// `NS.*`, carrying the namespace
    NamespaceWildcard(String),
    /// `$`-prefixed word such as `$count`, `$ref`, `$it`
    SystemToken(String),
    /// `@name`, stored without the `@`
    ParameterAlias(String),
    /// Quoted string with `''` already unescaped
    StringLiteral(String),
    /// Integer or decimal text, including a leading `-`
    Number(String),
    Guid(String),
    Date(String),
    DateTimeOffset(String),
    TimeOfDay(String),
    /// `prefix'value'` such as `duration'P1D'` or `NS.Color'Red'`
    TypedString { prefix: String, value: String },

    OpenParen,
    CloseParen,
    Comma,
    Slash,
    Semicolon,
    Equals,
    Star,
    Colon,
    Minus,

    Whitespace,
    Eof,
}

impl Token {
    /// Whitespace is kept in the stream for span accuracy but skipped by parsers
    pub fn is_significant(&self) -> bool {
        !matches!(self, Token::Whitespace)
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Token::StringLiteral(_)
                | Token::Number(_)
                | Token::Guid(_)
                | Token::Date(_)
                | Token::DateTimeOffset(_)
                | Token::TimeOfDay(_)
                | Token::TypedString { .. }
        )
    }

    pub fn identifier(&self) -> Option<&str> {
        match self {
            Token::Identifier(name) => Some(name),
            _ => None,
        }
    }

    /// Case-sensitive keyword match against an identifier token
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.identifier() == Some(keyword)
    }

    pub fn is_system_token(&self, name: &str) -> bool {
        matches!(self, Token::SystemToken(t) if t == name)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Identifier(name) => write!(f, "{}", name),
            Token::NamespaceWildcard(ns) => write!(f, "{}.*", ns),
            Token::SystemToken(name) => write!(f, "{}", name),
            Token::ParameterAlias(name) => write!(f, "@{}", name),
            Token::StringLiteral(value) => write!(f, "'{}'", value.replace('\'', "''")),
            Token::Number(text)
            | Token::Guid(text)
            | Token::Date(text)
            | Token::DateTimeOffset(text)
            | Token::TimeOfDay(text) => write!(f, "{}", text),
            Token::TypedString { prefix, value } => {
                write!(f, "{}'{}'", prefix, value.replace('\'', "''"))
            }
            Token::OpenParen => write!(f, "("),
            Token::CloseParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Slash => write!(f, "/"),
            Token::Semicolon => write!(f, ";"),
            Token::Equals => write!(f, "="),
            Token::Star => write!(f, "*"),
            Token::Colon => write!(f, ":"),
            Token::Minus => write!(f, "-"),
            Token::Whitespace => write!(f, " "),
            Token::Eof => write!(f, "end of input"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_reescapes_quotes() {
        assert_eq!(Token::StringLiteral("O'Neil".into()).to_string(), "'O''Neil'");
        assert_eq!(
            Token::TypedString {
                prefix: "NS.Color".into(),
                value: "Red".into()
            }
            .to_string(),
            "NS.Color'Red'"
        );
    }

    #[test]
    fn test_keyword_matching_is_case_sensitive() {
        let token = Token::Identifier("with".into());
        assert!(token.is_keyword("with"));
        assert!(!token.is_keyword("WITH"));
        assert!(!Token::Whitespace.is_significant());
    }
}
