//! URI literal values: recognition from tokens, type inference and coercion

use crate::logging::codes;
use crate::model::{ModelAccessor, PrimitiveKind, TypeKind, TypeRef};
use crate::tokens::{self, Token};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LiteralError {
    #[error("Unrecognized literal '{text}'")]
    Unrecognized { text: String },

    #[error("Literal '{literal}' is not compatible with type '{expected}'")]
    TypeVerificationFailure { literal: String, expected: String },
}

impl LiteralError {
    pub fn error_code(&self) -> crate::logging::Code {
        match self {
            LiteralError::Unrecognized { .. } => codes::literal::UNRECOGNIZED_LITERAL,
            LiteralError::TypeVerificationFailure { .. } => {
                codes::literal::TYPE_VERIFICATION_FAILURE
            }
        }
    }

    fn unrecognized(text: impl Into<String>) -> Self {
        Self::Unrecognized { text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LiteralValue {
    Null,
    Boolean(bool),
    Int(i64),
    /// Kept as text to avoid precision loss
    Decimal(String),
    Double(f64),
    String(String),
    Guid(Uuid),
    Date(NaiveDate),
    DateTimeOffset(DateTime<FixedOffset>),
    TimeOfDay(NaiveTime),
    /// ISO 8601 duration text such as `P1DT2H`
    Duration(String),
    /// base64url payload of `binary'...'`
    Binary(String),
    Enum { type_name: String, member: String },
    /// `@name`, resolved later against the parameter alias table
    ParameterAlias(String),
}

impl LiteralValue {
    /// Recognize a literal token. Returns `Ok(None)` for tokens that are not literals.
    pub fn from_token(token: &Token) -> Result<Option<Self>, LiteralError> {
        let value = match token {
            Token::Identifier(word) => match word.as_str() {
                "null" => LiteralValue::Null,
                "true" => LiteralValue::Boolean(true),
                "false" => LiteralValue::Boolean(false),
                "INF" => LiteralValue::Double(f64::INFINITY),
                "NaN" => LiteralValue::Double(f64::NAN),
                _ => return Ok(None),
            },
            Token::StringLiteral(s) => LiteralValue::String(s.clone()),
            Token::Number(text) => parse_number(text)?,
            Token::Guid(text) => LiteralValue::Guid(
                Uuid::parse_str(text).map_err(|_| LiteralError::unrecognized(text.as_str()))?,
            ),
            Token::Date(text) => LiteralValue::Date(
                NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .map_err(|_| LiteralError::unrecognized(text.as_str()))?,
            ),
            Token::DateTimeOffset(text) => LiteralValue::DateTimeOffset(
                DateTime::parse_from_rfc3339(text)
                    .map_err(|_| LiteralError::unrecognized(text.as_str()))?,
            ),
            Token::TimeOfDay(text) => LiteralValue::TimeOfDay(parse_time(text)?),
            Token::TypedString { prefix, value } => parse_typed_string(prefix, value)?,
            Token::ParameterAlias(name) => LiteralValue::ParameterAlias(name.clone()),
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    /// The type a literal has on its own, before coercion
    pub fn inferred_type(&self) -> Option<TypeRef> {
        let kind = match self {
            LiteralValue::Null | LiteralValue::ParameterAlias(_) => return None,
            LiteralValue::Boolean(_) => PrimitiveKind::Boolean,
            LiteralValue::Int(v) => {
                if i32::try_from(*v).is_ok() {
                    PrimitiveKind::Int32
                } else {
                    PrimitiveKind::Int64
                }
            }
            LiteralValue::Decimal(_) => PrimitiveKind::Decimal,
            LiteralValue::Double(_) => PrimitiveKind::Double,
            LiteralValue::String(_) => PrimitiveKind::String,
            LiteralValue::Guid(_) => PrimitiveKind::Guid,
            LiteralValue::Date(_) => PrimitiveKind::Date,
            LiteralValue::DateTimeOffset(_) => PrimitiveKind::DateTimeOffset,
            LiteralValue::TimeOfDay(_) => PrimitiveKind::TimeOfDay,
            LiteralValue::Duration(_) => PrimitiveKind::Duration,
            LiteralValue::Binary(_) => PrimitiveKind::Binary,
            LiteralValue::Enum { type_name, .. } => return Some(TypeRef::enumeration(type_name)),
        };
        Some(TypeRef::primitive(kind))
    }

    /// Convert to the representation `target` requires, or fail type verification
    pub fn coerce(
        self,
        target: &TypeRef,
        model: &dyn ModelAccessor,
    ) -> Result<LiteralValue, LiteralError> {
        if matches!(self, LiteralValue::Null | LiteralValue::ParameterAlias(_)) {
            return Ok(self);
        }
        let mismatch = |value: &LiteralValue| LiteralError::TypeVerificationFailure {
            literal: value.to_string(),
            expected: target.full_name(),
        };

        match &target.kind {
            TypeKind::Primitive(kind) => coerce_primitive(self, *kind).map_err(|v| mismatch(&v)),
            TypeKind::Enum(enum_name) => {
                let Some(enum_type) = model.find_enum_type(enum_name) else {
                    return Err(mismatch(&self));
                };
                let member = match &self {
                    LiteralValue::Enum { type_name, member } if type_name == enum_name => member,
                    LiteralValue::String(member) => member,
                    _ => return Err(mismatch(&self)),
                };
                if enum_type.members.iter().any(|m| m == member) {
                    Ok(LiteralValue::Enum {
                        type_name: enum_name.clone(),
                        member: member.clone(),
                    })
                } else {
                    Err(mismatch(&self))
                }
            }
            TypeKind::Complex(_) | TypeKind::Entity(_) => Err(mismatch(&self)),
        }
    }
}

/// Returns the original value on mismatch so the caller can report it
fn coerce_primitive(value: LiteralValue, kind: PrimitiveKind) -> Result<LiteralValue, LiteralValue> {
    use LiteralValue as L;
    use PrimitiveKind as P;

    match (value, kind) {
        (v, P::Untyped) => Ok(v),
        (L::Int(v), k) if k.is_integral() => {
            let fits = match k {
                P::Byte => u8::try_from(v).is_ok(),
                P::SByte => i8::try_from(v).is_ok(),
                P::Int16 => i16::try_from(v).is_ok(),
                P::Int32 => i32::try_from(v).is_ok(),
                _ => true,
            };
            if fits {
                Ok(L::Int(v))
            } else {
                Err(L::Int(v))
            }
        }
        (L::Int(v), P::Decimal) => Ok(L::Decimal(v.to_string())),
        (L::Int(v), P::Double | P::Single) => Ok(L::Double(v as f64)),
        (L::Decimal(s), P::Decimal) => Ok(L::Decimal(s)),
        (L::Decimal(s), P::Double | P::Single) => match s.parse::<f64>() {
            Ok(d) => Ok(L::Double(d)),
            Err(_) => Err(L::Decimal(s)),
        },
        (L::Double(d), P::Double | P::Single) => Ok(L::Double(d)),
        (L::Double(d), P::Decimal) if d.is_finite() => Ok(L::Decimal(d.to_string())),
        (L::Boolean(b), P::Boolean) => Ok(L::Boolean(b)),
        (L::String(s), P::String) => Ok(L::String(s)),
        (L::Guid(g), P::Guid) => Ok(L::Guid(g)),
        (L::Date(d), P::Date) => Ok(L::Date(d)),
        (L::DateTimeOffset(d), P::DateTimeOffset) => Ok(L::DateTimeOffset(d)),
        (L::TimeOfDay(t), P::TimeOfDay) => Ok(L::TimeOfDay(t)),
        (L::Duration(d), P::Duration) => Ok(L::Duration(d)),
        (L::Binary(b), P::Binary | P::Stream) => Ok(L::Binary(b)),
        (v, _) => Err(v),
    }
}

fn parse_number(text: &str) -> Result<LiteralValue, LiteralError> {
    if text.contains(['e', 'E']) {
        return text
            .parse::<f64>()
            .map(LiteralValue::Double)
            .map_err(|_| LiteralError::unrecognized(text));
    }
    if text.contains('.') {
        return Ok(LiteralValue::Decimal(text.to_string()));
    }
    match text.parse::<i64>() {
        Ok(v) => Ok(LiteralValue::Int(v)),
        Err(_) if text.trim_start_matches('-').chars().all(|c| c.is_ascii_digit()) => {
            Ok(LiteralValue::Decimal(text.to_string()))
        }
        Err(_) => Err(LiteralError::unrecognized(text)),
    }
}

fn parse_time(text: &str) -> Result<NaiveTime, LiteralError> {
    NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .map_err(|_| LiteralError::unrecognized(text))
}

fn parse_typed_string(prefix: &str, value: &str) -> Result<LiteralValue, LiteralError> {
    match prefix {
        "duration" => {
            let body = value.strip_prefix('-').unwrap_or(value);
            if body.starts_with('P') && body.len() > 1 {
                Ok(LiteralValue::Duration(value.to_string()))
            } else {
                Err(LiteralError::unrecognized(format!("{}'{}'", prefix, value)))
            }
        }
        "binary" => Ok(LiteralValue::Binary(value.to_string())),
        qualified if qualified.contains('.') => Ok(LiteralValue::Enum {
            type_name: qualified.to_string(),
            member: value.to_string(),
        }),
        _ => Err(LiteralError::unrecognized(format!("{}'{}'", prefix, value))),
    }
}

/// Parse a complete literal from text such as a parameter alias value
pub fn parse_literal(text: &str) -> Result<LiteralValue, LiteralError> {
    let mut stream =
        tokens::Lexer::new(text).tokenize().map_err(|_| LiteralError::unrecognized(text))?;
    let value = LiteralValue::from_token(stream.current_token())?
        .ok_or_else(|| LiteralError::unrecognized(text))?;
    stream.advance();
    if !stream.is_at_end() {
        return Err(LiteralError::unrecognized(text));
    }
    Ok(value)
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Null => write!(f, "null"),
            LiteralValue::Boolean(b) => write!(f, "{}", b),
            LiteralValue::Int(v) => write!(f, "{}", v),
            LiteralValue::Decimal(s) => write!(f, "{}", s),
            LiteralValue::Double(d) if d.is_nan() => write!(f, "NaN"),
            LiteralValue::Double(d) if d.is_infinite() => {
                write!(f, "{}", if *d > 0.0 { "INF" } else { "-INF" })
            }
            LiteralValue::Double(d) => write!(f, "{:?}", d),
            LiteralValue::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            LiteralValue::Guid(g) => write!(f, "{}", g),
            LiteralValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            LiteralValue::DateTimeOffset(d) => write!(f, "{}", d.to_rfc3339()),
            LiteralValue::TimeOfDay(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
            LiteralValue::Duration(d) => write!(f, "duration'{}'", d),
            LiteralValue::Binary(b) => write!(f, "binary'{}'", b),
            LiteralValue::Enum { type_name, member } => write!(f, "{}'{}'", type_name, member),
            LiteralValue::ParameterAlias(name) => write!(f, "@{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::sample_model;
    use assert_matches::assert_matches;

    #[test]
    fn test_number_classification() {
        assert_eq!(parse_literal("42").unwrap(), LiteralValue::Int(42));
        assert_eq!(parse_literal("-7").unwrap(), LiteralValue::Int(-7));
        assert_eq!(
            parse_literal("3.14").unwrap(),
            LiteralValue::Decimal("3.14".into())
        );
        assert_eq!(parse_literal("1e3").unwrap(), LiteralValue::Double(1000.0));
        assert_eq!(
            parse_literal("99999999999999999999").unwrap(),
            LiteralValue::Decimal("99999999999999999999".into())
        );
    }

    #[test]
    fn test_inferred_types() {
        assert_eq!(
            LiteralValue::Int(1).inferred_type(),
            Some(TypeRef::primitive(PrimitiveKind::Int32))
        );
        assert_eq!(
            LiteralValue::Int(i64::MAX).inferred_type(),
            Some(TypeRef::primitive(PrimitiveKind::Int64))
        );
        assert_eq!(LiteralValue::Null.inferred_type(), None);
    }

    #[test]
    fn test_temporal_literals() {
        assert_matches!(parse_literal("2024-02-29").unwrap(), LiteralValue::Date(_));
        assert_matches!(
            parse_literal("2024-02-29T08:15:00+02:00").unwrap(),
            LiteralValue::DateTimeOffset(_)
        );
        assert_matches!(parse_literal("08:15").unwrap(), LiteralValue::TimeOfDay(_));
        assert_matches!(parse_literal("2024-02-30"), Err(LiteralError::Unrecognized { .. }));
    }

    #[test]
    fn test_coerce_integral_range() {
        let model = sample_model();
        let int16 = TypeRef::primitive(PrimitiveKind::Int16);
        assert_eq!(
            LiteralValue::Int(300).coerce(&int16, &model).unwrap(),
            LiteralValue::Int(300)
        );
        let err = LiteralValue::Int(70000).coerce(&int16, &model).unwrap_err();
        assert_eq!(err.error_code(), codes::literal::TYPE_VERIFICATION_FAILURE);
    }

    #[test]
    fn test_coerce_widening_to_decimal_and_double() {
        let model = sample_model();
        assert_eq!(
            LiteralValue::Int(5)
                .coerce(&TypeRef::primitive(PrimitiveKind::Decimal), &model)
                .unwrap(),
            LiteralValue::Decimal("5".into())
        );
        assert_eq!(
            LiteralValue::Decimal("2.5".into())
                .coerce(&TypeRef::primitive(PrimitiveKind::Double), &model)
                .unwrap(),
            LiteralValue::Double(2.5)
        );
    }

    #[test]
    fn test_string_does_not_coerce_to_int() {
        let model = sample_model();
        assert_matches!(
            LiteralValue::String("1".into()).coerce(&TypeRef::primitive(PrimitiveKind::Int32), &model),
            Err(LiteralError::TypeVerificationFailure { expected, .. }) if expected == "Edm.Int32"
        );
    }

    #[test]
    fn test_enum_coercion() {
        let model = sample_model();
        let color = TypeRef::enumeration("NS.Color");
        assert_eq!(
            parse_literal("NS.Color'Red'").unwrap().coerce(&color, &model).unwrap(),
            LiteralValue::Enum {
                type_name: "NS.Color".into(),
                member: "Red".into()
            }
        );
        assert!(LiteralValue::String("Purple".into()).coerce(&color, &model).is_err());
    }

    #[test]
    fn test_display_uses_uri_syntax() {
        assert_eq!(LiteralValue::String("a'b".into()).to_string(), "'a''b'");
        assert_eq!(LiteralValue::Double(2.0).to_string(), "2.0");
        assert_eq!(
            parse_literal("duration'P1D'").unwrap().to_string(),
            "duration'P1D'"
        );
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(parse_literal("1 2").is_err());
        assert!(parse_literal("Name").is_err());
    }
}
