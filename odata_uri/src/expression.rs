//! Static typing of common expressions
//!
//! `$compute` statements and `aggregate` operands are parsed with the usual
//! operator precedence and given a static type. Nothing is evaluated. Paths are
//! resolved through the same member step as `$select`, so properties declared on
//! complex types and reached through casts type the same way everywhere.

use crate::config::compile_time::apply::MAX_NESTING_DEPTH;
use crate::literals::{LiteralError, LiteralValue};
use crate::logging::codes;
use crate::model::{ModelAccessor, NavigationSource, PrimitiveKind, TypeKind, TypeRef};
use crate::path::resolver::{step_member, Cursor, StepMode};
use crate::path::{PathError, PathSegment};
use crate::tokens::{self, LexerError, Token, TokenStream, TokenStreamError};
use crate::utils::{Position, Span};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpressionError {
    #[error("Property '{property}' is not declared on type '{type_name}'")]
    PropertyNotDeclared { property: String, type_name: String },

    #[error("'{property}' is not available after the preceding transformations")]
    PropertyNotInShape { property: String },

    #[error("Unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error("Function '{function}' takes {min} to {max} arguments, {actual} given")]
    ArgumentCountMismatch {
        function: String,
        min: usize,
        max: usize,
        actual: usize,
    },

    #[error("Operator '{operator}' cannot be applied to '{left}' and '{right}'")]
    IncompatibleOperands {
        operator: String,
        left: String,
        right: String,
    },

    #[error("Expression nesting exceeds maximum depth {max}")]
    TooDeep { max: usize },

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Token(#[from] TokenStreamError),

    #[error(transparent)]
    Lexer(#[from] LexerError),

    #[error(transparent)]
    Literal(#[from] LiteralError),
}

impl ExpressionError {
    pub fn error_code(&self) -> crate::logging::Code {
        match self {
            ExpressionError::PropertyNotDeclared { .. } => codes::expression::PROPERTY_NOT_DECLARED,
            ExpressionError::PropertyNotInShape { .. } => codes::apply::PROPERTY_NOT_IN_SHAPE,
            ExpressionError::UnknownFunction { .. } => codes::expression::UNKNOWN_FUNCTION,
            ExpressionError::ArgumentCountMismatch { .. } => codes::expression::ARGUMENT_COUNT_MISMATCH,
            ExpressionError::IncompatibleOperands { .. } => codes::expression::INCOMPATIBLE_OPERANDS,
            ExpressionError::TooDeep { .. } => codes::expression::TOO_DEEP,
            ExpressionError::Path(e) => e.error_code(),
            ExpressionError::Token(e) => e.error_code(),
            ExpressionError::Lexer(e) => e.error_code(),
            ExpressionError::Literal(e) => e.error_code(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOperator {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOperator {
    Or,
    And,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Has,
    In,
    Add,
    Subtract,
    Multiply,
    Divide,
    DivideBy,
    Modulo,
}

impl BinaryOperator {
    fn from_keyword(word: &str) -> Option<Self> {
        let op = match word {
            "or" => BinaryOperator::Or,
            "and" => BinaryOperator::And,
            "eq" => BinaryOperator::Equal,
            "ne" => BinaryOperator::NotEqual,
            "lt" => BinaryOperator::LessThan,
            "le" => BinaryOperator::LessThanOrEqual,
            "gt" => BinaryOperator::GreaterThan,
            "ge" => BinaryOperator::GreaterThanOrEqual,
            "has" => BinaryOperator::Has,
            "in" => BinaryOperator::In,
            "add" => BinaryOperator::Add,
            "sub" => BinaryOperator::Subtract,
            "mul" => BinaryOperator::Multiply,
            "div" => BinaryOperator::Divide,
            "divby" => BinaryOperator::DivideBy,
            "mod" => BinaryOperator::Modulo,
            _ => return None,
        };
        Some(op)
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            BinaryOperator::Or => "or",
            BinaryOperator::And => "and",
            BinaryOperator::Equal => "eq",
            BinaryOperator::NotEqual => "ne",
            BinaryOperator::LessThan => "lt",
            BinaryOperator::LessThanOrEqual => "le",
            BinaryOperator::GreaterThan => "gt",
            BinaryOperator::GreaterThanOrEqual => "ge",
            BinaryOperator::Has => "has",
            BinaryOperator::In => "in",
            BinaryOperator::Add => "add",
            BinaryOperator::Subtract => "sub",
            BinaryOperator::Multiply => "mul",
            BinaryOperator::Divide => "div",
            BinaryOperator::DivideBy => "divby",
            BinaryOperator::Modulo => "mod",
        }
    }

    /// Binding strength; higher binds tighter
    fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::Or => 1,
            BinaryOperator::And => 2,
            BinaryOperator::Equal
            | BinaryOperator::NotEqual
            | BinaryOperator::LessThan
            | BinaryOperator::LessThanOrEqual
            | BinaryOperator::GreaterThan
            | BinaryOperator::GreaterThanOrEqual
            | BinaryOperator::Has
            | BinaryOperator::In => 3,
            BinaryOperator::Add | BinaryOperator::Subtract => 4,
            BinaryOperator::Multiply
            | BinaryOperator::Divide
            | BinaryOperator::DivideBy
            | BinaryOperator::Modulo => 5,
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expression {
    Literal(LiteralValue),
    /// Member path such as `Address/City/Name`, or a dynamic alias
    Path(Vec<String>),
    Unary {
        operator: UnaryOperator,
        operand: Box<TypedExpression>,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<TypedExpression>,
        right: Box<TypedExpression>,
    },
    Call {
        function: String,
        arguments: Vec<TypedExpression>,
    },
    /// Parenthesized list, the right operand of `in`
    List(Vec<TypedExpression>),
    /// Type argument of `cast` and `isof`
    TypeName(String),
}

/// An expression with its static type. `type_ref` is `None` for `null`, lists and aliases.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypedExpression {
    pub expression: Expression,
    pub type_ref: Option<TypeRef>,
    pub text: String,
}

impl TypedExpression {
    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        self.type_ref.as_ref().and_then(TypeRef::primitive_kind)
    }

    pub fn is_numeric(&self) -> bool {
        self.primitive_kind().is_some_and(|k| k.is_numeric())
    }

    /// Untyped or unknown, compatible with anything
    pub fn is_open(&self) -> bool {
        self.type_ref.as_ref().map(TypeRef::is_untyped).unwrap_or(true)
    }

    pub fn path(&self) -> Option<&[String]> {
        match &self.expression {
            Expression::Path(segments) => Some(segments),
            _ => None,
        }
    }
}

/// Names and types an expression may refer to
#[derive(Clone)]
pub struct ExpressionScope<'m> {
    model: &'m dyn ModelAccessor,
    context: TypeRef,
    source: Option<NavigationSource>,
    /// Aliases introduced by `$compute` and `$apply`, in order
    dynamic: Vec<(String, TypeRef)>,
    /// When set, declared members outside this list are hidden
    visible: Option<Vec<String>>,
}

impl<'m> ExpressionScope<'m> {
    pub fn new(model: &'m dyn ModelAccessor, context: TypeRef) -> Self {
        Self {
            model,
            context: context.element(),
            source: None,
            dynamic: Vec::new(),
            visible: None,
        }
    }

    pub fn with_source(mut self, source: Option<NavigationSource>) -> Self {
        self.source = source;
        self
    }

    pub fn model(&self) -> &'m dyn ModelAccessor {
        self.model
    }

    pub fn context(&self) -> &TypeRef {
        &self.context
    }

    pub fn source(&self) -> Option<&NavigationSource> {
        self.source.as_ref()
    }

    /// Aliases in the order they were introduced
    pub fn dynamic(&self) -> &[(String, TypeRef)] {
        &self.dynamic
    }

    /// False for declared members hidden by a preceding aggregation
    pub fn is_visible(&self, name: &str) -> bool {
        self.dynamic_type(name).is_some()
            || self
                .visible
                .as_ref()
                .map_or(true, |visible| visible.iter().any(|v| v == name))
    }

    pub fn is_restricted(&self) -> bool {
        self.visible.is_some()
    }

    pub fn add_dynamic(&mut self, name: &str, type_ref: TypeRef) {
        self.dynamic.retain(|(n, _)| n != name);
        self.dynamic.push((name.to_string(), type_ref));
    }

    pub fn dynamic_type(&self, name: &str) -> Option<&TypeRef> {
        self.dynamic.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    /// Hide declared members except `names`
    pub fn restrict_to(&mut self, names: Vec<String>) {
        self.visible = Some(names);
    }

    pub fn clear_dynamic(&mut self) {
        self.dynamic.clear();
    }

    /// Resolve a member path to typed segments. Dynamic aliases resolve to no segments.
    pub fn resolve_path(&self, names: &[String]) -> Result<(Vec<PathSegment>, TypeRef), ExpressionError> {
        let mut names = names;
        if let Some(first) = names.first() {
            if first == "$it" || first == "$this" {
                names = &names[1..];
            }
        }
        let Some(first) = names.first() else {
            return Ok((Vec::new(), self.context.clone()));
        };

        if let Some(alias_type) = self.dynamic_type(first) {
            if names.len() == 1 {
                return Ok((Vec::new(), alias_type.clone()));
            }
            let cursor = Cursor::at(alias_type.clone(), None);
            return self.step_all(cursor, &names[1..]);
        }

        if let Some(visible) = &self.visible {
            if !visible.iter().any(|v| v == first) {
                return Err(ExpressionError::PropertyNotInShape {
                    property: first.clone(),
                });
            }
        }

        let cursor = Cursor::at(self.context.clone(), self.source.clone());
        self.step_all(cursor, names)
    }

    fn step_all(
        &self,
        mut cursor: Cursor,
        names: &[String],
    ) -> Result<(Vec<PathSegment>, TypeRef), ExpressionError> {
        let mut segments = Vec::with_capacity(names.len());
        for name in names {
            if name == "$count" {
                if !cursor.type_ref.is_collection {
                    return Err(PathError::CountNotApplicable {
                        previous: cursor.path.clone(),
                    }
                    .into());
                }
                cursor.type_ref = TypeRef::primitive(PrimitiveKind::Int64);
                continue;
            }
            let (segment, next) =
                step_member(self.model, &cursor, name, StepMode::Clause).map_err(|e| match e {
                    PathError::PropertyNotFound { property, type_name } => {
                        ExpressionError::PropertyNotDeclared { property, type_name }
                    }
                    other => ExpressionError::Path(other),
                })?;
            segments.push(segment);
            cursor = next;
        }
        Ok((segments, cursor.type_ref))
    }
}

/// Parse one expression from `stream`, stopping at the first token that cannot continue it
pub fn parse_expression(
    stream: &mut TokenStream,
    scope: &ExpressionScope<'_>,
) -> Result<TypedExpression, ExpressionError> {
    let start = stream.current_span().start;
    let mut parser = ExpressionParser {
        stream,
        scope,
        depth: 0,
        last_end: start,
    };
    parser.parse_binary(0)
}

/// Parse a complete expression text
pub fn parse_expression_text(
    text: &str,
    scope: &ExpressionScope<'_>,
) -> Result<TypedExpression, ExpressionError> {
    let mut stream = tokens::tokenize(text)?;
    let expression = parse_expression(&mut stream, scope)?;
    stream.expect_end()?;
    Ok(expression)
}

struct ExpressionParser<'s, 'm> {
    stream: &'s mut TokenStream,
    scope: &'s ExpressionScope<'m>,
    depth: usize,
    last_end: Position,
}

impl<'s, 'm> ExpressionParser<'s, 'm> {
    fn bump(&mut self) -> Span {
        let span = self.stream.current_span();
        self.stream.advance();
        self.last_end = span.end;
        span
    }

    fn expect(&mut self, token: &Token) -> Result<Span, ExpressionError> {
        if self.stream.check(token) {
            Ok(self.bump())
        } else {
            Err(self.stream.unexpected(&format!("'{}'", token)).into())
        }
    }

    fn text_from(&self, start: Position) -> String {
        if self.last_end.offset < start.offset {
            return String::new();
        }
        self.stream.slice(Span::new(start, self.last_end)).to_string()
    }

    fn current_operator(&self) -> Option<BinaryOperator> {
        self.stream
            .current_token()
            .identifier()
            .and_then(BinaryOperator::from_keyword)
    }

    /// Precedence climbing over left-associative binary operators
    fn parse_binary(&mut self, min_precedence: u8) -> Result<TypedExpression, ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            crate::log_error!(codes::expression::TOO_DEEP, "Expression nesting too deep",
                "max" => MAX_NESTING_DEPTH
            );
            return Err(ExpressionError::TooDeep {
                max: MAX_NESTING_DEPTH,
            });
        }

        let start = self.stream.current_span().start;
        let mut left = self.parse_unary()?;
        while let Some(operator) = self.current_operator() {
            let precedence = operator.precedence();
            if precedence <= min_precedence {
                break;
            }
            self.bump();
            let right = self.parse_binary(precedence)?;
            let type_ref = binary_type(operator, &left, &right)?;
            left = TypedExpression {
                expression: Expression::Binary {
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                type_ref,
                text: self.text_from(start),
            };
        }

        self.depth -= 1;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<TypedExpression, ExpressionError> {
        let start = self.stream.current_span().start;
        let operator = if self.stream.check(&Token::Minus) {
            UnaryOperator::Negate
        } else if self.stream.check_keyword("not") {
            UnaryOperator::Not
        } else {
            return self.parse_primary();
        };
        self.bump();
        let operand = self.parse_unary()?;
        let type_ref = match operator {
            UnaryOperator::Not => {
                if !operand.is_open() && operand.primitive_kind() != Some(PrimitiveKind::Boolean) {
                    return Err(incompatible("not", &operand, &operand));
                }
                Some(TypeRef::primitive(PrimitiveKind::Boolean))
            }
            UnaryOperator::Negate => {
                let allowed = operand.is_open()
                    || operand.is_numeric()
                    || operand.primitive_kind() == Some(PrimitiveKind::Duration);
                if !allowed {
                    return Err(incompatible("-", &operand, &operand));
                }
                operand.type_ref.clone()
            }
        };
        Ok(TypedExpression {
            expression: Expression::Unary {
                operator,
                operand: Box::new(operand),
            },
            type_ref,
            text: self.text_from(start),
        })
    }

    fn parse_primary(&mut self) -> Result<TypedExpression, ExpressionError> {
        let start = self.stream.current_span().start;
        let token = self.stream.current_token().clone();

        if token == Token::OpenParen {
            return self.parse_parenthesized(start);
        }

        if let Some(value) = LiteralValue::from_token(&token)? {
            self.bump();
            return Ok(TypedExpression {
                type_ref: value.inferred_type(),
                expression: Expression::Literal(value),
                text: self.text_from(start),
            });
        }

        match token {
            Token::Identifier(name) => {
                let next = self.stream.peek_token();
                if *next == Token::OpenParen {
                    self.bump();
                    if !self.stream.preceded_by_whitespace() {
                        return self.parse_call(name, start);
                    }
                    return Err(self.stream.unexpected("an operator").into());
                }
                self.parse_path(start)
            }
            Token::SystemToken(name) if name == "$it" || name == "$this" => self.parse_path(start),
            _ => Err(self.stream.unexpected("an expression").into()),
        }
    }

    fn parse_parenthesized(&mut self, start: Position) -> Result<TypedExpression, ExpressionError> {
        self.bump();
        let mut items = vec![self.parse_binary(0)?];
        while self.stream.check(&Token::Comma) {
            self.bump();
            items.push(self.parse_binary(0)?);
        }
        self.expect(&Token::CloseParen)?;
        if items.len() == 1 {
            if let Some(mut single) = items.pop() {
                single.text = self.text_from(start);
                return Ok(single);
            }
        }
        Ok(TypedExpression {
            expression: Expression::List(items),
            type_ref: None,
            text: self.text_from(start),
        })
    }

    fn parse_path(&mut self, start: Position) -> Result<TypedExpression, ExpressionError> {
        let mut names = Vec::new();
        loop {
            match self.stream.current_token().clone() {
                Token::Identifier(name) => names.push(name),
                Token::SystemToken(name) if ["$it", "$this", "$count"].contains(&name.as_str()) => {
                    names.push(name)
                }
                _ => return Err(self.stream.unexpected("a property name").into()),
            }
            self.bump();
            if !self.stream.check(&Token::Slash) {
                break;
            }
            self.bump();
        }
        let (_, type_ref) = self.scope.resolve_path(&names)?;
        Ok(TypedExpression {
            expression: Expression::Path(names),
            type_ref: Some(type_ref),
            text: self.text_from(start),
        })
    }

    fn parse_call(&mut self, name: String, start: Position) -> Result<TypedExpression, ExpressionError> {
        self.expect(&Token::OpenParen)?;
        let mut arguments = Vec::new();
        if !self.stream.check(&Token::CloseParen) {
            loop {
                arguments.push(self.parse_argument(&name)?);
                if !self.stream.check(&Token::Comma) {
                    break;
                }
                self.bump();
            }
        }
        self.expect(&Token::CloseParen)?;
        let type_ref = function_type(self.scope.model(), &name, &arguments)?;
        Ok(TypedExpression {
            expression: Expression::Call {
                function: name,
                arguments,
            },
            type_ref,
            text: self.text_from(start),
        })
    }

    fn parse_argument(&mut self, function: &str) -> Result<TypedExpression, ExpressionError> {
        if function == "cast" || function == "isof" {
            if let Token::Identifier(name) = self.stream.current_token().clone() {
                let ends_argument = matches!(self.stream.peek_token(), Token::Comma | Token::CloseParen);
                if name.contains('.') && ends_argument {
                    let start = self.stream.current_span().start;
                    self.bump();
                    return Ok(TypedExpression {
                        type_ref: self.scope.model().resolve_type_name(&name),
                        expression: Expression::TypeName(name),
                        text: self.text_from(start),
                    });
                }
            }
        }
        self.parse_binary(0)
    }
}

fn incompatible(operator: &str, left: &TypedExpression, right: &TypedExpression) -> ExpressionError {
    let name = |e: &TypedExpression| {
        e.type_ref
            .as_ref()
            .map(TypeRef::full_name)
            .unwrap_or_else(|| "null".to_string())
    };
    ExpressionError::IncompatibleOperands {
        operator: operator.to_string(),
        left: name(left),
        right: name(right),
    }
}

/// Wider of two numeric kinds: integrals by rank, then Decimal, then floating point
pub fn promote_numeric(a: PrimitiveKind, b: PrimitiveKind) -> Option<PrimitiveKind> {
    if !a.is_numeric() || !b.is_numeric() {
        return None;
    }
    if a.is_floating() || b.is_floating() {
        if a == PrimitiveKind::Single && b == PrimitiveKind::Single {
            return Some(PrimitiveKind::Single);
        }
        return Some(PrimitiveKind::Double);
    }
    if a == PrimitiveKind::Decimal || b == PrimitiveKind::Decimal {
        return Some(PrimitiveKind::Decimal);
    }
    match (a.integral_rank(), b.integral_rank()) {
        (Some(ra), Some(rb)) => Some(if ra >= rb { a } else { b }),
        _ => None,
    }
}

fn binary_type(
    operator: BinaryOperator,
    left: &TypedExpression,
    right: &TypedExpression,
) -> Result<Option<TypeRef>, ExpressionError> {
    use BinaryOperator as B;
    use PrimitiveKind as P;

    let boolean = Some(TypeRef::primitive(P::Boolean));
    let open = left.is_open() || right.is_open();

    match operator {
        B::Or | B::And => {
            let is_bool = |e: &TypedExpression| e.is_open() || e.primitive_kind() == Some(P::Boolean);
            if is_bool(left) && is_bool(right) {
                Ok(boolean)
            } else {
                Err(incompatible(operator.keyword(), left, right))
            }
        }
        B::Has | B::In => Ok(boolean),
        B::Equal
        | B::NotEqual
        | B::LessThan
        | B::LessThanOrEqual
        | B::GreaterThan
        | B::GreaterThanOrEqual => {
            if open || comparable(left, right) {
                Ok(boolean)
            } else {
                Err(incompatible(operator.keyword(), left, right))
            }
        }
        B::Add | B::Subtract | B::Multiply | B::Divide | B::DivideBy | B::Modulo => {
            if open {
                return Ok(if left.is_open() {
                    right.type_ref.clone().or_else(|| left.type_ref.clone())
                } else {
                    left.type_ref.clone()
                });
            }
            let (Some(l), Some(r)) = (left.primitive_kind(), right.primitive_kind()) else {
                return Err(incompatible(operator.keyword(), left, right));
            };
            let kind = match (operator, l, r) {
                (B::DivideBy, l, r) if l.is_numeric() && r.is_numeric() => {
                    if l.is_floating() || r.is_floating() {
                        Some(P::Double)
                    } else {
                        Some(P::Decimal)
                    }
                }
                (B::Add | B::Subtract, P::DateTimeOffset | P::Date, P::Duration) => Some(l),
                (B::Add, P::Duration, P::DateTimeOffset | P::Date) => Some(r),
                (B::Add | B::Subtract, P::Duration, P::Duration) => Some(P::Duration),
                (B::Subtract, P::DateTimeOffset, P::DateTimeOffset) | (B::Subtract, P::Date, P::Date) => {
                    Some(P::Duration)
                }
                (B::Multiply | B::Divide, P::Duration, n) | (B::Multiply, n, P::Duration)
                    if n.is_numeric() =>
                {
                    Some(P::Duration)
                }
                _ => promote_numeric(l, r),
            };
            kind.map(|k| Some(TypeRef::primitive(k)))
                .ok_or_else(|| incompatible(operator.keyword(), left, right))
        }
    }
}

fn comparable(left: &TypedExpression, right: &TypedExpression) -> bool {
    let (Some(l), Some(r)) = (&left.type_ref, &right.type_ref) else {
        return false;
    };
    if l.is_collection || r.is_collection {
        return false;
    }
    match (&l.kind, &r.kind) {
        (TypeKind::Primitive(a), TypeKind::Primitive(b)) => {
            a == b
                || promote_numeric(*a, *b).is_some()
                || (a.is_temporal() && b.is_temporal() && a != &PrimitiveKind::Duration && b != &PrimitiveKind::Duration)
        }
        (TypeKind::Enum(a), TypeKind::Enum(b)) => a == b,
        (TypeKind::Enum(_), TypeKind::Primitive(PrimitiveKind::String))
        | (TypeKind::Primitive(PrimitiveKind::String), TypeKind::Enum(_)) => true,
        (a, b) => a == b,
    }
}

/// What a built-in function returns
#[derive(Clone, Copy)]
enum Returns {
    Fixed(PrimitiveKind),
    FirstArgument,
    CastTarget,
}

fn builtin(name: &str) -> Option<(usize, usize, Returns)> {
    use PrimitiveKind as P;
    use Returns::*;

    let signature = match name {
        "contains" | "endswith" | "startswith" | "matchesPattern" | "hassubset"
        | "hassubsequence" => (2, 2, Fixed(P::Boolean)),
        "length" => (1, 1, Fixed(P::Int32)),
        "indexof" => (2, 2, Fixed(P::Int32)),
        "substring" => (2, 3, Fixed(P::String)),
        "tolower" | "toupper" | "trim" => (1, 1, Fixed(P::String)),
        "concat" => (2, 2, Fixed(P::String)),
        "year" | "month" | "day" | "hour" | "minute" | "second" | "totaloffsetminutes" => {
            (1, 1, Fixed(P::Int32))
        }
        "fractionalseconds" | "totalseconds" => (1, 1, Fixed(P::Decimal)),
        "date" => (1, 1, Fixed(P::Date)),
        "time" => (1, 1, Fixed(P::TimeOfDay)),
        "now" | "maxdatetime" | "mindatetime" => (0, 0, Fixed(P::DateTimeOffset)),
        "round" | "floor" | "ceiling" => (1, 1, FirstArgument),
        "cast" => (1, 2, CastTarget),
        "isof" => (1, 2, Fixed(P::Boolean)),
        _ => return None,
    };
    Some(signature)
}

fn function_type(
    model: &dyn ModelAccessor,
    name: &str,
    arguments: &[TypedExpression],
) -> Result<Option<TypeRef>, ExpressionError> {
    let Some((min, max, returns)) = builtin(name) else {
        if name.contains('.') {
            // Custom functions are typed by their declaration when the model has one
            let declared = model
                .find_operations(name)
                .into_iter()
                .filter(|op| !op.is_action())
                .find_map(|op| op.return_type.as_deref())
                .and_then(|t| model.resolve_type_name(t));
            return Ok(Some(declared.unwrap_or_else(TypeRef::untyped)));
        }
        crate::log_error!(codes::expression::UNKNOWN_FUNCTION, "Unknown function",
            "function" => name
        );
        return Err(ExpressionError::UnknownFunction {
            name: name.to_string(),
        });
    };

    if arguments.len() < min || arguments.len() > max {
        return Err(ExpressionError::ArgumentCountMismatch {
            function: name.to_string(),
            min,
            max,
            actual: arguments.len(),
        });
    }

    let type_ref = match returns {
        Returns::Fixed(kind) => Some(TypeRef::primitive(kind)),
        Returns::FirstArgument => arguments.first().and_then(|a| a.type_ref.clone()),
        Returns::CastTarget => Some(
            arguments
                .last()
                .and_then(|a| a.type_ref.clone())
                .unwrap_or_else(TypeRef::untyped),
        ),
    };
    Ok(type_ref)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::sample_model;
    use crate::model::EdmModel;
    use assert_matches::assert_matches;

    fn typed(model: &EdmModel, text: &str) -> Result<TypedExpression, ExpressionError> {
        let scope = ExpressionScope::new(model, TypeRef::entity("NS.City"));
        parse_expression_text(text, &scope)
    }

    fn kind_of(model: &EdmModel, text: &str) -> Option<PrimitiveKind> {
        typed(model, text).unwrap().primitive_kind()
    }

    #[test]
    fn test_arithmetic_promotion() {
        let model = sample_model();
        assert_eq!(kind_of(&model, "Id add 1"), Some(PrimitiveKind::Int32));
        assert_eq!(kind_of(&model, "Id mul Population"), Some(PrimitiveKind::Int64));
        assert_eq!(kind_of(&model, "Population add Budget"), Some(PrimitiveKind::Decimal));
        assert_eq!(kind_of(&model, "Budget mul Area"), Some(PrimitiveKind::Double));
        assert_eq!(kind_of(&model, "Id divby 2"), Some(PrimitiveKind::Decimal));
    }

    #[test]
    fn test_precedence_and_text() {
        let model = sample_model();
        let expr = typed(&model, "Id add 2 mul 3 eq 7 and true").unwrap();
        assert_eq!(expr.primitive_kind(), Some(PrimitiveKind::Boolean));
        let Expression::Binary { operator, left, .. } = &expr.expression else {
            panic!("expected a binary expression");
        };
        assert_eq!(*operator, BinaryOperator::And);
        assert_eq!(left.text, "Id add 2 mul 3 eq 7");
    }

    #[test]
    fn test_functions() {
        let model = sample_model();
        assert_eq!(kind_of(&model, "length(Name)"), Some(PrimitiveKind::Int32));
        assert_eq!(kind_of(&model, "year(Founded)"), Some(PrimitiveKind::Int32));
        assert_eq!(kind_of(&model, "round(Area)"), Some(PrimitiveKind::Double));
        assert_eq!(kind_of(&model, "cast(Id, Edm.Int64)"), Some(PrimitiveKind::Int64));
        assert!(typed(&model, "Custom.Score(Name)").unwrap().is_open());
        assert_matches!(typed(&model, "score(Name)"), Err(ExpressionError::UnknownFunction { .. }));
        assert_matches!(
            typed(&model, "length(Name, Name)"),
            Err(ExpressionError::ArgumentCountMismatch { .. })
        );
    }

    #[test]
    fn test_paths_resolve_through_model() {
        let model = sample_model();
        let scope = ExpressionScope::new(&model, TypeRef::entity("NS.Person"));
        let expr = parse_expression_text("Address/City/Population", &scope).unwrap();
        assert_eq!(expr.primitive_kind(), Some(PrimitiveKind::Int64));
        assert_matches!(
            parse_expression_text("Address/Nope", &scope),
            Err(ExpressionError::PropertyNotDeclared { .. })
        );
        // open type
        assert!(parse_expression_text("Nickname", &scope).unwrap().is_open());
        let count = typed(&model, "Districts/$count").unwrap();
        assert_eq!(count.primitive_kind(), Some(PrimitiveKind::Int64));
    }

    #[test]
    fn test_dynamic_aliases_and_visibility() {
        let model = sample_model();
        let mut scope = ExpressionScope::new(&model, TypeRef::entity("NS.City"));
        scope.add_dynamic("Total", TypeRef::primitive(PrimitiveKind::Decimal));
        scope.restrict_to(vec!["Name".to_string()]);
        assert_eq!(
            parse_expression_text("Total mul 2", &scope).unwrap().primitive_kind(),
            Some(PrimitiveKind::Decimal)
        );
        assert!(parse_expression_text("Name", &scope).is_ok());
        let err = parse_expression_text("Area", &scope).unwrap_err();
        assert_eq!(err.error_code().as_str(), "ApplyBinder_PropertyNotAvailableAfterTransformation");
    }

    #[test]
    fn test_incompatible_operands() {
        let model = sample_model();
        assert_matches!(
            typed(&model, "Name add 1"),
            Err(ExpressionError::IncompatibleOperands { .. })
        );
        assert_matches!(
            typed(&model, "Name eq 1"),
            Err(ExpressionError::IncompatibleOperands { .. })
        );
        assert!(typed(&model, "Color eq 'Red'").is_ok());
        assert!(typed(&model, "Name in ('a','b')").is_ok());
        assert!(typed(&model, "-Area").is_ok());
        assert_matches!(typed(&model, "not Name"), Err(ExpressionError::IncompatibleOperands { .. }));
    }

    #[test]
    fn test_depth_limit() {
        let model = sample_model();
        let depth = MAX_NESTING_DEPTH + 1;
        let text = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        assert_matches!(typed(&model, &text), Err(ExpressionError::TooDeep { .. }));
    }

    #[test]
    fn test_stops_at_clause_keywords() {
        let model = sample_model();
        let scope = ExpressionScope::new(&model, TypeRef::entity("NS.City"));
        let mut stream = tokens::tokenize("Population with sum as Total").unwrap();
        let expr = parse_expression(&mut stream, &scope).unwrap();
        assert_eq!(expr.text, "Population");
        assert!(stream.check_keyword("with"));
    }
}
