//! Path segments and the resolved path

use crate::literals::LiteralValue;
use crate::model::{NavigationSource, TypeRef};
use serde::Serialize;
use std::fmt;

/// One key property value; `name` is empty for positional keys on non-entity collections
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyValue {
    pub name: String,
    pub value: LiteralValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ParameterValue {
    Literal(LiteralValue),
    /// Complex or collection values (JSON text), left for the payload reader
    Raw(String),
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Literal(value) => write!(f, "{}", value),
            ParameterValue::Raw(text) => write!(f, "{}", text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationParameter {
    pub name: String,
    pub value: ParameterValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SegmentKind {
    EntitySet,
    Singleton,
    Key {
        values: Vec<KeyValue>,
    },
    Property,
    /// Undeclared property of an open type
    DynamicProperty,
    NavigationProperty,
    /// Navigation property addressed through `$ref`
    NavigationPropertyLink,
    TypeCast {
        from_type: TypeRef,
        to_type: TypeRef,
    },
    Count,
    Ref,
    Value,
    Operation {
        is_action: bool,
        is_import: bool,
        parameters: Vec<OperationParameter>,
    },
    Metadata,
    Batch,
}

impl SegmentKind {
    pub fn name(&self) -> &'static str {
        match self {
            SegmentKind::EntitySet => "EntitySet",
            SegmentKind::Singleton => "Singleton",
            SegmentKind::Key { .. } => "Key",
            SegmentKind::Property => "Property",
            SegmentKind::DynamicProperty => "DynamicProperty",
            SegmentKind::NavigationProperty => "NavigationProperty",
            SegmentKind::NavigationPropertyLink => "NavigationPropertyLink",
            SegmentKind::TypeCast { .. } => "TypeCast",
            SegmentKind::Count => "Count",
            SegmentKind::Ref => "Ref",
            SegmentKind::Value => "Value",
            SegmentKind::Operation { .. } => "Operation",
            SegmentKind::Metadata => "Metadata",
            SegmentKind::Batch => "Batch",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathSegment {
    pub kind: SegmentKind,
    /// Name as written: set, property, type or operation name; `$count` etc. for system segments
    pub identifier: String,
    /// Type addressed after this segment, absent for void actions and document segments
    pub target_type: Option<TypeRef>,
    pub navigation_source: Option<NavigationSource>,
}

impl PathSegment {
    pub fn new(kind: SegmentKind, identifier: &str) -> Self {
        Self {
            kind,
            identifier: identifier.to_string(),
            target_type: None,
            navigation_source: None,
        }
    }

    pub fn with_type(mut self, target_type: TypeRef) -> Self {
        self.target_type = Some(target_type);
        self
    }

    pub fn with_source(mut self, source: Option<NavigationSource>) -> Self {
        self.navigation_source = source;
        self
    }

    pub fn is_key(&self) -> bool {
        matches!(self.kind, SegmentKind::Key { .. })
    }

    pub fn is_type_cast(&self) -> bool {
        matches!(self.kind, SegmentKind::TypeCast { .. })
    }

    pub fn is_navigation(&self) -> bool {
        matches!(
            self.kind,
            SegmentKind::NavigationProperty | SegmentKind::NavigationPropertyLink
        )
    }

    /// Segments after which nothing may follow
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            SegmentKind::Count
                | SegmentKind::Ref
                | SegmentKind::Value
                | SegmentKind::Metadata
                | SegmentKind::Batch
        )
    }

    /// Text of this segment as it appears in a path
    pub fn render(&self) -> String {
        match &self.kind {
            SegmentKind::Key { values } => render_key(values),
            SegmentKind::Operation { parameters, .. } if !parameters.is_empty() => {
                let args: Vec<String> = parameters
                    .iter()
                    .map(|p| format!("{}={}", p.name, p.value))
                    .collect();
                format!("{}({})", self.identifier, args.join(","))
            }
            _ => self.identifier.clone(),
        }
    }
}

fn render_key(values: &[KeyValue]) -> String {
    match values {
        [single] => format!("({})", single.value),
        _ => {
            let parts: Vec<String> = values
                .iter()
                .map(|k| format!("{}={}", k.name, k.value))
                .collect();
            format!("({})", parts.join(","))
        }
    }
}

/// Render segments as path text; keys attach to the preceding segment
pub fn render_segments(segments: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        if !segment.is_key() && !out.is_empty() {
            out.push('/');
        }
        out.push_str(&segment.render());
    }
    out
}
