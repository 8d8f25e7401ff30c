//! Transformations and the output shape they produce

use crate::compute::ComputeClause;
use crate::expression::{ExpressionScope, TypedExpression};
use crate::model::{NavigationSource, TypeRef};
use crate::path::PathSegment;
use crate::select_expand::path_text;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AggregateMethod {
    Sum,
    Min,
    Max,
    Average,
    CountDistinct,
    /// Namespace-qualified method supplied by the service
    Custom(String),
}

impl AggregateMethod {
    pub fn from_name(name: &str) -> Option<Self> {
        let method = match name {
            "sum" => AggregateMethod::Sum,
            "min" => AggregateMethod::Min,
            "max" => AggregateMethod::Max,
            "average" => AggregateMethod::Average,
            "countdistinct" => AggregateMethod::CountDistinct,
            custom if custom.contains('.') => AggregateMethod::Custom(custom.to_string()),
            _ => return None,
        };
        Some(method)
    }

    pub fn name(&self) -> &str {
        match self {
            AggregateMethod::Sum => "sum",
            AggregateMethod::Min => "min",
            AggregateMethod::Max => "max",
            AggregateMethod::Average => "average",
            AggregateMethod::CountDistinct => "countdistinct",
            AggregateMethod::Custom(name) => name,
        }
    }
}

impl fmt::Display for AggregateMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AggregateKind {
    /// `$count as Alias`
    Count,
    Method {
        expression: TypedExpression,
        method: AggregateMethod,
        /// `from` grouping paths, outermost last
        from: Vec<Vec<PathSegment>>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateStatement {
    pub kind: AggregateKind,
    pub alias: String,
    pub type_ref: TypeRef,
}

/// A `groupby` path such as `Address/City/Name`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupingProperty {
    pub segments: Vec<PathSegment>,
    pub type_ref: TypeRef,
}

impl GroupingProperty {
    pub fn path_text(&self) -> String {
        path_text(&self.segments)
    }

    /// First member name, the one visible at the top level of the output
    pub fn root_name(&self) -> &str {
        self.segments
            .first()
            .map(|s| s.identifier.as_str())
            .unwrap_or_default()
    }

    /// `Nav(Prop)` form used in context URLs
    pub fn projection(&self) -> String {
        let names: Vec<&str> = self.segments.iter().map(|s| s.identifier.as_str()).collect();
        let mut out = names.join("(");
        out.push_str(&")".repeat(names.len().saturating_sub(1)));
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Transformation {
    Aggregate {
        statements: Vec<AggregateStatement>,
    },
    GroupBy {
        properties: Vec<GroupingProperty>,
        aggregate: Option<Vec<AggregateStatement>>,
    },
    /// Boolean expression text, carried unevaluated
    Filter {
        text: String,
    },
    Compute {
        clause: ComputeClause,
    },
    Expand {
        segments: Vec<PathSegment>,
        navigation_source: Option<NavigationSource>,
        nested: Option<Box<ApplyClause>>,
    },
}

impl Transformation {
    pub fn name(&self) -> &'static str {
        match self {
            Transformation::Aggregate { .. } => "aggregate",
            Transformation::GroupBy { .. } => "groupby",
            Transformation::Filter { .. } => "filter",
            Transformation::Compute { .. } => "compute",
            Transformation::Expand { .. } => "expand",
        }
    }
}

/// Properties visible after the pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutputShape {
    /// Set once an aggregation replaced the declared properties
    restricted: bool,
    grouped: Vec<GroupingProperty>,
    aliases: Vec<(String, TypeRef)>,
}

impl OutputShape {
    pub fn is_restricted(&self) -> bool {
        self.restricted
    }

    pub fn grouped(&self) -> &[GroupingProperty] {
        &self.grouped
    }

    pub fn aliases(&self) -> &[(String, TypeRef)] {
        &self.aliases
    }

    pub fn alias_type(&self, alias: &str) -> Option<&TypeRef> {
        self.aliases.iter().find(|(a, _)| a == alias).map(|(_, t)| t)
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.alias_type(name).is_some()
    }

    /// Top-level names of the output, grouping roots first
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for property in &self.grouped {
            let root = property.root_name().to_string();
            if !names.contains(&root) {
                names.push(root);
            }
        }
        names.extend(self.aliases.iter().map(|(a, _)| a.clone()));
        names
    }

    /// Context URL projection items: `Name`, `Nav(Prop)`, aliases
    pub fn projection(&self) -> Vec<String> {
        let mut items: Vec<String> = Vec::new();
        for property in &self.grouped {
            let item = property.projection();
            if !items.contains(&item) {
                items.push(item);
            }
        }
        items.extend(self.aliases.iter().map(|(a, _)| a.clone()));
        items
    }

    /// Aggregation replaces everything visible so far
    pub(crate) fn aggregate(&mut self, grouped: Vec<GroupingProperty>, aliases: Vec<(String, TypeRef)>) {
        self.restricted = true;
        self.grouped = grouped;
        self.aliases = aliases;
    }

    pub(crate) fn add_alias(&mut self, alias: &str, type_ref: TypeRef) {
        self.aliases.push((alias.to_string(), type_ref));
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApplyClause {
    pub transformations: Vec<Transformation>,
    pub shape: OutputShape,
}

impl ApplyClause {
    pub fn is_empty(&self) -> bool {
        self.transformations.is_empty()
    }

    /// Expose the output to later options: aliases become dynamic properties,
    /// and after an aggregation only the output names stay visible
    pub fn register(&self, scope: &mut ExpressionScope<'_>) {
        if self.shape.is_restricted() {
            scope.clear_dynamic();
            scope.restrict_to(
                self.shape
                    .grouped()
                    .iter()
                    .map(|g| g.root_name().to_string())
                    .collect(),
            );
        }
        for (alias, type_ref) in self.shape.aliases() {
            scope.add_dynamic(alias, type_ref.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PrimitiveKind;
    use crate::path::SegmentKind;

    fn grouping(names: &[&str]) -> GroupingProperty {
        GroupingProperty {
            segments: names
                .iter()
                .map(|n| PathSegment::new(SegmentKind::Property, n))
                .collect(),
            type_ref: TypeRef::primitive(PrimitiveKind::String),
        }
    }

    #[test]
    fn test_grouping_projection() {
        assert_eq!(grouping(&["Name"]).projection(), "Name");
        assert_eq!(grouping(&["Address", "City", "Name"]).projection(), "Address(City(Name))");
    }

    #[test]
    fn test_shape_names_and_projection() {
        let mut shape = OutputShape::default();
        assert!(!shape.is_restricted());
        shape.aggregate(
            vec![grouping(&["Address", "Zip"]), grouping(&["Address", "Street"]), grouping(&["Name"])],
            vec![("Total".to_string(), TypeRef::primitive(PrimitiveKind::Decimal))],
        );
        assert_eq!(shape.names(), vec!["Address", "Name", "Total"]);
        assert_eq!(
            shape.projection(),
            vec!["Address(Zip)", "Address(Street)", "Name", "Total"]
        );
        assert!(shape.is_alias("Total"));
    }

    #[test]
    fn test_method_names() {
        assert_eq!(AggregateMethod::from_name("average"), Some(AggregateMethod::Average));
        assert_eq!(
            AggregateMethod::from_name("NS.median"),
            Some(AggregateMethod::Custom("NS.median".to_string()))
        );
        assert_eq!(AggregateMethod::from_name("median"), None);
    }
}
