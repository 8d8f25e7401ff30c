//! The bound `$select` / `$expand` tree
//!
//! Each [`ExpandedItem`] owns the clause of its own nested options, so the whole
//! selection is a plain owned tree. Items keep the order they were written in,
//! which is the order the context URL renders them.

use crate::compute::ComputeClause;
use crate::model::{NavigationSource, TypeRef};
use crate::path::{PathSegment, SegmentKind};
use serde::Serialize;
use std::fmt;

/// Render segment identifiers as `Address/NS.WorkAddress/City2`
pub fn path_text(segments: &[PathSegment]) -> String {
    segments
        .iter()
        .map(|s| s.identifier.as_str())
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SelectItem {
    Path {
        segments: Vec<PathSegment>,
        /// Nested `$select` on a complex property: `Address($select=Street)`
        nested: Option<Box<SelectExpandClause>>,
    },
    Wildcard,
    AllOperationsInNamespace {
        namespace: String,
    },
}

impl SelectItem {
    pub fn path(segments: Vec<PathSegment>) -> Self {
        SelectItem::Path {
            segments,
            nested: None,
        }
    }

    pub fn text(&self) -> String {
        match self {
            SelectItem::Path { segments, .. } => path_text(segments),
            SelectItem::Wildcard => "*".to_string(),
            SelectItem::AllOperationsInNamespace { namespace } => format!("{}.*", namespace),
        }
    }

    pub fn segments(&self) -> &[PathSegment] {
        match self {
            SelectItem::Path { segments, .. } => segments,
            _ => &[],
        }
    }

    /// Selects a navigation property without expanding it
    pub fn is_navigation(&self) -> bool {
        self.segments().last().is_some_and(PathSegment::is_navigation)
    }
}

impl fmt::Display for SelectItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExpandKind {
    Resource,
    /// `Nav/$ref`
    Reference,
    /// `Nav/$count`
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Levels {
    Max,
    Count(u32),
}

/// Options written inside an expansion's parentheses, other than `$select` and `$expand`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExpandOptions {
    pub filter: Option<String>,
    pub orderby: Option<String>,
    pub search: Option<String>,
    pub top: Option<u64>,
    pub skip: Option<u64>,
    pub count: Option<bool>,
    pub levels: Option<Levels>,
    pub compute: Option<ComputeClause>,
}

impl ExpandOptions {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpandedItem {
    /// Complex properties and casts leading to the navigation, then the navigation
    /// itself and an optional cast on its target
    pub segments: Vec<PathSegment>,
    pub navigation_source: Option<NavigationSource>,
    /// Item type of the expanded entities after any trailing cast
    pub target_type: TypeRef,
    pub kind: ExpandKind,
    pub options: ExpandOptions,
    pub clause: SelectExpandClause,
    /// The same navigation was also named in `$select`
    pub selected: bool,
}

impl ExpandedItem {
    pub fn path_text(&self) -> String {
        path_text(&self.segments)
    }

    /// Name of the expanded navigation property
    pub fn navigation_name(&self) -> Option<&str> {
        self.segments
            .iter()
            .rev()
            .find(|s| s.kind == SegmentKind::NavigationProperty)
            .map(|s| s.identifier.as_str())
    }

    /// `$count` expansions stand apart; a resource and a `$ref` expansion of the
    /// same path collapse into the resource expansion
    fn same_target(&self, other: &ExpandedItem) -> bool {
        let counts = (self.kind == ExpandKind::Count, other.kind == ExpandKind::Count);
        counts.0 == counts.1 && self.path_text() == other.path_text()
    }

    fn merge(&mut self, other: ExpandedItem) {
        if other.kind == ExpandKind::Resource && self.kind == ExpandKind::Reference {
            self.kind = ExpandKind::Resource;
            self.target_type = other.target_type;
            self.navigation_source = other.navigation_source;
        }
        if self.options.is_empty() {
            self.options = other.options;
        }
        self.selected |= other.selected;
        self.clause.merge(other.clause);
    }

    /// Number of expansions in this subtree, including this one
    pub fn expansion_count(&self) -> usize {
        1 + self.clause.expansion_count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectExpandClause {
    selected: Vec<SelectItem>,
    expanded: Vec<ExpandedItem>,
    /// No `$select` was given: every structural property is included
    all_selected: bool,
}

impl Default for SelectExpandClause {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SelectExpandClause {
    pub fn new(all_selected: bool) -> Self {
        Self {
            selected: Vec::new(),
            expanded: Vec::new(),
            all_selected,
        }
    }

    pub fn selected(&self) -> &[SelectItem] {
        &self.selected
    }

    pub fn expanded(&self) -> &[ExpandedItem] {
        &self.expanded
    }

    pub fn all_selected(&self) -> bool {
        self.all_selected
    }

    pub fn has_wildcard(&self) -> bool {
        self.selected.iter().any(|item| *item == SelectItem::Wildcard)
    }

    /// Nothing selected explicitly and nothing expanded
    pub fn is_default(&self) -> bool {
        self.all_selected && self.selected.is_empty() && self.expanded.is_empty()
    }

    pub fn expansion_count(&self) -> usize {
        self.expanded.iter().map(ExpandedItem::expansion_count).sum()
    }

    /// Add a selection; repeating an item is a no-op
    pub fn add_selected(&mut self, item: SelectItem) {
        self.all_selected = false;
        if let Some(existing) = self.selected.iter_mut().find(|s| s.text() == item.text()) {
            narrow_select(existing, item);
            return;
        }
        self.selected.push(item);
    }

    /// Add an expansion, merging with an earlier one on the same path
    pub fn add_expanded(&mut self, item: ExpandedItem) {
        if let Some(existing) = self.expanded.iter_mut().find(|e| e.same_target(&item)) {
            existing.merge(item);
            return;
        }
        self.expanded.push(item);
    }

    /// Union of two clauses over the same type
    pub fn merge(&mut self, other: SelectExpandClause) {
        if !other.all_selected {
            self.all_selected = false;
            for item in other.selected {
                self.add_selected(item);
            }
        }
        for item in other.expanded {
            self.add_expanded(item);
        }
        self.absorb_selected_expansions();
    }

    /// A navigation both selected and expanded is kept only as the expansion.
    /// A nested `$select` on the selected navigation is merged into the
    /// expansion's own selection.
    pub fn absorb_selected_expansions(&mut self) {
        let mut kept = Vec::with_capacity(self.selected.len());
        for item in std::mem::take(&mut self.selected) {
            let text = item.text();
            let expanded = self
                .expanded
                .iter_mut()
                .find(|e| e.kind == ExpandKind::Resource && e.path_text() == text);
            match (expanded, item) {
                (Some(expansion), SelectItem::Path { nested, .. }) => {
                    expansion.selected = true;
                    if let Some(nested) = nested {
                        expansion.clause.merge(*nested);
                    }
                }
                (_, item) => kept.push(item),
            }
        }
        self.selected = kept;
    }
}

fn narrow_select(existing: &mut SelectItem, incoming: SelectItem) {
    if let (
        SelectItem::Path { nested: existing_nested, .. },
        SelectItem::Path { nested: Some(incoming_nested), .. },
    ) = (existing, incoming)
    {
        match existing_nested {
            Some(current) => current.merge(*incoming_nested),
            None => *existing_nested = Some(incoming_nested),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TypeRef;

    fn nav(name: &str) -> PathSegment {
        PathSegment::new(SegmentKind::NavigationProperty, name).with_type(TypeRef::entity("NS.X"))
    }

    fn prop(name: &str) -> PathSegment {
        PathSegment::new(SegmentKind::Property, name)
    }

    fn expansion(name: &str, clause: SelectExpandClause) -> ExpandedItem {
        ExpandedItem {
            segments: vec![nav(name)],
            navigation_source: None,
            target_type: TypeRef::entity("NS.X"),
            kind: ExpandKind::Resource,
            options: ExpandOptions::default(),
            clause,
            selected: false,
        }
    }

    #[test]
    fn test_select_is_idempotent() {
        let mut clause = SelectExpandClause::new(false);
        clause.add_selected(SelectItem::path(vec![prop("Name")]));
        clause.add_selected(SelectItem::path(vec![prop("Name")]));
        clause.add_selected(SelectItem::Wildcard);
        assert_eq!(clause.selected().len(), 2);
        assert!(clause.has_wildcard());
    }

    #[test]
    fn test_selected_navigation_merges_into_expansion() {
        let mut clause = SelectExpandClause::new(false);
        clause.add_expanded(expansion("Districts", SelectExpandClause::default()));
        clause.add_selected(SelectItem::path(vec![prop("Name")]));
        clause.add_selected(SelectItem::path(vec![nav("Districts")]));
        clause.absorb_selected_expansions();

        assert_eq!(clause.selected().len(), 1);
        assert_eq!(clause.expanded().len(), 1);
        assert!(clause.expanded()[0].selected);
    }

    #[test]
    fn test_nested_select_narrows_expansion() {
        let mut nested = SelectExpandClause::new(false);
        nested.add_selected(SelectItem::path(vec![prop("Zip")]));

        let mut clause = SelectExpandClause::new(false);
        clause.add_expanded(expansion("Districts", SelectExpandClause::default()));
        clause.add_selected(SelectItem::Path {
            segments: vec![nav("Districts")],
            nested: Some(Box::new(nested)),
        });
        clause.absorb_selected_expansions();

        let expanded = &clause.expanded()[0].clause;
        assert!(!expanded.all_selected());
        assert_eq!(expanded.selected()[0].text(), "Zip");
    }

    #[test]
    fn test_merge_is_order_insensitive() {
        let mut narrow = SelectExpandClause::new(false);
        narrow.add_selected(SelectItem::path(vec![prop("Zip")]));

        let mut a = SelectExpandClause::new(true);
        a.add_expanded(expansion("Districts", SelectExpandClause::default()));
        a.add_expanded(expansion("Districts", narrow.clone()));

        let mut b = SelectExpandClause::new(true);
        b.add_expanded(expansion("Districts", narrow));
        b.add_expanded(expansion("Districts", SelectExpandClause::default()));

        assert_eq!(a.expanded().len(), 1);
        assert_eq!(a, b);
    }
}
