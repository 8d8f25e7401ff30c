use super::error::ContextUrlError;
use crate::apply::ApplyClause;
use crate::compute::ComputeClause;
use crate::logging::codes;
use crate::model::{NavigationSource, TypeRef};
use crate::path::PayloadKind;
use crate::select_expand::{path_text, ExpandKind, SelectExpandClause, SelectItem};
use crate::uri_parser::ODataUri;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ODataVersion {
    V4,
    #[default]
    V401,
}

impl fmt::Display for ODataVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ODataVersion::V4 => write!(f, "4.0"),
            ODataVersion::V401 => write!(f, "4.01"),
        }
    }
}

/// What is known about a payload when its context URL is requested
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextUrlInfo {
    pub navigation_source: Option<NavigationSource>,
    /// Entity type cast following the source, e.g. `NS.VipCustomer`
    pub type_cast: Option<String>,
    /// Static element type of the payload
    pub type_name: Option<String>,
    /// Type annotation carried by the value; wins over `type_name`
    pub type_annotation: Option<String>,
    pub is_collection: bool,
    pub select_expand: Option<SelectExpandClause>,
    pub apply: Option<ApplyClause>,
    pub compute: Option<ComputeClause>,
}

impl ContextUrlInfo {
    pub fn for_source(source: NavigationSource) -> Self {
        Self {
            is_collection: source.is_collection(),
            type_name: Some(source.entity_type().to_string()),
            navigation_source: Some(source),
            ..Self::default()
        }
    }

    pub fn for_type(type_name: &str, is_collection: bool) -> Self {
        Self {
            type_name: Some(type_name.to_string()),
            is_collection,
            ..Self::default()
        }
    }

    /// Derive source, cast, type and clauses from a parsed request URI.
    ///
    /// A complex value is described by its type alone: the owning entity's
    /// source stays on the path but does not name the payload.
    pub fn from_uri(uri: &ODataUri) -> Self {
        let is_complex = uri.path.target_type().map(TypeRef::is_complex).unwrap_or(false);
        Self {
            navigation_source: uri
                .path
                .navigation_source()
                .filter(|_| !is_complex)
                .cloned(),
            type_cast: uri
                .path
                .entity_type_cast()
                .filter(|_| !is_complex)
                .map(str::to_string),
            type_name: uri.path.target_type().map(|t| t.element_name().to_string()),
            type_annotation: None,
            is_collection: uri.path.is_collection(),
            select_expand: uri.select_expand.clone(),
            apply: uri.apply.clone(),
            compute: uri.compute.clone(),
        }
    }

    pub fn with_type_cast(mut self, type_cast: &str) -> Self {
        self.type_cast = Some(type_cast.to_string());
        self
    }

    pub fn with_type_annotation(mut self, type_name: &str) -> Self {
        self.type_annotation = Some(type_name.to_string());
        self
    }

    pub fn with_select_expand(mut self, clause: SelectExpandClause) -> Self {
        self.select_expand = Some(clause);
        self
    }

    pub fn with_apply(mut self, clause: ApplyClause) -> Self {
        self.apply = Some(clause);
        self
    }

    fn value_type(&self) -> Option<&str> {
        self.type_annotation.as_deref().or(self.type_name.as_deref())
    }
}

#[derive(Debug, Clone)]
pub struct ContextUrlBuilder {
    metadata_uri: Option<String>,
    version: ODataVersion,
}

impl ContextUrlBuilder {
    /// `metadata_uri` is `None` in no-metadata mode
    pub fn new(metadata_uri: Option<&str>, version: ODataVersion) -> Self {
        Self {
            metadata_uri: metadata_uri.map(str::to_string),
            version,
        }
    }

    pub fn version(&self) -> ODataVersion {
        self.version
    }

    /// Build the context URL for a payload.
    ///
    /// Returns `Ok(None)` in no-metadata mode, for payloads without a context URL,
    /// and on the request side when the payload cannot be described.
    pub fn build(
        &self,
        kind: PayloadKind,
        info: &ContextUrlInfo,
        is_response: bool,
    ) -> Result<Option<String>, ContextUrlError> {
        let Some(metadata_uri) = &self.metadata_uri else {
            return Ok(None);
        };

        match fragment(kind, info) {
            Ok(Some(fragment)) => {
                let url = if fragment.is_empty() {
                    metadata_uri.clone()
                } else {
                    format!("{}#{}", metadata_uri, fragment)
                };
                crate::log_success!(codes::success::CONTEXT_URL_BUILT, "Context URL built",
                    "kind" => kind,
                    "version" => self.version,
                    "url" => url
                );
                Ok(Some(url))
            }
            Ok(None) => Ok(None),
            Err(e) if !is_response => {
                crate::log_debug!("No context URL for request payload",
                    "kind" => kind,
                    "reason" => e
                );
                Ok(None)
            }
            Err(e) => {
                crate::log_error!(e.error_code(), "Context URL cannot be built",
                    "kind" => kind,
                    "error" => e
                );
                Err(e)
            }
        }
    }
}

fn fragment(kind: PayloadKind, info: &ContextUrlInfo) -> Result<Option<String>, ContextUrlError> {
    match kind {
        PayloadKind::ServiceDocument => Ok(Some(String::new())),
        PayloadKind::MetadataDocument
        | PayloadKind::Batch
        | PayloadKind::Value
        | PayloadKind::Unsupported => Ok(None),
        PayloadKind::EntityReferenceLink => Ok(Some("$ref".to_string())),
        PayloadKind::EntityReferenceLinks => Ok(Some("Collection($ref)".to_string())),
        PayloadKind::Property | PayloadKind::Collection => property_fragment(kind, info).map(Some),
        PayloadKind::ResourceSet
        | PayloadKind::Resource
        | PayloadKind::DeltaResourceSet
        | PayloadKind::DeltaResource
        | PayloadKind::DeltaDeletedEntry
        | PayloadKind::DeltaLink
        | PayloadKind::DeltaDeletedLink => resource_fragment(kind, info).map(Some),
    }
}

fn property_fragment(kind: PayloadKind, info: &ContextUrlInfo) -> Result<String, ContextUrlError> {
    let is_collection = kind == PayloadKind::Collection || info.is_collection;
    let Some(type_name) = info.value_type() else {
        return Err(if is_collection {
            ContextUrlError::TypeMissingForCollection
        } else {
            ContextUrlError::TypeMissingForProperty
        });
    };
    Ok(if is_collection {
        format!("Collection({})", type_name)
    } else {
        type_name.to_string()
    })
}

fn resource_fragment(kind: PayloadKind, info: &ContextUrlInfo) -> Result<String, ContextUrlError> {
    let Some(source) = &info.navigation_source else {
        // no source: the type alone describes the payload
        let Some(type_name) = info.value_type() else {
            return Err(ContextUrlError::SourceOrTypeMissing {
                kind: kind.to_string(),
            });
        };
        let is_set = matches!(kind, PayloadKind::ResourceSet | PayloadKind::DeltaResourceSet);
        return Ok(if is_set || (info.is_collection && kind != PayloadKind::Resource) {
            format!("Collection({})", type_name)
        } else {
            type_name.to_string()
        });
    };

    let mut out = source.name().to_string();
    if let Some(cast) = &info.type_cast {
        out.push('/');
        out.push_str(cast);
    }
    if let Some(items) = projection(info) {
        out.push('(');
        out.push_str(&items.join(","));
        out.push(')');
    }

    let suffix = match kind {
        PayloadKind::Resource if !source.is_singleton() => "/$entity",
        PayloadKind::DeltaResourceSet => "/$delta",
        PayloadKind::DeltaResource => "/$entity",
        PayloadKind::DeltaDeletedEntry => "/$deletedEntity",
        PayloadKind::DeltaLink => "/$link",
        PayloadKind::DeltaDeletedLink => "/$deletedLink",
        _ => "",
    };
    out.push_str(suffix);
    Ok(out)
}

/// Parenthesized projection list. After an aggregation the apply output shape,
/// extended by `$compute` aliases, takes precedence over `$select`. A pipeline
/// without aggregation keeps the declared properties, so `$select` decides.
fn projection(info: &ContextUrlInfo) -> Option<Vec<String>> {
    let aggregated = info
        .apply
        .as_ref()
        .filter(|a| !a.is_empty() && a.shape.is_restricted());
    if let Some(apply) = aggregated {
        let mut items = apply.shape.projection();
        if let Some(compute) = &info.compute {
            items.extend(compute.aliases().map(str::to_string));
        }
        if let Some(selected) = info.select_expand.as_ref().and_then(selected_roots) {
            items.retain(|item| selected.iter().any(|name| projection_root(item) == *name));
        }
        return (!items.is_empty()).then_some(items);
    }

    let items = clause_projection(info.select_expand.as_ref()?);
    (!items.is_empty()).then_some(items)
}

/// Root names picked by an explicit `$select`, or `None` when everything is selected
fn selected_roots(clause: &SelectExpandClause) -> Option<Vec<&str>> {
    if clause.all_selected() || clause.has_wildcard() {
        return None;
    }
    let roots = clause
        .selected()
        .iter()
        .filter_map(|item| item.segments().first())
        .chain(clause.expanded().iter().filter_map(|e| e.segments.first()))
        .map(|segment| segment.identifier.as_str())
        .collect();
    Some(roots)
}

fn projection_root(item: &str) -> &str {
    item.split('(').next().unwrap_or(item)
}

fn clause_projection(clause: &SelectExpandClause) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    let mut push = |item: String| {
        if !items.contains(&item) {
            items.push(item);
        }
    };

    for item in clause.selected() {
        match item {
            SelectItem::Wildcard => push("*".to_string()),
            SelectItem::AllOperationsInNamespace { namespace } => push(format!("{}.*", namespace)),
            SelectItem::Path { segments, nested } => {
                let text = path_text(segments);
                match nested {
                    Some(nested) => push(format!("{}({})", text, clause_projection(nested).join(","))),
                    None => push(text),
                }
            }
        }
    }

    for expanded in clause.expanded() {
        match expanded.kind {
            ExpandKind::Count => {}
            ExpandKind::Reference => push(expanded.path_text()),
            ExpandKind::Resource => push(format!(
                "{}({})",
                expanded.path_text(),
                clause_projection(&expanded.clause).join(",")
            )),
        }
    }
    items
}
