//! Segment Resolver
//!
//! Walks the request path one segment at a time against a cursor holding the
//! current type, the current navigation source and the binding path accumulated
//! since the last navigation. Member steps are shared with the `$select` and
//! `$expand` parsers, which resolve their paths in clause mode.

use super::error::PathError;
use super::resolved::ResolvedPath;
use super::segment::{KeyValue, OperationParameter, ParameterValue, PathSegment, SegmentKind};
use crate::config::compile_time::path::{MAX_KEY_VALUES, MAX_SEGMENT_COUNT};
use crate::config::runtime::UriParserSettings;
use crate::literals::{parse_literal, LiteralError, LiteralValue};
use crate::logging::codes;
use crate::model::{
    Member, ModelAccessor, NavigationSource, Operation, PrimitiveKind, TypeRef,
};
use crate::validation::check_derived_type_constraint;
use percent_encoding::percent_decode_str;
use std::collections::HashMap;

/// How collections are treated when stepping into a member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepMode {
    /// Request path: a collection must be keyed or counted before going further
    Path,
    /// `$select` / `$expand` paths: members of collection elements are reachable
    Clause,
}

/// Resolution state between two segments
#[derive(Debug, Clone)]
pub(crate) struct Cursor {
    pub type_ref: TypeRef,
    pub source: Option<NavigationSource>,
    /// Member and cast names since the last navigation, e.g. `Address/WorkAddress`
    pub binding_path: Vec<String>,
    /// Declared element type of the current position
    pub declared: String,
    pub constraints: Vec<String>,
    /// Where the constraints were declared, for error messages
    pub position: String,
    /// Rendered path text up to here
    pub path: String,
}

impl Cursor {
    /// Cursor for clause parsing, positioned at a resolved path's target
    pub(crate) fn at(type_ref: TypeRef, source: Option<NavigationSource>) -> Self {
        let declared = type_ref.element_name().to_string();
        Self {
            type_ref,
            source,
            binding_path: Vec::new(),
            position: declared.clone(),
            declared,
            constraints: Vec::new(),
            path: String::new(),
        }
    }

    fn extend_path(&self, text: &str) -> String {
        if self.path.is_empty() {
            text.to_string()
        } else {
            format!("{}/{}", self.path, text)
        }
    }
}

/// Resolve one member name or type cast against the cursor
pub(crate) fn step_member(
    model: &dyn ModelAccessor,
    cursor: &Cursor,
    name: &str,
    mode: StepMode,
) -> Result<(PathSegment, Cursor), PathError> {
    if name.contains('.') {
        return step_type_cast(model, cursor, name);
    }

    let owner = cursor
        .type_ref
        .structured_name()
        .ok_or_else(|| PathError::PropertyNotFound {
            property: name.to_string(),
            type_name: cursor.type_ref.full_name(),
        })?;

    if mode == StepMode::Path && cursor.type_ref.is_collection {
        crate::log_error!(codes::path::CANNOT_QUERY_COLLECTIONS,
            "Collection traversed without key or $count",
            "segment" => name,
            "collection" => cursor.path
        );
        return Err(PathError::CannotQueryCollections {
            segment: name.to_string(),
            collection: cursor.path.clone(),
        });
    }

    let Some(member) = model.find_member(owner, name) else {
        if model.is_open_type(owner) {
            let segment = PathSegment::new(SegmentKind::DynamicProperty, name)
                .with_type(TypeRef::untyped())
                .with_source(cursor.source.clone());
            let mut next = cursor.clone();
            next.type_ref = TypeRef::untyped();
            next.declared = PrimitiveKind::Untyped.name().to_string();
            next.constraints = Vec::new();
            next.binding_path.push(name.to_string());
            next.path = cursor.extend_path(name);
            return Ok((segment, next));
        }
        return Err(PathError::PropertyNotFound {
            property: name.to_string(),
            type_name: owner.to_string(),
        });
    };

    let member_type = model
        .resolve_type_name(member.type_name())
        .ok_or_else(|| PathError::PropertyNotFound {
            property: name.to_string(),
            type_name: owner.to_string(),
        })?;
    let position = format!("{}/{}", owner, name);

    match member {
        Member::Property(property) => {
            let segment = PathSegment::new(SegmentKind::Property, name)
                .with_type(member_type.clone())
                .with_source(cursor.source.clone());
            let mut binding_path = cursor.binding_path.clone();
            binding_path.push(name.to_string());
            let next = Cursor {
                declared: member_type.element_name().to_string(),
                type_ref: member_type,
                source: cursor.source.clone(),
                binding_path,
                constraints: property.derived_type_constraints.clone(),
                position,
                path: cursor.extend_path(name),
            };
            Ok((segment, next))
        }
        Member::Navigation(navigation) => {
            let path = cursor.extend_path(name);
            let source = if navigation.contains_target {
                Some(NavigationSource::Contained {
                    path: path.clone(),
                    entity_type: member_type.element_name().to_string(),
                    is_collection: member_type.is_collection,
                })
            } else {
                navigation_target(model, cursor, name)
            };
            let segment = PathSegment::new(SegmentKind::NavigationProperty, name)
                .with_type(member_type.clone())
                .with_source(source.clone());
            let next = Cursor {
                declared: member_type.element_name().to_string(),
                type_ref: member_type,
                source,
                binding_path: Vec::new(),
                constraints: navigation.derived_type_constraints.clone(),
                position,
                path,
            };
            Ok((segment, next))
        }
    }
}

fn step_type_cast(
    model: &dyn ModelAccessor,
    cursor: &Cursor,
    type_name: &str,
) -> Result<(PathSegment, Cursor), PathError> {
    let current = cursor.type_ref.element_name();
    let target = model.resolve_type_name(type_name);
    let related = match &target {
        Some(target) if target.is_structured() && !target.is_collection => {
            cursor.type_ref.is_structured() && model.is_same_or_subtype(type_name, current)
        }
        Some(target) => target.element_name() == current,
        None => false,
    };
    if !related {
        crate::log_error!(codes::path::TYPE_MUST_BE_RELATED,
            "Type cast to an unrelated type",
            "type" => type_name,
            "current" => current
        );
        return Err(PathError::InvalidTypeCast {
            type_name: type_name.to_string(),
            current_type: current.to_string(),
        });
    }

    check_derived_type_constraint(&cursor.position, &cursor.declared, &cursor.constraints, type_name)?;

    let to_type = cursor.type_ref.with_element_name(type_name);
    let segment = PathSegment::new(
        SegmentKind::TypeCast {
            from_type: cursor.type_ref.clone(),
            to_type: to_type.clone(),
        },
        type_name,
    )
    .with_type(to_type.clone())
    .with_source(cursor.source.clone());

    let mut next = cursor.clone();
    next.type_ref = to_type;
    next.binding_path.push(type_name.to_string());
    next.path = cursor.extend_path(type_name);
    Ok((segment, next))
}

/// Follow the navigation binding for `name`, first by the exact binding path,
/// then with type-cast segments removed
fn navigation_target(
    model: &dyn ModelAccessor,
    cursor: &Cursor,
    name: &str,
) -> Option<NavigationSource> {
    let source = cursor.source.as_ref()?;
    let mut exact: Vec<&str> = cursor.binding_path.iter().map(String::as_str).collect();
    exact.push(name);
    if let Some(target) = model.find_navigation_target(source, &exact.join("/")) {
        return Some(target);
    }
    let stripped: Vec<&str> = exact.iter().copied().filter(|s| !s.contains('.')).collect();
    let target = model.find_navigation_target(source, &stripped.join("/"));
    if target.is_none() {
        crate::log_debug!("Navigation target unresolved",
            "source" => source.name(),
            "binding_path" => exact.join("/")
        );
    }
    target
}

/// Resolves request paths against a model
pub struct SegmentResolver<'a> {
    model: &'a dyn ModelAccessor,
    settings: &'a UriParserSettings,
    aliases: &'a HashMap<String, String>,
}

impl<'a> SegmentResolver<'a> {
    pub fn new(
        model: &'a dyn ModelAccessor,
        settings: &'a UriParserSettings,
        aliases: &'a HashMap<String, String>,
    ) -> Self {
        Self {
            model,
            settings,
            aliases,
        }
    }

    /// Resolve `request_uri`, absolute or relative, against `service_root`
    pub fn resolve(&self, service_root: &str, request_uri: &str) -> Result<ResolvedPath, PathError> {
        let result = relative_path(service_root, request_uri).and_then(|p| self.resolve_relative(&p));
        match &result {
            Ok(path) => {
                crate::log_success!(codes::success::PATH_RESOLUTION_COMPLETE, "Path resolved",
                    "segments" => path.len(),
                    "payload" => path.payload_kind()
                );
            }
            Err(err) => {
                crate::log_error!(err.error_code(), "Path resolution failed",
                    "uri" => request_uri,
                    "error" => err
                );
            }
        }
        result
    }

    /// Resolve a path already relative to the service root
    pub fn resolve_relative(&self, path: &str) -> Result<ResolvedPath, PathError> {
        let texts = split_path(path)?;
        let mut segments: Vec<PathSegment> = Vec::new();
        let mut cursor: Option<Cursor> = None;

        for (index, text) in texts.iter().enumerate() {
            let (identifier, groups) = split_segment(text)?;
            let before = segments.len();
            if index == 0 {
                cursor = self.resolve_first(&identifier, &groups, &mut segments)?;
            } else {
                let Some(current) = cursor.take() else {
                    let previous = segments.last().map(|s| s.render()).unwrap_or_default();
                    crate::log_error!(codes::path::MUST_BE_LEAF, "Segment after leaf segment",
                        "segment" => text,
                        "previous" => previous
                    );
                    return Err(PathError::MustBeLeaf {
                        segment: text.clone(),
                        previous,
                    });
                };
                cursor = self.resolve_next(current, &identifier, &groups, &mut segments)?;
            }

            if self.settings.log_resolution_details {
                for segment in &segments[before..] {
                    crate::log_debug!("Segment resolved",
                        "kind" => segment.kind.name(),
                        "identifier" => segment.identifier,
                        "type" => segment.target_type.as_ref().map(TypeRef::full_name).unwrap_or_default()
                    );
                }
            }
        }

        Ok(ResolvedPath::new(segments))
    }

    fn resolve_first(
        &self,
        identifier: &str,
        groups: &[String],
        segments: &mut Vec<PathSegment>,
    ) -> Result<Option<Cursor>, PathError> {
        match identifier {
            "$metadata" | "$batch" => {
                if !groups.is_empty() {
                    return Err(PathError::syntax(identifier, "unexpected parentheses"));
                }
                let kind = if identifier == "$metadata" {
                    SegmentKind::Metadata
                } else {
                    SegmentKind::Batch
                };
                segments.push(PathSegment::new(kind, identifier));
                return Ok(None);
            }
            _ => {}
        }

        if let Some(set) = self.model.find_entity_set(identifier) {
            let type_ref = TypeRef::entity(&set.entity_type).into_collection();
            let source = NavigationSource::EntitySet {
                name: set.name.clone(),
                entity_type: set.entity_type.clone(),
            };
            segments.push(
                PathSegment::new(SegmentKind::EntitySet, identifier)
                    .with_type(type_ref.clone())
                    .with_source(Some(source.clone())),
            );
            let cursor = Cursor {
                declared: set.entity_type.clone(),
                type_ref,
                source: Some(source),
                binding_path: Vec::new(),
                constraints: set.derived_type_constraints.clone(),
                position: set.name.clone(),
                path: identifier.to_string(),
            };
            return self.apply_keys(cursor, groups, segments).map(Some);
        }

        if let Some(singleton) = self.model.find_singleton(identifier) {
            if !groups.is_empty() {
                return Err(PathError::KeyNotApplicable {
                    segment: identifier.to_string(),
                });
            }
            let type_ref = TypeRef::entity(&singleton.entity_type);
            let source = NavigationSource::Singleton {
                name: singleton.name.clone(),
                entity_type: singleton.entity_type.clone(),
            };
            segments.push(
                PathSegment::new(SegmentKind::Singleton, identifier)
                    .with_type(type_ref.clone())
                    .with_source(Some(source.clone())),
            );
            return Ok(Some(Cursor {
                declared: singleton.entity_type.clone(),
                type_ref,
                source: Some(source),
                binding_path: Vec::new(),
                constraints: singleton.derived_type_constraints.clone(),
                position: singleton.name.clone(),
                path: identifier.to_string(),
            }));
        }

        if let Some(import) = self.model.find_operation_import(identifier) {
            let operation = self
                .model
                .find_operations(&import.operation)
                .into_iter()
                .find(|op| !op.is_bound)
                .ok_or_else(|| PathError::ResourceNotFound {
                    identifier: identifier.to_string(),
                })?;
            let source = import
                .entity_set
                .as_deref()
                .and_then(|name| self.model.find_navigation_source(name));
            let (params, keys) = match groups.split_first() {
                Some((params, keys)) => (Some(params.as_str()), keys),
                None => (None, groups),
            };
            let cursor = self.operation_segment(operation, identifier, params, true, source, None, segments)?;
            return match cursor {
                Some(cursor) => self.apply_keys(cursor, keys, segments).map(Some),
                None if !keys.is_empty() => Err(PathError::KeyNotApplicable {
                    segment: identifier.to_string(),
                }),
                None => Ok(None),
            };
        }

        Err(PathError::ResourceNotFound {
            identifier: identifier.to_string(),
        })
    }

    fn resolve_next(
        &self,
        cursor: Cursor,
        identifier: &str,
        groups: &[String],
        segments: &mut Vec<PathSegment>,
    ) -> Result<Option<Cursor>, PathError> {
        if identifier.starts_with('$') {
            if !groups.is_empty() {
                return Err(PathError::syntax(identifier, "unexpected parentheses"));
            }
            return match identifier {
                "$count" => self.count_segment(&cursor, segments).map(|_| None),
                "$ref" => self.ref_segment(&cursor, segments).map(|_| None),
                "$value" => self.value_segment(&cursor, segments).map(|_| None),
                _ => Err(PathError::ResourceNotFound {
                    identifier: identifier.to_string(),
                }),
            };
        }

        if identifier.contains('.') && self.model.resolve_type_name(identifier).is_none() {
            let operation = self
                .model
                .find_bound_operation(identifier, &cursor.type_ref)
                .ok_or_else(|| PathError::ResourceNotFound {
                    identifier: identifier.to_string(),
                })?;
            let (params, keys) = match groups.split_first() {
                Some((params, keys)) => (Some(params.as_str()), keys),
                None => (None, groups),
            };
            let source = bound_result_source(self.model, operation, &cursor);
            let next =
                self.operation_segment(operation, identifier, params, false, source, Some(&cursor), segments)?;
            return match next {
                Some(next) => self.apply_keys(next, keys, segments).map(Some),
                None if !keys.is_empty() => Err(PathError::KeyNotApplicable {
                    segment: identifier.to_string(),
                }),
                None => Ok(None),
            };
        }

        let (segment, next) = step_member(self.model, &cursor, identifier, StepMode::Path)?;
        segments.push(segment);
        self.apply_keys(next, groups, segments).map(Some)
    }

    fn count_segment(&self, cursor: &Cursor, segments: &mut Vec<PathSegment>) -> Result<(), PathError> {
        if !cursor.type_ref.is_collection {
            return Err(PathError::CountNotApplicable {
                previous: cursor.path.clone(),
            });
        }
        segments.push(
            PathSegment::new(SegmentKind::Count, "$count")
                .with_type(TypeRef::primitive(PrimitiveKind::Int32))
                .with_source(cursor.source.clone()),
        );
        Ok(())
    }

    fn ref_segment(&self, cursor: &Cursor, segments: &mut Vec<PathSegment>) -> Result<(), PathError> {
        if !cursor.type_ref.is_entity() {
            return Err(PathError::RefNotApplicable {
                previous: cursor.path.clone(),
            });
        }
        let anchor = segments
            .iter_mut()
            .rev()
            .find(|s| !s.is_key() && !s.is_type_cast());
        match anchor {
            Some(segment) if segment.kind == SegmentKind::NavigationProperty => {
                segment.kind = SegmentKind::NavigationPropertyLink;
            }
            Some(segment)
                if matches!(
                    segment.kind,
                    SegmentKind::EntitySet | SegmentKind::Singleton | SegmentKind::Operation { .. }
                ) => {}
            _ => {
                return Err(PathError::RefNotApplicable {
                    previous: cursor.path.clone(),
                })
            }
        }
        segments.push(
            PathSegment::new(SegmentKind::Ref, "$ref")
                .with_type(cursor.type_ref.clone())
                .with_source(cursor.source.clone()),
        );
        Ok(())
    }

    fn value_segment(&self, cursor: &Cursor, segments: &mut Vec<PathSegment>) -> Result<(), PathError> {
        let type_ref = &cursor.type_ref;
        let value_type = if type_ref.is_collection {
            None
        } else if type_ref.is_scalar() {
            Some(type_ref.clone())
        } else if type_ref.is_entity() && self.model.has_stream(type_ref.element_name()) {
            Some(TypeRef::primitive(PrimitiveKind::Stream))
        } else {
            None
        };
        let value_type = value_type.ok_or_else(|| PathError::ValueNotApplicable {
            previous: cursor.path.clone(),
        })?;
        segments.push(
            PathSegment::new(SegmentKind::Value, "$value")
                .with_type(value_type)
                .with_source(cursor.source.clone()),
        );
        Ok(())
    }

    /// Push an operation segment and return the cursor for its result, or `None`
    /// when nothing may follow it
    #[allow(clippy::too_many_arguments)]
    fn operation_segment(
        &self,
        operation: &Operation,
        identifier: &str,
        params: Option<&str>,
        is_import: bool,
        source: Option<NavigationSource>,
        binding: Option<&Cursor>,
        segments: &mut Vec<PathSegment>,
    ) -> Result<Option<Cursor>, PathError> {
        let parameters = match params {
            Some(text) => self.operation_parameters(operation, text)?,
            None => Vec::new(),
        };
        let return_type = operation
            .return_type
            .as_deref()
            .and_then(|name| self.model.resolve_type_name(name));

        let mut segment = PathSegment::new(
            SegmentKind::Operation {
                is_action: operation.is_action(),
                is_import,
                parameters,
            },
            identifier,
        )
        .with_source(source.clone());
        if let Some(return_type) = &return_type {
            segment = segment.with_type(return_type.clone());
        }
        let rendered = segment.render();
        segments.push(segment);

        let Some(return_type) = return_type else {
            return Ok(None);
        };
        if operation.is_terminal() {
            return Ok(None);
        }
        let path = match binding {
            Some(cursor) => cursor.extend_path(&rendered),
            None => rendered,
        };
        Ok(Some(Cursor {
            declared: return_type.element_name().to_string(),
            type_ref: return_type,
            source,
            binding_path: Vec::new(),
            constraints: Vec::new(),
            position: operation.name.clone(),
            path,
        }))
    }

    fn operation_parameters(
        &self,
        operation: &Operation,
        text: &str,
    ) -> Result<Vec<OperationParameter>, PathError> {
        let mut parameters = Vec::new();
        for part in split_top_level(text, ',') {
            let part = part.trim();
            if part.is_empty() {
                if text.trim().is_empty() {
                    continue;
                }
                return Err(PathError::syntax(text, "empty parameter"));
            }
            let (name, raw) = split_assignment(part)
                .ok_or_else(|| PathError::syntax(part, "parameters must be written as name=value"))?;
            let declared = operation
                .non_binding_parameters()
                .iter()
                .find(|p| p.name == name)
                .ok_or_else(|| PathError::ParameterNotDeclared {
                    operation: operation.name.clone(),
                    parameter: name.to_string(),
                })?;
            let declared_type = self.model.resolve_type_name(&declared.type_name);
            let value = match declared_type {
                Some(type_ref) if type_ref.is_scalar() && !type_ref.is_collection => {
                    let literal = self.literal_value(raw)?;
                    ParameterValue::Literal(literal.coerce(&type_ref, self.model)?)
                }
                _ => ParameterValue::Raw(raw.to_string()),
            };
            parameters.push(OperationParameter {
                name: name.to_string(),
                value,
            });
        }
        Ok(parameters)
    }

    fn apply_keys(
        &self,
        cursor: Cursor,
        groups: &[String],
        segments: &mut Vec<PathSegment>,
    ) -> Result<Cursor, PathError> {
        match groups {
            [] => Ok(cursor),
            [group] => self.apply_key(cursor, group, segments),
            _ => Err(PathError::syntax(&cursor.path, "more than one key predicate")),
        }
    }

    fn apply_key(
        &self,
        cursor: Cursor,
        group: &str,
        segments: &mut Vec<PathSegment>,
    ) -> Result<Cursor, PathError> {
        if !cursor.type_ref.is_collection {
            return Err(PathError::KeyNotApplicable {
                segment: cursor.path.clone(),
            });
        }
        let parts: Vec<&str> = split_top_level(group, ',').into_iter().map(str::trim).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(PathError::syntax(group, "empty key value"));
        }
        if parts.len() > MAX_KEY_VALUES {
            return Err(PathError::syntax(group, "too many key values"));
        }

        let values = if cursor.type_ref.is_entity() {
            self.entity_key(cursor.type_ref.element_name(), &parts)?
        } else {
            match parts.as_slice() {
                [single] if split_assignment(single).is_none() => vec![KeyValue {
                    name: String::new(),
                    value: self.literal_value(single)?,
                }],
                _ => {
                    return Err(PathError::syntax(
                        group,
                        "collection elements take one positional key",
                    ))
                }
            }
        };

        let segment = PathSegment::new(SegmentKind::Key { values }, "")
            .with_type(cursor.type_ref.element())
            .with_source(cursor.source.clone());
        let rendered = segment.render();
        segments.push(segment);

        let mut next = cursor;
        next.type_ref = next.type_ref.element();
        next.path.push_str(&rendered);
        Ok(next)
    }

    fn entity_key(&self, entity_type: &str, parts: &[&str]) -> Result<Vec<KeyValue>, PathError> {
        let key = self.model.key_properties(entity_type);
        if parts.len() != key.len() {
            return Err(PathError::KeyCountMismatch {
                type_name: entity_type.to_string(),
                expected: key.len(),
                actual: parts.len(),
            });
        }

        let named: Vec<Option<(&str, &str)>> = parts.iter().map(|p| split_assignment(p)).collect();
        let mut values: Vec<KeyValue> = Vec::with_capacity(key.len());

        if named.iter().all(Option::is_none) {
            let [property] = key.as_slice() else {
                return Err(PathError::KeyMismatch {
                    type_name: entity_type.to_string(),
                    key: parts.join(","),
                });
            };
            let value = self.key_literal(&property.type_name, parts[0])?;
            values.push(KeyValue {
                name: property.name.clone(),
                value,
            });
            return Ok(values);
        }

        for (part, assignment) in parts.iter().zip(&named) {
            let Some((name, raw)) = assignment else {
                return Err(PathError::KeyMismatch {
                    type_name: entity_type.to_string(),
                    key: part.to_string(),
                });
            };
            let property = key
                .iter()
                .find(|p| p.name == *name)
                .filter(|_| !values.iter().any(|v| v.name == *name))
                .ok_or_else(|| PathError::KeyMismatch {
                    type_name: entity_type.to_string(),
                    key: name.to_string(),
                })?;
            let value = self.key_literal(&property.type_name, raw)?;
            values.push(KeyValue {
                name: property.name.clone(),
                value,
            });
        }
        Ok(values)
    }

    fn key_literal(&self, type_name: &str, raw: &str) -> Result<LiteralValue, PathError> {
        let literal = self.literal_value(raw)?;
        match self.model.resolve_type_name(type_name) {
            Some(type_ref) => Ok(literal.coerce(&type_ref, self.model)?),
            None => Ok(literal),
        }
    }

    /// Literal text, with `@alias` replaced by the alias value from the query string
    fn literal_value(&self, raw: &str) -> Result<LiteralValue, PathError> {
        if let Some(alias) = raw.strip_prefix('@') {
            let value = self.aliases.get(alias).ok_or_else(|| LiteralError::Unrecognized {
                text: raw.to_string(),
            })?;
            return Ok(parse_literal(value)?);
        }
        Ok(parse_literal(raw)?)
    }
}

/// Source of a bound operation's result when its entity set path starts at the binding parameter
fn bound_result_source(
    model: &dyn ModelAccessor,
    operation: &Operation,
    cursor: &Cursor,
) -> Option<NavigationSource> {
    let path = operation.entity_set_path.as_deref()?;
    let rest = path.strip_prefix("bindingParameter")?;
    let source = cursor.source.clone()?;
    match rest.strip_prefix('/') {
        Some(binding_path) => model.find_navigation_target(&source, binding_path),
        None if rest.is_empty() => Some(source),
        None => None,
    }
}

/// The request path relative to the service root, without query or fragment
fn relative_path(service_root: &str, request_uri: &str) -> Result<String, PathError> {
    let request = strip_query(request_uri);
    let mut root = strip_query(service_root).to_string();
    if !root.ends_with('/') {
        root.push('/');
    }
    let incorrect = || PathError::IncorrectBaseUri {
        request_uri: request_uri.to_string(),
        service_root: service_root.to_string(),
    };

    let rest = if request.contains("://") {
        strip_prefix_ignore_case(request, &root)
            .or_else(|| {
                strip_prefix_ignore_case(request, root.trim_end_matches('/')).filter(|r| r.is_empty())
            })
            .ok_or_else(incorrect)?
    } else if request.starts_with('/') {
        let root_path = match root.find("://") {
            Some(scheme_end) => {
                let after = &root[scheme_end + 3..];
                after.find('/').map(|i| &after[i..]).unwrap_or("/")
            }
            None if root.starts_with('/') => root.as_str(),
            None => "/",
        };
        strip_prefix_ignore_case(request, root_path)
            .or_else(|| {
                strip_prefix_ignore_case(request, root_path.trim_end_matches('/'))
                    .filter(|r| r.is_empty())
            })
            .ok_or_else(incorrect)?
    } else {
        request
    };
    Ok(rest.to_string())
}

fn strip_query(uri: &str) -> &str {
    uri.split(['?', '#']).next().unwrap_or(uri)
}

fn strip_prefix_ignore_case<'t>(text: &'t str, prefix: &str) -> Option<&'t str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        text.get(prefix.len()..)
    } else {
        None
    }
}

/// Split on `/` and percent-decode; a trailing `/` is ignored
fn split_path(path: &str) -> Result<Vec<String>, PathError> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let mut raw = split_top_level(path, '/');
    if raw.last().is_some_and(|s| s.is_empty()) {
        raw.pop();
    }
    if raw.len() > MAX_SEGMENT_COUNT {
        return Err(PathError::TooManySegments {
            count: raw.len(),
            max: MAX_SEGMENT_COUNT,
        });
    }
    raw.into_iter()
        .enumerate()
        .map(|(position, segment)| {
            if segment.is_empty() {
                return Err(PathError::EmptySegment { position });
            }
            percent_decode_str(segment)
                .decode_utf8()
                .map(|decoded| decoded.into_owned())
                .map_err(|_| PathError::InvalidEncoding {
                    segment: segment.to_string(),
                })
        })
        .collect()
}

/// Separate `Name(a)(b)` into the name and the inner text of each parenthesized group
fn split_segment(text: &str) -> Result<(String, Vec<String>), PathError> {
    let Some(open) = text.find('(') else {
        return Ok((text.to_string(), Vec::new()));
    };
    let identifier = &text[..open];
    if identifier.is_empty() {
        return Err(PathError::syntax(text, "key predicate without a resource name"));
    }

    let mut groups = Vec::new();
    let mut rest = &text[open..];
    while !rest.is_empty() {
        if !rest.starts_with('(') {
            return Err(PathError::syntax(text, "unexpected text after ')'"));
        }
        let close = matching_paren(rest).ok_or_else(|| PathError::syntax(text, "unbalanced parentheses"))?;
        groups.push(rest[1..close].to_string());
        rest = &rest[close + 1..];
    }
    Ok((identifier.to_string(), groups))
}

/// Byte index of the `)` closing the `(` at the start of `text`
fn matching_paren(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    for (index, c) in text.char_indices() {
        match c {
            '\'' => in_string = !in_string,
            '(' | '[' | '{' if !in_string => depth += 1,
            ')' | ']' | '}' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on `separator` outside quotes and brackets
pub(crate) fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut start = 0;
    for (index, c) in text.char_indices() {
        match c {
            '\'' => in_string = !in_string,
            '(' | '[' | '{' if !in_string => depth += 1,
            ')' | ']' | '}' if !in_string => depth = depth.saturating_sub(1),
            c if c == separator && !in_string && depth == 0 => {
                parts.push(&text[start..index]);
                start = index + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// `name=value` at the top level of a key or parameter part
fn split_assignment(part: &str) -> Option<(&str, &str)> {
    let pieces = split_top_level(part, '=');
    match pieces.as_slice() {
        [name, _] => {
            let value = &part[name.len() + 1..];
            let name = name.trim();
            let is_name = !name.is_empty()
                && name.chars().all(|c| c.is_alphanumeric() || c == '_');
            is_name.then(|| (name, value.trim()))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::sample_model;
    use crate::path::PayloadKind;
    use assert_matches::assert_matches;

    const ROOT: &str = "http://host/service/";

    fn resolve(path: &str) -> Result<ResolvedPath, PathError> {
        let model = sample_model();
        let settings = UriParserSettings::default();
        let aliases = HashMap::from([("k".to_string(), "'key'".to_string())]);
        SegmentResolver::new(&model, &settings, &aliases).resolve(ROOT, &format!("{}{}", ROOT, path))
    }

    fn kinds(path: &ResolvedPath) -> Vec<&'static str> {
        path.segments.iter().map(|s| s.kind.name()).collect()
    }

    #[test]
    fn test_entity_set_and_key() {
        let path = resolve("Cities(1)").unwrap();
        assert_eq!(kinds(&path), vec!["EntitySet", "Key"]);
        assert!(!path.is_collection());
        assert_eq!(path.payload_kind(), PayloadKind::Resource);
        assert_eq!(path.navigation_source().unwrap().name(), "Cities");
        assert_eq!(path.to_string(), "Cities(1)");
    }

    #[test]
    fn test_collection_valued_complex_property_cannot_be_traversed() {
        let err = resolve("Me/Addresses/City").unwrap_err();
        assert_matches!(err, PathError::CannotQueryCollections { .. });
        assert_eq!(err.error_code().as_str(), "RequestUriProcessor_CannotQueryCollections");
    }

    #[test]
    fn test_keyed_or_counted_complex_collection_succeeds() {
        let keyed = resolve("Me/Addresses('k')/City").unwrap();
        assert_eq!(
            kinds(&keyed),
            vec!["Singleton", "Property", "Key", "NavigationProperty"]
        );
        let counted = resolve("Me/Addresses/$count").unwrap();
        assert_eq!(counted.payload_kind(), PayloadKind::Value);
    }

    #[test]
    fn test_navigation_declared_on_derived_complex_type() {
        let path = resolve("Me/Address/WorkAddress/NS.WorkAddress/City2").unwrap();
        assert_eq!(
            kinds(&path),
            vec!["Singleton", "Property", "Property", "TypeCast", "NavigationProperty"]
        );
        assert_eq!(path.navigation_source().unwrap().name(), "Cities");
    }

    #[test]
    fn test_navigation_on_complex_uses_binding_path() {
        let path = resolve("People(1)/Address/City").unwrap();
        assert_eq!(path.navigation_source().unwrap().name(), "Cities");
        let unbound = resolve("Me/Addresses('x')/City").unwrap();
        assert_eq!(unbound.navigation_source(), None);
    }

    #[test]
    fn test_unrelated_type_cast_fails() {
        let err = resolve("Me/Address/NS.City").unwrap_err();
        assert_matches!(err, PathError::InvalidTypeCast { .. });
    }

    #[test]
    fn test_type_cast_respects_derived_type_constraint() {
        assert!(resolve("TopCustomer/NS.VipCustomer").is_ok());
        let err = resolve("TopCustomer/NS.NormalCustomer").unwrap_err();
        assert_eq!(
            err.error_code().as_str(),
            "ReaderValidationUtils_ValueTypeNotAllowedInDerivedTypeConstraint"
        );
        let err = resolve("Orders(1)/Customer/NS.NormalCustomer").unwrap_err();
        assert_matches!(err, PathError::Constraint(_));
    }

    #[test]
    fn test_contained_navigation_source() {
        let path = resolve("People(1)/Trips").unwrap();
        assert_matches!(
            path.navigation_source(),
            Some(NavigationSource::Contained { path, .. }) if path == "People(1)/Trips"
        );
        assert_eq!(path.payload_kind(), PayloadKind::ResourceSet);
    }

    #[test]
    fn test_composite_key() {
        let path = resolve("Products(Id=1,Code='A')").unwrap();
        assert_matches!(&path.segments[1].kind, SegmentKind::Key { values } if values.len() == 2);
        assert_eq!(path.to_string(), "Products(Id=1,Code='A')");
        assert_matches!(
            resolve("Products(1)"),
            Err(PathError::KeyCountMismatch { expected: 2, actual: 1, .. })
        );
        assert_matches!(resolve("Products(Id=1,Nope='A')"), Err(PathError::KeyMismatch { .. }));
    }

    #[test]
    fn test_key_literal_is_coerced() {
        let err = resolve("Cities('x')").unwrap_err();
        assert_matches!(err, PathError::Literal(LiteralError::TypeVerificationFailure { .. }));
        let path = resolve("Photos(3)").unwrap();
        assert_matches!(&path.segments[1].kind, SegmentKind::Key { values } if values[0].value == LiteralValue::Int(3));
    }

    #[test]
    fn test_key_from_parameter_alias() {
        let path = resolve("Me/Addresses(@k)").unwrap();
        assert_matches!(
            &path.segments[2].kind,
            SegmentKind::Key { values } if values[0].value == LiteralValue::String("key".into())
        );
    }

    #[test]
    fn test_key_on_single_value_fails() {
        assert_matches!(resolve("Cities(1)(2)"), Err(PathError::Syntax { .. }));
        assert_matches!(resolve("Me(1)"), Err(PathError::KeyNotApplicable { .. }));
    }

    #[test]
    fn test_bound_function_on_collection() {
        let path = resolve("Cities/NS.MostPopulous()").unwrap();
        assert_eq!(kinds(&path), vec!["EntitySet", "Operation"]);
        assert_eq!(path.navigation_source().unwrap().name(), "Cities");
        assert_eq!(path.payload_kind(), PayloadKind::Resource);
        let chained = resolve("Cities/NS.MostPopulous()/Name").unwrap();
        assert_eq!(chained.payload_kind(), PayloadKind::Property);
    }

    #[test]
    fn test_non_composable_function_is_leaf() {
        assert!(resolve("Cities(1)/NS.GetDistrictCount()").is_ok());
        assert_matches!(
            resolve("Cities(1)/NS.GetDistrictCount()/Name"),
            Err(PathError::MustBeLeaf { .. })
        );
    }

    #[test]
    fn test_bound_action_and_undeclared_parameter() {
        let path = resolve("Cities(1)/NS.Rate").unwrap();
        assert_eq!(path.payload_kind(), PayloadKind::Unsupported);
        assert_matches!(
            resolve("GetTopCities(limit=3)"),
            Err(PathError::ParameterNotDeclared { .. })
        );
    }

    #[test]
    fn test_function_import_with_parameters() {
        let path = resolve("GetTopCities(count=3)").unwrap();
        assert_eq!(path.navigation_source().unwrap().name(), "Cities");
        assert_eq!(path.payload_kind(), PayloadKind::ResourceSet);
        assert_eq!(path.to_string(), "GetTopCities(count=3)");
        let keyed = resolve("GetTopCities(count=3)(1)/Name").unwrap();
        assert_eq!(keyed.payload_kind(), PayloadKind::Property);
    }

    #[test]
    fn test_ref_rewrites_navigation_to_link() {
        let path = resolve("Cities(1)/Districts/$ref").unwrap();
        assert_eq!(
            kinds(&path),
            vec!["EntitySet", "Key", "NavigationPropertyLink", "Ref"]
        );
        assert_eq!(path.payload_kind(), PayloadKind::EntityReferenceLinks);
        assert_matches!(resolve("Cities(1)/Name/$ref"), Err(PathError::RefNotApplicable { .. }));
        assert_matches!(resolve("Cities/$ref/Name"), Err(PathError::MustBeLeaf { .. }));
    }

    #[test]
    fn test_value_segment() {
        assert_eq!(resolve("Cities(1)/Name/$value").unwrap().payload_kind(), PayloadKind::Value);
        assert!(resolve("Photos(1)/$value").is_ok());
        assert_matches!(resolve("Cities(1)/$value"), Err(PathError::ValueNotApplicable { .. }));
        assert_matches!(resolve("Cities(1)/$count"), Err(PathError::CountNotApplicable { .. }));
    }

    #[test]
    fn test_open_type_dynamic_property() {
        let path = resolve("People(1)/Nickname").unwrap();
        assert_eq!(path.last_segment().unwrap().kind, SegmentKind::DynamicProperty);
        assert_matches!(resolve("Cities(1)/Nickname"), Err(PathError::PropertyNotFound { .. }));
    }

    #[test]
    fn test_document_segments() {
        assert_eq!(resolve("").unwrap().payload_kind(), PayloadKind::ServiceDocument);
        assert_eq!(resolve("$metadata").unwrap().payload_kind(), PayloadKind::MetadataDocument);
        assert_matches!(resolve("$batch/Cities"), Err(PathError::MustBeLeaf { .. }));
    }

    #[test]
    fn test_base_uri_and_segment_errors() {
        let model = sample_model();
        let settings = UriParserSettings::default();
        let aliases = HashMap::new();
        let resolver = SegmentResolver::new(&model, &settings, &aliases);
        assert_matches!(
            resolver.resolve(ROOT, "http://other/Cities"),
            Err(PathError::IncorrectBaseUri { .. })
        );
        assert!(resolver.resolve(ROOT, "HTTP://HOST/service/Cities?$top=1").is_ok());
        assert!(resolver.resolve(ROOT, "/service/Cities(1)").is_ok());
        assert!(resolver.resolve(ROOT, "Cities/").is_ok());
        assert_matches!(resolver.resolve(ROOT, "Cities//$count"), Err(PathError::EmptySegment { position: 1 }));
        assert_matches!(resolver.resolve(ROOT, "Nowhere"), Err(PathError::ResourceNotFound { .. }));
        assert_matches!(resolver.resolve(ROOT, "Cities('%FF')"), Err(PathError::InvalidEncoding { .. }));
    }

    #[test]
    fn test_percent_encoded_key() {
        let path = resolve("Products(Id=1,Code=%27A%2FB%27)").unwrap();
        assert_matches!(
            &path.segments[1].kind,
            SegmentKind::Key { values } if values[1].value == LiteralValue::String("A/B".into())
        );
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let first = resolve("Me/Address/WorkAddress/NS.WorkAddress/City2").unwrap();
        let second = resolve("Me/Address/WorkAddress/NS.WorkAddress/City2").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_split_helpers() {
        assert_eq!(split_top_level("a='x,y',b=(1,2)", ','), vec!["a='x,y'", "b=(1,2)"]);
        assert_eq!(split_assignment("Code='a=b'"), Some(("Code", "'a=b'")));
        assert_eq!(split_assignment("'a=b'"), None);
        let (name, groups) = split_segment("F(a=1)(2)").unwrap();
        assert_eq!(name, "F");
        assert_eq!(groups, vec!["a=1".to_string(), "2".to_string()]);
    }
}
