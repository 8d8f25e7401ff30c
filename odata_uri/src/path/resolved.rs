use super::segment::{render_segments, PathSegment, SegmentKind};
use crate::model::{NavigationSource, TypeKind, TypeRef};
use serde::Serialize;
use std::fmt;

/// Kind of payload a request or response for a path carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PayloadKind {
    ServiceDocument,
    MetadataDocument,
    Batch,
    ResourceSet,
    Resource,
    Property,
    Collection,
    Value,
    EntityReferenceLink,
    EntityReferenceLinks,
    DeltaResourceSet,
    DeltaResource,
    DeltaDeletedEntry,
    DeltaLink,
    DeltaDeletedLink,
    Unsupported,
}

impl PayloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::ServiceDocument => "ServiceDocument",
            PayloadKind::MetadataDocument => "MetadataDocument",
            PayloadKind::Batch => "Batch",
            PayloadKind::ResourceSet => "ResourceSet",
            PayloadKind::Resource => "Resource",
            PayloadKind::Property => "Property",
            PayloadKind::Collection => "Collection",
            PayloadKind::Value => "Value",
            PayloadKind::EntityReferenceLink => "EntityReferenceLink",
            PayloadKind::EntityReferenceLinks => "EntityReferenceLinks",
            PayloadKind::DeltaResourceSet => "DeltaResourceSet",
            PayloadKind::DeltaResource => "DeltaResource",
            PayloadKind::DeltaDeletedEntry => "DeltaDeletedEntry",
            PayloadKind::DeltaLink => "DeltaLink",
            PayloadKind::DeltaDeletedLink => "DeltaDeletedLink",
            PayloadKind::Unsupported => "Unsupported",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordered segment sequence of a request path. Empty for the service root.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ResolvedPath {
    pub segments: Vec<PathSegment>,
}

impl ResolvedPath {
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn last_segment(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    pub fn target_type(&self) -> Option<&TypeRef> {
        self.last_segment().and_then(|s| s.target_type.as_ref())
    }

    pub fn navigation_source(&self) -> Option<&NavigationSource> {
        self.last_segment()
            .and_then(|s| s.navigation_source.as_ref())
    }

    pub fn is_collection(&self) -> bool {
        self.target_type().map(|t| t.is_collection).unwrap_or(false)
    }

    /// Type cast applied to the addressed entities, e.g. `Customers/NS.VipCustomer(1)`
    pub fn entity_type_cast(&self) -> Option<&str> {
        for segment in self.segments.iter().rev() {
            match &segment.kind {
                SegmentKind::Key { .. } => continue,
                SegmentKind::TypeCast { to_type, .. } if to_type.is_entity() => {
                    return Some(to_type.element_name())
                }
                _ => return None,
            }
        }
        None
    }

    pub fn payload_kind(&self) -> PayloadKind {
        let Some(last) = self.last_segment() else {
            return PayloadKind::ServiceDocument;
        };
        match &last.kind {
            SegmentKind::Metadata => return PayloadKind::MetadataDocument,
            SegmentKind::Batch => return PayloadKind::Batch,
            SegmentKind::Count | SegmentKind::Value => return PayloadKind::Value,
            SegmentKind::Ref => {
                return if self.is_collection() {
                    PayloadKind::EntityReferenceLinks
                } else {
                    PayloadKind::EntityReferenceLink
                }
            }
            _ => {}
        }
        let Some(target) = self.target_type() else {
            return PayloadKind::Unsupported;
        };
        match (&target.kind, target.is_collection) {
            (TypeKind::Entity(_) | TypeKind::Complex(_), true) => PayloadKind::ResourceSet,
            (TypeKind::Entity(_) | TypeKind::Complex(_), false) => PayloadKind::Resource,
            (_, true) => PayloadKind::Collection,
            (_, false) => PayloadKind::Property,
        }
    }
}

impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", render_segments(&self.segments))
    }
}
