//! Read-only model interface used by every resolver component

use super::elements::{
    EntitySet, EnumType, NavigationProperty, Operation, OperationImport, Singleton,
    StructuralProperty, StructuredType,
};
use super::types::{split_collection, PrimitiveKind, TypeRef};
use serde::Serialize;

/// Base type chains longer than this are treated as broken
const MAX_INHERITANCE_DEPTH: usize = 64;

/// A member found on a structured type or one of its base types
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Member<'a> {
    Property(&'a StructuralProperty),
    Navigation(&'a NavigationProperty),
}

impl<'a> Member<'a> {
    pub fn name(&self) -> &'a str {
        match *self {
            Member::Property(p) => &p.name,
            Member::Navigation(n) => &n.name,
        }
    }

    pub fn type_name(&self) -> &'a str {
        match *self {
            Member::Property(p) => &p.type_name,
            Member::Navigation(n) => &n.type_name,
        }
    }

    pub fn derived_type_constraints(&self) -> &'a [String] {
        match *self {
            Member::Property(p) => &p.derived_type_constraints,
            Member::Navigation(n) => &n.derived_type_constraints,
        }
    }
}

/// Where the entities addressed by a path live
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum NavigationSource {
    EntitySet { name: String, entity_type: String },
    Singleton { name: String, entity_type: String },
    /// Target of a containment navigation; `path` is rendered from the container
    Contained {
        path: String,
        entity_type: String,
        is_collection: bool,
    },
}

impl NavigationSource {
    /// Name used in context URLs
    pub fn name(&self) -> &str {
        match self {
            NavigationSource::EntitySet { name, .. } | NavigationSource::Singleton { name, .. } => {
                name
            }
            NavigationSource::Contained { path, .. } => path,
        }
    }

    pub fn entity_type(&self) -> &str {
        match self {
            NavigationSource::EntitySet { entity_type, .. }
            | NavigationSource::Singleton { entity_type, .. }
            | NavigationSource::Contained { entity_type, .. } => entity_type,
        }
    }

    pub fn is_singleton(&self) -> bool {
        matches!(self, NavigationSource::Singleton { .. })
    }

    pub fn is_collection(&self) -> bool {
        match self {
            NavigationSource::EntitySet { .. } => true,
            NavigationSource::Singleton { .. } => false,
            NavigationSource::Contained { is_collection, .. } => *is_collection,
        }
    }
}

/// Lookup operations over an immutable model
///
/// Implementors provide the direct lookups; type hierarchy walks, member search and
/// binding resolution are derived from them.
pub trait ModelAccessor: Send + Sync {
    fn find_structured_type(&self, name: &str) -> Option<&StructuredType>;

    fn find_enum_type(&self, name: &str) -> Option<&EnumType>;

    fn find_entity_set(&self, name: &str) -> Option<&EntitySet>;

    fn find_singleton(&self, name: &str) -> Option<&Singleton>;

    fn find_operation_import(&self, name: &str) -> Option<&OperationImport>;

    /// All overloads sharing a qualified name
    fn find_operations(&self, qualified_name: &str) -> Vec<&Operation>;

    /// The type and its base types, most derived first
    fn type_chain(&self, type_name: &str) -> Vec<&StructuredType> {
        let mut chain = Vec::new();
        let mut current = self.find_structured_type(type_name);
        while let Some(ty) = current {
            if chain.len() >= MAX_INHERITANCE_DEPTH {
                break;
            }
            chain.push(ty);
            current = ty
                .base_type
                .as_deref()
                .and_then(|base| self.find_structured_type(base));
        }
        chain
    }

    /// Declared or inherited property or navigation property
    fn find_member(&self, type_name: &str, member: &str) -> Option<Member<'_>> {
        for ty in self.type_chain(type_name) {
            if let Some(p) = ty.declared_property(member) {
                return Some(Member::Property(p));
            }
            if let Some(n) = ty.declared_navigation(member) {
                return Some(Member::Navigation(n));
            }
        }
        None
    }

    /// Declared and inherited navigation properties, most derived first
    fn navigation_properties(&self, type_name: &str) -> Vec<&NavigationProperty> {
        self.type_chain(type_name)
            .into_iter()
            .flat_map(|ty| ty.navigation_properties.iter())
            .collect()
    }

    /// Key properties in declaration order; keys are inherited from the root entity type
    fn key_properties(&self, type_name: &str) -> Vec<&StructuralProperty> {
        let chain = self.type_chain(type_name);
        let Some(keyed) = chain.iter().find(|ty| !ty.key.is_empty()) else {
            return Vec::new();
        };
        keyed
            .key
            .iter()
            .filter_map(|name| match self.find_member(type_name, name) {
                Some(Member::Property(p)) => Some(p),
                _ => None,
            })
            .collect()
    }

    fn is_same_or_subtype(&self, candidate: &str, base: &str) -> bool {
        self.type_chain(candidate).iter().any(|ty| ty.name == base)
    }

    fn is_open_type(&self, type_name: &str) -> bool {
        self.type_chain(type_name).iter().any(|ty| ty.is_open)
    }

    fn has_stream(&self, type_name: &str) -> bool {
        self.type_chain(type_name).iter().any(|ty| ty.has_stream)
    }

    /// Resolve `NS.Type`, `Edm.X` or `Collection(...)` to a type reference
    fn resolve_type_name(&self, type_name: &str) -> Option<TypeRef> {
        let (is_collection, element) = split_collection(type_name);
        let resolved = if let Some(kind) = PrimitiveKind::from_name(element) {
            TypeRef::primitive(kind)
        } else if self.find_enum_type(element).is_some() {
            TypeRef::enumeration(element)
        } else {
            let ty = self.find_structured_type(element)?;
            if ty.is_entity() {
                TypeRef::entity(element)
            } else {
                TypeRef::complex(element)
            }
        };
        Some(resolved.with_collection(is_collection))
    }

    /// The bound overload applicable to `binding`, preferring an exact binding type
    fn find_bound_operation(&self, qualified_name: &str, binding: &TypeRef) -> Option<&Operation> {
        let candidates: Vec<&Operation> = self
            .find_operations(qualified_name)
            .into_iter()
            .filter(|op| op.is_bound)
            .filter(|op| {
                let Some(param) = op.binding_parameter() else {
                    return false;
                };
                let (is_collection, element) = split_collection(&param.type_name);
                is_collection == binding.is_collection
                    && (element == binding.element_name()
                        || self.is_same_or_subtype(binding.element_name(), element))
            })
            .collect();

        candidates
            .iter()
            .find(|op| {
                op.binding_parameter()
                    .map(|p| split_collection(&p.type_name).1 == binding.element_name())
                    .unwrap_or(false)
            })
            .or_else(|| candidates.first())
            .copied()
    }

    /// Entity set or singleton by container name
    fn find_navigation_source(&self, name: &str) -> Option<NavigationSource> {
        if let Some(set) = self.find_entity_set(name) {
            return Some(NavigationSource::EntitySet {
                name: set.name.clone(),
                entity_type: set.entity_type.clone(),
            });
        }
        self.find_singleton(name).map(|s| NavigationSource::Singleton {
            name: s.name.clone(),
            entity_type: s.entity_type.clone(),
        })
    }

    /// Follow a navigation binding declared on `source` for `binding_path`
    fn find_navigation_target(
        &self,
        source: &NavigationSource,
        binding_path: &str,
    ) -> Option<NavigationSource> {
        let bindings = match source {
            NavigationSource::EntitySet { name, .. } => {
                &self.find_entity_set(name)?.navigation_bindings
            }
            NavigationSource::Singleton { name, .. } => &self.find_singleton(name)?.navigation_bindings,
            NavigationSource::Contained { .. } => return None,
        };
        let target = bindings.iter().find(|b| b.path == binding_path)?;
        self.find_navigation_source(&target.target)
    }

    /// Derived-type constraints declared on a container element
    fn source_type_constraints(&self, source: &NavigationSource) -> Vec<String> {
        match source {
            NavigationSource::EntitySet { name, .. } => self
                .find_entity_set(name)
                .map(|s| s.derived_type_constraints.clone())
                .unwrap_or_default(),
            NavigationSource::Singleton { name, .. } => self
                .find_singleton(name)
                .map(|s| s.derived_type_constraints.clone())
                .unwrap_or_default(),
            NavigationSource::Contained { .. } => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::sample_model;

    #[test]
    fn test_find_member_walks_base_types() {
        let model = sample_model();
        assert!(matches!(
            model.find_member("NS.WorkAddress", "Street"),
            Some(Member::Property(_))
        ));
        assert!(matches!(
            model.find_member("NS.WorkAddress", "City2"),
            Some(Member::Navigation(_))
        ));
        assert!(model.find_member("NS.Address", "City2").is_none());
    }

    #[test]
    fn test_subtype_checks() {
        let model = sample_model();
        assert!(model.is_same_or_subtype("NS.VipCustomer", "NS.Customer"));
        assert!(!model.is_same_or_subtype("NS.Customer", "NS.VipCustomer"));
    }

    #[test]
    fn test_inherited_key() {
        let model = sample_model();
        let keys = model.key_properties("NS.VipCustomer");
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].name, "Id");
    }

    #[test]
    fn test_resolve_type_name() {
        let model = sample_model();
        let t = model.resolve_type_name("Collection(NS.Address)").unwrap();
        assert!(t.is_collection && t.is_complex());
        assert!(model.resolve_type_name("NS.Color").unwrap().is_scalar());
        assert!(model.resolve_type_name("NS.Missing").is_none());
    }

    #[test]
    fn test_navigation_target_follows_binding() {
        let model = sample_model();
        let me = model.find_navigation_source("Me").unwrap();
        assert!(me.is_singleton());
        let target = model.find_navigation_target(&me, "Address/City").unwrap();
        assert_eq!(target.name(), "Cities");
        assert!(model.find_navigation_target(&me, "Address/Nowhere").is_none());
    }

    #[test]
    fn test_bound_operation_matches_binding_type() {
        let model = sample_model();
        let cities = TypeRef::entity("NS.City").into_collection();
        let op = model.find_bound_operation("NS.MostPopulous", &cities).unwrap();
        assert!(op.is_composable);
        assert!(model
            .find_bound_operation("NS.MostPopulous", &TypeRef::entity("NS.City"))
            .is_none());
    }
}
