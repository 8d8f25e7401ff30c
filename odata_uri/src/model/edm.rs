//! In-memory model built from a JSON document

use super::accessor::{Member, ModelAccessor};
use super::elements::{
    EntitySet, EnumType, Operation, OperationImport, Singleton, StructuredKind, StructuredType,
};
use super::error::ModelError;
use super::types::split_collection;
use crate::logging::codes;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Serialized form of a model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelDocument {
    #[serde(default)]
    pub types: Vec<StructuredType>,
    #[serde(default)]
    pub enum_types: Vec<EnumType>,
    #[serde(default)]
    pub entity_sets: Vec<EntitySet>,
    #[serde(default)]
    pub singletons: Vec<Singleton>,
    #[serde(default)]
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub operation_imports: Vec<OperationImport>,
}

impl ModelDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, ty: StructuredType) -> Self {
        self.types.push(ty);
        self
    }

    pub fn with_enum(mut self, ty: EnumType) -> Self {
        self.enum_types.push(ty);
        self
    }

    pub fn with_entity_set(mut self, set: EntitySet) -> Self {
        self.entity_sets.push(set);
        self
    }

    pub fn with_singleton(mut self, singleton: Singleton) -> Self {
        self.singletons.push(singleton);
        self
    }

    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn with_operation_import(mut self, import: OperationImport) -> Self {
        self.operation_imports.push(import);
        self
    }
}

/// Validated model with name indexes
#[derive(Debug, Clone, Default)]
pub struct EdmModel {
    types: HashMap<String, StructuredType>,
    enum_types: HashMap<String, EnumType>,
    entity_sets: HashMap<String, EntitySet>,
    singletons: HashMap<String, Singleton>,
    operations: HashMap<String, Vec<Operation>>,
    operation_imports: HashMap<String, OperationImport>,
}

impl EdmModel {
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let document: ModelDocument = serde_json::from_str(json).map_err(|e| {
            crate::log_error!(codes::model::INVALID_MODEL_DOCUMENT, "Model document is not valid JSON",
                "error" => e
            );
            ModelError::InvalidDocument(e)
        })?;
        Self::from_document(document)
    }

    /// Index and validate a document
    pub fn from_document(document: ModelDocument) -> Result<Self, ModelError> {
        let mut model = EdmModel::default();
        let mut schema_names: HashSet<String> = HashSet::new();
        let mut container_names: HashSet<String> = HashSet::new();

        for ty in document.types {
            claim_name(&mut schema_names, &ty.name)?;
            model.types.insert(ty.name.clone(), ty);
        }
        for ty in document.enum_types {
            claim_name(&mut schema_names, &ty.name)?;
            model.enum_types.insert(ty.name.clone(), ty);
        }
        for set in document.entity_sets {
            claim_name(&mut container_names, &set.name)?;
            model.entity_sets.insert(set.name.clone(), set);
        }
        for singleton in document.singletons {
            claim_name(&mut container_names, &singleton.name)?;
            model.singletons.insert(singleton.name.clone(), singleton);
        }
        for import in document.operation_imports {
            claim_name(&mut container_names, &import.name)?;
            model.operation_imports.insert(import.name.clone(), import);
        }
        for operation in document.operations {
            model
                .operations
                .entry(operation.name.clone())
                .or_default()
                .push(operation);
        }

        if let Err(e) = model.validate() {
            crate::log_error!(e.error_code(), "Model validation failed", "error" => e);
            return Err(e);
        }

        crate::log_success!(codes::success::MODEL_LOADED, "Model loaded",
            "types" => model.types.len(),
            "entity_sets" => model.entity_sets.len(),
            "singletons" => model.singletons.len(),
            "operations" => model.operations.len()
        );
        Ok(model)
    }

    fn validate(&self) -> Result<(), ModelError> {
        for ty in self.types.values() {
            self.validate_structured_type(ty)?;
        }
        for set in self.entity_sets.values() {
            self.expect_entity_type(&set.entity_type, &set.name)?;
            for binding in &set.navigation_bindings {
                self.expect_container_target(&binding.target, &set.name)?;
            }
        }
        for singleton in self.singletons.values() {
            self.expect_entity_type(&singleton.entity_type, &singleton.name)?;
            for binding in &singleton.navigation_bindings {
                self.expect_container_target(&binding.target, &singleton.name)?;
            }
        }
        for operation in self.operations.values().flatten() {
            for param in &operation.parameters {
                self.expect_type(&param.type_name, &operation.name)?;
            }
            if let Some(ret) = &operation.return_type {
                self.expect_type(ret, &operation.name)?;
            }
        }
        for import in self.operation_imports.values() {
            if !self.operations.contains_key(&import.operation) {
                return Err(ModelError::unknown_type(&import.operation, &import.name));
            }
            if let Some(set) = &import.entity_set {
                if !self.entity_sets.contains_key(set) {
                    return Err(ModelError::unknown_type(set, &import.name));
                }
            }
        }
        Ok(())
    }

    fn validate_structured_type(&self, ty: &StructuredType) -> Result<(), ModelError> {
        if let Some(base) = &ty.base_type {
            let base_ty = self
                .types
                .get(base)
                .filter(|b| b.kind == ty.kind)
                .ok_or_else(|| ModelError::unknown_type(base, &ty.name))?;
            let mut seen = HashSet::new();
            seen.insert(ty.name.as_str());
            let mut current = Some(base_ty);
            while let Some(b) = current {
                if !seen.insert(b.name.as_str()) {
                    return Err(ModelError::CyclicBaseType {
                        type_name: ty.name.clone(),
                    });
                }
                current = b.base_type.as_ref().and_then(|n| self.types.get(n));
            }
        }

        for property in &ty.properties {
            let owner = format!("{}/{}", ty.name, property.name);
            self.expect_type(&property.type_name, &owner)?;
            for allowed in &property.derived_type_constraints {
                self.expect_type(allowed, &owner)?;
            }
        }
        for nav in &ty.navigation_properties {
            let owner = format!("{}/{}", ty.name, nav.name);
            let (_, target) = split_collection(&nav.type_name);
            self.expect_entity_type(target, &owner)?;
            for allowed in &nav.derived_type_constraints {
                self.expect_entity_type(allowed, &owner)?;
            }
        }

        if ty.kind == StructuredKind::Entity {
            for key in &ty.key {
                let is_primitive_property = match self.find_member(&ty.name, key) {
                    Some(Member::Property(p)) => self
                        .resolve_type_name(&p.type_name)
                        .map(|t| t.is_scalar() && !t.is_collection)
                        .unwrap_or(false),
                    _ => false,
                };
                if !is_primitive_property {
                    return Err(ModelError::InvalidKey {
                        type_name: ty.name.clone(),
                        property: key.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn expect_type(&self, type_name: &str, owner: &str) -> Result<(), ModelError> {
        self.resolve_type_name(type_name)
            .map(|_| ())
            .ok_or_else(|| ModelError::unknown_type(type_name, owner))
    }

    fn expect_entity_type(&self, type_name: &str, owner: &str) -> Result<(), ModelError> {
        match self.types.get(type_name) {
            Some(ty) if ty.is_entity() => Ok(()),
            _ => Err(ModelError::unknown_type(type_name, owner)),
        }
    }

    fn expect_container_target(&self, target: &str, owner: &str) -> Result<(), ModelError> {
        if self.entity_sets.contains_key(target) || self.singletons.contains_key(target) {
            Ok(())
        } else {
            Err(ModelError::unknown_type(target, owner))
        }
    }

    pub fn entity_set_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entity_sets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn claim_name(names: &mut HashSet<String>, name: &str) -> Result<(), ModelError> {
    if names.insert(name.to_string()) {
        Ok(())
    } else {
        Err(ModelError::DuplicateElement {
            name: name.to_string(),
        })
    }
}

impl ModelAccessor for EdmModel {
    fn find_structured_type(&self, name: &str) -> Option<&StructuredType> {
        self.types.get(name)
    }

    fn find_enum_type(&self, name: &str) -> Option<&EnumType> {
        self.enum_types.get(name)
    }

    fn find_entity_set(&self, name: &str) -> Option<&EntitySet> {
        self.entity_sets.get(name)
    }

    fn find_singleton(&self, name: &str) -> Option<&Singleton> {
        self.singletons.get(name)
    }

    fn find_operation_import(&self, name: &str) -> Option<&OperationImport> {
        self.operation_imports.get(name)
    }

    fn find_operations(&self, qualified_name: &str) -> Vec<&Operation> {
        self.operations
            .get(qualified_name)
            .map(|ops| ops.iter().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::elements::{NavigationProperty, StructuralProperty};
    use crate::model::test_support::sample_model;
    use assert_matches::assert_matches;

    #[test]
    fn test_sample_model_is_valid() {
        let model = sample_model();
        assert!(model.find_entity_set("Cities").is_some());
        assert!(model.find_singleton("Me").is_some());
        assert!(model.entity_set_names().contains(&"People"));
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "types": [
                {"name": "NS.Item", "kind": "entity", "key": ["Id"],
                 "properties": [{"name": "Id", "type": "Edm.Int32", "nullable": false}]}
            ],
            "entity_sets": [{"name": "Items", "entity_type": "NS.Item"}]
        }"#;
        let model = EdmModel::from_json(json).unwrap();
        assert_eq!(model.key_properties("NS.Item").len(), 1);
    }

    #[test]
    fn test_invalid_json_rejected() {
        let err = EdmModel::from_json("{ not json").unwrap_err();
        assert_matches!(err, ModelError::InvalidDocument(_));
        assert_eq!(err.error_code(), codes::model::INVALID_MODEL_DOCUMENT);
    }

    #[test]
    fn test_duplicate_type_rejected() {
        let doc = ModelDocument::new()
            .with_type(StructuredType::complex("NS.A"))
            .with_type(StructuredType::complex("NS.A"));
        assert_matches!(
            EdmModel::from_document(doc),
            Err(ModelError::DuplicateElement { .. })
        );
    }

    #[test]
    fn test_unknown_property_type_rejected() {
        let doc = ModelDocument::new()
            .with_type(StructuredType::complex("NS.A").with_property(StructuralProperty::new("X", "NS.Missing")));
        assert_matches!(
            EdmModel::from_document(doc),
            Err(ModelError::UnknownTypeReference { type_name, .. }) if type_name == "NS.Missing"
        );
    }

    #[test]
    fn test_navigation_must_target_entity() {
        let doc = ModelDocument::new()
            .with_type(StructuredType::complex("NS.A"))
            .with_type(
                StructuredType::entity("NS.B")
                    .with_key(&["Id"])
                    .with_property(StructuralProperty::new("Id", "Edm.Int32"))
                    .with_navigation(NavigationProperty::single("ToA", "NS.A")),
            );
        assert!(EdmModel::from_document(doc).is_err());
    }

    #[test]
    fn test_key_must_be_primitive_property() {
        let doc = ModelDocument::new()
            .with_type(StructuredType::complex("NS.A"))
            .with_type(
                StructuredType::entity("NS.B")
                    .with_key(&["Addr"])
                    .with_property(StructuralProperty::new("Addr", "NS.A")),
            );
        assert_matches!(
            EdmModel::from_document(doc),
            Err(ModelError::InvalidKey { property, .. }) if property == "Addr"
        );
    }

    #[test]
    fn test_cyclic_base_type_rejected() {
        let doc = ModelDocument::new()
            .with_type(StructuredType::complex("NS.A").with_base("NS.B"))
            .with_type(StructuredType::complex("NS.B").with_base("NS.A"));
        assert_matches!(
            EdmModel::from_document(doc),
            Err(ModelError::CyclicBaseType { .. })
        );
    }
}
