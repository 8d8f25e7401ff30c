//! Schema and container elements
//!
//! These are plain serde structs so a model can be loaded from a JSON document.
//! All type names are namespace-qualified; collection-valued members use
//! `Collection(Namespace.Type)`.

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructuredKind {
    Entity,
    Complex,
}

/// An entity type or a complex type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredType {
    pub name: String,
    pub kind: StructuredKind,
    #[serde(default)]
    pub base_type: Option<String>,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub is_open: bool,
    /// Media entity; enables `$value` on single instances
    #[serde(default)]
    pub has_stream: bool,
    /// Declared key property names, in key order (entity types only)
    #[serde(default)]
    pub key: Vec<String>,
    #[serde(default)]
    pub properties: Vec<StructuralProperty>,
    #[serde(default)]
    pub navigation_properties: Vec<NavigationProperty>,
}

impl StructuredType {
    pub fn entity(name: &str) -> Self {
        Self::new(name, StructuredKind::Entity)
    }

    pub fn complex(name: &str) -> Self {
        Self::new(name, StructuredKind::Complex)
    }

    fn new(name: &str, kind: StructuredKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            base_type: None,
            is_abstract: false,
            is_open: false,
            has_stream: false,
            key: Vec::new(),
            properties: Vec::new(),
            navigation_properties: Vec::new(),
        }
    }

    pub fn with_base(mut self, base_type: &str) -> Self {
        self.base_type = Some(base_type.to_string());
        self
    }

    pub fn with_key(mut self, names: &[&str]) -> Self {
        self.key = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn with_property(mut self, property: StructuralProperty) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_navigation(mut self, navigation: NavigationProperty) -> Self {
        self.navigation_properties.push(navigation);
        self
    }

    pub fn open(mut self) -> Self {
        self.is_open = true;
        self
    }

    pub fn media(mut self) -> Self {
        self.has_stream = true;
        self
    }

    pub fn is_entity(&self) -> bool {
        self.kind == StructuredKind::Entity
    }

    pub fn declared_property(&self, name: &str) -> Option<&StructuralProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn declared_navigation(&self, name: &str) -> Option<&NavigationProperty> {
        self.navigation_properties.iter().find(|n| n.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralProperty {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// Allowed subtypes in addition to the declared type; empty means unconstrained
    #[serde(default)]
    pub derived_type_constraints: Vec<String>,
}

impl StructuralProperty {
    pub fn new(name: &str, type_name: &str) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            nullable: true,
            derived_type_constraints: Vec::new(),
        }
    }

    pub fn with_constraints(mut self, allowed: &[&str]) -> Self {
        self.derived_type_constraints = allowed.iter().map(|t| t.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationProperty {
    pub name: String,
    /// `NS.Entity` or `Collection(NS.Entity)`
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub contains_target: bool,
    #[serde(default)]
    pub partner: Option<String>,
    #[serde(default)]
    pub derived_type_constraints: Vec<String>,
}

impl NavigationProperty {
    pub fn single(name: &str, target: &str) -> Self {
        Self {
            name: name.to_string(),
            type_name: target.to_string(),
            nullable: true,
            contains_target: false,
            partner: None,
            derived_type_constraints: Vec::new(),
        }
    }

    pub fn collection(name: &str, target: &str) -> Self {
        let mut nav = Self::single(name, target);
        nav.type_name = format!("Collection({})", target);
        nav.nullable = false;
        nav
    }

    pub fn contained(mut self) -> Self {
        self.contains_target = true;
        self
    }

    pub fn with_partner(mut self, partner: &str) -> Self {
        self.partner = Some(partner.to_string());
        self
    }

    pub fn with_constraints(mut self, allowed: &[&str]) -> Self {
        self.derived_type_constraints = allowed.iter().map(|t| t.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumType {
    pub name: String,
    pub members: Vec<String>,
    #[serde(default)]
    pub is_flags: bool,
}

impl EnumType {
    pub fn new(name: &str, members: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            members: members.iter().map(|m| m.to_string()).collect(),
            is_flags: false,
        }
    }
}

/// Static navigation target: the binding path is relative to the owning source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationBinding {
    pub path: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySet {
    pub name: String,
    pub entity_type: String,
    #[serde(default)]
    pub navigation_bindings: Vec<NavigationBinding>,
    #[serde(default)]
    pub derived_type_constraints: Vec<String>,
}

impl EntitySet {
    pub fn new(name: &str, entity_type: &str) -> Self {
        Self {
            name: name.to_string(),
            entity_type: entity_type.to_string(),
            navigation_bindings: Vec::new(),
            derived_type_constraints: Vec::new(),
        }
    }

    pub fn with_binding(mut self, path: &str, target: &str) -> Self {
        self.navigation_bindings.push(NavigationBinding {
            path: path.to_string(),
            target: target.to_string(),
        });
        self
    }

    pub fn with_constraints(mut self, allowed: &[&str]) -> Self {
        self.derived_type_constraints = allowed.iter().map(|t| t.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Singleton {
    pub name: String,
    pub entity_type: String,
    #[serde(default)]
    pub navigation_bindings: Vec<NavigationBinding>,
    #[serde(default)]
    pub derived_type_constraints: Vec<String>,
}

impl Singleton {
    pub fn new(name: &str, entity_type: &str) -> Self {
        Self {
            name: name.to_string(),
            entity_type: entity_type.to_string(),
            navigation_bindings: Vec::new(),
            derived_type_constraints: Vec::new(),
        }
    }

    pub fn with_binding(mut self, path: &str, target: &str) -> Self {
        self.navigation_bindings.push(NavigationBinding {
            path: path.to_string(),
            target: target.to_string(),
        });
        self
    }

    pub fn with_constraints(mut self, allowed: &[&str]) -> Self {
        self.derived_type_constraints = allowed.iter().map(|t| t.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Function,
    Action,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

/// A function or action. For bound operations the first parameter is the binding parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    pub kind: OperationKind,
    #[serde(default)]
    pub is_bound: bool,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub return_type: Option<String>,
    #[serde(default)]
    pub is_composable: bool,
    /// `bindingParameter` when the result lives in the binding parameter's source
    #[serde(default)]
    pub entity_set_path: Option<String>,
}

impl Operation {
    pub fn function(name: &str) -> Self {
        Self::new(name, OperationKind::Function)
    }

    pub fn action(name: &str) -> Self {
        Self::new(name, OperationKind::Action)
    }

    fn new(name: &str, kind: OperationKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            is_bound: false,
            parameters: Vec::new(),
            return_type: None,
            is_composable: false,
            entity_set_path: None,
        }
    }

    pub fn bound_to(mut self, binding_type: &str) -> Self {
        self.is_bound = true;
        self.parameters.insert(
            0,
            Parameter {
                name: "bindingParameter".to_string(),
                type_name: binding_type.to_string(),
            },
        );
        self
    }

    pub fn with_parameter(mut self, name: &str, type_name: &str) -> Self {
        self.parameters.push(Parameter {
            name: name.to_string(),
            type_name: type_name.to_string(),
        });
        self
    }

    pub fn returns(mut self, type_name: &str) -> Self {
        self.return_type = Some(type_name.to_string());
        self
    }

    pub fn composable(mut self) -> Self {
        self.is_composable = true;
        self
    }

    pub fn with_entity_set_path(mut self, path: &str) -> Self {
        self.entity_set_path = Some(path.to_string());
        self
    }

    pub fn is_action(&self) -> bool {
        self.kind == OperationKind::Action
    }

    pub fn binding_parameter(&self) -> Option<&Parameter> {
        if self.is_bound {
            self.parameters.first()
        } else {
            None
        }
    }

    /// Parameters supplied in the URI, i.e. all but the binding parameter
    pub fn non_binding_parameters(&self) -> &[Parameter] {
        if self.is_bound && !self.parameters.is_empty() {
            &self.parameters[1..]
        } else {
            &self.parameters
        }
    }

    /// Actions and non-composable functions end a path
    pub fn is_terminal(&self) -> bool {
        self.is_action() || !self.is_composable
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationImport {
    pub name: String,
    pub operation: String,
    #[serde(default)]
    pub entity_set: Option<String>,
}

impl OperationImport {
    pub fn new(name: &str, operation: &str) -> Self {
        Self {
            name: name.to_string(),
            operation: operation.to_string(),
            entity_set: None,
        }
    }

    pub fn with_entity_set(mut self, entity_set: &str) -> Self {
        self.entity_set = Some(entity_set.to_string());
        self
    }
}
