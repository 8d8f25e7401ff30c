//! Type references handed out by the model and carried by resolved segments

use serde::{Deserialize, Serialize};
use std::fmt;

/// Primitive types of the `Edm` namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Binary,
    Boolean,
    Byte,
    Date,
    DateTimeOffset,
    Decimal,
    Double,
    Duration,
    Guid,
    Int16,
    Int32,
    Int64,
    SByte,
    Single,
    Stream,
    String,
    TimeOfDay,
    /// Value of a dynamic property or an untyped expression
    Untyped,
}

impl PrimitiveKind {
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "Edm.Binary" => PrimitiveKind::Binary,
            "Edm.Boolean" => PrimitiveKind::Boolean,
            "Edm.Byte" => PrimitiveKind::Byte,
            "Edm.Date" => PrimitiveKind::Date,
            "Edm.DateTimeOffset" => PrimitiveKind::DateTimeOffset,
            "Edm.Decimal" => PrimitiveKind::Decimal,
            "Edm.Double" => PrimitiveKind::Double,
            "Edm.Duration" => PrimitiveKind::Duration,
            "Edm.Guid" => PrimitiveKind::Guid,
            "Edm.Int16" => PrimitiveKind::Int16,
            "Edm.Int32" => PrimitiveKind::Int32,
            "Edm.Int64" => PrimitiveKind::Int64,
            "Edm.SByte" => PrimitiveKind::SByte,
            "Edm.Single" => PrimitiveKind::Single,
            "Edm.Stream" => PrimitiveKind::Stream,
            "Edm.String" => PrimitiveKind::String,
            "Edm.TimeOfDay" => PrimitiveKind::TimeOfDay,
            "Edm.Untyped" => PrimitiveKind::Untyped,
            _ => return None,
        };
        Some(kind)
    }

    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveKind::Binary => "Edm.Binary",
            PrimitiveKind::Boolean => "Edm.Boolean",
            PrimitiveKind::Byte => "Edm.Byte",
            PrimitiveKind::Date => "Edm.Date",
            PrimitiveKind::DateTimeOffset => "Edm.DateTimeOffset",
            PrimitiveKind::Decimal => "Edm.Decimal",
            PrimitiveKind::Double => "Edm.Double",
            PrimitiveKind::Duration => "Edm.Duration",
            PrimitiveKind::Guid => "Edm.Guid",
            PrimitiveKind::Int16 => "Edm.Int16",
            PrimitiveKind::Int32 => "Edm.Int32",
            PrimitiveKind::Int64 => "Edm.Int64",
            PrimitiveKind::SByte => "Edm.SByte",
            PrimitiveKind::Single => "Edm.Single",
            PrimitiveKind::Stream => "Edm.Stream",
            PrimitiveKind::String => "Edm.String",
            PrimitiveKind::TimeOfDay => "Edm.TimeOfDay",
            PrimitiveKind::Untyped => "Edm.Untyped",
        }
    }

    /// Width rank of integral types, used for numeric promotion
    pub fn integral_rank(&self) -> Option<u8> {
        match self {
            PrimitiveKind::Byte | PrimitiveKind::SByte => Some(1),
            PrimitiveKind::Int16 => Some(2),
            PrimitiveKind::Int32 => Some(3),
            PrimitiveKind::Int64 => Some(4),
            _ => None,
        }
    }

    pub fn is_integral(&self) -> bool {
        self.integral_rank().is_some()
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, PrimitiveKind::Single | PrimitiveKind::Double)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integral() || self.is_floating() || *self == PrimitiveKind::Decimal
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            PrimitiveKind::Date
                | PrimitiveKind::DateTimeOffset
                | PrimitiveKind::TimeOfDay
                | PrimitiveKind::Duration
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Primitive(PrimitiveKind),
    Enum(String),
    Complex(String),
    Entity(String),
}

/// A possibly collection-valued reference to a model type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    pub kind: TypeKind,
    pub is_collection: bool,
}

impl TypeRef {
    pub fn primitive(kind: PrimitiveKind) -> Self {
        Self {
            kind: TypeKind::Primitive(kind),
            is_collection: false,
        }
    }

    pub fn entity(name: &str) -> Self {
        Self {
            kind: TypeKind::Entity(name.to_string()),
            is_collection: false,
        }
    }

    pub fn complex(name: &str) -> Self {
        Self {
            kind: TypeKind::Complex(name.to_string()),
            is_collection: false,
        }
    }

    pub fn enumeration(name: &str) -> Self {
        Self {
            kind: TypeKind::Enum(name.to_string()),
            is_collection: false,
        }
    }

    pub fn untyped() -> Self {
        Self::primitive(PrimitiveKind::Untyped)
    }

    pub fn into_collection(mut self) -> Self {
        self.is_collection = true;
        self
    }

    pub fn with_collection(mut self, is_collection: bool) -> Self {
        self.is_collection = is_collection;
        self
    }

    /// The single-valued item type of this reference
    pub fn element(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            is_collection: false,
        }
    }

    /// Qualified name of the item type, without `Collection(...)`
    pub fn element_name(&self) -> &str {
        match &self.kind {
            TypeKind::Primitive(kind) => kind.name(),
            TypeKind::Enum(name) | TypeKind::Complex(name) | TypeKind::Entity(name) => name,
        }
    }

    /// Qualified name including `Collection(...)` wrapping
    pub fn full_name(&self) -> String {
        if self.is_collection {
            format!("Collection({})", self.element_name())
        } else {
            self.element_name().to_string()
        }
    }

    /// Replace the item type name while keeping kind family and collection-ness
    pub fn with_element_name(&self, name: &str) -> Self {
        let kind = match &self.kind {
            TypeKind::Entity(_) => TypeKind::Entity(name.to_string()),
            TypeKind::Complex(_) => TypeKind::Complex(name.to_string()),
            other => other.clone(),
        };
        Self {
            kind,
            is_collection: self.is_collection,
        }
    }

    pub fn structured_name(&self) -> Option<&str> {
        match &self.kind {
            TypeKind::Complex(name) | TypeKind::Entity(name) => Some(name),
            _ => None,
        }
    }

    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match &self.kind {
            TypeKind::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn is_entity(&self) -> bool {
        matches!(self.kind, TypeKind::Entity(_))
    }

    pub fn is_complex(&self) -> bool {
        matches!(self.kind, TypeKind::Complex(_))
    }

    pub fn is_structured(&self) -> bool {
        self.is_entity() || self.is_complex()
    }

    pub fn is_untyped(&self) -> bool {
        self.kind == TypeKind::Primitive(PrimitiveKind::Untyped)
    }

    /// Primitive or enum, the kinds `$value` and property payloads carry
    pub fn is_scalar(&self) -> bool {
        matches!(self.kind, TypeKind::Primitive(_) | TypeKind::Enum(_))
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

/// Split `Collection(X)` into `(true, "X")`, anything else into `(false, name)`
pub fn split_collection(type_name: &str) -> (bool, &str) {
    match type_name
        .strip_prefix("Collection(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        Some(inner) => (true, inner.trim()),
        None => (false, type_name.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_names_round_trip() {
        for kind in [
            PrimitiveKind::Int32,
            PrimitiveKind::Decimal,
            PrimitiveKind::DateTimeOffset,
            PrimitiveKind::Untyped,
        ] {
            assert_eq!(PrimitiveKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(PrimitiveKind::from_name("NS.City"), None);
    }

    #[test]
    fn test_numeric_classification() {
        assert!(PrimitiveKind::Int16.is_integral());
        assert!(PrimitiveKind::Double.is_floating());
        assert!(PrimitiveKind::Decimal.is_numeric());
        assert!(!PrimitiveKind::String.is_numeric());
        assert!(PrimitiveKind::Int64.integral_rank() > PrimitiveKind::Int32.integral_rank());
    }

    #[test]
    fn test_type_ref_names() {
        let districts = TypeRef::entity("NS.District").into_collection();
        assert_eq!(districts.full_name(), "Collection(NS.District)");
        assert_eq!(districts.element_name(), "NS.District");
        assert!(!districts.element().is_collection);
        assert_eq!(
            TypeRef::primitive(PrimitiveKind::String).to_string(),
            "Edm.String"
        );
    }

    #[test]
    fn test_split_collection() {
        assert_eq!(split_collection("Collection(NS.Address)"), (true, "NS.Address"));
        assert_eq!(split_collection("Edm.Int32"), (false, "Edm.Int32"));
    }

    #[test]
    fn test_with_element_name_keeps_family() {
        let cast = TypeRef::complex("NS.Address").with_element_name("NS.WorkAddress");
        assert!(cast.is_complex());
        assert_eq!(cast.element_name(), "NS.WorkAddress");
    }
}
