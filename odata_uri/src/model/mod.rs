//! Entity data model: types, container elements and the read-only accessor
//! the resolver components query.

pub mod accessor;
pub mod edm;
pub mod elements;
pub mod error;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use accessor::{Member, ModelAccessor, NavigationSource};
pub use edm::{EdmModel, ModelDocument};
pub use elements::{
    EntitySet, EnumType, NavigationBinding, NavigationProperty, Operation, OperationImport,
    OperationKind, Parameter, Singleton, StructuralProperty, StructuredKind, StructuredType,
};
pub use error::ModelError;
pub use types::{split_collection, PrimitiveKind, TypeKind, TypeRef};
