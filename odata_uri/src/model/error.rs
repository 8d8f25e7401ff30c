use crate::logging::codes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model document could not be parsed: {0}")]
    InvalidDocument(#[from] serde_json::Error),

    #[error("Model element '{name}' is declared more than once")]
    DuplicateElement { name: String },

    #[error("'{referenced_by}' refers to undeclared type '{type_name}'")]
    UnknownTypeReference {
        type_name: String,
        referenced_by: String,
    },

    #[error("Key property '{property}' of '{type_name}' is not a declared primitive property")]
    InvalidKey { type_name: String, property: String },

    #[error("Structured type '{type_name}' derives from itself")]
    CyclicBaseType { type_name: String },
}

impl ModelError {
    pub fn error_code(&self) -> codes::Code {
        match self {
            ModelError::InvalidDocument(_) => codes::model::INVALID_MODEL_DOCUMENT,
            ModelError::DuplicateElement { .. } => codes::model::DUPLICATE_ELEMENT,
            ModelError::UnknownTypeReference { .. } => codes::model::UNKNOWN_TYPE_REFERENCE,
            ModelError::InvalidKey { .. } => codes::model::INVALID_KEY,
            ModelError::CyclicBaseType { .. } => codes::model::CYCLIC_BASE_TYPE,
        }
    }

    pub fn unknown_type(type_name: &str, referenced_by: &str) -> Self {
        Self::UnknownTypeReference {
            type_name: type_name.to_string(),
            referenced_by: referenced_by.to_string(),
        }
    }
}
