use crate::logging::codes;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextUrlError {
    #[error("Neither a navigation source nor a type name is available for a {kind} payload")]
    SourceOrTypeMissing { kind: String },

    #[error("A type name is required for a top-level collection")]
    TypeMissingForCollection,

    #[error("A type name is required for an individual property")]
    TypeMissingForProperty,
}

impl ContextUrlError {
    pub fn error_code(&self) -> crate::logging::Code {
        match self {
            ContextUrlError::SourceOrTypeMissing { .. } => codes::context_url::SOURCE_OR_TYPE_MISSING,
            ContextUrlError::TypeMissingForCollection => codes::context_url::TYPE_MISSING_FOR_COLLECTION,
            ContextUrlError::TypeMissingForProperty => codes::context_url::TYPE_MISSING_FOR_PROPERTY,
        }
    }
}
