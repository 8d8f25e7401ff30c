//! Derived-type constraint checks
//!
//! A derived-type constraint on a navigation source, structural property or
//! navigation property lists the subtypes allowed at that position. The declared
//! type itself is always allowed; an empty list means any subtype is allowed.
//! The same check serves type-cast segments during resolution and payload
//! readers validating the runtime type of an instance.

use crate::logging::codes;
use crate::model::{split_collection, Member, ModelAccessor, PrimitiveKind};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConstraintError {
    #[error("Type '{actual}' is not allowed at '{position}'; derived type constraint allows: {allowed}")]
    TypeNotAllowed {
        actual: String,
        position: String,
        allowed: String,
    },

    #[error("Type '{actual}' is not compatible with declared type '{declared}' at '{position}'")]
    IncompatibleType {
        actual: String,
        declared: String,
        position: String,
    },

    #[error("Type or position '{name}' is not declared in the model")]
    Unrecognized { name: String },
}

impl ConstraintError {
    pub fn error_code(&self) -> crate::logging::Code {
        match self {
            ConstraintError::TypeNotAllowed { .. } => {
                codes::validation::TYPE_NOT_ALLOWED_BY_CONSTRAINT
            }
            ConstraintError::IncompatibleType { .. } => codes::validation::INCOMPATIBLE_TYPE,
            ConstraintError::Unrecognized { .. } => codes::validation::UNRECOGNIZED_TYPE,
        }
    }
}

/// A model position that can carry a derived-type constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypePosition {
    /// Entity set or singleton by name
    NavigationSource(String),
    /// Structural or navigation property of a structured type
    Member {
        declaring_type: String,
        member: String,
    },
}

impl std::fmt::Display for TypePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypePosition::NavigationSource(name) => write!(f, "{}", name),
            TypePosition::Member {
                declaring_type,
                member,
            } => write!(f, "{}/{}", declaring_type, member),
        }
    }
}

/// Check `actual` against the allow-list of a position whose declared type is `declared`
pub fn check_derived_type_constraint(
    position: &str,
    declared: &str,
    constraints: &[String],
    actual: &str,
) -> Result<(), ConstraintError> {
    if constraints.is_empty() || actual == declared || constraints.iter().any(|c| c == actual) {
        return Ok(());
    }
    crate::log_error!(codes::validation::TYPE_NOT_ALLOWED_BY_CONSTRAINT,
        "Type rejected by derived type constraint",
        "position" => position,
        "actual" => actual
    );
    Err(ConstraintError::TypeNotAllowed {
        actual: actual.to_string(),
        position: position.to_string(),
        allowed: constraints.join(", "),
    })
}

/// Validate the runtime type of a resource instance read at `position`
pub fn validate_resource_type(
    model: &dyn ModelAccessor,
    position: &TypePosition,
    actual: &str,
) -> Result<(), ConstraintError> {
    let (declared, constraints) = match position {
        TypePosition::NavigationSource(name) => {
            let source = model
                .find_navigation_source(name)
                .ok_or_else(|| ConstraintError::Unrecognized { name: name.clone() })?;
            let constraints = model.source_type_constraints(&source);
            (source.entity_type().to_string(), constraints)
        }
        TypePosition::Member {
            declaring_type,
            member,
        } => {
            let found = model.find_member(declaring_type, member).ok_or_else(|| {
                ConstraintError::Unrecognized {
                    name: position.to_string(),
                }
            })?;
            let (_, element) = split_collection(found.type_name());
            let constraints = match found {
                Member::Property(p) => p.derived_type_constraints.clone(),
                Member::Navigation(n) => n.derived_type_constraints.clone(),
            };
            (element.to_string(), constraints)
        }
    };

    let is_known = model.find_structured_type(actual).is_some()
        || model.find_enum_type(actual).is_some()
        || PrimitiveKind::from_name(actual).is_some();
    if !is_known {
        return Err(ConstraintError::Unrecognized {
            name: actual.to_string(),
        });
    }

    if actual != declared && !model.is_same_or_subtype(actual, &declared) {
        return Err(ConstraintError::IncompatibleType {
            actual: actual.to_string(),
            declared,
            position: position.to_string(),
        });
    }

    check_derived_type_constraint(&position.to_string(), &declared, &constraints, actual)?;

    crate::log_debug!("Resource type validated",
        "position" => position,
        "type" => actual
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::sample_model;
    use assert_matches::assert_matches;

    fn order_customer() -> TypePosition {
        TypePosition::Member {
            declaring_type: "NS.Order".into(),
            member: "Customer".into(),
        }
    }

    #[test]
    fn test_constrained_navigation_rejects_unlisted_subtype() {
        let model = sample_model();
        let err = validate_resource_type(&model, &order_customer(), "NS.NormalCustomer").unwrap_err();
        assert_eq!(
            err.error_code().as_str(),
            "ReaderValidationUtils_ValueTypeNotAllowedInDerivedTypeConstraint"
        );
    }

    #[test]
    fn test_constrained_navigation_accepts_declared_and_listed() {
        let model = sample_model();
        assert!(validate_resource_type(&model, &order_customer(), "NS.VipCustomer").is_ok());
        assert!(validate_resource_type(&model, &order_customer(), "NS.Customer").is_ok());
    }

    #[test]
    fn test_constrained_singleton() {
        let model = sample_model();
        let top = TypePosition::NavigationSource("TopCustomer".into());
        assert!(validate_resource_type(&model, &top, "NS.VipCustomer").is_ok());
        assert_matches!(
            validate_resource_type(&model, &top, "NS.NormalCustomer"),
            Err(ConstraintError::TypeNotAllowed { .. })
        );
    }

    #[test]
    fn test_unconstrained_position_accepts_any_subtype() {
        let model = sample_model();
        let customers = TypePosition::NavigationSource("Customers".into());
        assert!(validate_resource_type(&model, &customers, "NS.NormalCustomer").is_ok());
    }

    #[test]
    fn test_unrelated_type_is_incompatible() {
        let model = sample_model();
        assert_matches!(
            validate_resource_type(&model, &order_customer(), "NS.City"),
            Err(ConstraintError::IncompatibleType { .. })
        );
        assert_matches!(
            validate_resource_type(&model, &order_customer(), "NS.Nope"),
            Err(ConstraintError::Unrecognized { .. })
        );
    }
}
