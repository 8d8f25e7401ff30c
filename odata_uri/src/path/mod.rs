//! Resource path resolution
//!
//! Turns the path portion of a request URI into a typed segment sequence. Each
//! segment records the type it addresses and, where one is known, the entity set
//! or singleton holding the addressed entities.

pub mod error;
pub mod resolved;
pub mod resolver;
pub mod segment;

pub use error::PathError;
pub use resolved::{PayloadKind, ResolvedPath};
pub use resolver::SegmentResolver;
pub use segment::{KeyValue, OperationParameter, ParameterValue, PathSegment, SegmentKind};

use crate::config::runtime::UriParserSettings;
use crate::model::ModelAccessor;
use std::collections::HashMap;

/// Resolve `request_uri` against `service_root` with default settings and no parameter aliases
pub fn resolve(
    service_root: &str,
    request_uri: &str,
    model: &dyn ModelAccessor,
) -> Result<ResolvedPath, PathError> {
    let settings = UriParserSettings::default();
    let aliases = HashMap::new();
    SegmentResolver::new(model, &settings, &aliases).resolve(service_root, request_uri)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::sample_model;

    #[test]
    fn test_resolve_entry_point() {
        let model = sample_model();
        let path = resolve("http://host/svc", "http://host/svc/Districts(4)/City", &model).unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.navigation_source().unwrap().name(), "Cities");
        assert_eq!(path.payload_kind(), PayloadKind::Resource);
    }
}
