// Internal modules
#[macro_use]
pub mod logging;
pub mod apply;
pub mod compute;
pub mod config;
pub mod context_url;
pub mod error;
pub mod expression;
pub mod literals;
pub mod model;
pub mod path;
pub mod query_options;
pub mod select_expand;
pub mod tokens;
pub mod uri_parser;
pub mod utils;
pub mod validation;

// Re-export key types for library consumers
pub use apply::{ApplyClause, ApplyError};
pub use compute::{ComputeClause, ComputeError};
pub use context_url::{ContextUrlBuilder, ContextUrlError, ContextUrlInfo, ODataVersion};
pub use error::ODataError;
pub use model::{EdmModel, ModelAccessor, ModelDocument, NavigationSource, TypeRef};
pub use path::{PathError, PathSegment, PayloadKind, ResolvedPath, SegmentKind};
pub use query_options::QueryOptions;
pub use select_expand::{SelectExpandClause, SelectExpandError};
pub use uri_parser::{ODataUri, ODataUriParser};
