//! `@odata.context` URL construction
//!
//! The builder turns a navigation source or type name plus the bound
//! `$select`/`$expand`/`$apply` clauses into the fragment appended to the
//! metadata document URL, e.g. `$metadata#Cities(Name,Districts())`.

pub mod builder;
pub mod error;

pub use builder::{ContextUrlBuilder, ContextUrlInfo, ODataVersion};
pub use error::ContextUrlError;
