//! API registry wiring.
//!
//! This module wraps the registry document (by default
//! `src/config/apis.json`) so the converter and the resolver share one
//! validated, read-only view of the cataloged APIs. Types here mirror the
//! document fields; callers hold a `Registry` and pass it explicitly.

pub mod index;
pub mod model;
pub mod schema;

pub use index::Registry;
pub use model::{EntryDescriptor, RegistryDocument, RegistryEntry};

/// Default registry location relative to the project root.
pub const DEFAULT_REGISTRY_PATH: &str = "src/config/apis.json";

/// Default document root relative to the project root.
pub const DEFAULT_DOCS_ROOT: &str = "public";
