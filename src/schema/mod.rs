//! Schema loading and resolution.
//!
//! Schemas are compiled once at load time into immutable documents and
//! indexed by (namespace, doc_type, version):
//! - Schema document compilation with load-time authoring checks
//! - Exact-match version resolution via the registry

pub mod document;
pub mod registry;

pub use document::*;
pub use registry::*;
