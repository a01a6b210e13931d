//! Pipeline orchestration module.
//!
//! Main document ingestion pipeline that coordinates:
//! - Schema resolution
//! - JWE decryption and rewrite
//! - Structural validation
//! - Routing decisions

pub mod context;
pub mod ingestion;

pub use context::*;
pub use ingestion::*;
