//! JWE decryption and rewrite.
//!
//! Locates JWE compact-serialization tokens at schema-declared paths,
//! decrypts them through an injected capability, and rewrites the
//! decrypted plaintext into the document:
//! - Opaque decryptor trait and token shape checks
//! - All-or-nothing per-mapping rewrite with outcome reporting

pub mod decryptor;
pub mod rewriter;

pub use decryptor::*;
pub use rewriter::*;
