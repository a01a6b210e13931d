//! Error taxonomy for the ingestion engine.
//!
//! Schema-load errors are fatal to registry initialization; per-record
//! errors are recovered locally and surface in quarantine records.

use thiserror::Error;

/// Errors raised while loading or resolving schemas.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("no schema registered for {namespace}/{doc_type} v{version}")]
    SchemaNotFound {
        namespace: String,
        doc_type: String,
        version: u32,
    },

    #[error(
        "schema version {version} for {namespace}/{doc_type} exceeds highest known version {highest}"
    )]
    VersionUnsupported {
        namespace: String,
        doc_type: String,
        version: u32,
        highest: u32,
    },

    /// Missing `bq_dataset_family` or `bq_table` is a schema authoring
    /// defect, rejected at load time rather than per record.
    #[error("routing metadata key `{key}` missing from {namespace}/{doc_type} v{version}")]
    RoutingMetadataMissing {
        key: &'static str,
        namespace: String,
        doc_type: String,
        version: u32,
    },

    #[error("invalid pattern for property `{property}`")]
    InvalidPattern {
        property: String,
        #[source]
        source: regex::Error,
    },

    #[error("jwe mapping source and destination paths must differ: {path}")]
    AliasedMappingPaths { path: String },

    #[error("malformed schema document: {0}")]
    Malformed(String),

    #[error(transparent)]
    Pointer(#[from] InvalidPointer),
}

/// A pointer path component traversed into a scalar node, or the path
/// itself does not follow RFC 6901 syntax.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid pointer `{pointer}`: {reason}")]
pub struct InvalidPointer {
    pub pointer: String,
    pub reason: String,
}

impl InvalidPointer {
    pub fn new(pointer: &str, reason: impl Into<String>) -> Self {
        Self {
            pointer: pointer.to_string(),
            reason: reason.into(),
        }
    }
}

/// Per-token decryption failures reported by the JWE rewriter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecryptError {
    /// The value at the source path is not JWE compact serialization.
    #[error("token is not JWE compact serialization: {0}")]
    MalformedToken(String),

    #[error("no decryption key available: {0}")]
    KeyNotFound(String),

    #[error("decryption rejected: {0}")]
    DecryptionRejected(String),

    /// Decrypted payloads are expected to be valid JSON values.
    #[error("decrypted plaintext is not valid JSON: {0}")]
    InvalidPlaintextJson(String),
}

/// Failure of a single jwe mapping during rewrite.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RewriteError {
    #[error(transparent)]
    Decrypt(#[from] DecryptError),

    #[error(transparent)]
    Pointer(#[from] InvalidPointer),
}
