//! Ingest Core - schema-driven validation and decryption engine
//!
//! This crate gives schema documents their meaning at ingestion time: it
//! validates incoming JSON payloads against versioned schema definitions
//! and rewrites JWE-encrypted fields into their decrypted form at the
//! schema-declared destination paths. The implementation prioritizes:
//!
//! 1. **Strictness** - malformed input never mutates a document; a
//!    record is published whole or quarantined whole
//! 2. **Logging** - every decision point logged with batch/doc context
//! 3. **Isolation** - records and mappings fail independently
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `pipeline` - main ingestion orchestrator and contexts
//! - `schema` - schema compilation and versioned registry
//! - `pointer` - RFC 6901 pointer read/write/delete on JSON trees
//! - `validation` - structural validation (required groups, types,
//!   patterns, array items)
//! - `jwe` - decryption capability boundary and mapping rewriter
//! - `routing` - downstream routing decisions from pipeline metadata
//! - `output` - published and quarantine output models
//! - `logging` - structured logging with document context
//!
//! ## Processing one record
//!
//! ```
//! use ingest_core::pipeline::{process_record, BatchContext, RecordEnvelope};
//! use ingest_core::schema::SchemaRegistry;
//! # use ingest_core::error::DecryptError;
//! # struct NoKeys;
//! # impl ingest_core::jwe::Decryptor for NoKeys {
//! #     fn decrypt(&self, _t: &str) -> Result<Vec<u8>, DecryptError> {
//! #         Err(DecryptError::KeyNotFound("none".to_string()))
//! #     }
//! # }
//!
//! let registry = SchemaRegistry::new();
//! let ctx = BatchContext::new("2020-11-02T15:00:00Z");
//! let envelope = RecordEnvelope {
//!     document_id: "doc-1".to_string(),
//!     namespace: "firefox-accounts".to_string(),
//!     doc_type: "account-ecosystem".to_string(),
//!     version: 1,
//!     payload: "{}".to_string(),
//! };
//!
//! // Empty registry: the record is quarantined, not dropped.
//! let result = process_record(&ctx, &registry, &NoKeys, &envelope);
//! assert!(!result.accepted());
//! ```

pub mod error;
pub mod jwe;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod pointer;
pub mod routing;
pub mod schema;
pub mod validation;

pub use error::{DecryptError, InvalidPointer, RewriteError, SchemaError};
pub use jwe::{DecryptionOutcome, Decryptor, MappingOutcome, RewriteReport};
pub use output::{PublishedRecord, QuarantineRecord};
pub use pipeline::{
    process_batch, process_record, BatchContext, BatchResult, CancelToken, RecordEnvelope,
    RecordOutcome, RecordResult,
};
pub use pointer::JsonPointer;
pub use routing::RoutingDecision;
pub use schema::{SchemaDocument, SchemaRegistry};
pub use validation::{ValidationResult, Violation, ViolationKind};

/// Initialize the module-level logger.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logger() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_millis()
        .try_init();
}
