//! Structured logging with document context.
//!
//! Provides a logging context that includes batch_id and document_id
//! in every log message for easy correlation.

pub mod structured;

pub use structured::*;
