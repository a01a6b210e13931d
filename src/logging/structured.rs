//! Structured logging utilities.
//!
//! Provides context-aware logging with batch_id and document_id included
//! in every log message.

use std::fmt;

/// Logging context for a batch of documents.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub batch_id: String,
    pub document_id: Option<String>,
}

impl LogContext {
    pub fn new(batch_id: &str) -> Self {
        Self {
            batch_id: batch_id.to_string(),
            document_id: None,
        }
    }

    pub fn with_document(&self, document_id: &str) -> Self {
        Self {
            batch_id: self.batch_id.clone(),
            document_id: Some(document_id.to_string()),
        }
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.document_id {
            Some(doc) => write!(f, "[batch={}] [doc={}]", self.batch_id, doc),
            None => write!(f, "[batch={}]", self.batch_id),
        }
    }
}
