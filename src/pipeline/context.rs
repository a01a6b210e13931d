//! Pipeline context management.
//!
//! Provides batch and document context for logging, timestamps, and
//! cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::logging::structured::LogContext;

/// Cooperative cancellation flag, checked between records and between
/// mapping steps. Cancellation never leaves a half-decrypted document;
/// an interrupted record is quarantined whole.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Context for a batch of documents.
#[derive(Debug, Clone)]
pub struct BatchContext {
    pub batch_id: String,
    pub batch_timestamp: DateTime<Utc>,
    pub cancel: CancelToken,
}

impl BatchContext {
    pub fn new(batch_timestamp: &str) -> Self {
        let batch_id = format!("batch-{}", &Uuid::new_v4().to_string()[..8]);

        let batch_ts = DateTime::parse_from_rfc3339(batch_timestamp)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Self {
            batch_id,
            batch_timestamp: batch_ts,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn log_context(&self) -> LogContext {
        LogContext::new(&self.batch_id)
    }

    /// Create a document context for this batch.
    pub fn document_context(&self, document_id: &str) -> DocumentContext {
        DocumentContext {
            batch_id: self.batch_id.clone(),
            document_id: document_id.to_string(),
        }
    }
}

/// Context for a single document within a batch.
#[derive(Debug, Clone)]
pub struct DocumentContext {
    pub batch_id: String,
    pub document_id: String,
}

impl DocumentContext {
    pub fn log_context(&self) -> LogContext {
        LogContext::new(&self.batch_id).with_document(&self.document_id)
    }
}
