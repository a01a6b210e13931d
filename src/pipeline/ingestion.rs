//! Main document ingestion pipeline.
//!
//! Coordinates the full processing workflow per record:
//! 1. Payload parsing
//! 2. Schema resolution (namespace, doc_type, version)
//! 3. JWE rewrite (decrypt mapped fields)
//! 4. Structural validation of the decrypted document
//! 5. Routing decision
//!
//! Ordering matters: required/pattern constraints name post-decryption
//! fields, so validation runs after the rewrite. Every per-record
//! failure quarantines that record with a structured reason; the batch
//! itself never aborts.

use chrono::Utc;
use serde_json::Value;

use crate::jwe::decryptor::Decryptor;
use crate::jwe::rewriter::{rewrite, MappingOutcome};
use crate::logging::structured::LogContext;
use crate::output::models::{
    MappingOutcomeRecord, PublishedRecord, QuarantineRecord, ViolationRecord,
};
use crate::routing::decision::route;
use crate::schema::registry::SchemaRegistry;
use crate::validation::validator::{validate, ValidationResult, Violation};

use super::context::BatchContext;

/// One raw record as delivered by the transport layer, addressed the
/// way the submission path addresses it.
#[derive(Debug, Clone)]
pub struct RecordEnvelope {
    pub document_id: String,
    pub namespace: String,
    pub doc_type: String,
    pub version: u32,
    pub payload: String,
}

/// Terminal outcome for one record.
#[derive(Debug)]
pub enum RecordOutcome {
    Published(PublishedRecord),
    Quarantined(QuarantineRecord),
}

/// Result of processing a single record.
#[derive(Debug)]
pub struct RecordResult {
    pub document_id: String,
    pub outcome: RecordOutcome,
}

impl RecordResult {
    pub fn accepted(&self) -> bool {
        matches!(self.outcome, RecordOutcome::Published(_))
    }
}

/// Result of processing a batch.
#[derive(Debug)]
pub struct BatchResult {
    pub received_count: usize,
    pub accepted_count: usize,
    pub rejected_count: usize,
    pub records: Vec<RecordResult>,
}

/// Process a batch of records.
///
/// Records are independent units of work; a quarantined record never
/// affects its neighbors. When the batch is cancelled, records not yet
/// started are quarantined whole.
pub fn process_batch(
    ctx: &BatchContext,
    registry: &SchemaRegistry,
    decryptor: &dyn Decryptor,
    envelopes: Vec<RecordEnvelope>,
) -> BatchResult {
    let received = envelopes.len();
    let mut records = Vec::with_capacity(received);
    let mut accepted = 0;
    let mut rejected = 0;

    log::info!("{} BATCH_RECEIVED records={}", ctx.log_context(), received);

    for envelope in envelopes {
        let result = if ctx.cancel.is_cancelled() {
            quarantine_result(
                ctx,
                &envelope,
                "processing cancelled",
                Vec::new(),
                Vec::new(),
            )
        } else {
            process_record(ctx, registry, decryptor, &envelope)
        };

        if result.accepted() {
            accepted += 1;
        } else {
            rejected += 1;
        }
        records.push(result);
    }

    log::info!(
        "{} BATCH_COMPLETE received={} accepted={} rejected={}",
        ctx.log_context(),
        received,
        accepted,
        rejected
    );

    BatchResult {
        received_count: received,
        accepted_count: accepted,
        rejected_count: rejected,
        records,
    }
}

/// Process a single record through resolve, rewrite, validate, route.
pub fn process_record(
    ctx: &BatchContext,
    registry: &SchemaRegistry,
    decryptor: &dyn Decryptor,
    envelope: &RecordEnvelope,
) -> RecordResult {
    let doc_ctx = ctx.document_context(&envelope.document_id);
    let log_ctx = doc_ctx.log_context();

    log::debug!(
        "{} RECORD_PROCESS_START schema={}/{} v{}",
        log_ctx,
        envelope.namespace,
        envelope.doc_type,
        envelope.version
    );

    // [1] PAYLOAD PARSING
    let mut document: Value = match serde_json::from_str(&envelope.payload) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("{} RECORD_PARSE_FAILED error={}", log_ctx, e);
            return quarantine_result(
                ctx,
                envelope,
                &format!("JSON parse error: {}", e),
                Vec::new(),
                Vec::new(),
            );
        }
    };

    // [2] SCHEMA RESOLUTION
    let schema = match registry.resolve(&envelope.namespace, &envelope.doc_type, envelope.version)
    {
        Ok(schema) => schema,
        Err(e) => {
            log::warn!("{} RECORD_SCHEMA_UNRESOLVED error={}", log_ctx, e);
            return quarantine_result(ctx, envelope, &e.to_string(), Vec::new(), Vec::new());
        }
    };

    // [3] JWE REWRITE
    let report = rewrite(
        &mut document,
        &schema.jwe_mappings,
        decryptor,
        &ctx.cancel,
        &log_ctx,
    );

    if report.cancelled {
        // The mutated document is discarded; quarantine carries the
        // original payload, never a half-decrypted document.
        return quarantine_result(
            ctx,
            envelope,
            "processing cancelled during jwe rewrite",
            Vec::new(),
            report.outcomes,
        );
    }

    if report.has_failures() {
        return quarantine_result(
            ctx,
            envelope,
            "jwe decryption failed",
            Vec::new(),
            report.outcomes,
        );
    }

    // [4] VALIDATION (post-decryption field names)
    let validation = validate(&document, &schema, &log_ctx);
    if let ValidationResult::Invalid(violations) = validation {
        return quarantine_result(
            ctx,
            envelope,
            "schema validation failed",
            violations,
            report.outcomes,
        );
    }

    // [5] ROUTING
    let routing = route(&schema, &log_ctx);

    log::info!(
        "{} RECORD_PUBLISHED destination={} schema={}/{} v{}",
        log_ctx,
        routing.destination(),
        envelope.namespace,
        envelope.doc_type,
        envelope.version
    );

    RecordResult {
        document_id: envelope.document_id.clone(),
        outcome: RecordOutcome::Published(PublishedRecord {
            document_id: envelope.document_id.clone(),
            namespace: envelope.namespace.clone(),
            doc_type: envelope.doc_type.clone(),
            schema_version: envelope.version,
            document,
            routing,
            processed_at: Utc::now().to_rfc3339(),
        }),
    }
}

fn quarantine_result(
    ctx: &BatchContext,
    envelope: &RecordEnvelope,
    reason: &str,
    violations: Vec<Violation>,
    outcomes: Vec<MappingOutcome>,
) -> RecordResult {
    let log_ctx = ctx.document_context(&envelope.document_id).log_context();
    log::warn!("{} RECORD_QUARANTINED reason={}", log_ctx, reason);

    RecordResult {
        document_id: envelope.document_id.clone(),
        outcome: RecordOutcome::Quarantined(QuarantineRecord {
            document_id: envelope.document_id.clone(),
            namespace: envelope.namespace.clone(),
            doc_type: envelope.doc_type.clone(),
            schema_version: envelope.version,
            payload: envelope.payload.clone(),
            rejection_reason: reason.to_string(),
            violations: violations.iter().map(ViolationRecord::from).collect(),
            mapping_outcomes: outcomes.iter().map(MappingOutcomeRecord::from).collect(),
            received_at: Utc::now().to_rfc3339(),
        }),
    }
}
