//! Output models for the success and dead-letter paths.
//!
//! These models represent what the caller publishes downstream: a
//! decrypted, validated document with its routing decision, or a
//! quarantine record carrying enough detail to reproduce and debug the
//! failure without the original secret material.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::jwe::rewriter::MappingOutcome;
use crate::routing::decision::RoutingDecision;
use crate::validation::validator::Violation;

/// A document accepted for publication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedRecord {
    pub document_id: String,
    pub namespace: String,
    pub doc_type: String,
    pub schema_version: u32,
    /// The decrypted, validated document.
    pub document: Value,
    pub routing: RoutingDecision,
    pub processed_at: String,
}

/// A rejected document routed to the dead-letter output.
///
/// Carries the original payload so the record can be replayed once the
/// defect is fixed; decrypted values never appear here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarantineRecord {
    pub document_id: String,
    pub namespace: String,
    pub doc_type: String,
    pub schema_version: u32,
    pub payload: String,
    pub rejection_reason: String,
    pub violations: Vec<ViolationRecord>,
    pub mapping_outcomes: Vec<MappingOutcomeRecord>,
    pub received_at: String,
}

/// Flattened violation for serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub path: String,
    pub kind: String,
    pub detail: String,
}

impl From<&Violation> for ViolationRecord {
    fn from(violation: &Violation) -> Self {
        Self {
            path: violation.path.clone(),
            kind: violation.kind.as_str().to_string(),
            detail: violation.to_string(),
        }
    }
}

/// Flattened mapping outcome for serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingOutcomeRecord {
    pub source_field_path: String,
    pub decrypted_field_path: String,
    pub outcome: String,
}

impl From<&MappingOutcome> for MappingOutcomeRecord {
    fn from(outcome: &MappingOutcome) -> Self {
        Self {
            source_field_path: outcome.source_field_path.clone(),
            decrypted_field_path: outcome.decrypted_field_path.clone(),
            outcome: outcome.outcome.describe(),
        }
    }
}
