//! Schema-driven JWE rewrite.
//!
//! Consumes a schema's `jwe_mappings` plus a decryption capability. For
//! each mapping, in list order: read the token (or array of tokens) at
//! the source path, decrypt, parse the plaintext as JSON, write the
//! parsed value at the destination path, delete the source field.
//!
//! The source field is deleted only after every element of the mapping
//! decrypted; any failure leaves that mapping's subtree fully intact for
//! diagnostic replay. Mappings are isolated from each other, so callers
//! always receive a complete outcome report.

use serde_json::Value;

use crate::error::{DecryptError, RewriteError};
use crate::jwe::decryptor::{check_compact_token, Decryptor};
use crate::logging::structured::LogContext;
use crate::pipeline::context::CancelToken;
use crate::schema::document::JweMapping;

/// Terminal outcome for one mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptionOutcome {
    /// Decrypted and rewritten; `values` counts array elements for
    /// plural mappings, 1 otherwise.
    Decrypted { values: usize },
    /// Source path missing. Not an error; the field may legitimately be
    /// absent upstream.
    FieldAbsent,
    Failed(RewriteError),
}

impl DecryptionOutcome {
    /// Compact label for logs and quarantine records.
    pub fn describe(&self) -> String {
        match self {
            DecryptionOutcome::Decrypted { values } => format!("decrypted values={}", values),
            DecryptionOutcome::FieldAbsent => "field_absent".to_string(),
            DecryptionOutcome::Failed(err) => format!("failed: {}", err),
        }
    }
}

/// Outcome report for one mapping, naming both paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingOutcome {
    pub source_field_path: String,
    pub decrypted_field_path: String,
    pub outcome: DecryptionOutcome,
}

impl MappingOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, DecryptionOutcome::Failed(_))
    }
}

/// Result of rewriting one document.
#[derive(Debug)]
pub struct RewriteReport {
    pub outcomes: Vec<MappingOutcome>,
    /// Set when cancellation stopped processing before all mappings ran.
    pub cancelled: bool,
}

impl RewriteReport {
    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(MappingOutcome::is_failure)
    }
}

/// Apply every mapping to the document, in list order.
///
/// The document is mutated in place; callers that need the original for
/// quarantine keep the raw payload. A failure on one mapping does not
/// prevent attempting the rest. Cancellation is checked between mapping
/// steps; a cancelled rewrite leaves the remaining mappings unattempted.
pub fn rewrite(
    doc: &mut Value,
    mappings: &[JweMapping],
    decryptor: &dyn Decryptor,
    cancel: &CancelToken,
    ctx: &LogContext,
) -> RewriteReport {
    let mut outcomes = Vec::with_capacity(mappings.len());

    for mapping in mappings {
        if cancel.is_cancelled() {
            log::warn!(
                "{} REWRITE_CANCELLED completed={} remaining={}",
                ctx,
                outcomes.len(),
                mappings.len() - outcomes.len()
            );
            return RewriteReport {
                outcomes,
                cancelled: true,
            };
        }

        let outcome = apply_mapping(doc, mapping, decryptor);

        match &outcome {
            DecryptionOutcome::Decrypted { values } => log::debug!(
                "{} JWE_DECRYPTED source={} dest={} values={}",
                ctx,
                mapping.source_field_path,
                mapping.decrypted_field_path,
                values
            ),
            DecryptionOutcome::FieldAbsent => log::debug!(
                "{} JWE_FIELD_ABSENT source={}",
                ctx,
                mapping.source_field_path
            ),
            DecryptionOutcome::Failed(err) => log::warn!(
                "{} JWE_DECRYPT_FAILED source={} error={}",
                ctx,
                mapping.source_field_path,
                err
            ),
        }

        outcomes.push(MappingOutcome {
            source_field_path: mapping.source_field_path.as_str().to_string(),
            decrypted_field_path: mapping.decrypted_field_path.as_str().to_string(),
            outcome,
        });
    }

    RewriteReport {
        outcomes,
        cancelled: false,
    }
}

/// Process one mapping with all-or-nothing semantics: every token is
/// decrypted into a staged value before the document is touched.
fn apply_mapping(
    doc: &mut Value,
    mapping: &JweMapping,
    decryptor: &dyn Decryptor,
) -> DecryptionOutcome {
    let Some(source) = mapping.source_field_path.get(doc) else {
        return DecryptionOutcome::FieldAbsent;
    };

    let staged = match source {
        Value::String(token) => decrypt_token(token, decryptor).map(|v| (v, 1)),
        Value::Array(tokens) => decrypt_all(tokens, decryptor).map(|values| {
            let count = values.len();
            (Value::Array(values), count)
        }),
        other => Err(RewriteError::Decrypt(DecryptError::MalformedToken(format!(
            "source holds {} instead of token(s)",
            type_label(other)
        )))),
    };

    let (value, count) = match staged {
        Ok(staged) => staged,
        Err(err) => return DecryptionOutcome::Failed(err),
    };

    // Write before delete: a write failure must leave the source intact.
    if let Err(err) = mapping.decrypted_field_path.set(doc, value) {
        return DecryptionOutcome::Failed(err.into());
    }
    if let Err(err) = mapping.source_field_path.delete(doc) {
        return DecryptionOutcome::Failed(err.into());
    }

    DecryptionOutcome::Decrypted { values: count }
}

/// Decrypt every element of a plural mapping, order preserved. Any
/// element failure fails the whole mapping.
fn decrypt_all(tokens: &[Value], decryptor: &dyn Decryptor) -> Result<Vec<Value>, RewriteError> {
    let mut values = Vec::with_capacity(tokens.len());
    for token in tokens {
        let Value::String(token) = token else {
            return Err(DecryptError::MalformedToken(format!(
                "array element holds {} instead of a token",
                type_label(token)
            ))
            .into());
        };
        values.push(decrypt_token(token, decryptor)?);
    }
    Ok(values)
}

fn decrypt_token(token: &str, decryptor: &dyn Decryptor) -> Result<Value, RewriteError> {
    check_compact_token(token)?;
    let plaintext = decryptor.decrypt(token)?;
    serde_json::from_slice(&plaintext)
        .map_err(|e| DecryptError::InvalidPlaintextJson(e.to_string()).into())
}

fn type_label(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwe::decryptor::test_support::{
        wrap_token, KeylessDecryptor, PoisonedDecryptor, UnwrappingDecryptor,
    };
    use crate::schema::document::test_fixtures::account_ecosystem;
    use serde_json::json;

    fn ctx() -> LogContext {
        LogContext::new("test-batch")
    }

    fn user_id(c: char) -> String {
        c.to_string().repeat(64)
    }

    #[test]
    fn test_round_trip_single_mapping() {
        let schema = account_ecosystem();
        let id = user_id('a');
        let mut doc = json!({
            "ecosystem_anon_id": wrap_token(&format!("\"{}\"", id)),
            "country": "DE"
        });

        let report = rewrite(
            &mut doc,
            &schema.jwe_mappings,
            &UnwrappingDecryptor,
            &CancelToken::new(),
            &ctx(),
        );

        assert!(!report.has_failures());
        assert_eq!(doc.get("ecosystem_user_id"), Some(&json!(id)));
        assert_eq!(doc.get("ecosystem_anon_id"), None);
        assert_eq!(doc.get("country"), Some(&json!("DE")));
        assert_eq!(
            report.outcomes[0].outcome,
            DecryptionOutcome::Decrypted { values: 1 }
        );
        assert_eq!(report.outcomes[1].outcome, DecryptionOutcome::FieldAbsent);
    }

    #[test]
    fn test_plural_mapping_preserves_order() {
        let schema = account_ecosystem();
        let ids = [user_id('a'), user_id('b'), user_id('c')];
        let tokens: Vec<String> = ids.iter().map(|v| wrap_token(&format!("\"{}\"", v))).collect();
        let mut doc = json!({
            "ecosystem_anon_id": wrap_token(&format!("\"{}\"", user_id('z'))),
            "previous_ecosystem_anon_ids": tokens
        });

        let report = rewrite(
            &mut doc,
            &schema.jwe_mappings,
            &UnwrappingDecryptor,
            &CancelToken::new(),
            &ctx(),
        );

        assert!(!report.has_failures());
        assert_eq!(
            doc.get("previous_ecosystem_user_ids"),
            Some(&json!([ids[0], ids[1], ids[2]]))
        );
        assert_eq!(doc.get("previous_ecosystem_anon_ids"), None);
        assert_eq!(
            report.outcomes[1].outcome,
            DecryptionOutcome::Decrypted { values: 3 }
        );
    }

    #[test]
    fn test_partial_failure_leaves_source_intact() {
        let schema = account_ecosystem();
        let tokens = [
            wrap_token(&format!("\"{}\"", user_id('a'))),
            wrap_token(&format!("\"{}\"", user_id('b'))),
            wrap_token(&format!("\"{}\"", user_id('c'))),
        ];
        let mut doc = json!({ "previous_ecosystem_anon_ids": tokens });
        let original = doc.clone();

        let decryptor = PoisonedDecryptor {
            poison: tokens[1].clone(),
        };
        let report = rewrite(
            &mut doc,
            &schema.jwe_mappings,
            &decryptor,
            &CancelToken::new(),
            &ctx(),
        );

        // No partial deletion, no partial write.
        assert_eq!(doc, original);
        assert!(report.outcomes[1].is_failure());
        assert!(matches!(
            report.outcomes[1].outcome,
            DecryptionOutcome::Failed(RewriteError::Decrypt(
                DecryptError::DecryptionRejected(_)
            ))
        ));
    }

    #[test]
    fn test_failure_does_not_stop_other_mappings() {
        let schema = account_ecosystem();
        let id = user_id('b');
        let poisoned = wrap_token("\"poisoned\"");
        let mut doc = json!({
            "ecosystem_anon_id": poisoned,
            "previous_ecosystem_anon_ids": [wrap_token(&format!("\"{}\"", id))]
        });

        let decryptor = PoisonedDecryptor {
            poison: poisoned.clone(),
        };
        let report = rewrite(
            &mut doc,
            &schema.jwe_mappings,
            &decryptor,
            &CancelToken::new(),
            &ctx(),
        );

        // First mapping failed and kept its source; second still ran.
        assert!(report.outcomes[0].is_failure());
        assert_eq!(doc.get("ecosystem_anon_id"), Some(&json!(poisoned)));
        assert_eq!(doc.get("previous_ecosystem_user_ids"), Some(&json!([id])));
        assert_eq!(report.outcomes.len(), 2);
    }

    #[test]
    fn test_idempotent_on_decrypted_document() {
        let schema = account_ecosystem();
        let mut doc = json!({
            "ecosystem_user_id": user_id('a'),
            "country": "DE"
        });
        let original = doc.clone();

        for _ in 0..2 {
            let report = rewrite(
                &mut doc,
                &schema.jwe_mappings,
                &UnwrappingDecryptor,
                &CancelToken::new(),
                &ctx(),
            );
            assert!(report
                .outcomes
                .iter()
                .all(|o| o.outcome == DecryptionOutcome::FieldAbsent));
        }
        assert_eq!(doc, original);
    }

    #[test]
    fn test_garbage_token_is_malformed_not_absent() {
        let schema = account_ecosystem();
        let mut doc = json!({ "ecosystem_anon_id": "not a jwe token" });

        let report = rewrite(
            &mut doc,
            &schema.jwe_mappings,
            &UnwrappingDecryptor,
            &CancelToken::new(),
            &ctx(),
        );

        assert!(matches!(
            report.outcomes[0].outcome,
            DecryptionOutcome::Failed(RewriteError::Decrypt(DecryptError::MalformedToken(_)))
        ));
        assert_eq!(doc.get("ecosystem_anon_id"), Some(&json!("not a jwe token")));
    }

    #[test]
    fn test_non_string_source_is_malformed() {
        let schema = account_ecosystem();
        let mut doc = json!({ "ecosystem_anon_id": 42 });

        let report = rewrite(
            &mut doc,
            &schema.jwe_mappings,
            &UnwrappingDecryptor,
            &CancelToken::new(),
            &ctx(),
        );
        assert!(matches!(
            report.outcomes[0].outcome,
            DecryptionOutcome::Failed(RewriteError::Decrypt(DecryptError::MalformedToken(_)))
        ));
    }

    #[test]
    fn test_key_not_found() {
        let schema = account_ecosystem();
        let mut doc = json!({ "ecosystem_anon_id": wrap_token("\"v\"") });

        let report = rewrite(
            &mut doc,
            &schema.jwe_mappings,
            &KeylessDecryptor,
            &CancelToken::new(),
            &ctx(),
        );
        assert!(matches!(
            report.outcomes[0].outcome,
            DecryptionOutcome::Failed(RewriteError::Decrypt(DecryptError::KeyNotFound(_)))
        ));
        assert!(doc.get("ecosystem_anon_id").is_some());
    }

    #[test]
    fn test_invalid_plaintext_json() {
        let schema = account_ecosystem();
        // Plaintext "not json" fails the post-decrypt parse.
        let mut doc = json!({ "ecosystem_anon_id": wrap_token("not json") });

        let report = rewrite(
            &mut doc,
            &schema.jwe_mappings,
            &UnwrappingDecryptor,
            &CancelToken::new(),
            &ctx(),
        );
        assert!(matches!(
            report.outcomes[0].outcome,
            DecryptionOutcome::Failed(RewriteError::Decrypt(
                DecryptError::InvalidPlaintextJson(_)
            ))
        ));
    }

    #[test]
    fn test_cancellation_between_mappings() {
        let schema = account_ecosystem();
        let cancel = CancelToken::new();
        cancel.cancel();

        let mut doc = json!({ "ecosystem_anon_id": wrap_token("\"v\"") });
        let original = doc.clone();

        let report = rewrite(
            &mut doc,
            &schema.jwe_mappings,
            &UnwrappingDecryptor,
            &cancel,
            &ctx(),
        );

        assert!(report.cancelled);
        assert!(report.outcomes.is_empty());
        assert_eq!(doc, original);
    }
}
