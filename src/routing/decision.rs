//! Routing decision logic.
//!
//! Determines the destination dataset and table for each accepted
//! document from the schema's pipeline metadata. The required keys are
//! checked at schema load time, so routing itself is a pure lookup that
//! cannot fail per record.

use serde::{Deserialize, Serialize};

use crate::logging::structured::LogContext;
use crate::schema::document::SchemaDocument;

/// Routing decision for a validated, decrypted document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub dataset_family: String,
    pub table: String,
    pub metadata_format: String,
}

impl RoutingDecision {
    /// Fully qualified destination in `dataset.table` form.
    pub fn destination(&self) -> String {
        format!("{}.{}", self.dataset_family, self.table)
    }
}

/// Derive the routing decision from the schema's pipeline metadata.
pub fn route(schema: &SchemaDocument, ctx: &LogContext) -> RoutingDecision {
    let decision = RoutingDecision {
        dataset_family: schema.pipeline_metadata.bq_dataset_family.clone(),
        table: schema.pipeline_metadata.bq_table.clone(),
        metadata_format: schema.pipeline_metadata.bq_metadata_format.clone(),
    };

    log::debug!(
        "{} ROUTING_DECISION destination={} format={}",
        ctx,
        decision.destination(),
        decision.metadata_format
    );

    decision
}

/// Table identifier in the `{namespace}__{doctype}_v{version}` form used
/// when provisioning per-revision comparison tables.
pub fn revision_table_id(namespace: &str, doc_type: &str, version: u32) -> String {
    format!(
        "{}__{}_v{}",
        namespace.replace('-', "_"),
        doc_type.replace('-', "_"),
        version
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::document::test_fixtures::account_ecosystem;

    #[test]
    fn test_route_from_pipeline_metadata() {
        let schema = account_ecosystem();
        let ctx = LogContext::new("test-batch");

        let decision = route(&schema, &ctx);
        assert_eq!(
            decision,
            RoutingDecision {
                dataset_family: "firefox_accounts".to_string(),
                table: "account_ecosystem_v1".to_string(),
                metadata_format: "structured".to_string(),
            }
        );
        assert_eq!(decision.destination(), "firefox_accounts.account_ecosystem_v1");
    }

    #[test]
    fn test_revision_table_id() {
        assert_eq!(
            revision_table_id("firefox-accounts", "account-ecosystem", 1),
            "firefox_accounts__account_ecosystem_v1"
        );
    }
}
