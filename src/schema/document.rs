//! Compiled schema documents.
//!
//! Raw JSON schema files are parsed and compiled once at registry load
//! time into immutable [`SchemaDocument`] values: required groups from
//! `anyOf`, per-property constraints with pre-compiled anchored regexes,
//! jwe mappings with parsed pointer paths, and routing metadata. No
//! per-record parsing or regex compilation happens after load.

use std::collections::HashMap;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::SchemaError;
use crate::pointer::JsonPointer;

/// The closed set of value types the validator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl FieldType {
    fn from_keyword(keyword: &str) -> Result<Self, SchemaError> {
        match keyword {
            "string" => Ok(FieldType::String),
            "number" | "integer" => Ok(FieldType::Number),
            "boolean" => Ok(FieldType::Boolean),
            "object" => Ok(FieldType::Object),
            "array" => Ok(FieldType::Array),
            other => Err(SchemaError::Malformed(format!(
                "unsupported type keyword `{}`",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
            FieldType::Array => "array",
        }
    }

    /// Check a JSON value against this type.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Object => value.is_object(),
            FieldType::Array => value.is_array(),
        }
    }
}

/// Constraint on a single declared property.
#[derive(Debug)]
pub struct FieldConstraint {
    pub field_type: FieldType,
    /// Anchored at compile time; a match is always end-to-end.
    pub pattern: Option<Regex>,
    /// Per-element constraint for array properties.
    pub items: Option<Box<FieldConstraint>>,
}

impl FieldConstraint {
    fn compile(name: &str, raw: &RawProperty) -> Result<Self, SchemaError> {
        let field_type = FieldType::from_keyword(&raw.field_type)?;

        let pattern = raw
            .pattern
            .as_deref()
            .map(|p| {
                Regex::new(&format!("^(?:{})$", p)).map_err(|source| SchemaError::InvalidPattern {
                    property: name.to_string(),
                    source,
                })
            })
            .transpose()?;

        let items = raw
            .items
            .as_deref()
            .map(|item| FieldConstraint::compile(name, item).map(Box::new))
            .transpose()?;

        Ok(Self {
            field_type,
            pattern,
            items,
        })
    }
}

/// One encrypted-field rewrite instruction from `jwe_mappings`.
#[derive(Debug)]
pub struct JweMapping {
    pub source_field_path: JsonPointer,
    pub decrypted_field_path: JsonPointer,
}

/// Routing directives consumed by the pipeline router, not validation.
#[derive(Debug, Clone)]
pub struct PipelineMetadata {
    pub bq_dataset_family: String,
    pub bq_table: String,
    pub bq_metadata_format: String,
}

/// A compiled, immutable schema for one (namespace, doc_type, version).
///
/// Shared via `Arc` across concurrent record processing; never mutated
/// after load.
#[derive(Debug)]
pub struct SchemaDocument {
    pub namespace: String,
    pub doc_type: String,
    pub version: u32,
    pub title: String,
    /// Alternative `required` sets from `anyOf`; a document satisfies
    /// the axis if at least one group is fully present.
    pub required_groups: Vec<Vec<String>>,
    pub properties: HashMap<String, FieldConstraint>,
    pub jwe_mappings: Vec<JweMapping>,
    pub pipeline_metadata: PipelineMetadata,
}

impl SchemaDocument {
    /// Parse and compile a schema document from its JSON source.
    ///
    /// All authoring defects are fatal here: unsupported type keywords,
    /// uncompilable patterns, aliased mapping paths, and missing routing
    /// metadata keys.
    pub fn from_json(
        namespace: &str,
        doc_type: &str,
        version: u32,
        raw_json: &str,
    ) -> Result<Self, SchemaError> {
        let raw: RawSchema = serde_json::from_str(raw_json)
            .map_err(|e| SchemaError::Malformed(e.to_string()))?;

        let mut properties = HashMap::new();
        for (name, prop) in &raw.properties {
            properties.insert(name.clone(), FieldConstraint::compile(name, prop)?);
        }

        let required_groups = raw
            .any_of
            .into_iter()
            .map(|group| group.required)
            .filter(|required| !required.is_empty())
            .collect();

        let meta = raw.moz_pipeline_metadata.unwrap_or_default();
        let missing = |key: &'static str| SchemaError::RoutingMetadataMissing {
            key,
            namespace: namespace.to_string(),
            doc_type: doc_type.to_string(),
            version,
        };
        let pipeline_metadata = PipelineMetadata {
            bq_dataset_family: meta
                .bq_dataset_family
                .ok_or_else(|| missing("bq_dataset_family"))?,
            bq_table: meta.bq_table.ok_or_else(|| missing("bq_table"))?,
            bq_metadata_format: meta
                .bq_metadata_format
                .unwrap_or_else(|| "structured".to_string()),
        };

        let mut jwe_mappings = Vec::with_capacity(meta.jwe_mappings.len());
        for raw_mapping in meta.jwe_mappings {
            if raw_mapping.source_field_path == raw_mapping.decrypted_field_path {
                return Err(SchemaError::AliasedMappingPaths {
                    path: raw_mapping.source_field_path,
                });
            }
            jwe_mappings.push(JweMapping {
                source_field_path: JsonPointer::parse(&raw_mapping.source_field_path)?,
                decrypted_field_path: JsonPointer::parse(&raw_mapping.decrypted_field_path)?,
            });
        }

        Ok(Self {
            namespace: namespace.to_string(),
            doc_type: doc_type.to_string(),
            version,
            title: raw.title.unwrap_or_else(|| doc_type.to_string()),
            required_groups,
            properties,
            jwe_mappings,
            pipeline_metadata,
        })
    }

    pub fn constraint(&self, property: &str) -> Option<&FieldConstraint> {
        self.properties.get(property)
    }
}

// Raw serde shapes for the on-disk schema format.

#[derive(Debug, Deserialize)]
struct RawSchema {
    title: Option<String>,
    #[serde(default)]
    properties: HashMap<String, RawProperty>,
    #[serde(rename = "anyOf", default)]
    any_of: Vec<RawRequiredGroup>,
    #[serde(rename = "mozPipelineMetadata")]
    moz_pipeline_metadata: Option<RawPipelineMetadata>,
}

#[derive(Debug, Deserialize)]
struct RawProperty {
    #[serde(rename = "type")]
    field_type: String,
    pattern: Option<String>,
    items: Option<Box<RawProperty>>,
}

#[derive(Debug, Deserialize)]
struct RawRequiredGroup {
    #[serde(default)]
    required: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPipelineMetadata {
    bq_dataset_family: Option<String>,
    bq_metadata_format: Option<String>,
    bq_table: Option<String>,
    #[serde(default)]
    jwe_mappings: Vec<RawJweMapping>,
}

#[derive(Debug, Deserialize)]
struct RawJweMapping {
    source_field_path: String,
    decrypted_field_path: String,
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    /// Trimmed account-ecosystem schema used across module tests.
    pub const ACCOUNT_ECOSYSTEM_SCHEMA: &str = r##"{
        "$schema": "http://json-schema.org/draft-04/schema#",
        "title": "account-ecosystem",
        "type": "object",
        "properties": {
            "country": {"type": "string"},
            "region": {"type": "string"},
            "event": {"type": "string"},
            "oauth_client_id": {"type": "string"},
            "ecosystem_anon_id": {"type": "string"},
            "ecosystem_client_id": {"type": "string"},
            "ecosystem_user_id": {"type": "string", "pattern": "[a-zA-Z0-9]{64}"},
            "previous_ecosystem_anon_ids": {"type": "array", "items": {"type": "string"}},
            "previous_ecosystem_user_ids": {
                "type": "array",
                "items": {"type": "string", "pattern": "[a-zA-Z0-9]{64}"}
            }
        },
        "anyOf": [
            {"required": ["ecosystem_client_id"]},
            {"required": ["ecosystem_user_id"]}
        ],
        "mozPipelineMetadata": {
            "bq_dataset_family": "firefox_accounts",
            "bq_metadata_format": "structured",
            "bq_table": "account_ecosystem_v1",
            "jwe_mappings": [
                {
                    "source_field_path": "/ecosystem_anon_id",
                    "decrypted_field_path": "/ecosystem_user_id"
                },
                {
                    "source_field_path": "/previous_ecosystem_anon_ids",
                    "decrypted_field_path": "/previous_ecosystem_user_ids"
                }
            ]
        }
    }"##;

    use super::SchemaDocument;

    pub fn account_ecosystem() -> SchemaDocument {
        SchemaDocument::from_json("firefox-accounts", "account-ecosystem", 1, ACCOUNT_ECOSYSTEM_SCHEMA)
            .expect("fixture schema compiles")
    }
}

#[cfg(test)]
mod tests {
    use super::test_fixtures::account_ecosystem;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compile_account_ecosystem() {
        let schema = account_ecosystem();

        assert_eq!(schema.title, "account-ecosystem");
        assert_eq!(
            schema.required_groups,
            vec![
                vec!["ecosystem_client_id".to_string()],
                vec!["ecosystem_user_id".to_string()],
            ]
        );
        assert_eq!(schema.jwe_mappings.len(), 2);
        assert_eq!(
            schema.jwe_mappings[0].source_field_path.as_str(),
            "/ecosystem_anon_id"
        );
        assert_eq!(schema.pipeline_metadata.bq_table, "account_ecosystem_v1");
    }

    #[test]
    fn test_pattern_is_anchored() {
        let schema = account_ecosystem();
        let pattern = schema
            .constraint("ecosystem_user_id")
            .and_then(|c| c.pattern.as_ref())
            .unwrap();

        // Substring matches must not count.
        assert!(!pattern.is_match("abc"));
        assert!(!pattern.is_match(&"a".repeat(65)));
        assert!(pattern.is_match(&"a".repeat(64)));
    }

    #[test]
    fn test_missing_routing_metadata_is_fatal() {
        let raw = r#"{
            "title": "t",
            "properties": {},
            "mozPipelineMetadata": {"bq_dataset_family": "fam"}
        }"#;
        let err = SchemaDocument::from_json("ns", "t", 1, raw).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::RoutingMetadataMissing { key: "bq_table", .. }
        ));
    }

    #[test]
    fn test_aliased_mapping_paths_rejected() {
        let raw = r#"{
            "title": "t",
            "properties": {},
            "mozPipelineMetadata": {
                "bq_dataset_family": "fam",
                "bq_table": "t_v1",
                "jwe_mappings": [
                    {"source_field_path": "/a", "decrypted_field_path": "/a"}
                ]
            }
        }"#;
        assert!(matches!(
            SchemaDocument::from_json("ns", "t", 1, raw),
            Err(SchemaError::AliasedMappingPaths { .. })
        ));
    }

    #[test]
    fn test_bad_pattern_rejected() {
        let raw = r#"{
            "title": "t",
            "properties": {"x": {"type": "string", "pattern": "["}},
            "mozPipelineMetadata": {"bq_dataset_family": "fam", "bq_table": "t_v1"}
        }"#;
        assert!(matches!(
            SchemaDocument::from_json("ns", "t", 1, raw),
            Err(SchemaError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_field_type_matches() {
        assert!(FieldType::Number.matches(&json!(1)));
        assert!(FieldType::Number.matches(&json!(1.5)));
        assert!(!FieldType::String.matches(&json!(null)));
        assert!(FieldType::Array.matches(&json!([])));
    }
}
