//! Schema registry.
//!
//! Indexes compiled schemas by (namespace, doc_type, version) and
//! resolves the schema for an incoming record. Loading is a one-time,
//! process-wide initialization; after that the registry is read-only
//! and safely shared across worker threads without locks.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use crate::error::SchemaError;
use crate::schema::document::SchemaDocument;

/// Exact identity of one schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaKey {
    pub namespace: String,
    pub doc_type: String,
    pub version: u32,
}

impl SchemaKey {
    pub fn new(namespace: &str, doc_type: &str, version: u32) -> Self {
        Self {
            namespace: namespace.to_string(),
            doc_type: doc_type.to_string(),
            version,
        }
    }

    /// Qualified name in the `{namespace}.{doctype}.{version}` form used
    /// by the schema repository tooling.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}.{}", self.namespace, self.doc_type, self.version)
    }
}

#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<SchemaKey, Arc<SchemaDocument>>,
    // Highest loaded version per (namespace, doc_type), for
    // distinguishing unsupported-future versions from plain misses.
    highest: HashMap<(String, String), u32>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_count(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Loaded versions for one doc type, ascending.
    pub fn versions(&self, namespace: &str, doc_type: &str) -> Vec<u32> {
        let mut versions: Vec<u32> = self
            .schemas
            .keys()
            .filter(|k| k.namespace == namespace && k.doc_type == doc_type)
            .map(|k| k.version)
            .collect();
        versions.sort_unstable();
        versions
    }

    /// Compile and register one schema from its JSON source.
    ///
    /// Multiple versions of the same doc type may coexist; re-loading an
    /// existing key replaces it (loading happens before serving starts).
    pub fn load_schema_json(
        &mut self,
        namespace: &str,
        doc_type: &str,
        version: u32,
        raw_json: &str,
    ) -> Result<(), SchemaError> {
        let schema = SchemaDocument::from_json(namespace, doc_type, version, raw_json)?;
        let key = SchemaKey::new(namespace, doc_type, version);

        log::info!(
            "SCHEMA_LOADED schema={} jwe_mappings={} required_groups={}",
            key.qualified_name(),
            schema.jwe_mappings.len(),
            schema.required_groups.len()
        );

        let family = (namespace.to_string(), doc_type.to_string());
        let highest = self.highest.entry(family).or_insert(version);
        if version > *highest {
            *highest = version;
        }

        self.schemas.insert(key, Arc::new(schema));
        Ok(())
    }

    /// Load every schema under a `<root>/<namespace>/<doctype>/
    /// <doctype>.<version>.schema.json` tree.
    ///
    /// Any unreadable or malformed schema aborts the load; the registry
    /// refuses to serve a partially loaded tree.
    pub fn load_dir(&mut self, root: &Path) -> anyhow::Result<usize> {
        let mut loaded = 0;

        for namespace_entry in
            fs::read_dir(root).with_context(|| format!("reading schema root {:?}", root))?
        {
            let namespace_dir = namespace_entry?.path();
            if !namespace_dir.is_dir() {
                continue;
            }
            let namespace = dir_name(&namespace_dir)?;

            for doctype_entry in fs::read_dir(&namespace_dir)? {
                let doctype_dir = doctype_entry?.path();
                if !doctype_dir.is_dir() {
                    continue;
                }
                let doc_type = dir_name(&doctype_dir)?;

                for file_entry in fs::read_dir(&doctype_dir)? {
                    let file = file_entry?.path();
                    let Some(version) = schema_file_version(&file, &doc_type) else {
                        continue;
                    };

                    let raw = fs::read_to_string(&file)
                        .with_context(|| format!("reading schema file {:?}", file))?;
                    self.load_schema_json(&namespace, &doc_type, version, &raw)
                        .with_context(|| format!("loading schema file {:?}", file))?;
                    loaded += 1;
                }
            }
        }

        log::info!("SCHEMA_REGISTRY_LOADED schemas={}", loaded);
        Ok(loaded)
    }

    /// Resolve the schema for an incoming record.
    ///
    /// Exact-match only; there is no fallback to the nearest version, to
    /// preserve the backward-compatibility guarantees of downstream
    /// consumers.
    pub fn resolve(
        &self,
        namespace: &str,
        doc_type: &str,
        version: u32,
    ) -> Result<Arc<SchemaDocument>, SchemaError> {
        let key = SchemaKey::new(namespace, doc_type, version);
        if let Some(schema) = self.schemas.get(&key) {
            return Ok(Arc::clone(schema));
        }

        let family = (namespace.to_string(), doc_type.to_string());
        match self.highest.get(&family) {
            Some(&highest) if version > highest => {
                log::warn!(
                    "SCHEMA_VERSION_UNSUPPORTED schema={} highest={}",
                    key.qualified_name(),
                    highest
                );
                Err(SchemaError::VersionUnsupported {
                    namespace: namespace.to_string(),
                    doc_type: doc_type.to_string(),
                    version,
                    highest,
                })
            }
            _ => {
                log::warn!("SCHEMA_NOT_FOUND schema={}", key.qualified_name());
                Err(SchemaError::SchemaNotFound {
                    namespace: namespace.to_string(),
                    doc_type: doc_type.to_string(),
                    version,
                })
            }
        }
    }
}

fn dir_name(path: &Path) -> anyhow::Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .with_context(|| format!("non-utf8 directory name {:?}", path))
}

/// Parse `<doctype>.<version>.schema.json` file names; anything else is
/// skipped.
fn schema_file_version(path: &Path, doc_type: &str) -> Option<u32> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(".schema.json")?;
    let version = stem.strip_prefix(doc_type)?.strip_prefix('.')?;
    version.parse().ok()
}
