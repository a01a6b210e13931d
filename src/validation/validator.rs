//! Structural document validation.
//!
//! Evaluates a decrypted document against a compiled schema's
//! constraints: required groups (the `anyOf` of `required` sets), value
//! types, full-anchor patterns, and per-element array constraints.
//! Undeclared properties pass through unchanged; the schema is additive
//! by default. Validation is deterministic and total.

use serde_json::Value;

use crate::logging::structured::LogContext;
use crate::schema::document::{FieldConstraint, FieldType, SchemaDocument};

/// Kind of constraint a field failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    /// No `required` group was fully present at the top level.
    MissingRequiredGroup,
    TypeMismatch {
        expected: FieldType,
        actual: &'static str,
    },
    PatternMismatch,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::MissingRequiredGroup => "missing_required_group",
            ViolationKind::TypeMismatch { .. } => "type_mismatch",
            ViolationKind::PatternMismatch => "pattern_mismatch",
        }
    }
}

/// One failed constraint, naming the field pointer path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub kind: ViolationKind,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ViolationKind::MissingRequiredGroup => {
                write!(f, "{}: no required field group satisfied", self.path)
            }
            ViolationKind::TypeMismatch { expected, actual } => write!(
                f,
                "{}: expected {}, got {}",
                self.path,
                expected.as_str(),
                actual
            ),
            ViolationKind::PatternMismatch => {
                write!(f, "{}: value does not match pattern", self.path)
            }
        }
    }
}

/// Terminal validation outcome.
#[derive(Debug, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid(Vec<Violation>),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            ValidationResult::Valid => &[],
            ValidationResult::Invalid(violations) => violations,
        }
    }
}

/// Validate a document against a schema.
pub fn validate(doc: &Value, schema: &SchemaDocument, ctx: &LogContext) -> ValidationResult {
    let Some(root) = doc.as_object() else {
        log::warn!("{} VALIDATE_NOT_OBJECT type={}", ctx, json_type_name(doc));
        return ValidationResult::Invalid(vec![Violation {
            path: String::new(),
            kind: ViolationKind::TypeMismatch {
                expected: FieldType::Object,
                actual: json_type_name(doc),
            },
        }]);
    };

    let mut violations = Vec::new();

    // [1] Required groups: valid iff at least one group's fields are all
    // present and non-null at the top level.
    if !schema.required_groups.is_empty() {
        let satisfied = schema.required_groups.iter().any(|group| {
            group
                .iter()
                .all(|field| root.get(field).map(|v| !v.is_null()).unwrap_or(false))
        });
        if !satisfied {
            log::warn!(
                "{} VALIDATE_REQUIRED_GROUP_MISSING groups={:?}",
                ctx,
                schema.required_groups
            );
            violations.push(Violation {
                path: String::new(),
                kind: ViolationKind::MissingRequiredGroup,
            });
        }
    }

    // [2] Declared properties present in the document. Unknown
    // properties are permitted and ignored.
    for (name, value) in root {
        if let Some(constraint) = schema.constraint(name) {
            check_constraint(&format!("/{}", name), value, constraint, &mut violations);
        }
    }

    if violations.is_empty() {
        log::debug!("{} VALIDATE_OK properties={}", ctx, root.len());
        ValidationResult::Valid
    } else {
        log::warn!("{} VALIDATE_FAILED violations={}", ctx, violations.len());
        ValidationResult::Invalid(violations)
    }
}

fn check_constraint(
    path: &str,
    value: &Value,
    constraint: &FieldConstraint,
    violations: &mut Vec<Violation>,
) {
    if !constraint.field_type.matches(value) {
        violations.push(Violation {
            path: path.to_string(),
            kind: ViolationKind::TypeMismatch {
                expected: constraint.field_type,
                actual: json_type_name(value),
            },
        });
        return;
    }

    if let (Some(pattern), Some(s)) = (&constraint.pattern, value.as_str()) {
        if !pattern.is_match(s) {
            violations.push(Violation {
                path: path.to_string(),
                kind: ViolationKind::PatternMismatch,
            });
        }
    }

    if let (Some(items), Some(elements)) = (&constraint.items, value.as_array()) {
        for (index, element) in elements.iter().enumerate() {
            check_constraint(&format!("{}/{}", path, index), element, items, violations);
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
