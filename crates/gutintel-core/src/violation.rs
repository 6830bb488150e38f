//! Structured validation findings.
//!
//! The validator never throws: every problem it sees becomes a
//! [`Violation`] carrying the field path, the rule kind that failed, a
//! [`Severity`], and the offending value. The orchestrator decides
//! acceptance from the collected [`Findings`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Which rule a violation broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Value cannot be parsed as the declared type.
    TypeMismatch,
    /// Numeric value (or text length) outside declared bounds.
    RangeViolation,
    /// Value not in the declared fixed vocabulary.
    EnumViolation,
    /// String does not match the declared pattern.
    FormatViolation,
    /// Collides with an existing corpus entry or another record in the batch.
    UniquenessViolation,
    /// A relationship between two or more fields is broken.
    CrossFieldViolation,
    /// A required field could not be derived.
    DerivationError,
    /// A required value or collection is absent.
    MissingField,
}

impl ViolationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TypeMismatch => "type_mismatch",
            Self::RangeViolation => "range_violation",
            Self::EnumViolation => "enum_violation",
            Self::FormatViolation => "format_violation",
            Self::UniquenessViolation => "uniqueness_violation",
            Self::CrossFieldViolation => "cross_field_violation",
            Self::DerivationError => "derivation_error",
            Self::MissingField => "missing_field",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hard violations block acceptance; warnings are reported only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
        }
    }

    pub const fn is_error(self) -> bool {
        matches!(self, Self::Error)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single finding produced by the validation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Primary field path, e.g. `citations[1].pmid`.
    pub path: String,
    /// Other fields involved in a cross-field or uniqueness rule.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<String>,
    pub kind: ViolationKind,
    pub severity: Severity,
    pub message: String,
    /// The offending value, rendered as text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Violation {
    pub fn new(
        kind: ViolationKind,
        severity: Severity,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            related: Vec::new(),
            kind,
            severity,
            message: message.into(),
            value: None,
        }
    }

    pub fn error(kind: ViolationKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Error, path, message)
    }

    pub fn warning(
        kind: ViolationKind,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(kind, Severity::Warning, path, message)
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_related(mut self, path: impl Into<String>) -> Self {
        self.related.push(path.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity.is_error()
    }

    /// True if `path` is the primary path or one of the related paths.
    pub fn mentions(&self, path: &str) -> bool {
        self.path == path || self.related.iter().any(|p| p == path)
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {} [{}]", self.severity, self.path, self.message, self.kind)?;
        if let Some(ref value) = self.value {
            write!(f, " (got {:?})", value)?;
        }
        Ok(())
    }
}

/// Dotted/indexed location of a record inside a submission.
///
/// ```
/// use gutintel_core::violation::FieldPath;
///
/// let p = FieldPath::indexed("citations", 2);
/// assert_eq!(p.field("pmid"), "citations[2].pmid");
/// assert_eq!(FieldPath::root("ingredient").child("dosage_info").field("unit"),
///            "ingredient.dosage_info.unit");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath(String);

impl FieldPath {
    pub fn root(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn indexed(section: &str, index: usize) -> Self {
        Self(format!("{}[{}]", section, index))
    }

    pub fn child(&self, name: &str) -> Self {
        Self(self.field(name))
    }

    pub fn field(&self, name: &str) -> String {
        format!("{}.{}", self.0, name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Renders a raw JSON value for the `value` slot of a violation.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Ordered accumulator of violations for one submission.
#[derive(Debug, Default)]
pub struct Findings {
    items: Vec<Violation>,
}

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, violation: Violation) {
        self.items.push(violation);
    }

    /// Records the error of a failed rule check and yields the value otherwise.
    pub fn accept<T>(&mut self, checked: Result<Option<T>, Violation>) -> Option<T> {
        match checked {
            Ok(value) => value,
            Err(violation) => {
                self.items.push(violation);
                None
            }
        }
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Violation::is_error)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Violation> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_records_errors_and_passes_values() {
        let mut findings = Findings::new();
        assert_eq!(findings.accept::<i32>(Ok(Some(3))), Some(3));
        assert_eq!(findings.accept::<i32>(Ok(None)), None);
        let v = Violation::error(ViolationKind::TypeMismatch, "a.b", "bad");
        assert_eq!(findings.accept::<i32>(Err(v)), None);
        assert_eq!(findings.len(), 1);
        assert!(findings.has_errors());
    }

    #[test]
    fn warnings_do_not_count_as_errors() {
        let mut findings = Findings::new();
        findings.push(Violation::warning(ViolationKind::MissingField, "citations", "none"));
        assert!(!findings.has_errors());
        assert!(!findings.is_empty());
    }

    #[test]
    fn display_includes_value() {
        let v = Violation::error(
            ViolationKind::RangeViolation,
            "ingredient.gut_score",
            "out of range",
        )
        .with_value("11");
        assert_eq!(
            v.to_string(),
            "error ingredient.gut_score: out of range [range_violation] (got \"11\")"
        );
    }

    #[test]
    fn mentions_checks_related_paths() {
        let v = Violation::error(ViolationKind::CrossFieldViolation, "x.min", "m")
            .with_related("x.max");
        assert!(v.mentions("x.min"));
        assert!(v.mentions("x.max"));
        assert!(!v.mentions("x.other"));
    }

    #[test]
    fn serializes_kind_in_snake_case() {
        let v = Violation::warning(ViolationKind::UniquenessViolation, "p", "m");
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["kind"], "uniqueness_violation");
        assert_eq!(json["severity"], "warning");
        assert!(json.get("related").is_none());
    }
}
