//! Validation policy.
//!
//! Research knowledge is incomplete, so several rules are soft by default.
//! The policy makes each of them an explicit setting instead of a fixed
//! behavior, and it is handed to [`Validator::new`](crate::validator::Validator::new)
//! at construction.

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::violation::Severity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationPolicy {
    /// Citations a submission should carry.
    pub min_citations: usize,
    /// Severity when fewer than `min_citations` are supplied.
    pub missing_citations: Severity,
    /// Severity for a citation with neither PMID nor DOI.
    pub citation_identifier: Severity,
    /// Severity for probiotics lacking microbiome effects or a CFU dose.
    pub probiotic_expectations: Severity,
    /// Severity for `dosage_info` keys outside the known set.
    pub unknown_dosage_key: Severity,
    /// Severity for `[...]` placeholder text left in from a template.
    pub placeholder_text: Severity,
    /// Upper bound for `publication_year`.
    pub current_year: i32,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            min_citations: 1,
            missing_citations: Severity::Warning,
            citation_identifier: Severity::Warning,
            probiotic_expectations: Severity::Warning,
            unknown_dosage_key: Severity::Warning,
            placeholder_text: Severity::Warning,
            current_year: chrono::Utc::now().year(),
        }
    }
}

impl ValidationPolicy {
    /// Every soft rule becomes a hard rejection.
    pub fn strict() -> Self {
        Self {
            missing_citations: Severity::Error,
            citation_identifier: Severity::Error,
            probiotic_expectations: Severity::Error,
            unknown_dosage_key: Severity::Error,
            placeholder_text: Severity::Error,
            ..Self::default()
        }
    }

    pub fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = year;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_lenient() {
        let policy = ValidationPolicy::default();
        assert_eq!(policy.min_citations, 1);
        assert_eq!(policy.missing_citations, Severity::Warning);
        assert!(policy.current_year >= 2024);
    }

    #[test]
    fn strict_rejects_everything_soft() {
        let policy = ValidationPolicy::strict().with_current_year(2020);
        assert!(policy.placeholder_text.is_error());
        assert!(policy.probiotic_expectations.is_error());
        assert_eq!(policy.current_year, 2020);
    }
}
