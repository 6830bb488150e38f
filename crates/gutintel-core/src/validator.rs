//! Validation orchestrator.
//!
//! [`Validator`] runs the full pipeline over one raw submission: ingredient
//! fields and slug resolution, the three effect collections, citations,
//! interactions, then acceptance. Traversal order is fixed, so the same
//! input always yields the same violations in the same order.
//!
//! ```
//! use gutintel_core::lookup::EmptyCorpus;
//! use gutintel_core::model::RawSubmission;
//! use gutintel_core::policy::ValidationPolicy;
//! use gutintel_core::validator::Validator;
//!
//! let raw = RawSubmission::from_json_str(r#"{
//!     "ingredient": {"name": "Inulin", "category": "prebiotic",
//!                    "gut_score": "8.5", "confidence_score": 0.9},
//!     "citations": [{"pmid": "12345678", "title": "T", "authors": "A",
//!                    "study_type": "rct"}]
//! }"#).unwrap();
//!
//! let outcome = Validator::new(ValidationPolicy::default()).validate(&raw, &EmptyCorpus);
//! let record = outcome.into_record().unwrap();
//! assert_eq!(record.ingredient.slug, "inulin");
//! assert_eq!(record.ingredient.gut_score, 8.5);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::lookup::{CorpusEntry, CorpusIndex, CorpusLookup};
use crate::model::{
    Category, Citation, Ingredient, IngredientSubmission, Interaction, MetabolicEffect,
    MicrobiomeEffect, RawSubmission, SymptomEffect,
};
use crate::policy::ValidationPolicy;
use crate::record::{Checker, IngredientFields};
use crate::slug::derive_slug;
use crate::violation::{FieldPath, Violation, ViolationKind};

/// Result of validating one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// No hard violations. Soft findings ride along as warnings.
    Accepted {
        record: IngredientSubmission,
        warnings: Vec<Violation>,
    },
    /// At least one hard violation. Every finding is listed, warnings included.
    Rejected { violations: Vec<Violation> },
}

impl Outcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted { .. })
    }

    /// Warnings of an accepted record, or every finding of a rejected one.
    pub fn violations(&self) -> &[Violation] {
        match self {
            Outcome::Accepted { warnings, .. } => warnings,
            Outcome::Rejected { violations } => violations,
        }
    }

    pub fn record(&self) -> Option<&IngredientSubmission> {
        match self {
            Outcome::Accepted { record, .. } => Some(record),
            Outcome::Rejected { .. } => None,
        }
    }

    pub fn into_record(self) -> Option<IngredientSubmission> {
        match self {
            Outcome::Accepted { record, .. } => Some(record),
            Outcome::Rejected { .. } => None,
        }
    }

    pub fn error_count(&self) -> usize {
        self.violations().iter().filter(|v| v.is_error()).count()
    }
}

/// What one run learned about the identity of its submission.
struct Run {
    outcome: Outcome,
    id: Option<String>,
    /// `(slug, name)` the submission would occupy, if both resolved.
    claim: Option<(String, String)>,
}

/// Stateless validation pipeline; share it freely across threads.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    policy: ValidationPolicy,
}

impl Validator {
    pub fn new(policy: ValidationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Validates a single submission against the existing corpus.
    pub fn validate(&self, raw: &RawSubmission, corpus: &dyn CorpusLookup) -> Outcome {
        self.run(raw, corpus, None).outcome
    }

    /// Validates submissions in order. Besides the corpus, each one is checked
    /// against the ids, slugs and names claimed by earlier submissions in the
    /// batch, whether or not those were accepted. A batch claim is never
    /// "self", even when it carries the same id.
    pub fn validate_batch(
        &self,
        raws: &[RawSubmission],
        corpus: &dyn CorpusLookup,
    ) -> Vec<Outcome> {
        let mut claimed = BatchClaims::default();
        let mut outcomes = Vec::with_capacity(raws.len());
        for (i, raw) in raws.iter().enumerate() {
            let run = self.run(raw, corpus, Some(&claimed));
            if let Some(id) = run.id {
                let label = match &run.claim {
                    Some((_, name)) => name.clone(),
                    None => id.clone(),
                };
                claimed.ids.entry(id).or_insert(label);
            }
            if let Some((slug, name)) = run.claim {
                claimed.index.insert(CorpusEntry {
                    id: format!("batch:{}", i),
                    slug,
                    name,
                });
            }
            outcomes.push(run.outcome);
        }
        outcomes
    }

    fn run(
        &self,
        raw: &RawSubmission,
        corpus: &dyn CorpusLookup,
        batch: Option<&BatchClaims>,
    ) -> Run {
        let mut check = Checker::new(&self.policy);
        let at = FieldPath::root("ingredient");

        let fields = check.ingredient_fields(&at, raw);
        let stored = fields.id.as_deref().and_then(|id| corpus.find_by_id(id));
        let slug = resolve_slug(&mut check, &at, &fields, stored.as_ref());
        let uniqueness = Uniqueness {
            own_id: fields.id.as_deref(),
            corpus,
            batch,
        };
        if let Some(id) = fields.id.as_deref() {
            uniqueness.check_id(&mut check, at.field("id"), id);
        }
        if let Some(name) = fields.name.as_deref() {
            uniqueness.check(&mut check, at.field("name"), "name", name, |l, v| l.find_by_name(v));
        }
        if let Some(slug) = slug.as_deref() {
            uniqueness.check(&mut check, at.field("slug"), "slug", slug, |l, v| l.find_by_slug(v));
        }

        let microbiome: Vec<Option<MicrobiomeEffect>> = raw
            .microbiome_effects
            .iter()
            .enumerate()
            .map(|(i, e)| check.microbiome_effect(&FieldPath::indexed("microbiome_effects", i), e))
            .collect();
        if fields.category == Some(Category::Probiotic) {
            check.probiotic_expectations(raw.microbiome_effects.len(), fields.dosage_info.as_ref());
        }
        let metabolic: Vec<Option<MetabolicEffect>> = raw
            .metabolic_effects
            .iter()
            .enumerate()
            .map(|(i, e)| check.metabolic_effect(&FieldPath::indexed("metabolic_effects", i), e))
            .collect();
        let symptom: Vec<Option<SymptomEffect>> = raw
            .symptom_effects
            .iter()
            .enumerate()
            .map(|(i, e)| check.symptom_effect(&FieldPath::indexed("symptom_effects", i), e))
            .collect();

        let mut citation_keys = Vec::new();
        let citations: Vec<Option<Citation>> = raw
            .citations
            .iter()
            .enumerate()
            .map(|(i, c)| {
                check.citation(&FieldPath::indexed("citations", i), i, c, &mut citation_keys)
            })
            .collect();
        check.required_citations(raw.citations.len());

        let mut pairs = Vec::new();
        let interactions: Vec<Option<Interaction>> = raw
            .interactions
            .iter()
            .enumerate()
            .map(|(i, x)| {
                check.interaction(&FieldPath::indexed("interactions", i), x, &mut pairs, i)
            })
            .collect();

        let id = fields.id.clone();
        let claim = match (&slug, &fields.name) {
            (Some(slug), Some(name)) => Some((slug.clone(), name.clone())),
            _ => None,
        };

        let parts = Parts {
            microbiome,
            metabolic,
            symptom,
            citations,
            interactions,
        };
        let record = if check.findings.has_errors() {
            None
        } else {
            assemble(fields, slug, parts)
        };
        let outcome = match record {
            Some(record) => Outcome::Accepted {
                record,
                warnings: check.findings.into_vec(),
            },
            None => Outcome::Rejected {
                violations: check.findings.into_vec(),
            },
        };

        Run { outcome, id, claim }
    }
}

/// The stored slug wins when the id is known; otherwise it is derived from the name.
fn resolve_slug(
    check: &mut Checker<'_>,
    at: &FieldPath,
    fields: &IngredientFields,
    stored: Option<&CorpusEntry>,
) -> Option<String> {
    match (&fields.slug, stored) {
        (Some(slug), Some(entry)) if *slug != entry.slug => {
            check.push(
                Violation::error(
                    ViolationKind::CrossFieldViolation,
                    at.field("slug"),
                    format!("slug cannot change once accepted; stored slug is '{}'", entry.slug),
                )
                .with_related(at.field("id"))
                .with_value(slug.as_str()),
            );
            Some(slug.clone())
        }
        (Some(slug), _) => Some(slug.clone()),
        // A malformed slug was already reported; deriving one would hide it.
        (None, _) if fields.slug_supplied => None,
        (None, Some(entry)) => Some(entry.slug.clone()),
        (None, None) => {
            let name = fields.name.as_deref()?;
            match derive_slug(name) {
                Ok(slug) => Some(slug),
                Err(e) => {
                    let path = at.field("slug");
                    check.push(
                        Violation::error(ViolationKind::DerivationError, path, e.to_string())
                            .with_related(at.field("name"))
                            .with_value(name),
                    );
                    None
                }
            }
        }
    }
}

/// What earlier submissions in a batch have claimed. Entries in `index` are
/// keyed by batch position; `ids` maps each explicit id to the name of the
/// first submission that carried it, or to the id when no name resolved.
#[derive(Default)]
struct BatchClaims {
    index: CorpusIndex,
    ids: HashMap<String, String>,
}

struct Uniqueness<'a> {
    own_id: Option<&'a str>,
    corpus: &'a dyn CorpusLookup,
    batch: Option<&'a BatchClaims>,
}

impl Uniqueness<'_> {
    /// Two submissions in one batch may not target the same stored record.
    fn check_id(&self, check: &mut Checker<'_>, path: String, id: &str) {
        let Some(first) = self.batch.and_then(|b| b.ids.get(id)) else {
            return;
        };
        check.push(
            Violation::error(
                ViolationKind::UniquenessViolation,
                path,
                format!("id '{}' is already used by '{}' earlier in this batch", id, first),
            )
            .with_value(id),
        );
    }

    /// Reports at most one collision per field; earlier batch claims first.
    fn check(
        &self,
        check: &mut Checker<'_>,
        path: String,
        field: &str,
        value: &str,
        find: impl Fn(&dyn CorpusLookup, &str) -> Option<CorpusEntry>,
    ) {
        let foreign = |entry: &CorpusEntry| self.own_id != Some(entry.id.as_str());

        let in_batch = self.batch.and_then(|b| find(&b.index as &dyn CorpusLookup, value));
        let message = if let Some(entry) = in_batch {
            format!(
                "{} '{}' is already claimed by '{}' earlier in this batch",
                field, value, entry.name
            )
        } else if let Some(entry) = find(self.corpus, value).filter(|e| foreign(e)) {
            format!("{} '{}' already belongs to '{}' ({})", field, value, entry.name, entry.slug)
        } else {
            return;
        };
        check.push(
            Violation::error(ViolationKind::UniquenessViolation, path, message).with_value(value),
        );
    }
}

struct Parts {
    microbiome: Vec<Option<MicrobiomeEffect>>,
    metabolic: Vec<Option<MetabolicEffect>>,
    symptom: Vec<Option<SymptomEffect>>,
    citations: Vec<Option<Citation>>,
    interactions: Vec<Option<Interaction>>,
}

fn assemble(
    fields: IngredientFields,
    slug: Option<String>,
    parts: Parts,
) -> Option<IngredientSubmission> {
    Some(IngredientSubmission {
        ingredient: Ingredient {
            id: fields.id,
            name: fields.name?,
            slug: slug?,
            aliases: fields.aliases,
            category: fields.category?,
            description: fields.description,
            gut_score: fields.gut_score?,
            confidence_score: fields.confidence_score?,
            dosage_info: fields.dosage_info,
            safety_notes: fields.safety_notes,
        },
        microbiome_effects: parts.microbiome.into_iter().collect::<Option<_>>()?,
        metabolic_effects: parts.metabolic.into_iter().collect::<Option<_>>()?,
        symptom_effects: parts.symptom.into_iter().collect::<Option<_>>()?,
        citations: parts.citations.into_iter().collect::<Option<_>>()?,
        interactions: parts.interactions.into_iter().collect::<Option<_>>()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::EmptyCorpus;
    use serde_json::json;

    fn validator() -> Validator {
        Validator::new(ValidationPolicy::default().with_current_year(2025))
    }

    fn raw(value: serde_json::Value) -> RawSubmission {
        RawSubmission::from_value(value).unwrap()
    }

    fn minimal(name: &str) -> RawSubmission {
        raw(json!({
            "ingredient": {
                "name": name, "category": "fiber", "gut_score": 7, "confidence_score": 0.8
            },
            "citations": [{ "pmid": "1", "title": "T", "authors": "A", "study_type": "rct" }]
        }))
    }

    #[test]
    fn accepts_minimal_record_without_warnings() {
        let outcome = validator().validate(&minimal("Psyllium Husk"), &EmptyCorpus);
        assert!(outcome.is_accepted(), "{:?}", outcome.violations());
        assert!(outcome.violations().is_empty());
        assert_eq!(outcome.record().unwrap().ingredient.slug, "psyllium-husk");
    }

    #[test]
    fn missing_name_is_not_also_a_derivation_error() {
        let outcome = validator().validate(
            &raw(json!({
                "ingredient": { "category": "fiber", "gut_score": 1, "confidence_score": 0.5 }
            })),
            &EmptyCorpus,
        );
        let kinds: Vec<_> = outcome.violations().iter().map(|v| v.kind).collect();
        assert!(kinds.contains(&ViolationKind::MissingField));
        assert!(!kinds.contains(&ViolationKind::DerivationError));
    }

    #[test]
    fn underivable_name_is_a_derivation_error() {
        let outcome = validator().validate(&minimal("!!!"), &EmptyCorpus);
        assert!(!outcome.is_accepted());
        assert!(outcome
            .violations()
            .iter()
            .any(|v| v.kind == ViolationKind::DerivationError && v.path == "ingredient.slug"));
    }

    #[test]
    fn own_stored_entry_is_not_a_collision() {
        let corpus: CorpusIndex =
            [CorpusEntry::new("abc", "inulin", "Inulin")].into_iter().collect();
        let mut submission = minimal("Inulin");
        submission.ingredient.id = Some(json!("abc"));
        let outcome = validator().validate(&submission, &corpus);
        assert!(outcome.is_accepted(), "{:?}", outcome.violations());
    }

    #[test]
    fn stored_slug_is_adopted_and_cannot_change() {
        let corpus: CorpusIndex = [CorpusEntry::new("abc", "chicory-inulin", "Inulin")]
            .into_iter()
            .collect();
        let mut submission = minimal("Inulin");
        submission.ingredient.id = Some(json!("abc"));
        let outcome = validator().validate(&submission, &corpus);
        assert_eq!(outcome.record().unwrap().ingredient.slug, "chicory-inulin");

        submission.ingredient.slug = Some(json!("inulin"));
        let outcome = validator().validate(&submission, &corpus);
        let v = &outcome.violations()[0];
        assert_eq!(v.kind, ViolationKind::CrossFieldViolation);
        assert_eq!(v.path, "ingredient.slug");
    }

    #[test]
    fn malformed_slug_is_not_replaced_by_derivation() {
        let mut submission = minimal("Inulin");
        submission.ingredient.slug = Some(json!("Inulin Root"));
        let outcome = validator().validate(&submission, &EmptyCorpus);
        let kinds: Vec<_> = outcome.violations().iter().map(|v| v.kind).collect();
        assert_eq!(kinds, vec![ViolationKind::FormatViolation]);
    }

    #[test]
    fn batch_reports_intra_batch_collisions_only_on_later_records() {
        let outcomes = validator().validate_batch(
            &[minimal("Kefir"), minimal("KEFIR"), minimal("Kombucha")],
            &EmptyCorpus,
        );
        assert!(outcomes[0].is_accepted());
        assert!(!outcomes[1].is_accepted());
        assert!(outcomes[1]
            .violations()
            .iter()
            .all(|v| v.kind == ViolationKind::UniquenessViolation));
        assert!(outcomes[2].is_accepted());
    }

    #[test]
    fn batch_records_sharing_an_id_are_compared() {
        let mut first = minimal("Inulin");
        first.ingredient.id = Some(json!("x1"));
        let mut second = minimal("Inulin");
        second.ingredient.id = Some(json!("x1"));
        second.ingredient.gut_score = Some(json!(3));

        let outcomes = validator().validate_batch(&[first, second], &EmptyCorpus);
        assert!(outcomes[0].is_accepted());
        assert!(!outcomes[1].is_accepted());
        let paths: Vec<_> = outcomes[1].violations().iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, vec!["ingredient.id", "ingredient.name", "ingredient.slug"]);
    }

    #[test]
    fn repeated_id_is_rejected_even_under_another_name() {
        let mut first = minimal("Inulin");
        first.ingredient.id = Some(json!("x1"));
        let mut second = minimal("Psyllium");
        second.ingredient.id = Some(json!("x1"));

        let outcomes = validator().validate_batch(&[first, second], &EmptyCorpus);
        assert!(outcomes[0].is_accepted());
        let violations = outcomes[1].violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::UniquenessViolation);
        assert_eq!(violations[0].path, "ingredient.id");
        assert_eq!(violations[0].value.as_deref(), Some("x1"));
        assert!(violations[0].message.contains("'Inulin'"));
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome = validator().validate(&minimal("Kefir"), &EmptyCorpus);
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], "accepted");
        assert_eq!(value["record"]["ingredient"]["slug"], "kefir");
    }
}
