//! Per-record field passes and cross-field rules.
//!
//! [`Checker`] walks one record at a time, applying the field rules declared
//! below and pushing every violation into its [`Findings`]. Cross-field rules
//! (dose ordering, duplicate citations, self-interactions, soft category
//! expectations) live here too, so the orchestrator in
//! [`crate::validator`] only decides traversal order and uniqueness.

use serde_json::Value;
use std::collections::HashSet;

use crate::model::{
    BacteriaLevel, Category, Citation, DosageInfo, EffectDirection, EffectStrength, Interaction,
    InteractionType, MetabolicEffect, MicrobiomeEffect, RawCitation, RawInteraction,
    RawMetabolicEffect, RawMicrobiomeEffect, RawObject, RawSubmission, RawSymptomEffect,
    StudyType, SymptomEffect,
};
use crate::policy::ValidationPolicy;
use crate::rules::{
    present, round_to, DecimalRule, EnumRule, FieldRule, FlagRule, IntegerRule, Pattern,
    PatternRule, TextRule,
};
use crate::violation::{render_value, FieldPath, Findings, Violation, ViolationKind};

// ingredient
const ID: TextRule = TextRule::optional("id").max_len(64);
const NAME: TextRule = TextRule::required("name").max_len(255);
const SLUG: PatternRule = PatternRule::optional("slug", Pattern::Slug);
const CATEGORY: EnumRule<Category> = EnumRule::required("category");
const DESCRIPTION: TextRule = TextRule::optional("description");
const GUT_SCORE: DecimalRule = DecimalRule::new("gut_score")
    .required()
    .between(0.0, 10.0)
    .places(1);
const CONFIDENCE_SCORE: DecimalRule = DecimalRule::new("confidence_score")
    .between(0.0, 1.0)
    .places(2);
const SAFETY_NOTES: TextRule = TextRule::optional("safety_notes");

// effects
const CONFIDENCE: DecimalRule = DecimalRule::new("confidence").between(0.0, 1.0).places(2);
const EFFECT_STRENGTH: EnumRule<EffectStrength> = EnumRule::required("effect_strength");
const DOSAGE_DEPENDENT: FlagRule = FlagRule::new("dosage_dependent");
const MECHANISM: TextRule = TextRule::optional("mechanism");

const BACTERIA_NAME: TextRule = TextRule::required("bacteria_name").max_len(255);
const BACTERIA_LEVEL: EnumRule<BacteriaLevel> = EnumRule::required("bacteria_level");
const EFFECT_TYPE: TextRule = TextRule::optional("effect_type").max_len(100);

const EFFECT_NAME: TextRule = TextRule::required("effect_name").max_len(255);
const EFFECT_CATEGORY: TextRule = TextRule::optional("effect_category").max_len(100);
const IMPACT_DIRECTION: EnumRule<EffectDirection> = EnumRule::required("impact_direction");

const SYMPTOM_NAME: TextRule = TextRule::required("symptom_name").max_len(255);
const SYMPTOM_CATEGORY: TextRule = TextRule::optional("symptom_category").max_len(100);
const EFFECT_DIRECTION: EnumRule<EffectDirection> = EnumRule::required("effect_direction");
const POPULATION_NOTES: TextRule = TextRule::optional("population_notes");

// citations
const PMID: PatternRule = PatternRule::optional("pmid", Pattern::Pmid);
const DOI: PatternRule = PatternRule::optional("doi", Pattern::Doi);
const TITLE: TextRule = TextRule::required("title");
const AUTHORS: TextRule = TextRule::required("authors");
const JOURNAL: TextRule = TextRule::optional("journal").max_len(255);
const STUDY_TYPE: EnumRule<StudyType> = EnumRule::required("study_type");
const SAMPLE_SIZE: IntegerRule = IntegerRule::optional("sample_size").at_least(1);
const STUDY_QUALITY: DecimalRule = DecimalRule::new("study_quality").between(0.0, 1.0).places(2);
const FIRST_PUBLICATION_YEAR: i64 = 1900;

// interactions
const INGREDIENT_1: TextRule = TextRule::required("ingredient_1_id");
const INGREDIENT_2: TextRule = TextRule::required("ingredient_2_id");
const INTERACTION_TYPE: EnumRule<InteractionType> = EnumRule::required("interaction_type");
const EFFECT_DESCRIPTION: TextRule = TextRule::optional("effect_description");

/// A string of the form `[...]`, as emitted by the template generator.
pub fn is_placeholder(text: &str) -> bool {
    let text = text.trim();
    text.len() >= 2 && text.starts_with('[') && text.ends_with(']')
}

/// Ingredient scalars after the field pass, before slug resolution.
#[derive(Debug, Default)]
pub(crate) struct IngredientFields {
    pub id: Option<String>,
    pub name: Option<String>,
    pub slug: Option<String>,
    /// A slug value was present in the submission (valid or not).
    pub slug_supplied: bool,
    pub aliases: Vec<String>,
    pub category: Option<Category>,
    pub description: Option<String>,
    pub gut_score: Option<f64>,
    pub confidence_score: Option<f64>,
    pub dosage_info: Option<DosageInfo>,
    pub safety_notes: Option<String>,
}

/// Identity of a citation inside one submission: (pmid, doi, folded title).
///
/// Titles are compared after trimming and lowercasing, so "Gut Flora" and
/// "gut flora " count as the same title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CitationKey {
    pmid: Option<String>,
    doi: Option<String>,
    title: Option<String>,
}

impl CitationKey {
    fn duplicates(&self, other: &CitationKey) -> bool {
        if self.title.is_none() || self.title != other.title {
            return false;
        }
        let same_pmid = self.pmid.is_some() && self.pmid == other.pmid;
        same_pmid || (self.pmid == other.pmid && self.doi == other.doi)
    }
}

pub(crate) struct Checker<'p> {
    policy: &'p ValidationPolicy,
    pub findings: Findings,
}

impl<'p> Checker<'p> {
    pub fn new(policy: &'p ValidationPolicy) -> Self {
        Self {
            policy,
            findings: Findings::new(),
        }
    }

    pub fn push(&mut self, violation: Violation) {
        self.findings.push(violation);
    }

    fn take<R: FieldRule>(
        &mut self,
        rule: R,
        at: &FieldPath,
        value: Option<&Value>,
    ) -> Option<R::Output> {
        self.findings.accept(rule.check(at, value))
    }

    /// Text rule plus the placeholder check.
    fn text(&mut self, rule: TextRule, at: &FieldPath, value: Option<&Value>) -> Option<String> {
        let text = self.take(rule, at, value)?;
        self.placeholder(at.field(rule.field()), &text);
        Some(text)
    }

    fn placeholder(&mut self, path: String, text: &str) {
        if is_placeholder(text) {
            self.push(
                Violation::new(
                    ViolationKind::FormatViolation,
                    self.policy.placeholder_text,
                    path,
                    "placeholder text left over from a template",
                )
                .with_value(text),
            );
        }
    }

    /// `low <= high` whenever both are present.
    fn ordered_pair(
        &mut self,
        at: &FieldPath,
        low: (&str, Option<f64>),
        high: (&str, Option<f64>),
    ) {
        if let (Some(lo), Some(hi)) = (low.1, high.1) {
            if lo > hi {
                self.push(
                    Violation::error(
                        ViolationKind::CrossFieldViolation,
                        at.field(low.0),
                        format!("{} ({}) must not exceed {} ({})", low.0, lo, high.0, hi),
                    )
                    .with_related(at.field(high.0)),
                );
            }
        }
    }

    // ============ Ingredient ============

    pub fn ingredient_fields(&mut self, at: &FieldPath, raw: &RawSubmission) -> IngredientFields {
        let ing = &raw.ingredient;
        let mut fields = IngredientFields {
            id: self.take(ID, at, ing.id.as_ref()),
            name: self.text(NAME, at, ing.name.as_ref()),
            slug_supplied: present(ing.slug.as_ref()).is_some(),
            ..Default::default()
        };
        fields.slug = self.take(SLUG, at, ing.slug.as_ref());
        fields.aliases = self.aliases(at, ing.aliases.as_ref(), fields.name.as_deref());
        fields.category = self.take(CATEGORY, at, ing.category.as_ref());
        fields.description = self.text(DESCRIPTION, at, ing.description.as_ref());
        fields.gut_score = self.take(GUT_SCORE, at, ing.gut_score.as_ref());
        fields.confidence_score = if present(ing.confidence_score.as_ref()).is_some() {
            self.take(CONFIDENCE_SCORE, at, ing.confidence_score.as_ref())
        } else {
            self.derive_confidence_score(at, raw)
        };
        fields.dosage_info = self.dosage_info(at, ing.dosage_info.as_ref());
        fields.safety_notes = self.text(SAFETY_NOTES, at, ing.safety_notes.as_ref());
        fields
    }

    /// Mean of the well-formed effect confidences, rounded to two places.
    /// Malformed confidences are reported later, in their own effect pass.
    fn derive_confidence_score(&mut self, at: &FieldPath, raw: &RawSubmission) -> Option<f64> {
        let unreported = FieldPath::root("_");
        let values: Vec<f64> = raw
            .microbiome_effects
            .iter()
            .map(|e| e.confidence.as_ref())
            .chain(raw.metabolic_effects.iter().map(|e| e.confidence.as_ref()))
            .chain(raw.symptom_effects.iter().map(|e| e.confidence.as_ref()))
            .filter_map(|v| CONFIDENCE.check(&unreported, v).ok().flatten())
            .collect();

        if values.is_empty() {
            self.push(Violation::error(
                ViolationKind::MissingField,
                at.field("confidence_score"),
                "confidence_score is required when no effect carries a confidence to derive it \
                 from",
            ));
            return None;
        }
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        Some(round_to(mean, 2))
    }

    fn aliases(
        &mut self,
        at: &FieldPath,
        value: Option<&Value>,
        name: Option<&str>,
    ) -> Vec<String> {
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return Vec::new();
        };
        let path = at.field("aliases");
        let Value::Array(items) = value else {
            let message = "aliases must be a list of text";
            self.push(
                Violation::error(ViolationKind::TypeMismatch, path, message)
                    .with_value(render_value(value)),
            );
            return Vec::new();
        };

        let mut seen: HashSet<String> = name.map(str::to_lowercase).into_iter().collect();
        let mut aliases = Vec::new();
        for (i, item) in items.iter().enumerate() {
            let item_path = format!("{}[{}]", path, i);
            match item {
                Value::String(s) => {
                    let alias = s.trim();
                    if alias.is_empty() {
                        continue;
                    }
                    self.placeholder(item_path, alias);
                    if seen.insert(alias.to_lowercase()) {
                        aliases.push(alias.to_string());
                    }
                }
                other => self.push(
                    Violation::error(ViolationKind::TypeMismatch, item_path, "alias must be text")
                        .with_value(render_value(other)),
                ),
            }
        }
        aliases
    }

    fn dosage_info(&mut self, at: &FieldPath, value: Option<&Value>) -> Option<DosageInfo> {
        let value = value.filter(|v| !v.is_null())?;
        let Value::Object(map) = value else {
            self.push(
                Violation::error(
                    ViolationKind::TypeMismatch,
                    at.field("dosage_info"),
                    "dosage_info must be an object",
                )
                .with_value(render_value(value)),
            );
            return None;
        };
        let dosage_at = at.child("dosage_info");
        let mut info = DosageInfo::default();

        for key in DosageInfo::NUMERIC_KEYS {
            if let Some(v) = self.take(DecimalRule::new(key), &dosage_at, map.get(*key)) {
                info.set_numeric(key, v);
            }
        }
        for key in DosageInfo::TEXT_KEYS {
            if let Some(t) = self.text(TextRule::optional(key), &dosage_at, map.get(*key)) {
                info.set_text(key, t);
            }
        }
        self.unknown_dosage_keys(&dosage_at, map, &mut info);

        self.ordered_pair(&dosage_at, ("min_dose", info.min_dose), ("max_dose", info.max_dose));
        self.ordered_pair(&dosage_at, ("min_cfu", info.min_cfu), ("max_cfu", info.max_cfu));
        Some(info)
    }

    fn unknown_dosage_keys(&mut self, at: &FieldPath, map: &RawObject, info: &mut DosageInfo) {
        for (key, value) in map {
            if DosageInfo::is_known_key(key) {
                continue;
            }
            self.push(Violation::new(
                ViolationKind::FormatViolation,
                self.policy.unknown_dosage_key,
                at.field(key),
                format!("unknown dosage_info key '{}'", key),
            ));
            info.extra.insert(key.clone(), value.clone());
        }
    }

    // ============ Effects ============

    pub fn microbiome_effect(
        &mut self,
        at: &FieldPath,
        raw: &RawMicrobiomeEffect,
    ) -> Option<MicrobiomeEffect> {
        let bacteria_name = self.text(BACTERIA_NAME, at, raw.bacteria_name.as_ref());
        let bacteria_level = self.take(BACTERIA_LEVEL, at, raw.bacteria_level.as_ref());
        let effect_type = self.text(EFFECT_TYPE, at, raw.effect_type.as_ref());
        let effect_strength = self.take(EFFECT_STRENGTH, at, raw.effect_strength.as_ref());
        let confidence = self.take(CONFIDENCE, at, raw.confidence.as_ref());
        let mechanism = self.text(MECHANISM, at, raw.mechanism.as_ref());
        Some(MicrobiomeEffect {
            bacteria_name: bacteria_name?,
            bacteria_level: bacteria_level?,
            effect_type,
            effect_strength: effect_strength?,
            confidence,
            mechanism,
        })
    }

    pub fn metabolic_effect(
        &mut self,
        at: &FieldPath,
        raw: &RawMetabolicEffect,
    ) -> Option<MetabolicEffect> {
        let effect_name = self.text(EFFECT_NAME, at, raw.effect_name.as_ref());
        let effect_category = self.text(EFFECT_CATEGORY, at, raw.effect_category.as_ref());
        let impact_direction = self.take(IMPACT_DIRECTION, at, raw.impact_direction.as_ref());
        let effect_strength = self.take(EFFECT_STRENGTH, at, raw.effect_strength.as_ref());
        let confidence = self.take(CONFIDENCE, at, raw.confidence.as_ref());
        let dosage_dependent = self.take(DOSAGE_DEPENDENT, at, raw.dosage_dependent.as_ref());
        let mechanism = self.text(MECHANISM, at, raw.mechanism.as_ref());
        Some(MetabolicEffect {
            effect_name: effect_name?,
            effect_category,
            impact_direction: impact_direction?,
            effect_strength: effect_strength?,
            confidence,
            dosage_dependent: dosage_dependent.unwrap_or(false),
            mechanism,
        })
    }

    pub fn symptom_effect(
        &mut self,
        at: &FieldPath,
        raw: &RawSymptomEffect,
    ) -> Option<SymptomEffect> {
        let symptom_name = self.text(SYMPTOM_NAME, at, raw.symptom_name.as_ref());
        let symptom_category = self.text(SYMPTOM_CATEGORY, at, raw.symptom_category.as_ref());
        let effect_direction = self.take(EFFECT_DIRECTION, at, raw.effect_direction.as_ref());
        let effect_strength = self.take(EFFECT_STRENGTH, at, raw.effect_strength.as_ref());
        let confidence = self.take(CONFIDENCE, at, raw.confidence.as_ref());
        let dosage_dependent = self.take(DOSAGE_DEPENDENT, at, raw.dosage_dependent.as_ref());
        let population_notes = self.text(POPULATION_NOTES, at, raw.population_notes.as_ref());
        Some(SymptomEffect {
            symptom_name: symptom_name?,
            symptom_category,
            effect_direction: effect_direction?,
            effect_strength: effect_strength?,
            confidence,
            dosage_dependent: dosage_dependent.unwrap_or(false),
            population_notes,
        })
    }

    /// Probiotics are expected to document bacterial effects and a CFU dose.
    pub fn probiotic_expectations(&mut self, effect_count: usize, dosage: Option<&DosageInfo>) {
        let severity = self.policy.probiotic_expectations;
        if effect_count == 0 {
            self.push(
                Violation::new(
                    ViolationKind::CrossFieldViolation,
                    severity,
                    "microbiome_effects",
                    "probiotic ingredients should document at least one microbiome effect",
                )
                .with_related("ingredient.category"),
            );
        }
        if !dosage.is_some_and(DosageInfo::is_cfu_based) {
            self.push(
                Violation::new(
                    ViolationKind::CrossFieldViolation,
                    severity,
                    "ingredient.dosage_info.unit",
                    "probiotic dosage should be given in CFU",
                )
                .with_related("ingredient.category"),
            );
        }
    }

    // ============ Citations ============

    /// Checks one citation and flags it if it repeats an earlier one.
    pub fn citation(
        &mut self,
        at: &FieldPath,
        index: usize,
        raw: &RawCitation,
        earlier: &mut Vec<(usize, CitationKey)>,
    ) -> Option<Citation> {
        let year_rule = IntegerRule::optional("publication_year")
            .between(FIRST_PUBLICATION_YEAR, i64::from(self.policy.current_year));

        let pmid = self.take(PMID, at, raw.pmid.as_ref());
        let doi = self.take(DOI, at, raw.doi.as_ref());
        let title = self.text(TITLE, at, raw.title.as_ref());
        let authors = self.text(AUTHORS, at, raw.authors.as_ref());
        let journal = self.text(JOURNAL, at, raw.journal.as_ref());
        let publication_year = self.take(year_rule, at, raw.publication_year.as_ref());
        let study_type = self.take(STUDY_TYPE, at, raw.study_type.as_ref());
        let sample_size = self.take(SAMPLE_SIZE, at, raw.sample_size.as_ref());
        let study_quality = self.take(STUDY_QUALITY, at, raw.study_quality.as_ref());

        if present(raw.pmid.as_ref()).is_none() && present(raw.doi.as_ref()).is_none() {
            self.push(
                Violation::new(
                    ViolationKind::MissingField,
                    self.policy.citation_identifier,
                    at.field("pmid"),
                    "citation has neither a pmid nor a doi",
                )
                .with_related(at.field("doi")),
            );
        }

        let key = CitationKey {
            pmid: pmid.clone(),
            doi: doi.clone(),
            title: title.as_deref().map(str::to_lowercase),
        };
        if let Some((first, _)) = earlier.iter().find(|(_, k)| k.duplicates(&key)) {
            self.push(
                Violation::error(
                    ViolationKind::UniquenessViolation,
                    at.as_str(),
                    format!("duplicates citations[{}] in this submission", first),
                )
                .with_related(format!("citations[{}]", first)),
            );
        }
        earlier.push((index, key));

        Some(Citation {
            pmid,
            doi,
            title: title?,
            authors: authors?,
            journal,
            publication_year: publication_year.and_then(|y| i32::try_from(y).ok()),
            study_type: study_type?,
            sample_size,
            study_quality,
        })
    }

    pub fn required_citations(&mut self, count: usize) {
        if count < self.policy.min_citations {
            self.push(Violation::new(
                ViolationKind::MissingField,
                self.policy.missing_citations,
                "citations",
                format!(
                    "expected at least {} citation(s), found {}",
                    self.policy.min_citations, count
                ),
            ));
        }
    }

    // ============ Interactions ============

    /// Checks one interaction and returns it in canonical pair order.
    pub fn interaction(
        &mut self,
        at: &FieldPath,
        raw: &RawInteraction,
        earlier: &mut Vec<(usize, (String, String))>,
        index: usize,
    ) -> Option<Interaction> {
        let first = self.text(INGREDIENT_1, at, raw.ingredient_1_id.as_ref());
        let second = self.text(INGREDIENT_2, at, raw.ingredient_2_id.as_ref());
        let interaction_type = self.take(INTERACTION_TYPE, at, raw.interaction_type.as_ref());
        let effect_description = self.text(EFFECT_DESCRIPTION, at, raw.effect_description.as_ref());
        let confidence = self.take(CONFIDENCE, at, raw.confidence.as_ref());

        let (first, second) = (first?, second?);
        if first == second {
            self.push(
                Violation::error(
                    ViolationKind::CrossFieldViolation,
                    at.field("ingredient_1_id"),
                    "an ingredient cannot interact with itself",
                )
                .with_related(at.field("ingredient_2_id"))
                .with_value(first.as_str()),
            );
            return None;
        }
        let pair = if first < second {
            (first, second)
        } else {
            (second, first)
        };

        if let Some((prior, _)) = earlier.iter().find(|(_, p)| *p == pair) {
            self.push(
                Violation::error(
                    ViolationKind::UniquenessViolation,
                    at.as_str(),
                    format!("repeats the ingredient pair of interactions[{}]", prior),
                )
                .with_related(format!("interactions[{}]", prior)),
            );
        }
        earlier.push((index, pair.clone()));

        Some(Interaction {
            ingredient_1_id: pair.0,
            ingredient_2_id: pair.1,
            interaction_type: interaction_type?,
            effect_description,
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::violation::Severity;
    use serde_json::json;

    fn policy() -> ValidationPolicy {
        ValidationPolicy::default().with_current_year(2025)
    }

    fn raw(value: serde_json::Value) -> RawSubmission {
        RawSubmission::from_value(value).unwrap()
    }

    #[test]
    fn placeholders() {
        assert!(is_placeholder("[Example: Bifidobacterium longum]"));
        assert!(is_placeholder(" [x] "));
        assert!(!is_placeholder("[unbalanced"));
        assert!(!is_placeholder("Inulin [chicory]x"));
    }

    #[test]
    fn aliases_are_trimmed_deduplicated_and_exclude_name() {
        let p = policy();
        let mut check = Checker::new(&p);
        let submission = raw(json!({ "ingredient": {
            "name": "Inulin",
            "aliases": [" chicory fiber", "Chicory Fiber", "inulin", "", "FOS-like"]
        }}));
        let fields = check.ingredient_fields(&FieldPath::root("ingredient"), &submission);
        assert_eq!(fields.aliases, vec!["chicory fiber".to_string(), "FOS-like".to_string()]);
    }

    #[test]
    fn dose_order_violation_references_both_fields() {
        let p = policy();
        let mut check = Checker::new(&p);
        let submission = raw(json!({ "ingredient": {
            "dosage_info": { "min_dose": 10, "max_dose": "5", "unit": "g" }
        }}));
        let fields = check.ingredient_fields(&FieldPath::root("ingredient"), &submission);
        assert_eq!(fields.dosage_info.unwrap().max_dose, Some(5.0));
        let cross: Vec<_> = check
            .findings
            .iter()
            .filter(|v| v.kind == ViolationKind::CrossFieldViolation)
            .collect();
        assert_eq!(cross.len(), 1);
        assert!(cross[0].mentions("ingredient.dosage_info.min_dose"));
        assert!(cross[0].mentions("ingredient.dosage_info.max_dose"));
    }

    #[test]
    fn unknown_dosage_keys_are_kept_and_warned() {
        let p = policy();
        let mut check = Checker::new(&p);
        let submission = raw(json!({ "ingredient": { "dosage_info": { "with_food": true } } }));
        let fields = check.ingredient_fields(&FieldPath::root("ingredient"), &submission);
        assert_eq!(fields.dosage_info.unwrap().extra.get("with_food"), Some(&json!(true)));
        let warning = check
            .findings
            .iter()
            .find(|v| v.path == "ingredient.dosage_info.with_food")
            .unwrap();
        assert_eq!(warning.severity, Severity::Warning);
    }

    #[test]
    fn confidence_score_is_derived_from_effects() {
        let p = policy();
        let mut check = Checker::new(&p);
        let submission = raw(json!({
            "ingredient": { "name": "X" },
            "microbiome_effects": [{ "confidence": 0.9 }, { "confidence": "0.8" }],
            "symptom_effects": [{ "confidence": "[Example: 0.70]" }]
        }));
        let fields = check.ingredient_fields(&FieldPath::root("ingredient"), &submission);
        assert_eq!(fields.confidence_score, Some(0.85));
        assert!(check.findings.iter().all(|v| v.path != "ingredient.confidence_score"));
    }

    #[test]
    fn missing_confidence_without_effects_is_reported() {
        let p = policy();
        let mut check = Checker::new(&p);
        let submission = raw(json!({ "ingredient": { "name": "X" } }));
        check.ingredient_fields(&FieldPath::root("ingredient"), &submission);
        let v = check
            .findings
            .iter()
            .find(|v| v.path == "ingredient.confidence_score")
            .unwrap();
        assert_eq!(v.kind, ViolationKind::MissingField);
    }

    #[test]
    fn citation_without_identifiers_warns() {
        let p = policy();
        let mut check = Checker::new(&p);
        let mut earlier = Vec::new();
        let c = RawCitation {
            title: Some(json!("A review")),
            authors: Some(json!("Smith J")),
            study_type: Some(json!("review")),
            ..Default::default()
        };
        let at = FieldPath::indexed("citations", 0);
        assert!(check.citation(&at, 0, &c, &mut earlier).is_some());
        let v: Vec<_> = check.findings.iter().collect();
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].severity, Severity::Warning);
        assert!(v[0].mentions("citations[0].doi"));
    }

    #[test]
    fn duplicate_citation_keys() {
        let k = |pmid: Option<&str>, doi: Option<&str>, title: &str| CitationKey {
            pmid: pmid.map(String::from),
            doi: doi.map(String::from),
            title: Some(title.to_lowercase()),
        };
        assert!(k(Some("1"), None, "T").duplicates(&k(Some("1"), Some("10.1/x"), "t")));
        assert!(k(None, Some("10.1/x"), "T").duplicates(&k(None, Some("10.1/x"), "T")));
        assert!(!k(Some("1"), None, "T").duplicates(&k(Some("2"), None, "T")));
        assert!(!k(Some("1"), None, "T").duplicates(&k(Some("1"), None, "Other")));
        assert!(!k(None, Some("10.1/x"), "T").duplicates(&k(None, Some("10.1/y"), "T")));
    }

    #[test]
    fn interactions_are_put_in_canonical_order() {
        let p = policy();
        let mut check = Checker::new(&p);
        let mut earlier = Vec::new();
        let i = RawInteraction {
            ingredient_1_id: Some(json!("psyllium")),
            ingredient_2_id: Some(json!("inulin")),
            interaction_type: Some(json!("synergistic")),
            ..Default::default()
        };
        let out = check
            .interaction(&FieldPath::indexed("interactions", 0), &i, &mut earlier, 0)
            .unwrap();
        assert_eq!(out.ingredient_1_id, "inulin");
        assert_eq!(out.ingredient_2_id, "psyllium");
        assert!(check.findings.is_empty());
    }

    #[test]
    fn probiotic_without_effects_or_cfu_warns_twice() {
        let p = policy();
        let mut check = Checker::new(&p);
        check.probiotic_expectations(0, None);
        assert_eq!(check.findings.len(), 2);
        assert!(!check.findings.has_errors());
    }
}
