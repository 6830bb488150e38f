//! Ingredient record types.
//!
//! Every record exists in two shapes:
//!
//! - **raw** (`Raw*`): what an upstream producer hands us. Scalars are
//!   loosely-typed JSON values so that text-typed numbers, placeholders
//!   left over from templates, and wrong types can be diagnosed field by
//!   field instead of failing deserialization wholesale.
//! - **normalized**: declared Rust field types, derived fields filled in,
//!   numbers rounded to canonical precision. Only the validator builds these.
//!
//! Both shapes serialize to the same JSON layout, so a normalized record can
//! be fed back through the validator unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// A fixed, case-sensitive vocabulary of text values.
pub trait Vocabulary: Sized + Copy + 'static {
    /// Human label used in violation messages.
    const LABEL: &'static str;
    const ALL: &'static [Self];

    fn as_str(self) -> &'static str;

    fn parse(text: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.as_str() == text)
    }

    /// Comma-separated list of the accepted spellings.
    fn choices() -> String {
        Self::ALL
            .iter()
            .map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

macro_rules! vocabulary {
    ($(#[$meta:meta])* $name:ident, $label:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl Vocabulary for $name {
            const LABEL: &'static str = $label;
            const ALL: &'static [Self] = &[$(Self::$variant),+];

            fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

vocabulary!(
    /// Category of ingredient.
    Category, "category" {
        Probiotic => "probiotic",
        Prebiotic => "prebiotic",
        Postbiotic => "postbiotic",
        Fiber => "fiber",
        Polyphenol => "polyphenol",
        FattyAcid => "fatty_acid",
        Vitamin => "vitamin",
        Mineral => "mineral",
        Herb => "herb",
        Other => "other",
    }
);

vocabulary!(
    /// Direction of change in a bacterial population.
    BacteriaLevel, "bacteria level" {
        Increase => "increase",
        Decrease => "decrease",
        Modulate => "modulate",
    }
);

vocabulary!(
    EffectStrength, "effect strength" {
        Weak => "weak",
        Moderate => "moderate",
        Strong => "strong",
    }
);

vocabulary!(
    /// Direction of a metabolic or symptom effect.
    EffectDirection, "effect direction" {
        Positive => "positive",
        Negative => "negative",
        Neutral => "neutral",
    }
);

vocabulary!(
    StudyType, "study type" {
        Rct => "rct",
        Observational => "observational",
        MetaAnalysis => "meta_analysis",
        Review => "review",
        CaseStudy => "case_study",
        InVitro => "in_vitro",
        Animal => "animal",
    }
);

vocabulary!(
    InteractionType, "interaction type" {
        Synergistic => "synergistic",
        Antagonistic => "antagonistic",
        Neutral => "neutral",
        Unknown => "unknown",
    }
);

// ============ Raw (candidate) records ============

/// Candidate submission as produced by a template, a spreadsheet
/// conversion, or hand-authored JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSubmission {
    pub ingredient: RawIngredient,
    pub microbiome_effects: Vec<RawMicrobiomeEffect>,
    pub metabolic_effects: Vec<RawMetabolicEffect>,
    pub symptom_effects: Vec<RawSymptomEffect>,
    pub citations: Vec<RawCitation>,
    pub interactions: Vec<RawInteraction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawIngredient {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aliases: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gut_score: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dosage_info: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety_notes: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawMicrobiomeEffect {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bacteria_name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bacteria_level: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect_type: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect_strength: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mechanism: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawMetabolicEffect {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect_name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect_category: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact_direction: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect_strength: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dosage_dependent: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mechanism: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSymptomEffect {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symptom_name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symptom_category: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect_direction: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect_strength: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dosage_dependent: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population_notes: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawCitation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pmid: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_year: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub study_type: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_size: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub study_quality: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawInteraction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingredient_1_id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingredient_2_id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction_type: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect_description: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Value>,
}

/// The document could not be read as a submission at all.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("invalid submission JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("submission must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

impl RawSubmission {
    pub fn from_json_str(text: &str) -> Result<Self, SubmissionError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, SubmissionError> {
        if !value.is_object() {
            return Err(SubmissionError::NotAnObject(json_type_name(&value)));
        }
        Ok(serde_json::from_value(value)?)
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============ Normalized records ============

/// A validated ingredient graph, ready for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientSubmission {
    pub ingredient: Ingredient,
    #[serde(default)]
    pub microbiome_effects: Vec<MicrobiomeEffect>,
    #[serde(default)]
    pub metabolic_effects: Vec<MetabolicEffect>,
    #[serde(default)]
    pub symptom_effects: Vec<SymptomEffect>,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub interactions: Vec<Interaction>,
}

impl IngredientSubmission {
    pub fn total_effects(&self) -> usize {
        self.microbiome_effects.len() + self.metabolic_effects.len() + self.symptom_effects.len()
    }

    /// Every effect confidence that was supplied, in traversal order.
    pub fn effect_confidences(&self) -> Vec<f64> {
        self.microbiome_effects
            .iter()
            .filter_map(|e| e.confidence)
            .chain(self.metabolic_effects.iter().filter_map(|e| e.confidence))
            .chain(self.symptom_effects.iter().filter_map(|e| e.confidence))
            .collect()
    }

    /// Converts back into the raw shape, e.g. to re-validate stored data.
    pub fn to_raw(&self) -> Result<RawSubmission, SubmissionError> {
        RawSubmission::from_value(serde_json::to_value(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub gut_score: f64,
    pub confidence_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dosage_info: Option<DosageInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_notes: Option<String>,
}

/// Structured dosage block. Keys outside the known set are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DosageInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_dose: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_dose: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_cfu: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cfu: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concentration: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl DosageInfo {
    pub const NUMERIC_KEYS: &'static [&'static str] =
        &["min_dose", "max_dose", "min_cfu", "max_cfu"];
    pub const TEXT_KEYS: &'static [&'static str] =
        &["unit", "frequency", "duration", "form", "timing", "notes", "concentration"];

    pub fn is_known_key(key: &str) -> bool {
        Self::NUMERIC_KEYS.contains(&key) || Self::TEXT_KEYS.contains(&key)
    }

    /// True if the block documents a colony-forming-unit dose.
    pub fn is_cfu_based(&self) -> bool {
        self.min_cfu.is_some()
            || self.max_cfu.is_some()
            || self
                .unit
                .as_deref()
                .is_some_and(|u| u.to_ascii_lowercase().contains("cfu"))
    }

    pub(crate) fn set_numeric(&mut self, key: &str, value: f64) {
        match key {
            "min_dose" => self.min_dose = Some(value),
            "max_dose" => self.max_dose = Some(value),
            "min_cfu" => self.min_cfu = Some(value),
            "max_cfu" => self.max_cfu = Some(value),
            _ => {}
        }
    }

    pub(crate) fn set_text(&mut self, key: &str, value: String) {
        match key {
            "unit" => self.unit = Some(value),
            "frequency" => self.frequency = Some(value),
            "duration" => self.duration = Some(value),
            "form" => self.form = Some(value),
            "timing" => self.timing = Some(value),
            "notes" => self.notes = Some(value),
            "concentration" => self.concentration = Some(value),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MicrobiomeEffect {
    pub bacteria_name: String,
    pub bacteria_level: BacteriaLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect_type: Option<String>,
    pub effect_strength: EffectStrength,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mechanism: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetabolicEffect {
    pub effect_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect_category: Option<String>,
    pub impact_direction: EffectDirection,
    pub effect_strength: EffectStrength,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub dosage_dependent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mechanism: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomEffect {
    pub symptom_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symptom_category: Option<String>,
    pub effect_direction: EffectDirection,
    pub effect_strength: EffectStrength,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub dosage_dependent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population_notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    pub title: String,
    pub authors: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_year: Option<i32>,
    pub study_type: StudyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_quality: Option<f64>,
}

/// Interaction between two ingredients, stored once per unordered pair.
///
/// `ingredient_1_id` is always the lexicographically lower identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub ingredient_1_id: String,
    pub ingredient_2_id: String,
    pub interaction_type: InteractionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Loose object view used for `dosage_info` before normalization.
pub(crate) type RawObject = Map<String, Value>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn vocabulary_matches_exact_spelling() {
        assert_eq!(Category::parse("fatty_acid"), Some(Category::FattyAcid));
        assert_eq!(Category::parse("Probiotic"), None);
        assert_eq!(StudyType::parse("meta_analysis"), Some(StudyType::MetaAnalysis));
        assert_eq!(InteractionType::choices(), "synergistic, antagonistic, neutral, unknown");
    }

    #[test]
    fn serde_spelling_agrees_with_vocabulary() {
        for c in Category::ALL {
            assert_eq!(serde_json::to_value(c).unwrap(), json!(c.as_str()));
        }
        for s in StudyType::ALL {
            assert_eq!(serde_json::to_value(s).unwrap(), json!(s.as_str()));
        }
    }

    #[test]
    fn raw_submission_tolerates_missing_sections_and_extra_fields() {
        let raw = RawSubmission::from_value(json!({
            "ingredient": { "name": "Inulin", "created_at": "2024-01-01" }
        }))
        .unwrap();
        assert_eq!(raw.ingredient.name, Some(json!("Inulin")));
        assert!(raw.citations.is_empty());
    }

    #[test]
    fn raw_submission_rejects_non_objects() {
        let err = RawSubmission::from_value(json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("an array"));
        assert!(RawSubmission::from_json_str("{ not json").is_err());
    }

    #[test]
    fn null_scalars_read_as_absent() {
        let raw = RawSubmission::from_value(json!({ "ingredient": { "slug": null } })).unwrap();
        assert_eq!(raw.ingredient.slug, None);
    }

    #[test]
    fn cfu_detection() {
        let mut d = DosageInfo::default();
        assert!(!d.is_cfu_based());
        d.unit = Some("billion CFU".into());
        assert!(d.is_cfu_based());
        let d = DosageInfo {
            max_cfu: Some(1e10),
            ..Default::default()
        };
        assert!(d.is_cfu_based());
    }

    #[test]
    fn dosage_extra_keys_flatten() {
        let mut d = DosageInfo {
            unit: Some("g".into()),
            ..Default::default()
        };
        d.extra.insert("with_food".into(), json!(true));
        let v = serde_json::to_value(&d).unwrap();
        assert_eq!(v, json!({ "unit": "g", "with_food": true }));
    }
}
