//! Field-level rules.
//!
//! Each field of each record type is checked by exactly one rule object.
//! Rules are small `Copy` values, mostly declared as `const`s next to the
//! record validators in [`crate::record`]. A rule takes the raw JSON value of
//! its field (or `None` when absent) and yields the coerced value, nothing
//! for an absent optional field, or a [`Violation`].
//!
//! | Rule | Output | Accepts |
//! |------|--------|---------|
//! | [`TextRule`] | `String` | strings (trimmed) |
//! | [`DecimalRule`] | `f64` | numbers, numeric text |
//! | [`IntegerRule`] | `i64` | integral numbers, integer text |
//! | [`EnumRule`] | vocabulary type | exact vocabulary spellings |
//! | [`PatternRule`] | `String` | strings matching a [`Pattern`] |
//! | [`FlagRule`] | `bool` | booleans, `"true"`/`"false"` |

use serde_json::Value;
use std::marker::PhantomData;

use crate::model::{json_type_name, Vocabulary};
use crate::slug::is_valid_slug;
use crate::violation::{render_value, FieldPath, Violation, ViolationKind};

/// A check applied to one named field.
pub trait FieldRule {
    type Output;

    /// Field name, used to build the violation path.
    fn field(&self) -> &'static str;

    fn check(
        &self,
        at: &FieldPath,
        value: Option<&Value>,
    ) -> Result<Option<Self::Output>, Violation>;
}

fn missing(at: &FieldPath, field: &str) -> Violation {
    Violation::error(
        ViolationKind::MissingField,
        at.field(field),
        format!("{} is required", field),
    )
}

fn type_mismatch(at: &FieldPath, field: &str, expected: &str, value: &Value) -> Violation {
    Violation::error(
        ViolationKind::TypeMismatch,
        at.field(field),
        format!("{} must be {}, got {}", field, expected, json_type_name(value)),
    )
    .with_value(render_value(value))
}

/// Treats JSON null and blank strings as "not supplied".
pub(crate) fn present(value: Option<&Value>) -> Option<&Value> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(v) => Some(v),
    }
}

/// Rounds to `places` decimal places, half away from zero.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

// ============ Text ============

#[derive(Debug, Clone, Copy)]
pub struct TextRule {
    field: &'static str,
    required: bool,
    max_len: Option<usize>,
}

impl TextRule {
    pub const fn required(field: &'static str) -> Self {
        Self {
            field,
            required: true,
            max_len: None,
        }
    }

    pub const fn optional(field: &'static str) -> Self {
        Self {
            field,
            required: false,
            max_len: None,
        }
    }

    pub const fn max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }
}

impl FieldRule for TextRule {
    type Output = String;

    fn field(&self) -> &'static str {
        self.field
    }

    fn check(&self, at: &FieldPath, value: Option<&Value>) -> Result<Option<String>, Violation> {
        let Some(value) = present(value) else {
            return if self.required {
                Err(missing(at, self.field))
            } else {
                Ok(None)
            };
        };
        let Value::String(text) = value else {
            return Err(type_mismatch(at, self.field, "text", value));
        };
        let text = text.trim();
        if let Some(max) = self.max_len {
            if text.chars().count() > max {
                return Err(Violation::error(
                    ViolationKind::RangeViolation,
                    at.field(self.field),
                    format!("{} must be at most {} characters", self.field, max),
                )
                .with_value(text));
            }
        }
        Ok(Some(text.to_string()))
    }
}

// ============ Decimal ============

#[derive(Debug, Clone, Copy)]
pub struct DecimalRule {
    field: &'static str,
    required: bool,
    min: f64,
    max: Option<f64>,
    places: Option<u32>,
}

impl DecimalRule {
    /// An optional, non-negative number with no upper bound or rounding.
    pub const fn new(field: &'static str) -> Self {
        Self {
            field,
            required: false,
            min: 0.0,
            max: None,
            places: None,
        }
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn between(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = Some(max);
        self
    }

    /// Canonical precision applied after the range check.
    pub const fn places(mut self, places: u32) -> Self {
        self.places = Some(places);
        self
    }

    fn range_message(&self) -> String {
        match self.max {
            Some(max) => format!("{} must be between {} and {}", self.field, self.min, max),
            None => format!("{} must be at least {}", self.field, self.min),
        }
    }
}

/// Parses a JSON number or numeric text into a finite `f64`.
fn parse_decimal(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

impl FieldRule for DecimalRule {
    type Output = f64;

    fn field(&self) -> &'static str {
        self.field
    }

    fn check(&self, at: &FieldPath, value: Option<&Value>) -> Result<Option<f64>, Violation> {
        let Some(value) = present(value) else {
            return if self.required {
                Err(missing(at, self.field))
            } else {
                Ok(None)
            };
        };
        let Some(number) = parse_decimal(value) else {
            return Err(type_mismatch(at, self.field, "a number", value));
        };
        let in_range = number >= self.min && self.max.map_or(true, |max| number <= max);
        if !in_range {
            return Err(Violation::error(
                ViolationKind::RangeViolation,
                at.field(self.field),
                self.range_message(),
            )
            .with_value(render_value(value)));
        }
        Ok(Some(match self.places {
            Some(places) => round_to(number, places),
            None => number,
        }))
    }
}

// ============ Integer ============

#[derive(Debug, Clone, Copy)]
pub struct IntegerRule {
    field: &'static str,
    required: bool,
    min: i64,
    max: i64,
}

impl IntegerRule {
    pub const fn optional(field: &'static str) -> Self {
        Self {
            field,
            required: false,
            min: i64::MIN,
            max: i64::MAX,
        }
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn between(mut self, min: i64, max: i64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub const fn at_least(mut self, min: i64) -> Self {
        self.min = min;
        self
    }

    fn range_message(&self) -> String {
        if self.max == i64::MAX {
            format!("{} must be at least {}", self.field, self.min)
        } else {
            format!("{} must be between {} and {}", self.field, self.min, self.max)
        }
    }
}

fn parse_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                    .map(|f| f as i64)
            }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

impl FieldRule for IntegerRule {
    type Output = i64;

    fn field(&self) -> &'static str {
        self.field
    }

    fn check(&self, at: &FieldPath, value: Option<&Value>) -> Result<Option<i64>, Violation> {
        let Some(value) = present(value) else {
            return if self.required {
                Err(missing(at, self.field))
            } else {
                Ok(None)
            };
        };
        let Some(number) = parse_integer(value) else {
            return Err(type_mismatch(at, self.field, "a whole number", value));
        };
        if number < self.min || number > self.max {
            return Err(Violation::error(
                ViolationKind::RangeViolation,
                at.field(self.field),
                self.range_message(),
            )
            .with_value(render_value(value)));
        }
        Ok(Some(number))
    }
}

// ============ Enumerations ============

#[derive(Debug)]
pub struct EnumRule<T> {
    field: &'static str,
    required: bool,
    _vocabulary: PhantomData<T>,
}

impl<T> Clone for EnumRule<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for EnumRule<T> {}

impl<T: Vocabulary> EnumRule<T> {
    pub const fn required(field: &'static str) -> Self {
        Self {
            field,
            required: true,
            _vocabulary: PhantomData,
        }
    }
}

impl<T: Vocabulary> FieldRule for EnumRule<T> {
    type Output = T;

    fn field(&self) -> &'static str {
        self.field
    }

    fn check(&self, at: &FieldPath, value: Option<&Value>) -> Result<Option<T>, Violation> {
        let Some(value) = present(value) else {
            return if self.required {
                Err(missing(at, self.field))
            } else {
                Ok(None)
            };
        };
        let Value::String(text) = value else {
            return Err(type_mismatch(at, self.field, "text", value));
        };
        T::parse(text).map(Some).ok_or_else(|| {
            Violation::error(
                ViolationKind::EnumViolation,
                at.field(self.field),
                format!("unknown {}; expected one of: {}", T::LABEL, T::choices()),
            )
            .with_value(text.as_str())
        })
    }
}

// ============ Patterns ============

/// String formats with dedicated identifier rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// `^[a-z0-9]+(-[a-z0-9]+)*$`
    Slug,
    /// Must begin with `10.`
    Doi,
    /// `^[0-9]{1,8}$`
    Pmid,
}

impl Pattern {
    pub fn matches(self, text: &str) -> bool {
        match self {
            Pattern::Slug => is_valid_slug(text),
            Pattern::Doi => text.starts_with("10."),
            Pattern::Pmid => {
                (1..=8).contains(&text.len()) && text.bytes().all(|b| b.is_ascii_digit())
            }
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Pattern::Slug => "lowercase letters, digits, and single hyphens between them",
            Pattern::Doi => "a DOI beginning with \"10.\"",
            Pattern::Pmid => "1-8 digits",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PatternRule {
    field: &'static str,
    pattern: Pattern,
    required: bool,
}

impl PatternRule {
    pub const fn optional(field: &'static str, pattern: Pattern) -> Self {
        Self {
            field,
            pattern,
            required: false,
        }
    }
}

impl FieldRule for PatternRule {
    type Output = String;

    fn field(&self) -> &'static str {
        self.field
    }

    fn check(&self, at: &FieldPath, value: Option<&Value>) -> Result<Option<String>, Violation> {
        let Some(value) = present(value) else {
            return if self.required {
                Err(missing(at, self.field))
            } else {
                Ok(None)
            };
        };
        let text = match value {
            Value::String(s) => s.trim().to_string(),
            // PubMed IDs often arrive as bare integers from spreadsheets.
            Value::Number(n) if self.pattern == Pattern::Pmid && n.is_u64() => n.to_string(),
            other => return Err(type_mismatch(at, self.field, "text", other)),
        };
        if !self.pattern.matches(&text) {
            return Err(Violation::error(
                ViolationKind::FormatViolation,
                at.field(self.field),
                format!("{} must be {}", self.field, self.pattern.describe()),
            )
            .with_value(text));
        }
        Ok(Some(text))
    }
}

// ============ Flags ============

#[derive(Debug, Clone, Copy)]
pub struct FlagRule {
    field: &'static str,
}

impl FlagRule {
    pub const fn new(field: &'static str) -> Self {
        Self { field }
    }
}

impl FieldRule for FlagRule {
    type Output = bool;

    fn field(&self) -> &'static str {
        self.field
    }

    fn check(&self, at: &FieldPath, value: Option<&Value>) -> Result<Option<bool>, Violation> {
        match present(value) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) if s.trim().eq_ignore_ascii_case("true") => Ok(Some(true)),
            Some(Value::String(s)) if s.trim().eq_ignore_ascii_case("false") => Ok(Some(false)),
            Some(other) => Err(type_mismatch(at, self.field, "true or false", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, StudyType};
    use serde_json::json;

    fn at() -> FieldPath {
        FieldPath::root("ingredient")
    }

    #[test]
    fn text_is_trimmed_and_bounded() {
        let rule = TextRule::required("name").max_len(5);
        assert_eq!(rule.check(&at(), Some(&json!("  Kefir "))).unwrap(), Some("Kefir".into()));
        let err = rule.check(&at(), Some(&json!("Sauerkraut"))).unwrap_err();
        assert_eq!(err.kind, ViolationKind::RangeViolation);
        assert_eq!(err.path, "ingredient.name");
    }

    #[test]
    fn required_text_reports_missing_for_null_and_blank() {
        let rule = TextRule::required("name");
        for v in [None, Some(json!(null)), Some(json!("   "))] {
            let err = rule.check(&at(), v.as_ref()).unwrap_err();
            assert_eq!(err.kind, ViolationKind::MissingField);
        }
        assert_eq!(TextRule::optional("notes").check(&at(), None).unwrap(), None);
    }

    #[test]
    fn text_rejects_numbers() {
        let err = TextRule::required("name").check(&at(), Some(&json!(42))).unwrap_err();
        assert_eq!(err.kind, ViolationKind::TypeMismatch);
        assert_eq!(err.value.as_deref(), Some("42"));
    }

    #[test]
    fn decimal_coerces_text_and_rounds() {
        let rule = DecimalRule::new("gut_score").required().between(0.0, 10.0).places(1);
        assert_eq!(rule.check(&at(), Some(&json!("7.86"))).unwrap(), Some(7.9));
        assert_eq!(rule.check(&at(), Some(&json!(8.5))).unwrap(), Some(8.5));
        assert_eq!(rule.check(&at(), Some(&json!(10))).unwrap(), Some(10.0));
    }

    #[test]
    fn decimal_range_is_checked_before_rounding() {
        let rule = DecimalRule::new("gut_score").between(0.0, 10.0).places(1);
        let err = rule.check(&at(), Some(&json!(10.04))).unwrap_err();
        assert_eq!(err.kind, ViolationKind::RangeViolation);
        let err = rule.check(&at(), Some(&json!(-0.1))).unwrap_err();
        assert_eq!(err.kind, ViolationKind::RangeViolation);
    }

    #[test]
    fn decimal_rejects_non_numeric_text_and_non_finite() {
        let rule = DecimalRule::new("confidence").between(0.0, 1.0);
        for v in [json!("[Example: 0.75]"), json!("NaN"), json!("inf"), json!(true), json!([1])] {
            let err = rule.check(&at(), Some(&v)).unwrap_err();
            assert_eq!(err.kind, ViolationKind::TypeMismatch, "value {:?}", v);
        }
    }

    #[test]
    fn unbounded_decimal_still_rejects_negatives() {
        let err = DecimalRule::new("min_dose").check(&at(), Some(&json!(-5))).unwrap_err();
        assert_eq!(err.message, "min_dose must be at least 0");
        let large = DecimalRule::new("min_dose").check(&at(), Some(&json!(1e12)));
        assert_eq!(large.unwrap(), Some(1e12));
    }

    #[test]
    fn integer_accepts_integral_forms_only() {
        let rule = IntegerRule::optional("publication_year").between(1900, 2025);
        assert_eq!(rule.check(&at(), Some(&json!(2017))).unwrap(), Some(2017));
        assert_eq!(rule.check(&at(), Some(&json!("2017"))).unwrap(), Some(2017));
        assert_eq!(rule.check(&at(), Some(&json!(2017.0))).unwrap(), Some(2017));
        assert_eq!(
            rule.check(&at(), Some(&json!(2017.5))).unwrap_err().kind,
            ViolationKind::TypeMismatch
        );
        assert_eq!(
            rule.check(&at(), Some(&json!(1899))).unwrap_err().kind,
            ViolationKind::RangeViolation
        );
    }

    #[test]
    fn enum_is_case_sensitive() {
        let rule: EnumRule<Category> = EnumRule::required("category");
        let parsed = rule.check(&at(), Some(&json!("prebiotic"))).unwrap();
        assert_eq!(parsed, Some(Category::Prebiotic));
        let err = rule.check(&at(), Some(&json!("Prebiotic"))).unwrap_err();
        assert_eq!(err.kind, ViolationKind::EnumViolation);
        assert!(err.message.contains("fatty_acid"));
        let rule: EnumRule<StudyType> = EnumRule::required("study_type");
        let err = rule.check(&at(), Some(&json!(3))).unwrap_err();
        assert_eq!(err.kind, ViolationKind::TypeMismatch);
    }

    #[test]
    fn patterns() {
        assert!(Pattern::Slug.matches("green-tea-2"));
        assert!(!Pattern::Slug.matches("green--tea"));
        assert!(!Pattern::Slug.matches("-green"));
        assert!(!Pattern::Slug.matches("Green"));
        assert!(Pattern::Doi.matches("10.1038/s41598-020-12345-6"));
        assert!(!Pattern::Doi.matches("doi:10.1038/x"));
        assert!(Pattern::Pmid.matches("28914794"));
        assert!(!Pattern::Pmid.matches("123456789"));
        assert!(!Pattern::Pmid.matches("PMID:123"));
    }

    #[test]
    fn doi_requires_only_the_prefix() {
        let rule = PatternRule::optional("doi", Pattern::Doi);
        let c = FieldPath::indexed("citations", 0);
        assert_eq!(rule.check(&c, Some(&json!("10."))).unwrap(), Some("10.".into()));
        assert_eq!(rule.check(&c, Some(&json!(" 10.5/x "))).unwrap(), Some("10.5/x".into()));
        let err = rule.check(&c, Some(&json!("11.1234/x"))).unwrap_err();
        assert_eq!(err.kind, ViolationKind::FormatViolation);
        assert!(!Pattern::Doi.matches("10"));
    }

    #[test]
    fn pmid_accepts_integers() {
        let rule = PatternRule::optional("pmid", Pattern::Pmid);
        let c = FieldPath::indexed("citations", 0);
        assert_eq!(rule.check(&c, Some(&json!(28914794))).unwrap(), Some("28914794".into()));
        let err = rule.check(&c, Some(&json!("PMID28914794"))).unwrap_err();
        assert_eq!(err.kind, ViolationKind::FormatViolation);
        assert_eq!(err.path, "citations[0].pmid");
        let doi = PatternRule::optional("doi", Pattern::Doi);
        let err = doi.check(&c, Some(&json!(10.1))).unwrap_err();
        assert_eq!(err.kind, ViolationKind::TypeMismatch);
    }

    #[test]
    fn flags() {
        let rule = FlagRule::new("dosage_dependent");
        assert_eq!(rule.check(&at(), Some(&json!(true))).unwrap(), Some(true));
        assert_eq!(rule.check(&at(), Some(&json!("False"))).unwrap(), Some(false));
        assert_eq!(rule.check(&at(), None).unwrap(), None);
        assert!(rule.check(&at(), Some(&json!("[true/false]"))).is_err());
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(0.8543, 2), 0.85);
        assert_eq!(round_to(7.89, 1), 7.9);
        assert_eq!(round_to(0.125, 2), 0.13);
    }
}
