//! TOML configuration.
//!
//! ```toml
//! [db]
//! path = "./data/gutintel.sqlite"
//!
//! [validation]
//! min_citations = 1
//! missing_citations = "warn"
//! probiotic_expectations = "reject"
//!
//! [import]
//! include_globs = ["**/*.json"]
//! ```
//!
//! Every section except `[db]` may be omitted.

use anyhow::{Context, Result};
use gutintel_core::{Severity, ValidationPolicy};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// How a soft rule is treated.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuleLevel {
    #[default]
    Warn,
    Reject,
}

impl RuleLevel {
    pub fn severity(self) -> Severity {
        match self {
            RuleLevel::Warn => Severity::Warning,
            RuleLevel::Reject => Severity::Error,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ValidationConfig {
    #[serde(default = "default_min_citations")]
    pub min_citations: usize,
    #[serde(default)]
    pub missing_citations: RuleLevel,
    #[serde(default)]
    pub citation_identifier: RuleLevel,
    #[serde(default)]
    pub probiotic_expectations: RuleLevel,
    #[serde(default)]
    pub unknown_dosage_key: RuleLevel,
    #[serde(default)]
    pub placeholder_text: RuleLevel,
    /// Overrides the clock for the `publication_year` bound.
    #[serde(default)]
    pub current_year: Option<i32>,
}

fn default_min_citations() -> usize {
    1
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_citations: default_min_citations(),
            missing_citations: RuleLevel::Warn,
            citation_identifier: RuleLevel::Warn,
            probiotic_expectations: RuleLevel::Warn,
            unknown_dosage_key: RuleLevel::Warn,
            placeholder_text: RuleLevel::Warn,
            current_year: None,
        }
    }
}

impl ValidationConfig {
    pub fn policy(&self) -> ValidationPolicy {
        let mut policy = ValidationPolicy {
            min_citations: self.min_citations,
            missing_citations: self.missing_citations.severity(),
            citation_identifier: self.citation_identifier.severity(),
            probiotic_expectations: self.probiotic_expectations.severity(),
            unknown_dosage_key: self.unknown_dosage_key.severity(),
            placeholder_text: self.placeholder_text.severity(),
            ..ValidationPolicy::default()
        };
        if let Some(year) = self.current_year {
            policy = policy.with_current_year(year);
        }
        policy
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.json".to_string()]
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

impl Config {
    /// Defaults for commands that never touch the database.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/gutintel.sqlite"),
            },
            validation: ValidationConfig::default(),
            import: ImportConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if let Some(year) = config.validation.current_year {
        if year < 1900 {
            anyhow::bail!("validation.current_year must be >= 1900, got {}", year);
        }
    }

    if config.import.include_globs.is_empty() {
        anyhow::bail!("import.include_globs must not be empty");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn only_db_is_required() {
        let file = write_config("[db]\npath = \"./x.sqlite\"\n");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.validation.min_citations, 1);
        assert_eq!(config.import.include_globs, vec!["**/*.json".to_string()]);
        assert_eq!(config.validation.policy().missing_citations, Severity::Warning);
    }

    #[test]
    fn reject_levels_become_errors() {
        let file = write_config(
            "[db]\npath = \"x\"\n[validation]\nmin_citations = 2\n\
             probiotic_expectations = \"reject\"\ncurrent_year = 2024\n",
        );
        let policy = load_config(file.path()).unwrap().validation.policy();
        assert_eq!(policy.min_citations, 2);
        assert_eq!(policy.probiotic_expectations, Severity::Error);
        assert_eq!(policy.placeholder_text, Severity::Warning);
        assert_eq!(policy.current_year, 2024);
    }

    #[test]
    fn bad_values_are_rejected() {
        let file =
            write_config("[db]\npath = \"x\"\n[validation]\nmissing_citations = \"fatal\"\n");
        assert!(load_config(file.path()).is_err());
        let file = write_config("[db]\npath = \"x\"\n[validation]\ncurrent_year = 1850\n");
        assert!(load_config(file.path()).is_err());
        assert!(load_config(Path::new("/nonexistent/gutintel.toml")).is_err());
    }
}
