//! Import pipeline orchestration.
//!
//! Coordinates the full flow: discover files → parse → validate as one batch
//! → write accepted records. A file that fails at any stage is reported and
//! counted; it never aborts the rest of the run.
//!
//! Duplicate handling follows the import options:
//!
//! | Option | A record whose name or slug is already stored |
//! |--------|-----------------------------------------------|
//! | (none) | rejected by the validator as a uniqueness violation |
//! | `update_existing` | takes the stored id and replaces the stored graph if still valid |
//! | `skip_duplicates` | is skipped without validation |

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use gutintel_core::slug::derive_slug;
use gutintel_core::{
    CorpusEntry, CorpusIndex, CorpusLookup, Outcome, RawSubmission, Validator, Violation,
};
use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::{Config, ImportConfig};
use crate::db;
use crate::progress::{ImportProgressEvent, ImportProgressReporter};
use crate::store::{self, WriteStatus};

#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Validate only; never write.
    pub dry_run: bool,
    pub update_existing: bool,
    pub skip_duplicates: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Inserted,
    Updated,
    Unchanged,
    Skipped,
    /// Accepted in a dry run.
    Valid,
    Rejected,
    Unreadable,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: String,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
}

impl FileReport {
    fn new(path: &Path, status: FileStatus) -> Self {
        Self {
            path: path.display().to_string(),
            status,
            slug: None,
            error: None,
            violations: Vec::new(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, FileStatus::Rejected | FileStatus::Unreadable)
    }
}

#[derive(Debug, Default, Serialize)]
pub struct ImportReport {
    /// Newly inserted, or valid in a dry run.
    pub succeeded: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
    pub warnings: usize,
    pub files: Vec<FileReport>,
}

impl ImportReport {
    fn record(&mut self, file: FileReport) {
        match file.status {
            FileStatus::Inserted | FileStatus::Valid => self.succeeded += 1,
            FileStatus::Updated => self.updated += 1,
            FileStatus::Unchanged => self.unchanged += 1,
            FileStatus::Skipped => self.skipped += 1,
            FileStatus::Rejected | FileStatus::Unreadable => self.failed += 1,
        }
        self.warnings += file.violations.iter().filter(|v| !v.is_error()).count();
        self.files.push(file);
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// A single file, or every file under a directory matching the import globs,
/// sorted for deterministic batch order.
pub fn discover_files(path: &Path, config: &ImportConfig) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        bail!("import path does not exist: {}", path.display());
    }
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let include_set = build_globset(&config.include_globs)?;
    let mut excludes = vec!["**/.git/**".to_string(), "**/target/**".to_string()];
    excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&excludes)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(path).follow_links(config.follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(path).unwrap_or(entry.path());
        let rel_str = relative.to_string_lossy();
        if exclude_set.is_match(rel_str.as_ref()) || !include_set.is_match(rel_str.as_ref()) {
            continue;
        }
        files.push(entry.path().to_path_buf());
    }
    files.sort();
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

fn read_submission(path: &Path) -> Result<RawSubmission> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(RawSubmission::from_json_str(&text)?)
}

/// The stored entry a raw submission refers to, by slug first, then name.
fn existing_entry(raw: &RawSubmission, corpus: &CorpusIndex) -> Option<CorpusEntry> {
    let name = raw
        .ingredient
        .name
        .as_ref()
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty());
    let slug = raw
        .ingredient
        .slug
        .as_ref()
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .or_else(|| name.and_then(|n| derive_slug(n).ok()));

    slug.and_then(|s| corpus.find_by_slug(&s))
        .or_else(|| name.and_then(|n| corpus.find_by_name(n)))
}

/// Opens the database for an import. Dry runs work without one.
async fn open(config: &Config, dry_run: bool) -> Result<Option<SqlitePool>> {
    if dry_run && !config.db.path.exists() {
        tracing::debug!(
            path = %config.db.path.display(),
            "no database, validating against an empty corpus"
        );
        return Ok(None);
    }
    Ok(Some(db::connect(config).await?))
}

/// Runs an import and returns the per-file report without printing it.
pub async fn import_path(
    config: &Config,
    path: &Path,
    options: ImportOptions,
    progress: &dyn ImportProgressReporter,
) -> Result<ImportReport> {
    progress.report(ImportProgressEvent::Discovering {
        root: path.display().to_string(),
    });
    let files = discover_files(path, &config.import)?;
    tracing::info!(files = files.len(), path = %path.display(), "discovered input files");

    let pool = open(config, options.dry_run).await?;
    let corpus = match &pool {
        Some(pool) => store::load_corpus_index(pool)
            .await
            .context("failed to read existing ingredients; run `gutintel init` first")?,
        None => CorpusIndex::new(),
    };

    let mut report = ImportReport::default();
    let mut pending: Vec<(usize, RawSubmission)> = Vec::new();
    let mut slots: Vec<Option<FileReport>> = Vec::with_capacity(files.len());

    for (i, file) in files.iter().enumerate() {
        let mut raw = match read_submission(file) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(file = %file.display(), error = %e, "unreadable submission");
                let mut entry = FileReport::new(file, FileStatus::Unreadable);
                entry.error = Some(format!("{:#}", e));
                slots.push(Some(entry));
                continue;
            }
        };

        let has_id = raw.ingredient.id.as_ref().is_some_and(|v| !v.is_null());
        if !has_id && (options.update_existing || options.skip_duplicates) {
            if let Some(entry) = existing_entry(&raw, &corpus) {
                if options.skip_duplicates {
                    tracing::info!(
                        file = %file.display(),
                        slug = %entry.slug,
                        "skipping existing ingredient"
                    );
                    let mut skipped = FileReport::new(file, FileStatus::Skipped);
                    skipped.slug = Some(entry.slug);
                    slots.push(Some(skipped));
                    continue;
                }
                raw.ingredient.id = Some(Value::String(entry.id));
            }
        }
        slots.push(None);
        pending.push((i, raw));
    }

    let validator = Validator::new(config.validation.policy());
    let raws: Vec<RawSubmission> = pending.iter().map(|(_, raw)| raw.clone()).collect();
    let outcomes = validator.validate_batch(&raws, &corpus);
    let accepted = outcomes.iter().filter(|o| o.is_accepted()).count();
    progress.report(ImportProgressEvent::Validated {
        files: files.len() as u64,
        accepted: accepted as u64,
    });

    let mut written = 0u64;
    for ((i, _), outcome) in pending.iter().zip(outcomes) {
        let file = &files[*i];
        let entry = match outcome {
            Outcome::Rejected { violations } => {
                tracing::info!(file = %file.display(), violations = violations.len(), "rejected");
                let mut entry = FileReport::new(file, FileStatus::Rejected);
                entry.violations = violations;
                entry
            }
            Outcome::Accepted { record, warnings } => {
                let status = match &pool {
                    Some(pool) if !options.dry_run => match write(pool, &record).await {
                        Ok(status) => status,
                        Err(e) => {
                            tracing::warn!(file = %file.display(), error = %e, "write failed");
                            let mut entry = FileReport::new(file, FileStatus::Rejected);
                            entry.slug = Some(record.ingredient.slug.clone());
                            entry.error = Some(format!("{:#}", e));
                            entry.violations = warnings;
                            slots[*i] = Some(entry);
                            continue;
                        }
                    },
                    _ => FileStatus::Valid,
                };
                if status != FileStatus::Valid {
                    written += 1;
                    progress.report(ImportProgressEvent::Writing {
                        n: written,
                        total: accepted as u64,
                    });
                }
                let mut entry = FileReport::new(file, status);
                entry.slug = Some(record.ingredient.slug);
                entry.violations = warnings;
                entry
            }
        };
        slots[*i] = Some(entry);
    }

    for entry in slots.into_iter().flatten() {
        report.record(entry);
    }

    if let Some(pool) = pool {
        pool.close().await;
    }
    Ok(report)
}

async fn write(
    pool: &SqlitePool,
    record: &gutintel_core::IngredientSubmission,
) -> Result<FileStatus> {
    if let Some(id) = record.ingredient.id.as_deref() {
        if store::find_by_id(pool, id).await?.is_some() {
            return Ok(match store::replace_submission(pool, id, record).await? {
                WriteStatus::Unchanged => FileStatus::Unchanged,
                WriteStatus::Inserted | WriteStatus::Updated => FileStatus::Updated,
            });
        }
    }
    store::insert_submission(pool, record).await?;
    Ok(FileStatus::Inserted)
}

/// CLI entry point for `gutintel import`.
pub async fn run_import(
    config: &Config,
    path: &Path,
    options: ImportOptions,
    progress: &dyn ImportProgressReporter,
) -> Result<ImportReport> {
    let report = import_path(config, path, options, progress).await?;

    for file in &report.files {
        if file.is_failure() || !file.violations.is_empty() {
            print_file(file);
        }
    }

    if options.dry_run {
        println!("import {} (dry-run)", path.display());
    } else {
        println!("import {}", path.display());
    }
    println!("  files: {}", report.files.len());
    if options.dry_run {
        println!("  valid: {}", report.succeeded);
    } else {
        println!("  inserted: {}", report.succeeded);
        println!("  updated: {}", report.updated);
        println!("  unchanged: {}", report.unchanged);
    }
    println!("  skipped: {}", report.skipped);
    println!("  failed: {}", report.failed);
    println!("  warnings: {}", report.warnings);
    println!("{}", if report.has_failures() { "failed" } else { "ok" });

    Ok(report)
}

/// CLI entry point for `gutintel validate`: a dry run that prints every file.
pub async fn run_validate(
    config: &Config,
    path: &Path,
    json: bool,
    progress: &dyn ImportProgressReporter,
) -> Result<ImportReport> {
    let options = ImportOptions {
        dry_run: true,
        ..ImportOptions::default()
    };
    let report = import_path(config, path, options, progress).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(report);
    }

    for file in &report.files {
        print_file(file);
    }
    println!(
        "{} files: {} valid, {} failed, {} warnings",
        report.files.len(),
        report.succeeded,
        report.failed,
        report.warnings
    );
    Ok(report)
}

fn print_file(file: &FileReport) {
    let label = match file.status {
        FileStatus::Rejected => "rejected",
        FileStatus::Unreadable => "unreadable",
        FileStatus::Skipped => "skipped",
        _ if !file.violations.is_empty() => "warning",
        _ => "ok",
    };
    match &file.slug {
        Some(slug) => println!("{:<10} {} ({})", label, file.path, slug),
        None => println!("{:<10} {}", label, file.path),
    }
    if let Some(ref error) = file.error {
        println!("  {}", error);
    }
    for violation in &file.violations {
        println!("  {}", violation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn discovers_json_files_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("nested")).unwrap();
        std::fs::create_dir_all(dir.path().join("drafts")).unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.md"), "x").unwrap();
        std::fs::write(dir.path().join("nested/c.json"), "{}").unwrap();
        std::fs::write(dir.path().join("drafts/d.json"), "{}").unwrap();

        let config = ImportConfig {
            exclude_globs: vec!["drafts/**".to_string()],
            ..ImportConfig::default()
        };
        let files = discover_files(dir.path(), &config).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json", "nested/c.json"]);
    }

    #[test]
    fn single_file_is_taken_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("inulin.txt");
        std::fs::write(&file, "{}").unwrap();
        assert_eq!(discover_files(&file, &ImportConfig::default()).unwrap(), vec![file]);
        assert!(discover_files(&dir.path().join("missing"), &ImportConfig::default()).is_err());
    }

    #[test]
    fn existing_entry_matches_slug_then_name() {
        let corpus: CorpusIndex = [
            CorpusEntry::new("1", "inulin", "Chicory Inulin"),
            CorpusEntry::new("2", "fos", "Fructooligosaccharides"),
        ]
        .into_iter()
        .collect();

        let raw = RawSubmission::from_value(json!({ "ingredient": { "name": "Inulin" } })).unwrap();
        assert_eq!(existing_entry(&raw, &corpus).unwrap().id, "1");

        let raw =
            RawSubmission::from_value(json!({ "ingredient": { "name": "fructooligosaccharides" } }))
                .unwrap();
        assert_eq!(existing_entry(&raw, &corpus).unwrap().id, "2");

        let raw = RawSubmission::from_value(json!({ "ingredient": { "name": "Kefir" } })).unwrap();
        assert!(existing_entry(&raw, &corpus).is_none());
    }

    #[test]
    fn report_counts_by_status() {
        let mut report = ImportReport::default();
        let mut warned = FileReport::new(Path::new("a.json"), FileStatus::Inserted);
        warned.violations.push(Violation::warning(
            gutintel_core::ViolationKind::MissingField,
            "citations",
            "none",
        ));
        report.record(warned);
        report.record(FileReport::new(Path::new("b.json"), FileStatus::Rejected));
        report.record(FileReport::new(Path::new("c.json"), FileStatus::Skipped));
        assert_eq!(
            (report.succeeded, report.failed, report.skipped, report.warnings),
            (1, 1, 1, 1)
        );
        assert!(report.has_failures());
    }
}
