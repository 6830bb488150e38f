//! Read-side commands: fetch, list, search, and delete stored ingredients.
//!
//! Each command has a core function returning structured data and a `run_*`
//! CLI entry point that prints it.

use anyhow::{bail, Result};
use gutintel_core::model::{Category, Vocabulary};

use crate::config::Config;
use crate::db;
use crate::store::{self, BacteriaHit, IngredientSummary, ListFilter, StoredGraph};

/// Fetches the full stored graph for `slug`.
pub async fn get_ingredient(config: &Config, slug: &str) -> Result<StoredGraph> {
    let pool = db::connect(config).await?;
    let graph = store::get_by_slug(&pool, slug).await;
    pool.close().await;

    match graph? {
        Some(graph) => Ok(graph),
        None => bail!("ingredient not found: {}", slug),
    }
}

/// CLI entry point for `gutintel get`. Prints the graph as JSON.
pub async fn run_get(config: &Config, slug: &str) -> Result<()> {
    let graph = get_ingredient(config, slug).await?;
    println!("{}", serde_json::to_string_pretty(&graph)?);
    Ok(())
}

pub async fn list(config: &Config, filter: &ListFilter) -> Result<Vec<IngredientSummary>> {
    let pool = db::connect(config).await?;
    let rows = store::list_ingredients(&pool, filter).await;
    pool.close().await;
    rows
}

/// CLI entry point for `gutintel list`.
pub async fn run_list(
    config: &Config,
    category: Option<Category>,
    min_gut_score: Option<f64>,
    limit: i64,
    offset: i64,
) -> Result<()> {
    if limit < 1 {
        bail!("--limit must be at least 1");
    }
    if offset < 0 {
        bail!("--offset must not be negative");
    }
    let filter = ListFilter {
        category,
        min_gut_score,
        limit,
        offset,
    };
    let rows = list(config, &filter).await?;

    if rows.is_empty() {
        println!("No ingredients.");
        return Ok(());
    }

    println!("{:<32} {:<12} {:>5} {:>5}  NAME", "SLUG", "CATEGORY", "GUT", "CONF");
    for row in &rows {
        println!(
            "{:<32} {:<12} {:>5.1} {:>5.2}  {}",
            row.slug, row.category.as_str(), row.gut_score, row.confidence_score, row.name
        );
    }
    println!();
    println!("{} ingredient(s)", rows.len());
    Ok(())
}

/// CLI entry point for `gutintel bacteria`.
pub async fn run_bacteria(config: &Config, bacteria: &str) -> Result<()> {
    let bacteria = bacteria.trim();
    if bacteria.is_empty() {
        bail!("bacteria name must not be empty");
    }
    let pool = db::connect(config).await?;
    let hits: Result<Vec<BacteriaHit>> = store::search_by_bacteria(&pool, bacteria).await;
    pool.close().await;
    let hits = hits?;

    if hits.is_empty() {
        println!("No ingredients affect '{}'.", bacteria);
        return Ok(());
    }

    for hit in &hits {
        let confidence = hit
            .confidence
            .map(|c| format!("{:.2}", c))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<32} {:<10} {:<10} {:>5}  {}",
            hit.slug, hit.bacteria_level, hit.effect_strength, confidence, hit.bacteria_name
        );
    }
    Ok(())
}

/// CLI entry point for `gutintel delete`.
pub async fn run_delete(config: &Config, slug: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let deleted = store::delete_by_slug(&pool, slug).await;
    pool.close().await;

    if !deleted? {
        bail!("ingredient not found: {}", slug);
    }
    tracing::info!(slug, "deleted ingredient");
    println!("deleted {}", slug);
    Ok(())
}
