//! SQLite persistence for accepted ingredient graphs.
//!
//! Only normalized [`IngredientSubmission`]s reach this module; it never sees
//! raw input. Writes happen in one transaction per ingredient, assign UUIDs
//! and unix timestamps, and record a SHA-256 content hash so re-importing an
//! unchanged file is a no-op.
//!
//! Effects and citation links are owned by their ingredient and removed with
//! it. Citations themselves are shared rows keyed by `(pmid, doi, title)`.
//! Interactions are keyed by their canonical ingredient pair and outlive
//! either side.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use gutintel_core::model::{
    Category, Citation, DosageInfo, Ingredient, IngredientSubmission, Interaction,
    MetabolicEffect, MicrobiomeEffect, SymptomEffect, Vocabulary,
};
use gutintel_core::{CorpusEntry, CorpusIndex};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

/// Identity and bookkeeping of a stored ingredient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredIngredient {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub content_hash: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// What a write actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Inserted,
    Updated,
    Unchanged,
}

/// A full stored graph, as printed by `gutintel get`.
#[derive(Debug, Clone, Serialize)]
pub struct StoredGraph {
    pub created_at: String,
    pub updated_at: String,
    pub content_hash: String,
    #[serde(flatten)]
    pub record: IngredientSubmission,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngredientSummary {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub category: Category,
    pub gut_score: f64,
    pub confidence_score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub category: Option<Category>,
    pub min_gut_score: Option<f64>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BacteriaHit {
    pub slug: String,
    pub name: String,
    pub bacteria_name: String,
    pub bacteria_level: String,
    pub effect_strength: String,
    pub confidence: Option<f64>,
}

/// SHA-256 over the canonical JSON of a record, ignoring its storage id.
pub fn content_hash(record: &IngredientSubmission) -> Result<String> {
    let mut canonical = record.clone();
    canonical.ingredient.id = None;
    let bytes = serde_json::to_vec(&canonical)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Key under which a citation row is shared between ingredients.
pub fn citation_key(citation: &Citation) -> String {
    format!(
        "{}|{}|{}",
        citation.pmid.as_deref().unwrap_or(""),
        citation.doi.as_deref().unwrap_or(""),
        citation.title.trim().to_lowercase()
    )
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn vocab<T: Vocabulary>(text: &str) -> Result<T> {
    T::parse(text).ok_or_else(|| anyhow!("stored {} '{}' is not recognized", T::LABEL, text))
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

// ============ Reads ============

/// Every stored (id, slug, name), for the validator's uniqueness checks.
pub async fn load_corpus_index(pool: &SqlitePool) -> Result<CorpusIndex> {
    let rows = sqlx::query("SELECT id, slug, name FROM ingredients")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .iter()
        .map(|row| {
            CorpusEntry::new(
                row.get::<String, _>("id"),
                row.get::<String, _>("slug"),
                row.get::<String, _>("name"),
            )
        })
        .collect())
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<StoredIngredient>> {
    let row = sqlx::query(
        "SELECT id, slug, name, content_hash, created_at, updated_at FROM ingredients WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|row| StoredIngredient {
        id: row.get("id"),
        slug: row.get("slug"),
        name: row.get("name"),
        content_hash: row.get("content_hash"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }))
}

pub async fn get_by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<StoredGraph>> {
    let Some(row) = sqlx::query("SELECT * FROM ingredients WHERE slug = ?")
        .bind(slug)
        .fetch_optional(pool)
        .await?
    else {
        return Ok(None);
    };

    let id: String = row.get("id");
    let ingredient = ingredient_from_row(&row)?;
    let record = IngredientSubmission {
        microbiome_effects: microbiome_effects(pool, &id).await?,
        metabolic_effects: metabolic_effects(pool, &id).await?,
        symptom_effects: symptom_effects(pool, &id).await?,
        citations: citations(pool, &id).await?,
        interactions: interactions(pool, &id, &ingredient.slug).await?,
        ingredient,
    };

    Ok(Some(StoredGraph {
        created_at: format_ts_iso(row.get("created_at")),
        updated_at: format_ts_iso(row.get("updated_at")),
        content_hash: row.get("content_hash"),
        record,
    }))
}

fn ingredient_from_row(row: &SqliteRow) -> Result<Ingredient> {
    let aliases_json: String = row.get("aliases_json");
    let dosage_json: Option<String> = row.get("dosage_json");
    let dosage_info = dosage_json
        .map(|json| serde_json::from_str::<DosageInfo>(&json))
        .transpose()
        .context("stored dosage_info is not valid JSON")?;
    Ok(Ingredient {
        id: Some(row.get("id")),
        name: row.get("name"),
        slug: row.get("slug"),
        aliases: serde_json::from_str(&aliases_json).context("stored aliases are not valid JSON")?,
        category: vocab(&row.get::<String, _>("category"))?,
        description: row.get("description"),
        gut_score: row.get("gut_score"),
        confidence_score: row.get("confidence_score"),
        dosage_info,
        safety_notes: row.get("safety_notes"),
    })
}

async fn microbiome_effects(
    pool: &SqlitePool,
    ingredient_id: &str,
) -> Result<Vec<MicrobiomeEffect>> {
    let rows =
        sqlx::query("SELECT * FROM microbiome_effects WHERE ingredient_id = ? ORDER BY position")
            .bind(ingredient_id)
        .fetch_all(pool)
        .await?;
    rows.iter()
        .map(|row| -> Result<_> {
            Ok(MicrobiomeEffect {
                bacteria_name: row.get("bacteria_name"),
                bacteria_level: vocab(&row.get::<String, _>("bacteria_level"))?,
                effect_type: row.get("effect_type"),
                effect_strength: vocab(&row.get::<String, _>("effect_strength"))?,
                confidence: row.get("confidence"),
                mechanism: row.get("mechanism"),
            })
        })
        .collect()
}

async fn metabolic_effects(pool: &SqlitePool, ingredient_id: &str) -> Result<Vec<MetabolicEffect>> {
    let rows =
        sqlx::query("SELECT * FROM metabolic_effects WHERE ingredient_id = ? ORDER BY position")
            .bind(ingredient_id)
        .fetch_all(pool)
        .await?;
    rows.iter()
        .map(|row| -> Result<_> {
            Ok(MetabolicEffect {
                effect_name: row.get("effect_name"),
                effect_category: row.get("effect_category"),
                impact_direction: vocab(&row.get::<String, _>("impact_direction"))?,
                effect_strength: vocab(&row.get::<String, _>("effect_strength"))?,
                confidence: row.get("confidence"),
                dosage_dependent: row.get("dosage_dependent"),
                mechanism: row.get("mechanism"),
            })
        })
        .collect()
}

async fn symptom_effects(pool: &SqlitePool, ingredient_id: &str) -> Result<Vec<SymptomEffect>> {
    let rows =
        sqlx::query("SELECT * FROM symptom_effects WHERE ingredient_id = ? ORDER BY position")
            .bind(ingredient_id)
        .fetch_all(pool)
        .await?;
    rows.iter()
        .map(|row| -> Result<_> {
            Ok(SymptomEffect {
                symptom_name: row.get("symptom_name"),
                symptom_category: row.get("symptom_category"),
                effect_direction: vocab(&row.get::<String, _>("effect_direction"))?,
                effect_strength: vocab(&row.get::<String, _>("effect_strength"))?,
                confidence: row.get("confidence"),
                dosage_dependent: row.get("dosage_dependent"),
                population_notes: row.get("population_notes"),
            })
        })
        .collect()
}

async fn citations(pool: &SqlitePool, ingredient_id: &str) -> Result<Vec<Citation>> {
    let rows = sqlx::query(
        r#"
        SELECT c.* FROM citations c
        JOIN ingredient_citations ic ON ic.citation_id = c.id
        WHERE ic.ingredient_id = ?
        ORDER BY ic.position
        "#,
    )
    .bind(ingredient_id)
    .fetch_all(pool)
    .await?;
    rows.iter()
        .map(|row| -> Result<_> {
            Ok(Citation {
                pmid: row.get("pmid"),
                doi: row.get("doi"),
                title: row.get("title"),
                authors: row.get("authors"),
                journal: row.get("journal"),
                publication_year: row.get("publication_year"),
                study_type: vocab(&row.get::<String, _>("study_type"))?,
                sample_size: row.get("sample_size"),
                study_quality: row.get("study_quality"),
            })
        })
        .collect()
}

/// Interactions naming this ingredient by id or by slug.
async fn interactions(pool: &SqlitePool, id: &str, slug: &str) -> Result<Vec<Interaction>> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM ingredient_interactions
        WHERE ingredient_1_id IN (?1, ?2) OR ingredient_2_id IN (?1, ?2)
        ORDER BY ingredient_1_id, ingredient_2_id
        "#,
    )
    .bind(id)
    .bind(slug)
    .fetch_all(pool)
    .await?;
    rows.iter()
        .map(|row| -> Result<_> {
            Ok(Interaction {
                ingredient_1_id: row.get("ingredient_1_id"),
                ingredient_2_id: row.get("ingredient_2_id"),
                interaction_type: vocab(&row.get::<String, _>("interaction_type"))?,
                effect_description: row.get("effect_description"),
                confidence: row.get("confidence"),
            })
        })
        .collect()
}

/// Ordered by gut_score (highest first), then name.
pub async fn list_ingredients(
    pool: &SqlitePool,
    filter: &ListFilter,
) -> Result<Vec<IngredientSummary>> {
    let rows = sqlx::query(
        r#"
        SELECT id, slug, name, category, gut_score, confidence_score FROM ingredients
        WHERE (?1 IS NULL OR category = ?1)
          AND (?2 IS NULL OR gut_score >= ?2)
        ORDER BY gut_score DESC, name ASC
        LIMIT ?3 OFFSET ?4
        "#,
    )
    .bind(filter.category.map(|c| c.as_str()))
    .bind(filter.min_gut_score)
    .bind(filter.limit)
    .bind(filter.offset)
    .fetch_all(pool)
    .await?;
    rows.iter()
        .map(|row| -> Result<_> {
            Ok(IngredientSummary {
                id: row.get("id"),
                slug: row.get("slug"),
                name: row.get("name"),
                category: vocab(&row.get::<String, _>("category"))?,
                gut_score: row.get("gut_score"),
                confidence_score: row.get("confidence_score"),
            })
        })
        .collect()
}

/// Ingredients with a microbiome effect whose bacteria name contains `bacteria`.
pub async fn search_by_bacteria(pool: &SqlitePool, bacteria: &str) -> Result<Vec<BacteriaHit>> {
    let rows = sqlx::query(
        r#"
        SELECT i.slug, i.name, me.bacteria_name, me.bacteria_level, me.effect_strength,
            me.confidence
        FROM microbiome_effects me
        JOIN ingredients i ON i.id = me.ingredient_id
        WHERE me.bacteria_name LIKE ?
        ORDER BY me.confidence IS NULL, me.confidence DESC, i.name ASC
        "#,
    )
    .bind(format!("%{}%", bacteria.trim()))
    .fetch_all(pool)
    .await?;
    Ok(rows
        .iter()
        .map(|row| BacteriaHit {
            slug: row.get("slug"),
            name: row.get("name"),
            bacteria_name: row.get("bacteria_name"),
            bacteria_level: row.get("bacteria_level"),
            effect_strength: row.get("effect_strength"),
            confidence: row.get("confidence"),
        })
        .collect())
}

// ============ Writes ============

/// Stores a new graph. The storage id is the record's own id if it has one.
pub async fn insert_submission(
    pool: &SqlitePool,
    record: &IngredientSubmission,
) -> Result<StoredIngredient> {
    let id = record
        .ingredient
        .id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let hash = content_hash(record)?;
    let now = Utc::now().timestamp();
    let ing = &record.ingredient;

    let mut tx = pool.begin().await?;
    sqlx::query(
        r#"
        INSERT INTO ingredients (id, name, name_key, slug, aliases_json, category, description,
            gut_score, confidence_score, dosage_json, safety_notes, content_hash, created_at,
            updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&ing.name)
    .bind(name_key(&ing.name))
    .bind(&ing.slug)
    .bind(serde_json::to_string(&ing.aliases)?)
    .bind(ing.category.as_str())
    .bind(&ing.description)
    .bind(ing.gut_score)
    .bind(ing.confidence_score)
    .bind(dosage_json(ing)?)
    .bind(&ing.safety_notes)
    .bind(&hash)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .with_context(|| format!("failed to insert ingredient '{}'", ing.name))?;

    write_children(&mut tx, &id, record, now).await?;
    tx.commit().await?;

    tracing::debug!(id = %id, slug = %ing.slug, "inserted ingredient");
    Ok(StoredIngredient {
        id,
        slug: ing.slug.clone(),
        name: ing.name.clone(),
        content_hash: hash,
        created_at: now,
        updated_at: now,
    })
}

/// Rewrites an existing graph in place, keeping `created_at`.
/// Returns [`WriteStatus::Unchanged`] without touching the database when the
/// content hash matches.
pub async fn replace_submission(
    pool: &SqlitePool,
    id: &str,
    record: &IngredientSubmission,
) -> Result<WriteStatus> {
    let existing = find_by_id(pool, id)
        .await?
        .ok_or_else(|| anyhow!("ingredient not found: {}", id))?;
    let hash = content_hash(record)?;
    if existing.content_hash == hash {
        tracing::debug!(id, "content unchanged, skipping write");
        return Ok(WriteStatus::Unchanged);
    }

    let now = Utc::now().timestamp();
    let ing = &record.ingredient;
    let mut tx = pool.begin().await?;
    sqlx::query(
        r#"
        UPDATE ingredients SET name = ?, name_key = ?, slug = ?, aliases_json = ?, category = ?,
            description = ?, gut_score = ?, confidence_score = ?, dosage_json = ?, safety_notes = ?,
            content_hash = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&ing.name)
    .bind(name_key(&ing.name))
    .bind(&ing.slug)
    .bind(serde_json::to_string(&ing.aliases)?)
    .bind(ing.category.as_str())
    .bind(&ing.description)
    .bind(ing.gut_score)
    .bind(ing.confidence_score)
    .bind(dosage_json(ing)?)
    .bind(&ing.safety_notes)
    .bind(&hash)
    .bind(now)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let children = [
        "microbiome_effects",
        "metabolic_effects",
        "symptom_effects",
        "ingredient_citations",
    ];
    for table in children {
        sqlx::query(&format!("DELETE FROM {} WHERE ingredient_id = ?", table))
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }
    write_children(&mut tx, id, record, now).await?;
    tx.commit().await?;

    tracing::debug!(id, slug = %ing.slug, "replaced ingredient");
    Ok(WriteStatus::Updated)
}

/// Removes an ingredient with its effects and citation links.
pub async fn delete_by_slug(pool: &SqlitePool, slug: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM ingredients WHERE slug = ?")
        .bind(slug)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn dosage_json(ing: &Ingredient) -> Result<Option<String>> {
    Ok(ing
        .dosage_info
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?)
}

async fn write_children(
    tx: &mut Transaction<'_, Sqlite>,
    ingredient_id: &str,
    record: &IngredientSubmission,
    now: i64,
) -> Result<()> {
    for (position, e) in record.microbiome_effects.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO microbiome_effects (id, ingredient_id, position, bacteria_name,
                bacteria_level, effect_type, effect_strength, confidence, mechanism)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(ingredient_id)
        .bind(position as i64)
        .bind(&e.bacteria_name)
        .bind(e.bacteria_level.as_str())
        .bind(&e.effect_type)
        .bind(e.effect_strength.as_str())
        .bind(e.confidence)
        .bind(&e.mechanism)
        .execute(&mut **tx)
        .await?;
    }

    for (position, e) in record.metabolic_effects.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO metabolic_effects (id, ingredient_id, position, effect_name,
                effect_category, impact_direction, effect_strength, confidence, dosage_dependent,
                mechanism)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(ingredient_id)
        .bind(position as i64)
        .bind(&e.effect_name)
        .bind(&e.effect_category)
        .bind(e.impact_direction.as_str())
        .bind(e.effect_strength.as_str())
        .bind(e.confidence)
        .bind(e.dosage_dependent)
        .bind(&e.mechanism)
        .execute(&mut **tx)
        .await?;
    }

    for (position, e) in record.symptom_effects.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO symptom_effects (id, ingredient_id, position, symptom_name,
                symptom_category, effect_direction, effect_strength, confidence, dosage_dependent,
                population_notes)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(ingredient_id)
        .bind(position as i64)
        .bind(&e.symptom_name)
        .bind(&e.symptom_category)
        .bind(e.effect_direction.as_str())
        .bind(e.effect_strength.as_str())
        .bind(e.confidence)
        .bind(e.dosage_dependent)
        .bind(&e.population_notes)
        .execute(&mut **tx)
        .await?;
    }

    for (position, c) in record.citations.iter().enumerate() {
        let citation_id = upsert_citation(tx, c, now).await?;
        sqlx::query(
            "INSERT OR IGNORE INTO ingredient_citations (ingredient_id, citation_id, position) \
             VALUES (?, ?, ?)",
        )
        .bind(ingredient_id)
        .bind(&citation_id)
        .bind(position as i64)
        .execute(&mut **tx)
        .await?;
    }

    for i in &record.interactions {
        sqlx::query(
            r#"
            INSERT INTO ingredient_interactions (id, ingredient_1_id, ingredient_2_id,
                interaction_type, effect_description, confidence, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(ingredient_1_id, ingredient_2_id) DO UPDATE SET
                interaction_type = excluded.interaction_type,
                effect_description = excluded.effect_description,
                confidence = excluded.confidence,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&i.ingredient_1_id)
        .bind(&i.ingredient_2_id)
        .bind(i.interaction_type.as_str())
        .bind(&i.effect_description)
        .bind(i.confidence)
        .bind(now)
        .bind(now)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

/// Inserts or refreshes a shared citation row and returns its id.
async fn upsert_citation(
    tx: &mut Transaction<'_, Sqlite>,
    c: &Citation,
    now: i64,
) -> Result<String> {
    let key = citation_key(c);
    sqlx::query(
        r#"
        INSERT INTO citations (id, citation_key, pmid, doi, title, authors, journal,
            publication_year, study_type, sample_size, study_quality, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(citation_key) DO UPDATE SET
            authors = excluded.authors,
            journal = excluded.journal,
            publication_year = excluded.publication_year,
            study_type = excluded.study_type,
            sample_size = excluded.sample_size,
            study_quality = excluded.study_quality
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&key)
    .bind(&c.pmid)
    .bind(&c.doi)
    .bind(&c.title)
    .bind(&c.authors)
    .bind(&c.journal)
    .bind(c.publication_year)
    .bind(c.study_type.as_str())
    .bind(c.sample_size)
    .bind(c.study_quality)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    let id: String = sqlx::query_scalar("SELECT id FROM citations WHERE citation_key = ?")
        .bind(&key)
        .fetch_one(&mut **tx)
        .await?;
    Ok(id)
}
