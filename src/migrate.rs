use anyhow::Result;

use crate::config::Config;
use crate::db;

const TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS ingredients (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        name_key TEXT NOT NULL UNIQUE,
        slug TEXT NOT NULL UNIQUE,
        aliases_json TEXT NOT NULL DEFAULT '[]',
        category TEXT NOT NULL,
        description TEXT,
        gut_score REAL NOT NULL CHECK (gut_score BETWEEN 0 AND 10),
        confidence_score REAL NOT NULL CHECK (confidence_score BETWEEN 0 AND 1),
        dosage_json TEXT,
        safety_notes TEXT,
        content_hash TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS microbiome_effects (
        id TEXT PRIMARY KEY,
        ingredient_id TEXT NOT NULL,
        position INTEGER NOT NULL,
        bacteria_name TEXT NOT NULL,
        bacteria_level TEXT NOT NULL,
        effect_type TEXT,
        effect_strength TEXT NOT NULL,
        confidence REAL,
        mechanism TEXT,
        FOREIGN KEY (ingredient_id) REFERENCES ingredients(id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS metabolic_effects (
        id TEXT PRIMARY KEY,
        ingredient_id TEXT NOT NULL,
        position INTEGER NOT NULL,
        effect_name TEXT NOT NULL,
        effect_category TEXT,
        impact_direction TEXT NOT NULL,
        effect_strength TEXT NOT NULL,
        confidence REAL,
        dosage_dependent INTEGER NOT NULL DEFAULT 0,
        mechanism TEXT,
        FOREIGN KEY (ingredient_id) REFERENCES ingredients(id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS symptom_effects (
        id TEXT PRIMARY KEY,
        ingredient_id TEXT NOT NULL,
        position INTEGER NOT NULL,
        symptom_name TEXT NOT NULL,
        symptom_category TEXT,
        effect_direction TEXT NOT NULL,
        effect_strength TEXT NOT NULL,
        confidence REAL,
        dosage_dependent INTEGER NOT NULL DEFAULT 0,
        population_notes TEXT,
        FOREIGN KEY (ingredient_id) REFERENCES ingredients(id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS citations (
        id TEXT PRIMARY KEY,
        citation_key TEXT NOT NULL UNIQUE,
        pmid TEXT,
        doi TEXT,
        title TEXT NOT NULL,
        authors TEXT NOT NULL,
        journal TEXT,
        publication_year INTEGER,
        study_type TEXT NOT NULL,
        sample_size INTEGER,
        study_quality REAL,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ingredient_citations (
        ingredient_id TEXT NOT NULL,
        citation_id TEXT NOT NULL,
        position INTEGER NOT NULL,
        PRIMARY KEY (ingredient_id, citation_id),
        FOREIGN KEY (ingredient_id) REFERENCES ingredients(id) ON DELETE CASCADE,
        FOREIGN KEY (citation_id) REFERENCES citations(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ingredient_interactions (
        id TEXT PRIMARY KEY,
        ingredient_1_id TEXT NOT NULL,
        ingredient_2_id TEXT NOT NULL,
        interaction_type TEXT NOT NULL,
        effect_description TEXT,
        confidence REAL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        UNIQUE (ingredient_1_id, ingredient_2_id),
        CHECK (ingredient_1_id < ingredient_2_id)
    )
    "#,
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_ingredients_category ON ingredients(category)",
    "CREATE INDEX IF NOT EXISTS idx_ingredients_gut_score ON ingredients(gut_score DESC)",
    "CREATE INDEX IF NOT EXISTS idx_microbiome_ingredient ON microbiome_effects(ingredient_id)",
    "CREATE INDEX IF NOT EXISTS idx_microbiome_bacteria
        ON microbiome_effects(bacteria_name COLLATE NOCASE)",
    "CREATE INDEX IF NOT EXISTS idx_metabolic_ingredient ON metabolic_effects(ingredient_id)",
    "CREATE INDEX IF NOT EXISTS idx_symptom_ingredient ON symptom_effects(ingredient_id)",
    "CREATE INDEX IF NOT EXISTS idx_ingredient_citations_citation
        ON ingredient_citations(citation_id)",
];

/// Creates every table and index. Safe to run repeatedly.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn apply(pool: &sqlx::SqlitePool) -> Result<()> {
    for statement in TABLES.iter().chain(INDEXES) {
        sqlx::query(*statement).execute(pool).await?;
    }
    tracing::debug!(tables = TABLES.len(), indexes = INDEXES.len(), "schema ready");
    Ok(())
}
