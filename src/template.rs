//! Blank submission templates for hand authoring.
//!
//! `gutintel template <name> --category <c>` writes a JSON skeleton in the
//! raw submission layout. Every value a person must fill in is a bracketed
//! `[...]` placeholder, so an untouched template never validates: placeholder
//! text is reported as a warning (or rejection, per config) and numeric
//! placeholders fail type checks.
//!
//! `gutintel template --from-csv <file>` does the same for every row of a
//! spreadsheet export with `name` and `category` columns, writing
//! `<slug>.json` into the output directory.

use anyhow::{bail, Context, Result};
use chrono::Datelike;
use gutintel_core::model::{
    BacteriaLevel, Category, EffectDirection, EffectStrength, InteractionType, StudyType,
    Vocabulary,
};
use gutintel_core::slug::derive_slug;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Category-flavoured hints for the first effect of each kind.
struct Examples {
    bacteria: &'static str,
    effect_type: &'static str,
    metabolic: &'static str,
    symptom: &'static str,
}

fn examples_for(category: Category) -> Option<Examples> {
    let examples = match category {
        Category::Prebiotic => Examples {
            bacteria: "Bifidobacterium longum",
            effect_type: "Selective bacterial growth promotion",
            metabolic: "Butyrate production enhancement",
            symptom: "Improved bowel regularity",
        },
        Category::Probiotic => Examples {
            bacteria: "Lactobacillus rhamnosus GG",
            effect_type: "Direct bacterial colonization",
            metabolic: "Lactate production",
            symptom: "Reduced antibiotic-associated diarrhea",
        },
        Category::Fiber => Examples {
            bacteria: "Faecalibacterium prausnitzii",
            effect_type: "Substrate provision for fermentation",
            metabolic: "Short-chain fatty acid production",
            symptom: "Improved stool consistency",
        },
        Category::Polyphenol => Examples {
            bacteria: "Akkermansia muciniphila",
            effect_type: "Antioxidant activity modulation",
            metabolic: "Metabolite transformation",
            symptom: "Reduced inflammation markers",
        },
        _ => return None,
    };
    Some(examples)
}

fn choices<T: Vocabulary>() -> String {
    format!(
        "[{}]",
        T::ALL.iter().map(|v| v.as_str()).collect::<Vec<_>>().join("/")
    )
}

/// Builds the template for `name` in `category`.
pub fn generate_template(name: &str, category: &str) -> Result<Value> {
    let name = name.trim();
    let Some(category) = Category::parse(category) else {
        bail!("invalid category '{}'; expected one of: {}", category, Category::choices());
    };
    let slug = derive_slug(name)?;
    let year = chrono::Utc::now().year();

    let mut template = json!({
        "ingredient": {
            "name": name,
            "slug": slug,
            "aliases": [
                format!("[Example: Alternative name for {}]", name),
                format!("[Example: Common name for {}]", name)
            ],
            "category": category.as_str(),
            "description": format!(
                "[Description of {}. Include origin, properties, and general health benefits.]",
                name
            ),
            "gut_score": "[Gut health score from 0-10, 1 decimal place. Example: 8.5]",
            "dosage_info": {
                "min_dose": "[Minimum effective dose. Example: 500]",
                "max_dose": "[Maximum safe dose. Example: 2000]",
                "unit": "[Unit of measurement. Example: mg, g, CFU]",
                "frequency": "[Dosing frequency. Example: daily, twice daily]",
                "duration": "[Treatment duration. Example: 4-8 weeks]",
                "form": "[Form of supplement. Example: capsule, powder, liquid]",
                "timing": "[When to take. Example: with meals]",
                "notes": "[Additional dosing notes. Example: Start with lower dose]"
            },
            "safety_notes": format!(
                "[Safety information for {}. Include contraindications, side effects, and \
                 precautions.]",
                name
            )
        },
        "microbiome_effects": [{
            "bacteria_name": "[Name of affected bacteria. Example: Bifidobacterium longum]",
            "bacteria_level": choices::<BacteriaLevel>(),
            "effect_type": "[Type of effect. Example: growth promotion, inhibition]",
            "effect_strength": choices::<EffectStrength>(),
            "confidence": "[Confidence score 0-1. Example: 0.75]",
            "mechanism": "[How it works. Example: Provides substrate for bacterial fermentation]"
        }],
        "metabolic_effects": [{
            "effect_name": "[Name of metabolic effect. Example: SCFA production]",
            "effect_category": "[Category. Example: short-chain fatty acids, inflammation]",
            "impact_direction": choices::<EffectDirection>(),
            "effect_strength": choices::<EffectStrength>(),
            "confidence": "[Confidence score 0-1. Example: 0.80]",
            "dosage_dependent": "[true/false]",
            "mechanism": "[How it affects metabolism. Example: Enhances butyrate production]"
        }],
        "symptom_effects": [{
            "symptom_name": "[Symptom affected. Example: bloating, constipation]",
            "symptom_category": "[Category. Example: digestive, inflammatory]",
            "effect_direction": choices::<EffectDirection>(),
            "effect_strength": choices::<EffectStrength>(),
            "confidence": "[Confidence score 0-1. Example: 0.70]",
            "dosage_dependent": "[true/false]",
            "population_notes":
                "[Notes about specific populations. Example: More effective in adults over 50]"
        }],
        "citations": [{
            "pmid": "[PubMed ID, 1-8 digits. Example: 12345678]",
            "doi": "[DOI starting with 10. Example: 10.1038/s41598-020-12345-6]",
            "title": "[Study title]",
            "authors": "[Study authors. Example: Smith J, Johnson A]",
            "journal": "[Journal name]",
            "publication_year": format!("[Year 1900-{}]", year),
            "study_type": choices::<StudyType>(),
            "sample_size": "[Sample size above 0. Example: 120]",
            "study_quality": "[Quality score 0-1. Example: 0.85]"
        }],
        "interactions": [{
            "ingredient_1_id": "[First ingredient ID]",
            "ingredient_2_id": "[Second ingredient ID]",
            "interaction_type": choices::<InteractionType>(),
            "effect_description":
                "[Description of interaction. Example: Enhances absorption when taken together]",
            "confidence": "[Confidence score 0-1. Example: 0.65]"
        }]
    });

    if let Some(examples) = examples_for(category) {
        let hint = |text: &str| json!(format!("[Example: {}]", text));
        template["microbiome_effects"][0]["bacteria_name"] = hint(examples.bacteria);
        template["microbiome_effects"][0]["effect_type"] = hint(examples.effect_type);
        template["metabolic_effects"][0]["effect_name"] = hint(examples.metabolic);
        template["symptom_effects"][0]["symptom_name"] = hint(examples.symptom);
    }

    Ok(template)
}

/// CLI entry point for `gutintel template`.
pub fn run_template(name: &str, category: &str, output: Option<&Path>) -> Result<()> {
    let template = generate_template(name, category)?;
    let text = serde_json::to_string_pretty(&template)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, format!("{}\n", text))?;
            println!("template written to {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default)]
    name: String,
    #[serde(default)]
    category: String,
}

/// Writes one template per row of `csv_path` into `output_dir`, named
/// `<slug>.json`. Rows with a blank name or category are skipped; extra
/// columns are ignored. Returns the written paths in row order.
pub fn convert_csv(csv_path: &Path, output_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let headers = reader
        .headers()
        .with_context(|| format!("failed to read the header of {}", csv_path.display()))?
        .clone();
    for column in ["name", "category"] {
        if !headers.iter().any(|h| h == column) {
            bail!("{} has no '{}' column", csv_path.display(), column);
        }
    }

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let mut written = Vec::new();
    let mut rows_by_slug: HashMap<String, u64> = HashMap::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("failed to read {}", csv_path.display()))?;
        let line = record.position().map_or(0, |p| p.line());
        let row: CsvRow = record
            .deserialize(Some(&headers))
            .with_context(|| format!("line {}: malformed row", line))?;
        if row.name.is_empty() || row.category.is_empty() {
            tracing::debug!(line, "skipping row without name or category");
            continue;
        }

        let template = generate_template(&row.name, &row.category)
            .with_context(|| format!("line {}: cannot build a template for '{}'", line, row.name))?;
        let slug = template["ingredient"]["slug"].as_str().unwrap_or_default().to_string();
        if let Some(first) = rows_by_slug.insert(slug.clone(), line) {
            bail!("line {}: '{}' has the same slug '{}' as line {}", line, row.name, slug, first);
        }

        let path = output_dir.join(format!("{}.json", slug));
        let text = serde_json::to_string_pretty(&template)?;
        std::fs::write(&path, format!("{}\n", text))
            .with_context(|| format!("failed to write {}", path.display()))?;
        written.push(path);
    }
    tracing::info!(rows = written.len(), dir = %output_dir.display(), "templates written");
    Ok(written)
}

/// CLI entry point for `gutintel template --from-csv`.
pub fn run_csv_convert(csv_path: &Path, output_dir: &Path) -> Result<()> {
    let written = convert_csv(csv_path, output_dir)?;
    println!(
        "created {} template files in {}",
        written.len(),
        output_dir.display()
    );
    Ok(())
}
