//! # GutIntel CLI (`gutintel`)
//!
//! The `gutintel` binary validates, imports, and queries ingredient records.
//!
//! ## Usage
//!
//! ```bash
//! gutintel --config ./config/gutintel.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `gutintel init` | Create the SQLite database and run schema migrations |
//! | `gutintel validate <path>` | Validate submission files without writing |
//! | `gutintel import <path>` | Validate and store submission files |
//! | `gutintel get <slug>` | Print a stored ingredient graph as JSON |
//! | `gutintel list` | List stored ingredients by gut score |
//! | `gutintel bacteria <name>` | Find ingredients affecting a bacterium |
//! | `gutintel delete <slug>` | Remove an ingredient and its effects |
//! | `gutintel template <name>` | Write a blank submission template |
//! | `gutintel template --from-csv <file>` | Write one template per spreadsheet row |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! gutintel init
//!
//! # Check a directory of hand-authored records
//! gutintel validate ./ingredients --json
//!
//! # Import, refreshing records that already exist
//! gutintel import ./ingredients --update-existing
//!
//! # Start a new record
//! gutintel template "Psyllium Husk" --category fiber --output psyllium-husk.json
//!
//! # Start many records from a name,category spreadsheet
//! gutintel template --from-csv ingredients.csv --output-dir ./templates
//! ```

use clap::{Parser, Subcommand};
use gutintel::config::{self, Config};
use gutintel::import::{self, ImportOptions};
use gutintel::progress::ProgressMode;
use gutintel::{get, migrate, template};
use gutintel_core::model::{Category, Vocabulary};
use std::path::{Path, PathBuf};

/// GutIntel: validation and storage for gut-health ingredient research.
///
/// All commands except `template` read a TOML configuration file.
/// See `config/gutintel.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "gutintel",
    about = "GutIntel: validate, import, and query gut-health ingredient records",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/gutintel.toml")]
    config: PathBuf,

    /// Debug logging on stderr.
    #[arg(long, short, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Errors only on stderr.
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Progress reporting for validate and import.
    #[arg(long, global = true, value_enum, default_value = "auto")]
    progress: ProgressMode,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Validate submission files without touching the database.
    ///
    /// Exits non-zero if any file is rejected or unreadable.
    Validate {
        /// A JSON file, or a directory scanned with `[import]` globs.
        path: PathBuf,

        /// Print the full report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Validate and store submission files.
    ///
    /// All files are validated as one batch, so two files claiming the same
    /// name or slug are both reported. Exits non-zero if any file failed.
    Import {
        /// A JSON file, or a directory scanned with `[import]` globs.
        path: PathBuf,

        /// Validate only; write nothing.
        #[arg(long)]
        dry_run: bool,

        /// Replace stored ingredients that share a name or slug.
        #[arg(long, conflicts_with = "skip_duplicates")]
        update_existing: bool,

        /// Skip files whose ingredient is already stored.
        #[arg(long)]
        skip_duplicates: bool,
    },

    /// Print a stored ingredient graph as JSON.
    Get {
        slug: String,
    },

    /// List stored ingredients, highest gut score first.
    List {
        #[arg(long, value_parser = parse_category)]
        category: Option<Category>,

        #[arg(long)]
        min_gut_score: Option<f64>,

        #[arg(long, default_value_t = 50)]
        limit: i64,

        #[arg(long, default_value_t = 0)]
        offset: i64,
    },

    /// Find ingredients with a microbiome effect on a bacterium (substring match).
    Bacteria {
        name: String,
    },

    /// Delete a stored ingredient with its effects and citation links.
    Delete {
        slug: String,
    },

    /// Write a blank submission template. Needs no config.
    Template {
        /// Ingredient name; the slug is derived from it.
        #[arg(required_unless_present = "from_csv")]
        name: Option<String>,

        #[arg(long, required_unless_present = "from_csv")]
        category: Option<String>,

        /// Write to a file instead of stdout.
        #[arg(long, short, conflicts_with = "from_csv")]
        output: Option<PathBuf>,

        /// Convert a CSV with `name` and `category` columns, one template per row.
        #[arg(long, value_name = "FILE", conflicts_with_all = ["name", "category"])]
        from_csv: Option<PathBuf>,

        /// Directory for templates written by `--from-csv` [default: templates]
        #[arg(long, value_name = "DIR", requires = "from_csv")]
        output_dir: Option<PathBuf>,
    },
}

fn parse_category(s: &str) -> Result<Category, String> {
    Category::parse(s).ok_or_else(|| format!("expected one of: {}", Category::choices()))
}

fn init_tracing(quiet: bool, verbose: bool) -> anyhow::Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("GUTINTEL_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

/// Config for `validate`: the file if present, otherwise defaults.
fn validation_config(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        Ok(Config::minimal())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    // Commands that don't require a config file
    match &cli.command {
        Commands::Template {
            name,
            category,
            output,
            from_csv,
            output_dir,
        } => {
            match (from_csv, name, category) {
                (Some(csv), _, _) => {
                    let dir = output_dir.as_deref().unwrap_or(Path::new("templates"));
                    template::run_csv_convert(csv, dir)?;
                }
                (None, Some(name), Some(category)) => {
                    template::run_template(name, category, output.as_deref())?;
                }
                _ => anyhow::bail!("template needs <NAME> and --category, or --from-csv"),
            }
            return Ok(());
        }
        Commands::Validate { path, json } => {
            let cfg = validation_config(&cli.config)?;
            let reporter = cli.progress.reporter();
            let report = import::run_validate(&cfg, path, *json, reporter.as_ref()).await?;
            if report.has_failures() {
                std::process::exit(1);
            }
            return Ok(());
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import {
            path,
            dry_run,
            update_existing,
            skip_duplicates,
        } => {
            let options = ImportOptions {
                dry_run,
                update_existing,
                skip_duplicates,
            };
            let reporter = cli.progress.reporter();
            let report = import::run_import(&cfg, &path, options, reporter.as_ref()).await?;
            if report.has_failures() {
                std::process::exit(1);
            }
        }
        Commands::Get { slug } => {
            get::run_get(&cfg, &slug).await?;
        }
        Commands::List {
            category,
            min_gut_score,
            limit,
            offset,
        } => {
            get::run_list(&cfg, category, min_gut_score, limit, offset).await?;
        }
        Commands::Bacteria { name } => {
            get::run_bacteria(&cfg, &name).await?;
        }
        Commands::Delete { slug } => {
            get::run_delete(&cfg, &slug).await?;
        }
        Commands::Template { .. } | Commands::Validate { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
