//! # GutIntel
//!
//! Validation, normalization, and storage for gut-health ingredient records.
//!
//! Submissions arrive as loosely-typed JSON (hand-authored files, converted
//! spreadsheets, filled-in templates). The pure validation pipeline lives in
//! the `gutintel-core` crate; this crate wires it to the filesystem, SQLite,
//! and the `gutintel` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌──────────┐
//! │ JSON files  │──▶│ gutintel-core    │──▶│  SQLite   │
//! │ (import)    │   │ Validator        │   │  (store)  │
//! └─────────────┘   └────────▲─────────┘   └────┬─────┘
//!                            │ CorpusIndex      │
//!                            └──────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`store`] | Persisting and reading ingredient graphs |
//! | [`import`] | Discover, validate, and write submission files |
//! | [`progress`] | Import progress on stderr |
//! | [`template`] | Blank submission templates |
//! | [`get`] | Read-side CLI commands |

pub mod config;
pub mod db;
pub mod get;
pub mod import;
pub mod migrate;
pub mod progress;
pub mod store;
pub mod template;
