//! # GutIntel Core
//!
//! Pure validation and normalization pipeline for GutIntel ingredient
//! records: the record model, one rule object per field, slug derivation,
//! cross-field checks, and the orchestrator that turns a raw submission into
//! an accepted record or a full list of violations.
//!
//! This crate performs no I/O. Uniqueness checks go through the
//! [`lookup::CorpusLookup`] trait, which the caller implements or fills
//! from storage.

pub mod lookup;
pub mod model;
pub mod policy;
pub mod record;
pub mod rules;
pub mod slug;
pub mod validator;
pub mod violation;

pub use lookup::{CorpusEntry, CorpusIndex, CorpusLookup, EmptyCorpus};
pub use model::{IngredientSubmission, RawSubmission};
pub use policy::ValidationPolicy;
pub use validator::{Outcome, Validator};
pub use violation::{Severity, Violation, ViolationKind};
