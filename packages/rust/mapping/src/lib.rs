//! Mapping index and identity resolution for the intake pipelines.
//!
//! The respondent spreadsheet is loaded once per run into an immutable
//! [`MappingIndex`]; the pure [`resolve`] function turns artifact names into
//! canonical identities, and [`canonical_output_name`] derives the
//! deterministic, collision-checked output name.

mod index;
mod resolver;

pub use index::{KeyConflict, MappingIndex};
pub use resolver::{
    UNMATCHED_PREFIX, canonical_output_name, canonical_stem, preserved_output_name, resolve,
    sanitize_name,
};
