//! zmna-search: find verbs by any of their conjugated forms.
//!
//! [`ConjugationSearchIndex`] maps every surface form of every verb, under
//! every preverb the verb takes, back to where it came from. Queries match
//! in four tiers (exact, prefix, suffix, substring) and recent results are
//! kept in a small bounded cache.

mod cache;
pub mod config;
pub mod index;

pub use config::IndexConfig;
pub use index::{normalize_form, BuildSummary, ConjugationSearchIndex, SearchIndexEntry};
