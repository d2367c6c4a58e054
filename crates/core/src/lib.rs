//! zmna-core: the Georgian verb data model and the preverb rule engine.
//!
//! A verb's conjugation data is stored once, for its default preverb.
//! Forms for every other preverb the verb accepts are derived on demand
//! by [`derive_forms`] from a declarative [`PreverbRules`] set. This crate
//! has no I/O: loading and caching live in `zmna-store`, reverse lookup
//! by surface form lives in `zmna-search`.

pub mod error;
pub mod preverb;
pub mod record;
pub mod types;

pub use error::RecordError;
pub use preverb::{derive_forms, is_sentinel, normalize_preverb};
pub use record::VerbRecord;
pub use types::{
    Conjugations, ConjugationForms, EnglishText, Person, PreverbConfig, PreverbRules, Tense,
    TenseBundle, TenseData, TenseTexts, VerbMeta,
};
