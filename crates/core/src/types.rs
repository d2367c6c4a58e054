//! Typed structs for the verb JSON resources.
//!
//! Tenses and persons are closed sets and are modelled as enums, so a
//! conjugation table with an unknown tense or person key fails to
//! deserialize instead of being silently carried along. HTML fragments
//! (gloss, examples) are opaque strings.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::preverb::{is_sentinel, normalize_preverb};

// ──────────────────────────────────────────────
// Tense / Person
// ──────────────────────────────────────────────

/// One of the six screves shown for every verb, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tense {
    Present,
    Imperfect,
    Future,
    Aorist,
    Optative,
    Imperative,
}

impl Tense {
    pub const ALL: [Tense; 6] = [
        Tense::Present,
        Tense::Imperfect,
        Tense::Future,
        Tense::Aorist,
        Tense::Optative,
        Tense::Imperative,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Tense::Present => "present",
            Tense::Imperfect => "imperfect",
            Tense::Future => "future",
            Tense::Aorist => "aorist",
            Tense::Optative => "optative",
            Tense::Imperative => "imperative",
        }
    }
}

impl fmt::Display for Tense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tense {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tense::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown tense '{}'", s))
    }
}

/// Grammatical person and number of a conjugation cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Person {
    #[serde(rename = "1sg")]
    FirstSingular,
    #[serde(rename = "2sg")]
    SecondSingular,
    #[serde(rename = "3sg")]
    ThirdSingular,
    #[serde(rename = "1pl")]
    FirstPlural,
    #[serde(rename = "2pl")]
    SecondPlural,
    #[serde(rename = "3pl")]
    ThirdPlural,
}

impl Person {
    pub const ALL: [Person; 6] = [
        Person::FirstSingular,
        Person::SecondSingular,
        Person::ThirdSingular,
        Person::FirstPlural,
        Person::SecondPlural,
        Person::ThirdPlural,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Person::FirstSingular => "1sg",
            Person::SecondSingular => "2sg",
            Person::ThirdSingular => "3sg",
            Person::FirstPlural => "1pl",
            Person::SecondPlural => "2pl",
            Person::ThirdPlural => "3pl",
        }
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Person {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Person::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown person '{}'", s))
    }
}

// ──────────────────────────────────────────────
// Conjugation tables
// ──────────────────────────────────────────────

/// Person → surface form for one tense.
///
/// A missing person is equivalent to the `"-"` sentinel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConjugationForms(BTreeMap<Person, String>);

impl ConjugationForms {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored form, or `"-"` if the cell has no entry.
    pub fn get(&self, person: Person) -> &str {
        self.0.get(&person).map(String::as_str).unwrap_or("-")
    }

    /// Whether the cell holds a real form rather than a sentinel.
    pub fn has_form(&self, person: Person) -> bool {
        !is_sentinel(self.get(person))
    }

    pub fn insert(&mut self, person: Person, form: impl Into<String>) {
        self.0.insert(person, form.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (Person, &str)> {
        self.0.iter().map(|(p, f)| (*p, f.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Person, String)> for ConjugationForms {
    fn from_iter<I: IntoIterator<Item = (Person, String)>>(iter: I) -> Self {
        ConjugationForms(iter.into_iter().collect())
    }
}

/// One tense's display bundle. Only `forms` is touched by the rule engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenseData {
    pub forms: ConjugationForms,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gloss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examples: Option<String>,
}

/// A verb's conjugation for its default preverb, keyed by tense.
pub type Conjugations = BTreeMap<Tense, TenseData>;

/// Tense → pre-rendered HTML fragment.
pub type TenseTexts = BTreeMap<Tense, String>;

// ──────────────────────────────────────────────
// Preverbs
// ──────────────────────────────────────────────

/// English translation override for a preverb: either one text for every
/// tense, or a text per tense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnglishText {
    Uniform(String),
    PerTense(TenseTexts),
}

/// Declarative rules for deriving non-default preverb forms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreverbRules {
    /// The preverb whose forms are stored verbatim, e.g. `"მი"`.
    #[serde(default)]
    pub default: String,
    /// Normalized preverb → literal replacement prefix.
    #[serde(default)]
    pub replacements: BTreeMap<String, String>,
    /// Normalized preverb → tense → replacement prefix for that tense only.
    #[serde(default)]
    pub tense_specific_fallbacks: BTreeMap<String, BTreeMap<Tense, String>>,
    /// Translation overrides, passed through to presentation.
    #[serde(default)]
    pub english_fallbacks: BTreeMap<String, EnglishText>,
}

impl PreverbRules {
    /// Rules with no default preverb cannot anchor a prefix swap and are
    /// treated as absent.
    pub fn is_empty(&self) -> bool {
        self.default.is_empty()
    }

    /// The general replacement prefix for a target preverb.
    ///
    /// Falls back to the target itself, as given, when no mapping exists.
    pub fn replacement_for(&self, target: &str) -> String {
        let normalized = normalize_preverb(target);
        lookup_normalized(&self.replacements, &normalized)
            .cloned()
            .unwrap_or_else(|| target.to_string())
    }

    /// A tense-specific override of the replacement prefix, if one is declared.
    pub fn tense_fallback(&self, target: &str, tense: Tense) -> Option<&str> {
        let normalized = normalize_preverb(target);
        lookup_normalized(&self.tense_specific_fallbacks, &normalized)
            .and_then(|per_tense| per_tense.get(&tense))
            .map(String::as_str)
    }

    /// English override text for a preverb and tense.
    pub fn english_for(&self, preverb: &str, tense: Tense) -> Option<&str> {
        let normalized = normalize_preverb(preverb);
        match lookup_normalized(&self.english_fallbacks, &normalized)? {
            EnglishText::Uniform(text) => Some(text.as_str()),
            EnglishText::PerTense(texts) => texts.get(&tense).map(String::as_str),
        }
    }
}

/// Exact key lookup first, then a scan comparing hyphen-normalized keys,
/// so rule files may write keys either as `"წა"` or `"წა-"`.
pub(crate) fn lookup_normalized<'a, V>(
    map: &'a BTreeMap<String, V>,
    normalized: &str,
) -> Option<&'a V> {
    map.get(normalized).or_else(|| {
        map.iter()
            .find(|(k, _)| normalize_preverb(k) == normalized)
            .map(|(_, v)| v)
    })
}

/// Which preverbs a verb accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreverbConfig {
    #[serde(default)]
    pub has_multiple_preverbs: bool,
    #[serde(default)]
    pub default_preverb: String,
    #[serde(default)]
    pub available_preverbs: Vec<String>,
}

// ──────────────────────────────────────────────
// Example / gloss bundles
// ──────────────────────────────────────────────

/// Pre-rendered examples or gloss analyses for a verb.
///
/// Single-preverb verbs ship a flat tense map; multi-preverb verbs ship
/// one tense map per normalized preverb.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TenseBundle {
    Flat(TenseTexts),
    PerPreverb(BTreeMap<String, TenseTexts>),
}

impl Default for TenseBundle {
    fn default() -> Self {
        TenseBundle::Flat(TenseTexts::new())
    }
}

impl TenseBundle {
    /// The tense map for `preverb`, falling back to the default preverb's.
    pub fn select(&self, preverb: &str, default_preverb: &str) -> Option<&TenseTexts> {
        match self {
            TenseBundle::Flat(texts) => Some(texts),
            TenseBundle::PerPreverb(by_preverb) => {
                lookup_normalized(by_preverb, &normalize_preverb(preverb)).or_else(|| {
                    lookup_normalized(by_preverb, &normalize_preverb(default_preverb))
                })
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            TenseBundle::Flat(texts) => texts.is_empty(),
            TenseBundle::PerPreverb(by_preverb) => by_preverb.is_empty(),
        }
    }
}

// ──────────────────────────────────────────────
// Verb metadata
// ──────────────────────────────────────────────

/// One entry of the core metadata resource (`verbs.json`).
///
/// The resource is keyed by verb id; `id` is filled in by the loader.
/// `preverb_config` is optional here so one bad entry does not make the
/// whole catalog unreadable; records built from a meta without it are
/// rejected by [`VerbRecord::from_parts`](crate::VerbRecord::from_parts).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerbMeta {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub georgian: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, rename = "class")]
    pub verb_class: String,
    #[serde(default)]
    pub semantic_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preverb_config: Option<PreverbConfig>,
}
