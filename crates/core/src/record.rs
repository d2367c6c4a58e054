//! The per-verb aggregate and its presentation helpers.

use serde::{Deserialize, Serialize};

use crate::error::RecordError;
use crate::preverb::derive_forms;
use crate::types::{
    Conjugations, PreverbConfig, PreverbRules, Tense, TenseBundle, VerbMeta,
};

/// Everything known about one verb.
///
/// Records are read-only once loaded. In per-verb deployments this is the
/// exact shape of `verbs/<id>.json`; in bundled deployments it is joined
/// from the five shared resources by [`VerbRecord::from_parts`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerbRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub semantic_key: String,
    #[serde(default)]
    pub georgian: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, rename = "class")]
    pub verb_class: String,
    pub conjugations: Conjugations,
    pub preverb_config: PreverbConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preverb_rules: Option<PreverbRules>,
    #[serde(default)]
    pub examples: TenseBundle,
    #[serde(default, alias = "glossAnalyses")]
    pub gloss_analyses: TenseBundle,
}

impl VerbRecord {
    /// Join a verb's metadata with its separately stored resources.
    ///
    /// Fails if the metadata carries no preverb configuration.
    pub fn from_parts(
        meta: VerbMeta,
        conjugations: Conjugations,
        preverb_rules: Option<PreverbRules>,
        examples: TenseBundle,
        gloss_analyses: TenseBundle,
    ) -> Result<Self, RecordError> {
        let preverb_config = meta.preverb_config.ok_or_else(|| RecordError::MissingField {
            verb_id: meta.id.clone(),
            field: "preverb_config".to_string(),
        })?;
        Ok(VerbRecord {
            id: meta.id,
            semantic_key: meta.semantic_key,
            georgian: meta.georgian,
            description: meta.description,
            category: meta.category,
            verb_class: meta.verb_class,
            conjugations,
            preverb_config,
            preverb_rules,
            examples,
            gloss_analyses,
        })
    }

    /// Reject records the rule engine or display layer cannot use.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.conjugations.is_empty() {
            return Err(RecordError::MissingField {
                verb_id: self.id.clone(),
                field: "conjugations".to_string(),
            });
        }
        let config = &self.preverb_config;
        if config.has_multiple_preverbs && config.available_preverbs.is_empty() {
            return Err(RecordError::InconsistentPreverbs {
                verb_id: self.id.clone(),
                message: "has_multiple_preverbs is set but available_preverbs is empty"
                    .to_string(),
            });
        }
        Ok(())
    }

    /// The preverb whose forms are stored verbatim.
    pub fn default_preverb(&self) -> &str {
        if !self.preverb_config.default_preverb.is_empty() {
            return &self.preverb_config.default_preverb;
        }
        self.preverb_rules
            .as_ref()
            .map(|r| r.default.as_str())
            .unwrap_or("")
    }

    /// Every preverb the verb can be displayed with.
    pub fn preverbs(&self) -> Vec<String> {
        let config = &self.preverb_config;
        if config.has_multiple_preverbs && !config.available_preverbs.is_empty() {
            config.available_preverbs.clone()
        } else {
            vec![self.default_preverb().to_string()]
        }
    }

    /// Conjugations as displayed under `preverb`.
    ///
    /// Single-preverb verbs never go through the rule engine.
    pub fn forms_for(&self, preverb: &str) -> Conjugations {
        if !self.preverb_config.has_multiple_preverbs {
            return self.conjugations.clone();
        }
        match &self.preverb_rules {
            Some(rules) => derive_forms(&self.conjugations, rules, preverb),
            None => self.conjugations.clone(),
        }
    }

    /// Example HTML for a preverb and tense.
    pub fn examples_for(&self, preverb: &str, tense: Tense) -> Option<&str> {
        self.examples
            .select(preverb, self.default_preverb())
            .and_then(|texts| texts.get(&tense))
            .map(String::as_str)
    }

    /// Gloss-analysis HTML for a preverb and tense.
    pub fn gloss_for(&self, preverb: &str, tense: Tense) -> Option<&str> {
        self.gloss_analyses
            .select(preverb, self.default_preverb())
            .and_then(|texts| texts.get(&tense))
            .map(String::as_str)
    }

    /// English override for a preverb and tense, from the rule set.
    pub fn english_for(&self, preverb: &str, tense: Tense) -> Option<&str> {
        self.preverb_rules
            .as_ref()
            .and_then(|rules| rules.english_for(preverb, tense))
    }
}
