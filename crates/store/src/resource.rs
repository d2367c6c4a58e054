use std::fmt;

/// A JSON resource the store knows how to fetch.
///
/// The five shared resources hold every verb's data in bundled
/// deployments; `Verb` is the pre-merged per-verb file used otherwise.
/// `Verbs` is fetched in both modes and serves as the verb index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Resource {
    Verbs,
    Conjugations,
    Examples,
    GlossAnalyses,
    PreverbConfigs,
    Verb(String),
}

impl Resource {
    /// Path relative to the source root.
    pub fn path(&self) -> String {
        match self {
            Resource::Verbs => "verbs.json".to_string(),
            Resource::Conjugations => "conjugations.json".to_string(),
            Resource::Examples => "examples.json".to_string(),
            Resource::GlossAnalyses => "gloss_analyses.json".to_string(),
            Resource::PreverbConfigs => "preverb_configs.json".to_string(),
            Resource::Verb(id) => format!("verbs/{}.json", id),
        }
    }

    /// Whether many verbs share this resource.
    pub fn is_shared(&self) -> bool {
        !matches!(self, Resource::Verb(_))
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths() {
        assert_eq!(Resource::GlossAnalyses.path(), "gloss_analyses.json");
        assert_eq!(Resource::Verb("to_go".into()).path(), "verbs/to_go.json");
        assert!(Resource::Conjugations.is_shared());
        assert!(!Resource::Verb("x".into()).is_shared());
    }
}
