/// Errors a [`ResourceSource`](crate::ResourceSource) can return for a single fetch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// Transport failure or non-success status. Worth retrying.
    #[error("failed to fetch {resource}: {message}")]
    Fetch { resource: String, message: String },

    /// The resource arrived but is not valid JSON. Retrying will not help.
    #[error("malformed JSON in {resource}: {message}")]
    Malformed { resource: String, message: String },
}

/// Errors surfaced by the [`VerbDataStore`](crate::VerbDataStore).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A backing resource could not be fetched, even after retrying.
    #[error("failed to fetch {resource} after {attempts} attempt(s): {message}")]
    ResourceFetch {
        resource: String,
        attempts: u32,
        message: String,
    },

    /// Unparseable JSON, or a verb record missing required fields.
    #[error("malformed data for {subject}: {message}")]
    MalformedData { subject: String, message: String },

    /// The verb id has no entry in the verb index.
    #[error("unknown verb: {verb_id}")]
    UnknownVerb { verb_id: String },
}

impl StoreError {
    /// Whether calling again could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::ResourceFetch { .. })
    }
}

impl From<zmna_core::RecordError> for StoreError {
    fn from(e: zmna_core::RecordError) -> Self {
        let subject = match &e {
            zmna_core::RecordError::MissingField { verb_id, .. }
            | zmna_core::RecordError::InconsistentPreverbs { verb_id, .. } => {
                format!("verb '{}'", verb_id)
            }
        };
        StoreError::MalformedData {
            subject,
            message: e.to_string(),
        }
    }
}
