/// Errors raised when a verb record fails structural validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// A field the rule engine or the display layer depends on is absent or empty.
    #[error("verb '{verb_id}' is missing required field '{field}'")]
    MissingField { verb_id: String, field: String },

    /// The preverb configuration contradicts itself.
    #[error("verb '{verb_id}' has an inconsistent preverb configuration: {message}")]
    InconsistentPreverbs { verb_id: String, message: String },
}
