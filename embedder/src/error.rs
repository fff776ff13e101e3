/// Errors raised while constructing or running an embedding backend.
#[derive(Debug, thiserror::Error)]
pub enum EmbedderError {
    #[error("invalid embedder configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("input too long: max {max_length} tokens, got {actual_length}")]
    InputTooLong { max_length: usize, actual_length: usize },

    #[error("embedding provider failure: {message}")]
    ProviderFailure { message: String },
}
