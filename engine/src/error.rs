/// Core error kinds (§7). The engine reports kinds; mapping them to a
/// transport-appropriate response is explicitly out of scope here.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("transient: {0}")]
    Transient(String),

    #[error("schema mismatch, rebuild required: {0}")]
    Schema(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("embedder unavailable: {0}")]
    EmbedderUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<store::StoreError> for EngineError {
    fn from(err: store::StoreError) -> Self {
        match err {
            store::StoreError::Busy(m) => EngineError::Transient(m),
            store::StoreError::NotFound(m) => EngineError::NotFound(m),
            store::StoreError::Schema(m) => EngineError::Schema(m),
            store::StoreError::Constraint(m) => EngineError::Internal(format!("constraint violation: {m}")),
            store::StoreError::Io(e) => EngineError::Internal(format!("io: {e}")),
            store::StoreError::Serialization(m) => EngineError::Internal(m),
        }
    }
}

impl From<embedder::EmbedderError> for EngineError {
    fn from(err: embedder::EmbedderError) -> Self {
        EngineError::Internal(err.to_string())
    }
}
