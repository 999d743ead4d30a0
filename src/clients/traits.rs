use async_trait::async_trait;
use thiserror::Error;

/// Errors from the model transport. All of them are opaque to the
/// pipeline: whichever stage issued the call fails with it.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("http error: {0}")]
    Http(String),
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("model returned an empty response")]
    Empty,
    #[error("model api key not configured")]
    MissingKey,
}

/// One text-generation call. Implementations own transport, auth and model
/// selection; the pipeline sees text in, text out and never retries.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError>;
}
