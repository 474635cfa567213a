use thiserror::Error;

#[derive(Error, Debug)]
pub enum HealError {
    #[error("Candidate did not attach in time: {0}")]
    CandidateTimeout(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Selector matched no elements: {0}")]
    InvalidCandidate(String),

    #[error("Healing failed: {0}")]
    HealingExhausted(String),

    #[error("Inference backend misconfigured: {0}")]
    BackendConfig(String),

    #[error("{provider} call failed{}: {detail}", status_suffix(.status))]
    BackendCall {
        provider: String,
        status: Option<u16>,
        detail: String,
    },

    #[error("Sidecar error{}: {detail}", status_suffix(.status))]
    Sidecar { status: Option<u16>, detail: String },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HealError>;

impl HealError {
    pub fn from_any_error<E: std::fmt::Display>(err: E) -> Self {
        HealError::Browser(err.to_string())
    }

    /// Builds a normalized inference failure, clipping the payload so logs stay readable.
    pub fn backend_call(provider: &str, status: Option<u16>, detail: impl AsRef<str>) -> Self {
        HealError::BackendCall {
            provider: provider.to_string(),
            status,
            detail: truncate_chars(detail.as_ref(), 500),
        }
    }

    /// Whether a healing strategy may fall through to the next one after this
    /// error. Storage and configuration failures propagate.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            HealError::HealingExhausted(_)
                | HealError::BackendConfig(_)
                | HealError::Store(_)
                | HealError::Configuration(_)
                | HealError::SerializationError(_)
                | HealError::IoError(_)
        )
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

pub(crate) fn truncate_chars(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}
