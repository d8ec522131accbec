// Error types shared by the label codec, the engine adapters and the stats reconciler

use thiserror::Error;

/// Why a label value could not be turned into structured data.
/// Public label operations absorb these and log them; `try_*` variants expose them.
#[derive(Debug, Error)]
pub enum LabelError {
    #[error("label value is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("label value is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("unexpected label shape: {0}")]
    Shape(&'static str),
    #[error("readme chunk {0} is missing")]
    MissingChunk(usize),
}

/// Failures talking to the container engine (API or CLI).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("docker api: {0}")]
    Docker(#[from] bollard::errors::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("command exited with status {status:?}: {stderr}")]
    Command { status: Option<i32>, stderr: String },
    #[error("stats subscription unavailable: {0}")]
    SubscriptionUnavailable(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl EngineError {
    /// True when the engine reported that the container or image does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            EngineError::NotFound(_) => true,
            EngineError::Docker(bollard::errors::Error::DockerResponseServerError {
                status_code,
                ..
            }) => *status_code == 404,
            _ => false,
        }
    }
}
