/// Service-wide error taxonomy
///
/// Per-frame errors are reported to the peer and the session continues;
/// control-plane errors are surfaced to the caller without touching shared state.

use crate::audio::DecodeError;
use crate::audio_buffer::BufferError;
use crate::keywords::KeywordError;
use crate::scorer::ScorerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Decode(#[from] DecodeError),

    #[error("{0}")]
    InsufficientData(#[from] BufferError),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Scorer(#[from] ScorerError),

    #[error("{0}")]
    Protocol(String),

    #[error("connection terminated: {0}")]
    ConnectionTerminated(String),
}

impl ServiceError {
    /// Stable tag used as the prefix of streamed error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "DecodeError",
            Self::InsufficientData(_) => "InsufficientData",
            Self::Validation(_) => "ValidationError",
            Self::Scorer(ScorerError::ModelUnavailable(_)) => "ModelUnavailable",
            Self::Scorer(ScorerError::Inference(_)) => "InferenceError",
            Self::Protocol(_) => "ProtocolError",
            Self::ConnectionTerminated(_) => "ConnectionTerminated",
        }
    }

    /// Errors the caller can fix by changing its input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Decode(_) | Self::InsufficientData(_) | Self::Validation(_) | Self::Protocol(_)
        )
    }

    /// `"<Kind>: <message>"`, the payload of a streamed `error` message
    pub fn tagged(&self) -> String {
        format!("{}: {}", self.kind(), self)
    }
}

impl From<KeywordError> for ServiceError {
    fn from(err: KeywordError) -> Self {
        Self::Validation(err.to_string())
    }
}
