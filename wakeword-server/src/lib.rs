/// Wake-word detection server library
///
/// Streams 16kHz PCM audio over WebSocket into per-connection sliding windows,
/// scores the newest 80ms chunk against the configured wake words, and exposes
/// an HTTP control plane for health, keyword configuration and one-shot detection.

pub mod api;
pub mod audio;
pub mod audio_buffer;
pub mod config;
pub mod error;
pub mod keywords;
pub mod registry;
pub mod scorer;
pub mod session;

// Re-export main types
pub use api::AppState;
pub use audio::{decode_pcm16, encode_pcm16, AudioSample, DecodeError, CHUNK_SIZE, SAMPLE_RATE};
pub use audio_buffer::{BufferError, SlidingAudioBuffer, WINDOW_CAPACITY};
pub use config::{ConfigError, ServiceConfig};
pub use error::ServiceError;
pub use keywords::{KeywordError, KeywordSet};
pub use registry::{ModelGeneration, WakeWordRegistry};
pub use scorer::{EnergyModel, EnergyModelFactory, ModelFactory, ScoreVector, ScorerError, WakeWordModel};
pub use session::{
    DetectionEvent, DetectionSession, ServerMessage, SessionConfig, SessionState, SessionStats,
    StatusReport, DETECTION_THRESHOLD,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
