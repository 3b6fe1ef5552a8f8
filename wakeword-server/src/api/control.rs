//! Control-plane endpoints: health, wake-word configuration, one-shot detection

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ApiError, AppState};
use crate::audio::{decode_pcm16, AudioSample, CHUNK_SIZE};
use crate::error::ServiceError;
use crate::keywords::KeywordSet;
use crate::scorer::over_threshold;

/// Service identity reported by `/health`
pub const SERVICE_NAME: &str = "openwakeword";

/// Build control-plane router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(health))
        .route("/wake-words", get(list_wake_words).post(set_wake_words))
        .route("/detect", post(detect))
        .with_state(state)
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub wake_words: KeywordSet,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        wake_words: state.registry.keywords(),
    })
}

/// Wake-word list response
#[derive(Debug, Serialize)]
pub struct WakeWordsResponse {
    pub wake_words: KeywordSet,
}

async fn list_wake_words(State(state): State<Arc<AppState>>) -> Json<WakeWordsResponse> {
    Json(WakeWordsResponse {
        wake_words: state.registry.keywords(),
    })
}

/// Wake-word update request
#[derive(Debug, Deserialize)]
pub struct SetWakeWordsRequest {
    #[serde(default)]
    pub wake_words: Option<Vec<String>>,
}

/// Wake-word update response
#[derive(Debug, Serialize)]
pub struct SetWakeWordsResponse {
    pub status: &'static str,
    pub wake_words: KeywordSet,
}

/// Replace the wake-word set for all future sessions
///
/// Validation and model loading both happen before the new set is published,
/// so a rejected request leaves the active configuration untouched.
async fn set_wake_words(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<SetWakeWordsResponse>, ApiError> {
    let request: SetWakeWordsRequest = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::Validation(format!("wake_words array required: {e}")))?;

    let words = request
        .wake_words
        .ok_or_else(|| ServiceError::Validation("wake_words array required".to_string()))?;

    let keywords = KeywordSet::new(words).map_err(ServiceError::from)?;
    let published = state
        .registry
        .reconfigure(keywords)
        .map_err(ServiceError::from)?;

    Ok(Json(SetWakeWordsResponse {
        status: "updated",
        wake_words: published.keywords().clone(),
    }))
}

/// Keyword over threshold in a one-shot detection
#[derive(Debug, Serialize)]
pub struct DetectedWord {
    pub word: String,
    pub confidence: f32,
}

/// One-shot detection response
#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub detected: bool,
    pub wake_words: Vec<DetectedWord>,
    pub all_predictions: IndexMap<String, f32>,
}

/// Score an uploaded PCM16 clip without opening a stream
///
/// Expects multipart/form-data with an `audio` field holding raw
/// little-endian 16-bit PCM at 16kHz. Only the last `CHUNK_SIZE` samples
/// (80 ms) of the clip are scored, so a wake word spoken earlier in a longer
/// clip is not detected; clients should trim uploads to end on the keyword.
async fn detect(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DetectResponse>, ApiError> {
    let mut multipart = multipart
        .map_err(|e| ApiError::BadRequest(format!("multipart/form-data body required: {e}")))?;

    let audio = read_audio_field(&mut multipart).await?;
    let samples = decode_pcm16(&audio).map_err(ServiceError::from)?;
    let window = detection_window(&samples, CHUNK_SIZE);

    debug!(
        "One-shot detection on {} samples ({} scored)",
        samples.len(),
        window.len()
    );

    let (keywords, predictions) = state
        .registry
        .score_once(&window)
        .map_err(ServiceError::from)?;

    let wake_words: Vec<DetectedWord> = over_threshold(&keywords, &predictions, state.config.threshold)
        .into_iter()
        .map(|(word, confidence)| DetectedWord { word, confidence })
        .collect();

    if !wake_words.is_empty() {
        info!("One-shot detection fired for {} wake word(s)", wake_words.len());
    }

    Ok(Json(DetectResponse {
        detected: !wake_words.is_empty(),
        wake_words,
        all_predictions: predictions,
    }))
}

async fn read_audio_field(multipart: &mut Multipart) -> Result<Bytes, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("malformed multipart body", e))?
    {
        if field.name() != Some("audio") {
            continue;
        }

        if field.file_name() == Some("") {
            return Err(ApiError::BadRequest("No file selected".to_string()));
        }

        return field
            .bytes()
            .await
            .map_err(|e| multipart_error("failed to read audio", e));
    }

    Err(ApiError::BadRequest("No audio file provided".to_string()))
}

fn multipart_error(context: &str, err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(format!("{context}: {err}"))
    }
}

/// The most recent `size` samples, left-padded with silence when shorter
pub fn detection_window(samples: &[AudioSample], size: usize) -> Vec<AudioSample> {
    if samples.len() >= size {
        return samples[samples.len() - size..].to_vec();
    }

    let mut window = vec![0.0; size - samples.len()];
    window.extend_from_slice(samples);
    window
}
