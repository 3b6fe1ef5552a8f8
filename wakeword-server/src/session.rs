/// Streaming detection session
///
/// One session per connection. Owns its sliding window and its own model
/// instance; turns each inbound frame into the ordered list of messages to
/// send back (detections first, then the status report).

use crate::audio::{decode_pcm16, CHUNK_SIZE};
use crate::audio_buffer::{SlidingAudioBuffer, WINDOW_CAPACITY};
use crate::error::ServiceError;
use crate::keywords::KeywordSet;
use crate::registry::WakeWordRegistry;
use crate::scorer::{over_threshold, ScoreVector, WakeWordModel};
use serde::Serialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, trace, warn};

/// Default confidence a keyword must exceed to fire
pub const DETECTION_THRESHOLD: f32 = 0.5;

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No model instance acquired yet
    AwaitingModel,

    /// Scoring inbound frames
    Streaming,

    /// Connection ended; resources released
    Closed,
}

/// A keyword that crossed the threshold in one scoring round
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionEvent {
    pub word: String,
    pub confidence: f32,

    /// Seconds since the Unix epoch
    pub timestamp: f64,
}

/// Per-round observability report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub buffer_size: usize,
    pub predictions: ScoreVector,
}

/// Message sent to the streaming peer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    WakeWordDetected(Vec<DetectionEvent>),
    Status(StatusReport),
    Error(String),
}

impl ServerMessage {
    pub fn error(err: &ServiceError) -> Self {
        Self::Error(err.tagged())
    }
}

/// Session tuning
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Scores must be strictly greater than this to fire
    pub threshold: f32,

    /// Emit a status message after every scored round
    pub emit_status: bool,

    /// Samples scored per round
    pub chunk_size: usize,

    /// Samples retained in the sliding window
    pub window_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            threshold: DETECTION_THRESHOLD,
            emit_status: true,
            chunk_size: CHUNK_SIZE,
            window_capacity: WINDOW_CAPACITY,
        }
    }
}

/// Session counters
#[derive(Debug, Clone)]
pub struct SessionStats {
    pub state: SessionState,
    pub frames_processed: u64,
    pub rounds_scored: u64,
    pub wake_words_detected: u64,
    pub buffer_size: usize,
}

pub struct DetectionSession {
    id: u64,
    registry: Arc<WakeWordRegistry>,
    config: SessionConfig,
    state: SessionState,
    buffer: Option<SlidingAudioBuffer>,
    model: Option<Box<dyn WakeWordModel>>,
    keywords: Option<KeywordSet>,
    frames_processed: u64,
    rounds_scored: u64,
    wake_words_detected: u64,
}

impl DetectionSession {
    /// Create a session in `AwaitingModel`
    pub fn new(id: u64, registry: Arc<WakeWordRegistry>, config: SessionConfig) -> Self {
        let buffer = SlidingAudioBuffer::with_capacity(config.window_capacity);

        Self {
            id,
            registry,
            config,
            state: SessionState::AwaitingModel,
            buffer: Some(buffer),
            model: None,
            keywords: None,
            frames_processed: 0,
            rounds_scored: 0,
            wake_words_detected: 0,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Keyword set this session's model is bound to, once acquired
    pub fn keywords(&self) -> Option<&KeywordSet> {
        self.keywords.as_ref()
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.as_ref().map_or(0, SlidingAudioBuffer::len)
    }

    /// Whether the session still holds a window or a model
    pub fn holds_resources(&self) -> bool {
        self.buffer.is_some() || self.model.is_some()
    }

    /// Bind a model for the currently published keyword set
    pub fn acquire_model(&mut self) -> Result<(), ServiceError> {
        if self.state != SessionState::AwaitingModel {
            return Ok(());
        }

        let (keywords, model) = self.registry.session_model()?;

        info!(
            "Session {} streaming with wake words {:?}",
            self.id,
            keywords.as_slice()
        );

        self.keywords = Some(keywords);
        self.model = Some(model);
        self.state = SessionState::Streaming;
        Ok(())
    }

    /// Handle one binary frame and return the messages to send, in order
    pub fn handle_frame(&mut self, payload: &[u8]) -> Vec<ServerMessage> {
        match self.state {
            SessionState::Closed => return Vec::new(),
            SessionState::AwaitingModel => {
                if let Err(e) = self.acquire_model() {
                    warn!("Session {} dropped frame, model unavailable: {}", self.id, e);
                    return vec![ServerMessage::error(&e)];
                }
            }
            SessionState::Streaming => {}
        }

        self.frames_processed += 1;

        match self.process_frame(payload) {
            Ok(messages) => messages,
            Err(e) => {
                warn!("Session {} frame error: {}", self.id, e);
                vec![ServerMessage::error(&e)]
            }
        }
    }

    /// Text messages carry no audio and are rejected
    pub fn handle_text(&mut self, text: &str) -> Vec<ServerMessage> {
        if self.state == SessionState::Closed {
            return Vec::new();
        }

        debug!("Session {} rejected {}-byte text message", self.id, text.len());
        let err = ServiceError::Protocol("expected binary PCM16 audio frames".to_string());
        vec![ServerMessage::error(&err)]
    }

    fn process_frame(&mut self, payload: &[u8]) -> Result<Vec<ServerMessage>, ServiceError> {
        let samples = decode_pcm16(payload)?;

        let (Some(buffer), Some(model), Some(keywords)) =
            (self.buffer.as_mut(), self.model.as_mut(), self.keywords.as_ref())
        else {
            return Ok(Vec::new());
        };

        buffer.append(&samples);

        let chunk = match buffer.latest_chunk(self.config.chunk_size) {
            Ok(chunk) => chunk,
            Err(e) => {
                trace!("Session {} skipping round: {}", self.id, e);
                return Ok(Vec::new());
            }
        };

        let predictions = model.predict(&chunk)?;
        self.rounds_scored += 1;

        let mut messages = Vec::with_capacity(2);

        let fired = over_threshold(keywords, &predictions, self.config.threshold);
        if !fired.is_empty() {
            let timestamp = Self::current_timestamp_secs();
            let events: Vec<DetectionEvent> = fired
                .into_iter()
                .map(|(word, confidence)| DetectionEvent {
                    word,
                    confidence,
                    timestamp,
                })
                .collect();

            for event in &events {
                info!(
                    "Session {}: wake word '{}' detected, confidence={:.2}",
                    self.id, event.word, event.confidence
                );
            }

            self.wake_words_detected += events.len() as u64;
            messages.push(ServerMessage::WakeWordDetected(events));
        }

        if self.config.emit_status {
            messages.push(ServerMessage::Status(StatusReport {
                buffer_size: buffer.len(),
                predictions,
            }));
        }

        Ok(messages)
    }

    /// Release the window and model; further frames are ignored
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }

        self.state = SessionState::Closed;
        self.buffer = None;
        self.model = None;

        info!(
            "Session {} closed after {} frames, {} rounds, {} detections",
            self.id, self.frames_processed, self.rounds_scored, self.wake_words_detected
        );
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            state: self.state,
            frames_processed: self.frames_processed,
            rounds_scored: self.rounds_scored,
            wake_words_detected: self.wake_words_detected,
            buffer_size: self.buffer_len(),
        }
    }

    fn current_timestamp_secs() -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default()
    }
}

impl Drop for DetectionSession {
    fn drop(&mut self) {
        self.close();
    }
}
