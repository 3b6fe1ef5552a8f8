/// Wake-word scoring
///
/// A model maps a window of normalized samples to one confidence score per
/// keyword. Model handles are not shareable across threads mid-call, so
/// `predict` takes `&mut self`: the streaming path gives every session its own
/// instance and the one-shot path serializes access behind a lock.

use crate::audio::AudioSample;
use crate::keywords::KeywordSet;
use indexmap::IndexMap;
use thiserror::Error;
use tracing::debug;

/// Per-keyword confidence (0.0 - 1.0), in keyword-set order
pub type ScoreVector = IndexMap<String, f32>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScorerError {
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

/// A loaded wake-word model bound to one keyword set
#[cfg_attr(test, mockall::automock)]
pub trait WakeWordModel: Send {
    /// Score one window. Deterministic for identical model state and input.
    fn predict(&mut self, window: &[AudioSample]) -> Result<ScoreVector, ScorerError>;
}

/// Builds model instances for a keyword set
#[cfg_attr(test, mockall::automock)]
pub trait ModelFactory: Send + Sync {
    fn create(&self, keywords: &KeywordSet) -> Result<Box<dyn WakeWordModel>, ScorerError>;
}

/// Energy-based placeholder model
///
/// NOTE: This stands in for a trained acoustic model. Scores rise with the
/// window's RMS energy, scaled by a fixed per-keyword sensitivity, so silence
/// never fires and loud input fires every keyword.
pub struct EnergyModel {
    sensitivities: Vec<(String, f32)>,
}

impl EnergyModel {
    /// RMS at which a keyword of unit sensitivity reaches full confidence
    const FULL_SCALE_RMS: f32 = 0.25;

    pub fn new(keywords: &KeywordSet) -> Self {
        let sensitivities = keywords
            .iter()
            .map(|word| (word.to_string(), Self::sensitivity(word)))
            .collect();

        Self { sensitivities }
    }

    /// Stable sensitivity in [0.5, 1.5) derived from the keyword text (FNV-1a)
    fn sensitivity(word: &str) -> f32 {
        let hash = word.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |acc, b| {
            (acc ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
        });

        0.5 + (hash % 1000) as f32 / 1000.0
    }

    fn rms(window: &[AudioSample]) -> f32 {
        let energy: f64 = window.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
        (energy / window.len() as f64).sqrt() as f32
    }
}

impl WakeWordModel for EnergyModel {
    fn predict(&mut self, window: &[AudioSample]) -> Result<ScoreVector, ScorerError> {
        if window.is_empty() {
            return Err(ScorerError::Inference("empty window".to_string()));
        }

        let level = Self::rms(window) / Self::FULL_SCALE_RMS;

        Ok(self
            .sensitivities
            .iter()
            .map(|(word, sensitivity)| (word.clone(), (level * sensitivity).clamp(0.0, 1.0)))
            .collect())
    }
}

/// Factory for [`EnergyModel`] instances
#[derive(Debug, Default, Clone, Copy)]
pub struct EnergyModelFactory;

impl ModelFactory for EnergyModelFactory {
    fn create(&self, keywords: &KeywordSet) -> Result<Box<dyn WakeWordModel>, ScorerError> {
        debug!("Loading energy model for {} keywords", keywords.len());
        Ok(Box::new(EnergyModel::new(keywords)))
    }
}

/// Configured keywords whose score strictly exceeds `threshold`, in keyword order
///
/// Scores for words outside `keywords` never fire.
pub fn over_threshold(keywords: &KeywordSet, scores: &ScoreVector, threshold: f32) -> Vec<(String, f32)> {
    keywords
        .iter()
        .filter_map(|word| scores.get(word).map(|score| (word.to_string(), *score)))
        .filter(|(_, score)| *score > threshold)
        .collect()
}
