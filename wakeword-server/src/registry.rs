/// Process-wide wake-word configuration
///
/// Holds the active keyword set and the shared one-shot model as one immutable
/// snapshot. Reconfiguration builds a complete new snapshot and publishes it by
/// swapping an `Arc`, so a scoring call already holding the old snapshot keeps
/// a consistent model until it finishes.

use crate::audio::AudioSample;
use crate::keywords::KeywordSet;
use crate::scorer::{ModelFactory, ScoreVector, ScorerError, WakeWordModel};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info};

/// One published configuration
pub struct ModelGeneration {
    generation: u64,
    keywords: KeywordSet,
    shared_model: Mutex<Box<dyn WakeWordModel>>,
}

impl ModelGeneration {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn keywords(&self) -> &KeywordSet {
        &self.keywords
    }
}

/// Registry of the current keyword set and model factory
pub struct WakeWordRegistry {
    factory: Arc<dyn ModelFactory>,
    current: RwLock<Arc<ModelGeneration>>,

    /// Held across build and publish so generations go out in order
    reconfiguring: Mutex<()>,
}

impl WakeWordRegistry {
    /// Build the initial generation; fails if the model cannot be loaded
    pub fn new(factory: Arc<dyn ModelFactory>, keywords: KeywordSet) -> Result<Self, ScorerError> {
        let initial = Self::build(factory.as_ref(), 0, keywords)?;

        Ok(Self {
            factory,
            current: RwLock::new(Arc::new(initial)),
            reconfiguring: Mutex::new(()),
        })
    }

    fn build(
        factory: &dyn ModelFactory,
        generation: u64,
        keywords: KeywordSet,
    ) -> Result<ModelGeneration, ScorerError> {
        let model = factory.create(&keywords)?;

        Ok(ModelGeneration {
            generation,
            keywords,
            shared_model: Mutex::new(model),
        })
    }

    /// The currently published generation
    pub fn snapshot(&self) -> Arc<ModelGeneration> {
        self.current.read().clone()
    }

    pub fn keywords(&self) -> KeywordSet {
        self.snapshot().keywords.clone()
    }

    /// Create a model instance owned by a single streaming session
    pub fn session_model(&self) -> Result<(KeywordSet, Box<dyn WakeWordModel>), ScorerError> {
        let snapshot = self.snapshot();
        let model = self.factory.create(&snapshot.keywords)?;

        debug!("Created session model for generation {}", snapshot.generation);
        Ok((snapshot.keywords.clone(), model))
    }

    /// Replace the keyword set for all future sessions
    ///
    /// The new model is loaded before anything is published; on failure the
    /// previous generation stays active. Concurrent calls are serialized, so
    /// the last one to finish is the one left published.
    pub fn reconfigure(&self, keywords: KeywordSet) -> Result<Arc<ModelGeneration>, ScorerError> {
        let _guard = self.reconfiguring.lock();

        let generation = self.snapshot().generation + 1;
        let next = Arc::new(Self::build(self.factory.as_ref(), generation, keywords)?);

        *self.current.write() = Arc::clone(&next);

        info!(
            "Wake words reconfigured (generation {}): {:?}",
            generation,
            next.keywords.as_slice()
        );
        Ok(next)
    }

    /// Score one window on the shared model, serialized by its lock
    pub fn score_once(&self, window: &[AudioSample]) -> Result<(KeywordSet, ScoreVector), ScorerError> {
        let snapshot = self.snapshot();
        let scores = snapshot.shared_model.lock().predict(window)?;

        Ok((snapshot.keywords.clone(), scores))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::{EnergyModelFactory, MockModelFactory, MockWakeWordModel};

    fn registry() -> WakeWordRegistry {
        WakeWordRegistry::new(Arc::new(EnergyModelFactory), KeywordSet::default()).unwrap()
    }

    #[test]
    fn test_initial_generation() {
        let registry = registry();
        let snapshot = registry.snapshot();

        assert_eq!(snapshot.generation(), 0);
        assert_eq!(snapshot.keywords(), &KeywordSet::default());
    }

    #[test]
    fn test_reconfigure_publishes_new_keywords() {
        let registry = registry();
        let alexa = KeywordSet::new(["alexa"]).unwrap();

        let published = registry.reconfigure(alexa.clone()).unwrap();

        assert_eq!(published.generation(), 1);
        assert_eq!(registry.keywords(), alexa);
    }

    #[test]
    fn test_old_snapshot_survives_reconfigure() {
        let registry = registry();
        let before = registry.snapshot();

        registry.reconfigure(KeywordSet::new(["alexa"]).unwrap()).unwrap();

        assert_eq!(before.keywords(), &KeywordSet::default());
        assert_eq!(registry.snapshot().keywords().len(), 1);
    }

    #[test]
    fn test_failed_reconfigure_keeps_previous_generation() {
        let mut factory = MockModelFactory::new();
        let mut calls = 0;
        factory.expect_create().returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok(Box::new(MockWakeWordModel::new()))
            } else {
                Err(ScorerError::ModelUnavailable("weights missing".to_string()))
            }
        });

        let registry = WakeWordRegistry::new(Arc::new(factory), KeywordSet::default()).unwrap();
        let result = registry.reconfigure(KeywordSet::new(["alexa"]).unwrap());

        assert!(matches!(result, Err(ScorerError::ModelUnavailable(_))));
        assert_eq!(registry.keywords(), KeywordSet::default());
        assert_eq!(registry.snapshot().generation(), 0);
    }

    #[test]
    fn test_session_models_bind_current_keywords() {
        let registry = registry();
        registry.reconfigure(KeywordSet::new(["computer"]).unwrap()).unwrap();

        let (keywords, mut model) = registry.session_model().unwrap();
        let scores = model.predict(&vec![0.0; 1280]).unwrap();

        assert_eq!(keywords.as_slice(), &["computer".to_string()]);
        assert_eq!(scores.keys().collect::<Vec<_>>(), vec!["computer"]);
    }

    #[test]
    fn test_score_once_uses_shared_model() {
        let mut factory = MockModelFactory::new();
        factory.expect_create().times(1).returning(|_| {
            let mut model = MockWakeWordModel::new();
            model.expect_predict().times(2).returning(|_| {
                let mut scores = ScoreVector::new();
                scores.insert("alexa".to_string(), 0.7);
                Ok(scores)
            });
            Ok(Box::new(model))
        });

        let registry = WakeWordRegistry::new(Arc::new(factory), KeywordSet::new(["alexa"]).unwrap()).unwrap();

        for _ in 0..2 {
            let (_, scores) = registry.score_once(&[0.1; 1280]).unwrap();
            assert_eq!(scores.get("alexa"), Some(&0.7));
        }
    }

    #[test]
    fn test_failed_reconfigure_does_not_consume_generation() {
        let mut factory = MockModelFactory::new();
        let mut calls = 0;
        factory.expect_create().returning(move |_| {
            calls += 1;
            if calls == 2 {
                Err(ScorerError::ModelUnavailable("weights missing".to_string()))
            } else {
                Ok(Box::new(MockWakeWordModel::new()))
            }
        });

        let registry = WakeWordRegistry::new(Arc::new(factory), KeywordSet::default()).unwrap();
        assert!(registry.reconfigure(KeywordSet::new(["alexa"]).unwrap()).is_err());

        let published = registry.reconfigure(KeywordSet::new(["computer"]).unwrap()).unwrap();
        assert_eq!(published.generation(), 1);
    }

    #[test]
    fn test_concurrent_reconfigure_publishes_latest_generation() {
        let registry = registry();

        let published: Vec<Arc<ModelGeneration>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let registry = &registry;
                    scope.spawn(move || {
                        registry
                            .reconfigure(KeywordSet::new([format!("word_{i}")]).unwrap())
                            .unwrap()
                    })
                })
                .collect();

            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut generations: Vec<u64> = published.iter().map(|g| g.generation()).collect();
        generations.sort_unstable();
        assert_eq!(generations, (1..=8).collect::<Vec<_>>());

        let newest = published.iter().find(|g| g.generation() == 8).unwrap();
        let current = registry.snapshot();
        assert_eq!(current.generation(), 8);
        assert_eq!(current.keywords(), newest.keywords());
    }
}
