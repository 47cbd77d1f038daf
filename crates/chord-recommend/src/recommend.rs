//! Composed recommendation engine over the trained models.
//!
//! `ChordRecommender` joins the Markov model and the pattern store behind
//! one query surface, attaching friction scores and a coarse category to
//! every suggestion. Construct one per model directory and share it; the
//! models load once on first use and are read-only afterwards.

use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Result;
use once_cell::sync::OnceCell;
use serde::Serialize;

use chord_model::{ChordNormalizer, ChordPattern, MarkovModel, PatternMiner, RecommendParams};

use crate::store::ModelStore;

/// How a suggested chord sits relative to the genre's habits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Common,
    Interesting,
    Adventurous,
}

impl Category {
    /// Classify a recommendation from its transition probability and the
    /// chord's friction within the genre.
    pub fn classify(probability: f64, friction: f64) -> Self {
        if probability > 0.05 && friction < 0.3 {
            Category::Common
        } else if probability < 0.01 || friction > 0.7 {
            Category::Adventurous
        } else {
            Category::Interesting
        }
    }

    /// Friction-only classification, used for per-chord statistics where no
    /// transition probability applies.
    pub fn from_friction(friction: f64) -> Self {
        if friction < 0.3 {
            Category::Common
        } else if friction > 0.7 {
            Category::Adventurous
        } else {
            Category::Interesting
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Common => "common",
            Category::Interesting => "interesting",
            Category::Adventurous => "adventurous",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A next-chord suggestion; derived per query, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub chord: String,
    pub probability: f64,
    pub category: Category,
    pub friction_score: f64,
    /// Reconstructed occurrence count, display only.
    pub count: u64,
}

/// Frequency and friction of a single chord in a genre. Zero-valued (with
/// maximum friction) when the chord or genre is unknown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChordStatsReport {
    pub chord: String,
    pub genre: String,
    pub frequency: f64,
    pub friction_score: f64,
    pub category: Category,
}

struct LoadedModels {
    markov: MarkovModel,
    patterns: Option<PatternMiner>,
}

/// Genre-aware chord recommendation engine.
pub struct ChordRecommender {
    store: ModelStore,
    models: OnceCell<LoadedModels>,
    normalizer: Mutex<ChordNormalizer>,
    normalize_queries: bool,
}

impl ChordRecommender {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        ChordRecommender {
            store: ModelStore::new(model_dir),
            models: OnceCell::new(),
            normalizer: Mutex::new(ChordNormalizer::new()),
            normalize_queries: true,
        }
    }

    /// Skip query normalization; for callers that already hold canonical
    /// chord names.
    pub fn with_raw_queries(mut self) -> Self {
        self.normalize_queries = false;
        self
    }

    /// Force the one-time model load now instead of on first query.
    /// Idempotent: later calls (and queries) reuse the loaded state.
    pub fn load(&self) -> Result<()> {
        self.models().map(|_| ())
    }

    pub fn is_loaded(&self) -> bool {
        self.models.get().is_some()
    }

    fn models(&self) -> Result<&LoadedModels> {
        self.models.get_or_try_init(|| {
            let markov = self.store.load_markov()?;
            let patterns = self.store.load_patterns()?;
            Ok(LoadedModels { markov, patterns })
        })
    }

    fn canonical(&self, chord: &str) -> Result<String> {
        if !self.normalize_queries {
            return Ok(chord.to_string());
        }
        let mut normalizer = self
            .normalizer
            .lock()
            .map_err(|_| anyhow::anyhow!("normalizer mutex poisoned"))?;
        Ok(normalizer.simple(chord))
    }

    /// Next-chord recommendations, categorized and capped at `top_n`.
    pub fn recommendations(
        &self,
        chord: &str,
        genre: &str,
        top_n: usize,
    ) -> Result<Vec<Recommendation>> {
        let models = self.models()?;
        let chord = self.canonical(chord)?;

        // Overfetch so categorization has candidates to spare.
        let raw = models.markov.recommendations(
            &chord,
            genre,
            &[],
            &RecommendParams {
                top_n: top_n * 2,
                ..Default::default()
            },
        );

        let mut recommendations: Vec<Recommendation> = raw
            .into_iter()
            .map(|stats| {
                let friction = models.markov.friction_score(&stats.to_chord, genre);
                Recommendation {
                    chord: stats.to_chord,
                    probability: stats.probability,
                    category: Category::classify(stats.probability, friction),
                    friction_score: friction,
                    count: stats.count,
                }
            })
            .collect();
        recommendations.truncate(top_n);
        Ok(recommendations)
    }

    /// Patterns beginning with `prefix`, longest considered `max_length`.
    /// Empty when patterns were not trained alongside the Markov model.
    pub fn find_patterns(
        &self,
        prefix: &[String],
        genre: &str,
        max_length: usize,
    ) -> Result<Vec<ChordPattern>> {
        let models = self.models()?;
        let Some(patterns) = &models.patterns else {
            return Ok(Vec::new());
        };

        let prefix: Vec<String> = prefix
            .iter()
            .map(|chord| self.canonical(chord))
            .collect::<Result<_>>()?;
        Ok(patterns.find_matching(&prefix, genre, max_length))
    }

    /// Frequency, friction, and category for one chord in one genre.
    pub fn chord_stats(&self, chord: &str, genre: &str) -> Result<ChordStatsReport> {
        let models = self.models()?;
        let chord = self.canonical(chord)?;

        let frequency = models.markov.chord_frequency(&chord, genre);
        let friction_score = models.markov.friction_score(&chord, genre);
        Ok(ChordStatsReport {
            chord,
            genre: genre.to_string(),
            frequency,
            friction_score,
            category: Category::from_friction(friction_score),
        })
    }

    /// Genres the Markov model was trained on.
    pub fn available_genres(&self) -> Result<Vec<String>> {
        Ok(self.models()?.markov.available_genres())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_probability_low_friction_is_common() {
        assert_eq!(Category::classify(0.06, 0.2), Category::Common);
    }

    #[test]
    fn low_probability_or_high_friction_is_adventurous() {
        assert_eq!(Category::classify(0.005, 0.2), Category::Adventurous);
        assert_eq!(Category::classify(0.04, 0.8), Category::Adventurous);
    }

    #[test]
    fn middle_ground_is_interesting() {
        assert_eq!(Category::classify(0.03, 0.5), Category::Interesting);
        // At the common boundary but too much friction
        assert_eq!(Category::classify(0.06, 0.3), Category::Interesting);
    }

    #[test]
    fn boundaries_are_exclusive() {
        // Exactly at the thresholds falls through to interesting.
        assert_eq!(Category::classify(0.05, 0.2), Category::Interesting);
        assert_eq!(Category::classify(0.04, 0.7), Category::Interesting);
        assert_eq!(Category::classify(0.01, 0.5), Category::Interesting);
    }

    #[test]
    fn friction_only_classification() {
        assert_eq!(Category::from_friction(0.1), Category::Common);
        assert_eq!(Category::from_friction(0.5), Category::Interesting);
        assert_eq!(Category::from_friction(0.9), Category::Adventurous);
        assert_eq!(Category::from_friction(0.3), Category::Interesting);
        assert_eq!(Category::from_friction(0.7), Category::Interesting);
    }

    #[test]
    fn category_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Category::Adventurous).unwrap(),
            "\"adventurous\""
        );
        assert_eq!(Category::Common.as_str(), "common");
    }
}
