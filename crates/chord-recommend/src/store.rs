//! Filesystem persistence for trained models.
//!
//! Two pretty-printed JSON documents live in the model directory: the
//! Markov model and the mined patterns. The Markov model is required at
//! query time; patterns are optional and their absence only disables
//! pattern matching.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use chord_model::codec;
use chord_model::{ExportParams, MarkovModel, MarkovModelDoc, PatternMiner, PatternsDoc};

pub const MARKOV_FILE: &str = "markov_model.json";
pub const PATTERNS_FILE: &str = "patterns.json";

/// Directory of persisted model documents.
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ModelStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn markov_path(&self) -> PathBuf {
        self.dir.join(MARKOV_FILE)
    }

    pub fn patterns_path(&self) -> PathBuf {
        self.dir.join(PATTERNS_FILE)
    }

    /// Persist a Markov model, compacting higher-order tables per `params`.
    pub fn save_markov(&self, model: &MarkovModel, params: &ExportParams) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating model directory {}", self.dir.display()))?;

        let doc = codec::encode_markov(model, params);
        let json = serde_json::to_string_pretty(&doc).context("serializing markov model")?;
        let path = self.markov_path();
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Load the Markov model. A missing file is fatal to the query path and
    /// the error says how to retrain.
    pub fn load_markov(&self) -> Result<MarkovModel> {
        let path = self.markov_path();
        if !path.exists() {
            anyhow::bail!(
                "markov model not found at {}; run `chord-trainer <dataset.csv> --out-dir {}` to train one",
                path.display(),
                self.dir.display()
            );
        }

        let json =
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        let doc: MarkovModelDoc =
            serde_json::from_str(&json).with_context(|| format!("decoding {}", path.display()))?;
        let model = codec::decode_markov(doc)
            .with_context(|| format!("validating {}", path.display()))?;

        info!(genres = model.available_genres().len(), "markov model loaded");
        Ok(model)
    }

    /// Persist mined patterns alongside the Markov model.
    pub fn save_patterns(&self, miner: &PatternMiner) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating model directory {}", self.dir.display()))?;

        let doc = codec::encode_patterns(miner);
        let json = serde_json::to_string_pretty(&doc).context("serializing patterns")?;
        let path = self.patterns_path();
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Load mined patterns; `None` when the file was never written.
    pub fn load_patterns(&self) -> Result<Option<PatternMiner>> {
        let path = self.patterns_path();
        if !path.exists() {
            warn!(path = %path.display(), "patterns not found, pattern matching disabled");
            return Ok(None);
        }

        let json =
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        let doc: PatternsDoc =
            serde_json::from_str(&json).with_context(|| format!("decoding {}", path.display()))?;

        let miner = codec::decode_patterns(doc);
        info!(genres = miner.available_genres().len(), "patterns loaded");
        Ok(Some(miner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chord_model::{build_markov_model, extract_patterns, BuildParams, ExtractParams, Progression};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn prog(chords: &[&str], genre: &str) -> Progression {
        Progression::new(chords.iter().map(|c| c.to_string()).collect(), genre)
    }

    fn sample_progressions() -> Vec<Progression> {
        vec![
            prog(&["C", "G", "Am", "F"], "pop"),
            prog(&["C", "G", "C"], "pop"),
            prog(&["C", "F", "C"], "pop"),
        ]
    }

    #[test]
    fn markov_round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path());

        let model = build_markov_model(
            &sample_progressions(),
            &BuildParams {
                min_genre_size: 1,
                min_bigram_count: 1,
                min_trigram_count: 1,
            },
        );
        store.save_markov(&model, &ExportParams::default()).unwrap();

        let loaded = store.load_markov().unwrap();
        assert_eq!(loaded.transitions, model.transitions);
        assert_eq!(loaded.genre_totals, model.genre_totals);
    }

    #[test]
    fn missing_markov_model_names_the_trainer() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path().join("empty"));

        let err = store.load_markov().unwrap_err();
        assert!(err.to_string().contains("chord-trainer"));
    }

    #[test]
    fn missing_patterns_are_not_an_error() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path());
        assert!(store.load_patterns().unwrap().is_none());
    }

    #[test]
    fn patterns_round_trip_through_disk() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path());

        let miner = extract_patterns(
            &sample_progressions(),
            &ExtractParams {
                pattern_lengths: vec![2, 3],
                min_genre_size: 1,
                top_n_per_length: 10,
            },
        );
        store.save_patterns(&miner).unwrap();

        let loaded = store.load_patterns().unwrap().unwrap();
        assert_eq!(loaded, miner);
    }
}
