//! Offline training pipeline.
//!
//! Dataset rows pass through one shared normalization cache, feed both
//! builders, and land on disk as the two model documents the query layer
//! reads. Everything runs to completion in a single batch.

use std::path::Path;

use anyhow::Result;
use tracing::info;

use chord_model::{
    build_markov_model, extract_patterns, BuildParams, ChordNormalizer, ExportParams,
    ExtractParams, Progression,
};

use crate::dataset::{load_dataset, DatasetOptions};
use crate::store::ModelStore;

/// Everything the training pipeline needs beyond the dataset itself.
#[derive(Debug, Clone, Default)]
pub struct TrainParams {
    pub dataset: DatasetOptions,
    pub build: BuildParams,
    pub extract: ExtractParams,
    pub export: ExportParams,
}

/// What a training run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainSummary {
    pub progressions: usize,
    pub genres: Vec<String>,
    pub order1_transitions: usize,
    pub patterns: usize,
}

/// Normalize every chord token through one shared cache, so repeated raw
/// spellings across the dataset parse once.
pub fn normalize_progressions(progressions: Vec<Progression>) -> Vec<Progression> {
    let mut normalizer = ChordNormalizer::new();
    progressions
        .into_iter()
        .map(|prog| Progression {
            chords: prog.chords.iter().map(|c| normalizer.simple(c)).collect(),
            genre: prog.genre,
        })
        .collect()
}

/// Run the full pipeline and persist both models into `out_dir`.
pub fn train_and_save(
    dataset_path: &Path,
    out_dir: &Path,
    params: &TrainParams,
) -> Result<TrainSummary> {
    let raw = load_dataset(dataset_path, &params.dataset)?;
    let progressions = normalize_progressions(raw);

    let model = build_markov_model(&progressions, &params.build);
    let miner = extract_patterns(&progressions, &params.extract);

    let store = ModelStore::new(out_dir);
    store.save_markov(&model, &params.export)?;
    store.save_patterns(&miner)?;

    let genres = model.available_genres();
    for genre in &genres {
        info!(
            genre = genre.as_str(),
            progressions = model.genre_totals.get(genre).copied().unwrap_or(0),
            transitions = model.transitions[genre]
                .values()
                .map(|dist| dist.len())
                .sum::<usize>(),
            patterns = miner
                .patterns
                .get(genre)
                .map(|by_length| by_length.values().map(|v| v.len()).sum::<usize>())
                .unwrap_or(0),
            "genre trained"
        );
    }

    let summary = TrainSummary {
        progressions: progressions.len(),
        order1_transitions: model
            .transitions
            .values()
            .flat_map(|genre| genre.values())
            .map(|dist| dist.len())
            .sum(),
        patterns: miner
            .patterns
            .values()
            .flat_map(|genre| genre.values())
            .map(|v| v.len())
            .sum(),
        genres,
    };

    info!(
        progressions = summary.progressions,
        genres = summary.genres.len(),
        out_dir = %out_dir.display(),
        "training complete"
    );
    Ok(summary)
}
