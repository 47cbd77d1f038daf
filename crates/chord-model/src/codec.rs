//! Serialization documents for the trained models.
//!
//! Entity types stay serde-free; the mirror types here define the persisted
//! JSON shape and the export-time compaction applied to higher-order tables.
//! Order-1 transitions travel verbatim — they are bounded by the chord
//! vocabulary — while order-2/3 tables are filtered, rounded, and capped per
//! context to keep the payload small for low-resource callers.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::markov::{MarkovModel, TransitionTable, CONTEXT_SEP};
use crate::patterns::{ChordPattern, PatternMiner};
use crate::ModelError;

/// Compaction thresholds applied to order-2/3 tables at encode time.
#[derive(Debug, Clone)]
pub struct ExportParams {
    /// Keep at most this many transitions per higher-order context.
    pub max_per_context: usize,
    /// Decimal places kept for higher-order probabilities.
    pub probability_precision: u32,
    /// Higher-order transitions below this probability are dropped.
    pub min_export_probability: f64,
}

impl Default for ExportParams {
    fn default() -> Self {
        ExportParams {
            max_per_context: 15,
            probability_precision: 4,
            min_export_probability: 0.005,
        }
    }
}

/// Persisted form of [`MarkovModel`]. Context keys for the bigram and
/// trigram sections join chords with a literal `|`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkovModelDoc {
    pub transitions: TransitionTable,
    #[serde(default)]
    pub bigram_transitions: TransitionTable,
    #[serde(default)]
    pub trigram_transitions: TransitionTable,
    pub chord_frequencies: BTreeMap<String, BTreeMap<String, f64>>,
    #[serde(default)]
    pub genre_totals: BTreeMap<String, u64>,
}

/// Persisted form of one mined pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternDoc {
    pub chords: Vec<String>,
    pub count: u64,
    pub frequency: f64,
    pub genre: String,
}

/// Persisted pattern store: genre → pattern length (as a string, since JSON
/// object keys are strings) → patterns.
pub type PatternsDoc = BTreeMap<String, BTreeMap<String, Vec<PatternDoc>>>;

fn round_to(p: f64, precision: u32) -> f64 {
    let scale = 10f64.powi(precision as i32);
    (p * scale).round() / scale
}

/// Compact one higher-order table for export.
fn prune_table(table: &TransitionTable, params: &ExportParams) -> TransitionTable {
    let mut out = TransitionTable::new();
    for (genre, contexts) in table {
        let mut genre_out = BTreeMap::new();
        for (key, dist) in contexts {
            let mut kept: Vec<(String, f64)> = dist
                .iter()
                .filter(|(_, &p)| p >= params.min_export_probability)
                .map(|(chord, &p)| (chord.clone(), round_to(p, params.probability_precision)))
                .collect();
            if kept.is_empty() {
                continue;
            }
            if kept.len() > params.max_per_context {
                kept.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
                kept.truncate(params.max_per_context);
            }
            genre_out.insert(key.clone(), kept.into_iter().collect());
        }
        out.insert(genre.clone(), genre_out);
    }
    out
}

/// Build the persisted document for a trained Markov model.
pub fn encode_markov(model: &MarkovModel, params: &ExportParams) -> MarkovModelDoc {
    MarkovModelDoc {
        transitions: model.transitions.clone(),
        bigram_transitions: prune_table(&model.bigram_transitions, params),
        trigram_transitions: prune_table(&model.trigram_transitions, params),
        chord_frequencies: model.chord_frequencies.clone(),
        genre_totals: model.genre_totals.clone(),
    }
}

/// Rebuild the in-memory model from its persisted document.
///
/// Absent bigram/trigram sections decode as empty tables. Higher-order
/// context keys are checked for the expected chord count.
pub fn decode_markov(doc: MarkovModelDoc) -> Result<MarkovModel, ModelError> {
    check_context_arity(&doc.bigram_transitions, 2)?;
    check_context_arity(&doc.trigram_transitions, 3)?;

    Ok(MarkovModel {
        transitions: doc.transitions,
        bigram_transitions: doc.bigram_transitions,
        trigram_transitions: doc.trigram_transitions,
        chord_frequencies: doc.chord_frequencies,
        genre_totals: doc.genre_totals,
    })
}

fn check_context_arity(table: &TransitionTable, expected: usize) -> Result<(), ModelError> {
    for contexts in table.values() {
        for key in contexts.keys() {
            let found = key.split(CONTEXT_SEP).count();
            if found != expected {
                return Err(ModelError::ContextArity {
                    key: key.clone(),
                    expected,
                    found,
                });
            }
        }
    }
    Ok(())
}

/// Build the persisted document for a pattern store.
pub fn encode_patterns(miner: &PatternMiner) -> PatternsDoc {
    let mut doc = PatternsDoc::new();
    for (genre, by_length) in &miner.patterns {
        let genre_doc = doc.entry(genre.clone()).or_default();
        for (length, patterns) in by_length {
            let entries = patterns
                .iter()
                .map(|p| PatternDoc {
                    chords: p.chords.clone(),
                    count: p.count,
                    frequency: p.frequency,
                    genre: p.genre.clone(),
                })
                .collect();
            genre_doc.insert(length.to_string(), entries);
        }
    }
    doc
}

/// Rebuild the pattern store from its persisted document. Each pattern is
/// refiled by its own genre and length, so the outer keys are advisory.
pub fn decode_patterns(doc: PatternsDoc) -> PatternMiner {
    let mut miner = PatternMiner::new();
    for by_length in doc.into_values() {
        for patterns in by_length.into_values() {
            for p in patterns {
                miner.add_pattern(ChordPattern {
                    chords: p.chords,
                    count: p.count,
                    frequency: p.frequency,
                    genre: p.genre,
                });
            }
        }
    }
    miner
}
