//! Genre-aware chord progression modeling.
//!
//! This crate holds the pure model layer of the recommender: chord notation
//! normalization, multi-order Markov transition tables with backoff queries,
//! frequent n-gram pattern mining, and the serialization codecs for the
//! persisted model documents. It does no IO; persistence and the composed
//! query engine live in `chord-recommend`.

pub mod codec;
pub mod markov;
pub mod normalize;
pub mod patterns;
pub mod progression;

pub use codec::{
    decode_markov, decode_patterns, encode_markov, encode_patterns, ExportParams, MarkovModelDoc,
    PatternDoc, PatternsDoc,
};
pub use markov::{
    build_markov_model, BuildParams, MarkovModel, RecommendParams, TransitionStats, CONTEXT_SEP,
};
pub use normalize::{normalize_chord, normalize_chord_simple, ChordNormalizer, ChordNotation};
pub use patterns::{extract_patterns, ChordPattern, ExtractParams, PatternMiner};
pub use progression::{parse_progression, Progression};

/// Errors from decoding persisted model documents.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("context key `{key}` holds {found} chords, expected {expected}")]
    ContextArity {
        key: String,
        expected: usize,
        found: usize,
    },
}

pub type Result<T> = std::result::Result<T, ModelError>;
