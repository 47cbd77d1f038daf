//! Genre-aware chord recommendation engine.
//!
//! Composes the trained models from `chord-model` behind a single query
//! surface: next-chord recommendations with friction-based categories,
//! pattern prefix search, and per-chord statistics. Also holds the model
//! persistence layer and the offline training pipeline driven by the
//! `chord-trainer` binary.

pub mod dataset;
pub mod recommend;
pub mod store;
pub mod train;

pub use dataset::{load_dataset, DatasetOptions};
pub use recommend::{Category, ChordRecommender, ChordStatsReport, Recommendation};
pub use store::ModelStore;
pub use train::{train_and_save, TrainParams, TrainSummary};
