//! chord-trainer - builds the recommendation models from a progression dataset.
//!
//! Reads a CSV of chord progressions with genre labels, trains the
//! multi-order Markov model and the pattern store, and writes both as JSON
//! into the directory the query layer reads.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use chord_recommend::train::{train_and_save, TrainParams};

#[derive(Parser)]
#[command(name = "chord-trainer")]
#[command(about = "Train chord progression recommendation models")]
#[command(version)]
struct Cli {
    /// Dataset CSV with progression and genre columns
    dataset: PathBuf,

    /// Directory the trained model files are written to
    #[arg(short, long, default_value = "models")]
    out_dir: PathBuf,

    /// Progression-string column name
    #[arg(long, default_value = "chords")]
    chord_column: String,

    /// Genre-label column name
    #[arg(long, default_value = "main_genre")]
    genre_column: String,

    /// Minimum progressions a genre needs to be modeled
    #[arg(long, default_value_t = 1000)]
    min_genre_size: usize,

    /// Minimum occurrences for a two-chord context to be kept
    #[arg(long, default_value_t = 3)]
    min_bigram_count: u64,

    /// Minimum occurrences for a three-chord context to be kept
    #[arg(long, default_value_t = 2)]
    min_trigram_count: u64,

    /// Patterns kept per genre and length
    #[arg(long, default_value_t = 100)]
    top_patterns: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let mut params = TrainParams::default();
    params.dataset.chord_column = cli.chord_column;
    params.dataset.genre_column = cli.genre_column;
    params.build.min_genre_size = cli.min_genre_size;
    params.build.min_bigram_count = cli.min_bigram_count;
    params.build.min_trigram_count = cli.min_trigram_count;
    params.extract.min_genre_size = cli.min_genre_size;
    params.extract.top_n_per_length = cli.top_patterns;

    let summary = train_and_save(&cli.dataset, &cli.out_dir, &params)?;
    println!(
        "trained {} genres from {} progressions ({} order-1 transitions, {} patterns) into {}",
        summary.genres.len(),
        summary.progressions,
        summary.order1_transitions,
        summary.patterns,
        cli.out_dir.display()
    );
    Ok(())
}
