//! Tabular dataset loading.
//!
//! Reads progression rows from a CSV source carrying a progression-string
//! column and a genre-label column. Rows that cannot contribute (unreadable
//! record, missing genre, no chord tokens) are skipped and counted, never
//! fatal to the batch.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use chord_model::{parse_progression, Progression};

/// Column names in the dataset source.
#[derive(Debug, Clone)]
pub struct DatasetOptions {
    pub chord_column: String,
    pub genre_column: String,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        DatasetOptions {
            chord_column: "chords".to_string(),
            genre_column: "main_genre".to_string(),
        }
    }
}

/// Load and tokenize a progression dataset.
pub fn load_dataset(path: &Path, options: &DatasetOptions) -> Result<Vec<Progression>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening dataset {}", path.display()))?;

    let headers = reader.headers().context("reading dataset headers")?.clone();
    let chord_idx = column_index(&headers, &options.chord_column)?;
    let genre_idx = column_index(&headers, &options.genre_column)?;

    let mut progressions = Vec::new();
    let mut skipped = 0usize;
    for (row, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                warn!(row, %err, "unreadable dataset row skipped");
                skipped += 1;
                continue;
            }
        };

        let genre = record.get(genre_idx).unwrap_or("").trim();
        let chords = parse_progression(record.get(chord_idx).unwrap_or(""));
        if genre.is_empty() || chords.is_empty() {
            skipped += 1;
            continue;
        }
        progressions.push(Progression::new(chords, genre));
    }

    info!(
        rows = progressions.len(),
        skipped,
        path = %path.display(),
        "dataset loaded"
    );
    Ok(progressions)
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|header| header == name)
        .with_context(|| format!("dataset is missing column `{name}`"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn loads_and_tokenizes_rows() {
        let file = write_csv(
            "id,chords,main_genre\n\
             1,<verse> C G Am F,pop\n\
             2,C G C,pop\n",
        );
        let rows = load_dataset(file.path(), &DatasetOptions::default()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].chords, vec!["C", "G", "Am", "F"]);
        assert_eq!(rows[0].genre, "pop");
    }

    #[test]
    fn rows_without_genre_or_chords_are_skipped() {
        let file = write_csv(
            "chords,main_genre\n\
             C G,\n\
             <tag_only>,pop\n\
             C F,rock\n",
        );
        let rows = load_dataset(file.path(), &DatasetOptions::default()).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].genre, "rock");
    }

    #[test]
    fn custom_column_names() {
        let file = write_csv("progression,style\nC G,pop\n");
        let options = DatasetOptions {
            chord_column: "progression".to_string(),
            genre_column: "style".to_string(),
        };
        let rows = load_dataset(file.path(), &options).unwrap();
        assert_eq!(rows[0].chords, vec!["C", "G"]);
    }

    #[test]
    fn missing_column_is_an_error() {
        let file = write_csv("chords\nC G\n");
        let err = load_dataset(file.path(), &DatasetOptions::default()).unwrap_err();
        assert!(err.to_string().contains("main_genre"));
    }
}
