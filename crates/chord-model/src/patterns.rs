//! Frequent n-gram mining over chord progressions.
//!
//! Identifies the most common fixed-length chord sequences per genre, for
//! suggesting whole continuations rather than single next chords.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tracing::{debug, info};

use crate::progression::Progression;

/// A mined chord sequence with its observed weight in a genre.
#[derive(Debug, Clone, PartialEq)]
pub struct ChordPattern {
    pub chords: Vec<String>,
    pub count: u64,
    /// count / total n-grams of this length observed in the genre,
    /// computed once at mining time.
    pub frequency: f64,
    pub genre: String,
}

impl ChordPattern {
    pub fn len(&self) -> usize {
        self.chords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chords.is_empty()
    }
}

impl fmt::Display for ChordPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.chords.join(" -> "))
    }
}

/// Store of mined patterns: genre → pattern length → ranked patterns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternMiner {
    pub patterns: BTreeMap<String, BTreeMap<usize, Vec<ChordPattern>>>,
}

impl PatternMiner {
    pub fn new() -> Self {
        Self::default()
    }

    /// File a pattern under its genre and length.
    pub fn add_pattern(&mut self, pattern: ChordPattern) {
        let length = pattern.len();
        self.patterns
            .entry(pattern.genre.clone())
            .or_default()
            .entry(length)
            .or_default()
            .push(pattern);
    }

    /// Top patterns for a genre and length, ranked by frequency.
    pub fn patterns_for(
        &self,
        genre: &str,
        length: usize,
        top_n: usize,
        min_frequency: f64,
    ) -> Vec<ChordPattern> {
        let Some(stored) = self.patterns.get(genre).and_then(|g| g.get(&length)) else {
            return Vec::new();
        };

        let mut out: Vec<ChordPattern> = stored
            .iter()
            .filter(|p| p.frequency >= min_frequency)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.frequency
                .partial_cmp(&a.frequency)
                .unwrap_or(Ordering::Equal)
        });
        out.truncate(top_n);
        out
    }

    /// Patterns whose leading chords equal `prefix` exactly, searched across
    /// lengths from the prefix length up to `max_length`, merged and ranked
    /// by frequency.
    pub fn find_matching(
        &self,
        prefix: &[String],
        genre: &str,
        max_length: usize,
    ) -> Vec<ChordPattern> {
        if prefix.is_empty() {
            return Vec::new();
        }
        let Some(by_length) = self.patterns.get(genre) else {
            return Vec::new();
        };

        let mut matches = Vec::new();
        for length in prefix.len()..=max_length {
            let Some(stored) = by_length.get(&length) else {
                continue;
            };
            for pattern in stored {
                if pattern.chords.starts_with(prefix) {
                    matches.push(pattern.clone());
                }
            }
        }

        matches.sort_by(|a, b| {
            b.frequency
                .partial_cmp(&a.frequency)
                .unwrap_or(Ordering::Equal)
        });
        matches
    }

    /// Genres with mined patterns, in stable order.
    pub fn available_genres(&self) -> Vec<String> {
        self.patterns.keys().cloned().collect()
    }
}

/// Mining controls for [`extract_patterns`].
#[derive(Debug, Clone)]
pub struct ExtractParams {
    /// Window sizes to mine.
    pub pattern_lengths: Vec<usize>,
    /// Genres with fewer progressions than this are skipped.
    pub min_genre_size: usize,
    /// Patterns kept per genre and length.
    pub top_n_per_length: usize,
}

impl Default for ExtractParams {
    fn default() -> Self {
        ExtractParams {
            pattern_lengths: vec![2, 3, 4],
            min_genre_size: 1000,
            top_n_per_length: 100,
        }
    }
}

/// n-gram counter preserving first-encounter order, so ranking ties resolve
/// to the pattern seen first.
#[derive(Debug, Default)]
struct GramCounter {
    index: HashMap<Vec<String>, usize>,
    grams: Vec<(Vec<String>, u64)>,
    total: u64,
}

impl GramCounter {
    fn add(&mut self, gram: &[String]) {
        self.total += 1;
        match self.index.get(gram) {
            Some(&i) => self.grams[i].1 += 1,
            None => {
                self.index.insert(gram.to_vec(), self.grams.len());
                self.grams.push((gram.to_vec(), 1));
            }
        }
    }
}

/// Mine the most frequent fixed-length chord sequences per genre.
///
/// Chord tokens are taken as given; normalize them upstream when raw
/// dataset spellings should collapse.
pub fn extract_patterns(progressions: &[Progression], params: &ExtractParams) -> PatternMiner {
    let mut genre_sizes: BTreeMap<&str, usize> = BTreeMap::new();
    for prog in progressions {
        *genre_sizes.entry(prog.genre.as_str()).or_default() += 1;
    }
    let retained: Vec<&str> = genre_sizes
        .into_iter()
        .filter(|&(_, n)| n >= params.min_genre_size)
        .map(|(genre, _)| genre)
        .collect();
    info!(
        genres = retained.len(),
        lengths = ?params.pattern_lengths,
        "extracting chord patterns"
    );

    let mut miner = PatternMiner::new();
    for genre in retained {
        for &length in &params.pattern_lengths {
            if length == 0 {
                continue;
            }

            let mut counter = GramCounter::default();
            for prog in progressions.iter().filter(|p| p.genre == genre) {
                if prog.chords.len() < length {
                    continue;
                }
                for window in prog.chords.windows(length) {
                    counter.add(window);
                }
            }

            let GramCounter {
                grams: mut ranked,
                total,
                index: _,
            } = counter;
            let unique = ranked.len();

            // Stable sort: equal counts keep first-encounter order.
            ranked.sort_by(|a, b| b.1.cmp(&a.1));
            ranked.truncate(params.top_n_per_length);

            debug!(
                genre,
                length,
                unique,
                kept = ranked.len(),
                "pattern length mined"
            );

            for (chords, count) in ranked {
                let frequency = if total > 0 {
                    count as f64 / total as f64
                } else {
                    0.0
                };
                miner.add_pattern(ChordPattern {
                    chords,
                    count,
                    frequency,
                    genre: genre.to_string(),
                });
            }
        }
    }

    miner
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn prog(chords: &[&str], genre: &str) -> Progression {
        Progression::new(chords.iter().map(|c| c.to_string()).collect(), genre)
    }

    fn pop_progressions() -> Vec<Progression> {
        vec![
            prog(&["C", "G", "Am", "F"], "pop"),
            prog(&["C", "G", "C"], "pop"),
            prog(&["C", "F", "C"], "pop"),
        ]
    }

    fn mine(lengths: &[usize], top_n: usize) -> PatternMiner {
        extract_patterns(
            &pop_progressions(),
            &ExtractParams {
                pattern_lengths: lengths.to_vec(),
                min_genre_size: 1,
                top_n_per_length: top_n,
            },
        )
    }

    #[test]
    fn repeated_bigram_ranks_first() {
        let miner = mine(&[2], 100);
        let top = miner.patterns_for("pop", 2, 10, 0.0);
        assert_eq!(top[0].chords, vec!["C", "G"]);
        assert_eq!(top[0].count, 2);
        assert!(top[1..].iter().all(|p| p.count <= 2));
    }

    #[test]
    fn frequency_is_share_of_observed_grams() {
        let miner = mine(&[2], 100);
        // 3 + 2 + 2 = 7 bigrams observed in the genre.
        let top = miner.patterns_for("pop", 2, 10, 0.0);
        assert_eq!(top[0].frequency, 2.0 / 7.0);
    }

    #[test]
    fn equal_counts_keep_first_encounter_order() {
        let miner = mine(&[2], 100);
        let top = miner.patterns_for("pop", 2, 10, 0.0);
        // All count-1 bigrams tie; G,Am was seen before Am,F and the rest.
        let ties: Vec<String> = top[1..].iter().map(|p| p.chords.join("|")).collect();
        assert_eq!(ties, vec!["G|Am", "Am|F", "G|C", "C|F", "F|C"]);
    }

    #[test]
    fn top_n_per_length_caps_stored_patterns() {
        let miner = mine(&[2], 2);
        assert_eq!(miner.patterns["pop"][&2].len(), 2);
    }

    #[test]
    fn short_progressions_are_skipped_per_length() {
        let progressions = vec![prog(&["C", "G"], "pop"), prog(&["C", "G", "Am"], "pop")];
        let miner = extract_patterns(
            &progressions,
            &ExtractParams {
                pattern_lengths: vec![3],
                min_genre_size: 1,
                top_n_per_length: 10,
            },
        );
        let top = miner.patterns_for("pop", 3, 10, 0.0);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].chords, vec!["C", "G", "Am"]);
        assert_eq!(top[0].frequency, 1.0);
    }

    #[test]
    fn find_matching_requires_exact_prefix() {
        let miner = mine(&[2, 3], 100);
        let prefix = vec!["C".to_string(), "G".to_string()];
        let matches = miner.find_matching(&prefix, "pop", 4);

        assert!(!matches.is_empty());
        assert!(matches.iter().all(|p| p.chords.starts_with(&prefix)));
        // Merged across lengths 2 and 3, ranked by frequency.
        assert!(matches.windows(2).all(|w| w[0].frequency >= w[1].frequency));
    }

    #[test]
    fn find_matching_empty_prefix_or_unknown_genre() {
        let miner = mine(&[2], 100);
        assert!(miner.find_matching(&[], "pop", 4).is_empty());
        let prefix = vec!["C".to_string()];
        assert!(miner.find_matching(&prefix, "metal", 4).is_empty());
    }

    #[test]
    fn small_genres_are_skipped() {
        let mut progressions = pop_progressions();
        progressions.push(prog(&["Dm", "G7", "Cmaj7"], "jazz"));
        let miner = extract_patterns(
            &progressions,
            &ExtractParams {
                pattern_lengths: vec![2],
                min_genre_size: 2,
                top_n_per_length: 10,
            },
        );
        assert_eq!(miner.available_genres(), vec!["pop"]);
    }

    #[test]
    fn min_frequency_filters_lookup() {
        let miner = mine(&[2], 100);
        let frequent = miner.patterns_for("pop", 2, 10, 0.25);
        assert_eq!(frequent.len(), 1);
        assert_eq!(frequent[0].chords, vec!["C", "G"]);
    }
}
