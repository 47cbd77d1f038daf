//! Multi-order Markov chain model for chord progressions.
//!
//! Stores per-genre transition probabilities at three levels of context:
//! order 1 keyed by the current chord alone, orders 2 and 3 keyed by the
//! `|`-joined preceding chords plus the current one. The same chord reached
//! via different paths leads to different continuations, which the higher
//! orders capture. Queries back off from the most specific context that has
//! data down to order 1.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::progression::Progression;

/// Separator for higher-order context keys ("G|Am" for a two-chord context).
pub const CONTEXT_SEP: &str = "|";

/// genre → context key → next chord → probability
pub type TransitionTable = BTreeMap<String, BTreeMap<String, BTreeMap<String, f64>>>;

/// A single recommended transition out of a context.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionStats {
    /// Context the recommendation came from: a chord, or a joined
    /// higher-order key when backoff stopped at order 2 or 3.
    pub from_context: String,
    pub to_chord: String,
    pub probability: f64,
    /// Reconstructed as round(probability × genre total); display only,
    /// lossy after model compaction.
    pub count: u64,
    pub genre: String,
}

/// Thresholds for building a model from a progression set.
#[derive(Debug, Clone)]
pub struct BuildParams {
    /// Genres with fewer progressions than this are dropped entirely.
    pub min_genre_size: usize,
    /// Two-chord contexts seen fewer times than this are dropped.
    pub min_bigram_count: u64,
    /// Three-chord contexts seen fewer times than this are dropped.
    pub min_trigram_count: u64,
}

impl Default for BuildParams {
    fn default() -> Self {
        BuildParams {
            min_genre_size: 1000,
            min_bigram_count: 3,
            min_trigram_count: 2,
        }
    }
}

/// Query controls for [`MarkovModel::recommendations`].
#[derive(Debug, Clone)]
pub struct RecommendParams {
    pub top_n: usize,
    pub min_probability: f64,
}

impl Default for RecommendParams {
    fn default() -> Self {
        RecommendParams {
            top_n: 10,
            min_probability: 0.001,
        }
    }
}

/// Trained multi-order transition tables, read-only at query time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkovModel {
    /// Order 1: genre → current chord → next chord → probability.
    pub transitions: TransitionTable,
    /// Order 2: genre → "prev|current" → next chord → probability.
    pub bigram_transitions: TransitionTable,
    /// Order 3: genre → "prev2|prev1|current" → next chord → probability.
    pub trigram_transitions: TransitionTable,
    /// genre → chord → relative frequency within the genre.
    pub chord_frequencies: BTreeMap<String, BTreeMap<String, f64>>,
    /// genre → number of training progressions.
    pub genre_totals: BTreeMap<String, u64>,
}

impl MarkovModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next-chord recommendations with backoff through context orders.
    ///
    /// `context` lists the chords preceding `current_chord`, most recent
    /// last. The three-chord context is tried first (needs at least two
    /// preceding chords), then the two-chord context, then the current chord
    /// alone. Returns an empty list when the genre holds no data for any
    /// order.
    pub fn recommendations(
        &self,
        current_chord: &str,
        genre: &str,
        context: &[String],
        params: &RecommendParams,
    ) -> Vec<TransitionStats> {
        let Some((from_context, dist)) = self.backoff(current_chord, genre, context) else {
            return Vec::new();
        };

        let genre_total = self.genre_totals.get(genre).copied().unwrap_or(1000);

        let mut results: Vec<TransitionStats> = dist
            .iter()
            .filter(|(_, &p)| p >= params.min_probability)
            .map(|(to_chord, &p)| TransitionStats {
                from_context: from_context.clone(),
                to_chord: to_chord.clone(),
                probability: p,
                count: (p * genre_total as f64).round() as u64,
                genre: genre.to_string(),
            })
            .collect();

        // Stable sort keeps equal probabilities in table order.
        results.sort_by(|a, b| {
            b.probability
                .partial_cmp(&a.probability)
                .unwrap_or(Ordering::Equal)
        });
        results.truncate(params.top_n);
        results
    }

    /// Most specific context with recorded data, or `None` when even order 1
    /// knows nothing about the chord in this genre.
    fn backoff<'a>(
        &'a self,
        current_chord: &str,
        genre: &str,
        context: &[String],
    ) -> Option<(String, &'a BTreeMap<String, f64>)> {
        if let [.., prev2, prev1] = context {
            let key = [prev2.as_str(), prev1.as_str(), current_chord].join(CONTEXT_SEP);
            if let Some(dist) = self.trigram_transitions.get(genre).and_then(|g| g.get(&key)) {
                return Some((key, dist));
            }
        }

        if let [.., prev] = context {
            let key = [prev.as_str(), current_chord].join(CONTEXT_SEP);
            if let Some(dist) = self.bigram_transitions.get(genre).and_then(|g| g.get(&key)) {
                return Some((key, dist));
            }
        }

        self.transitions
            .get(genre)
            .and_then(|g| g.get(current_chord))
            .map(|dist| (current_chord.to_string(), dist))
    }

    /// Relative frequency of a chord within a genre; 0.0 when unseen.
    pub fn chord_frequency(&self, chord: &str, genre: &str) -> f64 {
        self.chord_frequencies
            .get(genre)
            .and_then(|g| g.get(chord))
            .copied()
            .unwrap_or(0.0)
    }

    /// Inverse-frequency heuristic: 0.0 for ubiquitous chords, 1.0 for
    /// unseen ones. The ×10 scale is a fixed tuning constant; the score is
    /// not a calibrated probability.
    pub fn friction_score(&self, chord: &str, genre: &str) -> f64 {
        let freq = self.chord_frequency(chord, genre);
        if freq == 0.0 {
            return 1.0;
        }
        (1.0 - (freq * 10.0).min(1.0)).max(0.0)
    }

    /// Genres with order-1 transition data, in stable order.
    pub fn available_genres(&self) -> Vec<String> {
        self.transitions.keys().cloned().collect()
    }
}

/// Per-genre accumulators; all orders are counted in a single pass.
#[derive(Debug, Default)]
struct GenreCounts {
    transition: BTreeMap<String, BTreeMap<String, u64>>,
    from_totals: BTreeMap<String, u64>,
    bigram: BTreeMap<String, BTreeMap<String, u64>>,
    bigram_totals: BTreeMap<String, u64>,
    trigram: BTreeMap<String, BTreeMap<String, u64>>,
    trigram_totals: BTreeMap<String, u64>,
    chords: BTreeMap<String, u64>,
    total_chords: u64,
    progressions: u64,
}

impl GenreCounts {
    fn observe(&mut self, chords: &[String]) {
        if chords.len() < 2 {
            return;
        }

        for i in 0..chords.len() - 1 {
            let from = &chords[i];
            let to = &chords[i + 1];

            *self
                .transition
                .entry(from.clone())
                .or_default()
                .entry(to.clone())
                .or_default() += 1;
            *self.from_totals.entry(from.clone()).or_default() += 1;
            *self.chords.entry(from.clone()).or_default() += 1;
            self.total_chords += 1;

            // Order 2 needs one preceding chord
            if i >= 1 {
                let key = [chords[i - 1].as_str(), from.as_str()].join(CONTEXT_SEP);
                *self
                    .bigram
                    .entry(key.clone())
                    .or_default()
                    .entry(to.clone())
                    .or_default() += 1;
                *self.bigram_totals.entry(key).or_default() += 1;
            }

            // Order 3 needs two preceding chords
            if i >= 2 {
                let key = [
                    chords[i - 2].as_str(),
                    chords[i - 1].as_str(),
                    from.as_str(),
                ]
                .join(CONTEXT_SEP);
                *self
                    .trigram
                    .entry(key.clone())
                    .or_default()
                    .entry(to.clone())
                    .or_default() += 1;
                *self.trigram_totals.entry(key).or_default() += 1;
            }
        }

        // The final chord has no outgoing transition but still counts
        // toward the frequency table.
        if let Some(last) = chords.last() {
            *self.chords.entry(last.clone()).or_default() += 1;
            self.total_chords += 1;
        }
    }
}

/// Divide a count table by per-context totals, keeping only contexts whose
/// total meets `min_count`. The threshold filters noisy contexts, not
/// individual probabilities.
fn normalize_counts(
    counts: &BTreeMap<String, BTreeMap<String, u64>>,
    totals: &BTreeMap<String, u64>,
    min_count: u64,
) -> BTreeMap<String, BTreeMap<String, f64>> {
    let mut out = BTreeMap::new();
    for (key, tos) in counts {
        let total = totals[key];
        if total < min_count {
            continue;
        }
        let dist: BTreeMap<String, f64> = tos
            .iter()
            .map(|(to, &n)| (to.clone(), n as f64 / total as f64))
            .collect();
        out.insert(key.clone(), dist);
    }
    out
}

/// Build a multi-order Markov model from tokenized progressions.
///
/// Chord tokens are taken as given; normalize them upstream when the raw
/// dataset spellings should collapse. Progressions shorter than two chords
/// contribute nothing to the tables but still count toward the genre total.
pub fn build_markov_model(progressions: &[Progression], params: &BuildParams) -> MarkovModel {
    let mut per_genre: BTreeMap<String, GenreCounts> = BTreeMap::new();
    for prog in progressions {
        let counts = per_genre.entry(prog.genre.clone()).or_default();
        counts.progressions += 1;
        counts.observe(&prog.chords);
    }

    let retained = per_genre
        .values()
        .filter(|c| c.progressions as usize >= params.min_genre_size)
        .count();
    info!(
        genres = retained,
        dropped = per_genre.len() - retained,
        min_genre_size = params.min_genre_size,
        "building markov model"
    );

    let mut model = MarkovModel::new();
    for (genre, counts) in per_genre {
        if (counts.progressions as usize) < params.min_genre_size {
            debug!(
                genre = %genre,
                progressions = counts.progressions,
                "genre below size threshold, dropped"
            );
            continue;
        }

        let order1 = normalize_counts(&counts.transition, &counts.from_totals, 0);
        let order2 = normalize_counts(&counts.bigram, &counts.bigram_totals, params.min_bigram_count);
        let order3 = normalize_counts(
            &counts.trigram,
            &counts.trigram_totals,
            params.min_trigram_count,
        );

        let frequencies: BTreeMap<String, f64> = counts
            .chords
            .iter()
            .map(|(chord, &n)| {
                let freq = if counts.total_chords > 0 {
                    n as f64 / counts.total_chords as f64
                } else {
                    0.0
                };
                (chord.clone(), freq)
            })
            .collect();

        info!(
            genre = %genre,
            progressions = counts.progressions,
            source_chords = order1.len(),
            bigram_contexts = counts.bigram.len(),
            bigram_kept = order2.len(),
            trigram_contexts = counts.trigram.len(),
            trigram_kept = order3.len(),
            unique_chords = frequencies.len(),
            "genre model built"
        );

        if !order1.is_empty() {
            model.transitions.insert(genre.clone(), order1);
        }
        if !order2.is_empty() {
            model.bigram_transitions.insert(genre.clone(), order2);
        }
        if !order3.is_empty() {
            model.trigram_transitions.insert(genre.clone(), order3);
        }
        if !frequencies.is_empty() {
            model.chord_frequencies.insert(genre.clone(), frequencies);
        }
        model.genre_totals.insert(genre, counts.progressions);
    }

    model
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn prog(chords: &[&str], genre: &str) -> Progression {
        Progression::new(chords.iter().map(|c| c.to_string()).collect(), genre)
    }

    fn pop_model() -> MarkovModel {
        let progressions = vec![
            prog(&["C", "G", "Am", "F"], "pop"),
            prog(&["C", "G", "C"], "pop"),
            prog(&["C", "F", "C"], "pop"),
        ];
        build_markov_model(
            &progressions,
            &BuildParams {
                min_genre_size: 1,
                min_bigram_count: 1,
                min_trigram_count: 1,
            },
        )
    }

    #[test]
    fn order1_probabilities_from_counts() {
        let model = pop_model();
        let from_c = &model.transitions["pop"]["C"];

        // C is a transition source three times: C->G twice, C->F once.
        assert_eq!(from_c["G"], 2.0 / 3.0);
        assert_eq!(from_c["F"], 1.0 / 3.0);
    }

    #[test]
    fn order1_rows_sum_to_one() {
        let model = pop_model();
        for (_, dist) in &model.transitions["pop"] {
            let sum: f64 = dist.values().sum();
            assert!((sum - 1.0).abs() < 1e-9, "row sums to {sum}");
        }
    }

    #[test]
    fn genre_total_counts_progressions_not_chords() {
        let model = pop_model();
        assert_eq!(model.genre_totals["pop"], 3);
    }

    #[test]
    fn final_chords_count_toward_frequency() {
        let model = pop_model();
        // 10 chords total across the three progressions; C appears 5 times.
        assert_eq!(model.chord_frequency("C", "pop"), 0.5);
    }

    #[test]
    fn short_progressions_keep_genre_total_but_add_no_transitions() {
        let progressions = vec![prog(&["C"], "pop"), prog(&["C", "G"], "pop")];
        let model = build_markov_model(
            &progressions,
            &BuildParams {
                min_genre_size: 1,
                ..Default::default()
            },
        );
        assert_eq!(model.genre_totals["pop"], 2);
        assert_eq!(model.transitions["pop"]["C"]["G"], 1.0);
        // The single-chord row contributed nothing to frequencies.
        assert_eq!(model.chord_frequency("C", "pop"), 0.5);
    }

    #[test]
    fn small_genres_are_dropped() {
        let progressions = vec![
            prog(&["C", "G"], "pop"),
            prog(&["C", "F"], "pop"),
            prog(&["Dm", "G7"], "jazz"),
        ];
        let model = build_markov_model(
            &progressions,
            &BuildParams {
                min_genre_size: 2,
                min_bigram_count: 1,
                min_trigram_count: 1,
            },
        );
        assert_eq!(model.available_genres(), vec!["pop"]);
        assert!(!model.genre_totals.contains_key("jazz"));
    }

    #[test]
    fn bigram_contexts_below_min_count_are_dropped() {
        let progressions = vec![
            prog(&["C", "G", "Am"], "pop"),
            prog(&["C", "G", "Am"], "pop"),
            prog(&["C", "F", "G"], "pop"),
        ];
        let model = build_markov_model(
            &progressions,
            &BuildParams {
                min_genre_size: 1,
                min_bigram_count: 2,
                min_trigram_count: 1,
            },
        );
        let bigrams = &model.bigram_transitions["pop"];
        assert!(bigrams.contains_key("C|G"));
        assert!(!bigrams.contains_key("C|F"));
    }

    #[test]
    fn trigram_context_requires_two_preceding_chords() {
        let model = pop_model();
        let trigrams = &model.trigram_transitions["pop"];
        assert_eq!(trigrams["C|G|Am"]["F"], 1.0);
        // Three-chord rows produce no trigram context.
        assert!(!trigrams.contains_key("C|G|C"));
    }

    #[test]
    fn recommendations_rank_by_probability() {
        let model = pop_model();
        let recs = model.recommendations("C", "pop", &[], &RecommendParams::default());
        assert_eq!(recs[0].to_chord, "G");
        assert_eq!(recs[0].probability, 2.0 / 3.0);
        assert_eq!(recs[1].to_chord, "F");
        assert_eq!(recs[0].from_context, "C");
    }

    #[test]
    fn recommendation_count_is_rounded_reconstruction() {
        let model = pop_model();
        let recs = model.recommendations("C", "pop", &[], &RecommendParams::default());
        // round(2/3 * 3 progressions) = 2
        assert_eq!(recs[0].count, 2);
    }

    #[test]
    fn min_probability_filters_and_top_n_truncates() {
        let model = pop_model();
        let recs = model.recommendations(
            "C",
            "pop",
            &[],
            &RecommendParams {
                top_n: 1,
                min_probability: 0.001,
            },
        );
        assert_eq!(recs.len(), 1);

        let recs = model.recommendations(
            "C",
            "pop",
            &[],
            &RecommendParams {
                top_n: 10,
                min_probability: 0.5,
            },
        );
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].to_chord, "G");
    }

    #[test]
    fn backoff_uses_most_specific_context() {
        let model = pop_model();
        let context = vec!["C".to_string(), "G".to_string()];
        let recs = model.recommendations("Am", "pop", &context, &RecommendParams::default());
        assert_eq!(recs[0].from_context, "C|G|Am");
        assert_eq!(recs[0].to_chord, "F");
    }

    #[test]
    fn backoff_falls_through_to_order1_when_higher_orders_are_absent() {
        let mut model = MarkovModel::new();
        model
            .transitions
            .entry("pop".to_string())
            .or_default()
            .entry("C".to_string())
            .or_default()
            .insert("G".to_string(), 1.0);
        model.genre_totals.insert("pop".to_string(), 1);

        let context = vec!["G".to_string(), "Am".to_string()];
        let with_context = model.recommendations("C", "pop", &context, &RecommendParams::default());
        let without = model.recommendations("C", "pop", &[], &RecommendParams::default());
        assert_eq!(with_context, without);
        assert_eq!(with_context[0].from_context, "C");
    }

    #[test]
    fn unknown_chord_or_genre_yields_empty() {
        let model = pop_model();
        assert!(model
            .recommendations("X", "pop", &[], &RecommendParams::default())
            .is_empty());
        assert!(model
            .recommendations("C", "metal", &[], &RecommendParams::default())
            .is_empty());
    }

    #[test]
    fn friction_is_one_for_unseen_chords() {
        let model = pop_model();
        assert_eq!(model.friction_score("X", "pop"), 1.0);
        assert_eq!(model.friction_score("C", "metal"), 1.0);
    }

    #[test]
    fn friction_never_increases_with_frequency() {
        let model = pop_model();
        let f_c = model.chord_frequency("C", "pop");
        let f_am = model.chord_frequency("Am", "pop");
        assert!(f_am < f_c);
        assert!(model.friction_score("Am", "pop") >= model.friction_score("C", "pop"));
    }
}
