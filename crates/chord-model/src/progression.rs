//! Progression-string tokenizer.
//!
//! Dataset rows carry whitespace-delimited chord tokens interleaved with
//! structural tags in angle brackets ("<verse_1> C G Am F <chorus> ...").
//! Tags are stripped before tokenizing.

/// One dataset row: the tokenized chord sequence and its genre label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progression {
    pub chords: Vec<String>,
    pub genre: String,
}

impl Progression {
    pub fn new(chords: Vec<String>, genre: impl Into<String>) -> Self {
        Progression {
            chords,
            genre: genre.into(),
        }
    }
}

/// Tokenize a raw progression string.
///
/// Structural tags are dropped, then the remainder splits on whitespace.
/// A malformed or empty row yields an empty token list; callers skip those
/// rather than aborting the batch.
pub fn parse_progression(raw: &str) -> Vec<String> {
    let mut cleaned = String::with_capacity(raw.len());
    let mut in_tag = false;
    for c in raw.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => cleaned.push(c),
            _ => {}
        }
    }
    cleaned.split_whitespace().map(str::to_string).collect()
}
