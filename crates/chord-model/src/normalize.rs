//! Chord notation normalizer.
//!
//! Maps raw dataset chord tokens ("Amin7", "Fsno3d", "C/G") onto a canonical
//! (root, quality, bass) form shared with the query layer. Parsing is
//! generous: a token whose root cannot be read degrades to a sentinel
//! notation instead of erroring, so dataset noise never aborts a batch.

use std::collections::HashMap;
use std::fmt;

/// Quality tag assigned to tokens whose root could not be parsed.
pub const UNKNOWN_QUALITY: &str = "unknown";

/// Normalized chord representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordNotation {
    /// Pitch-class name: "C", "F#", "Bb". Holds the raw token for sentinels.
    pub root: String,
    /// Quality tag: "maj", "m", "m7", "7", "M7", "dim", "sus4", ...
    pub quality: String,
    /// Slash-chord bass note, e.g. "G" in C/G.
    pub bass: Option<String>,
    /// Additional modifier suffixes, in input order.
    pub extensions: Vec<String>,
}

impl ChordNotation {
    /// Simplified form: root plus quality, with the plain-major tag and any
    /// bass note dropped ("Am7", "C", "F#5"). Sentinels yield the raw token.
    pub fn to_simple(&self) -> String {
        if self.quality == "maj" || self.quality == UNKNOWN_QUALITY {
            self.root.clone()
        } else {
            format!("{}{}", self.root, self.quality)
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.quality == UNKNOWN_QUALITY
    }
}

impl fmt::Display for ChordNotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.root, self.quality)?;
        for ext in &self.extensions {
            f.write_str(ext)?;
        }
        if let Some(bass) = &self.bass {
            write!(f, "/{}", bass)?;
        }
        Ok(())
    }
}

/// Dataset sharp spellings and their canonical names. Flats and naturals
/// already match the canonical alphabet and pass through unchanged.
static SHARP_SPELLINGS: [(&str, &str); 5] = [
    ("Cs", "C#"),
    ("Ds", "D#"),
    ("Fs", "F#"),
    ("Gs", "G#"),
    ("As", "A#"),
];

/// Canonicalize a note name ("Cs" → "C#", "Bb" → "Bb", "C" → "C").
pub fn normalize_note(note: &str) -> String {
    for (dataset, canonical) in SHARP_SPELLINGS {
        if note == dataset {
            return canonical.to_string();
        }
    }
    note.to_string()
}

/// Split a chord token into its root note and the remaining quality suffix.
///
/// The root is a letter A-G plus an optional accidental: the dataset sharp
/// marker `s`, a flat `b`, or a literal `#` so canonical spellings re-parse.
/// `s` counts as a sharp only when it does not open a `sus` suffix.
fn split_root(token: &str) -> Option<(String, &str)> {
    let letter = token.chars().next()?;
    if !('A'..='G').contains(&letter) {
        return None;
    }
    let rest = &token[1..];
    let accidental = match rest.bytes().next() {
        Some(b'#') | Some(b'b') => true,
        Some(b's') => !rest[1..].starts_with("us"),
        _ => false,
    };
    if accidental {
        Some((normalize_note(&token[..2]), &token[2..]))
    } else {
        Some((letter.to_string(), rest))
    }
}

/// Classify the suffix left after removing root and bass.
///
/// Rules are ordered by priority; unrecognized suffixes pass through
/// verbatim so rare dataset spellings survive unchanged.
pub fn parse_quality(suffix: &str) -> String {
    if suffix.is_empty() {
        return "maj".to_string();
    }

    // Power chords (no 3rd)
    if suffix.to_ascii_lowercase().contains("no3d") {
        return "5".to_string();
    }

    if let Some(rest) = suffix.strip_prefix("min") {
        return match rest {
            "7" => "m7".to_string(),
            "maj7" => "mM7".to_string(),
            _ if rest.starts_with("add") => format!("m{rest}"),
            _ => "m".to_string(),
        };
    }

    if let Some(rest) = suffix.strip_prefix("dim") {
        return if rest == "7" { "dim7" } else { "dim" }.to_string();
    }

    if suffix.starts_with("aug") {
        return "aug".to_string();
    }

    // sus2/sus4 keep their spelling
    if suffix.starts_with("sus") {
        return suffix.to_string();
    }

    if let Some(rest) = suffix.strip_prefix("maj") {
        return match rest {
            "7" => "M7".to_string(),
            "9" => "M9".to_string(),
            _ => "maj".to_string(),
        };
    }

    // Dominant 7th and extensions
    if matches!(suffix, "7" | "9" | "11" | "13") {
        return suffix.to_string();
    }

    if suffix.starts_with("add") {
        return suffix.to_string();
    }

    suffix.to_string()
}

/// Normalize a raw chord token.
///
/// An unparseable root yields the sentinel `{root: raw, quality: "unknown"}`
/// rather than an error.
pub fn normalize_chord(raw: &str) -> ChordNotation {
    let (chord_part, bass) = match raw.split_once('/') {
        Some((chord, bass)) => (chord, Some(normalize_note(bass))),
        None => (raw, None),
    };

    match split_root(chord_part) {
        Some((root, suffix)) => ChordNotation {
            root,
            quality: parse_quality(suffix),
            bass,
            extensions: Vec::new(),
        },
        None => ChordNotation {
            root: raw.to_string(),
            quality: UNKNOWN_QUALITY.to_string(),
            bass: None,
            extensions: Vec::new(),
        },
    }
}

/// Normalize a raw token straight to its simplified string form.
pub fn normalize_chord_simple(raw: &str) -> String {
    normalize_chord(raw).to_simple()
}

/// Normalizer with a cache keyed by the raw token.
///
/// The cache is owned here rather than living in a process-wide global, so
/// each pipeline (and each test) controls its own lifetime via [`clear`].
///
/// [`clear`]: ChordNormalizer::clear
#[derive(Debug, Default)]
pub struct ChordNormalizer {
    cache: HashMap<String, ChordNotation>,
}

impl ChordNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize a raw token, reusing the cached notation when present.
    pub fn normalize(&mut self, raw: &str) -> &ChordNotation {
        if !self.cache.contains_key(raw) {
            self.cache.insert(raw.to_string(), normalize_chord(raw));
        }
        &self.cache[raw]
    }

    /// Simplified string form of a raw token.
    pub fn simple(&mut self, raw: &str) -> String {
        self.normalize(raw).to_simple()
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Drop all cached notations.
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}
