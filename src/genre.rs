//! Genre vocabulary normalization.
//!
//! Raw genre tokens from every source are mapped onto one canonical display
//! form: known aliases through a curated synonym table, everything else by
//! capitalising words and splitting concatenated camel-case names. Tokens
//! outside the table that differ only in ways the heuristic cannot see stay
//! distinct.

use once_cell::sync::Lazy;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::normalize::{ensure_caps, split_camel_case};

// ============================================================================
// Synonym Table
// ============================================================================

/// Canonical display form → alias spellings (compared lower-cased).
pub const GENRE_SYNONYMS: &[(&str, &[&str])] = &[
    ("Bass House", &["basshouse"]),
    ("Drum & Bass", &["dnb", "drumandbass", "drum and bass"]),
    ("Dancefloor Drum & Bass", &["dancefloor drum and bass"]),
    ("Glitch Hop / 110BPM", &["glitch hop or 110bpm", "glitch hop / 110 bpm"]),
    ("House", &["house music"]),
    ("EDM", &["edm"]),
    ("Electro House", &["electrohouse"]),
    ("Electro Pop", &["electropop"]),
    ("Melodic Bass", &["melodicbass"]),
];

/// Lower-cased alias or canonical name → canonical display form
static SYNONYM_LOOKUP: Lazy<FxHashMap<String, &'static str>> = Lazy::new(|| {
    let mut m = FxHashMap::default();
    for (canonical, aliases) in GENRE_SYNONYMS {
        m.insert(canonical.to_lowercase(), *canonical);
        for alias in aliases.iter() {
            m.insert(alias.to_lowercase(), *canonical);
        }
    }
    m
});

/// Noise tokens dropped for every item type.
pub const BASE_GENRE_EXCLUSIONS: &[&str] = &["dance"];

// ============================================================================
// Exclusions
// ============================================================================

/// Per-item set of genre tokens to drop, compared lower-cased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenreExclusions {
    tokens: FxHashSet<String>,
}

impl GenreExclusions {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tokens: tokens
                .into_iter()
                .map(|t| t.as_ref().trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    /// Base noise tokens plus item-type specific additions.
    pub fn with_base<I, S>(additions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut exclusions = Self::new(BASE_GENRE_EXCLUSIONS);
        exclusions.extend(additions);
        exclusions
    }

    pub fn extend<I, S>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tokens.extend(
            tokens
                .into_iter()
                .map(|t| t.as_ref().trim().to_lowercase())
                .filter(|t| !t.is_empty()),
        );
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(&token.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Maps raw genre tokens onto the canonical vocabulary.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenreResolver;

impl GenreResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve one token, or `None` if it is blank or excluded.
    pub fn resolve_genre(&self, token: &str, exclusions: &GenreExclusions) -> Option<String> {
        let token = token.trim();
        if token.is_empty() || exclusions.contains(token) {
            return None;
        }
        if let Some(canonical) = SYNONYM_LOOKUP.get(&token.to_lowercase()) {
            return Some((*canonical).to_string());
        }
        // The split form of a camel-case token can itself be an alias.
        let display = split_camel_case(&ensure_caps(token));
        match SYNONYM_LOOKUP.get(&display.to_lowercase()) {
            Some(canonical) => Some((*canonical).to_string()),
            None => Some(display),
        }
    }

    /// Resolve a token list, keeping first-seen order and dropping duplicates
    /// produced by resolution. Resolving an already resolved list is a no-op.
    pub fn resolve(&self, genres: &[String], exclusions: &GenreExclusions) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for genre in genres {
            if let Some(resolved) = self.resolve_genre(genre, exclusions) {
                if !out.contains(&resolved) {
                    out.push(resolved);
                }
            }
        }
        out
    }
}

// ============================================================================
// TESTS
// ============================================================================
