//! Field extraction from the display title and description tags.
//!
//! The title parser pulls bracketed annotations ("extras") out of the title,
//! applies a configurable capture pattern with `genre`, `artist` and `title`
//! groups, and categorises the extras by keyword.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::error::ResolveError;
use crate::models::{FieldKey, FieldRecord};
use crate::normalize::normalize_display_title;

// ============================================================================
// Default Patterns
// ============================================================================

/// "[Genre] Artist - Title", every part but the title optional.
pub const DEFAULT_TITLE_PATTERN: &str =
    r"^(?:\[(?P<genre>.*?)\] )?(?:(?:[-:] )?(?P<artist>.*?) - )?(?P<title>.*?)$";

/// A "Genre: ..." line anywhere in the description.
pub const DEFAULT_DESCRIPTION_GENRE_PATTERN: &str = r"^.*?Genre:\s*(?P<genres>.+?)\s*$";

/// Capture groups the title pattern is expected to define, with their field.
const TITLE_GROUPS: [(&str, FieldKey); 3] = [
    ("genre", FieldKey::Genres),
    ("artist", FieldKey::Artists),
    ("title", FieldKey::Titles),
];

/// Bracketed or parenthesised span preceded by whitespace: " [..]" / " (..)"
static EXTRA_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+\[([^\]]+)\]|\s+\(([^)]+)\)").unwrap());

/// Trailing featured-artist clause on an artist name
static FEAT_IN_ARTIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+((?:feat|ft)\.?\s+.+)$").unwrap());

/// Hashtag genre in a description line: "#dubstep"
static HASHTAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"#(\w+)").unwrap());

// ============================================================================
// Extra Categories
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraCategory {
    Release,
    Feat,
    Remix,
    Uncategorized,
}

impl ExtraCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ExtraCategory::Release => "release",
            ExtraCategory::Feat => "feat",
            ExtraCategory::Remix => "remix",
            ExtraCategory::Uncategorized => "uncategorized",
        }
    }

    /// Keyword classification, checked in priority order.
    pub fn classify(extra: &str) -> Self {
        let lower = extra.to_lowercase();
        if lower.contains("release") {
            ExtraCategory::Release
        } else if lower.contains("feat.") {
            ExtraCategory::Feat
        } else if lower.contains("mix") {
            ExtraCategory::Remix
        } else {
            ExtraCategory::Uncategorized
        }
    }
}

/// Extras grouped by category, categories in the order first seen.
pub type OrderedExtras = Vec<(String, Vec<String>)>;

/// Group extras by category, keeping encounter order within each category.
pub fn categorise_extras(extras: &[String]) -> BTreeMap<String, Vec<String>> {
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for extra in extras {
        out.entry(ExtraCategory::classify(extra).as_str().to_string())
            .or_default()
            .push(extra.clone());
    }
    out
}

/// Order a stored category map by where each category's values first appear
/// in `encounter`. Categories with no value in `encounter` follow in map order.
pub fn order_extras(map: &BTreeMap<String, Vec<String>>, encounter: &[String]) -> OrderedExtras {
    let mut ordered: OrderedExtras = map
        .iter()
        .map(|(category, values)| (category.clone(), values.clone()))
        .collect();
    ordered.sort_by_key(|(_, values)| {
        values
            .iter()
            .filter_map(|v| encounter.iter().position(|e| e == v))
            .min()
            .unwrap_or(usize::MAX)
    });
    ordered
}

// ============================================================================
// Title Pattern Parser
// ============================================================================

pub struct TitlePatternParser {
    pattern: Regex,
}

impl TitlePatternParser {
    pub fn new(pattern: &str) -> Result<Self, ResolveError> {
        let pattern = Regex::new(pattern).map_err(|e| ResolveError::Pattern(e.to_string()))?;
        for (group, _) in TITLE_GROUPS {
            if !pattern.capture_names().flatten().any(|name| name == group) {
                warn!("title pattern {:?} has no group '{}'", pattern.as_str(), group);
            }
        }
        Ok(Self { pattern })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Extract genres, artists, titles and categorised extras from a display title.
    /// Returns an empty record when the pattern does not match.
    pub fn parse(&self, display_title: &str) -> FieldRecord {
        self.parse_with_extras(display_title).0
    }

    /// Like `parse`, also returning the extras in the order they were found.
    pub fn parse_with_extras(&self, display_title: &str) -> (FieldRecord, Vec<String>) {
        let normalized = normalize_display_title(display_title);

        let mut extras: Vec<String> = Vec::new();
        let remainder = EXTRA_SPAN
            .replace_all(&normalized, |caps: &Captures| {
                if let Some(inner) = caps.get(1).or_else(|| caps.get(2)) {
                    extras.push(inner.as_str().trim().to_string());
                }
                String::new()
            })
            .to_string();

        let mut record = FieldRecord::new();
        let Some(caps) = self.pattern.captures(&remainder) else {
            debug!("title {:?} does not match {:?}", remainder, self.pattern.as_str());
            return (record, extras);
        };

        for (group, key) in TITLE_GROUPS {
            let Some(value) = caps.name(group).map(|m| m.as_str().trim()) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            match key {
                FieldKey::Artists => {
                    let artist = split_featured_artist(value, &mut extras);
                    record.set_list(key, [artist]);
                }
                FieldKey::Titles => record.set_list(key, title_candidates(value)),
                _ => record.set_list(key, [value.to_string()]),
            }
        }

        record.set_list_map(FieldKey::Extras, categorise_extras(&extras));
        (record, extras)
    }
}

/// Strip a trailing "feat./ft." clause from an artist, moving it into `extras`.
fn split_featured_artist(artist: &str, extras: &mut Vec<String>) -> String {
    match FEAT_IN_ARTIST.captures(artist) {
        Some(caps) => {
            if let Some(clause) = caps.get(1) {
                extras.push(clause.as_str().trim().to_string());
            }
            let start = caps.get(0).map_or(artist.len(), |m| m.start());
            artist[..start].trim().to_string()
        }
        None => artist.to_string(),
    }
}

/// Primary title followed by its " - " separated segments.
fn title_candidates(title: &str) -> Vec<String> {
    let mut out = vec![title.to_string()];
    if title.contains(" - ") {
        out.extend(title.split(" - ").map(|s| s.trim().to_string()));
    }
    out
}

// ============================================================================
// Description Genre Parser
// ============================================================================

pub struct DescriptionGenreParser {
    pattern: Regex,
}

impl DescriptionGenreParser {
    pub fn new(pattern: &str) -> Result<Self, ResolveError> {
        let pattern = RegexBuilder::new(pattern)
            .multi_line(true)
            .build()
            .map_err(|e| ResolveError::Pattern(e.to_string()))?;
        Ok(Self { pattern })
    }

    /// Genres from the first matching description line: hashtags if present,
    /// otherwise the whole line as one genre.
    pub fn parse(&self, description: &str) -> FieldRecord {
        let mut record = FieldRecord::new();
        let Some(caps) = self.pattern.captures(description) else {
            return record;
        };
        let Some(line) = caps.name("genres").or_else(|| caps.get(1)) else {
            return record;
        };
        let line = line.as_str().trim();
        if line.contains('#') {
            record.set_list(
                FieldKey::Genres,
                HASHTAG.captures_iter(line).map(|c| c[1].to_string()),
            );
        } else {
            record.set_list(FieldKey::Genres, [line.to_string()]);
        }
        record
    }
}

// ============================================================================
// TESTS
// ============================================================================
