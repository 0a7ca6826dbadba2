//! Shared string normalization for titles, queries, genres and file paths.
//!
//! Display titles are transliterated but keep their casing; queries are
//! case-folded for comparison only.

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Runs of whitespace (collapsed to one space)
pub static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Lower-case letter directly followed by an upper-case one ("DrumStep")
pub static CAMEL_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-z])([A-Z])").unwrap());

/// Characters not allowed in a restricted filename
static RESTRICTED_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").unwrap());

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if a character is a Unicode combining mark (diacritical mark).
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0xFE20..=0xFE2F)
}

/// Transliterate Unicode text to its closest ASCII form, keeping case.
/// e.g., "Björk" → "Bjork", "Кино" → "Kino"
pub fn transliterate(s: &str) -> String {
    if s.is_ascii() {
        return s.to_string();
    }
    // Strip diacritics first so precomposed letters keep their base letter
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    any_ascii(&stripped)
}

/// Fold Unicode text to lower-case ASCII.
pub fn fold_to_ascii(s: &str) -> String {
    transliterate(s).to_lowercase()
}

/// Collapse internal whitespace runs to a single space and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    MULTI_SPACE.replace_all(s.trim(), " ").to_string()
}

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

/// Normalize a display title before pattern matching.
pub fn normalize_display_title(title: &str) -> String {
    collapse_whitespace(&transliterate(title))
}

/// Normalize a search query or page title for similarity comparison.
/// Strips double quotes and folds to lower-case ASCII.
pub fn normalize_query(s: &str) -> String {
    fold_to_ascii(&s.replace('"', ""))
}

/// Capitalise the first letter of every whitespace-separated word,
/// leaving the rest of each word untouched ("future bass" → "Future Bass",
/// "dnB" → "DnB").
pub fn ensure_caps(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Insert a space at every lower/upper-case boundary ("MelodicDubstep" → "Melodic Dubstep").
pub fn split_camel_case(s: &str) -> String {
    CAMEL_BOUNDARY.replace_all(s, "$1 $2").to_string()
}

/// Reduce a string to the characters safe in a filename, replacing every
/// other run with `_` ("Song: Title!" → "Song_Title_").
pub fn restrict_filename(s: &str) -> String {
    let ascii = transliterate(s);
    RESTRICTED_FILENAME_CHARS.replace_all(&ascii, "_").to_string()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transliterate_keeps_case() {
        assert_eq!(transliterate("Björk"), "Bjork");
        assert_eq!(transliterate("Motörhead"), "Motorhead");
        assert_eq!(transliterate("Plain ASCII"), "Plain ASCII");
    }

    #[test]
    fn test_fold_to_ascii() {
        assert_eq!(fold_to_ascii("Beyoncé"), "beyonce");
        assert_eq!(fold_to_ascii("кино"), "kino");
    }

    #[test]
    fn test_normalize_display_title() {
        assert_eq!(
            normalize_display_title("  Artist   X -  Café  "),
            "Artist X - Cafe"
        );
    }

    #[test]
    fn test_normalize_query() {
        assert_eq!(normalize_query("\"Lost In Time\""), "lost in time");
        assert_eq!(normalize_query("Lost (Rogue)"), "lost (rogue)");
        assert_eq!(normalize_query("Café"), normalize_query("Cafe"));
    }

    #[test]
    fn test_ensure_caps() {
        assert_eq!(ensure_caps("future bass"), "Future Bass");
        assert_eq!(ensure_caps("dnB"), "DnB");
        assert_eq!(ensure_caps("EDM"), "EDM");
        assert_eq!(ensure_caps(""), "");
    }

    #[test]
    fn test_split_camel_case() {
        assert_eq!(split_camel_case("MelodicDubstep"), "Melodic Dubstep");
        assert_eq!(split_camel_case("Melodic Dubstep"), "Melodic Dubstep");
        assert_eq!(split_camel_case("EDM"), "EDM");
    }

    #[test]
    fn test_restrict_filename() {
        assert_eq!(restrict_filename("Song: Title!"), "Song_Title_");
        assert_eq!(restrict_filename("Artist X"), "Artist_X");
    }
}
