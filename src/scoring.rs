//! Scoring functions for candidate selection.
//!
//! This module contains:
//! - Query/title similarity for reference-page ranking
//! - Path scoring for choosing among fingerprint candidates

use crate::normalize::{normalize_query, restrict_filename};

// ============================================================================
// Thresholds
// ============================================================================

/// Similarity at which a search hit counts as an exact match
pub const EXACT_MATCH_RATIO: f64 = 1.0;

// ============================================================================
// Similarity
// ============================================================================

/// Similarity ratio (0.0 to 1.0) between a search query and a page title,
/// compared after stripping quotes and case-folding.
pub fn similarity_ratio(query: &str, title: &str) -> f64 {
    let a = normalize_query(query);
    let b = normalize_query(title);
    if a == b {
        return EXACT_MATCH_RATIO;
    }
    strsim::normalized_levenshtein(&a, &b)
}

pub fn is_exact_ratio(ratio: Option<f64>) -> bool {
    match ratio {
        None => true,
        Some(r) => r >= EXACT_MATCH_RATIO,
    }
}

// ============================================================================
// Path Scoring
// ============================================================================

/// True when the restricted, lower-cased component occurs in the lower-cased path.
pub fn component_in_path(component: &str, path_lower: &str) -> bool {
    let restricted = restrict_filename(component).to_lowercase();
    !restricted.is_empty() && path_lower.contains(&restricted)
}

/// Score a fingerprint candidate against the file path it was computed from:
/// one point for the title, one for any credited artist.
pub fn score_candidate_path(title: Option<&str>, artists: &[String], path: &str) -> u32 {
    let path_lower = path.to_lowercase();
    let mut score = 0;
    if title.is_some_and(|t| component_in_path(t, &path_lower)) {
        score += 1;
    }
    if artists.iter().any(|a| component_in_path(a, &path_lower)) {
        score += 1;
    }
    score
}

// ============================================================================
// TESTS
// ============================================================================
