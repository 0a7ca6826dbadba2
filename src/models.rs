//! Core data models for metadata resolution.
//!
//! This module contains the field record types shared by every source, the
//! source and run-state enums, and the combined per-item record that is
//! persisted between runs.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ResolveError;

// ============================================================================
// Field Keys
// ============================================================================

/// Closed set of field names a source may populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FieldKey {
    #[serde(rename = "titles")]
    Titles,
    #[serde(rename = "artists")]
    Artists,
    #[serde(rename = "genres")]
    Genres,
    #[serde(rename = "dates")]
    Dates,
    #[serde(rename = "albums")]
    Albums,
    #[serde(rename = "albumartists")]
    AlbumArtists,
    #[serde(rename = "labels")]
    Labels,
    #[serde(rename = "title-aliases")]
    TitleAliases,
    #[serde(rename = "artist-aliases")]
    ArtistAliases,
    #[serde(rename = "extras")]
    Extras,
}

impl FieldKey {
    pub const ALL: [FieldKey; 10] = [
        FieldKey::Titles,
        FieldKey::Artists,
        FieldKey::Genres,
        FieldKey::Dates,
        FieldKey::Albums,
        FieldKey::AlbumArtists,
        FieldKey::Labels,
        FieldKey::TitleAliases,
        FieldKey::ArtistAliases,
        FieldKey::Extras,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FieldKey::Titles => "titles",
            FieldKey::Artists => "artists",
            FieldKey::Genres => "genres",
            FieldKey::Dates => "dates",
            FieldKey::Albums => "albums",
            FieldKey::AlbumArtists => "albumartists",
            FieldKey::Labels => "labels",
            FieldKey::TitleAliases => "title-aliases",
            FieldKey::ArtistAliases => "artist-aliases",
            FieldKey::Extras => "extras",
        }
    }

    /// Map a singular or plural tag name ("genre", "artists") onto a field key.
    /// e.g., "albumartist" → AlbumArtists, "file_name" → UnknownField
    pub fn from_tag_name(name: &str) -> Result<Self, ResolveError> {
        let lower = name.trim().to_lowercase();
        if lower.ends_with('s') {
            lower.parse()
        } else {
            format!("{}s", lower).parse()
        }
    }
}

impl FromStr for FieldKey {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| ResolveError::UnknownField(s.to_string()))
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Field Values and Records
// ============================================================================

/// Value held under one field: a scalar, an ordered sequence, or a nested map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
    Map(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    /// Build a list value, dropping blank entries and duplicates (first wins).
    pub fn list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for value in values {
            let value = value.into();
            if !value.trim().is_empty() && !out.contains(&value) {
                out.push(value);
            }
        }
        FieldValue::List(out)
    }

    /// True when the value carries no data (empty text, list or map of empties).
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(text) => text.is_empty(),
            FieldValue::List(list) => list.is_empty(),
            FieldValue::Map(map) => map.values().all(FieldValue::is_empty),
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, FieldValue>> {
        match self {
            FieldValue::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}

/// Fields produced by one source for one item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldRecord {
    fields: BTreeMap<FieldKey, FieldValue>,
}

impl FieldRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// True if at least one field holds data.
    pub fn has_content(&self) -> bool {
        self.fields.values().any(|value| !value.is_empty())
    }

    pub fn get(&self, key: FieldKey) -> Option<&FieldValue> {
        self.fields.get(&key)
    }

    pub fn get_mut(&mut self, key: FieldKey) -> Option<&mut FieldValue> {
        self.fields.get_mut(&key)
    }

    pub fn contains(&self, key: FieldKey) -> bool {
        self.fields.contains_key(&key)
    }

    /// Sequence stored under `key`, or an empty slice.
    pub fn list(&self, key: FieldKey) -> &[String] {
        self.fields
            .get(&key)
            .and_then(FieldValue::as_list)
            .unwrap_or(&[])
    }

    /// Category map stored under `extras`, flattened to lists.
    pub fn extras(&self) -> BTreeMap<String, Vec<String>> {
        let mut out = BTreeMap::new();
        if let Some(map) = self.get(FieldKey::Extras).and_then(FieldValue::as_map) {
            for (category, value) in map {
                if let Some(list) = value.as_list() {
                    out.insert(category.clone(), list.to_vec());
                }
            }
        }
        out
    }

    pub fn insert(&mut self, key: FieldKey, value: FieldValue) {
        self.fields.insert(key, value);
    }

    /// Store a deduplicated list, skipping the field entirely when nothing survives.
    pub fn set_list<I, S>(&mut self, key: FieldKey, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let value = FieldValue::list(values);
        if !value.is_empty() {
            self.fields.insert(key, value);
        }
    }

    /// Store a map of string lists (e.g. categorised extras), skipping empty maps.
    pub fn set_list_map(&mut self, key: FieldKey, map: BTreeMap<String, Vec<String>>) {
        let nested: BTreeMap<String, FieldValue> = map
            .into_iter()
            .map(|(k, v)| (k, FieldValue::list(v)))
            .filter(|(_, v)| !v.is_empty())
            .collect();
        if !nested.is_empty() {
            self.fields.insert(key, FieldValue::Map(nested));
        }
    }

    pub fn remove(&mut self, key: FieldKey) -> Option<FieldValue> {
        self.fields.remove(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldKey, &FieldValue)> {
        self.fields.iter()
    }
}

// ============================================================================
// Sources
// ============================================================================

/// Producer of a FieldRecord. Declaration order is merge priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SourceName {
    /// Canonical-recording lookup (MusicBrainz)
    #[serde(rename = "musicbrainz")]
    Recording,
    /// Low-level-tag lookup (AcousticBrainz)
    #[serde(rename = "acousticbrainz")]
    LowLevel,
    /// Fingerprint-identity lookup (AcoustID)
    #[serde(rename = "acoustid")]
    Fingerprint,
    /// Genre/artist/title fields of the container's own tags
    #[serde(rename = "tags")]
    TagContainer,
    /// Display title parsed with the title pattern
    #[serde(rename = "title")]
    TagTitle,
    /// Free-text description
    #[serde(rename = "description")]
    TagDescription,
    /// Curated reference page (wiki)
    #[serde(rename = "wiki")]
    ReferencePage,
}

impl SourceName {
    pub const ALL: [SourceName; 7] = [
        SourceName::Recording,
        SourceName::LowLevel,
        SourceName::Fingerprint,
        SourceName::TagContainer,
        SourceName::TagTitle,
        SourceName::TagDescription,
        SourceName::ReferencePage,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceName::Recording => "musicbrainz",
            SourceName::LowLevel => "acousticbrainz",
            SourceName::Fingerprint => "acoustid",
            SourceName::TagContainer => "tags",
            SourceName::TagTitle => "title",
            SourceName::TagDescription => "description",
            SourceName::ReferencePage => "wiki",
        }
    }

    /// Sources keyed by the fingerprint identity.
    pub fn requires_fingerprint(self) -> bool {
        matches!(
            self,
            SourceName::Recording | SourceName::LowLevel | SourceName::Fingerprint
        )
    }
}

impl FromStr for SourceName {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceName::ALL
            .iter()
            .copied()
            .find(|source| source.as_str() == s)
            .ok_or_else(|| ResolveError::UnknownField(format!("source:{}", s)))
    }
}

impl fmt::Display for SourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Combined Record
// ============================================================================

/// Merged per-item record, persisted as the flat field map plus `sources`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedRecord {
    #[serde(flatten)]
    pub fields: FieldRecord,
    #[serde(default)]
    pub sources: Vec<SourceName>,
}

impl CombinedRecord {
    pub fn has_content(&self) -> bool {
        self.fields.has_content()
    }
}

// ============================================================================
// Run State
// ============================================================================

/// Per-path state, decided fresh each run from the persisted artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemRunState {
    New,
    SkippedAlreadyFailed,
    SkippedAlreadyDone,
    Processing,
    Succeeded,
    Failed,
}

impl ItemRunState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ItemRunState::New | ItemRunState::Processing)
    }
}

impl fmt::Display for ItemRunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ItemRunState::New => "NEW",
            ItemRunState::SkippedAlreadyFailed => "SKIPPED_ALREADY_FAILED",
            ItemRunState::SkippedAlreadyDone => "SKIPPED_ALREADY_DONE",
            ItemRunState::Processing => "PROCESSING",
            ItemRunState::Succeeded => "SUCCEEDED",
            ItemRunState::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

/// Which previously recorded paths get reprocessed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetryMode {
    #[default]
    None,
    Failed,
    Passed,
    All,
}

impl RetryMode {
    pub fn retries_failed(self) -> bool {
        matches!(self, RetryMode::Failed | RetryMode::All)
    }

    pub fn retries_passed(self) -> bool {
        matches!(self, RetryMode::Passed | RetryMode::All)
    }
}

impl FromStr for RetryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "failed" => Ok(RetryMode::Failed),
            "passed" => Ok(RetryMode::Passed),
            "all" => Ok(RetryMode::All),
            "none" | "" => Ok(RetryMode::None),
            other => Err(format!(
                "unknown retry mode '{}' (expected failed, passed or all)",
                other
            )),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_key_from_tag_name() {
        assert_eq!(FieldKey::from_tag_name("genre").unwrap(), FieldKey::Genres);
        assert_eq!(FieldKey::from_tag_name("artists").unwrap(), FieldKey::Artists);
        assert_eq!(
            FieldKey::from_tag_name("albumartist").unwrap(),
            FieldKey::AlbumArtists
        );
        assert!(matches!(
            FieldKey::from_tag_name("file_name"),
            Err(ResolveError::UnknownField(_))
        ));
    }

    #[test]
    fn test_list_drops_blanks_and_duplicates() {
        let value = FieldValue::list(["a", "", "b", "a", "  "]);
        assert_eq!(value, FieldValue::List(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_set_list_skips_empty() {
        let mut record = FieldRecord::new();
        record.set_list(FieldKey::Titles, Vec::<String>::new());
        assert!(record.is_empty());
        record.set_list(FieldKey::Titles, ["Song"]);
        assert_eq!(record.list(FieldKey::Titles), ["Song".to_string()]);
    }

    #[test]
    fn test_combined_record_json_shape() {
        let mut fields = FieldRecord::new();
        fields.set_list(FieldKey::Genres, ["Dubstep"]);
        let mut extras = BTreeMap::new();
        extras.insert("feat".to_string(), vec!["feat. Someone".to_string()]);
        fields.set_list_map(FieldKey::Extras, extras);
        let record = CombinedRecord {
            fields,
            sources: vec![SourceName::TagTitle, SourceName::ReferencePage],
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["genres"], serde_json::json!(["Dubstep"]));
        assert_eq!(json["extras"]["feat"], serde_json::json!(["feat. Someone"]));
        assert_eq!(json["sources"], serde_json::json!(["title", "wiki"]));

        let back: CombinedRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_has_content_ignores_empty_values() {
        let mut record = FieldRecord::new();
        record.insert(FieldKey::Titles, FieldValue::List(vec![]));
        record.insert(FieldKey::Extras, FieldValue::Map(BTreeMap::new()));
        assert!(!record.has_content());
        record.insert(FieldKey::Dates, FieldValue::Text("2020".into()));
        assert!(record.has_content());
    }

    #[test]
    fn test_source_order_is_merge_priority() {
        let mut sources = vec![
            SourceName::ReferencePage,
            SourceName::TagTitle,
            SourceName::Recording,
        ];
        sources.sort();
        assert_eq!(
            sources,
            vec![
                SourceName::Recording,
                SourceName::TagTitle,
                SourceName::ReferencePage
            ]
        );
        assert_eq!("wiki".parse::<SourceName>().unwrap(), SourceName::ReferencePage);
    }

    #[test]
    fn test_retry_mode() {
        assert!("all".parse::<RetryMode>().unwrap().retries_failed());
        assert!("all".parse::<RetryMode>().unwrap().retries_passed());
        assert!(!RetryMode::Failed.retries_passed());
        assert!(!RetryMode::None.retries_failed());
        assert!("bogus".parse::<RetryMode>().is_err());
    }
}
