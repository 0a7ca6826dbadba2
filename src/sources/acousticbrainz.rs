//! AcousticBrainz low-level tag lookup.

use serde_json::Value;
use tracing::warn;

use crate::error::Result;
use crate::fetch::Fetcher;
use crate::models::{FieldKey, FieldRecord};
use crate::rate_limit::RemoteSource;

use super::IdentitySource;

const ACOUSTICBRAINZ_BASE_URL: &str = "https://acousticbrainz.org/api/v1";

/// Submitted tag names worth keeping. The single `artist` tag is skipped since
/// it carries the "feat." credit in one string; `artists` has the split form.
const KEPT_TAGS: &[&str] = &[
    "genre",
    "album",
    "albumartist",
    "artists",
    "date",
    "title",
    "label",
    "file_name",
];

/// Pull the kept tags out of a low-level response, pluralised into field keys.
pub fn parse_low_level_tags(body: &Value) -> FieldRecord {
    let mut fields = FieldRecord::new();
    let Some(tags) = body.pointer("/metadata/tags").and_then(Value::as_object) else {
        return fields;
    };

    for (name, value) in tags {
        if !KEPT_TAGS.contains(&name.as_str()) {
            continue;
        }
        let key = match FieldKey::from_tag_name(name) {
            Ok(key) => key,
            Err(e) => {
                warn!("dropping low-level tag: {}", e);
                continue;
            }
        };
        let values: Vec<String> = match value {
            Value::Array(items) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Value::String(s) => vec![s.clone()],
            _ => continue,
        };
        fields.set_list(key, values);
    }
    fields
}

pub struct AcousticBrainzClient<'a> {
    fetcher: &'a dyn Fetcher,
}

impl<'a> AcousticBrainzClient<'a> {
    pub fn new(fetcher: &'a dyn Fetcher) -> Self {
        Self { fetcher }
    }

    pub fn low_level_url(recording_id: &str) -> String {
        format!(
            "{}/{}/low-level",
            ACOUSTICBRAINZ_BASE_URL,
            urlencoding::encode(recording_id)
        )
    }
}

impl IdentitySource for AcousticBrainzClient<'_> {
    fn fields_for(&self, recording_id: &str) -> Result<FieldRecord> {
        let url = Self::low_level_url(recording_id);
        Ok(self
            .fetcher
            .get_json(&url, RemoteSource::AcousticBrainz)?
            .map(|body| parse_low_level_tags(&body))
            .unwrap_or_default())
    }
}
