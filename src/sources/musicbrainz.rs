//! MusicBrainz canonical-recording lookup.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{FetchError, ResolveError, Result};
use crate::fetch::Fetcher;
use crate::models::{FieldKey, FieldRecord};
use crate::rate_limit::RemoteSource;

use super::IdentitySource;

const MUSICBRAINZ_BASE_URL: &str = "https://musicbrainz.org/ws/2";
const RECORDING_INCLUDES: &[&str] = &["artist-credits", "aliases", "genres", "tags", "releases"];

/// MusicBrainz recording response (only the parts we keep)
#[derive(Debug, Clone, Deserialize)]
pub struct MBRecording {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "artist-credit", default)]
    pub artist_credit: Vec<MBArtistCredit>,
    #[serde(default)]
    pub aliases: Vec<MBAlias>,
    #[serde(default)]
    pub genres: Vec<MBGenre>,
    #[serde(rename = "first-release-date")]
    pub first_release_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MBArtistCredit {
    /// Credited name (may differ from the artist's own name)
    pub name: String,
    pub artist: MBArtist,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MBArtist {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<MBAlias>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MBAlias {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MBGenre {
    pub name: String,
}

fn alias_names(aliases: &[MBAlias]) -> Vec<String> {
    aliases.iter().filter_map(|a| a.name.clone()).collect()
}

impl MBRecording {
    /// Fields contributed by a recording; empty values are dropped.
    pub fn to_fields(&self) -> FieldRecord {
        let mut fields = FieldRecord::new();
        fields.set_list(
            FieldKey::Artists,
            self.artist_credit.iter().map(|c| c.name.clone()),
        );

        let artist_aliases: BTreeMap<String, Vec<String>> = self
            .artist_credit
            .iter()
            .map(|c| (c.name.clone(), alias_names(&c.artist.aliases)))
            .collect();
        fields.set_list_map(FieldKey::ArtistAliases, artist_aliases);

        fields.set_list(FieldKey::Titles, [self.title.clone()]);
        fields.set_list(FieldKey::TitleAliases, alias_names(&self.aliases));
        fields.set_list(FieldKey::Genres, self.genres.iter().map(|g| g.name.clone()));
        fields.set_list(FieldKey::Dates, self.first_release_date.clone());
        fields
    }
}

pub struct MusicBrainzClient<'a> {
    fetcher: &'a dyn Fetcher,
}

impl<'a> MusicBrainzClient<'a> {
    pub fn new(fetcher: &'a dyn Fetcher) -> Self {
        Self { fetcher }
    }

    pub fn recording_url(recording_id: &str) -> String {
        format!(
            "{}/recording/{}?inc={}&fmt=json",
            MUSICBRAINZ_BASE_URL,
            urlencoding::encode(recording_id),
            RECORDING_INCLUDES.join("+")
        )
    }

    pub fn recording(&self, recording_id: &str) -> Result<Option<MBRecording>> {
        let url = Self::recording_url(recording_id);
        let Some(body) = self.fetcher.get_json(&url, RemoteSource::MusicBrainz)? else {
            return Ok(None);
        };
        serde_json::from_value(body).map(Some).map_err(|e| {
            ResolveError::Fetch(FetchError::Decode {
                url,
                message: e.to_string(),
            })
        })
    }
}

impl IdentitySource for MusicBrainzClient<'_> {
    fn fields_for(&self, recording_id: &str) -> Result<FieldRecord> {
        Ok(self
            .recording(recording_id)?
            .map(|r| r.to_fields())
            .unwrap_or_default())
    }
}
