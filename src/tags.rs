//! Embedded tag access.
//!
//! The resolver only needs the display title, the free-text description and
//! the container's own genre/artist/title values, so that is all `TagStore`
//! exposes.

use std::path::Path;

use lofty::error::ErrorKind;
use lofty::file::{FileType, TaggedFileExt};
use lofty::read_from_path;
use lofty::tag::{ItemKey, Tag};

use crate::error::{ResolveError, Result};
use crate::models::{FieldKey, FieldRecord};

/// Tag values read from one media file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagFields {
    pub title: String,
    pub description: String,
    /// Genre, artist and title values from the container, pluralised
    pub container: FieldRecord,
}

pub trait TagStore {
    /// Whether a reader exists for this container type.
    fn is_supported(&self, path: &Path) -> bool;

    /// Fails with `UnsupportedFormat` for containers without a reader.
    fn read(&self, path: &Path) -> Result<TagFields>;
}

/// Tag store backed by lofty.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyTagStore;

fn first_string(tag: &Tag, keys: &[ItemKey]) -> String {
    keys.iter()
        .find_map(|key| tag.get_string(key.clone()))
        .map(str::to_string)
        .unwrap_or_default()
}

fn container_fields(tag: &Tag) -> FieldRecord {
    let mut fields = FieldRecord::new();
    for (key, item) in [
        (FieldKey::Genres, ItemKey::Genre),
        (FieldKey::Artists, ItemKey::TrackArtist),
        (FieldKey::Titles, ItemKey::TrackTitle),
    ] {
        fields.set_list(key, tag.get_strings(item).map(str::to_string));
    }
    fields
}

impl TagStore for LoftyTagStore {
    fn is_supported(&self, path: &Path) -> bool {
        FileType::from_path(path).is_some()
    }

    fn read(&self, path: &Path) -> Result<TagFields> {
        if !self.is_supported(path) {
            return Err(ResolveError::UnsupportedFormat(path.to_path_buf()));
        }

        let tagged_file = read_from_path(path).map_err(|e| match e.kind() {
            ErrorKind::UnknownFormat => ResolveError::UnsupportedFormat(path.to_path_buf()),
            _ => ResolveError::Tag(format!("{}: {}", path.display(), e)),
        })?;

        let Some(tag) = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag())
        else {
            return Ok(TagFields::default());
        };

        Ok(TagFields {
            title: first_string(tag, &[ItemKey::TrackTitle]),
            description: first_string(tag, &[ItemKey::Description, ItemKey::Comment]),
            container: container_fields(tag),
        })
    }
}

// ============================================================================
// In-memory tag store for tests
// ============================================================================
