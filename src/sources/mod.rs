//! Remote source clients.
//!
//! Each client turns one remote service into FieldRecords (or, for the
//! reference wiki, into page lookups and searches). All of them share one
//! `Fetcher`, so rate limiting and 429/404 handling live in a single place.

pub mod acousticbrainz;
pub mod acoustid;
pub mod fandom;
pub mod musicbrainz;

use std::path::Path;

use crate::error::Result;
use crate::models::FieldRecord;

pub use acousticbrainz::AcousticBrainzClient;
pub use acoustid::AcoustIdClient;
pub use fandom::{FandomClient, ReferenceWiki, SearchHit, WikiPage};
pub use musicbrainz::MusicBrainzClient;

/// Fingerprint identity for one file, plus the fields the lookup returned.
#[derive(Debug, Clone, PartialEq)]
pub struct FingerprintMatch {
    /// Recording identifier the other fingerprint-keyed sources look up
    pub recording_id: String,
    pub fields: FieldRecord,
}

/// Resolves an audio file to a fingerprint identity.
pub trait FingerprintLookup {
    /// Fails with `NotFound` when no candidate identity fits the file.
    fn lookup(&self, path: &Path) -> Result<FingerprintMatch>;
}

/// Fields keyed by a fingerprint identity.
pub trait IdentitySource {
    /// Empty record when the service has nothing for this identity.
    fn fields_for(&self, recording_id: &str) -> Result<FieldRecord>;
}
