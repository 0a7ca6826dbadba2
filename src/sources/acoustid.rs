//! AcoustID fingerprint-identity lookup.
//!
//! The fingerprint is computed by the external `fpcalc` tool; the lookup
//! service returns candidate recordings, and when there are several the one
//! whose title and artist appear in the file path wins.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{ResolveError, Result};
use crate::fetch::Fetcher;
use crate::models::{FieldKey, FieldRecord};
use crate::rate_limit::RemoteSource;
use crate::scoring::score_candidate_path;

use super::{FingerprintLookup, FingerprintMatch};

const ACOUSTID_LOOKUP_URL: &str = "https://api.acoustid.org/v2/lookup";
const FPCALC_DOWNLOAD_URL: &str = "https://acoustid.org/chromaprint";

// ============================================================================
// Wire Types
// ============================================================================

/// `fpcalc -json` output
#[derive(Debug, Clone, Deserialize)]
pub struct Fingerprint {
    pub duration: f64,
    pub fingerprint: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    status: String,
    #[serde(default)]
    results: Vec<LookupResult>,
    error: Option<LookupErrorBody>,
}

#[derive(Debug, Deserialize)]
struct LookupErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct LookupResult {
    score: f64,
    #[serde(default)]
    recordings: Vec<LookupRecording>,
}

#[derive(Debug, Deserialize)]
struct LookupRecording {
    id: String,
    title: Option<String>,
    #[serde(default)]
    artists: Vec<LookupArtist>,
}

#[derive(Debug, Deserialize)]
struct LookupArtist {
    name: String,
}

/// One (score, recording, title, artists) tuple from a lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct FingerprintCandidate {
    pub score: f64,
    pub recording_id: String,
    pub title: Option<String>,
    pub artists: Vec<String>,
}

impl FingerprintCandidate {
    fn into_match(self) -> FingerprintMatch {
        let mut fields = FieldRecord::new();
        if let Some(title) = self.title {
            fields.set_list(FieldKey::Titles, [title]);
        }
        fields.set_list(FieldKey::Artists, self.artists);
        FingerprintMatch {
            recording_id: self.recording_id,
            fields,
        }
    }
}

// ============================================================================
// Parsing and Selection
// ============================================================================

/// Flatten a lookup response into candidates, one per recording.
pub fn parse_candidates(body: serde_json::Value) -> Result<Vec<FingerprintCandidate>> {
    let response: LookupResponse = serde_json::from_value(body)
        .map_err(|e| ResolveError::Fingerprint(format!("malformed lookup response: {}", e)))?;

    if response.status != "ok" {
        let message = response
            .error
            .map(|e| e.message)
            .unwrap_or_else(|| response.status.clone());
        return Err(ResolveError::Fingerprint(message));
    }

    let mut candidates = Vec::new();
    for result in response.results {
        for recording in result.recordings {
            candidates.push(FingerprintCandidate {
                score: result.score,
                recording_id: recording.id,
                title: recording.title,
                artists: recording.artists.into_iter().map(|a| a.name).collect(),
            });
        }
    }
    Ok(candidates)
}

/// Pick the candidate that best fits the file path.
///
/// A single candidate is taken as-is. With several, each scores a point for
/// its title and one for its artist appearing in the path; ties go to the
/// earlier candidate and a best score of zero is not a match.
pub fn select_candidate(
    mut candidates: Vec<FingerprintCandidate>,
    path: &Path,
) -> Result<FingerprintCandidate> {
    let path_str = path.to_string_lossy();
    match candidates.len() {
        0 => Err(ResolveError::NotFound(format!(
            "no fingerprint identity for {}",
            path_str
        ))),
        1 => Ok(candidates.remove(0)),
        n => {
            warn!("{} fingerprint candidates for {}", n, path_str);
            let mut best: Option<(usize, u32)> = None;
            for (i, candidate) in candidates.iter().enumerate() {
                let score =
                    score_candidate_path(candidate.title.as_deref(), &candidate.artists, &path_str);
                debug!(
                    "candidate {} {:?} {:?} scored {}",
                    candidate.recording_id, candidate.title, candidate.artists, score
                );
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((i, score));
                }
            }
            match best {
                Some((i, score)) if score > 0 => Ok(candidates.swap_remove(i)),
                _ => Err(ResolveError::NotFound(format!(
                    "no fingerprint candidate matches {}",
                    path_str
                ))),
            }
        }
    }
}

// ============================================================================
// Client
// ============================================================================

pub struct AcoustIdClient<'a> {
    fetcher: &'a dyn Fetcher,
    api_key: String,
    fpcalc: PathBuf,
}

impl<'a> AcoustIdClient<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, api_key: &str) -> Self {
        Self {
            fetcher,
            api_key: api_key.to_string(),
            fpcalc: PathBuf::from("fpcalc"),
        }
    }

    pub fn with_fpcalc(mut self, fpcalc: impl Into<PathBuf>) -> Self {
        self.fpcalc = fpcalc.into();
        self
    }

    /// Run `fpcalc -json` on the file.
    pub fn fingerprint_file(&self, path: &Path) -> Result<Fingerprint> {
        let output = Command::new(&self.fpcalc)
            .arg("-json")
            .arg(path)
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ResolveError::Fingerprint(format!(
                        "{} not found, download it from {}",
                        self.fpcalc.display(),
                        FPCALC_DOWNLOAD_URL
                    ))
                } else {
                    ResolveError::Fingerprint(e.to_string())
                }
            })?;

        if !output.status.success() {
            return Err(ResolveError::Fingerprint(format!(
                "fpcalc failed on {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| ResolveError::Fingerprint(format!("unreadable fpcalc output: {}", e)))
    }

    pub fn lookup_url(&self, fingerprint: &Fingerprint) -> String {
        format!(
            "{}?client={}&meta=recordings&duration={}&fingerprint={}",
            ACOUSTID_LOOKUP_URL,
            urlencoding::encode(&self.api_key),
            fingerprint.duration.round() as u64,
            urlencoding::encode(&fingerprint.fingerprint)
        )
    }

    pub fn candidates(&self, fingerprint: &Fingerprint) -> Result<Vec<FingerprintCandidate>> {
        let url = self.lookup_url(fingerprint);
        match self.fetcher.get_json(&url, RemoteSource::AcoustId)? {
            Some(body) => parse_candidates(body),
            None => Ok(Vec::new()),
        }
    }
}

impl FingerprintLookup for AcoustIdClient<'_> {
    fn lookup(&self, path: &Path) -> Result<FingerprintMatch> {
        let fingerprint = self.fingerprint_file(path)?;
        let candidates = self.candidates(&fingerprint)?;
        info!("{} fingerprint candidates for {}", candidates.len(), path.display());
        Ok(select_candidate(candidates, path)?.into_match())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::fake::FakeFetcher;
    use serde_json::json;

    fn candidate(id: &str, title: &str, artist: &str) -> FingerprintCandidate {
        FingerprintCandidate {
            score: 0.9,
            recording_id: id.to_string(),
            title: Some(title.to_string()),
            artists: vec![artist.to_string()],
        }
    }

    #[test]
    fn test_parse_candidates_flattens_recordings() {
        let body = json!({
            "status": "ok",
            "results": [
                {"id": "a1", "score": 0.97, "recordings": [
                    {"id": "rec-1", "title": "Lost In Time", "artists": [{"id": "x", "name": "Rogue"}]},
                    {"id": "rec-2", "title": "Lost In Time (VIP)", "artists": []}
                ]},
                {"id": "a2", "score": 0.5}
            ]
        });
        let candidates = parse_candidates(body).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].recording_id, "rec-1");
        assert_eq!(candidates[0].artists, vec!["Rogue".to_string()]);
        assert_eq!(candidates[1].score, 0.97);
    }

    #[test]
    fn test_parse_candidates_error_status() {
        let body = json!({"status": "error", "error": {"code": 4, "message": "invalid API key"}});
        match parse_candidates(body) {
            Err(ResolveError::Fingerprint(msg)) => assert_eq!(msg, "invalid API key"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_select_single_candidate_as_is() {
        let chosen = select_candidate(
            vec![candidate("rec-1", "Unrelated", "Nobody")],
            Path::new("/music/file.m4a"),
        )
        .unwrap();
        assert_eq!(chosen.recording_id, "rec-1");
    }

    #[test]
    fn test_select_best_scoring_candidate() {
        let chosen = select_candidate(
            vec![
                candidate("rec-1", "Other Song", "Rogue"),
                candidate("rec-2", "Lost In Time", "Rogue"),
            ],
            Path::new("/music/Rogue_-_Lost_In_Time.m4a"),
        )
        .unwrap();
        assert_eq!(chosen.recording_id, "rec-2");
    }

    #[test]
    fn test_select_zero_score_is_not_found() {
        let result = select_candidate(
            vec![
                candidate("rec-1", "Alpha Song", "Beta"),
                candidate("rec-2", "Gamma Tune", "Delta"),
            ],
            Path::new("/music/Something_Else.m4a"),
        );
        assert!(matches!(result, Err(ResolveError::NotFound(_))));
        assert!(matches!(
            select_candidate(vec![], Path::new("/x.m4a")),
            Err(ResolveError::NotFound(_))
        ));
    }

    #[test]
    fn test_lookup_url_and_missing_response() {
        let fetcher = FakeFetcher::default();
        let client = AcoustIdClient::new(&fetcher, "key");
        let fingerprint = Fingerprint {
            duration: 181.6,
            fingerprint: "AQAA+/x".to_string(),
        };
        let url = client.lookup_url(&fingerprint);
        assert!(url.starts_with("https://api.acoustid.org/v2/lookup?client=key"));
        assert!(url.contains("duration=182"));
        assert!(url.contains("fingerprint=AQAA%2B%2Fx"));
        assert!(client.candidates(&fingerprint).unwrap().is_empty());
    }

    #[test]
    fn test_missing_fpcalc_is_fingerprint_error() {
        let fetcher = FakeFetcher::default();
        let client =
            AcoustIdClient::new(&fetcher, "key").with_fpcalc("/nonexistent/fpcalc-binary");
        assert!(matches!(
            client.fingerprint_file(Path::new("/tmp/none.m4a")),
            Err(ResolveError::Fingerprint(_))
        ));
    }

    #[test]
    fn test_candidate_into_match() {
        let m = candidate("rec-9", "Song", "Artist").into_match();
        assert_eq!(m.recording_id, "rec-9");
        assert_eq!(m.fields.list(FieldKey::Titles), ["Song".to_string()]);
        assert_eq!(m.fields.list(FieldKey::Artists), ["Artist".to_string()]);
    }
}
