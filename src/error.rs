//! Error taxonomy for metadata resolution.
//!
//! Item-level failures are `ResolveError`s; the orchestrator turns them into a
//! failed item rather than aborting the run. Transport problems from the
//! remote sources arrive as `FetchError` and are wrapped.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the HTTP fetcher.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Any HTTP status the fetcher does not handle itself (429 and 404 are handled).
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },

    /// The run was interrupted before or while retrying the request.
    #[error("request to {url} abandoned: run interrupted")]
    Interrupted { url: String },
}

/// Errors raised while resolving one item.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No candidate identity or reference page could be located.
    #[error("not found: {0}")]
    NotFound(String),

    /// More than one equally valid exact candidate.
    #[error("ambiguous match: {0}")]
    AmbiguousMatch(String),

    /// Two sources disagree on a scalar value during merge.
    #[error("cannot combine {key}: {incoming} conflicts with existing {existing}")]
    Conflict {
        key: String,
        existing: String,
        incoming: String,
    },

    /// The tag store has no reader for this container type.
    #[error("unsupported format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// A field name outside the closed field set reached the combiner boundary.
    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("tag read failed: {0}")]
    Tag(String),

    #[error("fingerprint failed: {0}")]
    Fingerprint(String),

    #[error("invalid pattern: {0}")]
    Pattern(String),
}

impl ResolveError {
    /// Whether the item stopped because the run was interrupted.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, ResolveError::Fetch(FetchError::Interrupted { .. }))
    }

    /// Short machine-friendly label used in run summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            ResolveError::NotFound(_) => "not_found",
            ResolveError::AmbiguousMatch(_) => "ambiguous",
            ResolveError::Conflict { .. } => "conflict",
            ResolveError::UnsupportedFormat(_) => "unsupported",
            ResolveError::UnknownField(_) => "unknown_field",
            ResolveError::Fetch(_) => "fetch",
            ResolveError::Tag(_) => "tag",
            ResolveError::Fingerprint(_) => "fingerprint",
            ResolveError::Pattern(_) => "pattern",
        }
    }
}

pub type Result<T, E = ResolveError> = std::result::Result<T, E>;
