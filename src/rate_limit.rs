//! Per-source request spacing.
//!
//! One limiter is built per process and shared by every remote client. It
//! keeps the last request time for each named source and sleeps the remainder
//! of the minimum interval before the next request to that source.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

/// Default minimum spacing between requests to the same source
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Remote services the clients talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteSource {
    AcoustId,
    MusicBrainz,
    AcousticBrainz,
    Fandom,
}

impl RemoteSource {
    pub fn as_str(self) -> &'static str {
        match self {
            RemoteSource::AcoustId => "acoustid",
            RemoteSource::MusicBrainz => "musicbrainz",
            RemoteSource::AcousticBrainz => "acousticbrainz",
            RemoteSource::Fandom => "fandom",
        }
    }
}

impl fmt::Display for RemoteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct RateLimiter {
    last_request: RefCell<HashMap<RemoteSource, Instant>>,
    min_interval: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::with_interval(DEFAULT_MIN_INTERVAL)
    }
}

impl RateLimiter {
    pub fn with_interval(min_interval: Duration) -> Self {
        Self {
            last_request: RefCell::new(HashMap::new()),
            min_interval,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Block until a request to `source` is allowed, then record it.
    /// Returns how long the caller was held back.
    pub fn wait(&self, source: RemoteSource) -> Duration {
        let mut last = self.last_request.borrow_mut();
        let mut waited = Duration::ZERO;

        if let Some(last_time) = last.get(&source) {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                waited = self.min_interval - elapsed;
                debug!("Rate limiting {}: waiting {:?}", source, waited);
                thread::sleep(waited);
            }
        }

        last.insert(source, Instant::now());
        waited
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_request_is_immediate() {
        let limiter = RateLimiter::with_interval(Duration::from_millis(50));
        assert_eq!(limiter.wait(RemoteSource::Fandom), Duration::ZERO);
    }

    #[test]
    fn test_second_request_waits() {
        let limiter = RateLimiter::with_interval(Duration::from_millis(50));
        limiter.wait(RemoteSource::MusicBrainz);
        let start = Instant::now();
        let waited = limiter.wait(RemoteSource::MusicBrainz);
        assert!(waited > Duration::ZERO);
        assert!(start.elapsed() >= waited);
    }

    #[test]
    fn test_sources_are_independent() {
        let limiter = RateLimiter::with_interval(Duration::from_secs(60));
        limiter.wait(RemoteSource::AcoustId);
        assert_eq!(limiter.wait(RemoteSource::AcousticBrainz), Duration::ZERO);
    }
}
