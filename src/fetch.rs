//! HTTP fetching for the remote source clients.
//!
//! Every request goes through the shared rate limiter first. A 429 response
//! sleeps a fixed back-off and retries the same request until the run's
//! interrupt flag is set; a 404 is a valid "no data" result. Any other error
//! status is returned to the caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::rate_limit::{RateLimiter, RemoteSource};

/// Sleep applied after a 429 before retrying the same request
pub const DEFAULT_RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(5);

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Access to remote content, keyed by the source being addressed.
pub trait Fetcher {
    /// Decoded JSON body, or `None` for a not-found response.
    fn get_json(&self, url: &str, source: RemoteSource) -> Result<Option<Value>, FetchError>;

    /// Raw text body, or `None` for a not-found response.
    fn get_text(&self, url: &str, source: RemoteSource) -> Result<Option<String>, FetchError>;
}

/// Result of one request attempt.
enum Attempt<T> {
    Done(T),
    RateLimited,
}

pub struct HttpFetcher {
    agent: ureq::Agent,
    limiter: RateLimiter,
    user_agent: String,
    backoff: Duration,
    interrupt: Option<Arc<AtomicBool>>,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            limiter: RateLimiter::default(),
            user_agent: user_agent.to_string(),
            backoff: DEFAULT_RATE_LIMIT_BACKOFF,
            interrupt: None,
        }
    }

    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Requests fail with `FetchError::Interrupted` once `interrupt` is set.
    pub fn with_interrupt(mut self, interrupt: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    fn interrupted(&self) -> bool {
        self.interrupt
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Run `attempt` behind the limiter, backing off and retrying while it
    /// reports a rate limit.
    fn with_retries<T>(
        &self,
        url: &str,
        source: RemoteSource,
        mut attempt: impl FnMut() -> Result<Attempt<T>, FetchError>,
    ) -> Result<T, FetchError> {
        loop {
            if self.interrupted() {
                return Err(FetchError::Interrupted {
                    url: url.to_string(),
                });
            }
            self.limiter.wait(source);
            match attempt()? {
                Attempt::Done(value) => return Ok(value),
                Attempt::RateLimited => {
                    warn!(
                        "{} rate limited the request, retrying in {:?}",
                        source, self.backoff
                    );
                    thread::sleep(self.backoff);
                }
            }
        }
    }

    fn call(&self, url: &str, source: RemoteSource) -> Result<Option<ureq::Response>, FetchError> {
        self.with_retries(url, source, || {
            debug!(source = %source, url, "GET");
            match self
                .agent
                .get(url)
                .set("User-Agent", &self.user_agent)
                .call()
            {
                Ok(response) => Ok(Attempt::Done(Some(response))),
                Err(ureq::Error::Status(429, _)) => Ok(Attempt::RateLimited),
                Err(ureq::Error::Status(404, _)) => {
                    debug!(source = %source, url, "not found");
                    Ok(Attempt::Done(None))
                }
                Err(ureq::Error::Status(status, _)) => Err(FetchError::Status {
                    status,
                    url: url.to_string(),
                }),
                Err(ureq::Error::Transport(transport)) => Err(FetchError::Transport {
                    url: url.to_string(),
                    message: transport.to_string(),
                }),
            }
        })
    }
}

impl Fetcher for HttpFetcher {
    fn get_json(&self, url: &str, source: RemoteSource) -> Result<Option<Value>, FetchError> {
        let Some(response) = self.call(url, source)? else {
            return Ok(None);
        };
        response
            .into_json::<Value>()
            .map(Some)
            .map_err(|e| FetchError::Decode {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    fn get_text(&self, url: &str, source: RemoteSource) -> Result<Option<String>, FetchError> {
        let Some(response) = self.call(url, source)? else {
            return Ok(None);
        };
        response
            .into_string()
            .map(Some)
            .map_err(|e| FetchError::Decode {
                url: url.to_string(),
                message: e.to_string(),
            })
    }
}

// ============================================================================
// In-memory fetcher for tests
// ============================================================================

#[cfg(test)]
pub mod fake {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;

    /// Serves canned bodies by URL; unknown URLs are not-found.
    #[derive(Default)]
    pub struct FakeFetcher {
        pub json: HashMap<String, Value>,
        pub text: HashMap<String, String>,
        pub requests: RefCell<Vec<(RemoteSource, String)>>,
    }

    impl FakeFetcher {
        pub fn with_json(mut self, url: &str, body: Value) -> Self {
            self.json.insert(url.to_string(), body);
            self
        }

        pub fn with_text(mut self, url: &str, body: &str) -> Self {
            self.text.insert(url.to_string(), body.to_string());
            self
        }
    }

    impl Fetcher for FakeFetcher {
        fn get_json(&self, url: &str, source: RemoteSource) -> Result<Option<Value>, FetchError> {
            self.requests.borrow_mut().push((source, url.to_string()));
            Ok(self.json.get(url).cloned())
        }

        fn get_text(&self, url: &str, source: RemoteSource) -> Result<Option<String>, FetchError> {
            self.requests.borrow_mut().push((source, url.to_string()));
            Ok(self.text.get(url).cloned())
        }
    }
}
