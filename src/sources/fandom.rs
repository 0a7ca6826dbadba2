//! Fandom (MediaWiki) reference wiki access.
//!
//! Only the public MediaWiki query API and the rendered page itself are used:
//! `action=query&titles=` for direct lookups, `list=search` for searches, and
//! a plain GET of the canonical page URL for content.

use serde::Deserialize;
use tracing::debug;

use crate::error::{FetchError, ResolveError, Result};
use crate::fetch::Fetcher;
use crate::normalize::ensure_caps;
use crate::rate_limit::RemoteSource;

/// Page identity on the reference wiki
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WikiPage {
    pub page_id: u64,
    pub title: String,
    pub url: String,
}

/// One search result: (title, page id)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchHit {
    pub title: String,
    #[serde(rename = "pageid")]
    pub page_id: u64,
}

/// Operations the page resolver needs from a reference wiki.
pub trait ReferenceWiki {
    /// Direct lookup by title, following redirects. `None` if no such page.
    fn lookup(&self, title: &str) -> Result<Option<WikiPage>>;

    /// Full-text search, best hits first.
    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;

    /// Rendered HTML of a page.
    fn fetch_html(&self, page: &WikiPage) -> Result<String>;

    /// Canonical URL of the page with this title.
    fn page_url(&self, title: &str) -> String;

    /// Human-browsable search URL, for logs.
    fn search_url(&self, query: &str) -> String;
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    query: Option<QueryBody>,
}

#[derive(Debug, Deserialize)]
struct QueryBody {
    #[serde(default)]
    pages: Vec<QueryPage>,
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct QueryPage {
    #[serde(rename = "pageid")]
    page_id: Option<u64>,
    title: String,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    invalid: bool,
}

pub struct FandomClient<'a> {
    fetcher: &'a dyn Fetcher,
    wiki: String,
}

impl<'a> FandomClient<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, wiki: &str) -> Self {
        Self {
            fetcher,
            wiki: wiki.to_lowercase(),
        }
    }

    pub fn wiki(&self) -> &str {
        &self.wiki
    }

    fn api_url(&self, params: &[(&str, &str)]) -> String {
        let query: Vec<String> = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect();
        format!("https://{}.fandom.com/api.php?{}", self.wiki, query.join("&"))
    }

    fn query(&self, params: &[(&str, &str)]) -> Result<Option<QueryBody>> {
        let url = self.api_url(params);
        let Some(body) = self.fetcher.get_json(&url, RemoteSource::Fandom)? else {
            return Ok(None);
        };
        let response: QueryResponse = serde_json::from_value(body).map_err(|e| {
            ResolveError::Fetch(FetchError::Decode {
                url: url.clone(),
                message: e.to_string(),
            })
        })?;
        Ok(response.query)
    }

    fn lookup_exact(&self, title: &str) -> Result<Option<WikiPage>> {
        let Some(body) = self.query(&[
            ("action", "query"),
            ("format", "json"),
            ("formatversion", "2"),
            ("redirects", "1"),
            ("titles", title),
        ])?
        else {
            return Ok(None);
        };

        let page = body
            .pages
            .into_iter()
            .next()
            .filter(|p| !p.missing && !p.invalid);
        Ok(page.and_then(|p| {
            p.page_id.map(|page_id| WikiPage {
                page_id,
                url: self.page_url(&p.title),
                title: p.title,
            })
        }))
    }
}

impl ReferenceWiki for FandomClient<'_> {
    /// Falls back to the word-capitalised title once before giving up.
    fn lookup(&self, title: &str) -> Result<Option<WikiPage>> {
        if let Some(page) = self.lookup_exact(title)? {
            return Ok(Some(page));
        }
        let capitalised = ensure_caps(title);
        if capitalised == title {
            return Ok(None);
        }
        debug!("no page titled {:?}, trying {:?}", title, capitalised);
        self.lookup_exact(&capitalised)
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let limit = limit.to_string();
        let body = self.query(&[
            ("action", "query"),
            ("format", "json"),
            ("formatversion", "2"),
            ("list", "search"),
            ("srlimit", limit.as_str()),
            ("srsearch", query),
        ])?;
        Ok(body.map(|b| b.search).unwrap_or_default())
    }

    fn fetch_html(&self, page: &WikiPage) -> Result<String> {
        self.fetcher
            .get_text(&page.url, RemoteSource::Fandom)?
            .ok_or_else(|| ResolveError::NotFound(format!("page content for {}", page.url)))
    }

    fn page_url(&self, title: &str) -> String {
        format!(
            "https://{}.fandom.com/wiki/{}",
            self.wiki,
            urlencoding::encode(&title.replace(' ', "_"))
        )
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "https://{}.fandom.com/wiki/Special:Search?query={}",
            self.wiki,
            urlencoding::encode(query)
        )
    }
}
