//! Reference-page resolution.
//!
//! Finds the wiki page documenting an item from its candidate titles, artists
//! and title extras, then extracts the page's canonical titles and genres.
//!
//! Pages are fetched and parsed through a `PageRegistry`, which keeps one
//! parsed page per page id (plus lookup and search results) for the lifetime
//! of a run, so a page referenced by many items is fetched once.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

use crate::error::{ResolveError, Result};
use crate::models::{FieldKey, FieldRecord};
use crate::normalize::collapse_whitespace;
use crate::scoring::{is_exact_ratio, similarity_ratio};
use crate::sources::{ReferenceWiki, SearchHit, WikiPage};
use crate::title::ExtraCategory;

/// Default number of search hits considered per query
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

// ============================================================================
// Page Extraction
// ============================================================================

static SONG_CATEGORY: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"li.category.normal[data-name="Songs"]"#).unwrap());

static DATA_SOURCE_DIV: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div[data-source]").unwrap());

static NAME_SOURCE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"[data-source="Name"]"#).unwrap());

static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    Song,
    Disambiguation,
    Unknown,
}

impl PageType {
    pub fn as_str(self) -> &'static str {
        match self {
            PageType::Song => "song",
            PageType::Disambiguation => "disambiguation",
            PageType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a rendered page: a disambiguation marker anywhere wins, then a
/// "Songs" category entry.
pub fn classify_page(html: &str, document: &Html) -> PageType {
    if html.contains("disambiguation") {
        PageType::Disambiguation
    } else if document.select(&SONG_CATEGORY).next().is_some() {
        PageType::Song
    } else {
        PageType::Unknown
    }
}

/// Genre links from every genre-labelled infobox section, split on `|`.
pub fn extract_genres(document: &Html) -> Vec<String> {
    let mut genres: Vec<String> = Vec::new();
    let sections = document.select(&DATA_SOURCE_DIV).filter(|div| {
        div.value()
            .attr("data-source")
            .is_some_and(|source| source.to_lowercase().contains("genre"))
    });
    for section in sections {
        for link in section.select(&LINK) {
            let text: String = link.text().collect();
            for genre in text.split('|').map(str::trim) {
                if !genre.is_empty() && !genres.iter().any(|g| g == genre) {
                    genres.push(genre.to_string());
                }
            }
        }
    }
    genres
}

/// Direct text of every "Name" infobox entry. Several distinct fragments are
/// joined into one title.
pub fn extract_titles(document: &Html) -> Vec<String> {
    let mut fragments: Vec<String> = Vec::new();
    for element in document.select(&NAME_SOURCE) {
        for child in element.children() {
            let Some(text) = child.value().as_text() else {
                continue;
            };
            let text: &str = text;
            if !text.trim().is_empty() && !fragments.iter().any(|f| f == text) {
                fragments.push(text.to_string());
            }
        }
    }
    match fragments.len() {
        0 => Vec::new(),
        1 => vec![collapse_whitespace(&fragments[0])],
        _ => {
            warn!("multiple titles found on page: {:?}", fragments);
            vec![collapse_whitespace(&fragments.concat())]
        }
    }
}

// ============================================================================
// Page Registry
// ============================================================================

/// A fetched and parsed reference page.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferencePage {
    pub page: WikiPage,
    pub page_type: PageType,
    pub genres: Vec<String>,
    pub titles: Vec<String>,
}

impl ReferencePage {
    pub fn from_html(page: WikiPage, html: &str) -> Self {
        let document = Html::parse_document(html);
        Self {
            page_type: classify_page(html, &document),
            genres: extract_genres(&document),
            titles: extract_titles(&document),
            page,
        }
    }
}

/// Run-scoped cache of wiki lookups, searches and parsed pages.
pub struct PageRegistry<'w> {
    wiki: &'w dyn ReferenceWiki,
    pages: RefCell<FxHashMap<u64, Rc<ReferencePage>>>,
    lookups: RefCell<FxHashMap<String, Option<WikiPage>>>,
    searches: RefCell<FxHashMap<(String, usize), Vec<SearchHit>>>,
}

impl<'w> PageRegistry<'w> {
    pub fn new(wiki: &'w dyn ReferenceWiki) -> Self {
        Self {
            wiki,
            pages: RefCell::new(FxHashMap::default()),
            lookups: RefCell::new(FxHashMap::default()),
            searches: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn wiki(&self) -> &dyn ReferenceWiki {
        self.wiki
    }

    /// Parsed page for this identity, fetching it on first use.
    pub fn get_or_create(&self, page: &WikiPage) -> Result<Rc<ReferencePage>> {
        if let Some(cached) = self.pages.borrow().get(&page.page_id) {
            return Ok(Rc::clone(cached));
        }
        let html = self.wiki.fetch_html(page)?;
        let parsed = Rc::new(ReferencePage::from_html(page.clone(), &html));
        debug!(
            "parsed page {} ({}) as {}",
            parsed.page.title, parsed.page.page_id, parsed.page_type
        );
        self.pages
            .borrow_mut()
            .insert(page.page_id, Rc::clone(&parsed));
        Ok(parsed)
    }

    pub fn lookup(&self, title: &str) -> Result<Option<WikiPage>> {
        if let Some(cached) = self.lookups.borrow().get(title) {
            return Ok(cached.clone());
        }
        let page = self.wiki.lookup(title)?;
        self.lookups
            .borrow_mut()
            .insert(title.to_string(), page.clone());
        Ok(page)
    }

    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let key = (query.to_string(), limit);
        if let Some(cached) = self.searches.borrow().get(&key) {
            return Ok(cached.clone());
        }
        let hits = self.wiki.search(query, limit)?;
        self.searches.borrow_mut().insert(key, hits.clone());
        Ok(hits)
    }

    pub fn page_for_hit(&self, hit: &SearchHit) -> WikiPage {
        WikiPage {
            page_id: hit.page_id,
            title: hit.title.clone(),
            url: self.wiki.page_url(&hit.title),
        }
    }

    pub fn cached_pages(&self) -> usize {
        self.pages.borrow().len()
    }
}

// ============================================================================
// Page Info
// ============================================================================

/// A candidate page together with how it was found.
#[derive(Debug, Clone)]
pub struct ReferencePageInfo {
    pub page: Rc<ReferencePage>,
    /// Search query that produced this hit; `None` for a direct lookup
    pub query: Option<String>,
    pub similarity: Option<f64>,
}

impl ReferencePageInfo {
    pub fn new(page: Rc<ReferencePage>, query: Option<&str>) -> Self {
        let similarity = query.map(|q| similarity_ratio(q, &page.page.title));
        Self {
            page,
            query: query.map(str::to_string),
            similarity,
        }
    }

    pub fn page_type(&self) -> PageType {
        self.page.page_type
    }

    pub fn is_exact_match(&self) -> bool {
        is_exact_ratio(self.similarity)
    }

    pub fn url(&self) -> &str {
        &self.page.page.url
    }

    /// Ascending by similarity, `None` lowest.
    pub fn cmp_similarity(&self, other: &Self) -> Ordering {
        match (self.similarity, other.similarity) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        }
    }

    /// Fields the page contributes to an item.
    pub fn to_fields(&self) -> FieldRecord {
        let mut fields = FieldRecord::new();
        fields.set_list(FieldKey::Titles, self.page.titles.iter().cloned());
        fields.set_list(FieldKey::Genres, self.page.genres.iter().cloned());
        let mut extras = BTreeMap::new();
        extras.insert("wiki_url".to_string(), vec![self.url().to_string()]);
        fields.set_list_map(FieldKey::Extras, extras);
        fields
    }
}

/// Page identity only; how the page was found does not matter.
impl PartialEq for ReferencePageInfo {
    fn eq(&self, other: &Self) -> bool {
        self.page.page.page_id == other.page.page.page_id
    }
}

impl fmt::Display for ReferencePageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] query={:?} similarity={:?} url={}",
            self.page.page.title,
            self.page_type(),
            self.query,
            self.similarity,
            self.url()
        )
    }
}

// ============================================================================
// Resolver
// ============================================================================

pub struct ReferencePageResolver<'r, 'w> {
    registry: &'r PageRegistry<'w>,
    brand: String,
    search_limit: usize,
}

impl<'r, 'w> ReferencePageResolver<'r, 'w> {
    pub fn new(registry: &'r PageRegistry<'w>, brand: &str) -> Self {
        Self {
            registry,
            brand: brand.to_lowercase(),
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    pub fn with_search_limit(mut self, search_limit: usize) -> Self {
        self.search_limit = search_limit;
        self
    }

    /// Qualifiers for same-named pages: every extra not mentioning the brand,
    /// then the primary artist unless the title is a remix.
    pub fn disambiguators(
        &self,
        artists: &[String],
        extras: &[(String, Vec<String>)],
    ) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let mut include_artist = true;
        for (category, values) in extras {
            if category == ExtraCategory::Remix.as_str() {
                include_artist = false;
            }
            for value in values {
                if !value.to_lowercase().contains(&self.brand) && !out.contains(value) {
                    out.push(value.clone());
                }
            }
        }
        if include_artist {
            if let Some(artist) = artists.first() {
                if !out.contains(artist) {
                    out.push(artist.clone());
                }
            }
        }
        out
    }

    fn page_info(&self, page: &WikiPage, query: Option<&str>) -> Result<ReferencePageInfo> {
        let parsed = self.registry.get_or_create(page)?;
        Ok(ReferencePageInfo::new(parsed, query))
    }

    /// Song pages reachable from one title. A single exact song page ends the
    /// search early and is returned alone.
    pub fn candidates_for_title(
        &self,
        title: &str,
        disambiguators: &[String],
    ) -> Result<Vec<ReferencePageInfo>> {
        let mut queries: Vec<String> = disambiguators
            .iter()
            .map(|d| format!("{} ({})", title, d))
            .collect();

        match self.registry.lookup(title)? {
            Some(page) => {
                let info = self.page_info(&page, None)?;
                match info.page_type() {
                    PageType::Song => return Ok(vec![info]),
                    PageType::Disambiguation => {
                        info!("Found disambiguation page; searching with disambiguators")
                    }
                    PageType::Unknown => {
                        debug!("page {} is neither song nor disambiguation", page.title)
                    }
                }
            }
            None => {
                info!("Did not find page; searching for title, then with disambiguators");
                queries.insert(0, format!("\"{}\"", title));
                queries.insert(0, title.to_string());
            }
        }

        let mut found: Vec<ReferencePageInfo> = Vec::new();
        for query in &queries {
            info!("search query = '{}'", self.registry.wiki().search_url(query));
            for hit in self.registry.search(query, self.search_limit)? {
                let page = self.registry.page_for_hit(&hit);
                let info = self.page_info(&page, Some(query))?;
                if info.page_type() != PageType::Song {
                    continue;
                }
                if info.is_exact_match() {
                    return Ok(vec![info]);
                }
                if !found.contains(&info) {
                    found.push(info);
                }
            }
        }
        Ok(found)
    }

    /// Best song page across all candidate titles.
    pub fn resolve(
        &self,
        titles: &[String],
        artists: &[String],
        extras: &[(String, Vec<String>)],
    ) -> Result<ReferencePageInfo> {
        let disambiguators = self.disambiguators(artists, extras);
        info!(
            "Finding page for titles={:?}, disambiguators={:?}",
            titles, disambiguators
        );

        let mut found: Vec<ReferencePageInfo> = Vec::new();
        for title in titles {
            for info in self.candidates_for_title(title, &disambiguators)? {
                if !found.contains(&info) {
                    found.push(info);
                }
            }
        }

        let exact: Vec<&ReferencePageInfo> =
            found.iter().filter(|info| info.is_exact_match()).collect();
        if exact.len() > 1 {
            let pages: Vec<String> = exact.iter().map(|info| info.to_string()).collect();
            return Err(ResolveError::AmbiguousMatch(pages.join("; ")));
        }
        if let Some(info) = exact.first() {
            info!("Found exact match: {}", info);
            return Ok((*info).clone());
        }

        let best = best_candidate(found)
            .ok_or_else(|| ResolveError::NotFound(format!("no song page for {:?}", titles)))?;
        info!("Found best match: {}", best);
        Ok(best)
    }
}

/// Most similar candidate; ties go to the one found first.
fn best_candidate(found: Vec<ReferencePageInfo>) -> Option<ReferencePageInfo> {
    found.into_iter().reduce(|best, info| {
        if info.cmp_similarity(&best) == Ordering::Greater {
            info
        } else {
            best
        }
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
pub mod fake {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;

    /// In-memory wiki recording every lookup and search it serves.
    #[derive(Default)]
    pub struct FakeWiki {
        pub pages: HashMap<u64, (String, String)>,
        pub titles: HashMap<String, u64>,
        pub results: HashMap<String, Vec<u64>>,
        pub lookups: RefCell<Vec<String>>,
        pub searches: RefCell<Vec<String>>,
        pub fetches: RefCell<Vec<u64>>,
    }

    pub fn song_html(name: &str, genres: &str) -> String {
        format!(
            r#"<html><body><aside>
<h2 data-source="Name">{name}</h2>
<div data-source="Genre"><a href="/wiki/G">{genres}</a></div>
</aside><ul><li class="category normal" data-name="Songs"><a href="/wiki/Category:Songs">Songs</a></li></ul>
</body></html>"#
        )
    }

    pub fn disambiguation_html() -> String {
        "<html><body><p>This is a disambiguation page.</p></body></html>".to_string()
    }

    impl FakeWiki {
        /// Add a page; `direct` also makes it reachable by exact-title lookup.
        pub fn page(mut self, id: u64, title: &str, html: String, direct: bool) -> Self {
            self.pages.insert(id, (title.to_string(), html));
            if direct {
                self.titles.insert(title.to_string(), id);
            }
            self
        }

        pub fn search_result(mut self, query: &str, ids: &[u64]) -> Self {
            self.results.insert(query.to_string(), ids.to_vec());
            self
        }
    }

    impl ReferenceWiki for FakeWiki {
        fn lookup(&self, title: &str) -> Result<Option<WikiPage>> {
            self.lookups.borrow_mut().push(title.to_string());
            Ok(self.titles.get(title).map(|id| WikiPage {
                page_id: *id,
                title: title.to_string(),
                url: self.page_url(title),
            }))
        }

        fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
            self.searches.borrow_mut().push(query.to_string());
            Ok(self
                .results
                .get(query)
                .map(|ids| {
                    ids.iter()
                        .take(limit)
                        .filter_map(|id| {
                            self.pages.get(id).map(|(title, _)| SearchHit {
                                title: title.clone(),
                                page_id: *id,
                            })
                        })
                        .collect()
                })
                .unwrap_or_default())
        }

        fn fetch_html(&self, page: &WikiPage) -> Result<String> {
            self.fetches.borrow_mut().push(page.page_id);
            self.pages
                .get(&page.page_id)
                .map(|(_, html)| html.clone())
                .ok_or_else(|| ResolveError::NotFound(page.url.clone()))
        }

        fn page_url(&self, title: &str) -> String {
            format!("https://wiki.test/wiki/{}", title.replace(' ', "_"))
        }

        fn search_url(&self, query: &str) -> String {
            format!("https://wiki.test/wiki/Special:Search?query={}", query)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::*;
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn extras(pairs: &[(&str, &[&str])]) -> Vec<(String, Vec<String>)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), strings(v)))
            .collect()
    }

    #[test]
    fn test_classify_and_extract() {
        let html = r#"<html><body>
<h2 data-source="Name">Lost In Time</h2>
<div data-source="genre"><a>Dubstep</a><a>Drumstep | Trap</a><a>Dubstep</a></div>
<div data-source="Genre2"><a>Trap</a><a>Future Bass</a></div>
<div data-source="label"><a>Monstercat</a></div>
<ul><li class="category normal" data-name="Songs"><a>Songs</a></li></ul>
</body></html>"#;
        let document = Html::parse_document(html);
        assert_eq!(classify_page(html, &document), PageType::Song);
        assert_eq!(
            extract_genres(&document),
            strings(&["Dubstep", "Drumstep", "Trap", "Future Bass"])
        );
        assert_eq!(extract_titles(&document), strings(&["Lost In Time"]));
    }

    #[test]
    fn test_classify_disambiguation_and_unknown() {
        let html = disambiguation_html();
        assert_eq!(
            classify_page(&html, &Html::parse_document(&html)),
            PageType::Disambiguation
        );
        let other = "<html><body><p>An artist page</p></body></html>";
        assert_eq!(
            classify_page(other, &Html::parse_document(other)),
            PageType::Unknown
        );
    }

    #[test]
    fn test_split_name_fragments_are_joined() {
        let html = r#"<h2 data-source="Name">Lost <i>in</i> Time</h2>"#;
        let titles = extract_titles(&Html::parse_document(html));
        assert_eq!(titles, strings(&["Lost Time"]));
    }

    #[test]
    fn test_disambiguators() {
        let wiki = FakeWiki::default();
        let registry = PageRegistry::new(&wiki);
        let resolver = ReferencePageResolver::new(&registry, "Monstercat");

        let d = resolver.disambiguators(
            &strings(&["Artist X", "Artist Z"]),
            &extras(&[
                ("feat", &["feat. Artist Y"]),
                ("release", &["Monstercat Release"]),
            ]),
        );
        assert_eq!(d, strings(&["feat. Artist Y", "Artist X"]));

        let d = resolver.disambiguators(
            &strings(&["Artist X"]),
            &extras(&[("remix", &["Someone Remix"])]),
        );
        assert_eq!(d, strings(&["Someone Remix"]));

        let d = resolver.disambiguators(
            &strings(&["Artist X"]),
            &extras(&[("uncategorized", &["Live"]), ("feat", &["feat. Artist Y"])]),
        );
        assert_eq!(d, strings(&["Live", "feat. Artist Y", "Artist X"]));
    }

    #[test]
    fn test_direct_lookup_song_issues_no_search() {
        let wiki = FakeWiki::default().page(1, "Lost In Time", song_html("Lost In Time", "Dubstep"), true);
        let registry = PageRegistry::new(&wiki);
        let resolver = ReferencePageResolver::new(&registry, "monstercat");

        let info = resolver
            .resolve(&strings(&["Lost In Time"]), &strings(&["Rogue"]), &[])
            .unwrap();
        assert!(info.is_exact_match());
        assert_eq!(info.similarity, None);
        assert_eq!(wiki.lookups.borrow().len(), 1);
        assert!(wiki.searches.borrow().is_empty());
    }

    #[test]
    fn test_disambiguation_stops_at_first_exact_query() {
        let wiki = FakeWiki::default()
            .page(1, "Song", disambiguation_html(), true)
            .page(2, "Song (Artist A) Live", song_html("Song", "House"), false)
            .page(3, "Song (Artist B)", song_html("Song", "Trap"), false)
            .page(4, "Song (Artist C)", song_html("Song", "Dubstep"), false)
            .search_result("Song (Artist A)", &[2])
            .search_result("Song (Artist B)", &[3])
            .search_result("Song (Artist C)", &[4]);
        let registry = PageRegistry::new(&wiki);
        let resolver = ReferencePageResolver::new(&registry, "monstercat");

        let found = resolver
            .candidates_for_title("Song", &strings(&["Artist A", "Artist B", "Artist C"]))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].page.page.page_id, 3);
        assert!(found[0].is_exact_match());
        assert_eq!(
            *wiki.searches.borrow(),
            strings(&["Song (Artist A)", "Song (Artist B)"])
        );
        assert!(!wiki.fetches.borrow().contains(&4));
    }

    #[test]
    fn test_missing_page_searches_bare_and_quoted_first() {
        let wiki = FakeWiki::default()
            .page(5, "Lost In Time (Rogue) VIP", song_html("Lost In Time VIP", "Dubstep"), false)
            .search_result("Lost In Time", &[5]);
        let registry = PageRegistry::new(&wiki);
        let resolver = ReferencePageResolver::new(&registry, "monstercat");

        let info = resolver
            .resolve(&strings(&["Lost In Time"]), &strings(&["Rogue"]), &[])
            .unwrap();
        assert_eq!(info.page.page.page_id, 5);
        assert!(!info.is_exact_match());
        assert_eq!(
            *wiki.searches.borrow(),
            strings(&["Lost In Time", "\"Lost In Time\"", "Lost In Time (Rogue)"])
        );
    }

    #[test]
    fn test_best_similarity_wins() {
        let wiki = FakeWiki::default()
            .page(6, "Completely Different", song_html("X", "A"), false)
            .page(7, "Lost In Time Remix", song_html("Y", "B"), false)
            .search_result("Lost In Time", &[6, 7]);
        let registry = PageRegistry::new(&wiki);
        let resolver = ReferencePageResolver::new(&registry, "monstercat");

        let info = resolver
            .resolve(&strings(&["Lost In Time"]), &[], &[])
            .unwrap();
        assert_eq!(info.page.page.page_id, 7);
    }

    #[test]
    fn test_distinct_exact_matches_are_ambiguous() {
        let wiki = FakeWiki::default()
            .page(1, "Alpha", song_html("Alpha", "House"), true)
            .page(2, "Beta", song_html("Beta", "Trap"), true);
        let registry = PageRegistry::new(&wiki);
        let resolver = ReferencePageResolver::new(&registry, "monstercat");

        let result = resolver.resolve(&strings(&["Alpha", "Beta"]), &[], &[]);
        assert!(matches!(result, Err(ResolveError::AmbiguousMatch(_))));
    }

    #[test]
    fn test_same_page_from_two_titles_is_not_ambiguous() {
        let wiki = FakeWiki::default()
            .page(1, "Alpha", song_html("Alpha", "House"), true)
            .search_result("Alpha Part", &[1]);
        let registry = PageRegistry::new(&wiki);
        let resolver = ReferencePageResolver::new(&registry, "monstercat");

        let info = resolver
            .resolve(&strings(&["Alpha", "Alpha Part"]), &[], &[])
            .unwrap();
        assert_eq!(info.page.page.page_id, 1);
    }

    #[test]
    fn test_no_song_page_is_not_found() {
        let wiki = FakeWiki::default()
            .page(1, "Nothing", "<html><body>artist</body></html>".to_string(), false)
            .search_result("Nothing", &[1]);
        let registry = PageRegistry::new(&wiki);
        let resolver = ReferencePageResolver::new(&registry, "monstercat");
        assert!(matches!(
            resolver.resolve(&strings(&["Nothing"]), &[], &[]),
            Err(ResolveError::NotFound(_))
        ));
    }

    #[test]
    fn test_registry_fetches_each_page_once() {
        let wiki = FakeWiki::default().page(1, "Alpha", song_html("Alpha", "House|Trap"), true);
        let registry = PageRegistry::new(&wiki);
        let resolver = ReferencePageResolver::new(&registry, "monstercat");

        for _ in 0..3 {
            let info = resolver
                .resolve(&strings(&["Alpha"]), &[], &[])
                .unwrap();
            assert_eq!(info.page.genres, strings(&["House", "Trap"]));
        }
        assert_eq!(*wiki.fetches.borrow(), vec![1]);
        assert_eq!(wiki.lookups.borrow().len(), 1);
        assert_eq!(registry.cached_pages(), 1);
    }

    #[test]
    fn test_page_info_fields_and_ordering() {
        let page = Rc::new(ReferencePage::from_html(
            WikiPage {
                page_id: 9,
                title: "Alpha".to_string(),
                url: "https://wiki.test/wiki/Alpha".to_string(),
            },
            &song_html("Alpha", "House"),
        ));
        let direct = ReferencePageInfo::new(Rc::clone(&page), None);
        let searched = ReferencePageInfo::new(Rc::clone(&page), Some("Alpha (X)"));
        assert_eq!(direct, searched);
        assert_eq!(direct.cmp_similarity(&searched), Ordering::Less);

        let fields = direct.to_fields();
        assert_eq!(fields.list(FieldKey::Titles), ["Alpha".to_string()]);
        assert_eq!(fields.list(FieldKey::Genres), ["House".to_string()]);
        assert_eq!(
            fields.extras()["wiki_url"],
            vec!["https://wiki.test/wiki/Alpha".to_string()]
        );
    }

    #[test]
    fn test_best_candidate_tie_keeps_first_found() {
        let page = |id: u64, title: &str| {
            Rc::new(ReferencePage::from_html(
                WikiPage {
                    page_id: id,
                    title: title.to_string(),
                    url: format!("https://wiki.test/wiki/{}", title),
                },
                &song_html(title, "House"),
            ))
        };
        let first = ReferencePageInfo::new(page(1, "Alpha"), Some("Alpha (X)"));
        let second = ReferencePageInfo::new(page(2, "Alpha"), Some("Alpha (X)"));
        assert_eq!(first.cmp_similarity(&second), Ordering::Equal);

        let best = best_candidate(vec![first, second]).unwrap();
        assert_eq!(best.page.page.page_id, 1);
        assert!(best_candidate(Vec::new()).is_none());
    }
}
