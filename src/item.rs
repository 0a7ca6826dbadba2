//! Per-item resolution.
//!
//! An `ItemPipeline` holds the run-wide pieces (tag store, parsers, remote
//! clients, combiner and the enabled source list). For each path it creates
//! an `ItemResolver`, which computes every enabled source's FieldRecord at
//! most once and merges them in source priority order.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::combine::FieldCombiner;
use crate::error::{ResolveError, Result};
use crate::models::{CombinedRecord, FieldKey, FieldRecord, FieldValue, SourceName};
use crate::reference::ReferencePageResolver;
use crate::sources::{FingerprintLookup, FingerprintMatch, IdentitySource};
use crate::tags::{TagFields, TagStore};
use crate::title::{order_extras, DescriptionGenreParser, TitlePatternParser};

/// What the orchestrator needs from an item resolver.
pub trait ResolveItem {
    /// Whether the path's container type can be read at all.
    fn is_supported(&self, path: &Path) -> bool;

    fn resolve(&self, path: &Path) -> Result<CombinedRecord>;
}

// ============================================================================
// Pipeline
// ============================================================================

pub struct ItemPipeline<'a> {
    tags: &'a dyn TagStore,
    title_parser: TitlePatternParser,
    description_parser: DescriptionGenreParser,
    combiner: FieldCombiner,
    sources: Vec<SourceName>,
    fingerprint: Option<&'a dyn FingerprintLookup>,
    recording: Option<&'a dyn IdentitySource>,
    low_level: Option<&'a dyn IdentitySource>,
    reference: Option<&'a ReferencePageResolver<'a, 'a>>,
}

impl<'a> ItemPipeline<'a> {
    /// Sources are deduplicated and kept in merge-priority order.
    pub fn new(
        tags: &'a dyn TagStore,
        title_parser: TitlePatternParser,
        description_parser: DescriptionGenreParser,
        combiner: FieldCombiner,
        sources: &[SourceName],
    ) -> Self {
        let mut sources = sources.to_vec();
        sources.sort();
        sources.dedup();
        Self {
            tags,
            title_parser,
            description_parser,
            combiner,
            sources,
            fingerprint: None,
            recording: None,
            low_level: None,
            reference: None,
        }
    }

    pub fn with_fingerprint(mut self, lookup: &'a dyn FingerprintLookup) -> Self {
        self.fingerprint = Some(lookup);
        self
    }

    pub fn with_recording(mut self, source: &'a dyn IdentitySource) -> Self {
        self.recording = Some(source);
        self
    }

    pub fn with_low_level(mut self, source: &'a dyn IdentitySource) -> Self {
        self.low_level = Some(source);
        self
    }

    pub fn with_reference(mut self, resolver: &'a ReferencePageResolver<'a, 'a>) -> Self {
        self.reference = Some(resolver);
        self
    }

    pub fn sources(&self) -> &[SourceName] {
        &self.sources
    }

    pub fn resolver<'p>(&'p self, path: &Path) -> ItemResolver<'p, 'a> {
        ItemResolver {
            pipeline: self,
            path: path.to_path_buf(),
            tags: None,
            identity: None,
            fields: Vec::new(),
            title_extras: Vec::new(),
        }
    }
}

impl ResolveItem for ItemPipeline<'_> {
    fn is_supported(&self, path: &Path) -> bool {
        self.tags.is_supported(path)
    }

    fn resolve(&self, path: &Path) -> Result<CombinedRecord> {
        self.resolver(path).resolve()
    }
}

// ============================================================================
// Item Resolver
// ============================================================================

pub struct ItemResolver<'p, 'a> {
    pipeline: &'p ItemPipeline<'a>,
    path: PathBuf,
    tags: Option<TagFields>,
    /// `Some(None)` once a fingerprint lookup found nothing
    identity: Option<Option<FingerprintMatch>>,
    /// Computed records in the order they were first requested
    fields: Vec<(SourceName, FieldRecord)>,
    /// Title extras in the order the title parser found them
    title_extras: Vec<String>,
}

impl<'p, 'a> ItemResolver<'p, 'a> {
    fn tags(&mut self) -> Result<&TagFields> {
        let tags = match self.tags.take() {
            Some(tags) => tags,
            None => self.pipeline.tags.read(&self.path)?,
        };
        Ok(self.tags.insert(tags))
    }

    /// Fingerprint identity, looked up once. Not-found degrades to `None`.
    fn identity(&mut self) -> Result<Option<FingerprintMatch>> {
        if let Some(cached) = &self.identity {
            return Ok(cached.clone());
        }
        let found = match self.pipeline.fingerprint {
            None => None,
            Some(lookup) => match lookup.lookup(&self.path) {
                Ok(found) => {
                    debug!("fingerprint identity {}", found.recording_id);
                    Some(found)
                }
                Err(ResolveError::NotFound(reason)) => {
                    warn!("{}: {}", self.path.display(), reason);
                    None
                }
                Err(e) => return Err(e),
            },
        };
        self.identity = Some(found.clone());
        Ok(found)
    }

    /// Record for one source, computed on first access.
    pub fn fields_from(&mut self, source: SourceName) -> Result<&FieldRecord> {
        let index = match self.fields.iter().position(|(s, _)| *s == source) {
            Some(index) => index,
            None => {
                let record = self.compute(source)?;
                self.fields.push((source, record));
                self.fields.len() - 1
            }
        };
        Ok(&self.fields[index].1)
    }

    fn cached(&self, source: SourceName) -> Option<&FieldRecord> {
        self.fields
            .iter()
            .find(|(s, _)| *s == source)
            .map(|(_, record)| record)
    }

    fn compute(&mut self, source: SourceName) -> Result<FieldRecord> {
        match source {
            SourceName::Fingerprint => Ok(self
                .identity()?
                .map(|found| found.fields)
                .unwrap_or_default()),
            SourceName::Recording => {
                let client = self.pipeline.recording;
                self.identity_fields(client)
            }
            SourceName::LowLevel => {
                let client = self.pipeline.low_level;
                self.identity_fields(client)
            }
            SourceName::TagContainer => Ok(self.tags()?.container.clone()),
            SourceName::TagTitle => {
                let title = self.tags()?.title.clone();
                let (record, extras) = self.pipeline.title_parser.parse_with_extras(&title);
                self.title_extras = extras;
                Ok(record)
            }
            SourceName::TagDescription => {
                let description = self.tags()?.description.clone();
                Ok(self.pipeline.description_parser.parse(&description))
            }
            SourceName::ReferencePage => self.reference_fields(),
        }
    }

    fn identity_fields(&mut self, client: Option<&dyn IdentitySource>) -> Result<FieldRecord> {
        let Some(client) = client else {
            return Ok(FieldRecord::new());
        };
        match self.identity()? {
            Some(found) => client.fields_for(&found.recording_id),
            None => Ok(FieldRecord::new()),
        }
    }

    /// Combine the computed records of `sources`, in that order.
    fn combine_sources(&self, sources: &[SourceName]) -> Result<CombinedRecord> {
        self.pipeline.combiner.combine(
            sources
                .iter()
                .filter_map(|source| self.cached(*source).map(|record| (*source, record))),
        )
    }

    fn reference_fields(&mut self) -> Result<FieldRecord> {
        let Some(resolver) = self.pipeline.reference else {
            return Ok(FieldRecord::new());
        };

        let earlier: Vec<SourceName> = self
            .pipeline
            .sources
            .iter()
            .copied()
            .filter(|s| *s != SourceName::ReferencePage)
            .collect();
        for source in &earlier {
            self.fields_from(*source)?;
        }
        let known = self.combine_sources(&earlier)?;

        for required in [FieldKey::Titles, FieldKey::Artists] {
            if !known.fields.contains(required) {
                error!(
                    "required field '{}' missing for {}: {:?}",
                    required,
                    self.path.display(),
                    known.fields
                );
                return Ok(FieldRecord::new());
            }
        }

        let page = resolver.resolve(
            known.fields.list(FieldKey::Titles),
            known.fields.list(FieldKey::Artists),
            &order_extras(&known.fields.extras(), &self.title_extras),
        )?;
        let fields = page.to_fields();
        info!("got fields from reference page: {:?}", fields);

        self.narrow_parsed_titles(fields.list(FieldKey::Titles));
        Ok(fields)
    }

    /// Keep only the parsed titles the reference page confirms.
    fn narrow_parsed_titles(&mut self, confirmed: &[String]) {
        if confirmed.is_empty() {
            return;
        }
        let Some((_, record)) = self
            .fields
            .iter_mut()
            .find(|(s, _)| *s == SourceName::TagTitle)
        else {
            return;
        };
        let kept: Vec<String> = record
            .list(FieldKey::Titles)
            .iter()
            .filter(|title| confirmed.contains(title))
            .cloned()
            .collect();
        if kept.is_empty() {
            record.remove(FieldKey::Titles);
        } else {
            record.insert(FieldKey::Titles, FieldValue::List(kept));
        }
    }

    /// Every enabled source's record, in priority order.
    pub fn fields_from_sources(&mut self) -> Result<Vec<(SourceName, FieldRecord)>> {
        let sources = self.pipeline.sources.clone();
        for source in &sources {
            self.fields_from(*source)?;
        }
        Ok(sources
            .iter()
            .filter_map(|source| self.cached(*source).map(|record| (*source, record.clone())))
            .collect())
    }

    /// Compute every enabled source and merge them.
    pub fn resolve(mut self) -> Result<CombinedRecord> {
        self.tags()?;
        let sources = self.pipeline.sources.clone();
        for source in &sources {
            self.fields_from(*source)?;
        }
        self.combine_sources(&sources)
    }
}

// ============================================================================
// TESTS
// ============================================================================
