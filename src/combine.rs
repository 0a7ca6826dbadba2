//! Merging per-source field records into one combined record.
//!
//! Sequences accumulate as ordered unions (first source wins on order),
//! nested maps merge recursively, and two differing scalars for the same key
//! are a conflict that fails the item.

use crate::error::{ResolveError, Result};
use crate::genre::{GenreExclusions, GenreResolver};
use crate::models::{CombinedRecord, FieldKey, FieldRecord, FieldValue, SourceName};

pub struct FieldCombiner {
    resolver: GenreResolver,
    exclusions: GenreExclusions,
}

impl FieldCombiner {
    pub fn new(exclusions: GenreExclusions) -> Self {
        Self {
            resolver: GenreResolver::new(),
            exclusions,
        }
    }

    pub fn exclusions(&self) -> &GenreExclusions {
        &self.exclusions
    }

    /// Merge records left to right, then resolve the genre list.
    pub fn combine<'r, I>(&self, records: I) -> Result<CombinedRecord>
    where
        I: IntoIterator<Item = (SourceName, &'r FieldRecord)>,
    {
        let mut combined = CombinedRecord::default();
        for (source, record) in records {
            merge_record(&mut combined.fields, record)?;
            if !combined.sources.contains(&source) {
                combined.sources.push(source);
            }
        }
        self.resolve_genres(&mut combined.fields);
        Ok(combined)
    }

    /// Merge an already combined record into `acc` with the same rules.
    pub fn absorb(&self, acc: &mut CombinedRecord, other: &CombinedRecord) -> Result<()> {
        merge_record(&mut acc.fields, &other.fields)?;
        for source in &other.sources {
            if !acc.sources.contains(source) {
                acc.sources.push(*source);
            }
        }
        self.resolve_genres(&mut acc.fields);
        Ok(())
    }

    /// Replace `genres` with its resolved form, unless resolution leaves nothing.
    fn resolve_genres(&self, fields: &mut FieldRecord) {
        let Some(FieldValue::List(raw)) = fields.get(FieldKey::Genres) else {
            return;
        };
        let resolved = self.resolver.resolve(raw, &self.exclusions);
        if !resolved.is_empty() {
            fields.insert(FieldKey::Genres, FieldValue::List(resolved));
        }
    }
}

/// Merge every field of `incoming` into `acc`.
pub fn merge_record(acc: &mut FieldRecord, incoming: &FieldRecord) -> Result<()> {
    for (key, value) in incoming.iter() {
        match acc.get_mut(*key) {
            Some(existing) => merge_value(key.as_str(), existing, value)?,
            None => acc.insert(*key, strip_blanks(value)),
        }
    }
    Ok(())
}

fn merge_value(path: &str, acc: &mut FieldValue, incoming: &FieldValue) -> Result<()> {
    match (&mut *acc, incoming) {
        (FieldValue::List(existing), FieldValue::List(values)) => {
            for value in values {
                if !value.trim().is_empty() && !existing.contains(value) {
                    existing.push(value.clone());
                }
            }
        }
        (FieldValue::Map(existing), FieldValue::Map(values)) => {
            for (name, value) in values {
                match existing.get_mut(name) {
                    Some(inner) => merge_value(&format!("{}.{}", path, name), inner, value)?,
                    None => {
                        existing.insert(name.clone(), strip_blanks(value));
                    }
                }
            }
        }
        (existing, incoming) => {
            if *existing != *incoming {
                return Err(ResolveError::Conflict {
                    key: path.to_string(),
                    existing: existing.to_string(),
                    incoming: incoming.to_string(),
                });
            }
        }
    }
    Ok(())
}

fn strip_blanks(value: &FieldValue) -> FieldValue {
    match value {
        FieldValue::List(list) => FieldValue::list(list.iter().cloned()),
        FieldValue::Map(map) => FieldValue::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), strip_blanks(v)))
                .collect(),
        ),
        FieldValue::Text(text) => FieldValue::Text(text.clone()),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn combiner() -> FieldCombiner {
        FieldCombiner::new(GenreExclusions::with_base(["monstercat"]))
    }

    fn record(pairs: &[(FieldKey, &[&str])]) -> FieldRecord {
        let mut record = FieldRecord::new();
        for (key, values) in pairs {
            record.set_list(*key, values.iter().copied());
        }
        record
    }

    #[test]
    fn test_lists_accumulate_first_wins() {
        let a = record(&[(FieldKey::Titles, &["Song", "Alt"])]);
        let b = record(&[(FieldKey::Titles, &["Other", "Song"])]);
        let combined = combiner()
            .combine([(SourceName::TagTitle, &a), (SourceName::ReferencePage, &b)])
            .unwrap();
        assert_eq!(
            combined.fields.list(FieldKey::Titles),
            ["Song".to_string(), "Alt".to_string(), "Other".to_string()]
        );
        assert_eq!(
            combined.sources,
            vec![SourceName::TagTitle, SourceName::ReferencePage]
        );
    }

    #[test]
    fn test_maps_merge_recursively() {
        let mut a = FieldRecord::new();
        let mut extras = BTreeMap::new();
        extras.insert("feat".to_string(), vec!["feat. A".to_string()]);
        a.set_list_map(FieldKey::Extras, extras);

        let mut b = FieldRecord::new();
        let mut extras = BTreeMap::new();
        extras.insert("feat".to_string(), vec!["feat. B".to_string()]);
        extras.insert("wiki_url".to_string(), vec!["https://x".to_string()]);
        b.set_list_map(FieldKey::Extras, extras);

        let combined = combiner()
            .combine([(SourceName::TagTitle, &a), (SourceName::ReferencePage, &b)])
            .unwrap();
        let extras = combined.fields.extras();
        assert_eq!(extras["feat"], vec!["feat. A".to_string(), "feat. B".to_string()]);
        assert_eq!(extras["wiki_url"], vec!["https://x".to_string()]);
    }

    #[test]
    fn test_scalar_conflict() {
        let mut a = FieldRecord::new();
        a.insert(FieldKey::Dates, FieldValue::Text("2019".into()));
        let mut b = FieldRecord::new();
        b.insert(FieldKey::Dates, FieldValue::Text("2020".into()));

        let err = combiner()
            .combine([(SourceName::Recording, &a), (SourceName::LowLevel, &b)])
            .unwrap_err();
        match err {
            ResolveError::Conflict {
                key,
                existing,
                incoming,
            } => {
                assert_eq!(key, "dates");
                assert!(existing.contains("2019"));
                assert!(incoming.contains("2020"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_equal_scalars_do_not_conflict() {
        let mut a = FieldRecord::new();
        a.insert(FieldKey::Dates, FieldValue::Text("2019".into()));
        let combined = combiner()
            .combine([(SourceName::Recording, &a), (SourceName::LowLevel, &a)])
            .unwrap();
        assert_eq!(
            combined.fields.get(FieldKey::Dates),
            Some(&FieldValue::Text("2019".into()))
        );
    }

    #[test]
    fn test_list_versus_scalar_conflicts() {
        let a = record(&[(FieldKey::Dates, &["2019"])]);
        let mut b = FieldRecord::new();
        b.insert(FieldKey::Dates, FieldValue::Text("2019".into()));
        assert!(combiner()
            .combine([(SourceName::Recording, &a), (SourceName::LowLevel, &b)])
            .is_err());
    }

    #[test]
    fn test_genres_resolved_after_merge() {
        let a = record(&[(FieldKey::Genres, &["dnb", "Monstercat"])]);
        let b = record(&[(FieldKey::Genres, &["DNB", "electropop"])]);
        let combined = combiner()
            .combine([(SourceName::TagTitle, &a), (SourceName::TagDescription, &b)])
            .unwrap();
        assert_eq!(
            combined.fields.list(FieldKey::Genres),
            ["Drum & Bass".to_string(), "Electro Pop".to_string()]
        );
    }

    #[test]
    fn test_empty_resolution_keeps_raw_genres() {
        let a = record(&[(FieldKey::Genres, &["Monstercat", "dance"])]);
        let combined = combiner().combine([(SourceName::TagTitle, &a)]).unwrap();
        assert_eq!(
            combined.fields.list(FieldKey::Genres),
            ["Monstercat".to_string(), "dance".to_string()]
        );
    }

    #[test]
    fn test_disjoint_keys_order_independent() {
        let a = record(&[(FieldKey::Titles, &["Song"])]);
        let b = record(&[(FieldKey::Artists, &["Artist"])]);
        let c = record(&[(FieldKey::Genres, &["trap"])]);
        let c1 = combiner()
            .combine([
                (SourceName::TagTitle, &a),
                (SourceName::TagContainer, &b),
                (SourceName::TagDescription, &c),
            ])
            .unwrap();
        let c2 = combiner()
            .combine([
                (SourceName::TagDescription, &c),
                (SourceName::TagTitle, &a),
                (SourceName::TagContainer, &b),
            ])
            .unwrap();
        assert_eq!(c1.fields, c2.fields);
    }

    #[test]
    fn test_combine_is_idempotent() {
        let a = record(&[
            (FieldKey::Titles, &["Song", "Alt"]),
            (FieldKey::Genres, &["MelodicDubstep"]),
        ]);
        let mut b = record(&[(FieldKey::Artists, &["Artist"])]);
        b.insert(FieldKey::Dates, FieldValue::Text("2020".into()));

        let combiner = combiner();
        let combined = combiner
            .combine([(SourceName::TagTitle, &a), (SourceName::Recording, &b)])
            .unwrap();
        let mut again = combined.clone();
        combiner.absorb(&mut again, &combined).unwrap();
        assert_eq!(again, combined);
    }
}
