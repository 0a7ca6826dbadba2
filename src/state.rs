//! Persisted run artifacts.
//!
//! Two files carry state from one run to the next: the results file, a JSON
//! object mapping path to combined record, and the failure file, a JSON list
//! of paths. Older failure files were plain newline-separated text, and both
//! forms are accepted on read.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tracing::{debug, info};

use crate::models::CombinedRecord;

/// Combined records keyed by path, ordered so written files are stable.
pub type ResultsByPath = BTreeMap<String, CombinedRecord>;

/// Paths that failed, in the order they failed, without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailedPaths {
    paths: Vec<String>,
}

impl FailedPaths {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse either a JSON list or one path per line.
    pub fn parse(contents: &str) -> Self {
        let mut failed = Self::new();
        match serde_json::from_str::<Vec<String>>(contents) {
            Ok(paths) => paths.into_iter().for_each(|p| failed.push(p)),
            Err(_) => contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .for_each(|line| failed.push(line.to_string())),
        }
        failed
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    /// Append unless already present.
    pub fn push(&mut self, path: String) {
        if !self.contains(&path) {
            self.paths.push(path);
        }
    }

    /// Returns true if the path was present.
    pub fn remove(&mut self, path: &str) -> bool {
        let before = self.paths.len();
        self.paths.retain(|p| p != path);
        self.paths.len() != before
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.paths.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.paths
    }
}

/// Everything a run reads at start and writes at the end.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunState {
    pub results: ResultsByPath,
    pub failed: FailedPaths,
}

impl RunState {
    /// Load both artifacts. A missing file is an empty artifact.
    pub fn load(results_file: &Path, failed_file: &Path) -> Result<Self> {
        let results = match read_optional(results_file)? {
            Some(contents) if !contents.trim().is_empty() => serde_json::from_str(&contents)
                .with_context(|| {
                    format!("Failed to parse results file {}", results_file.display())
                })?,
            _ => ResultsByPath::new(),
        };
        let failed = read_optional(failed_file)?
            .map(|contents| FailedPaths::parse(&contents))
            .unwrap_or_default();

        info!(
            "Loaded {} results from {} and {} failures from {}",
            results.len(),
            results_file.display(),
            failed.len(),
            failed_file.display()
        );
        Ok(Self { results, failed })
    }

    /// Overwrite both artifacts in place.
    pub fn save(&self, results_file: &Path, failed_file: &Path) -> Result<()> {
        write_pretty(results_file, &self.results)
            .with_context(|| format!("Failed to write results file {}", results_file.display()))?;
        write_pretty(failed_file, &self.failed.paths)
            .with_context(|| format!("Failed to write failure file {}", failed_file.display()))?;
        info!(
            "Saved {} results and {} failures",
            self.results.len(),
            self.failed.len()
        );
        Ok(())
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        debug!("{} does not exist yet", path.display());
        return Ok(None);
    }
    fs::read_to_string(path)
        .map(Some)
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// JSON with 4-space indentation and raw UTF-8 strings.
pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(String::from_utf8(buf)?)
}

fn write_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, to_pretty_json(value)?)?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
