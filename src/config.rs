//! Command-line arguments and collection configuration.
//!
//! Collection settings (wiki, brand, patterns, network pacing) live in a
//! `Config` that has built-in defaults, can be overridden by a TOML file, and
//! is finally overridden by command-line flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::genre::GenreExclusions;
use crate::models::{RetryMode, SourceName};
use crate::title::{DEFAULT_DESCRIPTION_GENRE_PATTERN, DEFAULT_TITLE_PATTERN};

pub const DEFAULT_RESULTS_FILE: &str = "resolved.json";
pub const DEFAULT_FAILED_FILE: &str = "failed.json";

// ============================================================================
// Profiles
// ============================================================================

/// Which built-in source set and genre exclusions apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Profile {
    /// Title pattern and description only
    Generic,
    /// Generic plus the curated reference wiki
    #[default]
    Curated,
}

impl Profile {
    pub fn sources(self) -> Vec<SourceName> {
        match self {
            Profile::Generic => vec![SourceName::TagTitle, SourceName::TagDescription],
            Profile::Curated => vec![
                SourceName::TagTitle,
                SourceName::TagDescription,
                SourceName::ReferencePage,
            ],
        }
    }
}

// ============================================================================
// Command Line
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "metaresolve")]
#[command(about = "Resolve canonical titles, artists and genres for a music collection")]
pub struct Args {
    /// Files or directories to resolve
    pub paths: Vec<PathBuf>,

    /// File listing paths, one per line or as a JSON list
    #[arg(long)]
    pub paths_file: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_RESULTS_FILE)]
    pub results_file: PathBuf,

    #[arg(long, default_value = DEFAULT_FAILED_FILE)]
    pub failed_file: PathBuf,

    /// Reprocess previously failed and/or passed paths (failed, passed, all)
    #[arg(long)]
    pub retry: Option<RetryMode>,

    /// Never write the results or failure files
    #[arg(long)]
    pub readonly: bool,

    #[arg(long, value_enum, default_value_t = Profile::Curated)]
    pub profile: Profile,

    /// Extra source to enable (tags, acoustid, musicbrainz, acousticbrainz); repeatable
    #[arg(long = "source")]
    pub sources: Vec<SourceName>,

    /// TOML file overriding the collection settings
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, env = "ACOUSTID_API_KEY", hide_env_values = true)]
    pub acoustid_key: Option<String>,

    /// Reference wiki name, overriding the config file
    #[arg(long)]
    pub wiki: Option<String>,

    /// Title pattern, overriding the config file
    #[arg(long)]
    pub title_pattern: Option<String>,

    /// Log level for this crate when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Disable the spinner and log progress lines instead
    #[arg(long)]
    pub log_only: bool,
}

impl Args {
    /// Profile sources plus every `--source`, in merge-priority order.
    pub fn enabled_sources(&self) -> Vec<SourceName> {
        let mut sources = self.profile.sources();
        sources.extend(self.sources.iter().copied());
        sources.sort();
        sources.dedup();
        sources
    }

    /// Positional paths followed by the paths file's entries.
    pub fn input_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = self.paths.clone();
        if let Some(file) = &self.paths_file {
            paths.extend(read_paths_file(file)?);
        }
        if paths.is_empty() {
            bail!("No input paths given (pass paths or --paths-file)");
        }
        Ok(paths)
    }

    pub fn retry_mode(&self) -> RetryMode {
        self.retry.unwrap_or_default()
    }

    /// Config file (if any) with the command-line overrides applied.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(wiki) = &self.wiki {
            config.wiki = wiki.clone();
        }
        if let Some(pattern) = &self.title_pattern {
            config.title_pattern = pattern.clone();
        }
        Ok(config)
    }
}

/// Read a paths file: a JSON list of strings, or one path per line.
pub fn read_paths_file(path: &Path) -> Result<Vec<PathBuf>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read paths file {}", path.display()))?;
    if let Ok(list) = serde_json::from_str::<Vec<String>>(&content) {
        return Ok(list.into_iter().map(PathBuf::from).collect());
    }
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect())
}

/// Fingerprint-keyed sources cannot run without an AcoustID key.
pub fn check_fingerprint_key(sources: &[SourceName], key: Option<&str>) -> Result<()> {
    let needing: Vec<&str> = sources
        .iter()
        .filter(|s| s.requires_fingerprint())
        .map(|s| s.as_str())
        .collect();
    if !needing.is_empty() && key.map_or(true, |k| k.trim().is_empty()) {
        bail!(
            "Sources {} need an AcoustID API key (--acoustid-key or ACOUSTID_API_KEY)",
            needing.join(", ")
        );
    }
    Ok(())
}

// ============================================================================
// Collection Settings
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Reference wiki name ("<wiki>.fandom.com")
    pub wiki: String,
    /// Label name: excluded from genres and disambiguators
    pub brand: String,
    /// Genre tokens dropped in the curated profile, on top of the brand
    pub genre_exclusions: Vec<String>,
    pub title_pattern: String,
    pub description_genre_pattern: String,
    pub search_limit: usize,
    pub min_request_interval_secs: f64,
    pub rate_limit_backoff_secs: f64,
    pub timeout_secs: u64,
    pub user_agent: String,
    /// `fpcalc` binary used for fingerprinting
    pub fpcalc: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wiki: "monstercat".to_string(),
            brand: "monstercat".to_string(),
            genre_exclusions: vec!["monsterccat".to_string()],
            title_pattern: DEFAULT_TITLE_PATTERN.to_string(),
            description_genre_pattern: DEFAULT_DESCRIPTION_GENRE_PATTERN.to_string(),
            search_limit: 20,
            min_request_interval_secs: 1.0,
            rate_limit_backoff_secs: 5.0,
            timeout_secs: 30,
            user_agent: concat!("metaresolve/", env!("CARGO_PKG_VERSION")).to_string(),
            fpcalc: PathBuf::from("fpcalc"),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.wiki.trim().is_empty() {
            bail!("wiki must not be empty");
        }
        if self.search_limit == 0 {
            bail!("search_limit must be at least 1");
        }
        if !(self.min_request_interval_secs >= 0.0 && self.rate_limit_backoff_secs >= 0.0) {
            bail!("request intervals must be non-negative");
        }
        Ok(())
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_secs_f64(self.min_request_interval_secs)
    }

    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_secs_f64(self.rate_limit_backoff_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Exclusions for a profile: the base set, plus brand tokens when curated.
    pub fn genre_exclusions(&self, profile: Profile) -> GenreExclusions {
        match profile {
            Profile::Generic => GenreExclusions::with_base(std::iter::empty::<String>()),
            Profile::Curated => GenreExclusions::with_base(
                std::iter::once(self.brand.clone()).chain(self.genre_exclusions.iter().cloned()),
            ),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.wiki, "monstercat");
        assert_eq!(config.search_limit, 20);
        assert_eq!(config.min_request_interval(), Duration::from_secs(1));
        assert_eq!(config.rate_limit_backoff(), Duration::from_secs(5));
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.title_pattern, DEFAULT_TITLE_PATTERN);
    }

    #[test]
    fn test_toml_overrides_some_fields() {
        let config = Config::from_toml(
            r#"
wiki = "ncs"
brand = "NCS"
search_limit = 5
genre_exclusions = ["nocopyrightsounds"]
"#,
        )
        .unwrap();
        assert_eq!(config.wiki, "ncs");
        assert_eq!(config.search_limit, 5);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.description_genre_pattern, DEFAULT_DESCRIPTION_GENRE_PATTERN);

        let exclusions = config.genre_exclusions(Profile::Curated);
        assert!(exclusions.contains("ncs"));
        assert!(exclusions.contains("NoCopyrightSounds"));
        assert!(exclusions.contains("dance"));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(Config::from_toml("search_limit = \"many\"").is_err());
        assert!(Config::from_toml("search_limit = 0").is_err());
    }

    #[test]
    fn test_generic_profile_exclusions() {
        let config = Config::default();
        let generic = config.genre_exclusions(Profile::Generic);
        assert!(generic.contains("dance"));
        assert!(!generic.contains("monstercat"));
        let curated = config.genre_exclusions(Profile::Curated);
        assert!(curated.contains("Monstercat"));
        assert!(curated.contains("monsterccat"));
    }

    #[test]
    fn test_enabled_sources() {
        let args = Args::parse_from([
            "metaresolve",
            "--profile",
            "generic",
            "--source",
            "musicbrainz",
            "--source",
            "tags",
            "/music",
        ]);
        assert_eq!(
            args.enabled_sources(),
            [
                SourceName::Recording,
                SourceName::TagContainer,
                SourceName::TagTitle,
                SourceName::TagDescription
            ]
        );
        assert_eq!(args.retry_mode(), RetryMode::None);

        let curated = Args::parse_from(["metaresolve", "--retry", "failed", "/music"]);
        assert!(curated.enabled_sources().contains(&SourceName::ReferencePage));
        assert_eq!(curated.retry_mode(), RetryMode::Failed);
    }

    #[test]
    fn test_fingerprint_key_required() {
        let sources = [SourceName::Recording, SourceName::TagTitle];
        assert!(check_fingerprint_key(&sources, None).is_err());
        assert!(check_fingerprint_key(&sources, Some(" ")).is_err());
        assert!(check_fingerprint_key(&sources, Some("key")).is_ok());
        assert!(check_fingerprint_key(&[SourceName::TagTitle], None).is_ok());
    }

    #[test]
    fn test_paths_file_formats() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("paths.json");
        fs::write(&json, r#"["/m/a.m4a", "/m/b"]"#).unwrap();
        assert_eq!(
            read_paths_file(&json).unwrap(),
            [PathBuf::from("/m/a.m4a"), PathBuf::from("/m/b")]
        );

        let text = dir.path().join("paths.txt");
        fs::write(&text, "/m/a.m4a\n\n  /m/b  \n").unwrap();
        assert_eq!(read_paths_file(&text).unwrap(), read_paths_file(&json).unwrap());
    }

    #[test]
    fn test_input_paths_required() {
        let args = Args::parse_from(["metaresolve"]);
        assert!(args.input_paths().is_err());
    }
}
