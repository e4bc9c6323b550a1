//! Configuration file support.
//!
//! Settings are read from a TOML file and cover how the source tree is
//! scanned (worker count, error policy, exclusion rules) and how dates are
//! read from file names. Command-line flags override anything set here.
//!
//! # Configuration File Format
//!
//! ```toml
//! [scan]
//! workers = 8
//! include_hidden = true
//! on_error = "abort"          # or "skip"
//!
//! [scan.exclude]
//! filenames = [".DS_Store", "Thumbs.db"]
//! extensions = ["part", "tmp"]
//! patterns = ["**/cache/**"]
//!
//! [dates]
//! use_filename = true
//! patterns = ['WA(?P<month>\d{2})(?P<year>\d{4})']
//! ```

use crate::filename_date::{DateExtractor, PatternMatcher, StampMatcher};
use crate::scanner::ErrorPolicy;
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while loading or compiling configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    /// Invalid glob pattern provided.
    #[error("Invalid glob pattern '{0}'")]
    InvalidGlobPattern(String),
    /// Invalid filename date regex.
    #[error("Invalid date pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },
    /// IO error while reading configuration.
    #[error("IO error reading configuration: {0}")]
    Io(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SortConfig {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub dates: DateConfig,
}

/// How the source tree is walked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Number of directory scan workers. Defaults to available parallelism.
    #[serde(default)]
    pub workers: Option<usize>,

    /// Whether files starting with "." are sorted. Defaults to true.
    #[serde(default = "default_true")]
    pub include_hidden: bool,

    /// What to do with unreadable directories and entries.
    #[serde(default)]
    pub on_error: ErrorPolicy,

    /// Files that are never sorted.
    #[serde(default)]
    pub exclude: ExcludeRules,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: None,
            include_hidden: true,
            on_error: ErrorPolicy::default(),
            exclude: ExcludeRules::default(),
        }
    }
}

/// Rules for leaving files out of the worklist.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact filenames to exclude (e.g., ".DS_Store", "Thumbs.db").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// File extensions to exclude, case-insensitive (e.g., "part", "tmp").
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Glob patterns matched against the full source path.
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// How dates are read from file names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateConfig {
    /// Whether file names may override modification times. Defaults to true.
    #[serde(default = "default_true")]
    pub use_filename: bool,

    /// Extra regexes with named `year` and `month` groups, tried before the
    /// built-in `YYYYMMDD` stamp.
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl Default for DateConfig {
    fn default() -> Self {
        Self {
            use_filename: true,
            patterns: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

impl SortConfig {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.datesortrc.toml` in the current directory
    /// 3. Look for `~/.config/datesort/config.toml` in home directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but cannot be read,
    /// or if any discovered file is not valid TOML.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(".datesortrc.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("datesort")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Compile the exclusion rules.
    ///
    /// # Errors
    ///
    /// Returns an error if any glob pattern is invalid.
    pub fn compile_filters(&self) -> Result<FileFilters, ConfigError> {
        FileFilters::new(&self.scan)
    }

    /// Build the filename date extractor: configured patterns first, then the
    /// built-in stamp matcher.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern is not a valid regex or lacks the
    /// `year` or `month` group.
    pub fn build_extractor(&self) -> Result<DateExtractor, ConfigError> {
        if !self.dates.use_filename {
            return Ok(DateExtractor::disabled());
        }

        let mut extractor = DateExtractor::new(Vec::new());
        for pattern in &self.dates.patterns {
            let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
            let matcher =
                PatternMatcher::new(regex).ok_or_else(|| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: "missing named group 'year' or 'month'".to_string(),
                })?;
            extractor.push(Box::new(matcher));
        }
        extractor.push(Box::new(StampMatcher));

        Ok(extractor)
    }
}

/// Compiled exclusion rules, checked for every regular file found.
#[derive(Debug, Clone)]
pub struct FileFilters {
    include_hidden: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
}

impl FileFilters {
    fn new(rules: &ScanConfig) -> Result<Self, ConfigError> {
        let exclude_patterns = rules
            .exclude
            .patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            include_hidden: rules.include_hidden,
            exclude_filenames: rules.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns,
        })
    }

    /// Check if a file should be sorted.
    ///
    /// Hidden files, exact names, extensions and glob patterns are checked
    /// in that order; anything not excluded is included.
    pub fn should_include(&self, file_path: &Path) -> bool {
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if !self.include_hidden && file_name.starts_with('.') {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = file_path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if self.exclude_extensions.contains(&ext_lower) {
                return false;
            }
        }

        !self
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.matches_path(file_path))
    }
}

impl Default for FileFilters {
    fn default() -> Self {
        Self {
            include_hidden: true,
            exclude_filenames: HashSet::new(),
            exclude_extensions: HashSet::new(),
            exclude_patterns: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filename_date::DateBucket;
    use tempfile::TempDir;

    fn parse(toml: &str) -> SortConfig {
        toml::from_str(toml).expect("valid config")
    }

    #[test]
    fn test_defaults_include_everything() {
        let filters = SortConfig::default().compile_filters().unwrap();

        assert!(filters.should_include(Path::new("/src/.DS_Store")));
        assert!(filters.should_include(Path::new("/src/photo.jpg")));
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse("");

        assert!(config.scan.include_hidden);
        assert_eq!(config.scan.on_error, ErrorPolicy::Abort);
        assert_eq!(config.scan.workers, None);
        assert!(config.dates.use_filename);
    }

    #[test]
    fn test_parse_full_config() {
        let config = parse(
            r#"
            [scan]
            workers = 3
            include_hidden = false
            on_error = "skip"

            [scan.exclude]
            filenames = ["Thumbs.db"]
            extensions = ["PART"]
            patterns = ["**/cache/**"]

            [dates]
            use_filename = true
            patterns = ['WA(?P<month>\d{2})(?P<year>\d{4})']
            "#,
        );

        assert_eq!(config.scan.workers, Some(3));
        assert_eq!(config.scan.on_error, ErrorPolicy::Skip);
        assert_eq!(config.dates.patterns.len(), 1);
    }

    #[test]
    fn test_exclusion_rules() {
        let config = parse(
            r#"
            [scan]
            include_hidden = false

            [scan.exclude]
            filenames = ["Thumbs.db"]
            extensions = [".Part"]
            patterns = ["**/cache/**"]
            "#,
        );
        let filters = config.compile_filters().unwrap();

        assert!(!filters.should_include(Path::new("/src/.hidden.jpg")));
        assert!(!filters.should_include(Path::new("/src/Thumbs.db")));
        assert!(!filters.should_include(Path::new("/src/movie.PART")));
        assert!(!filters.should_include(Path::new("src/app/cache/blob.bin")));
        assert!(filters.should_include(Path::new("src/app/photo.jpg")));
    }

    #[test]
    fn test_invalid_glob_returns_error() {
        let config = parse(
            r#"
            [scan.exclude]
            patterns = ["[unclosed"]
            "#,
        );

        assert!(matches!(
            config.compile_filters(),
            Err(ConfigError::InvalidGlobPattern(_))
        ));
    }

    #[test]
    fn test_custom_date_pattern_takes_precedence() {
        let config = parse(
            r#"
            [dates]
            patterns = ['WA(?P<month>\d{2})(?P<year>\d{4})']
            "#,
        );
        let extractor = config.build_extractor().unwrap();

        assert_eq!(
            extractor.extract("WA032018_20150612.jpg"),
            Some(DateBucket { year: 2018, month: 3 })
        );
        assert_eq!(
            extractor.extract("20150612.jpg"),
            Some(DateBucket { year: 2015, month: 6 })
        );
    }

    #[test]
    fn test_date_pattern_without_groups_rejected() {
        let config = parse(
            r#"
            [dates]
            patterns = ['(\d{4})-(\d{2})']
            "#,
        );

        assert!(matches!(
            config.build_extractor(),
            Err(ConfigError::InvalidRegexPattern { .. })
        ));
    }

    #[test]
    fn test_invalid_date_regex_rejected() {
        let config = parse(
            r#"
            [dates]
            patterns = ['(?P<year>\d{4']
            "#,
        );

        assert!(matches!(
            config.build_extractor(),
            Err(ConfigError::InvalidRegexPattern { .. })
        ));
    }

    #[test]
    fn test_filename_dates_disabled() {
        let config = parse(
            r#"
            [dates]
            use_filename = false
            "#,
        );
        let extractor = config.build_extractor().unwrap();

        assert!(!extractor.is_enabled());
    }

    #[test]
    fn test_load_explicit_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("datesort.toml");
        fs::write(&path, "[scan]\nworkers = 2\n").unwrap();

        let config = SortConfig::load(Some(&path)).unwrap();
        assert_eq!(config.scan.workers, Some(2));
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("missing.toml");

        assert!(matches!(
            SortConfig::load(Some(&path)),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn test_load_invalid_toml() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("bad.toml");
        fs::write(&path, "[scan\nworkers = ").unwrap();

        assert!(matches!(
            SortConfig::load(Some(&path)),
            Err(ConfigError::Invalid(_))
        ));
    }
}
