//! Site configuration (site.yml)

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::BuildError;

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub description: String,
    pub author: String,
    pub language: String,

    // URL
    pub url: String,
    pub root: String,
    /// Post path pattern. Placeholders: `:slug`, `:year`, `:month`, `:day`.
    pub permalink: String,

    // Directory
    pub input_dir: String,
    pub output_dir: String,
    pub tag_dir: String,
    pub featured_dir: String,

    // Date format used for display (chrono strftime syntax)
    pub date_format: String,

    /// Worker threads for parsing and rendering; `None` lets rayon decide
    pub jobs: Option<usize>,

    #[serde(default)]
    pub highlight: HighlightConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "My Blog".to_string(),
            description: String::new(),
            author: String::new(),
            language: "en".to_string(),

            url: "http://example.com".to_string(),
            root: "/".to_string(),
            permalink: "posts/:slug/".to_string(),

            input_dir: "posts".to_string(),
            output_dir: "public".to_string(),
            tag_dir: "tags".to_string(),
            featured_dir: "featured".to_string(),

            date_format: "%Y-%m-%d".to_string(),
            jobs: None,

            highlight: HighlightConfig::default(),
            feed: FeedConfig::default(),
            search: SearchConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, BuildError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| BuildError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: SiteConfig = serde_yaml::from_str(&content)
            .map_err(|e| BuildError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would produce colliding or escaping output paths
    pub fn validate(&self) -> Result<(), BuildError> {
        if !self.permalink.contains(":slug") {
            return Err(BuildError::Config(format!(
                "permalink `{}` must contain `:slug`",
                self.permalink
            )));
        }
        if self.permalink.split('/').any(|part| part == "..") {
            return Err(BuildError::Config(format!(
                "permalink `{}` must not contain `..`",
                self.permalink
            )));
        }

        for (name, value) in [
            ("tag_dir", &self.tag_dir),
            ("featured_dir", &self.featured_dir),
        ] {
            let trimmed = value.trim_matches('/');
            if trimmed.is_empty() || trimmed.split('/').any(|part| part == ".." || part == ".")
            {
                return Err(BuildError::Config(format!(
                    "`{}` must be a non-empty relative directory, got `{}`",
                    name, value
                )));
            }
        }

        if self.tag_dir.trim_matches('/') == self.featured_dir.trim_matches('/') {
            return Err(BuildError::Config(
                "`tag_dir` and `featured_dir` must differ".to_string(),
            ));
        }

        if StrftimeItems::new(&self.date_format).any(|item| matches!(item, Item::Error)) {
            return Err(BuildError::Config(format!(
                "`date_format` `{}` is not a valid strftime pattern",
                self.date_format
            )));
        }

        if self.jobs == Some(0) {
            return Err(BuildError::Config("`jobs` must be at least 1".to_string()));
        }

        Ok(())
    }
}

/// Syntax highlighting of fenced code blocks.
/// Off by default: code blocks keep their language class for client-side highlighters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    pub enable: bool,
    pub theme: String,
    pub line_number: bool,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            enable: false,
            theme: "base16-ocean.dark".to_string(),
            line_number: false,
        }
    }
}

/// Atom feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub enable: bool,
    pub limit: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            enable: true,
            limit: 20,
        }
    }
}

/// Search index (search.json) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub enable: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { enable: true }
    }
}

/// Render cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enable: bool,
    /// Relative to the base directory
    pub dir: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enable: true,
            dir: ".mdpress-cache".to_string(),
        }
    }
}
