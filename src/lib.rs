//! mdpress: a static blog generator
//!
//! A directory of Markdown posts with YAML front matter goes in, a static
//! HTML site comes out: one page per post, an index, tag pages, a featured
//! page, an Atom feed and a search index. Builds are deterministic and the
//! output directory is replaced atomically.

pub mod cache;
pub mod commands;
pub mod config;
pub mod content;
pub mod error;
pub mod generator;
pub mod helpers;
pub mod report;
pub mod templates;

use anyhow::Result;
use std::path::{Path, PathBuf};

pub use error::{BuildError, ContentError, NotFound};
pub use report::BuildReport;

/// Default configuration file name, looked up in the base directory
pub const CONFIG_FILE: &str = "site.yml";

/// A blog: its configuration and the directories it works on
#[derive(Debug, Clone)]
pub struct Site {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory
    pub base_dir: PathBuf,
    /// Directory holding the post files
    pub input_dir: PathBuf,
    /// Generated site
    pub output_dir: PathBuf,
    /// Render cache directory
    pub cache_dir: PathBuf,
}

impl Site {
    /// Create a site from a directory, reading `site.yml` when present
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        Self::load(base_dir, None)
    }

    /// Create a site from a directory and an explicit configuration file.
    /// A relative `config_path` is resolved against `base_dir`.
    pub fn load<P: AsRef<Path>>(base_dir: P, config_path: Option<&Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();

        let config = match config_path {
            Some(path) => config::SiteConfig::load(&base_dir.join(path))?,
            None => {
                let default_path = base_dir.join(CONFIG_FILE);
                if default_path.exists() {
                    config::SiteConfig::load(&default_path)?
                } else {
                    tracing::debug!("No {} in {:?}, using defaults", CONFIG_FILE, base_dir);
                    config::SiteConfig::default()
                }
            }
        };

        Ok(Self::with_config(base_dir, config)?)
    }

    /// Create a site from an in-memory configuration
    pub fn with_config(base_dir: PathBuf, config: config::SiteConfig) -> Result<Self, BuildError> {
        config.validate()?;

        let input_dir = base_dir.join(&config.input_dir);
        let output_dir = base_dir.join(&config.output_dir);
        let cache_dir = base_dir.join(&config.cache.dir);

        Ok(Self {
            config,
            base_dir,
            input_dir,
            output_dir,
            cache_dir,
        })
    }

    /// Read posts from `dir` (relative to the base directory) instead
    pub fn set_input_dir(&mut self, dir: &Path) {
        self.input_dir = self.base_dir.join(dir);
    }

    /// Write the site to `dir` (relative to the base directory) instead
    pub fn set_output_dir(&mut self, dir: &Path) {
        self.output_dir = self.base_dir.join(dir);
    }

    /// Generate the static site
    pub fn build(&self) -> Result<BuildReport> {
        commands::build::run(self)
    }

    /// Remove the output directory and the render cache
    pub fn clean(&self) -> Result<()> {
        commands::clean::run(self)
    }

    /// Print posts, tags or featured posts
    pub fn list(&self, content_type: &str) -> Result<()> {
        commands::list::run(self, content_type)
    }
}
