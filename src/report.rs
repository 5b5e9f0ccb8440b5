//! Build report: files left out of a build and why

use std::fmt;
use std::path::PathBuf;

use crate::error::ContentError;

/// A source file excluded from the build
#[derive(Debug)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: ContentError,
}

impl fmt::Display for SkippedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

/// Outcome of a build
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Posts that made it into the site
    pub post_count: usize,
    /// Files skipped because of per-file errors, in file-name order
    pub skipped: Vec<SkippedFile>,
    /// Files emitted into the output directory
    pub pages_written: usize,
    /// Post bodies taken from the render cache
    pub cache_hits: usize,
}

impl BuildReport {
    pub fn skip(&mut self, path: PathBuf, reason: ContentError) {
        tracing::warn!("Skipping {}: {}", path.display(), reason);
        self.skipped.push(SkippedFile { path, reason });
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// One-line summary printed at the end of a build
    pub fn summary(&self) -> String {
        format!(
            "{} posts ({} skipped), {} files written",
            self.post_count,
            self.skipped.len(),
            self.pages_written
        )
    }
}
