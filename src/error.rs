//! Error types
//!
//! Errors are split in two classes. [`ContentError`] describes a problem with
//! a single source file: the file is skipped and the build goes on.
//! [`BuildError`] aborts the whole build.

use std::path::PathBuf;
use thiserror::Error;

/// A problem with one post file. Recoverable: the file is skipped.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("malformed front matter: {0}")]
    MalformedFrontMatter(String),

    #[error("field `{field}` must be {expected}")]
    InvalidFieldType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("unparseable date `{0}`")]
    InvalidDate(String),

    #[error("file name `{0}` does not produce a usable slug")]
    EmptySlug(String),

    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
}

/// A failure that stops the build. Nothing is published.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("cannot read input directory {}: {source}", path.display())]
    UnreadableInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "duplicate slug `{slug}`: {} and {} map to the same post",
        first.display(),
        second.display()
    )]
    DuplicateSlug {
        slug: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("cannot write output {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl BuildError {
    pub(crate) fn output(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Output {
            path: path.into(),
            source,
        }
    }
}

/// Returned by slug lookups that match no post.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("no post with slug `{slug}`")]
pub struct NotFound {
    pub slug: String,
}
