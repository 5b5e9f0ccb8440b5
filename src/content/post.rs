//! Post model

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::{FrontMatter, MarkdownRenderer};
use crate::error::ContentError;

/// A blog post. Built once per build from its source file and never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    /// URL-friendly name derived from the file name, unique per site
    pub slug: String,

    /// Post title
    pub title: String,

    /// Publication date
    pub date: NaiveDate,

    /// Short summary, from front matter or the `<!-- more -->` marker
    pub excerpt: Option<String>,

    /// Post tags, in source order
    pub tags: Vec<String>,

    /// Listed on the featured page
    pub featured: bool,

    /// Raw markdown body
    #[serde(skip)]
    pub body_markdown: String,

    /// Rendered body
    pub body_html: String,

    /// Front-matter fields with no meaning here
    #[serde(skip)]
    pub extra: IndexMap<String, serde_yaml::Value>,

    /// Full source file path
    #[serde(skip)]
    pub source: PathBuf,

    /// SHA-256 of the source file, hex encoded
    #[serde(skip)]
    pub content_hash: String,

    /// Source modification time when it was read
    #[serde(skip)]
    pub modified: Option<u64>,
}

/// A post file as read from disk
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub content: String,
    /// SHA-256 of `content`, hex encoded
    pub content_hash: String,
    pub modified: Option<u64>,
}

impl SourceFile {
    pub fn read(path: &Path) -> Result<Self, ContentError> {
        let content = fs::read_to_string(path)?;
        let modified = crate::cache::get_mtime(path).ok();
        Ok(Self {
            path: path.to_path_buf(),
            content_hash: crate::cache::hash_content(&content),
            content,
            modified,
        })
    }

    /// In-memory source, mostly for tests
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            path: path.into(),
            content_hash: crate::cache::hash_content(&content),
            content,
            modified: None,
        }
    }
}

impl Post {
    /// Build a post from its source file.
    ///
    /// `body_html` is taken from `cached_html` when given, otherwise rendered.
    pub fn from_source(
        file: &SourceFile,
        renderer: &MarkdownRenderer,
        cached_html: Option<String>,
    ) -> Result<Self, ContentError> {
        let slug = slug_from_path(&file.path)?;
        let (fm, body) = FrontMatter::parse(&file.content)?;
        let title = fm.require_title()?.to_string();
        let date = fm.parse_date()?;

        let excerpt = fm
            .excerpt
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .or_else(|| MarkdownRenderer::excerpt_text(body));

        let body_html = cached_html.unwrap_or_else(|| renderer.render(body));

        Ok(Self {
            slug,
            title,
            date,
            excerpt,
            tags: fm.tags,
            featured: fm.featured,
            body_markdown: body.to_string(),
            body_html,
            extra: fm.extra,
            source: file.path.clone(),
            content_hash: file.content_hash.clone(),
            modified: file.modified,
        })
    }

    /// Whether the post carries `tag`
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Ordering used by every listing: newest first, then by slug
    pub fn listing_order(a: &Post, b: &Post) -> std::cmp::Ordering {
        b.date.cmp(&a.date).then_with(|| a.slug.cmp(&b.slug))
    }
}

/// Slug from the file stem: `My First Post.md` -> `my-first-post`
pub fn slug_from_path(path: &Path) -> Result<String, ContentError> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let slug = slug::slugify(&stem);
    if slug.is_empty() {
        return Err(ContentError::EmptySlug(stem));
    }
    Ok(slug)
}

/// A tag and the place its listing page is written to
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub slug: String,
    /// Directory-style path below the site root, e.g. `tags/aws/`
    pub path: String,
    pub count: usize,
}

impl Tag {
    pub fn new(name: &str, slug: String, tag_dir: &str, count: usize) -> Self {
        let path = format!("{}/{}/", tag_dir.trim_matches('/'), slug);
        Self {
            name: name.to_string(),
            slug,
            path,
            count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELCOME: &str = r#"---
title: "Welcome to My Blog"
date: "2026-01-21"
tags: ["general", "introduction"]
featured: true
series: intro
---

Hello **there**.

<!-- more -->

The rest.
"#;

    #[test]
    fn test_from_source() {
        let renderer = MarkdownRenderer::new();
        let file = SourceFile::new("posts/welcome-to-my-blog.md", WELCOME);
        let post = Post::from_source(&file, &renderer, None).unwrap();

        assert_eq!(post.slug, "welcome-to-my-blog");
        assert_eq!(post.title, "Welcome to My Blog");
        assert_eq!(post.date, NaiveDate::from_ymd_opt(2026, 1, 21).unwrap());
        assert_eq!(post.tags, vec!["general", "introduction"]);
        assert!(post.featured);
        assert_eq!(post.excerpt.as_deref(), Some("Hello there."));
        assert!(post.body_html.contains("<strong>there</strong>"));
        assert!(post.body_markdown.contains("The rest."));
        assert!(post.extra.contains_key("series"));
        assert!(post.has_tag("general"));
        assert!(!post.has_tag("General"));
        assert_eq!(post.content_hash.len(), 64);
    }

    #[test]
    fn test_cached_html_is_used() {
        let renderer = MarkdownRenderer::new();
        let file = SourceFile::new("welcome.md", WELCOME);
        let post = Post::from_source(&file, &renderer, Some("<p>cached</p>".to_string())).unwrap();
        assert_eq!(post.body_html, "<p>cached</p>");
    }

    #[test]
    fn test_invalid_date_is_an_error() {
        let renderer = MarkdownRenderer::new();
        let content = "---\ntitle: Broken\ndate: someday\n---\nBody";
        let file = SourceFile::new("broken.md", content);
        let err = Post::from_source(&file, &renderer, None).unwrap_err();
        assert!(matches!(err, ContentError::InvalidDate(d) if d == "someday"));
    }

    #[test]
    fn test_slug_from_path() {
        assert_eq!(
            slug_from_path(Path::new("dir/Laravel Rate Limiting.md")).unwrap(),
            "laravel-rate-limiting"
        );
        assert_eq!(
            slug_from_path(Path::new("laravel_rate_limiting.md")).unwrap(),
            "laravel-rate-limiting"
        );
        assert!(matches!(
            slug_from_path(Path::new("!!!.md")),
            Err(ContentError::EmptySlug(_))
        ));
    }

    #[test]
    fn test_listing_order() {
        let renderer = MarkdownRenderer::new();
        let make = |name: &str, date: &str| {
            let content = format!("---\ntitle: {}\ndate: {}\n---\n", name, date);
            let file = SourceFile::new(format!("{}.md", name), content);
            Post::from_source(&file, &renderer, None).unwrap()
        };
        let mut posts = vec![
            make("b", "2024-01-01"),
            make("a", "2024-01-01"),
            make("c", "2025-06-01"),
        ];
        posts.sort_by(Post::listing_order);
        let slugs: Vec<_> = posts.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_tag_path() {
        let tag = Tag::new("Cloud Ops", "cloud-ops".to_string(), "/tags/", 3);
        assert_eq!(tag.path, "tags/cloud-ops/");
        assert_eq!(tag.count, 3);
    }
}
