//! List site content

use anyhow::Result;
use std::fmt::Write;

use crate::content::{MarkdownRenderer, PostRepository};
use crate::Site;

/// List site content by type
pub fn run(site: &Site, content_type: &str) -> Result<()> {
    let renderer = MarkdownRenderer::new();
    let (repository, _report) = PostRepository::load_all(&site.input_dir, &renderer, None)?;
    print!("{}", listing(&repository, content_type)?);
    Ok(())
}

/// Text listing of posts, tags or featured posts
pub fn listing(repository: &PostRepository, content_type: &str) -> Result<String> {
    let mut out = String::new();

    match content_type {
        "post" | "posts" => {
            writeln!(out, "Posts ({}):", repository.len())?;
            for post in repository.all() {
                writeln!(
                    out,
                    "  {} - {} [{}] {}",
                    post.date.format("%Y-%m-%d"),
                    post.title,
                    post.slug,
                    post.tags.join(", ")
                )?;
            }
        }
        "tag" | "tags" => {
            let mut tags = repository.tags();
            writeln!(out, "Tags ({}):", tags.len())?;
            // Most used first, by name on ties
            tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
            for (tag, count) in tags {
                writeln!(out, "  {} ({})", tag, count)?;
            }
        }
        "featured" => {
            let featured = repository.featured();
            writeln!(out, "Featured ({}):", featured.len())?;
            for post in featured {
                writeln!(
                    out,
                    "  {} - {} [{}]",
                    post.date.format("%Y-%m-%d"),
                    post.title,
                    post.slug
                )?;
            }
        }
        _ => {
            anyhow::bail!(
                "Unknown type: {}. Available: post, tag, featured",
                content_type
            );
        }
    }

    Ok(out)
}
