//! Generator module - turns a post repository into a static site
//!
//! Generation runs in two phases. First every page is rendered in memory
//! (post pages in parallel). Then the pages are written into a staging
//! directory next to the output directory, which is swapped into place once
//! everything is on disk. A failed build therefore never leaves a half-written
//! site behind, and the previous output stays as it was.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tera::Context;

use crate::config::SiteConfig;
use crate::content::{MarkdownRenderer, Post, PostRepository, Tag};
use crate::error::BuildError;
use crate::helpers::{
    absolutize_urls, escape_xml, full_url_for, index_file, strip_invalid_xml_chars, url_for,
};
use crate::templates::{ConfigData, NavPost, PostSummary, TagData, TagLink, TemplateRenderer};

/// One output file, before it is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    /// Path relative to the output directory, `/` separated
    pub path: String,
    pub contents: String,
}

impl RenderedFile {
    fn new(path: impl Into<String>, contents: String) -> Self {
        Self {
            path: path.into(),
            contents,
        }
    }
}

/// Static site generator using the built-in templates
pub struct Generator<'a> {
    config: &'a SiteConfig,
    templates: TemplateRenderer,
}

impl<'a> Generator<'a> {
    /// Create a new generator
    pub fn new(config: &'a SiteConfig) -> Result<Self, BuildError> {
        Ok(Self {
            config,
            templates: TemplateRenderer::new()?,
        })
    }

    /// Generate the entire site into `output_dir`, replacing what was there.
    /// Returns the number of files written.
    pub fn generate_all(
        &self,
        repository: &PostRepository,
        output_dir: &Path,
    ) -> Result<usize, BuildError> {
        let files = self.render_site(repository)?;
        publish(output_dir, &files)?;
        tracing::info!("Wrote {} files to {:?}", files.len(), output_dir);
        Ok(files.len())
    }

    /// Render every output file in memory, in a fixed order
    pub fn render_site(&self, repository: &PostRepository) -> Result<Vec<RenderedFile>, BuildError> {
        let tags = self.assign_tags(repository);
        let config_data = self.build_config_data();

        let summaries: Vec<PostSummary> = repository
            .all()
            .iter()
            .map(|post| self.summarize(post, &tags))
            .collect();

        let mut files = self.render_post_pages(repository.all(), &summaries, &config_data)?;

        files.push(self.render_list(
            "index.html".to_string(),
            "",
            summaries.iter().collect(),
            &config_data,
        )?);

        files.extend(self.render_tag_pages(repository, &tags, &summaries, &config_data)?);
        files.push(self.render_tags_overview(&tags, &config_data)?);

        let featured: Vec<&PostSummary> = summaries.iter().filter(|s| s.featured).collect();
        files.push(self.render_list(
            index_file(&self.config.featured_dir),
            "Featured",
            featured,
            &config_data,
        )?);
        tracing::info!("Generated featured page");

        if self.config.feed.enable {
            files.push(self.render_atom_feed(repository.all(), &summaries));
            tracing::info!("Generated atom.xml");
        }

        if self.config.search.enable {
            files.push(self.render_search_index(repository.all(), &summaries)?);
            tracing::info!("Generated search.json");
        }

        check_unique_paths(&files)?;
        Ok(files)
    }

    /// Output path of a post, relative to the site root (directory style unless it ends in `.html`)
    pub fn post_path(&self, post: &Post) -> String {
        self.config
            .permalink
            .replace(":year", &post.date.format("%Y").to_string())
            .replace(":month", &post.date.format("%m").to_string())
            .replace(":day", &post.date.format("%d").to_string())
            .replace(":slug", &post.slug)
            .trim_start_matches('/')
            .to_string()
    }

    /// Give every distinct tag a unique slug. Tags are visited in name order,
    /// so colliding slugs get the same `-2`, `-3` suffixes on every run.
    fn assign_tags(&self, repository: &PostRepository) -> BTreeMap<String, Tag> {
        let mut used: HashSet<String> = HashSet::new();
        let mut tags = BTreeMap::new();

        for (name, count) in repository.tags() {
            let base = match slug::slugify(name) {
                s if s.is_empty() => "tag".to_string(),
                s => s,
            };
            let mut slug = base.clone();
            let mut n = 2;
            while !used.insert(slug.clone()) {
                slug = format!("{}-{}", base, n);
                n += 1;
            }
            if slug != base {
                tracing::debug!("Tag {:?} written as {:?} to avoid a collision", name, slug);
            }
            tags.insert(
                name.to_string(),
                Tag::new(name, slug, &self.config.tag_dir, count),
            );
        }

        tags
    }

    fn build_config_data(&self) -> ConfigData {
        ConfigData {
            title: self.config.title.clone(),
            description: self.config.description.clone(),
            author: self.config.author.clone(),
            language: self.config.language.clone(),
            home_url: url_for(self.config, ""),
            tags_url: url_for(self.config, &format!("{}/", self.config.tag_dir.trim_matches('/'))),
            featured_url: url_for(
                self.config,
                &format!("{}/", self.config.featured_dir.trim_matches('/')),
            ),
            feed_url: self
                .config
                .feed
                .enable
                .then(|| url_for(self.config, "atom.xml")),
        }
    }

    fn summarize(&self, post: &Post, tags: &BTreeMap<String, Tag>) -> PostSummary {
        PostSummary {
            slug: post.slug.clone(),
            title: post.title.clone(),
            url: url_for(self.config, &self.post_path(post)),
            date: post.date.format("%Y-%m-%d").to_string(),
            date_display: post.date.format(&self.config.date_format).to_string(),
            excerpt: post.excerpt.clone(),
            tags: post
                .tags
                .iter()
                .filter_map(|name| tags.get(name))
                .map(|tag| TagLink {
                    name: tag.name.clone(),
                    url: url_for(self.config, &tag.path),
                })
                .collect(),
            featured: post.featured,
        }
    }

    /// Render individual post pages
    fn render_post_pages(
        &self,
        posts: &[Post],
        summaries: &[PostSummary],
        config_data: &ConfigData,
    ) -> Result<Vec<RenderedFile>, BuildError> {
        let nav = |i: usize| {
            summaries.get(i).map(|s| NavPost {
                title: s.title.clone(),
                url: s.url.clone(),
            })
        };

        let files = posts
            .par_iter()
            .zip(summaries.par_iter())
            .enumerate()
            .map(|(i, (post, summary))| {
                let mut context = Context::new();
                context.insert("config", config_data);
                context.insert("post", summary);
                context.insert("body", &post.body_html);
                context.insert("newer", &i.checked_sub(1).and_then(nav));
                context.insert("older", &nav(i + 1));

                let html = self.templates.render("post.html", &context)?;
                let path = self.post_path(post);
                let path = if path.ends_with(".html") {
                    path
                } else {
                    index_file(&path)
                };
                Ok(RenderedFile::new(path, html))
            })
            .collect::<Result<Vec<_>, BuildError>>()?;

        tracing::info!("Generated {} post pages", files.len());
        Ok(files)
    }

    /// Render a listing page (index, tag or featured)
    fn render_list(
        &self,
        path: String,
        heading: &str,
        posts: Vec<&PostSummary>,
        config_data: &ConfigData,
    ) -> Result<RenderedFile, BuildError> {
        let mut context = Context::new();
        context.insert("config", config_data);
        context.insert("heading", heading);
        context.insert("posts", &posts);

        let html = self.templates.render("list.html", &context)?;
        Ok(RenderedFile::new(path, html))
    }

    /// Render one page per tag
    fn render_tag_pages(
        &self,
        repository: &PostRepository,
        tags: &BTreeMap<String, Tag>,
        summaries: &[PostSummary],
        config_data: &ConfigData,
    ) -> Result<Vec<RenderedFile>, BuildError> {
        let by_slug: HashMap<&str, &PostSummary> =
            summaries.iter().map(|s| (s.slug.as_str(), s)).collect();

        let mut files = Vec::with_capacity(tags.len());
        for (name, tag) in tags {
            let tag_posts: Vec<&PostSummary> = repository
                .by_tag(name)
                .into_iter()
                .filter_map(|post| by_slug.get(post.slug.as_str()).copied())
                .collect();

            files.push(self.render_list(
                index_file(&tag.path),
                &format!("Tagged \u{201c}{}\u{201d}", name),
                tag_posts,
                config_data,
            )?);
        }

        tracing::info!("Generated {} tag pages", files.len());
        Ok(files)
    }

    /// Render the page listing every tag
    fn render_tags_overview(
        &self,
        tags: &BTreeMap<String, Tag>,
        config_data: &ConfigData,
    ) -> Result<RenderedFile, BuildError> {
        let all_tags: Vec<TagData> = tags
            .values()
            .map(|tag| TagData {
                name: tag.name.clone(),
                url: url_for(self.config, &tag.path),
                count: tag.count,
            })
            .collect();

        let mut context = Context::new();
        context.insert("config", config_data);
        context.insert("tags", &all_tags);

        let html = self.templates.render("tags.html", &context)?;
        Ok(RenderedFile::new(index_file(&self.config.tag_dir), html))
    }

    /// Render the Atom feed. Timestamps come from post dates only.
    fn render_atom_feed(&self, posts: &[Post], summaries: &[PostSummary]) -> RenderedFile {
        let base_url = self.config.url.trim_end_matches('/');
        let home = full_url_for(self.config, "");
        let updated = posts
            .first()
            .map(|p| feed_timestamp(p.date))
            .unwrap_or_else(|| "1970-01-01T00:00:00Z".to_string());

        let mut feed = String::new();
        feed.push_str(r#"<?xml version="1.0" encoding="utf-8"?>"#);
        feed.push('\n');
        feed.push_str(r#"<feed xmlns="http://www.w3.org/2005/Atom">"#);
        feed.push('\n');
        feed.push_str(&format!(
            "  <title>{}</title>\n",
            escape_xml(&self.config.title)
        ));
        if !self.config.description.is_empty() {
            feed.push_str(&format!(
                "  <subtitle>{}</subtitle>\n",
                escape_xml(&self.config.description)
            ));
        }
        feed.push_str(&format!(
            "  <link href=\"{}\" rel=\"self\"/>\n",
            escape_xml(&full_url_for(self.config, "atom.xml"))
        ));
        feed.push_str(&format!("  <link href=\"{}\"/>\n", escape_xml(&home)));
        feed.push_str(&format!("  <updated>{}</updated>\n", updated));
        feed.push_str(&format!("  <id>{}</id>\n", escape_xml(&home)));
        if !self.config.author.is_empty() {
            feed.push_str(&format!(
                "  <author><name>{}</name></author>\n",
                escape_xml(&self.config.author)
            ));
        }

        for (post, summary) in posts.iter().zip(summaries).take(self.config.feed.limit) {
            let link = format!("{}{}", base_url, summary.url);
            feed.push_str("  <entry>\n");
            feed.push_str(&format!("    <title>{}</title>\n", escape_xml(&post.title)));
            feed.push_str(&format!("    <link href=\"{}\"/>\n", escape_xml(&link)));
            feed.push_str(&format!("    <id>{}</id>\n", escape_xml(&link)));
            feed.push_str(&format!(
                "    <published>{}</published>\n",
                feed_timestamp(post.date)
            ));
            feed.push_str(&format!(
                "    <updated>{}</updated>\n",
                feed_timestamp(post.date)
            ));
            for tag in &post.tags {
                feed.push_str(&format!("    <category term=\"{}\"/>\n", escape_xml(tag)));
            }
            if let Some(excerpt) = &post.excerpt {
                feed.push_str(&format!(
                    "    <summary>{}</summary>\n",
                    escape_xml(&strip_invalid_xml_chars(excerpt))
                ));
            }
            let content = absolutize_urls(&post.body_html, base_url);
            let content = strip_invalid_xml_chars(&content).replace("]]>", "]]]]><![CDATA[>");
            feed.push_str(&format!(
                "    <content type=\"html\"><![CDATA[{}]]></content>\n",
                content
            ));
            feed.push_str("  </entry>\n");
        }

        feed.push_str("</feed>\n");
        RenderedFile::new("atom.xml", feed)
    }

    /// Render the search index (JSON)
    fn render_search_index(
        &self,
        posts: &[Post],
        summaries: &[PostSummary],
    ) -> Result<RenderedFile, BuildError> {
        let entries: Vec<SearchEntry> = posts
            .iter()
            .zip(summaries)
            .map(|(post, summary)| SearchEntry {
                title: &post.title,
                url: &summary.url,
                date: &summary.date,
                tags: &post.tags,
                content: MarkdownRenderer::plain_text(&post.body_markdown),
            })
            .collect();

        let json = serde_json::to_string_pretty(&entries)?;
        Ok(RenderedFile::new("search.json", json))
    }
}

#[derive(Serialize)]
struct SearchEntry<'a> {
    title: &'a str,
    url: &'a str,
    date: &'a str,
    tags: &'a [String],
    content: String,
}

/// Midnight UTC of a post date, RFC 3339
fn feed_timestamp(date: NaiveDate) -> String {
    format!("{}T00:00:00Z", date.format("%Y-%m-%d"))
}

/// Two pages mapping to the same file (e.g. a post permalink landing on a tag page) is fatal
fn check_unique_paths(files: &[RenderedFile]) -> Result<(), BuildError> {
    let mut seen = HashSet::with_capacity(files.len());
    for file in files {
        if !seen.insert(file.path.as_str()) {
            return Err(BuildError::Config(format!(
                "two pages would be written to {}; adjust `permalink`, `tag_dir` or `featured_dir`",
                file.path
            )));
        }
    }
    Ok(())
}

/// `.{name}.{suffix}` next to `output_dir`
pub(crate) fn sibling_dir(output_dir: &Path, suffix: &str) -> Result<PathBuf, BuildError> {
    let name = output_dir.file_name().ok_or_else(|| {
        BuildError::Config(format!(
            "output directory {} must have a name",
            output_dir.display()
        ))
    })?;
    let parent = output_dir.parent().unwrap_or_else(|| Path::new(""));
    Ok(parent.join(format!(".{}.{}", name.to_string_lossy(), suffix)))
}

/// Write `files` to a staging directory, then swap it in for `output_dir`
fn publish(output_dir: &Path, files: &[RenderedFile]) -> Result<(), BuildError> {
    let staging = sibling_dir(output_dir, "staging")?;

    if let Some(parent) = output_dir.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| BuildError::output(parent, e))?;
    }
    if staging.exists() {
        fs::remove_dir_all(&staging).map_err(|e| BuildError::output(&staging, e))?;
    }
    fs::create_dir_all(&staging).map_err(|e| BuildError::output(&staging, e))?;

    if let Err(e) = files.iter().try_for_each(|file| write_file(&staging, file)) {
        if let Err(cleanup) = fs::remove_dir_all(&staging) {
            tracing::warn!("Failed to remove staging directory {:?}: {}", staging, cleanup);
        }
        return Err(e);
    }

    swap_into_place(&staging, output_dir)
}

fn write_file(root: &Path, file: &RenderedFile) -> Result<(), BuildError> {
    let path = root.join(&file.path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| BuildError::output(parent, e))?;
    }
    fs::write(&path, &file.contents).map_err(|e| BuildError::output(&path, e))?;
    tracing::debug!("Generated: {:?}", path);
    Ok(())
}

/// Replace `output_dir` with `staging` using renames
fn swap_into_place(staging: &Path, output_dir: &Path) -> Result<(), BuildError> {
    let previous = sibling_dir(output_dir, "previous")?;
    if previous.exists() {
        fs::remove_dir_all(&previous).map_err(|e| BuildError::output(&previous, e))?;
    }

    let had_output = match fs::metadata(output_dir) {
        Ok(metadata) if metadata.is_dir() => true,
        Ok(_) => {
            return Err(BuildError::output(
                output_dir,
                io::Error::new(io::ErrorKind::AlreadyExists, "exists and is not a directory"),
            ))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => return Err(BuildError::output(output_dir, e)),
    };

    if had_output {
        fs::rename(output_dir, &previous).map_err(|e| BuildError::output(output_dir, e))?;
    }

    if let Err(e) = fs::rename(staging, output_dir) {
        if had_output {
            if let Err(restore) = fs::rename(&previous, output_dir) {
                tracing::error!(
                    "Failed to restore previous output from {:?}: {}",
                    previous,
                    restore
                );
            }
        }
        return Err(BuildError::output(output_dir, e));
    }

    if had_output {
        if let Err(e) = fs::remove_dir_all(&previous) {
            tracing::warn!("Failed to remove previous output {:?}: {}", previous, e);
        }
    }

    Ok(())
}
