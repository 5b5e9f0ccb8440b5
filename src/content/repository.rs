//! Post repository - loads every post of a site and answers listing queries

use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::post::SourceFile;
use super::{slug_from_path, MarkdownRenderer, Post};
use crate::cache::{self, RenderCache};
use crate::error::{BuildError, ContentError, NotFound};
use crate::report::BuildReport;

/// All posts of one build, sorted newest first (ties by slug).
///
/// Read-only once loaded; a new repository is built for every build.
#[derive(Debug, Default)]
pub struct PostRepository {
    posts: Vec<Post>,
    slugs: HashMap<String, usize>,
    tags: BTreeMap<String, Vec<usize>>,
}

impl PostRepository {
    /// Load every post file in `dir`.
    ///
    /// Files that fail to parse are recorded in the returned report and left
    /// out. Only directory-level problems and duplicate slugs are fatal.
    pub fn load_all(
        dir: &Path,
        renderer: &MarkdownRenderer,
        cache: Option<&RenderCache>,
    ) -> Result<(Self, BuildReport), BuildError> {
        let files = list_post_files(dir)?;
        tracing::debug!("Found {} post files in {:?}", files.len(), dir);
        check_slug_collisions(&files)?;

        // Order of `files` is preserved by the parallel collect
        let results: Vec<(PathBuf, Result<(Post, bool), ContentError>)> = files
            .into_par_iter()
            .map(|path| {
                let result = load_post(&path, renderer, cache);
                (path, result)
            })
            .collect();

        let mut report = BuildReport::default();
        let mut posts = Vec::with_capacity(results.len());
        for (path, result) in results {
            match result {
                Ok((post, from_cache)) => {
                    if from_cache {
                        report.cache_hits += 1;
                    }
                    posts.push(post);
                }
                Err(e) => report.skip(path, e),
            }
        }

        let repository = Self::from_posts(posts)?;
        report.post_count = repository.len();

        tracing::info!(
            "Loaded {} posts from {:?} ({} skipped, {} cached)",
            report.post_count,
            dir,
            report.skipped_count(),
            report.cache_hits
        );

        Ok((repository, report))
    }

    /// Build a repository from already parsed posts
    pub fn from_posts(mut posts: Vec<Post>) -> Result<Self, BuildError> {
        let mut seen: HashMap<&str, &Path> = HashMap::with_capacity(posts.len());
        for post in &posts {
            if let Some(first) = seen.insert(post.slug.as_str(), post.source.as_path()) {
                return Err(BuildError::DuplicateSlug {
                    slug: post.slug.clone(),
                    first: first.to_path_buf(),
                    second: post.source.clone(),
                });
            }
        }

        posts.sort_by(Post::listing_order);

        let mut slugs = HashMap::with_capacity(posts.len());
        let mut tags: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, post) in posts.iter().enumerate() {
            slugs.insert(post.slug.clone(), i);
            for tag in &post.tags {
                tags.entry(tag.clone()).or_default().push(i);
            }
        }

        Ok(Self { posts, slugs, tags })
    }

    /// All posts, newest first
    pub fn all(&self) -> &[Post] {
        &self.posts
    }

    /// Look up a post by slug
    pub fn by_slug(&self, slug: &str) -> Result<&Post, NotFound> {
        self.slugs
            .get(slug)
            .map(|&i| &self.posts[i])
            .ok_or_else(|| NotFound {
                slug: slug.to_string(),
            })
    }

    /// Posts carrying `tag` (exact match), in the order of [`all`](Self::all)
    pub fn by_tag(&self, tag: &str) -> Vec<&Post> {
        self.tags
            .get(tag)
            .map(|indices| indices.iter().map(|&i| &self.posts[i]).collect())
            .unwrap_or_default()
    }

    /// Featured posts, in the order of [`all`](Self::all)
    pub fn featured(&self) -> Vec<&Post> {
        self.posts.iter().filter(|p| p.featured).collect()
    }

    /// Distinct tags with their post counts, by name
    pub fn tags(&self) -> Vec<(&str, usize)> {
        self.tags
            .iter()
            .map(|(name, posts)| (name.as_str(), posts.len()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

/// Markdown files directly inside `dir`, sorted by file name
fn list_post_files(dir: &Path) -> Result<Vec<PathBuf>, BuildError> {
    let unreadable = |source: io::Error| BuildError::UnreadableInput {
        path: dir.to_path_buf(),
        source,
    };

    let metadata = fs::metadata(dir).map_err(unreadable)?;
    if !metadata.is_dir() {
        return Err(unreadable(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a directory",
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(unreadable(e.into())),
            Err(e) => {
                tracing::warn!("Ignoring unreadable entry in {:?}: {}", dir, e);
                continue;
            }
        };

        let path = entry.path();
        if entry.file_type().is_file() && !is_hidden(path) && is_markdown_file(path) {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}

/// Slugs come from file names alone, so two files mapping to one slug are
/// fatal even if one of them would later be skipped
fn check_slug_collisions(files: &[PathBuf]) -> Result<(), BuildError> {
    let mut seen: HashMap<String, &Path> = HashMap::with_capacity(files.len());
    for path in files {
        // An empty slug is reported per file when the post is loaded
        let Ok(slug) = slug_from_path(path) else {
            continue;
        };
        if let Some(first) = seen.get(&slug) {
            return Err(BuildError::DuplicateSlug {
                slug,
                first: first.to_path_buf(),
                second: path.clone(),
            });
        }
        seen.insert(slug, path);
    }
    Ok(())
}

/// Read, parse and render one post. The bool tells whether the body came from the cache.
fn load_post(
    path: &Path,
    renderer: &MarkdownRenderer,
    cache: Option<&RenderCache>,
) -> Result<(Post, bool), ContentError> {
    let file = SourceFile::read(path)?;

    let cached_html = cache.and_then(|cache| {
        let key = cache::cache_key(path)?;
        let mtime = file.modified?;
        cache
            .lookup(&key, mtime, &file.content_hash)
            .map(str::to_string)
    });
    let from_cache = cached_html.is_some();

    let post = Post::from_source(&file, renderer, cached_html)?;
    tracing::debug!("Loaded post {} from {:?}", post.slug, path);
    Ok((post, from_cache))
}

/// Check if a file is a markdown file
fn is_markdown_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("md") || e.eq_ignore_ascii_case("markdown"))
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn write_post(dir: &Path, name: &str, title: &str, date: &str, extra: &str) {
        let content = format!(
            "---\ntitle: \"{}\"\ndate: \"{}\"\n{}---\n\nBody of {}.\n",
            title, date, extra, title
        );
        fs::write(dir.join(name), content).unwrap();
    }

    fn load(dir: &Path) -> (PostRepository, BuildReport) {
        PostRepository::load_all(dir, &MarkdownRenderer::new(), None).unwrap()
    }

    /// A small site used by several tests
    fn sample_site(dir: &Path) {
        write_post(
            dir,
            "welcome-to-my-blog.md",
            "Welcome to My Blog",
            "2026-01-21",
            "tags: [\"general\", \"introduction\"]\nfeatured: true\n",
        );
        write_post(
            dir,
            "laravel-rate-limiting.md",
            "Rate Limiting in Laravel",
            "2025-11-02",
            "tags: [laravel, security]\nexcerpt: Throttle everything\n",
        );
        write_post(
            dir,
            "sql-injection.md",
            "SQL Injection 101",
            "2025-11-02",
            "tags: [security]\nfeatured: true\n",
        );
        write_post(
            dir,
            "eks-upgrade.md",
            "Upgrading EKS",
            "2024-06-30",
            "tags: [aws, kubernetes, general]\n",
        );
    }

    #[test]
    fn test_metadata_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        sample_site(dir.path());
        let (repo, report) = load(dir.path());

        assert_eq!(report.post_count, 4);
        assert!(report.skipped.is_empty());

        let post = repo.by_slug("welcome-to-my-blog").unwrap();
        assert_eq!(post.title, "Welcome to My Blog");
        assert_eq!(post.date, NaiveDate::from_ymd_opt(2026, 1, 21).unwrap());
        assert_eq!(post.tags, vec!["general", "introduction"]);
        assert!(post.featured);

        let post = repo.by_slug("laravel-rate-limiting").unwrap();
        assert_eq!(post.excerpt.as_deref(), Some("Throttle everything"));
        assert!(!post.featured);
    }

    #[test]
    fn test_by_slug_not_found() {
        let dir = tempfile::tempdir().unwrap();
        sample_site(dir.path());
        let (repo, _) = load(dir.path());
        assert_eq!(
            repo.by_slug("missing").unwrap_err(),
            NotFound {
                slug: "missing".to_string()
            }
        );
    }

    #[test]
    fn test_sort_order() {
        let dir = tempfile::tempdir().unwrap();
        sample_site(dir.path());
        let (repo, _) = load(dir.path());

        let slugs: Vec<_> = repo.all().iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(
            slugs,
            vec![
                "welcome-to-my-blog",
                "laravel-rate-limiting",
                "sql-injection",
                "eks-upgrade"
            ]
        );

        for pair in repo.all().windows(2) {
            assert!(pair[0].date >= pair[1].date);
            if pair[0].date == pair[1].date {
                assert!(pair[0].slug <= pair[1].slug);
            }
        }
    }

    #[test]
    fn test_by_tag_is_ordered_subset_of_all() {
        let dir = tempfile::tempdir().unwrap();
        sample_site(dir.path());
        let (repo, _) = load(dir.path());

        for (tag, count) in repo.tags() {
            let expected: Vec<&str> = repo
                .all()
                .iter()
                .filter(|p| p.tags.iter().any(|t| t == tag))
                .map(|p| p.slug.as_str())
                .collect();
            let actual: Vec<&str> = repo.by_tag(tag).iter().map(|p| p.slug.as_str()).collect();
            assert_eq!(actual, expected, "tag {}", tag);
            assert_eq!(count, expected.len());
        }

        let general: Vec<_> = repo.by_tag("general").iter().map(|p| p.slug.clone()).collect();
        assert_eq!(general, vec!["welcome-to-my-blog", "eks-upgrade"]);
        assert!(repo.by_tag("General").is_empty());
        assert!(repo.by_tag("nope").is_empty());
    }

    #[test]
    fn test_featured() {
        let dir = tempfile::tempdir().unwrap();
        sample_site(dir.path());
        let (repo, _) = load(dir.path());
        let featured: Vec<_> = repo.featured().iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(featured, vec!["welcome-to-my-blog", "sql-injection"]);
    }

    #[test]
    fn test_tags_listing() {
        let dir = tempfile::tempdir().unwrap();
        sample_site(dir.path());
        let (repo, _) = load(dir.path());
        assert_eq!(
            repo.tags(),
            vec![
                ("aws", 1),
                ("general", 2),
                ("introduction", 1),
                ("kubernetes", 1),
                ("laravel", 1),
                ("security", 2)
            ]
        );
    }

    #[test]
    fn test_bad_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        sample_site(dir.path());
        fs::write(dir.path().join("broken.md"), "no front matter at all").unwrap();

        let (repo, report) = load(dir.path());
        assert_eq!(repo.len(), 4);
        assert_eq!(report.skipped_count(), 1);
        assert_eq!(report.skipped[0].path, dir.path().join("broken.md"));
        assert!(matches!(
            report.skipped[0].reason,
            ContentError::MalformedFrontMatter(_)
        ));
    }

    #[test]
    fn test_each_recoverable_error_skips_only_its_file() {
        let dir = tempfile::tempdir().unwrap();
        write_post(dir.path(), "good.md", "Good", "2024-01-01", "");
        write_post(dir.path(), "bad-date.md", "Bad Date", "2024-13-45", "");
        write_post(dir.path(), "bad-flag.md", "Bad Flag", "2024-01-01", "featured: sometimes\n");
        fs::write(dir.path().join("no-title.md"), "---\ndate: 2024-01-01\n---\n").unwrap();

        let (repo, report) = load(dir.path());
        assert_eq!(repo.len(), 1);
        assert_eq!(report.skipped_count(), 3);

        let reasons: Vec<_> = report
            .skipped
            .iter()
            .map(|s| s.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(reasons, vec!["bad-date.md", "bad-flag.md", "no-title.md"]);
    }

    #[test]
    fn test_duplicate_slug_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_post(dir.path(), "Hello World.md", "One", "2024-01-01", "");
        write_post(dir.path(), "hello-world.md", "Two", "2024-01-02", "");

        let err = PostRepository::load_all(dir.path(), &MarkdownRenderer::new(), None).unwrap_err();
        match err {
            BuildError::DuplicateSlug {
                slug,
                first,
                second,
            } => {
                assert_eq!(slug, "hello-world");
                assert_eq!(first, dir.path().join("Hello World.md"));
                assert_eq!(second, dir.path().join("hello-world.md"));
            }
            other => panic!("expected DuplicateSlug, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_slug_is_fatal_even_if_unparseable() {
        let dir = tempfile::tempdir().unwrap();
        write_post(dir.path(), "Hello World.md", "One", "2024-01-01", "");
        fs::write(dir.path().join("hello-world.md"), "---\ntitle: [unclosed\n---\n").unwrap();

        let err = PostRepository::load_all(dir.path(), &MarkdownRenderer::new(), None).unwrap_err();
        assert!(matches!(
            err,
            BuildError::DuplicateSlug { ref slug, ref second, .. }
                if slug == "hello-world" && second == &dir.path().join("hello-world.md")
        ));
    }

    #[test]
    fn test_only_top_level_markdown_files() {
        let dir = tempfile::tempdir().unwrap();
        write_post(dir.path(), "post.md", "Post", "2024-01-01", "");
        write_post(dir.path(), "long.markdown", "Long", "2024-01-01", "");
        write_post(dir.path(), ".draft.md", "Hidden", "2024-01-01", "");
        fs::write(dir.path().join("notes.txt"), "not a post").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        write_post(&dir.path().join("nested"), "inner.md", "Inner", "2024-01-01", "");

        let (repo, report) = load(dir.path());
        let slugs: Vec<_> = repo.all().iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["long", "post"]);
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn test_missing_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = PostRepository::load_all(
            &dir.path().join("missing"),
            &MarkdownRenderer::new(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::UnreadableInput { .. }));

        let file = dir.path().join("file.md");
        fs::write(&file, "x").unwrap();
        let err = PostRepository::load_all(&file, &MarkdownRenderer::new(), None).unwrap_err();
        assert!(matches!(err, BuildError::UnreadableInput { .. }));
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let (repo, report) = load(dir.path());
        assert!(repo.is_empty());
        assert_eq!(report.post_count, 0);
        assert!(repo.tags().is_empty());
    }

    #[test]
    fn test_render_cache_reuse() {
        let dir = tempfile::tempdir().unwrap();
        sample_site(dir.path());
        let renderer = MarkdownRenderer::new();

        let (repo, report) = PostRepository::load_all(dir.path(), &renderer, None).unwrap();
        assert_eq!(report.cache_hits, 0);

        let mut cache = RenderCache::from_posts(&renderer.fingerprint(), repo.all());
        assert_eq!(cache.len(), 4);

        let (_, report) = PostRepository::load_all(dir.path(), &renderer, Some(&cache)).unwrap();
        assert_eq!(report.cache_hits, 4);

        // A stale entry for changed content is never used
        for entry in cache.entries.values_mut() {
            entry.body_html = "<p>stale</p>".to_string();
            entry.content_hash = "0".repeat(64);
        }
        let (repo, report) = PostRepository::load_all(dir.path(), &renderer, Some(&cache)).unwrap();
        assert_eq!(report.cache_hits, 0);
        assert!(repo.all().iter().all(|p| !p.body_html.contains("stale")));
    }
}
