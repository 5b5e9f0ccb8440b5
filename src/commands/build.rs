//! Build the static site

use anyhow::Result;
use std::time::Instant;

use crate::cache::RenderCache;
use crate::content::{MarkdownRenderer, PostRepository};
use crate::error::BuildError;
use crate::generator::Generator;
use crate::report::BuildReport;
use crate::Site;

/// Load every post, generate the site and refresh the render cache
pub fn run(site: &Site) -> Result<BuildReport> {
    let start = Instant::now();
    check_directories(site)?;

    let renderer = MarkdownRenderer::with_options(&site.config.highlight);
    let fingerprint = renderer.fingerprint();

    let cache = site
        .config
        .cache
        .enable
        .then(|| RenderCache::load(&site.cache_dir, &fingerprint));
    if let Some(cache) = &cache {
        tracing::debug!("Loaded {} cache entries", cache.len());
    }

    let (repository, mut report) =
        PostRepository::load_all(&site.input_dir, &renderer, cache.as_ref())?;

    let generator = Generator::new(&site.config)?;
    report.pages_written = generator.generate_all(&repository, &site.output_dir)?;

    if site.config.cache.enable {
        let cache = RenderCache::from_posts(&fingerprint, repository.all());
        if let Err(e) = cache.save(&site.cache_dir) {
            tracing::warn!("Failed to save render cache in {:?}: {}", site.cache_dir, e);
        }
    }

    let duration = start.elapsed();
    tracing::info!("{} in {:.2}s", report.summary(), duration.as_secs_f64());

    Ok(report)
}

/// Publishing replaces the output directory wholesale, so it must not hold the posts
fn check_directories(site: &Site) -> Result<(), BuildError> {
    if site.input_dir.starts_with(&site.output_dir) {
        return Err(BuildError::Config(format!(
            "output directory {} would overwrite the input directory {}",
            site.output_dir.display(),
            site.input_dir.display()
        )));
    }
    Ok(())
}
