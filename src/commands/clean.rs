//! Clean the output directory

use anyhow::Result;
use std::fs;

use crate::generator::sibling_dir;
use crate::Site;

/// Remove the output directory, leftovers of an interrupted publish and the render cache
pub fn run(site: &Site) -> Result<()> {
    let mut targets = vec![site.output_dir.clone()];
    for suffix in ["staging", "previous"] {
        targets.push(sibling_dir(&site.output_dir, suffix)?);
    }
    targets.push(site.cache_dir.clone());

    for path in targets {
        if path.exists() {
            fs::remove_dir_all(&path)?;
            tracing::info!("Deleted: {:?}", path);
        }
    }

    Ok(())
}
