//! Storage Layer
//!
//! Config file location and the optional dump of intermediate images.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::vision::{PageImage, RegionImage};

const CONFIG_FILE: &str = "config.toml";

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "recipescan", "RecipeScan")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    let config_dir = proj_dirs.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}

/// Default location of the config file
pub fn default_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CONFIG_FILE))
}

/// Write the normalized page and every region crop into `dir`.
///
/// Files are named `<invocation>-page.png` and `<invocation>-region-<n>.png`.
pub fn save_debug_images(
    dir: &Path,
    invocation: &str,
    page: &PageImage,
    regions: &[RegionImage],
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create debug directory {:?}", dir))?;

    let mut written = Vec::with_capacity(regions.len() + 1);
    let page_path = dir.join(format!("{}-page.png", invocation));
    page.save(&page_path)
        .with_context(|| format!("Failed to write {:?}", page_path))?;
    written.push(page_path);

    for region in regions {
        let path = dir.join(format!("{}-region-{}.png", invocation, region.index));
        region
            .image
            .save(&path)
            .with_context(|| format!("Failed to write {:?}", path))?;
        written.push(path);
    }

    Ok(written)
}
