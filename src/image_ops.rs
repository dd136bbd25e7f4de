//! Image conversion for hosts that need a specific wallpaper format.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::ImageFormat;

use crate::settings::cache_dir;

/// Decode `src` and write it to `dest` as a 24-bit BMP.
#[cfg_attr(not(windows), allow(dead_code))]
pub fn cache_as_bmp(src: &Path, dest: &Path) -> Result<()> {
    let img = image::open(src).with_context(|| format!("failed to open {}", src.display()))?;
    let rgb = img.to_rgb8();
    rgb.save_with_format(dest, ImageFormat::Bmp)
        .with_context(|| format!("failed to write {}", dest.display()))?;
    Ok(())
}

/// Cache path holding the BMP handed to the desktop.
#[cfg_attr(not(windows), allow(dead_code))]
pub fn desktop_bmp_path() -> Result<PathBuf> {
    Ok(cache_dir()?.join("current.bmp"))
}
