//! Desktop background setters.

use std::path::Path;

use crate::error::{Error, Result};

/// Something that can make an image the desktop background.
pub trait WallpaperApplier {
    fn apply(&mut self, path: &Path) -> Result<()>;
}

/// Applies wallpapers through the host OS.
#[derive(Debug, Default)]
pub struct SystemWallpaper;

impl WallpaperApplier for SystemWallpaper {
    fn apply(&mut self, path: &Path) -> Result<()> {
        if !path.is_file() {
            return Err(Error::ApplyFailed {
                path: path.to_path_buf(),
                reason: "file not found".to_string(),
            });
        }
        set_wallpaper(path).map_err(|err| Error::ApplyFailed {
            path: path.to_path_buf(),
            reason: format!("{err:#}"),
        })
    }
}

#[cfg(windows)]
fn set_wallpaper(path: &Path) -> anyhow::Result<()> {
    use std::ffi::OsStr;
    use std::os::windows::ffi::OsStrExt;

    use anyhow::anyhow;
    use windows::Win32::UI::WindowsAndMessaging::{
        SPI_SETDESKWALLPAPER, SPIF_SENDCHANGE, SPIF_UPDATEINIFILE, SystemParametersInfoW,
    };

    use crate::image_ops::{cache_as_bmp, desktop_bmp_path};

    // SystemParametersInfoW is most reliable with BMP input.
    let bmp = desktop_bmp_path()?;
    cache_as_bmp(path, &bmp)?;

    let wide_path: Vec<u16> = OsStr::new(&bmp)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();
    unsafe {
        SystemParametersInfoW(
            SPI_SETDESKWALLPAPER,
            0,
            Some(wide_path.as_ptr() as *mut _),
            SPIF_UPDATEINIFILE | SPIF_SENDCHANGE,
        )
    }
    .map_err(|err| anyhow!("SystemParametersInfoW failed: {err}"))?;
    Ok(())
}

#[cfg(not(windows))]
fn set_wallpaper(path: &Path) -> anyhow::Result<()> {
    let path_str = path.display().to_string();
    wallpaper::set_from_path(&path_str).map_err(|err| anyhow::anyhow!("{err}"))
}
