//! Read-only access to the wallpapers folder under the user's pictures directory.

use std::io;
use std::path::{Path, PathBuf};

use directories::UserDirs;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Folder name used when the settings do not override it.
pub const DEFAULT_WALLPAPERS_FOLDER: &str = "Wallpapers";

/// Directory listing over `<pictures root>/<wallpapers folder>`.
///
/// Nothing is cached: every call hits the filesystem, so files dropped in by a
/// download show up on the next listing.
#[derive(Debug, Clone)]
pub struct PictureRepository {
    pictures_root: PathBuf,
    folder: String,
}

impl PictureRepository {
    /// Repository for `folder` under `pictures_root`. Nothing is touched on disk.
    pub fn new(pictures_root: impl Into<PathBuf>, folder: impl Into<String>) -> Self {
        Self {
            pictures_root: pictures_root.into(),
            folder: folder.into(),
        }
    }

    /// Repository rooted at the OS pictures directory.
    pub fn from_os(folder: impl Into<String>) -> Self {
        Self::new(os_pictures_dir(), folder)
    }

    /// List file names in the wallpapers folder, sorted by name.
    pub fn list_entries(&self) -> Result<Vec<String>> {
        let dir = self.wallpapers_dir();
        let walker = WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();
        let mut entries = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|err| Error::DirectoryUnavailable {
                path: dir.clone(),
                source: err.into(),
            })?;
            entries.push(entry.file_name().to_string_lossy().into_owned());
        }
        // A root that is a plain file produces an empty walk rather than an error.
        if entries.is_empty() && !dir.is_dir() {
            return Err(missing_dir_error(&dir));
        }
        Ok(entries)
    }

    /// The user's pictures directory this repository is rooted at.
    pub fn pictures_root(&self) -> &Path {
        &self.pictures_root
    }

    /// `<pictures_root>/<folder>`, whether or not it exists yet.
    pub fn wallpapers_dir(&self) -> PathBuf {
        self.pictures_root.join(&self.folder)
    }

    /// Absolute path of an entry, used both for applying and as a download target.
    pub fn wallpaper_path(&self, name: &str) -> PathBuf {
        self.wallpapers_dir().join(name)
    }

    /// Create the wallpapers folder if it does not exist yet.
    pub fn ensure_wallpapers_dir(&self) -> io::Result<PathBuf> {
        let dir = self.wallpapers_dir();
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

/// Resolve the OS pictures directory, falling back to `~/Pictures`.
pub fn os_pictures_dir() -> PathBuf {
    let Some(dirs) = UserDirs::new() else {
        return PathBuf::from("Pictures");
    };
    match dirs.picture_dir() {
        Some(dir) => dir.to_path_buf(),
        None => dirs.home_dir().join("Pictures"),
    }
}

/// Error for a root that exists but is not a directory; walkdir yields nothing for it.
fn missing_dir_error(dir: &Path) -> Error {
    let source = match std::fs::metadata(dir) {
        Ok(_) => io::Error::other("not a directory"),
        Err(err) => err,
    };
    Error::DirectoryUnavailable {
        path: dir.to_path_buf(),
        source,
    }
}
