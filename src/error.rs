//! Error taxonomy shared by the rotation, repository and download modules.

use std::path::PathBuf;

use thiserror::Error;

use crate::download::DownloadState;

/// Errors raised by the wallpaper core.
#[derive(Debug, Error)]
pub enum Error {
    /// The wallpapers folder is missing or unreadable.
    #[error("wallpaper directory unavailable: {}", .path.display())]
    DirectoryUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Rotation interval must be between one second and one year.
    #[error("invalid rotation interval: {0} seconds (must be between 1 second and one year)")]
    InvalidInterval(i64),
    /// The host refused to set the desktop background.
    #[error("failed to apply wallpaper {}: {reason}", .path.display())]
    ApplyFailed { path: PathBuf, reason: String },
    /// Download ended without producing a file.
    #[error("download of {url} failed: {reason}")]
    DownloadFailed { url: String, reason: String },
    /// Download stopped midway; resumable in principle but never resumed.
    #[error("download of {url} interrupted after {received} bytes")]
    DownloadInterrupted { url: String, received: u64 },
    /// Download state machine received an event it cannot accept.
    #[error("illegal download transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: DownloadState,
        to: DownloadState,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
