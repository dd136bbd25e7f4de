//! Download lifecycle state machine.

use std::path::PathBuf;

use crate::error::{Error, Result};

/// Identifier handed out per requested download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DownloadId(pub u64);

impl std::fmt::Display for DownloadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a download comes from and where it will be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    pub source_url: String,
    pub destination: PathBuf,
}

/// Lifecycle of a single download.
///
/// `Requested -> Progressing* -> Completed | Failed | Interrupted`, with
/// `Requested` allowed to fail or be interrupted before any progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadState {
    Requested,
    Progressing {
        received: u64,
        total: Option<u64>,
        paused: bool,
    },
    /// Stopped after receiving data. Not resumed automatically.
    Interrupted { received: u64 },
    Completed,
    Failed(String),
}

impl DownloadState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DownloadState::Interrupted { .. } | DownloadState::Completed | DownloadState::Failed(_)
        )
    }

    fn can_become(&self, next: &DownloadState) -> bool {
        use DownloadState::*;
        match (self, next) {
            (Requested, Progressing { .. } | Interrupted { .. } | Failed(_)) => true,
            (Progressing { .. }, Progressing { .. } | Interrupted { .. } | Completed | Failed(_)) => {
                true
            }
            _ => false,
        }
    }
}

/// One download tracked by the side channel.
#[derive(Debug, Clone)]
pub struct DownloadItem {
    id: DownloadId,
    url: String,
    destination: Option<PathBuf>,
    state: DownloadState,
}

impl DownloadItem {
    pub fn new(id: DownloadId, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            destination: None,
            state: DownloadState::Requested,
        }
    }

    pub fn id(&self) -> DownloadId {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> &DownloadState {
        &self.state
    }

    /// Source and destination, known once the server suggested a file name.
    pub fn target(&self) -> Option<DownloadTarget> {
        self.destination.as_ref().map(|destination| DownloadTarget {
            source_url: self.url.clone(),
            destination: destination.clone(),
        })
    }

    pub(crate) fn set_destination(&mut self, destination: PathBuf) {
        self.destination = Some(destination);
    }

    /// Move to `next`, returning the state that was left.
    pub fn transition(&mut self, next: DownloadState) -> Result<DownloadState> {
        if !self.state.can_become(&next) {
            return Err(Error::InvalidTransition {
                from: self.state.clone(),
                to: next,
            });
        }
        Ok(std::mem::replace(&mut self.state, next))
    }

    /// Terminal result: the stored file, or the error that ended the download.
    pub fn outcome(&self) -> Option<Result<PathBuf>> {
        match &self.state {
            DownloadState::Completed => self.destination.clone().map(Ok),
            DownloadState::Failed(reason) => Some(Err(Error::DownloadFailed {
                url: self.url.clone(),
                reason: reason.clone(),
            })),
            DownloadState::Interrupted { received } => Some(Err(Error::DownloadInterrupted {
                url: self.url.clone(),
                received: *received,
            })),
            DownloadState::Requested | DownloadState::Progressing { .. } => None,
        }
    }
}

/// Receives every accepted state transition.
pub trait DownloadObserver {
    fn on_transition(&mut self, item: &DownloadItem, previous: &DownloadState);
}

/// Reports download lifecycle through the `log` facade.
#[derive(Debug, Default)]
pub struct LoggingObserver;

impl DownloadObserver for LoggingObserver {
    fn on_transition(&mut self, item: &DownloadItem, previous: &DownloadState) {
        match item.state() {
            DownloadState::Requested => {}
            DownloadState::Progressing { paused: true, .. } => {
                log::info!("download {} is paused", item.id());
            }
            DownloadState::Progressing { received, .. } => {
                if matches!(previous, DownloadState::Requested) {
                    if let Some(target) = item.target() {
                        log::info!(
                            "download {} saving {} to {}",
                            item.id(),
                            target.source_url,
                            target.destination.display()
                        );
                    }
                }
                log::debug!("download {} received {received} bytes", item.id());
            }
            DownloadState::Interrupted { received } => {
                log::warn!(
                    "download {} interrupted after {received} bytes; it can be resumed but will not be",
                    item.id()
                );
            }
            DownloadState::Completed => log::info!("download {} completed", item.id()),
            DownloadState::Failed(reason) => {
                log::warn!("download {} failed: {reason}", item.id());
            }
        }
    }
}
