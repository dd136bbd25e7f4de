//! Side channel for pulling new wallpapers from the web into the wallpapers folder.
//!
//! Each download streams on its own worker thread. Workers only send events;
//! [`DownloadSideChannel::pump`] applies them on the event-loop thread, so the
//! state machines and observers are never touched concurrently.

mod state;
mod transport;

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

pub use state::{DownloadId, DownloadItem, DownloadObserver, DownloadState, LoggingObserver};
pub use transport::{DownloadTransport, HttpTransport, Incoming};

use crate::error;
use crate::repository::PictureRepository;

const CHUNK_SIZE: usize = 64 * 1024;

/// Messages from download workers to the event loop.
#[derive(Debug)]
enum WorkerEvent {
    Started {
        id: DownloadId,
        destination: PathBuf,
        total: Option<u64>,
    },
    Progress {
        id: DownloadId,
        received: u64,
    },
    Interrupted {
        id: DownloadId,
        received: u64,
    },
    Completed {
        id: DownloadId,
    },
    Failed {
        id: DownloadId,
        reason: String,
    },
}

/// The secondary browsing surface: at most one open, pointed at a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surface {
    pub url: String,
}

/// Owns the browsing surface, the downloads started from it and their observers.
pub struct DownloadSideChannel {
    repository: PictureRepository,
    transport: Arc<dyn DownloadTransport>,
    partial_dir: PathBuf,
    surface: Option<Surface>,
    items: Vec<DownloadItem>,
    next_id: u64,
    observers: Vec<Box<dyn DownloadObserver>>,
    event_tx: Sender<WorkerEvent>,
    event_rx: Receiver<WorkerEvent>,
}

impl DownloadSideChannel {
    /// `partial_dir` holds in-flight data until a download completes.
    pub fn new(
        repository: PictureRepository,
        transport: Arc<dyn DownloadTransport>,
        partial_dir: PathBuf,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel();
        Self {
            repository,
            transport,
            partial_dir,
            surface: None,
            items: Vec::new(),
            next_id: 1,
            observers: vec![Box::new(LoggingObserver)],
            event_tx,
            event_rx,
        }
    }

    #[cfg(test)]
    pub fn add_observer(&mut self, observer: Box<dyn DownloadObserver>) {
        self.observers.push(observer);
    }

    /// Open the surface at `url` (or re-point it) and start downloading `url`.
    pub fn open(&mut self, url: &str) -> DownloadId {
        log::info!("opening download surface at {url}");
        self.surface = Some(Surface {
            url: url.to_string(),
        });
        self.spawn(url)
    }

    /// Start another download from the open surface. `None` when it is closed.
    pub fn request(&mut self, url: &str) -> Option<DownloadId> {
        let surface = self.surface.as_mut()?;
        surface.url = url.to_string();
        Some(self.spawn(url))
    }

    /// Close the surface. Returns true when it was open and the primary view must reload.
    ///
    /// Finished downloads are forgotten. Downloads already running keep going
    /// and are still reported by [`Self::pump`].
    pub fn close(&mut self) -> bool {
        let was_open = self.surface.take().is_some();
        if was_open {
            self.items.retain(|item| !item.state().is_terminal());
            log::info!("download surface closed");
        }
        was_open
    }

    pub fn surface(&self) -> Option<&Surface> {
        self.surface.as_ref()
    }

    pub fn items(&self) -> &[DownloadItem] {
        &self.items
    }

    pub fn item(&self, id: DownloadId) -> Option<&DownloadItem> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn has_active_downloads(&self) -> bool {
        self.items.iter().any(|item| !item.state().is_terminal())
    }

    /// Apply pending worker events.
    ///
    /// Returns the outcome of every download that reached a terminal state:
    /// the stored file, or the `DownloadFailed` / `DownloadInterrupted` error.
    pub fn pump(&mut self) -> Vec<error::Result<PathBuf>> {
        let mut finished = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            if let Some(outcome) = self.apply(event) {
                finished.push(outcome);
            }
        }
        finished
    }

    fn spawn(&mut self, url: &str) -> DownloadId {
        let id = DownloadId(self.next_id);
        self.next_id += 1;
        self.items.push(DownloadItem::new(id, url));

        let job = DownloadJob {
            id,
            url: url.to_string(),
            transport: Arc::clone(&self.transport),
            repository: self.repository.clone(),
            partial_dir: self.partial_dir.clone(),
            events: self.event_tx.clone(),
        };
        thread::spawn(move || job.run());
        id
    }

    fn apply(&mut self, event: WorkerEvent) -> Option<error::Result<PathBuf>> {
        let (id, next) = match event {
            WorkerEvent::Started {
                id,
                destination,
                total,
            } => {
                if let Some(item) = self.items.iter_mut().find(|item| item.id() == id) {
                    item.set_destination(destination);
                }
                let next = DownloadState::Progressing {
                    received: 0,
                    total,
                    paused: false,
                };
                (id, next)
            }
            WorkerEvent::Progress { id, received } => {
                let total = match self.item(id).map(DownloadItem::state) {
                    Some(DownloadState::Progressing { total, .. }) => *total,
                    _ => None,
                };
                let next = DownloadState::Progressing {
                    received,
                    total,
                    paused: false,
                };
                (id, next)
            }
            WorkerEvent::Interrupted { id, received } => (id, DownloadState::Interrupted { received }),
            WorkerEvent::Completed { id } => (id, DownloadState::Completed),
            WorkerEvent::Failed { id, reason } => (id, DownloadState::Failed(reason)),
        };

        let Some(item) = self.items.iter_mut().find(|item| item.id() == id) else {
            log::warn!("event for unknown download {id}");
            return None;
        };
        match item.transition(next) {
            Ok(previous) => {
                for observer in &mut self.observers {
                    observer.on_transition(item, &previous);
                }
                item.outcome()
            }
            Err(err) => {
                log::warn!("download {id}: {err}");
                None
            }
        }
    }
}

impl std::fmt::Debug for DownloadSideChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadSideChannel")
            .field("surface", &self.surface)
            .field("items", &self.items)
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

/// Everything a worker thread needs for one download.
struct DownloadJob {
    id: DownloadId,
    url: String,
    transport: Arc<dyn DownloadTransport>,
    repository: PictureRepository,
    partial_dir: PathBuf,
    events: Sender<WorkerEvent>,
}

impl DownloadJob {
    fn run(self) {
        let id = self.id;
        let event = match self.stream() {
            Ok(()) => WorkerEvent::Completed { id },
            Err(JobError::Interrupted(received)) => WorkerEvent::Interrupted { id, received },
            Err(JobError::Failed(reason)) => WorkerEvent::Failed { id, reason },
        };
        let _ = self.events.send(event);
    }

    fn stream(&self) -> Result<(), JobError> {
        let Incoming {
            suggested_filename,
            total,
            mut body,
        } = self
            .transport
            .fetch(&self.url)
            .map_err(|err| JobError::Failed(format!("{err:#}")))?;

        let destination = self.repository.wallpaper_path(&suggested_filename);
        let _ = self.events.send(WorkerEvent::Started {
            id: self.id,
            destination: destination.clone(),
            total,
        });

        fs::create_dir_all(&self.partial_dir).map_err(JobError::io)?;
        let partial = self
            .partial_dir
            .join(format!("{}-{suggested_filename}.part", self.id.0));
        let result = self.copy_body(&mut body, &partial).and_then(|()| {
            self.repository.ensure_wallpapers_dir().map_err(JobError::io)?;
            move_into_place(&partial, &destination).map_err(JobError::io)
        });
        if result.is_err() {
            let _ = fs::remove_file(&partial);
        }
        result
    }

    fn copy_body(&self, body: &mut dyn Read, partial: &Path) -> Result<(), JobError> {
        let mut file = File::create(partial).map_err(JobError::io)?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut received = 0u64;
        loop {
            let n = match body.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) if received > 0 => {
                    log::debug!("download {} read error: {err}", self.id);
                    return Err(JobError::Interrupted(received));
                }
                Err(err) => return Err(JobError::io(err)),
            };
            file.write_all(&buf[..n]).map_err(JobError::io)?;
            received += n as u64;
            let _ = self.events.send(WorkerEvent::Progress {
                id: self.id,
                received,
            });
        }
        file.flush().map_err(JobError::io)?;
        Ok(())
    }
}

enum JobError {
    Interrupted(u64),
    Failed(String),
}

impl JobError {
    fn io(err: io::Error) -> Self {
        JobError::Failed(err.to_string())
    }
}

/// Rename into place, copying when the partial dir sits on another filesystem.
fn move_into_place(partial: &Path, destination: &Path) -> io::Result<()> {
    if fs::rename(partial, destination).is_ok() {
        return Ok(());
    }
    fs::copy(partial, destination)?;
    fs::remove_file(partial)
}
