//! Rotation timer and random image selection.
//!
//! The scheduler holds at most one timer. It never sleeps by itself: the owning
//! event loop passes the current `Instant` to [`RotationScheduler::poll`] and
//! asks [`RotationScheduler::time_until_next_tick`] how long it may wait, so a
//! tick always runs to completion before a reconfiguration is processed.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;

use crate::error::{self, Error};
use crate::repository::PictureRepository;
use crate::wallpaper::WallpaperApplier;

/// Source of uniformly distributed indices.
pub trait RandomSource {
    /// Uniform integer in `[min, max)`. Callers guarantee `min < max`.
    fn index_in(&mut self, min: usize, max: usize) -> usize;
}

/// Default random source backed by ChaCha.
#[derive(Debug, Clone)]
pub struct ChaChaSource(ChaChaRng);

impl ChaChaSource {
    pub fn from_entropy() -> Self {
        Self(ChaChaRng::from_entropy())
    }

    #[cfg(test)]
    pub fn seeded(seed: u64) -> Self {
        Self(ChaChaRng::seed_from_u64(seed))
    }
}

impl RandomSource for ChaChaSource {
    fn index_in(&mut self, min: usize, max: usize) -> usize {
        self.0.gen_range(min..max)
    }
}

/// Pick an index into a list of `len` entries, or `None` when the list is empty.
pub fn pick_index(rng: &mut impl RandomSource, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    Some(rng.index_in(0, len))
}

/// Longest accepted rotation interval: one year.
pub const MAX_INTERVAL_SECS: u64 = 365 * 24 * 60 * 60;

/// Validated rotation interval, between one second and [`MAX_INTERVAL_SECS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationConfig {
    interval: Duration,
}

impl RotationConfig {
    pub fn new(interval_secs: i64) -> error::Result<Self> {
        match u64::try_from(interval_secs) {
            Ok(secs) if (1..=MAX_INTERVAL_SECS).contains(&secs) => Ok(Self {
                interval: Duration::from_secs(secs),
            }),
            _ => Err(Error::InvalidInterval(interval_secs)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn interval_secs(&self) -> u64 {
        self.interval.as_secs()
    }
}

/// Result of a single rotation tick.
#[derive(Debug)]
pub enum TickOutcome {
    /// The wallpaper was changed to this path.
    Applied(PathBuf),
    /// Nothing to choose from; no wallpaper change.
    SkippedEmpty,
    /// The wallpapers folder could not be listed.
    ListingFailed(Error),
    /// The host rejected the chosen image.
    ApplyFailed(Error),
}

#[derive(Debug)]
struct ActiveTimer {
    config: RotationConfig,
    next_due: Instant,
}

/// Owns the rotation timer and the collaborators a tick needs.
#[derive(Debug)]
pub struct RotationScheduler<A, R = ChaChaSource> {
    repository: PictureRepository,
    applier: A,
    rng: R,
    timer: Option<ActiveTimer>,
}

impl<A: WallpaperApplier, R: RandomSource> RotationScheduler<A, R> {
    pub fn new(repository: PictureRepository, applier: A, rng: R) -> Self {
        Self {
            repository,
            applier,
            rng,
            timer: None,
        }
    }

    /// Start the timer or replace the running one.
    ///
    /// Invalid intervals are rejected without touching the current timer.
    pub fn configure(&mut self, interval_secs: i64, now: Instant) -> error::Result<()> {
        let config = RotationConfig::new(interval_secs)?;
        let next_due = now
            .checked_add(config.interval())
            .ok_or(Error::InvalidInterval(interval_secs))?;
        let previous = self.timer.replace(ActiveTimer { config, next_due });
        match previous {
            Some(old) => log::info!(
                "rotation interval changed from {}s to {}s",
                old.config.interval_secs(),
                config.interval_secs()
            ),
            None => log::info!("rotation started every {}s", config.interval_secs()),
        }
        Ok(())
    }

    /// Cancel the timer, returning to idle.
    pub fn stop(&mut self) {
        if self.timer.take().is_some() {
            log::info!("rotation stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.timer.is_some()
    }

    pub fn config(&self) -> Option<RotationConfig> {
        self.timer.as_ref().map(|timer| timer.config)
    }

    /// Time left until the next tick, zero when one is overdue, `None` when idle.
    pub fn time_until_next_tick(&self, now: Instant) -> Option<Duration> {
        self.timer
            .as_ref()
            .map(|timer| timer.next_due.saturating_duration_since(now))
    }

    /// Run a tick if one is due at `now`.
    ///
    /// At most one tick fires per call; a late poll does not replay missed ticks.
    pub fn poll(&mut self, now: Instant) -> Option<TickOutcome> {
        let timer = self.timer.as_mut()?;
        if now < timer.next_due {
            return None;
        }
        let interval = timer.config.interval();
        let next_due = timer
            .next_due
            .checked_add(interval)
            .filter(|due| *due > now)
            .or_else(|| now.checked_add(interval));
        match next_due {
            Some(due) => timer.next_due = due,
            None => {
                log::warn!("next rotation deadline is out of range; rotation stopped");
                self.timer = None;
            }
        }
        Some(self.tick())
    }

    /// Pick a random entry from the repository and apply it.
    ///
    /// Failures are reported in the outcome and never cancel the timer.
    pub fn tick(&mut self) -> TickOutcome {
        let entries = match self.repository.list_entries() {
            Ok(entries) => entries,
            Err(err) => {
                log::warn!("rotation tick skipped: {err}");
                return TickOutcome::ListingFailed(err);
            }
        };
        let Some(index) = pick_index(&mut self.rng, entries.len()) else {
            log::debug!(
                "rotation tick skipped: {} is empty",
                self.repository.wallpapers_dir().display()
            );
            return TickOutcome::SkippedEmpty;
        };

        let path = self.repository.wallpaper_path(&entries[index]);
        match self.applier.apply(&path) {
            Ok(()) => {
                log::info!("wallpaper set to {}", path.display());
                TickOutcome::Applied(path)
            }
            Err(err) => {
                log::warn!("{err}");
                TickOutcome::ApplyFailed(err)
            }
        }
    }

    /// Apply a specific entry right away, outside the timer.
    pub fn apply_entry(&mut self, name: &str) -> error::Result<PathBuf> {
        let path = self.repository.wallpaper_path(name);
        self.applier.apply(&path)?;
        log::info!("wallpaper set to {}", path.display());
        Ok(path)
    }

    pub fn repository(&self) -> &PictureRepository {
        &self.repository
    }

    #[cfg(test)]
    pub fn applier(&self) -> &A {
        &self.applier
    }

    /// Drive the timer on the current thread until the process is killed.
    pub fn run_blocking(&mut self) -> Result<()> {
        if !self.is_active() {
            bail!("no rotation interval configured; pass --interval or set interval_secs");
        }
        let step = Duration::from_millis(500);
        loop {
            self.poll(Instant::now());
            let wait = self.time_until_next_tick(Instant::now()).unwrap_or(step);
            thread::sleep(step.min(wait));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use tempfile::TempDir;

    use super::*;
    use crate::repository::DEFAULT_WALLPAPERS_FOLDER;

    #[derive(Debug, Default)]
    struct RecordingApplier {
        applied: Vec<PathBuf>,
        fail: bool,
    }

    impl WallpaperApplier for RecordingApplier {
        fn apply(&mut self, path: &Path) -> error::Result<()> {
            self.applied.push(path.to_path_buf());
            if self.fail {
                return Err(Error::ApplyFailed {
                    path: path.to_path_buf(),
                    reason: "refused".into(),
                });
            }
            Ok(())
        }
    }

    /// Always returns the same index.
    struct FixedSource(usize);

    impl RandomSource for FixedSource {
        fn index_in(&mut self, _min: usize, _max: usize) -> usize {
            self.0
        }
    }

    fn repo_with(files: &[&str]) -> (TempDir, PictureRepository) {
        let root = TempDir::new().unwrap();
        let repo = PictureRepository::new(root.path(), DEFAULT_WALLPAPERS_FOLDER);
        let dir = repo.ensure_wallpapers_dir().unwrap();
        for name in files {
            fs::write(dir.join(name), b"img").unwrap();
        }
        (root, repo)
    }

    fn scheduler(
        repo: PictureRepository,
    ) -> RotationScheduler<RecordingApplier, ChaChaSource> {
        RotationScheduler::new(repo, RecordingApplier::default(), ChaChaSource::seeded(7))
    }

    #[test]
    fn random_indices_cover_range_and_stay_in_bounds() {
        let mut rng = ChaChaSource::seeded(42);
        let len = 5;
        let mut seen = vec![0usize; len];
        for _ in 0..10_000 {
            let idx = pick_index(&mut rng, len).unwrap();
            assert!(idx < len);
            seen[idx] += 1;
        }
        assert!(seen.iter().all(|&count| count > 0), "{seen:?}");
    }

    #[test]
    fn index_range_is_min_inclusive_max_exclusive() {
        let mut rng = ChaChaSource::seeded(1);
        for _ in 0..100 {
            assert_eq!(rng.index_in(3, 4), 3);
        }
    }

    #[test]
    fn empty_list_picks_nothing() {
        let mut rng = ChaChaSource::seeded(1);
        assert_eq!(pick_index(&mut rng, 0), None);
    }

    #[test]
    fn tick_applies_entry_at_chosen_index() {
        let (_root, repo) = repo_with(&["a.jpg", "b.jpg", "c.jpg"]);
        let expected = repo.wallpaper_path("b.jpg");
        let mut sched = RotationScheduler::new(repo, RecordingApplier::default(), FixedSource(1));

        match sched.tick() {
            TickOutcome::Applied(path) => assert_eq!(path, expected),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(sched.applier().applied, vec![expected]);
    }

    #[test]
    fn empty_folder_never_invokes_applier() {
        let (_root, repo) = repo_with(&[]);
        let mut sched = scheduler(repo);
        assert!(matches!(sched.tick(), TickOutcome::SkippedEmpty));
        assert!(sched.applier().applied.is_empty());
    }

    #[test]
    fn missing_folder_skips_tick_and_keeps_timer() {
        let root = TempDir::new().unwrap();
        let repo = PictureRepository::new(root.path(), "nowhere");
        let mut sched = scheduler(repo);
        let t0 = Instant::now();
        sched.configure(5, t0).unwrap();

        let outcome = sched.poll(t0 + Duration::from_secs(5)).unwrap();
        assert!(matches!(
            outcome,
            TickOutcome::ListingFailed(Error::DirectoryUnavailable { .. })
        ));
        assert!(sched.is_active());
        assert!(sched.applier().applied.is_empty());
    }

    #[test]
    fn failed_apply_does_not_stop_rotation() {
        let (_root, repo) = repo_with(&["a.jpg"]);
        let applier = RecordingApplier {
            fail: true,
            ..RecordingApplier::default()
        };
        let mut sched = RotationScheduler::new(repo, applier, ChaChaSource::seeded(3));
        let t0 = Instant::now();
        sched.configure(2, t0).unwrap();

        assert!(matches!(
            sched.poll(t0 + Duration::from_secs(2)),
            Some(TickOutcome::ApplyFailed(_))
        ));
        assert!(matches!(
            sched.poll(t0 + Duration::from_secs(4)),
            Some(TickOutcome::ApplyFailed(_))
        ));
        assert_eq!(sched.applier().applied.len(), 2);
    }

    #[test]
    fn idle_scheduler_never_ticks() {
        let (_root, repo) = repo_with(&["a.jpg"]);
        let mut sched = scheduler(repo);
        assert!(sched.poll(Instant::now() + Duration::from_secs(3600)).is_none());
        assert_eq!(sched.time_until_next_tick(Instant::now()), None);
    }

    #[test]
    fn reconfigure_replaces_pending_timer() {
        let (_root, repo) = repo_with(&["a.jpg"]);
        let mut sched = scheduler(repo);
        let t0 = Instant::now();
        sched.configure(5, t0).unwrap();
        let second = t0 + Duration::from_secs(3);
        sched.configure(10, second).unwrap();

        assert!(sched.poll(t0 + Duration::from_secs(5)).is_none());
        assert!(sched.poll(second + Duration::from_secs(9)).is_none());
        assert!(sched.poll(second + Duration::from_secs(10)).is_some());
        assert!(sched.poll(second + Duration::from_secs(15)).is_none());
        assert!(sched.poll(second + Duration::from_secs(20)).is_some());
        assert_eq!(sched.applier().applied.len(), 2);
        assert_eq!(sched.config().unwrap().interval_secs(), 10);
    }

    #[test]
    fn invalid_interval_leaves_timer_untouched() {
        let (_root, repo) = repo_with(&["a.jpg"]);
        let mut sched = scheduler(repo);
        let t0 = Instant::now();
        sched.configure(5, t0).unwrap();

        for bad in [0, -1, -30] {
            let err = sched.configure(bad, t0 + Duration::from_secs(1)).unwrap_err();
            assert!(matches!(err, Error::InvalidInterval(v) if v == bad));
        }
        assert_eq!(sched.config().unwrap().interval_secs(), 5);
        assert_eq!(sched.time_until_next_tick(t0), Some(Duration::from_secs(5)));
        assert!(sched.poll(t0 + Duration::from_secs(5)).is_some());
    }

    #[test]
    fn oversized_interval_is_rejected_without_panicking() {
        let (_root, repo) = repo_with(&["a.jpg"]);
        let mut sched = scheduler(repo);
        let t0 = Instant::now();
        sched.configure(5, t0).unwrap();

        let too_long = MAX_INTERVAL_SECS as i64 + 1;
        for huge in [i64::MAX, too_long] {
            let err = sched.configure(huge, t0).unwrap_err();
            assert!(matches!(err, Error::InvalidInterval(v) if v == huge));
        }
        assert_eq!(sched.config().unwrap().interval_secs(), 5);
        assert_eq!(sched.time_until_next_tick(t0), Some(Duration::from_secs(5)));
    }

    #[test]
    fn longest_interval_is_accepted() {
        let (_root, repo) = repo_with(&["a.jpg"]);
        let mut sched = scheduler(repo);
        let t0 = Instant::now();
        sched.configure(MAX_INTERVAL_SECS as i64, t0).unwrap();
        assert_eq!(
            sched.time_until_next_tick(t0),
            Some(Duration::from_secs(MAX_INTERVAL_SECS))
        );
    }

    #[test]
    fn invalid_interval_on_idle_scheduler_stays_idle() {
        let (_root, repo) = repo_with(&["a.jpg"]);
        let mut sched = scheduler(repo);
        assert!(sched.configure(0, Instant::now()).is_err());
        assert!(!sched.is_active());
    }

    #[test]
    fn late_poll_fires_once_and_reschedules_from_now() {
        let (_root, repo) = repo_with(&["a.jpg"]);
        let mut sched = scheduler(repo);
        let t0 = Instant::now();
        sched.configure(5, t0).unwrap();

        let late = t0 + Duration::from_secs(23);
        assert!(sched.poll(late).is_some());
        assert!(sched.poll(late).is_none());
        assert_eq!(sched.time_until_next_tick(late), Some(Duration::from_secs(5)));
    }

    #[test]
    fn stop_returns_to_idle() {
        let (_root, repo) = repo_with(&["a.jpg"]);
        let mut sched = scheduler(repo);
        let t0 = Instant::now();
        sched.configure(1, t0).unwrap();
        sched.stop();
        assert!(!sched.is_active());
        assert!(sched.poll(t0 + Duration::from_secs(2)).is_none());
    }

    #[test]
    fn apply_entry_targets_named_file() {
        let (_root, repo) = repo_with(&["a.jpg", "b.jpg"]);
        let expected = repo.wallpaper_path("a.jpg");
        let mut sched = scheduler(repo);
        assert_eq!(sched.apply_entry("a.jpg").unwrap(), expected);
        assert_eq!(sched.applier().applied, vec![expected]);
    }
}
