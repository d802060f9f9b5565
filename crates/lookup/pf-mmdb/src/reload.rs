//! Hot-reloadable database handle.

use crate::client::MmdbEngine;
use crate::snapshot::DatabaseSnapshot;
use crate::watcher::{WatcherState, WatcherThread};
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use pf_error::{classify_error, PfError, ProcessingStage};
use pf_traits::LookupEngine;
use pf_types::{CachePolicy, DatabaseMetadata};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// State shared between a handle and its watcher thread.
struct Shared<E: LookupEngine> {
    engine: E,
    path: PathBuf,
    cache_policy: CachePolicy,

    /// Current snapshot. Only the watcher thread stores into it.
    current: ArcSwap<DatabaseSnapshot<E::Client>>,

    generation: AtomicU64,
    reloads: AtomicU64,
    failed_reloads: AtomicU64,
    last_reload: Mutex<Option<DateTime<Utc>>>,
}

impl<E: LookupEngine> Shared<E> {
    fn reload(&self) {
        debug!(path = %self.path.display(), "Reloading database");

        let client = match self.engine.open(&self.path, self.cache_policy) {
            Ok(client) => client,
            Err(e) => {
                let err = PfError::from(e);
                self.failed_reloads.fetch_add(1, Ordering::Relaxed);
                error!(
                    error = %err,
                    category = ?classify_error(&err, ProcessingStage::Reload),
                    generation = self.generation.load(Ordering::Acquire),
                    "Database reload failed, keeping previous snapshot"
                );
                return;
            }
        };

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let snapshot = Arc::new(DatabaseSnapshot::new(client, &self.path, generation));
        let metadata = snapshot.metadata().clone();

        *self.last_reload.lock() = Some(snapshot.loaded_at());
        self.reloads.fetch_add(1, Ordering::Relaxed);
        let previous = self.current.swap(snapshot);

        info!(
            path = %self.path.display(),
            generation,
            database = %metadata,
            "Database reloaded"
        );
        debug!(
            generation = previous.generation(),
            in_flight = Arc::strong_count(&previous) - 1,
            "Released previous snapshot"
        );
    }
}

/// A database that follows its file on disk.
///
/// [`current`](Self::current) is a single atomic load and never waits for a
/// reload. A background thread watches the file and, after each debounced
/// change, opens it again and publishes the result as a new snapshot. A
/// reload that fails to open leaves the previous snapshot in force.
///
/// The watcher is stopped by [`shutdown`](Self::shutdown) or on drop.
pub struct HotReloadHandle<E: LookupEngine = MmdbEngine> {
    shared: Arc<Shared<E>>,
    watcher: Mutex<Option<WatcherThread>>,
}

impl<E: LookupEngine> HotReloadHandle<E> {
    /// Open `path` and start watching it.
    ///
    /// # Errors
    ///
    /// [`PfError::Open`] when the initial open fails or the file's directory
    /// cannot be watched.
    pub fn open(engine: E, path: impl Into<PathBuf>, cache_policy: CachePolicy) -> Result<Self, PfError> {
        let path = path.into();
        let client = engine.open(&path, cache_policy)?;
        let snapshot = DatabaseSnapshot::new(client, &path, 1);

        info!(
            engine = engine.name(),
            path = %path.display(),
            database = %snapshot.metadata(),
            cache_capacity = ?cache_policy.capacity(),
            "Opened database"
        );

        let shared = Arc::new(Shared {
            engine,
            path,
            cache_policy,
            current: ArcSwap::from_pointee(snapshot),
            generation: AtomicU64::new(1),
            reloads: AtomicU64::new(0),
            failed_reloads: AtomicU64::new(0),
            last_reload: Mutex::new(None),
        });

        let thread_shared = Arc::clone(&shared);
        let watcher = WatcherThread::spawn(&shared.path, move || thread_shared.reload())?;

        Ok(Self {
            shared,
            watcher: Mutex::new(Some(watcher)),
        })
    }

    /// The current snapshot.
    pub fn current(&self) -> Arc<DatabaseSnapshot<E::Client>> {
        self.shared.current.load_full()
    }

    /// Metadata of the current snapshot.
    pub fn metadata(&self) -> DatabaseMetadata {
        self.shared.current.load().metadata().clone()
    }

    /// Generation of the most recently published snapshot.
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::Acquire)
    }

    /// Time of the last successful reload, `None` if none happened yet.
    pub fn last_reload(&self) -> Option<DateTime<Utc>> {
        *self.shared.last_reload.lock()
    }

    /// Number of successful reloads.
    pub fn reload_count(&self) -> u64 {
        self.shared.reloads.load(Ordering::Relaxed)
    }

    /// Number of reloads that failed to open the file.
    pub fn failed_reload_count(&self) -> u64 {
        self.shared.failed_reloads.load(Ordering::Relaxed)
    }

    /// Watcher lifecycle state.
    pub fn state(&self) -> WatcherState {
        if self.watcher.lock().is_some() {
            WatcherState::Watching
        } else {
            WatcherState::Stopped
        }
    }

    /// Database path.
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Cache policy applied to every snapshot.
    pub fn cache_policy(&self) -> CachePolicy {
        self.shared.cache_policy
    }

    /// Stop the watcher. Idempotent.
    ///
    /// The current snapshot stays usable; it is closed once the handle and
    /// every outstanding reference have been dropped.
    pub fn shutdown(&self) {
        let Some(watcher) = self.watcher.lock().take() else {
            return;
        };
        watcher.stop();
        info!(
            path = %self.shared.path.display(),
            reloads = self.reload_count(),
            failed_reloads = self.failed_reload_count(),
            "Stopped database watcher"
        );
    }
}

impl<E: LookupEngine> Drop for HotReloadHandle<E> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<E: LookupEngine> std::fmt::Debug for HotReloadHandle<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HotReloadHandle")
            .field("path", &self.shared.path)
            .field("generation", &self.generation())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
