//! File watcher thread.
//!
//! Watches the database's parent directory (non-recursively) so that both
//! in-place rewrites and rename-over replacements are seen, then filters the
//! events down to the database file name. A reload is triggered once the file
//! has been quiet for [`DEBOUNCE`].

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use pf_error::OpenError;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Quiet period after the last relevant event before reloading.
pub const DEBOUNCE: Duration = Duration::from_millis(200);

/// Receive timeout of the watcher loop.
pub const TICK: Duration = Duration::from_millis(50);

/// Lifecycle of a handle's watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// The watcher thread is running.
    Watching,
    /// The watcher has been shut down. Terminal.
    Stopped,
}

impl std::fmt::Display for WatcherState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Watching => write!(f, "watching"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Watcher thread handle and shutdown channel.
pub(crate) struct WatcherThread {
    shutdown_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
    // Dropped after the thread has been joined
    _watcher: RecommendedWatcher,
}

impl WatcherThread {
    /// Start watching `path`, calling `on_change` after each debounced burst
    /// of changes to it.
    pub(crate) fn spawn<F>(path: &Path, on_change: F) -> Result<Self, OpenError>
    where
        F: FnMut() + Send + 'static,
    {
        let watch_error = |message: String| OpenError::Watch {
            path: path.to_path_buf(),
            message,
        };

        let file_name = path
            .file_name()
            .map(OsStr::to_os_string)
            .ok_or_else(|| watch_error("path has no file name".to_string()))?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let dir = dir
            .canonicalize()
            .map_err(|e| watch_error(format!("failed to resolve directory: {e}")))?;

        let (event_tx, event_rx) = mpsc::channel();
        let mut watcher = RecommendedWatcher::new(event_tx, Config::default())
            .map_err(|e| watch_error(format!("failed to create file watcher: {e}")))?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| watch_error(format!("failed to watch directory: {e}")))?;

        let (shutdown_tx, shutdown_rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("mmdb-watcher".to_string())
            .spawn(move || run(file_name, event_rx, shutdown_rx, on_change))
            .map_err(|e| watch_error(format!("failed to spawn watcher thread: {e}")))?;

        debug!(dir = %dir.display(), "Started database watcher");

        Ok(Self {
            shutdown_tx,
            handle: Some(handle),
            _watcher: watcher,
        })
    }

    /// Signal the thread to stop and wait for it.
    pub(crate) fn stop(mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Database watcher thread panicked");
            }
        }
    }
}

fn run<F: FnMut()>(
    file_name: OsString,
    events: Receiver<notify::Result<Event>>,
    shutdown: Receiver<()>,
    mut on_change: F,
) {
    let mut last_event: Option<Instant> = None;

    loop {
        match shutdown.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => {}
        }

        match events.recv_timeout(TICK) {
            Ok(Ok(event)) => {
                if is_relevant(&event, &file_name) {
                    trace!(kind = ?event.kind, "Database file changed");
                    last_event = Some(Instant::now());
                }
            }
            Ok(Err(e)) => warn!(error = %e, "File watcher error"),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if last_event.is_some_and(|at| at.elapsed() >= DEBOUNCE) {
            last_event = None;
            on_change();
        }
    }

    debug!("Database watcher exiting");
}

/// Create and modify events naming the database file.
fn is_relevant(event: &Event, file_name: &OsStr) -> bool {
    if event.need_rescan() {
        return false;
    }
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name))
}
