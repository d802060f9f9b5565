//! MaxMind DB lookups with hot reload.
//!
//! - [`MmdbEngine`] / [`MmdbClient`]: the lookup engine over the `maxminddb`
//!   reader, with an optional per-client LRU result cache
//! - [`DatabaseSnapshot`]: one opened client plus load diagnostics
//! - [`HotReloadHandle`]: an atomically swappable snapshot slot kept current
//!   by a file watcher thread

mod cache;
mod client;
mod reload;
mod snapshot;
mod watcher;

pub use cache::ResultCache;
pub use client::{MmdbClient, MmdbEngine};
pub use reload::HotReloadHandle;
pub use snapshot::DatabaseSnapshot;
pub use watcher::{WatcherState, DEBOUNCE, TICK};
