//! Immutable database snapshots.

use chrono::{DateTime, Utc};
use pf_error::LookupError;
use pf_traits::LookupClient;
use pf_types::{DatabaseMetadata, LookupValue};
use std::net::IpAddr;
use std::path::{Path, PathBuf};

/// One fully opened database, as published by a [`HotReloadHandle`].
///
/// Snapshots are shared through `Arc`. A lookup that loaded a snapshot keeps
/// it alive until the lookup finishes, even if a reload has published a newer
/// one in the meantime; the client is closed when the last reference drops.
///
/// [`HotReloadHandle`]: crate::HotReloadHandle
#[derive(Debug)]
pub struct DatabaseSnapshot<C> {
    client: C,
    path: PathBuf,
    generation: u64,
    loaded_at: DateTime<Utc>,
}

impl<C: LookupClient> DatabaseSnapshot<C> {
    /// Wrap an opened client.
    pub fn new(client: C, path: impl Into<PathBuf>, generation: u64) -> Self {
        Self {
            client,
            path: path.into(),
            generation,
            loaded_at: Utc::now(),
        }
    }

    /// Look up an address in this snapshot's database.
    pub fn query(&self, addr: IpAddr) -> Result<Option<LookupValue>, LookupError> {
        self.client.query(addr)
    }

    /// Metadata of this snapshot's database.
    pub fn metadata(&self) -> &DatabaseMetadata {
        self.client.metadata()
    }

    /// The underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Path the database was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 1 for the initial load, incremented by every successful reload.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// When this snapshot was opened.
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}
