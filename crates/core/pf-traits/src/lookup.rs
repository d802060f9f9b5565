//! Lookup engine traits.
//!
//! The binary database format is decoded by an external library. These traits
//! are the whole surface the enrichment core relies on: open a file, query an
//! address, read metadata. Closing is `Drop`.

use pf_error::{LookupError, OpenError};
use pf_types::{CachePolicy, DatabaseMetadata, LookupValue};
use std::net::IpAddr;
use std::path::Path;

/// One opened database.
///
/// # Thread Safety
///
/// Clients are shared by every thread enriching records against the same
/// snapshot, so queries take `&self`. Any cache a client keeps must be
/// internally synchronized.
pub trait LookupClient: Send + Sync {
    /// Looks up an address.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(value))` - The address is covered by an entry
    /// - `Ok(None)` - No entry covers the address
    /// - `Err(e)` - The lookup itself failed
    fn query(&self, addr: IpAddr) -> Result<Option<LookupValue>, LookupError>;

    /// Returns the metadata read when the database was opened.
    fn metadata(&self) -> &DatabaseMetadata;
}

/// Opens database files into [`LookupClient`]s.
pub trait LookupEngine: Send + Sync + 'static {
    /// Client type produced by this engine.
    type Client: LookupClient + 'static;

    /// Opens `path` with the given cache policy.
    ///
    /// Each call must build its own cache; caches are never shared between
    /// clients.
    fn open(&self, path: &Path, cache: CachePolicy) -> Result<Self::Client, OpenError>;

    /// Returns the name of this engine for logging.
    fn name(&self) -> &str {
        "lookup_engine"
    }
}
