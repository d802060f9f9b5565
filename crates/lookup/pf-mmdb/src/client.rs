//! Lookup engine over the `maxminddb` reader.

use crate::cache::ResultCache;
use maxminddb::{MaxMindDBError, Metadata, Reader};
use pf_error::{LookupError, OpenError};
use pf_traits::{LookupClient, LookupEngine};
use pf_types::{CachePolicy, DatabaseMetadata, LookupValue};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Opens MMDB files into [`MmdbClient`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct MmdbEngine;

impl MmdbEngine {
    /// Create a new engine.
    pub fn new() -> Self {
        Self
    }
}

impl LookupEngine for MmdbEngine {
    type Client = MmdbClient;

    fn open(&self, path: &Path, cache: CachePolicy) -> Result<MmdbClient, OpenError> {
        MmdbClient::open(path, cache)
    }

    fn name(&self) -> &str {
        "maxminddb"
    }
}

/// One opened MMDB file.
///
/// The whole file is read into memory on open, so rewriting the file
/// afterwards does not affect this client.
pub struct MmdbClient {
    reader: Reader<Vec<u8>>,
    metadata: DatabaseMetadata,
    cache: Option<ResultCache>,
    path: PathBuf,
}

impl MmdbClient {
    /// Open `path` with the given cache policy.
    pub fn open(path: &Path, cache: CachePolicy) -> Result<Self, OpenError> {
        if !path.exists() {
            return Err(OpenError::NotFound(path.to_path_buf()));
        }

        let reader = Reader::open_readfile(path).map_err(|e| open_error(path, e))?;
        let metadata = convert_metadata(&reader.metadata);
        let cache = match cache {
            CachePolicy::NoCache => None,
            CachePolicy::Bounded(capacity) => Some(ResultCache::new(capacity)),
        };

        debug!(
            path = %path.display(),
            database_type = %metadata.database_type,
            build_epoch = metadata.build_epoch,
            cache_capacity = ?cache.as_ref().map(ResultCache::capacity),
            "Opened database"
        );

        Ok(Self {
            reader,
            metadata,
            cache,
            path: path.to_path_buf(),
        })
    }

    /// Path the client was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The result cache, if caching is enabled.
    pub fn cache(&self) -> Option<&ResultCache> {
        self.cache.as_ref()
    }

    fn query_database(&self, addr: IpAddr) -> Result<Option<LookupValue>, LookupError> {
        if addr.is_ipv6() && self.metadata.ip_version == 4 {
            return Err(LookupError::UnsupportedAddress(format!(
                "{addr} cannot be looked up in an IPv4-only database"
            )));
        }

        match self.reader.lookup::<LookupValue>(addr) {
            Ok(value) => Ok(Some(value)),
            Err(MaxMindDBError::AddressNotFoundError(_)) => {
                trace!(addr = %addr, "Address not found");
                Ok(None)
            }
            Err(e) => Err(lookup_error(e)),
        }
    }
}

impl LookupClient for MmdbClient {
    fn query(&self, addr: IpAddr) -> Result<Option<LookupValue>, LookupError> {
        let Some(cache) = &self.cache else {
            return self.query_database(addr);
        };

        if let Some(cached) = cache.get(&addr) {
            return Ok(cached);
        }

        // Errors are not cached; the next query retries
        let result = self.query_database(addr)?;
        cache.insert(addr, result.clone());
        Ok(result)
    }

    fn metadata(&self) -> &DatabaseMetadata {
        &self.metadata
    }
}

impl Drop for MmdbClient {
    fn drop(&mut self) {
        debug!(
            path = %self.path.display(),
            build_epoch = self.metadata.build_epoch,
            "Closed database"
        );
    }
}

impl std::fmt::Debug for MmdbClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmdbClient")
            .field("path", &self.path)
            .field("metadata", &self.metadata)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

fn convert_metadata(metadata: &Metadata) -> DatabaseMetadata {
    DatabaseMetadata {
        ip_version: metadata.ip_version,
        database_type: metadata.database_type.clone(),
        build_epoch: metadata.build_epoch,
        node_count: metadata.node_count,
        record_size: metadata.record_size,
        binary_format_major_version: metadata.binary_format_major_version,
        binary_format_minor_version: metadata.binary_format_minor_version,
        languages: metadata.languages.clone(),
        description: metadata
            .description
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    }
}

fn open_error(path: &Path, err: MaxMindDBError) -> OpenError {
    match err {
        MaxMindDBError::IoError(message) => OpenError::Io {
            path: path.to_path_buf(),
            message,
        },
        other => OpenError::InvalidDatabase {
            path: path.to_path_buf(),
            message: other.to_string(),
        },
    }
}

fn lookup_error(err: MaxMindDBError) -> LookupError {
    match err {
        MaxMindDBError::IoError(message) => LookupError::Io(message),
        MaxMindDBError::InvalidNetworkError(message) => LookupError::UnsupportedAddress(message),
        other => LookupError::Decoding(other.to_string()),
    }
}
