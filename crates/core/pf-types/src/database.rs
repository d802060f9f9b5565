//! Database metadata and cache policy.

use chrono::{DateTime, Utc};
use pf_error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroUsize;

/// Metadata describing one opened database file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    /// 4 for IPv4-only databases, 6 for databases holding IPv6 (and mapped IPv4)
    pub ip_version: u16,

    /// Free-form database type, e.g. "GeoIP2-City"
    pub database_type: String,

    /// Build time in seconds since the Unix epoch
    pub build_epoch: u64,

    /// Number of nodes in the search tree
    pub node_count: u32,

    /// Search tree record size in bits
    pub record_size: u16,

    /// Binary format major version
    pub binary_format_major_version: u16,

    /// Binary format minor version
    pub binary_format_minor_version: u16,

    /// Locale codes the database carries names for
    #[serde(default)]
    pub languages: Vec<String>,

    /// Descriptions keyed by language
    #[serde(default)]
    pub description: BTreeMap<String, String>,
}

impl DatabaseMetadata {
    /// Returns the build time, if the epoch is representable.
    pub fn build_time(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.build_epoch)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

impl fmt::Display for DatabaseMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (ip_version={}, build_epoch={}, nodes={}, record_size={})",
            self.database_type, self.ip_version, self.build_epoch, self.node_count, self.record_size
        )
    }
}

/// Result cache policy for a lookup client.
///
/// Caching is a performance detail: a cached client answers exactly like an
/// uncached one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Every query goes to the database.
    #[default]
    NoCache,

    /// Bounded LRU cache holding at most this many results.
    Bounded(NonZeroUsize),
}

impl CachePolicy {
    /// Builds a policy from the `cache_size` option.
    ///
    /// `0` disables caching, a positive value bounds the cache, a negative
    /// value is rejected.
    pub fn from_size(size: i64) -> Result<Self, ConfigError> {
        if size < 0 {
            return Err(ConfigError::InvalidCacheSize(size));
        }
        let size = usize::try_from(size).map_err(|_| ConfigError::InvalidCacheSize(size))?;
        Ok(NonZeroUsize::new(size).map_or(Self::NoCache, Self::Bounded))
    }

    /// Returns the cache capacity, or `None` when caching is disabled.
    pub fn capacity(&self) -> Option<usize> {
        match self {
            Self::NoCache => None,
            Self::Bounded(capacity) => Some(capacity.get()),
        }
    }
}
