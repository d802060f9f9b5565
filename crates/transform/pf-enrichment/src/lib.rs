//! MMDB enrichment for streaming records.
//!
//! This crate provides the per-record enrichment step:
//! - [`ProjectionSpec`] / [`FieldNode`] - which lookup result fields are copied, and under what name
//! - [`MmdbFilter`] - looks up a record's address and writes the projected result
//! - [`EnrichmentStats`] - per-filter counters
//!
//! # Example
//!
//! ```rust,ignore
//! use pf_enrichment::MmdbFilter;
//! use pf_traits::{Filter, NoopMatchListener};
//! use pf_types::MmdbFilterConfig;
//!
//! let config = MmdbFilterConfig::new()
//!     .with_source("src_ip")
//!     .with_target("[network]")
//!     .with_database("/var/lib/mmdb/network.mmdb")
//!     .with_fields(["name:network_name", "vlan_id"]);
//!
//! let filter = MmdbFilter::new("mmdb_1", &config)?;
//! let records = filter.filter(records, &NoopMatchListener);
//! ```

mod filter;
mod projection;
mod stats;

pub use filter::{EnrichOutcome, MmdbFilter};
pub use projection::{FieldNode, NodeKind, ProjectionSpec};
pub use stats::{EnrichmentStats, StatsSnapshot};
