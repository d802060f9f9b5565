//! Trait definitions for MMDB enrichment.
//!
//! - [`LookupEngine`] / [`LookupClient`] - the boundary to the database decoder
//! - [`Filter`] / [`MatchListener`] - per-batch record processing

pub mod filter;
pub mod lookup;

pub use filter::{CountingMatchListener, Filter, MatchListener, NoopMatchListener};
pub use lookup::{LookupClient, LookupEngine};
