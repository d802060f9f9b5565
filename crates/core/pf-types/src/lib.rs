//! Core types for MMDB enrichment.
//!
//! This crate provides the foundational types used throughout the system:
//! - [`Record`] - A JSON event addressed with [`FieldReference`]s
//! - [`LookupValue`] - The nested value tree returned by a database lookup
//! - [`DatabaseMetadata`] and [`CachePolicy`] - Lookup engine parameters
//! - [`MmdbFilterConfig`] - Host-supplied filter configuration

pub mod config;
pub mod database;
pub mod record;
pub mod value;

pub use config::*;
pub use database::*;
pub use record::*;
pub use value::*;
