//! MMDB fixture writer for tests.
//!
//! Produces small, IPv4-only MaxMind DB files (24-bit records) that the
//! `maxminddb` reader opens like any production database. Only the subset of
//! the format needed by fixtures is written: no pointers, no deduplication of
//! data records, disjoint networks.
//!
//! # Example
//!
//! ```no_run
//! use pf_mmdb_testkit::DatabaseBuilder;
//! use serde_json::json;
//!
//! DatabaseBuilder::new("demo-network")
//!     .insert("10.0.0.0/8", json!({"name": "Internal"}))
//!     .write_to("/tmp/demo.mmdb")
//!     .unwrap();
//! ```

mod encode;
mod fixtures;
mod writer;

pub use encode::MmdbValue;
pub use fixtures::{demo_database, DEMO_BUILD_EPOCH, DEMO_DATABASE_TYPE};
pub use writer::DatabaseBuilder;
