//! Integration tests for the MMDB enrichment filter.
//!
//! Every test writes its own fixture database into a temporary directory with
//! `pf-mmdb-testkit`, so no external files are needed.

mod common;
mod config_test;
mod filter_test;
