//! Common utilities for integration tests.

pub mod engine;

pub use engine::StaticEngine;

use pf_enrichment::MmdbFilter;
use pf_mmdb_testkit::demo_database;
use pf_types::{MmdbFilterConfig, Record};
use serde_json::Value;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// The demo database written into its own temporary directory.
pub struct DemoDatabase {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl DemoDatabase {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.mmdb");
        demo_database().write_to(&path).unwrap();
        Self { dir, path }
    }

    /// Filter config pointing at this database, reading `ip` into `network`.
    pub fn config(&self) -> MmdbFilterConfig {
        MmdbFilterConfig::new()
            .with_source("ip")
            .with_target("network")
            .with_database(&self.path)
    }

    pub fn filter(&self, config: &MmdbFilterConfig) -> MmdbFilter {
        MmdbFilter::new("mmdb_test", config).unwrap()
    }
}

/// Build a record from a JSON object literal.
pub fn record(value: Value) -> Record {
    Record::try_from(value).unwrap()
}

/// Record with `ip` set to `addr`.
pub fn ip_record(addr: &str) -> Record {
    record(serde_json::json!({ "ip": addr }))
}

/// Poll `condition` until it holds or ten seconds pass.
pub fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(25));
    }
    condition()
}
