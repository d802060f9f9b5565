//! Filter construction and configuration validation.

use crate::common::DemoDatabase;
use pf_enrichment::{MmdbFilter, ProjectionSpec};
use pf_error::{ConfigError, PfError};
use pf_types::{MmdbFilterConfig, DEFAULT_FAILURE_TAG};
use serde_json::json;

fn config_error(config: &MmdbFilterConfig) -> ConfigError {
    match MmdbFilter::new("mmdb_test", config) {
        Err(PfError::Config(err)) => err,
        Err(other) => panic!("expected a config error, got {other}"),
        Ok(_) => panic!("expected a config error"),
    }
}

/// A path that would fail to open, to show validation happens first.
const ABSENT_DB: &str = "/nonexistent/dir/absent.mmdb";

#[test]
fn test_missing_database() {
    let config = MmdbFilterConfig::new().with_source("ip").with_target("network");
    assert_eq!(config_error(&config), ConfigError::MissingDatabase);
}

#[test]
fn test_missing_source() {
    let config = MmdbFilterConfig::new()
        .with_target("network")
        .with_database(ABSENT_DB);
    assert_eq!(config_error(&config), ConfigError::MissingSource);
}

#[test]
fn test_missing_target() {
    let config = MmdbFilterConfig::new()
        .with_source("ip")
        .with_database(ABSENT_DB);
    assert_eq!(config_error(&config), ConfigError::MissingTarget);
}

#[test]
fn test_validation_order() {
    assert_eq!(
        config_error(&MmdbFilterConfig::new()),
        ConfigError::MissingDatabase
    );
    assert_eq!(
        config_error(&MmdbFilterConfig::new().with_database(ABSENT_DB)),
        ConfigError::MissingSource
    );
}

#[test]
fn test_negative_cache_size() {
    let config = MmdbFilterConfig::new()
        .with_source("ip")
        .with_target("network")
        .with_database(ABSENT_DB)
        .with_cache_size(-1);
    assert_eq!(config_error(&config), ConfigError::InvalidCacheSize(-1));
}

#[test]
fn test_cache_sizes_accepted() {
    let db = DemoDatabase::new();
    for size in [0, 1, 1024] {
        let filter = db.filter(&db.config().with_cache_size(size));
        assert_eq!(filter.handle().cache_policy().capacity(), (size > 0).then_some(size as usize));
    }
}

#[test]
fn test_invalid_field_spec() {
    let config = MmdbFilterConfig::new()
        .with_source("ip")
        .with_target("network")
        .with_database(ABSENT_DB)
        .with_fields(["name:new_name", "not valid!"]);
    let err = config_error(&config);
    assert_eq!(err, ConfigError::InvalidFields);
    assert_eq!(err.to_string(), "Fields config must only be a list of strings");
}

#[test]
fn test_non_string_field() {
    let config = MmdbFilterConfig::from_value(json!({
        "source": "ip",
        "target": "network",
        "database": ABSENT_DB,
        "fields": ["name", 42]
    }))
    .unwrap();
    assert_eq!(config_error(&config), ConfigError::InvalidFields);
}

#[test]
fn test_invalid_field_reference() {
    let config = MmdbFilterConfig::new()
        .with_source("[ip")
        .with_target("network")
        .with_database(ABSENT_DB);
    assert_eq!(
        config_error(&config),
        ConfigError::InvalidFieldReference("[ip".to_string())
    );
}

#[test]
fn test_missing_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = MmdbFilterConfig::new()
        .with_source("ip")
        .with_target("network")
        .with_database(dir.path().join("absent.mmdb"));

    let err = config_error(&config);
    assert!(matches!(err, ConfigError::InvalidDatabase(_)));
    assert_eq!(
        err.to_string(),
        "Database does not appear to be a valid database"
    );
}

#[test]
fn test_invalid_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.mmdb");
    std::fs::write(&path, b"this is not an mmdb file").unwrap();

    let config = MmdbFilterConfig::new()
        .with_source("ip")
        .with_target("network")
        .with_database(&path);
    assert!(matches!(config_error(&config), ConfigError::InvalidDatabase(_)));
}

#[test]
fn test_from_host_json() {
    let db = DemoDatabase::new();
    let config = MmdbFilterConfig::from_value(json!({
        "source": "[client][ip]",
        "target": "[client][network]",
        "database": db.path,
        "cache_size": 16,
        "fields": ["name", "vlan_id:vlan"]
    }))
    .unwrap();

    let filter = db.filter(&config);
    assert_eq!(filter.source().segments(), ["client", "ip"]);
    assert_eq!(filter.target().segments(), ["client", "network"]);
    assert_eq!(filter.failure_tag(), DEFAULT_FAILURE_TAG);
    assert!(!filter.projection().is_export_all());
    assert_eq!(filter.handle().cache_policy().capacity(), Some(16));
}

#[test]
fn test_export_all_without_fields() {
    let db = DemoDatabase::new();
    let filter = db.filter(&db.config());
    assert_eq!(filter.projection(), &ProjectionSpec::ExportAll);
    assert_eq!(filter.metadata().database_type, "demo-network");
    assert_eq!(filter.last_reload(), None);
}
