//! Per-record enrichment behavior.

use crate::common::{ip_record, record, DemoDatabase, StaticEngine};
use pf_enrichment::{EnrichOutcome, MmdbFilter};
use pf_mmdb_testkit::{DatabaseBuilder, MmdbValue};
use pf_traits::{CountingMatchListener, Filter};
use pf_types::{LookupValue, MmdbFilterConfig, Record, DEFAULT_FAILURE_TAG};
use serde_json::json;
use std::sync::Arc;

fn network(record: &Record) -> Option<&serde_json::Value> {
    record.get_field("network").unwrap()
}

#[test]
fn test_export_all_dmz() {
    let db = DemoDatabase::new();
    let filter = db.filter(&db.config());
    let listener = CountingMatchListener::new();

    let records = filter.filter(vec![ip_record("172.16.0.1")], &listener);

    assert_eq!(
        network(&records[0]),
        Some(&json!({"subnet": "172.16.0.0/12", "name": "DMZ", "vlan_id": 234}))
    );
    assert!(records[0].tags().is_empty());
    assert_eq!(listener.match_count(), 1);
}

#[test]
fn test_unicode_result() {
    let db = DemoDatabase::new();
    let filter = db.filter(&db.config());

    let mut rec = ip_record("10.64.1.255");
    assert_eq!(filter.process(&mut rec), EnrichOutcome::Matched);
    assert_eq!(
        network(&rec),
        Some(&json!({
            "subnet": "10.64.0.0/23",
            "name": "Unicode NFKC Test (\u{FB03})",
            "vlan_id": 234
        }))
    );
}

#[test]
fn test_miss_is_tagged() {
    let db = DemoDatabase::new();
    let filter = db.filter(&db.config());
    let listener = CountingMatchListener::new();

    let records = filter.filter(vec![ip_record("8.8.8.8")], &listener);

    assert_eq!(records[0].tags(), [DEFAULT_FAILURE_TAG]);
    assert_eq!(network(&records[0]), None);
    assert_eq!(listener.match_count(), 0);
    assert_eq!(filter.stats().lookup_misses(), 1);
}

#[test]
fn test_renamed_fields() {
    let db = DemoDatabase::new();
    let filter = db.filter(&db.config().with_fields(["name:new_name", "vlan_id:new_vlan_id"]));

    let mut rec = ip_record("172.16.0.1");
    assert_eq!(filter.process(&mut rec), EnrichOutcome::Matched);
    assert_eq!(
        network(&rec),
        Some(&json!({"new_name": "DMZ", "new_vlan_id": 234}))
    );
}

#[test]
fn test_empty_fields_creates_container() {
    let db = DemoDatabase::new();
    let filter = db.filter(&db.config().with_fields(Vec::<String>::new()));

    let mut rec = ip_record("172.16.0.1");
    assert_eq!(filter.process(&mut rec), EnrichOutcome::Matched);
    assert_eq!(network(&rec), Some(&json!({})));
}

#[test]
fn test_nested_fields() {
    let db = DemoDatabase::new();
    let filter = db.filter(&db.config().with_fields([
        "country.iso_code",
        "country.names.zh_CN:country",
        "subdivisions.names.zh_CN:subdivision",
        "city.names.zh_CN:city",
        "location",
    ]));

    let mut rec = ip_record("192.168.1.20");
    assert_eq!(filter.process(&mut rec), EnrichOutcome::Matched);
    assert_eq!(
        network(&rec),
        Some(&json!({
            "iso_code": "CN",
            "country": "中国",
            "subdivision": "北京市",
            "city": "北京",
            "location": {"latitude": 39.9042, "longitude": 116.4074}
        }))
    );
}

#[test]
fn test_lists_and_booleans_pass_through() {
    let db = DemoDatabase::new();
    let filter = db.filter(&db.config().with_fields(["ports", "active"]));

    let mut rec = ip_record("192.168.1.20");
    filter.process(&mut rec);
    assert_eq!(network(&rec), Some(&json!({"ports": [22, 443], "active": true})));
}

#[test]
fn test_nested_target_merges_into_existing_object() {
    let db = DemoDatabase::new();
    let config = db.config().with_target("[enrichment][net]");
    let filter = db.filter(&config.with_fields(["name"]));

    let mut rec = record(json!({"ip": "172.16.0.1", "enrichment": {"other": 1}}));
    filter.process(&mut rec);
    assert_eq!(
        rec.get_field("enrichment").unwrap(),
        Some(&json!({"other": 1, "net": {"name": "DMZ"}}))
    );
}

#[test]
fn test_cache_does_not_change_results() {
    let db = DemoDatabase::new();
    let uncached = db.filter(&db.config());
    let cached = db.filter(&db.config().with_cache_size(4));

    for _ in 0..3 {
        for i in 1..=5 {
            let addr = format!("10.10.1.{i}");
            let mut a = ip_record(&addr);
            let mut b = ip_record(&addr);
            assert_eq!(uncached.process(&mut a), EnrichOutcome::Matched);
            assert_eq!(cached.process(&mut b), EnrichOutcome::Matched);
            assert_eq!(a, b);
            assert!(b.tags().is_empty());
        }
    }
}

#[test]
fn test_missing_source_field() {
    let db = DemoDatabase::new();
    let filter = db.filter(&db.config());

    let mut rec = record(json!({"message": "no address here"}));
    assert_eq!(filter.process(&mut rec), EnrichOutcome::MissingSource);
    assert!(rec.has_tag(DEFAULT_FAILURE_TAG));

    let mut rec = record(json!({"ip": 17216001}));
    assert_eq!(filter.process(&mut rec), EnrichOutcome::MissingSource);
    assert!(rec.has_tag(DEFAULT_FAILURE_TAG));
}

#[test]
fn test_invalid_address() {
    let db = DemoDatabase::new();
    let filter = db.filter(&db.config());

    for bad in ["not-an-ip", "", "172.16.0", "172.16.0.1.5"] {
        let mut rec = ip_record(bad);
        assert_eq!(filter.process(&mut rec), EnrichOutcome::InvalidAddress, "{bad:?}");
        assert!(rec.has_tag(DEFAULT_FAILURE_TAG));
        assert_eq!(network(&rec), None);
    }
    assert_eq!(filter.stats().invalid_addresses(), 4);
}

#[test]
fn test_address_whitespace_trimmed() {
    let db = DemoDatabase::new();
    let filter = db.filter(&db.config());

    let mut rec = ip_record("  172.16.0.1\n");
    assert_eq!(filter.process(&mut rec), EnrichOutcome::Matched);
}

#[test]
fn test_ipv6_in_ipv4_database_is_tagged() {
    let db = DemoDatabase::new();
    let filter = db.filter(&db.config());

    let mut rec = ip_record("2001:db8::1");
    assert_eq!(filter.process(&mut rec), EnrichOutcome::LookupFailed);
    assert_eq!(rec.tags(), [DEFAULT_FAILURE_TAG]);
}

#[test]
fn test_nan_is_unsupported_but_other_fields_written() {
    let db = DemoDatabase::new();
    let filter = db.filter(&db.config());
    let listener = CountingMatchListener::new();

    let records = filter.filter(vec![ip_record("198.51.100.9")], &listener);
    let rec = &records[0];

    assert!(rec.has_tag(DEFAULT_FAILURE_TAG));
    assert_eq!(
        network(rec),
        Some(&json!({"subnet": "198.51.100.0/24", "name": "Broken", "vlan_id": 7}))
    );
    assert_eq!(listener.match_count(), 0);
    assert_eq!(filter.stats().field_errors(), 1);
}

#[test]
fn test_target_not_an_object() {
    let db = DemoDatabase::new();
    let filter = db.filter(&db.config());

    let mut rec = record(json!({"ip": "172.16.0.1", "network": "occupied"}));
    assert_eq!(filter.process(&mut rec), EnrichOutcome::PartiallyMatched);
    assert!(rec.has_tag(DEFAULT_FAILURE_TAG));
    assert_eq!(network(&rec), Some(&json!("occupied")));
    // subnet, name and vlan_id each fail to land under the string
    assert_eq!(filter.stats().field_errors(), 3);
}

#[test]
fn test_custom_failure_tag() {
    let db = DemoDatabase::new();
    let filter = db.filter(&db.config().with_tag_on_failure("_network_miss"));

    let mut rec = record(json!({"ip": "8.8.8.8", "tags": ["existing"]}));
    filter.process(&mut rec);
    assert_eq!(rec.tags(), ["existing", "_network_miss"]);

    // Tagging twice does not duplicate
    filter.process(&mut rec);
    assert_eq!(rec.tags(), ["existing", "_network_miss"]);
}

#[test]
fn test_batch_keeps_every_record_in_order() {
    let db = DemoDatabase::new();
    let filter = db.filter(&db.config().with_fields(["name"]));
    let listener = CountingMatchListener::new();

    let input: Vec<Record> = ["172.16.0.1", "8.8.8.8", "bogus", "10.10.1.3"]
        .into_iter()
        .map(ip_record)
        .chain(std::iter::once(record(json!({"no_ip": true}))))
        .collect();

    let output = filter.filter(input, &listener);

    assert_eq!(output.len(), 5);
    assert_eq!(output[0].get_field("[network][name]").unwrap(), Some(&json!("DMZ")));
    assert!(output[1].has_tag(DEFAULT_FAILURE_TAG));
    assert!(output[2].has_tag(DEFAULT_FAILURE_TAG));
    assert_eq!(output[3].get_field("[network][name]").unwrap(), Some(&json!("Lab")));
    assert!(output[4].has_tag(DEFAULT_FAILURE_TAG));
    assert_eq!(listener.match_count(), 2);

    let stats = filter.stats().snapshot();
    assert_eq!(stats.records_processed, 5);
    assert_eq!(stats.records_matched, 2);
    assert_eq!(stats.records_failed, 3);
    assert_eq!(stats.lookup_misses, 1);
    assert_eq!(stats.invalid_addresses, 1);
    assert_eq!(stats.missing_source, 1);
}

#[test]
fn test_concurrent_processing() {
    let db = DemoDatabase::new();
    let filter = Arc::new(db.filter(&db.config().with_cache_size(8)));

    std::thread::scope(|scope| {
        for t in 0..4 {
            let filter = Arc::clone(&filter);
            scope.spawn(move || {
                for i in 0..250 {
                    let addr = if (t + i) % 2 == 0 { "172.16.0.1" } else { "10.10.1.2" };
                    let mut rec = ip_record(addr);
                    assert_eq!(filter.process(&mut rec), EnrichOutcome::Matched);
                }
            });
        }
    });

    assert_eq!(filter.stats().records_matched(), 1000);
}

#[test]
fn test_lookup_error_and_miss_share_tag() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("static.db");
    std::fs::write(&path, b"").unwrap();

    let engine = StaticEngine::new().with_failure("10.0.0.1", "disk on fire");
    let config = MmdbFilterConfig::new()
        .with_source("ip")
        .with_target("network")
        .with_database(&path);
    let filter = MmdbFilter::with_engine("static", &config, engine).unwrap();

    let mut failed = ip_record("10.0.0.1");
    let mut missed = ip_record("10.0.0.2");
    assert_eq!(filter.process(&mut failed), EnrichOutcome::LookupFailed);
    assert_eq!(filter.process(&mut missed), EnrichOutcome::NotFound);
    assert_eq!(failed.tags(), missed.tags());
    assert_eq!(filter.stats().lookup_errors(), 1);
    assert_eq!(filter.stats().lookup_misses(), 1);
}

#[test]
fn test_integer_out_of_range_is_unsupported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("static.db");
    std::fs::write(&path, b"").unwrap();

    let value: LookupValue = [
        ("name", LookupValue::from("Big")),
        ("serial", LookupValue::Integer(u64::MAX as i128 + 1)),
        ("small", LookupValue::Integer(-7)),
    ]
    .into_iter()
    .collect();
    let engine = StaticEngine::new().with_value("2001:db8::1", value);
    let config = MmdbFilterConfig::new()
        .with_source("ip")
        .with_target("network")
        .with_database(&path);
    let filter = MmdbFilter::with_engine("static", &config, engine).unwrap();

    let mut rec = ip_record("2001:db8::1");
    assert_eq!(filter.process(&mut rec), EnrichOutcome::PartiallyMatched);
    assert!(rec.has_tag(DEFAULT_FAILURE_TAG));
    assert_eq!(network(&rec), Some(&json!({"name": "Big", "small": -7})));
}

/// Database whose DMZ entry also holds values the record cannot carry.
fn unrepresentable_database(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("wide.mmdb");
    DatabaseBuilder::new("wide-values")
        .insert(
            "172.16.0.0/12",
            MmdbValue::map([
                ("name", MmdbValue::from("DMZ")),
                ("vlan_id", MmdbValue::Uint32(234)),
                ("serial", MmdbValue::Uint128(u128::MAX)),
                ("raw", MmdbValue::Bytes(vec![0xde, 0xad, 0xbe, 0xef])),
            ]),
        )
        .write_to(&path)
        .unwrap();
    path
}

#[test]
fn test_unselected_wide_values_do_not_fail_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let config = MmdbFilterConfig::new()
        .with_source("ip")
        .with_target("network")
        .with_database(unrepresentable_database(&dir))
        .with_fields(["name"]);
    let filter = MmdbFilter::new("wide", &config).unwrap();

    let mut rec = ip_record("172.16.0.1");
    assert_eq!(filter.process(&mut rec), EnrichOutcome::Matched);
    assert!(rec.tags().is_empty());
    assert_eq!(network(&rec), Some(&json!({"name": "DMZ"})));
    assert_eq!(filter.stats().field_errors(), 0);
}

#[test]
fn test_selected_wide_values_tag_but_keep_other_fields() {
    let dir = tempfile::tempdir().unwrap();
    let config = MmdbFilterConfig::new()
        .with_source("ip")
        .with_target("network")
        .with_database(unrepresentable_database(&dir))
        .with_fields(["name", "serial", "raw", "vlan_id:vlan"]);
    let filter = MmdbFilter::new("wide", &config).unwrap();

    let mut rec = ip_record("172.16.0.1");
    assert_eq!(filter.process(&mut rec), EnrichOutcome::PartiallyMatched);
    assert_eq!(rec.tags(), [DEFAULT_FAILURE_TAG]);
    assert_eq!(network(&rec), Some(&json!({"name": "DMZ", "vlan": 234})));
    assert_eq!(filter.stats().field_errors(), 2);
    assert_eq!(filter.stats().lookup_errors(), 0);
}

#[test]
fn test_export_all_skips_wide_values() {
    let dir = tempfile::tempdir().unwrap();
    let config = MmdbFilterConfig::new()
        .with_source("ip")
        .with_target("network")
        .with_database(unrepresentable_database(&dir))
        .with_cache_size(16);
    let filter = MmdbFilter::new("wide", &config).unwrap();

    for _ in 0..2 {
        let mut rec = ip_record("172.16.0.1");
        assert_eq!(filter.process(&mut rec), EnrichOutcome::PartiallyMatched);
        assert_eq!(network(&rec), Some(&json!({"name": "DMZ", "vlan_id": 234})));
    }
    assert_eq!(filter.stats().field_errors(), 4);
}

#[test]
fn test_filter_name_is_id() {
    let db = DemoDatabase::new();
    let filter = MmdbFilter::new("mmdb_geo", &db.config()).unwrap();
    assert_eq!(filter.name(), "mmdb_geo");
    assert_eq!(filter.id(), "mmdb_geo");
}

#[test]
fn test_dotted_result_key_is_one_segment() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dotted.mmdb");
    DatabaseBuilder::new("dotted")
        .insert("10.0.0.0/8", json!({"net.mask": "255.0.0.0"}))
        .write_to(&path)
        .unwrap();

    let config = MmdbFilterConfig::new()
        .with_source("ip")
        .with_target("network")
        .with_database(&path);
    let filter = MmdbFilter::new("dotted", &config).unwrap();

    let mut rec = ip_record("10.1.2.3");
    assert_eq!(filter.process(&mut rec), EnrichOutcome::Matched);
    assert_eq!(network(&rec), Some(&json!({"net.mask": "255.0.0.0"})));
}
