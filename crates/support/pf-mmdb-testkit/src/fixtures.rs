//! The demo network database shared by the workspace tests.

use crate::{DatabaseBuilder, MmdbValue};
use serde_json::json;

/// `database_type` of [`demo_database`].
pub const DEMO_DATABASE_TYPE: &str = "demo-network";

/// Default `build_epoch` of [`demo_database`].
pub const DEMO_BUILD_EPOCH: u64 = 1_700_000_000;

/// Network database with a handful of internal subnets.
///
/// | network | contents |
/// |---|---|
/// | 172.16.0.0/12 | `name` "DMZ", `vlan_id` 234 |
/// | 10.64.0.0/23 | `name` with a compatibility ligature, `vlan_id` 234 |
/// | 10.10.1.0/24 | `name` "Lab", `vlan_id` 101 |
/// | 192.168.1.0/24 | nested `country`/`subdivisions`/`city`/`location`, a list, a boolean |
/// | 198.51.100.0/24 | `name` "Broken", `score` NaN |
///
/// Every entry carries its own `subnet`.
pub fn demo_database() -> DatabaseBuilder {
    DatabaseBuilder::new(DEMO_DATABASE_TYPE)
        .build_epoch(DEMO_BUILD_EPOCH)
        .description("Demo internal network database")
        .insert(
            "172.16.0.0/12",
            json!({"subnet": "172.16.0.0/12", "name": "DMZ", "vlan_id": 234}),
        )
        .insert(
            "10.64.0.0/23",
            json!({"subnet": "10.64.0.0/23", "name": "Unicode NFKC Test (\u{FB03})", "vlan_id": 234}),
        )
        .insert(
            "10.10.1.0/24",
            json!({"subnet": "10.10.1.0/24", "name": "Lab", "vlan_id": 101}),
        )
        .insert(
            "192.168.1.0/24",
            json!({
                "subnet": "192.168.1.0/24",
                "name": "Office",
                "vlan_id": 100,
                "active": true,
                "ports": [22, 443],
                "country": {
                    "iso_code": "CN",
                    "names": {"en": "China", "zh_CN": "中国"}
                },
                "subdivisions": {
                    "iso_code": "BJ",
                    "names": {"en": "Beijing", "zh_CN": "北京市"}
                },
                "city": {
                    "names": {"en": "Beijing", "zh_CN": "北京"}
                },
                "location": {"latitude": 39.9042, "longitude": 116.4074}
            }),
        )
        .insert(
            "198.51.100.0/24",
            MmdbValue::map([
                ("subnet", MmdbValue::from("198.51.100.0/24")),
                ("name", MmdbValue::from("Broken")),
                ("vlan_id", MmdbValue::Uint32(7)),
                ("score", MmdbValue::Double(f64::NAN)),
            ]),
        )
}
