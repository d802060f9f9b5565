//! Search tree and file layout.

use crate::encode::MmdbValue;
use std::io;
use std::net::Ipv4Addr;
use std::path::Path;

const RECORD_SIZE: u16 = 24;
const MAX_RECORD: usize = (1 << 24) - 1;
const DATA_SECTION_SEPARATOR: [u8; 16] = [0; 16];
const METADATA_MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";

#[derive(Debug, Clone, Copy)]
enum Slot {
    Empty,
    Node(usize),
    Data(usize),
}

/// Builds an IPv4 MMDB file from `(network, value)` entries.
#[derive(Debug, Clone)]
pub struct DatabaseBuilder {
    database_type: String,
    build_epoch: u64,
    description: String,
    networks: Vec<(Ipv4Addr, u8, MmdbValue)>,
}

impl DatabaseBuilder {
    /// Creates an empty database of the given type.
    pub fn new(database_type: impl Into<String>) -> Self {
        Self {
            database_type: database_type.into(),
            build_epoch: 1_700_000_000,
            description: "paraflow test fixture".to_string(),
            networks: Vec::new(),
        }
    }

    /// Sets the build epoch written into the metadata.
    pub fn build_epoch(mut self, epoch: u64) -> Self {
        self.build_epoch = epoch;
        self
    }

    /// Sets the English description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds a network in `a.b.c.d/len` notation. Host bits are cleared.
    ///
    /// # Panics
    ///
    /// Panics on malformed CIDR strings and zero-length prefixes.
    pub fn insert(mut self, cidr: &str, value: impl Into<MmdbValue>) -> Self {
        let (addr, len) = cidr
            .split_once('/')
            .unwrap_or_else(|| panic!("expected a.b.c.d/len, got {cidr}"));
        let addr: Ipv4Addr = addr.parse().unwrap_or_else(|_| panic!("bad address in {cidr}"));
        let len: u8 = len.parse().unwrap_or_else(|_| panic!("bad prefix in {cidr}"));
        assert!((1..=32).contains(&len), "prefix length must be 1..=32 in {cidr}");

        self.networks.push((addr, len, value.into()));
        self
    }

    /// Serializes the database.
    ///
    /// # Panics
    ///
    /// Panics when two inserted networks overlap.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut nodes: Vec<[Slot; 2]> = vec![[Slot::Empty; 2]];
        let mut data = Vec::new();
        let mut offsets = Vec::with_capacity(self.networks.len());

        for (index, (addr, len, value)) in self.networks.iter().enumerate() {
            offsets.push(data.len());
            value.encode(&mut data);
            insert_network(&mut nodes, u32::from(*addr), *len, index);
        }

        let node_count = nodes.len();
        let mut out = Vec::with_capacity(node_count * 6 + data.len() + 256);
        for node in &nodes {
            for slot in node {
                let record = match *slot {
                    Slot::Empty => node_count,
                    Slot::Node(n) => n,
                    Slot::Data(i) => node_count + DATA_SECTION_SEPARATOR.len() + offsets[i],
                };
                assert!(record <= MAX_RECORD, "fixture too large for 24-bit records");
                out.extend_from_slice(&(record as u32).to_be_bytes()[1..]);
            }
        }
        out.extend_from_slice(&DATA_SECTION_SEPARATOR);
        out.extend_from_slice(&data);
        out.extend_from_slice(METADATA_MARKER);
        self.metadata(node_count as u32).encode(&mut out);
        out
    }

    /// Writes the database to `path`, replacing any existing file.
    pub fn write_to(&self, path: impl AsRef<Path>) -> io::Result<()> {
        std::fs::write(path, self.to_bytes())
    }

    fn metadata(&self, node_count: u32) -> MmdbValue {
        MmdbValue::map([
            ("binary_format_major_version", MmdbValue::Uint16(2)),
            ("binary_format_minor_version", MmdbValue::Uint16(0)),
            ("build_epoch", MmdbValue::Uint64(self.build_epoch)),
            ("database_type", MmdbValue::String(self.database_type.clone())),
            (
                "description",
                MmdbValue::map([("en", self.description.as_str())]),
            ),
            ("ip_version", MmdbValue::Uint16(4)),
            ("languages", MmdbValue::Array(vec!["en".into()])),
            ("node_count", MmdbValue::Uint32(node_count)),
            ("record_size", MmdbValue::Uint16(RECORD_SIZE)),
        ])
    }
}

fn insert_network(nodes: &mut Vec<[Slot; 2]>, addr: u32, len: u8, index: usize) {
    let mut node = 0;
    for depth in 0..len {
        let bit = ((addr >> (31 - depth)) & 1) as usize;
        if depth + 1 == len {
            match nodes[node][bit] {
                Slot::Empty => nodes[node][bit] = Slot::Data(index),
                _ => panic!("network #{index} overlaps an earlier network"),
            }
            return;
        }
        node = match nodes[node][bit] {
            Slot::Node(next) => next,
            Slot::Empty => {
                nodes.push([Slot::Empty; 2]);
                let next = nodes.len() - 1;
                nodes[node][bit] = Slot::Node(next);
                next
            }
            Slot::Data(_) => panic!("network #{index} overlaps an earlier network"),
        };
    }
}
