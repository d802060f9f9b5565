//! Data section encoding.

use serde_json::Value;

const TYPE_UTF8: u8 = 2;
const TYPE_DOUBLE: u8 = 3;
const TYPE_BYTES: u8 = 4;
const TYPE_UINT16: u8 = 5;
const TYPE_UINT32: u8 = 6;
const TYPE_MAP: u8 = 7;
const TYPE_INT32: u8 = 8;
const TYPE_UINT64: u8 = 9;
const TYPE_UINT128: u8 = 10;
const TYPE_ARRAY: u8 = 11;
const TYPE_BOOLEAN: u8 = 14;
const TYPE_FLOAT: u8 = 15;

/// A value as stored in an MMDB data section.
///
/// Map entries keep insertion order.
#[derive(Debug, Clone, PartialEq)]
pub enum MmdbValue {
    String(String),
    Double(f64),
    Bytes(Vec<u8>),
    Float(f32),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Uint128(u128),
    Int32(i32),
    Boolean(bool),
    Array(Vec<MmdbValue>),
    Map(Vec<(String, MmdbValue)>),
}

impl MmdbValue {
    /// Builds a map value from key/value pairs.
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<MmdbValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Appends the encoded value to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Self::String(s) => {
                write_control(out, TYPE_UTF8, s.len());
                out.extend_from_slice(s.as_bytes());
            }
            Self::Double(d) => {
                write_control(out, TYPE_DOUBLE, 8);
                out.extend_from_slice(&d.to_be_bytes());
            }
            Self::Bytes(bytes) => {
                write_control(out, TYPE_BYTES, bytes.len());
                out.extend_from_slice(bytes);
            }
            Self::Float(f) => {
                write_control(out, TYPE_FLOAT, 4);
                out.extend_from_slice(&f.to_be_bytes());
            }
            Self::Uint16(v) => write_unsigned(out, TYPE_UINT16, &v.to_be_bytes()),
            Self::Uint32(v) => write_unsigned(out, TYPE_UINT32, &v.to_be_bytes()),
            Self::Uint64(v) => write_unsigned(out, TYPE_UINT64, &v.to_be_bytes()),
            Self::Uint128(v) => write_unsigned(out, TYPE_UINT128, &v.to_be_bytes()),
            Self::Int32(v) => {
                write_control(out, TYPE_INT32, 4);
                out.extend_from_slice(&v.to_be_bytes());
            }
            Self::Boolean(b) => write_control(out, TYPE_BOOLEAN, usize::from(*b)),
            Self::Array(items) => {
                write_control(out, TYPE_ARRAY, items.len());
                for item in items {
                    item.encode(out);
                }
            }
            Self::Map(entries) => {
                write_control(out, TYPE_MAP, entries.len());
                for (key, value) in entries {
                    Self::String(key.clone()).encode(out);
                    value.encode(out);
                }
            }
        }
    }
}

/// Writes a control byte (and extended type/size bytes) for `type_num`.
fn write_control(out: &mut Vec<u8>, type_num: u8, size: usize) {
    let (size_bits, size_bytes): (u8, Vec<u8>) = match size {
        s if s < 29 => (s as u8, Vec::new()),
        s if s < 285 => (29, vec![(s - 29) as u8]),
        s if s < 65_821 => (30, ((s - 285) as u16).to_be_bytes().to_vec()),
        s => {
            let rest = (s - 65_821) as u32;
            assert!(rest < 1 << 24, "value too large for an MMDB control byte");
            (31, rest.to_be_bytes()[1..].to_vec())
        }
    };

    if type_num <= 7 {
        out.push((type_num << 5) | size_bits);
    } else {
        out.push(size_bits);
        out.push(type_num - 7);
    }
    out.extend_from_slice(&size_bytes);
}

/// Writes an unsigned integer using the minimal number of big-endian bytes.
fn write_unsigned(out: &mut Vec<u8>, type_num: u8, be_bytes: &[u8]) {
    let first = be_bytes
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(be_bytes.len());
    let payload = &be_bytes[first..];
    write_control(out, type_num, payload.len());
    out.extend_from_slice(payload);
}

impl From<&str> for MmdbValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for MmdbValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for MmdbValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<u32> for MmdbValue {
    fn from(v: u32) -> Self {
        Self::Uint32(v)
    }
}

impl From<f64> for MmdbValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

/// JSON numbers map to the narrowest fitting MMDB integer type (`uint32`,
/// `uint64` or `int32`) or to `double`.
///
/// # Panics
///
/// Panics on `null` and on negative integers outside the `int32` range,
/// neither of which the format can hold.
impl From<Value> for MmdbValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => panic!("MMDB has no null type"),
            Value::Bool(b) => Self::Boolean(b),
            Value::String(s) => Self::String(s),
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    u32::try_from(u).map_or(Self::Uint64(u), Self::Uint32)
                } else if let Some(i) = n.as_i64() {
                    Self::Int32(i32::try_from(i).expect("negative integer outside int32 range"))
                } else {
                    Self::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => Self::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect()),
        }
    }
}
