//! LookupValue - the nested value tree returned by a database lookup.

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::fmt;

/// A nested value returned by the lookup engine.
///
/// Every integer kind stored in a database (signed 32-bit up to unsigned
/// 128-bit) is held as [`LookupValue::Integer`]; single and double precision
/// floats are both held as [`LookupValue::Float`]. Values the tree cannot
/// hold (raw bytes, unsigned 128-bit integers above `i128::MAX`) decode to
/// [`LookupValue::Unsupported`] so the rest of the entry stays usable.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupValue {
    String(String),
    Integer(i128),
    Float(f64),
    Boolean(bool),
    List(Vec<LookupValue>),
    Map(BTreeMap<String, LookupValue>),
    /// A stored value of the named kind that cannot be represented.
    Unsupported(&'static str),
}

impl LookupValue {
    /// Returns the map if this value is one.
    pub fn as_map(&self) -> Option<&BTreeMap<String, LookupValue>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Looks up `key` if this value is a map.
    pub fn get(&self, key: &str) -> Option<&LookupValue> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Returns the string if this value is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer if this value is one.
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Short name of the value kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Boolean(_) => "boolean",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Unsupported(kind) => kind,
        }
    }

    /// Converts to a JSON value suitable for writing into a record.
    ///
    /// Returns `None` when the value (or anything nested in it) has no JSON
    /// representation: integers outside the `i64`/`u64` range and non-finite
    /// floats, and [`LookupValue::Unsupported`] values.
    pub fn to_json(&self) -> Option<Value> {
        let value = match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Boolean(b) => Value::Bool(*b),
            Self::Integer(i) => {
                if let Ok(signed) = i64::try_from(*i) {
                    Value::Number(signed.into())
                } else {
                    Value::Number(u64::try_from(*i).ok()?.into())
                }
            }
            Self::Float(f) => Value::Number(Number::from_f64(*f)?),
            Self::Unsupported(_) => return None,
            Self::List(items) => Value::Array(
                items
                    .iter()
                    .map(LookupValue::to_json)
                    .collect::<Option<Vec<_>>>()?,
            ),
            Self::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| v.to_json().map(|v| (k.clone(), v)))
                    .collect::<Option<serde_json::Map<_, _>>>()?,
            ),
        };
        Some(value)
    }
}

impl From<&str> for LookupValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for LookupValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for LookupValue {
    fn from(i: i64) -> Self {
        Self::Integer(i as i128)
    }
}

impl From<f64> for LookupValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for LookupValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl<K: Into<String>, V: Into<LookupValue>> FromIterator<(K, V)> for LookupValue {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self::Map(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<'de> Deserialize<'de> for LookupValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(LookupValueVisitor)
    }
}

struct LookupValueVisitor;

impl<'de> Visitor<'de> for LookupValueVisitor {
    type Value = LookupValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string, number, boolean, array or map")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
        Ok(LookupValue::Boolean(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(LookupValue::Integer(v as i128))
    }

    fn visit_i128<E: de::Error>(self, v: i128) -> Result<Self::Value, E> {
        Ok(LookupValue::Integer(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(LookupValue::Integer(v as i128))
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<Self::Value, E> {
        Ok(i128::try_from(v).map_or(LookupValue::Unsupported("uint128"), LookupValue::Integer))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Ok(LookupValue::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(LookupValue::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
        Ok(LookupValue::String(v))
    }

    fn visit_bytes<E: de::Error>(self, _v: &[u8]) -> Result<Self::Value, E> {
        Ok(LookupValue::Unsupported("bytes"))
    }

    fn visit_byte_buf<E: de::Error>(self, _v: Vec<u8>) -> Result<Self::Value, E> {
        Ok(LookupValue::Unsupported("bytes"))
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(LookupValue::List(items))
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut map = BTreeMap::new();
        while let Some((key, value)) = access.next_entry::<String, LookupValue>()? {
            map.insert(key, value);
        }
        Ok(LookupValue::Map(map))
    }
}
