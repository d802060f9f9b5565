//! Records and field references.

use pf_error::FieldError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Name of the field holding record tags.
pub const TAGS_FIELD: &str = "tags";

/// A path into a [`Record`].
///
/// Two spellings are accepted:
/// - `name` - a single top-level field (dots are part of the name)
/// - `[a][b][c]` - nested fields, one segment per bracket pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldReference {
    segments: Vec<String>,
}

impl FieldReference {
    /// Parses a field reference.
    pub fn parse(reference: &str) -> Result<Self, FieldError> {
        let invalid = || FieldError::InvalidReference(reference.to_string());

        if reference.is_empty() {
            return Err(invalid());
        }

        if !reference.starts_with('[') {
            if reference.contains(['[', ']']) {
                return Err(invalid());
            }
            return Ok(Self {
                segments: vec![reference.to_string()],
            });
        }

        let mut segments = Vec::new();
        let mut rest = reference;
        while !rest.is_empty() {
            let inner = rest.strip_prefix('[').ok_or_else(invalid)?;
            let end = inner.find(']').ok_or_else(invalid)?;
            let segment = &inner[..end];
            if segment.is_empty() || segment.contains('[') {
                return Err(invalid());
            }
            segments.push(segment.to_string());
            rest = &inner[end + 1..];
        }

        Ok(Self { segments })
    }

    /// Returns the path segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns a new reference with one more segment appended.
    ///
    /// The segment is taken verbatim; it is never split on dots or brackets.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }
}

impl FromStr for FieldReference {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FieldReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "[{segment}]")?;
        }
        Ok(())
    }
}

/// A single event flowing through the filter.
///
/// Backed by a JSON object. Serializes transparently, so one NDJSON line is
/// one record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a record from a JSON object.
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Returns the underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Consumes the record, returning the underlying JSON object.
    pub fn into_map(self) -> Map<String, Value> {
        self.fields
    }

    /// Gets the value at a field reference.
    pub fn get(&self, reference: &FieldReference) -> Option<&Value> {
        let (first, rest) = reference.segments.split_first()?;
        let mut current = self.fields.get(first)?;
        for segment in rest {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Parses `reference` and gets the value it points at.
    pub fn get_field(&self, reference: &str) -> Result<Option<&Value>, FieldError> {
        let reference = FieldReference::parse(reference)?;
        Ok(self.get(&reference))
    }

    /// Returns true if the field exists.
    pub fn contains(&self, reference: &FieldReference) -> bool {
        self.get(reference).is_some()
    }

    /// Sets the value at a field reference, creating intermediate objects.
    ///
    /// Fails with [`FieldError::NotAnObject`] when an intermediate segment
    /// exists but holds a non-object value; the record is left unchanged.
    pub fn set(&mut self, reference: &FieldReference, value: Value) -> Result<(), FieldError> {
        let Some((last, parents)) = reference.segments.split_last() else {
            return Err(FieldError::InvalidReference(String::new()));
        };

        let mut current = &mut self.fields;
        for (depth, segment) in parents.iter().enumerate() {
            let entry = current
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            current = match entry {
                Value::Object(map) => map,
                _ => {
                    let prefix = FieldReference {
                        segments: reference.segments[..=depth].to_vec(),
                    };
                    return Err(FieldError::NotAnObject(prefix.to_string()));
                }
            };
        }

        current.insert(last.clone(), value);
        Ok(())
    }

    /// Parses `reference` and sets the value it points at.
    pub fn set_field(&mut self, reference: &str, value: Value) -> Result<(), FieldError> {
        let reference = FieldReference::parse(reference)?;
        self.set(&reference, value)
    }

    /// Removes and returns the value at a field reference.
    pub fn remove(&mut self, reference: &FieldReference) -> Option<Value> {
        let (last, parents) = reference.segments.split_last()?;
        let mut current = &mut self.fields;
        for segment in parents {
            current = current.get_mut(segment)?.as_object_mut()?;
        }
        current.remove(last)
    }

    /// Adds a tag unless it is already present.
    ///
    /// A scalar string in `tags` is promoted to a one-element list first.
    pub fn tag(&mut self, tag: &str) {
        let tags = self
            .fields
            .entry(TAGS_FIELD)
            .or_insert_with(|| Value::Array(Vec::new()));

        if let Value::String(existing) = tags {
            *tags = Value::Array(vec![Value::String(std::mem::take(existing))]);
        }

        match tags {
            Value::Array(list) => {
                if !list.iter().any(|t| t.as_str() == Some(tag)) {
                    list.push(Value::String(tag.to_string()));
                }
            }
            other => *other = Value::Array(vec![Value::String(tag.to_string())]),
        }
    }

    /// Returns the record's tags.
    pub fn tags(&self) -> Vec<&str> {
        match self.fields.get(TAGS_FIELD) {
            Some(Value::Array(list)) => list.iter().filter_map(Value::as_str).collect(),
            Some(Value::String(tag)) => vec![tag.as_str()],
            _ => Vec::new(),
        }
    }

    /// Returns true if the record carries `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags().contains(&tag)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self::from_map(fields)
    }
}

impl TryFrom<Value> for Record {
    type Error = FieldError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(FieldError::NotAnObject(other.to_string())),
        }
    }
}
