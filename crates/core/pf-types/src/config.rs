//! Configuration for the MMDB enrichment filter.

use crate::{CachePolicy, FieldReference};
use pf_error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Tag added to records whose enrichment failed or missed.
pub const DEFAULT_FAILURE_TAG: &str = "_mmdb_lookup_failure";

/// Host-supplied configuration for an MMDB enrichment filter.
///
/// Required options are `Option`s so that a missing value is reported with
/// its own [`ConfigError`] when the filter is built, rather than as a generic
/// deserialization failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MmdbFilterConfig {
    /// Field holding the address to look up.
    #[serde(default)]
    pub source: Option<String>,

    /// Field under which enrichment results are written.
    #[serde(default)]
    pub target: Option<String>,

    /// Path to the database file.
    #[serde(default)]
    pub database: Option<PathBuf>,

    /// 0 = no cache, >0 = bounded result cache.
    #[serde(default)]
    pub cache_size: i64,

    /// Projection specs (`before[:after]`). Absent = export every field.
    ///
    /// Kept as raw JSON values so a non-string element can be reported as
    /// [`ConfigError::InvalidFields`].
    #[serde(default)]
    pub fields: Option<Vec<Value>>,

    /// Tag applied to records that could not be enriched.
    #[serde(default = "default_failure_tag")]
    pub tag_on_failure: String,
}

fn default_failure_tag() -> String {
    DEFAULT_FAILURE_TAG.to_string()
}

impl Default for MmdbFilterConfig {
    fn default() -> Self {
        Self {
            source: None,
            target: None,
            database: None,
            cache_size: 0,
            fields: None,
            tag_on_failure: default_failure_tag(),
        }
    }
}

impl MmdbFilterConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from a host JSON object.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        serde_json::from_value(value).map_err(|e| ConfigError::Malformed(e.to_string()))
    }

    /// Set the source field.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the target field.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Set the database path.
    pub fn with_database(mut self, database: impl Into<PathBuf>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the cache size.
    pub fn with_cache_size(mut self, cache_size: i64) -> Self {
        self.cache_size = cache_size;
        self
    }

    /// Set the projection specs.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(|f| Value::String(f.into())).collect());
        self
    }

    /// Set the failure tag.
    pub fn with_tag_on_failure(mut self, tag: impl Into<String>) -> Self {
        self.tag_on_failure = tag.into();
        self
    }

    /// Returns the database path or [`ConfigError::MissingDatabase`].
    pub fn database_path(&self) -> Result<&Path, ConfigError> {
        self.database.as_deref().ok_or(ConfigError::MissingDatabase)
    }

    /// Returns the parsed source reference or [`ConfigError::MissingSource`].
    pub fn source_reference(&self) -> Result<FieldReference, ConfigError> {
        parse_reference(self.source.as_deref().ok_or(ConfigError::MissingSource)?)
    }

    /// Returns the parsed target reference or [`ConfigError::MissingTarget`].
    pub fn target_reference(&self) -> Result<FieldReference, ConfigError> {
        parse_reference(self.target.as_deref().ok_or(ConfigError::MissingTarget)?)
    }

    /// Returns the projection specs as strings.
    ///
    /// `Ok(None)` means no `fields` option was given.
    pub fn field_specs(&self) -> Result<Option<Vec<&str>>, ConfigError> {
        self.fields
            .as_ref()
            .map(|fields| {
                fields
                    .iter()
                    .map(|f| f.as_str().ok_or(ConfigError::InvalidFields))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()
    }

    /// Returns the cache policy for `cache_size`.
    pub fn cache_policy(&self) -> Result<CachePolicy, ConfigError> {
        CachePolicy::from_size(self.cache_size)
    }

    /// Checks every option that can be checked without touching the database.
    ///
    /// Errors come in the order `database`, `source`, `target`, `fields`,
    /// `cache_size`. The projection grammar itself is checked when the filter
    /// builds its projection tree.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database_path()?;
        self.source_reference()?;
        self.target_reference()?;
        self.field_specs()?;
        self.cache_policy()?;
        Ok(())
    }
}

fn parse_reference(reference: &str) -> Result<FieldReference, ConfigError> {
    FieldReference::parse(reference)
        .map_err(|_| ConfigError::InvalidFieldReference(reference.to_string()))
}
