//! MmdbFilter - enriches records from a hot-reloadable MMDB database.

use crate::projection::ProjectionSpec;
use crate::stats::EnrichmentStats;
use chrono::{DateTime, Utc};
use pf_error::{classify_error, ConfigError, FieldError, OpenError, PfError, ProcessingStage};
use pf_mmdb::{HotReloadHandle, MmdbEngine};
use pf_traits::{Filter, LookupEngine, MatchListener};
use pf_types::{DatabaseMetadata, FieldReference, LookupValue, MmdbFilterConfig, Record};
use serde_json::{Map, Value};
use std::net::{AddrParseError, IpAddr};
use tracing::{debug, error, info, trace, warn};

/// What happened to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichOutcome {
    /// Every projected field was written.
    Matched,
    /// The lookup matched but at least one field could not be written.
    PartiallyMatched,
    /// The source field is absent or not a string.
    MissingSource,
    /// The source field is not an IP address.
    InvalidAddress,
    /// The lookup itself failed.
    LookupFailed,
    /// No database entry covers the address.
    NotFound,
}

impl EnrichOutcome {
    /// Returns true when the record was enriched without a failure tag.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Matched)
    }

    /// Short name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Matched => "matched",
            Self::PartiallyMatched => "partially_matched",
            Self::MissingSource => "missing_source",
            Self::InvalidAddress => "invalid_address",
            Self::LookupFailed => "lookup_failed",
            Self::NotFound => "not_found",
        }
    }
}

impl std::fmt::Display for EnrichOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enrichment filter backed by an MMDB file.
///
/// Looks up the address held in the source field and writes the projected
/// result under the target field. Records that cannot be enriched get the
/// failure tag instead; processing never fails and never drops a record.
///
/// The database file is watched for the lifetime of the filter and reloaded
/// when it changes.
pub struct MmdbFilter<E: LookupEngine = MmdbEngine> {
    id: String,
    source: FieldReference,
    target: FieldReference,
    projection: ProjectionSpec,
    failure_tag: String,
    handle: HotReloadHandle<E>,
    stats: EnrichmentStats,
}

impl MmdbFilter<MmdbEngine> {
    /// Creates a filter reading MMDB files with [`MmdbEngine`].
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] (wrapped in [`PfError::Config`]) if:
    /// - `database`, `source` or `target` is missing (checked in that order)
    /// - a field spec is not a string or does not match `before[:after]`
    /// - `cache_size` is negative
    /// - the database cannot be opened
    ///
    /// Options are validated before the database file is touched.
    pub fn new(id: impl Into<String>, config: &MmdbFilterConfig) -> Result<Self, PfError> {
        Self::with_engine(id, config, MmdbEngine)
    }
}

impl<E: LookupEngine> MmdbFilter<E> {
    /// Creates a filter with a custom lookup engine.
    pub fn with_engine(
        id: impl Into<String>,
        config: &MmdbFilterConfig,
        engine: E,
    ) -> Result<Self, PfError> {
        let id = id.into();

        let database = config.database_path()?;
        let source = config.source_reference()?;
        let target = config.target_reference()?;
        let projection = ProjectionSpec::from_specs(config.field_specs()?.as_deref())?;
        let cache_policy = config.cache_policy()?;

        let handle = HotReloadHandle::open(engine, database, cache_policy).map_err(|err| {
            error!(
                filter_id = %id,
                database = %database.display(),
                error = %err,
                category = ?classify_error(&err, ProcessingStage::Construction),
                "Failed to open database"
            );
            match err {
                PfError::Open(OpenError::Watch { .. }) => err,
                PfError::Open(open) => ConfigError::InvalidDatabase(open.to_string()).into(),
                other => other,
            }
        })?;

        info!(
            filter_id = %id,
            source = %source,
            target = %target,
            export_all = projection.is_export_all(),
            failure_tag = %config.tag_on_failure,
            "Created MmdbFilter"
        );

        Ok(Self {
            id,
            source,
            target,
            projection,
            failure_tag: config.tag_on_failure.clone(),
            handle,
            stats: EnrichmentStats::new(),
        })
    }

    /// Enriches one record in place.
    ///
    /// Never fails: every error path tags the record and is reported through
    /// the returned outcome.
    pub fn process(&self, record: &mut Record) -> EnrichOutcome {
        let outcome = self.enrich(record);
        if !outcome.is_success() {
            record.tag(&self.failure_tag);
        }
        self.stats.record_outcome(outcome);
        outcome
    }

    fn enrich(&self, record: &mut Record) -> EnrichOutcome {
        let addr = match self.source_address(record) {
            Ok(addr) => addr,
            Err(outcome) => return outcome,
        };

        let snapshot = self.handle.current();
        let result = match snapshot.query(addr) {
            Ok(Some(result)) => result,
            Ok(None) => {
                trace!(filter_id = %self.id, addr = %addr, "No database entry");
                return EnrichOutcome::NotFound;
            }
            Err(e) => {
                let err = PfError::from(e);
                warn!(
                    filter_id = %self.id,
                    addr = %addr,
                    generation = snapshot.generation(),
                    error = %err,
                    category = ?classify_error(&err, ProcessingStage::Lookup),
                    "Lookup failed"
                );
                return EnrichOutcome::LookupFailed;
            }
        };
        drop(snapshot);

        let mut failures = 0u64;
        if let Err(e) = self.ensure_target(record) {
            self.report_field_error(&e);
            failures += 1;
        }

        self.projection.project(&result, |key, value| {
            if let Err(e) = self.write_field(record, key, value) {
                self.report_field_error(&e);
                failures += 1;
            }
        });

        if failures > 0 {
            self.stats.record_field_errors(failures);
            EnrichOutcome::PartiallyMatched
        } else {
            EnrichOutcome::Matched
        }
    }

    fn source_address(&self, record: &Record) -> Result<IpAddr, EnrichOutcome> {
        let Some(Value::String(text)) = record.get(&self.source) else {
            trace!(filter_id = %self.id, source = %self.source, "Source field missing or not a string");
            return Err(EnrichOutcome::MissingSource);
        };

        text.trim().parse().map_err(|e: AddrParseError| {
            let err = PfError::Address(format!("{text:?}: {e}"));
            debug!(
                filter_id = %self.id,
                error = %err,
                category = ?classify_error(&err, ProcessingStage::Lookup),
                "Source field is not an IP address"
            );
            EnrichOutcome::InvalidAddress
        })
    }

    /// Creates the target as an empty object unless something is already there.
    fn ensure_target(&self, record: &mut Record) -> Result<(), FieldError> {
        if record.contains(&self.target) {
            return Ok(());
        }
        record.set(&self.target, Value::Object(Map::new()))
    }

    fn write_field(&self, record: &mut Record, key: &str, value: &LookupValue) -> Result<(), FieldError> {
        // The output key is one segment, even if it contains dots
        let path = self.target.child(key);
        let json = value
            .to_json()
            .ok_or_else(|| FieldError::UnsupportedValue(path.to_string()))?;
        record.set(&path, json)
    }

    fn report_field_error(&self, e: &FieldError) {
        let err = PfError::Field(e.clone());
        debug!(
            filter_id = %self.id,
            error = %err,
            category = ?classify_error(&err, ProcessingStage::Projection),
            "Skipped field"
        );
    }

    /// Filter id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Source field reference.
    pub fn source(&self) -> &FieldReference {
        &self.source
    }

    /// Target field reference.
    pub fn target(&self) -> &FieldReference {
        &self.target
    }

    /// Tag applied to records that could not be enriched.
    pub fn failure_tag(&self) -> &str {
        &self.failure_tag
    }

    /// The projection built from the `fields` option.
    pub fn projection(&self) -> &ProjectionSpec {
        &self.projection
    }

    /// The database handle.
    pub fn handle(&self) -> &HotReloadHandle<E> {
        &self.handle
    }

    /// Metadata of the database currently in use.
    pub fn metadata(&self) -> DatabaseMetadata {
        self.handle.metadata()
    }

    /// Time of the last successful database reload.
    pub fn last_reload(&self) -> Option<DateTime<Utc>> {
        self.handle.last_reload()
    }

    /// Filter statistics.
    pub fn stats(&self) -> &EnrichmentStats {
        &self.stats
    }

    /// Stops watching the database file. Idempotent; also runs on drop.
    pub fn shutdown(&self) {
        self.handle.shutdown();
    }
}

impl<E: LookupEngine> Filter for MmdbFilter<E> {
    fn filter(&self, mut records: Vec<Record>, listener: &dyn MatchListener) -> Vec<Record> {
        trace!(filter_id = %self.id, count = records.len(), "Filtering batch");

        for record in &mut records {
            if self.process(record).is_success() {
                listener.filter_matched(record);
            }
        }
        records
    }

    fn name(&self) -> &str {
        &self.id
    }
}

impl<E: LookupEngine> std::fmt::Debug for MmdbFilter<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmdbFilter")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("target", &self.target)
            .field("failure_tag", &self.failure_tag)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}
