//! Statistics for an enrichment filter.

use crate::filter::EnrichOutcome;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache line size on most modern CPUs (64 bytes).
const CACHE_LINE_SIZE: usize = 64;

/// A cache-line-padded atomic counter to prevent false sharing.
///
/// Filters are called from many worker threads at once and every record
/// bumps two or three counters.
#[repr(C, align(64))]
#[derive(Debug)]
struct PaddedAtomicU64 {
    value: AtomicU64,
    _padding: [u8; CACHE_LINE_SIZE - std::mem::size_of::<AtomicU64>()],
}

impl Default for PaddedAtomicU64 {
    fn default() -> Self {
        Self {
            value: AtomicU64::new(0),
            _padding: [0; CACHE_LINE_SIZE - std::mem::size_of::<AtomicU64>()],
        }
    }
}

impl PaddedAtomicU64 {
    #[inline]
    fn load(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    #[inline]
    fn add(&self, val: u64) {
        self.value.fetch_add(val, Ordering::Relaxed);
    }
}

/// Counters collected by one filter.
///
/// Lookup misses and lookup errors produce the same tag on the record; they
/// are only told apart here.
#[derive(Debug)]
pub struct EnrichmentStats {
    started_at: DateTime<Utc>,

    /// Records passed to `process`
    records_processed: PaddedAtomicU64,

    /// Records enriched without any failure
    records_matched: PaddedAtomicU64,

    /// Records that received the failure tag
    records_failed: PaddedAtomicU64,

    /// Source field missing or not a string
    missing_source: PaddedAtomicU64,

    /// Source field not an IP address
    invalid_addresses: PaddedAtomicU64,

    /// Addresses with no database entry
    lookup_misses: PaddedAtomicU64,

    /// Lookups that failed
    lookup_errors: PaddedAtomicU64,

    /// Fields skipped because their value could not be written
    field_errors: PaddedAtomicU64,
}

impl Default for EnrichmentStats {
    fn default() -> Self {
        Self::new()
    }
}

impl EnrichmentStats {
    /// Create a new stats tracker with the current time as start time.
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            records_processed: PaddedAtomicU64::default(),
            records_matched: PaddedAtomicU64::default(),
            records_failed: PaddedAtomicU64::default(),
            missing_source: PaddedAtomicU64::default(),
            invalid_addresses: PaddedAtomicU64::default(),
            lookup_misses: PaddedAtomicU64::default(),
            lookup_errors: PaddedAtomicU64::default(),
            field_errors: PaddedAtomicU64::default(),
        }
    }

    /// Record the outcome of one record.
    pub fn record_outcome(&self, outcome: EnrichOutcome) {
        self.records_processed.add(1);
        match outcome {
            EnrichOutcome::Matched => {
                self.records_matched.add(1);
                return;
            }
            EnrichOutcome::PartiallyMatched => {}
            EnrichOutcome::MissingSource => self.missing_source.add(1),
            EnrichOutcome::InvalidAddress => self.invalid_addresses.add(1),
            EnrichOutcome::NotFound => self.lookup_misses.add(1),
            EnrichOutcome::LookupFailed => self.lookup_errors.add(1),
        }
        self.records_failed.add(1);
    }

    /// Record fields that could not be written.
    pub fn record_field_errors(&self, count: u64) {
        self.field_errors.add(count);
    }

    /// When the filter was created.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Get the number of records processed.
    pub fn records_processed(&self) -> u64 {
        self.records_processed.load()
    }

    /// Get the number of fully enriched records.
    pub fn records_matched(&self) -> u64 {
        self.records_matched.load()
    }

    /// Get the number of tagged records.
    pub fn records_failed(&self) -> u64 {
        self.records_failed.load()
    }

    /// Get the number of records without a usable source field.
    pub fn missing_source(&self) -> u64 {
        self.missing_source.load()
    }

    /// Get the number of unparseable addresses.
    pub fn invalid_addresses(&self) -> u64 {
        self.invalid_addresses.load()
    }

    /// Get the number of lookup misses.
    pub fn lookup_misses(&self) -> u64 {
        self.lookup_misses.load()
    }

    /// Get the number of lookup errors.
    pub fn lookup_errors(&self) -> u64 {
        self.lookup_errors.load()
    }

    /// Get the number of projected fields that could not be written
    /// (unsupported values and targets that are not objects).
    pub fn field_errors(&self) -> u64 {
        self.field_errors.load()
    }

    /// Create a snapshot of the current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            started_at: self.started_at,
            taken_at: Utc::now(),
            records_processed: self.records_processed(),
            records_matched: self.records_matched(),
            records_failed: self.records_failed(),
            missing_source: self.missing_source(),
            invalid_addresses: self.invalid_addresses(),
            lookup_misses: self.lookup_misses(),
            lookup_errors: self.lookup_errors(),
            field_errors: self.field_errors(),
        }
    }
}

/// A serializable snapshot of filter statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub started_at: DateTime<Utc>,
    pub taken_at: DateTime<Utc>,
    pub records_processed: u64,
    pub records_matched: u64,
    pub records_failed: u64,
    pub missing_source: u64,
    pub invalid_addresses: u64,
    pub lookup_misses: u64,
    pub lookup_errors: u64,
    pub field_errors: u64,
}

impl StatsSnapshot {
    /// Time between filter creation and this snapshot.
    pub fn duration(&self) -> Duration {
        self.taken_at - self.started_at
    }

    /// Records processed per second, `None` before any time has passed.
    pub fn records_per_second(&self) -> Option<f64> {
        let secs = self.duration().num_milliseconds() as f64 / 1000.0;
        (secs > 0.0).then(|| self.records_processed as f64 / secs)
    }

    /// Fraction of processed records that were fully enriched.
    pub fn match_rate(&self) -> Option<f64> {
        (self.records_processed > 0)
            .then(|| self.records_matched as f64 / self.records_processed as f64)
    }
}
