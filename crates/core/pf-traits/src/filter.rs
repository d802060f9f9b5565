//! Filter trait for record processing.

use pf_types::Record;
use std::sync::atomic::{AtomicU64, Ordering};

/// Observer notified once for every record a filter fully enriched.
pub trait MatchListener: Send + Sync {
    /// Called after `record` was successfully enriched.
    fn filter_matched(&self, record: &Record);
}

/// A listener that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMatchListener;

impl MatchListener for NoopMatchListener {
    fn filter_matched(&self, _record: &Record) {}
}

/// A listener that counts notifications.
#[derive(Debug, Default)]
pub struct CountingMatchListener {
    matches: AtomicU64,
}

impl CountingMatchListener {
    /// Creates a listener with a zero count.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of matches seen so far.
    pub fn match_count(&self) -> u64 {
        self.matches.load(Ordering::Relaxed)
    }
}

impl MatchListener for CountingMatchListener {
    fn filter_matched(&self, _record: &Record) {
        self.matches.fetch_add(1, Ordering::Relaxed);
    }
}

/// Trait for record filters.
///
/// A filter mutates records in place and never drops them: every input
/// record is returned, in order, either enriched or tagged.
///
/// # Thread Safety
///
/// Filters must be `Send + Sync` as hosts may call them from several worker
/// threads at once.
pub trait Filter: Send + Sync {
    /// Processes a batch of records.
    ///
    /// # Arguments
    ///
    /// * `records` - Input batch
    /// * `listener` - Notified once per fully enriched record
    ///
    /// # Returns
    ///
    /// The same records, in the same order
    fn filter(&self, records: Vec<Record>, listener: &dyn MatchListener) -> Vec<Record>;

    /// Returns the name of this filter for logging.
    fn name(&self) -> &str {
        "filter"
    }
}
