//! Error types and classification for MMDB enrichment.
//!
//! This crate provides:
//! - [`PfError`] - Top-level error enum for all enrichment errors
//! - Domain-specific errors ([`ConfigError`], [`OpenError`], [`LookupError`], [`FieldError`])
//! - [`ErrorCategory`] for deciding whether an error is fatal, retained or tagged
//! - Error classification logic based on error type and processing stage

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for MMDB enrichment.
#[derive(Error, Debug)]
pub enum PfError {
    /// Configuration errors (fatal at construction)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database open errors
    #[error("Open error: {0}")]
    Open(#[from] OpenError),

    /// Errors raised by a single lookup
    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    /// Source value could not be parsed as an IP address
    #[error("Invalid address: {0}")]
    Address(String),

    /// Record field access errors
    #[error("Field error: {0}")]
    Field(#[from] FieldError),

    /// Generic errors (wrapped anyhow)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration errors.
///
/// Display strings are stable: hosts and tests match on them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No `database` option
    #[error("Must specify database filename")]
    MissingDatabase,

    /// No `source` option
    #[error("Must specify source field")]
    MissingSource,

    /// No `target` option
    #[error("Must specify target field")]
    MissingTarget,

    /// `fields` contains a non-string or a malformed projection spec
    #[error("Fields config must only be a list of strings")]
    InvalidFields,

    /// Negative `cache_size`
    #[error("Cache size must be either >0 to use a cache, or =0 to use no cache")]
    InvalidCacheSize(i64),

    /// `source` or `target` is not a valid field reference
    #[error("Invalid field reference: {0}")]
    InvalidFieldReference(String),

    /// The initial database could not be opened
    #[error("Database does not appear to be a valid database")]
    InvalidDatabase(String),

    /// Configuration object has the wrong shape (e.g. `cache_size` is a string)
    #[error("Invalid configuration: {0}")]
    Malformed(String),
}

/// Errors opening a database file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OpenError {
    /// Database file does not exist
    #[error("Database not found: {}", .0.display())]
    NotFound(PathBuf),

    /// I/O error reading the database
    #[error("I/O error reading {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },

    /// File is not a readable database
    #[error("Invalid database {}: {message}", .path.display())]
    InvalidDatabase { path: PathBuf, message: String },

    /// Watching the database path failed
    #[error("Cannot watch {}: {message}", .path.display())]
    Watch { path: PathBuf, message: String },
}

/// Errors from a single lookup against an open database.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// I/O failure during lookup
    #[error("I/O error: {0}")]
    Io(String),

    /// Corrupt or undecodable data section
    #[error("Decoding failed: {0}")]
    Decoding(String),

    /// Address family not served by the database (e.g. IPv6 in an IPv4 database)
    #[error("Unsupported address: {0}")]
    UnsupportedAddress(String),
}

/// Record field errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// Malformed field reference such as `[a][b`
    #[error("Invalid field reference: {0}")]
    InvalidReference(String),

    /// An intermediate path segment holds a non-object value
    #[error("Field {0} is not an object")]
    NotAnObject(String),

    /// Value kind that cannot be written into a record
    #[error("Unsupported value for field {0}")]
    UnsupportedValue(String),
}

/// Error classification.
///
/// Used to decide between aborting construction, keeping the previous
/// database snapshot, or tagging a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Fatal - the filter cannot be created
    Fatal,

    /// Retained - the previous snapshot stays in service
    Retained,

    /// Tagged - the record gets the failure tag, processing continues
    Tagged,
}

/// Processing stage for error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Validating configuration and opening the initial database
    Construction,

    /// Reopening the database after a file change
    Reload,

    /// Parsing the address and querying the snapshot
    Lookup,

    /// Writing projected fields into the record
    Projection,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Construction => write!(f, "Construction"),
            Self::Reload => write!(f, "Reload"),
            Self::Lookup => write!(f, "Lookup"),
            Self::Projection => write!(f, "Projection"),
        }
    }
}

/// Classifies an error for the stage it occurred in.
///
/// # Arguments
///
/// * `error` - The error to classify
/// * `stage` - The processing stage where the error occurred
///
/// # Returns
///
/// The appropriate [`ErrorCategory`]
pub fn classify_error(error: &PfError, stage: ProcessingStage) -> ErrorCategory {
    match (error, stage) {
        (PfError::Config(_), _) => ErrorCategory::Fatal,
        (_, ProcessingStage::Construction) => ErrorCategory::Fatal,
        (_, ProcessingStage::Reload) => ErrorCategory::Retained,
        (_, ProcessingStage::Lookup | ProcessingStage::Projection) => ErrorCategory::Tagged,
    }
}

/// Result type alias using PfError.
pub type Result<T> = std::result::Result<T, PfError>;
