//! CLI argument definitions for pf-enrich.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use pf_types::MmdbFilterConfig;
use std::path::{Path, PathBuf};
use tracing::Level;

/// Enrich NDJSON records with the entry an MMDB database holds for their address.
///
/// Reads one JSON object per line from stdin and writes every record, enriched
/// or tagged, to stdout in input order. The database file is watched and
/// reloaded when it is replaced.
///
/// ## Examples
///
/// Export every field of the matching entry:
///   pf-enrich --source ip --target network --database networks.mmdb < events.jsonl
///
/// Pick and rename fields, with a result cache:
///   pf-enrich -s '[client][ip]' -t '[client][geo]' -D GeoLite2-City.mmdb \
///     -f country.names.en:country -f city.names.en:city --cache-size 10000
///
/// Load options from a JSON file and override one of them:
///   pf-enrich --config enrich.json --cache-size 0
#[derive(Parser, Debug)]
#[command(name = "pf-enrich")]
#[command(version, about, long_about = None)]
pub struct Cli {
    // === Filter ===
    /// JSON file holding a filter configuration object; flags override it
    #[arg(short = 'c', long, env = "PF_ENRICH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Field holding the address to look up
    #[arg(short = 's', long)]
    pub source: Option<String>,

    /// Field receiving the enrichment results
    #[arg(short = 't', long)]
    pub target: Option<String>,

    /// Path to the MMDB database file
    #[arg(short = 'D', long, env = "PF_ENRICH_DATABASE")]
    pub database: Option<PathBuf>,

    /// Result cache size (0 disables the cache)
    #[arg(long, allow_negative_numbers = true)]
    pub cache_size: Option<i64>,

    /// Field to export, as `path.to.field[:alias]` (repeatable; default exports all)
    #[arg(short = 'f', long = "field")]
    pub fields: Vec<String>,

    /// Tag added to records that could not be enriched
    #[arg(long)]
    pub tag_on_failure: Option<String>,

    /// Filter id used in logs
    #[arg(long, default_value = "mmdb")]
    pub id: String,

    // === Processing ===
    /// Records enriched per batch (must be >= 1)
    #[arg(long, default_value = "1000", value_parser = parse_positive_usize)]
    pub batch_size: usize,

    // === Logging ===
    /// Log level
    #[arg(short = 'l', long, value_enum, default_value = "info", env = "PF_LOG_LEVEL")]
    pub log_level: LogLevel,
}

impl Cli {
    /// Build the filter configuration from `--config` and the flag overrides.
    ///
    /// Only shape errors are reported here; missing or invalid options are
    /// rejected when the filter is built.
    pub async fn to_config(&self) -> Result<MmdbFilterConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path).await?,
            None => MmdbFilterConfig::new(),
        };

        if let Some(source) = &self.source {
            config = config.with_source(source);
        }
        if let Some(target) = &self.target {
            config = config.with_target(target);
        }
        if let Some(database) = &self.database {
            config = config.with_database(database);
        }
        if let Some(cache_size) = self.cache_size {
            config = config.with_cache_size(cache_size);
        }
        if !self.fields.is_empty() {
            config = config.with_fields(self.fields.iter().cloned());
        }
        if let Some(tag) = &self.tag_on_failure {
            config = config.with_tag_on_failure(tag);
        }

        Ok(config)
    }
}

async fn load_config(path: &Path) -> Result<MmdbFilterConfig> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("config file {} is not valid JSON", path.display()))?;
    MmdbFilterConfig::from_value(value)
        .with_context(|| format!("invalid config file {}", path.display()))
}

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

/// Parse a positive usize (>= 1).
fn parse_positive_usize(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if value < 1 {
        return Err(format!("{} is not in 1..", value));
    }
    Ok(value)
}
