//! pf-enrich CLI
//!
//! Enriches NDJSON records read from stdin with MMDB lookups.

use clap::Parser;

mod args;
mod format;
mod logging;
mod run;

use args::Cli;
use format::{format_bytes, format_number, format_percent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    logging::init_logging(args.log_level)?;

    let summary = run::execute(args).await?;
    let stats = &summary.stats;

    eprintln!();
    eprintln!("Enrichment completed:");
    eprintln!("  Lines read:        {}", format_number(summary.lines_read));
    eprintln!("  Lines skipped:     {}", format_number(summary.lines_skipped));
    eprintln!("  Bytes read:        {}", format_bytes(summary.bytes_read));
    eprintln!("  Records processed: {}", format_number(stats.records_processed));
    eprintln!("  Records matched:   {}", format_number(stats.records_matched));
    eprintln!("  Records tagged:    {}", format_number(stats.records_failed));

    if stats.records_failed > 0 {
        eprintln!(
            "    {} not found, {} lookup errors, {} invalid addresses, {} missing source",
            format_number(stats.lookup_misses),
            format_number(stats.lookup_errors),
            format_number(stats.invalid_addresses),
            format_number(stats.missing_source)
        );
    }
    if stats.field_errors > 0 {
        eprintln!(
            "  Field errors:      {}",
            format_number(stats.field_errors)
        );
    }
    if let Some(rate) = stats.match_rate() {
        eprintln!("  Match rate:        {}", format_percent(rate));
    }

    let secs = stats.duration().num_milliseconds() as f64 / 1000.0;
    eprintln!("  Duration:          {:.2}s", secs);
    if let Some(rps) = stats.records_per_second() {
        eprintln!("  Throughput:        {} records/sec", format_number(rps as u64));
    }

    Ok(())
}
