//! Main execution logic for pf-enrich.

use anyhow::{Context, Result};
use pf_enrichment::{MmdbFilter, StatsSnapshot};
use pf_traits::{Filter, NoopMatchListener};
use pf_types::Record;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, info, warn};

use crate::args::Cli;

/// Outcome of one run over an input stream.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Non-empty input lines seen
    pub lines_read: u64,

    /// Lines dropped because they were not JSON objects
    pub lines_skipped: u64,

    /// Input bytes consumed, newlines included
    pub bytes_read: u64,

    /// Batches handed to the filter
    pub batches: u64,

    /// Filter statistics at the end of the run
    pub stats: StatsSnapshot,
}

/// Build the filter from the arguments and enrich stdin to stdout.
pub async fn execute(args: Cli) -> Result<RunSummary> {
    let config = args.to_config().await?;
    config.validate().context("invalid filter configuration")?;

    let filter = MmdbFilter::new(args.id.as_str(), &config)
        .with_context(|| format!("failed to build filter '{}'", args.id))?;
    let filter = Arc::new(filter);

    info!(
        filter = %filter.id(),
        database = %filter.metadata(),
        batch_size = args.batch_size,
        "Enrichment started"
    );

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = BufWriter::new(tokio::io::stdout());
    let summary = enrich_stream(Arc::clone(&filter), stdin, stdout, args.batch_size).await;

    filter.shutdown();
    summary
}

/// Enrich every NDJSON record read from `input` and write it to `output`.
///
/// Records keep their input order. Blank lines are ignored; lines that are
/// not JSON objects are skipped with a warning.
pub async fn enrich_stream<R, W>(
    filter: Arc<MmdbFilter>,
    input: R,
    mut output: W,
    batch_size: usize,
) -> Result<RunSummary>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut batch = Vec::with_capacity(batch_size);
    let mut lines_read = 0u64;
    let mut lines_skipped = 0u64;
    let mut bytes_read = 0u64;
    let mut batches = 0u64;

    while let Some(line) = lines.next_line().await.context("failed to read input")? {
        bytes_read += line.len() as u64 + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        lines_read += 1;

        match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Object(fields)) => batch.push(Record::from_map(fields)),
            Ok(other) => {
                lines_skipped += 1;
                warn!(line = lines_read, kind = json_kind(&other), "Skipping non-object record");
            }
            Err(e) => {
                lines_skipped += 1;
                warn!(line = lines_read, error = %e, "Skipping unparseable record");
            }
        }

        if batch.len() >= batch_size {
            let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
            write_batch(&mut output, enrich_batch(&filter, full).await?).await?;
            batches += 1;
        }
    }

    if !batch.is_empty() {
        write_batch(&mut output, enrich_batch(&filter, batch).await?).await?;
        batches += 1;
    }
    output.flush().await.context("failed to flush output")?;

    Ok(RunSummary {
        lines_read,
        lines_skipped,
        bytes_read,
        batches,
        stats: filter.stats().snapshot(),
    })
}

async fn enrich_batch(filter: &Arc<MmdbFilter>, records: Vec<Record>) -> Result<Vec<Record>> {
    let filter = Arc::clone(filter);
    let count = records.len();
    let enriched = tokio::task::spawn_blocking(move || filter.filter(records, &NoopMatchListener))
        .await
        .context("enrichment task panicked")?;
    debug!(records = count, "Batch enriched");
    Ok(enriched)
}

async fn write_batch<W: AsyncWrite + Unpin>(output: &mut W, records: Vec<Record>) -> Result<()> {
    let mut buf = Vec::new();
    for record in records {
        serde_json::to_writer(&mut buf, record.as_map())?;
        buf.push(b'\n');
    }
    output
        .write_all(&buf)
        .await
        .context("failed to write output")
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
