//! Batch analysis over many symbols.
//!
//! Symbols run one after another through the same pipeline, so they share
//! the price cache and the source's circuit breaker. A symbol with no usable
//! data is reported and skipped; any other failure stops the batch.

use anyhow::Result;
use serde::Serialize;

use crate::pipeline::{AnalysisOutcome, DividendAnalysisPipeline, PipelineError};

/// Progress callback for multi-symbol runs.
pub trait AnalysisProgress: Send {
    fn on_start(&self, symbol: &str, index: usize, total: usize);

    fn on_complete(
        &self,
        symbol: &str,
        index: usize,
        total: usize,
        result: Result<&AnalysisOutcome, &PipelineError>,
    );

    fn on_batch_complete(&self, summary: &BatchSummary);
}

/// Prints one line per symbol to stdout.
pub struct StdoutProgress;

impl AnalysisProgress for StdoutProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        println!("[{}/{}] Analyzing {symbol}...", index + 1, total);
    }

    fn on_complete(
        &self,
        symbol: &str,
        _index: usize,
        _total: usize,
        result: Result<&AnalysisOutcome, &PipelineError>,
    ) {
        match result {
            Ok(outcome) => println!(
                "  OK: {symbol}: {} records, {} skipped events",
                outcome.records.len(),
                outcome.skipped.len()
            ),
            Err(e) => println!("  FAIL: {symbol}: {e}"),
        }
    }

    fn on_batch_complete(&self, summary: &BatchSummary) {
        println!(
            "\nBatch complete: {} succeeded, {} failed, {} records, {} skipped events",
            summary.succeeded.len(),
            summary.failed.len(),
            summary.records,
            summary.skipped_events
        );
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: Vec<String>,
    /// Symbol and the reason it had no data.
    pub failed: Vec<(String, String)>,
    pub records: usize,
    pub skipped_events: usize,
}

/// Run the pipeline for every symbol, handing each outcome to `sink`.
///
/// `DataUnavailable` failures are recorded in the summary and the batch
/// moves on. Other pipeline errors and sink errors end the batch.
pub fn analyze_symbols<S: AsRef<str>>(
    pipeline: &DividendAnalysisPipeline,
    symbols: &[S],
    progress: &dyn AnalysisProgress,
    mut sink: impl FnMut(&AnalysisOutcome) -> Result<()>,
) -> Result<BatchSummary> {
    let total = symbols.len();
    let mut summary = BatchSummary {
        total,
        ..BatchSummary::default()
    };

    for (index, symbol) in symbols.iter().enumerate() {
        let symbol = symbol.as_ref();
        progress.on_start(symbol, index, total);

        match pipeline.run(symbol) {
            Ok(outcome) => {
                progress.on_complete(symbol, index, total, Ok(&outcome));
                sink(&outcome)?;
                summary.records += outcome.records.len();
                summary.skipped_events += outcome.skipped.len();
                summary.succeeded.push(symbol.to_string());
            }
            Err(e) if e.is_unavailable() => {
                progress.on_complete(symbol, index, total, Err(&e));
                tracing::warn!(symbol, error = %e, "skipping symbol");
                summary.failed.push((symbol.to_string(), e.to_string()));
            }
            Err(e) => {
                progress.on_complete(symbol, index, total, Err(&e));
                return Err(e.into());
            }
        }
    }

    progress.on_batch_complete(&summary);
    Ok(summary)
}
