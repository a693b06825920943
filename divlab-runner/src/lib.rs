//! divlab runner: configuration, the dividend analysis pipeline, batch runs
//! and report export.
//!
//! This crate builds on `divlab-core` to provide:
//! - `AnalysisConfig` TOML loading and validation
//! - `DividendAnalysisPipeline` (events + prices → one record per event)
//! - Batch runs over watchlist groups with progress reporting
//! - CSV/JSON report files
//! - Industry classification reports and industry-grouped watchlists

pub mod batch;
pub mod config;
pub mod export;
pub mod industry;
pub mod pipeline;
pub mod watchlist;

pub use batch::{analyze_symbols, AnalysisProgress, BatchSummary, StdoutProgress};
pub use config::{AnalysisConfig, ConfigError, SourceKind};
pub use export::{report_file_name, save_report, write_csv};
pub use industry::{industry_watchlist, save_industry_report, INDUSTRY_REPORT_FILE};
pub use pipeline::{
    analyze_events, dividend_yield, AnalysisOutcome, AnalysisRecord, DividendAnalysisPipeline,
    PipelineError, SkipReason, SkippedEvent,
};
pub use watchlist::Watchlist;

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn pipeline_types_are_send_sync() {
        assert_send::<DividendAnalysisPipeline>();
        assert_sync::<DividendAnalysisPipeline>();
        assert_send::<AnalysisOutcome>();
        assert_sync::<AnalysisOutcome>();
        assert_send::<PipelineError>();
        assert_sync::<PipelineError>();
        assert_send::<AnalysisConfig>();
        assert_sync::<AnalysisConfig>();
    }
}
