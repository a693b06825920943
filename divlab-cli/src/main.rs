//! divlab CLI: dividend window analysis, price fetches and cache inspection.
//!
//! Commands:
//! - `analyze`: run the dividend analysis for symbols or watchlist groups
//!   and save one report per symbol
//! - `prices`: fetch (or read from cache) a daily price series
//! - `industries`: resolve stock names and industries, write the industry
//!   report and optionally an industry-grouped watchlist
//! - `cache status`: list cached series with point counts and date ranges

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use divlab_core::data::{
    init_cache, CircuitBreaker, CsvDividendSource, CsvPriceSource, CsvProfileSource,
    DividendEventProvider, DividendSource, PriceSeriesProvider, PriceSource, ProfileLookup,
    TimeSeriesCache, YahooProvider,
};
use divlab_runner::{
    analyze_symbols, industry_watchlist, save_industry_report, save_report, AnalysisConfig,
    AnalysisOutcome, DividendAnalysisPipeline, SourceKind, StdoutProgress, Watchlist,
};

#[derive(Parser)]
#[command(name = "divlab", about = "divlab: dividend event price window analysis")]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Cache directory (overrides the config file).
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze price behaviour around each dividend event and save reports.
    Analyze {
        /// Symbols to analyze (e.g., 600755 000651).
        symbols: Vec<String>,

        /// Watchlist groups to analyze in addition to the listed symbols.
        #[arg(long = "group")]
        groups: Vec<String>,

        /// Watchlist TOML file. Defaults to the built-in batch list.
        #[arg(long)]
        watchlist: Option<PathBuf>,

        /// As-of date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        as_of: Option<String>,

        /// Calendar days either side of each event date.
        #[arg(long)]
        radius: Option<u32>,

        /// Trailing calendar years of dividend history.
        #[arg(long)]
        years_back: Option<u32>,

        /// Output directory for reports.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Also write a JSON report per symbol.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Fetch a daily price series through the cache.
    Prices {
        symbol: String,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Number of most recent points to print.
        #[arg(long, default_value_t = 10)]
        tail: usize,
    },
    /// Resolve stock names and industries from the configured industry export.
    Industries {
        /// Symbols to classify. Defaults to the built-in batch list.
        symbols: Vec<String>,

        /// Watchlist groups to classify in addition to the listed symbols.
        #[arg(long = "group")]
        groups: Vec<String>,

        /// Watchlist TOML file the groups come from.
        #[arg(long)]
        watchlist: Option<PathBuf>,

        /// Output directory for the industry report.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Also write a watchlist with one group per industry.
        #[arg(long)]
        write_watchlist: Option<PathBuf>,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached series with point counts and date ranges.
    Status,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => AnalysisConfig::from_file(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(dir) = cli.cache_dir {
        config.cache.dir = dir;
    }
    tracing::debug!(cache_dir = %config.cache.dir.display(), "configuration loaded");

    match cli.command {
        Commands::Analyze {
            symbols,
            groups,
            watchlist,
            as_of,
            radius,
            years_back,
            output_dir,
            json,
        } => {
            if let Some(r) = radius {
                config.analysis.window_radius_days = r;
            }
            if let Some(y) = years_back {
                config.analysis.years_back = y;
            }
            if let Some(dir) = output_dir {
                config.output.dir = dir;
            }
            config.output.json |= json;
            config.validate()?;

            let symbols = resolve_symbols(symbols, &groups, watchlist.as_deref())?;
            run_analyze(&config, &symbols, parse_date_or_today(as_of.as_deref())?)
        }
        Commands::Prices { symbol, end, tail } => {
            config.validate()?;
            run_prices(&config, &symbol, parse_date_or_today(end.as_deref())?, tail)
        }
        Commands::Industries {
            symbols,
            groups,
            watchlist,
            output_dir,
            write_watchlist,
        } => {
            if let Some(dir) = output_dir {
                config.output.dir = dir;
            }
            config.validate()?;
            let symbols = if symbols.is_empty() && groups.is_empty() {
                Watchlist::default_batch()
                    .all_symbols()
                    .into_iter()
                    .map(String::from)
                    .collect()
            } else {
                resolve_symbols(symbols, &groups, watchlist.as_deref())?
            };
            run_industries(&config, &symbols, write_watchlist.as_deref())
        }
        Commands::Cache { action } => match action {
            CacheAction::Status => run_cache_status(&config.cache.dir),
        },
    }
}

fn parse_date_or_today(raw: Option<&str>) -> Result<NaiveDate> {
    Ok(raw
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()
        .context("dates must be YYYY-MM-DD")?
        .unwrap_or_else(|| chrono::Local::now().date_naive()))
}

fn resolve_symbols(
    mut symbols: Vec<String>,
    groups: &[String],
    watchlist: Option<&Path>,
) -> Result<Vec<String>> {
    if !groups.is_empty() {
        let list = match watchlist {
            Some(path) => Watchlist::from_file(path)?,
            None => Watchlist::default_batch(),
        };
        symbols.extend(list.select(groups)?.into_iter().map(String::from));
    }
    let mut seen = std::collections::BTreeSet::new();
    symbols.retain(|s| seen.insert(s.clone()));

    if symbols.is_empty() {
        bail!("no symbols given: pass symbols or --group <name>");
    }
    Ok(symbols)
}

fn shared_yahoo(config: &AnalysisConfig) -> Result<Option<Arc<YahooProvider>>> {
    let sources = &config.sources;
    if sources.prices != SourceKind::Yahoo && sources.dividends != SourceKind::Yahoo {
        return Ok(None);
    }
    let breaker = Arc::new(CircuitBreaker::new(
        config.provider.breaker_cooldown(),
        config.provider.breaker_failure_threshold,
    ));
    Ok(Some(Arc::new(YahooProvider::new(
        breaker,
        config.provider.timeout(),
    )?)))
}

fn price_source(
    config: &AnalysisConfig,
    yahoo: &Option<Arc<YahooProvider>>,
) -> Result<Arc<dyn PriceSource>> {
    Ok(match config.sources.prices {
        SourceKind::Yahoo => yahoo.clone().context("Yahoo source not built")? as Arc<dyn PriceSource>,
        SourceKind::Csv => {
            let dir = config
                .sources
                .price_dir
                .as_ref()
                .context("sources.price_dir is not set")?;
            Arc::new(CsvPriceSource::new(dir).with_columns(config.sources.price_columns.clone()))
                as Arc<dyn PriceSource>
        }
    })
}

fn dividend_source(
    config: &AnalysisConfig,
    yahoo: &Option<Arc<YahooProvider>>,
) -> Result<Arc<dyn DividendSource>> {
    Ok(match config.sources.dividends {
        SourceKind::Yahoo => {
            yahoo.clone().context("Yahoo source not built")? as Arc<dyn DividendSource>
        }
        SourceKind::Csv => {
            let path = config
                .sources
                .dividend_file
                .as_ref()
                .context("sources.dividend_file is not set")?;
            Arc::new(CsvDividendSource::new(path)) as Arc<dyn DividendSource>
        }
    })
}

fn run_analyze(config: &AnalysisConfig, symbols: &[String], as_of: NaiveDate) -> Result<()> {
    let yahoo = shared_yahoo(config)?;
    let cache = init_cache(&config.cache.dir)?;
    let retry = config.provider.retry_policy();

    let prices =
        PriceSeriesProvider::new(price_source(config, &yahoo)?, cache).with_retry(retry.clone());
    let dividends =
        DividendEventProvider::new(dividend_source(config, &yahoo)?, as_of).with_retry(retry);
    let pipeline = DividendAnalysisPipeline::new(prices, dividends)
        .with_radius_days(config.analysis.window_radius_days)
        .with_years_back(config.analysis.years_back);

    let single = symbols.len() == 1;
    let summary = analyze_symbols(&pipeline, symbols, &StdoutProgress, |outcome| {
        if single {
            print_outcome(outcome);
        }
        let paths = save_report(&config.output.dir, outcome, config.output.json)?;
        if paths.is_empty() {
            println!("  No analysable data for {}", outcome.symbol);
        }
        for path in paths {
            println!("  Report: {}", path.display());
        }
        Ok(())
    })?;

    if !summary.failed.is_empty() {
        for (sym, err) in &summary.failed {
            eprintln!("Error for {sym}: {err}");
        }
        std::process::exit(1);
    }
    Ok(())
}

fn run_industries(
    config: &AnalysisConfig,
    symbols: &[String],
    write_watchlist: Option<&Path>,
) -> Result<()> {
    let path = config
        .sources
        .profile_file
        .as_ref()
        .context("sources.profile_file is not set")?;
    let mut source = CsvProfileSource::new(path);
    if let Some(scheme) = &config.sources.profile_classification {
        source = source.with_classification(scheme.clone());
    }
    let lookup = ProfileLookup::new(Arc::new(source)).with_retry(config.provider.retry_policy());

    let found = lookup.lookup(symbols)?;
    println!();
    println!("{:<10} {:<12} {}", "Code", "Name", "Industry");
    println!("{}", "-".repeat(50));
    for p in &found.profiles {
        println!("{:<10} {:<12} {}", p.code, p.name, p.industry_or_unknown());
    }
    if !found.missing.is_empty() {
        println!("WARNING: no profile for {}", found.missing.join(", "));
    }

    match save_industry_report(&config.output.dir, &found.profiles)? {
        Some(path) => println!("Report: {}", path.display()),
        None => println!("No stock profiles resolved"),
    }
    if let Some(path) = write_watchlist {
        industry_watchlist(&found.profiles).save(path)?;
        println!("Watchlist: {}", path.display());
    }
    Ok(())
}

fn run_prices(config: &AnalysisConfig, symbol: &str, end: NaiveDate, tail: usize) -> Result<()> {
    let yahoo = shared_yahoo(config)?;
    let cache = init_cache(&config.cache.dir)?;
    let provider = PriceSeriesProvider::new(price_source(config, &yahoo)?, cache)
        .with_retry(config.provider.retry_policy());

    let series = provider.fetch(symbol, end)?;
    println!();
    println!("Symbol: {}", series.symbol());
    println!("Source: {}", provider.source_name());
    println!("Points: {}", series.len());
    if let (Some(first), Some(last)) = (series.first_date(), series.last_date()) {
        println!("Range:  {first} to {last}");
    }
    println!();
    println!("{:<12} {:>10} {:>10} {:>10}", "Date", "High", "Low", "Close");
    println!("{}", "-".repeat(45));
    let skip = series.len().saturating_sub(tail);
    for p in &series.points()[skip..] {
        println!(
            "{:<12} {:>10.2} {:>10.2} {:>10.2}",
            p.date.to_string(),
            p.high,
            p.low,
            p.close
        );
    }
    Ok(())
}

fn run_cache_status(cache_dir: &Path) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let entries = TimeSeriesCache::new(cache_dir).entries();
    if entries.is_empty() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    let symbols: std::collections::BTreeSet<&str> =
        entries.iter().map(|m| m.symbol.as_str()).collect();
    println!("Cache: {}", cache_dir.display());
    println!("Symbols: {}  Entries: {}", symbols.len(), entries.len());
    println!();
    println!(
        "{:<10} {:<12} {:<25} {:>8}",
        "Symbol", "As of", "Date Range", "Points"
    );
    println!("{}", "-".repeat(58));
    for meta in &entries {
        let range = match (meta.first_date, meta.last_date) {
            (Some(first), Some(last)) => format!("{first} to {last}"),
            _ => "(empty)".into(),
        };
        println!(
            "{:<10} {:<12} {:<25} {:>8}",
            meta.symbol,
            meta.as_of.to_string(),
            range,
            meta.point_count
        );
    }
    Ok(())
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".into())
}

fn print_outcome(outcome: &AnalysisOutcome) {
    println!();
    println!("=== Dividend Analysis: {} (as of {}) ===", outcome.symbol, outcome.as_of);
    println!(
        "{:<12} {:>8} {:>8} {:>10} {:>10}",
        "Period", "Cash", "Yield%", "PY High", "PY Low"
    );
    println!("{}", "-".repeat(52));
    for r in &outcome.records {
        println!(
            "{:<12} {:>8} {:>8} {:>10.2} {:>10.2}",
            r.report_period.to_string(),
            fmt_opt(r.cash_per_share),
            fmt_opt(r.yield_pct),
            r.prior_year.high,
            r.prior_year.low
        );
    }
    for s in &outcome.skipped {
        println!("SKIPPED: {} ({:?})", s.report_period, s.reason);
    }
    if !outcome.failed_years.is_empty() {
        println!("WARNING: dividend query failed for years {:?}", outcome.failed_years);
    }
    if outcome.dropped_rows > 0 {
        println!("WARNING: {} malformed dividend rows dropped", outcome.dropped_rows);
    }
    println!();
}
