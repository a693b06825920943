//! On-disk price series cache keyed by (symbol, as-of date).
//!
//! Layout: `{cache_dir}/symbol={SYMBOL}/{as_of}.parquet` plus a
//! `{as_of}.meta.json` sidecar.
//!
//! - An as-of key always denotes the same historical query, so entries are
//!   never invalidated or evicted.
//! - Writes are atomic (write to .tmp, rename into place); the last writer
//!   for a key wins.
//! - Every load is checked against the BLAKE3 content hash in the sidecar.
//! - Undecodable or mismatching entries are quarantined
//!   (`{filename}.quarantined`) and reported as a miss.

use super::provider::DataError;
use crate::domain::{PricePoint, PriceSeries};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const KEY_DATE_FORMAT: &str = "%Y-%m-%d";

/// Metadata sidecar for one cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub symbol: String,
    pub as_of: NaiveDate,
    pub point_count: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub data_hash: String,
    pub cached_at: chrono::NaiveDateTime,
}

/// Create the cache directory and return a cache rooted there.
///
/// Call once from the process entry point; nothing else in the crate creates
/// the root directory.
pub fn init_cache(path: impl Into<PathBuf>) -> Result<TimeSeriesCache, DataError> {
    let path = path.into();
    fs::create_dir_all(&path).map_err(|e| {
        DataError::CacheError(format!("failed to create {}: {e}", path.display()))
    })?;
    Ok(TimeSeriesCache::new(path))
}

pub struct TimeSeriesCache {
    cache_dir: PathBuf,
}

impl TimeSeriesCache {
    /// Wrap an existing directory. Does not touch the filesystem.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn symbol_dir(&self, symbol: &str) -> PathBuf {
        let safe: String = symbol
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
            .collect();
        self.cache_dir.join(format!("symbol={safe}"))
    }

    fn entry_path(&self, symbol: &str, as_of: NaiveDate) -> PathBuf {
        self.symbol_dir(symbol)
            .join(format!("{}.parquet", as_of.format(KEY_DATE_FORMAT)))
    }

    fn meta_path(&self, symbol: &str, as_of: NaiveDate) -> PathBuf {
        self.symbol_dir(symbol)
            .join(format!("{}.meta.json", as_of.format(KEY_DATE_FORMAT)))
    }

    /// Cached series for the key, or `None` on a miss.
    ///
    /// Read failures are logged and count as a miss.
    pub fn get(&self, symbol: &str, as_of: NaiveDate) -> Option<PriceSeries> {
        match self.load(symbol, as_of) {
            Ok(Some(series)) => {
                tracing::debug!(symbol, %as_of, points = series.len(), "cache hit");
                Some(series)
            }
            Ok(None) => {
                tracing::debug!(symbol, %as_of, "cache miss");
                None
            }
            Err(e) => {
                tracing::warn!(symbol, %as_of, error = %e, "unreadable cache entry, treating as miss");
                self.quarantine(symbol, as_of);
                None
            }
        }
    }

    /// Store a series under the key. Write failures are logged, not raised.
    pub fn put(&self, symbol: &str, as_of: NaiveDate, series: &PriceSeries) {
        if let Err(e) = self.write(symbol, as_of, series) {
            tracing::warn!(symbol, %as_of, error = %e, "failed to write cache entry");
        }
    }

    /// Load and verify an entry. `Ok(None)` means no entry exists.
    pub fn load(&self, symbol: &str, as_of: NaiveDate) -> Result<Option<PriceSeries>, DataError> {
        let path = self.entry_path(symbol, as_of);
        if !path.exists() {
            return Ok(None);
        }

        let meta_raw = fs::read_to_string(self.meta_path(symbol, as_of))
            .map_err(|e| DataError::CacheCorrupt(format!("missing sidecar: {e}")))?;
        let meta: CacheMeta = serde_json::from_str(&meta_raw)
            .map_err(|e| DataError::CacheCorrupt(format!("sidecar parse: {e}")))?;
        // Distinct symbols can share a directory after sanitising.
        if meta.symbol != symbol || meta.as_of != as_of {
            tracing::debug!(symbol, stored = %meta.symbol, "cache entry belongs to another key");
            return Ok(None);
        }

        let points = read_parquet(&path)?;
        if points.len() != meta.point_count {
            return Err(DataError::CacheCorrupt(format!(
                "expected {} points, found {}",
                meta.point_count,
                points.len()
            )));
        }
        let hash = content_hash(&points)?;
        if hash != meta.data_hash {
            return Err(DataError::CacheCorrupt("content hash mismatch".into()));
        }

        Ok(Some(PriceSeries::new(symbol, points)))
    }

    /// Write an entry atomically, returning any failure.
    pub fn write(
        &self,
        symbol: &str,
        as_of: NaiveDate,
        series: &PriceSeries,
    ) -> Result<(), DataError> {
        if series.is_empty() {
            return Err(DataError::CacheError("no points to cache".into()));
        }

        if !self.cache_dir.is_dir() {
            return Err(DataError::CacheError(format!(
                "cache directory {} not initialised",
                self.cache_dir.display()
            )));
        }
        let sym_dir = self.symbol_dir(symbol);
        if !sym_dir.is_dir() {
            fs::create_dir(&sym_dir)
                .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;
        }

        let path = self.entry_path(symbol, as_of);
        let tmp_path = path.with_extension("parquet.tmp");
        let mut df = points_to_dataframe(series.points())?;
        write_parquet(&mut df, &tmp_path)?;
        rename_into_place(&tmp_path, &path)?;

        let meta = CacheMeta {
            symbol: symbol.to_string(),
            as_of,
            point_count: series.len(),
            first_date: series.first_date(),
            last_date: series.last_date(),
            data_hash: content_hash(series.points())?,
            cached_at: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::CacheError(format!("meta serialization: {e}")))?;
        let meta_path = self.meta_path(symbol, as_of);
        let meta_tmp = meta_path.with_extension("json.tmp");
        fs::write(&meta_tmp, meta_json)
            .map_err(|e| DataError::CacheError(format!("meta write: {e}")))?;
        rename_into_place(&meta_tmp, &meta_path)?;

        tracing::debug!(symbol, %as_of, points = series.len(), "cached series");
        Ok(())
    }

    fn quarantine(&self, symbol: &str, as_of: NaiveDate) {
        let path = self.entry_path(symbol, as_of);
        let target = path.with_extension("parquet.quarantined");
        if let Err(e) = fs::rename(&path, &target) {
            tracing::warn!(path = %path.display(), error = %e, "failed to quarantine cache entry");
        }
        let _ = fs::remove_file(self.meta_path(symbol, as_of));
    }

    /// Metadata of every readable entry, sorted by symbol then as-of date.
    pub fn entries(&self) -> Vec<CacheMeta> {
        let Ok(dirs) = fs::read_dir(&self.cache_dir) else {
            return Vec::new();
        };

        let mut metas = Vec::new();
        for dir in dirs.flatten() {
            let name = dir.file_name().to_string_lossy().to_string();
            if !name.starts_with("symbol=") {
                continue;
            }
            let Ok(files) = fs::read_dir(dir.path()) else {
                continue;
            };
            for file in files.flatten() {
                let fname = file.file_name().to_string_lossy().to_string();
                if !fname.ends_with(".meta.json") {
                    continue;
                }
                match fs::read_to_string(file.path())
                    .ok()
                    .and_then(|s| serde_json::from_str::<CacheMeta>(&s).ok())
                {
                    Some(meta) => metas.push(meta),
                    None => tracing::warn!(path = %file.path().display(), "unreadable cache sidecar"),
                }
            }
        }

        metas.sort_by(|a, b| a.symbol.cmp(&b.symbol).then(a.as_of.cmp(&b.as_of)));
        metas
    }
}

fn rename_into_place(tmp: &Path, dest: &Path) -> Result<(), DataError> {
    fs::rename(tmp, dest).map_err(|e| {
        let _ = fs::remove_file(tmp);
        DataError::CacheError(format!("atomic rename failed: {e}"))
    })
}

/// BLAKE3 over the canonical JSON encoding of the points.
fn content_hash(points: &[PricePoint]) -> Result<String, DataError> {
    let bytes = serde_json::to_vec(points)
        .map_err(|e| DataError::CacheError(format!("hash serialization: {e}")))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn epoch() -> NaiveDate {
    // NaiveDate's default is 1970-01-01.
    NaiveDate::default()
}

fn points_to_dataframe(points: &[PricePoint]) -> Result<DataFrame, DataError> {
    let epoch = epoch();
    let dates: Vec<i32> = points
        .iter()
        .map(|p| (p.date - epoch).num_days() as i32)
        .collect();
    let highs: Vec<f64> = points.iter().map(|p| p.high).collect();
    let lows: Vec<f64> = points.iter().map(|p| p.low).collect();
    let closes: Vec<f64> = points.iter().map(|p| p.close).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))?,
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
    ])
    .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(df)
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

fn read_parquet(path: &Path) -> Result<Vec<PricePoint>, DataError> {
    let corrupt = |what: &str, e: PolarsError| DataError::CacheCorrupt(format!("{what}: {e}"));

    let file = fs::File::open(path).map_err(|e| DataError::CacheError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| corrupt("read", e))?;

    let date_ca = df
        .column("date")
        .and_then(|c| c.date())
        .map_err(|e| corrupt("date column", e))?;
    let high_ca = df
        .column("high")
        .and_then(|c| c.f64())
        .map_err(|e| corrupt("high column", e))?;
    let low_ca = df
        .column("low")
        .and_then(|c| c.f64())
        .map_err(|e| corrupt("low column", e))?;
    let close_ca = df
        .column("close")
        .and_then(|c| c.f64())
        .map_err(|e| corrupt("close column", e))?;

    let epoch = epoch();
    let mut points = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let row = (
            date_ca.get(i),
            high_ca.get(i),
            low_ca.get(i),
            close_ca.get(i),
        );
        let (Some(days), Some(high), Some(low), Some(close)) = row else {
            return Err(DataError::CacheCorrupt(format!("null value at row {i}")));
        };
        points.push(PricePoint {
            date: epoch + chrono::Duration::days(days as i64),
            high,
            low,
            close,
        });
    }

    Ok(points)
}
