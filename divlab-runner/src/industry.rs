//! Industry classification report and industry-grouped watchlists.

use anyhow::{Context, Result};
use divlab_core::domain::StockProfile;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::watchlist::Watchlist;

pub const INDUSTRY_REPORT_FILE: &str = "stock_industry_analysis.csv";

pub fn write_industry_csv<W: Write>(writer: W, profiles: &[StockProfile]) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(["stock_code", "stock_name", "industry"])?;
    for p in profiles {
        out.write_record([p.code.as_str(), p.name.as_str(), p.industry_or_unknown()])?;
    }
    out.flush()?;
    Ok(())
}

/// Write `stock_industry_analysis.csv` under `output_dir`. Nothing is
/// written when no profile was resolved.
pub fn save_industry_report(
    output_dir: impl AsRef<Path>,
    profiles: &[StockProfile],
) -> Result<Option<PathBuf>> {
    if profiles.is_empty() {
        tracing::info!("no stock profiles resolved, industry report not written");
        return Ok(None);
    }

    let output_dir = output_dir.as_ref();
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;
    let path = output_dir.join(INDUSTRY_REPORT_FILE);
    let file = std::fs::File::create(&path)
        .with_context(|| format!("Failed to create report {}", path.display()))?;
    write_industry_csv(file, profiles)
        .with_context(|| format!("Failed to write report {}", path.display()))?;

    tracing::info!(profiles = profiles.len(), path = %path.display(), "saved industry report");
    Ok(Some(path))
}

/// One watchlist group per industry, codes in profile order. Unclassified
/// codes go to `unknown`.
pub fn industry_watchlist(profiles: &[StockProfile]) -> Watchlist {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for p in profiles {
        let codes = groups.entry(p.industry_or_unknown().to_string()).or_default();
        if !codes.contains(&p.code) {
            codes.push(p.code.clone());
        }
    }
    Watchlist { groups }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(code: &str, name: &str, industry: Option<&str>) -> StockProfile {
        StockProfile {
            code: code.into(),
            name: name.into(),
            industry: industry.map(String::from),
        }
    }

    fn sample() -> Vec<StockProfile> {
        vec![
            profile("601398", "工商银行", Some("J66货币金融服务")),
            profile("600900", "长江电力", Some("D44电力、热力生产和供应业")),
            profile("600036", "招商银行", Some("J66货币金融服务")),
            profile("000651", "格力电器", None),
        ]
    }

    #[test]
    fn groups_codes_by_industry() {
        let wl = industry_watchlist(&sample());
        assert_eq!(wl.group("J66货币金融服务").unwrap(), ["601398", "600036"]);
        assert_eq!(wl.group("unknown").unwrap(), ["000651"]);
        assert_eq!(wl.symbol_count(), 4);
    }

    #[test]
    fn report_lists_every_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_industry_report(dir.path(), &sample()).unwrap().unwrap();
        assert_eq!(path.file_name().unwrap(), INDUSTRY_REPORT_FILE);

        let csv = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], "stock_code,stock_name,industry");
        assert_eq!(lines[1], "601398,工商银行,J66货币金融服务");
        assert_eq!(lines[4], "000651,格力电器,unknown");
    }

    #[test]
    fn no_profiles_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(save_industry_report(dir.path().join("out"), &[]).unwrap(), None);
        assert!(!dir.path().join("out").exists());
    }
}
