//! Watchlist: named groups of symbols (typically industries) for batch runs.
//!
//! Stored as TOML, one array per group:
//!
//! ```toml
//! [groups]
//! banks = ["600036", "601398", "000001"]
//! utilities = ["600900", "600795"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::config::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Watchlist {
    pub groups: BTreeMap<String, Vec<String>>,
}

impl Watchlist {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml()?).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn group_names(&self) -> Vec<&str> {
        self.groups.keys().map(|s| s.as_str()).collect()
    }

    pub fn group(&self, name: &str) -> Option<&[String]> {
        self.groups.get(name).map(|v| v.as_slice())
    }

    /// Every symbol once, in group order then listing order.
    pub fn all_symbols(&self) -> Vec<&str> {
        dedup(self.groups.values().flatten().map(|s| s.as_str()))
    }

    /// Symbols of the named groups, each once. Unknown group names are an
    /// error.
    pub fn select(&self, names: &[String]) -> Result<Vec<&str>, ConfigError> {
        let mut picked = Vec::new();
        for name in names {
            let group = self.group(name).ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "unknown watchlist group '{name}' (known: {})",
                    self.group_names().join(", ")
                ))
            })?;
            picked.extend(group.iter().map(|s| s.as_str()));
        }
        Ok(dedup(picked))
    }

    pub fn symbol_count(&self) -> usize {
        self.all_symbols().len()
    }

    /// The A-share dividend payers the batch industry analysis covers.
    pub fn default_batch() -> Self {
        let symbols = [
            "601919", "601717", "000651", "600096", "600546", "601225", "688516", "600502",
            "601166", "601001", "600188", "601598", "600985", "601857", "000001", "600008",
            "300441", "600582", "601336", "600036", "002532", "601998", "600015", "601818",
            "601328", "601898", "601318", "600970", "000933", "000685", "600016", "601658",
            "601939", "002839", "600741", "601288", "601668", "601398", "600820", "601988",
            "600795", "600938", "600219", "002128", "605090", "002788", "603368", "002478",
            "600704", "300761", "000543", "601156", "600000", "600998", "600064", "600888",
            "603619", "600035", "002714", "600531", "000498", "601186", "600018", "002001",
            "601601", "600248", "600483", "601518", "603357", "002061", "600269",
        ];
        let mut groups = BTreeMap::new();
        groups.insert(
            "batch".to_string(),
            symbols.iter().map(|s| s.to_string()).collect(),
        );
        Self { groups }
    }
}

fn dedup<'a>(symbols: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = BTreeSet::new();
    symbols.into_iter().filter(|s| seen.insert(*s)).collect()
}
