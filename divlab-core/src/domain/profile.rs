//! Company name and industry classification of a listed code.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockProfile {
    /// Code as the caller asked for it, e.g. `600755`.
    pub code: String,
    pub name: String,
    /// `None` when the source lists the company without a classification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
}

impl StockProfile {
    /// Industry label, or `unknown`.
    pub fn industry_or_unknown(&self) -> &str {
        self.industry.as_deref().unwrap_or("unknown")
    }
}
