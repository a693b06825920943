//! Exchange-aware symbol codes.
//!
//! Six-digit mainland A-share codes are listed on Shanghai when they start
//! with `6` and on Shenzhen otherwise. Providers spell those listings
//! differently (`sh.600755` vs `600755.SS`), so sources ask this module for
//! their own spelling instead of string-munging at each call site.

use serde::{Deserialize, Serialize};

/// Listing venue inferred from a symbol code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Exchange {
    Shanghai,
    Shenzhen,
    /// Anything that is not a six-digit A-share code; used verbatim.
    Other,
}

/// A user-supplied symbol plus its inferred exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    code: String,
    exchange: Exchange,
}

impl Symbol {
    pub fn parse(raw: &str) -> Self {
        let code = raw.trim().to_string();
        let exchange = if code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit()) {
            if code.starts_with('6') {
                Exchange::Shanghai
            } else {
                Exchange::Shenzhen
            }
        } else {
            Exchange::Other
        };
        Self { code, exchange }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn exchange(&self) -> Exchange {
        self.exchange
    }

    /// baostock-style code, e.g. `sh.600755`.
    pub fn dotted_code(&self) -> String {
        match self.exchange {
            Exchange::Shanghai => format!("sh.{}", self.code),
            Exchange::Shenzhen => format!("sz.{}", self.code),
            Exchange::Other => self.code.clone(),
        }
    }

    /// Whether the code can name a single file without leaving its
    /// directory.
    pub fn is_file_safe(&self) -> bool {
        !self.code.is_empty()
            && self.code != "."
            && self.code != ".."
            && !self.code.chars().any(|c| matches!(c, '/' | '\\' | ':' | '\0'))
    }

    /// Yahoo Finance ticker, e.g. `600755.SS`.
    pub fn yahoo_ticker(&self) -> String {
        match self.exchange {
            Exchange::Shanghai => format!("{}.SS", self.code),
            Exchange::Shenzhen => format!("{}.SZ", self.code),
            Exchange::Other => self.code.clone(),
        }
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.code)
    }
}
