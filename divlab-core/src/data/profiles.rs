//! Company name and industry lookup for a list of codes.

use super::provider::{DataError, ProfileSource};
use super::retry::RetryPolicy;
use super::session::SessionGuard;
use crate::domain::StockProfile;
use serde::Serialize;
use std::sync::Arc;

/// Profiles in request order, plus the codes that could not be resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Profiles {
    pub profiles: Vec<StockProfile>,
    /// Codes the source does not list, or whose lookup failed.
    pub missing: Vec<String>,
}

pub struct ProfileLookup {
    source: Arc<dyn ProfileSource>,
    retry: RetryPolicy,
}

impl ProfileLookup {
    pub fn new(source: Arc<dyn ProfileSource>) -> Self {
        Self {
            source,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Resolve every code under one session.
    ///
    /// A code that fails or is not listed goes to `missing`; only a failed
    /// login is an error.
    pub fn lookup<S: AsRef<str>>(&self, symbols: &[S]) -> Result<Profiles, DataError> {
        let source = self.source.as_ref();
        let _session = SessionGuard::acquire(source, source.name())?;

        let mut out = Profiles::default();
        for symbol in symbols {
            let symbol = symbol.as_ref();
            match self
                .retry
                .run(&format!("stock_profile {symbol}"), |_| source.stock_profile(symbol))
            {
                Ok(Some(profile)) => out.profiles.push(profile),
                Ok(None) => {
                    tracing::warn!(symbol, source = source.name(), "no profile listed");
                    out.missing.push(symbol.to_string());
                }
                Err(e) => {
                    tracing::warn!(symbol, error = %e, "profile lookup failed");
                    out.missing.push(symbol.to_string());
                }
            }
        }

        tracing::info!(
            source = source.name(),
            resolved = out.profiles.len(),
            missing = out.missing.len(),
            "resolved stock profiles"
        );
        Ok(out)
    }
}
