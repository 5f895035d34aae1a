//! Rate source abstractions

use super::error::LedgerResult;
use super::rates::RateEntry;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

/// The external price APIs a refresh can query, in merge order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum SourceKind {
    CoinGecko,
    ExchangeRate,
}

impl Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                SourceKind::CoinGecko => "coingecko",
                SourceKind::ExchangeRate => "exchangerate",
            }
        )
    }
}

impl FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "coingecko" => Ok(SourceKind::CoinGecko),
            "exchangerate" => Ok(SourceKind::ExchangeRate),
            _ => Err(anyhow::anyhow!(
                "Invalid source: {} (expected coingecko or exchangerate)",
                s
            )),
        }
    }
}

/// A provider of exchange rates keyed by pair (`"BTC_USD"`).
#[async_trait]
pub trait RateSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Tag stored in each entry's `source` field.
    fn name(&self) -> &str;

    async fn fetch_rates(&self) -> LedgerResult<BTreeMap<String, RateEntry>>;
}
