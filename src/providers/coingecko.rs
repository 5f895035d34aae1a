use crate::core::currency::{AssetClass, currencies_of};
use crate::core::error::{LedgerError, LedgerResult};
use crate::core::rates::{RateEntry, pair_key};
use crate::core::source::{RateSource, SourceKind};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, instrument};

pub const SOURCE_NAME: &str = "CoinGecko";

/// Crypto prices from CoinGecko's batched simple price endpoint.
pub struct CoinGeckoSource {
    base_url: String,
    vs_currency: String,
    client: reqwest::Client,
}

impl CoinGeckoSource {
    pub fn new(base_url: &str, vs_currency: &str, client: reqwest::Client) -> Self {
        CoinGeckoSource {
            base_url: base_url.trim_end_matches('/').to_string(),
            vs_currency: vs_currency.to_uppercase(),
            client,
        }
    }
}

// {"bitcoin": {"usd": 59337.21}, ...}
type SimplePriceResponse = HashMap<String, HashMap<String, f64>>;

#[async_trait]
impl RateSource for CoinGeckoSource {
    fn kind(&self) -> SourceKind {
        SourceKind::CoinGecko
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }

    #[instrument(name = "CoinGeckoFetch", skip(self), fields(vs = %self.vs_currency))]
    async fn fetch_rates(&self) -> LedgerResult<BTreeMap<String, RateEntry>> {
        let coins: Vec<(&str, &str)> = currencies_of(AssetClass::Crypto)
            .filter_map(|c| c.coingecko_id.map(|id| (c.code, id)))
            .collect();
        let ids = coins.iter().map(|(_, id)| *id).collect::<Vec<_>>().join(",");
        let vs = self.vs_currency.to_lowercase();

        let url = format!(
            "{}/simple/price?ids={}&vs_currencies={}",
            self.base_url, ids, vs
        );
        debug!("Requesting crypto prices from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LedgerError::api(SOURCE_NAME, format!("Request error: {e}")))?;

        if !response.status().is_success() {
            return Err(LedgerError::api(
                SOURCE_NAME,
                format!("HTTP error: {}", response.status()),
            ));
        }

        let text = response
            .text()
            .await
            .map_err(|e| LedgerError::api(SOURCE_NAME, format!("Failed to read body: {e}")))?;
        let data: SimplePriceResponse = serde_json::from_str(&text).map_err(|e| {
            LedgerError::api(SOURCE_NAME, format!("Failed to parse JSON response: {e}"))
        })?;

        let updated_at = Utc::now();
        let rates: BTreeMap<String, RateEntry> = coins
            .iter()
            .filter_map(|(code, id)| {
                let price = data.get(*id)?.get(&vs).copied()?;
                (price.is_finite() && price > 0.0).then(|| {
                    (
                        pair_key(code, &self.vs_currency),
                        RateEntry::new(price, updated_at, SOURCE_NAME),
                    )
                })
            })
            .collect();

        debug!("CoinGecko returned {} rates", rates.len());
        Ok(rates)
    }
}
