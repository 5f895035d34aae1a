use crate::core::currency::{AssetClass, currencies_of};
use crate::core::error::{LedgerError, LedgerResult};
use crate::core::rates::{RateEntry, pair_key};
use crate::core::source::{RateSource, SourceKind};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, instrument};

pub const SOURCE_NAME: &str = "ExchangeRate-API";

/// Fiat rates from ExchangeRate-API's `latest` endpoint for one base currency.
pub struct ExchangeRateSource {
    base_url: String,
    api_key: Option<String>,
    base_currency: String,
    client: reqwest::Client,
}

impl ExchangeRateSource {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        base_currency: &str,
        client: reqwest::Client,
    ) -> Self {
        ExchangeRateSource {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            base_currency: base_currency.to_uppercase(),
            client,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LatestResponse {
    result: String,
    #[serde(rename = "error-type")]
    error_type: Option<String>,
    base_code: Option<String>,
    #[serde(default)]
    conversion_rates: HashMap<String, f64>,
}

#[async_trait]
impl RateSource for ExchangeRateSource {
    fn kind(&self) -> SourceKind {
        SourceKind::ExchangeRate
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }

    #[instrument(name = "ExchangeRateFetch", skip(self), fields(base = %self.base_currency))]
    async fn fetch_rates(&self) -> LedgerResult<BTreeMap<String, RateEntry>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LedgerError::api(SOURCE_NAME, "API key is not configured"))?;

        let url = format!("{}/{}/latest/{}", self.base_url, api_key, self.base_currency);
        debug!(
            "Requesting fiat rates from {}/<key>/latest/{}",
            self.base_url, self.base_currency
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            // reqwest errors carry the URL, which contains the key
            .map_err(|e| {
                LedgerError::api(SOURCE_NAME, format!("Request error: {}", e.without_url()))
            })?;

        if !response.status().is_success() {
            return Err(LedgerError::api(
                SOURCE_NAME,
                format!("HTTP error: {}", response.status()),
            ));
        }

        let text = response.text().await.map_err(|e| {
            LedgerError::api(SOURCE_NAME, format!("Failed to read body: {}", e.without_url()))
        })?;
        let data: LatestResponse = serde_json::from_str(&text).map_err(|e| {
            LedgerError::api(SOURCE_NAME, format!("Failed to parse JSON response: {e}"))
        })?;

        if data.result != "success" {
            return Err(LedgerError::api(
                SOURCE_NAME,
                format!(
                    "API returned an error: {}",
                    data.error_type.as_deref().unwrap_or("unknown")
                ),
            ));
        }

        let base = data
            .base_code
            .map(|b| b.to_uppercase())
            .unwrap_or_else(|| self.base_currency.clone());
        let updated_at = Utc::now();

        // conversion_rates[X] is X per one BASE; store "1 X in BASE".
        let rates: BTreeMap<String, RateEntry> = currencies_of(AssetClass::Fiat)
            .filter(|c| c.code != base)
            .filter_map(|c| {
                let per_base = data.conversion_rates.get(c.code).copied()?;
                (per_base.is_finite() && per_base > 0.0).then(|| {
                    (
                        pair_key(c.code, &base),
                        RateEntry::new(1.0 / per_base, updated_at, SOURCE_NAME),
                    )
                })
            })
            .collect();

        debug!("ExchangeRate-API returned {} rates", rates.len());
        Ok(rates)
    }
}
