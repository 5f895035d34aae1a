pub mod coingecko;
pub mod exchangerate;

use crate::core::config::AppConfig;
use crate::core::source::RateSource;
use anyhow::{Context, Result};
use coingecko::CoinGeckoSource;
use exchangerate::ExchangeRateSource;

/// Shared HTTP client with the configured request timeout.
pub fn build_client(config: &AppConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("valuta/", env!("CARGO_PKG_VERSION")))
        .timeout(config.request_timeout())
        .build()
        .context("Failed to build HTTP client")
}

/// All rate sources in merge order: CoinGecko first, ExchangeRate-API second.
pub fn default_sources(config: &AppConfig) -> Result<Vec<Box<dyn RateSource>>> {
    let client = build_client(config)?;
    let base = config.base_currency.to_uppercase();
    Ok(vec![
        Box::new(CoinGeckoSource::new(
            &config.providers.coingecko.base_url,
            &base,
            client.clone(),
        )),
        Box::new(ExchangeRateSource::new(
            &config.providers.exchangerate.base_url,
            config.providers.exchangerate.resolved_api_key(),
            &base,
            client,
        )),
    ])
}
