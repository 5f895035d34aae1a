//! Registry of supported currencies

use super::error::{LedgerError, LedgerResult};
use serde::Serialize;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AssetClass {
    Fiat,
    Crypto,
}

impl Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                AssetClass::Fiat => "fiat",
                AssetClass::Crypto => "crypto",
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Currency {
    pub code: &'static str,
    pub name: &'static str,
    pub class: AssetClass,
    /// Coin id used by CoinGecko's simple price endpoint
    pub coingecko_id: Option<&'static str>,
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {} ({})", self.code, self.name, self.class)
    }
}

pub const CURRENCIES: &[Currency] = &[
    Currency {
        code: "USD",
        name: "US Dollar",
        class: AssetClass::Fiat,
        coingecko_id: None,
    },
    Currency {
        code: "EUR",
        name: "Euro",
        class: AssetClass::Fiat,
        coingecko_id: None,
    },
    Currency {
        code: "GBP",
        name: "British Pound",
        class: AssetClass::Fiat,
        coingecko_id: None,
    },
    Currency {
        code: "RUB",
        name: "Russian Ruble",
        class: AssetClass::Fiat,
        coingecko_id: None,
    },
    Currency {
        code: "BTC",
        name: "Bitcoin",
        class: AssetClass::Crypto,
        coingecko_id: Some("bitcoin"),
    },
    Currency {
        code: "ETH",
        name: "Ethereum",
        class: AssetClass::Crypto,
        coingecko_id: Some("ethereum"),
    },
    Currency {
        code: "SOL",
        name: "Solana",
        class: AssetClass::Crypto,
        coingecko_id: Some("solana"),
    },
];

/// Looks up a currency by code, ignoring case and surrounding whitespace.
pub fn get_currency(code: &str) -> LedgerResult<&'static Currency> {
    let code = code.trim().to_uppercase();
    CURRENCIES
        .iter()
        .find(|c| c.code == code)
        .ok_or(LedgerError::CurrencyNotFound(code))
}

/// Returns the canonical upper-case code for a supported currency.
pub fn normalize_code(code: &str) -> LedgerResult<String> {
    get_currency(code).map(|c| c.code.to_string())
}

pub fn currencies_of(class: AssetClass) -> impl Iterator<Item = &'static Currency> {
    CURRENCIES.iter().filter(move |c| c.class == class)
}

pub fn format_amount(amount: f64, code: &str) -> String {
    match get_currency(code).map(|c| c.class) {
        Ok(AssetClass::Crypto) => format!("{amount:.8}"),
        _ => format!("{amount:.2}"),
    }
}
