//! Per-user collection of wallets and its valuation
use super::currency::normalize_code;
use super::error::{LedgerError, LedgerResult};
use super::rates::RatesSnapshot;
use super::wallet::{Wallet, validate_amount};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PortfolioRecord")]
pub struct Portfolio {
    user_id: u64,
    wallets: BTreeMap<String, Wallet>,
}

#[derive(Deserialize)]
struct PortfolioRecord {
    user_id: u64,
    #[serde(default)]
    wallets: BTreeMap<String, Wallet>,
}

/// Wallets are keyed by their normalized code whatever key the file used, so
/// `"usd"` and `"USD"` cannot coexist.
impl TryFrom<PortfolioRecord> for Portfolio {
    type Error = LedgerError;

    fn try_from(record: PortfolioRecord) -> Result<Self, Self::Error> {
        let mut wallets = BTreeMap::new();
        for wallet in record.wallets.into_values() {
            match wallets.entry(wallet.currency_code().to_string()) {
                Entry::Occupied(entry) => {
                    return Err(LedgerError::DuplicateWallet(entry.key().clone()));
                }
                Entry::Vacant(entry) => {
                    entry.insert(wallet);
                }
            }
        }
        Ok(Self {
            user_id: record.user_id,
            wallets,
        })
    }
}

/// A wallet's contribution to a valuation.
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub currency_code: String,
    pub balance: f64,
    pub rate: f64,
    pub converted_value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    MissingRate,
    StaleRate { age_secs: i64 },
}

/// A wallet that could not be converted into the base currency.
#[derive(Debug, Clone, PartialEq)]
pub struct Unconverted {
    pub currency_code: String,
    pub balance: f64,
    pub reason: SkipReason,
}

/// Portfolio value in one base currency. Wallets without a fresh rate are
/// excluded from `total` and listed in `unconverted`.
#[derive(Debug, Clone, PartialEq)]
pub struct Valuation {
    pub user_id: u64,
    pub base_currency: String,
    pub holdings: Vec<Holding>,
    pub unconverted: Vec<Unconverted>,
    pub total: f64,
}

impl Valuation {
    pub fn is_complete(&self) -> bool {
        self.unconverted.is_empty()
    }
}

impl Portfolio {
    pub fn new(user_id: u64) -> Self {
        Self {
            user_id,
            wallets: BTreeMap::new(),
        }
    }

    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    pub fn wallets(&self) -> impl Iterator<Item = &Wallet> {
        self.wallets.values()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    pub fn get_wallet(&self, currency_code: &str) -> Option<&Wallet> {
        self.wallets.get(&currency_code.trim().to_uppercase())
    }

    /// Returns the wallet for `currency_code`, creating an empty one first.
    pub fn add_currency(&mut self, currency_code: &str) -> LedgerResult<&mut Wallet> {
        let code = normalize_code(currency_code)?;
        let wallet = match self.wallets.entry(code) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                debug!(user_id = self.user_id, currency = %entry.key(), "Creating wallet");
                let wallet = Wallet::new(entry.key())?;
                entry.insert(wallet)
            }
        };
        Ok(wallet)
    }

    pub fn deposit(&mut self, currency_code: &str, amount: f64) -> LedgerResult<&Wallet> {
        validate_amount(amount)?;
        let wallet = self.add_currency(currency_code)?;
        wallet.deposit(amount)?;
        Ok(wallet)
    }

    /// Fails without creating a wallet when none exists for `currency_code`.
    pub fn withdraw(&mut self, currency_code: &str, amount: f64) -> LedgerResult<&Wallet> {
        let code = normalize_code(currency_code)?;
        let wallet = self
            .wallets
            .get_mut(&code)
            .ok_or(LedgerError::WalletNotFound(code))?;
        wallet.withdraw(amount)?;
        Ok(wallet)
    }

    pub fn total_value(
        &self,
        base_currency: &str,
        rates: &RatesSnapshot,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Valuation {
        let base = base_currency.to_uppercase();
        let mut valuation = Valuation {
            user_id: self.user_id,
            base_currency: base.clone(),
            holdings: Vec::new(),
            unconverted: Vec::new(),
            total: 0.0,
        };

        for wallet in self.wallets.values() {
            let code = wallet.currency_code();
            let resolved = if code == base {
                Some(1.0)
            } else {
                match rates.lookup(code, &base) {
                    Some(r) if r.is_fresh(ttl, now) => Some(r.rate),
                    Some(r) => {
                        valuation.unconverted.push(Unconverted {
                            currency_code: code.to_string(),
                            balance: wallet.balance(),
                            reason: SkipReason::StaleRate {
                                age_secs: (now - r.updated_at).num_seconds(),
                            },
                        });
                        None
                    }
                    None => {
                        valuation.unconverted.push(Unconverted {
                            currency_code: code.to_string(),
                            balance: wallet.balance(),
                            reason: SkipReason::MissingRate,
                        });
                        None
                    }
                }
            };

            if let Some(rate) = resolved {
                let converted_value = wallet.balance() * rate;
                valuation.total += converted_value;
                valuation.holdings.push(Holding {
                    currency_code: code.to_string(),
                    balance: wallet.balance(),
                    rate,
                    converted_value,
                });
            }
        }

        valuation
    }
}
