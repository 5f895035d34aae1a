//! Single-currency balance

use super::currency::normalize_code;
use super::error::{LedgerError, LedgerResult};
use serde::{Deserialize, Serialize};

pub(crate) fn validate_amount(amount: f64) -> LedgerResult<()> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(LedgerError::InvalidAmount(amount))
    }
}

/// Balance held in one currency. The balance never goes below zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WalletRecord")]
pub struct Wallet {
    currency_code: String,
    balance: f64,
}

#[derive(Deserialize)]
struct WalletRecord {
    currency_code: String,
    #[serde(default)]
    balance: f64,
}

impl TryFrom<WalletRecord> for Wallet {
    type Error = LedgerError;

    fn try_from(record: WalletRecord) -> Result<Self, Self::Error> {
        Wallet::with_balance(&record.currency_code, record.balance)
    }
}

impl Wallet {
    pub fn new(currency_code: &str) -> LedgerResult<Self> {
        Self::with_balance(currency_code, 0.0)
    }

    pub fn with_balance(currency_code: &str, balance: f64) -> LedgerResult<Self> {
        let currency_code = normalize_code(currency_code)?;
        if !balance.is_finite() || balance < 0.0 {
            return Err(LedgerError::InvalidAmount(balance));
        }
        Ok(Self {
            currency_code,
            balance,
        })
    }

    pub fn currency_code(&self) -> &str {
        &self.currency_code
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn deposit(&mut self, amount: f64) -> LedgerResult<()> {
        validate_amount(amount)?;
        self.balance += amount;
        Ok(())
    }

    pub fn withdraw(&mut self, amount: f64) -> LedgerResult<()> {
        validate_amount(amount)?;
        if amount > self.balance {
            return Err(LedgerError::InsufficientFunds {
                code: self.currency_code.clone(),
                available: self.balance,
                required: amount,
            });
        }
        // Clamp float residue so a full withdrawal never leaves -0.0000001.
        self.balance = (self.balance - amount).max(0.0);
        Ok(())
    }
}
