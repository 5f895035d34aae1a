//! Error taxonomy for ledger operations

use thiserror::Error;

/// Every failure a use case can report back to the command layer.
///
/// Validation and domain failures are recoverable and end up printed as a
/// message. `Storage` wraps infrastructure failures the store could not heal.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("'amount' must be a positive number, got {0}")]
    InvalidAmount(f64),

    #[error("Unknown currency '{0}'")]
    CurrencyNotFound(String),

    #[error("Password must be at least {min} characters long")]
    PasswordTooShort { min: usize },

    #[error("Username must not be empty")]
    EmptyUsername,

    #[error("Cannot trade {0} against itself")]
    SameCurrency(String),

    #[error("Username '{0}' is already taken")]
    UsernameTaken(String),

    #[error("User '{0}' not found")]
    UserNotFound(String),

    #[error("Invalid password")]
    InvalidPassword,

    #[error("Portfolio for user id {0} not found")]
    PortfolioNotFound(u64),

    #[error("Duplicate {0} wallet in portfolio")]
    DuplicateWallet(String),

    #[error("No {0} wallet in portfolio")]
    WalletNotFound(String),

    #[error("Insufficient funds: available {available} {code}, required {required} {code}")]
    InsufficientFunds {
        code: String,
        available: f64,
        required: f64,
    },

    #[error("Rate {from}->{to} is not available, run 'update' first")]
    RateUnavailable { from: String, to: String },

    #[error("Rate {pair} is stale (updated {age_secs}s ago), run 'update' first")]
    RateStale { pair: String, age_secs: i64 },

    #[error("You must log in first")]
    NotLoggedIn,

    #[error("No rates could be fetched from any source")]
    NoRatesFetched,

    #[error("API request failed ({source_name}): {message}")]
    ApiRequest {
        source_name: String,
        message: String,
    },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl LedgerError {
    pub fn api(source_name: &str, message: impl Into<String>) -> Self {
        LedgerError::ApiRequest {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }

    /// True for failures caused by user input or ledger state rather than by
    /// the environment.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, LedgerError::Storage(_))
    }
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;
