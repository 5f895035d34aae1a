//! Core ledger domain: currencies, wallets, portfolios, rates and use cases

pub mod config;
pub mod currency;
pub mod error;
pub mod log;
pub mod portfolio;
pub mod rates;
pub mod session;
pub mod source;
pub mod timestamp;
pub mod usecases;
pub mod user;
pub mod wallet;

// Re-export main types for cleaner imports
pub use error::{LedgerError, LedgerResult};
pub use portfolio::{Portfolio, Valuation};
pub use rates::{RateEntry, RatesSnapshot};
pub use session::Session;
pub use source::{RateSource, SourceKind};
pub use usecases::{Ledger, LedgerSettings};
pub use user::User;
pub use wallet::Wallet;
