//! Persistence for users, portfolios, rates and the session
pub mod disk;
pub mod memory;

use crate::core::portfolio::Portfolio;
use crate::core::rates::{RateRecord, RatesSnapshot};
use crate::core::session::Session;
use crate::core::user::User;
use anyhow::Result;

pub use disk::JsonFileStore;
pub use memory::MemoryStore;

/// Whole-collection reads and writes. Every load returns the full collection
/// and every save replaces it.
///
/// Implementations heal unreadable data by returning an empty collection;
/// only failures to write are reported as errors.
pub trait LedgerStore: Send + Sync {
    fn load_users(&self) -> Result<Vec<User>>;
    fn save_users(&self, users: &[User]) -> Result<()>;

    fn load_portfolios(&self) -> Result<Vec<Portfolio>>;
    fn save_portfolios(&self, portfolios: &[Portfolio]) -> Result<()>;

    fn load_rates(&self) -> Result<RatesSnapshot>;
    fn save_rates(&self, rates: &RatesSnapshot) -> Result<()>;

    /// Appends to the rate history without rewriting existing rows' meaning.
    fn append_history(&self, records: &[RateRecord]) -> Result<()>;
    fn load_history(&self) -> Result<Vec<RateRecord>>;

    fn load_session(&self) -> Result<Option<Session>>;
    fn save_session(&self, session: &Session) -> Result<()>;
    fn clear_session(&self) -> Result<()>;
}
