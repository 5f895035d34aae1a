use super::LedgerStore;
use crate::core::portfolio::Portfolio;
use crate::core::rates::{RateRecord, RatesSnapshot};
use crate::core::session::Session;
use crate::core::user::User;
use anyhow::{Result, anyhow};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

#[derive(Default)]
struct MemoryState {
    users: Vec<User>,
    portfolios: Vec<Portfolio>,
    rates: RatesSnapshot,
    history: Vec<RateRecord>,
    session: Option<Session>,
}

/// In-memory store, used where nothing should touch the filesystem
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with cached rates.
    pub fn with_rates(rates: RatesSnapshot) -> Self {
        let store = Self::new();
        if let Ok(mut state) = store.inner.lock() {
            state.rates = rates;
        }
        store
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("Memory store lock poisoned"))
    }
}

impl LedgerStore for MemoryStore {
    fn load_users(&self) -> Result<Vec<User>> {
        Ok(self.state()?.users.clone())
    }

    fn save_users(&self, users: &[User]) -> Result<()> {
        debug!("Memory PUT users ({})", users.len());
        self.state()?.users = users.to_vec();
        Ok(())
    }

    fn load_portfolios(&self) -> Result<Vec<Portfolio>> {
        Ok(self.state()?.portfolios.clone())
    }

    fn save_portfolios(&self, portfolios: &[Portfolio]) -> Result<()> {
        debug!("Memory PUT portfolios ({})", portfolios.len());
        self.state()?.portfolios = portfolios.to_vec();
        Ok(())
    }

    fn load_rates(&self) -> Result<RatesSnapshot> {
        Ok(self.state()?.rates.clone())
    }

    fn save_rates(&self, rates: &RatesSnapshot) -> Result<()> {
        self.state()?.rates = rates.clone();
        Ok(())
    }

    fn append_history(&self, records: &[RateRecord]) -> Result<()> {
        self.state()?.history.extend_from_slice(records);
        Ok(())
    }

    fn load_history(&self) -> Result<Vec<RateRecord>> {
        Ok(self.state()?.history.clone())
    }

    fn load_session(&self) -> Result<Option<Session>> {
        Ok(self.state()?.session.clone())
    }

    fn save_session(&self, session: &Session) -> Result<()> {
        self.state()?.session = Some(session.clone());
        Ok(())
    }

    fn clear_session(&self) -> Result<()> {
        self.state()?.session = None;
        Ok(())
    }
}
