use super::LedgerStore;
use crate::core::portfolio::Portfolio;
use crate::core::rates::{RateRecord, RatesSnapshot};
use crate::core::session::Session;
use crate::core::user::User;
use anyhow::{Context, Result};
use serde::{Serialize, de::DeserializeOwned};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

pub const USERS_FILE: &str = "users.json";
pub const PORTFOLIOS_FILE: &str = "portfolios.json";
pub const RATES_FILE: &str = "rates.json";
pub const HISTORY_FILE: &str = "exchange_rates.json";
pub const SESSION_FILE: &str = "session.json";

/// JSON files in one data directory.
///
/// Each save rewrites a whole file through a temporary file and a rename, so a
/// crash never leaves a half-written collection behind. There is no locking:
/// the store assumes a single writer, and two processes mutating the same
/// collection lose updates (last writer wins).
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// Missing, empty or malformed files read as `T::default()`.
    fn read_json<T: DeserializeOwned + Default>(&self, file: &str) -> Result<T> {
        let path = self.path(file);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} does not exist yet", path.display());
                return Ok(T::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        if content.trim().is_empty() {
            return Ok(T::default());
        }

        match serde_json::from_str(&content) {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(
                    error = %e,
                    file = %path.display(),
                    "Malformed data file, treating as empty; it will be rewritten on next save"
                );
                Ok(T::default())
            }
        }
    }

    fn write_json<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create directory: {}", self.dir.display()))?;
        let path = self.path(file);

        let mut tmp = NamedTempFile::new_in(&self.dir)
            .with_context(|| format!("Failed to create temp file in {}", self.dir.display()))?;
        serde_json::to_writer_pretty(&mut tmp, value)
            .with_context(|| format!("Failed to serialize {file}"))?;
        tmp.write_all(b"\n")?;
        tmp.persist(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("Wrote {}", path.display());
        Ok(())
    }
}

impl LedgerStore for JsonFileStore {
    fn load_users(&self) -> Result<Vec<User>> {
        self.read_json(USERS_FILE)
    }

    fn save_users(&self, users: &[User]) -> Result<()> {
        self.write_json(USERS_FILE, users)
    }

    fn load_portfolios(&self) -> Result<Vec<Portfolio>> {
        self.read_json(PORTFOLIOS_FILE)
    }

    fn save_portfolios(&self, portfolios: &[Portfolio]) -> Result<()> {
        self.write_json(PORTFOLIOS_FILE, portfolios)
    }

    fn load_rates(&self) -> Result<RatesSnapshot> {
        self.read_json(RATES_FILE)
    }

    fn save_rates(&self, rates: &RatesSnapshot) -> Result<()> {
        self.write_json(RATES_FILE, rates)
    }

    fn append_history(&self, records: &[RateRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut history = self.load_history()?;
        history.extend_from_slice(records);
        self.write_json(HISTORY_FILE, &history)
    }

    fn load_history(&self) -> Result<Vec<RateRecord>> {
        self.read_json(HISTORY_FILE)
    }

    fn load_session(&self) -> Result<Option<Session>> {
        self.read_json(SESSION_FILE)
    }

    fn save_session(&self, session: &Session) -> Result<()> {
        self.write_json(SESSION_FILE, session)
    }

    fn clear_session(&self) -> Result<()> {
        let path = self.path(SESSION_FILE);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }
}
