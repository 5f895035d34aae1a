pub mod cli;
pub mod core;
pub mod providers;
pub mod store;
pub mod updater;

use crate::core::config::AppConfig;
use crate::core::source::SourceKind;
use crate::core::usecases::{Ledger, LedgerSettings};
use crate::store::{JsonFileStore, LedgerStore};
use anyhow::Result;
use tracing::debug;

/// A command after argument parsing, independent of clap.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Register {
        username: String,
        password: String,
    },
    Login {
        username: String,
        password: String,
    },
    Logout,
    Whoami,
    ChangePassword {
        old_password: String,
        new_password: String,
    },
    Deposit {
        currency: String,
        amount: f64,
    },
    Portfolio {
        base: Option<String>,
    },
    Buy {
        currency: String,
        amount: f64,
    },
    Sell {
        currency: String,
        amount: f64,
    },
    Rate {
        from: String,
        to: String,
    },
    Update {
        source: Option<SourceKind>,
    },
    Schedule {
        interval_secs: Option<u64>,
        runs: Option<usize>,
    },
    Show {
        currency: Option<String>,
    },
    List,
}

/// How a command ended. `Failure` means a domain error was already shown to
/// the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Success,
    Failure,
}

/// Loads config, opens the JSON store under the data dir and runs `command`
/// with the persisted session.
pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<CommandStatus> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let data_path = config.data_path()?;
    debug!("Using data directory {}", data_path.display());

    let ledger = Ledger::new(
        JsonFileStore::new(&data_path),
        LedgerSettings::from_config(&config)?,
    );
    let session = ledger.store().load_session()?;

    let ctx = cli::Context {
        config: &config,
        ledger: &ledger,
        session,
    };
    cli::dispatch(command, ctx).await
}
