pub mod account;
pub mod portfolio;
pub mod rates;
pub mod setup;
pub mod trade;
pub mod ui;

use crate::core::config::AppConfig;
use crate::core::error::{LedgerError, LedgerResult};
use crate::core::session::Session;
use crate::core::usecases::Ledger;
use crate::store::LedgerStore;
use crate::{AppCommand, CommandStatus};
use anyhow::Result;

/// Everything a command handler needs: loaded config, the ledger and the
/// current session, if any.
pub struct Context<'a, S: LedgerStore> {
    pub config: &'a AppConfig,
    pub ledger: &'a Ledger<S>,
    pub session: Option<Session>,
}

impl<S: LedgerStore> Context<'_, S> {
    pub fn require_session(&self) -> LedgerResult<&Session> {
        self.session.as_ref().ok_or(LedgerError::NotLoggedIn)
    }
}

/// Prints `result` and maps it to a status. Recoverable ledger errors are
/// shown to the user; storage failures propagate.
pub(crate) fn report<T>(result: LedgerResult<T>, on_success: impl FnOnce(T)) -> Result<CommandStatus> {
    match result {
        Ok(value) => {
            on_success(value);
            Ok(CommandStatus::Success)
        }
        Err(e) if e.is_recoverable() => {
            eprintln!("{}", ui::style_text(&format!("Error: {e}"), ui::StyleType::Error));
            Ok(CommandStatus::Failure)
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn dispatch<S: LedgerStore>(command: AppCommand, ctx: Context<'_, S>) -> Result<CommandStatus> {
    match command {
        AppCommand::Register { username, password } => account::register(&ctx, &username, &password),
        AppCommand::Login { username, password } => account::login(&ctx, &username, &password),
        AppCommand::Logout => account::logout(&ctx),
        AppCommand::Whoami => account::whoami(&ctx),
        AppCommand::ChangePassword {
            old_password,
            new_password,
        } => account::change_password(&ctx, &old_password, &new_password),
        AppCommand::Deposit { currency, amount } => trade::deposit(&ctx, &currency, amount),
        AppCommand::Buy { currency, amount } => trade::buy(&ctx, &currency, amount),
        AppCommand::Sell { currency, amount } => trade::sell(&ctx, &currency, amount),
        AppCommand::Portfolio { base } => portfolio::run(&ctx, base.as_deref()),
        AppCommand::Rate { from, to } => rates::rate(&ctx, &from, &to),
        AppCommand::Update { source } => rates::update(&ctx, source).await,
        AppCommand::Schedule {
            interval_secs,
            runs,
        } => rates::schedule(&ctx, interval_secs, runs).await,
        AppCommand::Show { currency } => rates::show(&ctx, currency.as_deref()),
        AppCommand::List => rates::list(&ctx),
    }
}
