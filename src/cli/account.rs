use super::ui::{StyleType, style_text};
use super::{Context, report};
use crate::CommandStatus;
use crate::core::session::Session;
use crate::store::LedgerStore;
use anyhow::Result;

pub fn register<S: LedgerStore>(ctx: &Context<'_, S>, username: &str, password: &str) -> Result<CommandStatus> {
    report(ctx.ledger.register(username, password), |user| {
        println!(
            "{}",
            style_text(
                &format!(
                    "User '{}' registered (id={}).",
                    user.username(),
                    user.user_id()
                ),
                StyleType::Success
            )
        );
        println!("Log in with: login --username {} --password ****", user.username());
    })
}

pub fn login<S: LedgerStore>(ctx: &Context<'_, S>, username: &str, password: &str) -> Result<CommandStatus> {
    let result = ctx.ledger.login(username, password).and_then(|user| {
        let session = Session::for_user(&user);
        ctx.ledger.store().save_session(&session)?;
        Ok(session)
    });
    report(result, |session| {
        println!(
            "{}",
            style_text(
                &format!("Logged in as '{}'.", session.username),
                StyleType::Success
            )
        );
    })
}

pub fn logout<S: LedgerStore>(ctx: &Context<'_, S>) -> Result<CommandStatus> {
    match &ctx.session {
        Some(session) => {
            ctx.ledger.store().clear_session()?;
            tracing::info!(action = "logout", user_id = session.user_id, "Session cleared");
            println!("Logged out '{}'.", session.username);
        }
        None => println!("{}", style_text("No active session.", StyleType::Subtle)),
    }
    Ok(CommandStatus::Success)
}

pub fn whoami<S: LedgerStore>(ctx: &Context<'_, S>) -> Result<CommandStatus> {
    let result = ctx
        .require_session()
        .and_then(|session| Ok((session, ctx.ledger.user(session.user_id)?)));
    report(result, |(session, user)| {
        println!(
            "{} (id={}), registered {}, logged in since {}",
            style_text(user.username(), StyleType::TotalLabel),
            user.user_id(),
            user.registration_date().format("%Y-%m-%d %H:%M:%S UTC"),
            session.logged_in_at.format("%Y-%m-%d %H:%M:%S UTC"),
        );
    })
}

pub fn change_password<S: LedgerStore>(
    ctx: &Context<'_, S>,
    old_password: &str,
    new_password: &str,
) -> Result<CommandStatus> {
    let result = ctx.require_session().and_then(|session| {
        ctx.ledger
            .change_password(session.user_id, old_password, new_password)
    });
    report(result, |()| {
        println!("{}", style_text("Password changed.", StyleType::Success));
    })
}
