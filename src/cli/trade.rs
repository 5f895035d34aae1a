use super::ui::{StyleType, style_text};
use super::{Context, report};
use crate::CommandStatus;
use crate::core::currency::format_amount;
use crate::core::usecases::{TradeReceipt, TradeSide};
use crate::store::LedgerStore;
use anyhow::Result;

pub fn deposit<S: LedgerStore>(ctx: &Context<'_, S>, currency: &str, amount: f64) -> Result<CommandStatus> {
    let result = ctx
        .require_session()
        .and_then(|session| ctx.ledger.deposit(session.user_id, currency, amount));
    report(result, |wallet| {
        let code = wallet.currency_code();
        println!(
            "{}",
            style_text(
                &format!("Deposited {} {code}.", format_amount(amount, code)),
                StyleType::Success
            )
        );
        println!("Balance: {} {code}", format_amount(wallet.balance(), code));
    })
}

pub fn buy<S: LedgerStore>(ctx: &Context<'_, S>, currency: &str, amount: f64) -> Result<CommandStatus> {
    let result = ctx
        .require_session()
        .and_then(|session| ctx.ledger.buy(session.user_id, currency, amount));
    report(result, |receipt| print_receipt(&receipt))
}

pub fn sell<S: LedgerStore>(ctx: &Context<'_, S>, currency: &str, amount: f64) -> Result<CommandStatus> {
    let result = ctx
        .require_session()
        .and_then(|session| ctx.ledger.sell(session.user_id, currency, amount));
    report(result, |receipt| print_receipt(&receipt))
}

fn print_receipt(receipt: &TradeReceipt) {
    let code = &receipt.currency_code;
    let base = &receipt.base_currency;
    let (verb, direction) = match receipt.side {
        TradeSide::Buy => ("Bought", "Paid"),
        TradeSide::Sell => ("Sold", "Received"),
    };

    println!(
        "{}",
        style_text(
            &format!(
                "{verb} {} {code} at {} {base}/{code}.",
                format_amount(receipt.amount, code),
                receipt.rate
            ),
            StyleType::Success
        )
    );
    println!("{direction}: {} {base}", format_amount(receipt.base_amount, base));
    println!(
        "{code}: {} -> {}",
        format_amount(receipt.balance_before, code),
        format_amount(receipt.balance_after, code)
    );
    println!(
        "{base} balance: {}",
        format_amount(receipt.base_balance_after, base)
    );
}
