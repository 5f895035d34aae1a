use super::ui;
use super::{Context, report};
use crate::CommandStatus;
use crate::core::source::SourceKind;
use crate::store::LedgerStore;
use crate::updater::{RatesUpdater, SourceOutcome};
use anyhow::Result;
use chrono::Utc;
use comfy_table::Cell;
use std::time::Duration;

pub fn rate<S: LedgerStore>(ctx: &Context<'_, S>, from: &str, to: &str) -> Result<CommandStatus> {
    report(ctx.ledger.get_rate(from, to), |quote| {
        let via = if quote.inverted { ", inverted" } else { "" };
        println!(
            "{}",
            ui::style_text(
                &format!("1 {} = {} {}", quote.from, quote.rate, quote.to),
                ui::StyleType::TotalValue
            )
        );
        if quote.rate > 0.0 {
            println!("1 {} = {} {}", quote.to, 1.0 / quote.rate, quote.from);
        }
        println!(
            "{}",
            ui::style_text(
                &format!(
                    "source {}{via}, updated {}",
                    quote.source,
                    quote.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
                ),
                ui::StyleType::Subtle
            )
        );
        if !quote.fresh {
            println!(
                "{}",
                ui::style_text("Rate is stale. Run `update` to refresh.", ui::StyleType::Warning)
            );
        }
    })
}

fn describe_outcome(outcome: &SourceOutcome) -> String {
    match &outcome.result {
        Ok(count) => ui::style_text(
            &format!("{}: {count} rates", outcome.name),
            ui::StyleType::Success,
        ),
        Err(e) => ui::style_text(&format!("{}: {e}", outcome.name), ui::StyleType::Error),
    }
}

pub async fn update<S: LedgerStore>(ctx: &Context<'_, S>, source: Option<SourceKind>) -> Result<CommandStatus> {
    let updater = RatesUpdater::from_config(ctx.config)?;

    let pb = ui::new_progress_bar(updater.selected_count(source) as u64);
    pb.set_message("Fetching rates...");
    let on_source_done = |outcome: &SourceOutcome| {
        pb.println(describe_outcome(outcome));
        pb.inc(1);
    };

    let result = updater
        .run_update(ctx.ledger.store(), source, &on_source_done)
        .await;
    pb.finish_and_clear();

    report(result, |refresh| {
        println!(
            "{}",
            ui::style_text(
                &format!(
                    "Updated {} rates at {}.",
                    refresh.total,
                    refresh.last_refresh.format("%Y-%m-%d %H:%M:%S UTC")
                ),
                ui::StyleType::Success
            )
        );
        if !refresh.history_saved {
            println!(
                "{}",
                ui::style_text("Rate history could not be written.", ui::StyleType::Warning)
            );
        }
    })
}

pub async fn schedule<S: LedgerStore>(
    ctx: &Context<'_, S>,
    interval_secs: Option<u64>,
    runs: Option<usize>,
) -> Result<CommandStatus> {
    let interval = interval_secs.map_or_else(|| ctx.config.update_interval(), Duration::from_secs);
    let updater = RatesUpdater::from_config(ctx.config)?;

    println!(
        "Refreshing rates every {}s{}. Press Ctrl-C to stop.",
        interval.as_secs(),
        runs.map(|n| format!(" for {n} runs")).unwrap_or_default()
    );
    let completed = updater
        .run_scheduler(ctx.ledger.store(), interval, runs)
        .await;
    println!("Scheduler stopped after {completed} runs.");
    Ok(CommandStatus::Success)
}

pub fn show<S: LedgerStore>(ctx: &Context<'_, S>, currency: Option<&str>) -> Result<CommandStatus> {
    let result = ctx
        .ledger
        .rates(currency)
        .and_then(|rates| Ok((rates, ctx.ledger.last_refresh()?)));
    report(result, |(rates, last_refresh)| {
        if rates.is_empty() {
            println!(
                "{}",
                ui::style_text("Rate cache is empty. Run `update` first.", ui::StyleType::Subtle)
            );
            return;
        }

        let now = Utc::now();
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Pair"),
            ui::header_cell("Rate"),
            ui::header_cell("Source"),
            ui::header_cell("Updated"),
            ui::header_cell("Age (s)"),
            ui::header_cell("Status"),
        ]);
        for cached in &rates {
            table.add_row(vec![
                Cell::new(&cached.pair),
                ui::amount_cell(format!("{}", cached.entry.rate)),
                Cell::new(&cached.entry.source),
                Cell::new(cached.entry.updated_at.format("%Y-%m-%d %H:%M:%S").to_string()),
                ui::amount_cell(cached.entry.age(now).num_seconds().to_string()),
                ui::freshness_cell(cached.fresh),
            ]);
        }
        println!("{table}");

        if let Some(at) = last_refresh {
            println!(
                "{}",
                ui::style_text(
                    &format!("Last refresh: {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
                    ui::StyleType::Subtle
                )
            );
        }
    })
}

pub fn list<S: LedgerStore>(ctx: &Context<'_, S>) -> Result<CommandStatus> {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Code"),
        ui::header_cell("Name"),
        ui::header_cell("Class"),
        ui::header_cell("CoinGecko id"),
    ]);
    for currency in ctx.ledger.currencies() {
        table.add_row(vec![
            Cell::new(currency.code),
            Cell::new(currency.name),
            Cell::new(currency.class.to_string()),
            Cell::new(currency.coingecko_id.unwrap_or("-")),
        ]);
    }
    println!("{table}");
    Ok(CommandStatus::Success)
}
