use super::ui;
use super::{Context, report};
use crate::CommandStatus;
use crate::core::currency::format_amount;
use crate::core::portfolio::{SkipReason, Valuation};
use crate::store::LedgerStore;
use anyhow::Result;
use comfy_table::Cell;

impl Valuation {
    pub fn display_as_table(&self, username: &str) -> String {
        let base = &self.base_currency;
        let mut table = ui::new_styled_table();

        table.set_header(vec![
            ui::header_cell("Currency"),
            ui::header_cell("Balance"),
            ui::header_cell(&format!("Rate ({base})")),
            ui::header_cell(&format!("Value ({base})")),
            ui::header_cell("Weight (%)"),
        ]);

        for holding in &self.holdings {
            let weight = if self.total > 0.0 {
                format!("{:.2}%", holding.converted_value / self.total * 100.0)
            } else {
                "0.00%".to_string()
            };
            table.add_row(vec![
                Cell::new(&holding.currency_code),
                ui::amount_cell(format_amount(holding.balance, &holding.currency_code)),
                ui::amount_cell(format!("{}", holding.rate)),
                ui::amount_cell(format!("{:.2}", holding.converted_value)),
                ui::amount_cell(weight),
            ]);
        }

        for skipped in &self.unconverted {
            let has_error = matches!(skipped.reason, SkipReason::MissingRate);
            table.add_row(vec![
                Cell::new(&skipped.currency_code),
                ui::amount_cell(format_amount(skipped.balance, &skipped.currency_code)),
                ui::na_cell(has_error),
                ui::na_cell(has_error),
                ui::na_cell(has_error),
            ]);
        }

        let mut output = format!(
            "Portfolio: {}\n\n",
            ui::style_text(username, ui::StyleType::Title)
        );
        output.push_str(&table.to_string());

        output.push_str(&format!(
            "\n\nTotal Value ({}): {}",
            ui::style_text(base, ui::StyleType::TotalLabel),
            ui::style_text(&format!("{:.2}", self.total), ui::StyleType::TotalValue)
        ));

        if !self.is_complete() {
            output.push_str(&format!(
                "\n{}",
                ui::style_text(
                    "Total excludes wallets without a fresh rate:",
                    ui::StyleType::Warning
                )
            ));
        }
        for skipped in &self.unconverted {
            let reason = match skipped.reason {
                SkipReason::MissingRate => format!("no rate for {}->{base}", skipped.currency_code),
                SkipReason::StaleRate { age_secs } => format!(
                    "rate {}->{base} is stale ({age_secs}s old), run `update`",
                    skipped.currency_code
                ),
            };
            output.push_str(&format!(
                "\n{}",
                ui::style_text(
                    &format!("Excluded {}: {reason}", skipped.currency_code),
                    ui::StyleType::Warning
                )
            ));
        }

        output
    }
}

pub fn run<S: LedgerStore>(ctx: &Context<'_, S>, base: Option<&str>) -> Result<CommandStatus> {
    let result = ctx.require_session().and_then(|session| {
        let valuation = ctx.ledger.portfolio_value(session.user_id, base)?;
        Ok((session, valuation))
    });
    report(result, |(session, valuation)| {
        if valuation.holdings.is_empty() && valuation.unconverted.is_empty() {
            println!(
                "{}",
                ui::style_text("Portfolio is empty. Use `deposit` to add funds.", ui::StyleType::Subtle)
            );
            return;
        }
        println!("{}", valuation.display_as_table(&session.username));
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::portfolio::{Holding, Unconverted};

    #[test]
    fn test_table_lists_holdings_and_exclusions() {
        let valuation = Valuation {
            user_id: 1,
            base_currency: "USD".to_string(),
            holdings: vec![Holding {
                currency_code: "USD".to_string(),
                balance: 406.6279,
                rate: 1.0,
                converted_value: 406.6279,
            }],
            unconverted: vec![Unconverted {
                currency_code: "BTC".to_string(),
                balance: 0.01,
                reason: SkipReason::StaleRate { age_secs: 900 },
            }],
            total: 406.6279,
        };

        let output = console::strip_ansi_codes(&valuation.display_as_table("alice")).to_string();
        assert!(output.contains("Portfolio: alice"));
        assert!(output.contains("406.63"));
        assert!(output.contains("0.01000000"));
        assert!(output.contains("N/A"));
        assert!(output.contains("Total Value (USD): 406.63"));
        assert!(output.contains("Total excludes wallets without a fresh rate"));
        assert!(output.contains("Excluded BTC: rate BTC->USD is stale (900s old)"));
    }
}
