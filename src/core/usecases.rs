//! Registration, login, trading and rate lookups over a [`LedgerStore`].
//!
//! A [`Ledger`] is constructed explicitly with its store and settings. Every
//! operation loads the collections it needs, mutates them in memory and writes
//! each touched collection once, after all checks have passed. Nothing is
//! persisted when an operation fails.
use super::config::AppConfig;
use super::currency::{self, Currency, normalize_code};
use super::error::{LedgerError, LedgerResult};
use super::portfolio::{Portfolio, Valuation};
use super::rates::{RateEntry, ResolvedRate, is_fresh, pair_key};
use super::user::User;
use super::wallet::{Wallet, validate_amount};
use crate::store::LedgerStore;
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct LedgerSettings {
    /// Currency every trade settles in
    pub base_currency: String,
    pub rates_ttl: Duration,
    pub trade_with_stale_rates: bool,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            base_currency: "USD".to_string(),
            rates_ttl: Duration::seconds(300),
            trade_with_stale_rates: false,
        }
    }
}

impl LedgerSettings {
    pub fn from_config(config: &AppConfig) -> LedgerResult<Self> {
        Ok(Self {
            base_currency: normalize_code(&config.base_currency)?,
            rates_ttl: config.rates_ttl()?,
            trade_with_stale_rates: config.trade_with_stale_rates,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeReceipt {
    pub side: TradeSide,
    pub currency_code: String,
    pub amount: f64,
    pub base_currency: String,
    pub rate: f64,
    /// Base currency paid (buy) or received (sell)
    pub base_amount: f64,
    /// Target wallet balance before and after
    pub balance_before: f64,
    pub balance_after: f64,
    /// Base wallet balance after the trade
    pub base_balance_after: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateQuote {
    pub from: String,
    pub to: String,
    pub rate: f64,
    pub updated_at: DateTime<Utc>,
    pub source: String,
    pub inverted: bool,
    pub fresh: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedRate {
    pub pair: String,
    pub entry: RateEntry,
    pub fresh: bool,
}

pub struct Ledger<S: LedgerStore> {
    store: S,
    settings: LedgerSettings,
}

impl<S: LedgerStore> Ledger<S> {
    pub fn new(store: S, settings: LedgerSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    pub fn register(&self, username: &str, password: &str) -> LedgerResult<User> {
        let result = self.register_inner(username, password);
        match &result {
            Ok(user) => info!(
                action = "register",
                user_id = user.user_id(),
                username = %user.username(),
                "User registered"
            ),
            Err(e) => warn!(action = "register", username = %username, error = %e, "Registration failed"),
        }
        result
    }

    fn register_inner(&self, username: &str, password: &str) -> LedgerResult<User> {
        let mut users = self.store.load_users()?;
        if users.iter().any(|u| u.username() == username) {
            return Err(LedgerError::UsernameTaken(username.to_string()));
        }

        let user_id = users.iter().map(User::user_id).max().unwrap_or(0) + 1;
        let user = User::new(user_id, username, password)?;

        let mut portfolios = self.store.load_portfolios()?;
        // Drop any orphan left behind by a lost write so the new user starts empty.
        portfolios.retain(|p| p.user_id() != user_id);
        portfolios.push(Portfolio::new(user_id));

        users.push(user.clone());
        self.store.save_users(&users)?;
        self.store.save_portfolios(&portfolios)?;
        Ok(user)
    }

    pub fn login(&self, username: &str, password: &str) -> LedgerResult<User> {
        let result = self.find_user(username).and_then(|user| {
            if user.verify_password(password) {
                Ok(user)
            } else {
                Err(LedgerError::InvalidPassword)
            }
        });
        match &result {
            Ok(user) => info!(action = "login", user_id = user.user_id(), "User logged in"),
            Err(e) => warn!(action = "login", username = %username, error = %e, "Login failed"),
        }
        result
    }

    fn find_user(&self, username: &str) -> LedgerResult<User> {
        self.store
            .load_users()?
            .into_iter()
            .find(|u| u.username() == username)
            .ok_or_else(|| LedgerError::UserNotFound(username.to_string()))
    }

    pub fn user(&self, user_id: u64) -> LedgerResult<User> {
        self.store
            .load_users()?
            .into_iter()
            .find(|u| u.user_id() == user_id)
            .ok_or_else(|| LedgerError::UserNotFound(format!("id={user_id}")))
    }

    pub fn change_password(
        &self,
        user_id: u64,
        old_password: &str,
        new_password: &str,
    ) -> LedgerResult<()> {
        let mut users = self.store.load_users()?;
        let user = users
            .iter_mut()
            .find(|u| u.user_id() == user_id)
            .ok_or_else(|| LedgerError::UserNotFound(format!("id={user_id}")))?;
        if !user.verify_password(old_password) {
            warn!(action = "change_password", user_id, "Old password rejected");
            return Err(LedgerError::InvalidPassword);
        }
        user.change_password(new_password)?;
        self.store.save_users(&users)?;
        info!(action = "change_password", user_id, "Password changed");
        Ok(())
    }

    pub fn portfolio(&self, user_id: u64) -> LedgerResult<Portfolio> {
        self.store
            .load_portfolios()?
            .into_iter()
            .find(|p| p.user_id() == user_id)
            .ok_or(LedgerError::PortfolioNotFound(user_id))
    }

    /// Loads all portfolios, applies `f` to the user's one and saves the
    /// collection only when `f` succeeds.
    fn update_portfolio<T>(
        &self,
        user_id: u64,
        f: impl FnOnce(&mut Portfolio) -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        let mut portfolios = self.store.load_portfolios()?;
        let portfolio = portfolios
            .iter_mut()
            .find(|p| p.user_id() == user_id)
            .ok_or(LedgerError::PortfolioNotFound(user_id))?;
        let value = f(portfolio)?;
        self.store.save_portfolios(&portfolios)?;
        Ok(value)
    }

    pub fn deposit(&self, user_id: u64, currency_code: &str, amount: f64) -> LedgerResult<Wallet> {
        let result = validate_amount(amount)
            .and_then(|_| normalize_code(currency_code))
            .and_then(|code| {
                self.update_portfolio(user_id, |portfolio| {
                    portfolio.deposit(&code, amount).cloned()
                })
            });
        match &result {
            Ok(wallet) => info!(
                action = "deposit",
                user_id,
                currency = %wallet.currency_code(),
                amount,
                balance = wallet.balance(),
                "Deposit completed"
            ),
            Err(e) => warn!(action = "deposit", user_id, currency = %currency_code, amount, error = %e, "Deposit failed"),
        }
        result
    }

    /// Resolves `code -> base` for a trade, honouring the stale-rate policy.
    fn trade_rate(&self, code: &str) -> LedgerResult<ResolvedRate> {
        let base = &self.settings.base_currency;
        let rates = self.store.load_rates()?;
        let resolved = rates
            .lookup(code, base)
            .ok_or_else(|| LedgerError::RateUnavailable {
                from: code.to_string(),
                to: base.clone(),
            })?;

        let now = Utc::now();
        if !self.settings.trade_with_stale_rates && !resolved.is_fresh(self.settings.rates_ttl, now)
        {
            return Err(LedgerError::RateStale {
                pair: pair_key(code, base),
                age_secs: (now - resolved.updated_at).num_seconds(),
            });
        }
        Ok(resolved)
    }

    fn validate_trade(&self, currency_code: &str, amount: f64) -> LedgerResult<String> {
        validate_amount(amount)?;
        let code = normalize_code(currency_code)?;
        if code == self.settings.base_currency {
            return Err(LedgerError::SameCurrency(code));
        }
        Ok(code)
    }

    pub fn buy(&self, user_id: u64, currency_code: &str, amount: f64) -> LedgerResult<TradeReceipt> {
        let result = self.trade(TradeSide::Buy, user_id, currency_code, amount);
        log_trade(user_id, currency_code, amount, TradeSide::Buy, &result);
        result
    }

    pub fn sell(&self, user_id: u64, currency_code: &str, amount: f64) -> LedgerResult<TradeReceipt> {
        let result = self.trade(TradeSide::Sell, user_id, currency_code, amount);
        log_trade(user_id, currency_code, amount, TradeSide::Sell, &result);
        result
    }

    fn trade(
        &self,
        side: TradeSide,
        user_id: u64,
        currency_code: &str,
        amount: f64,
    ) -> LedgerResult<TradeReceipt> {
        let code = self.validate_trade(currency_code, amount)?;
        // Fail on a missing portfolio before looking at rates.
        self.portfolio(user_id)?;
        let resolved = self.trade_rate(&code)?;
        let base = self.settings.base_currency.clone();
        let base_amount = amount * resolved.rate;

        self.update_portfolio(user_id, |portfolio| {
            let balance_before = portfolio.get_wallet(&code).map_or(0.0, Wallet::balance);
            match side {
                TradeSide::Buy => {
                    let available = portfolio.get_wallet(&base).map_or(0.0, Wallet::balance);
                    if available < base_amount {
                        return Err(LedgerError::InsufficientFunds {
                            code: base.clone(),
                            available,
                            required: base_amount,
                        });
                    }
                    portfolio.withdraw(&base, base_amount)?;
                    portfolio.deposit(&code, amount)?;
                }
                TradeSide::Sell => {
                    portfolio.withdraw(&code, amount)?;
                    portfolio.deposit(&base, base_amount)?;
                }
            }

            Ok(TradeReceipt {
                side,
                currency_code: code.clone(),
                amount,
                base_currency: base.clone(),
                rate: resolved.rate,
                base_amount,
                balance_before,
                balance_after: portfolio.get_wallet(&code).map_or(0.0, Wallet::balance),
                base_balance_after: portfolio.get_wallet(&base).map_or(0.0, Wallet::balance),
            })
        })
    }

    pub fn portfolio_value(&self, user_id: u64, base_currency: Option<&str>) -> LedgerResult<Valuation> {
        let base = match base_currency {
            Some(code) => normalize_code(code)?,
            None => self.settings.base_currency.clone(),
        };
        let portfolio = self.portfolio(user_id)?;
        let rates = self.store.load_rates()?;
        let valuation = portfolio.total_value(&base, &rates, self.settings.rates_ttl, Utc::now());
        info!(
            action = "portfolio",
            user_id,
            base = %base,
            total = valuation.total,
            unconverted = valuation.unconverted.len(),
            "Portfolio valued"
        );
        Ok(valuation)
    }

    pub fn get_rate(&self, from: &str, to: &str) -> LedgerResult<RateQuote> {
        let from = normalize_code(from)?;
        let to = normalize_code(to)?;
        let rates = self.store.load_rates()?;
        let resolved = rates
            .lookup(&from, &to)
            .ok_or_else(|| LedgerError::RateUnavailable {
                from: from.clone(),
                to: to.clone(),
            })?;
        let fresh = resolved.is_fresh(self.settings.rates_ttl, Utc::now());
        Ok(RateQuote {
            from,
            to,
            rate: resolved.rate,
            updated_at: resolved.updated_at,
            source: resolved.source,
            inverted: resolved.inverted,
            fresh,
        })
    }

    /// Cached pairs, optionally only those involving `currency_code`.
    pub fn rates(&self, currency_code: Option<&str>) -> LedgerResult<Vec<CachedRate>> {
        let code = currency_code.map(normalize_code).transpose()?;
        let rates = self.store.load_rates()?;
        let now = Utc::now();
        Ok(rates
            .pairs_involving(code.as_deref())
            .map(|(pair, entry)| CachedRate {
                pair: pair.clone(),
                entry: entry.clone(),
                fresh: is_fresh(entry.updated_at, self.settings.rates_ttl, now),
            })
            .collect())
    }

    pub fn last_refresh(&self) -> LedgerResult<Option<DateTime<Utc>>> {
        Ok(self.store.load_rates()?.last_refresh)
    }

    pub fn currencies(&self) -> &'static [Currency] {
        currency::CURRENCIES
    }
}

fn log_trade(
    user_id: u64,
    currency_code: &str,
    amount: f64,
    side: TradeSide,
    result: &LedgerResult<TradeReceipt>,
) {
    let action = match side {
        TradeSide::Buy => "buy",
        TradeSide::Sell => "sell",
    };
    match result {
        Ok(receipt) => info!(
            action,
            user_id,
            currency = %receipt.currency_code,
            amount,
            rate = receipt.rate,
            base_amount = receipt.base_amount,
            "Trade completed"
        ),
        Err(e) => warn!(
            action,
            user_id,
            currency = %currency_code,
            amount,
            error = %e,
            "Trade failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rates::RatesSnapshot;
    use crate::store::MemoryStore;

    fn ledger_with_rates(pairs: &[(&str, f64, DateTime<Utc>)]) -> Ledger<MemoryStore> {
        let rates = RatesSnapshot {
            pairs: pairs
                .iter()
                .map(|(k, r, at)| (k.to_string(), RateEntry::new(*r, *at, "test")))
                .collect(),
            last_refresh: Some(Utc::now()),
        };
        Ledger::new(MemoryStore::with_rates(rates), LedgerSettings::default())
    }

    fn funded_user(ledger: &Ledger<MemoryStore>, usd: f64) -> u64 {
        let user = ledger.register("alice", "secret1").unwrap();
        ledger.deposit(user.user_id(), "USD", usd).unwrap();
        user.user_id()
    }

    #[test]
    fn test_register_assigns_increasing_ids_and_portfolios() {
        let ledger = ledger_with_rates(&[]);
        let a = ledger.register("alice", "secret1").unwrap();
        let b = ledger.register("bob", "secret2").unwrap();
        assert_eq!(a.user_id(), 1);
        assert_eq!(b.user_id(), 2);
        assert!(ledger.portfolio(2).unwrap().is_empty());
        assert_eq!(ledger.store().load_portfolios().unwrap().len(), 2);
    }

    #[test]
    fn test_register_duplicate_and_short_password() {
        let ledger = ledger_with_rates(&[]);
        ledger.register("alice", "secret1").unwrap();
        assert!(matches!(
            ledger.register("alice", "other123"),
            Err(LedgerError::UsernameTaken(_))
        ));
        // Case-sensitive match
        assert!(ledger.register("Alice", "other123").is_ok());
        assert!(matches!(
            ledger.register("carol", "abc"),
            Err(LedgerError::PasswordTooShort { min: 4 })
        ));
        assert_eq!(ledger.store().load_users().unwrap().len(), 2);
    }

    #[test]
    fn test_login() {
        let ledger = ledger_with_rates(&[]);
        ledger.register("alice", "secret1").unwrap();
        assert!(matches!(
            ledger.login("alice", "wrong"),
            Err(LedgerError::InvalidPassword)
        ));
        assert!(matches!(
            ledger.login("nobody", "secret1"),
            Err(LedgerError::UserNotFound(_))
        ));
        let user = ledger.login("alice", "secret1").unwrap();
        assert_eq!(user.username(), "alice");
    }

    #[test]
    fn test_change_password_requires_old_password() {
        let ledger = ledger_with_rates(&[]);
        let id = ledger.register("alice", "secret1").unwrap().user_id();
        assert!(matches!(
            ledger.change_password(id, "wrong", "newpass"),
            Err(LedgerError::InvalidPassword)
        ));
        ledger.change_password(id, "secret1", "newpass").unwrap();
        assert!(ledger.login("alice", "newpass").is_ok());
        assert!(ledger.login("alice", "secret1").is_err());
    }

    #[test]
    fn test_buy_then_sell_restores_base_balance() {
        let ledger = ledger_with_rates(&[("BTC_USD", 59337.21, Utc::now())]);
        let id = funded_user(&ledger, 1000.0);

        let receipt = ledger.buy(id, "btc", 0.01).unwrap();
        assert!((receipt.base_amount - 593.3721).abs() < 1e-9);
        assert!((receipt.base_balance_after - 406.6279).abs() < 1e-9);
        assert_eq!(receipt.balance_before, 0.0);
        assert!((receipt.balance_after - 0.01).abs() < 1e-12);

        let receipt = ledger.sell(id, "BTC", 0.01).unwrap();
        assert!((receipt.base_balance_after - 1000.0).abs() < 1e-9);
        assert!(receipt.balance_after.abs() < 1e-12);
    }

    #[test]
    fn test_buy_failures_leave_portfolio_untouched() {
        let ledger = ledger_with_rates(&[("BTC_USD", 59337.21, Utc::now())]);
        let id = funded_user(&ledger, 100.0);
        let before = ledger.portfolio(id).unwrap();

        assert!(matches!(
            ledger.buy(id, "BTC", 0.01),
            Err(LedgerError::InsufficientFunds { .. })
        ));
        assert!(matches!(
            ledger.buy(id, "BTC", 0.0),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            ledger.buy(id, "DOGE", 1.0),
            Err(LedgerError::CurrencyNotFound(_))
        ));
        assert!(matches!(
            ledger.buy(id, "ETH", 1.0),
            Err(LedgerError::RateUnavailable { .. })
        ));
        assert!(matches!(
            ledger.buy(id, "USD", 1.0),
            Err(LedgerError::SameCurrency(_))
        ));
        assert!(matches!(
            ledger.buy(99, "BTC", 0.001),
            Err(LedgerError::PortfolioNotFound(99))
        ));
        assert_eq!(ledger.portfolio(id).unwrap(), before);
    }

    #[test]
    fn test_sell_requires_wallet_and_balance() {
        let ledger = ledger_with_rates(&[("ETH_USD", 3000.0, Utc::now())]);
        let id = funded_user(&ledger, 100.0);
        assert!(matches!(
            ledger.sell(id, "ETH", 1.0),
            Err(LedgerError::WalletNotFound(_))
        ));
        ledger.deposit(id, "ETH", 0.5).unwrap();
        assert!(matches!(
            ledger.sell(id, "ETH", 1.0),
            Err(LedgerError::InsufficientFunds { .. })
        ));
        let receipt = ledger.sell(id, "ETH", 0.5).unwrap();
        assert!((receipt.base_balance_after - 1600.0).abs() < 1e-9);
    }

    #[test]
    fn test_sell_creates_base_wallet() {
        let ledger = ledger_with_rates(&[("SOL_USD", 150.0, Utc::now())]);
        let id = ledger.register("alice", "secret1").unwrap().user_id();
        ledger.deposit(id, "SOL", 2.0).unwrap();
        let receipt = ledger.sell(id, "SOL", 2.0).unwrap();
        assert_eq!(receipt.base_balance_after, 300.0);
        assert_eq!(ledger.portfolio(id).unwrap().get_wallet("USD").unwrap().balance(), 300.0);
    }

    #[test]
    fn test_trading_rejects_stale_rates_unless_allowed() {
        let stale = Utc::now() - Duration::hours(1);
        let ledger = ledger_with_rates(&[("BTC_USD", 50000.0, stale)]);
        let id = funded_user(&ledger, 1000.0);
        assert!(matches!(
            ledger.buy(id, "BTC", 0.01),
            Err(LedgerError::RateStale { .. })
        ));

        let store = MemoryStore::with_rates(ledger.store().load_rates().unwrap());
        let permissive = Ledger::new(
            store,
            LedgerSettings {
                trade_with_stale_rates: true,
                ..LedgerSettings::default()
            },
        );
        let id = funded_user(&permissive, 1000.0);
        assert!(permissive.buy(id, "BTC", 0.01).is_ok());
    }

    #[test]
    fn test_trading_honours_inverse_rates() {
        let ledger = ledger_with_rates(&[("USD_EUR", 0.8, Utc::now())]);
        let id = funded_user(&ledger, 100.0);
        let receipt = ledger.buy(id, "EUR", 40.0).unwrap();
        assert!((receipt.rate - 1.25).abs() < 1e-12);
        assert!((receipt.base_amount - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_get_rate_direct_inverse_and_missing() {
        let ledger = ledger_with_rates(&[("BTC_USD", 50000.0, Utc::now())]);
        let direct = ledger.get_rate("btc", "usd").unwrap();
        assert_eq!(direct.rate, 50000.0);
        assert!(!direct.inverted);
        assert!(direct.fresh);

        let inverse = ledger.get_rate("USD", "BTC").unwrap();
        assert!((inverse.rate - 1.0 / 50000.0).abs() < 1e-15);
        assert!(inverse.inverted);

        assert!(matches!(
            ledger.get_rate("EUR", "USD"),
            Err(LedgerError::RateUnavailable { .. })
        ));
        assert!(matches!(
            ledger.get_rate("XXX", "USD"),
            Err(LedgerError::CurrencyNotFound(_))
        ));
    }

    #[test]
    fn test_get_rate_reports_stale_entries() {
        let ledger = ledger_with_rates(&[("EUR_USD", 1.1, Utc::now() - Duration::days(1))]);
        let quote = ledger.get_rate("EUR", "USD").unwrap();
        assert!(!quote.fresh);
    }

    #[test]
    fn test_portfolio_value_with_base_override() {
        let now = Utc::now();
        let ledger = ledger_with_rates(&[("BTC_USD", 50000.0, now), ("EUR_USD", 1.25, now)]);
        let id = funded_user(&ledger, 100.0);
        ledger.deposit(id, "BTC", 0.01).unwrap();

        let usd = ledger.portfolio_value(id, None).unwrap();
        assert!((usd.total - 600.0).abs() < 1e-9);

        let eur = ledger.portfolio_value(id, Some("eur")).unwrap();
        assert_eq!(eur.base_currency, "EUR");
        // USD converts by inverse; BTC has no BTC_EUR pair either way
        assert!((eur.total - 80.0).abs() < 1e-9);
        assert_eq!(eur.unconverted.len(), 1);
        assert_eq!(eur.unconverted[0].currency_code, "BTC");
    }

    #[test]
    fn test_rates_listing_filter() {
        let now = Utc::now();
        let ledger = ledger_with_rates(&[
            ("BTC_USD", 50000.0, now),
            ("ETH_USD", 3000.0, now - Duration::hours(2)),
        ]);
        let all = ledger.rates(None).unwrap();
        assert_eq!(all.len(), 2);
        let eth = ledger.rates(Some("eth")).unwrap();
        assert_eq!(eth.len(), 1);
        assert!(!eth[0].fresh);
        assert!(ledger.rates(Some("XYZ")).is_err());
    }

    #[test]
    fn test_settings_reject_oversized_ttl() {
        let config = AppConfig {
            rates_ttl_secs: 100_000_000_000_000_000,
            ..AppConfig::default()
        };
        let err = LedgerSettings::from_config(&config).unwrap_err();
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("rates_ttl_secs is out of range"));

        let settings = LedgerSettings::from_config(&AppConfig::default()).unwrap();
        assert_eq!(settings.rates_ttl, Duration::seconds(300));
    }
}
