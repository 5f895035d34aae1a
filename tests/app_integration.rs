use std::path::Path;
use tempfile::TempDir;
use tracing::info;
use valuta::core::source::SourceKind;
use valuta::store::{JsonFileStore, LedgerStore};
use valuta::{AppCommand, CommandStatus, run_command};
use wiremock::MockServer;

// Adds automatic logging to test
mod test_utils {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub async fn create_coingecko_mock_server(status: u16, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/simple/price"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&mock_server)
            .await;
        mock_server
    }

    pub async fn create_exchangerate_mock_server(status: u16, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/test-key/latest/USD"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&mock_server)
            .await;
        mock_server
    }
}

const COINGECKO_BODY: &str = r#"{
    "bitcoin": {"usd": 59337.21},
    "ethereum": {"usd": 3720.0},
    "solana": {"usd": 145.12}
}"#;

const EXCHANGERATE_BODY: &str = r#"{
    "result": "success",
    "base_code": "USD",
    "conversion_rates": {"USD": 1, "EUR": 0.8, "GBP": 0.75, "RUB": 100.0}
}"#;

struct TestEnv {
    _dir: TempDir,
    config_path: String,
    data_path: std::path::PathBuf,
}

impl TestEnv {
    fn new(coingecko: &MockServer, exchangerate: &MockServer) -> Self {
        let dir = TempDir::new().unwrap();
        let data_path = dir.path().join("data");
        let config_path = dir.path().join("config.yaml");
        write_config(&config_path, &data_path, &coingecko.uri(), &exchangerate.uri());
        Self {
            config_path: config_path.to_string_lossy().to_string(),
            data_path,
            _dir: dir,
        }
    }

    async fn run(&self, command: AppCommand) -> CommandStatus {
        info!(?command, "Running command");
        run_command(command, Some(&self.config_path))
            .await
            .unwrap()
    }

    fn store(&self) -> JsonFileStore {
        JsonFileStore::new(&self.data_path)
    }

    fn balance(&self, code: &str) -> f64 {
        self.store()
            .load_portfolios()
            .unwrap()
            .first()
            .and_then(|p| p.get_wallet(code).map(|w| w.balance()))
            .unwrap_or(0.0)
    }
}

fn write_config(config_path: &Path, data_path: &Path, coingecko_url: &str, exchangerate_url: &str) {
    let config = format!(
        r#"
data_path: "{}"
base_currency: "USD"
rates_ttl_secs: 300
request_timeout_secs: 5
providers:
  coingecko:
    base_url: "{coingecko_url}"
  exchangerate:
    base_url: "{exchangerate_url}"
    api_key: "test-key"
"#,
        data_path.display()
    );
    std::fs::write(config_path, config).unwrap();
}

fn register(username: &str, password: &str) -> AppCommand {
    AppCommand::Register {
        username: username.to_string(),
        password: password.to_string(),
    }
}

fn login(username: &str, password: &str) -> AppCommand {
    AppCommand::Login {
        username: username.to_string(),
        password: password.to_string(),
    }
}

fn deposit(currency: &str, amount: f64) -> AppCommand {
    AppCommand::Deposit {
        currency: currency.to_string(),
        amount,
    }
}

#[test_log::test(tokio::test)]
async fn test_full_trading_flow() {
    let coingecko = test_utils::create_coingecko_mock_server(200, COINGECKO_BODY).await;
    let exchangerate = test_utils::create_exchangerate_mock_server(200, EXCHANGERATE_BODY).await;
    let env = TestEnv::new(&coingecko, &exchangerate);

    assert_eq!(env.run(register("alice", "1234")).await, CommandStatus::Success);
    assert_eq!(env.run(login("alice", "1234")).await, CommandStatus::Success);
    assert_eq!(env.run(deposit("USD", 1000.0)).await, CommandStatus::Success);
    assert_eq!(
        env.run(AppCommand::Update { source: None }).await,
        CommandStatus::Success
    );

    let rates = env.store().load_rates().unwrap();
    assert_eq!(rates.pairs["BTC_USD"].rate, 59337.21);
    assert!((rates.pairs["EUR_USD"].rate - 1.25).abs() < 1e-12);
    assert!(rates.last_refresh.is_some());
    assert_eq!(env.store().load_history().unwrap().len(), rates.pairs.len());

    let buy = AppCommand::Buy {
        currency: "btc".to_string(),
        amount: 0.01,
    };
    assert_eq!(env.run(buy).await, CommandStatus::Success);
    assert!((env.balance("BTC") - 0.01).abs() < 1e-12);
    assert!((env.balance("USD") - 406.6279).abs() < 1e-6);

    assert_eq!(
        env.run(AppCommand::Portfolio { base: None }).await,
        CommandStatus::Success
    );
    assert_eq!(
        env.run(AppCommand::Portfolio {
            base: Some("EUR".to_string())
        })
        .await,
        CommandStatus::Success
    );

    let sell = AppCommand::Sell {
        currency: "BTC".to_string(),
        amount: 0.01,
    };
    assert_eq!(env.run(sell).await, CommandStatus::Success);
    assert!(env.balance("BTC").abs() < 1e-12);
    assert!((env.balance("USD") - 1000.0).abs() < 1e-6);

    let rate = AppCommand::Rate {
        from: "USD".to_string(),
        to: "BTC".to_string(),
    };
    assert_eq!(env.run(rate).await, CommandStatus::Success);
    assert_eq!(
        env.run(AppCommand::Show { currency: None }).await,
        CommandStatus::Success
    );
    assert_eq!(env.run(AppCommand::List).await, CommandStatus::Success);
}

#[test_log::test(tokio::test)]
async fn test_session_lifecycle() {
    let coingecko = test_utils::create_coingecko_mock_server(200, COINGECKO_BODY).await;
    let exchangerate = test_utils::create_exchangerate_mock_server(200, EXCHANGERATE_BODY).await;
    let env = TestEnv::new(&coingecko, &exchangerate);

    // Commands needing a user fail before login.
    assert_eq!(env.run(deposit("USD", 10.0)).await, CommandStatus::Failure);
    assert_eq!(env.run(AppCommand::Whoami).await, CommandStatus::Failure);

    assert_eq!(env.run(register("bob", "secret")).await, CommandStatus::Success);
    assert_eq!(env.run(register("bob", "other")).await, CommandStatus::Failure);
    assert_eq!(env.run(login("bob", "wrong")).await, CommandStatus::Failure);
    assert!(env.store().load_session().unwrap().is_none());

    assert_eq!(env.run(login("bob", "secret")).await, CommandStatus::Success);
    let session = env.store().load_session().unwrap().unwrap();
    assert_eq!(session.username, "bob");
    assert_eq!(env.run(AppCommand::Whoami).await, CommandStatus::Success);

    let change = AppCommand::ChangePassword {
        old_password: "secret".to_string(),
        new_password: "newsecret".to_string(),
    };
    assert_eq!(env.run(change).await, CommandStatus::Success);

    assert_eq!(env.run(AppCommand::Logout).await, CommandStatus::Success);
    assert!(env.store().load_session().unwrap().is_none());
    assert_eq!(env.run(deposit("USD", 10.0)).await, CommandStatus::Failure);

    assert_eq!(env.run(login("bob", "secret")).await, CommandStatus::Failure);
    assert_eq!(env.run(login("bob", "newsecret")).await, CommandStatus::Success);
}

#[test_log::test(tokio::test)]
async fn test_domain_errors_leave_state_untouched() {
    let coingecko = test_utils::create_coingecko_mock_server(200, COINGECKO_BODY).await;
    let exchangerate = test_utils::create_exchangerate_mock_server(200, EXCHANGERATE_BODY).await;
    let env = TestEnv::new(&coingecko, &exchangerate);

    env.run(register("carol", "1234")).await;
    env.run(login("carol", "1234")).await;
    env.run(deposit("USD", 100.0)).await;

    // No rates cached yet.
    let buy = AppCommand::Buy {
        currency: "BTC".to_string(),
        amount: 0.01,
    };
    assert_eq!(env.run(buy.clone()).await, CommandStatus::Failure);

    env.run(AppCommand::Update { source: None }).await;
    // 0.01 BTC costs more than 100 USD.
    assert_eq!(env.run(buy).await, CommandStatus::Failure);
    assert_eq!(env.run(deposit("USD", -5.0)).await, CommandStatus::Failure);
    assert_eq!(env.run(deposit("XYZ", 5.0)).await, CommandStatus::Failure);

    let sell = AppCommand::Sell {
        currency: "ETH".to_string(),
        amount: 1.0,
    };
    assert_eq!(env.run(sell).await, CommandStatus::Failure);

    assert_eq!(env.balance("USD"), 100.0);
    assert_eq!(env.balance("BTC"), 0.0);
}

#[test_log::test(tokio::test)]
async fn test_update_with_failing_sources() {
    let coingecko = test_utils::create_coingecko_mock_server(429, "").await;
    let exchangerate = test_utils::create_exchangerate_mock_server(200, EXCHANGERATE_BODY).await;
    let env = TestEnv::new(&coingecko, &exchangerate);

    // One failing source is still a successful refresh.
    assert_eq!(
        env.run(AppCommand::Update { source: None }).await,
        CommandStatus::Success
    );
    let rates = env.store().load_rates().unwrap();
    assert!(rates.pairs.contains_key("GBP_USD"));
    assert!(!rates.pairs.contains_key("BTC_USD"));

    // Only the failing source selected: nothing fetched, cache kept.
    assert_eq!(
        env.run(AppCommand::Update {
            source: Some(SourceKind::CoinGecko)
        })
        .await,
        CommandStatus::Failure
    );
    assert_eq!(env.store().load_rates().unwrap(), rates);
}

#[test_log::test(tokio::test)]
async fn test_schedule_runs_bounded_cycles() {
    let coingecko = test_utils::create_coingecko_mock_server(200, COINGECKO_BODY).await;
    let exchangerate = test_utils::create_exchangerate_mock_server(200, EXCHANGERATE_BODY).await;
    let env = TestEnv::new(&coingecko, &exchangerate);

    let schedule = AppCommand::Schedule {
        interval_secs: Some(0),
        runs: Some(2),
    };
    assert_eq!(env.run(schedule).await, CommandStatus::Success);

    let per_refresh = env.store().load_rates().unwrap().pairs.len();
    assert_eq!(env.store().load_history().unwrap().len(), per_refresh * 2);
}

#[test_log::test(tokio::test)]
async fn test_missing_config_file_is_an_error() {
    let result = run_command(AppCommand::List, Some("/nonexistent/valuta/config.yaml")).await;
    assert!(
        result
            .unwrap_err()
            .to_string()
            .contains("Failed to read config file")
    );
}
