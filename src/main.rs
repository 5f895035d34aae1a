use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::process::ExitCode;
use valuta::core::log::init_logging;
use valuta::core::source::SourceKind;
use valuta::{AppCommand, CommandStatus};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Create a user account with an empty portfolio
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Log in and remember the session
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Forget the current session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Change the password of the logged-in user
    ChangePassword {
        #[arg(long = "old")]
        old_password: String,
        #[arg(long = "new")]
        new_password: String,
    },
    /// Add funds to a wallet
    Deposit {
        #[arg(long)]
        currency: String,
        #[arg(long, allow_negative_numbers = true)]
        amount: f64,
    },
    /// Display the portfolio value
    Portfolio {
        /// Valuation currency, defaults to the configured base currency
        #[arg(long)]
        base: Option<String>,
    },
    /// Buy a currency with the base currency
    Buy {
        #[arg(long)]
        currency: String,
        #[arg(long, allow_negative_numbers = true)]
        amount: f64,
    },
    /// Sell a currency for the base currency
    Sell {
        #[arg(long)]
        currency: String,
        #[arg(long, allow_negative_numbers = true)]
        amount: f64,
    },
    /// Look up a cached exchange rate
    Rate {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Refresh rates from the remote sources
    Update {
        /// Only query one source: coingecko or exchangerate
        #[arg(long)]
        source: Option<SourceKind>,
    },
    /// Refresh rates periodically until interrupted
    Schedule {
        /// Seconds between refreshes, defaults to the configured interval
        #[arg(long)]
        interval: Option<u64>,
        /// Stop after this many refreshes
        #[arg(long)]
        runs: Option<usize>,
    },
    /// Display cached rates
    Show {
        /// Only pairs involving this currency
        #[arg(long)]
        currency: Option<String>,
    },
    /// List supported currencies
    List,
}

impl From<Commands> for AppCommand {
    fn from(cmd: Commands) -> AppCommand {
        match cmd {
            Commands::Register { username, password } => AppCommand::Register { username, password },
            Commands::Login { username, password } => AppCommand::Login { username, password },
            Commands::Logout => AppCommand::Logout,
            Commands::Whoami => AppCommand::Whoami,
            Commands::ChangePassword {
                old_password,
                new_password,
            } => AppCommand::ChangePassword {
                old_password,
                new_password,
            },
            Commands::Deposit { currency, amount } => AppCommand::Deposit { currency, amount },
            Commands::Portfolio { base } => AppCommand::Portfolio { base },
            Commands::Buy { currency, amount } => AppCommand::Buy { currency, amount },
            Commands::Sell { currency, amount } => AppCommand::Sell { currency, amount },
            Commands::Rate { from, to } => AppCommand::Rate { from, to },
            Commands::Update { source } => AppCommand::Update { source },
            Commands::Schedule { interval, runs } => AppCommand::Schedule {
                interval_secs: interval,
                runs,
            },
            Commands::Show { currency } => AppCommand::Show { currency },
            Commands::List => AppCommand::List,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => valuta::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => Cli::command()
            .print_help()
            .map(|_| CommandStatus::Success)
            .map_err(Into::into),
    };

    match result {
        Ok(CommandStatus::Success) => ExitCode::SUCCESS,
        Ok(CommandStatus::Failure) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "Application failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn setup() -> Result<CommandStatus> {
    let path = valuta::cli::setup::setup()?;
    println!("Created default configuration at {}", path.display());
    Ok(CommandStatus::Success)
}
