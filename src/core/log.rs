use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

/// Installs the global subscriber. Output stays off unless `verbose` is set
/// or `RUST_LOG` asks for it.
pub fn init_logging(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env().ok();
    let app_level = match (verbose, env_filter.is_some()) {
        (true, _) => LevelFilter::DEBUG,
        (false, true) => LevelFilter::TRACE,
        (false, false) => LevelFilter::OFF,
    };
    let app_filter = Targets::new().with_target("valuta", app_level);
    let env_filter =
        env_filter.unwrap_or_else(|| EnvFilter::new(if verbose { "debug" } else { "off" }));

    tracing_subscriber::registry()
        .with(fmt::layer().pretty().without_time().with_writer(std::io::stderr))
        .with(app_filter)
        .with(env_filter)
        .init();
}
