//! Refreshes the rate cache from the configured sources.
use crate::core::config::AppConfig;
use crate::core::error::{LedgerError, LedgerResult};
use crate::core::rates::{RateEntry, RateRecord, RatesSnapshot};
use crate::core::source::{RateSource, SourceKind};
use crate::providers;
use crate::store::LedgerStore;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What one source contributed to a refresh.
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub kind: SourceKind,
    pub name: String,
    /// Number of rates received, or the error message
    pub result: Result<usize, String>,
}

#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub outcomes: Vec<SourceOutcome>,
    pub total: usize,
    pub last_refresh: DateTime<Utc>,
    /// False when history is enabled but appending to it failed
    pub history_saved: bool,
}

pub struct RatesUpdater {
    sources: Vec<Box<dyn RateSource>>,
    keep_history: bool,
}

impl RatesUpdater {
    /// `sources` are merged in the given order; later sources win on overlap.
    pub fn new(sources: Vec<Box<dyn RateSource>>, keep_history: bool) -> Self {
        Self {
            sources,
            keep_history,
        }
    }

    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        Ok(Self::new(
            providers::default_sources(config)?,
            config.keep_history,
        ))
    }

    /// Number of sources a refresh with `selection` would query.
    pub fn selected_count(&self, selection: Option<SourceKind>) -> usize {
        self.selected(selection).count()
    }

    fn selected(&self, selection: Option<SourceKind>) -> impl Iterator<Item = &dyn RateSource> {
        self.sources
            .iter()
            .map(|s| &**s)
            .filter(move |s| selection.is_none_or(|kind| s.kind() == kind))
    }

    /// Queries the selected sources (all when `selection` is `None`), merges
    /// their rates and replaces the cached snapshot. A failing source only
    /// loses its own rates; the refresh fails when nothing was fetched.
    pub async fn run_update(
        &self,
        store: &dyn LedgerStore,
        selection: Option<SourceKind>,
        on_source_done: &(dyn Fn(&SourceOutcome) + Sync),
    ) -> LedgerResult<RefreshReport> {
        let fetches = self.selected(selection).map(|source| async move {
            let result = source.fetch_rates().await;
            let outcome = SourceOutcome {
                kind: source.kind(),
                name: source.name().to_string(),
                result: result
                    .as_ref()
                    .map(BTreeMap::len)
                    .map_err(ToString::to_string),
            };
            on_source_done(&outcome);
            (outcome, result)
        });

        let mut merged: BTreeMap<String, RateEntry> = BTreeMap::new();
        let mut outcomes = Vec::new();
        for (outcome, result) in join_all(fetches).await {
            match result {
                Ok(rates) => {
                    info!(source = %outcome.name, count = rates.len(), "Fetched rates");
                    merged.extend(rates);
                }
                Err(e) => warn!(source = %outcome.name, error = %e, "Rate source failed"),
            }
            outcomes.push(outcome);
        }

        if merged.is_empty() {
            warn!(action = "update", "No rates fetched from any source");
            return Err(LedgerError::NoRatesFetched);
        }

        let last_refresh = Utc::now();
        let snapshot = RatesSnapshot {
            pairs: merged,
            last_refresh: Some(last_refresh),
        };
        store.save_rates(&snapshot)?;

        // The cache is already replaced; a history failure only loses rows.
        let mut history_saved = true;
        if self.keep_history {
            let records: Vec<RateRecord> = snapshot
                .pairs
                .iter()
                .filter_map(|(key, entry)| RateRecord::from_entry(key, entry))
                .collect();
            match store.append_history(&records) {
                Ok(()) => debug!("Appended {} history records", records.len()),
                Err(e) => {
                    warn!(action = "update", error = %e, "Failed to append rate history");
                    history_saved = false;
                }
            }
        }

        info!(action = "update", total = snapshot.pairs.len(), "Rates refreshed");
        Ok(RefreshReport {
            outcomes,
            total: snapshot.pairs.len(),
            last_refresh,
            history_saved,
        })
    }

    /// Refreshes immediately and then every `interval`, until `max_runs`
    /// cycles have run or Ctrl-C is received. Returns the number of cycles.
    pub async fn run_scheduler(
        &self,
        store: &dyn LedgerStore,
        interval: Duration,
        max_runs: Option<usize>,
    ) -> usize {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };
        self.run_scheduler_until(store, interval, max_runs, ctrl_c)
            .await
    }

    /// Like [`run_scheduler`](Self::run_scheduler), stopping when `shutdown`
    /// completes. A refresh in flight is abandoned and not counted.
    pub async fn run_scheduler_until(
        &self,
        store: &dyn LedgerStore,
        interval: Duration,
        max_runs: Option<usize>,
        shutdown: impl Future<Output = ()>,
    ) -> usize {
        info!(interval_secs = interval.as_secs(), ?max_runs, "Scheduler started");
        // One listener for the whole run so no signal is missed between cycles.
        tokio::pin!(shutdown);
        let no_progress = |_: &SourceOutcome| {};
        let mut runs = 0;
        loop {
            tokio::select! {
                result = self.run_update(store, None, &no_progress) => match result {
                    Ok(report) => info!(run = runs + 1, total = report.total, "Scheduled refresh done"),
                    Err(e) => warn!(run = runs + 1, error = %e, "Scheduled refresh failed"),
                },
                _ = &mut shutdown => {
                    info!("Scheduler interrupted during refresh");
                    break;
                }
            }
            runs += 1;

            if max_runs.is_some_and(|max| runs >= max) {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = &mut shutdown => {
                    info!("Scheduler interrupted");
                    break;
                }
            }
        }
        info!(runs, "Scheduler stopped");
        runs
    }
}
