//! Cached exchange rates and freshness rules

use super::timestamp;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Builds the directional key `"{FROM}_{TO}"`.
pub fn pair_key(from: &str, to: &str) -> String {
    format!("{}_{}", from.to_uppercase(), to.to_uppercase())
}

/// Splits a pair key back into its currencies.
pub fn split_pair(key: &str) -> Option<(&str, &str)> {
    key.split_once('_')
}

pub fn is_fresh(updated_at: DateTime<Utc>, ttl: Duration, now: DateTime<Utc>) -> bool {
    now - updated_at < ttl
}

/// Price of one unit of FROM expressed in TO.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateEntry {
    pub rate: f64,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub updated_at: DateTime<Utc>,
    pub source: String,
}

impl RateEntry {
    pub fn new(rate: f64, updated_at: DateTime<Utc>, source: &str) -> Self {
        Self {
            rate,
            updated_at,
            source: source.to_string(),
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.updated_at
    }
}

/// Contents of `rates.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatesSnapshot {
    #[serde(default)]
    pub pairs: BTreeMap<String, RateEntry>,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub last_refresh: Option<DateTime<Utc>>,
}

/// A rate resolved from the cache, possibly by inverting the reverse pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRate {
    pub rate: f64,
    pub updated_at: DateTime<Utc>,
    pub source: String,
    pub inverted: bool,
}

impl ResolvedRate {
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        is_fresh(self.updated_at, ttl, now)
    }
}

impl RatesSnapshot {
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Finds `from -> to`: identity for equal codes, then the direct pair,
    /// then the reciprocal of `to -> from`.
    pub fn lookup(&self, from: &str, to: &str) -> Option<ResolvedRate> {
        let (from, to) = (from.to_uppercase(), to.to_uppercase());
        if from == to {
            return Some(ResolvedRate {
                rate: 1.0,
                updated_at: Utc::now(),
                source: "identity".to_string(),
                inverted: false,
            });
        }

        let usable = |entry: &&RateEntry| entry.rate.is_finite() && entry.rate > 0.0;

        if let Some(entry) = self.pairs.get(&pair_key(&from, &to)).filter(usable) {
            return Some(ResolvedRate {
                rate: entry.rate,
                updated_at: entry.updated_at,
                source: entry.source.clone(),
                inverted: false,
            });
        }

        self.pairs
            .get(&pair_key(&to, &from))
            .filter(usable)
            .map(|entry| ResolvedRate {
                rate: 1.0 / entry.rate,
                updated_at: entry.updated_at,
                source: entry.source.clone(),
                inverted: true,
            })
    }

    /// Pairs involving `code` on either side, or every pair when `code` is `None`.
    pub fn pairs_involving<'a>(
        &'a self,
        code: Option<&'a str>,
    ) -> impl Iterator<Item = (&'a String, &'a RateEntry)> + 'a {
        self.pairs.iter().filter(move |(key, _)| match code {
            None => true,
            Some(code) => {
                split_pair(key).is_some_and(|(from, to)| from == code || to == code)
            }
        })
    }
}

/// One row of the append-only rate history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    pub id: String,
    pub from_currency: String,
    pub to_currency: String,
    pub rate: f64,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
    pub source: String,
}

impl RateRecord {
    pub fn from_entry(key: &str, entry: &RateEntry) -> Option<Self> {
        let (from, to) = split_pair(key)?;
        Some(Self {
            id: format!("{}_{}", key, entry.updated_at.format("%Y-%m-%dT%H:%M:%SZ")),
            from_currency: from.to_string(),
            to_currency: to.to_string(),
            rate: entry.rate,
            timestamp: entry.updated_at,
            source: entry.source.clone(),
        })
    }
}
