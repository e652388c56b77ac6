use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trading venue that publishes funding rates.
///
/// Variants are declared in the same order as their short names sort, so the
/// derived `Ord` matches lexical order of `as_str()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Venue {
    Aster,
    Based,
    Lighter,
    Variational,
}

impl Venue {
    pub const ALL: [Venue; 4] = [Venue::Aster, Venue::Based, Venue::Lighter, Venue::Variational];

    pub fn as_str(&self) -> &'static str {
        match self {
            Venue::Aster => "Aster",
            Venue::Based => "Based",
            Venue::Lighter => "Lighter",
            Venue::Variational => "Variational",
        }
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVenue(pub String);

impl fmt::Display for UnknownVenue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown venue: {}", self.0)
    }
}

impl std::error::Error for UnknownVenue {}

impl FromStr for Venue {
    type Err = UnknownVenue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Venue::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownVenue(s.to_string()))
    }
}

// One normalised funding-rate observation. `rate` is in percent units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    pub symbol: String,
    pub venue: Venue,
    pub rate: f64,
    pub observed_at: DateTime<Utc>,
}

impl RateRecord {
    pub fn new(symbol: impl Into<String>, venue: Venue, rate: f64) -> Self {
        Self { symbol: symbol.into(), venue, rate, observed_at: Utc::now() }
    }
}

/// symbol -> venue -> latest rate.
///
/// A `None` entry means the venue is known for the symbol but has no usable
/// rate; a missing entry means it was never observed. Both are skipped by the
/// opportunity scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RateTable {
    rows: BTreeMap<String, BTreeMap<Venue, Option<f64>>>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last write wins for the exact (symbol, venue) pair.
    pub fn insert(&mut self, symbol: &str, venue: Venue, rate: Option<f64>) {
        match self.rows.get_mut(symbol) {
            Some(row) => {
                row.insert(venue, rate);
            }
            None => {
                self.rows.insert(symbol.to_string(), BTreeMap::from([(venue, rate)]));
            }
        }
    }

    pub fn get(&self, symbol: &str, venue: Venue) -> Option<f64> {
        self.rows.get(symbol).and_then(|row| row.get(&venue).copied().flatten())
    }

    pub fn rows(&self) -> impl Iterator<Item = (&str, &BTreeMap<Venue, Option<f64>>)> {
        self.rows.iter().map(|(s, row)| (s.as_str(), row))
    }

    pub fn symbol_count(&self) -> usize {
        self.rows.len()
    }
}

/// A short/long venue pair for one symbol whose rate spread clears the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: String,
    pub symbol: String,
    pub short_venue: Venue,
    pub long_venue: Venue,
    pub short_rate: f64,
    pub long_rate: f64,
    pub spread: f64,
    pub computed_at: DateTime<Utc>,
}

impl Opportunity {
    pub fn make_id(symbol: &str, short_venue: Venue, long_venue: Venue) -> String {
        format!("{symbol}-{short_venue}-{long_venue}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Idle => "Idle",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Error => "Error",
        };
        f.write_str(s)
    }
}

/// Read-only view handed to the presentation boundary.
#[derive(Debug, Clone, Serialize)]
pub struct MarketSnapshot {
    pub rates: std::sync::Arc<RateTable>,
    pub opportunities: std::sync::Arc<Vec<Opportunity>>,
    pub last_updated: Option<DateTime<Utc>>,
    pub stream_status: ConnectionState,
}
