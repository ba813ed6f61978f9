//! Value types shared by every storage backend

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Opaque crawl checkpoint document
///
/// Saved and loaded wholesale; the storage layer never looks inside it.
pub type CrawlState = serde_json::Map<String, serde_json::Value>;

/// One pending frontier entry
///
/// The JSON form of this struct is the wire format used by the Redis
/// backend, so every field is always written (`null` for absent mission data).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Absolute URL to fetch
    pub url: String,

    /// Crawl depth from the seed
    pub depth: i64,

    /// Positive = high, zero = normal, negative = low
    #[serde(default)]
    pub priority: i64,

    /// Driver-defined grouping tag, carried through unchanged
    #[serde(default)]
    pub mission_id: Option<String>,

    /// Remaining fetch budget for the mission, carried through unchanged
    #[serde(default)]
    pub mission_budget: Option<i64>,
}

impl QueueItem {
    /// Creates a normal-priority item with no mission attached
    pub fn new(url: impl Into<String>, depth: i64) -> Self {
        Self {
            url: url.into(),
            depth,
            priority: 0,
            mission_id: None,
            mission_budget: None,
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_mission(mut self, mission_id: impl Into<String>, budget: Option<i64>) -> Self {
        self.mission_id = Some(mission_id.into());
        self.mission_budget = budget;
        self
    }

    /// The lane this item is stored in
    pub fn lane(&self) -> Lane {
        Lane::for_priority(self.priority)
    }
}

/// One of the three FIFO priority lanes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    High,
    Normal,
    Low,
}

impl Lane {
    pub const ALL: [Lane; 3] = [Lane::High, Lane::Normal, Lane::Low];

    /// Selects a lane by the sign of a priority value
    pub fn for_priority(priority: i64) -> Self {
        match priority {
            p if p > 0 => Self::High,
            0 => Self::Normal,
            _ => Self::Low,
        }
    }

    /// Order in which `dequeue` tries the lanes
    ///
    /// * no preference or positive: high, normal, low
    /// * zero: normal, high, low
    /// * negative: low, normal, high
    pub fn drain_order(prefer_priority: Option<i64>) -> [Lane; 3] {
        match prefer_priority {
            None => [Self::High, Self::Normal, Self::Low],
            Some(p) if p > 0 => [Self::High, Self::Normal, Self::Low],
            Some(0) => [Self::Normal, Self::High, Self::Low],
            Some(_) => [Self::Low, Self::Normal, Self::High],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
        }
    }
}

/// Live item counts per lane
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaneSizes {
    pub high: u64,
    pub normal: u64,
    pub low: u64,
}

impl LaneSizes {
    pub fn total(&self) -> u64 {
        self.high + self.normal + self.low
    }

    pub(crate) fn add(&mut self, lane: Lane, count: u64) {
        match lane {
            Lane::High => self.high += count,
            Lane::Normal => self.normal += count,
            Lane::Low => self.low += count,
        }
    }
}

/// Current wall-clock time as fractional seconds since the Unix epoch
pub fn now_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
