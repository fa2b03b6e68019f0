// Snapshot Station - Data Model
// Snapshot types shared by the classifier, store, and query API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// RAW SNAPSHOT (upstream, untrusted)
// ============================================================================

/// One reading as delivered by the sensor endpoint.
///
/// `time` is unix epoch seconds as reported by the sensor (fractional values
/// allowed); the classifier converts it to an instant.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSnapshot {
    pub time: f64,
    pub value: f64,
    pub tags: Vec<String>,
}

// ============================================================================
// CLASSIFIED SNAPSHOTS
// ============================================================================

/// A snapshot that passed every classification check.
/// Immutable once created; owned by the store after persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidSnapshot {
    pub time: DateTime<Utc>,
    pub value: f64,
    pub tags: Vec<String>,
}

/// A snapshot that failed a classification check.
///
/// `time` is the sensor-reported instant; `discarded_at` is when
/// classification happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscardedSnapshot {
    pub time: DateTime<Utc>,
    pub value: f64,
    pub tags: Vec<String>,
    pub reason: DiscardReason,
    pub discarded_at: DateTime<Utc>,
}

// ============================================================================
// DISCARD REASON
// ============================================================================

/// Why a snapshot was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscardReason {
    /// Reading older than the freshness window.
    Age,
    /// Flagged unreliable by the sensor.
    Suspect,
    /// System-internal reading, not a real measurement.
    System,
}

impl DiscardReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscardReason::Age => "age",
            DiscardReason::Suspect => "suspect",
            DiscardReason::System => "system",
        }
    }
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscardReason {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "age" => Ok(DiscardReason::Age),
            "suspect" => Ok(DiscardReason::Suspect),
            "system" => Ok(DiscardReason::System),
            _ => Err(()),
        }
    }
}

// ============================================================================
// TIME RANGE
// ============================================================================

/// Closed interval of instants; both endpoints are included in queries.
/// Invariant: `start <= end` (enforced by the temporal validator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// The range covering every representable instant.
    pub fn unbounded() -> Self {
        TimeRange {
            start: DateTime::<Utc>::MIN_UTC,
            end: DateTime::<Utc>::MAX_UTC,
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

// ============================================================================
// TESTS
// ============================================================================
