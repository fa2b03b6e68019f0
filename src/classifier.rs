// Snapshot Station - Classifier
// Decides whether one raw reading is usable or must be discarded

use chrono::{DateTime, Utc};

use crate::model::{DiscardReason, DiscardedSnapshot, RawSnapshot, ValidSnapshot};

/// Readings older than this are discarded with reason `age`.
pub const MAX_SNAPSHOT_AGE_SECS: f64 = 3600.0;

/// Outcome of classifying one raw snapshot. Exactly one variant per reading.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Valid(ValidSnapshot),
    Discarded(DiscardedSnapshot),
}

impl Classification {
    pub fn reason(&self) -> Option<DiscardReason> {
        match self {
            Classification::Valid(_) => None,
            Classification::Discarded(s) => Some(s.reason),
        }
    }
}

/// Convert sensor-reported epoch seconds to an instant.
fn snapshot_instant(epoch_secs: f64) -> Option<DateTime<Utc>> {
    // `as` saturates, so absurd values fall outside chrono's range and map
    // to None rather than wrapping.
    DateTime::from_timestamp_millis((epoch_secs * 1000.0) as i64)
}

/// Classify one raw snapshot against `observed_at`.
///
/// First match wins, in this order:
/// 1. older than [`MAX_SNAPSHOT_AGE_SECS`] → `age`
/// 2. `"system"` tag present → `system`
/// 3. `"suspect"` tag present → `suspect`
/// 4. otherwise accepted
///
/// An old reading that also carries a `system` tag therefore reports `age`.
/// Tag membership is exact string equality over the whole tag list. Pure
/// decision function; persisting the returned variant is the caller's job.
pub fn classify(raw: &RawSnapshot, observed_at: DateTime<Utc>) -> Classification {
    let time = match snapshot_instant(raw.time) {
        Some(time) => time,
        None => {
            // Epoch value outside the representable range: the reading
            // cannot be trusted, keep it under the observation instant.
            return Classification::Discarded(DiscardedSnapshot {
                time: observed_at,
                value: raw.value,
                tags: raw.tags.clone(),
                reason: DiscardReason::Suspect,
                discarded_at: observed_at,
            });
        }
    };

    let age_secs = (observed_at - time).num_milliseconds() as f64 / 1000.0;

    let reason = if age_secs > MAX_SNAPSHOT_AGE_SECS {
        Some(DiscardReason::Age)
    } else if raw.tags.iter().any(|t| t == "system") {
        Some(DiscardReason::System)
    } else if raw.tags.iter().any(|t| t == "suspect") {
        Some(DiscardReason::Suspect)
    } else {
        None
    };

    match reason {
        Some(reason) => Classification::Discarded(DiscardedSnapshot {
            time,
            value: raw.value,
            tags: raw.tags.clone(),
            reason,
            discarded_at: observed_at,
        }),
        None => Classification::Valid(ValidSnapshot {
            time,
            value: raw.value,
            tags: raw.tags.clone(),
        }),
    }
}

// ============================================================================
// TESTS
// ============================================================================
