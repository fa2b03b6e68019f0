// Snapshot Station - Query Service
// Validates read-request parameters and delegates to the snapshot store

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{error, warn};

use crate::model::{DiscardReason, DiscardedSnapshot, TimeRange, ValidSnapshot};
use crate::store::{SnapshotStore, StoreError};
use crate::temporal::{validate_range, RangeError};

/// Rejection or failure of one read request.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Invalid parameters, only {0} accepted")]
    UnknownParameter(&'static str),

    #[error("Invalid 'reason' value. Only 'age', 'suspect' or 'system' accepted")]
    InvalidReason,

    #[error(transparent)]
    Range(#[from] RangeError),

    #[error("Server error: {0}")]
    Store(#[from] StoreError),
}

impl QueryError {
    /// Validation rejections are the caller's fault; store failures are ours.
    pub fn is_validation(&self) -> bool {
        !matches!(self, QueryError::Store(_))
    }
}

const VALID_PARAMS: &[&str] = &["start", "end"];
const DISCARDED_PARAMS: &[&str] = &["start", "end", "reason"];

/// Answers time-bounded read requests over the two snapshot relations.
#[derive(Clone)]
pub struct QueryService {
    store: SnapshotStore,
}

impl QueryService {
    pub fn new(store: SnapshotStore) -> Self {
        QueryService { store }
    }

    /// Valid snapshots in the requested range. Accepts `start` and `end`.
    pub fn valid_snapshots(
        &self,
        params: &HashMap<String, String>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ValidSnapshot>, QueryError> {
        check_params(params, VALID_PARAMS, "'start' or 'end'")?;

        let range = self.range_from(params, now)?;

        self.store.valid_in_range(&range).map_err(|err| {
            error!(error = %err, "valid snapshot query failed");
            err.into()
        })
    }

    /// Discarded snapshots in the requested range, optionally filtered by
    /// reason. Accepts `start`, `end` and `reason`.
    pub fn discarded_snapshots(
        &self,
        params: &HashMap<String, String>,
        now: DateTime<Utc>,
    ) -> Result<Vec<DiscardedSnapshot>, QueryError> {
        check_params(params, DISCARDED_PARAMS, "'start', 'end' or 'reason'")?;

        let reason = match params.get("reason").filter(|r| !r.is_empty()) {
            Some(raw) => Some(raw.parse::<DiscardReason>().map_err(|_| {
                warn!(reason = %raw, "invalid reason value");
                QueryError::InvalidReason
            })?),
            None => None,
        };

        let range = self.range_from(params, now)?;

        self.store
            .discarded_in_range(&range, reason)
            .map_err(|err| {
                error!(error = %err, "discarded snapshot query failed");
                err.into()
            })
    }

    fn range_from(
        &self,
        params: &HashMap<String, String>,
        now: DateTime<Utc>,
    ) -> Result<TimeRange, QueryError> {
        validate_range(
            params.get("start").map(String::as_str),
            params.get("end").map(String::as_str),
            now,
        )
        .map_err(|err| {
            warn!(
                start = params.get("start").map(String::as_str).unwrap_or(""),
                end = params.get("end").map(String::as_str).unwrap_or(""),
                error = %err,
                "rejected time range"
            );
            err.into()
        })
    }
}

fn check_params(
    params: &HashMap<String, String>,
    allowed: &[&str],
    accepted: &'static str,
) -> Result<(), QueryError> {
    let unknown: Vec<&str> = params
        .keys()
        .map(String::as_str)
        .filter(|key| !allowed.contains(key))
        .collect();

    if unknown.is_empty() {
        Ok(())
    } else {
        warn!(parameters = ?unknown, "invalid query parameters");
        Err(QueryError::UnknownParameter(accepted))
    }
}

// ============================================================================
// TESTS
// ============================================================================
