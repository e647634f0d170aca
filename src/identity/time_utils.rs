//! Time utilities for safe timestamp handling.
//!
//! This module provides safe alternatives to direct SystemTime operations
//! that could potentially panic.

use crate::identity::error::IdentityError;
use chrono::{DateTime, Utc};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Minimum time a credential must still have left before it is reissued.
pub const MIN_REMAINING_HORIZON: Duration = Duration::from_secs(24 * 60 * 60);

/// Get current timestamp in seconds since Unix epoch.
///
/// In the extremely rare case where system time is before Unix epoch,
/// it returns an error instead of panicking.
pub(crate) fn current_timestamp() -> Result<i64, IdentityError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .map_err(|_| IdentityError::ClockError("System time is before Unix epoch".to_string()))
}

/// Check that `expiry` lies strictly more than [`MIN_REMAINING_HORIZON`] after `now`.
pub(crate) fn has_min_horizon(expiry: i64, now: i64) -> bool {
    if expiry <= now {
        return false;
    }
    expiry.saturating_sub(now) > MIN_REMAINING_HORIZON.as_secs() as i64
}

/// Format a Unix timestamp as an HTTP date (`Sun, 06 Nov 1994 08:49:37 GMT`).
pub(crate) fn http_date(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .unwrap_or(DateTime::UNIX_EPOCH)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}
