use chrono::{DateTime, Duration, Utc};

/// Returns the current wall-clock time
pub fn current_time() -> DateTime<Utc> {
    Utc::now()
}

/// Expiry instant for a pool created at `created_at`, if a lifetime is configured
pub fn expiry_from(created_at: DateTime<Utc>, ttl_hours: Option<u64>) -> Option<DateTime<Utc>> {
    ttl_hours
        .and_then(|hours| i64::try_from(hours).ok())
        .and_then(Duration::try_hours)
        .map(|ttl| created_at + ttl)
}

/// Returns `true` once `now` has reached `expires_at`
pub fn is_expired(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    matches!(expires_at, Some(at) if at <= now)
}
