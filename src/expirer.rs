//! Reclaims students stuck in the pending pool for too long.

use chrono::{DateTime, Duration, Utc};
use eyre::Error;
use tracing::{info, instrument};

use crate::loader::Loader;

/// The instant before which a pending student counts as stuck.
pub fn expiry_cutoff(now: DateTime<Utc>, max_pending_hours: i64) -> DateTime<Utc> {
    now - Duration::hours(max_pending_hours)
}

/// Release every student pending longer than `max_pending_hours` back to the
/// available pool. Idempotent; a second pass right after finds nothing.
/// Returns how many students were released.
#[instrument(skip_all)]
pub async fn run<L: Loader>(
    loader: &mut L,
    now: DateTime<Utc>,
    max_pending_hours: i64,
) -> Result<u64, Error> {
    let released = loader
        .expire_pending(expiry_cutoff(now, max_pending_hours), now)
        .await?;
    if released > 0 {
        info!(
            "Released {} students pending for more than {} hours",
            released, max_pending_hours
        );
    }
    Ok(released)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn only_students_past_the_window_fall_before_the_cutoff() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        let cutoff = expiry_cutoff(now, 96);
        assert!(now - Duration::hours(100) < cutoff);
        assert!(now - Duration::hours(90) > cutoff);
    }
}
