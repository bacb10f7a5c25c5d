//! Pure decision function: is a local clone already up to date with the
//! remote, without touching the network?

use chrono::{DateTime, Duration, Utc};

/// Clock-skew tolerance absorbing filesystem timestamp rounding and
/// wall-clock drift between the remote platform and the local host.
pub const CLOCK_SKEW_TOLERANCE: Duration = Duration::seconds(2);

/// Compares the remote's last-push moment against the local clone's
/// last-fetch moment.
///
/// Returns `true` only when both timestamps are present and the remote push
/// happened no later than `local_last_fetch + CLOCK_SKEW_TOLERANCE`. A
/// missing value on either side always yields `false`, forcing a fetch.
pub fn up_to_date(remote_pushed_at: Option<DateTime<Utc>>, local_last_fetch: Option<DateTime<Utc>>) -> bool {
    match (remote_pushed_at, local_last_fetch) {
        (Some(pushed), Some(fetched)) => pushed <= fetched + CLOCK_SKEW_TOLERANCE,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn equal_timestamps_are_up_to_date() {
        assert!(up_to_date(Some(at(1000)), Some(at(1000))));
    }

    #[test]
    fn within_tolerance_is_up_to_date() {
        assert!(up_to_date(Some(at(1000)), Some(at(998))));
    }

    #[test]
    fn beyond_tolerance_is_stale() {
        assert!(!up_to_date(Some(at(1003)), Some(at(1000))));
    }

    #[test]
    fn missing_remote_timestamp_is_stale() {
        assert!(!up_to_date(None, Some(at(1000))));
    }

    #[test]
    fn missing_local_timestamp_is_stale() {
        assert!(!up_to_date(Some(at(1000)), None));
    }

    #[test]
    fn both_missing_is_stale() {
        assert!(!up_to_date(None, None));
    }

    #[test]
    fn reversed_roles_at_three_seconds_is_stale() {
        // local ahead of remote by more than tolerance in the other direction
        // still only cares about remote <= local + tolerance, so a remote
        // well behind the local fetch marker is trivially up to date.
        assert!(up_to_date(Some(at(997)), Some(at(1000))));
        assert!(!up_to_date(Some(at(1000)), Some(at(996))));
    }
}
