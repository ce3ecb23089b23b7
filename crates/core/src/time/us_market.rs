use chrono::{DateTime, Duration, NaiveDate, Utc};

/// The digest runs on mornings after a US session closed (the scheduler
/// fires five of seven days). At that point the newest end-of-day close the
/// source can have is the previous UTC calendar day.
pub fn expected_session_date(now_utc: DateTime<Utc>) -> NaiveDate {
    now_utc.date_naive() - Duration::days(1)
}

/// False when the newest fetched session is older than expected, i.e. the
/// market did not trade yesterday (weekend or US holiday). The run then
/// skips instead of reporting stale figures.
pub fn is_fresh(latest_session: NaiveDate, now_utc: DateTime<Utc>) -> bool {
    latest_session == expected_session_date(now_utc)
}
