use chrono::{DateTime, Duration, NaiveTime, Utc};

/// Next instant strictly after `now` at `hour_utc`:00:00 UTC.
/// Hours past 23 are clamped to 23.
pub fn next_daily_run(now: DateTime<Utc>, hour_utc: u32) -> DateTime<Utc> {
    let at = NaiveTime::from_hms_opt(hour_utc.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let today = now.date_naive().and_time(at).and_utc();

    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}
