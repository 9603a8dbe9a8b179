use time::OffsetDateTime;

/// Seconds since the unix epoch, according to the local clock.
pub(crate) fn now_unix_seconds() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

pub(crate) trait TimeDurationExt {
    /// Negative durations saturate at zero.
    fn to_std_duration(self) -> std::time::Duration;
}

impl TimeDurationExt for time::Duration {
    fn to_std_duration(self) -> std::time::Duration {
        std::time::Duration::try_from(self).unwrap_or(std::time::Duration::ZERO)
    }
}
