use chrono::Utc;

/// Source of the current time, in nanoseconds since the Unix epoch
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
    }
}

/// Round `timestamp` to the nearest multiple of `period`
pub fn round_timestamp(timestamp: i64, period: i64) -> i64 {
    if period <= 0 {
        return timestamp;
    }
    let remainder = timestamp.rem_euclid(period);
    let floor = timestamp - remainder;
    if remainder * 2 >= period {
        floor + period
    } else {
        floor
    }
}
