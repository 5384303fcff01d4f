use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};

/// Fires once per UTC day at a fixed time of day. Missed days are never
/// replayed: the next run is always computed from the current clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    at: NaiveTime,
}

impl Default for DailySchedule {
    fn default() -> Self {
        Self { at: NaiveTime::MIN }
    }
}

impl DailySchedule {
    pub fn new(at: NaiveTime) -> Self {
        Self { at }
    }

    /// Accepts `HH:MM` or `HH:MM:SS`.
    pub fn parse(value: &str) -> Option<Self> {
        NaiveTime::parse_from_str(value, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
            .ok()
            .map(Self::new)
    }

    /// 嚴格晚於 `now` 的下一個觸發時間
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive().and_time(self.at).and_utc();
        if today > now {
            today
        } else {
            today + ChronoDuration::days(1)
        }
    }

    /// How long to sleep from `now` until the next run.
    pub fn wait_from(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.next_after(now) - now)
            .to_std()
            .unwrap_or(std::time::Duration::ZERO)
    }
}
