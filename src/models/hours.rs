use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Daily opening window of a salon. Invariant: `opening < closing`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BusinessHours {
    pub opening: NaiveTime,
    pub closing: NaiveTime,
}

impl BusinessHours {
    pub fn new(opening: NaiveTime, closing: NaiveTime) -> anyhow::Result<Self> {
        anyhow::ensure!(
            opening < closing,
            "opening time {} must be before closing time {}",
            fmt_hhmm(opening),
            fmt_hhmm(closing)
        );
        Ok(Self { opening, closing })
    }

    /// Whether `[start, end)` lies fully inside the business day.
    pub fn contains_interval(&self, start: NaiveTime, end: NaiveTime) -> bool {
        start >= self.opening && end <= self.closing
    }
}

pub fn parse_hhmm(s: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|_| anyhow::anyhow!("invalid time format: {s}"))
}

pub fn fmt_hhmm(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

/// `t + minutes`, or None if the result would cross midnight. NaiveTime
/// arithmetic wraps, which would silently turn a late slot into an early
/// one, so the bound is checked on raw minutes instead.
pub fn add_minutes(t: NaiveTime, minutes: i64) -> Option<NaiveTime> {
    let total = i64::from(t.hour()) * 60 + i64::from(t.minute()) + minutes;
    if !(0..24 * 60).contains(&total) {
        return None;
    }
    NaiveTime::from_hms_opt(total as u32 / 60, total as u32 % 60, 0)
}

/// Half-open interval overlap: `[s1,e1)` and `[s2,e2)` overlap iff
/// `s1 < e2 && s2 < e1`.
pub fn overlaps(s1: NaiveTime, e1: NaiveTime, s2: NaiveTime, e2: NaiveTime) -> bool {
    s1 < e2 && s2 < e1
}
