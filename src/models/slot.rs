use chrono::NaiveTime;
use serde::Serialize;

/// A candidate start time for a service, with its derived end time.
#[derive(Debug, Clone, Serialize)]
pub struct Slot {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub available: bool,
}
