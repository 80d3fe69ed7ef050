pub mod availability;
pub mod bookings;
pub mod health;

use chrono::{NaiveDate, NaiveTime};

use crate::errors::AppError;

pub(crate) fn parse_date_param(s: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("invalid date (expected YYYY-MM-DD): {s}")))
}

pub(crate) fn parse_time_param(s: &str) -> Result<NaiveTime, AppError> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|_| AppError::Validation(format!("invalid time (expected HH:MM): {s}")))
}
