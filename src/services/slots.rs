use chrono::{NaiveDate, NaiveTime};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::hours::{add_minutes, overlaps, BusinessHours};
use crate::models::{Appointment, Slot};

use super::catalog;

pub const SLOT_GRANULARITY_MINUTES: i64 = 30;

pub struct AvailabilityView {
    pub slots: Vec<Slot>,
    pub service_duration: i64,
    pub opening_time: NaiveTime,
    pub closing_time: NaiveTime,
}

/// Walks the business day in 30-minute steps and marks each candidate
/// start free or taken. A candidate only counts if the service fits
/// fully before closing time.
pub fn generate_slots(
    hours: BusinessHours,
    duration_minutes: i64,
    existing: &[Appointment],
) -> Vec<Slot> {
    let mut slots = vec![];
    let mut cursor = hours.opening;

    while cursor < hours.closing {
        let Some(end) = add_minutes(cursor, duration_minutes) else {
            break;
        };
        if end > hours.closing {
            break;
        }

        let available = existing
            .iter()
            .all(|a| !overlaps(cursor, end, a.start_time, a.end_time));

        slots.push(Slot {
            start_time: cursor,
            end_time: end,
            available,
        });

        match add_minutes(cursor, SLOT_GRANULARITY_MINUTES) {
            Some(next) => cursor = next,
            None => break,
        }
    }

    slots
}

/// Slot listing for one staff member, date and service. Read-only: the
/// answer may go stale under concurrent bookings, the authoritative
/// overlap check runs again inside `reservations::reserve`.
pub fn availability(
    conn: &Connection,
    salon_id: &str,
    staff_id: &str,
    service_id: &str,
    date: NaiveDate,
    today: NaiveDate,
) -> Result<AvailabilityView, AppError> {
    let salon = catalog::resolve_salon(conn, salon_id)?;
    let staff = catalog::resolve_staff(conn, staff_id)?;
    let service = catalog::resolve_service(conn, service_id)?;

    if staff.salon_id != salon.id {
        return Err(AppError::Validation(format!(
            "staff {} does not work at salon {}",
            staff.id, salon.id
        )));
    }

    if date < today {
        return Err(AppError::Validation("date is in the past".to_string()));
    }

    let hours = salon.hours()?;
    let existing = queries::get_active_for_staff_date(conn, &staff.id, date, None)?;
    let slots = generate_slots(hours, service.duration_minutes, &existing);

    Ok(AvailabilityView {
        slots,
        service_duration: service.duration_minutes,
        opening_time: hours.opening,
        closing_time: hours.closing,
    })
}
