use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rusqlite::{params, Connection};

use crate::models::{Appointment, AppointmentStatus, PaymentStatus, Salon, Service, Staff};

const DATE_FMT: &str = "%Y-%m-%d";
const TIME_FMT: &str = "%H:%M";
const TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M:%S";

// ── Catalog ──

pub fn insert_salon(conn: &Connection, salon: &Salon) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO salons (id, name, opening_time, closing_time) VALUES (?1, ?2, ?3, ?4)",
        params![
            salon.id,
            salon.name,
            salon.opening_time.format(TIME_FMT).to_string(),
            salon.closing_time.format(TIME_FMT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_salon(conn: &Connection, id: &str) -> anyhow::Result<Option<Salon>> {
    let result = conn.query_row(
        "SELECT id, name, opening_time, closing_time FROM salons WHERE id = ?1",
        params![id],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        },
    );

    match result {
        Ok((id, name, opening, closing)) => Ok(Some(Salon {
            id,
            name,
            opening_time: parse_time(&opening)?,
            closing_time: parse_time(&closing)?,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn insert_service(conn: &Connection, service: &Service) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO services (id, salon_id, name, duration_minutes, price) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            service.id,
            service.salon_id,
            service.name,
            service.duration_minutes,
            service.price,
        ],
    )?;
    Ok(())
}

pub fn get_service(conn: &Connection, id: &str) -> anyhow::Result<Option<Service>> {
    let result = conn.query_row(
        "SELECT id, salon_id, name, duration_minutes, price FROM services WHERE id = ?1",
        params![id],
        |row| {
            Ok(Service {
                id: row.get(0)?,
                salon_id: row.get(1)?,
                name: row.get(2)?,
                duration_minutes: row.get(3)?,
                price: row.get(4)?,
            })
        },
    );

    match result {
        Ok(service) => Ok(Some(service)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn insert_staff(conn: &Connection, staff: &Staff) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO staff (id, salon_id, name) VALUES (?1, ?2, ?3)",
        params![staff.id, staff.salon_id, staff.name],
    )?;
    Ok(())
}

pub fn get_staff(conn: &Connection, id: &str) -> anyhow::Result<Option<Staff>> {
    let result = conn.query_row(
        "SELECT id, salon_id, name FROM staff WHERE id = ?1",
        params![id],
        |row| {
            Ok(Staff {
                id: row.get(0)?,
                salon_id: row.get(1)?,
                name: row.get(2)?,
            })
        },
    );

    match result {
        Ok(staff) => Ok(Some(staff)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ── Appointments ──

const APPOINTMENT_COLUMNS: &str = "id, group_id, salon_id, staff_id, service_id, customer_id, \
     booking_date, start_time, end_time, status, notes, payment_method, payment_status, \
     created_at, updated_at";

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO appointments (id, group_id, salon_id, staff_id, service_id, customer_id,
             booking_date, start_time, end_time, status, notes, payment_method, payment_status,
             created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            appt.id,
            appt.group_id,
            appt.salon_id,
            appt.staff_id,
            appt.service_id,
            appt.customer_id,
            appt.booking_date.format(DATE_FMT).to_string(),
            appt.start_time.format(TIME_FMT).to_string(),
            appt.end_time.format(TIME_FMT).to_string(),
            appt.status.as_str(),
            appt.notes,
            appt.payment_method,
            appt.payment_status.as_str(),
            appt.created_at.format(TIMESTAMP_FMT).to_string(),
            appt.updated_at.format(TIMESTAMP_FMT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_appointment_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Appointment>> {
    let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1");
    let result = conn.query_row(&sql, params![id], |row| Ok(parse_appointment_row(row)));

    match result {
        Ok(appt) => Ok(Some(appt?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Active (pending/confirmed) appointments for one staff member on one
/// date, optionally excluding a group (used when rescheduling that group).
pub fn get_active_for_staff_date(
    conn: &Connection,
    staff_id: &str,
    date: NaiveDate,
    exclude_group: Option<&str>,
) -> anyhow::Result<Vec<Appointment>> {
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE staff_id = ?1 AND booking_date = ?2
           AND status IN ('pending', 'confirmed')
           AND group_id != ?3
         ORDER BY start_time ASC"
    );
    let mut stmt = conn.prepare(&sql)?;

    let date_str = date.format(DATE_FMT).to_string();
    let rows = stmt.query_map(params![staff_id, date_str, exclude_group.unwrap_or("")], |row| {
        Ok(parse_appointment_row(row))
    })?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

pub fn get_group_appointments(conn: &Connection, group_id: &str) -> anyhow::Result<Vec<Appointment>> {
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE group_id = ?1 ORDER BY booking_date ASC, start_time ASC"
    );
    let mut stmt = conn.prepare(&sql)?;

    let rows = stmt.query_map(params![group_id], |row| Ok(parse_appointment_row(row)))?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

pub fn update_appointment_status(
    conn: &Connection,
    id: &str,
    status: AppointmentStatus,
) -> anyhow::Result<bool> {
    let now = Utc::now().naive_utc().format(TIMESTAMP_FMT).to_string();
    let count = conn.execute(
        "UPDATE appointments SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now, id],
    )?;
    Ok(count > 0)
}

/// Moves one row to a new visit slot; group_id changes with the tuple it
/// is derived from.
pub fn update_appointment_times(
    conn: &Connection,
    id: &str,
    group_id: &str,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
) -> anyhow::Result<()> {
    let now = Utc::now().naive_utc().format(TIMESTAMP_FMT).to_string();
    conn.execute(
        "UPDATE appointments
         SET group_id = ?1, booking_date = ?2, start_time = ?3, end_time = ?4, updated_at = ?5
         WHERE id = ?6",
        params![
            group_id,
            date.format(DATE_FMT).to_string(),
            start.format(TIME_FMT).to_string(),
            end.format(TIME_FMT).to_string(),
            now,
            id,
        ],
    )?;
    Ok(())
}

pub fn list_appointments(
    conn: &Connection,
    staff_id: Option<&str>,
    date: Option<NaiveDate>,
    status: Option<AppointmentStatus>,
    limit: i64,
) -> anyhow::Result<Vec<Appointment>> {
    let mut sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE 1=1");
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(staff_id) = staff_id {
        params_vec.push(Box::new(staff_id.to_string()));
        sql.push_str(&format!(" AND staff_id = ?{}", params_vec.len()));
    }
    if let Some(date) = date {
        params_vec.push(Box::new(date.format(DATE_FMT).to_string()));
        sql.push_str(&format!(" AND booking_date = ?{}", params_vec.len()));
    }
    if let Some(status) = status {
        params_vec.push(Box::new(status.as_str().to_string()));
        sql.push_str(&format!(" AND status = ?{}", params_vec.len()));
    }
    params_vec.push(Box::new(limit));
    sql.push_str(&format!(
        " ORDER BY booking_date ASC, start_time ASC LIMIT ?{}",
        params_vec.len()
    ));

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_appointment_row(row)))?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

// ── Idempotency ──

pub fn get_booking_request(conn: &Connection, key: &str) -> anyhow::Result<Option<String>> {
    let result = conn.query_row(
        "SELECT group_id FROM booking_requests WHERE idempotency_key = ?1",
        params![key],
        |row| row.get::<_, String>(0),
    );

    match result {
        Ok(group_id) => Ok(Some(group_id)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn insert_booking_request(conn: &Connection, key: &str, group_id: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO booking_requests (idempotency_key, group_id) VALUES (?1, ?2)",
        params![key, group_id],
    )?;
    Ok(())
}

// ── Row parsing ──

fn parse_appointment_row(row: &rusqlite::Row) -> anyhow::Result<Appointment> {
    let id: String = row.get(0)?;
    let group_id: String = row.get(1)?;
    let salon_id: String = row.get(2)?;
    let staff_id: String = row.get(3)?;
    let service_id: String = row.get(4)?;
    let customer_id: String = row.get(5)?;
    let booking_date_str: String = row.get(6)?;
    let start_time_str: String = row.get(7)?;
    let end_time_str: String = row.get(8)?;
    let status_str: String = row.get(9)?;
    let notes: Option<String> = row.get(10)?;
    let payment_method: Option<String> = row.get(11)?;
    let payment_status_str: String = row.get(12)?;
    let created_at_str: String = row.get(13)?;
    let updated_at_str: String = row.get(14)?;

    Ok(Appointment {
        id,
        group_id,
        salon_id,
        staff_id,
        service_id,
        customer_id,
        booking_date: parse_date(&booking_date_str)?,
        start_time: parse_time(&start_time_str)?,
        end_time: parse_time(&end_time_str)?,
        status: AppointmentStatus::parse(&status_str)
            .ok_or_else(|| anyhow::anyhow!("unknown appointment status: {status_str}"))?,
        notes,
        payment_method,
        payment_status: PaymentStatus::parse(&payment_status_str),
        created_at: parse_timestamp(&created_at_str),
        updated_at: parse_timestamp(&updated_at_str),
    })
}

fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FMT).map_err(|_| anyhow::anyhow!("invalid date in row: {s}"))
}

fn parse_time(s: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(s, TIME_FMT).map_err(|_| anyhow::anyhow!("invalid time in row: {s}"))
}

fn parse_timestamp(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FMT).unwrap_or_else(|_| Utc::now().naive_utc())
}
