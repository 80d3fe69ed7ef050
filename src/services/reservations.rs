//! The authoritative reservation store. All writes to the appointments
//! table go through here, and every conflict-check-then-write sequence
//! runs inside a single SQLite transaction so a failure part-way through
//! a multi-service visit rolls back fully.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::Connection;
use sha1::{Digest, Sha1};
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::hours::{add_minutes, fmt_hhmm, overlaps};
use crate::models::{Appointment, AppointmentStatus, PaymentStatus, Service};

use super::catalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRole {
    Customer,
    Owner,
}

impl ActorRole {
    pub fn parse(s: Option<&str>, default: ActorRole) -> Result<Self, AppError> {
        match s {
            None => Ok(default),
            Some("customer") => Ok(ActorRole::Customer),
            Some("owner") => Ok(ActorRole::Owner),
            Some(other) => Err(AppError::Validation(format!("unknown actor role: {other}"))),
        }
    }
}

/// Who is performing a booking mutation. Customer actors may only touch
/// their own appointments; owner actors are trusted, since verifying the
/// owner's identity is the job of the surrounding auth layer.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: String,
    pub role: ActorRole,
}

#[derive(Debug, Clone)]
pub struct ReservationRequest {
    pub customer_id: String,
    pub salon_id: String,
    pub staff_id: String,
    pub service_ids: Vec<String>,
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub notes: Option<String>,
    pub payment_method: Option<String>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BookingGroup {
    pub group_id: String,
    pub appointments: Vec<Appointment>,
}

/// Deterministic visit identity: one hash of the tuple the sibling rows
/// share, so clients can address the whole visit without reconstructing
/// the tuple themselves.
pub fn group_id(salon_id: &str, staff_id: &str, date: NaiveDate, start: NaiveTime) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!(
        "{salon_id}|{staff_id}|{}|{}",
        date.format("%Y-%m-%d"),
        fmt_hhmm(start)
    ));
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Lays services out back-to-back from the visit start: service N starts
/// where service N-1's allotted duration ends.
fn layout_intervals(
    services: &[Service],
    start: NaiveTime,
) -> Result<Vec<(NaiveTime, NaiveTime)>, AppError> {
    let mut intervals = Vec::with_capacity(services.len());
    let mut cursor = start;

    for service in services {
        let end = add_minutes(cursor, service.duration_minutes).ok_or_else(|| {
            AppError::Validation(format!(
                "service {} starting at {} would run past midnight",
                service.id,
                fmt_hhmm(cursor)
            ))
        })?;
        intervals.push((cursor, end));
        cursor = end;
    }

    Ok(intervals)
}

fn check_conflicts(
    existing: &[Appointment],
    intervals: &[(NaiveTime, NaiveTime)],
) -> Result<(), AppError> {
    for (start, end) in intervals {
        if let Some(taken) = existing
            .iter()
            .find(|a| overlaps(*start, *end, a.start_time, a.end_time))
        {
            return Err(AppError::Conflict(format!(
                "staff {} is already booked {}-{} on {}",
                taken.staff_id,
                fmt_hhmm(taken.start_time),
                fmt_hhmm(taken.end_time),
                taken.booking_date.format("%Y-%m-%d"),
            )));
        }
    }
    Ok(())
}

fn authorize(actor: &Actor, customer_id: &str) -> Result<(), AppError> {
    match actor.role {
        ActorRole::Owner => Ok(()),
        ActorRole::Customer if actor.id == customer_id => Ok(()),
        ActorRole::Customer => Err(AppError::Authorization(
            "appointment belongs to a different customer".to_string(),
        )),
    }
}

fn require_owner(actor: &Actor) -> Result<(), AppError> {
    if actor.role == ActorRole::Owner {
        Ok(())
    } else {
        Err(AppError::Authorization(
            "only the salon owner may do this".to_string(),
        ))
    }
}

/// Confirmed appointments may still be cancelled until `grace_minutes`
/// past their start.
fn check_cancellation_window(
    appt: &Appointment,
    now: NaiveDateTime,
    grace_minutes: i64,
) -> Result<(), AppError> {
    if appt.status == AppointmentStatus::Confirmed
        && now > appt.starts_at() + Duration::minutes(grace_minutes)
    {
        return Err(AppError::InvalidTransition(format!(
            "appointment {} already started at {}",
            appt.id,
            fmt_hhmm(appt.start_time)
        )));
    }
    Ok(())
}

/// Books one visit: every service becomes its own appointment row with
/// its own sub-interval, inserted all-or-nothing. Initial status is
/// always `pending`.
pub fn reserve(
    conn: &mut Connection,
    req: &ReservationRequest,
    now: NaiveDateTime,
) -> Result<BookingGroup, AppError> {
    if req.service_ids.is_empty() {
        return Err(AppError::Validation(
            "at least one service is required".to_string(),
        ));
    }
    if req.booking_date < now.date() {
        return Err(AppError::Validation("booking date is in the past".to_string()));
    }

    let refs = catalog::resolve_booking_refs(conn, &req.salon_id, &req.staff_id, &req.service_ids)?;
    let hours = refs.salon.hours()?;
    let intervals = layout_intervals(&refs.services, req.start_time)?;

    // The visit as a whole must fit the business day
    let visit_end = intervals.last().map(|(_, end)| *end).unwrap_or(req.start_time);
    if !hours.contains_interval(req.start_time, visit_end) {
        return Err(AppError::Validation(format!(
            "visit {}-{} is outside business hours {}-{}",
            fmt_hhmm(req.start_time),
            fmt_hhmm(visit_end),
            fmt_hhmm(hours.opening),
            fmt_hhmm(hours.closing),
        )));
    }

    let gid = group_id(&req.salon_id, &req.staff_id, req.booking_date, req.start_time);

    let tx = conn.transaction()?;

    // Retried request with the same key returns the original group
    if let Some(key) = &req.idempotency_key {
        if let Some(existing_gid) = queries::get_booking_request(&tx, key)? {
            let appointments = queries::get_group_appointments(&tx, &existing_gid)?;
            return Ok(BookingGroup {
                group_id: existing_gid,
                appointments,
            });
        }
    }

    let existing = queries::get_active_for_staff_date(&tx, &req.staff_id, req.booking_date, None)?;
    check_conflicts(&existing, &intervals)?;

    let mut appointments = Vec::with_capacity(intervals.len());
    for (service, (start, end)) in refs.services.iter().zip(&intervals) {
        let appt = Appointment {
            id: Uuid::new_v4().to_string(),
            group_id: gid.clone(),
            salon_id: req.salon_id.clone(),
            staff_id: req.staff_id.clone(),
            service_id: service.id.clone(),
            customer_id: req.customer_id.clone(),
            booking_date: req.booking_date,
            start_time: *start,
            end_time: *end,
            status: AppointmentStatus::Pending,
            notes: req.notes.clone(),
            payment_method: req.payment_method.clone(),
            payment_status: PaymentStatus::Unpaid,
            created_at: now,
            updated_at: now,
        };
        queries::insert_appointment(&tx, &appt)?;
        appointments.push(appt);
    }

    if let Some(key) = &req.idempotency_key {
        queries::insert_booking_request(&tx, key, &gid)?;
    }

    tx.commit()?;

    Ok(BookingGroup {
        group_id: gid,
        appointments,
    })
}

/// Cancels every active row of a visit. Returns the rows that were
/// cancelled; rows already terminal are left untouched.
pub fn cancel_group(
    conn: &mut Connection,
    gid: &str,
    actor: &Actor,
    now: NaiveDateTime,
    grace_minutes: i64,
) -> Result<Vec<Appointment>, AppError> {
    let tx = conn.transaction()?;

    let rows = queries::get_group_appointments(&tx, gid)?;
    if rows.is_empty() {
        return Err(AppError::NotFound(format!("booking group {gid}")));
    }

    let active: Vec<&Appointment> = rows.iter().filter(|a| a.status.is_active()).collect();
    for appt in &active {
        authorize(actor, &appt.customer_id)?;
        check_cancellation_window(appt, now, grace_minutes)?;
    }

    let mut cancelled = Vec::with_capacity(active.len());
    for appt in active {
        queries::update_appointment_status(&tx, &appt.id, AppointmentStatus::Cancelled)?;
        let mut updated = appt.clone();
        updated.status = AppointmentStatus::Cancelled;
        updated.updated_at = now;
        cancelled.push(updated);
    }

    tx.commit()?;
    Ok(cancelled)
}

/// Moves a whole visit to a new date/start. Sub-intervals are re-derived
/// with the same sequential layout as creation and the full overlap check
/// runs again inside the same transaction as the update; on conflict
/// nothing changes.
pub fn reschedule_group(
    conn: &mut Connection,
    gid: &str,
    new_date: Option<NaiveDate>,
    new_start: Option<NaiveTime>,
    actor: &Actor,
    now: NaiveDateTime,
) -> Result<BookingGroup, AppError> {
    let tx = conn.transaction()?;

    let rows = queries::get_group_appointments(&tx, gid)?;
    if rows.is_empty() {
        return Err(AppError::NotFound(format!("booking group {gid}")));
    }

    if let Some(stuck) = rows.iter().find(|a| !a.status.is_active()) {
        return Err(AppError::InvalidTransition(format!(
            "appointment {} is {}, the visit can no longer be moved",
            stuck.id,
            stuck.status.as_str()
        )));
    }

    for appt in &rows {
        authorize(actor, &appt.customer_id)?;
    }

    let first = &rows[0];
    if now >= first.starts_at() {
        return Err(AppError::Validation(
            "cannot reschedule a visit that has already started".to_string(),
        ));
    }

    let new_date = new_date.unwrap_or(first.booking_date);
    let new_start = new_start.unwrap_or(first.start_time);
    if new_date < now.date() {
        return Err(AppError::Validation("booking date is in the past".to_string()));
    }

    let salon = catalog::resolve_salon(&tx, &first.salon_id)?;
    let hours = salon.hours()?;

    // Durations come from the catalog, laid out in the original order
    let mut services = Vec::with_capacity(rows.len());
    for appt in &rows {
        services.push(catalog::resolve_service(&tx, &appt.service_id)?);
    }
    let intervals = layout_intervals(&services, new_start)?;

    let visit_end = intervals.last().map(|(_, end)| *end).unwrap_or(new_start);
    if !hours.contains_interval(new_start, visit_end) {
        return Err(AppError::Validation(format!(
            "visit {}-{} is outside business hours {}-{}",
            fmt_hhmm(new_start),
            fmt_hhmm(visit_end),
            fmt_hhmm(hours.opening),
            fmt_hhmm(hours.closing),
        )));
    }

    let others = queries::get_active_for_staff_date(&tx, &first.staff_id, new_date, Some(gid))?;
    check_conflicts(&others, &intervals)?;

    let new_gid = group_id(&first.salon_id, &first.staff_id, new_date, new_start);
    let mut appointments = Vec::with_capacity(rows.len());
    for (appt, (start, end)) in rows.iter().zip(&intervals) {
        queries::update_appointment_times(&tx, &appt.id, &new_gid, new_date, *start, *end)?;
        let mut updated = appt.clone();
        updated.group_id = new_gid.clone();
        updated.booking_date = new_date;
        updated.start_time = *start;
        updated.end_time = *end;
        updated.updated_at = now;
        appointments.push(updated);
    }

    tx.commit()?;

    Ok(BookingGroup {
        group_id: new_gid,
        appointments,
    })
}

/// Single-row status transition per the booking state machine.
pub fn transition(
    conn: &Connection,
    id: &str,
    to: AppointmentStatus,
    actor: &Actor,
    now: NaiveDateTime,
    grace_minutes: i64,
) -> Result<Appointment, AppError> {
    let appt = queries::get_appointment_by_id(conn, id)?
        .ok_or_else(|| AppError::NotFound(format!("appointment {id}")))?;

    use AppointmentStatus::*;
    match (appt.status, to) {
        (Pending, Confirmed) => require_owner(actor)?,
        (Pending, Cancelled) => authorize(actor, &appt.customer_id)?,
        (Confirmed, Cancelled) => {
            authorize(actor, &appt.customer_id)?;
            check_cancellation_window(&appt, now, grace_minutes)?;
        }
        (Confirmed, Completed) => {
            require_owner(actor)?;
            if appt.booking_date > now.date() {
                return Err(AppError::InvalidTransition(format!(
                    "appointment {} has not happened yet",
                    appt.id
                )));
            }
        }
        (from, to) => {
            return Err(AppError::InvalidTransition(format!(
                "{} -> {}",
                from.as_str(),
                to.as_str()
            )));
        }
    }

    queries::update_appointment_status(conn, id, to)?;

    let mut updated = appt;
    updated.status = to;
    updated.updated_at = now;
    Ok(updated)
}
