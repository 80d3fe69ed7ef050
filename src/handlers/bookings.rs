use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::hours::fmt_hhmm;
use crate::models::{Appointment, AppointmentStatus};
use crate::services::notifications::{BookingEvent, BookingEventKind};
use crate::services::reservations::{self, Actor, ActorRole, ReservationRequest};
use crate::state::AppState;

use super::{parse_date_param, parse_time_param};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentResponse {
    id: String,
    group_id: String,
    salon_id: String,
    staff_id: String,
    service_id: String,
    customer_id: String,
    booking_date: String,
    start_time: String,
    end_time: String,
    status: String,
    notes: Option<String>,
    payment_method: Option<String>,
    payment_status: String,
    created_at: String,
}

impl From<&Appointment> for AppointmentResponse {
    fn from(a: &Appointment) -> Self {
        Self {
            id: a.id.clone(),
            group_id: a.group_id.clone(),
            salon_id: a.salon_id.clone(),
            staff_id: a.staff_id.clone(),
            service_id: a.service_id.clone(),
            customer_id: a.customer_id.clone(),
            booking_date: a.booking_date.format("%Y-%m-%d").to_string(),
            start_time: fmt_hhmm(a.start_time),
            end_time: fmt_hhmm(a.end_time),
            status: a.status.as_str().to_string(),
            notes: a.notes.clone(),
            payment_method: a.payment_method.clone(),
            payment_status: a.payment_status.as_str().to_string(),
            created_at: a.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingGroupResponse {
    group_id: String,
    appointments: Vec<AppointmentResponse>,
}

// POST /bookings
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub customer_id: String,
    pub salon_id: String,
    pub staff_id: String,
    pub service_ids: Vec<String>,
    pub booking_date: String,
    pub start_time: String,
    pub notes: Option<String>,
    pub payment_method: Option<String>,
    pub idempotency_key: Option<String>,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingGroupResponse>), AppError> {
    let req = ReservationRequest {
        customer_id: body.customer_id,
        salon_id: body.salon_id,
        staff_id: body.staff_id,
        service_ids: body.service_ids,
        booking_date: parse_date_param(&body.booking_date)?,
        start_time: parse_time_param(&body.start_time)?,
        notes: body.notes,
        payment_method: body.payment_method,
        idempotency_key: body.idempotency_key,
    };

    let group = {
        let mut db = state.lock_db()?;
        reservations::reserve(&mut db, &req, Utc::now().naive_utc())?
    };

    state.notify(BookingEvent::for_group(
        BookingEventKind::Created,
        &group.appointments,
    ));

    Ok((
        StatusCode::CREATED,
        Json(BookingGroupResponse {
            group_id: group.group_id,
            appointments: group.appointments.iter().map(Into::into).collect(),
        }),
    ))
}

// POST /bookings/:id/cancel
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub actor_id: String,
    pub actor_role: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    cancelled_count: usize,
}

pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<String>,
    Json(body): Json<CancelRequest>,
) -> Result<Json<CancelResponse>, AppError> {
    let actor = Actor {
        id: body.actor_id,
        role: ActorRole::parse(body.actor_role.as_deref(), ActorRole::Customer)?,
    };

    let cancelled = {
        let mut db = state.lock_db()?;
        reservations::cancel_group(
            &mut db,
            &group_id,
            &actor,
            Utc::now().naive_utc(),
            state.config.cancellation_grace_minutes,
        )?
    };

    state.notify(BookingEvent::for_group(BookingEventKind::Cancelled, &cancelled));

    Ok(Json(CancelResponse {
        cancelled_count: cancelled.len(),
    }))
}

// PUT /bookings/:id — a body carrying `status` is a single-row
// transition (owner use); a body carrying `bookingDate`/`startTime`
// reschedules the group addressed by the same path segment.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookingRequest {
    pub status: Option<String>,
    pub booking_date: Option<String>,
    pub start_time: Option<String>,
    pub actor_id: Option<String>,
    pub actor_role: Option<String>,
}

pub async fn update_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateBookingRequest>,
) -> Result<Response, AppError> {
    let now = Utc::now().naive_utc();

    if let Some(status) = &body.status {
        let to = AppointmentStatus::parse(status)
            .ok_or_else(|| AppError::Validation(format!("unknown status: {status}")))?;
        let actor = Actor {
            id: body.actor_id.unwrap_or_default(),
            role: ActorRole::parse(body.actor_role.as_deref(), ActorRole::Owner)?,
        };

        let appt = {
            let db = state.lock_db()?;
            reservations::transition(
                &db,
                &id,
                to,
                &actor,
                now,
                state.config.cancellation_grace_minutes,
            )?
        };

        return Ok(Json(AppointmentResponse::from(&appt)).into_response());
    }

    if body.booking_date.is_none() && body.start_time.is_none() {
        return Err(AppError::Validation(
            "expected either status or bookingDate/startTime".to_string(),
        ));
    }

    let new_date = body.booking_date.as_deref().map(parse_date_param).transpose()?;
    let new_start = body.start_time.as_deref().map(parse_time_param).transpose()?;
    let actor = Actor {
        id: body.actor_id.unwrap_or_default(),
        role: ActorRole::parse(body.actor_role.as_deref(), ActorRole::Customer)?,
    };

    let group = {
        let mut db = state.lock_db()?;
        reservations::reschedule_group(&mut db, &id, new_date, new_start, &actor, now)?
    };

    state.notify(BookingEvent::for_group(
        BookingEventKind::Rescheduled,
        &group.appointments,
    ));

    Ok(Json(BookingGroupResponse {
        group_id: group.group_id,
        appointments: group.appointments.iter().map(Into::into).collect(),
    })
    .into_response())
}

// GET /bookings — dashboard listing
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingsQuery {
    pub staff_id: Option<String>,
    pub date: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<AppointmentResponse>>, AppError> {
    let date = query.date.as_deref().map(parse_date_param).transpose()?;
    let status = match query.status.as_deref() {
        Some(s) => Some(
            AppointmentStatus::parse(s)
                .ok_or_else(|| AppError::Validation(format!("unknown status: {s}")))?,
        ),
        None => None,
    };

    let appointments = {
        let db = state.lock_db()?;
        queries::list_appointments(
            &db,
            query.staff_id.as_deref(),
            date,
            status,
            query.limit.unwrap_or(100),
        )?
    };

    Ok(Json(appointments.iter().map(Into::into).collect()))
}
