use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::hours::fmt_hhmm;
use crate::services::slots;
use crate::state::AppState;

use super::parse_date_param;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    pub salon_id: String,
    pub staff_id: String,
    pub service_id: String,
    pub date: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotResponse {
    start_time: String,
    end_time: String,
    available: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    slots: Vec<SlotResponse>,
    service_duration: i64,
    opening_time: String,
    closing_time: String,
}

// GET /availability?salonId&staffId&serviceId&date
pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let date = parse_date_param(&query.date)?;
    let today = Utc::now().date_naive();

    let view = {
        let db = state.lock_db()?;
        slots::availability(
            &db,
            &query.salon_id,
            &query.staff_id,
            &query.service_id,
            date,
            today,
        )?
    };

    Ok(Json(AvailabilityResponse {
        slots: view
            .slots
            .into_iter()
            .map(|s| SlotResponse {
                start_time: fmt_hhmm(s.start_time),
                end_time: fmt_hhmm(s.end_time),
                available: s.available,
            })
            .collect(),
        service_duration: view.service_duration,
        opening_time: fmt_hhmm(view.opening_time),
        closing_time: fmt_hhmm(view.closing_time),
    }))
}
