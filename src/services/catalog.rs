//! Read-only gateway to the salon/service/staff catalog. Reservation
//! code resolves every referenced id through here so catalog errors
//! surface uniformly as `NotFound`.

use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Salon, Service, Staff};

#[derive(Debug)]
pub struct BookingRefs {
    pub salon: Salon,
    pub staff: Staff,
    pub services: Vec<Service>,
}

pub fn resolve_salon(conn: &Connection, id: &str) -> Result<Salon, AppError> {
    queries::get_salon(conn, id)?.ok_or_else(|| AppError::NotFound(format!("salon {id}")))
}

pub fn resolve_service(conn: &Connection, id: &str) -> Result<Service, AppError> {
    queries::get_service(conn, id)?.ok_or_else(|| AppError::NotFound(format!("service {id}")))
}

pub fn resolve_staff(conn: &Connection, id: &str) -> Result<Staff, AppError> {
    queries::get_staff(conn, id)?.ok_or_else(|| AppError::NotFound(format!("staff {id}")))
}

/// Resolves every reference in a booking request and checks that staff
/// and services actually belong to the salon being booked.
pub fn resolve_booking_refs(
    conn: &Connection,
    salon_id: &str,
    staff_id: &str,
    service_ids: &[String],
) -> Result<BookingRefs, AppError> {
    let salon = resolve_salon(conn, salon_id)?;
    let staff = resolve_staff(conn, staff_id)?;

    if staff.salon_id != salon.id {
        return Err(AppError::Validation(format!(
            "staff {} does not work at salon {}",
            staff.id, salon.id
        )));
    }

    let mut services = Vec::with_capacity(service_ids.len());
    for service_id in service_ids {
        let service = resolve_service(conn, service_id)?;
        if service.salon_id != salon.id {
            return Err(AppError::Validation(format!(
                "service {} is not offered by salon {}",
                service.id, salon.id
            )));
        }
        services.push(service);
    }

    Ok(BookingRefs {
        salon,
        staff,
        services,
    })
}
