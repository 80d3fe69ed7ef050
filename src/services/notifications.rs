//! Fire-and-forget booking notifications. Dispatch happens after the
//! reservation transaction commits and never feeds back into the
//! reservation path: failures are logged and swallowed.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

use crate::models::Appointment;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingEventKind {
    Created,
    Cancelled,
    Rescheduled,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingEvent {
    pub kind: BookingEventKind,
    pub group_id: String,
    pub salon_id: String,
    pub staff_id: String,
    pub customer_id: String,
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub service_ids: Vec<String>,
}

impl BookingEvent {
    /// Summarizes a visit from its sibling rows. Callers pass at least
    /// one row; rows of one group share salon/staff/customer lineage.
    pub fn for_group(kind: BookingEventKind, appointments: &[Appointment]) -> Option<Self> {
        let first = appointments.first()?;
        Some(Self {
            kind,
            group_id: first.group_id.clone(),
            salon_id: first.salon_id.clone(),
            staff_id: first.staff_id.clone(),
            customer_id: first.customer_id.clone(),
            booking_date: first.booking_date,
            start_time: first.start_time,
            service_ids: appointments.iter().map(|a| a.service_id.clone()).collect(),
        })
    }
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, event: &BookingEvent) -> anyhow::Result<()>;
}

/// Posts each event as JSON to a configured webhook.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookNotifier {
    async fn dispatch(&self, event: &BookingEvent) -> anyhow::Result<()> {
        self.client
            .post(&self.url)
            .json(event)
            .send()
            .await
            .context("failed to deliver booking notification")?
            .error_for_status()
            .context("notification webhook returned error")?;

        Ok(())
    }
}

/// Default when no webhook is configured: the event only hits the log.
pub struct LogNotifier;

#[async_trait]
impl NotificationDispatcher for LogNotifier {
    async fn dispatch(&self, event: &BookingEvent) -> anyhow::Result<()> {
        tracing::info!(
            kind = ?event.kind,
            group_id = %event.group_id,
            customer_id = %event.customer_id,
            "booking event"
        );
        Ok(())
    }
}
