use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::services::notifications::{BookingEvent, NotificationDispatcher};

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub notifier: Arc<dyn NotificationDispatcher>,
}

impl AppState {
    pub fn lock_db(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.db
            .lock()
            .map_err(|_| AppError::Unavailable("database lock poisoned".to_string()))
    }

    /// Fire-and-forget: dispatch runs after the caller has committed and
    /// released the database lock, and failures only hit the log.
    pub fn notify(&self, event: Option<BookingEvent>) {
        let Some(event) = event else { return };
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.dispatch(&event).await {
                tracing::warn!(error = %e, kind = ?event.kind, "notification dispatch failed");
            }
        });
    }
}
