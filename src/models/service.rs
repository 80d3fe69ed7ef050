use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub salon_id: String,
    pub name: String,
    pub duration_minutes: i64,
    pub price: f64,
}
