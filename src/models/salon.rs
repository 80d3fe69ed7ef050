use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::hours::BusinessHours;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Salon {
    pub id: String,
    pub name: String,
    pub opening_time: NaiveTime,
    pub closing_time: NaiveTime,
}

impl Salon {
    pub fn hours(&self) -> anyhow::Result<BusinessHours> {
        BusinessHours::new(self.opening_time, self.closing_time)
    }
}
