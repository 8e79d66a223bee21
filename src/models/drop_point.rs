use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::courier::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DropPointStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropPoint {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub location: GeoPoint,
    pub capacity: u32,
    pub current_load: u32,
    /// Free-delivery radius in km.
    pub radius_max_km: f64,
    /// Currency units charged per started km beyond the radius.
    pub charge_outside_radius: i64,
    pub status: DropPointStatus,
    pub admin_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl DropPoint {
    pub fn is_active(&self) -> bool {
        self.status == DropPointStatus::Active
    }
}
