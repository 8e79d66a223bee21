use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Courier {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub vehicle_type: String,
    pub vehicle_number: String,
    pub current_location: Option<GeoPoint>,
    /// Self-reported "on shift" toggle.
    pub is_available: bool,
    /// Account-level switch; inactive couriers never show up for dispatch.
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}
