use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::status::OrderStatus;

/// Emitted after every committed status change. Delivery is best-effort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    pub order_id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub label: String,
    pub actor_name: String,
    pub courier_id: Option<Uuid>,
    pub at: DateTime<Utc>,
}
