use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::actor::Actor;
use crate::models::courier::GeoPoint;
use crate::models::status::OrderStatus;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    PickupDelivery,
    DropPoint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub name: String,
    pub phone: String,
    pub account_id: Option<Uuid>,
    pub is_guest: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupLocation {
    pub address: String,
    pub location: GeoPoint,
    pub drop_point_id: Option<Uuid>,
    pub drop_point_name: Option<String>,
    pub distance_km: Option<f64>,
    pub delivery_fee: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub item_type: String,
    pub treatment_type: String,
    pub quantity: u32,
    pub unit_price: i64,
}

impl OrderItem {
    /// `None` when the line does not fit in an `i64`.
    pub fn line_total(&self) -> Option<i64> {
        i64::from(self.quantity).checked_mul(self.unit_price)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    AwaitingConfirmation,
    Paid,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub method: String,
    pub status: PaymentStatus,
    pub subtotal: i64,
    pub delivery_fee: i64,
    pub points_discount: i64,
    pub final_amount: i64,
    pub proof_image_ref: Option<String>,
    pub proof_uploaded_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
    pub review_note: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
    pub actor_id: Option<Uuid>,
    pub actor_name: String,
    pub note: Option<String>,
    pub location: Option<GeoPoint>,
}

impl StatusEntry {
    pub fn new(
        status: OrderStatus,
        actor: &Actor,
        note: Option<String>,
        location: Option<GeoPoint>,
    ) -> Self {
        Self {
            status,
            timestamp: Utc::now(),
            actor_id: Some(actor.id),
            actor_name: actor.name.clone(),
            note,
            location,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditEntry {
    pub actor_id: Uuid,
    pub actor_name: String,
    pub timestamp: DateTime<Utc>,
    pub changed_fields: Vec<String>,
    pub reason: String,
}

/// Live engagement of a courier. Populated only while the order is
/// `courier_assigned` or `pickup_in_progress`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveCourier {
    pub courier_id: Uuid,
    pub courier_name: String,
    pub assigned_by: Uuid,
    pub assigned_by_name: String,
    pub assigned_at: DateTime<Utc>,
    pub dispatch_note: Option<String>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub pickup_started_at: Option<DateTime<Utc>>,
    pub current_location: Option<GeoPoint>,
}

/// Who was last dispatched to the order. Never cleared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignedCourier {
    pub courier_id: Uuid,
    pub courier_name: String,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupProof {
    pub image_ref: String,
    pub timestamp: DateTime<Utc>,
    pub note: Option<String>,
    pub location: Option<GeoPoint>,
    pub uploaded_by: Uuid,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LoyaltyPoints {
    pub earned: i64,
    pub used: i64,
    pub rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer: CustomerInfo,
    pub service_type: ServiceType,
    pub pickup: PickupLocation,
    pub items: Vec<OrderItem>,
    pub payment: Payment,
    pub status: OrderStatus,
    pub status_history: Vec<StatusEntry>,
    pub edit_history: Vec<EditEntry>,
    pub active_courier: Option<ActiveCourier>,
    pub assigned_courier: Option<AssignedCourier>,
    pub pickup_proof: Option<PickupProof>,
    pub loyalty_points: LoyaltyPoints,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_owned_by(&self, actor: &Actor) -> bool {
        self.customer.account_id == Some(actor.id)
    }

    pub fn assigned_courier_id(&self) -> Option<Uuid> {
        self.assigned_courier.as_ref().map(|c| c.courier_id)
    }

    pub fn active_courier_id(&self) -> Option<Uuid> {
        self.active_courier.as_ref().map(|c| c.courier_id)
    }
}
