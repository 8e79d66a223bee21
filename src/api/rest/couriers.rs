use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::api::rest::actor::require_admin;
use crate::engine::dispatch::{self, QueuedOrder};
use crate::error::AppError;
use crate::geo::validate_point;
use crate::models::actor::Actor;
use crate::models::courier::{Courier, GeoPoint};
use crate::models::order::Order;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/couriers", post(create_courier).get(list_couriers))
        .route("/couriers/:id/availability", patch(update_availability))
        .route("/couriers/:id/location", patch(update_location))
        .route("/couriers/:id/queue", get(queue))
        .route("/couriers/:id/active-task", get(active_task))
}

#[derive(Deserialize)]
pub struct CreateCourierRequest {
    /// Reuse the identity-provider id so the courier's actor header matches.
    pub id: Option<Uuid>,
    pub name: String,
    pub phone: String,
    pub vehicle_type: String,
    pub vehicle_number: String,
    pub location: Option<GeoPoint>,
}

#[derive(Deserialize)]
pub struct AvailabilityRequest {
    pub is_available: bool,
    /// Admin only.
    pub is_active: Option<bool>,
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub location: GeoPoint,
}

#[derive(Serialize)]
pub struct LocationUpdated {
    pub courier: Courier,
    pub tracked_orders: usize,
}

fn require_self_or_admin(actor: &Actor, courier_id: Uuid) -> Result<(), AppError> {
    if actor.is_admin() || actor.is_courier(courier_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "couriers can only update themselves".to_string(),
        ))
    }
}

async fn create_courier(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<CreateCourierRequest>,
) -> Result<Json<Courier>, AppError> {
    require_admin(&actor)?;

    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }
    if payload.phone.trim().is_empty() {
        return Err(AppError::BadRequest("phone cannot be empty".to_string()));
    }
    if let Some(location) = &payload.location {
        validate_point(location)?;
    }

    let id = payload.id.unwrap_or_else(Uuid::new_v4);
    if state.couriers.contains_key(&id) {
        return Err(AppError::BadRequest(format!("courier {id} already exists")));
    }

    let courier = Courier {
        id,
        name: payload.name,
        phone: payload.phone,
        vehicle_type: payload.vehicle_type,
        vehicle_number: payload.vehicle_number,
        current_location: payload.location,
        is_available: true,
        is_active: true,
        updated_at: Utc::now(),
    };

    state.couriers.insert(courier.id, courier.clone());
    info!(courier_id = %courier.id, name = %courier.name, "courier registered");
    Ok(Json(courier))
}

async fn list_couriers(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<Courier>>, AppError> {
    require_admin(&actor)?;

    let mut couriers: Vec<Courier> = state
        .couriers
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    couriers.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Json(couriers))
}

async fn update_availability(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<AvailabilityRequest>,
) -> Result<Json<Courier>, AppError> {
    require_self_or_admin(&actor, id)?;
    if payload.is_active.is_some() {
        require_admin(&actor)?;
    }

    let mut courier = state
        .couriers
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("courier {id} not found")))?;

    courier.is_available = payload.is_available;
    if let Some(is_active) = payload.is_active {
        courier.is_active = is_active;
    }
    courier.updated_at = Utc::now();

    Ok(Json(courier.clone()))
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<LocationUpdated>, AppError> {
    require_self_or_admin(&actor, id)?;
    validate_point(&payload.location)?;

    let courier = {
        let mut courier = state
            .couriers
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("courier {id} not found")))?;
        courier.current_location = Some(payload.location);
        courier.updated_at = Utc::now();
        courier.clone()
    };

    let tracked_orders = dispatch::track_courier(&state, id, payload.location);
    Ok(Json(LocationUpdated {
        courier,
        tracked_orders,
    }))
}

async fn queue(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<QueuedOrder>>, AppError> {
    let queue = dispatch::courier_queue(&state, id, &actor)?;
    Ok(Json(queue))
}

async fn active_task(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Option<Order>>, AppError> {
    let task = dispatch::active_task(&state, id, &actor)?;
    Ok(Json(task))
}
