use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::api::rest::actor::require_admin;
use crate::engine::intake::{self, Quote};
use crate::error::AppError;
use crate::geo::{NearestDropPoint, find_nearest, validate_point};
use crate::models::actor::Actor;
use crate::models::courier::GeoPoint;
use crate::models::drop_point::{DropPoint, DropPointStatus};
use crate::models::order::ServiceType;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drop-points", post(create_drop_point).get(list_drop_points))
        .route("/drop-points/nearest", get(nearest))
        .route("/quote", get(quote))
}

#[derive(Deserialize)]
pub struct CreateDropPointRequest {
    pub name: String,
    pub address: String,
    pub location: GeoPoint,
    pub capacity: u32,
    pub radius_max_km: f64,
    pub charge_outside_radius: i64,
    pub status: Option<DropPointStatus>,
}

#[derive(Deserialize)]
pub struct PointQuery {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Deserialize)]
pub struct QuoteQuery {
    pub lat: f64,
    pub lng: f64,
    pub service_type: Option<ServiceType>,
}

// Keeps `excess_km * charge` far from i64 overflow for any distance on Earth.
const MAX_CHARGE_OUTSIDE_RADIUS: i64 = 1_000_000_000;

async fn create_drop_point(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<CreateDropPointRequest>,
) -> Result<Json<DropPoint>, AppError> {
    require_admin(&actor)?;

    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }
    validate_point(&payload.location)?;
    if !payload.radius_max_km.is_finite() || payload.radius_max_km < 0.0 {
        return Err(AppError::BadRequest(
            "radius_max_km must be a non-negative number".to_string(),
        ));
    }
    if !(0..=MAX_CHARGE_OUTSIDE_RADIUS).contains(&payload.charge_outside_radius) {
        return Err(AppError::BadRequest(format!(
            "charge_outside_radius must be between 0 and {MAX_CHARGE_OUTSIDE_RADIUS}"
        )));
    }

    let drop_point = DropPoint {
        id: Uuid::new_v4(),
        name: payload.name,
        address: payload.address,
        location: payload.location,
        capacity: payload.capacity,
        current_load: 0,
        radius_max_km: payload.radius_max_km,
        charge_outside_radius: payload.charge_outside_radius,
        status: payload.status.unwrap_or(DropPointStatus::Active),
        admin_id: Some(actor.id),
        created_at: Utc::now(),
    };

    state.drop_points.insert(drop_point.id, drop_point.clone());
    info!(drop_point_id = %drop_point.id, name = %drop_point.name, "drop point created");
    Ok(Json(drop_point))
}

async fn list_drop_points(State(state): State<Arc<AppState>>) -> Json<Vec<DropPoint>> {
    Json(state.drop_points_snapshot())
}

async fn nearest(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PointQuery>,
) -> Result<Json<NearestDropPoint>, AppError> {
    let point = GeoPoint {
        lat: query.lat,
        lng: query.lng,
    };
    validate_point(&point)?;

    let nearest = find_nearest(&point, &state.drop_points_snapshot())?;
    Ok(Json(nearest))
}

async fn quote(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QuoteQuery>,
) -> Result<Json<Quote>, AppError> {
    let point = GeoPoint {
        lat: query.lat,
        lng: query.lng,
    };
    validate_point(&point)?;

    let service_type = query.service_type.unwrap_or(ServiceType::PickupDelivery);
    let quote = intake::quote(&state, &point, service_type)?;
    Ok(Json(quote))
}
