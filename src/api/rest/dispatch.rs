use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Multipart, Path, State};
use axum::routing::{get, post};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::actor::require_admin;
use crate::api::rest::upload::read_image_upload;
use crate::engine::dispatch::{self, EligibleCourier};
use crate::engine::proof::{ProofSubmission, submit_pickup_proof};
use crate::error::AppError;
use crate::models::actor::Actor;
use crate::models::order::Order;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders/:id/eligible-couriers", get(eligible_couriers))
        .route("/orders/:id/assign", post(assign_courier))
        .route("/orders/:id/accept", post(accept_order))
        .route("/orders/:id/pickup-proof", post(upload_pickup_proof))
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub courier_id: Uuid,
    pub note: Option<String>,
}

async fn eligible_couriers(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<EligibleCourier>>, AppError> {
    require_admin(&actor)?;
    let couriers = dispatch::eligible_couriers_for_order(&state, id)?;
    Ok(Json(couriers))
}

async fn assign_courier(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignRequest>,
) -> Result<Json<Order>, AppError> {
    let order = dispatch::assign(&state, id, payload.courier_id, &actor, payload.note)?;
    Ok(Json(order))
}

async fn accept_order(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    // accept blocks on the per-courier std mutex
    let order = tokio::task::spawn_blocking(move || dispatch::accept(&state, id, &actor))
        .await
        .map_err(|err| AppError::Internal(format!("accept task failed: {err}")))??;
    Ok(Json(order))
}

async fn upload_pickup_proof(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<Order>, AppError> {
    let upload = read_image_upload(multipart).await?;
    let submission = ProofSubmission {
        image: upload.image,
        content_type: upload.content_type,
        note: upload.note,
        location: upload.location,
    };

    let order = submit_pickup_proof(&state, id, &actor, submission).await?;
    Ok(Json(order))
}
