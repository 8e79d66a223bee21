use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Multipart, Path, Query, State};
use axum::routing::{get, patch, post};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::rest::actor::ensure_can_view;
use crate::api::rest::upload::read_image_upload;
use crate::engine::audit::{Direction, TimelineEvent, build_timeline};
use crate::engine::intake::{self, NewOrder, OrderEdit};
use crate::engine::payment;
use crate::engine::status::{self, TransitionRequest};
use crate::error::AppError;
use crate::models::actor::{Actor, Role};
use crate::models::order::{Order, ServiceType};
use crate::models::status::OrderStatus;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/status", patch(update_status))
        .route("/orders/:id/cancel", post(cancel_order))
        .route("/orders/:id/items", patch(edit_order))
        .route("/orders/:id/timeline", get(timeline))
        .route("/orders/:id/payment-proof", post(upload_payment_proof))
        .route("/orders/:id/payment/review", post(review_payment))
        .route("/track/:order_number", get(track_order))
}

#[derive(Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<OrderStatus>,
}

#[derive(Deserialize)]
pub struct CancelRequest {
    pub note: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct TimelineQuery {
    #[serde(default)]
    pub direction: Direction,
}

#[derive(Deserialize)]
pub struct ReviewRequest {
    pub approve: bool,
    pub note: Option<String>,
}

/// Public tracking view: enough for a customer holding the order number.
#[derive(Serialize)]
pub struct TrackingView {
    pub order_number: String,
    pub status: OrderStatus,
    pub label: &'static str,
    pub description: &'static str,
    pub service_type: ServiceType,
    pub courier_name: Option<String>,
    pub timeline: Vec<TimelineEvent>,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    actor: Option<Actor>,
    Json(payload): Json<NewOrder>,
) -> Result<Json<Order>, AppError> {
    let order = intake::create_order(&state, actor.as_ref(), payload)?;
    Ok(Json(order))
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(query): Query<ListOrdersQuery>,
) -> Json<Vec<Order>> {
    let orders = state
        .orders
        .list()
        .into_iter()
        .filter(|order| query.status.is_none_or(|status| order.status == status))
        .filter(|order| match actor.role {
            Role::Admin => true,
            Role::Customer => order.is_owned_by(&actor),
            Role::Courier => order
                .assigned_courier_id()
                .is_some_and(|courier_id| courier_id == actor.id),
        })
        .collect();

    Json(orders)
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = state.orders.get(id)?;
    ensure_can_view(&actor, &order)?;
    Ok(Json(order))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<TransitionRequest>,
) -> Result<Json<Order>, AppError> {
    let order = status::advance(&state, id, &actor, payload)?;
    Ok(Json(order))
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    payload: Option<Json<CancelRequest>>,
) -> Result<Json<Order>, AppError> {
    let note = payload.and_then(|Json(body)| body.note);
    let order = status::cancel(&state, id, &actor, note)?;
    Ok(Json(order))
}

async fn edit_order(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<OrderEdit>,
) -> Result<Json<Order>, AppError> {
    let order = intake::edit_order(&state, id, &actor, payload)?;
    Ok(Json(order))
}

async fn timeline(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Query(query): Query<TimelineQuery>,
) -> Result<Json<Vec<TimelineEvent>>, AppError> {
    let order = state.orders.get(id)?;
    ensure_can_view(&actor, &order)?;
    Ok(Json(build_timeline(&order, query.direction)))
}

async fn track_order(
    State(state): State<Arc<AppState>>,
    Path(order_number): Path<String>,
) -> Result<Json<TrackingView>, AppError> {
    let order = state
        .orders
        .get_by_number(&order_number)
        .ok_or_else(|| AppError::NotFound(format!("order {order_number} not found")))?;

    let meta = order.status.meta();
    let courier_name = order
        .assigned_courier
        .as_ref()
        .map(|assigned| assigned.courier_name.clone());

    Ok(Json(TrackingView {
        timeline: build_timeline(&order, Direction::Asc),
        order_number: order.order_number,
        status: order.status,
        label: meta.label,
        description: meta.description,
        service_type: order.service_type,
        courier_name,
    }))
}

async fn upload_payment_proof(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<Order>, AppError> {
    let upload = read_image_upload(multipart).await?;
    let order =
        payment::submit_payment_proof(&state, id, &actor, upload.image, &upload.content_type)
            .await?;
    Ok(Json(order))
}

async fn review_payment(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviewRequest>,
) -> Result<Json<Order>, AppError> {
    let order = payment::review_payment(&state, id, &actor, payload.approve, payload.note)?;
    Ok(Json(order))
}
