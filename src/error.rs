use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::engine::error::{DispatchError, OrderError, ProofError, TransitionError};
use crate::geo::GeoError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("missing identity: {0}")]
    Unauthenticated(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Proof(#[from] ProofError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Geo(#[from] GeoError),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Transition(err.into())
    }
}

fn classify_store(err: &StoreError) -> (StatusCode, &'static str) {
    match err {
        StoreError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        StoreError::DuplicateOrderNumber(_) => (StatusCode::CONFLICT, "duplicate_order_number"),
        StoreError::StaleState { .. } => (StatusCode::CONFLICT, "stale_state"),
    }
}

fn classify_transition(err: &TransitionError) -> (StatusCode, &'static str) {
    match err {
        TransitionError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        TransitionError::OrderClosed { .. } => (StatusCode::CONFLICT, "order_closed"),
        TransitionError::InvalidTransition { .. } => (StatusCode::CONFLICT, "invalid_transition"),
        TransitionError::StaleState { .. } => (StatusCode::CONFLICT, "stale_state"),
        TransitionError::ReservedStatus(_) => (StatusCode::CONFLICT, "reserved_status"),
        TransitionError::Unauthorized(_) => (StatusCode::FORBIDDEN, "unauthorized"),
        TransitionError::Store(err) => classify_store(err),
    }
}

fn classify_geo(err: &GeoError) -> (StatusCode, &'static str) {
    match err {
        GeoError::NoActiveDropPoints => (StatusCode::UNPROCESSABLE_ENTITY, "no_active_drop_points"),
        GeoError::InvalidCoordinates(_) => (StatusCode::BAD_REQUEST, "invalid_coordinates"),
    }
}

impl AppError {
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            AppError::Transition(err) => classify_transition(err),
            AppError::Geo(err) => classify_geo(err),
            AppError::Dispatch(err) => match err {
                DispatchError::Transition(err) => classify_transition(err),
                DispatchError::CourierNotFound(_) => (StatusCode::NOT_FOUND, "courier_not_found"),
                DispatchError::CourierInactive(_) => (StatusCode::CONFLICT, "courier_inactive"),
                DispatchError::CourierBusy { .. } => (StatusCode::CONFLICT, "courier_busy"),
                DispatchError::NotAssignable(_) => (StatusCode::CONFLICT, "not_assignable"),
                DispatchError::Unauthorized(_) => (StatusCode::FORBIDDEN, "unauthorized"),
                DispatchError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            },
            AppError::Proof(err) => match err {
                ProofError::Transition(err) => classify_transition(err),
                ProofError::Unauthorized(_) => (StatusCode::FORBIDDEN, "unauthorized"),
                ProofError::MissingEvidence => (StatusCode::UNPROCESSABLE_ENTITY, "missing_evidence"),
                ProofError::AlreadyCaptured => (StatusCode::CONFLICT, "already_captured"),
                ProofError::UploadFailed(_) => (StatusCode::BAD_GATEWAY, "upload_failed"),
            },
            AppError::Order(err) => match err {
                OrderError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
                OrderError::Geo(err) => classify_geo(err),
                OrderError::Transition(err) => classify_transition(err),
                OrderError::Unauthorized(_) => (StatusCode::FORBIDDEN, "unauthorized"),
                OrderError::InvalidPaymentState(_) => (StatusCode::CONFLICT, "invalid_payment_state"),
                OrderError::MissingEvidence => (StatusCode::UNPROCESSABLE_ENTITY, "missing_evidence"),
                OrderError::UploadFailed(_) => (StatusCode::BAD_GATEWAY, "upload_failed"),
                OrderError::OrderNumberExhausted => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "order_number_exhausted")
                }
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();

        if status.is_server_error() {
            tracing::error!(error = %self, code, "request failed");
        }

        let message = match &self {
            AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::Unauthenticated(msg)
            | AppError::Forbidden(msg)
            | AppError::Internal(msg) => msg.clone(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}
