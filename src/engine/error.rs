use thiserror::Error;
use uuid::Uuid;

use crate::blob::BlobError;
use crate::geo::GeoError;
use crate::models::order::PaymentStatus;
use crate::models::status::OrderStatus;
use crate::store::StoreError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("order {0} not found")]
    NotFound(Uuid),

    #[error("order {order_number} is already {status}")]
    OrderClosed {
        order_number: String,
        status: OrderStatus,
    },

    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("order changed concurrently: expected {expected}, found {current}; reload and retry")]
    StaleState {
        expected: OrderStatus,
        current: OrderStatus,
    },

    #[error("status {0} is only reachable through dispatch")]
    ReservedStatus(OrderStatus),

    #[error("not allowed: {0}")]
    Unauthorized(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for TransitionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => TransitionError::NotFound(id),
            StoreError::StaleState {
                expected, current, ..
            } => TransitionError::StaleState { expected, current },
            other => TransitionError::Store(other),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("courier {0} not found")]
    CourierNotFound(Uuid),

    #[error("courier {0} is deactivated")]
    CourierInactive(Uuid),

    #[error("courier already has an active pickup: order {active_order_number}")]
    CourierBusy { active_order_number: String },

    #[error("order in status {0} cannot be assigned")]
    NotAssignable(OrderStatus),

    #[error("not allowed: {0}")]
    Unauthorized(String),

    #[error("internal dispatch error: {0}")]
    Internal(String),
}

impl From<StoreError> for DispatchError {
    fn from(err: StoreError) -> Self {
        DispatchError::Transition(err.into())
    }
}

#[derive(Debug, Error)]
pub enum ProofError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("not allowed: {0}")]
    Unauthorized(String),

    #[error("proof image is empty")]
    MissingEvidence,

    #[error("pickup proof was already captured for this order")]
    AlreadyCaptured,

    #[error("proof upload failed: {0}")]
    UploadFailed(#[from] BlobError),
}

impl From<StoreError> for ProofError {
    fn from(err: StoreError) -> Self {
        ProofError::Transition(err.into())
    }
}

/// Intake, edit and payment review failures.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("invalid order: {0}")]
    Validation(String),

    #[error(transparent)]
    Geo(#[from] GeoError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("not allowed: {0}")]
    Unauthorized(String),

    #[error("payment is {0:?} and cannot take this action")]
    InvalidPaymentState(PaymentStatus),

    #[error("payment proof image is empty")]
    MissingEvidence,

    #[error("payment proof upload failed: {0}")]
    UploadFailed(#[from] BlobError),

    #[error("could not allocate a unique order number")]
    OrderNumberExhausted,
}

impl From<StoreError> for OrderError {
    fn from(err: StoreError) -> Self {
        OrderError::Transition(err.into())
    }
}
