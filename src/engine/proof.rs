use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use crate::engine::error::ProofError;
use crate::engine::status;
use crate::models::actor::Actor;
use crate::models::courier::GeoPoint;
use crate::models::order::{Order, PickupProof};
use crate::models::status::OrderStatus;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct ProofSubmission {
    pub image: Vec<u8>,
    pub content_type: String,
    pub note: Option<String>,
    pub location: Option<GeoPoint>,
}

fn outcome(result: &Result<Order, ProofError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(ProofError::MissingEvidence) => "missing_evidence",
        Err(ProofError::AlreadyCaptured) => "already_captured",
        Err(ProofError::UploadFailed(_)) => "upload_failed",
        Err(ProofError::Unauthorized(_)) => "unauthorized",
        Err(ProofError::Transition(_)) => "rejected",
    }
}

/// Stores the pickup photo and moves the order to `picked_up` in one step.
/// Nothing is written to the order unless the upload succeeded, and the blob
/// is dropped again if the order write loses.
pub async fn submit_pickup_proof(
    state: &AppState,
    order_id: Uuid,
    actor: &Actor,
    submission: ProofSubmission,
) -> Result<Order, ProofError> {
    let result = submit(state, order_id, actor, submission).await;
    state
        .metrics
        .proof_uploads_total
        .with_label_values(&[outcome(&result)])
        .inc();
    result
}

async fn submit(
    state: &AppState,
    order_id: Uuid,
    actor: &Actor,
    submission: ProofSubmission,
) -> Result<Order, ProofError> {
    let snapshot = state.orders.get(order_id)?;

    if snapshot.pickup_proof.is_some() {
        return Err(ProofError::AlreadyCaptured);
    }
    status::validate(&snapshot, OrderStatus::PickedUp)?;

    let courier_id = match snapshot.active_courier_id() {
        Some(courier_id) if actor.is_courier(courier_id) => courier_id,
        _ => {
            return Err(ProofError::Unauthorized(
                "only the courier running this pickup can submit proof".to_string(),
            ));
        }
    };

    if submission.image.is_empty() {
        return Err(ProofError::MissingEvidence);
    }

    let image_ref = state
        .blob_store
        .store(submission.image, &submission.content_type)
        .await
        .map_err(|err| {
            error!(order_id = %order_id, error = %err, "pickup proof upload failed");
            ProofError::UploadFailed(err)
        })?;

    let proof = PickupProof {
        image_ref: image_ref.clone(),
        timestamp: Utc::now(),
        note: submission.note.clone(),
        location: submission.location,
        uploaded_by: courier_id,
    };

    let committed = status::commit(
        state,
        &snapshot,
        OrderStatus::PickedUp,
        actor,
        submission.note,
        submission.location,
        |order| {
            if order.pickup_proof.is_some() {
                return Err(ProofError::AlreadyCaptured);
            }
            if order.active_courier_id() != Some(courier_id) {
                return Err(ProofError::Unauthorized(
                    "order was reassigned to another courier".to_string(),
                ));
            }
            order.pickup_proof = Some(proof);
            Ok(())
        },
    );

    match committed {
        Ok(order) => {
            info!(order_id = %order.id, courier_id = %courier_id, image = %image_ref, "pickup proof captured");
            Ok(order)
        }
        Err(err) => {
            state.blob_store.remove(&image_ref).await;
            Err(err)
        }
    }
}
