use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use crate::engine::error::{OrderError, TransitionError};
use crate::models::actor::Actor;
use crate::models::order::{Order, PaymentStatus};
use crate::state::AppState;
use crate::store::WriteError;

fn unwrap_write(written: Result<Order, WriteError<OrderError>>) -> Result<Order, OrderError> {
    match written {
        Ok(order) => Ok(order),
        Err(WriteError::Rejected(err)) => Err(err),
        Err(WriteError::Store(err)) => Err(err.into()),
    }
}

fn ensure_open(order: &Order) -> Result<(), OrderError> {
    if order.status.is_terminal() {
        return Err(TransitionError::OrderClosed {
            order_number: order.order_number.clone(),
            status: order.status,
        }
        .into());
    }
    Ok(())
}

/// Customer uploads a transfer receipt; the payment then waits for review.
pub async fn submit_payment_proof(
    state: &AppState,
    order_id: Uuid,
    actor: &Actor,
    image: Vec<u8>,
    content_type: &str,
) -> Result<Order, OrderError> {
    let snapshot = state.orders.get(order_id)?;
    ensure_open(&snapshot)?;

    if !(actor.is_admin() || snapshot.is_owned_by(actor)) {
        return Err(OrderError::Unauthorized(
            "only the ordering customer can upload payment proof".to_string(),
        ));
    }
    if !matches!(
        snapshot.payment.status,
        PaymentStatus::Pending | PaymentStatus::Failed
    ) {
        return Err(OrderError::InvalidPaymentState(snapshot.payment.status));
    }
    if image.is_empty() {
        return Err(OrderError::MissingEvidence);
    }

    let url = state
        .blob_store
        .store(image, content_type)
        .await
        .map_err(|err| {
            error!(order_id = %order_id, error = %err, "payment proof upload failed");
            OrderError::UploadFailed(err)
        })?;

    let written = unwrap_write(state.orders.update(order_id, |order| {
        ensure_open(order)?;
        if !matches!(
            order.payment.status,
            PaymentStatus::Pending | PaymentStatus::Failed
        ) {
            return Err(OrderError::InvalidPaymentState(order.payment.status));
        }
        order.payment.status = PaymentStatus::AwaitingConfirmation;
        order.payment.proof_image_ref = Some(url.clone());
        order.payment.proof_uploaded_at = Some(Utc::now());
        order.payment.reviewed_by = None;
        order.payment.review_note = None;
        order.payment.reviewed_at = None;
        Ok(())
    }));

    match written {
        Ok(order) => {
            info!(order_id = %order.id, "payment proof submitted");
            Ok(order)
        }
        Err(err) => {
            state.blob_store.remove(&url).await;
            Err(err)
        }
    }
}

/// Admin verdict on an uploaded transfer receipt. Closed orders keep
/// whatever payment state they were closed with.
pub fn review_payment(
    state: &AppState,
    order_id: Uuid,
    actor: &Actor,
    approve: bool,
    note: Option<String>,
) -> Result<Order, OrderError> {
    if !actor.is_admin() {
        return Err(OrderError::Unauthorized(
            "only admins review payments".to_string(),
        ));
    }

    let order = unwrap_write(state.orders.update(order_id, |order| {
        ensure_open(order)?;
        if order.payment.status != PaymentStatus::AwaitingConfirmation {
            return Err(OrderError::InvalidPaymentState(order.payment.status));
        }
        let now = Utc::now();
        order.payment.status = if approve {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Failed
        };
        order.payment.paid_at = approve.then_some(now);
        order.payment.reviewed_by = Some(actor.name.clone());
        order.payment.review_note = note;
        order.payment.reviewed_at = Some(now);
        Ok(())
    }))?;

    info!(
        order_id = %order.id,
        payment = ?order.payment.status,
        reviewer = %actor.name,
        "payment reviewed"
    );
    Ok(order)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{review_payment, submit_payment_proof};
    use crate::engine::audit::{Direction, TimelineKind, build_timeline};
    use crate::engine::error::{OrderError, TransitionError};
    use crate::engine::status::cancel;
    use crate::engine::status::test_support::{admin, state};
    use crate::models::actor::{Actor, Role};
    use crate::models::order::{Order, PaymentStatus};
    use crate::state::AppState;
    use crate::store::fixtures;

    fn owned_order(state: &AppState, customer: &Actor) -> Order {
        let mut order = fixtures::order("SC-P");
        order.customer.account_id = Some(customer.id);
        order.customer.is_guest = false;
        state.orders.insert(order).unwrap()
    }

    fn customer() -> Actor {
        Actor::new(Uuid::from_u128(77), "Rina", Role::Customer)
    }

    #[tokio::test]
    async fn proof_then_approval_marks_paid() {
        let (state, blobs) = state();
        let customer = customer();
        let order = owned_order(&state, &customer);

        let awaiting = submit_payment_proof(&state, order.id, &customer, vec![1, 2], "image/png")
            .await
            .unwrap();
        assert_eq!(awaiting.payment.status, PaymentStatus::AwaitingConfirmation);
        assert!(blobs.get(awaiting.payment.proof_image_ref.as_deref().unwrap()).is_some());

        let paid = review_payment(&state, order.id, &admin(), true, None).unwrap();
        assert_eq!(paid.payment.status, PaymentStatus::Paid);
        assert!(paid.payment.paid_at.is_some());

        let payments = build_timeline(&paid, Direction::Asc)
            .into_iter()
            .filter(|e| e.kind == TimelineKind::Payment)
            .count();
        assert_eq!(payments, 2);
    }

    #[tokio::test]
    async fn rejected_payment_can_be_resubmitted() {
        let (state, _) = state();
        let customer = customer();
        let order = owned_order(&state, &customer);

        submit_payment_proof(&state, order.id, &customer, vec![1], "image/png")
            .await
            .unwrap();
        let failed = review_payment(&state, order.id, &admin(), false, Some("blurry".into())).unwrap();
        assert_eq!(failed.payment.status, PaymentStatus::Failed);
        assert!(failed.payment.paid_at.is_none());

        let again = submit_payment_proof(&state, order.id, &customer, vec![2], "image/png")
            .await
            .unwrap();
        assert_eq!(again.payment.status, PaymentStatus::AwaitingConfirmation);
    }

    #[tokio::test]
    async fn empty_payment_proof_is_rejected() {
        let (state, blobs) = state();
        let customer = customer();
        let order = owned_order(&state, &customer);

        let err = submit_payment_proof(&state, order.id, &customer, Vec::new(), "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::MissingEvidence));
        assert!(blobs.is_empty());
    }

    #[tokio::test]
    async fn strangers_cannot_upload_payment_proof() {
        let (state, _) = state();
        let order = owned_order(&state, &customer());
        let stranger = Actor::new(Uuid::from_u128(78), "Budi", Role::Customer);

        let err = submit_payment_proof(&state, order.id, &stranger, vec![1], "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn cancelled_order_payment_cannot_be_reviewed() {
        let (state, _) = state();
        let customer = customer();
        let order = owned_order(&state, &customer);

        submit_payment_proof(&state, order.id, &customer, vec![1], "image/png")
            .await
            .unwrap();
        let cancelled = cancel(&state, order.id, &admin(), Some("customer changed mind".into())).unwrap();

        let err = review_payment(&state, order.id, &admin(), true, None).unwrap_err();
        assert!(matches!(
            err,
            OrderError::Transition(TransitionError::OrderClosed { .. })
        ));

        let stored = state.orders.get(order.id).unwrap();
        assert_eq!(stored.payment.status, cancelled.payment.status);
        assert!(stored.payment.paid_at.is_none());
        assert!(stored.payment.reviewed_at.is_none());
    }

    #[test]
    fn review_without_proof_is_invalid() {
        let (state, _) = state();
        let order = owned_order(&state, &customer());

        let err = review_payment(&state, order.id, &admin(), true, None).unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidPaymentState(PaymentStatus::Pending)
        ));
    }
}
