use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::error::TransitionError;
use crate::models::actor::{Actor, Role};
use crate::models::courier::GeoPoint;
use crate::models::event::OrderEvent;
use crate::models::order::{Order, StatusEntry};
use crate::models::status::OrderStatus;
use crate::state::AppState;
use crate::store::{StoreError, WriteError};

#[derive(Debug, Clone, Deserialize)]
pub struct TransitionRequest {
    pub status: OrderStatus,
    pub note: Option<String>,
    pub location: Option<GeoPoint>,
    /// Status the caller last saw; a mismatch fails with `StaleState`.
    pub expected_status: Option<OrderStatus>,
}

/// Checks that `target` is the single legal next step for `order`.
/// `cancelled` is legal from any non-terminal status.
pub fn validate(order: &Order, target: OrderStatus) -> Result<(), TransitionError> {
    if order.status.is_terminal() {
        return Err(TransitionError::OrderClosed {
            order_number: order.order_number.clone(),
            status: order.status,
        });
    }

    if target == OrderStatus::Cancelled || order.status.next() == Some(target) {
        return Ok(());
    }

    Err(TransitionError::InvalidTransition {
        from: order.status,
        to: target,
    })
}

/// Writes a validated transition into the document. History is only ever
/// appended to.
fn apply(order: &mut Order, entry: StatusEntry) {
    let leaves_engagement = !entry.status.is_courier_engaged();

    order.status = entry.status;
    order.status_history.push(entry);

    if leaves_engagement {
        order.active_courier = None;
    }
}

/// Validates `target` against `snapshot` and commits it with a write that
/// only succeeds if the stored order still has the snapshot's status.
/// `mutate` runs under the same lock, before the status is written.
pub(crate) fn commit<E, F>(
    state: &AppState,
    snapshot: &Order,
    target: OrderStatus,
    actor: &Actor,
    note: Option<String>,
    location: Option<GeoPoint>,
    mutate: F,
) -> Result<Order, E>
where
    E: From<TransitionError>,
    F: FnOnce(&mut Order) -> Result<(), E>,
{
    validate(snapshot, target)?;

    let entry = StatusEntry::new(target, actor, note, location);
    let written = state
        .orders
        .update_if_status(snapshot.id, snapshot.status, |order| {
            mutate(order)?;
            apply(order, entry);
            Ok(())
        });

    match written {
        Ok(order) => {
            record_committed(state, &order, actor);
            Ok(order)
        }
        Err(WriteError::Rejected(err)) => Err(err),
        Err(WriteError::Store(err)) => {
            if let StoreError::StaleState { current, .. } = &err {
                state.metrics.transition_conflicts_total.inc();
                warn!(
                    order_id = %snapshot.id,
                    expected = %snapshot.status,
                    current = %current,
                    target = %target,
                    "transition lost a concurrent update"
                );
            }
            Err(TransitionError::from(err).into())
        }
    }
}

pub(crate) fn record_committed(state: &AppState, order: &Order, actor: &Actor) {
    state
        .metrics
        .status_transitions_total
        .with_label_values(&[order.status.as_str()])
        .inc();
    if order.status.is_terminal() {
        state.metrics.orders_open.dec();
    }

    let event = OrderEvent {
        order_id: order.id,
        order_number: order.order_number.clone(),
        status: order.status,
        label: order.status.meta().label.to_string(),
        actor_name: actor.name.clone(),
        courier_id: order.assigned_courier_id(),
        at: Utc::now(),
    };
    // no subscribers is fine
    let _ = state.order_events_tx.send(event);

    info!(
        order_id = %order.id,
        order_number = %order.order_number,
        status = %order.status,
        actor = %actor.name,
        "order status changed"
    );
}

/// Moves an order to `target` from whatever status it has now, skipping the
/// role checks in `advance`. Tests use it to stage orders.
#[cfg(test)]
pub(crate) fn transition(
    state: &AppState,
    order_id: Uuid,
    target: OrderStatus,
    actor: &Actor,
    note: Option<String>,
    location: Option<GeoPoint>,
) -> Result<Order, TransitionError> {
    let snapshot = state.orders.get(order_id)?;
    commit(state, &snapshot, target, actor, note, location, |_| Ok(()))
}

fn authorize(actor: &Actor, order: &Order, target: OrderStatus) -> Result<(), TransitionError> {
    if target.is_dispatch_controlled() {
        return Err(TransitionError::ReservedStatus(target));
    }

    match actor.role {
        Role::Admin => Ok(()),
        Role::Customer
            if target == OrderStatus::Cancelled
                && order.status == OrderStatus::Pending
                && order.is_owned_by(actor) =>
        {
            Ok(())
        }
        Role::Customer => Err(TransitionError::Unauthorized(
            "customers may only cancel their own pending orders".to_string(),
        )),
        Role::Courier => Err(TransitionError::Unauthorized(
            "couriers move orders through accept and pickup proof".to_string(),
        )),
    }
}

/// Role-checked transition used by the admin and customer surfaces.
pub fn advance(
    state: &AppState,
    order_id: Uuid,
    actor: &Actor,
    request: TransitionRequest,
) -> Result<Order, TransitionError> {
    let snapshot = state.orders.get(order_id)?;

    match request.expected_status {
        Some(expected) if expected != snapshot.status => {
            return Err(TransitionError::StaleState {
                expected,
                current: snapshot.status,
            });
        }
        _ => {}
    }

    authorize(actor, &snapshot, request.status)?;

    commit(
        state,
        &snapshot,
        request.status,
        actor,
        request.note,
        request.location,
        |_| Ok(()),
    )
}

pub fn cancel(
    state: &AppState,
    order_id: Uuid,
    actor: &Actor,
    note: Option<String>,
) -> Result<Order, TransitionError> {
    advance(
        state,
        order_id,
        actor,
        TransitionRequest {
            status: OrderStatus::Cancelled,
            note,
            location: None,
            expected_status: None,
        },
    )
}


#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::test_support::{admin, seed_order, state};
    use super::{TransitionRequest, advance, cancel, transition};
    use crate::engine::error::TransitionError;
    use crate::models::actor::{Actor, Role};
    use crate::models::status::OrderStatus;

    fn request(status: OrderStatus) -> TransitionRequest {
        TransitionRequest {
            status,
            note: None,
            location: None,
            expected_status: None,
        }
    }

    #[test]
    fn next_status_is_appended_to_history() {
        let (state, _) = state();
        let order = seed_order(&state, "SC-A");

        let updated = transition(
            &state,
            order.id,
            OrderStatus::Confirmed,
            &admin(),
            Some("looks good".to_string()),
            None,
        )
        .unwrap();

        assert_eq!(updated.status, OrderStatus::Confirmed);
        assert_eq!(updated.status_history.len(), 2);
        assert_eq!(updated.status_history.last().unwrap().status, updated.status);
        assert_eq!(updated.status_history[0].status, OrderStatus::Pending);
        assert_eq!(
            updated.status_history[1].note.as_deref(),
            Some("looks good")
        );
    }

    #[test]
    fn skipping_a_stage_is_rejected() {
        let (state, _) = state();
        let order = seed_order(&state, "SC-B");

        let err = transition(&state, order.id, OrderStatus::InWorkshop, &admin(), None, None)
            .unwrap_err();

        assert_eq!(
            err,
            TransitionError::InvalidTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::InWorkshop,
            }
        );
        assert_eq!(state.orders.get(order.id).unwrap().status_history.len(), 1);
    }

    #[test]
    fn terminal_orders_accept_nothing() {
        let (state, _) = state();
        let order = seed_order(&state, "SC-C");
        cancel(&state, order.id, &admin(), None).unwrap();

        let err = transition(&state, order.id, OrderStatus::Confirmed, &admin(), None, None)
            .unwrap_err();
        assert!(matches!(err, TransitionError::OrderClosed { .. }));

        let err = cancel(&state, order.id, &admin(), None).unwrap_err();
        assert!(matches!(err, TransitionError::OrderClosed { .. }));
    }

    #[test]
    fn stale_expected_status_is_reported() {
        let (state, _) = state();
        let order = seed_order(&state, "SC-D");
        transition(&state, order.id, OrderStatus::Confirmed, &admin(), None, None).unwrap();

        let mut req = request(OrderStatus::Cancelled);
        req.expected_status = Some(OrderStatus::Pending);
        let err = advance(&state, order.id, &admin(), req).unwrap_err();

        assert_eq!(
            err,
            TransitionError::StaleState {
                expected: OrderStatus::Pending,
                current: OrderStatus::Confirmed,
            }
        );
    }

    #[test]
    fn dispatch_statuses_cannot_be_set_directly() {
        let (state, _) = state();
        let order = seed_order(&state, "SC-E");
        advance(&state, order.id, &admin(), request(OrderStatus::Confirmed)).unwrap();

        let err = advance(
            &state,
            order.id,
            &admin(),
            request(OrderStatus::CourierAssigned),
        )
        .unwrap_err();

        assert_eq!(
            err,
            TransitionError::ReservedStatus(OrderStatus::CourierAssigned)
        );
    }

    #[test]
    fn customer_may_cancel_only_own_pending_order() {
        let (state, _) = state();
        let owner = Actor::new(Uuid::from_u128(42), "Rina", Role::Customer);
        let mut fixture = crate::store::fixtures::order("SC-F");
        fixture.customer.account_id = Some(owner.id);
        fixture.customer.is_guest = false;
        let order = state.orders.insert(fixture).unwrap();

        let stranger = Actor::new(Uuid::from_u128(43), "Budi", Role::Customer);
        assert!(matches!(
            cancel(&state, order.id, &stranger, None),
            Err(TransitionError::Unauthorized(_))
        ));

        let cancelled = cancel(&state, order.id, &owner, Some("changed my mind".into())).unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
    }

    #[test]
    fn couriers_cannot_use_the_generic_transition() {
        let (state, _) = state();
        let order = seed_order(&state, "SC-G");
        let courier = Actor::new(Uuid::from_u128(7), "Kurir", Role::Courier);

        let err = advance(&state, order.id, &courier, request(OrderStatus::Confirmed)).unwrap_err();
        assert!(matches!(err, TransitionError::Unauthorized(_)));
    }

    #[test]
    fn committed_transition_is_broadcast() {
        let (state, _) = state();
        let mut rx = state.order_events_tx.subscribe();
        let order = seed_order(&state, "SC-H");

        transition(&state, order.id, OrderStatus::Confirmed, &admin(), None, None).unwrap();

        let event = rx.try_recv().unwrap();
        assert_eq!(event.order_id, order.id);
        assert_eq!(event.status, OrderStatus::Confirmed);
        assert_eq!(event.label, OrderStatus::Confirmed.meta().label);
    }

    #[test]
    fn unknown_order_is_not_found() {
        let (state, _) = state();
        let id = Uuid::new_v4();
        assert_eq!(
            transition(&state, id, OrderStatus::Confirmed, &admin(), None, None).unwrap_err(),
            TransitionError::NotFound(id)
        );
    }
}
