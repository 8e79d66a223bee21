use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::error::{DispatchError, TransitionError};
use crate::engine::status;
use crate::geo::haversine_km;
use crate::models::actor::{Actor, Role};
use crate::models::courier::{Courier, GeoPoint};
use crate::models::order::{ActiveCourier, AssignedCourier, Order, StatusEntry};
use crate::models::status::OrderStatus;
use crate::state::AppState;
use crate::store::WriteError;

#[derive(Debug, Clone, Serialize)]
pub struct EligibleCourier {
    pub courier: Courier,
    pub distance_km: Option<f64>,
    pub is_busy: bool,
    /// Order number keeping the courier busy, if any.
    pub busy_with: Option<String>,
    /// Admins may always dispatch, busy or not.
    pub can_be_assigned: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueuedOrder {
    pub order: Order,
    pub assigned_at: DateTime<Utc>,
    pub assigned_by_name: String,
    pub dispatch_note: Option<String>,
}

/// Courier id -> order number, for couriers with an order in a busy status.
fn busy_couriers(state: &AppState) -> HashMap<Uuid, String> {
    state
        .orders
        .filter(|order| order.status.marks_courier_busy())
        .into_iter()
        .filter_map(|order| {
            order
                .assigned_courier_id()
                .map(|courier_id| (courier_id, order.order_number))
        })
        .collect()
}

/// Every active courier, nearest first; couriers without a known location
/// come last. Busy couriers are flagged, never hidden.
pub fn list_eligible_couriers(state: &AppState, pickup: &GeoPoint) -> Vec<EligibleCourier> {
    let busy = busy_couriers(state);

    let mut eligible: Vec<EligibleCourier> = state
        .couriers
        .iter()
        .filter(|entry| entry.value().is_active)
        .map(|entry| {
            let courier = entry.value().clone();
            let busy_with = busy.get(&courier.id).cloned();
            EligibleCourier {
                distance_km: courier
                    .current_location
                    .as_ref()
                    .map(|location| haversine_km(location, pickup)),
                is_busy: busy_with.is_some(),
                busy_with,
                can_be_assigned: true,
                courier,
            }
        })
        .collect();

    eligible.sort_by(|a, b| {
        let by_distance = match (a.distance_km, b.distance_km) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        };
        by_distance.then_with(|| a.courier.name.cmp(&b.courier.name))
    });

    eligible
}

pub fn eligible_couriers_for_order(
    state: &AppState,
    order_id: Uuid,
) -> Result<Vec<EligibleCourier>, DispatchError> {
    let order = state.orders.get(order_id)?;
    Ok(list_eligible_couriers(state, &order.pickup.location))
}

fn outcome(result: &Result<Order, DispatchError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(DispatchError::CourierBusy { .. }) => "courier_busy",
        Err(DispatchError::Transition(TransitionError::StaleState { .. })) => "stale",
        Err(_) => "rejected",
    }
}

fn record(state: &AppState, operation: &str, started: Instant, result: &Result<Order, DispatchError>) {
    state.metrics.record_dispatch(operation, outcome(result));
    state
        .metrics
        .observe_latency(operation, started.elapsed().as_secs_f64());
}

/// Puts a courier on an order. Does not check whether the courier is busy:
/// several orders may be queued on one courier and worked off in sequence.
pub fn assign(
    state: &AppState,
    order_id: Uuid,
    courier_id: Uuid,
    actor: &Actor,
    note: Option<String>,
) -> Result<Order, DispatchError> {
    let started = Instant::now();
    let result = assign_inner(state, order_id, courier_id, actor, note);
    record(state, "assign", started, &result);

    if let Ok(order) = &result {
        info!(
            order_id = %order.id,
            courier_id = %courier_id,
            admin = %actor.name,
            "courier assigned"
        );
    }
    result
}

fn assign_inner(
    state: &AppState,
    order_id: Uuid,
    courier_id: Uuid,
    actor: &Actor,
    note: Option<String>,
) -> Result<Order, DispatchError> {
    if actor.role != Role::Admin {
        return Err(DispatchError::Unauthorized(
            "only admins assign couriers".to_string(),
        ));
    }

    let courier = state
        .couriers
        .get(&courier_id)
        .map(|entry| entry.value().clone())
        .ok_or(DispatchError::CourierNotFound(courier_id))?;
    if !courier.is_active {
        return Err(DispatchError::CourierInactive(courier_id));
    }

    let snapshot = state.orders.get(order_id)?;
    let now = Utc::now();
    let engagement = ActiveCourier {
        courier_id,
        courier_name: courier.name.clone(),
        assigned_by: actor.id,
        assigned_by_name: actor.name.clone(),
        assigned_at: now,
        dispatch_note: note.clone(),
        accepted_at: None,
        pickup_started_at: None,
        current_location: None,
    };
    let assigned = AssignedCourier {
        courier_id,
        courier_name: courier.name.clone(),
        assigned_at: now,
    };

    match snapshot.status {
        OrderStatus::Confirmed => status::commit(
            state,
            &snapshot,
            OrderStatus::CourierAssigned,
            actor,
            note,
            None,
            |order| {
                order.active_courier = Some(engagement);
                order.assigned_courier = Some(assigned);
                Ok::<(), DispatchError>(())
            },
        ),
        OrderStatus::CourierAssigned => reassign(state, &snapshot, engagement, assigned, actor, note),
        current if current.is_terminal() => Err(TransitionError::OrderClosed {
            order_number: snapshot.order_number,
            status: current,
        }
        .into()),
        current => Err(DispatchError::NotAssignable(current)),
    }
}

/// Swaps the courier on an order that has not been accepted yet. The status
/// stays `courier_assigned`; a history entry records the swap.
fn reassign(
    state: &AppState,
    snapshot: &Order,
    engagement: ActiveCourier,
    assigned: AssignedCourier,
    actor: &Actor,
    note: Option<String>,
) -> Result<Order, DispatchError> {
    let previous = snapshot
        .active_courier
        .as_ref()
        .map(|c| c.courier_name.clone())
        .unwrap_or_default();
    let history_note = match note {
        Some(note) => format!("reassigned from {previous} to {}: {note}", engagement.courier_name),
        None => format!("reassigned from {previous} to {}", engagement.courier_name),
    };
    let entry = StatusEntry::new(OrderStatus::CourierAssigned, actor, Some(history_note), None);

    let written = state
        .orders
        .update_if_status(snapshot.id, OrderStatus::CourierAssigned, |order| {
            order.active_courier = Some(engagement);
            order.assigned_courier = Some(assigned);
            order.status_history.push(entry);
            Ok::<(), DispatchError>(())
        });

    match written {
        Ok(order) => {
            status::record_committed(state, &order, actor);
            Ok(order)
        }
        Err(WriteError::Rejected(err)) => Err(err),
        Err(WriteError::Store(err)) => Err(err.into()),
    }
}

/// Courier takes an assigned order into active pickup. At most one order per
/// courier may be in `pickup_in_progress`/`picked_up`; the check and the
/// write run under the courier's lock.
pub fn accept(state: &AppState, order_id: Uuid, actor: &Actor) -> Result<Order, DispatchError> {
    let started = Instant::now();
    let result = accept_inner(state, order_id, actor);
    record(state, "accept", started, &result);

    match &result {
        Ok(order) => info!(order_id = %order.id, courier_id = %actor.id, "pickup accepted"),
        Err(DispatchError::CourierBusy {
            active_order_number,
        }) => warn!(
            order_id = %order_id,
            courier_id = %actor.id,
            active_order = %active_order_number,
            "accept blocked by active pickup"
        ),
        Err(_) => {}
    }
    result
}

fn accept_inner(state: &AppState, order_id: Uuid, actor: &Actor) -> Result<Order, DispatchError> {
    if actor.role != Role::Courier {
        return Err(DispatchError::Unauthorized(
            "only couriers accept pickups".to_string(),
        ));
    }
    let courier_id = actor.id;

    let lock = state.courier_lock(courier_id);
    let _guard = lock
        .lock()
        .map_err(|_| DispatchError::Internal("courier lock poisoned".to_string()))?;

    let snapshot = state.orders.get(order_id)?;
    status::validate(&snapshot, OrderStatus::PickupInProgress)?;

    if snapshot.active_courier_id() != Some(courier_id) {
        return Err(DispatchError::Unauthorized(
            "order is not assigned to this courier".to_string(),
        ));
    }

    let in_progress = state.orders.filter(|order| {
        order.id != order_id
            && order.status.is_pickup_active()
            && order.assigned_courier_id() == Some(courier_id)
    });
    if let Some(active) = in_progress.into_iter().next() {
        return Err(DispatchError::CourierBusy {
            active_order_number: active.order_number,
        });
    }

    status::commit(
        state,
        &snapshot,
        OrderStatus::PickupInProgress,
        actor,
        None,
        None,
        |order| match order.active_courier.as_mut() {
            Some(engagement) if engagement.courier_id == courier_id => {
                let now = Utc::now();
                engagement.accepted_at = Some(now);
                engagement.pickup_started_at = Some(now);
                Ok(())
            }
            _ => Err(DispatchError::Unauthorized(
                "order was reassigned to another courier".to_string(),
            )),
        },
    )
}

fn authorize_courier_view(actor: &Actor, courier_id: Uuid) -> Result<(), DispatchError> {
    if actor.is_admin() || actor.is_courier(courier_id) {
        Ok(())
    } else {
        Err(DispatchError::Unauthorized(
            "couriers can only see their own work".to_string(),
        ))
    }
}

/// Orders assigned to `courier_id` and not yet accepted, oldest first.
pub fn courier_queue(
    state: &AppState,
    courier_id: Uuid,
    actor: &Actor,
) -> Result<Vec<QueuedOrder>, DispatchError> {
    authorize_courier_view(actor, courier_id)?;

    let mut queue: Vec<QueuedOrder> = state
        .orders
        .filter(|order| {
            order.status == OrderStatus::CourierAssigned
                && order.active_courier_id() == Some(courier_id)
        })
        .into_iter()
        .filter_map(|order| {
            let engagement = order.active_courier.clone()?;
            Some(QueuedOrder {
                assigned_at: engagement.assigned_at,
                assigned_by_name: engagement.assigned_by_name,
                dispatch_note: engagement.dispatch_note,
                order,
            })
        })
        .collect();

    queue.sort_by(|a, b| {
        a.assigned_at
            .cmp(&b.assigned_at)
            .then_with(|| a.order.order_number.cmp(&b.order.order_number))
    });
    Ok(queue)
}

/// The order the courier currently has in hand, if any.
pub fn active_task(
    state: &AppState,
    courier_id: Uuid,
    actor: &Actor,
) -> Result<Option<Order>, DispatchError> {
    authorize_courier_view(actor, courier_id)?;

    Ok(state
        .orders
        .filter(|order| {
            order.status.is_pickup_active() && order.assigned_courier_id() == Some(courier_id)
        })
        .into_iter()
        .next())
}

/// Mirrors a courier's new position onto the pickup they are driving to.
pub fn track_courier(state: &AppState, courier_id: Uuid, location: GeoPoint) -> usize {
    let in_progress = state.orders.filter(|order| {
        order.status == OrderStatus::PickupInProgress
            && order.active_courier_id() == Some(courier_id)
    });

    in_progress
        .iter()
        .filter(|order| {
            state
                .orders
                .update_if_status(order.id, OrderStatus::PickupInProgress, |order| {
                    match order.active_courier.as_mut() {
                        Some(engagement) if engagement.courier_id == courier_id => {
                            engagement.current_location = Some(location);
                            Ok(())
                        }
                        _ => Err(()),
                    }
                })
                .is_ok()
        })
        .count()
}
