use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::error::{OrderError, TransitionError};
use crate::geo::{FeeQuote, compute_fee, find_nearest, haversine_km, validate_point};
use crate::models::actor::{Actor, Role};
use crate::models::courier::GeoPoint;
use crate::models::drop_point::DropPoint;
use crate::models::order::{
    CustomerInfo, EditEntry, LoyaltyPoints, Order, OrderItem, Payment, PaymentStatus,
    PickupLocation, ServiceType, StatusEntry,
};
use crate::models::status::OrderStatus;
use crate::state::AppState;
use crate::store::{StoreError, WriteError};

const ORDER_NUMBER_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPickup {
    pub address: String,
    pub location: GeoPoint,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub customer: NewCustomer,
    pub service_type: ServiceType,
    pub pickup: NewPickup,
    pub items: Vec<OrderItem>,
    pub payment_method: String,
    #[serde(default)]
    pub points_to_use: i64,
    /// Customer's explicit drop point choice; nearest active one otherwise.
    pub drop_point_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct PriceSummary {
    pub subtotal: i64,
    pub delivery_fee: i64,
    pub points_discount: i64,
    pub final_amount: i64,
    pub points_earned: i64,
}

/// Order totals. Points are worth one currency unit each and can never push
/// the amount below zero.
pub fn price_order(
    items: &[OrderItem],
    delivery_fee: i64,
    points_requested: i64,
    rate: f64,
) -> Result<PriceSummary, OrderError> {
    let too_large = || OrderError::Validation("order amount is too large".to_string());
    let subtotal = items.iter().try_fold(0i64, |total, item| {
        item.line_total()
            .and_then(|line| total.checked_add(line))
            .ok_or_else(too_large)
    })?;
    let gross = subtotal.checked_add(delivery_fee).ok_or_else(too_large)?;
    let points_discount = points_requested.min(gross).max(0);
    let final_amount = gross - points_discount;

    Ok(PriceSummary {
        subtotal,
        delivery_fee,
        points_discount,
        final_amount,
        points_earned: (final_amount as f64 * rate).floor() as i64,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub drop_point: DropPoint,
    pub distance_km: f64,
    pub fee: FeeQuote,
}

fn resolve_drop_point(
    state: &AppState,
    point: &GeoPoint,
    requested: Option<Uuid>,
) -> Result<(DropPoint, f64), OrderError> {
    if let Some(id) = requested {
        let chosen = state
            .drop_points
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| OrderError::Validation(format!("drop point {id} not found")))?;
        if !chosen.is_active() {
            return Err(OrderError::Validation(format!(
                "drop point {} is not active",
                chosen.name
            )));
        }
        let distance = haversine_km(point, &chosen.location);
        return Ok((chosen, distance));
    }

    let nearest = find_nearest(point, &state.drop_points_snapshot())?.nearest;
    Ok((nearest.drop_point, nearest.distance_km))
}

fn fee_for(service_type: ServiceType, drop_point: &DropPoint, distance_km: f64) -> FeeQuote {
    match service_type {
        ServiceType::PickupDelivery => compute_fee(
            distance_km,
            drop_point.radius_max_km,
            drop_point.charge_outside_radius,
        ),
        // Walk-in customers bring the shoes themselves.
        ServiceType::DropPoint => compute_fee(0.0, drop_point.radius_max_km, 0),
    }
}

/// Fee preview for a location without creating anything.
pub fn quote(state: &AppState, point: &GeoPoint, service_type: ServiceType) -> Result<Quote, OrderError> {
    let (drop_point, distance_km) = resolve_drop_point(state, point, None)?;
    let fee = fee_for(service_type, &drop_point, distance_km);
    Ok(Quote {
        drop_point,
        distance_km,
        fee,
    })
}

fn validate_items(items: &[OrderItem]) -> Result<(), OrderError> {
    if items.is_empty() {
        return Err(OrderError::Validation("at least one item is required".to_string()));
    }
    for item in items {
        if item.item_type.trim().is_empty() || item.treatment_type.trim().is_empty() {
            return Err(OrderError::Validation(
                "item type and treatment are required".to_string(),
            ));
        }
        if item.quantity == 0 {
            return Err(OrderError::Validation("quantity must be > 0".to_string()));
        }
        if item.unit_price < 0 {
            return Err(OrderError::Validation("unit price cannot be negative".to_string()));
        }
    }
    Ok(())
}

fn validate(new: &NewOrder) -> Result<(), OrderError> {
    if new.customer.name.trim().is_empty() {
        return Err(OrderError::Validation("customer name cannot be empty".to_string()));
    }
    if new.customer.phone.trim().is_empty() {
        return Err(OrderError::Validation("customer phone cannot be empty".to_string()));
    }
    if new.pickup.address.trim().is_empty() {
        return Err(OrderError::Validation("pickup address cannot be empty".to_string()));
    }
    if new.points_to_use < 0 {
        return Err(OrderError::Validation("points cannot be negative".to_string()));
    }
    validate_point(&new.pickup.location)?;
    validate_items(&new.items)
}

/// Creates a `pending` order. `actor` is `None` for guest checkouts.
pub fn create_order(state: &AppState, actor: Option<&Actor>, new: NewOrder) -> Result<Order, OrderError> {
    validate(&new)?;

    let account = match actor {
        Some(actor) if actor.role == Role::Customer => Some(actor.id),
        Some(_) | None => None,
    };

    let (drop_point, distance_km) =
        resolve_drop_point(state, &new.pickup.location, new.drop_point_id)?;
    let fee = fee_for(new.service_type, &drop_point, distance_km);
    let price = price_order(&new.items, fee.fee, new.points_to_use, state.loyalty_point_rate)?;

    let now = Utc::now();
    let creator_name = actor.map_or_else(|| new.customer.name.clone(), |a| a.name.clone());
    let mut order = Order {
        id: Uuid::new_v4(),
        order_number: String::new(),
        customer: CustomerInfo {
            name: new.customer.name,
            phone: new.customer.phone,
            account_id: account,
            is_guest: account.is_none(),
        },
        service_type: new.service_type,
        pickup: PickupLocation {
            address: new.pickup.address,
            location: new.pickup.location,
            drop_point_id: Some(drop_point.id),
            drop_point_name: Some(drop_point.name.clone()),
            distance_km: Some(distance_km),
            delivery_fee: fee.fee,
        },
        items: new.items,
        payment: Payment {
            method: new.payment_method,
            status: PaymentStatus::Pending,
            subtotal: price.subtotal,
            delivery_fee: price.delivery_fee,
            points_discount: price.points_discount,
            final_amount: price.final_amount,
            proof_image_ref: None,
            proof_uploaded_at: None,
            reviewed_by: None,
            review_note: None,
            reviewed_at: None,
            paid_at: None,
        },
        status: OrderStatus::Pending,
        status_history: vec![StatusEntry {
            status: OrderStatus::Pending,
            timestamp: now,
            actor_id: actor.map(|a| a.id),
            actor_name: creator_name,
            note: None,
            location: None,
        }],
        edit_history: Vec::new(),
        active_courier: None,
        assigned_courier: None,
        pickup_proof: None,
        loyalty_points: LoyaltyPoints {
            earned: price.points_earned,
            used: price.points_discount,
            rate: state.loyalty_point_rate,
        },
        created_at: now,
        updated_at: now,
    };

    for _ in 0..ORDER_NUMBER_ATTEMPTS {
        order.order_number = state.orders.next_order_number(&state.order_number_prefix);
        match state.orders.insert(order.clone()) {
            Ok(created) => {
                state.metrics.orders_open.inc();
                info!(
                    order_id = %created.id,
                    order_number = %created.order_number,
                    drop_point = %drop_point.name,
                    distance_km,
                    fee = created.pickup.delivery_fee,
                    "order created"
                );
                return Ok(created);
            }
            Err(StoreError::DuplicateOrderNumber(number)) => {
                warn!(order_number = %number, "order number collision, retrying");
            }
            Err(other) => return Err(other.into()),
        }
    }

    Err(OrderError::OrderNumberExhausted)
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderEdit {
    pub items: Option<Vec<OrderItem>>,
    pub pickup_address: Option<String>,
    pub reason: String,
}

/// Explicit edit of items or pickup address, recorded in the edit history.
pub fn edit_order(state: &AppState, order_id: Uuid, actor: &Actor, edit: OrderEdit) -> Result<Order, OrderError> {
    if edit.reason.trim().is_empty() {
        return Err(OrderError::Validation("an edit needs a reason".to_string()));
    }
    if let Some(items) = &edit.items {
        validate_items(items)?;
    }
    if edit
        .pickup_address
        .as_deref()
        .is_some_and(|address| address.trim().is_empty())
    {
        return Err(OrderError::Validation("pickup address cannot be empty".to_string()));
    }

    let rate = state.loyalty_point_rate;
    let written = state.orders.update(order_id, |order| {
        if order.status.is_terminal() {
            return Err(OrderError::Transition(TransitionError::OrderClosed {
                order_number: order.order_number.clone(),
                status: order.status,
            }));
        }
        let allowed = actor.is_admin()
            || (order.is_owned_by(actor) && order.status == OrderStatus::Pending);
        if !allowed {
            return Err(OrderError::Unauthorized(
                "only admins edit confirmed orders".to_string(),
            ));
        }

        let mut changed = Vec::new();
        if let Some(items) = edit.items.as_ref().filter(|items| **items != order.items) {
            let price =
                price_order(items, order.payment.delivery_fee, order.loyalty_points.used, rate)?;
            order.items = items.clone();
            order.payment.subtotal = price.subtotal;
            order.payment.points_discount = price.points_discount;
            order.payment.final_amount = price.final_amount;
            order.loyalty_points.used = price.points_discount;
            order.loyalty_points.earned = price.points_earned;
            changed.extend(["items", "payment.subtotal", "payment.final_amount"].map(String::from));
        }
        if let Some(address) = edit
            .pickup_address
            .as_ref()
            .filter(|address| **address != order.pickup.address)
        {
            order.pickup.address = address.clone();
            changed.push("pickup.address".to_string());
        }

        if changed.is_empty() {
            return Err(OrderError::Validation("edit changes nothing".to_string()));
        }

        order.edit_history.push(EditEntry {
            actor_id: actor.id,
            actor_name: actor.name.clone(),
            timestamp: Utc::now(),
            changed_fields: changed,
            reason: edit.reason.clone(),
        });
        Ok(())
    });

    match written {
        Ok(order) => {
            info!(order_id = %order.id, editor = %actor.name, "order edited");
            Ok(order)
        }
        Err(WriteError::Rejected(err)) => Err(err),
        Err(WriteError::Store(err)) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{NewCustomer, NewOrder, NewPickup, OrderEdit, create_order, edit_order, price_order, quote};
    use crate::engine::error::{OrderError, TransitionError};
    use crate::engine::status::test_support::{admin, state};
    use crate::engine::status::cancel;
    use crate::geo::GeoError;
    use crate::models::actor::{Actor, Role};
    use crate::models::courier::GeoPoint;
    use crate::models::drop_point::{DropPoint, DropPointStatus};
    use crate::models::order::{OrderItem, ServiceType};
    use crate::models::status::OrderStatus;
    use crate::state::AppState;

    // 0.045 degrees of latitude is ~5.004 km
    const HUB: GeoPoint = GeoPoint {
        lat: -6.2,
        lng: 106.8,
    };

    fn add_drop_point(state: &AppState, seed: u128, location: GeoPoint, status: DropPointStatus) -> Uuid {
        let id = Uuid::from_u128(seed);
        state.drop_points.insert(
            id,
            DropPoint {
                id,
                name: format!("hub-{seed}"),
                address: "Jl. Sudirman".to_string(),
                location,
                capacity: 100,
                current_load: 0,
                radius_max_km: 5.0,
                charge_outside_radius: 2000,
                status,
                admin_id: None,
                created_at: Utc::now(),
            },
        );
        id
    }

    fn item(quantity: u32, unit_price: i64) -> OrderItem {
        OrderItem {
            item_type: "sneakers".to_string(),
            treatment_type: "deep_clean".to_string(),
            quantity,
            unit_price,
        }
    }

    fn new_order(lat_offset: f64) -> NewOrder {
        NewOrder {
            customer: NewCustomer {
                name: "Rina".to_string(),
                phone: "0812".to_string(),
            },
            service_type: ServiceType::PickupDelivery,
            pickup: NewPickup {
                address: "Jl. Kenanga 9".to_string(),
                location: GeoPoint {
                    lat: HUB.lat + lat_offset,
                    lng: HUB.lng,
                },
            },
            items: vec![item(2, 35_000)],
            payment_method: "transfer".to_string(),
            points_to_use: 0,
            drop_point_id: None,
        }
    }

    #[test]
    fn pricing_caps_points_at_gross_amount() {
        let summary = price_order(&[item(1, 10_000)], 2_000, 50_000, 0.01).unwrap();
        assert_eq!(summary.subtotal, 10_000);
        assert_eq!(summary.points_discount, 12_000);
        assert_eq!(summary.final_amount, 0);
        assert_eq!(summary.points_earned, 0);
    }

    #[test]
    fn pricing_earns_points_on_final_amount() {
        let summary = price_order(&[item(3, 30_000)], 4_000, 1_000, 0.01).unwrap();
        assert_eq!(summary.subtotal, 90_000);
        assert_eq!(summary.final_amount, 93_000);
        assert_eq!(summary.points_earned, 930);
    }

    #[test]
    fn pricing_rejects_totals_that_overflow() {
        assert!(matches!(
            price_order(&[item(2, i64::MAX / 2 + 1)], 0, 0, 0.01),
            Err(OrderError::Validation(_))
        ));
        assert!(matches!(
            price_order(&[item(1, i64::MAX), item(1, 1)], 0, 0, 0.01),
            Err(OrderError::Validation(_))
        ));
        assert!(matches!(
            price_order(&[item(1, i64::MAX)], 1, 0, 0.01),
            Err(OrderError::Validation(_))
        ));
    }

    #[test]
    fn oversized_order_is_rejected_without_storing() {
        let (state, _) = state();
        add_drop_point(&state, 1, HUB, DropPointStatus::Active);
        let mut new = new_order(0.0);
        new.items = vec![item(2, i64::MAX / 2 + 1)];

        assert!(matches!(
            create_order(&state, None, new),
            Err(OrderError::Validation(_))
        ));
        assert!(state.orders.is_empty());
    }

    #[test]
    fn out_of_range_pickup_coordinates_are_rejected() {
        let (state, _) = state();
        add_drop_point(&state, 1, HUB, DropPointStatus::Active);
        let mut new = new_order(0.0);
        new.pickup.location.lat = 400.0;

        assert!(matches!(
            create_order(&state, None, new),
            Err(OrderError::Geo(GeoError::InvalidCoordinates(_)))
        ));
        assert!(state.orders.is_empty());
    }

    #[test]
    fn guest_order_is_pending_with_free_delivery_inside_radius() {
        let (state, _) = state();
        add_drop_point(&state, 1, HUB, DropPointStatus::Active);

        let order = create_order(&state, None, new_order(0.01)).unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.status_history.len(), 1);
        assert!(order.customer.is_guest);
        assert_eq!(order.pickup.delivery_fee, 0);
        assert_eq!(order.payment.subtotal, 70_000);
        assert_eq!(order.payment.final_amount, 70_000);
        assert!(order.order_number.starts_with("SC-"));
    }

    #[test]
    fn just_outside_radius_bills_one_km() {
        let (state, _) = state();
        add_drop_point(&state, 1, HUB, DropPointStatus::Active);

        let order = create_order(&state, None, new_order(0.0459)).unwrap();

        let distance = order.pickup.distance_km.unwrap();
        assert!(distance > 5.0 && distance < 6.0, "distance was {distance}");
        assert_eq!(order.pickup.delivery_fee, 2000);
        assert_eq!(order.payment.final_amount, 72_000);
    }

    #[test]
    fn drop_point_service_has_no_delivery_fee() {
        let (state, _) = state();
        add_drop_point(&state, 1, HUB, DropPointStatus::Active);
        let mut new = new_order(0.2);
        new.service_type = ServiceType::DropPoint;

        let order = create_order(&state, None, new).unwrap();
        assert_eq!(order.pickup.delivery_fee, 0);
    }

    #[test]
    fn no_active_drop_points_fails_intake() {
        let (state, _) = state();
        add_drop_point(&state, 1, HUB, DropPointStatus::Inactive);

        let err = create_order(&state, None, new_order(0.0)).unwrap_err();
        assert!(matches!(err, OrderError::Geo(GeoError::NoActiveDropPoints)));
        assert!(state.orders.is_empty());
    }

    #[test]
    fn explicit_inactive_drop_point_is_rejected() {
        let (state, _) = state();
        add_drop_point(&state, 1, HUB, DropPointStatus::Active);
        let closed = add_drop_point(&state, 2, HUB, DropPointStatus::Inactive);
        let mut new = new_order(0.0);
        new.drop_point_id = Some(closed);

        assert!(matches!(
            create_order(&state, None, new),
            Err(OrderError::Validation(_))
        ));
    }

    #[test]
    fn invalid_items_are_rejected() {
        let (state, _) = state();
        add_drop_point(&state, 1, HUB, DropPointStatus::Active);
        let mut new = new_order(0.0);
        new.items = vec![item(0, 10_000)];

        assert!(matches!(
            create_order(&state, None, new),
            Err(OrderError::Validation(_))
        ));
    }

    #[test]
    fn customer_account_is_linked() {
        let (state, _) = state();
        add_drop_point(&state, 1, HUB, DropPointStatus::Active);
        let customer = Actor::new(Uuid::from_u128(99), "Rina", Role::Customer);

        let order = create_order(&state, Some(&customer), new_order(0.0)).unwrap();

        assert!(!order.customer.is_guest);
        assert_eq!(order.customer.account_id, Some(customer.id));
        assert_eq!(order.status_history[0].actor_id, Some(customer.id));
    }

    #[test]
    fn order_numbers_are_unique() {
        let (state, _) = state();
        add_drop_point(&state, 1, HUB, DropPointStatus::Active);

        let a = create_order(&state, None, new_order(0.0)).unwrap();
        let b = create_order(&state, None, new_order(0.0)).unwrap();
        assert_ne!(a.order_number, b.order_number);
    }

    #[test]
    fn quote_matches_order_fee() {
        let (state, _) = state();
        add_drop_point(&state, 1, HUB, DropPointStatus::Active);
        let point = GeoPoint {
            lat: HUB.lat + 0.062,
            lng: HUB.lng,
        };

        let q = quote(&state, &point, ServiceType::PickupDelivery).unwrap();
        assert_eq!(q.fee.breakdown.excess_km, 2);
        assert_eq!(q.fee.fee, 4000);
    }

    #[test]
    fn edit_recomputes_totals_and_appends_history() {
        let (state, _) = state();
        add_drop_point(&state, 1, HUB, DropPointStatus::Active);
        let order = create_order(&state, None, new_order(0.0)).unwrap();

        let edited = edit_order(
            &state,
            order.id,
            &admin(),
            OrderEdit {
                items: Some(vec![item(3, 35_000)]),
                pickup_address: None,
                reason: "customer added a pair".to_string(),
            },
        )
        .unwrap();

        assert_eq!(edited.payment.subtotal, 105_000);
        assert_eq!(edited.edit_history.len(), 1);
        assert!(edited.edit_history[0].changed_fields.contains(&"items".to_string()));
        assert_eq!(edited.status, OrderStatus::Pending);
    }

    #[test]
    fn edit_on_closed_order_is_rejected() {
        let (state, _) = state();
        add_drop_point(&state, 1, HUB, DropPointStatus::Active);
        let order = create_order(&state, None, new_order(0.0)).unwrap();
        cancel(&state, order.id, &admin(), None).unwrap();

        let err = edit_order(
            &state,
            order.id,
            &admin(),
            OrderEdit {
                items: None,
                pickup_address: Some("Jl. Baru 1".to_string()),
                reason: "moved".to_string(),
            },
        )
        .unwrap_err();

        assert!(matches!(
            err,
            OrderError::Transition(TransitionError::OrderClosed { .. })
        ));
        assert!(state.orders.get(order.id).unwrap().edit_history.is_empty());
    }
}
