use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use thiserror::Error;
use uuid::Uuid;

use crate::models::order::Order;
use crate::models::status::OrderStatus;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("order {0} not found")]
    NotFound(Uuid),

    #[error("order number {0} already exists")]
    DuplicateOrderNumber(String),

    #[error("order {id} changed concurrently: expected {expected}, found {current}")]
    StaleState {
        id: Uuid,
        expected: OrderStatus,
        current: OrderStatus,
    },
}

/// Failure of a guarded write: either the store refused it or the caller's
/// mutation did.
#[derive(Debug)]
pub enum WriteError<E> {
    Store(StoreError),
    Rejected(E),
}

impl<E> From<StoreError> for WriteError<E> {
    fn from(err: StoreError) -> Self {
        WriteError::Store(err)
    }
}

/// Order persistence. Every write goes through the per-entry lock of the
/// backing map, so a conditional update observes and mutates the same
/// version of the document.
pub struct OrderStore {
    orders: DashMap<Uuid, Order>,
    order_numbers: DashMap<String, Uuid>,
    daily_sequence: DashMap<NaiveDate, u32>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self {
            orders: DashMap::new(),
            order_numbers: DashMap::new(),
            daily_sequence: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Next candidate number for today, e.g. `SC-20261019-0007`.
    pub fn next_order_number(&self, prefix: &str) -> String {
        let today = Utc::now().date_naive();
        let mut seq = self.daily_sequence.entry(today).or_insert(0);
        *seq += 1;
        format!("{prefix}-{}-{:04}", today.format("%Y%m%d"), *seq)
    }

    /// Inserts a new order, claiming its order number first.
    pub fn insert(&self, order: Order) -> Result<Order, StoreError> {
        match self.order_numbers.entry(order.order_number.clone()) {
            Entry::Occupied(_) => {
                return Err(StoreError::DuplicateOrderNumber(order.order_number));
            }
            Entry::Vacant(slot) => {
                slot.insert(order.id);
            }
        }

        self.orders.insert(order.id, order.clone());
        Ok(order)
    }

    pub fn get(&self, id: Uuid) -> Result<Order, StoreError> {
        self.orders
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound(id))
    }

    pub fn get_by_number(&self, order_number: &str) -> Option<Order> {
        let id = *self.order_numbers.get(order_number)?;
        self.orders.get(&id).map(|entry| entry.value().clone())
    }

    pub fn list(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }

    /// Snapshot of every order matching `predicate`.
    pub fn filter<P>(&self, predicate: P) -> Vec<Order>
    where
        P: Fn(&Order) -> bool,
    {
        self.orders
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Applies `mutate` only if the order is still in `expected` status.
    /// `mutate` works on a draft; the stored order is replaced only when it
    /// returns `Ok`, so a rejected mutation leaves nothing behind.
    pub fn update_if_status<E, F>(
        &self,
        id: Uuid,
        expected: OrderStatus,
        mutate: F,
    ) -> Result<Order, WriteError<E>>
    where
        F: FnOnce(&mut Order) -> Result<(), E>,
    {
        let mut entry = self.orders.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if entry.status != expected {
            return Err(StoreError::StaleState {
                id,
                expected,
                current: entry.status,
            }
            .into());
        }

        commit_draft(entry.value_mut(), mutate)
    }

    /// Applies `mutate` under the order's lock regardless of status.
    pub fn update<E, F>(&self, id: Uuid, mutate: F) -> Result<Order, WriteError<E>>
    where
        F: FnOnce(&mut Order) -> Result<(), E>,
    {
        let mut entry = self.orders.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        commit_draft(entry.value_mut(), mutate)
    }
}

fn commit_draft<E, F>(stored: &mut Order, mutate: F) -> Result<Order, WriteError<E>>
where
    F: FnOnce(&mut Order) -> Result<(), E>,
{
    let mut draft = stored.clone();
    mutate(&mut draft).map_err(WriteError::Rejected)?;
    draft.updated_at = Utc::now();
    *stored = draft.clone();
    Ok(draft)
}

impl Default for OrderStore {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::{OrderStore, StoreError, WriteError, fixtures};
    use crate::models::status::OrderStatus;

    #[test]
    fn rejected_mutation_surfaces_callers_error() {
        let store = OrderStore::new();
        let order = store.insert(fixtures::order("SC-5")).unwrap();

        let result = store.update(order.id, |_| Err::<(), _>("nope"));

        assert!(matches!(result, Err(WriteError::Rejected("nope"))));
    }

    #[test]
    fn rejected_mutation_leaves_no_partial_write() {
        let store = OrderStore::new();
        let order = store.insert(fixtures::order("SC-6")).unwrap();

        let result = store.update_if_status(order.id, OrderStatus::Pending, |draft| {
            draft.pickup.address = "half-written".to_string();
            draft.status = OrderStatus::Confirmed;
            Err::<(), _>("late check failed")
        });

        assert!(matches!(result, Err(WriteError::Rejected("late check failed"))));
        let stored = store.get(order.id).unwrap();
        assert_eq!(stored.pickup.address, order.pickup.address);
        assert_eq!(stored.status, OrderStatus::Pending);
        assert_eq!(stored.updated_at, order.updated_at);
    }

    #[test]
    fn missing_order_is_not_found() {
        let store = OrderStore::new();
        let id = uuid::Uuid::new_v4();

        let result = store.update(id, |_| Ok::<(), Infallible>(()));

        assert!(matches!(result, Err(WriteError::Store(StoreError::NotFound(missing))) if missing == id));
    }

    #[test]
    fn duplicate_order_number_is_rejected() {
        let store = OrderStore::new();
        store.insert(fixtures::order("SC-1")).unwrap();

        let err = store.insert(fixtures::order("SC-1")).unwrap_err();
        assert_eq!(err, StoreError::DuplicateOrderNumber("SC-1".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn order_numbers_increase_within_a_day() {
        let store = OrderStore::new();
        let first = store.next_order_number("SC");
        let second = store.next_order_number("SC");

        assert!(first.starts_with("SC-"));
        assert!(first.ends_with("-0001"));
        assert!(second.ends_with("-0002"));
        assert!(first < second);
    }

    #[test]
    fn conditional_update_rejects_stale_status() {
        let store = OrderStore::new();
        let order = store.insert(fixtures::order("SC-2")).unwrap();

        let result = store.update_if_status(order.id, OrderStatus::Confirmed, |o| {
            o.status = OrderStatus::CourierAssigned;
            Ok::<(), Infallible>(())
        });

        assert!(matches!(
            result,
            Err(WriteError::Store(StoreError::StaleState {
                expected: OrderStatus::Confirmed,
                current: OrderStatus::Pending,
                ..
            }))
        ));
        assert_eq!(store.get(order.id).unwrap().status, OrderStatus::Pending);
    }

    #[test]
    fn conditional_update_applies_when_status_matches() {
        let store = OrderStore::new();
        let order = store.insert(fixtures::order("SC-3")).unwrap();

        let updated = store
            .update_if_status(order.id, OrderStatus::Pending, |o| {
                o.status = OrderStatus::Confirmed;
                Ok::<(), Infallible>(())
            })
            .unwrap();

        assert_eq!(updated.status, OrderStatus::Confirmed);
        assert_eq!(store.get(order.id).unwrap().status, OrderStatus::Confirmed);
        assert!(updated.updated_at >= order.updated_at);
    }

    #[test]
    fn lookup_by_order_number() {
        let store = OrderStore::new();
        let order = store.insert(fixtures::order("SC-4")).unwrap();

        assert_eq!(store.get_by_number("SC-4").unwrap().id, order.id);
        assert!(store.get_by_number("SC-404").is_none());
    }
}
