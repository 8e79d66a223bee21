use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    CourierAssigned,
    PickupInProgress,
    PickedUp,
    InWorkshop,
    Processing,
    QcCheck,
    ReadyForDelivery,
    DeliveryInProgress,
    Completed,
    Cancelled,
}

/// Display metadata for a status. Projection only, never consulted for
/// control flow.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct StatusMeta {
    pub label: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 12] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::CourierAssigned,
        OrderStatus::PickupInProgress,
        OrderStatus::PickedUp,
        OrderStatus::InWorkshop,
        OrderStatus::Processing,
        OrderStatus::QcCheck,
        OrderStatus::ReadyForDelivery,
        OrderStatus::DeliveryInProgress,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    /// The single legal forward step on the happy path.
    pub fn next(self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Confirmed),
            OrderStatus::Confirmed => Some(OrderStatus::CourierAssigned),
            OrderStatus::CourierAssigned => Some(OrderStatus::PickupInProgress),
            OrderStatus::PickupInProgress => Some(OrderStatus::PickedUp),
            OrderStatus::PickedUp => Some(OrderStatus::InWorkshop),
            OrderStatus::InWorkshop => Some(OrderStatus::Processing),
            OrderStatus::Processing => Some(OrderStatus::QcCheck),
            OrderStatus::QcCheck => Some(OrderStatus::ReadyForDelivery),
            OrderStatus::ReadyForDelivery => Some(OrderStatus::DeliveryInProgress),
            OrderStatus::DeliveryInProgress => Some(OrderStatus::Completed),
            OrderStatus::Completed | OrderStatus::Cancelled => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Window in which `Order::active_courier` is populated.
    pub fn is_courier_engaged(self) -> bool {
        matches!(
            self,
            OrderStatus::CourierAssigned | OrderStatus::PickupInProgress
        )
    }

    /// A courier whose assigned order sits in one of these is reported busy.
    pub fn marks_courier_busy(self) -> bool {
        matches!(
            self,
            OrderStatus::CourierAssigned
                | OrderStatus::PickupInProgress
                | OrderStatus::PickedUp
                | OrderStatus::InWorkshop
                | OrderStatus::Processing
                | OrderStatus::DeliveryInProgress
        )
    }

    /// A task physically in the courier's hands; at most one per courier.
    pub fn is_pickup_active(self) -> bool {
        matches!(self, OrderStatus::PickupInProgress | OrderStatus::PickedUp)
    }

    /// Statuses only reachable through the dispatch and proof operations.
    pub fn is_dispatch_controlled(self) -> bool {
        matches!(
            self,
            OrderStatus::CourierAssigned | OrderStatus::PickupInProgress | OrderStatus::PickedUp
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::CourierAssigned => "courier_assigned",
            OrderStatus::PickupInProgress => "pickup_in_progress",
            OrderStatus::PickedUp => "picked_up",
            OrderStatus::InWorkshop => "in_workshop",
            OrderStatus::Processing => "processing",
            OrderStatus::QcCheck => "qc_check",
            OrderStatus::ReadyForDelivery => "ready_for_delivery",
            OrderStatus::DeliveryInProgress => "delivery_in_progress",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn meta(self) -> StatusMeta {
        let (label, description, icon) = match self {
            OrderStatus::Pending => (
                "Order received",
                "Waiting for the team to confirm the order",
                "clock",
            ),
            OrderStatus::Confirmed => (
                "Order confirmed",
                "The order was confirmed and is waiting for a courier",
                "check-circle",
            ),
            OrderStatus::CourierAssigned => (
                "Courier assigned",
                "A courier has been assigned to pick up the shoes",
                "user-check",
            ),
            OrderStatus::PickupInProgress => (
                "Pickup in progress",
                "The courier is on the way to the pickup address",
                "truck",
            ),
            OrderStatus::PickedUp => (
                "Picked up",
                "The courier has collected the shoes",
                "package",
            ),
            OrderStatus::InWorkshop => (
                "In workshop",
                "The shoes arrived at the workshop",
                "home",
            ),
            OrderStatus::Processing => (
                "Cleaning",
                "The shoes are being cleaned and treated",
                "droplet",
            ),
            OrderStatus::QcCheck => (
                "Quality check",
                "Final inspection before the shoes go back",
                "search",
            ),
            OrderStatus::ReadyForDelivery => (
                "Ready for delivery",
                "The shoes are packed and ready to go back",
                "box",
            ),
            OrderStatus::DeliveryInProgress => (
                "Out for delivery",
                "The shoes are on their way back to the customer",
                "navigation",
            ),
            OrderStatus::Completed => (
                "Completed",
                "The shoes were delivered and the order is closed",
                "award",
            ),
            OrderStatus::Cancelled => (
                "Cancelled",
                "The order was cancelled",
                "x-circle",
            ),
        };

        StatusMeta {
            label,
            description,
            icon,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::OrderStatus;

    #[test]
    fn happy_path_visits_every_non_cancelled_status_once() {
        let mut current = OrderStatus::Pending;
        let mut visited = vec![current];
        while let Some(next) = current.next() {
            visited.push(next);
            current = next;
        }

        assert_eq!(current, OrderStatus::Completed);
        assert_eq!(visited.len(), OrderStatus::ALL.len() - 1);
        assert!(!visited.contains(&OrderStatus::Cancelled));
    }

    #[test]
    fn only_completed_and_cancelled_are_terminal() {
        let terminal: Vec<_> = OrderStatus::ALL
            .iter()
            .copied()
            .filter(|s| s.is_terminal())
            .collect();
        assert_eq!(terminal, vec![OrderStatus::Completed, OrderStatus::Cancelled]);
    }

    #[test]
    fn serialized_name_matches_as_str() {
        for status in OrderStatus::ALL {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, status.as_str());
        }
    }

    #[test]
    fn every_status_has_display_metadata() {
        for status in OrderStatus::ALL {
            let meta = status.meta();
            assert!(!meta.label.is_empty());
            assert!(!meta.icon.is_empty());
        }
    }
}
