use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::order::{Order, PaymentStatus};
use crate::models::status::OrderStatus;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimelineKind {
    Created,
    Payment,
    Status,
    Edit,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Oldest first: customer progress views.
    #[default]
    Asc,
    /// Newest first: admin history views.
    Desc,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimelineEvent {
    pub kind: TimelineKind,
    pub timestamp: DateTime<Utc>,
    pub status: Option<OrderStatus>,
    pub label: String,
    pub description: String,
    pub note: Option<String>,
    pub actor_name: String,
    pub icon: String,
}

fn event(
    kind: TimelineKind,
    timestamp: DateTime<Utc>,
    label: &str,
    description: String,
    actor_name: &str,
    icon: &str,
) -> TimelineEvent {
    TimelineEvent {
        kind,
        timestamp,
        status: None,
        label: label.to_string(),
        description,
        note: None,
        actor_name: actor_name.to_string(),
        icon: icon.to_string(),
    }
}

/// Merges creation, payment, status and edit records into one timeline.
/// Read-only over `order`; equal timestamps keep source order, and the
/// descending view is the exact reverse of the ascending one.
pub fn build_timeline(order: &Order, direction: Direction) -> Vec<TimelineEvent> {
    let mut events = Vec::with_capacity(order.status_history.len() + order.edit_history.len() + 3);

    events.push(event(
        TimelineKind::Created,
        order.created_at,
        "Order created",
        format!("Order {} was placed", order.order_number),
        &order.customer.name,
        "file-plus",
    ));

    if let Some(uploaded_at) = order.payment.proof_uploaded_at {
        events.push(event(
            TimelineKind::Payment,
            uploaded_at,
            "Payment proof uploaded",
            format!("Transfer proof for {} submitted", order.payment.final_amount),
            &order.customer.name,
            "credit-card",
        ));
    }

    if let Some(reviewed_at) = order.payment.reviewed_at {
        let reviewer = order.payment.reviewed_by.as_deref().unwrap_or_default();
        let mut reviewed = match order.payment.status {
            PaymentStatus::Paid => event(
                TimelineKind::Payment,
                reviewed_at,
                "Payment confirmed",
                "The transfer was verified".to_string(),
                reviewer,
                "check-square",
            ),
            _ => event(
                TimelineKind::Payment,
                reviewed_at,
                "Payment rejected",
                "The transfer could not be verified".to_string(),
                reviewer,
                "alert-triangle",
            ),
        };
        reviewed.note = order.payment.review_note.clone();
        events.push(reviewed);
    }

    for entry in &order.status_history {
        let meta = entry.status.meta();
        events.push(TimelineEvent {
            kind: TimelineKind::Status,
            timestamp: entry.timestamp,
            status: Some(entry.status),
            label: meta.label.to_string(),
            description: meta.description.to_string(),
            note: entry.note.clone(),
            actor_name: entry.actor_name.clone(),
            icon: meta.icon.to_string(),
        });
    }

    for entry in &order.edit_history {
        let mut edited = event(
            TimelineKind::Edit,
            entry.timestamp,
            "Order edited",
            format!("Changed: {}", entry.changed_fields.join(", ")),
            &entry.actor_name,
            "edit",
        );
        edited.note = Some(entry.reason.clone());
        events.push(edited);
    }

    events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    if direction == Direction::Desc {
        events.reverse();
    }
    events
}
