use serde::Serialize;

use crate::db_types::{Order, OrderStatusType};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderCreatedEvent {
    pub order: Order,
}

impl OrderCreatedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Emitted once per applied transition. Transitions that were ignored (duplicates, stale events) never produce one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderStatusChangedEvent {
    pub order: Order,
    pub old_status: OrderStatusType,
    pub new_status: OrderStatusType,
    pub reason: Option<String>,
}

impl OrderStatusChangedEvent {
    pub fn new(order: Order, old_status: OrderStatusType) -> Self {
        let new_status = order.status;
        let reason = order.failure_reason.clone();
        Self { order, old_status, new_status, reason }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum EventType {
    #[serde(rename = "order.created")]
    OrderCreated(OrderCreatedEvent),
    #[serde(rename = "order.status_changed")]
    OrderStatusChanged(OrderStatusChangedEvent),
}

impl EventType {
    pub fn name(&self) -> &'static str {
        match self {
            EventType::OrderCreated(_) => "order.created",
            EventType::OrderStatusChanged(e) => match e.new_status {
                OrderStatusType::Pending => "order.paid",
                OrderStatusType::Processing => "order.processing",
                OrderStatusType::Completed => "order.completed",
                OrderStatusType::Failed => "order.failed",
                OrderStatusType::Cancelled => "order.cancelled",
                OrderStatusType::Expired => "order.expired",
                OrderStatusType::Initiated => "order.status_changed",
            },
        }
    }

    pub fn order(&self) -> &Order {
        match self {
            EventType::OrderCreated(e) => &e.order,
            EventType::OrderStatusChanged(e) => &e.order,
        }
    }
}
