//! # Business webhooks
//!
//! The [`WebhookNotifier`] turns order events into signed notifications for the business that owns the order. It is
//! wired in as an event hook, so notifications are produced off the request path and only for applied transitions.
//!
//! The body sent to the business is
//!
//! ```json
//! { "event": "order.completed", "timestamp": "2024-06-01T12:00:00Z", "data": { ...order... } }
//! ```
//!
//! signed with the engine's signing key (see [`crate::helpers::SIGNATURE_HEADER`]). Delivery failures are logged and
//! otherwise ignored; they never affect the order.
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use log::*;
use serde::Serialize;
use settlement_common::Secret;

use crate::{
    db_types::Order,
    events::{EventHooks, EventType},
    helpers::SignedPayload,
    traits::{WebhookError, WebhookSink},
};

#[derive(Debug, Clone, Serialize)]
pub struct WebhookNotification<'a> {
    pub event: &'static str,
    pub timestamp: DateTime<Utc>,
    pub data: &'a Order,
}

#[derive(Clone)]
pub struct WebhookNotifier {
    sink: Arc<dyn WebhookSink>,
    signing_key: Secret<String>,
}

impl WebhookNotifier {
    pub fn new(sink: Arc<dyn WebhookSink>, signing_key: Secret<String>) -> Self {
        Self { sink, signing_key }
    }

    /// Signs and delivers a notification for `event` to the business that owns the order.
    pub async fn notify(&self, event: EventType) -> Result<(), WebhookError> {
        let order = event.order();
        let notification = WebhookNotification { event: event.name(), timestamp: Utc::now(), data: order };
        let payload = SignedPayload::create(&notification, self.signing_key.reveal())
            .map_err(|e| WebhookError::Serialization(e.to_string()))?;
        self.sink.deliver(&order.business_id, payload).await?;
        debug!("🪝️ Delivered {} for order {} to {}", event.name(), order.order_id, order.business_id);
        Ok(())
    }

    async fn notify_and_log(&self, event: EventType) {
        let name = event.name();
        let order_id = event.order().order_id.clone();
        if let Err(e) = self.notify(event).await {
            warn!("🪝️ Could not deliver {name} for order {order_id}: {e}");
        }
    }

    /// Registers this notifier on `hooks` for order creation and every status change.
    pub fn register(&self, hooks: &mut EventHooks) {
        let notifier = self.clone();
        hooks.on_order_created(move |ev| {
            let notifier = notifier.clone();
            async move { notifier.notify_and_log(EventType::OrderCreated(ev)).await }.boxed()
        });
        let notifier = self.clone();
        hooks.on_status_changed(move |ev| {
            let notifier = notifier.clone();
            async move { notifier.notify_and_log(EventType::OrderStatusChanged(ev)).await }.boxed()
        });
    }
}
