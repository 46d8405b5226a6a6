use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{NewOrder, Order, OrderId, StatusUpdate},
    traits::TransitionOutcome,
};

#[derive(Debug, Clone, Error)]
pub enum OrderStoreError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("Cannot insert order, since it already exists: {0}")]
    OrderAlreadyExists(OrderId),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("The order record is corrupt. {0}")]
    CorruptRecord(String),
}

impl From<sqlx::Error> for OrderStoreError {
    fn from(e: sqlx::Error) -> Self {
        OrderStoreError::DatabaseError(e.to_string())
    }
}

/// Persistence of the order record.
///
/// Every state change goes through [`OrderManagement::transition_order`], which must be a single conditional write:
/// the update is applied only if the stored status is one of the legal sources of the requested status. This is what
/// makes duplicate and out-of-order webhooks harmless without any in-process locking.
#[allow(async_fn_in_trait)]
pub trait OrderManagement: Clone {
    /// The URL of the backing store
    fn url(&self) -> &str;

    /// Stores a brand-new order in the `Initiated` state and returns the stored record.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderStoreError>;

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError>;

    async fn fetch_order_by_payment_reference(&self, reference: &str) -> Result<Option<Order>, OrderStoreError>;

    /// Moves the order to `update.new_status` if, and only if, its current status is a valid source for that status.
    ///
    /// Returns [`TransitionOutcome::Ignored`] with the unchanged order otherwise, and
    /// [`OrderStoreError::OrderNotFound`] if there is no such order.
    async fn transition_order(
        &self,
        order_id: &OrderId,
        update: StatusUpdate,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, OrderStoreError>;

    /// Records the checkout link and payment reference issued by the payment gateway.
    async fn attach_checkout(
        &self,
        order_id: &OrderId,
        checkout_url: &str,
        payment_reference: &str,
    ) -> Result<Order, OrderStoreError>;

    /// Moves every `Initiated` order whose `expires_at` is at or before `now` to `Expired`, and returns those orders.
    /// Orders expired by a concurrent sweep are not returned twice.
    async fn expire_unpaid_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>, OrderStoreError>;

    async fn close(&mut self) -> Result<(), OrderStoreError> {
        Ok(())
    }
}
