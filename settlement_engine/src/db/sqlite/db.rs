use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;

use super::{db_url, new_pool, orders, SqliteDatabaseError};
use crate::{
    db_types::{NewOrder, Order, OrderId, StatusUpdate},
    traits::{OrderManagement, OrderStoreError, TransitionOutcome},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SqliteDatabase ({})", self.url)
    }
}

impl SqliteDatabase {
    /// Connects to the database at `SRE_DATABASE_URL`, or the default location.
    pub async fn new(max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        Self::new_with_url(&db_url(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date. Safe to call on every start-up.
    pub async fn migrate(&self) -> Result<(), SqliteDatabaseError> {
        sqlx::migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations are up to date");
        Ok(())
    }
}

impl OrderManagement for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::insert_order(order, &mut conn).await?;
        debug!("🗃️ Order {} has been saved in the DB with id {}", order.order_id, order.id);
        Ok(order)
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_order_id(order_id, &mut conn).await
    }

    async fn fetch_order_by_payment_reference(&self, reference: &str) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_payment_reference(reference, &mut conn).await
    }

    async fn transition_order(
        &self,
        order_id: &OrderId,
        update: StatusUpdate,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let new_status = update.new_status;
        match orders::conditional_status_update(order_id, update, now, &mut conn).await? {
            Some(order) => {
                debug!("🗃️ Order {order_id} moved to {new_status}");
                Ok(TransitionOutcome::Applied(order))
            },
            None => {
                let current = orders::fetch_order_by_order_id(order_id, &mut conn)
                    .await?
                    .ok_or_else(|| OrderStoreError::OrderNotFound(order_id.clone()))?;
                debug!("🗃️ Order {order_id} is {}. The move to {new_status} was not applied.", current.status);
                Ok(TransitionOutcome::Ignored(current))
            },
        }
    }

    async fn attach_checkout(
        &self,
        order_id: &OrderId,
        checkout_url: &str,
        payment_reference: &str,
    ) -> Result<Order, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::attach_checkout(order_id, checkout_url, payment_reference, &mut conn)
            .await?
            .ok_or_else(|| OrderStoreError::OrderNotFound(order_id.clone()))
    }

    async fn expire_unpaid_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let expired = orders::expire_unpaid_orders(now, &mut conn).await?;
        if !expired.is_empty() {
            debug!("🗃️ {} unpaid orders have been marked as expired", expired.len());
        }
        Ok(expired)
    }

    async fn close(&mut self) -> Result<(), OrderStoreError> {
        self.pool.close().await;
        Ok(())
    }
}
