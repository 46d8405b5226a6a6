use std::str::FromStr;

use chrono::{DateTime, Utc};
use log::trace;
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, FromRow, QueryBuilder, Row, Sqlite, SqliteConnection};

use crate::{
    db_types::{CustomerIdentity, NewOrder, Order, OrderId, OrderStatusType, StatusUpdate},
    quote_objects::QuoteSnapshot,
    traits::OrderStoreError,
};

const ORDER_COLUMNS: &str = "id, order_id, business_id, customer_id, recipient_address, fiat_amount, fee_pct, \
                             fee_amount, net_amount, target_token, target_network, token_contract_address, \
                             exchange_rate, estimated_token_amount, actual_token_amount, status, failure_reason, \
                             checkout_url, payment_reference, settlement_reference, settlement_provider, created_at, \
                             updated_at, expires_at, completed_at, metadata";

fn decode_err<E>(column: &str, e: E) -> sqlx::Error
where E: std::error::Error + Send + Sync + 'static {
    sqlx::Error::ColumnDecode { index: column.to_string(), source: Box::new(e) }
}

fn decimal_column(row: &SqliteRow, column: &str) -> Result<Decimal, sqlx::Error> {
    let value: String = row.try_get(column)?;
    Decimal::from_str(&value).map_err(|e| decode_err(column, e))
}

fn optional_decimal_column(row: &SqliteRow, column: &str) -> Result<Option<Decimal>, sqlx::Error> {
    let value: Option<String> = row.try_get(column)?;
    value.map(|v| Decimal::from_str(&v).map_err(|e| decode_err(column, e))).transpose()
}

impl<'r> FromRow<'r, SqliteRow> for Order {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let network: String = row.try_get("target_network")?;
        let target_network = network.parse().map_err(|e| decode_err("target_network", e))?;
        let status: String = row.try_get("status")?;
        let metadata: String = row.try_get("metadata")?;
        let metadata =
            serde_json::from_str::<QuoteSnapshot>(&metadata).map_err(|e| decode_err("metadata", e))?;
        let order_id: String = row.try_get("order_id")?;
        let customer_id: String = row.try_get("customer_id")?;
        Ok(Order {
            id: row.try_get("id")?,
            order_id: OrderId(order_id),
            business_id: row.try_get("business_id")?,
            customer_id: CustomerIdentity::new(customer_id),
            recipient_address: row.try_get("recipient_address")?,
            fiat_amount: decimal_column(row, "fiat_amount")?,
            fee_pct: decimal_column(row, "fee_pct")?,
            fee_amount: decimal_column(row, "fee_amount")?,
            net_amount: decimal_column(row, "net_amount")?,
            target_token: row.try_get("target_token")?,
            target_network,
            token_contract_address: row.try_get("token_contract_address")?,
            exchange_rate: decimal_column(row, "exchange_rate")?,
            estimated_token_amount: decimal_column(row, "estimated_token_amount")?,
            actual_token_amount: optional_decimal_column(row, "actual_token_amount")?,
            status: OrderStatusType::from(status),
            failure_reason: row.try_get("failure_reason")?,
            checkout_url: row.try_get("checkout_url")?,
            payment_reference: row.try_get("payment_reference")?,
            settlement_reference: row.try_get("settlement_reference")?,
            settlement_provider: row.try_get("settlement_provider")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            expires_at: row.try_get("expires_at")?,
            completed_at: row.try_get("completed_at")?,
            metadata,
        })
    }
}

/// Inserts a new order in the `Initiated` state. You can embed this call inside a transaction by passing `&mut *tx`
/// as the connection argument.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, OrderStoreError> {
    let metadata =
        serde_json::to_string(&order.metadata).map_err(|e| OrderStoreError::CorruptRecord(e.to_string()))?;
    let sql = format!(
        r#"
        INSERT INTO orders (
            order_id, business_id, customer_id, recipient_address, fiat_amount, fee_pct, fee_amount, net_amount,
            target_token, target_network, token_contract_address, exchange_rate, estimated_token_amount, status,
            created_at, updated_at, expires_at, metadata
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        RETURNING {ORDER_COLUMNS};
        "#
    );
    let result = sqlx::query_as::<_, Order>(&sql)
        .bind(order.order_id.as_str())
        .bind(&order.business_id)
        .bind(order.customer_id.as_str())
        .bind(&order.recipient_address)
        .bind(order.fees.fiat_amount.to_string())
        .bind(order.fees.fee_pct.to_string())
        .bind(order.fees.fee_amount.to_string())
        .bind(order.fees.net_amount.to_string())
        .bind(&order.target_token)
        .bind(order.target_network.as_str())
        .bind(&order.token_contract_address)
        .bind(order.exchange_rate.to_string())
        .bind(order.estimated_token_amount.to_string())
        .bind(OrderStatusType::Initiated.as_str())
        .bind(order.created_at)
        .bind(order.created_at)
        .bind(order.expires_at)
        .bind(metadata)
        .fetch_one(conn)
        .await;
    match result {
        Ok(order) => Ok(order),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(OrderStoreError::OrderAlreadyExists(order.order_id))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, OrderStoreError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1 LIMIT 1");
    let order = sqlx::query_as::<_, Order>(&sql).bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_payment_reference(
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, OrderStoreError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE payment_reference = $1 LIMIT 1");
    let order = sqlx::query_as::<_, Order>(&sql).bind(reference).fetch_optional(conn).await?;
    Ok(order)
}

/// Applies `update` only if the order's current status is a legal source for the new status. The check and the write
/// are one statement, so concurrent callers can never both succeed.
///
/// Returns `None` if nothing was updated, either because the order does not exist or because it is in the wrong
/// state.
pub(crate) async fn conditional_status_update(
    order_id: &OrderId,
    update: StatusUpdate,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, OrderStoreError> {
    let sources = update.sources();
    if sources.is_empty() {
        return Ok(None);
    }
    let completed_at = (update.new_status == OrderStatusType::Completed).then_some(now);
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE orders SET status = ");
    builder.push_bind(update.new_status.as_str());
    builder.push(", updated_at = ").push_bind(now);
    builder.push(", failure_reason = COALESCE(").push_bind(update.reason).push(", failure_reason)");
    builder.push(", payment_reference = COALESCE(").push_bind(update.payment_reference).push(", payment_reference)");
    builder
        .push(", settlement_reference = COALESCE(")
        .push_bind(update.settlement_reference)
        .push(", settlement_reference)");
    builder.push(", settlement_provider = COALESCE(").push_bind(update.provider).push(", settlement_provider)");
    builder
        .push(", actual_token_amount = COALESCE(")
        .push_bind(update.actual_token_amount.map(|a| a.to_string()))
        .push(", actual_token_amount)");
    builder.push(", completed_at = COALESCE(").push_bind(completed_at).push(", completed_at)");
    builder.push(" WHERE order_id = ").push_bind(order_id.as_str().to_string());
    builder.push(" AND status IN (");
    let mut statuses = builder.separated(", ");
    for status in sources {
        statuses.push_bind(status.as_str());
    }
    statuses.push_unseparated(")");
    builder.push(format!(" RETURNING {ORDER_COLUMNS}"));
    trace!("🗃️ Executing query: {}", builder.sql());
    let order = builder.build_query_as::<Order>().fetch_optional(conn).await?;
    Ok(order)
}

pub(crate) async fn attach_checkout(
    order_id: &OrderId,
    checkout_url: &str,
    payment_reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, OrderStoreError> {
    let sql = format!(
        "UPDATE orders SET checkout_url = $1, payment_reference = $2, updated_at = $3 WHERE order_id = $4 RETURNING \
         {ORDER_COLUMNS}"
    );
    let order = sqlx::query_as::<_, Order>(&sql)
        .bind(checkout_url)
        .bind(payment_reference)
        .bind(Utc::now())
        .bind(order_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

/// Marks every unpaid order whose expiry has passed as `Expired`. A single statement performs both the selection and
/// the update, so overlapping sweeps partition the expired orders between them.
pub(crate) async fn expire_unpaid_orders(
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, OrderStoreError> {
    let sql = format!(
        r#"
        UPDATE orders SET
            status = 'EXPIRED',
            updated_at = $1,
            failure_reason = COALESCE(failure_reason, 'expired')
        WHERE status = 'INITIATED' AND julianday(expires_at) <= julianday($1)
        RETURNING {ORDER_COLUMNS};
        "#
    );
    let orders = sqlx::query_as::<_, Order>(&sql).bind(now).fetch_all(conn).await?;
    Ok(orders)
}
