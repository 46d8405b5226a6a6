use std::time::Duration;

use log::*;
use settlement_engine::{db_types::Order, OrderCoordinator, OrderManagement, SqliteDatabase};
use tokio::task::JoinHandle;

/// Starts the expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every `interval`, unpaid orders past their expiry time are expired, and lapsed duplicate-guard reservations and
/// liquidity cache entries are purged.
pub fn start_expiry_worker(coordinator: OrderCoordinator<SqliteDatabase>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🕰️ Unpaid order expiry worker started");
        loop {
            timer.tick().await;
            run_expiry_job(&coordinator).await;
        }
    })
}

pub async fn run_expiry_job<B: OrderManagement>(coordinator: &OrderCoordinator<B>) {
    trace!("🕰️ Running unpaid order expiry job");
    match coordinator.expire_unpaid_orders().await {
        Ok(expired) if expired.is_empty() => trace!("🕰️ No orders expired"),
        Ok(expired) => {
            info!("🕰️ {} orders expired", expired.len());
            debug!("🕰️ Expired orders: {}", order_list(&expired));
        },
        Err(e) => {
            error!("🕰️ Error running unpaid order expiry job: {e}");
        },
    }
    let (reservations, cache_entries) = coordinator.purge_stale_entries();
    if reservations + cache_entries > 0 {
        debug!("🕰️ Purged {reservations} duplicate-guard reservations and {cache_entries} liquidity cache entries");
    }
}

fn order_list(orders: &[Order]) -> String {
    orders
        .iter()
        .map(|o| format!("[{}] order_id: {} cust_id: {}", o.id, o.order_id, o.customer_id))
        .collect::<Vec<String>>()
        .join(", ")
}
