use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};

use crate::db_types::OrderId;

/// Generates a new, unique order id of the form `SO-{yyyymmddHHMMSS}-{8 random alphanumerics}`.
pub fn new_order_id() -> OrderId {
    let suffix: String =
        rand::thread_rng().sample_iter(&Alphanumeric).take(8).map(char::from).collect::<String>().to_uppercase();
    OrderId(format!("SO-{}-{suffix}", Utc::now().format("%Y%m%d%H%M%S")))
}
