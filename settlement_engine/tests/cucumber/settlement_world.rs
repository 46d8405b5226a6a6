use cucumber::World;
use settlement_engine::{db_types::Order, OrderFlowError};

use crate::support::system::TestSystem;

#[derive(Default, Debug, World)]
pub struct SettlementWorld {
    pub system: Option<TestSystem>,
    pub last_order: Option<Order>,
    pub last_error: Option<OrderFlowError>,
}

impl SettlementWorld {
    pub fn system(&self) -> &TestSystem {
        self.system.as_ref().expect("System not initialised")
    }

    pub fn last_order(&self) -> &Order {
        self.last_order.as_ref().expect("No order has been created")
    }
}
