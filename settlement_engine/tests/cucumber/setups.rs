use cucumber::given;
use settlement_engine::CoordinatorConfig;

use crate::{cucumber::SettlementWorld, support::system::TestSystem};

#[given("a fresh install")]
async fn fresh_install(world: &mut SettlementWorld) {
    world.system = Some(TestSystem::new().await);
}

#[given(expr = "a fresh install that requires {int} settlement confirmations")]
async fn fresh_install_with_confirmations(world: &mut SettlementWorld, confirmations: u32) {
    let config = CoordinatorConfig::default().with_required_confirmations(confirmations);
    world.system = Some(TestSystem::with_config(config).await);
}
