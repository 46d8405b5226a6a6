use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use futures_util::FutureExt;
use log::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use settlement_engine::{
    db_types::{Network, OrderStatusType},
    events::{EventHandlers, EventHooks, EventType},
    traits::{ChainQuoter, PaymentGateway, ProviderRoster, RateSource, SettlementExecutor},
    Collaborators,
    CoordinatorConfig,
    LiquidityCache,
    LiquidityCacheConfig,
    OrderCoordinator,
    OrderManagement,
    ProviderMatcher,
    RateOracle,
    RateOracleConfig,
    RouteFinder,
    RouteFinderConfig,
    ScoringConfig,
    SqliteDatabase,
    TokenRegistry,
};

use super::{
    fakes::{FakeExecutor, FakeGateway, FakeRoster, FixedRate, FlatPriceChain},
    prepare_env::{drop_database, prepare_test_env, random_db_path},
};

pub const SIGNING_KEY: &str = "settlement-test-key";

/// Records every event the coordinator publishes, in order.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<EventType>>>,
}

impl EventLog {
    pub fn hooks(&self) -> EventHooks {
        let mut hooks = EventHooks::default();
        let log = self.clone();
        hooks.on_order_created(move |ev| {
            let log = log.clone();
            async move { log.events.lock().unwrap().push(EventType::OrderCreated(ev)) }.boxed()
        });
        let log = self.clone();
        hooks.on_status_changed(move |ev| {
            let log = log.clone();
            async move { log.events.lock().unwrap().push(EventType::OrderStatusChanged(ev)) }.boxed()
        });
        hooks
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.name()).collect()
    }

    /// The `(old, new)` status pair of every status change, in order.
    pub fn transitions(&self) -> Vec<(OrderStatusType, OrderStatusType)> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                EventType::OrderStatusChanged(ev) => Some((ev.old_status, ev.new_status)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.names().into_iter().filter(|n| *n == name).count()
    }

    /// Waits until at least `n` events have arrived, then a little longer so that stragglers would be seen.
    pub async fn settle(&self, n: usize) -> Vec<&'static str> {
        for _ in 0..100 {
            if self.events.lock().unwrap().len() >= n {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.names()
    }
}

pub struct TestSystem {
    pub db_path: String,
    pub coordinator: OrderCoordinator<SqliteDatabase>,
    pub rates: Arc<FixedRate>,
    pub roster: Arc<FakeRoster>,
    pub gateway: Arc<FakeGateway>,
    pub executor: Arc<FakeExecutor>,
    pub events: EventLog,
}

impl std::fmt::Debug for TestSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TestSystem ({})", self.db_path)
    }
}

impl TestSystem {
    /// A fresh database and a coordinator with a fiat rate of 1,700, every token priced at 0.50 stablecoin and one
    /// verified provider holding 1,000 stablecoin on Polygon.
    pub async fn new() -> Self {
        Self::with_config(CoordinatorConfig::default()).await
    }

    pub async fn with_config(config: CoordinatorConfig) -> Self {
        let db_path = random_db_path();
        prepare_test_env(&db_path).await;
        let db = SqliteDatabase::new_with_url(&db_path, 5).await.expect("Error creating connection to database");
        debug!("🚀️ Created database: {db_path}");

        let rates = Arc::new(FixedRate::new(dec!(1700)));
        let roster = Arc::new(FakeRoster::with_balance(Network::Polygon, dec!(1000)));
        let gateway = Arc::new(FakeGateway::default());
        let executor = Arc::new(FakeExecutor::default());
        let chain: Arc<dyn ChainQuoter> = Arc::new(FlatPriceChain { price: dec!(0.5) });

        let primary: Arc<dyn RateSource> = rates.clone();
        let dyn_roster: Arc<dyn ProviderRoster> = roster.clone();
        let dyn_gateway: Arc<dyn PaymentGateway> = gateway.clone();
        let dyn_executor: Arc<dyn SettlementExecutor> = executor.clone();
        let collaborators = Collaborators {
            registry: TokenRegistry::builtin(),
            rates: RateOracle::new(Some(primary), None, RateOracleConfig::default().with_static_rate(Some(dec!(1650)))),
            routes: RouteFinder::new(Some(chain), None, RouteFinderConfig::default()),
            liquidity: LiquidityCache::new(
                ProviderMatcher::new(Some(dyn_roster), ScoringConfig::default()),
                LiquidityCacheConfig::default(),
            ),
            payments: dyn_gateway,
            executor: dyn_executor,
        };

        let events = EventLog::default();
        let handlers = EventHandlers::new(64, events.hooks());
        let producers = handlers.producers();
        handlers.start_handlers().await;

        let config = config.with_signing_key(SIGNING_KEY);
        let coordinator = OrderCoordinator::new(db, collaborators, producers, config);
        Self { db_path, coordinator, rates, roster, gateway, executor, events }
    }

    pub async fn tear_down(self) {
        let mut db = self.coordinator.db().clone();
        if let Err(e) = db.close().await {
            error!("🚀️ Failed to close database: {e}");
        }
        drop_database(&self.db_path).await;
    }
}

pub fn fiat(amount: i64) -> Decimal {
    Decimal::from(amount)
}
