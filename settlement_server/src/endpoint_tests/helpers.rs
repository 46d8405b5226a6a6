use std::sync::Arc;

use actix_web::{
    body::MessageBody,
    http::{header::HeaderMap, StatusCode},
    test,
    test::TestRequest,
    web::ServiceConfig,
    App,
};
use chrono::{Duration, Utc};
use log::debug;
use rust_decimal_macros::dec;
use settlement_engine::{
    db_types::{CustomerIdentity, Network, NewOrder, Order, OrderId, OrderStatusType},
    events::EventProducers,
    liquidity_cache::LiquiditySource,
    quote_objects::{NetworkQuote, QuoteSnapshot, RateTier},
    traits::{PaymentGateway, ProviderRoster, SettlementExecutor},
    Collaborators,
    CoordinatorConfig,
    LiquidityCache,
    LiquidityCacheConfig,
    OrderCoordinator,
    ProviderMatcher,
    RateOracle,
    RateOracleConfig,
    RouteFinder,
    RouteFinderConfig,
    ScoringConfig,
    TokenRegistry,
};

use super::mocks::{MockExecutor, MockGateway, MockOrderManager};

/// HMAC key shared with the settlement executor in these tests. DO NOT re-use it anywhere.
pub const SIGNING_KEY: &str = "endpoint-test-signing-key";
/// HMAC key shared with the payment gateway in these tests. DO NOT re-use it anywhere.
pub const GATEWAY_SECRET: &str = "endpoint-test-gateway-secret";

pub fn coordinator_config() -> CoordinatorConfig {
    CoordinatorConfig::default().with_signing_key(SIGNING_KEY)
}

/// A coordinator that quotes at a static 1600 fiat per stablecoin, without any live rate or route collaborators.
pub fn coordinator(
    db: MockOrderManager,
    gateway: MockGateway,
    executor: MockExecutor,
    roster: Option<Arc<dyn ProviderRoster>>,
) -> OrderCoordinator<MockOrderManager> {
    let matcher = ProviderMatcher::new(roster, ScoringConfig::default());
    let collaborators = Collaborators {
        registry: TokenRegistry::builtin(),
        rates: RateOracle::offline(RateOracleConfig::default().with_static_rate(Some(dec!(1600)))),
        routes: RouteFinder::new(None, None, RouteFinderConfig::default()),
        liquidity: LiquidityCache::new(matcher, LiquidityCacheConfig::default()),
        payments: Arc::new(gateway) as Arc<dyn PaymentGateway>,
        executor: Arc::new(executor) as Arc<dyn SettlementExecutor>,
    };
    OrderCoordinator::new(db, collaborators, EventProducers::default(), coordinator_config())
}

/// An order for 16,000 fiat of USDC on Base, as the store would return it.
pub fn sample_order(order_id: &str, status: OrderStatusType) -> Order {
    let now = Utc::now();
    Order {
        id: 1,
        order_id: OrderId::from(order_id.to_string()),
        business_id: "biz-1".to_string(),
        customer_id: CustomerIdentity::new("alice@example.com"),
        recipient_address: "0x1111111111111111111111111111111111111111".to_string(),
        fiat_amount: dec!(16000),
        fee_pct: dec!(0.01),
        fee_amount: dec!(160),
        net_amount: dec!(15840),
        target_token: "USDC".to_string(),
        target_network: Network::Base,
        token_contract_address: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".to_string(),
        exchange_rate: dec!(1600),
        estimated_token_amount: dec!(9.9),
        actual_token_amount: None,
        status,
        failure_reason: None,
        checkout_url: Some(format!("https://checkout.test/{order_id}")),
        payment_reference: Some(format!("ps_{order_id}")),
        settlement_reference: None,
        settlement_provider: None,
        created_at: now,
        updated_at: now,
        expires_at: now + Duration::minutes(30),
        completed_at: None,
        metadata: QuoteSnapshot {
            rate: dec!(1600),
            rate_tier: RateTier::Static,
            settlement_stable_amount: dec!(9.9),
            price_per_unit: dec!(1),
            route_id: "identity".to_string(),
            pool_liquidity_adequate: true,
            provider: None,
            liquidity_ratio: None,
            liquidity_source: LiquiditySource::Degraded,
            detail: NetworkQuote::Identity,
            quote_issued_at: now,
            quote_expires_at: now + Duration::minutes(5),
        },
    }
}

/// What the store returns after inserting `order`.
pub fn stored_order(order: NewOrder) -> Order {
    let mut stored = sample_order(order.order_id.as_str(), OrderStatusType::Initiated);
    stored.business_id = order.business_id;
    stored.customer_id = order.customer_id;
    stored.recipient_address = order.recipient_address;
    stored.fiat_amount = order.fees.fiat_amount;
    stored.fee_pct = order.fees.fee_pct;
    stored.fee_amount = order.fees.fee_amount;
    stored.net_amount = order.fees.net_amount;
    stored.target_token = order.target_token;
    stored.target_network = order.target_network;
    stored.estimated_token_amount = order.estimated_token_amount;
    stored.checkout_url = None;
    stored.payment_reference = None;
    stored.metadata = order.metadata;
    stored
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("Response body is not JSON")
    }
}

/// Sends `req` to an app configured with `configure`. Errors raised by middleware, before any route is reached, are
/// returned as `Err`.
pub async fn send_request<F>(req: TestRequest, configure: F) -> Result<TestResponse, String>
where F: FnOnce(&mut ServiceConfig) {
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let (_, res) = test::try_call_service(&service, req.to_request()).await.map_err(|e| e.to_string())?.into_parts();
    let status = res.status();
    let headers = res.headers().clone();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    Ok(TestResponse { status, headers, body })
}

pub async fn get_request<F>(path: &str, configure: F) -> Result<TestResponse, String>
where F: FnOnce(&mut ServiceConfig) {
    send_request(TestRequest::get().uri(path), configure).await
}

pub async fn post_json<F>(path: &str, body: &str, configure: F) -> Result<TestResponse, String>
where F: FnOnce(&mut ServiceConfig) {
    let req = TestRequest::post()
        .uri(path)
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body.to_string());
    send_request(req, configure).await
}
