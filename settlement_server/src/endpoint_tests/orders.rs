use std::{collections::HashMap, str::FromStr, sync::Arc};

use actix_web::{
    http::{header::RETRY_AFTER, StatusCode},
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use mockall::Sequence;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use settlement_engine::{
    db_types::OrderStatusType,
    traits::{CheckoutSession, PaymentGatewayError, Provider, ProviderRoster, TransitionOutcome},
    OrderCoordinator,
};

use super::{
    helpers::{coordinator, get_request, post_json, sample_order, stored_order},
    mocks::{MockExecutor, MockGateway, MockOrderManager, MockRoster},
};
use crate::{
    routes::{CancelOrderRoute, CreateOrderRoute, OrderByIdRoute, QuoteRoute},
    server::json_config,
};

const ORDER_REQUEST: &str = r#"{
    "business_id": "biz-1",
    "customer": "Alice@Example.com",
    "recipient_address": "0x1111111111111111111111111111111111111111",
    "fiat_amount": "16000",
    "token": "USDC",
    "network": "base"
}"#;

fn configure(coordinator: OrderCoordinator<MockOrderManager>) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.service(QuoteRoute::<MockOrderManager>::new())
            .service(CreateOrderRoute::<MockOrderManager>::new())
            .service(OrderByIdRoute::<MockOrderManager>::new())
            .service(CancelOrderRoute::<MockOrderManager>::new())
            .app_data(web::Data::new(coordinator))
            .app_data(json_config());
    }
}

fn decimal(value: &serde_json::Value) -> Decimal {
    Decimal::from_str(value.as_str().expect("Expected a decimal string")).expect("Invalid decimal")
}

/// A gateway that issues a checkout for every order
fn working_gateway() -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway.expect_create_checkout().returning(|req| {
        Ok(CheckoutSession {
            checkout_url: format!("https://checkout.test/{}", req.reference),
            payment_reference: format!("ps_{}", req.reference),
        })
    });
    gateway
}

/// A store that accepts new orders and records their checkout links
fn accepting_store() -> MockOrderManager {
    let mut db = MockOrderManager::new();
    db.expect_insert_order().returning(|order| Ok(stored_order(order)));
    db.expect_attach_checkout().returning(|order_id, url, reference| {
        let mut order = sample_order(order_id.as_str(), OrderStatusType::Initiated);
        order.checkout_url = Some(url.to_string());
        order.payment_reference = Some(reference.to_string());
        Ok(order)
    });
    db
}

fn roster_with_balance(balance: Decimal) -> Arc<dyn ProviderRoster> {
    let mut roster = MockRoster::new();
    roster.expect_fetch_providers().returning(move |network| {
        let mut balances = HashMap::new();
        balances.insert(network, balance);
        Ok(vec![Provider { id: "lp-1".into(), name: "LP One".into(), balances, verified: true, active: true }])
    });
    Arc::new(roster)
}

//----------------------------------------------   Quotes  ----------------------------------------------------

#[actix_web::test]
async fn quote_usdc_on_base() {
    let _ = env_logger::try_init().ok();
    let api = coordinator(MockOrderManager::new(), MockGateway::new(), MockExecutor::new(), None);
    let body = r#"{"fiat_amount": "16000", "token": "usdc", "network": "base"}"#;
    let res = post_json("/quote", body, configure(api)).await.expect("Request failed");
    assert_eq!(res.status, StatusCode::OK);
    let quote = res.json();
    assert_eq!(quote["token"], "USDC");
    assert_eq!(quote["network"], "base");
    assert_eq!(decimal(&quote["fees"]["fee_amount"]), dec!(160));
    assert_eq!(decimal(&quote["fees"]["net_amount"]), dec!(15840));
    assert_eq!(decimal(&quote["settlement_stable_amount"]), dec!(9.9));
    assert_eq!(decimal(&quote["token_amount"]), dec!(9.9));
}

#[actix_web::test]
async fn quote_unsupported_token() {
    let _ = env_logger::try_init().ok();
    let api = coordinator(MockOrderManager::new(), MockGateway::new(), MockExecutor::new(), None);
    let body = r#"{"fiat_amount": "16000", "token": "WPOL", "network": "solana"}"#;
    let res = post_json("/quote", body, configure(api)).await.expect("Request failed");
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(res.json()["code"], "TOKEN_NOT_SUPPORTED");
}

#[actix_web::test]
async fn quote_below_minimum_settlement_value() {
    let _ = env_logger::try_init().ok();
    let api = coordinator(MockOrderManager::new(), MockGateway::new(), MockExecutor::new(), None);
    let body = r#"{"fiat_amount": "100", "token": "USDC", "network": "base"}"#;
    let res = post_json("/quote", body, configure(api)).await.expect("Request failed");
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    let body = res.json();
    assert_eq!(body["code"], "BELOW_MINIMUM");
    assert_eq!(body["retryable"], false);
}

#[actix_web::test]
async fn quote_zero_amount() {
    let _ = env_logger::try_init().ok();
    let api = coordinator(MockOrderManager::new(), MockGateway::new(), MockExecutor::new(), None);
    let body = r#"{"fiat_amount": "0", "token": "USDC", "network": "base"}"#;
    let res = post_json("/quote", body, configure(api)).await.expect("Request failed");
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let body = res.json();
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(decimal(&body["context"]["min"]), dec!(1));
}

//----------------------------------------------   Orders  ----------------------------------------------------

#[actix_web::test]
async fn create_order_issues_checkout() {
    let _ = env_logger::try_init().ok();
    let api = coordinator(accepting_store(), working_gateway(), MockExecutor::new(), None);
    let res = post_json("/orders", ORDER_REQUEST, configure(api)).await.expect("Request failed");
    assert_eq!(res.status, StatusCode::CREATED);
    let order = res.json();
    let order_id = order["order_id"].as_str().expect("order_id is missing");
    assert_eq!(order["status"], "INITIATED");
    assert_eq!(order["checkout_url"], format!("https://checkout.test/{order_id}"));
    assert_eq!(order["payment_reference"], format!("ps_{order_id}"));
    assert_eq!(order["customer_id"], "alice@example.com");
}

#[actix_web::test]
async fn create_order_without_customer() {
    let _ = env_logger::try_init().ok();
    let api = coordinator(MockOrderManager::new(), MockGateway::new(), MockExecutor::new(), None);
    let body = ORDER_REQUEST.replace("Alice@Example.com", " ");
    let res = post_json("/orders", &body, configure(api)).await.expect("Request failed");
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["code"], "VALIDATION_ERROR");
}

#[actix_web::test]
async fn create_order_on_unknown_network() {
    let _ = env_logger::try_init().ok();
    let api = coordinator(MockOrderManager::new(), MockGateway::new(), MockExecutor::new(), None);
    let body = ORDER_REQUEST.replace(r#""base""#, r#""mars""#);
    let res = post_json("/orders", &body, configure(api)).await.expect("Request failed");
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let body = res.json();
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["error"].as_str().unwrap().starts_with("Could not read request body"));
}

#[actix_web::test]
async fn quote_with_malformed_json() {
    let _ = env_logger::try_init().ok();
    let api = coordinator(MockOrderManager::new(), MockGateway::new(), MockExecutor::new(), None);
    let res = post_json("/quote", r#"{"fiat_amount": "16000", "token": "#, configure(api)).await.expect("Request failed");
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["code"], "VALIDATION_ERROR");
}

#[actix_web::test]
async fn create_order_without_liquidity() {
    let _ = env_logger::try_init().ok();
    // No store expectations: nothing may be persisted
    let roster = roster_with_balance(dec!(2));
    let api = coordinator(MockOrderManager::new(), MockGateway::new(), MockExecutor::new(), Some(roster));
    let res = post_json("/orders", ORDER_REQUEST, configure(api)).await.expect("Request failed");
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.headers.get(RETRY_AFTER).expect("Retry-After is missing"), "30");
    let body = res.json();
    assert_eq!(body["code"], "INSUFFICIENT_LIQUIDITY");
    assert_eq!(body["retryable"], true);
    assert_eq!(decimal(&body["context"]["max_available"]), dec!(2));
}

#[actix_web::test]
async fn duplicate_order_requests_are_rejected() {
    let _ = env_logger::try_init().ok();
    let api = coordinator(accepting_store(), working_gateway(), MockExecutor::new(), None);
    let app = App::new().configure(configure(api));
    let service = test::init_service(app).await;
    let request = || {
        TestRequest::post()
            .uri("/orders")
            .insert_header(("Content-Type", "application/json"))
            .set_payload(ORDER_REQUEST)
            .to_request()
    };
    let res = test::call_service(&service, request()).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let first: serde_json::Value = test::read_body_json(res).await;

    let res = test::call_service(&service, request()).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let second: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(second["code"], "DUPLICATE_REQUEST");
    assert_eq!(second["context"]["existing_order_id"], first["order_id"]);
}

#[actix_web::test]
async fn create_order_when_gateway_is_down() {
    let _ = env_logger::try_init().ok();
    let mut db = accepting_store();
    db.expect_transition_order().times(1).returning(|order_id, update, _| {
        assert_eq!(update.new_status, OrderStatusType::Failed);
        Ok(TransitionOutcome::Applied(sample_order(order_id.as_str(), OrderStatusType::Failed)))
    });
    let mut gateway = MockGateway::new();
    gateway.expect_create_checkout().returning(|_| Err(PaymentGatewayError::Unavailable("503".into())));
    let api = coordinator(db, gateway, MockExecutor::new(), None);
    let res = post_json("/orders", ORDER_REQUEST, configure(api)).await.expect("Request failed");
    assert_eq!(res.status, StatusCode::BAD_GATEWAY);
    let body = res.json();
    assert_eq!(body["code"], "PAYMENT_GATEWAY_UNAVAILABLE");
    assert_eq!(body["retryable"], true);
}

#[actix_web::test]
async fn fetch_order() {
    let _ = env_logger::try_init().ok();
    let mut db = MockOrderManager::new();
    db.expect_fetch_order_by_order_id()
        .returning(|order_id| Ok(Some(sample_order(order_id.as_str(), OrderStatusType::Processing))));
    let api = coordinator(db, MockGateway::new(), MockExecutor::new(), None);
    let res = get_request("/orders/SO-0001", configure(api)).await.expect("Request failed");
    assert_eq!(res.status, StatusCode::OK);
    let order = res.json();
    assert_eq!(order["order_id"], "SO-0001");
    assert_eq!(order["status"], "PROCESSING");
    assert_eq!(order["target_network"], "base");
}

#[actix_web::test]
async fn fetch_unknown_order() {
    let _ = env_logger::try_init().ok();
    let mut db = MockOrderManager::new();
    db.expect_fetch_order_by_order_id().returning(|_| Ok(None));
    let api = coordinator(db, MockGateway::new(), MockExecutor::new(), None);
    let res = get_request("/orders/SO-404", configure(api)).await.expect("Request failed");
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.json()["code"], "ORDER_NOT_FOUND");
}

#[actix_web::test]
async fn cancel_unpaid_order() {
    let _ = env_logger::try_init().ok();
    let mut db = MockOrderManager::new();
    db.expect_fetch_order_by_order_id()
        .returning(|order_id| Ok(Some(sample_order(order_id.as_str(), OrderStatusType::Initiated))));
    db.expect_transition_order().times(1).returning(|order_id, update, _| {
        assert_eq!(update.reason.as_deref(), Some("customer changed their mind"));
        let mut order = sample_order(order_id.as_str(), update.new_status);
        order.failure_reason = update.reason;
        Ok(TransitionOutcome::Applied(order))
    });
    let api = coordinator(db, MockGateway::new(), MockExecutor::new(), None);
    let body = r#"{"reason": "customer changed their mind"}"#;
    let res = post_json("/orders/SO-0002/cancel", body, configure(api)).await.expect("Request failed");
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["status"], "CANCELLED");
}

#[actix_web::test]
async fn cancel_order_in_settlement() {
    let _ = env_logger::try_init().ok();
    let mut db = MockOrderManager::new();
    db.expect_fetch_order_by_order_id()
        .returning(|order_id| Ok(Some(sample_order(order_id.as_str(), OrderStatusType::Processing))));
    db.expect_transition_order().returning(|order_id, _, _| {
        Ok(TransitionOutcome::Ignored(sample_order(order_id.as_str(), OrderStatusType::Processing)))
    });
    let api = coordinator(db, MockGateway::new(), MockExecutor::new(), None);
    let res = post_json("/orders/SO-0003/cancel", "{}", configure(api)).await.expect("Request failed");
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(res.json()["code"], "VALIDATION_ERROR");
}


#[actix_web::test]
async fn cancel_order_that_was_paid_concurrently() {
    let _ = env_logger::try_init().ok();
    let mut db = MockOrderManager::new();
    db.expect_fetch_order_by_order_id()
        .returning(|order_id| Ok(Some(sample_order(order_id.as_str(), OrderStatusType::Initiated))));
    let mut seq = Sequence::new();
    // The first write is pinned to the status the coordinator saw, which is stale by the time it lands
    db.expect_transition_order().times(1).in_sequence(&mut seq).returning(|order_id, update, _| {
        assert_eq!(update.sources(), vec![OrderStatusType::Initiated]);
        Ok(TransitionOutcome::Ignored(sample_order(order_id.as_str(), OrderStatusType::Pending)))
    });
    db.expect_transition_order().times(1).in_sequence(&mut seq).returning(|order_id, update, _| {
        assert_eq!(update.sources(), vec![OrderStatusType::Pending]);
        Ok(TransitionOutcome::Applied(sample_order(order_id.as_str(), update.new_status)))
    });
    let api = coordinator(db, MockGateway::new(), MockExecutor::new(), None);
    let res = post_json("/orders/SO-0004/cancel", "{}", configure(api)).await.expect("Request failed");
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["status"], "CANCELLED");
}
