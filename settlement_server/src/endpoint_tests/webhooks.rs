use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use settlement_common::Secret;
use settlement_engine::{
    db_types::OrderStatusType,
    helpers::{sign_payload, verify_signature, SIGNATURE_HEADER},
    traits::{SettlementReceipt, TransitionOutcome},
    OrderCoordinator,
};

use super::{
    helpers::{coordinator, sample_order, send_request, GATEWAY_SECRET, SIGNING_KEY},
    mocks::{MockExecutor, MockGateway, MockOrderManager},
};
use crate::{
    middleware::HmacMiddlewareFactory,
    routes::{PaymentWebhookRoute, SettlementWebhookRoute},
    server::{json_config, PAYMENT_SIGNATURE_HEADER},
};

fn configure(coordinator: OrderCoordinator<MockOrderManager>) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.service(
            web::scope("/webhook")
                .service(
                    web::scope("/payment")
                        .wrap(HmacMiddlewareFactory::new(
                            PAYMENT_SIGNATURE_HEADER,
                            Secret::new(GATEWAY_SECRET.to_string()),
                            true,
                        ))
                        .service(PaymentWebhookRoute::<MockOrderManager>::new()),
                )
                .service(SettlementWebhookRoute::<MockOrderManager>::new()),
        )
        .app_data(web::Data::new(coordinator))
        .app_data(json_config());
    }
}

fn signed_post(path: &str, header: &str, key: &str, body: &str) -> TestRequest {
    let signature = sign_payload(key, body.as_bytes()).unwrap();
    TestRequest::post()
        .uri(path)
        .insert_header(("Content-Type", "application/json"))
        .insert_header((header, signature))
        .set_payload(body.to_string())
}

/// A store that applies every transition it is asked for
fn transitioning_store(current: OrderStatusType) -> MockOrderManager {
    let mut db = MockOrderManager::new();
    db.expect_fetch_order_by_payment_reference()
        .returning(move |reference| Ok(reference.strip_prefix("ps_").map(|id| sample_order(id, current))));
    db.expect_fetch_order_by_order_id().returning(move |order_id| Ok(Some(sample_order(order_id.as_str(), current))));
    db.expect_transition_order().returning(|order_id, update, _| {
        let mut order = sample_order(order_id.as_str(), update.new_status);
        order.failure_reason = update.reason;
        order.settlement_reference = update.settlement_reference;
        order.actual_token_amount = update.actual_token_amount;
        Ok(TransitionOutcome::Applied(order))
    });
    db
}

//-------------------------------------------   Payment webhook  ------------------------------------------------

#[actix_web::test]
async fn paid_order_is_dispatched_for_settlement() {
    let _ = env_logger::try_init().ok();
    let mut executor = MockExecutor::new();
    executor.expect_dispatch().times(1).returning(|request| {
        let signed = verify_signature(SIGNING_KEY, request.body.as_bytes(), &request.signature);
        assert!(signed.is_ok(), "Settlement request is not signed with the shared key");
        assert!(request.body.contains("SO-1001"));
        Ok(SettlementReceipt { settlement_reference: "stl-1001".into() })
    });
    let api = coordinator(transitioning_store(OrderStatusType::Initiated), MockGateway::new(), executor, None);
    let body = r#"{"reference": "ps_SO-1001", "status": "success", "paidAmount": "16000"}"#;
    let req = signed_post("/webhook/payment", PAYMENT_SIGNATURE_HEADER, GATEWAY_SECRET, body);
    let res = send_request(req, configure(api)).await.expect("Request failed");
    assert_eq!(res.status, StatusCode::OK);
    let reply = res.json();
    assert_eq!(reply["success"], true);
    assert_eq!(reply["message"], "Order #SO-1001 is PROCESSING");
}

#[actix_web::test]
async fn underpaid_order_fails() {
    let _ = env_logger::try_init().ok();
    let db = transitioning_store(OrderStatusType::Initiated);
    let api = coordinator(db, MockGateway::new(), MockExecutor::new(), None);
    let body = r#"{"reference": "ps_SO-1002", "status": "success", "paid_amount": "15000"}"#;
    let req = signed_post("/webhook/payment", PAYMENT_SIGNATURE_HEADER, GATEWAY_SECRET, body);
    let res = send_request(req, configure(api)).await.expect("Request failed");
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["message"], "Order #SO-1002 is FAILED");
}

#[actix_web::test]
async fn late_payment_failure_leaves_settling_order_alone() {
    let _ = env_logger::try_init().ok();
    let mut db = MockOrderManager::new();
    db.expect_fetch_order_by_payment_reference()
        .returning(|reference| Ok(reference.strip_prefix("ps_").map(|id| sample_order(id, OrderStatusType::Processing))));
    db.expect_transition_order().times(1).returning(|order_id, update, _| {
        assert_eq!(update.new_status, OrderStatusType::Failed);
        assert!(update.sources().is_empty(), "A payment failure may only apply to an unpaid order");
        Ok(TransitionOutcome::Ignored(sample_order(order_id.as_str(), OrderStatusType::Processing)))
    });
    let api = coordinator(db, MockGateway::new(), MockExecutor::new(), None);
    let body = r#"{"reference": "ps_SO-1005", "status": "failed"}"#;
    let req = signed_post("/webhook/payment", PAYMENT_SIGNATURE_HEADER, GATEWAY_SECRET, body);
    let res = send_request(req, configure(api)).await.expect("Request failed");
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["message"], "Order #SO-1005 is PROCESSING");
}

#[actix_web::test]
async fn payment_for_unknown_order_is_acknowledged() {
    let _ = env_logger::try_init().ok();
    let mut db = MockOrderManager::new();
    db.expect_fetch_order_by_payment_reference().returning(|_| Ok(None));
    db.expect_fetch_order_by_order_id().returning(|_| Ok(None));
    let api = coordinator(db, MockGateway::new(), MockExecutor::new(), None);
    let body = r#"{"reference": "ps_nobody", "status": "success"}"#;
    let req = signed_post("/webhook/payment", PAYMENT_SIGNATURE_HEADER, GATEWAY_SECRET, body);
    let res = send_request(req, configure(api)).await.expect("Request failed");
    assert_eq!(res.status, StatusCode::OK);
    let reply = res.json();
    assert_eq!(reply["success"], false);
    assert_eq!(reply["message"], "No order matches ps_nobody");
}

#[actix_web::test]
async fn payment_notification_without_reference() {
    let _ = env_logger::try_init().ok();
    let api = coordinator(MockOrderManager::new(), MockGateway::new(), MockExecutor::new(), None);
    let body = r#"{"status": "success", "paid_amount": "16000"}"#;
    let req = signed_post("/webhook/payment", PAYMENT_SIGNATURE_HEADER, GATEWAY_SECRET, body);
    let res = send_request(req, configure(api)).await.expect("Request failed");
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["code"], "VALIDATION_ERROR");
}

#[actix_web::test]
async fn payment_webhook_without_signature() {
    let _ = env_logger::try_init().ok();
    let api = coordinator(MockOrderManager::new(), MockGateway::new(), MockExecutor::new(), None);
    let req = TestRequest::post()
        .uri("/webhook/payment")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(r#"{"reference": "ps_SO-1003", "status": "success"}"#);
    let err = send_request(req, configure(api)).await.err().expect("Expected an error");
    assert_eq!(err, "No HMAC signature found.");
}

#[actix_web::test]
async fn payment_webhook_with_forged_signature() {
    let _ = env_logger::try_init().ok();
    let api = coordinator(MockOrderManager::new(), MockGateway::new(), MockExecutor::new(), None);
    let body = r#"{"reference": "ps_SO-1004", "status": "success"}"#;
    let req = signed_post("/webhook/payment", PAYMENT_SIGNATURE_HEADER, "not-the-gateway-secret", body);
    let err = send_request(req, configure(api)).await.err().expect("Expected an error");
    assert_eq!(err, "Invalid HMAC signature.");
}

//-----------------------------------------   Settlement webhook  -----------------------------------------------

#[actix_web::test]
async fn settlement_confirmation_completes_order() {
    let _ = env_logger::try_init().ok();
    let api =
        coordinator(transitioning_store(OrderStatusType::Processing), MockGateway::new(), MockExecutor::new(), None);
    let body = r#"{"orderId": "SO-2001", "txReference": "0xabc", "status": "COMPLETED", "confirmations": 3,
        "amountOut": "9.87"}"#;
    let req = signed_post("/webhook/settlement", SIGNATURE_HEADER, SIGNING_KEY, body);
    let res = send_request(req, configure(api)).await.expect("Request failed");
    assert_eq!(res.status, StatusCode::OK);
    let reply = res.json();
    assert_eq!(reply["success"], true);
    assert_eq!(reply["message"], "Order #SO-2001 is COMPLETED");
}

#[actix_web::test]
async fn unconfirmed_settlement_leaves_order_processing() {
    let _ = env_logger::try_init().ok();
    let mut db = MockOrderManager::new();
    db.expect_fetch_order_by_order_id()
        .returning(|order_id| Ok(Some(sample_order(order_id.as_str(), OrderStatusType::Processing))));
    let api = coordinator(db, MockGateway::new(), MockExecutor::new(), None);
    let body = r#"{"order_id": "SO-2002", "tx_reference": "0xabc", "status": "COMPLETED", "confirmations": 0}"#;
    let req = signed_post("/webhook/settlement", SIGNATURE_HEADER, SIGNING_KEY, body);
    let res = send_request(req, configure(api)).await.expect("Request failed");
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["message"], "Order #SO-2002 is PROCESSING");
}

#[actix_web::test]
async fn settlement_confirmation_with_forged_signature() {
    let _ = env_logger::try_init().ok();
    // No store expectations: a forged confirmation must not reach the store
    let api = coordinator(MockOrderManager::new(), MockGateway::new(), MockExecutor::new(), None);
    let body = r#"{"order_id": "SO-2003", "tx_reference": "0xabc", "status": "COMPLETED", "confirmations": 3}"#;
    let req = signed_post("/webhook/settlement", SIGNATURE_HEADER, "forged-key", body);
    let res = send_request(req, configure(api)).await.expect("Request failed");
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.json()["code"], "INVALID_SIGNATURE");
}

#[actix_web::test]
async fn settlement_confirmation_without_signature() {
    let _ = env_logger::try_init().ok();
    let api = coordinator(MockOrderManager::new(), MockGateway::new(), MockExecutor::new(), None);
    let req = TestRequest::post()
        .uri("/webhook/settlement")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(r#"{"order_id": "SO-2004", "tx_reference": "0xabc", "status": "FAILED"}"#);
    let res = send_request(req, configure(api)).await.expect("Request failed");
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    let reply = res.json();
    assert_eq!(reply["code"], "INVALID_SIGNATURE");
    assert_eq!(reply["error"], format!("No signature was provided in the {SIGNATURE_HEADER} header"));
}

