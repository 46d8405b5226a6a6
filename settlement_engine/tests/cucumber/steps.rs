use std::str::FromStr;

use cucumber::{then, when};
use rust_decimal::Decimal;
use serde_json::json;
use settlement_engine::{
    db_types::{Network, OrderStatusType},
    helpers::sign_payload,
    order_coordinator::{OrderRequest, PaymentEvent, PaymentStatus},
};

use crate::{cucumber::SettlementWorld, support::system::SIGNING_KEY};

#[when(expr = "customer {string} orders {int} fiat of {word} on {word}")]
async fn place_order(world: &mut SettlementWorld, customer: String, amount: i64, token: String, network: String) {
    let network = Network::from_str(&network).expect("Not a valid network");
    let request = OrderRequest {
        business_id: "biz-001".into(),
        customer,
        recipient_address: "0x9f8e2b1c0d3a4e5f60718293a4b5c6d7e8f90a1b".into(),
        fiat_amount: Decimal::from(amount),
        token,
        network,
    };
    match world.system().coordinator.create_order(request).await {
        Ok(order) => {
            world.last_order = Some(order);
            world.last_error = None;
        },
        Err(e) => world.last_error = Some(e),
    }
}

#[when(expr = "the payment for the last order succeeds")]
async fn payment_succeeds(world: &mut SettlementWorld) {
    let amount = world.last_order().fiat_amount;
    pay(world, PaymentStatus::Success, amount).await;
}

#[when(expr = "the customer pays only {int} fiat for the last order")]
async fn payment_short(world: &mut SettlementWorld, amount: i64) {
    pay(world, PaymentStatus::Success, Decimal::from(amount)).await;
}

#[when(expr = "the payment for the last order fails")]
async fn payment_fails(world: &mut SettlementWorld) {
    let amount = world.last_order().fiat_amount;
    pay(world, PaymentStatus::Failed, amount).await;
}

async fn pay(world: &mut SettlementWorld, status: PaymentStatus, amount: Decimal) {
    let order = world.last_order();
    let reference = order.payment_reference.clone().expect("Order has no payment reference");
    let event = PaymentEvent { reference, status, paid_amount: Some(amount) };
    let order = world.system().coordinator.handle_payment_event(event).await.expect("Error handling payment");
    world.last_order = Some(order);
}

#[when(expr = "the settlement of the last order reports {word} with {int} confirmations")]
async fn settlement_reports(world: &mut SettlementWorld, status: String, confirmations: u32) {
    let body = serde_json::to_vec(&json!({
        "order_id": world.last_order().order_id.as_str(),
        "tx_reference": "0xc0ffee",
        "status": status,
        "confirmations": confirmations,
    }))
    .unwrap();
    let signature = sign_payload(SIGNING_KEY, &body).unwrap();
    let coordinator = &world.system().coordinator;
    let order = coordinator.handle_signed_settlement_event(&body, &signature).await.expect("Error handling settlement");
    world.last_order = Some(order);
}

#[when(expr = "the last order is cancelled")]
async fn cancel_last_order(world: &mut SettlementWorld) {
    let order_id = world.last_order().order_id.clone();
    match world.system().coordinator.cancel_order(&order_id, None).await {
        Ok(order) => world.last_order = Some(order),
        Err(e) => world.last_error = Some(e),
    }
}

#[when(expr = "the provider roster is empty")]
async fn empty_roster(world: &mut SettlementWorld) {
    world.system().roster.clear();
}

#[then(expr = "the last order is {word}")]
async fn check_status(world: &mut SettlementWorld, status: String) {
    let expected = OrderStatusType::from_str(&status).expect("Not a valid order status");
    let order_id = world.last_order().order_id.clone();
    let stored = world.system().coordinator.fetch_order(&order_id).await.expect("Error fetching order");
    assert_eq!(stored.status, expected, "Order {order_id} has the wrong status");
}

#[then(expr = "the estimated token amount is {word}")]
async fn check_estimate(world: &mut SettlementWorld, amount: String) {
    let expected = Decimal::from_str(&amount).expect("Not a valid amount");
    assert_eq!(world.last_order().estimated_token_amount, expected);
}

#[then(expr = "the request is rejected with {word}")]
async fn check_rejection(world: &mut SettlementWorld, code: String) {
    let err = world.last_error.as_ref().expect("The request was not rejected");
    assert_eq!(err.code(), code);
}

#[then(expr = "{int} settlement(s) was/were dispatched")]
async fn check_dispatches(world: &mut SettlementWorld, count: usize) {
    assert_eq!(world.system().executor.dispatched.lock().unwrap().len(), count);
}

#[then(expr = "{int} {string} event(s) was/were published")]
async fn check_events(world: &mut SettlementWorld, count: usize, name: String) {
    let events = &world.system().events;
    events.settle(1).await;
    assert_eq!(events.count(&name), count, "Events: {:?}", events.names());
}
