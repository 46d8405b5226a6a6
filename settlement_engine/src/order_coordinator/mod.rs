//! # Order coordination
//!
//! The [`OrderCoordinator`] owns the order lifecycle:
//!
//! ```text
//!   INITIATED ──► PENDING ──► PROCESSING ──► COMPLETED
//!       │            │             │
//!       ├────────────┴─────────────┴──────► FAILED
//!       ├────────────┴────────────────────► CANCELLED
//!       └─────────────────────────────────► EXPIRED
//! ```
//!
//! Every state change is a conditional write in the order store (see
//! [`OrderManagement::transition_order`](crate::traits::OrderManagement::transition_order)). An event whose transition
//! does not follow the stored state is a no-op, which makes redelivered and out-of-order webhooks harmless. Only
//! applied transitions publish events, so a duplicate confirmation never produces a duplicate notification.
mod errors;
mod order_objects;

use std::sync::Arc;

use chrono::{DateTime, Utc};
pub use errors::OrderFlowError;
use log::*;
pub use order_objects::{
    CoordinatorConfig,
    OrderRequest,
    PaymentEvent,
    PaymentStatus,
    QuoteRequest,
    SettlementEvent,
    SettlementStatus,
};
use rust_decimal::{Decimal, RoundingStrategy};
use tokio::time::timeout;

use crate::{
    db_types::{FeeBreakdown, NewOrder, Order, OrderId, OrderStatusType, StatusUpdate},
    duplicate_guard::{DuplicateGuard, GuardKey},
    events::{EventProducers, OrderCreatedEvent, OrderStatusChangedEvent},
    helpers::{new_order_id, verify_signature, SignatureError, SignedPayload},
    liquidity_cache::{LiquidityCache, LiquiditySource},
    provider_matcher::LiquidityDecision,
    quote_objects::Quote,
    rate_oracle::RateOracle,
    route_finder::RouteFinder,
    token_registry::TokenRegistry,
    traits::{
        CheckoutRequest,
        OrderManagement,
        PaymentGateway,
        SettlementExecutor,
        SettlementRequest,
        TransitionOutcome,
    },
};

/// Decimal places used for settlement stablecoin amounts
const STABLE_DECIMALS: u32 = 6;

/// The stateless collaborators of the coordinator.
pub struct Collaborators {
    pub registry: TokenRegistry,
    pub rates: RateOracle,
    pub routes: RouteFinder,
    pub liquidity: LiquidityCache,
    pub payments: Arc<dyn PaymentGateway>,
    pub executor: Arc<dyn SettlementExecutor>,
}

pub struct OrderCoordinator<B> {
    db: B,
    registry: Arc<TokenRegistry>,
    rates: RateOracle,
    routes: RouteFinder,
    liquidity: Arc<LiquidityCache>,
    guard: Arc<DuplicateGuard>,
    payments: Arc<dyn PaymentGateway>,
    executor: Arc<dyn SettlementExecutor>,
    producers: EventProducers,
    config: CoordinatorConfig,
}

impl<B> std::fmt::Debug for OrderCoordinator<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderCoordinator")
    }
}

impl<B: Clone> Clone for OrderCoordinator<B> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            registry: Arc::clone(&self.registry),
            rates: self.rates.clone(),
            routes: self.routes.clone(),
            liquidity: Arc::clone(&self.liquidity),
            guard: Arc::clone(&self.guard),
            payments: Arc::clone(&self.payments),
            executor: Arc::clone(&self.executor),
            producers: self.producers.clone(),
            config: self.config.clone(),
        }
    }
}

impl<B> OrderCoordinator<B> {
    pub fn new(db: B, collaborators: Collaborators, producers: EventProducers, config: CoordinatorConfig) -> Self {
        Self {
            db,
            registry: Arc::new(collaborators.registry),
            rates: collaborators.rates,
            routes: collaborators.routes,
            liquidity: Arc::new(collaborators.liquidity),
            guard: Arc::new(DuplicateGuard::new()),
            payments: collaborators.payments,
            executor: collaborators.executor,
            producers,
            config,
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    pub fn duplicate_guard(&self) -> &DuplicateGuard {
        &self.guard
    }

    /// Drops lapsed duplicate-guard reservations and liquidity cache entries.
    pub fn purge_stale_entries(&self) -> (usize, usize) {
        (self.guard.purge_expired(Utc::now()), self.liquidity.purge_expired())
    }
}

impl<B> OrderCoordinator<B>
where B: OrderManagement
{
    //----------------------------------------------   Quoting  ----------------------------------------------------
    /// Prices a request without creating anything.
    ///
    /// The fee is taken off the fiat amount first, the net is converted to settlement stablecoin at the current rate,
    /// the route finder sizes the token amount, and liquidity-constrained networks are matched to a provider.
    pub async fn quote(&self, request: &QuoteRequest) -> Result<Quote, OrderFlowError> {
        self.validate_amount(request.fiat_amount)?;
        let token = self.registry.lookup(&request.token, request.network).ok_or_else(|| {
            OrderFlowError::TokenNotSupported { token: request.token.clone(), network: request.network }
        })?;
        let fees = FeeBreakdown::calculate(request.fiat_amount, token.fee_pct);
        let rate = self.rates.stable_to_fiat_rate().await;
        let settlement_stable_amount = rate.fiat_to_stable(fees.net_amount).round_dp(STABLE_DECIMALS);
        let route = self
            .routes
            .quote_for_settlement(token, request.network, settlement_stable_amount)
            .await
            .map_err(|e| OrderFlowError::from_route_error(e, self.config.retry_after))?;
        if settlement_stable_amount < self.config.min_settlement_stable {
            let minimum_fiat = self.minimum_fiat_amount(rate.rate, token.fee_pct);
            info!(
                "🔄️ Rejecting {} {} on {}: worth {settlement_stable_amount} against a minimum of {}",
                request.fiat_amount, request.token, request.network, self.config.min_settlement_stable
            );
            return Err(OrderFlowError::BelowMinimum {
                settlement_value: settlement_stable_amount,
                minimum_settlement: self.config.min_settlement_stable,
                minimum_fiat,
            });
        }
        let (provider_candidate, liquidity_ratio, liquidity_source) =
            if self.config.requires_liquidity_check(request.network) {
                let check = self.liquidity.get(request.network, settlement_stable_amount).await;
                match check.decision {
                    LiquidityDecision::Capable(m) => (Some(m.provider_id), Some(m.liquidity_ratio), check.source),
                    LiquidityDecision::AssumedAvailable => (None, None, check.source),
                    LiquidityDecision::Insufficient { max_available } => {
                        return Err(OrderFlowError::InsufficientLiquidity {
                            network: request.network,
                            required: settlement_stable_amount,
                            max_available,
                            retry_after: self.config.retry_after,
                        });
                    },
                }
            } else {
                (None, None, LiquiditySource::Skipped)
            };
        let issued_at = Utc::now();
        let quote = Quote {
            token: token.symbol.clone(),
            network: request.network,
            fees,
            rate,
            settlement_stable_amount,
            token_amount: route.token_amount,
            price_per_unit: route.price_per_unit,
            route_id: route.route_id,
            pool_liquidity_adequate: route.pool_liquidity_adequate,
            provider_candidate,
            liquidity_ratio,
            liquidity_source,
            detail: route.detail,
            issued_at,
            expires_at: issued_at + self.config.quote_ttl,
        };
        debug!(
            "🔄️ Quoted {} {} on {}: {} tokens via {} at rate {} ({})",
            request.fiat_amount,
            quote.token,
            quote.network,
            quote.token_amount,
            quote.route_id,
            quote.rate.rate,
            quote.rate.tier
        );
        Ok(quote)
    }

    fn validate_amount(&self, amount: Decimal) -> Result<(), OrderFlowError> {
        let (min, max) = (self.config.min_fiat_amount, self.config.max_fiat_amount);
        if amount <= Decimal::ZERO || amount < min || amount > max {
            return Err(OrderFlowError::InvalidAmount { amount, min, max });
        }
        Ok(())
    }

    /// The smallest whole fiat amount whose net value reaches the minimum settlement value at `rate`.
    fn minimum_fiat_amount(&self, rate: Decimal, fee_pct: Decimal) -> Decimal {
        let net = self.config.min_settlement_stable * rate;
        let divisor = Decimal::ONE - fee_pct;
        if divisor <= Decimal::ZERO {
            return net;
        }
        (net / divisor).round_dp_with_strategy(0, RoundingStrategy::AwayFromZero)
    }

    //-------------------------------------------   Order creation  ------------------------------------------------
    /// Creates a new order from `request`.
    ///
    /// A fresh order id is reserved in the duplicate guard before anything else happens, so that a concurrent request
    /// for the same (customer, token, network) is rejected with the id of the order in flight. Quoting failures abort
    /// before anything is persisted and release the reservation.
    ///
    /// Once persisted, a checkout link is requested from the payment gateway. If that fails the order is moved to
    /// `Failed` and [`OrderFlowError::PaymentGatewayUnavailable`] is returned.
    pub async fn create_order(&self, request: OrderRequest) -> Result<Order, OrderFlowError> {
        if request.customer.trim().is_empty() {
            return Err(OrderFlowError::InvalidRequest("A customer email or phone number is required".into()));
        }
        if request.recipient_address.trim().is_empty() {
            return Err(OrderFlowError::InvalidRequest("A recipient address is required".into()));
        }
        if request.business_id.trim().is_empty() {
            return Err(OrderFlowError::InvalidRequest("A business id is required".into()));
        }
        let order_id = new_order_id();
        let now = Utc::now();
        let expires_at = now + self.config.order_expiry;
        let key = GuardKey::new(request.customer_identity(), &request.token, request.network);
        if self.config.enable_duplicate_guard {
            if let Err(existing_order) = self.guard.reserve(key.clone(), order_id.clone(), now, expires_at) {
                info!("🔄️ Duplicate order request from {} for {}. Live order: {existing_order}", key.customer, key.token);
                return Err(OrderFlowError::DuplicateRequest { existing_order, retry_after: self.config.retry_after });
            }
        }
        let result = self.persist_new_order(&request, order_id.clone(), now, expires_at).await;
        if result.is_err() && self.config.enable_duplicate_guard {
            self.guard.release(&key, &order_id);
        }
        let order = result?;
        self.issue_checkout(order, &request).await
    }

    async fn persist_new_order(
        &self,
        request: &OrderRequest,
        order_id: OrderId,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Order, OrderFlowError> {
        let quote = self.quote(&request.quote_request()).await?;
        let token_contract_address = self
            .registry
            .lookup(&request.token, request.network)
            .map(|t| t.contract_address.clone())
            .unwrap_or_default();
        let new_order = NewOrder {
            order_id,
            business_id: request.business_id.trim().to_string(),
            customer_id: request.customer_identity(),
            recipient_address: request.recipient_address.trim().to_string(),
            fees: quote.fees,
            target_token: quote.token.clone(),
            target_network: request.network,
            token_contract_address,
            exchange_rate: quote.rate.rate,
            estimated_token_amount: quote.token_amount,
            created_at: now,
            expires_at,
            metadata: quote.snapshot(),
        };
        let order = self.db.insert_order(new_order).await?;
        info!(
            "🔄️ Order {} created: {} fiat for {} {} on {} (rate tier: {})",
            order.order_id,
            order.fiat_amount,
            order.estimated_token_amount,
            order.target_token,
            order.target_network,
            order.metadata.rate_tier
        );
        Ok(order)
    }

    async fn issue_checkout(&self, order: Order, request: &OrderRequest) -> Result<Order, OrderFlowError> {
        let checkout = CheckoutRequest {
            amount: order.fiat_amount,
            reference: order.order_id.as_str().to_string(),
            payer_info: request.customer.trim().to_string(),
        };
        let session = timeout(self.config.collaborator_timeout, self.payments.create_checkout(checkout))
            .await
            .map_err(|_| "timed out".to_string())
            .and_then(|r| r.map_err(|e| e.to_string()));
        match session {
            Ok(session) => {
                let order =
                    self.db.attach_checkout(&order.order_id, &session.checkout_url, &session.payment_reference).await?;
                debug!("🔄️ Checkout issued for order {}: {}", order.order_id, session.payment_reference);
                self.producers.publish_order_created(OrderCreatedEvent::new(order.clone())).await;
                Ok(order)
            },
            Err(e) => {
                warn!("🔄️ Could not issue a checkout for order {}: {e}", order.order_id);
                let update = StatusUpdate::new(OrderStatusType::Failed).with_reason("payment gateway unavailable");
                self.apply_transition(&order, update).await?;
                Err(OrderFlowError::PaymentGatewayUnavailable(e))
            },
        }
    }

    //-------------------------------------------   Payment events  ------------------------------------------------
    /// Handles a payment notification from the payment gateway.
    ///
    /// A successful payment for the full amount moves the order to `Pending` and immediately dispatches the settlement.
    /// Underpayments and failed payments fail the order, but only while it is still awaiting payment. Notifications for
    /// orders that have already moved on are ignored, and the order is returned as it stands.
    pub async fn handle_payment_event(&self, event: PaymentEvent) -> Result<Order, OrderFlowError> {
        let order = self.order_for_payment_reference(&event.reference).await?;
        match event.status {
            PaymentStatus::Success => {
                let paid = event.paid_amount.unwrap_or(order.fiat_amount);
                if paid < order.fiat_amount {
                    warn!("🔄️ Order {} was underpaid: {paid} of {}", order.order_id, order.fiat_amount);
                    let update = StatusUpdate::new(OrderStatusType::Failed)
                        .with_reason("underpaid")
                        .with_payment_reference(event.reference)
                        .only_from(&[OrderStatusType::Initiated]);
                    return Ok(self.apply_transition(&order, update).await?.into_order());
                }
                let update = StatusUpdate::new(OrderStatusType::Pending).with_payment_reference(event.reference);
                match self.apply_transition(&order, update).await? {
                    TransitionOutcome::Applied(order) => self.dispatch_settlement(order).await,
                    TransitionOutcome::Ignored(order) => Ok(order),
                }
            },
            PaymentStatus::Failed => {
                let update = StatusUpdate::new(OrderStatusType::Failed)
                    .with_reason("payment failed")
                    .only_from(&[OrderStatusType::Initiated]);
                Ok(self.apply_transition(&order, update).await?.into_order())
            },
            PaymentStatus::Other => {
                debug!("🔄️ Ignoring non-final payment notification for order {}", order.order_id);
                Ok(order)
            },
        }
    }

    async fn order_for_payment_reference(&self, reference: &str) -> Result<Order, OrderFlowError> {
        if let Some(order) = self.db.fetch_order_by_payment_reference(reference).await? {
            return Ok(order);
        }
        let order_id = OrderId::from(reference.to_string());
        self.db.fetch_order_by_order_id(&order_id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(reference.into()))
    }

    /// Signs and sends the settlement request for a paid order, and moves the order to `Processing`.
    ///
    /// If the quote has expired since the order was created, the provider allocation is re-validated against the live
    /// roster first. Settlement failures are confined to this order: it is moved to `Failed` and returned.
    async fn dispatch_settlement(&self, order: Order) -> Result<Order, OrderFlowError> {
        let snapshot = &order.metadata;
        let mut provider = snapshot.provider.clone();
        if snapshot.is_expired_at(Utc::now()) && self.config.requires_liquidity_check(order.target_network) {
            debug!("🔄️ Quote for order {} has expired. Re-validating liquidity.", order.order_id);
            let decision = self
                .liquidity
                .matcher()
                .find_capable_provider(order.target_network, snapshot.settlement_stable_amount)
                .await;
            match decision {
                LiquidityDecision::Capable(m) => provider = Some(m.provider_id),
                LiquidityDecision::AssumedAvailable => {},
                LiquidityDecision::Insufficient { .. } => {
                    let error = OrderFlowError::SettlementFailure("insufficient liquidity at settlement".into());
                    return self.fail_settlement(&order, error).await;
                },
            }
        }
        let input_token = self
            .registry
            .settlement_token(order.target_network)
            .map(|t| t.contract_address.clone())
            .or_else(|| self.routes.config().routing(order.target_network).map(|r| r.stable_token.clone()))
            .unwrap_or_default();
        let request = SettlementRequest {
            order_id: order.order_id.as_str().to_string(),
            network: order.target_network,
            input_token,
            output_token: order.token_contract_address.clone(),
            amount: snapshot.settlement_stable_amount,
            min_amount_out: (order.estimated_token_amount * (Decimal::ONE - self.config.slippage_tolerance))
                .round_dp(18),
            recipient: order.recipient_address.clone(),
            provider: provider.clone(),
            route_id: snapshot.route_id.clone(),
        };
        let signed = match SignedPayload::create(&request, self.config.signing_key.reveal()) {
            Ok(s) => s,
            Err(e) => {
                error!("🔄️ Could not sign the settlement request for order {}: {e}", order.order_id);
                return self.fail_settlement(&order, OrderFlowError::SettlementFailure(e.to_string())).await;
            },
        };
        let receipt = timeout(self.config.collaborator_timeout, self.executor.dispatch(signed))
            .await
            .map_err(|_| "timed out".to_string())
            .and_then(|r| r.map_err(|e| e.to_string()));
        let update = match receipt {
            Ok(receipt) => {
                info!("🔄️ Settlement for order {} dispatched: {}", order.order_id, receipt.settlement_reference);
                let update =
                    StatusUpdate::new(OrderStatusType::Processing).with_settlement_reference(receipt.settlement_reference);
                match provider {
                    Some(p) => update.with_provider(p),
                    None => update,
                }
            },
            Err(e) => return self.fail_settlement(&order, OrderFlowError::SettlementFailure(e)).await,
        };
        Ok(self.apply_transition(&order, update).await?.into_order())
    }

    /// Settlement failures are confined to their order. The order is failed with the error as its reason, and
    /// returned rather than the error.
    async fn fail_settlement(&self, order: &Order, error: OrderFlowError) -> Result<Order, OrderFlowError> {
        warn!("🔄️ Settlement of order {} failed. {error} ({})", order.order_id, error.code());
        let update = StatusUpdate::new(OrderStatusType::Failed).with_reason(error.to_string());
        Ok(self.apply_transition(order, update).await?.into_order())
    }

    //-----------------------------------------   Settlement events  -----------------------------------------------
    /// Verifies the signature over the raw body of a settlement confirmation, then handles it.
    pub async fn handle_signed_settlement_event(&self, body: &[u8], signature: &str) -> Result<Order, OrderFlowError> {
        verify_signature(self.config.signing_key.reveal(), body, signature).map_err(|e| match e {
            SignatureError::MissingKey => {
                error!("🔄️ No signing key is configured. Settlement confirmations cannot be verified.");
                OrderFlowError::InvalidSignature
            },
            _ => OrderFlowError::InvalidSignature,
        })?;
        let event = serde_json::from_slice::<SettlementEvent>(body)
            .map_err(|e| OrderFlowError::InvalidRequest(format!("Invalid settlement confirmation: {e}")))?;
        self.handle_settlement_event(event).await
    }

    /// Handles a settlement confirmation that has already been authenticated.
    ///
    /// `COMPLETED` with enough confirmations completes the order; `FAILED` fails it. Anything else, or any event for an
    /// order that is not `Processing`, leaves the order untouched.
    pub async fn handle_settlement_event(&self, event: SettlementEvent) -> Result<Order, OrderFlowError> {
        let order_id = OrderId::from(event.order_id.clone());
        let order = self
            .db
            .fetch_order_by_order_id(&order_id)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(event.order_id.clone()))?;
        let update = match event.status {
            SettlementStatus::Completed if event.confirmations < self.config.required_confirmations => {
                debug!(
                    "🔄️ Settlement of order {order_id} has {} of {} confirmations. Waiting.",
                    event.confirmations, self.config.required_confirmations
                );
                return Ok(order);
            },
            SettlementStatus::Completed => {
                let delivered = event.amount_out.unwrap_or(order.estimated_token_amount);
                StatusUpdate::new(OrderStatusType::Completed)
                    .with_settlement_reference(event.tx_reference)
                    .with_actual_token_amount(delivered)
            },
            SettlementStatus::Failed => {
                let reason = event.reason.unwrap_or_else(|| "settlement failed".to_string());
                StatusUpdate::new(OrderStatusType::Failed).with_reason(reason).with_settlement_reference(event.tx_reference)
            },
            SettlementStatus::Pending | SettlementStatus::Unknown => {
                trace!("🔄️ Ignoring {:?} settlement notification for order {order_id}", event.status);
                return Ok(order);
            },
        };
        Ok(self.apply_transition(&order, update).await?.into_order())
    }

    //------------------------------------------   Order management  -----------------------------------------------
    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        self.db.fetch_order_by_order_id(order_id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_id.0.clone()))
    }

    /// Cancels an order that has not been dispatched for settlement. Cancelling a cancelled order is a no-op.
    pub async fn cancel_order(&self, order_id: &OrderId, reason: Option<String>) -> Result<Order, OrderFlowError> {
        let order = self.fetch_order(order_id).await?;
        let update =
            StatusUpdate::new(OrderStatusType::Cancelled).with_reason(reason.unwrap_or_else(|| "cancelled".to_string()));
        match self.apply_transition(&order, update).await? {
            TransitionOutcome::Applied(order) => Ok(order),
            TransitionOutcome::Ignored(order) if order.status == OrderStatusType::Cancelled => Ok(order),
            TransitionOutcome::Ignored(order) => {
                Err(OrderFlowError::OrderNotCancellable { order_id: order.order_id, status: order.status })
            },
        }
    }

    /// Expires every unpaid order past its expiry time. Safe to run concurrently with itself and with live traffic.
    pub async fn expire_unpaid_orders(&self) -> Result<Vec<Order>, OrderFlowError> {
        let expired = self.db.expire_unpaid_orders(Utc::now()).await?;
        for order in &expired {
            if self.config.enable_duplicate_guard {
                self.guard.release_for_order(order);
            }
            let event = OrderStatusChangedEvent::new(order.clone(), OrderStatusType::Initiated);
            self.producers.publish_status_changed(event).await;
        }
        Ok(expired)
    }

    /// Applies `update` to `order` through the store's conditional write. Applied transitions publish an event and,
    /// when terminal, release the order's duplicate-guard reservation.
    ///
    /// Each write is pinned to the status last seen, so the published `old_status` is the state the write actually
    /// replaced. If the order moved on in the meantime to another state the update may still apply from, the write is
    /// retried against that state. The status graph has no cycles, so this terminates.
    async fn apply_transition(&self, order: &Order, update: StatusUpdate) -> Result<TransitionOutcome, OrderFlowError> {
        let new_status = update.new_status;
        let mut observed = order.status;
        let outcome = loop {
            let pinned = update.clone().only_from(&[observed]);
            match self.db.transition_order(&order.order_id, pinned, Utc::now()).await? {
                TransitionOutcome::Ignored(current) if current.status != observed && update.permits(current.status) => {
                    debug!(
                        "🔄️ Order {} moved from {observed} to {} concurrently. Retrying the move to {new_status}.",
                        current.order_id, current.status
                    );
                    observed = current.status;
                },
                outcome => break outcome,
            }
        };
        match &outcome {
            TransitionOutcome::Applied(updated) => {
                info!("🔄️ Order {} moved from {observed} to {new_status}", updated.order_id);
                if new_status.is_terminal() && self.config.enable_duplicate_guard {
                    self.guard.release_for_order(updated);
                }
                let event = OrderStatusChangedEvent::new(updated.clone(), observed);
                self.producers.publish_status_changed(event).await;
            },
            TransitionOutcome::Ignored(current) => {
                debug!(
                    "🔄️ Order {} is {}. Ignoring the request to move it to {new_status}.",
                    current.order_id, current.status
                );
            },
        }
        Ok(outcome)
    }
}

