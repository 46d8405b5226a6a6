use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use rust_decimal::Decimal;
use settlement_engine::{
    db_types::Network,
    helpers::SignedPayload,
    traits::{
        ChainQuoteError,
        ChainQuoter,
        CheckoutRequest,
        CheckoutSession,
        FeeTier,
        PaymentGateway,
        PaymentGatewayError,
        PoolKind,
        Provider,
        ProviderRoster,
        ProviderRosterError,
        RateSource,
        RateSourceError,
        SettlementExecutor,
        SettlementExecutorError,
        SettlementReceipt,
        SettlementRequest,
        SwapPath,
    },
};

//--------------------------------------      Rate source      ---------------------------------------------------------
pub struct FixedRate {
    pub rate: Mutex<Option<Decimal>>,
}

impl FixedRate {
    pub fn new(rate: Decimal) -> Self {
        Self { rate: Mutex::new(Some(rate)) }
    }

    pub fn go_offline(&self) {
        *self.rate.lock().unwrap() = None;
    }
}

#[async_trait]
impl RateSource for FixedRate {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn fetch_stable_rate(&self) -> Result<Decimal, RateSourceError> {
        let rate = *self.rate.lock().unwrap();
        rate.ok_or_else(|| RateSourceError::Unavailable("offline".into()))
    }
}

//--------------------------------------      Chain quoter     ---------------------------------------------------------
/// Quotes every token at a fixed price, through the direct 0.05% pool only.
pub struct FlatPriceChain {
    pub price: Decimal,
}

#[async_trait]
impl ChainQuoter for FlatPriceChain {
    async fn is_token_supported(&self, _network: Network, _token: &str) -> Result<bool, ChainQuoteError> {
        Ok(true)
    }

    async fn quote(&self, _network: Network, path: &SwapPath, amount_in: Decimal) -> Result<Decimal, ChainQuoteError> {
        match path.hops.as_slice() {
            [hop] if hop.pool == PoolKind::Concentrated(FeeTier::Low) => Ok(amount_in * self.price),
            _ => Err(ChainQuoteError::NoPool),
        }
    }
}

//--------------------------------------    Provider roster    ---------------------------------------------------------
pub struct FakeRoster {
    pub providers: Mutex<Vec<Provider>>,
    pub failing: AtomicBool,
}

impl FakeRoster {
    pub fn with_balance(network: Network, balance: Decimal) -> Self {
        let roster = Self { providers: Mutex::new(Vec::new()), failing: AtomicBool::new(false) };
        roster.add_provider("lp-1", network, balance, true);
        roster
    }

    pub fn add_provider(&self, id: &str, network: Network, balance: Decimal, verified: bool) {
        let mut balances = HashMap::new();
        balances.insert(network, balance);
        let provider = Provider { id: id.into(), name: id.to_uppercase(), balances, verified, active: true };
        self.providers.lock().unwrap().push(provider);
    }

    pub fn clear(&self) {
        self.providers.lock().unwrap().clear();
    }
}

#[async_trait]
impl ProviderRoster for FakeRoster {
    async fn fetch_providers(&self, _network: Network) -> Result<Vec<Provider>, ProviderRosterError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderRosterError::Unavailable("roster is down".into()));
        }
        Ok(self.providers.lock().unwrap().clone())
    }
}

//--------------------------------------    Payment gateway    ---------------------------------------------------------
#[derive(Default)]
pub struct FakeGateway {
    pub failing: AtomicBool,
    pub requests: Mutex<Vec<CheckoutRequest>>,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_checkout(&self, request: CheckoutRequest) -> Result<CheckoutSession, PaymentGatewayError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PaymentGatewayError::Unavailable("gateway is down".into()));
        }
        let session = CheckoutSession {
            checkout_url: format!("https://checkout.test/{}", request.reference),
            payment_reference: format!("ps_{}", request.reference),
        };
        self.requests.lock().unwrap().push(request);
        Ok(session)
    }
}

//--------------------------------------  Settlement executor  ---------------------------------------------------------
#[derive(Default)]
pub struct FakeExecutor {
    pub failing: AtomicBool,
    pub dispatched: Mutex<Vec<SignedPayload>>,
    count: AtomicUsize,
}

impl FakeExecutor {
    pub fn requests(&self) -> Vec<SettlementRequest> {
        self.dispatched
            .lock()
            .unwrap()
            .iter()
            .map(|p| serde_json::from_str(&p.body).expect("settlement request is not valid JSON"))
            .collect()
    }
}

#[async_trait]
impl SettlementExecutor for FakeExecutor {
    async fn dispatch(&self, request: SignedPayload) -> Result<SettlementReceipt, SettlementExecutorError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SettlementExecutorError::Unavailable("executor is down".into()));
        }
        let n = self.count.fetch_add(1, Ordering::SeqCst);
        self.dispatched.lock().unwrap().push(request);
        Ok(SettlementReceipt { settlement_reference: format!("settle-{n}") })
    }
}
