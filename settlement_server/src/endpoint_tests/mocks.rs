use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::mock;
use settlement_engine::{
    db_types::{Network, NewOrder, Order, OrderId, StatusUpdate},
    helpers::SignedPayload,
    traits::{
        CheckoutRequest,
        CheckoutSession,
        OrderManagement,
        OrderStoreError,
        PaymentGateway,
        PaymentGatewayError,
        Provider,
        ProviderRoster,
        ProviderRosterError,
        SettlementExecutor,
        SettlementExecutorError,
        SettlementReceipt,
        TransitionOutcome,
    },
};

mock! {
    pub OrderManager {}
    impl Clone for OrderManager {
        fn clone(&self) -> Self;
    }
    impl OrderManagement for OrderManager {
        fn url(&self) -> &str;
        async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderStoreError>;
        async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError>;
        async fn fetch_order_by_payment_reference(&self, reference: &str) -> Result<Option<Order>, OrderStoreError>;
        async fn transition_order(&self, order_id: &OrderId, update: StatusUpdate, now: DateTime<Utc>) -> Result<TransitionOutcome, OrderStoreError>;
        async fn attach_checkout(&self, order_id: &OrderId, checkout_url: &str, payment_reference: &str) -> Result<Order, OrderStoreError>;
        async fn expire_unpaid_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>, OrderStoreError>;
    }
}

mock! {
    pub Gateway {}
    #[async_trait]
    impl PaymentGateway for Gateway {
        async fn create_checkout(&self, request: CheckoutRequest) -> Result<CheckoutSession, PaymentGatewayError>;
    }
}

mock! {
    pub Executor {}
    #[async_trait]
    impl SettlementExecutor for Executor {
        async fn dispatch(&self, request: SignedPayload) -> Result<SettlementReceipt, SettlementExecutorError>;
    }
}

mock! {
    pub Roster {}
    #[async_trait]
    impl ProviderRoster for Roster {
        async fn fetch_providers(&self, network: Network) -> Result<Vec<Provider>, ProviderRosterError>;
    }
}
