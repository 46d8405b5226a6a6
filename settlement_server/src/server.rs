use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use settlement_engine::{
    events::{EventHandlers, EventHooks},
    helpers::SIGNATURE_HEADER,
    OrderCoordinator,
    SqliteDatabase,
    WebhookNotifier,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    integrations::{build_collaborators, build_webhook_sink},
    middleware::HmacMiddlewareFactory,
    routes::{
        health,
        CancelOrderRoute,
        CreateOrderRoute,
        OrderByIdRoute,
        PaymentWebhookRoute,
        QuoteRoute,
        SettlementWebhookRoute,
    },
};

/// The header payment gateways put their HMAC signature in
pub const PAYMENT_SIGNATURE_HEADER: &str = "X-Payment-Signature";

const EVENT_BUFFER_SIZE: usize = 128;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Could not run migrations. {e}")))?;
    let collaborators = build_collaborators(&config)?;

    let mut hooks = EventHooks::default();
    let notifier = WebhookNotifier::new(build_webhook_sink(&config)?, config.signing_key.clone());
    notifier.register(&mut hooks);
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let coordinator = OrderCoordinator::new(db, collaborators, producers, config.coordinator.clone());
    // Runs for the life of the server
    let _worker = start_expiry_worker(coordinator.clone(), config.expiry_interval);
    info!("💻️ Order coordinator is ready. Expiry sweeps run every {}s", config.expiry_interval.as_secs());
    let srv = create_server_instance(config, coordinator)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    coordinator: OrderCoordinator<SqliteDatabase>,
) -> Result<Server, ServerError> {
    let payment_secret = config.payment_webhook_secret.clone();
    let hmac_checks = config.payment_hmac_checks;
    let srv = HttpServer::new(move || {
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("sre::access_log"))
            .app_data(web::Data::new(coordinator.clone()))
            .app_data(json_config());
        // Payment gateway webhooks are signed with the gateway's secret, and checked before they reach the route.
        // Settlement confirmations are verified by the engine itself.
        let webhook_scope = web::scope("/webhook")
            .service(
                web::scope("/payment")
                    .wrap(HmacMiddlewareFactory::new(PAYMENT_SIGNATURE_HEADER, payment_secret.clone(), hmac_checks))
                    .service(PaymentWebhookRoute::<SqliteDatabase>::new()),
            )
            .service(SettlementWebhookRoute::<SqliteDatabase>::new());
        app.service(health)
            .service(QuoteRoute::<SqliteDatabase>::new())
            .service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(CancelOrderRoute::<SqliteDatabase>::new())
            .service(webhook_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    info!("💻️ Listening on {}:{}", config.host, config.port);
    debug!("💻️ Payment signatures: {PAYMENT_SIGNATURE_HEADER}. Settlement signatures: {SIGNATURE_HEADER}.");
    Ok(srv)
}

/// Bodies that are not valid JSON, or do not match the request type, are rejected with the same `VALIDATION_ERROR`
/// body as any other invalid request.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        debug!("💻️ Rejecting request body. {err}");
        ServerError::InvalidRequestBody(err.to_string()).into()
    })
}
