//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into the engine. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every call into the [`OrderCoordinator`] is asynchronous, and
//! handlers must keep it that way.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use settlement_engine::{
    db_types::OrderId,
    helpers::SIGNATURE_HEADER,
    order_coordinator::{OrderRequest, PaymentEvent, QuoteRequest},
    OrderCoordinator,
    OrderFlowError,
    OrderManagement,
};

use crate::{
    data_objects::{CancelOrderParams, JsonResponse},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Quotes  ----------------------------------------------------
route!(quote => Post "/quote" impl OrderManagement);
/// Prices a fiat amount in the requested token without creating an order.
pub async fn quote<B: OrderManagement>(
    body: web::Json<QuoteRequest>,
    api: web::Data<OrderCoordinator<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    trace!("💻️ Quote request for {} {} on {}", request.fiat_amount, request.token, request.network);
    let quote = api.quote(&request).await?;
    Ok(HttpResponse::Ok().json(quote))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/orders" impl OrderManagement);
/// Creates an order and returns it, complete with the checkout link the customer should be sent to.
///
/// Rejections carry a machine-readable `code` and a `context` object. Liquidity rejections also carry a
/// `Retry-After` header.
pub async fn create_order<B: OrderManagement>(
    body: web::Json<OrderRequest>,
    api: web::Data<OrderCoordinator<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!(
        "💻️ New order request from {} for {} {} on {}",
        request.business_id, request.fiat_amount, request.token, request.network
    );
    let order = api.create_order(request).await?;
    info!("💻️ Order {} created", order.order_id);
    Ok(HttpResponse::Created().json(order))
}

route!(order_by_id => Get "/orders/{order_id}" impl OrderManagement);
pub async fn order_by_id<B: OrderManagement>(
    path: web::Path<OrderId>,
    api: web::Data<OrderCoordinator<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    trace!("💻️ Fetching order {order_id}");
    let order = api.fetch_order(&order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(cancel_order => Post "/orders/{order_id}/cancel" impl OrderManagement);
/// Cancels an order that has not been dispatched for settlement. The body, `{"reason": "..."}`, is optional.
pub async fn cancel_order<B: OrderManagement>(
    path: web::Path<OrderId>,
    body: Option<web::Json<CancelOrderParams>>,
    api: web::Data<OrderCoordinator<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let reason = body.and_then(|b| b.into_inner().reason);
    debug!("💻️ Cancellation requested for order {order_id}");
    let order = api.cancel_order(&order_id, reason).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Webhooks  ----------------------------------------------------
route!(payment_webhook => Post "" impl OrderManagement);
/// Payment notifications from the payment gateway. The signature has already been checked by the HMAC middleware.
///
/// Notifications for unknown payments are acknowledged with `success: false`, so that the gateway stops redelivering
/// them.
pub async fn payment_webhook<B: OrderManagement>(
    body: web::Json<PaymentEvent>,
    api: web::Data<OrderCoordinator<B>>,
) -> Result<HttpResponse, ServerError> {
    let event = body.into_inner();
    info!("💻️ Payment notification for {}: {:?}", event.reference, event.status);
    match api.handle_payment_event(event).await {
        Ok(order) => {
            let message = format!("Order {} is {}", order.order_id, order.status);
            Ok(HttpResponse::Ok().json(JsonResponse::success(message)))
        },
        Err(OrderFlowError::OrderNotFound(reference)) => {
            warn!("💻️ Received a payment notification for an unknown payment ({reference})");
            Ok(HttpResponse::Ok().json(JsonResponse::failure(format!("No order matches {reference}"))))
        },
        Err(e) => Err(e.into()),
    }
}

route!(settlement_webhook => Post "/settlement" impl OrderManagement);
/// Settlement confirmations from the settlement executor. The raw body is handed to the engine, which verifies the
/// signature in the [`SIGNATURE_HEADER`] header before anything else.
pub async fn settlement_webhook<B: OrderManagement>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<OrderCoordinator<B>>,
) -> Result<HttpResponse, ServerError> {
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ServerError::MissingSignature(SIGNATURE_HEADER))?;
    let order = api.handle_signed_settlement_event(body.as_ref(), signature).await?;
    debug!("💻️ Settlement notification handled. Order {} is {}", order.order_id, order.status);
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Order {} is {}", order.order_id, order.status))))
}
