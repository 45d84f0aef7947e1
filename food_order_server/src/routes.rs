//! Request handler definitions
//!
//! Define each route and its handler here. Handlers that are more than a line or two MUST call into the engine API
//! rather than doing the work themselves. Keep this module neat and tidy 🙏
//!
//! Since each worker thread processes its requests sequentially, handlers must never block the current thread. Every
//! database call goes through the async engine API.
use actix_web::{get, web, HttpResponse, Responder};
use food_order_engine::{CouponManagement, LoyaltyManagement, OrderFlowApi, OrderFlowError, OrderManagement};
use log::*;

use crate::{
    data_objects::{JsonResponse, PaymentWebhook},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds +)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>);
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

//----------------------------------------------   Payments  ----------------------------------------------------
route!(payment_webhook => Post "/payment" impl OrderManagement, CouponManagement, LoyaltyManagement);
/// Applies a payment gateway callback to the order named in the payment reference.
///
/// The request signature has already been checked by the HMAC middleware. Payments the engine refuses (short
/// payments, abandoned checkouts, cash orders) are acknowledged with `success: false` so that the gateway stops
/// retrying. Unknown orders and backend failures are reported as errors.
pub async fn payment_webhook<B>(
    api: web::Data<OrderFlowApi<B>>,
    body: web::Json<PaymentWebhook>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + CouponManagement + LoyaltyManagement,
{
    let hook = body.into_inner();
    info!("💻️ Payment webhook received. Event: {}, reference: {}", hook.event, hook.reference());
    debug!("💻️ Payment webhook: {}", serde_json::to_string(&hook).unwrap_or_else(|e| format!("{e}")));
    match api.apply_payment_result(hook.reference(), hook.verification()).await {
        Ok(order) => {
            info!("💻️ Order {} payment is {}. Order status: {}", order.order_number, order.payment_status, order.status());
            let msg = format!("Order {} payment is {}", order.order_number, order.payment_status);
            Ok(HttpResponse::Ok().json(JsonResponse::success(msg)))
        },
        Err(
            e @ (OrderFlowError::PaymentAmountMismatch { .. }
            | OrderFlowError::PaymentNotCompleted(_)
            | OrderFlowError::PaymentNotApplicable(_)),
        ) => {
            warn!("💻️ Payment for {} was not accepted. {e}", hook.reference());
            Ok(HttpResponse::Ok().json(JsonResponse::failure(e)))
        },
        Err(e) => {
            error!("💻️ Could not apply payment webhook for {}. {e}", hook.reference());
            Err(e.into())
        },
    }
}
