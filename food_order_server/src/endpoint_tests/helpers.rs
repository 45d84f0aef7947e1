use actix_web::{
    body::MessageBody,
    http::{header::ContentType, StatusCode},
    test,
    test::TestRequest,
    web,
    App,
};
use fo_common::{Cents, Secret};
use food_order_engine::{
    db_types::{CustomerInfo, LineItem, NewOrder, Order, PaymentMethod},
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    OrderFlowApi,
    SqliteDatabase,
};
use log::debug;

use crate::{
    helpers::calculate_hmac,
    middleware::{HmacMiddlewareFactory, PAYMENT_SIGNATURE_HEADER},
    routes::PaymentWebhookRoute,
    server::json_config,
};

pub const WEBHOOK_SECRET: &str = "whsec_endpoint_tests";

pub async fn order_api() -> OrderFlowApi<SqliteDatabase> {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    OrderFlowApi::new(db, EventProducers::default())
}

pub async fn place_card_order(api: &OrderFlowApi<SqliteDatabase>) -> Order {
    let info = CustomerInfo::new("Ada Obi", "ada@example.com", "+2348000000000", "12 Marina Road", "Lagos");
    let items = vec![LineItem::new("suya-1", "Beef suya", Cents::from_units(15), 3)];
    let order = NewOrder::new(info, items, PaymentMethod::Card).for_customer("cust-1");
    api.create_order(order).await.expect("Error creating order")
}

pub fn sign(body: &str) -> String {
    calculate_hmac(WEBHOOK_SECRET, body.as_bytes()).expect("Could not sign body")
}

/// Posts `body` to the payment webhook and returns the status code and response body. Requests the middleware
/// rejects come back as errors, so their status and message are returned the same way.
pub async fn post_webhook(
    api: OrderFlowApi<SqliteDatabase>,
    body: &str,
    signature: Option<String>,
) -> (StatusCode, String) {
    let hmac = HmacMiddlewareFactory::new(PAYMENT_SIGNATURE_HEADER, Secret::new(WEBHOOK_SECRET.to_string()), true);
    let app = App::new().app_data(web::Data::new(api)).app_data(json_config()).service(
        web::scope("/webhook").wrap(hmac).service(PaymentWebhookRoute::<SqliteDatabase>::new()),
    );
    let service = test::init_service(app).await;
    let mut req =
        TestRequest::post().uri("/webhook/payment").insert_header(ContentType::json()).set_payload(body.to_string());
    if let Some(signature) = signature {
        req = req.insert_header((PAYMENT_SIGNATURE_HEADER, signature));
    }
    debug!("Posting webhook: {body}");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let (_, res) = res.into_parts();
            let status = res.status();
            let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
            (status, body)
        },
        Err(e) => (e.as_response_error().status_code(), e.to_string()),
    }
}
