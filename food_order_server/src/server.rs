use std::time::Duration;

use actix_web::{dev::Server, error::JsonPayloadError, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use food_order_engine::{
    events::{EventHandlers, EventProducers},
    notifications::{BroadcastNotificationSink, NotificationFanout},
    OrderFlowApi,
    SqliteDatabase,
};
use log::*;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    middleware::{HmacMiddlewareFactory, PAYMENT_SIGNATURE_HEADER},
    routes::{health, PaymentWebhookRoute},
    workers::{start_loyalty_worker, start_notification_logger},
};

/// Capacity of the in-process notification channel shared by real-time subscribers and the mail transport.
const NOTIFICATION_CHANNEL_CAPACITY: usize = 1024;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25).await?;
    db.run_migrations().await?;
    let sink = BroadcastNotificationSink::new(NOTIFICATION_CHANNEL_CAPACITY);
    let _logger = start_notification_logger(&sink);
    let fanout = NotificationFanout::new(sink, config.notification_timeout);
    let handlers = EventHandlers::new(config.event_buffer_size, fanout.hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let _loyalty_worker = start_loyalty_worker(db.clone(), config.loyalty_worker_interval);
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), producers.clone());
        let webhook_scope = web::scope("/webhook")
            .wrap(HmacMiddlewareFactory::new(
                PAYMENT_SIGNATURE_HEADER,
                config.payment_webhook_secret.clone(),
                config.webhook_signature_checks,
            ))
            .service(PaymentWebhookRoute::<SqliteDatabase>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("fos::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(json_config())
            .service(health)
            .service(webhook_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Malformed JSON bodies get the same `{"error": ...}` response as every other failure.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err: JsonPayloadError, _req| {
        warn!("💻️ Could not deserialize request body. {err}");
        ServerError::CouldNotDeserializePayload.into()
    })
}
