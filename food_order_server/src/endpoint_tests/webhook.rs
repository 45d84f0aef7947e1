use actix_web::http::StatusCode;
use food_order_engine::db_types::{OrderStatusType, PaymentStatus};
use serde_json::{json, Value};

use super::helpers::{order_api, place_card_order, post_webhook, sign};

fn webhook_body(event: &str, reference: &str, amount: i64, status: &str) -> String {
    json!({ "event": event, "data": { "reference": reference, "amount": amount, "status": status } }).to_string()
}

#[actix_web::test]
async fn signed_payment_confirms_order() {
    let _ = env_logger::try_init().ok();
    let api = order_api().await;
    let order = place_card_order(&api).await;
    let body = webhook_body("charge.success", &format!("{}_1718000000", order.order_number), 4500, "success");
    let (status, res) = post_webhook(api.clone(), &body, Some(sign(&body))).await;
    assert_eq!(status, StatusCode::OK);
    let res: Value = serde_json::from_str(&res).unwrap();
    assert_eq!(res["success"], true);
    let stored = api.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Paid);
    assert_eq!(stored.status(), OrderStatusType::Confirmed);
}

#[actix_web::test]
async fn short_payment_is_acknowledged_but_not_applied() {
    let _ = env_logger::try_init().ok();
    let api = order_api().await;
    let order = place_card_order(&api).await;
    let body = webhook_body("charge.success", order.order_number.as_str(), 4000, "success");
    let (status, res) = post_webhook(api.clone(), &body, Some(sign(&body))).await;
    assert_eq!(status, StatusCode::OK);
    let res: Value = serde_json::from_str(&res).unwrap();
    assert_eq!(res["success"], false);
    let stored = api.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Failed);
    assert_eq!(stored.status(), OrderStatusType::Pending);
}

#[actix_web::test]
async fn unknown_order_is_not_found() {
    let _ = env_logger::try_init().ok();
    let api = order_api().await;
    let body = webhook_body("charge.success", "ORD-2024999999", 4500, "success");
    let (status, res) = post_webhook(api, &body, Some(sign(&body))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let res: Value = serde_json::from_str(&res).unwrap();
    assert!(res["error"].as_str().unwrap().contains("ORD-2024999999"));
}

#[actix_web::test]
async fn unsigned_webhook_is_forbidden() {
    let _ = env_logger::try_init().ok();
    let api = order_api().await;
    let order = place_card_order(&api).await;
    let body = webhook_body("charge.success", order.order_number.as_str(), 4500, "success");
    let (status, res) = post_webhook(api.clone(), &body, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(res, "No HMAC signature found.");
    let stored = api.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Pending);
}

#[actix_web::test]
async fn tampered_webhook_is_forbidden() {
    let _ = env_logger::try_init().ok();
    let api = order_api().await;
    let order = place_card_order(&api).await;
    let signed = webhook_body("charge.success", order.order_number.as_str(), 100, "success");
    let sent = webhook_body("charge.success", order.order_number.as_str(), 4500, "success");
    let (status, res) = post_webhook(api.clone(), &sent, Some(sign(&signed))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(res, "Invalid HMAC signature.");
    let stored = api.fetch_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status(), OrderStatusType::Pending);
}

#[actix_web::test]
async fn malformed_payload_is_a_bad_request() {
    let _ = env_logger::try_init().ok();
    let api = order_api().await;
    let body = r#"{"event":"charge.success","data":{"reference":"ORD-2024000001"}}"#;
    let (status, res) = post_webhook(api, body, Some(sign(body))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(res, r#"{"error":"Payload deserialization error"}"#);
}
