use std::str::FromStr;

use chrono::Duration;
use cucumber::{then, when};
use food_order_engine::{
    db_types::{CustomerId, CustomerInfo, LineItem, NewOrder, OrderStatusType, PaymentMethod},
    order_lifecycle::DELIVERY_ESTIMATE_MINUTES,
};
use fo_common::Cents;

use crate::cucumber::FoodOrderWorld;

const KITCHEN_PIPELINE: [OrderStatusType; 5] = [
    OrderStatusType::Confirmed,
    OrderStatusType::Preparing,
    OrderStatusType::Ready,
    OrderStatusType::OutForDelivery,
    OrderStatusType::Delivered,
];

fn parse_amount(amount: &str) -> Cents {
    Cents::from_str(amount).unwrap_or_else(|e| panic!("{amount} is not a valid amount. {e}"))
}

fn parse_status(status: &str) -> OrderStatusType {
    OrderStatusType::from_str(status).unwrap_or_else(|e| panic!("{status} is not an order status. {e}"))
}

fn order_for(customer: &str, amount: &str) -> NewOrder {
    let info = CustomerInfo::new("Ada Obi", "ada@example.com", "+2348000000000", "12 Marina Road", "Lagos");
    let items = vec![LineItem::new("platter-1", "Party platter", parse_amount(amount), 1).with_category("mains")];
    NewOrder::new(info, items, PaymentMethod::Card).for_customer(customer)
}

async fn place(world: &mut FoodOrderWorld, name: String, order: NewOrder) {
    let order = world.system().orders.create_order(order).await.expect("Error placing order");
    world.orders.insert(name, order);
}

#[when(expr = "customer '{word}' places order {word} for {word}")]
async fn place_order(world: &mut FoodOrderWorld, customer: String, name: String, amount: String) {
    place(world, name, order_for(&customer, &amount)).await;
}

#[when(expr = "customer '{word}' places order {word} for {word} with coupon {word}")]
async fn place_order_with_coupon(world: &mut FoodOrderWorld, customer: String, name: String, amount: String, code: String) {
    place(world, name, order_for(&customer, &amount).with_coupon(code)).await;
}

async fn move_order(world: &mut FoodOrderWorld, name: &str, target: OrderStatusType) {
    let id = world.order(name).id;
    match world.system().orders.transition_order(id, target, None, None).await {
        Ok(order) => {
            world.orders.insert(name.to_string(), order);
            world.last_error = None;
        },
        Err(e) => world.last_error = Some(e),
    }
}

#[when(expr = "order {word} moves to {word}")]
async fn transition(world: &mut FoodOrderWorld, name: String, status: String) {
    move_order(world, &name, parse_status(&status)).await;
}

#[when(expr = "order {word} moves through the kitchen to {word}")]
async fn transition_through_kitchen(world: &mut FoodOrderWorld, name: String, status: String) {
    let target = parse_status(&status);
    let current = world.order(&name).status();
    let start = KITCHEN_PIPELINE.iter().position(|s| *s == current).map(|p| p + 1).unwrap_or(0);
    for step in &KITCHEN_PIPELINE[start..] {
        move_order(world, &name, *step).await;
        if let Some(e) = &world.last_error {
            panic!("Order {name} could not move to {step}. {e}");
        }
        if *step == target {
            return;
        }
    }
    panic!("{target} is not a kitchen stage after {current}");
}

#[when(expr = "order {word} is cancelled")]
async fn cancel(world: &mut FoodOrderWorld, name: String) {
    let id = world.order(&name).id;
    match world.system().orders.cancel_order(id, None, Some("Customer called".into())).await {
        Ok(order) => {
            world.orders.insert(name, order);
            world.last_error = None;
        },
        Err(e) => world.last_error = Some(e),
    }
}

#[then(expr = "the request fails with {word}")]
async fn request_fails(world: &mut FoodOrderWorld, kind: String) {
    let err = world.last_error.as_ref().expect("The last request succeeded");
    assert_eq!(err.kind(), kind, "Unexpected error: {err}");
}

#[then(expr = "order {word} is {word}")]
async fn check_status(world: &mut FoodOrderWorld, name: String, status: String) {
    let id = world.order(&name).id;
    let order = world.system().orders.fetch_order(id).await.expect("Error fetching order").expect("Order has vanished");
    assert_eq!(order.status(), parse_status(&status));
}

#[then(expr = "order {word} has {int} history entries")]
async fn check_history(world: &mut FoodOrderWorld, name: String, count: usize) {
    let id = world.order(&name).id;
    let history = world.system().orders.status_history(id).await.expect("Error fetching history");
    assert_eq!(history.len(), count);
}

#[then(expr = "order {word} is expected 30 minutes after it left the kitchen")]
async fn check_estimated_delivery(world: &mut FoodOrderWorld, name: String) {
    let order = world.order(&name);
    let left = order.timestamps().out_for_delivery_at.expect("Order has not left the kitchen");
    assert_eq!(order.estimated_delivery_time(), Some(left + Duration::minutes(DELIVERY_ESTIMATE_MINUTES)));
}

#[then(expr = "order {word} was delivered when it was marked delivered")]
async fn check_actual_delivery(world: &mut FoodOrderWorld, name: String) {
    let order = world.order(&name);
    assert!(order.actual_delivery_time().is_some());
    assert_eq!(order.actual_delivery_time(), order.timestamps().delivered_at);
}

#[then(expr = "customer '{word}' has {int} loyalty points")]
async fn check_points(world: &mut FoodOrderWorld, customer: String, points: i64) {
    let customer = CustomerId::from(customer);
    let account = world.system().loyalty.account(&customer).await.expect("Error fetching loyalty account");
    assert_eq!(account.map(|a| a.points).unwrap_or_default(), points);
}

#[then(expr = "order {word} has a discount of {word} and a total of {word}")]
async fn check_totals(world: &mut FoodOrderWorld, name: String, discount: String, total: String) {
    let order = world.order(&name);
    assert_eq!(order.discount, parse_amount(&discount));
    assert_eq!(order.total_amount, parse_amount(&total));
}
