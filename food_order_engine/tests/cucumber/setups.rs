use chrono::{Duration, Utc};
use cucumber::given;
use food_order_engine::db_types::{DiscountKind, NewCoupon};
use fo_common::Cents;

use crate::cucumber::{order_world::FoodOrderSystem, FoodOrderWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut FoodOrderWorld) {
    let system = FoodOrderSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "a {int}% coupon {word} capped at {int} with a minimum order of {int}")]
async fn percentage_coupon(world: &mut FoodOrderWorld, percent: u32, code: String, cap: i64, minimum: i64) {
    let discount = DiscountKind::percent(percent, Some(Cents::from_units(cap)));
    let now = Utc::now();
    let coupon = NewCoupon::new(code, discount, now - Duration::days(1), now + Duration::days(30))
        .with_min_order_amount(Cents::from_units(minimum));
    world.system().coupons.create_coupon(coupon).await.expect("Error creating coupon");
}
