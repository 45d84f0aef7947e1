use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use food_order_engine::{
    db_types::*,
    events::EventProducers,
    helpers::FixedClock,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    CouponApi,
    CouponError,
    OrderFlowApi,
    OrderFlowError,
    OrderManagement,
    SqliteDatabase,
    StoreError,
};
use fo_common::Cents;
use futures_util::future::join_all;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

async fn setup() -> (CouponApi<SqliteDatabase>, OrderFlowApi<SqliteDatabase>, FixedClock) {
    let (_, coupons, orders, clock) = setup_with_db().await;
    (coupons, orders, clock)
}

async fn setup_with_db() -> (SqliteDatabase, CouponApi<SqliteDatabase>, OrderFlowApi<SqliteDatabase>, FixedClock) {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    let clock = FixedClock::new(start());
    let coupons = CouponApi::new(db.clone()).with_clock(Arc::new(clock.clone()));
    let orders = OrderFlowApi::new(db.clone(), EventProducers::default()).with_clock(Arc::new(clock.clone()));
    (db, coupons, orders, clock)
}

fn save20() -> NewCoupon {
    let discount = DiscountKind::percent(20, Some(Cents::from_units(15)));
    NewCoupon::new("save20", discount, start() - Duration::days(1), start() + Duration::days(30))
        .with_min_order_amount(Cents::from_units(50))
}

fn basket(amount_units: i64, category: &str) -> Vec<LineItem> {
    vec![LineItem::new("item-1", "Suya platter", Cents::from_units(amount_units), 1).with_category(category)]
}

fn order_with(items: Vec<LineItem>, customer: Option<&str>, coupon: &str) -> NewOrder {
    let info = CustomerInfo::new("Ada Obi", "ada@example.com", "+2348000000000", "12 Marina Road", "Lagos");
    let mut order = NewOrder::new(info, items, PaymentMethod::Card).with_coupon(coupon);
    order.customer_id = customer.map(CustomerId::from);
    order
}

#[tokio::test]
async fn codes_are_stored_in_upper_case() {
    let (coupons, _, _) = setup().await;
    let coupon = coupons.create_coupon(save20()).await.expect("Error creating coupon");
    assert_eq!(coupon.code, "SAVE20");
    assert!(coupon.is_active);
    assert_eq!(coupon.usage_count(), 0);
    let fetched = coupons.fetch_coupon("Save20").await.unwrap().expect("Coupon should be found by any case");
    assert_eq!(fetched, coupon);
    let err = coupons.create_coupon(save20()).await.unwrap_err();
    assert_eq!(err.kind(), "InvalidCoupon");
}

#[tokio::test]
async fn bad_coupon_definitions_are_rejected() {
    let (coupons, _, _) = setup().await;
    let mut coupon = save20();
    coupon.discount = DiscountKind::percent(120, None);
    assert!(matches!(coupons.create_coupon(coupon).await, Err(CouponError::InvalidCoupon(_))));
    let mut coupon = save20();
    coupon.valid_until = coupon.valid_from - Duration::days(1);
    assert!(matches!(coupons.create_coupon(coupon).await, Err(CouponError::InvalidCoupon(_))));
    let mut coupon = save20();
    coupon.discount = DiscountKind::Fixed { amount: Cents::zero() };
    assert!(matches!(coupons.create_coupon(coupon).await, Err(CouponError::InvalidCoupon(_))));
    assert!(coupons.list_coupons(false).await.unwrap().is_empty());
}

#[tokio::test]
async fn save20_is_capped_at_fifteen() {
    let (coupons, orders, _) = setup().await;
    coupons.create_coupon(save20()).await.unwrap();
    let check = coupons.validate_coupon("SAVE20", Cents::from_units(80), &basket(80, "mains"), None).await.unwrap();
    assert_eq!(check.discount, Cents::from_units(15));
    let order = orders.create_order(order_with(basket(80, "mains"), Some("cust-1"), "save20")).await.unwrap();
    assert_eq!(order.subtotal, Cents::from_units(80));
    assert_eq!(order.discount, Cents::from_units(15));
    assert_eq!(order.total_amount, Cents::from_units(65));
    assert_eq!(order.coupon_code.as_deref(), Some("SAVE20"));
    let coupon = coupons.fetch_coupon("SAVE20").await.unwrap().unwrap();
    assert_eq!(coupon.usage_count(), 1);
    let usage = &coupon.usage_history[0];
    assert_eq!(usage.order_id, order.id);
    assert_eq!(usage.discount, Cents::from_units(15));
    assert_eq!(usage.customer_id, Some(CustomerId::from("cust-1")));
}

#[tokio::test]
async fn small_orders_do_not_qualify() {
    let (coupons, orders, _) = setup().await;
    coupons.create_coupon(save20()).await.unwrap();
    let err = orders.create_order(order_with(basket(40, "mains"), Some("cust-1"), "SAVE20")).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Coupon(CouponError::CouponNotEligible(_))));
    assert_eq!(err.kind(), "CouponNotEligible");
    // Nothing was stored
    assert_eq!(coupons.fetch_coupon("SAVE20").await.unwrap().unwrap().usage_count(), 0);
}

#[tokio::test]
async fn fractional_percentage_coupons_are_stored_exactly() {
    let (coupons, orders, _) = setup().await;
    let discount = DiscountKind::Percentage { basis_points: 1250, max_discount: None };
    let coupon = NewCoupon::new("EIGHTH", discount, start() - Duration::days(1), start() + Duration::days(30));
    coupons.create_coupon(coupon).await.unwrap();
    let stored = coupons.fetch_coupon("EIGHTH").await.unwrap().unwrap();
    assert_eq!(stored.discount, discount);
    let order = orders.create_order(order_with(basket(80, "mains"), None, "EIGHTH")).await.unwrap();
    assert_eq!(order.discount, Cents::from(1_000));
    assert_eq!(order.total_amount, Cents::from_units(70));
}

#[tokio::test]
async fn unknown_and_inactive_coupons() {
    let (coupons, orders, _) = setup().await;
    let err = orders.create_order(order_with(basket(80, "mains"), None, "NOPE")).await.unwrap_err();
    assert_eq!(err.kind(), "CouponNotFound");
    coupons.create_coupon(save20()).await.unwrap();
    let coupon = coupons.deactivate_coupon("save20").await.unwrap();
    assert!(!coupon.is_active);
    assert_eq!(coupons.list_coupons(true).await.unwrap().len(), 0);
    assert_eq!(coupons.list_coupons(false).await.unwrap().len(), 1);
    let err = coupons.validate_coupon("SAVE20", Cents::from_units(80), &basket(80, "mains"), None).await.unwrap_err();
    assert!(matches!(err, CouponError::CouponInvalid(_)));
    coupons.activate_coupon("SAVE20").await.unwrap();
    assert!(coupons.validate_coupon("SAVE20", Cents::from_units(80), &basket(80, "mains"), None).await.is_ok());
}

#[tokio::test]
async fn expired_coupons_are_invalid() {
    let (coupons, _, clock) = setup().await;
    coupons.create_coupon(save20()).await.unwrap();
    clock.advance(Duration::days(31));
    let err = coupons.validate_coupon("SAVE20", Cents::from_units(80), &basket(80, "mains"), None).await.unwrap_err();
    assert_eq!(err.to_string(), "Coupon is not valid. Coupon has expired");
}

#[tokio::test]
async fn usage_limits_are_enforced() {
    let (coupons, orders, _) = setup().await;
    coupons.create_coupon(save20().with_usage_limit(2).with_usage_limit_per_user(1)).await.unwrap();
    orders.create_order(order_with(basket(80, "mains"), Some("cust-1"), "SAVE20")).await.unwrap();
    let err = orders.create_order(order_with(basket(80, "mains"), Some("cust-1"), "SAVE20")).await.unwrap_err();
    assert_eq!(err.kind(), "CouponNotEligible");
    orders.create_order(order_with(basket(80, "mains"), Some("cust-2"), "SAVE20")).await.unwrap();
    let err = orders.create_order(order_with(basket(80, "mains"), Some("cust-3"), "SAVE20")).await.unwrap_err();
    assert_eq!(err.kind(), "CouponInvalid");
    assert_eq!(coupons.fetch_coupon("SAVE20").await.unwrap().unwrap().usage_count(), 2);
}

#[tokio::test]
async fn first_order_coupons() {
    let (coupons, orders, _) = setup().await;
    let welcome = NewCoupon::new(
        "WELCOME",
        DiscountKind::Fixed { amount: Cents::from_units(10) },
        start() - Duration::days(1),
        start() + Duration::days(30),
    )
    .first_order_only();
    coupons.create_coupon(welcome).await.unwrap();
    let err = coupons.validate_coupon("WELCOME", Cents::from_units(80), &basket(80, "mains"), None).await.unwrap_err();
    assert_eq!(err.to_string(), "Coupon cannot be used. Please sign in to use this coupon");
    let customer = CustomerId::from("cust-1");
    let check =
        coupons.validate_coupon("WELCOME", Cents::from_units(80), &basket(80, "mains"), Some(&customer)).await.unwrap();
    assert_eq!(check.discount, Cents::from_units(10));
    let order = orders.create_order(order_with(basket(80, "mains"), Some("cust-1"), "")).await.unwrap();
    assert!(order.coupon_code.is_none());
    let err = coupons.validate_coupon("WELCOME", Cents::from_units(80), &basket(80, "mains"), Some(&customer)).await;
    assert!(matches!(err, Err(CouponError::CouponNotEligible(_))));
}

#[tokio::test]
async fn category_restrictions() {
    let (coupons, _, _) = setup().await;
    let drinks = NewCoupon::new(
        "DRINKS",
        DiscountKind::Fixed { amount: Cents::from_units(10) },
        start() - Duration::days(1),
        start() + Duration::days(30),
    )
    .with_applicable_categories(&["Drinks"]);
    coupons.create_coupon(drinks).await.unwrap();
    let mut items = basket(70, "mains");
    items.push(LineItem::new("drink-1", "Chapman", Cents::from_units(5), 1).with_category("drinks"));
    let check = coupons.validate_coupon("DRINKS", Cents::from_units(75), &items, None).await.unwrap();
    // A fixed discount of 10 on an eligible base of 5 gives 5
    assert_eq!(check.discount, Cents::from_units(5));
    let err = coupons.validate_coupon("DRINKS", Cents::from_units(70), &basket(70, "mains"), None).await.unwrap_err();
    assert_eq!(err.to_string(), "Coupon cannot be used. No eligible items for this coupon");
}

#[tokio::test]
async fn used_coupons_cannot_be_deleted() {
    let (coupons, orders, _) = setup().await;
    coupons.create_coupon(save20()).await.unwrap();
    let unused = NewCoupon::new(
        "UNUSED",
        DiscountKind::Fixed { amount: Cents::from_units(1) },
        start(),
        start() + Duration::days(1),
    );
    coupons.create_coupon(unused).await.unwrap();
    orders.create_order(order_with(basket(80, "mains"), None, "SAVE20")).await.unwrap();
    let err = coupons.delete_coupon("SAVE20").await.unwrap_err();
    assert!(matches!(err, CouponError::CouponInUse(_)));
    coupons.delete_coupon("unused").await.unwrap();
    assert!(coupons.fetch_coupon("UNUSED").await.unwrap().is_none());
    let err = coupons.delete_coupon("UNUSED").await.unwrap_err();
    assert_eq!(err.kind(), "CouponNotFound");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_orders_respect_the_per_customer_limit() {
    let (coupons, orders, _) = setup().await;
    coupons.create_coupon(save20().with_usage_limit_per_user(1)).await.unwrap();
    // Every order passes the checkout check before any of them has recorded a usage
    let results =
        join_all((0..5).map(|_| orders.create_order(order_with(basket(80, "mains"), Some("alice"), "SAVE20")))).await;
    let (placed, refused): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    assert_eq!(placed.len(), 1);
    for err in refused.into_iter().filter_map(Result::err) {
        assert_eq!(err.kind(), "CouponNotEligible", "Unexpected error: {err}");
    }
    let coupon = coupons.fetch_coupon("SAVE20").await.unwrap().unwrap();
    assert_eq!(coupon.usage_count_for(&CustomerId::from("alice")), 1);
    assert_eq!(coupon.usage_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_orders_respect_the_total_limit() {
    let (coupons, orders, _) = setup().await;
    coupons.create_coupon(save20().with_usage_limit(2)).await.unwrap();
    let orders = &orders;
    let results = join_all((0..5).map(|i| {
        let customer = format!("cust-{i}");
        async move { orders.create_order(order_with(basket(80, "mains"), Some(customer.as_str()), "SAVE20")).await }
    }))
    .await;
    let (placed, refused): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    assert_eq!(placed.len(), 2);
    for err in refused.into_iter().filter_map(Result::err) {
        assert_eq!(err.kind(), "CouponInvalid", "Unexpected error: {err}");
    }
    assert_eq!(coupons.fetch_coupon("SAVE20").await.unwrap().unwrap().usage_count(), 2);
}

fn draft_with(coupon: &Coupon, customer: Option<&str>, placed_at: DateTime<Utc>) -> OrderDraft {
    let info = CustomerInfo::new("Ada Obi", "ada@example.com", "+2348000000000", "12 Marina Road", "Lagos");
    OrderDraft {
        customer_id: customer.map(CustomerId::from),
        customer_info: info,
        items: basket(80, "mains"),
        payment_method: PaymentMethod::Card,
        subtotal: Cents::from_units(80),
        discount: Cents::from_units(15),
        total_amount: Cents::from_units(65),
        coupon: Some(AppliedCoupon { coupon_id: coupon.id, code: coupon.code.clone(), discount: Cents::from_units(15) }),
        placed_at,
    }
}

#[tokio::test]
async fn coupon_state_is_rechecked_when_the_order_is_stored() {
    let (db, coupons, _, _) = setup_with_db().await;
    let coupon = coupons.create_coupon(save20().with_usage_limit_per_user(1)).await.unwrap();
    // The checkout check passed against a stale snapshot; the store must still refuse these
    db.insert_order(draft_with(&coupon, Some("alice"), start())).await.unwrap();
    let err = db.insert_order(draft_with(&coupon, Some("alice"), start())).await.unwrap_err();
    assert!(matches!(err, StoreError::CouponCustomerLimitReached(ref code) if code == "SAVE20"), "{err}");
    // Guests are not subject to the per-customer limit
    db.insert_order(draft_with(&coupon, None, start())).await.unwrap();

    let err = db.insert_order(draft_with(&coupon, Some("bob"), start() + Duration::days(31))).await.unwrap_err();
    assert!(matches!(err, StoreError::CouponUnavailable(_)), "{err}");

    coupons.deactivate_coupon("SAVE20").await.unwrap();
    let err = db.insert_order(draft_with(&coupon, Some("bob"), start())).await.unwrap_err();
    assert!(matches!(err, StoreError::CouponUnavailable(_)), "{err}");

    // Refused inserts are rolled back in full
    let coupon = coupons.fetch_coupon("SAVE20").await.unwrap().unwrap();
    assert_eq!(coupon.usage_count(), 2);
    assert_eq!(coupon.usage_count_for(&CustomerId::from("bob")), 0);
}
