use std::sync::Arc;

use chrono::{TimeZone, Utc};
use food_order_engine::{
    db_types::*,
    helpers::FixedClock,
    loyalty::RedemptionQuote,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    LoyaltyApi,
    LoyaltyError,
    LoyaltyManagement,
    SqliteDatabase,
    StoreError,
};
use fo_common::Cents;

async fn setup() -> (LoyaltyApi<SqliteDatabase>, SqliteDatabase) {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
    let api = LoyaltyApi::new(db.clone()).with_clock(Arc::new(clock));
    (api, db)
}

fn customer() -> CustomerId {
    CustomerId::from("cust-1")
}

#[tokio::test]
async fn new_customers_start_at_bronze_with_nothing() {
    let (api, _) = setup().await;
    assert!(api.account(&customer()).await.unwrap().is_none());
    let status = api.status(&customer()).await.unwrap();
    assert_eq!(status.account.points, 0);
    assert_eq!(status.tier, LoyaltyTier::Bronze);
    assert_eq!(status.next_tier, Some(LoyaltyTier::Silver));
    assert_eq!(status.points_to_next_tier, Some(2000));
    assert!(api.account(&customer()).await.unwrap().is_some());
    assert!(api.history(&customer()).await.unwrap().is_empty());
}

#[tokio::test]
async fn earning_and_spending() {
    let (api, _) = setup().await;
    let earned = api.accrue_points(&customer(), Cents::from_units(250), "Birthday treat", None).await.unwrap();
    assert_eq!(earned.points, 250);
    assert_eq!(earned.balance_after, 250);
    assert_eq!(earned.transaction_type, LoyaltyTransactionType::Earned);
    let spent = api.redeem_points(&customer(), 200, "Discount on order", Some(7)).await.unwrap();
    assert_eq!(spent.points, -200);
    assert_eq!(spent.balance_after, 50);
    assert_eq!(spent.related_order, Some(7));
    let account = api.account(&customer()).await.unwrap().unwrap();
    assert_eq!(account.points, 50);
    assert_eq!(account.total_points_earned, 250);
    assert_eq!(account.total_points_redeemed, 200);
    assert!(account.last_earned_at.is_some());
    assert!(account.last_redeemed_at.is_some());
    let history = api.history(&customer()).await.unwrap();
    assert_eq!(history.len(), 2);
    // Newest first
    assert_eq!(history[0].transaction_type, LoyaltyTransactionType::Redeemed);
}

#[tokio::test]
async fn overspending_is_rejected() {
    let (api, _) = setup().await;
    api.accrue_points(&customer(), Cents::from_units(100), "Order", None).await.unwrap();
    let err = api.redeem_points(&customer(), 101, "Too much", None).await.unwrap_err();
    assert!(matches!(err, LoyaltyError::InsufficientPoints { available: 100, requested: 101 }));
    let err = api.redeem_points(&customer(), 0, "Nothing", None).await.unwrap_err();
    assert_eq!(err.kind(), "InvalidAmount");
    let err = api.accrue_points(&customer(), Cents::from(50), "Half a unit", None).await.unwrap_err();
    assert_eq!(err.kind(), "InvalidAmount");
    assert_eq!(api.account(&customer()).await.unwrap().unwrap().points, 100);
    assert_eq!(api.history(&customer()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn tier_multipliers_apply_before_the_credit() {
    let (api, _) = setup().await;
    api.adjust_points(&customer(), 1999, "Migration").await.unwrap();
    let status = api.status(&customer()).await.unwrap();
    assert_eq!(status.tier, LoyaltyTier::Bronze);
    // Still bronze when this accrual is priced
    let earned = api.accrue_points(&customer(), Cents::from_units(100), "Order", None).await.unwrap();
    assert_eq!(earned.points, 100);
    let status = api.status(&customer()).await.unwrap();
    assert_eq!(status.tier, LoyaltyTier::Silver);
    let earned = api.accrue_points(&customer(), Cents::from_units(100), "Order", None).await.unwrap();
    assert_eq!(earned.points, 125);
}

#[tokio::test]
async fn redemption_quotes() {
    let (api, _) = setup().await;
    api.accrue_points(&customer(), Cents::from_units(5000), "Big party order", None).await.unwrap();
    let err = api.calculate_discount_for_redemption(&customer(), 99, None).await.unwrap_err();
    assert!(matches!(err, LoyaltyError::BelowMinimumRedemption { points: 99, minimum: 100 }));
    let quote = api.calculate_discount_for_redemption(&customer(), 1000, None).await.unwrap();
    assert_eq!(quote, RedemptionQuote { points: 1000, discount: Cents::from_units(10), capped: false });
    let quote = api.calculate_discount_for_redemption(&customer(), 3000, Some(Cents::from_units(40))).await.unwrap();
    assert_eq!(quote, RedemptionQuote { points: 2000, discount: Cents::from_units(20), capped: true });
    let err = api.calculate_discount_for_redemption(&customer(), 6000, None).await.unwrap_err();
    assert_eq!(err.kind(), "InsufficientPoints");
    // Quotes never spend anything
    assert_eq!(api.account(&customer()).await.unwrap().unwrap().points, 5000);
}

#[tokio::test]
async fn strangers_get_insufficient_points() {
    let (api, _) = setup().await;
    let err = api.calculate_discount_for_redemption(&CustomerId::from("nobody"), 100, None).await.unwrap_err();
    assert!(matches!(err, LoyaltyError::InsufficientPoints { available: 0, requested: 100 }));
}

#[tokio::test]
async fn adjustments_never_go_negative() {
    let (api, _) = setup().await;
    api.accrue_points(&customer(), Cents::from_units(30), "Order", None).await.unwrap();
    let entry = api.adjust_points(&customer(), -50, "Chargeback").await.unwrap();
    assert_eq!(entry.points, -30);
    assert_eq!(entry.balance_after, 0);
    assert_eq!(entry.transaction_type, LoyaltyTransactionType::Adjusted);
    assert_eq!(entry.description, "[Admin] Chargeback");
    let account = api.account(&customer()).await.unwrap().unwrap();
    assert_eq!(account.points, 0);
    assert_eq!(account.total_points_redeemed, 30);
    let err = api.adjust_points(&customer(), 0, "Noop").await.unwrap_err();
    assert_eq!(err.kind(), "InvalidAmount");
}

#[tokio::test]
async fn stale_account_writes_are_refused() {
    let (api, db) = setup().await;
    api.accrue_points(&customer(), Cents::from_units(100), "Order", None).await.unwrap();
    let now = Utc::now();
    let mut first = db.fetch_loyalty_account(&customer()).await.unwrap().unwrap();
    let mut second = first.clone();
    let entry = first.redeem(100, "First", None, now).unwrap();
    db.save_loyalty_update(&first, entry).await.unwrap();
    let entry = second.redeem(100, "Second", None, now).unwrap();
    let err = db.save_loyalty_update(&second, entry).await.unwrap_err();
    assert!(matches!(err, StoreError::ConcurrentModification(_)));
    let account = api.account(&customer()).await.unwrap().unwrap();
    assert_eq!(account.points, 0);
    assert_eq!(account.total_points_redeemed, 100);
    assert_eq!(api.history(&customer()).await.unwrap().len(), 2);
}

#[tokio::test]
async fn concurrent_redemptions_cannot_overspend() {
    let (api, db) = setup().await;
    api.accrue_points(&customer(), Cents::from_units(100), "Order", None).await.unwrap();
    let other = LoyaltyApi::new(db.clone());
    let cust = customer();
    let (a, b) = tokio::join!(
        api.redeem_points(&cust, 100, "Tab one", None),
        other.redeem_points(&cust, 100, "Tab two", None)
    );
    let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(successes, 1);
    let account = db.fetch_loyalty_account(&customer()).await.unwrap().unwrap();
    assert_eq!(account.points, 0);
}
