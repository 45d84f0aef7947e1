//! `SqliteDatabase` is a concrete implementation of a Food Order Engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::db::traits`]
//! module.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate, SqlitePool};

use super::{
    db::{coupons, db_url, loyalty, new_pool, orders},
    SqliteDatabaseError,
};
use crate::{
    db::traits::{CouponManagement, LoyaltyManagement, OrderManagement, StoreError},
    db_types::{
        Coupon,
        CustomerId,
        LoyaltyAccount,
        LoyaltyAccrual,
        LoyaltyTransaction,
        NewCoupon,
        NewLoyaltyTransaction,
        Order,
        OrderDraft,
        OrderNumber,
        PaymentStatus,
        StatusHistoryEntry,
    },
    order_lifecycle::TransitionRecord,
    order_objects::OrderQueryFilter,
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in the `FOS_DATABASE_URL` environment variable.
    pub async fn new(max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes every connection in the pool. Clones of this database share the pool, so they are closed too.
    pub async fn close(&self) {
        self.pool.close().await;
        debug!("🗃️ Database connection pool closed");
    }

    /// Brings the schema up to date. Safe to call on every start-up.
    pub async fn run_migrations(&self) -> Result<(), SqliteDatabaseError> {
        migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, draft: OrderDraft) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;
        let id = orders::insert_order(draft, &mut tx).await?;
        let order = orders::fetch_order_by_id(id, &mut tx).await?.ok_or(StoreError::OrderNotFound(id))?;
        tx.commit().await?;
        Ok(order)
    }

    async fn fetch_order_by_id(&self, id: i64) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_id(id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_number(number, &mut conn).await?;
        Ok(order)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_status_history(&self, order_id: i64) -> Result<Vec<StatusHistoryEntry>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let history = orders::fetch_status_history(order_id, &mut conn).await?;
        Ok(history)
    }

    async fn count_orders_for_customer(&self, customer_id: &CustomerId) -> Result<u64, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let count = orders::count_orders_for_customer(customer_id, &mut conn).await?;
        Ok(count)
    }

    async fn commit_transition(&self, order: &Order, record: &TransitionRecord) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        orders::commit_transition(order, record, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {} moved from {} to {}", order.order_number, record.from, record.to);
        Ok(())
    }

    async fn update_payment_status(
        &self,
        order_id: i64,
        expected: PaymentStatus,
        new: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;
        orders::update_payment_status(order_id, expected, new, now, &mut tx).await?;
        let order = orders::fetch_order_by_id(order_id, &mut tx).await?.ok_or(StoreError::OrderNotFound(order_id))?;
        tx.commit().await?;
        debug!("🗃️ Payment status for order {} changed from {expected} to {new}", order.order_number);
        Ok(order)
    }
}

impl LoyaltyManagement for SqliteDatabase {
    async fn fetch_loyalty_account(&self, customer_id: &CustomerId) -> Result<Option<LoyaltyAccount>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let account = loyalty::fetch_account(customer_id, &mut conn).await?;
        Ok(account)
    }

    async fn fetch_or_create_loyalty_account(
        &self,
        customer_id: &CustomerId,
        now: DateTime<Utc>,
    ) -> Result<LoyaltyAccount, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let account = loyalty::fetch_or_create_account(customer_id, now, &mut conn).await?;
        Ok(account)
    }

    async fn save_loyalty_update(
        &self,
        account: &LoyaltyAccount,
        entry: NewLoyaltyTransaction,
    ) -> Result<LoyaltyTransaction, StoreError> {
        let mut tx = self.pool.begin().await?;
        loyalty::update_account(account, &mut tx).await?;
        let saved = loyalty::insert_transaction(&account.customer_id, entry, &mut tx).await?;
        tx.commit().await?;
        Ok(saved)
    }

    async fn fetch_loyalty_history(&self, customer_id: &CustomerId) -> Result<Vec<LoyaltyTransaction>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let history = loyalty::fetch_history(customer_id, &mut conn).await?;
        Ok(history)
    }

    async fn fetch_pending_accruals(&self, order_id: Option<i64>, limit: u32) -> Result<Vec<LoyaltyAccrual>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let accruals = loyalty::fetch_pending_accruals(order_id, limit, &mut conn).await?;
        Ok(accruals)
    }

    async fn complete_accrual(
        &self,
        accrual: &LoyaltyAccrual,
        account: &LoyaltyAccount,
        entry: Option<NewLoyaltyTransaction>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        if !loyalty::mark_accrual_processed(accrual.id, now, &mut tx).await? {
            debug!("🎁️ Accrual for order {} was already processed", accrual.order_number);
            tx.rollback().await?;
            return Ok(false);
        }
        if let Some(entry) = entry {
            loyalty::update_account(account, &mut tx).await?;
            loyalty::insert_transaction(&account.customer_id, entry, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(true)
    }

    async fn record_accrual_failure(&self, accrual_id: i64, error: &str) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        loyalty::record_accrual_failure(accrual_id, error, &mut conn).await?;
        Ok(())
    }
}

impl CouponManagement for SqliteDatabase {
    async fn insert_coupon(&self, coupon: NewCoupon, now: DateTime<Utc>) -> Result<Coupon, StoreError> {
        let mut tx = self.pool.begin().await?;
        let code = coupon.code.clone();
        coupons::insert_coupon(coupon, now, &mut tx).await?;
        let coupon =
            coupons::fetch_coupon_by_code(&code, &mut tx).await?.ok_or_else(|| StoreError::CouponNotFound(code))?;
        tx.commit().await?;
        Ok(coupon)
    }

    async fn fetch_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let coupon = coupons::fetch_coupon_by_code(code, &mut conn).await?;
        Ok(coupon)
    }

    async fn fetch_coupons(&self, active_only: bool) -> Result<Vec<Coupon>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let coupons = coupons::fetch_coupons(active_only, &mut conn).await?;
        Ok(coupons)
    }

    async fn set_coupon_active(&self, code: &str, active: bool, now: DateTime<Utc>) -> Result<Coupon, StoreError> {
        let mut tx = self.pool.begin().await?;
        coupons::set_coupon_active(code, active, now, &mut tx).await?;
        let coupon = coupons::fetch_coupon_by_code(code, &mut tx)
            .await?
            .ok_or_else(|| StoreError::CouponNotFound(code.to_string()))?;
        tx.commit().await?;
        Ok(coupon)
    }

    async fn delete_coupon(&self, code: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        coupons::delete_coupon(code, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }
}
