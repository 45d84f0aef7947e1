use chrono::{DateTime, Utc};

use crate::{
    db_types::{CustomerId, LoyaltyAccount, LoyaltyAccrual, LoyaltyTransaction, NewLoyaltyTransaction},
    db::traits::StoreError,
};

/// The `LoyaltyManagement` trait defines the behaviour for storing loyalty accounts and their history.
///
/// Accounts are guarded by a version counter. Every write checks that the stored version matches the one the caller
/// read, and increments it.
#[allow(async_fn_in_trait)]
pub trait LoyaltyManagement: Clone {
    async fn fetch_loyalty_account(&self, customer_id: &CustomerId) -> Result<Option<LoyaltyAccount>, StoreError>;

    /// Fetches the customer's account, creating an empty one if this is the first time the ledger sees them.
    async fn fetch_or_create_loyalty_account(
        &self,
        customer_id: &CustomerId,
        now: DateTime<Utc>,
    ) -> Result<LoyaltyAccount, StoreError>;

    /// Saves the modified `account` together with its new history entry. `account.version` must be the version that
    /// was read.
    async fn save_loyalty_update(
        &self,
        account: &LoyaltyAccount,
        entry: NewLoyaltyTransaction,
    ) -> Result<LoyaltyTransaction, StoreError>;

    /// The customer's ledger history, newest first.
    async fn fetch_loyalty_history(&self, customer_id: &CustomerId) -> Result<Vec<LoyaltyTransaction>, StoreError>;

    /// Unprocessed outbox entries, oldest first. If `order_id` is given, only that order's entry is returned.
    async fn fetch_pending_accruals(&self, order_id: Option<i64>, limit: u32) -> Result<Vec<LoyaltyAccrual>, StoreError>;

    /// Applies an outbox entry in one transaction: the account update and its history entry (if the accrual earned
    /// anything) are saved and the entry is marked processed.
    ///
    /// Returns `false`, writing nothing, if the entry had already been processed.
    async fn complete_accrual(
        &self,
        accrual: &LoyaltyAccrual,
        account: &LoyaltyAccount,
        entry: Option<NewLoyaltyTransaction>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Records a failed attempt to apply an outbox entry. The entry stays pending.
    async fn record_accrual_failure(&self, accrual_id: i64, error: &str) -> Result<(), StoreError>;
}
