use std::{fmt::Debug, sync::Arc};

use fo_common::Cents;
use log::*;

use crate::{
    db_types::{CustomerId, LoyaltyAccount, LoyaltyAccrual, LoyaltyTransaction},
    helpers::{Clock, SystemClock},
    loyalty::{LedgerError, LoyaltyStatus, RedemptionQuote},
    LoyaltyError,
    LoyaltyManagement,
};

/// Log target for accrual failures, so that they can be collected for reconciliation.
pub const ACCRUAL_LOG_TARGET: &str = "loyalty_accrual";

/// `LoyaltyApi` is the public face of the loyalty ledger: balances, history, earning and spending points.
///
/// Every write re-reads the account and saves it with a version check, so two concurrent writers can never both
/// succeed against the same balance. The loser gets [`LoyaltyError::ConcurrentModification`].
pub struct LoyaltyApi<B> {
    db: B,
    clock: Arc<dyn Clock>,
}

impl<B> Debug for LoyaltyApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LoyaltyApi")
    }
}

impl<B> LoyaltyApi<B> {
    pub fn new(db: B) -> Self {
        Self { db, clock: Arc::new(SystemClock) }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl<B> LoyaltyApi<B>
where B: LoyaltyManagement
{
    pub async fn account(&self, customer_id: &CustomerId) -> Result<Option<LoyaltyAccount>, LoyaltyError> {
        let account = self.db.fetch_loyalty_account(customer_id).await?;
        Ok(account)
    }

    /// The customer's balance, tier and progress to the next tier. An empty account is opened if needed.
    pub async fn status(&self, customer_id: &CustomerId) -> Result<LoyaltyStatus, LoyaltyError> {
        let account = self.db.fetch_or_create_loyalty_account(customer_id, self.clock.now()).await?;
        Ok(LoyaltyStatus::from(account))
    }

    /// Newest entries first.
    pub async fn history(&self, customer_id: &CustomerId) -> Result<Vec<LoyaltyTransaction>, LoyaltyError> {
        let history = self.db.fetch_loyalty_history(customer_id).await?;
        Ok(history)
    }

    pub async fn accrue_points(
        &self,
        customer_id: &CustomerId,
        amount: Cents,
        description: &str,
        related_order: Option<i64>,
    ) -> Result<LoyaltyTransaction, LoyaltyError> {
        let now = self.clock.now();
        let mut account = self.db.fetch_or_create_loyalty_account(customer_id, now).await?;
        let entry = account.accrue(amount, description, related_order, now)?;
        let saved = self.db.save_loyalty_update(&account, entry).await?;
        debug!("🎁️ {} points credited to {customer_id}. Balance is now {}", saved.points, saved.balance_after);
        Ok(saved)
    }

    pub async fn redeem_points(
        &self,
        customer_id: &CustomerId,
        points: i64,
        description: &str,
        related_order: Option<i64>,
    ) -> Result<LoyaltyTransaction, LoyaltyError> {
        let now = self.clock.now();
        let mut account = self.db.fetch_or_create_loyalty_account(customer_id, now).await?;
        let entry = account.redeem(points, description, related_order, now)?;
        let saved = self.db.save_loyalty_update(&account, entry).await?;
        debug!("🎁️ {points} points redeemed by {customer_id}. Balance is now {}", saved.balance_after);
        Ok(saved)
    }

    /// Prices a redemption without spending anything.
    pub async fn calculate_discount_for_redemption(
        &self,
        customer_id: &CustomerId,
        points: i64,
        order_amount: Option<Cents>,
    ) -> Result<RedemptionQuote, LoyaltyError> {
        let account = match self.db.fetch_loyalty_account(customer_id).await? {
            Some(account) => account,
            None => LoyaltyAccount::new(customer_id.clone(), self.clock.now()),
        };
        let quote = account.quote_redemption(points, order_amount)?;
        Ok(quote)
    }

    /// Applies an administrator's correction to the balance. The balance is never taken below zero.
    pub async fn adjust_points(
        &self,
        customer_id: &CustomerId,
        delta: i64,
        description: &str,
    ) -> Result<LoyaltyTransaction, LoyaltyError> {
        let now = self.clock.now();
        let mut account = self.db.fetch_or_create_loyalty_account(customer_id, now).await?;
        let entry = account.adjust(delta, description, now)?;
        let saved = self.db.save_loyalty_update(&account, entry).await?;
        info!("🎁️ Points for {customer_id} adjusted by {}. Balance is now {}", saved.points, saved.balance_after);
        Ok(saved)
    }

    /// Applies up to `limit` queued accruals from delivered orders. Returns the number applied.
    ///
    /// Failures are logged under the `loyalty_accrual` target and left in the queue for the next run.
    pub async fn process_pending_accruals(&self, limit: u32) -> Result<usize, LoyaltyError> {
        self.process_accruals(None, limit).await
    }

    /// Applies the queued accrual for a single order, if there is one.
    pub async fn process_accruals_for_order(&self, order_id: i64) -> Result<usize, LoyaltyError> {
        self.process_accruals(Some(order_id), 1).await
    }

    async fn process_accruals(&self, order_id: Option<i64>, limit: u32) -> Result<usize, LoyaltyError> {
        let pending = self.db.fetch_pending_accruals(order_id, limit).await?;
        let mut applied = 0;
        for accrual in &pending {
            match self.apply_accrual(accrual).await {
                Ok(true) => applied += 1,
                Ok(false) => {},
                Err(e) => {
                    error!(
                        target: ACCRUAL_LOG_TARGET,
                        "🎁️ Could not credit {} to {} for order {} (attempt {}). {e}",
                        accrual.amount,
                        accrual.customer_id,
                        accrual.order_number,
                        accrual.attempts + 1
                    );
                    if let Err(e) = self.db.record_accrual_failure(accrual.id, &e.to_string()).await {
                        warn!(target: ACCRUAL_LOG_TARGET, "🎁️ Could not record accrual failure #{}. {e}", accrual.id);
                    }
                },
            }
        }
        if !pending.is_empty() {
            debug!("🎁️ {applied} of {} pending loyalty accruals applied", pending.len());
        }
        Ok(applied)
    }

    async fn apply_accrual(&self, accrual: &LoyaltyAccrual) -> Result<bool, LoyaltyError> {
        let now = self.clock.now();
        let mut account = self.db.fetch_or_create_loyalty_account(&accrual.customer_id, now).await?;
        let description = format!("Points earned for order {}", accrual.order_number);
        let entry = match account.accrue(accrual.amount, &description, Some(accrual.order_id), now) {
            Ok(entry) => Some(entry),
            Err(LedgerError::InvalidAmount(_)) => {
                debug!("🎁️ Order {} does not earn any points", accrual.order_number);
                None
            },
            Err(e) => return Err(e.into()),
        };
        let applied = self.db.complete_accrual(accrual, &account, entry, now).await?;
        if applied {
            info!("🎁️ Loyalty points for order {} credited to {}", accrual.order_number, accrual.customer_id);
        }
        Ok(applied)
    }
}
