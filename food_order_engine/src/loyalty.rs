//! Loyalty points arithmetic.
//!
//! Customers earn one point per currency unit spent on delivered orders, multiplied by a tier bonus. 100 points are
//! worth one currency unit when redeemed, and a redemption may cover at most half of an order.
//!
//! The functions here operate on an in-memory [`LoyaltyAccount`]. Persisting the result (with a version
//! compare-and-swap) is the job of the [`crate::LoyaltyManagement`] backend.
use chrono::{DateTime, Utc};
use fo_common::Cents;
use serde::Serialize;
use thiserror::Error;

use crate::db_types::{CustomerId, LoyaltyAccount, LoyaltyTier, LoyaltyTransactionType, NewLoyaltyTransaction};

pub const MIN_REDEMPTION_POINTS: i64 = 100;
/// Points needed for one currency unit of discount.
pub const POINTS_PER_UNIT: i64 = 100;
pub const MAX_REDEMPTION_PERCENT: u32 = 50;
pub const ADMIN_ADJUSTMENT_PREFIX: &str = "[Admin] ";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Invalid points amount: {0}")]
    InvalidAmount(String),
    #[error("Insufficient points. {available} available, but {requested} requested")]
    InsufficientPoints { available: i64, requested: i64 },
    #[error("At least {minimum} points are required for a redemption, but only {points} were offered")]
    BelowMinimumRedemption { points: i64, minimum: i64 },
}

impl LoyaltyTier {
    /// The minimum total points earned to reach this tier.
    pub fn threshold(&self) -> i64 {
        match self {
            LoyaltyTier::Bronze => 0,
            LoyaltyTier::Silver => 2_000,
            LoyaltyTier::Gold => 5_000,
            LoyaltyTier::Platinum => 10_000,
        }
    }

    pub fn for_points_earned(total_points_earned: i64) -> Self {
        match total_points_earned {
            p if p >= 10_000 => LoyaltyTier::Platinum,
            p if p >= 5_000 => LoyaltyTier::Gold,
            p if p >= 2_000 => LoyaltyTier::Silver,
            _ => LoyaltyTier::Bronze,
        }
    }

    /// The earning multiplier, in quarters: 1.0, 1.25, 1.5 and 2.0.
    fn multiplier_quarters(&self) -> i64 {
        match self {
            LoyaltyTier::Bronze => 4,
            LoyaltyTier::Silver => 5,
            LoyaltyTier::Gold => 6,
            LoyaltyTier::Platinum => 8,
        }
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier_quarters() as f64 / 4.0
    }

    pub fn next(&self) -> Option<Self> {
        match self {
            LoyaltyTier::Bronze => Some(LoyaltyTier::Silver),
            LoyaltyTier::Silver => Some(LoyaltyTier::Gold),
            LoyaltyTier::Gold => Some(LoyaltyTier::Platinum),
            LoyaltyTier::Platinum => None,
        }
    }
}

/// Points earned for spending `amount` at the given tier, rounded down.
pub fn points_for_amount(amount: Cents, tier: LoyaltyTier) -> i64 {
    if amount.value() <= 0 {
        return 0;
    }
    // cents / 100 * quarters / 4
    amount.value() * tier.multiplier_quarters() / 400
}

/// The result of pricing a points redemption against an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionQuote {
    /// The points that will actually be spent. Less than requested if the discount was capped.
    pub points: i64,
    pub discount: Cents,
    pub capped: bool,
}

/// A view of an account for customers: balance, tier and progress towards the next tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltyStatus {
    #[serde(flatten)]
    pub account: LoyaltyAccount,
    pub tier: LoyaltyTier,
    pub next_tier: Option<LoyaltyTier>,
    pub points_to_next_tier: Option<i64>,
}

impl From<LoyaltyAccount> for LoyaltyStatus {
    fn from(account: LoyaltyAccount) -> Self {
        let tier = account.tier();
        let next_tier = tier.next();
        let points_to_next_tier = next_tier.map(|t| t.threshold() - account.total_points_earned);
        Self { account, tier, next_tier, points_to_next_tier }
    }
}

impl LoyaltyAccount {
    /// A fresh account with a zero balance.
    pub fn new(customer_id: CustomerId, now: DateTime<Utc>) -> Self {
        Self {
            customer_id,
            points: 0,
            total_points_earned: 0,
            total_points_redeemed: 0,
            last_earned_at: None,
            last_redeemed_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn tier(&self) -> LoyaltyTier {
        LoyaltyTier::for_points_earned(self.total_points_earned)
    }

    /// Credits points for spending `amount`. The multiplier is taken from the tier *before* the credit.
    pub fn accrue(
        &mut self,
        amount: Cents,
        description: &str,
        related_order: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<NewLoyaltyTransaction, LedgerError> {
        let points = points_for_amount(amount, self.tier());
        if points <= 0 {
            return Err(LedgerError::InvalidAmount(format!("{amount} does not earn any points")));
        }
        self.points += points;
        self.total_points_earned += points;
        self.last_earned_at = Some(now);
        self.updated_at = now;
        Ok(self.entry(LoyaltyTransactionType::Earned, points, description.to_string(), related_order, now))
    }

    pub fn redeem(
        &mut self,
        points: i64,
        description: &str,
        related_order: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<NewLoyaltyTransaction, LedgerError> {
        if points <= 0 {
            return Err(LedgerError::InvalidAmount(format!("Cannot redeem {points} points")));
        }
        if points > self.points {
            return Err(LedgerError::InsufficientPoints { available: self.points, requested: points });
        }
        self.points -= points;
        self.total_points_redeemed += points;
        self.last_redeemed_at = Some(now);
        self.updated_at = now;
        Ok(self.entry(LoyaltyTransactionType::Redeemed, -points, description.to_string(), related_order, now))
    }

    /// Applies a manual correction. The balance never drops below zero; the history records the change actually made.
    pub fn adjust(
        &mut self,
        delta: i64,
        description: &str,
        now: DateTime<Utc>,
    ) -> Result<NewLoyaltyTransaction, LedgerError> {
        if delta == 0 {
            return Err(LedgerError::InvalidAmount("An adjustment of zero points has no effect".into()));
        }
        let applied = if delta > 0 {
            self.total_points_earned += delta;
            delta
        } else {
            let removed = delta.abs().min(self.points);
            self.total_points_redeemed += removed;
            -removed
        };
        self.points += applied;
        self.updated_at = now;
        let description = format!("{ADMIN_ADJUSTMENT_PREFIX}{description}");
        Ok(self.entry(LoyaltyTransactionType::Adjusted, applied, description, None, now))
    }

    /// Prices a redemption of `points`, capping the discount at half of `order_amount` when it is given.
    pub fn quote_redemption(&self, points: i64, order_amount: Option<Cents>) -> Result<RedemptionQuote, LedgerError> {
        if points > self.points {
            return Err(LedgerError::InsufficientPoints { available: self.points, requested: points });
        }
        if points < MIN_REDEMPTION_POINTS {
            return Err(LedgerError::BelowMinimumRedemption { points, minimum: MIN_REDEMPTION_POINTS });
        }
        let discount = Cents::from(points * 100 / POINTS_PER_UNIT);
        match order_amount.map(|a| a.percentage(MAX_REDEMPTION_PERCENT)) {
            Some(cap) if discount > cap => {
                let points = cap.value() * POINTS_PER_UNIT / 100;
                Ok(RedemptionQuote { points, discount: cap, capped: true })
            },
            _ => Ok(RedemptionQuote { points, discount, capped: false }),
        }
    }

    fn entry(
        &self,
        transaction_type: LoyaltyTransactionType,
        points: i64,
        description: String,
        related_order: Option<i64>,
        now: DateTime<Utc>,
    ) -> NewLoyaltyTransaction {
        NewLoyaltyTransaction {
            transaction_type,
            points,
            balance_after: self.points,
            description,
            related_order,
            created_at: now,
        }
    }
}
