use chrono::{DateTime, Utc};
use log::*;
use sqlx::{FromRow, SqliteConnection};

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{
        Cents,
        CustomerId,
        LoyaltyAccount,
        LoyaltyAccrual,
        LoyaltyTransaction,
        NewLoyaltyTransaction,
    },
};

#[derive(Debug, Clone, FromRow)]
struct AccountRow {
    customer_id: String,
    points: i64,
    total_points_earned: i64,
    total_points_redeemed: i64,
    last_earned_at: Option<DateTime<Utc>>,
    last_redeemed_at: Option<DateTime<Utc>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AccountRow> for LoyaltyAccount {
    fn from(row: AccountRow) -> Self {
        LoyaltyAccount {
            customer_id: CustomerId(row.customer_id),
            points: row.points,
            total_points_earned: row.total_points_earned,
            total_points_redeemed: row.total_points_redeemed,
            last_earned_at: row.last_earned_at,
            last_redeemed_at: row.last_redeemed_at,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct TransactionRow {
    id: i64,
    customer_id: String,
    tx_type: String,
    points: i64,
    balance_after: i64,
    description: String,
    related_order: Option<i64>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for LoyaltyTransaction {
    type Error = SqliteDatabaseError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(LoyaltyTransaction {
            id: row.id,
            customer_id: CustomerId(row.customer_id),
            transaction_type: row.tx_type.parse()?,
            points: row.points,
            balance_after: row.balance_after,
            description: row.description,
            related_order: row.related_order,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
struct AccrualRow {
    id: i64,
    order_id: i64,
    order_number: String,
    customer_id: String,
    amount: i64,
    attempts: i64,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AccrualRow> for LoyaltyAccrual {
    type Error = SqliteDatabaseError;

    fn try_from(row: AccrualRow) -> Result<Self, Self::Error> {
        Ok(LoyaltyAccrual {
            id: row.id,
            order_id: row.order_id,
            order_number: row.order_number.parse()?,
            customer_id: CustomerId(row.customer_id),
            amount: Cents::from(row.amount),
            attempts: row.attempts,
            last_error: row.last_error,
            created_at: row.created_at,
        })
    }
}

pub async fn fetch_account(
    customer_id: &CustomerId,
    conn: &mut SqliteConnection,
) -> Result<Option<LoyaltyAccount>, SqliteDatabaseError> {
    let row = sqlx::query_as::<_, AccountRow>("SELECT * FROM loyalty_accounts WHERE customer_id = $1")
        .bind(customer_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(row.map(LoyaltyAccount::from))
}

/// Creates an empty account for the customer if they don't have one yet, and returns the stored account.
pub async fn fetch_or_create_account(
    customer_id: &CustomerId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<LoyaltyAccount, SqliteDatabaseError> {
    let result = sqlx::query(
        "INSERT INTO loyalty_accounts (customer_id, created_at, updated_at) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
    )
    .bind(customer_id.as_str())
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() > 0 {
        debug!("🎁️ New loyalty account created for customer {customer_id}");
    }
    fetch_account(customer_id, conn).await?.ok_or_else(|| {
        SqliteDatabaseError::CorruptRecord(format!("Loyalty account for {customer_id} vanished after creation"))
    })
}

/// Writes the account's balances, provided the stored version still matches `account.version`. The stored version is
/// incremented.
pub async fn update_account(account: &LoyaltyAccount, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE loyalty_accounts SET
            points = $1,
            total_points_earned = $2,
            total_points_redeemed = $3,
            last_earned_at = $4,
            last_redeemed_at = $5,
            updated_at = $6,
            version = version + 1
        WHERE customer_id = $7 AND version = $8
        "#,
    )
    .bind(account.points)
    .bind(account.total_points_earned)
    .bind(account.total_points_redeemed)
    .bind(account.last_earned_at)
    .bind(account.last_redeemed_at)
    .bind(account.updated_at)
    .bind(account.customer_id.as_str())
    .bind(account.version)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(SqliteDatabaseError::ConcurrentModification(format!(
            "Loyalty account for {} is no longer at version {}",
            account.customer_id, account.version
        )));
    }
    Ok(())
}

pub async fn insert_transaction(
    customer_id: &CustomerId,
    entry: NewLoyaltyTransaction,
    conn: &mut SqliteConnection,
) -> Result<LoyaltyTransaction, SqliteDatabaseError> {
    let row = sqlx::query_as::<_, TransactionRow>(
        r#"
        INSERT INTO loyalty_transactions (customer_id, tx_type, points, balance_after, description, related_order, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(customer_id.as_str())
    .bind(entry.transaction_type.to_string())
    .bind(entry.points)
    .bind(entry.balance_after)
    .bind(entry.description)
    .bind(entry.related_order)
    .bind(entry.created_at)
    .fetch_one(conn)
    .await?;
    LoyaltyTransaction::try_from(row)
}

pub async fn fetch_history(
    customer_id: &CustomerId,
    conn: &mut SqliteConnection,
) -> Result<Vec<LoyaltyTransaction>, SqliteDatabaseError> {
    let rows = sqlx::query_as::<_, TransactionRow>(
        "SELECT * FROM loyalty_transactions WHERE customer_id = $1 ORDER BY created_at DESC, id DESC",
    )
    .bind(customer_id.as_str())
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(LoyaltyTransaction::try_from).collect()
}

/// Adds an accrual to the outbox. There is at most one accrual per order; a second call for the same order is ignored.
pub async fn queue_accrual(
    order_id: i64,
    customer_id: &CustomerId,
    amount: Cents,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    sqlx::query(
        "INSERT INTO loyalty_outbox (order_id, customer_id, amount, created_at) VALUES ($1, $2, $3, $4) ON CONFLICT \
         (order_id) DO NOTHING",
    )
    .bind(order_id)
    .bind(customer_id.as_str())
    .bind(amount.value())
    .bind(now)
    .execute(conn)
    .await?;
    trace!("🎁️ Loyalty accrual of {amount} queued for order #{order_id}");
    Ok(())
}

pub async fn fetch_pending_accruals(
    order_id: Option<i64>,
    limit: u32,
    conn: &mut SqliteConnection,
) -> Result<Vec<LoyaltyAccrual>, SqliteDatabaseError> {
    let rows = sqlx::query_as::<_, AccrualRow>(
        r#"
        SELECT o.id, o.order_id, orders.order_number, o.customer_id, o.amount, o.attempts, o.last_error, o.created_at
        FROM loyalty_outbox o JOIN orders ON orders.id = o.order_id
        WHERE o.processed_at IS NULL AND ($1 IS NULL OR o.order_id = $1)
        ORDER BY o.id ASC
        LIMIT $2
        "#,
    )
    .bind(order_id)
    .bind(i64::from(limit))
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(LoyaltyAccrual::try_from).collect()
}

/// Marks an accrual as processed. Returns `false` if it had already been processed.
pub async fn mark_accrual_processed(
    accrual_id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, SqliteDatabaseError> {
    let result = sqlx::query(
        "UPDATE loyalty_outbox SET processed_at = $1, attempts = attempts + 1 WHERE id = $2 AND processed_at IS NULL",
    )
    .bind(now)
    .bind(accrual_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn record_accrual_failure(
    accrual_id: i64,
    error: &str,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    sqlx::query("UPDATE loyalty_outbox SET attempts = attempts + 1, last_error = $1 WHERE id = $2")
        .bind(error)
        .bind(accrual_id)
        .execute(conn)
        .await?;
    Ok(())
}
