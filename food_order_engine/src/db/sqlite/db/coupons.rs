use chrono::{DateTime, Utc};
use log::*;
use sqlx::{FromRow, SqliteConnection};

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{AppliedCoupon, Cents, Coupon, CouponUsage, CustomerId, DiscountKind, NewCoupon},
};

const PERCENTAGE: &str = "percentage";
const FIXED: &str = "fixed";

const APPLICABLE_CATEGORY: &str = "applicable_category";
const EXCLUDED_CATEGORY: &str = "excluded_category";
const ALLOWED_CUSTOMER: &str = "allowed_customer";
const EXCLUDED_CUSTOMER: &str = "excluded_customer";

#[derive(Debug, Clone, FromRow)]
struct CouponRow {
    id: i64,
    code: String,
    description: Option<String>,
    discount_type: String,
    discount_value: i64,
    max_discount: Option<i64>,
    min_order_amount: i64,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
    usage_limit: Option<i64>,
    usage_limit_per_user: Option<i64>,
    first_order_only: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct RuleRow {
    rule: String,
    value: String,
}

#[derive(Debug, Clone, FromRow)]
struct UsageRow {
    customer_id: Option<String>,
    order_id: i64,
    discount: i64,
    used_at: DateTime<Utc>,
}

fn discount_columns(discount: &DiscountKind) -> (&'static str, i64, Option<i64>) {
    match discount {
        DiscountKind::Percentage { basis_points, max_discount } => {
            (PERCENTAGE, i64::from(*basis_points), max_discount.map(|m| m.value()))
        },
        DiscountKind::Fixed { amount } => (FIXED, amount.value(), None),
    }
}

fn to_limit(value: Option<i64>, code: &str) -> Result<Option<u32>, SqliteDatabaseError> {
    value
        .map(|v| u32::try_from(v).map_err(|_| SqliteDatabaseError::CorruptRecord(format!("Coupon {code} limit {v}"))))
        .transpose()
}

async fn hydrate(row: CouponRow, conn: &mut SqliteConnection) -> Result<Coupon, SqliteDatabaseError> {
    let discount = match row.discount_type.as_str() {
        PERCENTAGE => DiscountKind::Percentage {
            basis_points: u32::try_from(row.discount_value).map_err(|_| {
                SqliteDatabaseError::CorruptRecord(format!("Coupon {} has percentage {}", row.code, row.discount_value))
            })?,
            max_discount: row.max_discount.map(Cents::from),
        },
        FIXED => DiscountKind::Fixed { amount: Cents::from(row.discount_value) },
        other => {
            return Err(SqliteDatabaseError::CorruptRecord(format!("Coupon {} has discount type {other}", row.code)))
        },
    };
    let rules = sqlx::query_as::<_, RuleRow>("SELECT rule, value FROM coupon_rules WHERE coupon_id = $1 ORDER BY value")
        .bind(row.id)
        .fetch_all(&mut *conn)
        .await?;
    let values = |rule: &str| rules.iter().filter(|r| r.rule == rule).map(|r| r.value.clone()).collect::<Vec<_>>();
    let usage_history = sqlx::query_as::<_, UsageRow>(
        "SELECT customer_id, order_id, discount, used_at FROM coupon_usages WHERE coupon_id = $1 ORDER BY id ASC",
    )
    .bind(row.id)
    .fetch_all(conn)
    .await?
    .into_iter()
    .map(|u| CouponUsage {
        customer_id: u.customer_id.map(CustomerId),
        order_id: u.order_id,
        discount: Cents::from(u.discount),
        used_at: u.used_at,
    })
    .collect();
    Ok(Coupon {
        id: row.id,
        usage_limit: to_limit(row.usage_limit, &row.code)?,
        usage_limit_per_user: to_limit(row.usage_limit_per_user, &row.code)?,
        code: row.code,
        description: row.description,
        discount,
        min_order_amount: Cents::from(row.min_order_amount),
        valid_from: row.valid_from,
        valid_until: row.valid_until,
        applicable_categories: values(APPLICABLE_CATEGORY),
        excluded_categories: values(EXCLUDED_CATEGORY),
        allowed_customers: values(ALLOWED_CUSTOMER).into_iter().map(CustomerId).collect(),
        excluded_customers: values(EXCLUDED_CUSTOMER).into_iter().map(CustomerId).collect(),
        first_order_only: row.first_order_only,
        is_active: row.is_active,
        usage_history,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

async fn coupon_id_for_code(code: &str, conn: &mut SqliteConnection) -> Result<Option<i64>, SqliteDatabaseError> {
    let id = sqlx::query_scalar("SELECT id FROM coupons WHERE code = $1")
        .bind(code.trim().to_uppercase())
        .fetch_optional(conn)
        .await?;
    Ok(id)
}

/// Inserts a normalised coupon and its rule lists. Embed this call inside a transaction.
pub async fn insert_coupon(
    coupon: NewCoupon,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<i64, SqliteDatabaseError> {
    if coupon_id_for_code(&coupon.code, conn).await?.is_some() {
        return Err(SqliteDatabaseError::DuplicateCouponCode(coupon.code));
    }
    let (discount_type, discount_value, max_discount) = discount_columns(&coupon.discount);
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO coupons (
            code, description, discount_type, discount_value, max_discount, min_order_amount, valid_from, valid_until,
            usage_limit, usage_limit_per_user, first_order_only, is_active, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, TRUE, $12, $13)
        RETURNING id
        "#,
    )
    .bind(&coupon.code)
    .bind(&coupon.description)
    .bind(discount_type)
    .bind(discount_value)
    .bind(max_discount)
    .bind(coupon.min_order_amount.value())
    .bind(coupon.valid_from)
    .bind(coupon.valid_until)
    .bind(coupon.usage_limit.map(i64::from))
    .bind(coupon.usage_limit_per_user.map(i64::from))
    .bind(coupon.first_order_only)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    let customers = |list: &[CustomerId]| list.iter().map(|c| c.to_string()).collect::<Vec<_>>();
    let rules = [
        (APPLICABLE_CATEGORY, coupon.applicable_categories.clone()),
        (EXCLUDED_CATEGORY, coupon.excluded_categories.clone()),
        (ALLOWED_CUSTOMER, customers(&coupon.allowed_customers)),
        (EXCLUDED_CUSTOMER, customers(&coupon.excluded_customers)),
    ];
    for (rule, values) in rules {
        for value in values {
            sqlx::query("INSERT OR IGNORE INTO coupon_rules (coupon_id, rule, value) VALUES ($1, $2, $3)")
                .bind(id)
                .bind(rule)
                .bind(value)
                .execute(&mut *conn)
                .await?;
        }
    }
    debug!("🎟️ Coupon {} created with id {id}", coupon.code);
    Ok(id)
}

pub async fn fetch_coupon_by_code(code: &str, conn: &mut SqliteConnection) -> Result<Option<Coupon>, SqliteDatabaseError> {
    let row = sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons WHERE code = $1")
        .bind(code.trim().to_uppercase())
        .fetch_optional(&mut *conn)
        .await?;
    match row {
        Some(row) => Ok(Some(hydrate(row, conn).await?)),
        None => Ok(None),
    }
}

pub async fn fetch_coupons(active_only: bool, conn: &mut SqliteConnection) -> Result<Vec<Coupon>, SqliteDatabaseError> {
    let rows = sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons WHERE ($1 = FALSE OR is_active = TRUE) ORDER BY id")
        .bind(active_only)
        .fetch_all(&mut *conn)
        .await?;
    let mut coupons = Vec::with_capacity(rows.len());
    for row in rows {
        coupons.push(hydrate(row, conn).await?);
    }
    Ok(coupons)
}

pub async fn set_coupon_active(
    code: &str,
    active: bool,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let result = sqlx::query("UPDATE coupons SET is_active = $1, updated_at = $2 WHERE code = $3")
        .bind(active)
        .bind(now)
        .bind(code.trim().to_uppercase())
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(SqliteDatabaseError::CouponNotFound(code.to_string()));
    }
    Ok(())
}

/// Deletes a coupon that has never been used. Embed this call inside a transaction.
pub async fn delete_coupon(code: &str, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    let id = coupon_id_for_code(code, conn).await?.ok_or_else(|| SqliteDatabaseError::CouponNotFound(code.to_string()))?;
    let uses: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM coupon_usages WHERE coupon_id = $1").bind(id).fetch_one(&mut *conn).await?;
    if uses > 0 {
        return Err(SqliteDatabaseError::CouponInUse(code.to_string()));
    }
    sqlx::query("DELETE FROM coupon_rules WHERE coupon_id = $1").bind(id).execute(&mut *conn).await?;
    sqlx::query("DELETE FROM coupons WHERE id = $1").bind(id).execute(conn).await?;
    debug!("🎟️ Coupon {code} deleted");
    Ok(())
}

#[derive(Debug, Clone, FromRow)]
struct UsageGuardRow {
    is_active: bool,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
    usage_limit: Option<i64>,
    usage_limit_per_user: Option<i64>,
}

/// Records that `coupon` was applied to the order. The coupon's availability and its total and per-customer usage
/// limits are re-read and re-checked here, so this must run inside the order-creation transaction.
pub async fn record_usage(
    coupon: &AppliedCoupon,
    order_id: i64,
    customer_id: Option<&CustomerId>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let guard = sqlx::query_as::<_, UsageGuardRow>(
        "SELECT is_active, valid_from, valid_until, usage_limit, usage_limit_per_user FROM coupons WHERE id = $1",
    )
    .bind(coupon.coupon_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| SqliteDatabaseError::CouponNotFound(coupon.code.clone()))?;
    if !guard.is_active || now < guard.valid_from || now > guard.valid_until {
        warn!("🎟️ Coupon {} became unavailable while order #{order_id} was being placed", coupon.code);
        return Err(SqliteDatabaseError::CouponUnavailable(coupon.code.clone()));
    }
    if let Some(limit) = guard.usage_limit {
        let uses: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM coupon_usages WHERE coupon_id = $1")
            .bind(coupon.coupon_id)
            .fetch_one(&mut *conn)
            .await?;
        if uses >= limit {
            warn!("🎟️ Coupon {} hit its usage limit of {limit} while order #{order_id} was being placed", coupon.code);
            return Err(SqliteDatabaseError::CouponUsageLimitReached(coupon.code.clone()));
        }
    }
    if let (Some(limit), Some(customer)) = (guard.usage_limit_per_user, customer_id) {
        let uses: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM coupon_usages WHERE coupon_id = $1 AND customer_id = $2")
                .bind(coupon.coupon_id)
                .bind(customer.as_str())
                .fetch_one(&mut *conn)
                .await?;
        if uses >= limit {
            warn!(
                "🎟️ Customer {customer} hit the limit of {limit} uses of coupon {} while order #{order_id} was being placed",
                coupon.code
            );
            return Err(SqliteDatabaseError::CouponCustomerLimitReached(coupon.code.clone()));
        }
    }
    sqlx::query("INSERT INTO coupon_usages (coupon_id, customer_id, order_id, discount, used_at) VALUES ($1, $2, $3, $4, $5)")
        .bind(coupon.coupon_id)
        .bind(customer_id.map(|c| c.as_str()))
        .bind(order_id)
        .bind(coupon.discount.value())
        .bind(now)
        .execute(conn)
        .await?;
    trace!("🎟️ Coupon {} applied to order #{order_id}", coupon.code);
    Ok(())
}
