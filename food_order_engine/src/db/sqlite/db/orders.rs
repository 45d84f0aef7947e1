use chrono::{DateTime, Utc};
use log::*;
use sqlx::{FromRow, QueryBuilder, SqliteConnection};

use super::{coupons, loyalty};
use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{
        ActorId,
        Cents,
        CustomerId,
        CustomerInfo,
        LineItem,
        Order,
        OrderDraft,
        OrderNumber,
        OrderParts,
        OrderStatusType,
        PaymentStatus,
        StatusHistoryEntry,
        StatusTimestamps,
    },
    order_lifecycle::{order_placed_entry, TransitionRecord},
    order_objects::OrderQueryFilter,
};

const ORDER_COLUMNS: &str = r#"
    id, order_number, customer_id, customer_name, customer_email, customer_phone, delivery_address, delivery_city,
    postal_code, delivery_instructions, subtotal, discount, coupon_code, total_amount, payment_method, payment_status,
    status, confirmed_at, preparing_at, ready_at, out_for_delivery_at, delivered_at, cancelled_at,
    estimated_delivery_time, actual_delivery_time, created_at, updated_at
"#;

#[derive(Debug, Clone, FromRow)]
struct OrderRow {
    id: i64,
    order_number: String,
    customer_id: Option<String>,
    customer_name: String,
    customer_email: String,
    customer_phone: String,
    delivery_address: String,
    delivery_city: String,
    postal_code: Option<String>,
    delivery_instructions: Option<String>,
    subtotal: i64,
    discount: i64,
    coupon_code: Option<String>,
    total_amount: i64,
    payment_method: String,
    payment_status: String,
    status: String,
    confirmed_at: Option<DateTime<Utc>>,
    preparing_at: Option<DateTime<Utc>>,
    ready_at: Option<DateTime<Utc>>,
    out_for_delivery_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    estimated_delivery_time: Option<DateTime<Utc>>,
    actual_delivery_time: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct ItemRow {
    menu_item_id: String,
    name: String,
    unit_price: i64,
    quantity: i64,
    category: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
struct HistoryRow {
    status: String,
    actor: Option<String>,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ItemRow> for LineItem {
    type Error = SqliteDatabaseError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity)
            .map_err(|_| SqliteDatabaseError::CorruptRecord(format!("Invalid quantity {}", row.quantity)))?;
        Ok(LineItem {
            menu_item_id: row.menu_item_id,
            name: row.name,
            unit_price: Cents::from(row.unit_price),
            quantity,
            category: row.category,
        })
    }
}

impl TryFrom<HistoryRow> for StatusHistoryEntry {
    type Error = SqliteDatabaseError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        Ok(StatusHistoryEntry {
            status: row.status.parse()?,
            timestamp: row.created_at,
            actor: row.actor.map(ActorId),
            note: row.note,
        })
    }
}

/// Takes the next value from the order counter. Since this is a write, calling it first in a transaction also takes
/// the database write lock, serialising concurrent checkouts.
pub async fn next_order_sequence(conn: &mut SqliteConnection) -> Result<i64, SqliteDatabaseError> {
    let seq: i64 =
        sqlx::query_scalar("UPDATE order_counter SET last_value = last_value + 1 WHERE id = 1 RETURNING last_value")
            .fetch_one(conn)
            .await?;
    Ok(seq)
}

/// Inserts a new order, its line items, its seed history entry and its coupon usage. This is not atomic on its own.
/// Embed this call inside a transaction, and pass `&mut *tx` as the connection argument.
///
/// Returns the new order's id.
pub async fn insert_order(draft: OrderDraft, conn: &mut SqliteConnection) -> Result<i64, SqliteDatabaseError> {
    let sequence = next_order_sequence(conn).await?;
    let order_number = OrderNumber::new(draft.placed_at, sequence);
    let info = &draft.customer_info;
    let id: i64 = sqlx::query_scalar(
        r#"
            INSERT INTO orders (
                order_number, customer_id, customer_name, customer_email, customer_phone, delivery_address,
                delivery_city, postal_code, delivery_instructions, subtotal, discount, coupon_code, total_amount,
                payment_method, payment_status, status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING id;
        "#,
    )
    .bind(order_number.as_str())
    .bind(draft.customer_id.as_ref().map(|c| c.as_str()))
    .bind(&info.name)
    .bind(&info.email)
    .bind(&info.phone)
    .bind(&info.address)
    .bind(&info.city)
    .bind(&info.postal_code)
    .bind(&info.delivery_instructions)
    .bind(draft.subtotal.value())
    .bind(draft.discount.value())
    .bind(draft.coupon.as_ref().map(|c| c.code.as_str()))
    .bind(draft.total_amount.value())
    .bind(draft.payment_method.to_string())
    .bind(PaymentStatus::Pending.to_string())
    .bind(OrderStatusType::Pending.to_string())
    .bind(draft.placed_at)
    .bind(draft.placed_at)
    .fetch_one(&mut *conn)
    .await?;
    for (position, item) in draft.items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, position, menu_item_id, name, unit_price, quantity, category)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(id)
        .bind(position as i64)
        .bind(&item.menu_item_id)
        .bind(&item.name)
        .bind(item.unit_price.value())
        .bind(i64::from(item.quantity))
        .bind(&item.category)
        .execute(&mut *conn)
        .await?;
    }
    let actor = draft.customer_id.as_ref().map(|c| ActorId(c.to_string()));
    insert_history_entry(id, &order_placed_entry(draft.placed_at, actor), conn).await?;
    if let Some(coupon) = &draft.coupon {
        coupons::record_usage(coupon, id, draft.customer_id.as_ref(), draft.placed_at, conn).await?;
    }
    debug!("🗃️ Order {order_number} has been saved in the DB with id {id}");
    Ok(id)
}

pub async fn insert_history_entry(
    order_id: i64,
    entry: &StatusHistoryEntry,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    sqlx::query("INSERT INTO order_status_history (order_id, status, actor, note, created_at) VALUES ($1, $2, $3, $4, $5)")
        .bind(order_id)
        .bind(entry.status.to_string())
        .bind(entry.actor.as_ref().map(|a| a.0.as_str()))
        .bind(&entry.note)
        .bind(entry.timestamp)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn fetch_order_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, SqliteDatabaseError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    match row {
        Some(row) => Ok(Some(hydrate(row, conn).await?)),
        None => Ok(None),
    }
}

pub async fn fetch_order_by_number(
    number: &OrderNumber,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1"))
        .bind(number.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    match row {
        Some(row) => Ok(Some(hydrate(row, conn).await?)),
        None => Ok(None),
    }
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `created_at` in ascending order
pub async fn search_orders(
    query: OrderQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, SqliteDatabaseError> {
    let mut builder = QueryBuilder::new(format!("SELECT {ORDER_COLUMNS} FROM orders"));
    if !query.is_empty() {
        builder.push(" WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(customer_id) = query.customer_id {
        where_clause.push("customer_id = ");
        where_clause.push_bind_unseparated(customer_id.0);
    }
    if !query.statuses.is_empty() {
        let statuses = query.statuses.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
        where_clause.push(format!("status IN ({statuses})"));
    }
    if let Some(status) = query.payment_status {
        where_clause.push("payment_status = ");
        where_clause.push_bind_unseparated(status.to_string());
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at ASC, id ASC");
    if let Some(limit) = query.limit {
        builder.push(" LIMIT ");
        builder.push_bind(i64::from(limit));
    }
    trace!("🗃️ Executing query: {}", builder.sql());
    let rows = builder.build_query_as::<OrderRow>().fetch_all(&mut *conn).await?;
    trace!("🗃️ Result of search_orders: {}", rows.len());
    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        orders.push(hydrate(row, conn).await?);
    }
    Ok(orders)
}

pub async fn fetch_status_history(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<StatusHistoryEntry>, SqliteDatabaseError> {
    let rows = sqlx::query_as::<_, HistoryRow>(
        "SELECT status, actor, note, created_at FROM order_status_history WHERE order_id = $1 ORDER BY id ASC",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(StatusHistoryEntry::try_from).collect()
}

async fn fetch_items(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<LineItem>, SqliteDatabaseError> {
    let rows = sqlx::query_as::<_, ItemRow>(
        "SELECT menu_item_id, name, unit_price, quantity, category FROM order_items WHERE order_id = $1 ORDER BY \
         position ASC",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(LineItem::try_from).collect()
}

/// Builds the full order from its row, line items and history, checking the order invariants on the way.
async fn hydrate(row: OrderRow, conn: &mut SqliteConnection) -> Result<Order, SqliteDatabaseError> {
    let items = fetch_items(row.id, conn).await?;
    let status_history = fetch_status_history(row.id, conn).await?;
    let parts = OrderParts {
        id: row.id,
        order_number: row.order_number.parse()?,
        customer_id: row.customer_id.map(CustomerId),
        customer_info: CustomerInfo {
            name: row.customer_name,
            email: row.customer_email,
            phone: row.customer_phone,
            address: row.delivery_address,
            city: row.delivery_city,
            postal_code: row.postal_code,
            delivery_instructions: row.delivery_instructions,
        },
        items,
        subtotal: Cents::from(row.subtotal),
        discount: Cents::from(row.discount),
        coupon_code: row.coupon_code,
        total_amount: Cents::from(row.total_amount),
        payment_method: row.payment_method.parse()?,
        payment_status: row.payment_status.parse()?,
        status: row.status.parse()?,
        status_history,
        timestamps: StatusTimestamps {
            confirmed_at: row.confirmed_at,
            preparing_at: row.preparing_at,
            ready_at: row.ready_at,
            out_for_delivery_at: row.out_for_delivery_at,
            delivered_at: row.delivered_at,
            cancelled_at: row.cancelled_at,
        },
        estimated_delivery_time: row.estimated_delivery_time,
        actual_delivery_time: row.actual_delivery_time,
        created_at: row.created_at,
        updated_at: row.updated_at,
    };
    Order::from_parts(parts).map_err(|e| {
        error!("🗃️ {e}");
        SqliteDatabaseError::CorruptRecord(e.to_string())
    })
}

pub async fn count_orders_for_customer(
    customer_id: &CustomerId,
    conn: &mut SqliteConnection,
) -> Result<u64, SqliteDatabaseError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE customer_id = $1 AND status != $2")
        .bind(customer_id.as_str())
        .bind(OrderStatusType::Cancelled.to_string())
        .fetch_one(conn)
        .await?;
    Ok(count as u64)
}

/// Writes the result of a status transition, provided the stored status and payment status are still what the
/// transition started from. Appends the history entry and, for delivered orders of registered customers, queues the
/// loyalty accrual.
///
/// This is not atomic on its own. Embed it in a transaction.
pub async fn commit_transition(
    order: &Order,
    record: &TransitionRecord,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let ts = order.timestamps();
    let result = sqlx::query(
        r#"
        UPDATE orders SET
            status = $1,
            payment_status = $2,
            confirmed_at = $3,
            preparing_at = $4,
            ready_at = $5,
            out_for_delivery_at = $6,
            delivered_at = $7,
            cancelled_at = $8,
            estimated_delivery_time = $9,
            actual_delivery_time = $10,
            updated_at = $11
        WHERE id = $12 AND status = $13 AND payment_status = $14
        "#,
    )
    .bind(order.status().to_string())
    .bind(order.payment_status.to_string())
    .bind(ts.confirmed_at)
    .bind(ts.preparing_at)
    .bind(ts.ready_at)
    .bind(ts.out_for_delivery_at)
    .bind(ts.delivered_at)
    .bind(ts.cancelled_at)
    .bind(order.estimated_delivery_time())
    .bind(order.actual_delivery_time())
    .bind(order.updated_at)
    .bind(order.id)
    .bind(record.from.to_string())
    .bind(record.payment_status_before.to_string())
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(SqliteDatabaseError::ConcurrentModification(format!(
            "Order {} is no longer {} / payment {}",
            order.order_number, record.from, record.payment_status_before
        )));
    }
    insert_history_entry(order.id, &record.entry, conn).await?;
    if record.to == OrderStatusType::Delivered {
        match &order.customer_id {
            Some(customer_id) => {
                loyalty::queue_accrual(order.id, customer_id, order.total_amount, record.entry.timestamp, conn).await?;
            },
            None => trace!("🗃️ Order {} is a guest order. No loyalty accrual queued", order.order_number),
        }
    }
    Ok(())
}

/// Compare-and-swap on the payment status of an order.
pub async fn update_payment_status(
    order_id: i64,
    expected: PaymentStatus,
    new: PaymentStatus,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let result = sqlx::query("UPDATE orders SET payment_status = $1, updated_at = $2 WHERE id = $3 AND payment_status = $4")
        .bind(new.to_string())
        .bind(now)
        .bind(order_id)
        .bind(expected.to_string())
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        let exists: Option<i64> =
            sqlx::query_scalar("SELECT id FROM orders WHERE id = $1").bind(order_id).fetch_optional(conn).await?;
        return match exists {
            None => Err(SqliteDatabaseError::OrderNotFound(order_id)),
            Some(_) => Err(SqliteDatabaseError::ConcurrentModification(format!(
                "Payment status of order #{order_id} is no longer {expected}"
            ))),
        };
    }
    Ok(())
}
