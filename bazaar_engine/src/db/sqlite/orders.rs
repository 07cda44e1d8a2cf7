use chrono::{DateTime, Utc};
use log::trace;
use sqlx::{types::Json, FromRow, SqliteConnection};

use crate::{
    db_types::{DeliveryRecord, Money, NewOrder, Order, OrderId, OrderItem, OrderStatusType, OwnerKey, SettlementState},
    traits::MarketplaceError,
};

/// The stored shape of an order. Items and the delivery record are kept as JSON snapshots.
#[derive(FromRow)]
struct OrderRow {
    id: i64,
    order_id: OrderId,
    owner_key: OwnerKey,
    items: Json<Vec<OrderItem>>,
    total: Money,
    currency: String,
    status: OrderStatusType,
    payment_reference: String,
    delivery: Option<Json<DeliveryRecord>>,
    courier_id: Option<i64>,
    estimated_delivery_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            owner_key: row.owner_key,
            items: row.items.0,
            total: row.total,
            currency: row.currency,
            status: row.status,
            payment_reference: row.payment_reference,
            delivery: row.delivery.map(|d| d.0),
            courier_id: row.courier_id,
            estimated_delivery_at: row.estimated_delivery_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Inserts a new order in the `pending` state. This is not atomic. Embed the call inside a transaction and pass
/// `&mut *tx` as the connection argument.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, MarketplaceError> {
    let now = Utc::now();
    let row: OrderRow = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                owner_key,
                items,
                total,
                currency,
                status,
                payment_reference,
                delivery,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING *;
        "#,
    )
    .bind(order.order_id)
    .bind(order.owner_key)
    .bind(Json(order.items))
    .bind(order.total)
    .bind(order.currency)
    .bind(OrderStatusType::Pending)
    .bind(order.payment_reference)
    .bind(order.delivery.map(Json))
    .bind(now)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next()
    .ok_or(sqlx::Error::RowNotFound)?;
    Ok(row.into())
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, MarketplaceError> {
    let row: Option<OrderRow> =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id).fetch_optional(conn).await?;
    Ok(row.map(Order::from))
}

pub async fn fetch_order_by_payment_reference(
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, MarketplaceError> {
    let row: Option<OrderRow> = sqlx::query_as("SELECT * FROM orders WHERE payment_reference = $1")
        .bind(reference)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(Order::from))
}

/// Fetches `pending` or `assigned` orders created before `cutoff` whose payment is still open, oldest first.
pub async fn fetch_unpaid_orders_created_before(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, MarketplaceError> {
    let rows: Vec<OrderRow> = sqlx::query_as(
        r#"
            SELECT orders.* FROM orders JOIN payments ON payments.reference = orders.payment_reference
            WHERE payments.state = $1 AND orders.status IN ($2, $3) AND orders.created_at < $4
            ORDER BY orders.created_at ASC
        "#,
    )
    .bind(SettlementState::Initiated)
    .bind(OrderStatusType::Pending)
    .bind(OrderStatusType::Assigned)
    .bind(cutoff)
    .fetch_all(conn)
    .await?;
    trace!("🗃️ {} unpaid orders created before {cutoff}", rows.len());
    Ok(rows.into_iter().map(Order::from).collect())
}

/// Changes the order status, but only if it is currently `from`. Returns the updated order, or `None` if the status
/// had already moved on.
pub async fn update_status_if(
    order_id: &OrderId,
    from: OrderStatusType,
    to: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, MarketplaceError> {
    let row: Option<OrderRow> = sqlx::query_as(
        "UPDATE orders SET status = $1, updated_at = $2 WHERE order_id = $3 AND status = $4 RETURNING *",
    )
    .bind(to)
    .bind(Utc::now())
    .bind(order_id)
    .bind(from)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(row.map(Order::from))
}

/// Attaches a courier to an order and moves it to `assigned`, provided it is still in `from` with no courier.
pub async fn assign(
    order_id: &OrderId,
    from: OrderStatusType,
    courier_id: i64,
    estimated_delivery_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, MarketplaceError> {
    let row: Option<OrderRow> = sqlx::query_as(
        r#"
            UPDATE orders SET status = $1, courier_id = $2, estimated_delivery_at = $3, updated_at = $4
            WHERE order_id = $5 AND status = $6 AND courier_id IS NULL
            RETURNING *
        "#,
    )
    .bind(OrderStatusType::Assigned)
    .bind(courier_id)
    .bind(estimated_delivery_at)
    .bind(Utc::now())
    .bind(order_id)
    .bind(from)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(row.map(Order::from))
}

/// Sets the order status unconditionally. Detaches the courier when `detach_courier` is set.
pub async fn force_status(
    order_id: &OrderId,
    status: OrderStatusType,
    detach_courier: bool,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, MarketplaceError> {
    let sql = if detach_courier {
        "UPDATE orders SET status = $1, courier_id = NULL, estimated_delivery_at = NULL, updated_at = $2 WHERE \
         order_id = $3 RETURNING *"
    } else {
        "UPDATE orders SET status = $1, updated_at = $2 WHERE order_id = $3 RETURNING *"
    };
    let row: Option<OrderRow> =
        sqlx::query_as(sql).bind(status).bind(Utc::now()).bind(order_id).fetch_all(conn).await?.into_iter().next();
    Ok(row.map(Order::from))
}
