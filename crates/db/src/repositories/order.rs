use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use bistro_core::domain::customer::CustomerId;
use bistro_core::domain::menu::MenuItemId;
use bistro_core::domain::order::{
    order_total, NewOrderLine, Order, OrderId, OrderLine, OrderStatus,
};

use super::{decode_err, now_rfc3339, parse_decimal, parse_timestamp, to_u32, RepositoryError};
use crate::DbPool;

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn open(&self, customer_id: CustomerId) -> Result<OrderId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let customer_exists: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM customers WHERE id = ?1)")
                .bind(customer_id.0)
                .fetch_one(&mut *tx)
                .await?;
        if customer_exists == 0 {
            return Err(RepositoryError::NotFound { entity: "customer", id: customer_id.0 });
        }

        let now = now_rfc3339();
        let result = sqlx::query(
            "INSERT INTO orders (customer_id, status, total_amount, created_at, updated_at)
             VALUES (?1, 'pending', '0', ?2, ?2)",
        )
        .bind(customer_id.0)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(OrderId(result.last_insert_rowid()))
    }

    pub async fn add_line(
        &self,
        order_id: OrderId,
        menu_item_id: MenuItemId,
        quantity: u32,
        price_snapshot: Decimal,
    ) -> Result<Decimal, RepositoryError> {
        self.add_lines(order_id, &[NewOrderLine { menu_item_id, quantity, price_snapshot }]).await
    }

    /// Validates every line up front; any failure rolls back the whole batch.
    pub async fn add_lines(
        &self,
        order_id: OrderId,
        lines: &[NewOrderLine],
    ) -> Result<Decimal, RepositoryError> {
        if lines.is_empty() {
            return Err(RepositoryError::Invalid("no order lines to add".to_string()));
        }
        for line in lines {
            if line.quantity == 0 {
                return Err(RepositoryError::Invalid("quantity must be at least 1".to_string()));
            }
            if line.price_snapshot.is_sign_negative() {
                return Err(RepositoryError::Invalid("price cannot be negative".to_string()));
            }
        }

        let mut tx = self.pool.begin().await?;
        ensure_open(&mut *tx, order_id).await?;
        for line in lines {
            write_line(&mut *tx, order_id, line).await?;
        }

        let total = recompute_total(&mut *tx, order_id).await?;
        tx.commit().await?;
        Ok(total)
    }

    pub async fn remove_line(
        &self,
        order_id: OrderId,
        menu_item_id: MenuItemId,
    ) -> Result<Decimal, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        ensure_open(&mut *tx, order_id).await?;

        let removed = sqlx::query("DELETE FROM order_lines WHERE order_id = ?1 AND menu_item_id = ?2")
            .bind(order_id.0)
            .bind(menu_item_id.0)
            .execute(&mut *tx)
            .await?;
        if removed.rows_affected() == 0 {
            return Err(RepositoryError::NotFound { entity: "order line", id: menu_item_id.0 });
        }

        let total = recompute_total(&mut *tx, order_id).await?;
        tx.commit().await?;
        Ok(total)
    }

    pub async fn find(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_order(&mut *conn, id).await
    }

    pub async fn lines(&self, id: OrderId) -> Result<Vec<OrderLine>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_lines(&mut *conn, id).await
    }

    pub async fn set_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let Some(mut order) = load_order(&mut *tx, id).await? else {
            return Err(RepositoryError::NotFound { entity: "order", id: id.0 });
        };

        if order.status == status {
            tx.commit().await?;
            return Ok(order);
        }
        order.transition_to(status)?;

        sqlx::query("UPDATE orders SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id.0)
            .bind(status.as_str())
            .bind(now_rfc3339())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(order)
    }
}

async fn write_line(
    conn: &mut SqliteConnection,
    order_id: OrderId,
    line: &NewOrderLine,
) -> Result<(), RepositoryError> {
    let item_exists: i64 =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM menu_items WHERE id = ?1)")
            .bind(line.menu_item_id.0)
            .fetch_one(&mut *conn)
            .await?;
    if item_exists == 0 {
        return Err(RepositoryError::NotFound { entity: "menu item", id: line.menu_item_id.0 });
    }

    // A merged line keeps the price captured when it was first added.
    sqlx::query(
        "INSERT INTO order_lines (order_id, menu_item_id, quantity, price_at_order_time)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(order_id, menu_item_id) DO UPDATE SET quantity = quantity + excluded.quantity",
    )
    .bind(order_id.0)
    .bind(line.menu_item_id.0)
    .bind(i64::from(line.quantity))
    .bind(line.price_snapshot.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn ensure_open(conn: &mut SqliteConnection, id: OrderId) -> Result<Order, RepositoryError> {
    let Some(order) = load_order(conn, id).await? else {
        return Err(RepositoryError::NotFound { entity: "order", id: id.0 });
    };
    if !order.accepts_lines() {
        return Err(RepositoryError::Invalid(format!(
            "order {} is {} and can no longer be changed",
            id.0,
            order.status.as_str()
        )));
    }
    Ok(order)
}

/// Re-derives the stored total from the current line set on the same
/// connection as the preceding line write.
async fn recompute_total(
    conn: &mut SqliteConnection,
    id: OrderId,
) -> Result<Decimal, RepositoryError> {
    let lines = load_lines(conn, id).await?;
    let total = order_total(&lines);

    sqlx::query("UPDATE orders SET total_amount = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(id.0)
        .bind(total.to_string())
        .bind(now_rfc3339())
        .execute(&mut *conn)
        .await?;

    Ok(total)
}

async fn load_order(
    conn: &mut SqliteConnection,
    id: OrderId,
) -> Result<Option<Order>, RepositoryError> {
    let row = sqlx::query(
        "SELECT id, customer_id, status, total_amount, created_at FROM orders WHERE id = ?1",
    )
    .bind(id.0)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(row_to_order).transpose()
}

async fn load_lines(
    conn: &mut SqliteConnection,
    id: OrderId,
) -> Result<Vec<OrderLine>, RepositoryError> {
    let rows = sqlx::query(
        "SELECT l.order_id, l.menu_item_id, m.name AS item_name, l.quantity, l.price_at_order_time
         FROM order_lines l
         JOIN menu_items m ON m.id = l.menu_item_id
         WHERE l.order_id = ?1
         ORDER BY l.id",
    )
    .bind(id.0)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(row_to_line).collect()
}

fn row_to_order(row: &SqliteRow) -> Result<Order, RepositoryError> {
    let status_str: String = row.try_get("status").map_err(decode_err)?;
    let status = OrderStatus::parse(&status_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown order status `{status_str}`")))?;
    let total_str: String = row.try_get("total_amount").map_err(decode_err)?;
    let created_at_str: String = row.try_get("created_at").map_err(decode_err)?;

    Ok(Order {
        id: OrderId(row.try_get("id").map_err(decode_err)?),
        customer_id: CustomerId(row.try_get("customer_id").map_err(decode_err)?),
        status,
        total_amount: parse_decimal("total_amount", &total_str)?,
        created_at: parse_timestamp(&created_at_str),
    })
}

fn row_to_line(row: &SqliteRow) -> Result<OrderLine, RepositoryError> {
    let quantity: i64 = row.try_get("quantity").map_err(decode_err)?;
    let price_str: String = row.try_get("price_at_order_time").map_err(decode_err)?;

    Ok(OrderLine {
        order_id: OrderId(row.try_get("order_id").map_err(decode_err)?),
        menu_item_id: MenuItemId(row.try_get("menu_item_id").map_err(decode_err)?),
        item_name: row.try_get("item_name").map_err(decode_err)?,
        quantity: to_u32("quantity", quantity)?,
        price_at_order_time: parse_decimal("price_at_order_time", &price_str)?,
    })
}
