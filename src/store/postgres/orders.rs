use async_trait::async_trait;
use sqlx::{postgres::PgRow, query, query_as, FromRow, Postgres, Row};
use uuid::Uuid;

use super::{try_get_quantity, try_get_status, PgUnitOfWork};
use crate::domain::aggregates::{Order, OrderItem};
use crate::domain::value_objects::OrderNumber;
use crate::store::OrderRepository;
use crate::Result;

const ORDER_COLUMNS: &str = "id, order_number, user_id, guest_email, order_date, order_status, payment_status, \
     payment_method, payment_transaction_id, shipping_address_id, billing_address_id, delivery_date, \
     tracking_number, fx_rate_to_base, fx_source, subtotal_base, shipping_cost_base, discount_base, \
     total_amount_base, currency_id, admin_notes, created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, order_id, variant_id, product_name, variant_details, quantity, unit_price, discount_amount, total_price";

const INSERT_ORDER_SQL: &str = r"
    INSERT INTO orders (
        id, order_number, user_id, guest_email, order_date, order_status, payment_status,
        payment_method, payment_transaction_id, shipping_address_id, billing_address_id, delivery_date,
        tracking_number, fx_rate_to_base, fx_source, subtotal_base, shipping_cost_base, discount_base,
        total_amount_base, currency_id, admin_notes, created_at, updated_at
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23)
    ON CONFLICT (order_number) DO NOTHING
";

const SAVE_ORDER_SQL: &str = r"
    UPDATE orders SET
        order_status = $2, payment_status = $3, payment_method = $4, payment_transaction_id = $5,
        delivery_date = $6, tracking_number = $7, subtotal_base = $8, shipping_cost_base = $9,
        discount_base = $10, total_amount_base = $11, admin_notes = $12, updated_at = $13
    WHERE id = $1
";

#[async_trait]
impl OrderRepository for PgUnitOfWork {
    async fn insert_order(&mut self, order: &Order) -> Result<bool> {
        let rows_affected = query(INSERT_ORDER_SQL)
            .bind(order.id)
            .bind(order.order_number.as_str())
            .bind(order.user_id)
            .bind(order.guest_email.as_deref())
            .bind(order.order_date)
            .bind(order.order_status.as_str())
            .bind(order.payment_status.as_str())
            .bind(order.payment_method.as_deref())
            .bind(order.payment_transaction_id.as_deref())
            .bind(order.shipping_address_id)
            .bind(order.billing_address_id)
            .bind(order.delivery_date)
            .bind(order.tracking_number.as_deref())
            .bind(order.fx_rate_to_base)
            .bind(order.fx_source.as_deref())
            .bind(order.subtotal_base)
            .bind(order.shipping_cost_base)
            .bind(order.discount_base)
            .bind(order.total_amount_base)
            .bind(order.currency_id)
            .bind(order.admin_notes.as_deref())
            .bind(order.created_at)
            .bind(order.updated_at)
            .execute(self.conn()?)
            .await?
            .rows_affected();
        Ok(rows_affected == 1)
    }

    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<()> {
        query(&format!(
            "INSERT INTO order_items ({ITEM_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(item.id)
        .bind(item.order_id)
        .bind(item.variant_id)
        .bind(&item.product_name)
        .bind(&item.variant_details)
        .bind(item.quantity.value())
        .bind(item.unit_price)
        .bind(item.discount_amount)
        .bind(item.total_price)
        .execute(self.conn()?)
        .await?;
        Ok(())
    }

    async fn save_order(&mut self, order: &Order) -> Result<()> {
        query(SAVE_ORDER_SQL)
            .bind(order.id)
            .bind(order.order_status.as_str())
            .bind(order.payment_status.as_str())
            .bind(order.payment_method.as_deref())
            .bind(order.payment_transaction_id.as_deref())
            .bind(order.delivery_date)
            .bind(order.tracking_number.as_deref())
            .bind(order.subtotal_base)
            .bind(order.shipping_cost_base)
            .bind(order.discount_base)
            .bind(order.total_amount_base)
            .bind(order.admin_notes.as_deref())
            .bind(order.updated_at)
            .execute(self.conn()?)
            .await?;
        Ok(())
    }

    async fn order(&mut self, id: Uuid) -> Result<Option<Order>> {
        let order = query_as::<Postgres, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?;
        Ok(order)
    }

    async fn lock_order(&mut self, id: Uuid) -> Result<Option<Order>> {
        let order =
            query_as::<Postgres, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"))
                .bind(id)
                .fetch_optional(self.conn()?)
                .await?;
        Ok(order)
    }

    async fn order_by_number(&mut self, order_number: &str) -> Result<Option<Order>> {
        let order =
            query_as::<Postgres, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1"))
                .bind(order_number)
                .fetch_optional(self.conn()?)
                .await?;
        Ok(order)
    }

    async fn order_items(&mut self, order_id: Uuid) -> Result<Vec<OrderItem>> {
        let items = query_as::<Postgres, OrderItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY id"
        ))
        .bind(order_id)
        .fetch_all(self.conn()?)
        .await?;
        Ok(items)
    }

    async fn orders(&mut self, user_id: Option<Uuid>) -> Result<Vec<Order>> {
        let orders = query_as::<Postgres, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE ($1::uuid IS NULL OR user_id = $1) ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.conn()?)
        .await?;
        Ok(orders)
    }
}

impl<'r> FromRow<'r, PgRow> for Order {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            order_number: OrderNumber::from_stored(row.try_get::<String, _>("order_number")?),
            user_id: row.try_get("user_id")?,
            guest_email: row.try_get("guest_email")?,
            order_date: row.try_get("order_date")?,
            order_status: try_get_status(row, "order_status")?,
            payment_status: try_get_status(row, "payment_status")?,
            payment_method: row.try_get("payment_method")?,
            payment_transaction_id: row.try_get("payment_transaction_id")?,
            shipping_address_id: row.try_get("shipping_address_id")?,
            billing_address_id: row.try_get("billing_address_id")?,
            delivery_date: row.try_get("delivery_date")?,
            tracking_number: row.try_get("tracking_number")?,
            fx_rate_to_base: row.try_get("fx_rate_to_base")?,
            fx_source: row.try_get("fx_source")?,
            subtotal_base: row.try_get("subtotal_base")?,
            shipping_cost_base: row.try_get("shipping_cost_base")?,
            discount_base: row.try_get("discount_base")?,
            total_amount_base: row.try_get("total_amount_base")?,
            currency_id: row.try_get("currency_id")?,
            admin_notes: row.try_get("admin_notes")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for OrderItem {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            order_id: row.try_get("order_id")?,
            variant_id: row.try_get("variant_id")?,
            product_name: row.try_get("product_name")?,
            variant_details: row.try_get("variant_details")?,
            quantity: try_get_quantity(row, "quantity")?,
            unit_price: row.try_get("unit_price")?,
            discount_amount: row.try_get("discount_amount")?,
            total_price: row.try_get("total_price")?,
        })
    }
}
