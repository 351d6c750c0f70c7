use async_trait::async_trait;
use sqlx::{postgres::PgRow, query, query_as, FromRow, Postgres, Row};
use uuid::Uuid;

use super::{try_get_status, PgUnitOfWork};
use crate::domain::aggregates::Payment;
use crate::store::PaymentRepository;
use crate::Result;

const COLUMNS: &str = "p.id, p.order_id, p.payment_method, p.payment_provider, p.transaction_id, p.amount, \
     p.currency_id, p.status, p.gateway_response, p.processed_at, p.created_at";

#[async_trait]
impl PaymentRepository for PgUnitOfWork {
    async fn insert_payment(&mut self, payment: &Payment) -> Result<()> {
        query(
            "INSERT INTO payments (id, order_id, payment_method, payment_provider, transaction_id, amount, \
             currency_id, status, gateway_response, processed_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(payment.id)
        .bind(payment.order_id)
        .bind(&payment.payment_method)
        .bind(payment.payment_provider.as_deref())
        .bind(payment.transaction_id.as_deref())
        .bind(payment.amount)
        .bind(payment.currency_id)
        .bind(payment.status.as_str())
        .bind(payment.gateway_response.clone())
        .bind(payment.processed_at)
        .bind(payment.created_at)
        .execute(self.conn()?)
        .await?;
        Ok(())
    }

    async fn save_payment(&mut self, payment: &Payment) -> Result<()> {
        query("UPDATE payments SET status = $2, gateway_response = $3, processed_at = $4 WHERE id = $1")
            .bind(payment.id)
            .bind(payment.status.as_str())
            .bind(payment.gateway_response.clone())
            .bind(payment.processed_at)
            .execute(self.conn()?)
            .await?;
        Ok(())
    }

    async fn payment(&mut self, id: Uuid) -> Result<Option<Payment>> {
        let payment = query_as::<Postgres, Payment>(&format!("SELECT {COLUMNS} FROM payments p WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?;
        Ok(payment)
    }

    async fn lock_payment(&mut self, id: Uuid) -> Result<Option<Payment>> {
        let payment =
            query_as::<Postgres, Payment>(&format!("SELECT {COLUMNS} FROM payments p WHERE p.id = $1 FOR UPDATE"))
                .bind(id)
                .fetch_optional(self.conn()?)
                .await?;
        Ok(payment)
    }

    async fn lock_payment_by_transaction(&mut self, transaction_id: &str) -> Result<Option<Payment>> {
        let payment = query_as::<Postgres, Payment>(&format!(
            "SELECT {COLUMNS} FROM payments p WHERE p.transaction_id = $1 \
             ORDER BY p.created_at DESC LIMIT 1 FOR UPDATE"
        ))
        .bind(transaction_id)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(payment)
    }

    async fn payments(&mut self, user_id: Option<Uuid>) -> Result<Vec<Payment>> {
        let payments = query_as::<Postgres, Payment>(&format!(
            "SELECT {COLUMNS} FROM payments p JOIN orders o ON o.id = p.order_id \
             WHERE ($1::uuid IS NULL OR o.user_id = $1) ORDER BY p.created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.conn()?)
        .await?;
        Ok(payments)
    }
}

impl<'r> FromRow<'r, PgRow> for Payment {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            order_id: row.try_get("order_id")?,
            payment_method: row.try_get("payment_method")?,
            payment_provider: row.try_get("payment_provider")?,
            transaction_id: row.try_get("transaction_id")?,
            amount: row.try_get("amount")?,
            currency_id: row.try_get("currency_id")?,
            status: try_get_status(row, "status")?,
            gateway_response: row.try_get("gateway_response")?,
            processed_at: row.try_get("processed_at")?,
            created_at: row.try_get("created_at")?,
        })
    }
}
