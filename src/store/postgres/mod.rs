//! `PostgreSQL` store.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgConnection, PgPool, Postgres, Row, Transaction};

use crate::domain::value_objects::{Quantity, SessionId};
use crate::store::{Store, UnitOfWork};
use crate::{Result, ShopError};

mod carts;
mod catalog;
mod currencies;
mod orders;
mod payments;
mod principals;
mod wishlists;

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[async_trait]
impl Store for PgStore {
    fn backend_tag(&self) -> &'static str { "postgres" }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx: Some(tx) }))
    }
}

/// Wraps one database transaction; rolled back on drop unless committed.
pub struct PgUnitOfWork {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgUnitOfWork {
    fn conn(&mut self) -> Result<&mut PgConnection> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| ShopError::Internal("transaction already committed".into()))
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(&mut self) -> Result<()> {
        match self.tx.take() {
            Some(tx) => Ok(tx.commit().await?),
            None => Err(ShopError::Internal("transaction already committed".into())),
        }
    }
}

fn decode_error(column: &str, error: ShopError) -> sqlx::Error {
    sqlx::Error::ColumnDecode { index: column.to_string(), source: Box::new(error) }
}

/// TEXT column holding one of the domain's status names.
pub(crate) fn try_get_status<T>(row: &PgRow, column: &str) -> sqlx::Result<T>
where
    T: FromStr<Err = ShopError>,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e| decode_error(column, e))
}

pub(crate) fn try_get_quantity(row: &PgRow, column: &str) -> sqlx::Result<Quantity> {
    let raw: i32 = row.try_get(column)?;
    Quantity::new(i64::from(raw)).map_err(|e| decode_error(column, e))
}

pub(crate) fn try_get_session(row: &PgRow, column: &str) -> sqlx::Result<Option<SessionId>> {
    let raw: Option<String> = row.try_get(column)?;
    match raw {
        Some(value) => SessionId::parse(&value).map_err(|e| decode_error(column, e)),
        None => Ok(None),
    }
}
