use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, query, query_as, FromRow, Postgres, Row};
use uuid::Uuid;

use super::PgUnitOfWork;
use crate::domain::aggregates::{Currency, FxRate};
use crate::store::CurrencyRepository;
use crate::Result;

const CURRENCY_COLUMNS: &str =
    "id, code, name, symbol, exchange_rate, is_base_currency, is_active, decimal_places, created_at, updated_at";
const RATE_COLUMNS: &str = "id, base_currency_id, quote_currency_id, rate, source, as_of";

#[async_trait]
impl CurrencyRepository for PgUnitOfWork {
    async fn currencies(&mut self) -> Result<Vec<Currency>> {
        let currencies = query_as::<Postgres, Currency>(&format!(
            "SELECT {CURRENCY_COLUMNS} FROM currencies ORDER BY code"
        ))
        .fetch_all(self.conn()?)
        .await?;
        Ok(currencies)
    }

    async fn currency(&mut self, id: Uuid) -> Result<Option<Currency>> {
        let currency =
            query_as::<Postgres, Currency>(&format!("SELECT {CURRENCY_COLUMNS} FROM currencies WHERE id = $1"))
                .bind(id)
                .fetch_optional(self.conn()?)
                .await?;
        Ok(currency)
    }

    async fn currency_by_code(&mut self, code: &str) -> Result<Option<Currency>> {
        let currency =
            query_as::<Postgres, Currency>(&format!("SELECT {CURRENCY_COLUMNS} FROM currencies WHERE code = $1"))
                .bind(code)
                .fetch_optional(self.conn()?)
                .await?;
        Ok(currency)
    }

    async fn base_currency(&mut self) -> Result<Option<Currency>> {
        let currency = query_as::<Postgres, Currency>(&format!(
            "SELECT {CURRENCY_COLUMNS} FROM currencies WHERE is_base_currency LIMIT 1"
        ))
        .fetch_optional(self.conn()?)
        .await?;
        Ok(currency)
    }

    async fn insert_currency(&mut self, currency: &Currency) -> Result<()> {
        query(&format!(
            "INSERT INTO currencies ({CURRENCY_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        ))
        .bind(currency.id)
        .bind(&currency.code)
        .bind(&currency.name)
        .bind(currency.symbol.as_deref())
        .bind(currency.exchange_rate)
        .bind(currency.is_base_currency)
        .bind(currency.is_active)
        .bind(currency.decimal_places)
        .bind(currency.created_at)
        .bind(currency.updated_at)
        .execute(self.conn()?)
        .await?;
        Ok(())
    }

    async fn save_currency(&mut self, currency: &Currency) -> Result<()> {
        query(
            "UPDATE currencies SET code = $2, name = $3, symbol = $4, exchange_rate = $5, \
             is_base_currency = $6, is_active = $7, decimal_places = $8, updated_at = $9 WHERE id = $1",
        )
        .bind(currency.id)
        .bind(&currency.code)
        .bind(&currency.name)
        .bind(currency.symbol.as_deref())
        .bind(currency.exchange_rate)
        .bind(currency.is_base_currency)
        .bind(currency.is_active)
        .bind(currency.decimal_places)
        .bind(currency.updated_at)
        .execute(self.conn()?)
        .await?;
        Ok(())
    }

    async fn clear_base_currency(&mut self, now: DateTime<Utc>) -> Result<u64> {
        let rows_affected =
            query("UPDATE currencies SET is_base_currency = FALSE, updated_at = $1 WHERE is_base_currency")
                .bind(now)
                .execute(self.conn()?)
                .await?
                .rows_affected();
        Ok(rows_affected)
    }

    async fn latest_rate(&mut self, base_id: Uuid, quote_id: Uuid) -> Result<Option<FxRate>> {
        let rate = query_as::<Postgres, FxRate>(&format!(
            "SELECT {RATE_COLUMNS} FROM fx_rates WHERE base_currency_id = $1 AND quote_currency_id = $2 \
             ORDER BY as_of DESC LIMIT 1"
        ))
        .bind(base_id)
        .bind(quote_id)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(rate)
    }

    async fn insert_rate(&mut self, rate: &FxRate) -> Result<()> {
        query(&format!("INSERT INTO fx_rates ({RATE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)"))
            .bind(rate.id)
            .bind(rate.base_currency_id)
            .bind(rate.quote_currency_id)
            .bind(rate.rate)
            .bind(&rate.source)
            .bind(rate.as_of)
            .execute(self.conn()?)
            .await?;
        Ok(())
    }

    async fn rates(&mut self) -> Result<Vec<FxRate>> {
        let rates = query_as::<Postgres, FxRate>(&format!("SELECT {RATE_COLUMNS} FROM fx_rates ORDER BY as_of DESC"))
            .fetch_all(self.conn()?)
            .await?;
        Ok(rates)
    }
}

impl<'r> FromRow<'r, PgRow> for Currency {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            code: row.try_get("code")?,
            name: row.try_get("name")?,
            symbol: row.try_get("symbol")?,
            exchange_rate: row.try_get("exchange_rate")?,
            is_base_currency: row.try_get("is_base_currency")?,
            is_active: row.try_get("is_active")?,
            decimal_places: row.try_get("decimal_places")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for FxRate {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            base_currency_id: row.try_get("base_currency_id")?,
            quote_currency_id: row.try_get("quote_currency_id")?,
            rate: row.try_get("rate")?,
            source: row.try_get("source")?,
            as_of: row.try_get("as_of")?,
        })
    }
}
