use async_trait::async_trait;
use sqlx::{postgres::PgRow, query_as, FromRow, Postgres, Row};
use uuid::Uuid;

use super::PgUnitOfWork;
use crate::domain::aggregates::CatalogVariant;
use crate::store::CatalogRepository;
use crate::Result;

/// Variant price overrides the product's sale price, which overrides its base price.
const GET_VARIANT_SQL: &str = r"
    SELECT v.id, p.name AS product_name, v.sku, v.color, v.size,
           COALESCE(v.price, p.sale_price, p.base_price) AS unit_price
    FROM product_variants v
    JOIN products p ON p.id = v.product_id
    WHERE v.id = $1
";

#[async_trait]
impl CatalogRepository for PgUnitOfWork {
    async fn variant(&mut self, id: Uuid) -> Result<Option<CatalogVariant>> {
        let variant = query_as::<Postgres, CatalogVariant>(GET_VARIANT_SQL)
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?;
        Ok(variant)
    }
}

impl<'r> FromRow<'r, PgRow> for CatalogVariant {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            product_name: row.try_get("product_name")?,
            sku: row.try_get("sku")?,
            color: row.try_get("color")?,
            size: row.try_get("size")?,
            unit_price: row.try_get("unit_price")?,
        })
    }
}
