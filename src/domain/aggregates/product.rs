//! Catalog read model
//!
//! Products, colors and sizes are owned by the catalog; this core only reads
//! the purchasable variant and the price it currently sells at.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::{Result, ShopError};

/// Point-in-time view of a purchasable variant.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CatalogVariant {
    pub id: Uuid,
    pub product_name: Option<String>,
    pub sku: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub unit_price: Option<Decimal>,
}

impl CatalogVariant {
    /// Authoritative price; a variant without one cannot be sold.
    pub fn require_price(&self) -> Result<Decimal> {
        self.unit_price.ok_or_else(|| ShopError::InvalidState("Variant has no price.".into()))
    }

    pub fn display_name(&self) -> String {
        self.product_name.clone().filter(|n| !n.trim().is_empty()).unwrap_or_else(|| "Product".into())
    }

    /// "Color, Size" when known, otherwise the SKU, otherwise a placeholder.
    pub fn descriptor(&self) -> String {
        let parts: Vec<&str> = [self.color.as_deref(), self.size.as_deref()]
            .into_iter()
            .flatten()
            .filter(|p| !p.trim().is_empty())
            .collect();
        if !parts.is_empty() {
            return parts.join(", ");
        }
        self.sku.clone().filter(|s| !s.trim().is_empty()).unwrap_or_else(|| "Variant".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant() -> CatalogVariant {
        CatalogVariant {
            id: Uuid::now_v7(), product_name: Some("Linen Shirt".into()), sku: Some("LS-01".into()),
            color: Some("Black".into()), size: Some("M".into()), unit_price: Some(Decimal::new(2000, 2)),
        }
    }

    #[test]
    fn test_descriptor_prefers_color_and_size() {
        assert_eq!(variant().descriptor(), "Black, M");
        let v = CatalogVariant { color: None, size: None, ..variant() };
        assert_eq!(v.descriptor(), "LS-01");
        let v = CatalogVariant { color: None, size: None, sku: None, ..variant() };
        assert_eq!(v.descriptor(), "Variant");
    }

    #[test]
    fn test_missing_price_is_invalid_state() {
        let v = CatalogVariant { unit_price: None, ..variant() };
        assert!(matches!(v.require_price(), Err(ShopError::InvalidState(_))));
        assert_eq!(variant().require_price().unwrap(), Decimal::new(20, 0));
    }
}
