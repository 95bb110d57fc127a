use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;

/// Sellable catalog item. Read-mostly from the board's perspective; the sync
/// core never mutates products.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, TS)]
pub struct Product {
    pub id: i64,
    pub name: Option<String>,
    pub sku: Option<String>,
    pub price: Option<f64>,
    pub cost: Option<f64>,
    pub stock_quantity: Option<i32>,
    pub supplier: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Case-insensitive match over name and SKU, as the product picker
    /// searches.
    pub fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        let name_hit = self
            .name
            .as_ref()
            .is_some_and(|name| name.to_lowercase().contains(&term));
        let sku_hit = self
            .sku
            .as_ref()
            .is_some_and(|sku| sku.to_lowercase().contains(&term));
        name_hit || sku_hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, sku: &str) -> Product {
        Product {
            id: 1,
            name: Some(name.into()),
            sku: Some(sku.into()),
            price: Some(59.9),
            cost: Some(20.0),
            stock_quantity: Some(12),
            supplier: None,
            category: None,
            brand: None,
            description: None,
            image_url: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn matches_name_and_sku_case_insensitively() {
        let shirt = product("Camiseta Azul", "CAM-AZ-01");
        assert!(shirt.matches("camiseta"));
        assert!(shirt.matches("cam-az"));
        assert!(!shirt.matches("caneca"));
    }
}
