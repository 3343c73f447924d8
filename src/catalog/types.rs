//! Catalog domain types

use crate::cart::CartLine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Numeric product id assigned by the catalog
pub type ProductId = i64;

/// Product as shown in listings and cart lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub document_id: Option<String>,
    pub title: String,
    pub price: Option<f64>,
}

impl ProductSummary {
    pub fn new(id: ProductId, title: impl Into<String>, price: Option<f64>) -> Self {
        Self {
            id,
            document_id: None,
            title: title.into(),
            price,
        }
    }
}

/// Full product card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDetail {
    pub summary: ProductSummary,
    pub description: Option<String>,
    /// Absolute URL of the first picture, if any
    pub image_url: Option<String>,
}

/// One page of the product listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPage {
    pub products: Vec<ProductSummary>,
    pub page: u32,
    pub page_count: u32,
}

impl ProductPage {
    pub fn has_next(&self) -> bool {
        self.page < self.page_count
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

/// A line of a remote cart as returned by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCartItem {
    pub product_id: ProductId,
    /// Populated product, `None` when the relation was not expanded
    pub product: Option<ProductSummary>,
    pub quantity: u32,
}

/// System-of-record cart owned by the catalog service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCart {
    pub id: i64,
    pub document_id: Option<String>,
    pub telegram_id: String,
    pub items: Vec<RemoteCartItem>,
    pub created_at: Option<DateTime<Utc>>,
}

impl RemoteCart {
    /// Path key used to address the record in write calls
    pub fn key(&self) -> String {
        self.document_id
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }

    /// Cart contents as local lines, zero quantities dropped
    pub fn lines(&self) -> Vec<CartLine> {
        self.items
            .iter()
            .filter(|item| item.quantity > 0)
            .map(|item| CartLine::new(item.product_id, item.quantity))
            .collect()
    }

    /// Ordering key for picking the canonical cart among duplicates
    fn age_key(&self) -> (Option<DateTime<Utc>>, i64) {
        (self.created_at, self.id)
    }
}

/// Pick the canonical cart: earliest created, lowest id on ties.
///
/// Records without a creation timestamp sort after timestamped ones.
pub fn canonical_cart(carts: Vec<RemoteCart>) -> Option<RemoteCart> {
    carts.into_iter().min_by(|a, b| {
        match (a.created_at, b.created_at) {
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            _ => a.age_key().cmp(&b.age_key()),
        }
    })
}

/// Client contact record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: i64,
    pub telegram_id: String,
    pub email: String,
}
